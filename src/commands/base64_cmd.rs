use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{Command, CommandContext, CommandResult};

pub struct Base64Command;

#[async_trait]
impl Command for Base64Command {
    fn name(&self) -> &'static str {
        "base64"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut decode = false;
        let mut wrap: usize = 76;
        let mut files: Vec<String> = Vec::new();
        let mut i = 0;
        while i < ctx.args.len() {
            match ctx.args[i].as_str() {
                "-d" | "--decode" => decode = true,
                "-w" | "--wrap" => {
                    i += 1;
                    wrap = ctx.args.get(i).and_then(|w| w.parse().ok()).unwrap_or(76);
                }
                "--" => {}
                other => files.push(other.to_string()),
            }
            i += 1;
        }
        let data: Vec<u8> = match files.first().map(|s| s.as_str()) {
            None | Some("-") => ctx.stdin.clone().into_bytes(),
            Some(file) => match ctx.fs.read_file_bytes(&ctx.resolve(file)).await {
                Ok(bytes) => bytes,
                Err(_) => {
                    return CommandResult::error(format!(
                        "base64: {}: No such file or directory\n",
                        file
                    ))
                }
            },
        };
        if decode {
            let cleaned: String = String::from_utf8_lossy(&data)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            match STANDARD.decode(cleaned.as_bytes()) {
                Ok(bytes) => {
                    CommandResult::success(String::from_utf8_lossy(&bytes).to_string())
                }
                Err(_) => CommandResult::error("base64: invalid input\n".to_string()),
            }
        } else {
            let encoded = STANDARD.encode(&data);
            let mut out = String::new();
            if wrap == 0 {
                out.push_str(&encoded);
            } else {
                for chunk in encoded.as_bytes().chunks(wrap) {
                    out.push_str(&String::from_utf8_lossy(chunk));
                    out.push('\n');
                }
                return CommandResult::success(out);
            }
            out.push('\n');
            CommandResult::success(out)
        }
    }
}
