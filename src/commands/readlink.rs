use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct ReadlinkCommand;

#[async_trait]
impl Command for ReadlinkCommand {
    fn name(&self) -> &'static str {
        "readlink"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let canonical = ctx.args.iter().any(|a| a == "-f" || a == "-e");
        let paths: Vec<&String> = ctx.args.iter().filter(|a| !a.starts_with('-')).collect();
        if paths.is_empty() {
            return CommandResult::error("readlink: missing operand\n".to_string());
        }
        let mut out = String::new();
        for path in paths {
            let resolved = ctx.resolve(path);
            if canonical {
                match ctx.fs.realpath(&resolved).await {
                    Ok(real) => out.push_str(&format!("{}\n", real)),
                    Err(_) => return CommandResult::with_exit_code(out, String::new(), 1),
                }
            } else {
                match ctx.fs.readlink(&resolved).await {
                    Ok(target) => out.push_str(&format!("{}\n", target)),
                    Err(_) => return CommandResult::with_exit_code(out, String::new(), 1),
                }
            }
        }
        CommandResult::success(out)
    }
}
