use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct RmCommand;

#[async_trait]
impl Command for RmCommand {
    fn name(&self) -> &'static str {
        "rm"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut recursive = false;
        let mut force = false;
        let mut dir_ok = false;
        let mut paths: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "--" => {}
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    for c in arg.chars().skip(1) {
                        match c {
                            'r' | 'R' => recursive = true,
                            'f' => force = true,
                            'd' => dir_ok = true,
                            'v' | 'i' => {}
                            _ => {
                                return CommandResult::error(format!(
                                    "rm: invalid option -- '{}'\n",
                                    c
                                ))
                            }
                        }
                    }
                }
                _ => paths.push(arg.clone()),
            }
        }
        if paths.is_empty() {
            if force {
                return CommandResult::success(String::new());
            }
            return CommandResult::error("rm: missing operand\n".to_string());
        }
        let mut stderr = String::new();
        let mut exit_code = 0;
        for path in &paths {
            let resolved = ctx.resolve(path);
            let result = ctx.fs.rm(&resolved, recursive || dir_ok, force).await;
            if let Err(e) = result {
                let reason = match e.code() {
                    "EISDIR" => "Is a directory",
                    "EROFS" => "Read-only file system",
                    _ => "No such file or directory",
                };
                stderr.push_str(&format!("rm: cannot remove '{}': {}\n", path, reason));
                exit_code = 1;
            }
        }
        CommandResult::with_exit_code(String::new(), stderr, exit_code)
    }
}
