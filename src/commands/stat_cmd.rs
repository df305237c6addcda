use async_trait::async_trait;
use chrono::{DateTime, Local};

use super::{Command, CommandContext, CommandResult};

pub struct StatCommand;

#[async_trait]
impl Command for StatCommand {
    fn name(&self) -> &'static str {
        "stat"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut format: Option<String> = None;
        let mut files: Vec<String> = Vec::new();
        let mut i = 0;
        while i < ctx.args.len() {
            let arg = &ctx.args[i];
            match arg.as_str() {
                "-c" | "--format" => {
                    i += 1;
                    format = ctx.args.get(i).cloned();
                }
                "-t" | "--" => {}
                _ => files.push(arg.clone()),
            }
            i += 1;
        }
        if files.is_empty() {
            return CommandResult::error("stat: missing operand\n".to_string());
        }
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        for file in &files {
            let path = ctx.resolve(file);
            let stat = match ctx.fs.lstat(&path).await {
                Ok(s) => s,
                Err(_) => {
                    stderr.push_str(&format!(
                        "stat: cannot statx '{}': No such file or directory\n",
                        file
                    ));
                    exit_code = 1;
                    continue;
                }
            };
            let kind = if stat.is_symlink {
                "symbolic link"
            } else if stat.is_directory {
                "directory"
            } else {
                "regular file"
            };
            let mtime: DateTime<Local> = stat.mtime.into();
            match &format {
                Some(spec) => {
                    let rendered = spec
                        .replace("%n", file)
                        .replace("%s", &stat.size.to_string())
                        .replace("%a", &format!("{:o}", stat.mode))
                        .replace("%F", kind)
                        .replace(
                            "%Y",
                            &mtime.timestamp().to_string(),
                        );
                    stdout.push_str(&rendered);
                    stdout.push('\n');
                }
                None => {
                    stdout.push_str(&format!(
                        "  File: {}\n  Size: {}\t{}\nAccess: ({:04o})  Modify: {}\n",
                        file,
                        stat.size,
                        kind,
                        stat.mode,
                        mtime.format("%Y-%m-%d %H:%M:%S")
                    ));
                }
            }
        }
        CommandResult::with_exit_code(stdout, stderr, exit_code)
    }
}
