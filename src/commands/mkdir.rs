use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct MkdirCommand;

#[async_trait]
impl Command for MkdirCommand {
    fn name(&self) -> &'static str {
        "mkdir"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut recursive = false;
        let mut dirs: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-p" | "--parents" => recursive = true,
                "-m" | "--mode" => {}
                "--" => {}
                _ if arg.starts_with('-') => {
                    return CommandResult::error(format!(
                        "mkdir: invalid option -- '{}'\n",
                        arg.trim_start_matches('-')
                    ))
                }
                _ => dirs.push(arg.clone()),
            }
        }
        if dirs.is_empty() {
            return CommandResult::error("mkdir: missing operand\n".to_string());
        }
        let mut stderr = String::new();
        let mut exit_code = 0;
        for dir in &dirs {
            if let Err(e) = ctx.fs.mkdir(&ctx.resolve(dir), recursive).await {
                let reason = match e.code() {
                    "EEXIST" => "File exists",
                    "ENOENT" => "No such file or directory",
                    "EROFS" => "Read-only file system",
                    "ENOTDIR" => "Not a directory",
                    _ => "Cannot create directory",
                };
                stderr.push_str(&format!(
                    "mkdir: cannot create directory '{}': {}\n",
                    dir, reason
                ));
                exit_code = 1;
            }
        }
        CommandResult::with_exit_code(String::new(), stderr, exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_mkdir() {
        let ctx = ctx_with_files(vec!["/newdir"], vec![]).await;
        let fs = ctx.fs.clone();
        assert_eq!(MkdirCommand.execute(ctx).await.exit_code, 0);
        assert!(fs.stat("/newdir").await.unwrap().is_directory);
    }

    #[tokio::test]
    async fn test_mkdir_missing_parent() {
        let ctx = ctx_with_files(vec!["/a/b/c"], vec![]).await;
        let result = MkdirCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("No such file or directory"));
    }

    #[tokio::test]
    async fn test_mkdir_parents() {
        let ctx = ctx_with_files(vec!["-p", "/a/b/c"], vec![]).await;
        let fs = ctx.fs.clone();
        assert_eq!(MkdirCommand.execute(ctx).await.exit_code, 0);
        assert!(fs.stat("/a/b/c").await.unwrap().is_directory);
    }

    #[tokio::test]
    async fn test_mkdir_exists() {
        let ctx = ctx_with_files(vec!["/d"], vec![("/d/f", "")]).await;
        let result = MkdirCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("File exists"));
    }
}
