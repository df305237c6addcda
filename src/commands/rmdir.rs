use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct RmdirCommand;

#[async_trait]
impl Command for RmdirCommand {
    fn name(&self) -> &'static str {
        "rmdir"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let paths: Vec<&String> = ctx.args.iter().filter(|a| !a.starts_with('-')).collect();
        if paths.is_empty() {
            return CommandResult::error("rmdir: missing operand\n".to_string());
        }
        let mut stderr = String::new();
        let mut exit_code = 0;
        for path in paths {
            let resolved = ctx.resolve(path);
            match ctx.fs.readdir(&resolved).await {
                Ok(children) if children.is_empty() => {
                    if ctx.fs.rm(&resolved, true, false).await.is_err() {
                        stderr.push_str(&format!(
                            "rmdir: failed to remove '{}': Permission denied\n",
                            path
                        ));
                        exit_code = 1;
                    }
                }
                Ok(_) => {
                    stderr.push_str(&format!(
                        "rmdir: failed to remove '{}': Directory not empty\n",
                        path
                    ));
                    exit_code = 1;
                }
                Err(e) => {
                    let reason = match e.code() {
                        "ENOTDIR" => "Not a directory",
                        _ => "No such file or directory",
                    };
                    stderr.push_str(&format!("rmdir: failed to remove '{}': {}\n", path, reason));
                    exit_code = 1;
                }
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
    async fn test_rmdir_empty() {
        let ctx = ctx_with_files(vec!["/d"], vec![]).await;
        ctx.fs.mkdir("/d", false).await.unwrap();
        let fs = ctx.fs.clone();
        assert_eq!(RmdirCommand.execute(ctx).await.exit_code, 0);
        assert!(!fs.exists("/d").await);
    }

    #[tokio::test]
    async fn test_rmdir_not_empty() {
        let ctx = ctx_with_files(vec!["/d"], vec![("/d/f", "x")]).await;
        let result = RmdirCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("Directory not empty"));
    }

    #[tokio::test]
    async fn test_rmdir_not_a_directory() {
        let ctx = ctx_with_files(vec!["/f"], vec![("/f", "x")]).await;
        let result = RmdirCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("Not a directory"));
    }
}
