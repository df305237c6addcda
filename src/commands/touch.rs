use async_trait::async_trait;
use std::time::SystemTime;

use super::{Command, CommandContext, CommandResult};

pub struct TouchCommand;

#[async_trait]
impl Command for TouchCommand {
    fn name(&self) -> &'static str {
        "touch"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let no_create = ctx.args.iter().any(|a| a == "-c");
        let files: Vec<&String> = ctx.args.iter().filter(|a| !a.starts_with('-')).collect();
        if files.is_empty() {
            return CommandResult::error("touch: missing file operand\n".to_string());
        }
        let mut stderr = String::new();
        let mut exit_code = 0;
        for file in files {
            let path = ctx.resolve(file);
            if ctx.fs.exists(&path).await {
                if let Err(e) = ctx.fs.set_mtime(&path, SystemTime::now()).await {
                    stderr.push_str(&format!("touch: cannot touch '{}': {}\n", file, e));
                    exit_code = 1;
                }
            } else if !no_create {
                if let Err(e) = ctx.fs.write_file(&path, b"").await {
                    let reason = match e.code() {
                        "EROFS" => "Read-only file system",
                        _ => "No such file or directory",
                    };
                    stderr.push_str(&format!("touch: cannot touch '{}': {}\n", file, reason));
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
    async fn test_touch_creates() {
        let ctx = ctx_with_files(vec!["/new"], vec![]).await;
        let fs = ctx.fs.clone();
        assert_eq!(TouchCommand.execute(ctx).await.exit_code, 0);
        assert!(fs.exists("/new").await);
        assert_eq!(fs.read_file("/new").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_touch_preserves_content() {
        let ctx = ctx_with_files(vec!["/f"], vec![("/f", "keep")]).await;
        let fs = ctx.fs.clone();
        TouchCommand.execute(ctx).await;
        assert_eq!(fs.read_file("/f").await.unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_touch_no_create() {
        let ctx = ctx_with_files(vec!["-c", "/absent"], vec![]).await;
        let fs = ctx.fs.clone();
        assert_eq!(TouchCommand.execute(ctx).await.exit_code, 0);
        assert!(!fs.exists("/absent").await);
    }

    #[tokio::test]
    async fn test_touch_missing_parent() {
        let ctx = ctx_with_files(vec!["/no/dir/f"], vec![]).await;
        assert_eq!(TouchCommand.execute(ctx).await.exit_code, 1);
    }
}
