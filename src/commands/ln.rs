use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};
use crate::vfs::path as vpath;

pub struct LnCommand;

#[async_trait]
impl Command for LnCommand {
    fn name(&self) -> &'static str {
        "ln"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut symbolic = false;
        let mut force = false;
        let mut paths: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-s" => symbolic = true,
                "-f" => force = true,
                "-sf" | "-fs" => {
                    symbolic = true;
                    force = true;
                }
                "--" => {}
                _ if arg.starts_with('-') => {
                    return CommandResult::error(format!(
                        "ln: invalid option -- '{}'\n",
                        arg.trim_start_matches('-')
                    ))
                }
                _ => paths.push(arg.clone()),
            }
        }
        if !symbolic {
            return CommandResult::error(
                "ln: hard links are not supported in this environment\n".to_string(),
            );
        }
        let (target, link) = match paths.len() {
            2 => (paths[0].clone(), paths[1].clone()),
            1 => (paths[0].clone(), vpath::file_name(&paths[0])),
            _ => return CommandResult::error("ln: missing file operand\n".to_string()),
        };
        let mut link_path = ctx.resolve(&link);
        // Linking into a directory uses the target's basename.
        if ctx
            .fs
            .stat(&link_path)
            .await
            .map(|s| s.is_directory)
            .unwrap_or(false)
        {
            link_path = vpath::join(&link_path, &vpath::file_name(&target));
        }
        if force {
            let _ = ctx.fs.rm(&link_path, false, true).await;
        }
        match ctx.fs.symlink(&target, &link_path).await {
            Ok(()) => CommandResult::success(String::new()),
            Err(e) => {
                let reason = match e.code() {
                    "EEXIST" => "File exists",
                    "EROFS" => "Read-only file system",
                    _ => "No such file or directory",
                };
                CommandResult::error(format!(
                    "ln: failed to create symbolic link '{}': {}\n",
                    link, reason
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_ln_symbolic() {
        let ctx = ctx_with_files(vec!["-s", "/target", "/ln"], vec![("/target", "x")]).await;
        let fs = ctx.fs.clone();
        assert_eq!(LnCommand.execute(ctx).await.exit_code, 0);
        assert_eq!(fs.readlink("/ln").await.unwrap(), "/target");
        assert_eq!(fs.read_file("/ln").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_ln_existing_fails_without_force() {
        let ctx =
            ctx_with_files(vec!["-s", "/t", "/ln"], vec![("/t", ""), ("/ln", "old")]).await;
        let result = LnCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("File exists"));
    }

    #[tokio::test]
    async fn test_ln_force_replaces() {
        let ctx =
            ctx_with_files(vec!["-sf", "/t", "/ln"], vec![("/t", ""), ("/ln", "old")]).await;
        let fs = ctx.fs.clone();
        assert_eq!(LnCommand.execute(ctx).await.exit_code, 0);
        assert_eq!(fs.readlink("/ln").await.unwrap(), "/t");
    }

    #[tokio::test]
    async fn test_ln_hard_link_unsupported() {
        let ctx = ctx_with_files(vec!["/a", "/b"], vec![("/a", "")]).await;
        assert_eq!(LnCommand.execute(ctx).await.exit_code, 1);
    }
}
