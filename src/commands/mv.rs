use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};
use crate::vfs::path as vpath;

pub struct MvCommand;

#[async_trait]
impl Command for MvCommand {
    fn name(&self) -> &'static str {
        "mv"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut no_clobber = false;
        let mut paths: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-n" => no_clobber = true,
                "-f" | "-v" | "--" => {}
                _ if arg.starts_with('-') => {
                    return CommandResult::error(format!(
                        "mv: invalid option -- '{}'\n",
                        arg.trim_start_matches('-')
                    ))
                }
                _ => paths.push(arg.clone()),
            }
        }
        if paths.len() < 2 {
            return CommandResult::error("mv: missing file operand\n".to_string());
        }
        let dest_raw = paths.pop().unwrap_or_default();
        let dest = ctx.resolve(&dest_raw);
        let dest_is_dir = ctx
            .fs
            .stat(&dest)
            .await
            .map(|s| s.is_directory)
            .unwrap_or(false);
        if paths.len() > 1 && !dest_is_dir {
            return CommandResult::error(format!(
                "mv: target '{}' is not a directory\n",
                dest_raw
            ));
        }
        let mut stderr = String::new();
        let mut exit_code = 0;
        for src_raw in &paths {
            let src = ctx.resolve(src_raw);
            let target = if dest_is_dir {
                vpath::join(&dest, &vpath::file_name(&src))
            } else {
                dest.clone()
            };
            if no_clobber && ctx.fs.exists(&target).await {
                continue;
            }
            if let Err(e) = ctx.fs.rename(&src, &target).await {
                let reason = match e.code() {
                    "EROFS" => "Read-only file system",
                    "EINVAL" => "Invalid argument",
                    _ => "No such file or directory",
                };
                stderr.push_str(&format!(
                    "mv: cannot move '{}' to '{}': {}\n",
                    src_raw, dest_raw, reason
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
    async fn test_mv_rename() {
        let ctx = ctx_with_files(vec!["/a", "/b"], vec![("/a", "data")]).await;
        let fs = ctx.fs.clone();
        assert_eq!(MvCommand.execute(ctx).await.exit_code, 0);
        assert!(!fs.exists("/a").await);
        assert_eq!(fs.read_file("/b").await.unwrap(), "data");
    }

    #[tokio::test]
    async fn test_mv_into_directory() {
        let ctx = ctx_with_files(vec!["/a", "/d"], vec![("/a", "x"), ("/d/keep", "")]).await;
        let fs = ctx.fs.clone();
        assert_eq!(MvCommand.execute(ctx).await.exit_code, 0);
        assert_eq!(fs.read_file("/d/a").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_mv_directory() {
        let ctx = ctx_with_files(vec!["/d", "/e"], vec![("/d/f", "x")]).await;
        let fs = ctx.fs.clone();
        assert_eq!(MvCommand.execute(ctx).await.exit_code, 0);
        assert_eq!(fs.read_file("/e/f").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_mv_missing_source() {
        let ctx = ctx_with_files(vec!["/none", "/b"], vec![]).await;
        assert_eq!(MvCommand.execute(ctx).await.exit_code, 1);
    }
}
