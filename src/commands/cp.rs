use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};
use crate::vfs::path as vpath;
use crate::vfs::Vfs;

pub struct CpCommand;

#[async_trait]
impl Command for CpCommand {
    fn name(&self) -> &'static str {
        "cp"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut recursive = false;
        let mut no_clobber = false;
        let mut paths: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-r" | "-R" | "-a" | "--recursive" => recursive = true,
                "-n" | "--no-clobber" => no_clobber = true,
                "-f" | "-p" | "-v" | "--" => {}
                _ if arg.starts_with('-') => {
                    return CommandResult::error(format!(
                        "cp: invalid option -- '{}'\n",
                        arg.trim_start_matches('-')
                    ))
                }
                _ => paths.push(arg.clone()),
            }
        }
        if paths.len() < 2 {
            return CommandResult::error("cp: missing file operand\n".to_string());
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
                "cp: target '{}' is not a directory\n",
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
            match ctx.fs.stat(&src).await {
                Ok(stat) if stat.is_directory => {
                    if !recursive {
                        stderr.push_str(&format!(
                            "cp: -r not specified; omitting directory '{}'\n",
                            src_raw
                        ));
                        exit_code = 1;
                        continue;
                    }
                    if let Err(message) = copy_tree(ctx.fs.as_ref(), &src, &target).await {
                        stderr.push_str(&format!("cp: {}\n", message));
                        exit_code = 1;
                    }
                }
                Ok(_) => {
                    if let Err(e) = ctx.fs.copy_file(&src, &target).await {
                        let reason = match e.code() {
                            "EROFS" => "Read-only file system",
                            _ => "No such file or directory",
                        };
                        stderr.push_str(&format!(
                            "cp: cannot create regular file '{}': {}\n",
                            dest_raw, reason
                        ));
                        exit_code = 1;
                    }
                }
                Err(_) => {
                    stderr.push_str(&format!(
                        "cp: cannot stat '{}': No such file or directory\n",
                        src_raw
                    ));
                    exit_code = 1;
                }
            }
        }
        CommandResult::with_exit_code(String::new(), stderr, exit_code)
    }
}

/// Depth-first copy of a directory tree.
async fn copy_tree(fs: &dyn Vfs, src: &str, dest: &str) -> Result<(), String> {
    fs.mkdir(dest, true).await.map_err(|e| e.to_string())?;
    let mut queue = vec![(src.to_string(), dest.to_string())];
    while let Some((from, to)) = queue.pop() {
        for entry in fs.readdir_entries(&from).await.map_err(|e| e.to_string())? {
            let child_src = vpath::join(&from, &entry.name);
            let child_dest = vpath::join(&to, &entry.name);
            if entry.is_directory {
                fs.mkdir(&child_dest, true).await.map_err(|e| e.to_string())?;
                queue.push((child_src, child_dest));
            } else if entry.is_symlink {
                let target = fs.readlink(&child_src).await.map_err(|e| e.to_string())?;
                let _ = fs.symlink(&target, &child_dest).await;
            } else {
                fs.copy_file(&child_src, &child_dest)
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_cp_file() {
        let ctx = ctx_with_files(vec!["/a", "/b"], vec![("/a", "data")]).await;
        let fs = ctx.fs.clone();
        assert_eq!(CpCommand.execute(ctx).await.exit_code, 0);
        assert_eq!(fs.read_file("/b").await.unwrap(), "data");
        assert_eq!(fs.read_file("/a").await.unwrap(), "data");
    }

    #[tokio::test]
    async fn test_cp_into_directory() {
        let ctx = ctx_with_files(vec!["/a", "/d"], vec![("/a", "x"), ("/d/keep", "")]).await;
        let fs = ctx.fs.clone();
        assert_eq!(CpCommand.execute(ctx).await.exit_code, 0);
        assert_eq!(fs.read_file("/d/a").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_cp_directory_requires_r() {
        let ctx = ctx_with_files(vec!["/d", "/e"], vec![("/d/f", "x")]).await;
        let result = CpCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("omitting directory"));
    }

    #[tokio::test]
    async fn test_cp_recursive() {
        let ctx = ctx_with_files(vec!["-r", "/d", "/e"], vec![("/d/sub/f", "deep")]).await;
        let fs = ctx.fs.clone();
        assert_eq!(CpCommand.execute(ctx).await.exit_code, 0);
        assert_eq!(fs.read_file("/e/sub/f").await.unwrap(), "deep");
    }

    #[tokio::test]
    async fn test_cp_missing_source() {
        let ctx = ctx_with_files(vec!["/none", "/b"], vec![]).await;
        let result = CpCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("cannot stat"));
    }

    #[tokio::test]
    async fn test_cp_multiple_to_non_directory() {
        let ctx = ctx_with_files(vec!["/a", "/b", "/c"], vec![("/a", ""), ("/b", ""), ("/c", "f")])
            .await;
        let result = CpCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("is not a directory"));
    }
}
