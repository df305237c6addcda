use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct TeeCommand;

#[async_trait]
impl Command for TeeCommand {
    fn name(&self) -> &'static str {
        "tee"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut append = false;
        let mut files: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-a" | "--append" => append = true,
                "--" => {}
                _ => files.push(arg.clone()),
            }
        }
        let mut stderr = String::new();
        let mut exit_code = 0;
        for file in &files {
            let path = ctx.resolve(file);
            let result = if append {
                ctx.fs.append_file(&path, ctx.stdin.as_bytes()).await
            } else {
                ctx.fs.write_file(&path, ctx.stdin.as_bytes()).await
            };
            if let Err(e) = result {
                let reason = match e.code() {
                    "EROFS" => "Read-only file system",
                    "EISDIR" => "Is a directory",
                    _ => "No such file or directory",
                };
                stderr.push_str(&format!("tee: {}: {}\n", file, reason));
                exit_code = 1;
            }
        }
        CommandResult::with_exit_code(ctx.stdin.clone(), stderr, exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_stdin;

    #[tokio::test]
    async fn test_tee_passes_through_and_writes() {
        let ctx = ctx_with_stdin(vec!["/out.txt"], "data\n").await;
        let fs = ctx.fs.clone();
        let result = TeeCommand.execute(ctx).await;
        assert_eq!(result.stdout, "data\n");
        assert_eq!(fs.read_file("/out.txt").await.unwrap(), "data\n");
    }

    #[tokio::test]
    async fn test_tee_append() {
        let ctx = ctx_with_stdin(vec!["-a", "/out"], "two\n").await;
        ctx.fs.write_file("/out", b"one\n").await.unwrap();
        let fs = ctx.fs.clone();
        TeeCommand.execute(ctx).await;
        assert_eq!(fs.read_file("/out").await.unwrap(), "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_tee_no_files_still_echoes() {
        let ctx = ctx_with_stdin(vec![], "solo\n").await;
        assert_eq!(TeeCommand.execute(ctx).await.stdout, "solo\n");
    }

    #[tokio::test]
    async fn test_tee_write_failure() {
        let ctx = ctx_with_stdin(vec!["/no/dir/file"], "x").await;
        let result = TeeCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stdout, "x");
    }
}
