use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

/// Self-invocation: scripts can call `just-bash -c '...'` and get a
/// nested shell sharing the same filesystem.
pub struct JustBashCommand;

#[async_trait]
impl Command for JustBashCommand {
    fn name(&self) -> &'static str {
        "just-bash"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut inline: Option<String> = None;
        let mut script_file: Option<String> = None;
        let mut i = 0;
        while i < ctx.args.len() {
            match ctx.args[i].as_str() {
                "-c" => {
                    i += 1;
                    inline = ctx.args.get(i).cloned();
                }
                "-e" | "--errexit" => {}
                _ if script_file.is_none() && !ctx.args[i].starts_with('-') => {
                    script_file = Some(ctx.args[i].clone());
                }
                _ => {}
            }
            i += 1;
        }
        let errexit = ctx.args.iter().any(|a| a == "-e" || a == "--errexit");
        let script = match inline {
            Some(s) => s,
            None => match script_file {
                Some(file) => match ctx.fs.read_file(&ctx.resolve(&file)).await {
                    Ok(content) => content,
                    Err(_) => {
                        return CommandResult::with_exit_code(
                            String::new(),
                            format!("just-bash: {}: No such file or directory\n", file),
                            127,
                        )
                    }
                },
                None => {
                    return CommandResult::error(
                        "just-bash: no script provided (use -c or a script file)\n".to_string(),
                    )
                }
            },
        };
        let exec = match &ctx.exec {
            Some(exec) => exec.clone(),
            None => {
                return CommandResult::error(
                    "just-bash: nested execution unavailable\n".to_string(),
                )
            }
        };
        let script = if errexit {
            format!("set -e\n{}", script)
        } else {
            script
        };
        exec(script, ctx.stdin.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_just_bash_runs_inline_script() {
        let mut ctx = ctx_with_files(vec!["-c", "echo nested"], vec![]).await;
        ctx.exec = Some(Arc::new(|script, _stdin| {
            Box::pin(async move { CommandResult::success(format!("ran: {}", script)) })
        }));
        let result = JustBashCommand.execute(ctx).await;
        assert_eq!(result.stdout, "ran: echo nested");
    }

    #[tokio::test]
    async fn test_just_bash_script_file() {
        let mut ctx = ctx_with_files(vec!["/s.sh"], vec![("/s.sh", "echo from-file")]).await;
        ctx.exec = Some(Arc::new(|script, _stdin| {
            Box::pin(async move { CommandResult::success(script) })
        }));
        assert_eq!(JustBashCommand.execute(ctx).await.stdout, "echo from-file");
    }

    #[tokio::test]
    async fn test_just_bash_errexit_prepends() {
        let mut ctx = ctx_with_files(vec!["-e", "-c", "false"], vec![]).await;
        ctx.exec = Some(Arc::new(|script, _stdin| {
            Box::pin(async move { CommandResult::success(script) })
        }));
        assert!(JustBashCommand
            .execute(ctx)
            .await
            .stdout
            .starts_with("set -e\n"));
    }

    #[tokio::test]
    async fn test_just_bash_missing_script() {
        let ctx = ctx_with_files(vec![], vec![]).await;
        assert_eq!(JustBashCommand.execute(ctx).await.exit_code, 1);
    }
}
