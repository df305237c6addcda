use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct EnvCommand;

#[async_trait]
impl Command for EnvCommand {
    fn name(&self) -> &'static str {
        "env"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        // VAR=value prefixes override; a remaining command re-enters the
        // shell with those overrides applied.
        let mut overrides: Vec<(String, String)> = Vec::new();
        let mut rest = Vec::new();
        let mut in_prefix = true;
        for arg in &ctx.args {
            if in_prefix {
                if arg == "-i" || arg == "-" {
                    continue;
                }
                if let Some((name, value)) = arg.split_once('=') {
                    if !name.is_empty() && !name.contains('/') {
                        overrides.push((name.to_string(), value.to_string()));
                        continue;
                    }
                }
                in_prefix = false;
            }
            rest.push(arg.clone());
        }
        if rest.is_empty() {
            let mut entries: Vec<(String, String)> =
                ctx.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            entries.extend(overrides);
            entries.sort();
            let out: String = entries
                .iter()
                .map(|(k, v)| format!("{}={}\n", k, v))
                .collect();
            return CommandResult::success(out);
        }
        let exec = match &ctx.exec {
            Some(exec) => exec.clone(),
            None => {
                return CommandResult::with_exit_code(
                    String::new(),
                    format!("env: '{}': No such file or directory\n", rest[0]),
                    127,
                )
            }
        };
        let prefix: String = overrides
            .iter()
            .map(|(k, v)| format!("export {}='{}'; ", k, v.replace('\'', "'\\''")))
            .collect();
        let script = format!(
            "{}{}",
            prefix,
            rest.iter()
                .map(|a| shell_quote(a))
                .collect::<Vec<_>>()
                .join(" ")
        );
        let result = exec(script, ctx.stdin.clone()).await;
        CommandResult::with_exit_code(result.stdout, result.stderr, result.exit_code)
    }
}

fn shell_quote(s: &str) -> String {
    if s.chars().all(|c| c.is_ascii_alphanumeric() || "_-./=".contains(c)) && !s.is_empty() {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_env_lists_sorted() {
        let mut ctx = ctx_with_files(vec![], vec![]).await;
        ctx.env.insert("B".into(), "2".into());
        ctx.env.insert("A".into(), "1".into());
        let out = EnvCommand.execute(ctx).await.stdout;
        assert_eq!(out, "A=1\nB=2\n");
    }

    #[tokio::test]
    async fn test_env_with_override() {
        let ctx = ctx_with_files(vec!["X=1"], vec![]).await;
        let out = EnvCommand.execute(ctx).await.stdout;
        assert!(out.contains("X=1"));
    }

    #[tokio::test]
    async fn test_env_command_without_exec_fails() {
        let ctx = ctx_with_files(vec!["somecmd"], vec![]).await;
        assert_eq!(EnvCommand.execute(ctx).await.exit_code, 127);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "plain");
        assert_eq!(shell_quote("a b"), "'a b'");
    }
}
