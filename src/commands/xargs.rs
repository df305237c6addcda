use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct XargsCommand;

#[async_trait]
impl Command for XargsCommand {
    fn name(&self) -> &'static str {
        "xargs"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut null_sep = false;
        let mut per_invocation: Option<usize> = None;
        let mut replace: Option<String> = None;
        let mut no_run_if_empty = false;
        let mut command: Vec<String> = Vec::new();
        let mut i = 0;
        while i < ctx.args.len() {
            let arg = &ctx.args[i];
            if !command.is_empty() {
                command.push(arg.clone());
                i += 1;
                continue;
            }
            match arg.as_str() {
                "-0" | "--null" => null_sep = true,
                "-n" => {
                    i += 1;
                    per_invocation = ctx.args.get(i).and_then(|n| n.parse().ok());
                }
                "-I" => {
                    i += 1;
                    replace = ctx.args.get(i).cloned();
                }
                "-r" | "--no-run-if-empty" => no_run_if_empty = true,
                "--" => {}
                _ => command.push(arg.clone()),
            }
            i += 1;
        }
        if command.is_empty() {
            command.push("echo".to_string());
        }
        let exec = match &ctx.exec {
            Some(exec) => exec.clone(),
            None => {
                return CommandResult::error("xargs: cannot run commands here\n".to_string())
            }
        };

        let items: Vec<String> = if null_sep {
            ctx.stdin
                .split('\0')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            ctx.stdin
                .split_whitespace()
                .map(str::to_string)
                .collect()
        };
        if items.is_empty() && no_run_if_empty {
            return CommandResult::success(String::new());
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;

        let run_one = |argv: Vec<String>| {
            let script = argv
                .iter()
                .map(|a| quote(a))
                .collect::<Vec<_>>()
                .join(" ");
            exec(script, String::new())
        };

        if let Some(placeholder) = replace {
            // One invocation per item, substituting the placeholder.
            for item in &items {
                let argv: Vec<String> = command
                    .iter()
                    .map(|part| part.replace(&placeholder, item))
                    .collect();
                let result = run_one(argv).await;
                stdout.push_str(&result.stdout);
                stderr.push_str(&result.stderr);
                if result.exit_code != 0 {
                    exit_code = 123;
                }
            }
        } else {
            let chunk = per_invocation.unwrap_or(usize::MAX).max(1);
            let mut start = 0;
            loop {
                let end = (start + chunk).min(items.len());
                let mut argv = command.clone();
                argv.extend(items[start..end].iter().cloned());
                let result = run_one(argv).await;
                stdout.push_str(&result.stdout);
                stderr.push_str(&result.stderr);
                if result.exit_code != 0 {
                    exit_code = 123;
                }
                if end >= items.len() {
                    break;
                }
                start = end;
            }
        }
        CommandResult::with_exit_code(stdout, stderr, exit_code)
    }
}

fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:%@+,".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_stdin;
    use std::sync::{Arc, Mutex};

    fn recording_exec() -> (super::super::ExecFn, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = log.clone();
        let exec: super::super::ExecFn = Arc::new(move |script, _stdin| {
            let log = log2.clone();
            Box::pin(async move {
                log.lock().unwrap().push(script.clone());
                CommandResult::success(format!("<{}>", script))
            })
        });
        (exec, log)
    }

    #[tokio::test]
    async fn test_xargs_single_batch() {
        let mut ctx = ctx_with_stdin(vec!["echo"], "a b\nc\n").await;
        let (exec, log) = recording_exec();
        ctx.exec = Some(exec);
        let result = XargsCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(log.lock().unwrap().as_slice(), &["echo a b c".to_string()]);
    }

    #[tokio::test]
    async fn test_xargs_chunks() {
        let mut ctx = ctx_with_stdin(vec!["-n", "2", "echo"], "1 2 3 4 5").await;
        let (exec, log) = recording_exec();
        ctx.exec = Some(exec);
        XargsCommand.execute(ctx).await;
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &["echo 1 2".to_string(), "echo 3 4".to_string(), "echo 5".to_string()]
        );
    }

    #[tokio::test]
    async fn test_xargs_replace() {
        let mut ctx = ctx_with_stdin(vec!["-I", "{}", "mv", "{}", "{}.bak"], "a\nb\n").await;
        let (exec, log) = recording_exec();
        ctx.exec = Some(exec);
        XargsCommand.execute(ctx).await;
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &["mv a a.bak".to_string(), "mv b b.bak".to_string()]
        );
    }

    #[tokio::test]
    async fn test_xargs_null_separator() {
        let mut ctx = ctx_with_stdin(vec!["-0", "echo"], "a b\0c\0").await;
        let (exec, log) = recording_exec();
        ctx.exec = Some(exec);
        XargsCommand.execute(ctx).await;
        assert_eq!(log.lock().unwrap().as_slice(), &["echo 'a b' c".to_string()]);
    }

    #[tokio::test]
    async fn test_xargs_no_run_if_empty() {
        let mut ctx = ctx_with_stdin(vec!["-r", "echo"], "").await;
        let (exec, log) = recording_exec();
        ctx.exec = Some(exec);
        XargsCommand.execute(ctx).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_xargs_without_exec() {
        let ctx = ctx_with_stdin(vec!["echo"], "x").await;
        assert_eq!(XargsCommand.execute(ctx).await.exit_code, 1);
    }
}
