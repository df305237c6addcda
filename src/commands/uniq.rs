use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct UniqCommand;

#[async_trait]
impl Command for UniqCommand {
    fn name(&self) -> &'static str {
        "uniq"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut count = false;
        let mut only_dupes = false;
        let mut only_unique = false;
        let mut ignore_case = false;
        let mut files: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-c" => count = true,
                "-d" => only_dupes = true,
                "-u" => only_unique = true,
                "-i" => ignore_case = true,
                "--" => {}
                "-" => files.push("-".to_string()),
                _ if arg.starts_with('-') => {
                    return CommandResult::error(format!(
                        "uniq: invalid option -- '{}'\n",
                        arg.trim_start_matches('-')
                    ))
                }
                _ => files.push(arg.clone()),
            }
        }
        let content = match files.first().map(|s| s.as_str()) {
            None | Some("-") => ctx.stdin.clone(),
            Some(file) => match ctx.fs.read_file(&ctx.resolve(file)).await {
                Ok(c) => c,
                Err(_) => {
                    return CommandResult::error(format!(
                        "uniq: {}: No such file or directory\n",
                        file
                    ))
                }
            },
        };

        let mut groups: Vec<(String, usize)> = Vec::new();
        for line in content.lines() {
            let same = groups.last().map(|(prev, _)| {
                if ignore_case {
                    prev.to_lowercase() == line.to_lowercase()
                } else {
                    prev == line
                }
            });
            match same {
                Some(true) => {
                    if let Some(last) = groups.last_mut() {
                        last.1 += 1;
                    }
                }
                _ => groups.push((line.to_string(), 1)),
            }
        }

        let mut out = String::new();
        for (line, n) in groups {
            if only_dupes && n < 2 {
                continue;
            }
            if only_unique && n > 1 {
                continue;
            }
            if count {
                out.push_str(&format!("{:>7} {}\n", n, line));
            } else {
                out.push_str(&line);
                out.push('\n');
            }
        }
        CommandResult::success(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_stdin;

    async fn run(args: Vec<&str>, stdin: &str) -> String {
        UniqCommand
            .execute(ctx_with_stdin(args, stdin).await)
            .await
            .stdout
    }

    #[tokio::test]
    async fn test_uniq_adjacent_only() {
        assert_eq!(run(vec![], "a\na\nb\na\n").await, "a\nb\na\n");
    }

    #[tokio::test]
    async fn test_uniq_count() {
        assert_eq!(run(vec!["-c"], "a\na\nb\n").await, "      2 a\n      1 b\n");
    }

    #[tokio::test]
    async fn test_uniq_dupes_and_unique() {
        assert_eq!(run(vec!["-d"], "a\na\nb\n").await, "a\n");
        assert_eq!(run(vec!["-u"], "a\na\nb\n").await, "b\n");
    }

    #[tokio::test]
    async fn test_uniq_ignore_case() {
        assert_eq!(run(vec!["-i"], "A\na\n").await, "A\n");
    }
}
