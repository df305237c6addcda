use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct HeadCommand;

#[async_trait]
impl Command for HeadCommand {
    fn name(&self) -> &'static str {
        "head"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        run_head_tail(ctx, true).await
    }
}

pub(super) async fn run_head_tail(ctx: CommandContext, head: bool) -> CommandResult {
    let tool = if head { "head" } else { "tail" };
    let mut lines: i64 = 10;
    let mut bytes: Option<i64> = None;
    let mut files: Vec<String> = Vec::new();
    let mut i = 0;
    while i < ctx.args.len() {
        let arg = &ctx.args[i];
        match arg.as_str() {
            "-n" | "--lines" => {
                i += 1;
                match ctx.args.get(i).and_then(|v| parse_count(v)) {
                    Some(n) => lines = n,
                    None => {
                        return CommandResult::error(format!(
                            "{}: invalid number of lines\n",
                            tool
                        ))
                    }
                }
            }
            "-c" | "--bytes" => {
                i += 1;
                match ctx.args.get(i).and_then(|v| parse_count(v)) {
                    Some(n) => bytes = Some(n),
                    None => {
                        return CommandResult::error(format!(
                            "{}: invalid number of bytes\n",
                            tool
                        ))
                    }
                }
            }
            "-q" | "--" => {}
            _ if arg.starts_with("-n") => match parse_count(&arg[2..]) {
                Some(n) => lines = n,
                None => {
                    return CommandResult::error(format!("{}: invalid number of lines\n", tool))
                }
            },
            _ if arg.len() > 1
                && arg.starts_with('-')
                && arg[1..].chars().all(|c| c.is_ascii_digit()) =>
            {
                lines = arg[1..].parse().unwrap_or(10);
            }
            _ => files.push(arg.clone()),
        }
        i += 1;
    }
    if files.is_empty() {
        files.push("-".to_string());
    }
    let many = files.len() > 1;
    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut exit_code = 0;
    for (index, file) in files.iter().enumerate() {
        let content = if file == "-" {
            ctx.stdin.clone()
        } else {
            match ctx.fs.read_file(&ctx.resolve(file)).await {
                Ok(c) => c,
                Err(_) => {
                    stderr.push_str(&format!(
                        "{}: cannot open '{}' for reading: No such file or directory\n",
                        tool, file
                    ));
                    exit_code = 1;
                    continue;
                }
            }
        };
        if many {
            if index > 0 {
                stdout.push('\n');
            }
            let label = if file == "-" { "standard input" } else { file };
            stdout.push_str(&format!("==> {} <==\n", label));
        }
        stdout.push_str(&clip(&content, lines, bytes, head));
    }
    CommandResult::with_exit_code(stdout, stderr, exit_code)
}

fn parse_count(text: &str) -> Option<i64> {
    let (number, multiplier) = match text.chars().last() {
        Some('k') => (&text[..text.len() - 1], 1024),
        Some('M') => (&text[..text.len() - 1], 1024 * 1024),
        _ => (text, 1),
    };
    number.parse::<i64>().ok().map(|n| n * multiplier)
}

fn clip(content: &str, lines: i64, bytes: Option<i64>, head: bool) -> String {
    if let Some(n) = bytes {
        let b = content.as_bytes();
        let n = n.unsigned_abs() as usize;
        let slice = if head {
            &b[..n.min(b.len())]
        } else {
            &b[b.len().saturating_sub(n)..]
        };
        return String::from_utf8_lossy(slice).to_string();
    }
    let all: Vec<&str> = content.split_inclusive('\n').collect();
    let n = lines.unsigned_abs() as usize;
    let picked: Vec<&str> = if head {
        if lines < 0 {
            // head -n -N prints all but the last N lines.
            all[..all.len().saturating_sub(n)].to_vec()
        } else {
            all.iter().take(n).copied().collect()
        }
    } else if lines < 0 {
        all.iter().skip(n).copied().collect()
    } else {
        all[all.len().saturating_sub(n)..].to_vec()
    };
    picked.concat()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::{ctx_with_files, ctx_with_stdin};

    #[tokio::test]
    async fn test_head_default_ten() {
        let content: String = (1..=15).map(|i| format!("{}\n", i)).collect();
        let ctx = ctx_with_files(vec!["/f"], vec![("/f", content.as_str())]).await;
        let out = HeadCommand.execute(ctx).await.stdout;
        assert_eq!(out.lines().count(), 10);
        assert!(out.starts_with("1\n"));
    }

    #[tokio::test]
    async fn test_head_n() {
        let ctx = ctx_with_files(vec!["-n", "2", "/f"], vec![("/f", "a\nb\nc\n")]).await;
        assert_eq!(HeadCommand.execute(ctx).await.stdout, "a\nb\n");
    }

    #[tokio::test]
    async fn test_head_dash_number() {
        let ctx = ctx_with_files(vec!["-1", "/f"], vec![("/f", "a\nb\n")]).await;
        assert_eq!(HeadCommand.execute(ctx).await.stdout, "a\n");
    }

    #[tokio::test]
    async fn test_head_bytes() {
        let ctx = ctx_with_files(vec!["-c", "3", "/f"], vec![("/f", "abcdef")]).await;
        assert_eq!(HeadCommand.execute(ctx).await.stdout, "abc");
    }

    #[tokio::test]
    async fn test_head_stdin() {
        let ctx = ctx_with_stdin(vec!["-n", "1"], "x\ny\n").await;
        assert_eq!(HeadCommand.execute(ctx).await.stdout, "x\n");
    }

    #[tokio::test]
    async fn test_head_multiple_files_headers() {
        let ctx = ctx_with_files(vec!["/a", "/b"], vec![("/a", "1\n"), ("/b", "2\n")]).await;
        let out = HeadCommand.execute(ctx).await.stdout;
        assert!(out.contains("==> /a <=="));
        assert!(out.contains("==> /b <=="));
    }

    #[tokio::test]
    async fn test_head_negative_lines() {
        let ctx = ctx_with_files(vec!["-n", "-1", "/f"], vec![("/f", "a\nb\nc\n")]).await;
        assert_eq!(HeadCommand.execute(ctx).await.stdout, "a\nb\n");
    }

    #[tokio::test]
    async fn test_head_missing_file() {
        let ctx = ctx_with_files(vec!["/gone"], vec![]).await;
        assert_eq!(HeadCommand.execute(ctx).await.exit_code, 1);
    }
}
