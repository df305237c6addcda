use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct CutCommand;

#[async_trait]
impl Command for CutCommand {
    fn name(&self) -> &'static str {
        "cut"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut fields: Option<String> = None;
        let mut chars: Option<String> = None;
        let mut delim = '\t';
        let mut files: Vec<String> = Vec::new();
        let mut i = 0;
        while i < ctx.args.len() {
            let arg = &ctx.args[i];
            match arg.as_str() {
                "-f" => {
                    i += 1;
                    fields = ctx.args.get(i).cloned();
                }
                "-c" | "-b" => {
                    i += 1;
                    chars = ctx.args.get(i).cloned();
                }
                "-d" => {
                    i += 1;
                    delim = ctx
                        .args
                        .get(i)
                        .and_then(|d| d.chars().next())
                        .unwrap_or('\t');
                }
                "--" => {}
                "-" => files.push("-".to_string()),
                _ if arg.starts_with("-f") => fields = Some(arg[2..].to_string()),
                _ if arg.starts_with("-c") || arg.starts_with("-b") => {
                    chars = Some(arg[2..].to_string())
                }
                _ if arg.starts_with("-d") => delim = arg[2..].chars().next().unwrap_or('\t'),
                _ => files.push(arg.clone()),
            }
            i += 1;
        }
        let spec = match (&fields, &chars) {
            (None, None) => {
                return CommandResult::error(
                    "cut: you must specify a list of bytes, characters, or fields\n".to_string(),
                )
            }
            (Some(f), _) => f.clone(),
            (None, Some(c)) => c.clone(),
        };
        let ranges = match parse_ranges(&spec) {
            Some(r) => r,
            None => {
                return CommandResult::error(format!("cut: invalid field value '{}'\n", spec))
            }
        };

        let content = match files.first().map(|s| s.as_str()) {
            None | Some("-") => ctx.stdin.clone(),
            Some(file) => match ctx.fs.read_file(&ctx.resolve(file)).await {
                Ok(c) => c,
                Err(_) => {
                    return CommandResult::error(format!(
                        "cut: {}: No such file or directory\n",
                        file
                    ))
                }
            },
        };

        let mut out = String::new();
        for line in content.lines() {
            if fields.is_some() {
                // Lines without the delimiter pass through whole.
                if !line.contains(delim) {
                    out.push_str(line);
                    out.push('\n');
                    continue;
                }
                let parts: Vec<&str> = line.split(delim).collect();
                let picked: Vec<&str> = pick(&parts, &ranges);
                out.push_str(&picked.join(&delim.to_string()));
            } else {
                let cs: Vec<char> = line.chars().collect();
                let refs: Vec<String> = cs.iter().map(|c| c.to_string()).collect();
                let parts: Vec<&str> = refs.iter().map(|s| s.as_str()).collect();
                let picked: Vec<&str> = pick(&parts, &ranges);
                out.push_str(&picked.concat());
            }
            out.push('\n');
        }
        CommandResult::success(out)
    }
}

/// `1,3-5,7-` style lists, one-based inclusive.
fn parse_ranges(spec: &str) -> Option<Vec<(usize, usize)>> {
    let mut ranges = Vec::new();
    for part in spec.split(',') {
        if let Some((a, b)) = part.split_once('-') {
            let start = if a.is_empty() { 1 } else { a.parse().ok()? };
            let end = if b.is_empty() { usize::MAX } else { b.parse().ok()? };
            if start == 0 {
                return None;
            }
            ranges.push((start, end));
        } else {
            let n: usize = part.parse().ok()?;
            if n == 0 {
                return None;
            }
            ranges.push((n, n));
        }
    }
    Some(ranges)
}

fn pick<'v>(parts: &[&'v str], ranges: &[(usize, usize)]) -> Vec<&'v str> {
    let mut picked = Vec::new();
    for (index, part) in parts.iter().enumerate() {
        let position = index + 1;
        if ranges.iter().any(|(a, b)| position >= *a && position <= *b) {
            picked.push(*part);
        }
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_stdin;

    async fn run(args: Vec<&str>, stdin: &str) -> String {
        CutCommand
            .execute(ctx_with_stdin(args, stdin).await)
            .await
            .stdout
    }

    #[tokio::test]
    async fn test_cut_field() {
        assert_eq!(run(vec!["-d", ":", "-f", "2"], "a:b:c\n").await, "b\n");
    }

    #[tokio::test]
    async fn test_cut_field_range() {
        assert_eq!(run(vec!["-d", ",", "-f", "1,3"], "a,b,c,d\n").await, "a,c\n");
        assert_eq!(run(vec!["-d", ",", "-f", "2-"], "a,b,c\n").await, "b,c\n");
        assert_eq!(run(vec!["-d", ",", "-f", "-2"], "a,b,c\n").await, "a,b\n");
    }

    #[tokio::test]
    async fn test_cut_no_delimiter_passthrough() {
        assert_eq!(run(vec!["-d", ":", "-f", "2"], "plain\n").await, "plain\n");
    }

    #[tokio::test]
    async fn test_cut_chars() {
        assert_eq!(run(vec!["-c", "1-3"], "abcdef\n").await, "abc\n");
        assert_eq!(run(vec!["-c", "2,4"], "abcdef\n").await, "bd\n");
    }

    #[tokio::test]
    async fn test_cut_requires_spec() {
        let result = CutCommand.execute(ctx_with_stdin(vec![], "x\n").await).await;
        assert_eq!(result.exit_code, 1);
    }
}
