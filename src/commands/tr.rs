use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct TrCommand;

#[async_trait]
impl Command for TrCommand {
    fn name(&self) -> &'static str {
        "tr"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut delete = false;
        let mut squeeze = false;
        let mut complement = false;
        let mut sets: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                _ if arg.starts_with('-')
                    && arg.len() > 1
                    && arg.chars().skip(1).all(|c| "dscC".contains(c)) =>
                {
                    for c in arg.chars().skip(1) {
                        match c {
                            'd' => delete = true,
                            's' => squeeze = true,
                            'c' | 'C' => complement = true,
                            _ => {}
                        }
                    }
                }
                _ => sets.push(arg.clone()),
            }
        }
        let set1 = match sets.first() {
            Some(s) => expand_set(s),
            None => return CommandResult::error("tr: missing operand\n".to_string()),
        };
        let set2 = sets.get(1).map(|s| expand_set(s));

        let mut out = String::with_capacity(ctx.stdin.len());
        let mut last_emitted: Option<char> = None;
        for c in ctx.stdin.chars() {
            let in_set1 = set1.contains(&c) != complement;
            if delete {
                if in_set1 {
                    continue;
                }
                out.push(c);
                continue;
            }
            let mapped = if in_set1 {
                match &set2 {
                    Some(set2) if !set2.is_empty() => {
                        let idx = set1.iter().position(|x| *x == c).unwrap_or(0);
                        *set2.get(idx).unwrap_or(set2.last().unwrap_or(&c))
                    }
                    _ => c,
                }
            } else {
                c
            };
            if squeeze && in_set1 && last_emitted == Some(mapped) {
                continue;
            }
            out.push(mapped);
            last_emitted = Some(mapped);
        }
        CommandResult::success(out)
    }
}

/// Expand ranges (`a-z`), classes (`[:digit:]`), and escapes.
fn expand_set(spec: &str) -> Vec<char> {
    match spec {
        "[:alpha:]" => return ('a'..='z').chain('A'..='Z').collect(),
        "[:digit:]" => return ('0'..='9').collect(),
        "[:alnum:]" => {
            return ('a'..='z').chain('A'..='Z').chain('0'..='9').collect();
        }
        "[:lower:]" => return ('a'..='z').collect(),
        "[:upper:]" => return ('A'..='Z').collect(),
        "[:space:]" => return vec![' ', '\t', '\n', '\r', '\x0b', '\x0c'],
        "[:punct:]" => {
            return "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~".chars().collect();
        }
        _ => {}
    }
    let chars: Vec<char> = spec.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            out.push(match chars[i + 1] {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '\\' => '\\',
                other => other,
            });
            i += 2;
            continue;
        }
        if i + 2 < chars.len() && chars[i + 1] == '-' && chars[i] <= chars[i + 2] {
            let (a, b) = (chars[i] as u32, chars[i + 2] as u32);
            for v in a..=b {
                if let Some(c) = char::from_u32(v) {
                    out.push(c);
                }
            }
            i += 3;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_stdin;

    async fn run(args: Vec<&str>, stdin: &str) -> String {
        TrCommand
            .execute(ctx_with_stdin(args, stdin).await)
            .await
            .stdout
    }

    #[tokio::test]
    async fn test_tr_translate() {
        assert_eq!(run(vec!["abc", "xyz"], "aabbcc").await, "xxyyzz");
    }

    #[tokio::test]
    async fn test_tr_ranges() {
        assert_eq!(run(vec!["a-z", "A-Z"], "hello").await, "HELLO");
    }

    #[tokio::test]
    async fn test_tr_classes() {
        assert_eq!(run(vec!["[:lower:]", "[:upper:]"], "abc1").await, "ABC1");
    }

    #[tokio::test]
    async fn test_tr_delete() {
        assert_eq!(run(vec!["-d", "0-9"], "a1b2c3").await, "abc");
    }

    #[tokio::test]
    async fn test_tr_squeeze() {
        assert_eq!(run(vec!["-s", " "], "a   b  c").await, "a b c");
    }

    #[tokio::test]
    async fn test_tr_complement_delete() {
        assert_eq!(run(vec!["-cd", "0-9"], "a1b2\nc3").await, "123");
    }

    #[tokio::test]
    async fn test_tr_shorter_replacement_repeats_last() {
        assert_eq!(run(vec!["abc", "x"], "cab").await, "xxx");
    }

    #[tokio::test]
    async fn test_tr_newline_escape() {
        assert_eq!(run(vec!["\\n", " "], "a\nb\n").await, "a b ");
    }
}
