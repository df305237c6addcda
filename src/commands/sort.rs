use async_trait::async_trait;
use std::cmp::Ordering;

use super::{Command, CommandContext, CommandResult};

pub struct SortCommand;

#[async_trait]
impl Command for SortCommand {
    fn name(&self) -> &'static str {
        "sort"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut numeric = false;
        let mut reverse = false;
        let mut unique = false;
        let mut ignore_case = false;
        let mut field: Option<usize> = None;
        let mut separator: Option<char> = None;
        let mut files: Vec<String> = Vec::new();
        let mut i = 0;
        while i < ctx.args.len() {
            let arg = &ctx.args[i];
            match arg.as_str() {
                "-n" => numeric = true,
                "-r" => reverse = true,
                "-u" => unique = true,
                "-f" => ignore_case = true,
                "-k" => {
                    i += 1;
                    field = ctx.args.get(i).and_then(|k| {
                        k.split(',').next().and_then(|n| n.parse::<usize>().ok())
                    });
                }
                "-t" => {
                    i += 1;
                    separator = ctx.args.get(i).and_then(|s| s.chars().next());
                }
                "--" => {}
                "-" => files.push("-".to_string()),
                _ if arg.starts_with("-k") => {
                    field = arg[2..].split(',').next().and_then(|n| n.parse().ok());
                }
                _ if arg.starts_with("-t") => {
                    separator = arg[2..].chars().next();
                }
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    for c in arg.chars().skip(1) {
                        match c {
                            'n' => numeric = true,
                            'r' => reverse = true,
                            'u' => unique = true,
                            'f' => ignore_case = true,
                            _ => {
                                return CommandResult::error(format!(
                                    "sort: invalid option -- '{}'\n",
                                    c
                                ))
                            }
                        }
                    }
                }
                _ => files.push(arg.clone()),
            }
            i += 1;
        }
        if files.is_empty() {
            files.push("-".to_string());
        }

        let mut lines: Vec<String> = Vec::new();
        for file in &files {
            let content = if file == "-" {
                ctx.stdin.clone()
            } else {
                match ctx.fs.read_file(&ctx.resolve(file)).await {
                    Ok(c) => c,
                    Err(_) => {
                        return CommandResult::with_exit_code(
                            String::new(),
                            format!("sort: cannot read: {}: No such file or directory\n", file),
                            2,
                        )
                    }
                }
            };
            lines.extend(content.lines().map(str::to_string));
        }

        let key = |line: &String| -> String {
            let picked = match field {
                Some(k) if k >= 1 => match separator {
                    Some(sep) => line.split(sep).nth(k - 1).unwrap_or("").to_string(),
                    None => line.split_whitespace().nth(k - 1).unwrap_or("").to_string(),
                },
                _ => line.clone(),
            };
            if ignore_case {
                picked.to_lowercase()
            } else {
                picked
            }
        };

        lines.sort_by(|a, b| {
            let (ka, kb) = (key(a), key(b));
            let ord = if numeric {
                let na = leading_number(&ka);
                let nb = leading_number(&kb);
                na.partial_cmp(&nb).unwrap_or(Ordering::Equal)
            } else {
                ka.cmp(&kb)
            };
            if ord == Ordering::Equal {
                a.cmp(b)
            } else {
                ord
            }
        });
        if reverse {
            lines.reverse();
        }
        if unique {
            lines.dedup_by(|a, b| key(a) == key(b));
        }

        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        CommandResult::success(out)
    }
}

fn leading_number(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let mut end = 0;
    for (i, c) in trimmed.char_indices() {
        if c.is_ascii_digit() || c == '-' && i == 0 || c == '.' || c == '+' && i == 0 {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    trimmed[..end].parse().unwrap_or(0.0)
}
