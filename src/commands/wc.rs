use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct WcCommand;

#[async_trait]
impl Command for WcCommand {
    fn name(&self) -> &'static str {
        "wc"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut show_lines = false;
        let mut show_words = false;
        let mut show_bytes = false;
        let mut show_chars = false;
        let mut files: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-l" => show_lines = true,
                "-w" => show_words = true,
                "-c" => show_bytes = true,
                "-m" => show_chars = true,
                "--" => {}
                "-" => files.push("-".to_string()),
                _ if arg.starts_with('-') => {
                    for c in arg.chars().skip(1) {
                        match c {
                            'l' => show_lines = true,
                            'w' => show_words = true,
                            'c' => show_bytes = true,
                            'm' => show_chars = true,
                            _ => {
                                return CommandResult::error(format!(
                                    "wc: invalid option -- '{}'\n",
                                    c
                                ))
                            }
                        }
                    }
                }
                _ => files.push(arg.clone()),
            }
        }
        if !show_lines && !show_words && !show_bytes && !show_chars {
            show_lines = true;
            show_words = true;
            show_bytes = true;
        }
        if files.is_empty() {
            files.push("-".to_string());
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        let mut totals = (0usize, 0usize, 0usize);
        let many = files.len() > 1;
        for file in &files {
            let content = if file == "-" {
                ctx.stdin.clone()
            } else {
                match ctx.fs.read_file(&ctx.resolve(file)).await {
                    Ok(c) => c,
                    Err(_) => {
                        stderr
                            .push_str(&format!("wc: {}: No such file or directory\n", file));
                        exit_code = 1;
                        continue;
                    }
                }
            };
            let lines = content.matches('\n').count();
            let words = content.split_whitespace().count();
            let bytes = if show_chars {
                content.chars().count()
            } else {
                content.len()
            };
            totals.0 += lines;
            totals.1 += words;
            totals.2 += bytes;
            stdout.push_str(&row(
                lines, words, bytes, show_lines, show_words, show_bytes || show_chars,
            ));
            if file != "-" {
                stdout.push_str(&format!(" {}", file));
            }
            stdout.push('\n');
        }
        if many {
            stdout.push_str(&row(
                totals.0,
                totals.1,
                totals.2,
                show_lines,
                show_words,
                show_bytes || show_chars,
            ));
            stdout.push_str(" total\n");
        }
        CommandResult::with_exit_code(stdout, stderr, exit_code)
    }
}

fn row(
    lines: usize,
    words: usize,
    bytes: usize,
    show_lines: bool,
    show_words: bool,
    show_bytes: bool,
) -> String {
    let mut cells = Vec::new();
    if show_lines {
        cells.push(lines);
    }
    if show_words {
        cells.push(words);
    }
    if show_bytes {
        cells.push(bytes);
    }
    if cells.len() == 1 {
        return cells[0].to_string();
    }
    cells
        .iter()
        .map(|n| format!("{:>7}", n))
        .collect::<Vec<_>>()
        .join("")
}
