use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct CatCommand;

#[async_trait]
impl Command for CatCommand {
    fn name(&self) -> &'static str {
        "cat"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut number = false;
        let mut number_nonblank = false;
        let mut squeeze = false;
        let mut show_ends = false;
        let mut files: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-n" | "--number" => number = true,
                "-b" | "--number-nonblank" => number_nonblank = true,
                "-s" | "--squeeze-blank" => squeeze = true,
                "-E" | "--show-ends" => show_ends = true,
                "-A" | "-T" | "-v" | "--" => {}
                "-" => files.push("-".to_string()),
                _ if arg.starts_with('-') => {
                    return CommandResult::error(format!(
                        "cat: invalid option -- '{}'\n",
                        arg.trim_start_matches('-')
                    ))
                }
                _ => files.push(arg.clone()),
            }
        }
        if files.is_empty() {
            files.push("-".to_string());
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        let mut line_number = 1usize;
        for file in &files {
            let content = if file == "-" {
                ctx.stdin.clone()
            } else {
                match ctx.fs.read_file(&ctx.resolve(file)).await {
                    Ok(c) => c,
                    Err(e) => {
                        let reason = match e.code() {
                            "EISDIR" => "Is a directory",
                            _ => "No such file or directory",
                        };
                        stderr.push_str(&format!("cat: {}: {}\n", file, reason));
                        exit_code = 1;
                        continue;
                    }
                }
            };
            let content = if squeeze { squeeze_blank(&content) } else { content };
            if number || number_nonblank || show_ends {
                stdout.push_str(&decorate(
                    &content,
                    &mut line_number,
                    number || number_nonblank,
                    number_nonblank,
                    show_ends,
                ));
            } else {
                stdout.push_str(&content);
            }
        }
        CommandResult::with_exit_code(stdout, stderr, exit_code)
    }
}

fn squeeze_blank(content: &str) -> String {
    let mut out = String::new();
    let mut blanks = 0;
    for line in content.split_inclusive('\n') {
        if line == "\n" {
            blanks += 1;
            if blanks > 1 {
                continue;
            }
        } else {
            blanks = 0;
        }
        out.push_str(line);
    }
    out
}

fn decorate(
    content: &str,
    next_number: &mut usize,
    number: bool,
    nonblank_only: bool,
    show_ends: bool,
) -> String {
    let mut out = String::new();
    for line in content.split_inclusive('\n') {
        let (body, had_newline) = match line.strip_suffix('\n') {
            Some(b) => (b, true),
            None => (line, false),
        };
        let numbered = number && !(nonblank_only && body.is_empty());
        if numbered {
            out.push_str(&format!("{:>6}\t", next_number));
            *next_number += 1;
        }
        out.push_str(body);
        if had_newline {
            if show_ends {
                out.push('$');
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::{ctx_with_files, ctx_with_stdin};

    #[tokio::test]
    async fn test_cat_file() {
        let ctx = ctx_with_files(vec!["/a.txt"], vec![("/a.txt", "hello\n")]).await;
        let result = CatCommand.execute(ctx).await;
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_cat_concatenates() {
        let ctx =
            ctx_with_files(vec!["/a", "/b"], vec![("/a", "one\n"), ("/b", "two\n")]).await;
        assert_eq!(CatCommand.execute(ctx).await.stdout, "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_cat_stdin_dash() {
        let ctx = ctx_with_stdin(vec!["-"], "piped\n").await;
        assert_eq!(CatCommand.execute(ctx).await.stdout, "piped\n");
    }

    #[tokio::test]
    async fn test_cat_default_stdin() {
        let ctx = ctx_with_stdin(vec![], "implicit\n").await;
        assert_eq!(CatCommand.execute(ctx).await.stdout, "implicit\n");
    }

    #[tokio::test]
    async fn test_cat_missing_file() {
        let ctx = ctx_with_files(vec!["/gone", "/here"], vec![("/here", "x")]).await;
        let result = CatCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("No such file or directory"));
        assert_eq!(result.stdout, "x");
    }

    #[tokio::test]
    async fn test_cat_numbering() {
        let ctx = ctx_with_files(vec!["-n", "/f"], vec![("/f", "a\nb\n")]).await;
        assert_eq!(CatCommand.execute(ctx).await.stdout, "     1\ta\n     2\tb\n");
    }

    #[tokio::test]
    async fn test_cat_number_nonblank() {
        let ctx = ctx_with_files(vec!["-b", "/f"], vec![("/f", "a\n\nb\n")]).await;
        assert_eq!(
            CatCommand.execute(ctx).await.stdout,
            "     1\ta\n\n     2\tb\n"
        );
    }

    #[tokio::test]
    async fn test_cat_squeeze() {
        let ctx = ctx_with_files(vec!["-s", "/f"], vec![("/f", "a\n\n\n\nb\n")]).await;
        assert_eq!(CatCommand.execute(ctx).await.stdout, "a\n\nb\n");
    }

    #[tokio::test]
    async fn test_cat_show_ends() {
        let ctx = ctx_with_files(vec!["-E", "/f"], vec![("/f", "a\n")]).await;
        assert_eq!(CatCommand.execute(ctx).await.stdout, "a$\n");
    }
}
