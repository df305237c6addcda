use async_trait::async_trait;
use regex_lite::Regex;

use super::{Command, CommandContext, CommandResult};
use crate::vfs::path as vpath;

/// Which dialect the registered name selects. Basic mode escapes the
/// ERE-only metacharacters so `a+` matches literally, the way BRE does
/// for the constructs scripts actually use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Basic,
    Extended,
    Fixed,
    Ripgrep,
}

pub struct GrepCommand {
    name: &'static str,
    dialect: Dialect,
}

impl GrepCommand {
    pub fn basic() -> Self {
        Self { name: "grep", dialect: Dialect::Basic }
    }

    pub fn extended() -> Self {
        Self { name: "egrep", dialect: Dialect::Extended }
    }

    pub fn fixed() -> Self {
        Self { name: "fgrep", dialect: Dialect::Fixed }
    }

    pub fn ripgrep() -> Self {
        Self { name: "rg", dialect: Dialect::Ripgrep }
    }
}

#[derive(Default)]
struct Options {
    ignore_case: bool,
    invert: bool,
    count: bool,
    files_with_matches: bool,
    line_numbers: bool,
    quiet: bool,
    recursive: bool,
    word: bool,
    only_matching: bool,
    fixed: bool,
    extended: bool,
    max_count: Option<usize>,
}

#[async_trait]
impl Command for GrepCommand {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut options = Options {
            fixed: self.dialect == Dialect::Fixed,
            extended: matches!(self.dialect, Dialect::Extended | Dialect::Ripgrep),
            // rg recurses and prints line numbers by default.
            recursive: self.dialect == Dialect::Ripgrep,
            line_numbers: self.dialect == Dialect::Ripgrep,
            ..Default::default()
        };
        let mut pattern: Option<String> = None;
        let mut files: Vec<String> = Vec::new();
        let mut i = 0;
        while i < ctx.args.len() {
            let arg = &ctx.args[i];
            match arg.as_str() {
                "-i" | "--ignore-case" => options.ignore_case = true,
                "-v" | "--invert-match" => options.invert = true,
                "-c" | "--count" => options.count = true,
                "-l" | "--files-with-matches" => options.files_with_matches = true,
                "-n" | "--line-number" => options.line_numbers = true,
                "-N" | "--no-line-number" => options.line_numbers = false,
                "-q" | "--quiet" | "--silent" => options.quiet = true,
                "-r" | "-R" | "--recursive" => options.recursive = true,
                "-w" | "--word-regexp" => options.word = true,
                "-o" | "--only-matching" => options.only_matching = true,
                "-F" | "--fixed-strings" => options.fixed = true,
                "-E" | "--extended-regexp" => options.extended = true,
                "-h" | "-H" | "-a" | "--text" | "--" => {}
                "-m" | "--max-count" => {
                    i += 1;
                    options.max_count = ctx.args.get(i).and_then(|m| m.parse().ok());
                }
                "-e" | "--regexp" => {
                    i += 1;
                    pattern = ctx.args.get(i).cloned();
                }
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    return CommandResult::with_exit_code(
                        String::new(),
                        format!("{}: invalid option -- '{}'\n", self.name, arg),
                        2,
                    )
                }
                _ => {
                    if pattern.is_none() {
                        pattern = Some(arg.clone());
                    } else {
                        files.push(arg.clone());
                    }
                }
            }
            i += 1;
        }
        let pattern = match pattern {
            Some(p) => p,
            None => {
                return CommandResult::with_exit_code(
                    String::new(),
                    format!("usage: {} [options] pattern [file...]\n", self.name),
                    2,
                )
            }
        };
        let regex = match build_regex(&pattern, &options) {
            Some(re) => re,
            None => {
                return CommandResult::with_exit_code(
                    String::new(),
                    format!("{}: invalid pattern: {}\n", self.name, pattern),
                    2,
                )
            }
        };

        // Expand -r directories into their files.
        let mut sources: Vec<(String, String)> = Vec::new(); // (label, content)
        let mut stderr = String::new();
        let mut had_error = false;
        if files.is_empty() {
            sources.push(("(standard input)".to_string(), ctx.stdin.clone()));
        }
        for file in &files {
            let path = ctx.resolve(file);
            match ctx.fs.stat(&path).await {
                Ok(stat) if stat.is_directory => {
                    if options.recursive {
                        collect_files(&ctx, &path, file.trim_end_matches('/'), &mut sources).await;
                    } else {
                        stderr.push_str(&format!("{}: {}: Is a directory\n", self.name, file));
                        had_error = true;
                    }
                }
                Ok(_) => match ctx.fs.read_file(&path).await {
                    Ok(content) => sources.push((file.clone(), content)),
                    Err(_) => {
                        had_error = true;
                    }
                },
                Err(_) => {
                    stderr.push_str(&format!(
                        "{}: {}: No such file or directory\n",
                        self.name, file
                    ));
                    had_error = true;
                }
            }
        }

        let label_files =
            sources.len() > 1 || (options.recursive && !files.is_empty());
        let mut stdout = String::new();
        let mut matched_any = false;
        for (label, content) in &sources {
            let mut count = 0usize;
            for (line_index, line) in content.lines().enumerate() {
                let hit = regex.is_match(line) != options.invert;
                if !hit {
                    continue;
                }
                matched_any = true;
                count += 1;
                if options.quiet {
                    return CommandResult::with_exit_code(String::new(), String::new(), 0);
                }
                if options.files_with_matches {
                    stdout.push_str(&format!("{}\n", label));
                    break;
                }
                if !options.count {
                    if options.only_matching {
                        for m in regex.find_iter(line) {
                            let mut prefix = String::new();
                            if label_files {
                                prefix.push_str(&format!("{}:", label));
                            }
                            if options.line_numbers {
                                prefix.push_str(&format!("{}:", line_index + 1));
                            }
                            stdout.push_str(&format!("{}{}\n", prefix, m.as_str()));
                        }
                    } else {
                        let mut prefix = String::new();
                        if label_files {
                            prefix.push_str(&format!("{}:", label));
                        }
                        if options.line_numbers {
                            prefix.push_str(&format!("{}:", line_index + 1));
                        }
                        stdout.push_str(&format!("{}{}\n", prefix, line));
                    }
                }
                if let Some(max) = options.max_count {
                    if count >= max {
                        break;
                    }
                }
            }
            if options.count {
                if label_files {
                    stdout.push_str(&format!("{}:{}\n", label, count));
                } else {
                    stdout.push_str(&format!("{}\n", count));
                }
            }
        }
        let exit_code = if matched_any {
            0
        } else if had_error {
            2
        } else {
            1
        };
        CommandResult::with_exit_code(stdout, stderr, exit_code)
    }
}

fn build_regex(pattern: &str, options: &Options) -> Option<Regex> {
    let mut body = if options.fixed {
        regex_escape(pattern)
    } else if options.extended {
        pattern.to_string()
    } else {
        basic_to_extended(pattern)
    };
    if options.word {
        body = format!(r"\b(?:{})\b", body);
    }
    let source = if options.ignore_case {
        format!("(?i){}", body)
    } else {
        body
    };
    Regex::new(&source).ok()
}

fn regex_escape(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        if ".^$*+?()[]{}|\\".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// BRE-flavored input: `+ ? | ( ) { }` are literal unless escaped, and
/// `\+` etc. turn into the ERE operators.
fn basic_to_extended(pattern: &str) -> String {
    let mut out = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ ('+' | '?' | '|' | '(' | ')' | '{' | '}')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '+' | '?' | '|' | '(' | ')' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

async fn collect_files(
    ctx: &CommandContext,
    dir: &str,
    label_prefix: &str,
    sources: &mut Vec<(String, String)>,
) {
    let mut queue = vec![(dir.to_string(), label_prefix.to_string())];
    while let Some((path, label)) = queue.pop() {
        if let Ok(entries) = ctx.fs.readdir_entries(&path).await {
            for entry in entries {
                let child = vpath::join(&path, &entry.name);
                let child_label = format!("{}/{}", label, entry.name);
                if entry.is_directory {
                    queue.push((child, child_label));
                } else if let Ok(content) = ctx.fs.read_file(&child).await {
                    sources.push((child_label, content));
                }
            }
        }
    }
    sources.sort_by(|a, b| a.0.cmp(&b.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::{ctx_with_files, ctx_with_stdin};

    async fn run(args: Vec<&str>, stdin: &str) -> CommandResult {
        GrepCommand::basic()
            .execute(ctx_with_stdin(args, stdin).await)
            .await
    }

    #[tokio::test]
    async fn test_grep_stdin() {
        let result = run(vec!["b"], "abc\nxyz\nbbb\n").await;
        assert_eq!(result.stdout, "abc\nbbb\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_grep_no_match_exit_one() {
        let result = run(vec!["zzz"], "abc\n").await;
        assert_eq!(result.stdout, "");
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn test_grep_ignore_case_and_invert() {
        assert_eq!(run(vec!["-i", "ABC"], "abc\nxyz\n").await.stdout, "abc\n");
        assert_eq!(run(vec!["-v", "a"], "abc\nxyz\n").await.stdout, "xyz\n");
    }

    #[tokio::test]
    async fn test_grep_count_and_line_numbers() {
        assert_eq!(run(vec!["-c", "a"], "a\nb\na\n").await.stdout, "2\n");
        assert_eq!(run(vec!["-n", "b"], "a\nb\n").await.stdout, "2:b\n");
    }

    #[tokio::test]
    async fn test_grep_quiet() {
        let result = run(vec!["-q", "a"], "abc\n").await;
        assert_eq!(result.stdout, "");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_grep_word_match() {
        assert_eq!(run(vec!["-w", "cat"], "cat\nconcat\n").await.stdout, "cat\n");
    }

    #[tokio::test]
    async fn test_grep_only_matching() {
        assert_eq!(run(vec!["-o", "[0-9]+"], "a12b34\n").await.stdout, "12\n34\n");
    }

    #[tokio::test]
    async fn test_basic_dialect_literal_plus() {
        assert_eq!(run(vec!["a+"], "a+\naa\n").await.stdout, "a+\n");
    }

    #[tokio::test]
    async fn test_extended_dialect() {
        let result = GrepCommand::extended()
            .execute(ctx_with_stdin(vec!["a+b"], "aab\nxy\n").await)
            .await;
        assert_eq!(result.stdout, "aab\n");
    }

    #[tokio::test]
    async fn test_fixed_dialect() {
        let result = GrepCommand::fixed()
            .execute(ctx_with_stdin(vec!["a.b"], "a.b\naxb\n").await)
            .await;
        assert_eq!(result.stdout, "a.b\n");
    }

    #[tokio::test]
    async fn test_grep_files_and_labels() {
        let ctx = ctx_with_files(
            vec!["x", "/a", "/b"],
            vec![("/a", "x1\n"), ("/b", "nothing\nx2\n")],
        )
        .await;
        let result = GrepCommand::basic().execute(ctx).await;
        assert_eq!(result.stdout, "/a:x1\n/b:x2\n");
    }

    #[tokio::test]
    async fn test_grep_files_with_matches() {
        let ctx = ctx_with_files(vec!["-l", "x", "/a", "/b"], vec![("/a", "x\n"), ("/b", "y\n")])
            .await;
        assert_eq!(GrepCommand::basic().execute(ctx).await.stdout, "/a\n");
    }

    #[tokio::test]
    async fn test_grep_recursive() {
        let ctx = ctx_with_files(
            vec!["-r", "hit", "/d"],
            vec![("/d/a.txt", "hit one\n"), ("/d/sub/b.txt", "hit two\n")],
        )
        .await;
        let out = GrepCommand::basic().execute(ctx).await.stdout;
        assert!(out.contains("/d/a.txt:hit one"));
        assert!(out.contains("/d/sub/b.txt:hit two"));
    }

    #[tokio::test]
    async fn test_grep_directory_without_r() {
        let ctx = ctx_with_files(vec!["x", "/d"], vec![("/d/f", "x\n")]).await;
        let result = GrepCommand::basic().execute(ctx).await;
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("Is a directory"));
    }

    #[tokio::test]
    async fn test_rg_defaults() {
        let ctx = ctx_with_files(
            vec!["hit", "/d"],
            vec![("/d/a.txt", "miss\nhit\n")],
        )
        .await;
        let out = GrepCommand::ripgrep().execute(ctx).await.stdout;
        assert_eq!(out, "/d/a.txt:2:hit\n");
    }
}
