use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};
use crate::expand::pattern::matches_glob;
use crate::vfs::path as vpath;

/// `find` over the virtual tree: `-name`, `-iname`, `-path`, `-type`,
/// `-maxdepth`/`-mindepth`, `-not`, `-delete`, `-exec ... \;`,
/// `-print0`, `-empty`, `-size` (c suffix).
pub struct FindCommand;

#[derive(Debug, Clone)]
enum Test {
    Name(String, bool),
    Path(String),
    Type(char),
    Empty,
    SizeBytes(i64, std::cmp::Ordering),
    Not(Box<Test>),
}

#[async_trait]
impl Command for FindCommand {
    fn name(&self) -> &'static str {
        "find"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut roots: Vec<String> = Vec::new();
        let mut tests: Vec<Test> = Vec::new();
        let mut max_depth: Option<usize> = None;
        let mut min_depth: usize = 0;
        let mut delete = false;
        let mut print0 = false;
        let mut exec_template: Option<Vec<String>> = None;
        let mut negate_next = false;

        let mut i = 0;
        while i < ctx.args.len() {
            let arg = &ctx.args[i];
            let mut push_test = |t: Test, negate: &mut bool| {
                if *negate {
                    tests.push(Test::Not(Box::new(t)));
                    *negate = false;
                } else {
                    tests.push(t);
                }
            };
            match arg.as_str() {
                "-name" | "-iname" => {
                    let fold = arg == "-iname";
                    i += 1;
                    match ctx.args.get(i) {
                        Some(p) => push_test(Test::Name(p.clone(), fold), &mut negate_next),
                        None => return missing_arg("-name"),
                    }
                }
                "-path" => {
                    i += 1;
                    match ctx.args.get(i) {
                        Some(p) => push_test(Test::Path(p.clone()), &mut negate_next),
                        None => return missing_arg("-path"),
                    }
                }
                "-type" => {
                    i += 1;
                    match ctx.args.get(i).and_then(|t| t.chars().next()) {
                        Some(t @ ('f' | 'd' | 'l')) => {
                            push_test(Test::Type(t), &mut negate_next)
                        }
                        _ => {
                            return CommandResult::error(
                                "find: invalid argument to `-type'\n".to_string(),
                            )
                        }
                    }
                }
                "-empty" => push_test(Test::Empty, &mut negate_next),
                "-size" => {
                    i += 1;
                    match ctx.args.get(i).and_then(|s| parse_size(s)) {
                        Some((n, ord)) => push_test(Test::SizeBytes(n, ord), &mut negate_next),
                        None => {
                            return CommandResult::error(
                                "find: invalid argument to `-size'\n".to_string(),
                            )
                        }
                    }
                }
                "-maxdepth" => {
                    i += 1;
                    max_depth = ctx.args.get(i).and_then(|d| d.parse().ok());
                }
                "-mindepth" => {
                    i += 1;
                    min_depth = ctx.args.get(i).and_then(|d| d.parse().ok()).unwrap_or(0);
                }
                "-not" | "!" => negate_next = true,
                "-delete" => delete = true,
                "-print" => {}
                "-print0" => print0 = true,
                "-exec" => {
                    let mut template = Vec::new();
                    i += 1;
                    while i < ctx.args.len() && ctx.args[i] != ";" && ctx.args[i] != "+" {
                        template.push(ctx.args[i].clone());
                        i += 1;
                    }
                    if template.is_empty() {
                        return missing_arg("-exec");
                    }
                    exec_template = Some(template);
                }
                "-a" | "-and" | "-o" | "-or" => {}
                _ if arg.starts_with('-') => {
                    return CommandResult::error(format!(
                        "find: unknown predicate `{}'\n",
                        arg
                    ))
                }
                _ => roots.push(arg.clone()),
            }
            i += 1;
        }
        if roots.is_empty() {
            roots.push(".".to_string());
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        for root in &roots {
            let resolved = ctx.resolve(root);
            if !ctx.fs.exists(&resolved).await {
                stderr.push_str(&format!(
                    "find: '{}': No such file or directory\n",
                    root
                ));
                exit_code = 1;
                continue;
            }
            let mut matches = Vec::new();
            walk(&ctx, &resolved, root, 0, max_depth, min_depth, &tests, &mut matches).await;
            for (label, path) in matches {
                if let Some(template) = &exec_template {
                    let exec = match &ctx.exec {
                        Some(exec) => exec.clone(),
                        None => {
                            return CommandResult::error(
                                "find: -exec is unavailable here\n".to_string(),
                            )
                        }
                    };
                    let command: Vec<String> = template
                        .iter()
                        .map(|part| part.replace("{}", &label))
                        .collect();
                    let result = exec(command.join(" "), String::new()).await;
                    stdout.push_str(&result.stdout);
                    stderr.push_str(&result.stderr);
                    if result.exit_code != 0 {
                        exit_code = 1;
                    }
                } else if delete {
                    if ctx.fs.rm(&path, true, true).await.is_err() {
                        stderr.push_str(&format!("find: cannot delete '{}'\n", label));
                        exit_code = 1;
                    }
                } else {
                    stdout.push_str(&label);
                    stdout.push(if print0 { '\0' } else { '\n' });
                }
            }
        }
        CommandResult::with_exit_code(stdout, stderr, exit_code)
    }
}

fn missing_arg(option: &str) -> CommandResult {
    CommandResult::error(format!("find: missing argument to `{}'\n", option))
}

/// `+N` larger, `-N` smaller, `N` exact; optional `c` (bytes) or `k`.
fn parse_size(spec: &str) -> Option<(i64, std::cmp::Ordering)> {
    use std::cmp::Ordering;
    let (ord, rest) = match spec.chars().next()? {
        '+' => (Ordering::Greater, &spec[1..]),
        '-' => (Ordering::Less, &spec[1..]),
        _ => (Ordering::Equal, spec),
    };
    let (digits, multiplier) = match rest.chars().last()? {
        'c' => (&rest[..rest.len() - 1], 1),
        'k' => (&rest[..rest.len() - 1], 1024),
        _ => (rest, 512),
    };
    digits.parse::<i64>().ok().map(|n| (n * multiplier, ord))
}

#[allow(clippy::too_many_arguments)]
async fn walk(
    ctx: &CommandContext,
    path: &str,
    label: &str,
    depth: usize,
    max_depth: Option<usize>,
    min_depth: usize,
    tests: &[Test],
    matches: &mut Vec<(String, String)>,
) {
    if depth >= min_depth && passes(ctx, path, label, tests).await {
        matches.push((label.to_string(), path.to_string()));
    }
    if let Some(max) = max_depth {
        if depth >= max {
            return;
        }
    }
    let is_dir = ctx
        .fs
        .lstat(path)
        .await
        .map(|s| s.is_directory)
        .unwrap_or(false);
    if !is_dir {
        return;
    }
    if let Ok(entries) = ctx.fs.readdir_entries(path).await {
        for entry in entries {
            let child_path = vpath::join(path, &entry.name);
            let child_label = format!("{}/{}", label.trim_end_matches('/'), entry.name);
            Box::pin(walk(
                ctx,
                &child_path,
                &child_label,
                depth + 1,
                max_depth,
                min_depth,
                tests,
                matches,
            ))
            .await;
        }
    }
}

async fn passes(ctx: &CommandContext, path: &str, label: &str, tests: &[Test]) -> bool {
    for test in tests {
        if !passes_one(ctx, path, label, test).await {
            return false;
        }
    }
    true
}

fn passes_one<'a>(
    ctx: &'a CommandContext,
    path: &'a str,
    label: &'a str,
    test: &'a Test,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + 'a>> {
    Box::pin(async move {
        match test {
            Test::Name(pattern, fold) => {
                matches_glob(pattern, &vpath::file_name(path), *fold)
            }
            Test::Path(pattern) => matches_glob(pattern, label, false),
            Test::Type(t) => match ctx.fs.lstat(path).await {
                Ok(stat) => match t {
                    'f' => stat.is_file,
                    'd' => stat.is_directory,
                    'l' => stat.is_symlink,
                    _ => false,
                },
                Err(_) => false,
            },
            Test::Empty => match ctx.fs.lstat(path).await {
                Ok(stat) if stat.is_directory => ctx
                    .fs
                    .readdir(path)
                    .await
                    .map(|names| names.is_empty())
                    .unwrap_or(false),
                Ok(stat) => stat.size == 0,
                Err(_) => false,
            },
            Test::SizeBytes(n, ord) => match ctx.fs.lstat(path).await {
                Ok(stat) => (stat.size as i64).cmp(n) == *ord,
                Err(_) => false,
            },
            Test::Not(inner) => !passes_one(ctx, path, label, inner).await,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_find_all() {
        let ctx = ctx_with_files(
            vec!["/d"],
            vec![("/d/a.txt", ""), ("/d/sub/b.txt", "")],
        )
        .await;
        let out = FindCommand.execute(ctx).await.stdout;
        assert_eq!(out, "/d\n/d/a.txt\n/d/sub\n/d/sub/b.txt\n");
    }

    #[tokio::test]
    async fn test_find_name() {
        let ctx = ctx_with_files(
            vec!["/d", "-name", "*.txt"],
            vec![("/d/a.txt", ""), ("/d/b.md", "")],
        )
        .await;
        assert_eq!(FindCommand.execute(ctx).await.stdout, "/d/a.txt\n");
    }

    #[tokio::test]
    async fn test_find_type() {
        let ctx = ctx_with_files(vec!["/d", "-type", "d"], vec![("/d/sub/f", "")]).await;
        assert_eq!(FindCommand.execute(ctx).await.stdout, "/d\n/d/sub\n");
    }

    #[tokio::test]
    async fn test_find_maxdepth() {
        let ctx = ctx_with_files(
            vec!["/d", "-maxdepth", "1"],
            vec![("/d/a", ""), ("/d/sub/deep", "")],
        )
        .await;
        let out = FindCommand.execute(ctx).await.stdout;
        assert!(out.contains("/d/a\n"));
        assert!(!out.contains("deep"));
    }

    #[tokio::test]
    async fn test_find_not() {
        let ctx = ctx_with_files(
            vec!["/d", "-type", "f", "-not", "-name", "*.md"],
            vec![("/d/a.txt", ""), ("/d/b.md", "")],
        )
        .await;
        assert_eq!(FindCommand.execute(ctx).await.stdout, "/d/a.txt\n");
    }

    #[tokio::test]
    async fn test_find_empty() {
        let ctx = ctx_with_files(
            vec!["/d", "-type", "f", "-empty"],
            vec![("/d/empty", ""), ("/d/full", "x")],
        )
        .await;
        assert_eq!(FindCommand.execute(ctx).await.stdout, "/d/empty\n");
    }

    #[tokio::test]
    async fn test_find_size() {
        let ctx = ctx_with_files(
            vec!["/d", "-size", "+2c"],
            vec![("/d/small", "x"), ("/d/big", "xxxx")],
        )
        .await;
        assert_eq!(FindCommand.execute(ctx).await.stdout, "/d/big\n");
    }

    #[tokio::test]
    async fn test_find_delete() {
        let ctx = ctx_with_files(
            vec!["/d", "-name", "*.tmp", "-delete"],
            vec![("/d/x.tmp", ""), ("/d/keep", "")],
        )
        .await;
        let fs = ctx.fs.clone();
        assert_eq!(FindCommand.execute(ctx).await.exit_code, 0);
        assert!(!fs.exists("/d/x.tmp").await);
        assert!(fs.exists("/d/keep").await);
    }

    #[tokio::test]
    async fn test_find_missing_root() {
        let ctx = ctx_with_files(vec!["/none"], vec![]).await;
        let result = FindCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("No such file or directory"));
    }

    #[tokio::test]
    async fn test_find_print0() {
        let ctx = ctx_with_files(vec!["/d", "-type", "f", "-print0"], vec![("/d/a", "")]).await;
        assert_eq!(FindCommand.execute(ctx).await.stdout, "/d/a\0");
    }

    #[test]
    fn test_parse_size() {
        use std::cmp::Ordering;
        assert_eq!(parse_size("+2c"), Some((2, Ordering::Greater)));
        assert_eq!(parse_size("-1k"), Some((1024, Ordering::Less)));
        assert_eq!(parse_size("3c"), Some((3, Ordering::Equal)));
        assert!(parse_size("junk").is_none());
    }
}
