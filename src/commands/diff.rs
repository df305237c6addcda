use async_trait::async_trait;
use similar::{ChangeTag, TextDiff};

use super::{Command, CommandContext, CommandResult};

pub struct DiffCommand;

#[async_trait]
impl Command for DiffCommand {
    fn name(&self) -> &'static str {
        "diff"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut unified = false;
        let mut brief = false;
        let mut files: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-u" | "--unified" => unified = true,
                "-q" | "--brief" => brief = true,
                "-r" | "--" => {}
                _ if arg.starts_with("-u") && arg[2..].parse::<usize>().is_ok() => unified = true,
                _ => files.push(arg.clone()),
            }
        }
        if files.len() != 2 {
            return CommandResult::with_exit_code(
                String::new(),
                "diff: missing operand\n".to_string(),
                2,
            );
        }
        let mut contents = Vec::new();
        for file in &files {
            match ctx.fs.read_file(&ctx.resolve(file)).await {
                Ok(c) => contents.push(c),
                Err(_) => {
                    return CommandResult::with_exit_code(
                        String::new(),
                        format!("diff: {}: No such file or directory\n", file),
                        2,
                    )
                }
            }
        }
        if contents[0] == contents[1] {
            return CommandResult::success(String::new());
        }
        if brief {
            return CommandResult::with_exit_code(
                format!("Files {} and {} differ\n", files[0], files[1]),
                String::new(),
                1,
            );
        }
        let diff = TextDiff::from_lines(&contents[0], &contents[1]);
        let out = if unified {
            diff.unified_diff()
                .header(&files[0], &files[1])
                .to_string()
        } else {
            // Plain format: < for the left file, > for the right.
            let mut out = String::new();
            for change in diff.iter_all_changes() {
                match change.tag() {
                    ChangeTag::Delete => out.push_str(&format!("< {}", change)),
                    ChangeTag::Insert => out.push_str(&format!("> {}", change)),
                    ChangeTag::Equal => {}
                }
            }
            out
        };
        CommandResult::with_exit_code(out, String::new(), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_diff_identical() {
        let ctx = ctx_with_files(vec!["/a", "/b"], vec![("/a", "x\n"), ("/b", "x\n")]).await;
        let result = DiffCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "");
    }

    #[tokio::test]
    async fn test_diff_different() {
        let ctx = ctx_with_files(vec!["/a", "/b"], vec![("/a", "one\n"), ("/b", "two\n")]).await;
        let result = DiffCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stdout.contains("< one"));
        assert!(result.stdout.contains("> two"));
    }

    #[tokio::test]
    async fn test_diff_unified() {
        let ctx =
            ctx_with_files(vec!["-u", "/a", "/b"], vec![("/a", "one\n"), ("/b", "two\n")]).await;
        let result = DiffCommand.execute(ctx).await;
        assert!(result.stdout.contains("--- /a"));
        assert!(result.stdout.contains("+++ /b"));
        assert!(result.stdout.contains("-one"));
        assert!(result.stdout.contains("+two"));
    }

    #[tokio::test]
    async fn test_diff_brief() {
        let ctx =
            ctx_with_files(vec!["-q", "/a", "/b"], vec![("/a", "1\n"), ("/b", "2\n")]).await;
        let result = DiffCommand.execute(ctx).await;
        assert_eq!(result.stdout, "Files /a and /b differ\n");
    }

    #[tokio::test]
    async fn test_diff_missing_file() {
        let ctx = ctx_with_files(vec!["/a", "/none"], vec![("/a", "")]).await;
        assert_eq!(DiffCommand.execute(ctx).await.exit_code, 2);
    }
}
