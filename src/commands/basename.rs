use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct BasenameCommand;

#[async_trait]
impl Command for BasenameCommand {
    fn name(&self) -> &'static str {
        "basename"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut args: Vec<&String> = ctx.args.iter().filter(|a| *a != "--").collect();
        let multiple = args.first().map(|a| a.as_str()) == Some("-a");
        if multiple {
            args.remove(0);
        }
        if args.is_empty() {
            return CommandResult::error("basename: missing operand\n".to_string());
        }
        if multiple {
            let out: String = args.iter().map(|p| format!("{}\n", base_of(p, None))).collect();
            return CommandResult::success(out);
        }
        let suffix = args.get(1).map(|s| s.as_str());
        CommandResult::success(format!("{}\n", base_of(args[0], suffix)))
    }
}

fn base_of(path: &str, suffix: Option<&str>) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    let mut base = trimmed.rsplit('/').next().unwrap_or(trimmed).to_string();
    if let Some(suffix) = suffix {
        if base != suffix {
            if let Some(stripped) = base.strip_suffix(suffix) {
                base = stripped.to_string();
            }
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_basename() {
        let ctx = ctx_with_files(vec!["/usr/bin/sort"], vec![]).await;
        assert_eq!(BasenameCommand.execute(ctx).await.stdout, "sort\n");
    }

    #[tokio::test]
    async fn test_basename_suffix() {
        let ctx = ctx_with_files(vec!["/tmp/a.txt", ".txt"], vec![]).await;
        assert_eq!(BasenameCommand.execute(ctx).await.stdout, "a\n");
    }

    #[test]
    fn test_base_of_edges() {
        assert_eq!(base_of("/", None), "/");
        assert_eq!(base_of("dir/", None), "dir");
        assert_eq!(base_of("plain", None), "plain");
        // The suffix never empties the name entirely.
        assert_eq!(base_of(".txt", Some(".txt")), ".txt");
    }
}
