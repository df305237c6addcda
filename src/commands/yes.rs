use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

/// An infinite stream is unrepresentable here; emit a bounded burst the
/// way consumers like `head` would observe anyway.
const REPEAT: usize = 10_000;

pub struct YesCommand;

#[async_trait]
impl Command for YesCommand {
    fn name(&self) -> &'static str {
        "yes"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let word = if ctx.args.is_empty() {
            "y".to_string()
        } else {
            ctx.args.join(" ")
        };
        let mut out = String::with_capacity((word.len() + 1) * REPEAT);
        for _ in 0..REPEAT {
            out.push_str(&word);
            out.push('\n');
        }
        CommandResult::success(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_yes_default() {
        let ctx = ctx_with_files(vec![], vec![]).await;
        let out = YesCommand.execute(ctx).await.stdout;
        assert!(out.starts_with("y\ny\n"));
        assert_eq!(out.lines().count(), REPEAT);
    }

    #[tokio::test]
    async fn test_yes_word() {
        let ctx = ctx_with_files(vec!["no", "way"], vec![]).await;
        assert!(YesCommand.execute(ctx).await.stdout.starts_with("no way\n"));
    }
}
