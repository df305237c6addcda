use async_trait::async_trait;

use super::head::run_head_tail;
use super::{Command, CommandContext, CommandResult};

pub struct TailCommand;

#[async_trait]
impl Command for TailCommand {
    fn name(&self) -> &'static str {
        "tail"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        run_head_tail(ctx, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::{ctx_with_files, ctx_with_stdin};

    #[tokio::test]
    async fn test_tail_default_ten() {
        let content: String = (1..=15).map(|i| format!("{}\n", i)).collect();
        let ctx = ctx_with_files(vec!["/f"], vec![("/f", content.as_str())]).await;
        let out = TailCommand.execute(ctx).await.stdout;
        assert_eq!(out.lines().count(), 10);
        assert!(out.ends_with("15\n"));
    }

    #[tokio::test]
    async fn test_tail_n() {
        let ctx = ctx_with_files(vec!["-n", "2", "/f"], vec![("/f", "a\nb\nc\n")]).await;
        assert_eq!(TailCommand.execute(ctx).await.stdout, "b\nc\n");
    }

    #[tokio::test]
    async fn test_tail_plus_from_stdin() {
        let ctx = ctx_with_stdin(vec!["-n", "1"], "x\ny\n").await;
        assert_eq!(TailCommand.execute(ctx).await.stdout, "y\n");
    }

    #[tokio::test]
    async fn test_tail_bytes() {
        let ctx = ctx_with_files(vec!["-c", "3", "/f"], vec![("/f", "abcdef")]).await;
        assert_eq!(TailCommand.execute(ctx).await.stdout, "def");
    }
}
