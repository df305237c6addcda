use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct TrueCommand;

#[async_trait]
impl Command for TrueCommand {
    fn name(&self) -> &'static str {
        "true"
    }

    async fn execute(&self, _ctx: CommandContext) -> CommandResult {
        CommandResult::success(String::new())
    }
}

pub struct FalseCommand;

#[async_trait]
impl Command for FalseCommand {
    fn name(&self) -> &'static str {
        "false"
    }

    async fn execute(&self, _ctx: CommandContext) -> CommandResult {
        CommandResult::with_exit_code(String::new(), String::new(), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_true_and_false() {
        let ctx = ctx_with_files(vec![], vec![]).await;
        assert_eq!(TrueCommand.execute(ctx).await.exit_code, 0);
        let ctx = ctx_with_files(vec!["ignored"], vec![]).await;
        assert_eq!(FalseCommand.execute(ctx).await.exit_code, 1);
    }
}
