use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct PwdCommand;

#[async_trait]
impl Command for PwdCommand {
    fn name(&self) -> &'static str {
        "pwd"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        CommandResult::success(format!("{}\n", ctx.cwd))
    }
}
