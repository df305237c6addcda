use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct DirnameCommand;

#[async_trait]
impl Command for DirnameCommand {
    fn name(&self) -> &'static str {
        "dirname"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let args: Vec<&String> = ctx.args.iter().filter(|a| *a != "--").collect();
        if args.is_empty() {
            return CommandResult::error("dirname: missing operand\n".to_string());
        }
        let out: String = args.iter().map(|p| format!("{}\n", dir_of(p))).collect();
        CommandResult::success(out)
    }
}

fn dir_of(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(pos) => trimmed[..pos].to_string(),
        None => ".".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_dirname() {
        let ctx = ctx_with_files(vec!["/usr/bin/sort"], vec![]).await;
        assert_eq!(DirnameCommand.execute(ctx).await.stdout, "/usr/bin\n");
    }

    #[test]
    fn test_dir_of_edges() {
        assert_eq!(dir_of("/"), "/");
        assert_eq!(dir_of("/usr"), "/");
        assert_eq!(dir_of("plain"), ".");
        assert_eq!(dir_of("a/b/"), "a");
    }
}
