use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct SeqCommand;

#[async_trait]
impl Command for SeqCommand {
    fn name(&self) -> &'static str {
        "seq"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut separator = "\n".to_string();
        let mut width_pad = false;
        let mut values = Vec::new();
        let mut i = 0;
        while i < ctx.args.len() {
            match ctx.args[i].as_str() {
                "-s" => {
                    i += 1;
                    separator = ctx.args.get(i).cloned().unwrap_or_default();
                }
                "-w" => width_pad = true,
                arg => match arg.parse::<i64>() {
                    Ok(n) => values.push(n),
                    Err(_) => {
                        return CommandResult::error(format!(
                            "seq: invalid floating point argument: '{}'\n",
                            arg
                        ))
                    }
                },
            }
            i += 1;
        }
        let (first, step, last) = match values.len() {
            1 => (1, 1, values[0]),
            2 => (values[0], 1, values[1]),
            3 => (values[0], values[1], values[2]),
            _ => return CommandResult::error("seq: missing operand\n".to_string()),
        };
        if step == 0 {
            return CommandResult::error("seq: invalid Zero increment value: '0'\n".to_string());
        }
        let mut numbers = Vec::new();
        let mut v = first;
        while (step > 0 && v <= last) || (step < 0 && v >= last) {
            numbers.push(v);
            v += step;
        }
        let width = numbers
            .iter()
            .map(|n| n.to_string().len())
            .max()
            .unwrap_or(0);
        let rendered: Vec<String> = numbers
            .iter()
            .map(|n| {
                if width_pad {
                    format!("{:0>width$}", n, width = width)
                } else {
                    n.to_string()
                }
            })
            .collect();
        if rendered.is_empty() {
            return CommandResult::success(String::new());
        }
        CommandResult::success(format!("{}\n", rendered.join(&separator)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    async fn run(args: Vec<&str>) -> CommandResult {
        SeqCommand.execute(ctx_with_files(args, vec![]).await).await
    }

    #[tokio::test]
    async fn test_seq_last_only() {
        assert_eq!(run(vec!["3"]).await.stdout, "1\n2\n3\n");
    }

    #[tokio::test]
    async fn test_seq_first_last() {
        assert_eq!(run(vec!["2", "4"]).await.stdout, "2\n3\n4\n");
    }

    #[tokio::test]
    async fn test_seq_step() {
        assert_eq!(run(vec!["1", "2", "5"]).await.stdout, "1\n3\n5\n");
        assert_eq!(run(vec!["5", "-2", "1"]).await.stdout, "5\n3\n1\n");
    }

    #[tokio::test]
    async fn test_seq_separator_and_pad() {
        assert_eq!(run(vec!["-s", ",", "3"]).await.stdout, "1,2,3\n");
        assert_eq!(run(vec!["-w", "8", "10"]).await.stdout, "08\n09\n10\n");
    }

    #[tokio::test]
    async fn test_seq_empty_range() {
        assert_eq!(run(vec!["3", "1"]).await.stdout, "");
    }

    #[tokio::test]
    async fn test_seq_bad_args() {
        assert_eq!(run(vec!["x"]).await.exit_code, 1);
        assert_eq!(run(vec!["1", "0", "5"]).await.exit_code, 1);
    }
}
