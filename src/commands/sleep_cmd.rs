use async_trait::async_trait;
use std::time::Duration;

use super::{Command, CommandContext, CommandResult};

/// Sleeps are capped so a stray `sleep 99999` cannot hang the sandbox.
const MAX_SLEEP_MS: u64 = 10_000;

pub struct SleepCommand;

#[async_trait]
impl Command for SleepCommand {
    fn name(&self) -> &'static str {
        "sleep"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let spec = match ctx.args.first() {
            Some(s) => s.clone(),
            None => return CommandResult::error("sleep: missing operand\n".to_string()),
        };
        let seconds = match parse_duration(&spec) {
            Some(s) => s,
            None => {
                return CommandResult::error(format!(
                    "sleep: invalid time interval '{}'\n",
                    spec
                ))
            }
        };
        let ms = ((seconds * 1000.0) as u64).min(MAX_SLEEP_MS);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        CommandResult::success(String::new())
    }
}

fn parse_duration(spec: &str) -> Option<f64> {
    let (number, unit) = match spec.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&spec[..spec.len() - 1], c),
        _ => (spec, 's'),
    };
    let value: f64 = number.parse().ok()?;
    if value < 0.0 {
        return None;
    }
    Some(match unit {
        's' => value,
        'm' => value * 60.0,
        'h' => value * 3600.0,
        'd' => value * 86400.0,
        _ => return None,
    })
}
