use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};

use super::{Command, CommandContext, CommandResult};

pub struct DateCommand;

#[async_trait]
impl Command for DateCommand {
    fn name(&self) -> &'static str {
        "date"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut utc = false;
        let mut format: Option<String> = None;
        let mut epoch: Option<i64> = None;
        let mut i = 0;
        while i < ctx.args.len() {
            let arg = &ctx.args[i];
            match arg.as_str() {
                "-u" | "--utc" => utc = true,
                "-d" | "--date" => {
                    i += 1;
                    let spec = ctx.args.get(i).cloned().unwrap_or_default();
                    match parse_date_spec(&spec) {
                        Some(e) => epoch = Some(e),
                        None => {
                            return CommandResult::error(format!(
                                "date: invalid date '{}'\n",
                                spec
                            ))
                        }
                    }
                }
                _ if arg.starts_with('+') => format = Some(arg[1..].to_string()),
                _ => {
                    return CommandResult::error(format!("date: invalid option '{}'\n", arg));
                }
            }
            i += 1;
        }
        let format = format.unwrap_or_else(|| "%a %b %e %H:%M:%S %Z %Y".to_string());
        let rendered = if utc {
            let now: DateTime<Utc> = match epoch {
                Some(e) => match Utc.timestamp_opt(e, 0).single() {
                    Some(t) => t,
                    None => return CommandResult::error("date: invalid date\n".to_string()),
                },
                None => Utc::now(),
            };
            now.format(&translate(&format)).to_string()
        } else {
            let now: DateTime<Local> = match epoch {
                Some(e) => match Local.timestamp_opt(e, 0).single() {
                    Some(t) => t,
                    None => return CommandResult::error("date: invalid date\n".to_string()),
                },
                None => Local::now(),
            };
            now.format(&translate(&format)).to_string()
        };
        CommandResult::success(format!("{}\n", rendered))
    }
}

/// `@epoch` and plain ISO dates.
fn parse_date_spec(spec: &str) -> Option<i64> {
    if let Some(epoch) = spec.strip_prefix('@') {
        return epoch.parse().ok();
    }
    if let Ok(parsed) = chrono::NaiveDate::parse_from_str(spec, "%Y-%m-%d") {
        return parsed.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(spec, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed.and_utc().timestamp());
    }
    None
}

/// Map the date(1) conversions chrono spells differently.
fn translate(format: &str) -> String {
    format.replace("%N", "000000000")
}
