use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct PrintfCommand;

#[async_trait]
impl Command for PrintfCommand {
    fn name(&self) -> &'static str {
        "printf"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        match render(&ctx.args) {
            Ok(out) => CommandResult::success(out),
            Err(message) => CommandResult::error(format!("printf: {}\n", message)),
        }
    }
}

/// Format per the printf utility: the format string is reused until all
/// arguments are consumed.
pub fn render(args: &[String]) -> Result<String, String> {
    let format = match args.first() {
        Some(f) => f.clone(),
        None => return Err("usage: printf format [arguments]".to_string()),
    };
    let mut rest: &[String] = &args[1..];
    let mut out = String::new();
    loop {
        let consumed = format_once(&format, rest, &mut out)?;
        if consumed == 0 || rest.len() <= consumed {
            break;
        }
        rest = &rest[consumed..];
    }
    Ok(out)
}

/// One pass over the format string; returns how many arguments it used.
fn format_once(format: &str, args: &[String], out: &mut String) -> Result<usize, String> {
    let chars: Vec<char> = format.chars().collect();
    let mut i = 0;
    let mut used = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            i += 1;
            match chars.get(i) {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('a') => out.push('\x07'),
                Some('0') => out.push('\0'),
                Some(other) => {
                    out.push('\\');
                    out.push(*other);
                }
                None => out.push('\\'),
            }
            i += 1;
            continue;
        }
        if c != '%' {
            out.push(c);
            i += 1;
            continue;
        }
        i += 1;
        if chars.get(i) == Some(&'%') {
            out.push('%');
            i += 1;
            continue;
        }
        // Flags, width, precision.
        let mut left = false;
        let mut zero = false;
        let mut plus = false;
        let mut space = false;
        while let Some(&f) = chars.get(i) {
            match f {
                '-' => left = true,
                '0' => zero = true,
                '+' => plus = true,
                ' ' => space = true,
                '#' => {}
                _ => break,
            }
            i += 1;
        }
        let mut width = 0usize;
        while let Some(d) = chars.get(i).and_then(|c| c.to_digit(10)) {
            width = width * 10 + d as usize;
            i += 1;
        }
        let mut precision: Option<usize> = None;
        if chars.get(i) == Some(&'.') {
            i += 1;
            let mut p = 0usize;
            while let Some(d) = chars.get(i).and_then(|c| c.to_digit(10)) {
                p = p * 10 + d as usize;
                i += 1;
            }
            precision = Some(p);
        }
        let conv = match chars.get(i) {
            Some(c) => *c,
            None => return Err("missing format character".to_string()),
        };
        i += 1;
        let arg = args.get(used).cloned().unwrap_or_default();
        if "sdiouxXcbeEfgq".contains(conv) {
            used += 1;
        }
        let rendered = match conv {
            's' => {
                let mut s = arg;
                if let Some(p) = precision {
                    s = s.chars().take(p).collect();
                }
                s
            }
            'q' => quote_shell(&arg),
            'b' => {
                let (expanded, _) = super::echo::expand_escapes(&arg);
                expanded
            }
            'c' => arg.chars().next().map(|c| c.to_string()).unwrap_or_default(),
            'd' | 'i' => {
                let n = parse_int(&arg);
                let mut s = n.abs().to_string();
                if let Some(p) = precision {
                    while s.len() < p {
                        s.insert(0, '0');
                    }
                }
                if n < 0 {
                    format!("-{}", s)
                } else if plus {
                    format!("+{}", s)
                } else if space {
                    format!(" {}", s)
                } else {
                    s
                }
            }
            'u' => (parse_int(&arg).max(0) as u64).to_string(),
            'o' => format!("{:o}", parse_int(&arg)),
            'x' => format!("{:x}", parse_int(&arg)),
            'X' => format!("{:X}", parse_int(&arg)),
            'e' | 'E' | 'f' | 'g' => {
                let v: f64 = arg.trim().parse().unwrap_or(0.0);
                match conv {
                    'f' => format!("{:.*}", precision.unwrap_or(6), v),
                    'e' => format!("{:.*e}", precision.unwrap_or(6), v),
                    'E' => format!("{:.*E}", precision.unwrap_or(6), v),
                    _ => format!("{}", v),
                }
            }
            other => return Err(format!("%{}: invalid directive", other)),
        };
        out.push_str(&pad(&rendered, width, left, zero && !left));
    }
    Ok(used)
}

fn pad(s: &str, width: usize, left: bool, zero: bool) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let fill = width - len;
    if left {
        format!("{}{}", s, " ".repeat(fill))
    } else if zero && (s.starts_with('-') || s.starts_with('+')) {
        format!("{}{}{}", &s[..1], "0".repeat(fill), &s[1..])
    } else if zero {
        format!("{}{}", "0".repeat(fill), s)
    } else {
        format!("{}{}", " ".repeat(fill), s)
    }
}

fn parse_int(text: &str) -> i64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    // Leading character in quotes means its codepoint: %d "'a" is 97.
    if let Some(rest) = trimmed.strip_prefix('\'').or_else(|| trimmed.strip_prefix('"')) {
        if let Some(c) = rest.chars().next() {
            return c as i64;
        }
    }
    if let Some(rest) = trimmed.strip_prefix('-') {
        return crate::parser::arith::parse_int_literal(rest)
            .map(|v| -v)
            .unwrap_or(0);
    }
    crate::parser::arith::parse_int_literal(trimmed).unwrap_or(0)
}

fn quote_shell(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_-./:=%+@".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    fn run(args: &[&str]) -> String {
        render(&args.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[tokio::test]
    async fn test_printf_command() {
        let ctx = ctx_with_files(vec!["%s-%s\n", "a", "b"], vec![]).await;
        let result = PrintfCommand.execute(ctx).await;
        assert_eq!(result.stdout, "a-b\n");
    }

    #[test]
    fn test_format_reuse() {
        assert_eq!(run(&["%s\n", "a", "b", "c"]), "a\nb\nc\n");
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(run(&["%d", "42"]), "42");
        assert_eq!(run(&["%05d", "42"]), "00042");
        assert_eq!(run(&["%x", "255"]), "ff");
        assert_eq!(run(&["%X", "255"]), "FF");
        assert_eq!(run(&["%o", "8"]), "10");
        assert_eq!(run(&["%d", "junk"]), "0");
    }

    #[test]
    fn test_string_width_and_precision() {
        assert_eq!(run(&["[%5s]", "ab"]), "[   ab]");
        assert_eq!(run(&["[%-5s]", "ab"]), "[ab   ]");
        assert_eq!(run(&["%.2s", "abcdef"]), "ab");
    }

    #[test]
    fn test_float() {
        assert_eq!(run(&["%.2f", "3.14159"]), "3.14");
    }

    #[test]
    fn test_missing_args_are_empty() {
        assert_eq!(run(&["%s-%d"]), "-0");
    }

    #[test]
    fn test_percent_literal() {
        assert_eq!(run(&["100%%"]), "100%");
    }

    #[test]
    fn test_char_code() {
        assert_eq!(run(&["%d", "'a"]), "97");
    }

    #[test]
    fn test_quote() {
        assert_eq!(run(&["%q", "a b"]), "'a b'");
        assert_eq!(run(&["%q", "plain"]), "plain");
    }
}
