use async_trait::async_trait;
use regex_lite::Regex;

use super::{Command, CommandContext, CommandResult};

/// The stream editor, covering the subset scripts lean on: `s///` with
/// flags, `p`, `d`, line and regex addresses, `-n`, `-e`, and `-i`.
pub struct SedCommand;

#[derive(Debug, Clone)]
enum Address {
    Any,
    Line(usize),
    Last,
    Pattern(String),
    Range(Box<Address>, Box<Address>),
}

#[derive(Debug, Clone)]
enum Action {
    Substitute { pattern: String, replacement: String, global: bool, print: bool, ignore_case: bool },
    Print,
    Delete,
}

#[derive(Debug, Clone)]
struct Instruction {
    address: Address,
    action: Action,
}

#[async_trait]
impl Command for SedCommand {
    fn name(&self) -> &'static str {
        "sed"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut quiet = false;
        let mut in_place = false;
        let mut scripts: Vec<String> = Vec::new();
        let mut files: Vec<String> = Vec::new();
        let mut i = 0;
        while i < ctx.args.len() {
            let arg = &ctx.args[i];
            match arg.as_str() {
                "-n" | "--quiet" => quiet = true,
                "-i" | "--in-place" => in_place = true,
                "-e" | "--expression" => {
                    i += 1;
                    if let Some(script) = ctx.args.get(i) {
                        scripts.push(script.clone());
                    }
                }
                "-E" | "-r" | "--" => {}
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    return CommandResult::error(format!("sed: invalid option -- '{}'\n", arg))
                }
                _ => {
                    if scripts.is_empty() {
                        scripts.push(arg.clone());
                    } else {
                        files.push(arg.clone());
                    }
                }
            }
            i += 1;
        }
        if scripts.is_empty() {
            return CommandResult::error("sed: no script specified\n".to_string());
        }
        let mut program = Vec::new();
        for script in &scripts {
            for piece in split_script(script) {
                match parse_instruction(&piece) {
                    Some(instr) => program.push(instr),
                    None => {
                        return CommandResult::error(format!(
                            "sed: -e expression #1, char {}: unknown command\n",
                            piece.len()
                        ))
                    }
                }
            }
        }

        if in_place {
            let mut stderr = String::new();
            let mut exit_code = 0;
            for file in &files {
                let path = ctx.resolve(file);
                match ctx.fs.read_file(&path).await {
                    Ok(content) => {
                        let output = apply(&program, &content, quiet);
                        if let Err(e) = ctx.fs.write_file(&path, output.as_bytes()).await {
                            stderr.push_str(&format!("sed: couldn't write {}: {}\n", file, e));
                            exit_code = 1;
                        }
                    }
                    Err(_) => {
                        stderr.push_str(&format!(
                            "sed: can't read {}: No such file or directory\n",
                            file
                        ));
                        exit_code = 2;
                    }
                }
            }
            return CommandResult::with_exit_code(String::new(), stderr, exit_code);
        }

        let mut input = String::new();
        if files.is_empty() {
            input = ctx.stdin.clone();
        } else {
            for file in &files {
                match ctx.fs.read_file(&ctx.resolve(file)).await {
                    Ok(content) => input.push_str(&content),
                    Err(_) => {
                        return CommandResult::with_exit_code(
                            String::new(),
                            format!("sed: can't read {}: No such file or directory\n", file),
                            2,
                        )
                    }
                }
            }
        }
        CommandResult::success(apply(&program, &input, quiet))
    }
}

/// Split `cmd1; cmd2` scripts on unescaped semicolons.
fn split_script(script: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in script.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                current.push(c);
                escaped = true;
            }
            ';' | '\n' => {
                if !current.trim().is_empty() {
                    pieces.push(current.trim().to_string());
                }
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current.trim().to_string());
    }
    pieces
}

fn parse_instruction(text: &str) -> Option<Instruction> {
    let (address, rest) = parse_address(text);
    let rest = rest.trim_start();
    match rest.chars().next()? {
        's' => {
            let delim = rest.chars().nth(1)?;
            let body: Vec<char> = rest.chars().skip(2).collect();
            let mut fields: Vec<String> = vec![String::new()];
            let mut escaped = false;
            for c in body {
                if escaped {
                    if c == delim {
                        fields.last_mut()?.push(c);
                    } else {
                        fields.last_mut()?.push('\\');
                        fields.last_mut()?.push(c);
                    }
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == delim {
                    fields.push(String::new());
                } else {
                    fields.last_mut()?.push(c);
                }
            }
            if fields.len() < 2 {
                return None;
            }
            let flags = fields.get(2).cloned().unwrap_or_default();
            Some(Instruction {
                address,
                action: Action::Substitute {
                    pattern: fields[0].clone(),
                    replacement: fields[1].clone(),
                    global: flags.contains('g'),
                    print: flags.contains('p'),
                    ignore_case: flags.contains('i') || flags.contains('I'),
                },
            })
        }
        'p' => Some(Instruction { address, action: Action::Print }),
        'd' => Some(Instruction { address, action: Action::Delete }),
        _ => None,
    }
}

fn parse_address(text: &str) -> (Address, &str) {
    let (first, rest) = parse_one_address(text);
    let first = match first {
        Some(a) => a,
        None => return (Address::Any, text),
    };
    if let Some(range_rest) = rest.strip_prefix(',') {
        let (second, rest2) = parse_one_address(range_rest);
        if let Some(second) = second {
            return (
                Address::Range(Box::new(first), Box::new(second)),
                rest2,
            );
        }
    }
    (first, rest)
}

fn parse_one_address(text: &str) -> (Option<Address>, &str) {
    let mut chars = text.char_indices().peekable();
    match chars.peek() {
        Some((_, '$')) => (Some(Address::Last), &text[1..]),
        Some((_, '/')) => {
            let mut end = None;
            let mut escaped = false;
            for (i, c) in text.char_indices().skip(1) {
                if escaped {
                    escaped = false;
                    continue;
                }
                if c == '\\' {
                    escaped = true;
                } else if c == '/' {
                    end = Some(i);
                    break;
                }
            }
            match end {
                Some(end) => (
                    Some(Address::Pattern(text[1..end].to_string())),
                    &text[end + 1..],
                ),
                None => (None, text),
            }
        }
        Some((_, c)) if c.is_ascii_digit() => {
            let end = text
                .char_indices()
                .find(|(_, c)| !c.is_ascii_digit())
                .map(|(i, _)| i)
                .unwrap_or(text.len());
            match text[..end].parse() {
                Ok(n) => (Some(Address::Line(n)), &text[end..]),
                Err(_) => (None, text),
            }
        }
        _ => (None, text),
    }
}

fn address_matches(
    address: &Address,
    line: &str,
    number: usize,
    total: usize,
    range_open: &mut bool,
) -> bool {
    match address {
        Address::Any => true,
        Address::Line(n) => number == *n,
        Address::Last => number == total,
        Address::Pattern(p) => Regex::new(p).map(|re| re.is_match(line)).unwrap_or(false),
        Address::Range(from, to) => {
            let mut ignored = false;
            if *range_open {
                if address_matches(to, line, number, total, &mut ignored) {
                    *range_open = false;
                }
                true
            } else if address_matches(from, line, number, total, &mut ignored) {
                *range_open = !address_matches(to, line, number, total, &mut ignored);
                true
            } else {
                false
            }
        }
    }
}

fn apply(program: &[Instruction], input: &str, quiet: bool) -> String {
    let lines: Vec<&str> = input.split_inclusive('\n').collect();
    let total = lines.len();
    let mut range_states = vec![false; program.len()];
    let mut out = String::new();
    for (index, raw) in lines.iter().enumerate() {
        let (mut line, newline) = match raw.strip_suffix('\n') {
            Some(l) => (l.to_string(), true),
            None => (raw.to_string(), false),
        };
        let number = index + 1;
        let mut deleted = false;
        let mut extra_prints = Vec::new();
        for (pc, instruction) in program.iter().enumerate() {
            if !address_matches(&instruction.address, &line, number, total, &mut range_states[pc]) {
                continue;
            }
            match &instruction.action {
                Action::Delete => {
                    deleted = true;
                    break;
                }
                Action::Print => extra_prints.push(line.clone()),
                Action::Substitute { pattern, replacement, global, print, ignore_case } => {
                    let source = if *ignore_case {
                        format!("(?i){}", pattern)
                    } else {
                        pattern.clone()
                    };
                    if let Ok(re) = Regex::new(&source) {
                        let rep = convert_replacement(replacement);
                        let new_line = if *global {
                            re.replace_all(&line, rep.as_str()).to_string()
                        } else {
                            re.replace(&line, rep.as_str()).to_string()
                        };
                        let changed = new_line != line;
                        line = new_line;
                        if *print && changed {
                            extra_prints.push(line.clone());
                        }
                    }
                }
            }
        }
        if deleted {
            continue;
        }
        if !quiet {
            out.push_str(&line);
            if newline {
                out.push('\n');
            }
        }
        for printed in extra_prints {
            out.push_str(&printed);
            if newline || quiet {
                out.push('\n');
            }
        }
    }
    out
}

/// `&` and `\1`..`\9` in the replacement map to regex captures.
fn convert_replacement(replacement: &str) -> String {
    let mut out = String::new();
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str("${0}"),
            '\\' => match chars.next() {
                Some(d) if d.is_ascii_digit() => out.push_str(&format!("${{{}}}", d)),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('&') => out.push('&'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '$' => out.push_str("$$"),
            other => out.push(other),
        }
    }
    out
}
