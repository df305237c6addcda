//! read and mapfile/readarray: builtins that consume shell stdin.

use super::super::engine::Interp;
use super::super::flow::Exec;
use super::super::state::ExecResult;

/// Take the input available to a stdin-consuming builtin: the direct
/// pipe input when present, otherwise the innermost compound buffer
/// (which is consumed destructively so `while read` advances).
fn take_line(interp: &mut Interp<'_>, direct: &str, delim: char) -> Option<String> {
    if !direct.is_empty() {
        let mut line = direct.to_string();
        if let Some(pos) = line.find(delim) {
            line.truncate(pos);
        }
        return Some(line);
    }
    let buffer = interp.stdin_stack.last_mut()?;
    if buffer.is_empty() {
        return None;
    }
    match buffer.find(delim) {
        Some(pos) => {
            let line: String = buffer[..pos].to_string();
            buffer.replace_range(..=pos, "");
            Some(line)
        }
        None => {
            let line = std::mem::take(buffer);
            Some(line)
        }
    }
}

fn take_all(interp: &mut Interp<'_>, direct: &str) -> String {
    if !direct.is_empty() {
        return direct.to_string();
    }
    match interp.stdin_stack.last_mut() {
        Some(buffer) => std::mem::take(buffer),
        None => String::new(),
    }
}

/// `read [-r] [-p prompt] [-d delim] [-a array] [name...]`
pub fn run_read(interp: &mut Interp<'_>, args: &[String], stdin: &str) -> Exec {
    let mut names: Vec<String> = Vec::new();
    let mut array_name: Option<String> = None;
    let mut prompt: Option<String> = None;
    let mut delim = '\n';
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-r" | "-s" => {}
            "-p" => {
                i += 1;
                prompt = args.get(i).cloned();
            }
            "-d" => {
                i += 1;
                delim = args
                    .get(i)
                    .and_then(|d| d.chars().next())
                    .unwrap_or('\0');
            }
            "-a" => {
                i += 1;
                array_name = args.get(i).cloned();
            }
            "-n" | "-N" | "-t" | "-u" => {
                i += 1;
            }
            name => names.push(name.to_string()),
        }
        i += 1;
    }
    let stderr = prompt.unwrap_or_default();

    let line = match take_line(interp, stdin, delim) {
        Some(line) => line,
        None => return Ok(ExecResult::new(String::new(), stderr, 1)),
    };
    let line = line.trim_end_matches('\r');

    let ifs = interp
        .state
        .env
        .get("IFS")
        .cloned()
        .unwrap_or_else(|| " \t\n".to_string());

    if let Some(array) = array_name {
        for (idx, field) in split_fields(line, &ifs).into_iter().enumerate() {
            interp.state.array_set(&array, idx as i64, &field);
        }
        return Ok(ExecResult::new(String::new(), stderr, 0));
    }
    if names.is_empty() {
        names.push("REPLY".to_string());
    }
    assign_fields(interp, &names, line, &ifs);
    Ok(ExecResult::new(String::new(), stderr, 0))
}

fn split_fields(line: &str, ifs: &str) -> Vec<String> {
    if ifs.is_empty() {
        return vec![line.to_string()];
    }
    line.split(|c: char| ifs.contains(c))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Distribute fields over names; the last name takes the remainder.
fn assign_fields(interp: &mut Interp<'_>, names: &[String], line: &str, ifs: &str) {
    let ws: String = ifs.chars().filter(|c| c.is_whitespace()).collect();
    let trimmed = line.trim_matches(|c: char| ws.contains(c));
    let mut rest = trimmed;
    for (i, name) in names.iter().enumerate() {
        if i + 1 == names.len() {
            interp.state.set_var(name, rest);
            return;
        }
        match rest.find(|c: char| ifs.contains(c)) {
            Some(pos) => {
                interp.state.set_var(name, &rest[..pos]);
                rest = rest[pos + 1..].trim_start_matches(|c: char| ws.contains(c));
            }
            None => {
                interp.state.set_var(name, rest);
                rest = "";
            }
        }
    }
}

/// `mapfile [-t] name` / `readarray [-t] name`
pub fn run_mapfile(interp: &mut Interp<'_>, args: &[String], stdin: &str) -> Exec {
    let mut strip = false;
    let mut name = "MAPFILE".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-t" => strip = true,
            "-d" | "-n" | "-O" | "-s" | "-u" | "-C" | "-c" => {
                i += 1;
            }
            other => name = other.to_string(),
        }
        i += 1;
    }
    let content = take_all(interp, stdin);
    interp.state.arrays.remove(&name);
    interp.state.env.remove(&name);
    let mut index = 0i64;
    for line in content.split_inclusive('\n') {
        let value = if strip {
            line.trim_end_matches('\n')
        } else {
            line
        };
        interp.state.array_set(&name, index, value);
        index += 1;
    }
    Ok(ExecResult::ok())
}
