//! Programmable completion: complete, compgen, compopt.
//!
//! Nothing here drives interactive completion; the table is stored so
//! scripts that register and query completions behave sensibly.

use super::super::engine::Interp;
use super::super::flow::Exec;
use super::super::state::{CompletionSpec, ExecResult};

pub fn run_complete(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    if args.is_empty() || args == ["-p"] {
        let mut entries: Vec<(&String, &CompletionSpec)> =
            interp.state.completions.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let out: String = entries
            .iter()
            .map(|(name, spec)| render_spec(name, spec))
            .collect();
        return Ok(ExecResult::new(out, String::new(), 0));
    }
    let mut spec = CompletionSpec::default();
    let mut remove = false;
    let mut names: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-W" => {
                i += 1;
                spec.wordlist = args.get(i).cloned();
            }
            "-F" => {
                i += 1;
                spec.function = args.get(i).cloned();
            }
            "-o" => {
                i += 1;
                if let Some(option) = args.get(i) {
                    spec.options.push(option.clone());
                }
            }
            "-r" => remove = true,
            "-p" => {}
            // Action flags are accepted and ignored.
            "-A" | "-a" | "-b" | "-c" | "-d" | "-e" | "-f" | "-g" | "-j" | "-u" | "-v" => {}
            other => names.push(other.to_string()),
        }
        i += 1;
    }
    if names.is_empty() {
        return Ok(ExecResult::failure_with_code(
            "bash: complete: usage: complete [-pr] [-o option] [-W wordlist] [-F function] [name ...]\n",
            2,
        ));
    }
    for name in names {
        if remove {
            interp.state.completions.remove(&name);
        } else {
            interp.state.completions.insert(name, spec.clone());
        }
    }
    Ok(ExecResult::ok())
}

fn render_spec(name: &str, spec: &CompletionSpec) -> String {
    let mut parts = vec!["complete".to_string()];
    for option in &spec.options {
        parts.push(format!("-o {}", option));
    }
    if let Some(wordlist) = &spec.wordlist {
        parts.push(format!("-W '{}'", wordlist));
    }
    if let Some(function) = &spec.function {
        parts.push(format!("-F {}", function));
    }
    parts.push(name.to_string());
    format!("{}\n", parts.join(" "))
}

/// `compgen -W 'words' [--] [prefix]`: emit candidates, one per line.
/// Exit 1 when nothing matches.
pub fn run_compgen(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    let mut wordlist: Option<String> = None;
    let mut list_kind: Option<&str> = None;
    let mut operands: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-W" => {
                i += 1;
                wordlist = args.get(i).cloned();
            }
            "-A" => {
                i += 1;
                list_kind = match args.get(i).map(|s| s.as_str()) {
                    Some("function") => Some("function"),
                    Some("variable") => Some("variable"),
                    _ => None,
                };
            }
            "-a" | "-b" | "-c" => list_kind = Some("command"),
            "-v" => list_kind = Some("variable"),
            "--" => {}
            other if !other.starts_with('-') => operands.push(other.to_string()),
            _ => {}
        }
        i += 1;
    }
    let prefix = operands.first().cloned().unwrap_or_default();
    let mut candidates: Vec<String> = Vec::new();
    if let Some(words) = wordlist {
        candidates.extend(words.split_whitespace().map(str::to_string));
    }
    match list_kind {
        Some("function") => {
            candidates.extend(interp.state.functions.keys().cloned());
        }
        Some("variable") => {
            candidates.extend(interp.state.env.keys().cloned());
        }
        Some("command") => {
            candidates.extend(interp.registry.names().iter().map(|s| s.to_string()));
        }
        _ => {}
    }
    candidates.retain(|c| c.starts_with(&prefix));
    candidates.sort();
    candidates.dedup();
    if candidates.is_empty() {
        return Ok(ExecResult::code(1));
    }
    let out: String = candidates.iter().map(|c| format!("{}\n", c)).collect();
    Ok(ExecResult::new(out, String::new(), 0))
}

/// compopt adjusts options on an in-progress completion; outside one it
/// can only fail the way bash does.
pub fn run_compopt(_interp: &mut Interp<'_>, _args: &[String]) -> Exec {
    Ok(ExecResult::failure(
        "bash: compopt: not currently executing completion function\n",
    ))
}
