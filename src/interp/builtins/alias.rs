//! alias / unalias.

use super::super::engine::Interp;
use super::super::flow::Exec;
use super::super::state::ExecResult;

pub fn run_alias(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    if args.is_empty() || args == ["-p"] {
        let mut entries: Vec<(&String, &String)> = interp.state.aliases.iter().collect();
        entries.sort();
        let out: String = entries
            .iter()
            .map(|(name, value)| format!("alias {}='{}'\n", name, value))
            .collect();
        return Ok(ExecResult::new(out, String::new(), 0));
    }
    let mut out = String::new();
    let mut stderr = String::new();
    let mut code = 0;
    for arg in args {
        if arg == "-p" {
            continue;
        }
        match arg.split_once('=') {
            Some((name, value)) => {
                interp
                    .state
                    .aliases
                    .insert(name.to_string(), value.to_string());
            }
            None => match interp.state.aliases.get(arg) {
                Some(value) => out.push_str(&format!("alias {}='{}'\n", arg, value)),
                None => {
                    stderr.push_str(&format!("bash: alias: {}: not found\n", arg));
                    code = 1;
                }
            },
        }
    }
    Ok(ExecResult::new(out, stderr, code))
}

pub fn run_unalias(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    if args.iter().any(|a| a == "-a") {
        interp.state.aliases.clear();
        return Ok(ExecResult::ok());
    }
    let mut stderr = String::new();
    let mut code = 0;
    for arg in args {
        if interp.state.aliases.remove(arg).is_none() {
            stderr.push_str(&format!("bash: unalias: {}: not found\n", arg));
            code = 1;
        }
    }
    Ok(ExecResult::new(String::new(), stderr, code))
}
