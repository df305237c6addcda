//! Shell builtins: commands that run inside the interpreter and may
//! mutate its state. Pure text utilities live in the command bank
//! instead; dispatch tries functions, then these, then the bank.

mod alias;
mod cd;
mod complete;
mod io;
mod setopt;
mod vars;

use crate::expand::arith::eval_arith;
use crate::parser;

use super::condexpr;
use super::engine::Interp;
use super::flow::{wrap_exit_code, Exec, OutBuf, Signal};
use super::state::ExecResult;

lazy_static::lazy_static! {
    static ref BUILTIN_NAMES: std::collections::HashSet<&'static str> = [
        ":", ".", "alias", "bg", "break", "cd", "command", "continue", "declare",
        "dirs", "eval", "exec", "exit", "export", "fg", "getopts", "hash", "help",
        "history", "jobs", "let", "local", "mapfile", "popd", "pushd", "read",
        "readarray", "readonly", "return", "set", "shift", "shopt", "source",
        "test", "[", "times", "trap", "type", "typeset", "ulimit", "umask",
        "unalias", "unset", "wait", "complete", "compgen", "compopt",
    ]
    .into_iter()
    .collect();
}

/// Names the dispatcher treats as builtins.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(name)
}

/// Execute a builtin. None when the name is not a builtin.
pub fn run_builtin(
    interp: &mut Interp<'_>,
    name: &str,
    argv: &[String],
    stdin: &str,
) -> Option<Exec> {
    let args = &argv[1..];
    Some(match name {
        ":" => Ok(ExecResult::ok()),
        "break" => levels_signal(args, true),
        "continue" => levels_signal(args, false),
        "return" => {
            let code = args
                .first()
                .and_then(|a| a.parse::<i64>().ok())
                .map(wrap_exit_code)
                .unwrap_or(interp.state.last_exit);
            if interp.state.call_depth == 0 && interp.state.source_depth == 0 {
                Ok(ExecResult::failure(
                    "bash: return: can only `return' from a function or sourced script\n",
                ))
            } else {
                Err(Signal::Return { code, out: OutBuf::default() })
            }
        }
        "exit" => {
            let code = match args.first() {
                Some(arg) => match arg.parse::<i64>() {
                    Ok(n) => wrap_exit_code(n),
                    Err(_) => {
                        return Some(Err(Signal::Exit {
                            code: 2,
                            out: OutBuf::new(
                                "",
                                format!("bash: exit: {}: numeric argument required\n", arg),
                            ),
                        }))
                    }
                },
                None => interp.state.last_exit,
            };
            Err(Signal::Exit { code, out: OutBuf::default() })
        }
        "shift" => {
            let n = args
                .first()
                .and_then(|a| a.parse::<usize>().ok())
                .unwrap_or(1);
            if n > interp.state.positionals.len() {
                Ok(ExecResult::code(1))
            } else {
                interp.state.positionals.drain(..n);
                Ok(ExecResult::ok())
            }
        }
        "test" | "[" => {
            let mut args = args.to_vec();
            if name == "[" {
                if args.last().map(|s| s.as_str()) != Some("]") {
                    return Some(Ok(ExecResult::failure_with_code(
                        "bash: [: missing `]'\n",
                        2,
                    )));
                }
                args.pop();
            }
            Ok(ExecResult::code(condexpr::eval_test_args(interp, &args)))
        }
        "eval" => {
            let script = args.join(" ");
            if script.trim().is_empty() {
                return Some(Ok(ExecResult::ok()));
            }
            match parser::parse(&script) {
                Ok(parsed) => interp.run_statements(&parsed.statements, stdin),
                Err(e) => Ok(ExecResult::failure_with_code(
                    format!("bash: eval: syntax error: {}\n", e),
                    2,
                )),
            }
        }
        "." | "source" => run_source(interp, args, stdin),
        "exec" => {
            // Without a command this applies redirections permanently,
            // which the redirect wrapper has already done; with one it
            // replaces the shell, modeled as running it then exiting.
            if args.is_empty() {
                Ok(ExecResult::ok())
            } else {
                match interp.dispatch(args, stdin, false) {
                    Ok(result) => Err(Signal::Exit {
                        code: result.exit_code,
                        out: OutBuf::new(result.stdout, result.stderr),
                    }),
                    Err(sig) => Err(sig),
                }
            }
        }
        "command" => {
            let rest: Vec<String> = args
                .iter()
                .skip_while(|a| *a == "-p" || *a == "-v" || *a == "-V")
                .cloned()
                .collect();
            let describe = args.iter().any(|a| a == "-v" || a == "-V");
            if rest.is_empty() {
                Ok(ExecResult::ok())
            } else if describe {
                describe_command(interp, &rest[0], false)
            } else {
                interp.dispatch(&rest, stdin, true)
            }
        }
        "type" => {
            let mut out = String::new();
            let mut stderr = String::new();
            let mut code = 0;
            for arg in args {
                match describe_command(interp, arg, true) {
                    Ok(r) if r.exit_code == 0 => out.push_str(&r.stdout),
                    _ => {
                        stderr.push_str(&format!("bash: type: {}: not found\n", arg));
                        code = 1;
                    }
                }
            }
            Ok(ExecResult::new(out, stderr, code))
        }
        "wait" => {
            let code = match args.first() {
                Some(pid_text) => {
                    let pid: u32 = pid_text.parse().unwrap_or(0);
                    interp
                        .state
                        .jobs
                        .iter()
                        .find(|j| j.pid == pid)
                        .map(|j| j.exit_code)
                        .unwrap_or(127)
                }
                None => interp
                    .state
                    .jobs
                    .last()
                    .map(|j| j.exit_code)
                    .unwrap_or(0),
            };
            Ok(ExecResult::code(code))
        }
        "jobs" => {
            let listing: String = interp
                .state
                .jobs
                .iter()
                .enumerate()
                .map(|(i, j)| format!("[{}]   Done                    pid {}\n", i + 1, j.pid))
                .collect();
            Ok(ExecResult::new(listing, String::new(), 0))
        }
        "bg" | "fg" => Ok(ExecResult::failure(format!(
            "bash: {}: no job control\n",
            name
        ))),
        "let" => {
            if args.is_empty() {
                return Some(Ok(ExecResult::failure_with_code(
                    "bash: let: expression expected\n",
                    1,
                )));
            }
            let mut value = 0;
            for arg in args {
                match parser::arith::parse_arith(arg) {
                    Ok(expr) => match eval_arith(&expr, interp) {
                        Ok(v) => value = v,
                        Err(e) => {
                            return Some(Ok(ExecResult::failure(format!(
                                "bash: let: {}\n",
                                e.message
                            ))))
                        }
                    },
                    Err(e) => {
                        return Some(Ok(ExecResult::failure(format!("bash: let: {}\n", e))))
                    }
                }
            }
            Ok(ExecResult::code(if value != 0 { 0 } else { 1 }))
        }
        "trap" => run_trap(interp, args),
        "umask" => {
            if args.is_empty() {
                Ok(ExecResult::new("0022\n".to_string(), String::new(), 0))
            } else {
                Ok(ExecResult::ok())
            }
        }
        "ulimit" => Ok(ExecResult::new("unlimited\n".to_string(), String::new(), 0)),
        "times" => Ok(ExecResult::new(
            "0m0.000s 0m0.000s\n0m0.000s 0m0.000s\n".to_string(),
            String::new(),
            0,
        )),
        "hash" => Ok(ExecResult::ok()),
        "help" => {
            let mut names: Vec<&str> = BUILTIN_SUMMARY.iter().map(|(n, _)| *n).collect();
            names.sort_unstable();
            let mut out = String::from("Shell builtins:\n");
            for n in names {
                out.push_str("  ");
                out.push_str(n);
                out.push('\n');
            }
            Ok(ExecResult::new(out, String::new(), 0))
        }
        "history" => {
            let out: String = interp
                .state
                .history
                .iter()
                .enumerate()
                .map(|(i, line)| format!("{:5}  {}\n", i + 1, line))
                .collect();
            Ok(ExecResult::new(out, String::new(), 0))
        }
        "cd" => cd::run_cd(interp, args),
        "pushd" => cd::run_pushd(interp, args),
        "popd" => cd::run_popd(interp, args),
        "dirs" => cd::run_dirs(interp, args),
        "alias" => alias::run_alias(interp, args),
        "unalias" => alias::run_unalias(interp, args),
        "complete" => complete::run_complete(interp, args),
        "compgen" => complete::run_compgen(interp, args),
        "compopt" => complete::run_compopt(interp, args),
        "set" => setopt::run_set(interp, args),
        "shopt" => setopt::run_shopt(interp, args),
        "declare" | "typeset" => vars::run_declare(interp, args, false),
        "local" => vars::run_declare(interp, args, true),
        "readonly" => vars::run_readonly(interp, args),
        "export" => vars::run_export(interp, args),
        "unset" => vars::run_unset(interp, args),
        "getopts" => vars::run_getopts(interp, args),
        "read" => io::run_read(interp, args, stdin),
        "mapfile" | "readarray" => io::run_mapfile(interp, args, stdin),
        _ => return None,
    })
}

const BUILTIN_SUMMARY: &[(&str, &str)] = &[
    (":", "null command"),
    ("cd", "change directory"),
    ("declare", "declare variables"),
    ("echo", "write arguments"),
    ("eval", "re-parse and run arguments"),
    ("exit", "leave the shell"),
    ("export", "mark variables for export"),
    ("read", "read a line into variables"),
    ("set", "set shell options and positional parameters"),
    ("shopt", "toggle shell behavior options"),
    ("source", "run a script in the current shell"),
    ("test", "evaluate a conditional expression"),
    ("trap", "register an exit handler"),
    ("type", "describe a command name"),
    ("unset", "remove variables"),
];

fn levels_signal(args: &[String], is_break: bool) -> Exec {
    let levels = args
        .first()
        .and_then(|a| a.parse::<u32>().ok())
        .unwrap_or(1)
        .max(1);
    if is_break {
        Err(Signal::Break { levels, out: OutBuf::default() })
    } else {
        Err(Signal::Continue { levels, out: OutBuf::default() })
    }
}

fn run_source(interp: &mut Interp<'_>, args: &[String], stdin: &str) -> Exec {
    let file = match args.first() {
        Some(f) => f.clone(),
        None => {
            return Ok(ExecResult::failure_with_code(
                "bash: source: filename argument required\n",
                2,
            ))
        }
    };
    let path = interp.fs.resolve_path(&interp.state.cwd, &file);
    let fs = interp.fs.clone();
    let content = match interp.block_on(fs.read_file(&path)) {
        Ok(c) => c,
        Err(_) => {
            return Ok(ExecResult::failure(format!(
                "bash: source: {}: No such file or directory\n",
                file
            )))
        }
    };
    let parsed = match parser::parse(&content) {
        Ok(p) => p,
        Err(e) => {
            return Ok(ExecResult::failure_with_code(
                format!("bash: {}: syntax error: {}\n", file, e),
                2,
            ))
        }
    };
    // Extra arguments become positional parameters for the script.
    let saved_positionals = if args.len() > 1 {
        Some(std::mem::replace(
            &mut interp.state.positionals,
            args[1..].to_vec(),
        ))
    } else {
        None
    };
    interp.state.source_depth += 1;
    let outcome = interp.run_statements(&parsed.statements, stdin);
    interp.state.source_depth -= 1;
    if let Some(saved) = saved_positionals {
        interp.state.positionals = saved;
    }
    match outcome {
        Err(Signal::Return { code, out }) => Ok(ExecResult::new(out.stdout, out.stderr, code)),
        other => other,
    }
}

fn run_trap(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    if args.is_empty() || args[0] == "-p" {
        let mut out = String::new();
        let mut entries: Vec<(&String, &String)> = interp.state.traps.iter().collect();
        entries.sort();
        for (signal, action) in entries {
            out.push_str(&format!("trap -- '{}' {}\n", action, signal));
        }
        return Ok(ExecResult::new(out, String::new(), 0));
    }
    let action = &args[0];
    let signals = &args[1..];
    if signals.is_empty() {
        return Ok(ExecResult::failure_with_code(
            "bash: trap: usage: trap [-lp] [arg signal_spec ...]\n",
            2,
        ));
    }
    for signal in signals {
        let key = signal.to_uppercase();
        if action == "-" || action.is_empty() {
            interp.state.traps.remove(&key);
        } else {
            interp.state.traps.insert(key, action.clone());
        }
    }
    Ok(ExecResult::ok())
}

fn describe_command(interp: &mut Interp<'_>, name: &str, verbose: bool) -> Exec {
    let kind = if interp.state.aliases.contains_key(name) {
        Some(format!(
            "{} is aliased to `{}'",
            name,
            interp.state.aliases.get(name).cloned().unwrap_or_default()
        ))
    } else if crate::parser::is_name(name) && interp.state.functions.contains_key(name) {
        Some(format!("{} is a function", name))
    } else if is_builtin(name) {
        Some(format!("{} is a shell builtin", name))
    } else if interp.registry.contains(name) {
        Some(format!("{} is /usr/bin/{}", name, name))
    } else {
        None
    };
    match kind {
        Some(line) if verbose => Ok(ExecResult::new(format!("{}\n", line), String::new(), 0)),
        Some(line) => {
            // `command -v` prints just the resolution.
            let short = if interp.registry.contains(name) && !is_builtin(name) {
                format!("/usr/bin/{}\n", name)
            } else {
                format!("{}\n", line)
            };
            Ok(ExecResult::new(short, String::new(), 0))
        }
        None => Ok(ExecResult::code(1)),
    }
}
