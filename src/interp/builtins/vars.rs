//! Variable builtins: declare/typeset/local, readonly, export, unset,
//! getopts.

use super::super::engine::Interp;
use super::super::flow::Exec;
use super::super::state::ExecResult;

/// Parse `name=value` / `name` arguments, re-joining the `arr=(a b c)`
/// form that word splitting broke apart.
fn collect_assignment_args(args: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut joining = false;
    for arg in args {
        if joining {
            if let Some(last) = out.last_mut() {
                last.push(' ');
                last.push_str(arg);
            }
            if arg.ends_with(')') {
                joining = false;
            }
            continue;
        }
        if arg.contains("=(") && !arg.ends_with(')') {
            joining = true;
        }
        out.push(arg.clone());
    }
    out
}

fn split_array_literal(value: &str) -> Option<Vec<String>> {
    let inner = value.strip_prefix('(')?.strip_suffix(')')?;
    Some(
        inner
            .split_whitespace()
            .map(|s| s.trim_matches('"').trim_matches('\'').to_string())
            .collect(),
    )
}

pub fn run_declare(interp: &mut Interp<'_>, args: &[String], local: bool) -> Exec {
    let mut declare_array = false;
    let mut readonly = false;
    let mut export = false;
    let mut print = false;
    let mut names = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-a" | "-A" => declare_array = true,
            "-r" => readonly = true,
            "-x" => export = true,
            "-p" => print = true,
            "-i" | "-l" | "-u" | "-n" | "-g" | "--" => {}
            _ => names.push(arg.clone()),
        }
    }
    if print || (names.is_empty() && !local) {
        let mut keys: Vec<&String> = interp.state.env.keys().collect();
        keys.sort();
        let out: String = keys
            .iter()
            .map(|k| {
                format!(
                    "declare -- {}=\"{}\"\n",
                    k,
                    interp.state.env.get(*k).cloned().unwrap_or_default()
                )
            })
            .collect();
        return Ok(ExecResult::new(out, String::new(), 0));
    }
    if local && interp.state.locals.is_empty() {
        return Ok(ExecResult::failure(
            "bash: local: can only be used in a function\n",
        ));
    }
    let mut stderr = String::new();
    let mut code = 0;
    for spec in collect_assignment_args(&names) {
        let (name, value) = match spec.split_once('=') {
            Some((n, v)) => (n.to_string(), Some(v.to_string())),
            None => (spec.clone(), None),
        };
        if !crate::parser::is_name(&name) {
            stderr.push_str(&format!("bash: declare: `{}': not a valid identifier\n", spec));
            code = 1;
            continue;
        }
        if interp.state.is_readonly(&name) {
            stderr.push_str(&format!("bash: declare: {}: readonly variable\n", name));
            code = 1;
            continue;
        }
        if local {
            interp.state.save_local(&name);
            // A bare `local x` leaves the variable unset in this scope.
            if value.is_none() && !declare_array {
                interp.state.env.remove(&name);
                interp.state.arrays.remove(&name);
            }
        }
        match value {
            Some(v) => {
                if let Some(items) = split_array_literal(&v) {
                    interp.state.arrays.remove(&name);
                    interp.state.env.remove(&name);
                    for (i, item) in items.iter().enumerate() {
                        interp.state.array_set(&name, i as i64, item);
                    }
                } else if declare_array {
                    interp.state.array_set(&name, 0, &v);
                } else {
                    interp.state.set_var(&name, &v);
                }
            }
            None => {
                if declare_array && !interp.state.arrays.contains_key(&name) {
                    interp
                        .state
                        .arrays
                        .insert(name.clone(), indexmap::IndexMap::new());
                }
            }
        }
        if readonly {
            interp.state.readonly_vars.insert(name.clone());
        }
        if export {
            interp.state.exported.insert(name.clone());
        }
    }
    Ok(ExecResult::new(String::new(), stderr, code))
}

pub fn run_readonly(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    if args.is_empty() || args == ["-p"] {
        let mut names: Vec<&String> = interp.state.readonly_vars.iter().collect();
        names.sort();
        let out: String = names
            .iter()
            .map(|n| match interp.state.env.get(*n) {
                Some(v) => format!("declare -r {}=\"{}\"\n", n, v),
                None => format!("declare -r {}\n", n),
            })
            .collect();
        return Ok(ExecResult::new(out, String::new(), 0));
    }
    for spec in args {
        if spec == "-p" {
            continue;
        }
        let name = match spec.split_once('=') {
            Some((n, v)) => {
                if interp.state.is_readonly(n) {
                    return Ok(ExecResult::failure(format!(
                        "bash: readonly: {}: readonly variable\n",
                        n
                    )));
                }
                interp.state.set_var(n, v);
                n.to_string()
            }
            None => spec.clone(),
        };
        interp.state.readonly_vars.insert(name);
    }
    Ok(ExecResult::ok())
}

pub fn run_export(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    if args.is_empty() || args == ["-p"] {
        let mut names: Vec<&String> = interp.state.exported.iter().collect();
        names.sort();
        let out: String = names
            .iter()
            .map(|n| match interp.state.env.get(*n) {
                Some(v) => format!("declare -x {}=\"{}\"\n", n, v),
                None => format!("declare -x {}\n", n),
            })
            .collect();
        return Ok(ExecResult::new(out, String::new(), 0));
    }
    let mut remove = false;
    for spec in args {
        match spec.as_str() {
            "-p" => continue,
            "-n" => {
                remove = true;
                continue;
            }
            _ => {}
        }
        let name = match spec.split_once('=') {
            Some((n, v)) => {
                if interp.state.is_readonly(n) {
                    return Ok(ExecResult::failure(format!(
                        "bash: export: {}: readonly variable\n",
                        n
                    )));
                }
                interp.state.set_var(n, v);
                n.to_string()
            }
            None => spec.clone(),
        };
        if remove {
            interp.state.exported.remove(&name);
        } else {
            interp.state.exported.insert(name);
        }
    }
    Ok(ExecResult::ok())
}

pub fn run_unset(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    let mut stderr = String::new();
    let mut code = 0;
    for arg in args {
        match arg.as_str() {
            "-v" | "-f" => continue,
            name => {
                if interp.state.is_readonly(name) {
                    stderr.push_str(&format!("bash: unset: {}: cannot unset: readonly variable\n", name));
                    code = 1;
                    continue;
                }
                interp.state.unset_var(name);
                interp.state.functions.remove(name);
            }
        }
    }
    Ok(ExecResult::new(String::new(), stderr, code))
}

/// One `getopts optstring name [args...]` step.
pub fn run_getopts(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    let (optstring, name) = match (args.first(), args.get(1)) {
        (Some(o), Some(n)) => (o.clone(), n.clone()),
        _ => {
            return Ok(ExecResult::failure_with_code(
                "bash: getopts: usage: getopts optstring name [arg ...]\n",
                2,
            ))
        }
    };
    let silent = optstring.starts_with(':');
    let spec: Vec<char> = optstring.trim_start_matches(':').chars().collect();
    let params: Vec<String> = if args.len() > 2 {
        args[2..].to_vec()
    } else {
        interp.state.positionals.clone()
    };
    let mut optind: usize = interp
        .state
        .env
        .get("OPTIND")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    if optind < 1 {
        optind = 1;
    }

    let done = |interp: &mut Interp<'_>, name: &str| {
        interp.state.set_var(name, "?");
        Ok(ExecResult::code(1))
    };

    let current = match params.get(optind - 1) {
        Some(p) => p.clone(),
        None => return done(interp, &name),
    };
    if !current.starts_with('-') || current == "-" {
        return done(interp, &name);
    }
    if current == "--" {
        interp.state.set_var("OPTIND", &(optind + 1).to_string());
        return done(interp, &name);
    }
    // Single option per word keeps bookkeeping simple.
    let opt = current.chars().nth(1).unwrap_or('?');
    let takes_arg = spec
        .iter()
        .position(|c| *c == opt)
        .map(|i| spec.get(i + 1) == Some(&':'))
        .unwrap_or(false);
    let known = spec.contains(&opt) && opt != ':';

    if !known {
        interp.state.set_var(&name, "?");
        interp.state.set_var("OPTIND", &(optind + 1).to_string());
        if silent {
            interp.state.set_var("OPTARG", &opt.to_string());
            return Ok(ExecResult::ok());
        }
        return Ok(ExecResult::new(
            String::new(),
            format!("bash: getopts: illegal option -- {}\n", opt),
            0,
        ));
    }
    if takes_arg {
        // The argument is the rest of the word or the next parameter.
        let rest: String = current.chars().skip(2).collect();
        let (optarg, next) = if !rest.is_empty() {
            (rest, optind + 1)
        } else {
            match params.get(optind) {
                Some(a) => (a.clone(), optind + 2),
                None => {
                    interp.state.set_var(&name, if silent { ":" } else { "?" });
                    interp.state.set_var("OPTIND", &(optind + 1).to_string());
                    if silent {
                        interp.state.set_var("OPTARG", &opt.to_string());
                        return Ok(ExecResult::ok());
                    }
                    return Ok(ExecResult::new(
                        String::new(),
                        format!("bash: getopts: option requires an argument -- {}\n", opt),
                        0,
                    ));
                }
            }
        };
        interp.state.set_var(&name, &opt.to_string());
        interp.state.set_var("OPTARG", &optarg);
        interp.state.set_var("OPTIND", &next.to_string());
        return Ok(ExecResult::ok());
    }
    interp.state.set_var(&name, &opt.to_string());
    interp.state.env.remove("OPTARG");
    interp.state.set_var("OPTIND", &(optind + 1).to_string());
    Ok(ExecResult::ok())
}
