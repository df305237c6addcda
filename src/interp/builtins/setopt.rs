//! set and shopt.

use super::super::engine::Interp;
use super::super::flow::Exec;
use super::super::state::ExecResult;

/// `set [-+ euxvfnC] [-o name] [--] [args...]`
pub fn run_set(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    if args.is_empty() {
        // Listing every variable; sorted for stable output.
        let mut names: Vec<&String> = interp.state.env.keys().collect();
        names.sort();
        let out: String = names
            .iter()
            .map(|n| format!("{}={}\n", n, interp.state.env.get(*n).cloned().unwrap_or_default()))
            .collect();
        return Ok(ExecResult::new(out, String::new(), 0));
    }
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--" => {
                interp.state.positionals = args[i + 1..].to_vec();
                return Ok(ExecResult::ok());
            }
            "-o" | "+o" => {
                let enable = arg.starts_with('-');
                i += 1;
                let name = match args.get(i) {
                    Some(n) => n.as_str(),
                    None => return Ok(list_o_options(interp)),
                };
                if !apply_named_option(interp, name, enable) {
                    return Ok(ExecResult::failure(format!(
                        "bash: set: {}: invalid option name\n",
                        name
                    )));
                }
            }
            _ if arg.starts_with('-') || arg.starts_with('+') => {
                let enable = arg.starts_with('-');
                for flag in arg.chars().skip(1) {
                    if !apply_flag(interp, flag, enable) {
                        return Ok(ExecResult::failure_with_code(
                            format!("bash: set: {}{}: invalid option\n",
                                if enable { "-" } else { "+" }, flag),
                            2,
                        ));
                    }
                }
            }
            _ => {
                interp.state.positionals = args[i..].to_vec();
                return Ok(ExecResult::ok());
            }
        }
        i += 1;
    }
    Ok(ExecResult::ok())
}

fn apply_flag(interp: &mut Interp<'_>, flag: char, enable: bool) -> bool {
    let opts = &mut interp.state.opts;
    match flag {
        'e' => opts.errexit = enable,
        'u' => opts.nounset = enable,
        'x' => opts.xtrace = enable,
        'v' => opts.verbose = enable,
        'f' => opts.noglob = enable,
        'n' => opts.noexec = enable,
        'C' => opts.noclobber = enable,
        'a' => opts.allexport = enable,
        'h' | 'B' | 'H' | 'm' => {}
        _ => return false,
    }
    true
}

fn apply_named_option(interp: &mut Interp<'_>, name: &str, enable: bool) -> bool {
    let opts = &mut interp.state.opts;
    match name {
        "errexit" => opts.errexit = enable,
        "nounset" => opts.nounset = enable,
        "xtrace" => opts.xtrace = enable,
        "verbose" => opts.verbose = enable,
        "noglob" => opts.noglob = enable,
        "noexec" => opts.noexec = enable,
        "noclobber" => opts.noclobber = enable,
        "allexport" => opts.allexport = enable,
        "pipefail" => opts.pipefail = enable,
        "posix" | "emacs" | "vi" | "history" => {}
        _ => return false,
    }
    true
}

fn list_o_options(interp: &Interp<'_>) -> ExecResult {
    let opts = &interp.state.opts;
    let rows = [
        ("allexport", opts.allexport),
        ("errexit", opts.errexit),
        ("noclobber", opts.noclobber),
        ("noexec", opts.noexec),
        ("noglob", opts.noglob),
        ("nounset", opts.nounset),
        ("pipefail", opts.pipefail),
        ("verbose", opts.verbose),
        ("xtrace", opts.xtrace),
    ];
    let out: String = rows
        .iter()
        .map(|(name, on)| format!("{:<15} {}\n", name, if *on { "on" } else { "off" }))
        .collect();
    ExecResult::new(out, String::new(), 0)
}

/// `shopt [-s|-u] [-q] [name...]`
pub fn run_shopt(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    let mut setting: Option<bool> = None;
    let mut quiet = false;
    let mut names = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-s" => setting = Some(true),
            "-u" => setting = Some(false),
            "-q" => quiet = true,
            "-o" => {}
            _ => names.push(arg.clone()),
        }
    }
    if names.is_empty() {
        let rows = shopt_rows(interp);
        let out: String = rows
            .iter()
            .filter(|(_, on)| setting.map_or(true, |want| *on == want))
            .map(|(name, on)| format!("{:<15} {}\n", name, if *on { "on" } else { "off" }))
            .collect();
        return Ok(ExecResult::new(out, String::new(), 0));
    }
    let mut out = String::new();
    let mut stderr = String::new();
    let mut code = 0;
    for name in &names {
        match setting {
            Some(enable) => {
                if !apply_shopt(interp, name, enable) {
                    stderr.push_str(&format!("bash: shopt: {}: invalid shell option name\n", name));
                    code = 1;
                }
            }
            None => match shopt_get(interp, name) {
                Some(on) => {
                    if !quiet {
                        out.push_str(&format!(
                            "{:<15} {}\n",
                            name,
                            if on { "on" } else { "off" }
                        ));
                    }
                    if !on {
                        code = 1;
                    }
                }
                None => {
                    stderr.push_str(&format!("bash: shopt: {}: invalid shell option name\n", name));
                    code = 1;
                }
            },
        }
    }
    Ok(ExecResult::new(out, stderr, code))
}

fn shopt_rows(interp: &Interp<'_>) -> Vec<(&'static str, bool)> {
    let s = &interp.state.shopt;
    vec![
        ("dotglob", s.dotglob),
        ("expand_aliases", s.expand_aliases),
        ("extglob", s.extglob),
        ("failglob", s.failglob),
        ("globstar", s.globstar),
        ("nocaseglob", s.nocaseglob),
        ("nocasematch", s.nocasematch),
        ("nullglob", s.nullglob),
    ]
}

fn shopt_get(interp: &Interp<'_>, name: &str) -> Option<bool> {
    shopt_rows(interp)
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, on)| on)
}

fn apply_shopt(interp: &mut Interp<'_>, name: &str, enable: bool) -> bool {
    let s = &mut interp.state.shopt;
    match name {
        "dotglob" => s.dotglob = enable,
        "expand_aliases" => s.expand_aliases = enable,
        "extglob" => s.extglob = enable,
        "failglob" => s.failglob = enable,
        "globstar" => s.globstar = enable,
        "nocaseglob" => s.nocaseglob = enable,
        "nocasematch" => s.nocasematch = enable,
        "nullglob" => s.nullglob = enable,
        _ => return false,
    }
    true
}
