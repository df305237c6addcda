//! Directory builtins: cd, pushd, popd, dirs.

use super::super::engine::Interp;
use super::super::flow::Exec;
use super::super::state::ExecResult;

/// Change directory, tracking PWD/OLDPWD and `cd -`.
pub fn run_cd(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    let target = match args.first().map(|s| s.as_str()) {
        None | Some("--") => match interp.state.env.get("HOME") {
            Some(home) => home.clone(),
            None => {
                return Ok(ExecResult::failure("bash: cd: HOME not set\n"));
            }
        },
        Some("-") => {
            let prev = interp.state.prev_cwd.clone();
            let result = change_to(interp, &prev)?;
            if result.exit_code == 0 {
                return Ok(ExecResult::new(
                    format!("{}\n", interp.state.cwd),
                    String::new(),
                    0,
                ));
            }
            return Ok(result);
        }
        Some(dir) => dir.to_string(),
    };
    change_to(interp, &target)
}

fn change_to(interp: &mut Interp<'_>, target: &str) -> Exec {
    let path = interp.fs.resolve_path(&interp.state.cwd, target);
    let fs = interp.fs.clone();
    match interp.block_on(fs.stat(&path)) {
        Ok(stat) if stat.is_directory => {
            let resolved = interp
                .block_on(fs.realpath(&path))
                .unwrap_or_else(|_| path.clone());
            interp.state.prev_cwd = interp.state.cwd.clone();
            interp.state.cwd = resolved.clone();
            let prev = interp.state.prev_cwd.clone();
            interp.state.set_var("OLDPWD", &prev);
            interp.state.set_var("PWD", &resolved);
            Ok(ExecResult::ok())
        }
        Ok(_) => Ok(ExecResult::failure(format!(
            "bash: cd: {}: Not a directory\n",
            target
        ))),
        Err(_) => Ok(ExecResult::failure(format!(
            "bash: cd: {}: No such file or directory\n",
            target
        ))),
    }
}

fn render_stack(interp: &Interp<'_>) -> String {
    let mut dirs = vec![interp.state.cwd.clone()];
    dirs.extend(interp.state.dir_stack.iter().rev().cloned());
    format!("{}\n", dirs.join(" "))
}

pub fn run_pushd(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    let target = match args.first() {
        Some(t) => t.clone(),
        None => {
            // Swap the top two entries.
            match interp.state.dir_stack.pop() {
                Some(top) => {
                    let here = interp.state.cwd.clone();
                    let result = change_to(interp, &top)?;
                    if result.exit_code != 0 {
                        interp.state.dir_stack.push(top);
                        return Ok(result);
                    }
                    interp.state.dir_stack.push(here);
                    return Ok(ExecResult::new(render_stack(interp), String::new(), 0));
                }
                None => {
                    return Ok(ExecResult::failure("bash: pushd: no other directory\n"));
                }
            }
        }
    };
    let here = interp.state.cwd.clone();
    let result = change_to(interp, &target)?;
    if result.exit_code != 0 {
        return Ok(ExecResult::failure(format!(
            "bash: pushd: {}: No such file or directory\n",
            target
        )));
    }
    interp.state.dir_stack.push(here);
    Ok(ExecResult::new(render_stack(interp), String::new(), 0))
}

pub fn run_popd(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    let _ = args;
    match interp.state.dir_stack.pop() {
        Some(dir) => {
            let result = change_to(interp, &dir)?;
            if result.exit_code != 0 {
                return Ok(result);
            }
            Ok(ExecResult::new(render_stack(interp), String::new(), 0))
        }
        None => Ok(ExecResult::failure("bash: popd: directory stack empty\n")),
    }
}

pub fn run_dirs(interp: &mut Interp<'_>, args: &[String]) -> Exec {
    if args.iter().any(|a| a == "-c") {
        interp.state.dir_stack.clear();
        return Ok(ExecResult::ok());
    }
    Ok(ExecResult::new(render_stack(interp), String::new(), 0))
}
