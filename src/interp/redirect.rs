//! Redirection engine.
//!
//! A command's redirections are resolved into a [`RedirectPlan`] before
//! it runs: stdin replacement plus a destination for each output stream.
//! Captured output is written through the filesystem as one atomic
//! replace or append after the command finishes. A target that fails to
//! open short-circuits the command with exit 1.

use crate::ast::{Redirect, RedirectOp, RedirectTarget, Word};
use crate::expand::{expand_word_fields, expand_word_single};
use crate::vfs::path as vpath;

use super::engine::Interp;
use super::flow::Exec;
use super::state::ExecResult;

/// Where one output stream ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dest {
    /// Flow through to the caller unchanged.
    Inherit,
    File { path: String, append: bool },
    /// Merged into the command's stdout stream.
    IntoStdout,
    /// Merged into the command's stderr stream.
    IntoStderr,
    Discard,
}

#[derive(Debug, Clone)]
pub struct RedirectPlan {
    pub stdin: Option<String>,
    pub stdout: Dest,
    pub stderr: Dest,
}

impl Default for RedirectPlan {
    fn default() -> Self {
        Self { stdin: None, stdout: Dest::Inherit, stderr: Dest::Inherit }
    }
}

/// Resolve redirections in order. `Err` carries the short-circuit
/// result for a target that could not be opened.
pub fn build_plan(
    interp: &mut Interp<'_>,
    redirects: &[Redirect],
) -> Result<RedirectPlan, ExecResult> {
    let mut plan = RedirectPlan::default();
    for redirect in redirects {
        apply_one(interp, redirect, &mut plan)?;
    }
    Ok(plan)
}

fn expand_target(interp: &mut Interp<'_>, word: &Word) -> Result<String, ExecResult> {
    let fields = expand_word_fields(word, interp)
        .map_err(|e| ExecResult::failure(format!("bash: {}\n", e.message)))?;
    if fields.len() != 1 {
        let text = word.static_text().unwrap_or_default();
        return Err(ExecResult::failure(format!(
            "bash: {}: ambiguous redirect\n",
            text
        )));
    }
    Ok(fields.into_iter().next().unwrap_or_default())
}

fn apply_one(
    interp: &mut Interp<'_>,
    redirect: &Redirect,
    plan: &mut RedirectPlan,
) -> Result<(), ExecResult> {
    match redirect.op {
        RedirectOp::In => {
            let target = target_word(redirect)?;
            let file = expand_target(interp, &target)?;
            let path = interp.fs.resolve_path(&interp.state.cwd, &file);
            if path == "/dev/null" {
                plan.stdin = Some(String::new());
                return Ok(());
            }
            let fs = interp.fs.clone();
            match interp.block_on(fs.read_file(&path)) {
                Ok(content) => plan.stdin = Some(content),
                Err(_) => {
                    return Err(ExecResult::failure(format!(
                        "bash: {}: No such file or directory\n",
                        file
                    )))
                }
            }
        }
        RedirectOp::HereString => {
            let target = target_word(redirect)?;
            let text = expand_word_single(&target, interp)
                .map_err(|e| ExecResult::failure(format!("bash: {}\n", e.message)))?;
            plan.stdin = Some(format!("{}\n", text));
        }
        RedirectOp::HereDoc => {
            if let RedirectTarget::HereDoc { body, quoted, .. } = &redirect.target {
                let text = if *quoted {
                    body.static_text().unwrap_or_default()
                } else {
                    expand_word_single(body, interp)
                        .map_err(|e| ExecResult::failure(format!("bash: {}\n", e.message)))?
                };
                plan.stdin = Some(text);
            }
        }
        RedirectOp::Out | RedirectOp::Append => {
            let append = redirect.op == RedirectOp::Append;
            let target = target_word(redirect)?;
            let file = expand_target(interp, &target)?;
            let dest = file_dest(interp, &file, append);
            match redirect.fd {
                None | Some(1) => plan.stdout = dest,
                Some(2) => plan.stderr = dest,
                Some(_) => {}
            }
        }
        RedirectOp::OutErr | RedirectOp::AppendErr => {
            let append = redirect.op == RedirectOp::AppendErr;
            let target = target_word(redirect)?;
            let file = expand_target(interp, &target)?;
            let dest = file_dest(interp, &file, append);
            plan.stdout = dest.clone();
            // Both streams into one capture; stderr rides along after
            // stdout when the file is written.
            plan.stderr = match dest {
                Dest::File { path, .. } => Dest::File { path, append: true },
                other => other,
            };
        }
        RedirectOp::DupOut => {
            let target = target_word(redirect)?;
            let spec = expand_target(interp, &target)?;
            let from = redirect.fd.unwrap_or(1);
            match spec.as_str() {
                "1" => {
                    if from == 2 {
                        // Sharing a capture file means the second stream
                        // appends behind the first.
                        plan.stderr = match &plan.stdout {
                            Dest::Inherit => Dest::IntoStdout,
                            Dest::File { path, .. } => {
                                Dest::File { path: path.clone(), append: true }
                            }
                            other => other.clone(),
                        };
                    }
                }
                "2" => {
                    if from == 1 {
                        plan.stdout = match &plan.stderr {
                            Dest::Inherit => Dest::IntoStderr,
                            Dest::File { path, .. } => {
                                Dest::File { path: path.clone(), append: true }
                            }
                            other => other.clone(),
                        };
                    }
                }
                "-" => match from {
                    1 => plan.stdout = Dest::Discard,
                    2 => plan.stderr = Dest::Discard,
                    _ => {}
                },
                _ => {
                    return Err(ExecResult::failure(format!(
                        "bash: {}: bad file descriptor\n",
                        spec
                    )))
                }
            }
        }
        RedirectOp::DupIn => {
            let target = target_word(redirect)?;
            let spec = expand_target(interp, &target)?;
            if spec == "-" {
                plan.stdin = Some(String::new());
            }
        }
    }
    Ok(())
}

fn target_word(redirect: &Redirect) -> Result<Word, ExecResult> {
    match &redirect.target {
        RedirectTarget::Word(word) => Ok(word.clone()),
        RedirectTarget::HereDoc { .. } => {
            Err(ExecResult::failure("bash: bad redirection target\n"))
        }
    }
}

fn file_dest(interp: &Interp<'_>, file: &str, append: bool) -> Dest {
    let path = interp.fs.resolve_path(&interp.state.cwd, file);
    match path.as_str() {
        "/dev/null" => Dest::Discard,
        "/dev/stdout" => Dest::IntoStdout,
        "/dev/stderr" => Dest::IntoStderr,
        _ => Dest::File { path, append },
    }
}

/// Route a finished command's output through the plan, writing captures
/// to the filesystem. Applies to the signal arm too, so `{ echo x;
/// exit 1; } > f` still lands `x` in the file.
pub fn finish(interp: &mut Interp<'_>, plan: &RedirectPlan, exec: Exec) -> Exec {
    match exec {
        Ok(result) => {
            let (stdout, stderr, write_error) =
                route(interp, plan, result.stdout, result.stderr);
            match write_error {
                Some(message) => Ok(ExecResult::failure(format!("{}{}", stderr, message))),
                None => Ok(ExecResult::new(stdout, stderr, result.exit_code)),
            }
        }
        Err(mut sig) => {
            let out = sig.out_mut();
            let (stdout, stderr, write_error) = route(
                interp,
                plan,
                std::mem::take(&mut out.stdout),
                std::mem::take(&mut out.stderr),
            );
            out.stdout = stdout;
            out.stderr = stderr;
            if let Some(message) = write_error {
                out.stderr.push_str(&message);
            }
            Err(sig)
        }
    }
}

fn route(
    interp: &mut Interp<'_>,
    plan: &RedirectPlan,
    cmd_stdout: String,
    cmd_stderr: String,
) -> (String, String, Option<String>) {
    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut error = None;

    // Stream payloads after fd-merge resolution.
    let stdout_payload = match plan.stderr {
        Dest::IntoStdout => format!("{}{}", cmd_stdout, cmd_stderr),
        _ => cmd_stdout.clone(),
    };
    let stderr_payload = match plan.stdout {
        Dest::IntoStderr => format!("{}{}", cmd_stderr, cmd_stdout),
        _ => cmd_stderr.clone(),
    };

    match &plan.stdout {
        Dest::Inherit => stdout.push_str(&stdout_payload),
        Dest::IntoStderr => {}
        Dest::IntoStdout => stdout.push_str(&stdout_payload),
        Dest::Discard => {}
        Dest::File { path, append } => {
            if let Err(e) = write_capture(interp, path, &stdout_payload, *append) {
                error = Some(e);
            }
        }
    }
    match &plan.stderr {
        Dest::Inherit => stderr.push_str(&stderr_payload),
        Dest::IntoStdout => {}
        Dest::IntoStderr => stderr.push_str(&stderr_payload),
        Dest::Discard => {}
        Dest::File { path, append } => {
            if error.is_none() {
                if let Err(e) = write_capture(interp, path, &stderr_payload, *append) {
                    error = Some(e);
                }
            }
        }
    }
    (stdout, stderr, error)
}

fn write_capture(
    interp: &mut Interp<'_>,
    path: &str,
    content: &str,
    append: bool,
) -> Result<(), String> {
    let fs = interp.fs.clone();
    let result = if append {
        interp.block_on(fs.append_file(path, content.as_bytes()))
    } else {
        interp.block_on(fs.write_file(path, content.as_bytes()))
    };
    result.map_err(|e| {
        let name = vpath::file_name(path);
        let reason = match e.code() {
            "EROFS" => "Read-only file system",
            "EISDIR" => "Is a directory",
            "ENOENT" => "No such file or directory",
            "ENOTDIR" => "Not a directory",
            _ => "Cannot open file",
        };
        format!("bash: {}: {}\n", name, reason)
    })
}
