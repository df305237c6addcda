//! `[[ ]]` evaluation and the argv-based `test`/`[` expression grammar.

use regex_lite::Regex;

use crate::ast::CondExpr;
use crate::expand::pattern::matches_glob;
use crate::expand::{expand_word_pattern, expand_word_single};

use super::engine::Interp;
use super::flow::Exec;
use super::state::ExecResult;

/// Run a `[[ ... ]]` command: exit 0 on true, 1 on false, 2 on error.
pub fn eval_cond_command(interp: &mut Interp<'_>, expr: &CondExpr) -> Exec {
    match eval_cond(interp, expr) {
        Ok(true) => Ok(ExecResult::ok()),
        Ok(false) => Ok(ExecResult::code(1)),
        Err(message) => Ok(ExecResult::failure_with_code(
            format!("bash: [[: {}\n", message),
            2,
        )),
    }
}

fn eval_cond(interp: &mut Interp<'_>, expr: &CondExpr) -> Result<bool, String> {
    match expr {
        CondExpr::Not(inner) => Ok(!eval_cond(interp, inner)?),
        CondExpr::And(lhs, rhs) => Ok(eval_cond(interp, lhs)? && eval_cond(interp, rhs)?),
        CondExpr::Or(lhs, rhs) => Ok(eval_cond(interp, lhs)? || eval_cond(interp, rhs)?),
        CondExpr::Word(word) => {
            let text = expand_word_single(word, interp).map_err(|e| e.message.clone())?;
            Ok(!text.is_empty())
        }
        CondExpr::Unary { op, operand } => {
            let text = expand_word_single(operand, interp).map_err(|e| e.message.clone())?;
            eval_unary(interp, op, &text)
        }
        CondExpr::Binary { op, lhs, rhs } => {
            let left = expand_word_single(lhs, interp).map_err(|e| e.message.clone())?;
            match op.as_str() {
                "==" | "=" | "!=" => {
                    // The right side is a glob pattern; quoting escapes it.
                    let pattern =
                        expand_word_pattern(rhs, interp).map_err(|e| e.message.clone())?;
                    let nocase = interp.state.shopt.nocasematch;
                    let matched = matches_glob(&pattern, &left, nocase);
                    Ok(if op == "!=" { !matched } else { matched })
                }
                "=~" => {
                    let pattern =
                        expand_word_single(rhs, interp).map_err(|e| e.message.clone())?;
                    let source = if interp.state.shopt.nocasematch {
                        format!("(?i){}", pattern)
                    } else {
                        pattern.clone()
                    };
                    let re = Regex::new(&source)
                        .map_err(|_| format!("invalid regex: {}", pattern))?;
                    match re.captures(&left) {
                        Some(caps) => {
                            interp.state.rematch = (0..caps.len())
                                .map(|i| {
                                    caps.get(i)
                                        .map(|m| m.as_str().to_string())
                                        .unwrap_or_default()
                                })
                                .collect();
                            Ok(true)
                        }
                        None => {
                            interp.state.rematch = Vec::new();
                            Ok(false)
                        }
                    }
                }
                "<" => Ok(left < expand_word_single(rhs, interp).map_err(|e| e.message.clone())?),
                ">" => Ok(left > expand_word_single(rhs, interp).map_err(|e| e.message.clone())?),
                "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge" => {
                    let right =
                        expand_word_single(rhs, interp).map_err(|e| e.message.clone())?;
                    let a = numeric_operand(interp, &left)?;
                    let b = numeric_operand(interp, &right)?;
                    Ok(match op.as_str() {
                        "-eq" => a == b,
                        "-ne" => a != b,
                        "-lt" => a < b,
                        "-le" => a <= b,
                        "-gt" => a > b,
                        _ => a >= b,
                    })
                }
                "-nt" | "-ot" | "-ef" => {
                    let right =
                        expand_word_single(rhs, interp).map_err(|e| e.message.clone())?;
                    eval_file_pair(interp, op, &left, &right)
                }
                other => Err(format!("unknown operator: {}", other)),
            }
        }
    }
}

/// Numeric operands are full arithmetic expressions.
fn numeric_operand(interp: &mut Interp<'_>, text: &str) -> Result<i64, String> {
    let expr = crate::parser::arith::parse_arith(text.trim())?;
    crate::expand::arith::eval_arith(&expr, interp).map_err(|e| e.message)
}

fn eval_unary(interp: &mut Interp<'_>, op: &str, operand: &str) -> Result<bool, String> {
    match op {
        "-z" => return Ok(operand.is_empty()),
        "-n" => return Ok(!operand.is_empty()),
        "-v" => return Ok(crate::expand::ExpansionHost::var_is_set(interp, operand)),
        "-o" => return Ok(option_is_set(interp, operand)),
        "-t" => return Ok(false),
        _ => {}
    }
    // File tests.
    let path = interp.fs.resolve_path(&interp.state.cwd, operand);
    let fs = interp.fs.clone();
    let stat = interp.block_on(fs.stat(&path)).ok();
    let lstat = interp.block_on(fs.lstat(&path)).ok();
    Ok(match op {
        "-e" | "-a" => stat.is_some(),
        "-f" => stat.as_ref().map(|s| s.is_file).unwrap_or(false),
        "-d" => stat.as_ref().map(|s| s.is_directory).unwrap_or(false),
        "-L" | "-h" => lstat.as_ref().map(|s| s.is_symlink).unwrap_or(false),
        "-s" => stat.as_ref().map(|s| s.size > 0).unwrap_or(false),
        "-r" => stat.as_ref().map(|s| s.mode & 0o444 != 0).unwrap_or(false),
        "-w" => {
            !interp.fs.is_read_only()
                && stat.as_ref().map(|s| s.mode & 0o222 != 0).unwrap_or(false)
        }
        "-x" => stat.as_ref().map(|s| s.mode & 0o111 != 0).unwrap_or(false),
        "-p" | "-S" | "-b" | "-c" | "-g" | "-k" | "-u" | "-G" | "-O" => false,
        "-N" => false,
        _ => return Err(format!("{}: unary operator expected", op)),
    })
}

fn option_is_set(interp: &Interp<'_>, name: &str) -> bool {
    let opts = &interp.state.opts;
    match name {
        "errexit" => opts.errexit,
        "pipefail" => opts.pipefail,
        "nounset" => opts.nounset,
        "xtrace" => opts.xtrace,
        "verbose" => opts.verbose,
        "noglob" => opts.noglob,
        "noexec" => opts.noexec,
        "noclobber" => opts.noclobber,
        "allexport" => opts.allexport,
        _ => false,
    }
}

fn eval_file_pair(
    interp: &mut Interp<'_>,
    op: &str,
    left: &str,
    right: &str,
) -> Result<bool, String> {
    let fs = interp.fs.clone();
    let a = interp.block_on(fs.stat(&interp.fs.resolve_path(&interp.state.cwd, left)));
    let b = interp.block_on(fs.stat(&interp.fs.resolve_path(&interp.state.cwd, right)));
    Ok(match op {
        "-nt" => match (&a, &b) {
            (Ok(a), Ok(b)) => a.mtime > b.mtime,
            (Ok(_), Err(_)) => true,
            _ => false,
        },
        "-ot" => match (&a, &b) {
            (Ok(a), Ok(b)) => a.mtime < b.mtime,
            (Err(_), Ok(_)) => true,
            _ => false,
        },
        "-ef" => {
            // Hard links are not modeled; only identical paths qualify.
            a.is_ok()
                && b.is_ok()
                && interp.fs.resolve_path(&interp.state.cwd, left)
                    == interp.fs.resolve_path(&interp.state.cwd, right)
        }
        _ => false,
    })
}

// ---------------------------------------------------------------------------
// test / [ over argv
// ---------------------------------------------------------------------------

/// Evaluate `test` arguments: 0 true, 1 false, 2 usage error.
pub fn eval_test_args(interp: &mut Interp<'_>, args: &[String]) -> i32 {
    let mut parser = TestParser { args, pos: 0 };
    match parser.parse_or(interp) {
        Ok(value) => {
            if parser.pos != args.len() {
                return 2;
            }
            if value {
                0
            } else {
                1
            }
        }
        Err(_) => 2,
    }
}

struct TestParser<'t> {
    args: &'t [String],
    pos: usize,
}

impl<'t> TestParser<'t> {
    fn peek(&self) -> Option<&str> {
        self.args.get(self.pos).map(|s| s.as_str())
    }

    fn next(&mut self) -> Option<&'t str> {
        let value = self.args.get(self.pos).map(|s| s.as_str());
        if value.is_some() {
            self.pos += 1;
        }
        value
    }

    fn parse_or(&mut self, interp: &mut Interp<'_>) -> Result<bool, String> {
        let mut value = self.parse_and(interp)?;
        while self.peek() == Some("-o") {
            self.pos += 1;
            let rhs = self.parse_and(interp)?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn parse_and(&mut self, interp: &mut Interp<'_>) -> Result<bool, String> {
        let mut value = self.parse_term(interp)?;
        while self.peek() == Some("-a") {
            self.pos += 1;
            let rhs = self.parse_term(interp)?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn parse_term(&mut self, interp: &mut Interp<'_>) -> Result<bool, String> {
        match self.peek() {
            None => return Ok(false),
            Some("!") => {
                self.pos += 1;
                return Ok(!self.parse_term(interp)?);
            }
            Some("(") => {
                self.pos += 1;
                let inner = self.parse_or(interp)?;
                if self.next() != Some(")") {
                    return Err("missing `)'".to_string());
                }
                return Ok(inner);
            }
            _ => {}
        }
        // Binary form: arg op arg.
        if self.args.len() - self.pos >= 3 {
            let op = &self.args[self.pos + 1];
            const BINARY: &[&str] = &[
                "=", "==", "!=", "<", ">", "-eq", "-ne", "-lt", "-le", "-gt", "-ge", "-nt",
                "-ot", "-ef",
            ];
            if BINARY.contains(&op.as_str()) {
                let left = self.args[self.pos].clone();
                let op = op.clone();
                let right = self.args[self.pos + 2].clone();
                self.pos += 3;
                return binary_test(interp, &op, &left, &right);
            }
        }
        // Unary form: -x arg.
        if self.args.len() - self.pos >= 2 {
            let op = &self.args[self.pos];
            if op.starts_with('-') && op.len() == 2 {
                let op = op.clone();
                let operand = self.args[self.pos + 1].clone();
                self.pos += 2;
                return eval_unary(interp, &op, &operand);
            }
        }
        // Single argument: true when non-empty.
        let value = self.next().map(|s| !s.is_empty()).unwrap_or(false);
        Ok(value)
    }
}

fn binary_test(
    interp: &mut Interp<'_>,
    op: &str,
    left: &str,
    right: &str,
) -> Result<bool, String> {
    match op {
        "=" | "==" => Ok(left == right),
        "!=" => Ok(left != right),
        "<" => Ok(left < right),
        ">" => Ok(left > right),
        "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge" => {
            let a: i64 = left.trim().parse().map_err(|_| "integer expected")?;
            let b: i64 = right.trim().parse().map_err(|_| "integer expected")?;
            Ok(match op {
                "-eq" => a == b,
                "-ne" => a != b,
                "-lt" => a < b,
                "-le" => a <= b,
                "-gt" => a > b,
                _ => a >= b,
            })
        }
        "-nt" | "-ot" | "-ef" => eval_file_pair(interp, op, left, right),
        _ => Err(format!("unknown operator {}", op)),
    }
}
