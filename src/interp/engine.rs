//! The statement interpreter.
//!
//! Walks the AST executing statements sequentially. Synchronous: async
//! work (filesystem, utility bank, network) is bridged with
//! `block_in_place` on the runtime handle, the same trick the library
//! entry point uses to host this engine inside an async caller.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::*;
use crate::commands::{CommandContext, CommandRegistry, CommandResult, ExecFn};
use crate::expand::{
    self, expand_word_pattern, expand_word_single, expand_words, ExpandError, ExpandOptions,
    ExpansionHost,
};
use crate::jsrt::GuestRuntime;
use crate::net::{secure_fetch_fn, FetchFn, NetworkConfig};
use crate::parser;
use crate::vfs::{path as vpath, Vfs};

use super::builtins;
use super::condexpr;
use super::flow::{Exec, OutBuf, Signal};
use super::pipeline;
use super::redirect;
use super::state::{ExecLimits, ExecResult, Job, LocalFrame, ShellState};

pub struct Interp<'a> {
    pub state: &'a mut ShellState,
    pub limits: &'a ExecLimits,
    pub fs: Arc<dyn Vfs>,
    pub registry: Arc<CommandRegistry>,
    pub net: NetworkConfig,
    pub transport: Option<FetchFn>,
    pub guest: Option<Arc<dyn GuestRuntime>>,
    pub handle: tokio::runtime::Handle,
    /// Stdin buffers for enclosing compound commands; `read` consumes
    /// from the innermost.
    pub stdin_stack: Vec<String>,
    /// Stderr produced by command substitutions during expansion,
    /// surfaced on the expanding command.
    pub pending_stderr: String,
    /// Exit code of the most recent command substitution, which becomes
    /// the exit code of an assignment-only command.
    pub subst_exit: Option<i32>,
}

impl<'a> Interp<'a> {
    pub fn new(
        state: &'a mut ShellState,
        limits: &'a ExecLimits,
        fs: Arc<dyn Vfs>,
        registry: Arc<CommandRegistry>,
        net: NetworkConfig,
        transport: Option<FetchFn>,
        guest: Option<Arc<dyn GuestRuntime>>,
        handle: tokio::runtime::Handle,
    ) -> Self {
        Self {
            state,
            limits,
            fs,
            registry,
            net,
            transport,
            guest,
            handle,
            stdin_stack: Vec::new(),
            pending_stderr: String::new(),
            subst_exit: None,
        }
    }

    pub fn block_on<F, T>(&self, fut: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        tokio::task::block_in_place(|| self.handle.block_on(fut))
    }

    // -- top level ----------------------------------------------------------

    /// Run a whole script, converting terminal signals into a result.
    pub fn run(&mut self, script: &Script) -> ExecResult {
        match self.run_statements(&script.statements, "") {
            Ok(result) => result,
            Err(Signal::Exit { code, out }) | Err(Signal::Errexit { code, out }) => {
                ExecResult::new(out.stdout, out.stderr, code)
            }
            Err(Signal::Return { code, out }) => ExecResult::new(out.stdout, out.stderr, code),
            Err(Signal::Limit { message, out }) => ExecResult::new(
                out.stdout,
                format!("{}bash: {}\n", out.stderr, message),
                126,
            ),
            Err(Signal::Break { out, .. }) | Err(Signal::Continue { out, .. }) => {
                ExecResult::new(out.stdout, out.stderr, self.state.last_exit)
            }
        }
    }

    pub fn run_statements(&mut self, statements: &[Statement], stdin: &str) -> Exec {
        let mut out = OutBuf::default();
        let mut code = self.state.last_exit;
        for statement in statements {
            match self.run_statement(statement, stdin) {
                Ok(result) => {
                    out.push(&result);
                    code = result.exit_code;
                }
                Err(sig) => return Err(sig.prepended(&out)),
            }
        }
        Ok(ExecResult::new(out.stdout, out.stderr, code))
    }

    fn run_statement(&mut self, statement: &Statement, stdin: &str) -> Exec {
        if self.state.opts.noexec {
            return Ok(ExecResult::ok());
        }
        if statement.background {
            return self.run_background(statement, stdin);
        }
        let mut out = OutBuf::default();
        let mut code;
        let mut last_negated = statement.first.negated;
        let mut short_circuited = false;

        match pipeline::run_pipeline(self, &statement.first, stdin) {
            Ok(result) => {
                out.push(&result);
                code = result.exit_code;
                self.state.last_exit = code;
            }
            Err(sig) => return Err(sig.prepended(&out)),
        }
        for (op, pl) in &statement.rest {
            let run = match op {
                AndOr::And => code == 0,
                AndOr::Or => code != 0,
            };
            if !run {
                short_circuited = true;
                continue;
            }
            short_circuited = false;
            last_negated = pl.negated;
            match pipeline::run_pipeline(self, pl, stdin) {
                Ok(result) => {
                    out.push(&result);
                    code = result.exit_code;
                    self.state.last_exit = code;
                }
                Err(sig) => return Err(sig.prepended(&out)),
            }
        }

        // set -e: a failure terminates the script unless this statement
        // is a condition, is negated, or stopped early in an and-or list.
        if code != 0
            && self.state.opts.errexit
            && !self.state.in_condition
            && !last_negated
            && !short_circuited
        {
            return Err(Signal::Errexit { code, out });
        }
        Ok(ExecResult::new(out.stdout, out.stderr, code))
    }

    /// `cmd &`: run now (nothing is concurrent), record the real exit
    /// code under a fresh virtual pid, and report success.
    fn run_background(&mut self, statement: &Statement, stdin: &str) -> Exec {
        let pid = self.state.next_pid;
        self.state.next_pid += 1;
        self.state.last_bg_pid = pid;

        let saved = self.state.clone();
        let foreground = Statement {
            first: statement.first.clone(),
            rest: statement.rest.clone(),
            background: false,
        };
        let result = match self.run_statement(&foreground, stdin) {
            Ok(r) => r,
            Err(sig) => {
                let (code, out) = match sig {
                    Signal::Exit { code, out } | Signal::Errexit { code, out } => (code, out),
                    Signal::Return { code, out } => (code, out),
                    Signal::Break { out, .. } | Signal::Continue { out, .. } => (0, out),
                    Signal::Limit { message, out } => {
                        return Err(Signal::Limit { message, out });
                    }
                };
                ExecResult::new(out.stdout, out.stderr, code)
            }
        };
        // Variable mutations stay in the job's own world; the filesystem
        // is shared.
        let exit_code = result.exit_code;
        *self.state = saved;
        self.state.last_bg_pid = pid;
        self.state.jobs.push(Job { pid, exit_code });
        Ok(ExecResult::new(result.stdout, result.stderr, 0))
    }

    // -- commands -----------------------------------------------------------

    pub fn run_command(&mut self, command: &Command, stdin: &str) -> Exec {
        match command {
            Command::Simple(cmd) => {
                let redirects = cmd.redirects.clone();
                self.run_with_redirects(&redirects, stdin, |interp, stdin| {
                    interp.run_simple(cmd, stdin)
                })
            }
            Command::Compound(compound, redirects) => {
                let redirects = redirects.clone();
                self.run_with_redirects(&redirects, stdin, |interp, stdin| {
                    interp.run_compound(compound, stdin)
                })
            }
            Command::FunctionDef(def) => {
                self.state.functions.insert(def.name.clone(), def.clone());
                Ok(ExecResult::ok())
            }
        }
    }

    fn run_with_redirects<F>(&mut self, redirects: &[Redirect], stdin: &str, f: F) -> Exec
    where
        F: FnOnce(&mut Self, &str) -> Exec,
    {
        if redirects.is_empty() {
            return f(self, stdin);
        }
        let plan = match redirect::build_plan(self, redirects) {
            Ok(plan) => plan,
            Err(result) => return Ok(result),
        };
        let inner_stdin = match &plan.stdin {
            Some(s) => s.clone(),
            None => stdin.to_string(),
        };
        let result = f(self, &inner_stdin);
        redirect::finish(self, &plan, result)
    }

    fn run_compound(&mut self, compound: &CompoundCommand, stdin: &str) -> Exec {
        let pushed = !stdin.is_empty();
        if pushed {
            self.stdin_stack.push(stdin.to_string());
        }
        let result = self.run_compound_inner(compound, stdin);
        if pushed {
            self.stdin_stack.pop();
        }
        result
    }

    fn run_compound_inner(&mut self, compound: &CompoundCommand, stdin: &str) -> Exec {
        match compound {
            CompoundCommand::If { clauses, else_body } => {
                let mut out = OutBuf::default();
                for (cond, body) in clauses {
                    let code = self.run_condition(cond, &mut out)?;
                    if code == 0 {
                        let result = self
                            .run_statements(body, "")
                            .map_err(|sig| sig.prepended(&out))?;
                        out.push(&result);
                        return Ok(ExecResult::new(out.stdout, out.stderr, result.exit_code));
                    }
                }
                if let Some(body) = else_body {
                    let result = self
                        .run_statements(body, "")
                        .map_err(|sig| sig.prepended(&out))?;
                    out.push(&result);
                    return Ok(ExecResult::new(out.stdout, out.stderr, result.exit_code));
                }
                Ok(ExecResult::new(out.stdout, out.stderr, 0))
            }
            CompoundCommand::While { cond, body } => self.run_loop(cond, body, false),
            CompoundCommand::Until { cond, body } => self.run_loop(cond, body, true),
            CompoundCommand::For { var, words, body } => self.run_for(var, words.as_deref(), body),
            CompoundCommand::ForArith { init, cond, step, body } => {
                self.run_for_arith(init.as_ref(), cond.as_ref(), step.as_ref(), body)
            }
            CompoundCommand::Case { word, items } => self.run_case(word, items),
            CompoundCommand::Subshell(body) => self.run_subshell(body, stdin),
            CompoundCommand::Group(body) => self.run_statements(body, ""),
            CompoundCommand::Arith(expr) => match expand::arith::eval_arith(expr, self) {
                Ok(v) => Ok(ExecResult::code(if v != 0 { 0 } else { 1 })),
                Err(e) => Ok(ExecResult::failure(format!("bash: {}\n", e.message))),
            },
            CompoundCommand::Cond(expr) => condexpr::eval_cond_command(self, expr),
        }
    }

    /// Run a condition list with errexit suspended.
    fn run_condition(&mut self, cond: &[Statement], out: &mut OutBuf) -> Result<i32, Signal> {
        let was = self.state.in_condition;
        self.state.in_condition = true;
        let result = self.run_statements(cond, "");
        self.state.in_condition = was;
        match result {
            Ok(r) => {
                let code = r.exit_code;
                out.push(&r);
                Ok(code)
            }
            Err(sig) => Err(sig.prepended(out)),
        }
    }

    fn run_loop(&mut self, cond: &[Statement], body: &[Statement], until: bool) -> Exec {
        let mut out = OutBuf::default();
        let mut code = 0;
        let mut iterations = 0u64;
        self.state.loop_depth += 1;
        let finish = |s: &mut Self| s.state.loop_depth -= 1;
        loop {
            iterations += 1;
            if iterations > self.limits.max_loop_iterations {
                finish(self);
                return Err(Signal::Limit {
                    message: format!(
                        "maximum loop iterations ({}) exceeded",
                        self.limits.max_loop_iterations
                    ),
                    out,
                });
            }
            let cond_code = match self.run_condition(cond, &mut out) {
                Ok(c) => c,
                Err(sig) => {
                    finish(self);
                    return Err(sig);
                }
            };
            let proceed = if until { cond_code != 0 } else { cond_code == 0 };
            if !proceed {
                break;
            }
            match self.run_statements(body, "") {
                Ok(result) => {
                    out.push(&result);
                    code = result.exit_code;
                }
                Err(sig) => match self.handle_loop_signal(sig, &mut out) {
                    LoopFlow::Continue => continue,
                    LoopFlow::Break => break,
                    LoopFlow::Propagate(sig) => {
                        finish(self);
                        return Err(sig);
                    }
                },
            }
        }
        finish(self);
        Ok(ExecResult::new(out.stdout, out.stderr, code))
    }

    fn run_for(&mut self, var: &str, words: Option<&[Word]>, body: &[Statement]) -> Exec {
        let items = match words {
            Some(words) => match expand_words(words, self) {
                Ok(items) => items,
                Err(e) => return Ok(self.expansion_failure(e)),
            },
            None => self.state.positionals.clone(),
        };
        let mut out = OutBuf::default();
        let mut code = 0;
        let mut iterations = 0u64;
        self.state.loop_depth += 1;
        for item in items {
            iterations += 1;
            if iterations > self.limits.max_loop_iterations {
                self.state.loop_depth -= 1;
                return Err(Signal::Limit {
                    message: format!(
                        "maximum loop iterations ({}) exceeded",
                        self.limits.max_loop_iterations
                    ),
                    out,
                });
            }
            self.state.set_var(var, &item);
            match self.run_statements(body, "") {
                Ok(result) => {
                    out.push(&result);
                    code = result.exit_code;
                }
                Err(sig) => match self.handle_loop_signal(sig, &mut out) {
                    LoopFlow::Continue => continue,
                    LoopFlow::Break => break,
                    LoopFlow::Propagate(sig) => {
                        self.state.loop_depth -= 1;
                        return Err(sig);
                    }
                },
            }
        }
        self.state.loop_depth -= 1;
        Ok(ExecResult::new(out.stdout, out.stderr, code))
    }

    fn run_for_arith(
        &mut self,
        init: Option<&ArithExpr>,
        cond: Option<&ArithExpr>,
        step: Option<&ArithExpr>,
        body: &[Statement],
    ) -> Exec {
        let mut out = OutBuf::default();
        let mut code = 0;
        if let Some(init) = init {
            if let Err(e) = expand::arith::eval_arith(init, self) {
                return Ok(self.expansion_failure(e));
            }
        }
        let mut iterations = 0u64;
        self.state.loop_depth += 1;
        loop {
            iterations += 1;
            if iterations > self.limits.max_loop_iterations {
                self.state.loop_depth -= 1;
                return Err(Signal::Limit {
                    message: format!(
                        "maximum loop iterations ({}) exceeded",
                        self.limits.max_loop_iterations
                    ),
                    out,
                });
            }
            if let Some(cond) = cond {
                match expand::arith::eval_arith(cond, self) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        self.state.loop_depth -= 1;
                        return Ok(self.expansion_failure(e));
                    }
                }
            }
            match self.run_statements(body, "") {
                Ok(result) => {
                    out.push(&result);
                    code = result.exit_code;
                }
                Err(sig) => match self.handle_loop_signal(sig, &mut out) {
                    LoopFlow::Continue => {}
                    LoopFlow::Break => break,
                    LoopFlow::Propagate(sig) => {
                        self.state.loop_depth -= 1;
                        return Err(sig);
                    }
                },
            }
            if let Some(step) = step {
                if let Err(e) = expand::arith::eval_arith(step, self) {
                    self.state.loop_depth -= 1;
                    return Ok(self.expansion_failure(e));
                }
            }
        }
        self.state.loop_depth -= 1;
        Ok(ExecResult::new(out.stdout, out.stderr, code))
    }

    fn run_case(&mut self, word: &Word, items: &[CaseItem]) -> Exec {
        let subject = match expand_word_single(word, self) {
            Ok(s) => s,
            Err(e) => return Ok(self.expansion_failure(e)),
        };
        let nocase = self.state.shopt.nocasematch;
        let mut out = OutBuf::default();
        let mut code = 0;
        let mut fall_through = false;
        for item in items {
            let matched = fall_through
                || item.patterns.iter().any(|p| {
                    expand_word_pattern(p, self)
                        .map(|pat| crate::expand::pattern::matches_glob(&pat, &subject, nocase))
                        .unwrap_or(false)
                });
            if !matched {
                continue;
            }
            let result = self
                .run_statements(&item.body, "")
                .map_err(|sig| sig.prepended(&out))?;
            out.push(&result);
            code = result.exit_code;
            match item.terminator {
                CaseTerminator::Break => {
                    fall_through = false;
                    break;
                }
                CaseTerminator::FallThrough => {
                    fall_through = true;
                }
                CaseTerminator::Continue => {
                    fall_through = false;
                }
            }
        }
        Ok(ExecResult::new(out.stdout, out.stderr, code))
    }

    /// `( body )`: filesystem snapshot plus state copy; nothing escapes.
    /// Stdin reaches the body through the compound stdin stack.
    fn run_subshell(&mut self, body: &[Statement], _stdin: &str) -> Exec {
        let snapshot = self.fs.snapshot();
        let saved = self.state.clone();
        let outcome = self.run_statements(body, "");
        self.fs.restore(snapshot);
        *self.state = saved;
        match outcome {
            Ok(result) => Ok(result),
            Err(Signal::Exit { code, out })
            | Err(Signal::Errexit { code, out })
            | Err(Signal::Return { code, out }) => {
                Ok(ExecResult::new(out.stdout, out.stderr, code))
            }
            Err(Signal::Break { out, .. }) | Err(Signal::Continue { out, .. }) => {
                Ok(ExecResult::new(out.stdout, out.stderr, 0))
            }
            Err(sig @ Signal::Limit { .. }) => Err(sig),
        }
    }

    fn handle_loop_signal(&mut self, sig: Signal, out: &mut OutBuf) -> LoopFlow {
        match sig {
            Signal::Break { levels, out: sig_out } => {
                out.stdout.push_str(&sig_out.stdout);
                out.stderr.push_str(&sig_out.stderr);
                if levels > 1 {
                    LoopFlow::Propagate(Signal::Break {
                        levels: levels - 1,
                        out: std::mem::take(out),
                    })
                } else {
                    LoopFlow::Break
                }
            }
            Signal::Continue { levels, out: sig_out } => {
                out.stdout.push_str(&sig_out.stdout);
                out.stderr.push_str(&sig_out.stderr);
                if levels > 1 {
                    LoopFlow::Propagate(Signal::Continue {
                        levels: levels - 1,
                        out: std::mem::take(out),
                    })
                } else {
                    LoopFlow::Continue
                }
            }
            other => LoopFlow::Propagate(other.prepended(out)),
        }
    }

    // -- simple commands ----------------------------------------------------

    fn run_simple(&mut self, cmd: &SimpleCommand, stdin: &str) -> Exec {
        self.state.current_line = cmd.line;
        self.state.command_count += 1;
        if self.state.command_count > self.limits.max_commands {
            return Err(Signal::Limit {
                message: format!(
                    "maximum command count ({}) exceeded (possible infinite loop)",
                    self.limits.max_commands
                ),
                out: OutBuf::default(),
            });
        }
        self.subst_exit = None;

        // Assignment-only: mutate the current scope.
        if cmd.words.is_empty() {
            for assignment in &cmd.assignments {
                if let Err(message) = self.apply_assignment(assignment, false) {
                    let stderr = self.drain_pending_stderr();
                    return Ok(ExecResult::failure(format!("{}bash: {}\n", stderr, message)));
                }
            }
            let stderr = self.drain_pending_stderr();
            let code = self.subst_exit.unwrap_or(0);
            return Ok(ExecResult::new(String::new(), stderr, code));
        }

        // Expand argv.
        let argv = match expand_words(&cmd.words, self) {
            Ok(argv) => argv,
            Err(e) => {
                let mut failure = self.expansion_failure(e);
                if self.state.opts.errexit && !self.state.in_condition {
                    return Err(Signal::Errexit {
                        code: failure.exit_code,
                        out: OutBuf::new(std::mem::take(&mut failure.stdout), failure.stderr),
                    });
                }
                return Ok(failure);
            }
        };
        let mut stderr_prefix = self.drain_pending_stderr();

        let argv_bytes: usize = argv.iter().map(|a| a.len() + 1).sum();
        if argv_bytes > self.limits.max_argv_bytes {
            return Ok(ExecResult::failure_with_code(
                format!(
                    "{}bash: {}: Argument list too long\n",
                    stderr_prefix,
                    argv.first().map(String::as_str).unwrap_or("")
                ),
                126,
            ));
        }

        if argv.is_empty() {
            // Everything expanded away; assignments become permanent.
            for assignment in &cmd.assignments {
                if let Err(message) = self.apply_assignment(assignment, false) {
                    return Ok(ExecResult::failure(format!(
                        "{}bash: {}\n",
                        stderr_prefix, message
                    )));
                }
            }
            let code = self.subst_exit.unwrap_or(0);
            return Ok(ExecResult::new(String::new(), stderr_prefix, code));
        }

        if self.state.opts.xtrace {
            stderr_prefix.push_str(&format!("+ {}\n", argv.join(" ")));
        }

        // Temporary assignments live only for this command.
        let mut saved_temps: Vec<(String, Option<String>, bool)> = Vec::new();
        for assignment in &cmd.assignments {
            let prev = self.state.env.get(&assignment.name).cloned();
            let was_exported = self.state.exported.contains(&assignment.name);
            match self.apply_assignment(assignment, true) {
                Ok(()) => saved_temps.push((assignment.name.clone(), prev, was_exported)),
                Err(message) => {
                    return Ok(ExecResult::failure(format!(
                        "{}bash: {}\n",
                        stderr_prefix, message
                    )))
                }
            }
        }

        let result = self.dispatch(&argv, stdin, false);

        for (name, prev, was_exported) in saved_temps.into_iter().rev() {
            if !was_exported {
                self.state.exported.remove(&name);
            }
            match prev {
                Some(v) => {
                    self.state.env.insert(name, v);
                }
                None => {
                    self.state.env.remove(&name);
                }
            }
        }
        self.state.last_arg = argv.last().cloned().unwrap_or_default();

        match result {
            Ok(mut r) => {
                r.stderr = format!("{}{}", stderr_prefix, r.stderr);
                Ok(r)
            }
            Err(sig) => Err(sig.prepended(&OutBuf::new("", stderr_prefix))),
        }
    }

    /// Dispatch order: function, alias rewrite, builtin, utility bank,
    /// not found.
    pub fn dispatch(&mut self, argv: &[String], stdin: &str, bypass_functions: bool) -> Exec {
        let mut argv = argv.to_vec();

        // Alias substitution on the command-name position.
        if self.state.shopt.expand_aliases && !bypass_functions {
            let mut seen = std::collections::HashSet::new();
            while let Some(value) = self.state.aliases.get(&argv[0]).cloned() {
                if !seen.insert(argv[0].clone()) {
                    break;
                }
                match parser::parse(&value) {
                    Ok(script) => {
                        let mut replacement = match first_simple_words(&script) {
                            Some(words) => match expand_words(&words, self) {
                                Ok(w) => w,
                                Err(_) => break,
                            },
                            None => break,
                        };
                        if replacement.is_empty() {
                            break;
                        }
                        replacement.extend_from_slice(&argv[1..]);
                        argv = replacement;
                    }
                    Err(_) => break,
                }
            }
        }

        let name = argv[0].clone();

        if !bypass_functions {
            if let Some(def) = self.state.functions.get(&name).cloned() {
                return self.call_function(&def, &argv[1..], stdin);
            }
        }

        if let Some(result) = builtins::run_builtin(self, &name, &argv, stdin) {
            return result;
        }

        if self.registry.contains(&name) {
            return Ok(self.run_utility(&name, &argv[1..], stdin));
        }

        Ok(ExecResult::failure_with_code(
            format!("bash: {}: command not found\n", name),
            127,
        ))
    }

    fn call_function(&mut self, def: &FunctionDef, args: &[String], stdin: &str) -> Exec {
        if self.state.call_depth >= self.limits.max_recursion_depth {
            return Err(Signal::Limit {
                message: format!(
                    "maximum function recursion depth ({}) exceeded",
                    self.limits.max_recursion_depth
                ),
                out: OutBuf::default(),
            });
        }
        let saved_positionals =
            std::mem::replace(&mut self.state.positionals, args.to_vec());
        self.state.locals.push(LocalFrame::default());
        self.state.call_depth += 1;

        let outcome = self.run_command(&def.body, stdin);

        self.state.call_depth -= 1;
        self.state.pop_locals();
        self.state.positionals = saved_positionals;

        match outcome {
            Ok(result) => Ok(result),
            Err(Signal::Return { code, out }) => Ok(ExecResult::new(out.stdout, out.stderr, code)),
            // `break`/`continue` do not escape a function body.
            Err(Signal::Break { out, .. }) | Err(Signal::Continue { out, .. }) => {
                Ok(ExecResult::new(out.stdout, out.stderr, 0))
            }
            Err(sig) => Err(sig),
        }
    }

    fn run_utility(&mut self, name: &str, args: &[String], stdin: &str) -> ExecResult {
        let stdin = if stdin.is_empty() {
            self.stdin_stack.last().cloned().unwrap_or_default()
        } else {
            stdin.to_string()
        };
        let ctx = CommandContext {
            args: args.to_vec(),
            stdin,
            cwd: self.state.cwd.clone(),
            env: self.state.exported_env(),
            fs: self.fs.clone(),
            exec: Some(self.make_exec_fn()),
            fetch: Some(self.make_fetch_fn()),
            guest: self.guest.clone(),
        };
        let command = match self.registry.get(name) {
            Some(c) => c,
            None => {
                return ExecResult::failure_with_code(
                    format!("bash: {}: command not found\n", name),
                    127,
                )
            }
        };
        let result = self.block_on(command.execute(ctx));
        ExecResult::new(result.stdout, result.stderr, result.exit_code)
    }

    /// Shell re-entry callback for xargs, find -exec, and the script
    /// runtime: a fresh interpreter over the same filesystem.
    pub fn make_exec_fn(&self) -> ExecFn {
        let fs = self.fs.clone();
        let registry = self.registry.clone();
        let net = self.net.clone();
        let transport = self.transport.clone();
        let guest = self.guest.clone();
        let env = self.state.env.clone();
        let cwd = self.state.cwd.clone();
        let limits = self.limits.clone();
        Arc::new(move |script: String, stdin: String| {
            let fs = fs.clone();
            let registry = registry.clone();
            let net = net.clone();
            let transport = transport.clone();
            let guest = guest.clone();
            let env = env.clone();
            let cwd = cwd.clone();
            let limits = limits.clone();
            Box::pin(async move {
                run_detached_script(
                    fs, registry, net, transport, guest, env, cwd, &limits, &script, &stdin,
                )
            })
        })
    }

    /// The gated transport commands see. With no transport configured,
    /// allowed requests fail with a clear message; denied requests are
    /// still denied first.
    pub fn make_fetch_fn(&self) -> FetchFn {
        let raw: FetchFn = match &self.transport {
            Some(t) => t.clone(),
            None => Arc::new(|_url, _method, _headers, _body| {
                Box::pin(async {
                    Err("no network transport configured".to_string())
                })
            }),
        };
        secure_fetch_fn(self.net.clone(), raw)
    }

    // -- assignments --------------------------------------------------------

    /// Apply one assignment. `temp` marks the command-prefix form whose
    /// caller restores the previous value afterward.
    pub fn apply_assignment(&mut self, assignment: &Assignment, temp: bool) -> Result<(), String> {
        let name = &assignment.name;
        if self.state.is_readonly(name) {
            return Err(format!("{}: readonly variable", name));
        }
        if let Some(elements) = &assignment.array {
            let mut values = Vec::new();
            for word in elements {
                values.extend(
                    expand::expand_word_fields(word, self).map_err(|e| e.message.clone())?,
                );
            }
            if !assignment.append {
                self.state.arrays.remove(name);
                self.state.env.remove(name);
            }
            let base = self
                .state
                .arrays
                .get(name)
                .map(|m| m.keys().max().map(|k| k + 1).unwrap_or(0))
                .unwrap_or(0);
            for (i, value) in values.into_iter().enumerate() {
                self.state.array_set(name, base + i as i64, &value);
            }
            return Ok(());
        }
        let value = match &assignment.value {
            Some(word) => expand_word_single(word, self).map_err(|e| e.message.clone())?,
            None => String::new(),
        };
        if let Some(index_text) = &assignment.index {
            let expr =
                parser::arith::parse_arith(index_text).map_err(|m| m)?;
            let index = expand::arith::eval_arith(&expr, self).map_err(|e| e.message.clone())?;
            self.state.array_set(name, index, &value);
            return Ok(());
        }
        let value = if assignment.append {
            format!("{}{}", self.state.var(name).unwrap_or_default(), value)
        } else {
            value
        };
        self.state.set_var(name, &value);
        if temp {
            self.state.exported.insert(name.clone());
        }
        Ok(())
    }

    // -- helpers ------------------------------------------------------------

    pub fn expansion_failure(&mut self, e: ExpandError) -> ExecResult {
        let pending = self.drain_pending_stderr();
        ExecResult::failure_with_code(
            format!("{}bash: {}\n", pending, e.message),
            e.exit_code,
        )
    }

    fn drain_pending_stderr(&mut self) -> String {
        std::mem::take(&mut self.pending_stderr)
    }

    fn glob_paths(&mut self, pattern: &str) -> Vec<String> {
        let relative = !pattern.starts_with('/');
        let absolute = if relative {
            vpath::resolve(&self.state.cwd, pattern)
        } else {
            pattern.to_string()
        };
        let compiled = match glob::Pattern::new(&absolute) {
            Ok(p) => p,
            Err(_) => return Vec::new(),
        };
        let options = glob::MatchOptions {
            case_sensitive: !self.state.shopt.nocaseglob,
            require_literal_separator: true,
            require_literal_leading_dot: !self.state.shopt.dotglob,
        };
        let prefix = if self.state.cwd == "/" {
            "/".to_string()
        } else {
            format!("{}/", self.state.cwd)
        };
        let mut matches: Vec<String> = self
            .fs
            .all_paths()
            .into_iter()
            .filter(|p| p != "/" && compiled.matches_with(p, options))
            .map(|p| {
                if relative && p.starts_with(&prefix) {
                    p[prefix.len()..].to_string()
                } else {
                    p
                }
            })
            .filter(|p| !p.is_empty())
            .collect();
        matches.sort();
        matches
    }
}

enum LoopFlow {
    Continue,
    Break,
    Propagate(Signal),
}

fn first_simple_words(script: &Script) -> Option<Vec<Word>> {
    let statement = script.statements.first()?;
    match &statement.first.elements.first()?.command {
        Command::Simple(cmd) => Some(cmd.words.clone()),
        _ => None,
    }
}

/// Run a script in a detached environment sharing the filesystem:
/// what `xargs`, `find -exec`, and guest `child_process` calls get.
#[allow(clippy::too_many_arguments)]
pub fn run_detached_script(
    fs: Arc<dyn Vfs>,
    registry: Arc<CommandRegistry>,
    net: NetworkConfig,
    transport: Option<FetchFn>,
    guest: Option<Arc<dyn GuestRuntime>>,
    env: HashMap<String, String>,
    cwd: String,
    limits: &ExecLimits,
    script: &str,
    stdin: &str,
) -> CommandResult {
    let parsed = match parser::parse(script) {
        Ok(p) => p,
        Err(e) => {
            return CommandResult::with_exit_code(
                String::new(),
                format!("bash: syntax error: {}\n", e),
                2,
            )
        }
    };
    let mut state = ShellState {
        env,
        cwd,
        ..Default::default()
    };
    let handle = tokio::runtime::Handle::current();
    let result = tokio::task::block_in_place(|| {
        let mut interp = Interp::new(
            &mut state,
            limits,
            fs,
            registry,
            net,
            transport,
            guest,
            handle,
        );
        if !stdin.is_empty() {
            interp.stdin_stack.push(stdin.to_string());
        }
        interp.run(&parsed)
    });
    CommandResult::with_exit_code(result.stdout, result.stderr, result.exit_code)
}

// ---------------------------------------------------------------------------
// Expansion host wiring
// ---------------------------------------------------------------------------

impl<'a> ExpansionHost for Interp<'a> {
    fn get_var(&mut self, name: &str) -> Option<String> {
        match name {
            "?" => return Some(self.state.last_exit.to_string()),
            "$" => return Some(std::process::id().to_string()),
            "!" => return Some(self.state.last_bg_pid.to_string()),
            "#" => return Some(self.state.positionals.len().to_string()),
            "-" => return Some(self.state.opts.letters()),
            "0" => return Some(self.state.script_name.clone()),
            "_" => return Some(self.state.last_arg.clone()),
            "RANDOM" => return Some((rand::random::<u16>() % 32768).to_string()),
            "SECONDS" => {
                return Some(self.state.started.elapsed().as_secs().to_string());
            }
            "LINENO" => return Some(self.state.current_line.to_string()),
            "BASHPID" => return Some(std::process::id().to_string()),
            "PIPESTATUS" => {
                return self.state.pipestatus.first().map(|c| c.to_string());
            }
            "BASH_REMATCH" => return self.state.rematch.first().cloned(),
            _ => {}
        }
        if name.chars().all(|c| c.is_ascii_digit()) && !name.is_empty() {
            let n: usize = name.parse().ok()?;
            if n == 0 {
                return Some(self.state.script_name.clone());
            }
            return self.state.positionals.get(n - 1).cloned();
        }
        self.state.var(name)
    }

    fn set_var(&mut self, name: &str, value: &str) {
        if !self.state.is_readonly(name) {
            self.state.set_var(name, value);
        }
    }

    fn var_is_set(&mut self, name: &str) -> bool {
        self.get_var(name).is_some()
    }

    fn array_items(&mut self, name: &str) -> Option<Vec<String>> {
        match name {
            "PIPESTATUS" => Some(
                self.state
                    .pipestatus
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            ),
            "BASH_REMATCH" => Some(self.state.rematch.clone()),
            _ => self.state.array_values(name),
        }
    }

    fn array_item_at(&mut self, name: &str, index: i64) -> Option<String> {
        match name {
            "PIPESTATUS" => usize::try_from(index)
                .ok()
                .and_then(|i| self.state.pipestatus.get(i))
                .map(|c| c.to_string()),
            "BASH_REMATCH" => usize::try_from(index)
                .ok()
                .and_then(|i| self.state.rematch.get(i))
                .cloned(),
            _ => self.state.array_get(name, index),
        }
    }

    fn positionals(&mut self) -> Vec<String> {
        self.state.positionals.clone()
    }

    fn ifs(&mut self) -> String {
        self.state
            .env
            .get("IFS")
            .cloned()
            .unwrap_or_else(|| " \t\n".to_string())
    }

    fn options(&self) -> ExpandOptions {
        ExpandOptions {
            nounset: self.state.opts.nounset,
            noglob: self.state.opts.noglob,
            nullglob: self.state.shopt.nullglob,
            failglob: self.state.shopt.failglob,
            nocasematch: self.state.shopt.nocasematch,
        }
    }

    /// Command substitution: isolated variables, shared filesystem.
    fn run_substitution(&mut self, script: &Script) -> String {
        let saved = self.state.clone();
        let outcome = self.run_statements(&script.statements, "");
        let result = match outcome {
            Ok(r) => r,
            Err(Signal::Exit { code, out })
            | Err(Signal::Errexit { code, out })
            | Err(Signal::Return { code, out }) => {
                ExecResult::new(out.stdout, out.stderr, code)
            }
            Err(Signal::Break { out, .. }) | Err(Signal::Continue { out, .. }) => {
                ExecResult::new(out.stdout, out.stderr, 0)
            }
            Err(Signal::Limit { message, out }) => ExecResult::new(
                out.stdout,
                format!("{}bash: {}\n", out.stderr, message),
                126,
            ),
        };
        *self.state = saved;
        self.state.last_exit = result.exit_code;
        self.subst_exit = Some(result.exit_code);
        self.pending_stderr.push_str(&result.stderr);
        result.stdout
    }

    fn home_dir(&mut self, user: Option<&str>) -> Option<String> {
        match user {
            None => self.state.env.get("HOME").cloned(),
            Some(u) => {
                let candidate = format!("/home/{}", u);
                let fs = self.fs.clone();
                if self.block_on(fs.exists(&candidate)) {
                    Some(candidate)
                } else {
                    None
                }
            }
        }
    }

    fn glob(&mut self, pattern: &str) -> Vec<String> {
        self.glob_paths(pattern)
    }
}
