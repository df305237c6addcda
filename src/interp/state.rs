//! Interpreter state: variables, functions, options, limits.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use indexmap::IndexMap;

use crate::ast::FunctionDef;

/// Result of executing a command, pipeline, or script.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecResult {
    pub fn new(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self { stdout, stderr, exit_code }
    }

    pub fn ok() -> Self {
        Self::default()
    }

    pub fn code(exit_code: i32) -> Self {
        Self { exit_code, ..Default::default() }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self::new(String::new(), stderr.into(), 1)
    }

    pub fn failure_with_code(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self::new(String::new(), stderr.into(), exit_code)
    }
}

/// `set` flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellOpts {
    /// `-e`: abort the script when a command fails outside a condition.
    pub errexit: bool,
    /// `-o pipefail`: pipeline exit is the rightmost failure.
    pub pipefail: bool,
    /// `-u`: expanding an unset parameter is an error.
    pub nounset: bool,
    /// `-x`: trace expanded commands on stderr.
    pub xtrace: bool,
    /// `-v`: echo input lines as read.
    pub verbose: bool,
    /// `-f`: disable pathname expansion.
    pub noglob: bool,
    /// `-n`: parse but do not execute.
    pub noexec: bool,
    /// `-C`: refuse to clobber files with `>`.
    pub noclobber: bool,
    /// `-a`: export every assignment.
    pub allexport: bool,
}

impl ShellOpts {
    /// The `$-` string.
    pub fn letters(&self) -> String {
        let mut s = String::from("h");
        if self.allexport {
            s.push('a');
        }
        if self.noclobber {
            s.push('C');
        }
        if self.errexit {
            s.push('e');
        }
        if self.noglob {
            s.push('f');
        }
        if self.noexec {
            s.push('n');
        }
        if self.nounset {
            s.push('u');
        }
        if self.verbose {
            s.push('v');
        }
        if self.xtrace {
            s.push('x');
        }
        s.push('B');
        s
    }
}

/// `shopt` flags.
#[derive(Debug, Clone, Copy)]
pub struct ShoptOpts {
    pub extglob: bool,
    pub dotglob: bool,
    pub nullglob: bool,
    pub failglob: bool,
    pub globstar: bool,
    pub nocaseglob: bool,
    pub nocasematch: bool,
    pub expand_aliases: bool,
}

impl Default for ShoptOpts {
    fn default() -> Self {
        Self {
            extglob: false,
            dotglob: false,
            nullglob: false,
            failglob: false,
            globstar: false,
            nocaseglob: false,
            nocasematch: false,
            expand_aliases: false,
        }
    }
}

/// Guard rails for the cooperative interpreter.
#[derive(Debug, Clone)]
pub struct ExecLimits {
    pub max_commands: u64,
    pub max_recursion_depth: u32,
    pub max_loop_iterations: u64,
    /// Total bytes across one command's expanded argv.
    pub max_argv_bytes: usize,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            max_commands: 100_000,
            max_recursion_depth: 1000,
            max_loop_iterations: 1_000_000,
            max_argv_bytes: 2 * 1024 * 1024,
        }
    }
}

/// A notional background job. Nothing runs concurrently; the exit code
/// is recorded when the job's statement completes and `wait` reads it
/// back.
#[derive(Debug, Clone)]
pub struct Job {
    pub pid: u32,
    pub exit_code: i32,
}

/// Programmable-completion registration from the `complete` builtin.
#[derive(Debug, Clone, Default)]
pub struct CompletionSpec {
    /// `-W` word list.
    pub wordlist: Option<String>,
    /// `-F` shell function name.
    pub function: Option<String>,
    /// `-o` options, recorded verbatim.
    pub options: Vec<String>,
}

/// One `local` scope: whatever has to be put back when the function
/// returns.
#[derive(Debug, Clone, Default)]
pub struct LocalFrame {
    pub saved: HashMap<String, SavedVar>,
}

#[derive(Debug, Clone, Default)]
pub struct SavedVar {
    pub value: Option<String>,
    pub array: Option<IndexMap<i64, String>>,
}

/// Everything a running script can observe or mutate, other than the
/// filesystem.
#[derive(Debug, Clone)]
pub struct ShellState {
    pub env: HashMap<String, String>,
    pub arrays: HashMap<String, IndexMap<i64, String>>,
    pub exported: HashSet<String>,
    pub readonly_vars: HashSet<String>,
    pub aliases: HashMap<String, String>,

    pub cwd: String,
    pub prev_cwd: String,
    pub dir_stack: Vec<String>,

    pub positionals: Vec<String>,
    pub script_name: String,

    pub functions: HashMap<String, FunctionDef>,
    pub locals: Vec<LocalFrame>,

    pub opts: ShellOpts,
    pub shopt: ShoptOpts,

    pub last_exit: i32,
    pub last_arg: String,
    pub current_line: u32,
    pub pipestatus: Vec<i32>,
    pub rematch: Vec<String>,

    pub jobs: Vec<Job>,
    pub last_bg_pid: u32,
    pub next_pid: u32,

    pub traps: HashMap<String, String>,
    pub completions: HashMap<String, CompletionSpec>,
    pub history: Vec<String>,

    pub call_depth: u32,
    pub source_depth: u32,
    pub loop_depth: u32,
    pub in_condition: bool,

    pub command_count: u64,
    pub started: Instant,
}

impl Default for ShellState {
    fn default() -> Self {
        Self {
            env: HashMap::new(),
            arrays: HashMap::new(),
            exported: HashSet::new(),
            readonly_vars: HashSet::new(),
            aliases: HashMap::new(),
            cwd: "/".to_string(),
            prev_cwd: "/".to_string(),
            dir_stack: Vec::new(),
            positionals: Vec::new(),
            script_name: "bash".to_string(),
            functions: HashMap::new(),
            locals: Vec::new(),
            opts: ShellOpts::default(),
            shopt: ShoptOpts::default(),
            last_exit: 0,
            last_arg: String::new(),
            current_line: 0,
            pipestatus: Vec::new(),
            rematch: Vec::new(),
            jobs: Vec::new(),
            last_bg_pid: 0,
            next_pid: 1000,
            traps: HashMap::new(),
            completions: HashMap::new(),
            history: Vec::new(),
            call_depth: 0,
            source_depth: 0,
            loop_depth: 0,
            in_condition: false,
            command_count: 0,
            started: Instant::now(),
        }
    }
}

impl ShellState {
    /// Scalar variable read. Array names read as their lowest element,
    /// the way `$arr` does.
    pub fn var(&self, name: &str) -> Option<String> {
        if let Some(v) = self.env.get(name) {
            return Some(v.clone());
        }
        if let Some(items) = self.arrays.get(name) {
            let mut keys: Vec<&i64> = items.keys().collect();
            keys.sort();
            return keys.first().and_then(|k| items.get(*k)).cloned();
        }
        None
    }

    /// Scalar variable write, preserving any `local` save point made in
    /// the innermost scope. Readonly enforcement happens in the callers
    /// that can report an error.
    pub fn set_var(&mut self, name: &str, value: &str) {
        self.env.insert(name.to_string(), value.to_string());
        if self.opts.allexport {
            self.exported.insert(name.to_string());
        }
    }

    pub fn unset_var(&mut self, name: &str) {
        self.env.remove(name);
        self.arrays.remove(name);
    }

    pub fn is_readonly(&self, name: &str) -> bool {
        self.readonly_vars.contains(name)
    }

    /// Array values sorted by index.
    pub fn array_values(&self, name: &str) -> Option<Vec<String>> {
        let items = self.arrays.get(name)?;
        let mut pairs: Vec<(&i64, &String)> = items.iter().collect();
        pairs.sort_by_key(|(k, _)| **k);
        Some(pairs.into_iter().map(|(_, v)| v.clone()).collect())
    }

    pub fn array_get(&self, name: &str, index: i64) -> Option<String> {
        if let Some(items) = self.arrays.get(name) {
            return items.get(&index).cloned();
        }
        // A scalar behaves as an array with only element zero.
        if index == 0 {
            return self.env.get(name).cloned();
        }
        None
    }

    pub fn array_set(&mut self, name: &str, index: i64, value: &str) {
        // Promote an existing scalar to element zero.
        if !self.arrays.contains_key(name) {
            let mut items = IndexMap::new();
            if let Some(existing) = self.env.remove(name) {
                items.insert(0, existing);
            }
            self.arrays.insert(name.to_string(), items);
        }
        if let Some(items) = self.arrays.get_mut(name) {
            items.insert(index, value.to_string());
        }
    }

    /// Record a `local` save point for the innermost function scope.
    pub fn save_local(&mut self, name: &str) {
        if let Some(frame) = self.locals.last_mut() {
            if !frame.saved.contains_key(name) {
                frame.saved.insert(
                    name.to_string(),
                    SavedVar {
                        value: self.env.get(name).cloned(),
                        array: self.arrays.get(name).cloned(),
                    },
                );
            }
        }
    }

    /// Pop a function scope, restoring every saved variable.
    pub fn pop_locals(&mut self) {
        if let Some(frame) = self.locals.pop() {
            for (name, saved) in frame.saved {
                match saved.value {
                    Some(v) => {
                        self.env.insert(name.clone(), v);
                    }
                    None => {
                        self.env.remove(&name);
                    }
                }
                match saved.array {
                    Some(a) => {
                        self.arrays.insert(name, a);
                    }
                    None => {
                        self.arrays.remove(&name);
                    }
                }
            }
        }
    }

    /// The environment a spawned command sees: exported variables only,
    /// plus the handful the shell always passes along.
    pub fn exported_env(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for name in &self.exported {
            if let Some(v) = self.env.get(name) {
                out.insert(name.clone(), v.clone());
            }
        }
        for always in ["HOME", "PATH", "PWD", "OLDPWD", "IFS"] {
            if let Some(v) = self.env.get(always) {
                out.insert(always.to_string(), v.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opts_letters() {
        let mut opts = ShellOpts::default();
        assert_eq!(opts.letters(), "hB");
        opts.errexit = true;
        opts.xtrace = true;
        let s = opts.letters();
        assert!(s.contains('e') && s.contains('x'));
    }

    #[test]
    fn test_scalar_and_array_interplay() {
        let mut state = ShellState::default();
        state.set_var("x", "scalar");
        assert_eq!(state.var("x").unwrap(), "scalar");
        assert_eq!(state.array_get("x", 0).unwrap(), "scalar");
        state.array_set("x", 1, "second");
        assert_eq!(state.array_get("x", 0).unwrap(), "scalar");
        assert_eq!(state.array_get("x", 1).unwrap(), "second");
        assert_eq!(state.array_values("x").unwrap(), vec!["scalar", "second"]);
    }

    #[test]
    fn test_sparse_array_order() {
        let mut state = ShellState::default();
        state.array_set("a", 5, "five");
        state.array_set("a", 1, "one");
        assert_eq!(state.array_values("a").unwrap(), vec!["one", "five"]);
        assert_eq!(state.var("a").unwrap(), "one");
    }

    #[test]
    fn test_local_save_restore() {
        let mut state = ShellState::default();
        state.set_var("x", "outer");
        state.locals.push(LocalFrame::default());
        state.save_local("x");
        state.set_var("x", "inner");
        state.save_local("y");
        state.set_var("y", "only-inner");
        state.pop_locals();
        assert_eq!(state.var("x").unwrap(), "outer");
        assert_eq!(state.var("y"), None);
    }

    #[test]
    fn test_exported_env_filters() {
        let mut state = ShellState::default();
        state.set_var("SECRET", "hidden");
        state.set_var("PUBLIC", "visible");
        state.exported.insert("PUBLIC".to_string());
        state.set_var("HOME", "/home/user");
        let env = state.exported_env();
        assert!(env.contains_key("PUBLIC"));
        assert!(env.contains_key("HOME"));
        assert!(!env.contains_key("SECRET"));
    }

    #[test]
    fn test_unset_removes_both() {
        let mut state = ShellState::default();
        state.set_var("x", "v");
        state.array_set("a", 0, "v");
        state.unset_var("x");
        state.unset_var("a");
        assert!(state.var("x").is_none());
        assert!(state.array_values("a").is_none());
    }
}
