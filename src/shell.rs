//! The shell environment: construction, default filesystem layout, and
//! the execution entry point tying parser, interpreter, utility bank,
//! and network gate together.

use std::collections::HashMap;
use std::sync::Arc;

use crate::commands::CommandRegistry;
use crate::interp::state::{ExecLimits, ExecResult, ShellState};
use crate::interp::Interp;
use crate::jsrt::GuestRuntime;
use crate::net::{validate_config, FetchFn, NetworkConfig};
use crate::parser;
use crate::vfs::{MemFs, SeedFiles, Vfs};

/// Construction options; every field has a sensible default.
#[derive(Default)]
pub struct ShellConfig {
    /// Extra environment variables, merged over the defaults and
    /// exported.
    pub env: Option<HashMap<String, String>>,
    /// Initial working directory (default `/home/user`).
    pub cwd: Option<String>,
    /// Filesystem instance; a fresh in-memory tree when absent.
    pub fs: Option<Arc<dyn Vfs>>,
    /// Files seeded into a fresh filesystem.
    pub files: Option<SeedFiles>,
    pub limits: Option<ExecLimits>,
    pub network: Option<NetworkConfig>,
    /// Raw HTTP transport; the gate wraps it. Without one, allowed
    /// requests fail with a transport error while denials still deny.
    pub transport: Option<FetchFn>,
    /// Guest interpreter for `js-exec`.
    pub guest: Option<Arc<dyn GuestRuntime>>,
}

/// A sandboxed shell over a virtual filesystem.
pub struct Shell {
    pub fs: Arc<dyn Vfs>,
    state: ShellState,
    limits: ExecLimits,
    registry: Arc<CommandRegistry>,
    net: NetworkConfig,
    transport: Option<FetchFn>,
    guest: Option<Arc<dyn GuestRuntime>>,
}

impl Shell {
    /// Build an environment. Fails when the network allow-list is
    /// malformed.
    pub async fn new(config: ShellConfig) -> Result<Self, String> {
        let net = config.network.unwrap_or_default();
        let problems = validate_config(&net);
        if !problems.is_empty() {
            return Err(problems.join("; "));
        }

        let default_layout = config.cwd.is_none();
        let cwd = config.cwd.unwrap_or_else(|| "/home/user".to_string());
        let fs: Arc<dyn Vfs> = match config.fs {
            Some(fs) => fs,
            None => match &config.files {
                Some(files) => Arc::new(MemFs::with_seed(files)),
                None => Arc::new(MemFs::new()),
            },
        };
        init_filesystem(fs.as_ref(), default_layout, &cwd).await;

        let mut state = ShellState {
            cwd: cwd.clone(),
            prev_cwd: cwd.clone(),
            ..Default::default()
        };
        let home = if default_layout { "/home/user" } else { "/" };
        state.set_var("HOME", home);
        state.set_var("PATH", "/usr/bin:/bin");
        state.set_var("PWD", &cwd);
        state.set_var("OLDPWD", &cwd);
        state.set_var("IFS", " \t\n");
        state.set_var("OSTYPE", "linux-gnu");
        state.set_var("HOSTNAME", "sandbox");
        state.set_var("OPTIND", "1");
        state.set_var("SHELL", "/bin/bash");
        for always in ["HOME", "PATH", "PWD", "OLDPWD", "SHELL"] {
            state.exported.insert(always.to_string());
        }
        if let Some(user_env) = config.env {
            for (name, value) in user_env {
                state.exported.insert(name.clone());
                state.set_var(&name, &value);
            }
        }

        Ok(Self {
            fs,
            state,
            limits: config.limits.unwrap_or_default(),
            registry: Arc::new(CommandRegistry::standard()),
            net,
            transport: config.transport,
            guest: config.guest,
        })
    }

    /// Execute a script; stdout, stderr, and the final exit code come
    /// back together.
    pub async fn exec(&mut self, script: &str) -> ExecResult {
        if script.trim().is_empty() {
            return ExecResult::ok();
        }
        self.state.history.push(script.trim().to_string());

        let ast = match parser::parse(script) {
            Ok(ast) => ast,
            Err(e) => {
                return ExecResult::new(
                    String::new(),
                    format!("bash: syntax error: {}\n", e),
                    2,
                )
            }
        };

        let handle = tokio::runtime::Handle::current();
        let fs = self.fs.clone();
        let registry = self.registry.clone();
        let net = self.net.clone();
        let transport = self.transport.clone();
        let guest = self.guest.clone();
        let limits = self.limits.clone();
        let state = &mut self.state;

        let mut result = tokio::task::block_in_place(move || {
            let mut interp = Interp::new(
                state, &limits, fs, registry, net, transport, guest, handle,
            );
            interp.run(&ast)
        });
        self.state.last_exit = result.exit_code;

        // A registered EXIT trap runs once the script has finished.
        if let Some(action) = self.state.traps.get("EXIT").cloned() {
            self.state.traps.remove("EXIT");
            let trap_result = self.run_trap_action(&action).await;
            result.stdout.push_str(&trap_result.stdout);
            result.stderr.push_str(&trap_result.stderr);
        }
        result
    }

    async fn run_trap_action(&mut self, action: &str) -> ExecResult {
        let ast = match parser::parse(action) {
            Ok(ast) => ast,
            Err(_) => return ExecResult::ok(),
        };
        let handle = tokio::runtime::Handle::current();
        let fs = self.fs.clone();
        let registry = self.registry.clone();
        let net = self.net.clone();
        let transport = self.transport.clone();
        let guest = self.guest.clone();
        let limits = self.limits.clone();
        let state = &mut self.state;
        tokio::task::block_in_place(move || {
            let mut interp = Interp::new(
                state, &limits, fs, registry, net, transport, guest, handle,
            );
            interp.run(&ast)
        })
    }

    pub fn cwd(&self) -> &str {
        &self.state.cwd
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.state.env
    }

    pub async fn read_file(&self, path: &str) -> Result<String, crate::vfs::FsError> {
        let resolved = self.fs.resolve_path(&self.state.cwd, path);
        self.fs.read_file(&resolved).await
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), crate::vfs::FsError> {
        let resolved = self.fs.resolve_path(&self.state.cwd, path);
        self.fs.write_file(&resolved, content.as_bytes()).await
    }
}

/// Standard directories and device files every script can rely on.
async fn init_filesystem(fs: &dyn Vfs, default_layout: bool, cwd: &str) {
    for dir in ["/bin", "/usr/bin", "/dev", "/etc"] {
        let _ = fs.mkdir(dir, true).await;
    }
    if default_layout {
        let _ = fs.mkdir("/home/user", true).await;
        let _ = fs.mkdir("/tmp", true).await;
    }
    let _ = fs.mkdir(cwd, true).await;
    let _ = fs.write_file("/dev/null", b"").await;
    let _ = fs.write_file("/dev/stdin", b"").await;
    let _ = fs.write_file("/dev/stdout", b"").await;
    let _ = fs.write_file("/dev/stderr", b"").await;
    let _ = fs.write_file("/etc/hostname", b"sandbox\n").await;
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn shell() -> Shell {
        Shell::new(ShellConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_defaults() {
        let sh = shell().await;
        assert_eq!(sh.cwd(), "/home/user");
        assert_eq!(sh.env().get("HOME").unwrap(), "/home/user");
        assert!(sh.fs.exists("/dev/null").await);
        assert!(sh.fs.exists("/tmp").await);
    }

    #[tokio::test]
    async fn test_invalid_network_config_rejected() {
        let config = ShellConfig {
            network: Some(NetworkConfig {
                allowed_url_prefixes: vec!["ftp://bad".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(Shell::new(config).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_echo() {
        let mut sh = shell().await;
        let r = sh.exec("echo hello world").await;
        assert_eq!(r.stdout, "hello world\n");
        assert_eq!(r.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_variables() {
        let mut sh = shell().await;
        let r = sh.exec("x=foo; echo \"${x}bar\"").await;
        assert_eq!(r.stdout, "foobar\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_pipeline_wc() {
        let mut sh = shell().await;
        let r = sh.exec("printf '%s\\n' a b c | wc -l").await;
        assert_eq!(r.stdout, "3\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_for_brace_range() {
        let mut sh = shell().await;
        let r = sh.exec("for i in {1..3}; do echo $i; done").await;
        assert_eq!(r.stdout, "1\n2\n3\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_errexit_stops_script() {
        let mut sh = shell().await;
        let r = sh.exec("set -e; false; echo unreached").await;
        assert_eq!(r.stdout, "");
        assert_eq!(r.exit_code, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_subshell_isolation() {
        let mut sh = Shell::new(ShellConfig {
            cwd: Some("/".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
        let r = sh.exec("(cd /tmp && echo hi) ; pwd").await;
        assert_eq!(r.stdout, "hi\n/\n");
        assert_eq!(r.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_exit_code() {
        let mut sh = shell().await;
        assert_eq!(sh.exec("exit 42").await.exit_code, 42);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_syntax_error_exit_two() {
        let mut sh = shell().await;
        let r = sh.exec("if then").await;
        assert_eq!(r.exit_code, 2);
        assert!(r.stderr.contains("syntax error"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_state_persists_across_exec() {
        let mut sh = shell().await;
        sh.exec("x=persistent").await;
        assert_eq!(sh.exec("echo $x").await.stdout, "persistent\n");
        sh.exec("cd /tmp").await;
        assert_eq!(sh.cwd(), "/tmp");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exit_trap_fires() {
        let mut sh = shell().await;
        let r = sh.exec("trap 'echo cleanup' EXIT; echo body").await;
        assert_eq!(r.stdout, "body\ncleanup\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_write_helpers() {
        let sh = shell().await;
        sh.write_file("note.txt", "hello").await.unwrap();
        assert_eq!(sh.read_file("note.txt").await.unwrap(), "hello");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_arithmetic_expansion() {
        let mut sh = shell().await;
        assert_eq!(sh.exec("echo $((2 + 3 * 4))").await.stdout, "14\n");
        assert_eq!(sh.exec("x=5; echo $((x * 2))").await.stdout, "10\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_test_builtin_and_if() {
        let mut sh = shell().await;
        let r = sh.exec("x=5; if [ $x -gt 3 ]; then echo big; else echo small; fi").await;
        assert_eq!(r.stdout, "big\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cond_command_patterns_and_regex() {
        let mut sh = shell().await;
        assert_eq!(sh.exec("[[ abc == a* ]] && echo match").await.stdout, "match\n");
        assert_eq!(sh.exec("[[ abc == z* ]]; echo $?").await.stdout, "1\n");
        let r = sh.exec("[[ abc123 =~ ^[a-z]+([0-9]+)$ ]] && echo ${BASH_REMATCH[1]}").await;
        assert_eq!(r.stdout, "123\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_case_statement() {
        let mut sh = shell().await;
        let r = sh
            .exec("case foo in f*) echo starts-f;; *) echo other;; esac")
            .await;
        assert_eq!(r.stdout, "starts-f\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_functions_and_locals() {
        let mut sh = shell().await;
        let r = sh.exec("greet() { echo \"hi $1\"; }; greet world").await;
        assert_eq!(r.stdout, "hi world\n");
        let r = sh
            .exec("x=outer; f() { local x=inner; echo $x; }; f; echo $x")
            .await;
        assert_eq!(r.stdout, "inner\nouter\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_function_return_code() {
        let mut sh = shell().await;
        let r = sh.exec("f() { return 3; }; f; echo $?").await;
        assert_eq!(r.stdout, "3\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_redirection_round_trip() {
        let mut sh = shell().await;
        let r = sh.exec("echo payload > /tmp/cap; cat /tmp/cap").await;
        assert_eq!(r.stdout, "payload\n");
        let r = sh
            .exec("echo one >> /tmp/log; echo two >> /tmp/log; cat /tmp/log")
            .await;
        assert_eq!(r.stdout, "one\ntwo\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stderr_redirection() {
        let mut sh = shell().await;
        let r = sh.exec("echo oops >&2").await;
        assert_eq!(r.stdout, "");
        assert_eq!(r.stderr, "oops\n");
        let r = sh.exec("cat /nope 2> /tmp/err; cat /tmp/err").await;
        assert!(r.stdout.contains("No such file or directory"));
        assert_eq!(r.stderr, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dev_null_discards() {
        let mut sh = shell().await;
        let r = sh.exec("echo a; echo b > /dev/null; echo c").await;
        assert_eq!(r.stdout, "a\nc\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stdout_stderr_merge() {
        let mut sh = shell().await;
        let r = sh.exec("cat /missing > /tmp/all 2>&1; cat /tmp/all").await;
        assert!(r.stdout.contains("No such file or directory"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_heredoc_expansion() {
        let mut sh = shell().await;
        let r = sh.exec("cat <<EOF\nhome: $HOME\nEOF").await;
        assert_eq!(r.stdout, "home: /home/user\n");
        let r = sh.exec("cat <<'EOF'\nliteral: $HOME\nEOF").await;
        assert_eq!(r.stdout, "literal: $HOME\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_here_string() {
        let mut sh = shell().await;
        assert_eq!(sh.exec("cat <<< hello").await.stdout, "hello\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_while_read_loop_over_file() {
        let mut sh = shell().await;
        sh.exec("printf 'a\\nb\\n' > /tmp/list").await;
        let r = sh
            .exec("while read line; do echo \"got $line\"; done < /tmp/list")
            .await;
        assert_eq!(r.stdout, "got a\ngot b\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipefail_option() {
        let mut sh = shell().await;
        let r = sh.exec("false | true; echo $?").await;
        assert_eq!(r.stdout, "0\n");
        let r = sh.exec("set -o pipefail; false | true; echo $?").await;
        assert_eq!(r.stdout, "1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_threads_stdout() {
        let mut sh = shell().await;
        let r = sh.exec("printf 'one\\ntwo\\nthree\\n' | grep t | wc -l").await;
        assert_eq!(r.stdout, "2\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_command_substitution_isolated() {
        let mut sh = shell().await;
        let r = sh.exec("y=outer; z=$(y=inner; echo $y); echo $y $z").await;
        assert_eq!(r.stdout, "outer inner\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_command_substitution_exit_code() {
        let mut sh = shell().await;
        let r = sh.exec("x=$(false); echo $?").await;
        assert_eq!(r.stdout, "1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_arrays() {
        let mut sh = shell().await;
        let r = sh
            .exec("arr=(a b c); echo ${arr[1]}; echo ${#arr[@]}; echo \"${arr[@]}\"")
            .await;
        assert_eq!(r.stdout, "b\n3\na b c\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_arithmetic_for_loop() {
        let mut sh = shell().await;
        let r = sh.exec("for ((i=0; i<3; i++)); do echo $i; done").await;
        assert_eq!(r.stdout, "0\n1\n2\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_while_with_arithmetic() {
        let mut sh = shell().await;
        let r = sh.exec("i=0; while [ $i -lt 3 ]; do i=$((i+1)); done; echo $i").await;
        assert_eq!(r.stdout, "3\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_break_and_continue() {
        let mut sh = shell().await;
        let r = sh
            .exec("for i in 1 2 3; do if [ $i = 2 ]; then continue; fi; echo $i; done")
            .await;
        assert_eq!(r.stdout, "1\n3\n");
        let r = sh
            .exec("for i in 1 2 3; do if [ $i = 2 ]; then break; fi; echo $i; done")
            .await;
        assert_eq!(r.stdout, "1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_and_or_chains() {
        let mut sh = shell().await;
        assert_eq!(sh.exec("false || echo rescued").await.stdout, "rescued\n");
        assert_eq!(sh.exec("true && echo onward").await.stdout, "onward\n");
        assert_eq!(sh.exec("false && echo skipped").await.stdout, "");
        assert_eq!(sh.exec("! false && echo negated").await.stdout, "negated\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nounset() {
        let mut sh = shell().await;
        let r = sh.exec("set -u; echo $definitely_not_set").await;
        assert_eq!(r.exit_code, 1);
        assert!(r.stderr.contains("unbound variable"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_xtrace() {
        let mut sh = shell().await;
        let r = sh.exec("set -x; echo traced").await;
        assert_eq!(r.stdout, "traced\n");
        assert!(r.stderr.contains("+ echo traced"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_glob_expansion_and_literal_fallback() {
        let mut sh = shell().await;
        sh.exec("touch /tmp/one.txt /tmp/two.txt").await;
        let r = sh.exec("echo /tmp/*.txt").await;
        assert_eq!(r.stdout, "/tmp/one.txt /tmp/two.txt\n");
        let r = sh.exec("echo /tmp/*.xyz").await;
        assert_eq!(r.stdout, "/tmp/*.xyz\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_quoted_glob_stays_literal() {
        let mut sh = shell().await;
        sh.exec("touch /tmp/g1.txt").await;
        assert_eq!(sh.exec("echo '/tmp/*.txt'").await.stdout, "/tmp/*.txt\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_xargs_through_shell() {
        let mut sh = shell().await;
        let r = sh.exec("printf 'a b c' | xargs echo got").await;
        assert_eq!(r.stdout, "got a b c\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_find_exec_roundtrip() {
        let mut sh = shell().await;
        sh.exec("mkdir -p /tmp/fx && echo data > /tmp/fx/a.txt").await;
        let r = sh.exec("find /tmp/fx -name '*.txt' -exec cat {} \\;").await;
        assert_eq!(r.stdout, "data\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_aliases() {
        let mut sh = shell().await;
        let r = sh
            .exec("shopt -s expand_aliases\nalias ll='echo LL'\nll now")
            .await;
        assert_eq!(r.stdout, "LL now\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_getopts_loop() {
        let mut sh = shell().await;
        let r = sh
            .exec("set -- -a -b val; while getopts ab: opt; do echo $opt $OPTARG; done")
            .await;
        assert_eq!(r.stdout, "a\nb val\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_source_defines_functions() {
        let mut sh = shell().await;
        sh.exec("printf 'helper() { echo from-lib; }\\n' > /tmp/lib.sh").await;
        let r = sh.exec("source /tmp/lib.sh; helper").await;
        assert_eq!(r.stdout, "from-lib\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pushd_popd() {
        let mut sh = shell().await;
        let r = sh
            .exec("pushd /tmp > /dev/null; pwd; popd > /dev/null; pwd")
            .await;
        assert_eq!(r.stdout, "/tmp\n/home/user\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_background_job_and_wait() {
        let mut sh = shell().await;
        let r = sh.exec("false & wait $!; echo $?").await;
        assert_eq!(r.stdout, "1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shift_and_positionals() {
        let mut sh = shell().await;
        let r = sh.exec("set -- a b c; echo $#; shift; echo $1 $#").await;
        assert_eq!(r.stdout, "3\nb 2\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_parameter_operations_end_to_end() {
        let mut sh = shell().await;
        assert_eq!(sh.exec("echo ${missing:-fallback}").await.stdout, "fallback\n");
        assert_eq!(sh.exec("p=/a/b/c.txt; echo ${p##*/}").await.stdout, "c.txt\n");
        assert_eq!(sh.exec("s=hello; echo ${s^^} ${#s}").await.stdout, "HELLO 5\n");
        let r = sh.exec("echo ${missing:?gone}").await;
        assert_eq!(r.exit_code, 1);
        assert!(r.stderr.contains("gone"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_subshell_filesystem_isolation() {
        let mut sh = shell().await;
        let r = sh
            .exec("(echo scratch > /tmp/ghost); ls /tmp/ghost")
            .await;
        assert_ne!(r.exit_code, 0);
        assert!(!sh.fs.exists("/tmp/ghost").await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_group_shares_state() {
        let mut sh = shell().await;
        let r = sh.exec("{ x=shared; }; echo $x").await;
        assert_eq!(r.stdout, "shared\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_curl_denied_without_network() {
        let mut sh = Shell::new(ShellConfig {
            network: Some(NetworkConfig {
                allowed_url_prefixes: vec!["https://api.example.com".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        })
        .await
        .unwrap();
        let r = sh.exec("curl https://evil.com/").await;
        assert_eq!(r.exit_code, 7);
        assert!(r.stderr.contains("Network access denied"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_command_not_found() {
        let mut sh = shell().await;
        let r = sh.exec("no-such-tool").await;
        assert_eq!(r.exit_code, 127);
        assert!(r.stderr.contains("command not found"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sed_and_grep_pipeline() {
        let mut sh = shell().await;
        sh.exec("printf 'alpha\\nbeta\\ngamma\\n' > /tmp/words").await;
        let r = sh.exec("grep a /tmp/words | sed 's/a/A/g'").await;
        assert_eq!(r.stdout, "AlphA\nbetA\ngAmmA\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_eval_builtin() {
        let mut sh = shell().await;
        let r = sh.exec("cmd='echo built'; eval $cmd up").await;
        assert_eq!(r.stdout, "built up\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exit_code_wraps_mod_256() {
        let mut sh = shell().await;
        assert_eq!(sh.exec("exit 300").await.exit_code, 44);
        let mut sh = shell().await;
        assert_eq!(sh.exec("exit -1").await.exit_code, 255);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reading_is_pure() {
        let mut sh = shell().await;
        sh.exec("echo fixed > /tmp/pure").await;
        let before = sh.fs.snapshot();
        sh.exec("cat /tmp/pure; grep f /tmp/pure; wc -l /tmp/pure").await;
        sh.fs.restore(before);
        assert_eq!(sh.fs.read_file("/tmp/pure").await.unwrap(), "fixed\n");
    }
}
