//! The utility bank: emulated external commands.
//!
//! Every utility is a pure function from (argv, context) to a result
//! plus filesystem side effects through the context's handle. None of
//! them can reach interpreter state; the few that re-enter the shell
//! (xargs, find -exec, js-exec) do so through the `exec` callback.

pub mod base64_cmd;
pub mod basename;
pub mod cat;
pub mod chmod;
pub mod cp;
pub mod curl;
pub mod cut;
pub mod date;
pub mod diff;
pub mod dirname;
pub mod echo;
pub mod env_cmd;
pub mod find;
pub mod grep;
pub mod gzip;
pub mod hash_cmds;
pub mod head;
pub mod just_bash;
pub mod ln;
pub mod ls;
pub mod mkdir;
pub mod mv;
pub mod printf;
pub mod pwd;
pub mod readlink;
pub mod rm;
pub mod rmdir;
pub mod sed;
pub mod seq;
pub mod sleep_cmd;
pub mod sort;
pub mod stat_cmd;
pub mod tail;
pub mod tar;
pub mod tee;
pub mod touch;
pub mod tr;
pub mod true_false;
pub mod uniq;
pub mod wc;
pub mod xargs;
pub mod yes;

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::jsrt::GuestRuntime;
use crate::net::FetchFn;
use crate::vfs::Vfs;

/// Result of one utility invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(stdout: String) -> Self {
        Self { stdout, stderr: String::new(), exit_code: 0 }
    }

    pub fn error(stderr: String) -> Self {
        Self { stdout: String::new(), stderr, exit_code: 1 }
    }

    pub fn with_exit_code(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self { stdout, stderr, exit_code }
    }
}

/// Re-entry into the shell: (script, stdin) to result. Used by xargs,
/// find -exec, js-exec, and self-invocation.
pub type ExecFn = Arc<
    dyn Fn(String, String) -> Pin<Box<dyn Future<Output = CommandResult> + Send>> + Send + Sync,
>;

/// Everything a utility can touch.
pub struct CommandContext {
    pub args: Vec<String>,
    pub stdin: String,
    pub cwd: String,
    pub env: HashMap<String, String>,
    pub fs: Arc<dyn Vfs>,
    pub exec: Option<ExecFn>,
    /// Gated transport; every request passes the network allow-list.
    pub fetch: Option<FetchFn>,
    pub guest: Option<Arc<dyn GuestRuntime>>,
}

impl CommandContext {
    /// Resolve a command-line path against the working directory.
    pub fn resolve(&self, path: &str) -> String {
        self.fs.resolve_path(&self.cwd, path)
    }
}

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, ctx: CommandContext) -> CommandResult;
}

/// The closed registry of utilities.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self { commands: HashMap::new() }
    }

    /// All standard utilities registered.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register_standard();
        registry
    }

    pub fn register(&mut self, command: Box<dyn Command>) {
        self.commands.insert(command.name().to_string(), command);
    }

    /// Register under an alternate name (egrep, zcat...).
    pub fn register_as(&mut self, name: &str, command: Box<dyn Command>) {
        self.commands.insert(name.to_string(), command);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    fn register_standard(&mut self) {
        self.register(Box::new(base64_cmd::Base64Command));
        self.register(Box::new(basename::BasenameCommand));
        self.register(Box::new(cat::CatCommand));
        self.register(Box::new(chmod::ChmodCommand));
        self.register(Box::new(cp::CpCommand));
        self.register(Box::new(curl::CurlCommand));
        self.register(Box::new(cut::CutCommand));
        self.register(Box::new(date::DateCommand));
        self.register(Box::new(diff::DiffCommand));
        self.register(Box::new(dirname::DirnameCommand));
        self.register(Box::new(echo::EchoCommand));
        self.register(Box::new(env_cmd::EnvCommand));
        self.register(Box::new(find::FindCommand));
        self.register(Box::new(grep::GrepCommand::basic()));
        self.register_as("egrep", Box::new(grep::GrepCommand::extended()));
        self.register_as("fgrep", Box::new(grep::GrepCommand::fixed()));
        self.register_as("rg", Box::new(grep::GrepCommand::ripgrep()));
        self.register(Box::new(gzip::GzipCommand));
        self.register_as("gunzip", Box::new(gzip::GunzipCommand));
        self.register_as("zcat", Box::new(gzip::ZcatCommand));
        self.register(Box::new(hash_cmds::Md5sumCommand));
        self.register_as("sha1sum", Box::new(hash_cmds::Sha1sumCommand));
        self.register_as("sha256sum", Box::new(hash_cmds::Sha256sumCommand));
        self.register(Box::new(head::HeadCommand));
        self.register(Box::new(just_bash::JustBashCommand));
        self.register(Box::new(crate::jsrt::JsExecCommand));
        self.register(Box::new(ln::LnCommand));
        self.register(Box::new(ls::LsCommand));
        self.register(Box::new(mkdir::MkdirCommand));
        self.register(Box::new(mv::MvCommand));
        self.register(Box::new(printf::PrintfCommand));
        self.register(Box::new(pwd::PwdCommand));
        self.register(Box::new(readlink::ReadlinkCommand));
        self.register(Box::new(rm::RmCommand));
        self.register(Box::new(rmdir::RmdirCommand));
        self.register(Box::new(sed::SedCommand));
        self.register(Box::new(seq::SeqCommand));
        self.register(Box::new(sleep_cmd::SleepCommand));
        self.register(Box::new(sort::SortCommand));
        self.register(Box::new(stat_cmd::StatCommand));
        self.register(Box::new(tail::TailCommand));
        self.register(Box::new(tar::TarCommand));
        self.register(Box::new(tee::TeeCommand));
        self.register(Box::new(touch::TouchCommand));
        self.register(Box::new(tr::TrCommand));
        self.register(Box::new(true_false::TrueCommand));
        self.register(Box::new(true_false::FalseCommand));
        self.register(Box::new(uniq::UniqCommand));
        self.register(Box::new(wc::WcCommand));
        self.register(Box::new(xargs::XargsCommand));
        self.register(Box::new(yes::YesCommand));
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::vfs::MemFs;

    /// Context builder for command unit tests.
    pub async fn ctx_with_files(args: Vec<&str>, files: Vec<(&str, &str)>) -> CommandContext {
        let fs = Arc::new(MemFs::new());
        for (path, content) in files {
            if let Some(parent) = path.rfind('/') {
                if parent > 0 {
                    let _ = fs.mkdir(&path[..parent], true).await;
                }
            }
            fs.write_file(path, content.as_bytes()).await.unwrap();
        }
        CommandContext {
            args: args.into_iter().map(String::from).collect(),
            stdin: String::new(),
            cwd: "/".to_string(),
            env: HashMap::new(),
            fs,
            exec: None,
            fetch: None,
            guest: None,
        }
    }

    pub async fn ctx_with_stdin(args: Vec<&str>, stdin: &str) -> CommandContext {
        let mut ctx = ctx_with_files(args, vec![]).await;
        ctx.stdin = stdin.to_string();
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contains_standard_utilities() {
        let registry = CommandRegistry::standard();
        for name in [
            "cat", "grep", "egrep", "fgrep", "rg", "sed", "find", "ls", "head", "tail", "wc",
            "sort", "uniq", "cut", "tr", "tee", "xargs", "cp", "mv", "rm", "mkdir", "rmdir",
            "ln", "chmod", "touch", "stat", "base64", "md5sum", "sha1sum", "sha256sum", "tar",
            "gzip", "gunzip", "zcat", "curl", "date", "env", "basename", "dirname", "printf",
            "seq", "yes", "sleep", "echo", "pwd", "true", "false", "diff", "readlink",
            "just-bash", "js-exec",
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(!registry.contains("no-such-tool"));
    }

    #[test]
    fn test_registry_names_sorted() {
        let registry = CommandRegistry::standard();
        let names = registry.names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_command_result_helpers() {
        let ok = CommandResult::success("out".into());
        assert_eq!(ok.exit_code, 0);
        let err = CommandResult::error("bad\n".into());
        assert_eq!(err.exit_code, 1);
        assert!(err.stdout.is_empty());
    }
}
