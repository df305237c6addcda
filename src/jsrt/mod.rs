//! Script-runtime worker bridge.
//!
//! `js-exec` evaluates user scripts in an isolated guest interpreter
//! that cannot reach host resources directly: every filesystem,
//! subprocess, and network operation crosses the shared-region protocol
//! in [`protocol`] and is serviced by the host loop in [`bridge`].
//!
//! The guest interpreter itself is pluggable: the embedder registers a
//! [`GuestRuntime`]; the crate ships [`ScriptedGuest`] as the reference
//! implementation of the worker side of the protocol.

pub mod bridge;
pub mod protocol;

pub use bridge::{run_worker, HostServices, SharedRegion, WorkerHandle};
pub use protocol::HostCall;

use async_trait::async_trait;
use std::sync::Arc;

use crate::commands::{Command, CommandContext, CommandResult};

/// Resource caps handed to the guest interpreter.
#[derive(Debug, Clone)]
pub struct GuestLimits {
    /// Guest heap ceiling.
    pub memory_limit_bytes: usize,
    /// The interrupt handler fires every this many interpreter cycles so
    /// infinite loops stay escapable.
    pub interrupt_cycles: u64,
}

impl Default for GuestLimits {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 64 * 1024 * 1024,
            interrupt_cycles: 100_000,
        }
    }
}

/// The guest interpreter. `run` executes on a blocking thread; all host
/// access goes through the handle's synchronous calls.
pub trait GuestRuntime: Send + Sync {
    fn run(&self, source: &str, argv: &[String], host: WorkerHandle, limits: &GuestLimits)
        -> i32;
}

/// One operation of the scripted reference guest.
#[derive(Debug, Clone)]
pub enum ScriptedOp {
    /// Read `from` over the bridge, write it back to `to`.
    CopyFileThroughBridge { from: String, to: String },
    /// Run a shell command over the bridge; ignore its output.
    Exec(String),
    /// Write the program source to a path (what a loader would see).
    DumpSource(String),
    Exit(i32),
}

/// A deterministic guest used in tests and as the protocol's reference
/// worker: it performs a fixed list of bridge operations. A failed call
/// exits 3.
pub struct ScriptedGuest {
    ops: Vec<ScriptedOp>,
}

impl ScriptedGuest {
    pub fn new(ops: Vec<ScriptedOp>) -> Self {
        Self { ops }
    }
}

impl GuestRuntime for ScriptedGuest {
    fn run(
        &self,
        source: &str,
        _argv: &[String],
        host: WorkerHandle,
        _limits: &GuestLimits,
    ) -> i32 {
        for op in &self.ops {
            match op {
                ScriptedOp::CopyFileThroughBridge { from, to } => {
                    match host.read_file(from) {
                        Ok(data) => {
                            if host.write_file(to, &data).is_err() {
                                host.exit(3);
                                return 3;
                            }
                        }
                        Err(_) => {
                            host.exit(3);
                            return 3;
                        }
                    }
                }
                ScriptedOp::Exec(command) => {
                    if host.exec(command, "").is_err() {
                        host.exit(3);
                        return 3;
                    }
                }
                ScriptedOp::DumpSource(path) => {
                    if host.write_file(path, source.as_bytes()).is_err() {
                        host.exit(3);
                        return 3;
                    }
                }
                ScriptedOp::Exit(code) => {
                    host.exit(*code);
                    return *code;
                }
            }
        }
        0
    }
}

/// The `js-exec` utility: load the program, hand it to the registered
/// guest runtime, bridge its host calls.
pub struct JsExecCommand;

#[async_trait]
impl Command for JsExecCommand {
    fn name(&self) -> &'static str {
        "js-exec"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut inline: Option<String> = None;
        let mut file: Option<String> = None;
        let mut argv: Vec<String> = Vec::new();
        let mut i = 0;
        while i < ctx.args.len() {
            match ctx.args[i].as_str() {
                "-e" | "--eval" => {
                    i += 1;
                    inline = ctx.args.get(i).cloned();
                }
                arg if file.is_none() && inline.is_none() && !arg.starts_with('-') => {
                    file = Some(arg.to_string());
                }
                arg => argv.push(arg.to_string()),
            }
            i += 1;
        }
        let guest = match &ctx.guest {
            Some(guest) => guest.clone(),
            None => {
                return CommandResult::with_exit_code(
                    String::new(),
                    "js-exec: no script runtime registered\n".to_string(),
                    127,
                )
            }
        };
        let source = match (&inline, &file) {
            (Some(code), _) => code.clone(),
            (None, Some(path)) => match ctx.fs.read_file(&ctx.resolve(path)).await {
                Ok(content) => content,
                Err(_) => {
                    return CommandResult::with_exit_code(
                        String::new(),
                        format!("js-exec: cannot open {}: No such file or directory\n", path),
                        1,
                    )
                }
            },
            (None, None) => {
                return CommandResult::error(
                    "js-exec: usage: js-exec [-e code | file] [args...]\n".to_string(),
                )
            }
        };
        let services = HostServices {
            fs: ctx.fs.clone(),
            cwd: ctx.cwd.clone(),
            exec: ctx.exec.clone(),
            fetch: ctx.fetch.clone(),
        };
        let code = run_worker(
            guest,
            source,
            argv,
            GuestLimits::default(),
            services,
        )
        .await;
        CommandResult::with_exit_code(String::new(), String::new(), code)
    }
}
