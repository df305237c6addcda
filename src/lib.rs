//! just-bash: a sandboxed, in-process shell.
//!
//! Parses and executes a large POSIX-flavored command subset against a
//! virtual filesystem and a bank of reimplemented utilities, with a
//! network allow-list and an isolated script-runtime bridge. Nothing a
//! script does touches the host filesystem or the open internet.

pub mod ast;
pub mod commands;
pub mod expand;
pub mod interp;
pub mod jsrt;
pub mod net;
pub mod parser;
pub mod shell;
pub mod vfs;

pub use commands::{Command, CommandContext, CommandRegistry, CommandResult};
pub use interp::{ExecLimits, ExecResult};
pub use jsrt::{GuestLimits, GuestRuntime};
pub use net::NetworkConfig;
pub use parser::{parse, ParseError};
pub use shell::{Shell, ShellConfig};
pub use vfs::{FsError, MemFs, SeedFiles, Vfs};
