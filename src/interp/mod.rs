//! The statement interpreter and its support modules.

pub mod builtins;
pub mod condexpr;
pub mod engine;
pub mod flow;
pub mod pipeline;
pub mod redirect;
pub mod state;

pub use engine::Interp;
pub use flow::{Exec, OutBuf, Signal};
pub use state::{ExecLimits, ExecResult, ShellOpts, ShellState, ShoptOpts};
