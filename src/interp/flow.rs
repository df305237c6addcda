//! Control-flow signals.
//!
//! `break`, `continue`, `return`, and `exit` unwind through the
//! interpreter as the error arm of a `Result`. Each signal carries the
//! output accumulated so far; every frame that catches or re-throws a
//! signal prepends its own output so nothing printed before the unwind
//! is lost.

use super::state::ExecResult;

/// Output carried by an in-flight signal.
#[derive(Debug, Clone, Default)]
pub struct OutBuf {
    pub stdout: String,
    pub stderr: String,
}

impl OutBuf {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self { stdout: stdout.into(), stderr: stderr.into() }
    }

    pub fn push(&mut self, result: &ExecResult) {
        self.stdout.push_str(&result.stdout);
        self.stderr.push_str(&result.stderr);
    }

    pub fn prepend(&mut self, earlier: &OutBuf) {
        self.stdout = format!("{}{}", earlier.stdout, self.stdout);
        self.stderr = format!("{}{}", earlier.stderr, self.stderr);
    }
}

/// The tagged control-flow signal. Each construct consumes the variants
/// it owns and re-throws the rest.
#[derive(Debug, Clone)]
pub enum Signal {
    Break { levels: u32, out: OutBuf },
    Continue { levels: u32, out: OutBuf },
    Return { code: i32, out: OutBuf },
    Exit { code: i32, out: OutBuf },
    /// `set -e` tripped; unwinds the whole script.
    Errexit { code: i32, out: OutBuf },
    /// An execution limit was exceeded; never caught below the top.
    Limit { message: String, out: OutBuf },
}

impl Signal {
    pub fn out_mut(&mut self) -> &mut OutBuf {
        match self {
            Signal::Break { out, .. }
            | Signal::Continue { out, .. }
            | Signal::Return { out, .. }
            | Signal::Exit { out, .. }
            | Signal::Errexit { out, .. }
            | Signal::Limit { out, .. } => out,
        }
    }

    /// Re-throw with earlier output stitched in front.
    pub fn prepended(mut self, earlier: &OutBuf) -> Self {
        self.out_mut().prepend(earlier);
        self
    }
}

/// What every execution step returns.
pub type Exec = Result<ExecResult, Signal>;

/// `exit`'s operand wraps into 0..=255; negatives wrap from 256.
pub fn wrap_exit_code(code: i64) -> i32 {
    (((code % 256) + 256) % 256) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_exit_code() {
        assert_eq!(wrap_exit_code(0), 0);
        assert_eq!(wrap_exit_code(42), 42);
        assert_eq!(wrap_exit_code(256), 0);
        assert_eq!(wrap_exit_code(257), 1);
        assert_eq!(wrap_exit_code(-1), 255);
        assert_eq!(wrap_exit_code(-256), 0);
    }

    #[test]
    fn test_prepend_order() {
        let mut sig = Signal::Exit {
            code: 3,
            out: OutBuf::new("late", "late-err"),
        };
        sig = sig.prepended(&OutBuf::new("early-", "early-err-"));
        match sig {
            Signal::Exit { out, .. } => {
                assert_eq!(out.stdout, "early-late");
                assert_eq!(out.stderr, "early-err-late-err");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_push_accumulates() {
        let mut out = OutBuf::default();
        out.push(&ExecResult::new("a".into(), "x".into(), 0));
        out.push(&ExecResult::new("b".into(), "y".into(), 1));
        assert_eq!(out.stdout, "ab");
        assert_eq!(out.stderr, "xy");
    }
}
