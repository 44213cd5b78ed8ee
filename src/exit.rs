// src/exit.rs
//! Standardized process exit codes for `qtrace`.
//!
//! Provides a stable contract for scripts and CI gates.

use std::process::Termination;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum QtraceExit {
    /// Analysis completed and stayed under any requested threshold.
    Success = 0,
    /// Generic error (IO, config, serialization).
    Error = 1,
    /// Input validation failed (missing path, no Python files, bad option).
    InvalidInput = 2,
    /// Overall risk exceeded `--fail-above`.
    RiskAboveThreshold = 3,
}

impl QtraceExit {
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn exit(self) -> ! {
        std::process::exit(self.code())
    }
}

impl Termination for QtraceExit {
    fn report(self) -> std::process::ExitCode {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        std::process::ExitCode::from(self.code() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(QtraceExit::Success.code(), 0);
        assert_eq!(QtraceExit::Error.code(), 1);
        assert_eq!(QtraceExit::InvalidInput.code(), 2);
        assert_eq!(QtraceExit::RiskAboveThreshold.code(), 3);
    }
}
