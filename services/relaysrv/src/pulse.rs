//! Pulse state of an output point
//!
//! A point is either latched (holds its commanded state until told
//! otherwise) or pulsing toward an absolute deadline in Unix seconds, at
//! which the second tick reverts it.

/// Per-point pulse state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PulseState {
    #[default]
    Latched,
    Pulsing {
        deadline: i64,
    },
}

impl PulseState {
    /// State after a command issued at `now` with a pulse of `seconds`.
    ///
    /// Zero or negative lengths latch.
    pub fn schedule(now: i64, seconds: i32) -> Self {
        if seconds > 0 {
            Self::Pulsing {
                deadline: now + i64::from(seconds),
            }
        } else {
            Self::Latched
        }
    }

    /// Absolute deadline, 0 when latched
    pub fn deadline(&self) -> i64 {
        match self {
            Self::Latched => 0,
            Self::Pulsing { deadline } => *deadline,
        }
    }

    pub fn is_pulsing(&self) -> bool {
        matches!(self, Self::Pulsing { .. })
    }

    /// True once the deadline has been reached
    pub fn is_due(&self, now: i64) -> bool {
        match self {
            Self::Latched => false,
            Self::Pulsing { deadline } => now >= *deadline,
        }
    }
}
