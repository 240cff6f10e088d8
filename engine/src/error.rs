use crate::hw::traits::StreamDirection;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DuplexError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported sample format '{0}' (expected S16LE or S32LE)")]
    UnsupportedFormat(String),

    #[error("Playback prefill expects a full buffer of {expected} frames, device reports {found}")]
    PrefillMismatch { expected: usize, found: i64 },

    #[error("{direction} xrun")]
    Xrun { direction: StreamDirection },

    #[error("{direction} reported a negative available frame count ({value})")]
    NegativeAvailable {
        direction: StreamDirection,
        value: i64,
    },

    #[error("{direction} {op} failed: {message}")]
    Device {
        direction: StreamDirection,
        op: &'static str,
        message: String,
    },

    #[error("Readiness poll timed out after {0:?}")]
    ReadinessTimeout(Duration),

    #[error("Readiness poll failed: {0}")]
    Readiness(String),
}

impl DuplexError {
    pub fn device(direction: StreamDirection, op: &'static str, message: impl Into<String>) -> Self {
        Self::Device {
            direction,
            op,
            message: message.into(),
        }
    }

    /// A transfer call that returned no frames while `remaining` were owed.
    pub fn stalled(direction: StreamDirection, op: &'static str, remaining: usize) -> Self {
        Self::device(
            direction,
            op,
            format!("device stalled: 0 frames transferred with {remaining} pending"),
        )
    }

    /// Errors raised by configuration checks, before any frame moves.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnsupportedFormat(_) | Self::PrefillMismatch { .. }
        )
    }
}

pub type DuplexResult<T> = Result<T, DuplexError>;
