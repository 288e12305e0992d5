//! Error types surfaced by the viewing engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::navigation::Mode;

/// Failures the engine reports to its callers.
///
/// Failures raised by externally supplied callables never appear here; those are
/// caught and logged by the extension bridge.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A keycode string could not be parsed.
    #[error("Unrecognised key identifier `{input}`: {reason}")]
    Parse { input: String, reason: String },

    /// An image index outside `[0, total)`.
    #[error("Image index `{index}` is out of range (total: {total})")]
    Range { index: usize, total: usize },

    /// A value that must be positive was zero or negative.
    #[error("Expected a positive value for {what}, got `{value}`")]
    NonPositive { what: &'static str, value: f32 },

    /// The operation is not valid in the current mode.
    #[error("`{op}` is not available in {mode} mode")]
    WrongMode { op: &'static str, mode: Mode },

    /// A color component outside `[0, 1]`.
    #[error("`{0}` is not a valid color component (must be between 0 and 1 inclusive)")]
    InvalidColor(f32),

    /// A named option (scaling, align, mode, ...) was not recognised.
    #[error("Invalid {what} `{value}`")]
    InvalidValue { what: &'static str, value: String },

    /// Reading or decoding an image failed.
    #[error("Failed to load `{path}`: {reason}")]
    Load { path: PathBuf, reason: String },
}

impl EngineError {
    pub fn parse(input: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid(what: &'static str, value: &str) -> Self {
        Self::InvalidValue {
            what,
            value: value.to_string(),
        }
    }

    /// Whether this is one of the range failures (bad index or non-positive value).
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. } | Self::NonPositive { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
