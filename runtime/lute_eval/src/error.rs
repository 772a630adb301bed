//! Runtime error type.

use thiserror::Error;

/// A runtime failure: unresolved name, non-callable callee, wrong argument
/// count, operator misuse, or a host-reported custom-statement failure.
///
/// All failures funnel through one path. The message is fully formatted —
/// the location-tagged first line plus one "called from …" line per
/// enclosing frame, innermost first — and has already been reported to the
/// diagnostic sink. The interpreter instance stays reusable after the
/// error; only the current top-level invocation was unwound.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
        }
    }
}
