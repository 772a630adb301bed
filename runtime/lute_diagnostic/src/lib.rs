//! Diagnostic plumbing: file offset → line/column mapping and the sink
//! through which the parser and interpreter report location-tagged messages.
//!
//! Diagnostics are plain formatted strings by contract — `"line, col:
//! message"` — so the embedding host decides how (and whether) to render
//! them.

mod line_map;
mod sink;

pub use line_map::{LineCol, LineMap};
pub use sink::{CollectedDiagnostics, DiagnosticSink, FnSink};
