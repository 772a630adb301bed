//! File-offset to line/column mapping.

use std::fmt;

use lute_ir::Span;

/// 1-based line and column position.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.line, self.column)
    }
}

/// Maps byte offsets in one source buffer to line/column positions.
///
/// Built once per source file; lookups binary-search the recorded line
/// starts. Columns count bytes from the line start plus one, which matches
/// editor behavior for the ASCII-dominated sources the runtime sees.
#[derive(Debug)]
pub struct LineMap {
    /// Byte offset of the first byte of each line. `line_starts[0] == 0`.
    line_starts: Vec<u32>,
    source_len: u32,
}

impl LineMap {
    /// Scan `source` and record every line start.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (idx, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                #[allow(clippy::cast_possible_truncation)]
                line_starts.push(idx as u32 + 1);
            }
        }
        #[allow(clippy::cast_possible_truncation)]
        let source_len = source.len() as u32;
        LineMap {
            line_starts,
            source_len,
        }
    }

    /// Locate a byte offset. Offsets past the end clamp to the last line.
    pub fn locate(&self, offset: u32) -> LineCol {
        let offset = offset.min(self.source_len);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert) => insert - 1,
        };
        #[allow(clippy::cast_possible_truncation)]
        let line = line_idx as u32 + 1;
        LineCol {
            line,
            column: offset - self.line_starts[line_idx] + 1,
        }
    }

    /// Locate the start of a span.
    pub fn locate_span(&self, span: Span) -> LineCol {
        self.locate(span.start)
    }
}
