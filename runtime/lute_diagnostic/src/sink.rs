//! Diagnostic sinks.

/// Receiver for formatted diagnostics.
///
/// Messages arrive fully rendered (`"line, col: error: ..."`); the sink only
/// decides where they go. The parser keeps reporting after errors, so a sink
/// may receive several independent messages from one parse.
pub trait DiagnosticSink {
    fn report(&mut self, message: &str);
}

/// Sink that collects every message, for tests and batch hosts.
#[derive(Debug, Default)]
pub struct CollectedDiagnostics {
    messages: Vec<String>,
}

impl CollectedDiagnostics {
    pub fn new() -> Self {
        CollectedDiagnostics::default()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl DiagnosticSink for CollectedDiagnostics {
    fn report(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// Adapter turning any closure into a sink, for hosts that just want a
/// callback.
pub struct FnSink<F: FnMut(&str)>(pub F);

impl<F: FnMut(&str)> DiagnosticSink for FnSink<F> {
    fn report(&mut self, message: &str) {
        (self.0)(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_in_order() {
        let mut sink = CollectedDiagnostics::new();
        sink.report("1, 1: error: first");
        sink.report("2, 4: error: second");
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.messages()[1], "2, 4: error: second");
    }

    #[test]
    fn closures_adapt_through_fn_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = FnSink(|msg: &str| seen.push(msg.to_string()));
            sink.report("3, 1: error: boom");
        }
        assert_eq!(seen, vec!["3, 1: error: boom".to_string()]);
    }
}
