//! Line-oriented report sinks
//!
//! Every operation writes its human-readable report through a [`LogSink`]
//! handed in by the caller. Diagnostics that are not part of the report go
//! through the `log` facade instead.

/// Receives report lines
pub trait LogSink {
    fn write_line(&mut self, line: &str);
}

/// Discards every line
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write_line(&mut self, _line: &str) {}
}

/// Buffers lines in memory
#[derive(Debug, Default, Clone)]
pub struct CollectSink {
    pub lines: Vec<String>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if any buffered line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    pub fn into_text(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

impl LogSink for CollectSink {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Forwards each line to `log::info!`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacadeSink;

impl LogSink for LogFacadeSink {
    fn write_line(&mut self, line: &str) {
        log::info!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_sink() {
        let mut sink = CollectSink::new();
        sink.write_line("first");
        sink.write_line("second line");

        assert!(sink.contains("second"));
        assert!(!sink.contains("third"));
        assert_eq!(sink.into_text(), "first\nsecond line\n");
    }
}
