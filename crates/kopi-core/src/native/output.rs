//! Standard output streams
//!
//! Both streams share one lock so lines reach the sink in program order. The
//! process sink writes through to stdout/stderr; the capture sink records
//! `(stream, line)` pairs for tests and embedding hosts.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Output stream handle (matches the `fd` field of `PrintStream`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamId {
    /// Standard output
    Out = 1,
    /// Standard error
    Err = 2,
}

impl StreamId {
    /// Stream for a numeric handle
    pub fn from_fd(fd: i32) -> Option<Self> {
        match fd {
            1 => Some(StreamId::Out),
            2 => Some(StreamId::Err),
            _ => None,
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamId::Out => "stdout",
            StreamId::Err => "stderr",
        })
    }
}

/// Destination of output lines
pub trait OutputSink: Send {
    /// Append `line` plus a line terminator to `stream`
    fn write_line(&mut self, stream: StreamId, line: &str) -> io::Result<()>;

    /// Flush buffered writes
    fn flush(&mut self) -> io::Result<()>;
}

/// Process stdout/stderr
#[derive(Debug, Default)]
pub struct StdioSink;

impl OutputSink for StdioSink {
    fn write_line(&mut self, stream: StreamId, line: &str) -> io::Result<()> {
        match stream {
            StreamId::Out => {
                let mut out = io::stdout().lock();
                writeln!(out, "{}", line)?;
                out.flush()
            }
            StreamId::Err => writeln!(io::stderr().lock(), "{}", line),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        io::stderr().flush()
    }
}

type CaptureBuffer = Arc<Mutex<Vec<(StreamId, String)>>>;

struct CaptureSink(CaptureBuffer);

impl OutputSink for CaptureSink {
    fn write_line(&mut self, stream: StreamId, line: &str) -> io::Result<()> {
        self.0.lock().push((stream, line.to_string()));
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read side of a capture sink
#[derive(Clone, Default)]
pub struct CapturedOutput(CaptureBuffer);

impl CapturedOutput {
    /// Every line in write order, tagged with its stream
    pub fn lines(&self) -> Vec<(StreamId, String)> {
        self.0.lock().clone()
    }

    /// Lines written to standard output
    pub fn stdout_lines(&self) -> Vec<String> {
        self.lines_of(StreamId::Out)
    }

    /// Lines written to standard error
    pub fn stderr_lines(&self) -> Vec<String> {
        self.lines_of(StreamId::Err)
    }

    fn lines_of(&self, stream: StreamId) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Discard everything captured so far
    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl fmt::Debug for CapturedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.lock().iter()).finish()
    }
}

/// Shared handle to the runtime's output streams
#[derive(Clone)]
pub struct OutputStreams {
    sink: Arc<Mutex<Box<dyn OutputSink>>>,
}

impl OutputStreams {
    /// Streams backed by an arbitrary sink
    pub fn new(sink: impl OutputSink + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    /// Streams writing to the process stdout/stderr
    pub fn stdio() -> Self {
        Self::new(StdioSink)
    }

    /// Streams recording every line, plus the handle to read them back
    pub fn captured() -> (Self, CapturedOutput) {
        let buffer = CaptureBuffer::default();
        (Self::new(CaptureSink(buffer.clone())), CapturedOutput(buffer))
    }

    /// Append one line to `stream`
    pub fn write_line(&self, stream: StreamId, line: &str) -> io::Result<()> {
        self.sink.lock().write_line(stream, line)
    }

    /// Flush pending writes on both streams
    pub fn flush(&self) -> io::Result<()> {
        self.sink.lock().flush()
    }
}

impl Default for OutputStreams {
    fn default() -> Self {
        Self::stdio()
    }
}

impl fmt::Debug for OutputStreams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OutputStreams")
    }
}
