//! Native bridge
//!
//! Host-implemented methods are bound by (class, method, parameter types) and
//! invoked synchronously through [`bridge::invoke_native`]. The bootstrap
//! bindings cover formatted output, the gc hint, monotonic time and long
//! parsing.

pub mod bridge;
pub mod marshal;
pub mod number;
pub mod output;
pub mod registry;
pub mod time;

use std::io;
use std::sync::Arc;

use tracing::debug;

pub use marshal::{arg, FromValue, IntoNativeResult};
pub use number::{parse_long, NumberFormatError, NumberFormatErrorKind};
pub use output::{CapturedOutput, OutputSink, OutputStreams, StdioSink, StreamId};
pub use registry::{NativeFn, NativeKey, NativeRegistry};

use crate::object::{Heap, ObjectRef};
use crate::options::RuntimeOptions;
use crate::value::{SemanticType, Value};

/// Result of a native call handler
#[derive(Debug)]
pub enum NativeCallResult {
    /// Call returned a value
    Value(Value),
    /// Call completed with no value (void methods)
    Void,
    /// Host signaled a fault
    Fault(NativeFault),
}

/// Fault reported by a host function
#[derive(Debug, Clone, thiserror::Error)]
pub enum NativeFault {
    /// Numeric text rejected by a parse native
    #[error(transparent)]
    NumberFormat(#[from] NumberFormatError),

    /// Any other host diagnostic
    #[error("{0}")]
    Failed(String),
}

impl From<String> for NativeFault {
    fn from(message: String) -> Self {
        NativeFault::Failed(message)
    }
}

/// Runtime services available to host functions
pub struct NativeContext<'a> {
    streams: &'a OutputStreams,
    heap: &'a Heap,
    options: &'a RuntimeOptions,
}

impl<'a> NativeContext<'a> {
    /// Create a context over runtime services
    pub fn new(streams: &'a OutputStreams, heap: &'a Heap, options: &'a RuntimeOptions) -> Self {
        Self { streams, heap, options }
    }

    /// Output streams
    pub fn streams(&self) -> &OutputStreams {
        self.streams
    }

    /// Object heap
    pub fn heap(&self) -> &Heap {
        self.heap
    }

    /// Runtime options
    pub fn options(&self) -> &RuntimeOptions {
        self.options
    }

    /// Append the canonical text of `value` plus a line terminator
    pub fn write_line(&self, stream: StreamId, value: &Value) -> io::Result<()> {
        self.streams.write_line(stream, &value.to_string())
    }

    /// Garbage-collection hint; returns the number of dead handles swept
    pub fn request_gc(&self) -> usize {
        if !self.options.collect_on_gc_hint {
            debug!("gc hint ignored");
            return 0;
        }
        let swept = self.heap.collect();
        debug!(swept, "gc hint");
        swept
    }
}

/// Types `PrintStream.println` has an overload for
pub const PRINTABLE_TYPES: [SemanticType; 5] = [
    SemanticType::Int,
    SemanticType::Long,
    SemanticType::Boolean,
    SemanticType::Text,
    SemanticType::Reference,
];

fn println(ctx: &NativeContext<'_>, args: &[Value]) -> Result<(), NativeFault> {
    let stream: ObjectRef = arg(args, 0)?;
    let fd = stream.field_by_name("fd").and_then(|v| v.as_int()).unwrap_or(-1);
    let stream = StreamId::from_fd(fd).ok_or_else(|| NativeFault::Failed(format!("invalid stream handle {}", fd)))?;
    let value: Value = arg(args, 1)?;
    ctx.write_line(stream, &value)
        .map_err(|e| NativeFault::Failed(format!("write to {} failed: {}", stream, e)))
}

fn parse_long_native(_ctx: &NativeContext<'_>, args: &[Value]) -> Result<i64, NativeFault> {
    match arg::<Option<Arc<str>>>(args, 0)? {
        Some(text) => Ok(parse_long(&text)?),
        None => Err(NumberFormatError::new("null", NumberFormatErrorKind::Empty).into()),
    }
}

/// Register the bindings the bootstrap classes declare
pub fn register_system_natives(natives: &mut NativeRegistry) {
    for ty in PRINTABLE_TYPES {
        natives.register("PrintStream", "println", vec![ty], println);
    }
    natives.register("System", "gc", vec![], |ctx, _| {
        ctx.request_gc();
    });
    natives.register("System", "currentTimeMillis", vec![], |_, _| time::current_time_millis());
    natives.register("Long", "parseLong", vec![SemanticType::Text], parse_long_native);
}
