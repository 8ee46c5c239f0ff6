//! Runtime configuration

use serde::{Deserialize, Serialize};

/// Runtime options
///
/// Every field has a default, so a partial TOML or JSON table is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Maximum nesting of managed and native invocations
    pub max_call_depth: usize,

    /// Run the heap sweep when managed code calls the gc hint
    pub collect_on_gc_hint: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
            collect_on_gc_hint: true,
        }
    }
}

/// Host stack budgeted per managed call level
///
/// One managed call spans several interpreter frames (invoke, body, statement,
/// expression); unoptimized builds need several times more.
const FRAME_STACK_BYTES: usize = if cfg!(debug_assertions) { 96 * 1024 } else { 32 * 1024 };

/// Stack for everything outside the call chain itself
const BASE_STACK_BYTES: usize = 1024 * 1024;

/// Largest execution stack ever requested from the OS
const MAX_STACK_BYTES: usize = 1024 * 1024 * 1024;

impl RuntimeOptions {
    /// Stack size of the thread that runs managed code
    ///
    /// Sized so that `max_call_depth` nested calls fit. Past
    /// `MAX_STACK_BYTES` the interpreter's stack measurement reports
    /// `StackOverflow` before the call depth limit does.
    pub fn execution_stack_size(&self) -> usize {
        self.max_call_depth
            .saturating_mul(FRAME_STACK_BYTES)
            .saturating_add(BASE_STACK_BYTES)
            .min(MAX_STACK_BYTES)
    }
}
