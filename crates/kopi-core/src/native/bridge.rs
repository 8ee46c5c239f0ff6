//! Native call bridge
//!
//! Runs a bound host function synchronously and maps its outcome back into
//! the runtime's error taxonomy. Host panics never unwind into the
//! interpreter; they surface as `NativeCallFailed`.
//!
//! The first native call installs a process-wide panic hook that stays
//! silent while the panicking thread is inside a native call, so a contained
//! panic does not print to the process's stderr. Panics anywhere else still
//! reach the previously installed hook.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use tracing::{debug, trace};

use crate::class::MethodEntry;
use crate::native::{NativeCallResult, NativeContext, NativeFault, NativeFn};
use crate::value::{SemanticType, Value};
use crate::{RuntimeError, RuntimeResult};

/// Invoke `native` as the implementation of `entry`
///
/// `args` already include the receiver for instance methods. A void method
/// yields `Value::Null`.
pub fn invoke_native(
    ctx: &NativeContext<'_>,
    entry: &MethodEntry,
    native: &NativeFn,
    args: &[Value],
) -> RuntimeResult<Value> {
    trace!(binding = %entry.qualified_name(), argc = args.len(), "native call");
    install_quiet_hook();

    let outcome = {
        let _guard = NativeCallGuard::enter();
        panic::catch_unwind(AssertUnwindSafe(|| native(ctx, args)))
    }
    .map_err(|panic| {
        let message = panic_message(&*panic);
        debug!(binding = %entry.qualified_name(), %message, "native call panicked");
        failed(entry, message)
    })?;

    match outcome {
        NativeCallResult::Void if entry.returns == SemanticType::Void => Ok(Value::Null),
        NativeCallResult::Void => Err(failed(entry, format!("returned no value, declared {}", entry.returns))),
        NativeCallResult::Value(value) if entry.returns == SemanticType::Void => Err(failed(
            entry,
            format!("returned {} from a void method", value.type_name()),
        )),
        NativeCallResult::Value(value) if value.conforms_to(entry.returns) => Ok(value),
        NativeCallResult::Value(value) => Err(failed(
            entry,
            format!("returned {}, declared {}", value.type_name(), entry.returns),
        )),
        NativeCallResult::Fault(NativeFault::NumberFormat(err)) => Err(RuntimeError::NumberFormat(err)),
        NativeCallResult::Fault(NativeFault::Failed(message)) => Err(failed(entry, message)),
    }
}

thread_local! {
    static NATIVE_CALLS: Cell<usize> = const { Cell::new(0) };
}

static QUIET_HOOK: Once = Once::new();

/// Marks the current thread as inside a native call until dropped
struct NativeCallGuard;

impl NativeCallGuard {
    fn enter() -> Self {
        NATIVE_CALLS.with(|calls| calls.set(calls.get() + 1));
        NativeCallGuard
    }
}

impl Drop for NativeCallGuard {
    fn drop(&mut self) {
        NATIVE_CALLS.with(|calls| calls.set(calls.get().saturating_sub(1)));
    }
}

/// Whether the current thread is running a native call
pub(crate) fn in_native_call() -> bool {
    NATIVE_CALLS.with(|calls| calls.get() > 0)
}

fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !in_native_call() {
                previous(info);
            }
        }));
    });
}

fn failed(entry: &MethodEntry, message: String) -> RuntimeError {
    RuntimeError::NativeCallFailed {
        binding: entry.qualified_name(),
        message,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
