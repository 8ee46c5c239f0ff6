//! Argument and result marshaling between `Value` and host types
//!
//! Arguments convert 1:1 by position. Dispatch has already checked every
//! argument against the declared parameter types, so a failed conversion here
//! means the binding's Rust signature disagrees with its declaration.

use std::sync::Arc;

use crate::native::{NativeCallResult, NativeFault};
use crate::object::ObjectRef;
use crate::value::Value;

/// Host type an argument value converts into
pub trait FromValue: Sized {
    /// Type name used in marshaling diagnostics
    const EXPECTED: &'static str;

    /// Convert, or `None` if the value has the wrong type
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for i32 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "long";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_long()
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for Arc<str> {
    const EXPECTED: &'static str = "text";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().cloned()
    }
}

impl FromValue for ObjectRef {
    const EXPECTED: &'static str = "reference";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_object().cloned()
    }
}

impl FromValue for Value {
    const EXPECTED: &'static str = "any";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// Reference kinds: null converts to `None`
impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Fetch argument `index` as `T`
pub fn arg<T: FromValue>(args: &[Value], index: usize) -> Result<T, NativeFault> {
    let value = args
        .get(index)
        .ok_or_else(|| NativeFault::Failed(format!("missing argument {}", index)))?;
    T::from_value(value).ok_or_else(|| {
        NativeFault::Failed(format!(
            "argument {}: expected {}, got {}",
            index,
            T::EXPECTED,
            value.type_name()
        ))
    })
}

/// Host return values the bridge understands
pub trait IntoNativeResult {
    /// Convert into a call result
    fn into_native_result(self) -> NativeCallResult;
}

impl IntoNativeResult for NativeCallResult {
    fn into_native_result(self) -> NativeCallResult {
        self
    }
}

impl IntoNativeResult for () {
    fn into_native_result(self) -> NativeCallResult {
        NativeCallResult::Void
    }
}

impl IntoNativeResult for Value {
    fn into_native_result(self) -> NativeCallResult {
        NativeCallResult::Value(self)
    }
}

macro_rules! into_value_result {
    ($($ty:ty),*) => {
        $(
            impl IntoNativeResult for $ty {
                fn into_native_result(self) -> NativeCallResult {
                    NativeCallResult::Value(Value::from(self))
                }
            }
        )*
    };
}

into_value_result!(i32, i64, bool, ObjectRef);

impl IntoNativeResult for Arc<str> {
    fn into_native_result(self) -> NativeCallResult {
        NativeCallResult::Value(Value::Text(self))
    }
}

impl IntoNativeResult for String {
    fn into_native_result(self) -> NativeCallResult {
        NativeCallResult::Value(Value::text(self))
    }
}

impl<T: IntoNativeResult, E: Into<NativeFault>> IntoNativeResult for Result<T, E> {
    fn into_native_result(self) -> NativeCallResult {
        match self {
            Ok(value) => value.into_native_result(),
            Err(fault) => NativeCallResult::Fault(fault.into()),
        }
    }
}
