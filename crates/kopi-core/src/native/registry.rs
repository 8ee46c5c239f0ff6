//! Native binding registry
//!
//! Hosts register implementations by (class, method, parameter types) before
//! loading any class that declares them; the class registry links native
//! declarations against this table at registration time.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::native::marshal::IntoNativeResult;
use crate::native::{NativeCallResult, NativeContext};
use crate::value::{SemanticType, Value};

/// A host function implementing a native method
///
/// Instance natives receive the receiver as argument 0.
pub type NativeFn = Arc<dyn Fn(&NativeContext<'_>, &[Value]) -> NativeCallResult + Send + Sync>;

/// Binding key: declaring class, method name, parameter types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeKey {
    /// Declaring class name
    pub class: String,
    /// Method name
    pub method: String,
    /// Declared parameter types (receiver excluded)
    pub params: Vec<SemanticType>,
}

impl NativeKey {
    /// Create a key
    pub fn new(class: impl Into<String>, method: impl Into<String>, params: Vec<SemanticType>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
            params,
        }
    }
}

impl fmt::Display for NativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(|p| p.name()).collect();
        write!(f, "{}.{}({})", self.class, self.method, params.join(", "))
    }
}

/// Registry of native functions indexed by binding key
#[derive(Clone, Default)]
pub struct NativeRegistry {
    bindings: FxHashMap<NativeKey, NativeFn>,
}

impl NativeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host function; a later registration under the same key wins
    pub fn register<F, R>(
        &mut self,
        class: impl Into<String>,
        method: impl Into<String>,
        params: Vec<SemanticType>,
        handler: F,
    ) where
        F: Fn(&NativeContext<'_>, &[Value]) -> R + Send + Sync + 'static,
        R: IntoNativeResult,
    {
        let key = NativeKey::new(class, method, params);
        let native: NativeFn = Arc::new(move |ctx: &NativeContext<'_>, args: &[Value]| {
            handler(ctx, args).into_native_result()
        });
        self.bindings.insert(key, native);
    }

    /// Get a binding (used at link time)
    pub fn get(&self, key: &NativeKey) -> Option<&NativeFn> {
        self.bindings.get(key)
    }

    /// Check if a binding is registered
    pub fn contains(&self, key: &NativeKey) -> bool {
        self.bindings.contains_key(key)
    }

    /// Number of registered bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.bindings.keys().map(|k| k.to_string()).collect();
        keys.sort();
        f.debug_struct("NativeRegistry").field("bindings", &keys).finish()
    }
}
