//! Kopi VM Object Runtime
//!
//! This crate provides the object runtime underneath managed class code:
//! - Value and object model (primitive values, heap object handles)
//! - Class descriptor registry (field layout, method tables, per-unit scopes)
//! - Static initialization (lazy, exactly once, sticky failures)
//! - Construction engine and dispatch resolver (overloads, virtual calls)
//! - Native bridge (host-implemented methods, output streams, parsing, time)
//!
//! # Example
//!
//! ```rust,ignore
//! use kopi_core::{Runtime, RuntimeOptions};
//!
//! let mut runtime = Runtime::new(RuntimeOptions::default())?;
//! let unit = runtime.load_unit(kopi_core::CompilationUnit::from_json_str(source)?)?;
//! runtime.run_main(unit, "Main")?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class;
pub mod construct;
pub mod dispatch;
pub mod interpreter;
pub mod native;
pub mod object;
pub mod options;
pub mod program;
pub mod registry;
pub mod runtime;
pub mod source;
pub mod static_init;
pub mod system;
pub mod value;

pub use interpreter::Interpreter;
pub use class::{CallSignature, ClassDescriptor, ConstructorEntry, FieldSlot, MethodEntry, MethodImpl, MethodTable};
pub use native::{
    CapturedOutput, NativeCallResult, NativeContext, NativeFault, NativeFn, NativeKey,
    NativeRegistry, NumberFormatError, NumberFormatErrorKind, OutputStreams, StreamId,
};
pub use object::{Heap, HeapStats, ObjectRef};
pub use options::RuntimeOptions;
pub use program::{CompilationUnit, LoadError};
pub use registry::{ClassRegistry, UnitId};
pub use runtime::Runtime;
pub use source::{
    BinaryOp, Body, ClassSource, ConstructorDecl, Expr, FieldDecl, Literal, MethodBody, MethodDecl,
    StaticDecl, Stmt, UnaryOp,
};
pub use value::{SemanticType, Value};

/// Runtime errors
///
/// Every construction, dispatch, static-init and native failure is reported
/// as exactly one of these kinds and propagated to the immediate caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    /// Class name not registered in the requesting unit or the system unit
    #[error("Class not found: {name}")]
    ClassNotFound {
        /// Requested class name
        name: String,
    },

    /// Same class name registered twice in one unit with different bodies
    #[error("Class redefinition: {name} is already registered in unit '{unit}' with a different body")]
    ClassRedefinition {
        /// Class name
        name: String,
        /// Unit name
        unit: String,
    },

    /// Parent chain of a class loops back on itself
    #[error("Inheritance cycle through class {name}")]
    InheritanceCycle {
        /// Class where the cycle was detected
        name: String,
    },

    /// Static initialization of a class failed (sticky)
    #[error("Static initialization of {class} failed: {cause}")]
    StaticInitFailed {
        /// Class whose initialization failed
        class: String,
        /// Original failure
        #[source]
        cause: Box<RuntimeError>,
    },

    /// Zero or more than one constructor accepts the arguments
    #[error("No matching constructor {class}.<init>{signature} ({matches} candidates)")]
    NoMatchingConstructor {
        /// Class being constructed
        class: String,
        /// Argument types of the call site
        signature: String,
        /// Number of constructors that accepted the arguments
        matches: usize,
    },

    /// More than one overload accepts the arguments
    #[error("Ambiguous overload {class}.{signature}: candidates {candidates:?}")]
    AmbiguousOverload {
        /// Owner class
        class: String,
        /// Call site signature
        signature: String,
        /// Matching declarations
        candidates: Vec<String>,
    },

    /// Instance method invoked through a null reference
    #[error("Null receiver for call to {signature}")]
    NullReceiver {
        /// Call site signature
        signature: String,
    },

    /// Field access or super dispatch through a null reference
    #[error("Dispatch on null: {operation}")]
    DispatchOnNull {
        /// Operation that dereferenced null
        operation: String,
    },

    /// Method key absent from the resolved method table
    #[error("No such method: {class}.{signature}")]
    NoSuchMethod {
        /// Class whose table was searched
        class: String,
        /// Call site signature
        signature: String,
    },

    /// Field name absent from a class layout or its static slots
    #[error("No such field: {class}.{field}")]
    NoSuchField {
        /// Class searched
        class: String,
        /// Field name
        field: String,
    },

    /// Local slot read beyond the frame's locals
    #[error("No such local: slot {slot} (frame has {frame_size} locals)")]
    NoSuchLocal {
        /// Requested slot
        slot: u16,
        /// Locals in the frame
        frame_size: usize,
    },

    /// Native method declared without a registered host binding
    #[error("Unbound native method {class}.{signature}")]
    UnboundNative {
        /// Declaring class
        class: String,
        /// Method signature
        signature: String,
    },

    /// Numeric text could not be parsed
    #[error(transparent)]
    NumberFormat(#[from] native::NumberFormatError),

    /// Host function reported a fault or broke its declared contract
    #[error("Native call {binding} failed: {message}")]
    NativeCallFailed {
        /// Binding that failed
        binding: String,
        /// Host diagnostic
        message: String,
    },

    /// Value of the wrong semantic type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected type
        expected: String,
        /// Actual type
        found: String,
    },

    /// Integer division or remainder by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Call depth exceeded the configured limit
    #[error("Stack overflow (call depth limit {limit})")]
    StackOverflow {
        /// Configured limit
        limit: usize,
    },

    /// The host refused to start a thread for managed execution
    #[error("Cannot start execution thread with a {stack_size} byte stack: {message}")]
    ExecutionThread {
        /// Requested stack size
        stack_size: usize,
        /// OS error
        message: String,
    },
}

impl RuntimeError {
    pub(crate) fn type_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        RuntimeError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Runtime result
pub type RuntimeResult<T> = Result<T, RuntimeError>;
