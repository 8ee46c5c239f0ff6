//! Runtime facade
//!
//! Owns the class registry, native bindings, heap and output streams.
//! Loading units needs `&mut self`; executing code needs only `&self`, so a
//! loaded runtime can be shared across threads.
//!
//! Every execution entry point runs managed code on a dedicated thread whose
//! stack is sized from `max_call_depth`, so deep recursion ends in
//! `StackOverflow` rather than overflowing the caller's stack.
//!
//! # Example
//!
//! ```rust,ignore
//! use kopi_core::{ClassSource, Expr, MethodDecl, Runtime, RuntimeOptions, SemanticType, Stmt, Body};
//!
//! let mut runtime = Runtime::new(RuntimeOptions::default())?;
//! let main = ClassSource::new("Hello").method(MethodDecl::static_fn(
//!     "main",
//!     vec![],
//!     SemanticType::Void,
//!     Body::new(vec![Stmt::println(Expr::text("hello"))]),
//! ));
//! let unit = runtime.load_classes("hello", vec![main])?;
//! runtime.run_main(unit, "Hello")?;
//! ```

use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::class::ClassDescriptor;
use crate::interpreter::Interpreter;
use crate::native::{register_system_natives, NativeRegistry, OutputStreams};
use crate::object::{Heap, HeapStats, ObjectRef};
use crate::options::RuntimeOptions;
use crate::program::CompilationUnit;
use crate::registry::{ClassRegistry, UnitId};
use crate::source::ClassSource;
use crate::system;
use crate::value::Value;
use crate::{RuntimeError, RuntimeResult};

/// Entry point executed by [`Runtime::run_main`]
pub const MAIN_METHOD: &str = "main";

/// The object runtime
pub struct Runtime {
    options: RuntimeOptions,
    registry: ClassRegistry,
    natives: NativeRegistry,
    streams: OutputStreams,
    heap: Heap,
}

impl Runtime {
    /// Runtime writing to the process stdout/stderr
    pub fn new(options: RuntimeOptions) -> RuntimeResult<Self> {
        Self::with_streams(options, OutputStreams::stdio())
    }

    /// Runtime writing to the given streams, with the system library loaded
    pub fn with_streams(options: RuntimeOptions, streams: OutputStreams) -> RuntimeResult<Self> {
        let mut natives = NativeRegistry::new();
        register_system_natives(&mut natives);

        let mut registry = ClassRegistry::new();
        registry.register_unit(UnitId::SYSTEM, system::bootstrap_classes(), &natives)?;
        debug!(classes = registry.len(), natives = natives.len(), "runtime bootstrapped");

        Ok(Self {
            options,
            registry,
            natives,
            streams,
            heap: Heap::new(),
        })
    }

    /// Runtime options
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Class registry
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Output streams
    pub fn streams(&self) -> &OutputStreams {
        &self.streams
    }

    /// Object heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Native bindings; additions apply to units loaded afterwards
    pub fn natives_mut(&mut self) -> &mut NativeRegistry {
        &mut self.natives
    }

    /// Register every class of `unit` in a fresh scope
    pub fn load_unit(&mut self, unit: CompilationUnit) -> RuntimeResult<UnitId> {
        self.load_classes(unit.name, unit.classes)
    }

    /// Register `classes` in a fresh scope named `name`
    pub fn load_classes(&mut self, name: impl Into<String>, classes: Vec<ClassSource>) -> RuntimeResult<UnitId> {
        let name = name.into();
        let id = self.registry.open_unit(name.clone());
        let count = classes.len();
        self.registry.register_unit(id, classes, &self.natives)?;
        debug!(unit = %name, classes = count, "loaded unit");
        Ok(id)
    }

    /// Lookup a class visible from `unit`
    pub fn lookup(&self, unit: UnitId, class: &str) -> RuntimeResult<Arc<ClassDescriptor>> {
        self.registry.lookup(unit, class)
    }

    /// Run `f` on an execution thread sized for `max_call_depth`
    ///
    /// Blocks until `f` returns. A panic on the execution thread resumes on
    /// the caller's thread.
    pub fn execute<T, F>(&self, f: F) -> RuntimeResult<T>
    where
        T: Send,
        F: for<'rt> FnOnce(&mut Interpreter<'rt>) -> RuntimeResult<T> + Send,
    {
        let stack_size = self.options.execution_stack_size();
        thread::scope(|scope| {
            let handle = thread::Builder::new()
                .name("kopi-exec".to_string())
                .stack_size(stack_size)
                .spawn_scoped(scope, move || f(&mut Interpreter::with_stack_limit(self, stack_size)))
                .map_err(|err| RuntimeError::ExecutionThread {
                    stack_size,
                    message: err.to_string(),
                })?;
            match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        })
    }

    /// Construct an instance of `class`
    pub fn construct(&self, unit: UnitId, class: &str, args: Vec<Value>) -> RuntimeResult<ObjectRef> {
        let class = self.lookup(unit, class)?;
        self.execute(move |interp| interp.construct(&class, args))
    }

    /// Call a static method
    pub fn invoke_static(&self, unit: UnitId, class: &str, method: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let class = self.lookup(unit, class)?;
        self.execute(move |interp| interp.invoke_static(&class, method, args))
    }

    /// Call an instance method on the receiver's runtime class
    pub fn invoke_virtual(&self, receiver: &Value, method: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        self.execute(move |interp| interp.invoke_virtual(receiver, method, args))
    }

    /// Read a static field (initializing its class first)
    pub fn get_static(&self, unit: UnitId, class: &str, field: &str) -> RuntimeResult<Value> {
        let class = self.lookup(unit, class)?;
        self.execute(move |interp| interp.get_static(&class, field))
    }

    /// Run the static no-argument `main` of `class`
    pub fn run_main(&self, unit: UnitId, class: &str) -> RuntimeResult<()> {
        debug!(class, "running main");
        self.invoke_static(unit, class, MAIN_METHOD, Vec::new())?;
        Ok(())
    }

    /// Load `unit` and run its entry class
    pub fn run_unit(&mut self, unit: CompilationUnit) -> RuntimeResult<UnitId> {
        let entry = unit.entry.clone().ok_or_else(|| RuntimeError::ClassNotFound {
            name: format!("<entry of unit {}>", unit.name),
        })?;
        let id = self.load_unit(unit)?;
        self.run_main(id, &entry)?;
        Ok(id)
    }

    /// Flush pending output
    pub fn flush(&self) -> std::io::Result<()> {
        self.streams.flush()
    }

    /// Heap statistics
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("options", &self.options)
            .field("classes", &self.registry.len())
            .field("natives", &self.natives.len())
            .field("heap", &self.heap)
            .finish()
    }
}
