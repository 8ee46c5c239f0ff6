//! Static initialization manager
//!
//! A class's static initializers run exactly once, lazily, on first access to
//! a static slot, a static method, or construction. The per-class state
//! machine is guarded by a lock and condition variable:
//!
//! ```text
//! Pending --begin--> Running(thread) --finish(ok)--> Done
//!                                    --finish(err)-> Failed(cause)   (sticky)
//! ```
//!
//! The initializing thread re-entering its own class observes the partially
//! initialized state instead of re-running. Other threads block until the
//! state leaves `Running`.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::class::ClassDescriptor;
use crate::interpreter::Interpreter;
use crate::value::Value;
use crate::{RuntimeError, RuntimeResult};

#[derive(Debug, Clone)]
enum InitState {
    Pending,
    Running(ThreadId),
    Done,
    Failed(RuntimeError),
}

/// Static slot storage plus initialization state for one class
#[derive(Debug)]
pub struct StaticStorage {
    state: Mutex<InitState>,
    ready: Condvar,
    values: Mutex<Vec<Value>>,
}

impl StaticStorage {
    /// Storage with every slot at its default value
    pub fn new(defaults: Vec<Value>) -> Self {
        Self {
            state: Mutex::new(InitState::Pending),
            ready: Condvar::new(),
            values: Mutex::new(defaults),
        }
    }

    /// Read a static slot
    pub fn get(&self, slot: usize) -> Option<Value> {
        self.values.lock().get(slot).cloned()
    }

    /// Write a static slot
    pub fn set(&self, slot: usize, value: Value) -> bool {
        match self.values.lock().get_mut(slot) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Whether initialization completed successfully
    pub fn is_initialized(&self) -> bool {
        matches!(*self.state.lock(), InitState::Done)
    }

    /// Claim initialization; `Ok(true)` means the caller must run initializers
    fn begin(&self, class: &str) -> RuntimeResult<bool> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match &*state {
                InitState::Done => return Ok(false),
                InitState::Failed(cause) => {
                    return Err(RuntimeError::StaticInitFailed {
                        class: class.to_string(),
                        cause: Box::new(cause.clone()),
                    })
                }
                InitState::Running(owner) if *owner == me => return Ok(false),
                InitState::Running(_) => self.ready.wait(&mut state),
                InitState::Pending => {
                    *state = InitState::Running(me);
                    return Ok(true);
                }
            }
        }
    }

    fn finish(&self, outcome: Result<(), RuntimeError>) {
        let mut state = self.state.lock();
        *state = match outcome {
            Ok(()) => InitState::Done,
            Err(cause) => InitState::Failed(cause),
        };
        self.ready.notify_all();
    }
}

impl Interpreter<'_> {
    /// Run `class`'s static initialization if it has not run yet
    ///
    /// The parent class is initialized first. A failure is recorded and every
    /// later access to the class reports `StaticInitFailed` again without
    /// re-running any initializer.
    pub fn ensure_initialized(&mut self, class: &Arc<ClassDescriptor>) -> RuntimeResult<()> {
        if !class.statics().begin(class.name())? {
            return Ok(());
        }

        debug!(class = class.name(), "running static initializers");
        match self.run_static_initializers(class) {
            Ok(()) => {
                class.statics().finish(Ok(()));
                debug!(class = class.name(), "static initialization complete");
                Ok(())
            }
            Err(cause) => {
                debug!(class = class.name(), error = %cause, "static initialization failed");
                class.statics().finish(Err(cause.clone()));
                Err(RuntimeError::StaticInitFailed {
                    class: class.name().to_string(),
                    cause: Box::new(cause),
                })
            }
        }
    }

    fn run_static_initializers(&mut self, class: &Arc<ClassDescriptor>) -> RuntimeResult<()> {
        if let Some(parent) = class.parent() {
            self.ensure_initialized(parent)?;
        }

        for (slot, decl) in class.static_slots().iter().enumerate() {
            let Some(init) = &decl.initializer else {
                continue;
            };
            let value = self.eval_in_class(class, init)?;
            if !value.conforms_to(decl.ty) {
                return Err(RuntimeError::type_mismatch(decl.ty, value.type_name()));
            }
            class.statics().set(slot, value);
        }

        if let Some(block) = class.static_block() {
            self.run_body(class, block, Vec::new())?;
        }
        Ok(())
    }
}
