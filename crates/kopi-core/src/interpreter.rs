//! Body interpreter
//!
//! Executes resolved statement trees against the runtime. An `Interpreter`
//! holds the per-call state of one entry into managed code (call depth); the
//! shared state lives in [`Runtime`].

use std::cmp::Ordering;
use std::sync::Arc;

use crate::class::{ClassDescriptor, MethodEntry, MethodImpl};
use crate::dispatch;
use crate::native::{bridge, NativeContext};
use crate::object::ObjectRef;
use crate::runtime::Runtime;
use crate::source::{BinaryOp, Body, Expr, Literal, Stmt, UnaryOp};
use crate::value::{SemanticType, Value};
use crate::{RuntimeError, RuntimeResult};

/// Activation of one body
struct Frame {
    /// Class whose code is running (name resolution scope, super target)
    class: Arc<ClassDescriptor>,
    /// Receiver for constructors and instance methods
    this: Option<ObjectRef>,
    locals: Vec<Value>,
}

impl Frame {
    fn new(class: &Arc<ClassDescriptor>, this: Option<ObjectRef>, mut locals: Vec<Value>, body: &Body) -> Self {
        let wanted = usize::from(body.max_locals);
        if locals.len() < wanted {
            locals.resize(wanted, Value::Null);
        }
        Self {
            class: class.clone(),
            this,
            locals,
        }
    }

    fn receiver(&self) -> RuntimeResult<&ObjectRef> {
        self.this
            .as_ref()
            .ok_or_else(|| RuntimeError::type_mismatch("receiver", "static context"))
    }
}

/// Control flow out of a statement
enum Flow {
    Next,
    Return(Option<Value>),
}

/// Host stack reserved below the measured limit for the deepest non-call
/// recursion (expression nesting, native frames, error formatting)
const STACK_RED_ZONE: usize = 256 * 1024;

/// Host stack an interpreter may use, measured from where it was created
#[derive(Debug, Clone, Copy)]
struct StackBudget {
    base: usize,
    limit: usize,
}

impl StackBudget {
    fn exhausted(&self) -> bool {
        stack_address().abs_diff(self.base) + STACK_RED_ZONE > self.limit
    }
}

/// Approximate current stack pointer
#[inline(never)]
fn stack_address() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

/// Per-call interpreter state
pub struct Interpreter<'rt> {
    runtime: &'rt Runtime,
    depth: usize,
    stack: Option<StackBudget>,
}

impl<'rt> Interpreter<'rt> {
    /// Fresh interpreter at call depth zero
    ///
    /// Only the call depth limit applies; the caller's thread must have
    /// enough stack for it. [`Runtime`] entry points use
    /// [`with_stack_limit`](Self::with_stack_limit) on a thread sized for
    /// the configured depth.
    pub fn new(runtime: &'rt Runtime) -> Self {
        Self {
            runtime,
            depth: 0,
            stack: None,
        }
    }

    /// Interpreter that also fails with `StackOverflow` once it has used
    /// `limit` bytes of the current thread's stack
    pub fn with_stack_limit(runtime: &'rt Runtime, limit: usize) -> Self {
        Self {
            runtime,
            depth: 0,
            stack: Some(StackBudget {
                base: stack_address(),
                limit,
            }),
        }
    }

    /// Runtime this interpreter executes against
    pub fn runtime(&self) -> &'rt Runtime {
        self.runtime
    }

    /// Current nesting of invocations
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run `f` one invocation level deeper
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> RuntimeResult<T>) -> RuntimeResult<T> {
        let limit = self.runtime.options().max_call_depth;
        if self.depth >= limit || self.stack.is_some_and(|stack| stack.exhausted()) {
            return Err(RuntimeError::StackOverflow { limit });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Evaluate `expr` in the static context of `class`
    pub fn eval_in_class(&mut self, class: &Arc<ClassDescriptor>, expr: &Expr) -> RuntimeResult<Value> {
        let frame = Frame::new(class, None, Vec::new(), &Body::default());
        self.eval(&frame, expr)
    }

    /// Run `body` in the static context of `class` with the given locals
    pub fn run_body(
        &mut self,
        class: &Arc<ClassDescriptor>,
        body: &Body,
        locals: Vec<Value>,
    ) -> RuntimeResult<Option<Value>> {
        let mut frame = Frame::new(class, None, locals, body);
        self.run_frame(&mut frame, body)
    }

    /// Run `body` with `this` in slot 0 followed by `args`
    pub(crate) fn run_instance_body(
        &mut self,
        class: &Arc<ClassDescriptor>,
        body: &Body,
        this: ObjectRef,
        args: Vec<Value>,
    ) -> RuntimeResult<Option<Value>> {
        let mut locals = Vec::with_capacity(args.len() + 1);
        locals.push(Value::Object(this.clone()));
        locals.extend(args);
        let mut frame = Frame::new(class, Some(this), locals, body);
        self.run_frame(&mut frame, body)
    }

    fn run_frame(&mut self, frame: &mut Frame, body: &Body) -> RuntimeResult<Option<Value>> {
        match self.exec_block(frame, &body.code)? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(None),
        }
    }

    /// Invoke a resolved method; `receiver` is `None` for static methods
    ///
    /// Void methods yield `Value::Null`.
    pub fn invoke(
        &mut self,
        entry: &Arc<MethodEntry>,
        receiver: Option<ObjectRef>,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        let declaring = self
            .runtime
            .registry()
            .by_id(entry.declaring_id)
            .cloned()
            .ok_or_else(|| RuntimeError::ClassNotFound {
                name: entry.declaring_class.clone(),
            })?;
        if entry.is_static {
            self.ensure_initialized(&declaring)?;
        }

        self.nested(|interp| match &entry.implementation {
            MethodImpl::Managed(body) => {
                let returned = match receiver {
                    Some(this) => interp.run_instance_body(&declaring, body, this, args)?,
                    None => interp.run_body(&declaring, body, args)?,
                };
                check_return(entry, returned)
            }
            MethodImpl::Native(native) => {
                let mut full_args = Vec::with_capacity(args.len() + 1);
                full_args.extend(receiver.map(Value::Object));
                full_args.extend(args);
                let runtime = interp.runtime;
                let ctx = NativeContext::new(runtime.streams(), runtime.heap(), runtime.options());
                bridge::invoke_native(&ctx, entry, native, &full_args)
            }
        })
    }

    /// Call a static method on `class`, selected by overload resolution
    pub fn invoke_static(&mut self, class: &Arc<ClassDescriptor>, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let entry = dispatch::resolve_static(class, name, &args)?;
        self.invoke(&entry, None, args)
    }

    /// Call an instance method on the receiver's runtime class
    pub fn invoke_virtual(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let (object, entry) = dispatch::resolve_virtual(receiver, name, &args)?;
        self.invoke(&entry, Some(object), args)
    }

    /// Read a static field of `class` or the nearest ancestor declaring it
    pub fn get_static(&mut self, class: &Arc<ClassDescriptor>, name: &str) -> RuntimeResult<Value> {
        let (owner, slot) = static_owner(class, name)?;
        self.ensure_initialized(&owner)?;
        owner.statics().get(slot).ok_or_else(|| no_such_field(&owner, name))
    }

    /// Write a static field of `class` or the nearest ancestor declaring it
    pub fn put_static(&mut self, class: &Arc<ClassDescriptor>, name: &str, value: Value) -> RuntimeResult<()> {
        let (owner, slot) = static_owner(class, name)?;
        self.ensure_initialized(&owner)?;
        let ty = owner.static_slots()[slot].ty;
        if !value.conforms_to(ty) {
            return Err(RuntimeError::type_mismatch(ty, value.type_name()));
        }
        owner.statics().set(slot, value);
        Ok(())
    }

    fn lookup(&self, frame: &Frame, name: &str) -> RuntimeResult<Arc<ClassDescriptor>> {
        self.runtime.registry().lookup(frame.class.unit(), name)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn exec_block(&mut self, frame: &mut Frame, code: &[Stmt]) -> RuntimeResult<Flow> {
        for stmt in code {
            if let Flow::Return(value) = self.exec(frame, stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec(&mut self, frame: &mut Frame, stmt: &Stmt) -> RuntimeResult<Flow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(frame, expr)?;
            }
            Stmt::Store { local, value } => {
                let value = self.eval(frame, value)?;
                let slot = usize::from(*local);
                if slot >= frame.locals.len() {
                    frame.locals.resize(slot + 1, Value::Null);
                }
                frame.locals[slot] = value;
            }
            Stmt::PutField {
                object,
                owner,
                field,
                value,
            } => {
                let target = self.eval(frame, object)?;
                let value = self.eval(frame, value)?;
                let owner = self.lookup(frame, owner)?;
                let (object, slot) = field_target(&owner, &target, field, "write")?;
                let ty = owner.fields()[slot].ty;
                if !value.conforms_to(ty) {
                    return Err(RuntimeError::type_mismatch(ty, value.type_name()));
                }
                object
                    .set_field(slot, value)
                    .map_err(|_| no_such_field(&owner, field))?;
            }
            Stmt::PutStatic { class, field, value } => {
                let value = self.eval(frame, value)?;
                let class = self.lookup(frame, class)?;
                self.put_static(&class, field, value)?;
            }
            Stmt::If { cond, then, otherwise } => {
                let branch = if self.eval_condition(frame, cond)? { then } else { otherwise };
                return self.exec_block(frame, branch);
            }
            Stmt::While { cond, body } => {
                while self.eval_condition(frame, cond)? {
                    if let Flow::Return(value) = self.exec_block(frame, body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Return(value) => {
                let value = value.as_ref().map(|v| self.eval(frame, v)).transpose()?;
                return Ok(Flow::Return(value));
            }
            Stmt::SuperInit { args } => {
                let args = self.eval_args(frame, args)?;
                let this = frame.receiver()?.clone();
                let parent = frame.class.parent().cloned().ok_or_else(|| RuntimeError::NoMatchingConstructor {
                    class: frame.class.name().to_string(),
                    signature: crate::class::describe_call("super", &args),
                    matches: 0,
                })?;
                self.run_constructor(&parent, this, args)?;
            }
        }
        Ok(Flow::Next)
    }

    fn eval_condition(&mut self, frame: &Frame, cond: &Expr) -> RuntimeResult<bool> {
        let value = self.eval(frame, cond)?;
        value
            .as_bool()
            .ok_or_else(|| RuntimeError::type_mismatch(SemanticType::Boolean, value.type_name()))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn eval_args(&mut self, frame: &Frame, args: &[Expr]) -> RuntimeResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(frame, arg)).collect()
    }

    fn eval(&mut self, frame: &Frame, expr: &Expr) -> RuntimeResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Long(l) => Value::Long(*l),
                Literal::Text(s) => Value::text(s.as_str()),
            }),
            Expr::Local(slot) => frame.locals.get(usize::from(*slot)).cloned().ok_or(RuntimeError::NoSuchLocal {
                slot: *slot,
                frame_size: frame.locals.len(),
            }),
            Expr::This => Ok(Value::Object(frame.receiver()?.clone())),
            Expr::GetField { object, owner, field } => {
                let target = self.eval(frame, object)?;
                let owner = self.lookup(frame, owner)?;
                let (object, slot) = field_target(&owner, &target, field, "read")?;
                object.get_field(slot).ok_or_else(|| no_such_field(&owner, field))
            }
            Expr::GetStatic { class, field } => {
                let class = self.lookup(frame, class)?;
                self.get_static(&class, field)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(frame, operand)?;
                unary(*op, value)
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(frame, lhs)?;
                let rhs = self.eval(frame, rhs)?;
                binary(*op, lhs, rhs)
            }
            Expr::New { class, args } => {
                let args = self.eval_args(frame, args)?;
                let class = self.lookup(frame, class)?;
                self.construct(&class, args).map(Value::Object)
            }
            Expr::InvokeStatic { class, method, args } => {
                let args = self.eval_args(frame, args)?;
                let class = self.lookup(frame, class)?;
                self.invoke_static(&class, method, args)
            }
            Expr::InvokeVirtual { receiver, method, args } => {
                let receiver = self.eval(frame, receiver)?;
                let args = self.eval_args(frame, args)?;
                self.invoke_virtual(&receiver, method, args)
            }
            Expr::InvokeSuper { method, args } => {
                let args = self.eval_args(frame, args)?;
                let this = frame.this.clone().ok_or_else(|| RuntimeError::DispatchOnNull {
                    operation: format!("super.{}", crate::class::describe_call(method, &args)),
                })?;
                let parent = frame.class.parent().ok_or_else(|| RuntimeError::NoSuchMethod {
                    class: frame.class.name().to_string(),
                    signature: format!("super.{}", crate::class::describe_call(method, &args)),
                })?;
                let entry = dispatch::resolve_special(parent, method, &args)?;
                self.invoke(&entry, Some(this), args)
            }
        }
    }
}

fn check_return(entry: &MethodEntry, returned: Option<Value>) -> RuntimeResult<Value> {
    match (entry.returns, returned) {
        (SemanticType::Void, None) => Ok(Value::Null),
        (SemanticType::Void, Some(value)) => Err(RuntimeError::type_mismatch("void", value.type_name())),
        (ty, None) => Err(RuntimeError::type_mismatch(ty, "void")),
        (ty, Some(value)) if value.conforms_to(ty) => Ok(value),
        (ty, Some(value)) => Err(RuntimeError::type_mismatch(ty, value.type_name())),
    }
}

fn no_such_field(class: &ClassDescriptor, field: &str) -> RuntimeError {
    RuntimeError::NoSuchField {
        class: class.name().to_string(),
        field: field.to_string(),
    }
}

fn static_owner(class: &Arc<ClassDescriptor>, name: &str) -> RuntimeResult<(Arc<ClassDescriptor>, usize)> {
    class.static_owner(name).ok_or_else(|| no_such_field(class, name))
}

/// Check that `target` is an instance of `owner` and find the field slot
fn field_target(
    owner: &ClassDescriptor,
    target: &Value,
    field: &str,
    access: &str,
) -> RuntimeResult<(ObjectRef, usize)> {
    let object = match target {
        Value::Object(object) => object,
        Value::Null => {
            return Err(RuntimeError::DispatchOnNull {
                operation: format!("{} of field {}.{}", access, owner.name(), field),
            })
        }
        other => return Err(RuntimeError::type_mismatch(owner.name(), other.type_name())),
    };
    if !object.class().is_subclass_of(owner) {
        return Err(RuntimeError::type_mismatch(owner.name(), object.class_name()));
    }
    let slot = owner.field_slot(field).ok_or_else(|| no_such_field(owner, field))?;
    Ok((object.clone(), slot))
}

fn unary(op: UnaryOp, value: Value) -> RuntimeResult<Value> {
    match (op, &value) {
        (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnaryOp::Neg, Value::Long(l)) => Ok(Value::Long(l.wrapping_neg())),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Widen, Value::Int(i)) => Ok(Value::Long(i64::from(*i))),
        (UnaryOp::Narrow, Value::Long(l)) => Ok(Value::Int(*l as i32)),
        (UnaryOp::Not, _) => Err(RuntimeError::type_mismatch(SemanticType::Boolean, value.type_name())),
        (UnaryOp::Widen, _) => Err(RuntimeError::type_mismatch(SemanticType::Int, value.type_name())),
        (UnaryOp::Narrow, _) => Err(RuntimeError::type_mismatch(SemanticType::Long, value.type_name())),
        (UnaryOp::Neg, _) => Err(RuntimeError::type_mismatch("int or long", value.type_name())),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> RuntimeResult<Value> {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => arithmetic(op, lhs, rhs),
        BinaryOp::Eq | BinaryOp::Ne => {
            if let (Some(l), Some(r)) = (lhs.semantic_type(), rhs.semantic_type()) {
                if l != r {
                    return Err(RuntimeError::type_mismatch(l, r));
                }
            }
            let equal = lhs == rhs;
            Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => a.cmp(b),
                (Value::Long(a), Value::Long(b)) => a.cmp(b),
                _ => return Err(RuntimeError::type_mismatch(lhs.type_name(), rhs.type_name())),
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
    }
}

macro_rules! wrapping_arith {
    ($op:expr, $a:expr, $b:expr, $variant:path) => {
        match $op {
            BinaryOp::Add => Ok($variant($a.wrapping_add($b))),
            BinaryOp::Sub => Ok($variant($a.wrapping_sub($b))),
            BinaryOp::Mul => Ok($variant($a.wrapping_mul($b))),
            BinaryOp::Div if $b == 0 => Err(RuntimeError::DivisionByZero),
            BinaryOp::Div => Ok($variant($a.wrapping_div($b))),
            BinaryOp::Rem if $b == 0 => Err(RuntimeError::DivisionByZero),
            _ => Ok($variant($a.wrapping_rem($b))),
        }
    };
}

fn arithmetic(op: BinaryOp, lhs: Value, rhs: Value) -> RuntimeResult<Value> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => wrapping_arith!(op, *a, *b, Value::Int),
        (Value::Long(a), Value::Long(b)) => wrapping_arith!(op, *a, *b, Value::Long),
        // Text concatenation uses canonical text on both sides
        (Value::Text(_), _) | (_, Value::Text(_)) if op == BinaryOp::Add => Ok(Value::text(format!("{}{}", lhs, rhs))),
        _ => Err(RuntimeError::type_mismatch(lhs.type_name(), rhs.type_name())),
    }
}
