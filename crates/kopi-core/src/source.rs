//! Resolved class descriptions handed over by the upstream compiler/loader
//!
//! A `ClassSource` is the fully resolved form of one class: field slots,
//! static slots with initializer expressions, constructors and methods with
//! structured bodies (or a native marker). The types serialize with serde so
//! a loader can ship them as JSON; the builder helpers below cover hosts and
//! tests that assemble classes in Rust.
//!
//! # Frames
//!
//! Local slot 0 holds the receiver in constructors and instance methods;
//! parameters follow in declaration order. Static methods start their
//! parameters at slot 0. `Body::max_locals` reserves extra slots beyond the
//! parameters, initialized to null.

use serde::{Deserialize, Serialize};

use crate::value::SemanticType;

/// One class as resolved by the upstream compiler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSource {
    /// Class name (unique within its compilation unit)
    pub name: String,
    /// Parent class name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Declared instance fields, in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    /// Declared static fields, in declaration order
    #[serde(default)]
    pub statics: Vec<StaticDecl>,
    /// Static block run after the static field initializers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_block: Option<Body>,
    /// Declared constructors
    #[serde(default)]
    pub constructors: Vec<ConstructorDecl>,
    /// Declared methods (static and instance)
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}

/// Instance field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name
    pub name: String,
    /// Semantic type
    #[serde(rename = "type")]
    pub ty: SemanticType,
}

/// Static field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticDecl {
    /// Field name
    pub name: String,
    /// Semantic type
    #[serde(rename = "type")]
    pub ty: SemanticType,
    /// Initializer expression (constant or constructor call)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Expr>,
}

/// Constructor declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorDecl {
    /// Parameter types
    #[serde(default)]
    pub params: Vec<SemanticType>,
    /// Constructor body
    pub body: Body,
}

/// Method declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    /// Method name
    pub name: String,
    /// Parameter types
    #[serde(default)]
    pub params: Vec<SemanticType>,
    /// Return type
    #[serde(default = "void")]
    pub returns: SemanticType,
    /// Static methods have no receiver and are not virtually dispatched
    #[serde(default)]
    pub is_static: bool,
    /// Managed body or native marker
    pub body: MethodBody,
}

fn void() -> SemanticType {
    SemanticType::Void
}

/// Method implementation kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MethodBody {
    /// Body executed by the interpreter
    Managed(Body),
    /// Host-implemented through the native bridge
    Native,
}

/// Executable body
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Body {
    /// Minimum local slot count (receiver and parameters included)
    #[serde(default)]
    pub max_locals: u16,
    /// Statements in program order
    pub code: Vec<Stmt>,
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Evaluate and discard
    Expr(Expr),
    /// Store into a local slot
    Store {
        /// Local slot
        local: u16,
        /// Stored value
        value: Expr,
    },
    /// Store into an instance field
    PutField {
        /// Target object
        object: Expr,
        /// Class whose layout declares the field
        owner: String,
        /// Field name
        field: String,
        /// Stored value
        value: Expr,
    },
    /// Store into a static field
    PutStatic {
        /// Class owning the static slot (or a subclass of it)
        class: String,
        /// Field name
        field: String,
        /// Stored value
        value: Expr,
    },
    /// Conditional
    If {
        /// Boolean condition
        cond: Expr,
        /// Taken when true
        then: Vec<Stmt>,
        /// Taken when false
        #[serde(default)]
        otherwise: Vec<Stmt>,
    },
    /// Loop while the condition holds
    While {
        /// Boolean condition
        cond: Expr,
        /// Loop body
        body: Vec<Stmt>,
    },
    /// Return from the body
    Return(Option<Expr>),
    /// Run a parent constructor against the receiver
    SuperInit {
        /// Constructor arguments
        args: Vec<Expr>,
    },
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Constant
    Literal(Literal),
    /// Local slot
    Local(u16),
    /// Receiver (local slot 0)
    This,
    /// Instance field read
    GetField {
        /// Source object
        object: Box<Expr>,
        /// Class whose layout declares the field
        owner: String,
        /// Field name
        field: String,
    },
    /// Static field read
    GetStatic {
        /// Class owning the static slot (or a subclass of it)
        class: String,
        /// Field name
        field: String,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Allocate and construct
    New {
        /// Class to instantiate
        class: String,
        /// Constructor arguments
        args: Vec<Expr>,
    },
    /// Static method call resolved by overload
    InvokeStatic {
        /// Owner class
        class: String,
        /// Method name
        method: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// Instance method call resolved on the receiver's runtime class
    InvokeVirtual {
        /// Receiver
        receiver: Box<Expr>,
        /// Method name
        method: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// Parent implementation of an instance method, called on the receiver
    InvokeSuper {
        /// Method name
        method: String,
        /// Arguments
        args: Vec<Expr>,
    },
}

/// Constant value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Null reference
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// Text
    Text(String),
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Arithmetic negation (wrapping)
    Neg,
    /// Boolean not
    Not,
    /// int -> long
    Widen,
    /// long -> int (truncating)
    Narrow,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Wrapping addition
    Add,
    /// Wrapping subtraction
    Sub,
    /// Wrapping multiplication
    Mul,
    /// Truncating division
    Div,
    /// Remainder
    Rem,
    /// Equality
    Eq,
    /// Inequality
    Ne,
    /// Less than
    Lt,
    /// Less or equal
    Le,
    /// Greater than
    Gt,
    /// Greater or equal
    Ge,
}

// ============================================================================
// Builders
// ============================================================================

impl ClassSource {
    /// Start a class with no parent and no members
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            statics: Vec::new(),
            static_block: None,
            constructors: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Set the parent class
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add an instance field
    pub fn field(mut self, name: impl Into<String>, ty: SemanticType) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty,
        });
        self
    }

    /// Add a static field, optionally with an initializer
    pub fn static_field(mut self, name: impl Into<String>, ty: SemanticType, init: Option<Expr>) -> Self {
        self.statics.push(StaticDecl {
            name: name.into(),
            ty,
            init,
        });
        self
    }

    /// Set the static block
    pub fn static_block(mut self, body: Body) -> Self {
        self.static_block = Some(body);
        self
    }

    /// Add a constructor
    pub fn constructor(mut self, params: Vec<SemanticType>, body: Body) -> Self {
        self.constructors.push(ConstructorDecl { params, body });
        self
    }

    /// Add a method
    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }
}

impl MethodDecl {
    /// Managed instance method
    pub fn instance(name: impl Into<String>, params: Vec<SemanticType>, returns: SemanticType, body: Body) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            is_static: false,
            body: MethodBody::Managed(body),
        }
    }

    /// Managed static method
    pub fn static_fn(name: impl Into<String>, params: Vec<SemanticType>, returns: SemanticType, body: Body) -> Self {
        Self {
            is_static: true,
            ..Self::instance(name, params, returns, body)
        }
    }

    /// Native method; `is_static` selects the receiver convention
    pub fn native(name: impl Into<String>, params: Vec<SemanticType>, returns: SemanticType, is_static: bool) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            is_static,
            body: MethodBody::Native,
        }
    }
}

impl Body {
    /// Body with no extra locals
    pub fn new(code: Vec<Stmt>) -> Self {
        Self { max_locals: 0, code }
    }

    /// Body reserving `max_locals` slots
    pub fn with_locals(max_locals: u16, code: Vec<Stmt>) -> Self {
        Self { max_locals, code }
    }
}

impl Stmt {
    /// `this.<field> = value` for a field declared by `owner`
    pub fn put_this(owner: impl Into<String>, field: impl Into<String>, value: Expr) -> Self {
        Stmt::PutField {
            object: Expr::This,
            owner: owner.into(),
            field: field.into(),
            value,
        }
    }

    /// `System.out.println(value)`
    pub fn println(value: Expr) -> Self {
        Stmt::Expr(Expr::invoke_virtual(Expr::get_static("System", "out"), "println", vec![value]))
    }

    /// `System.err.println(value)`
    pub fn eprintln(value: Expr) -> Self {
        Stmt::Expr(Expr::invoke_virtual(Expr::get_static("System", "err"), "println", vec![value]))
    }

    /// `return value;`
    pub fn ret(value: Expr) -> Self {
        Stmt::Return(Some(value))
    }
}

impl Expr {
    /// Int constant
    pub fn int(i: i32) -> Self {
        Expr::Literal(Literal::Int(i))
    }

    /// Long constant
    pub fn long(l: i64) -> Self {
        Expr::Literal(Literal::Long(l))
    }

    /// Boolean constant
    pub fn bool(b: bool) -> Self {
        Expr::Literal(Literal::Bool(b))
    }

    /// Text constant
    pub fn text(s: impl Into<String>) -> Self {
        Expr::Literal(Literal::Text(s.into()))
    }

    /// Null constant
    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    /// Local slot read
    pub fn local(slot: u16) -> Self {
        Expr::Local(slot)
    }

    /// Instance field read
    pub fn get_field(object: Expr, owner: impl Into<String>, field: impl Into<String>) -> Self {
        Expr::GetField {
            object: Box::new(object),
            owner: owner.into(),
            field: field.into(),
        }
    }

    /// `this.<field>` for a field declared by `owner`
    pub fn this_field(owner: impl Into<String>, field: impl Into<String>) -> Self {
        Self::get_field(Expr::This, owner, field)
    }

    /// Static field read
    pub fn get_static(class: impl Into<String>, field: impl Into<String>) -> Self {
        Expr::GetStatic {
            class: class.into(),
            field: field.into(),
        }
    }

    /// Unary operation
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Binary operation
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// `lhs + rhs`
    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Add, lhs, rhs)
    }

    /// `lhs - rhs`
    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Sub, lhs, rhs)
    }

    /// `lhs * rhs`
    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Mul, lhs, rhs)
    }

    /// `new class(args)`
    pub fn new_object(class: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::New {
            class: class.into(),
            args,
        }
    }

    /// `class.method(args)`
    pub fn invoke_static(class: impl Into<String>, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::InvokeStatic {
            class: class.into(),
            method: method.into(),
            args,
        }
    }

    /// `receiver.method(args)`
    pub fn invoke_virtual(receiver: Expr, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::InvokeVirtual {
            receiver: Box::new(receiver),
            method: method.into(),
            args,
        }
    }

    /// `super.method(args)`
    pub fn invoke_super(method: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::InvokeSuper {
            method: method.into(),
            args,
        }
    }
}
