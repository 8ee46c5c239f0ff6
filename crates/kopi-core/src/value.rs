//! Value representation and semantic types
//!
//! Primitive values are stored inline and copied on assignment. Object values
//! are handles: cloning a `Value::Object` copies the handle, so two values can
//! alias the same instance and observe each other's field writes.
//!
//! # Canonical text
//!
//! ```text
//! Int / Long:  base-10 digits, leading '-' when negative, no grouping
//! Bool:        true | false
//! Text:        the text itself
//! Null:        null
//! Object:      ClassName@<hex id>
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::object::ObjectRef;

/// Abstract value category, independent of any source-language keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    /// Boolean
    Boolean,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// Immutable text
    Text,
    /// Object reference
    Reference,
    /// No value (return type only)
    Void,
}

impl SemanticType {
    /// Text and object references accept null
    #[inline]
    pub const fn is_reference_kind(self) -> bool {
        matches!(self, SemanticType::Text | SemanticType::Reference)
    }

    /// Zero value a slot of this type holds before any assignment
    pub fn default_value(self) -> Value {
        match self {
            SemanticType::Boolean => Value::Bool(false),
            SemanticType::Int => Value::Int(0),
            SemanticType::Long => Value::Long(0),
            SemanticType::Text | SemanticType::Reference | SemanticType::Void => Value::Null,
        }
    }

    /// Type name used in signatures and diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            SemanticType::Boolean => "boolean",
            SemanticType::Int => "int",
            SemanticType::Long => "long",
            SemanticType::Text => "text",
            SemanticType::Reference => "reference",
            SemanticType::Void => "void",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime value
#[derive(Clone, Default)]
pub enum Value {
    /// Absent reference
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// Immutable shared text
    Text(Arc<str>),
    /// Handle to a heap object
    Object(ObjectRef),
}

impl Value {
    /// Create a text value
    pub fn text(s: impl Into<Arc<str>>) -> Self {
        Value::Text(s.into())
    }

    /// Semantic type of this value (`None` for null, which has no type of its own)
    pub fn semantic_type(&self) -> Option<SemanticType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(SemanticType::Boolean),
            Value::Int(_) => Some(SemanticType::Int),
            Value::Long(_) => Some(SemanticType::Long),
            Value::Text(_) => Some(SemanticType::Text),
            Value::Object(_) => Some(SemanticType::Reference),
        }
    }

    /// Check whether this value can be stored in a slot of type `ty`
    ///
    /// Exact type match, or null into a reference kind. No widening.
    pub fn conforms_to(&self, ty: SemanticType) -> bool {
        match self.semantic_type() {
            Some(own) => own == ty,
            None => ty.is_reference_kind(),
        }
    }

    /// Check if this value is null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract i32 value
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract i64 value
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Extract text value
    pub fn as_text(&self) -> Option<&Arc<str>> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Extract object handle
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self.semantic_type() {
            Some(ty) => ty.name(),
            None => "null",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "bool({})", b),
            Value::Int(i) => write!(f, "int({})", i),
            Value::Long(l) => write!(f, "long({})", l),
            Value::Text(t) => write!(f, "text({:?})", t),
            Value::Object(o) => write!(f, "{:?}", o),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Text(t) => f.write_str(t),
            Value::Object(o) => write!(f, "{}@{:x}", o.class_name(), o.id()),
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}
