//! Dispatch resolver
//!
//! Two modes:
//! - static/overload resolution against a known owner class (static methods,
//!   constructors, super calls), selecting by exact parameter-type match;
//! - virtual dispatch on the receiver's runtime class table.
//!
//! A call whose arguments are all non-null hits the table index directly. A
//! null argument conforms to every reference-kind parameter, so those calls
//! scan the candidates and may be ambiguous.

use std::sync::Arc;

use tracing::trace;

use crate::class::{describe_call, CallSignature, ClassDescriptor, ConstructorEntry, MethodEntry};
use crate::object::ObjectRef;
use crate::value::Value;
use crate::{RuntimeError, RuntimeResult};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Want {
    Static,
    Instance,
}

fn select(class: &ClassDescriptor, name: &str, args: &[Value], want: Want) -> RuntimeResult<Arc<MethodEntry>> {
    let wanted = |entry: &MethodEntry| entry.is_static == (want == Want::Static);

    if let Some(key) = CallSignature::of_args(name, args) {
        return match class.methods().get(&key) {
            Some(entry) if wanted(entry) => Ok(entry.clone()),
            _ => Err(RuntimeError::NoSuchMethod {
                class: class.name().to_string(),
                signature: key.to_string(),
            }),
        };
    }

    let matches: Vec<&Arc<MethodEntry>> = class
        .methods()
        .candidates(name, args)
        .filter(|e| wanted(e))
        .collect();
    match matches.as_slice() {
        [] => Err(RuntimeError::NoSuchMethod {
            class: class.name().to_string(),
            signature: describe_call(name, args),
        }),
        [entry] => Ok((*entry).clone()),
        many => Err(RuntimeError::AmbiguousOverload {
            class: class.name().to_string(),
            signature: describe_call(name, args),
            candidates: many.iter().map(|e| e.qualified_name()).collect(),
        }),
    }
}

/// Resolve a static method call on a compile-time-known owner
pub fn resolve_static(class: &ClassDescriptor, name: &str, args: &[Value]) -> RuntimeResult<Arc<MethodEntry>> {
    let entry = select(class, name, args, Want::Static)?;
    trace!(class = class.name(), target = %entry.qualified_name(), "static dispatch");
    Ok(entry)
}

/// Resolve an instance method on the receiver's runtime class
pub fn resolve_virtual(receiver: &Value, name: &str, args: &[Value]) -> RuntimeResult<(ObjectRef, Arc<MethodEntry>)> {
    let object = match receiver {
        Value::Object(object) => object,
        Value::Null => {
            return Err(RuntimeError::NullReceiver {
                signature: describe_call(name, args),
            })
        }
        other => return Err(RuntimeError::type_mismatch("reference", other.type_name())),
    };
    let entry = select(object.class(), name, args, Want::Instance)?;
    trace!(
        runtime_class = object.class_name(),
        target = %entry.qualified_name(),
        "virtual dispatch"
    );
    Ok((object.clone(), entry))
}

/// Resolve an instance method in a fixed class's table (super calls)
pub fn resolve_special(class: &ClassDescriptor, name: &str, args: &[Value]) -> RuntimeResult<Arc<MethodEntry>> {
    let entry = select(class, name, args, Want::Instance)?;
    trace!(class = class.name(), target = %entry.qualified_name(), "special dispatch");
    Ok(entry)
}

/// Resolve the single constructor accepting `args`
pub fn resolve_constructor<'c>(class: &'c ClassDescriptor, args: &[Value]) -> RuntimeResult<&'c ConstructorEntry> {
    let mut matches = class.constructors().iter().filter(|c| c.accepts(args));
    match (matches.next(), matches.next()) {
        (Some(ctor), None) => Ok(ctor),
        (first, second) => {
            let count = first.iter().chain(second.iter()).count() + matches.count();
            Err(RuntimeError::NoMatchingConstructor {
                class: class.name().to_string(),
                signature: describe_call("", args),
                matches: count,
            })
        }
    }
}
