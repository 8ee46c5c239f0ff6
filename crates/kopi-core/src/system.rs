//! Bootstrap system library
//!
//! The classes every unit can see without declaring them: `PrintStream`,
//! `System` and `Long`. They are registered in the system unit when a runtime
//! is created, after [`register_system_natives`](crate::native::register_system_natives).

use crate::native::{StreamId, PRINTABLE_TYPES};
use crate::source::{Body, ClassSource, Expr, MethodDecl, Stmt};
use crate::value::SemanticType::{Int, Long, Reference, Text, Void};

/// Output stream wrapping a numeric handle (`fd` 1 = stdout, 2 = stderr)
pub fn print_stream() -> ClassSource {
    let mut class = ClassSource::new("PrintStream")
        .field("fd", Int)
        .constructor(vec![Int], Body::new(vec![Stmt::put_this("PrintStream", "fd", Expr::local(1))]));
    for ty in PRINTABLE_TYPES {
        class = class.method(MethodDecl::native("println", vec![ty], Void, false));
    }
    class
}

/// Standard streams, the gc hint and the clock
pub fn system() -> ClassSource {
    let stream = |id: StreamId| Some(Expr::new_object("PrintStream", vec![Expr::int(id as i32)]));
    ClassSource::new("System")
        .static_field("out", Reference, stream(StreamId::Out))
        .static_field("err", Reference, stream(StreamId::Err))
        .method(MethodDecl::native("gc", vec![], Void, true))
        .method(MethodDecl::native("currentTimeMillis", vec![], Long, true))
}

/// Boxed 64-bit integer with the parse native
pub fn long() -> ClassSource {
    ClassSource::new("Long")
        .field("value", Long)
        .static_field("SIZE", Int, Some(Expr::int(64)))
        .static_field("BYTES", Int, Some(Expr::int(8)))
        .static_field("MIN_VALUE", Long, Some(Expr::long(i64::MIN)))
        .static_field("MAX_VALUE", Long, Some(Expr::long(i64::MAX)))
        .constructor(vec![], Body::new(vec![Stmt::put_this("Long", "value", Expr::long(0))]))
        .constructor(vec![Long], Body::new(vec![Stmt::put_this("Long", "value", Expr::local(1))]))
        .method(MethodDecl::native("parseLong", vec![Text], Long, true))
        .method(MethodDecl::static_fn(
            "valueOf",
            vec![Text],
            Reference,
            Body::new(vec![Stmt::ret(Expr::new_object(
                "Long",
                vec![Expr::invoke_static("Long", "parseLong", vec![Expr::local(0)])],
            ))]),
        ))
        .method(MethodDecl::instance(
            "longValue",
            vec![],
            Long,
            Body::new(vec![Stmt::ret(Expr::this_field("Long", "value"))]),
        ))
}

/// Every bootstrap class
pub fn bootstrap_classes() -> Vec<ClassSource> {
    vec![print_stream(), system(), long()]
}
