//! Integration tests for the object runtime
//!
//! Tests cover:
//! - Static initialization (exactly once, lazy, sticky failure, re-entry)
//! - Field defaults after construction
//! - Virtual dispatch on the runtime class
//! - Overload resolution and null receivers
//! - Long parsing through managed code

use std::sync::Arc;
use std::thread;

use kopi_core::{
    BinaryOp, Body, CapturedOutput, ClassSource, Expr, MethodDecl, OutputStreams, Runtime, RuntimeError,
    RuntimeOptions, SemanticType, Stmt, UnitId, Value,
};
use SemanticType::{Int, Long, Reference, Text, Void};

fn runtime() -> (Runtime, CapturedOutput) {
    let (streams, captured) = OutputStreams::captured();
    (Runtime::with_streams(RuntimeOptions::default(), streams).unwrap(), captured)
}

fn static_void(name: &str, code: Vec<Stmt>) -> MethodDecl {
    MethodDecl::static_fn(name, vec![], Void, Body::new(code))
}

/// Class with a counter static whose initializer prints once
fn counted_class() -> ClassSource {
    ClassSource::new("Counted")
        .static_field("count", Int, Some(Expr::int(10)))
        .static_block(Body::new(vec![Stmt::println(Expr::text("init Counted"))]))
        .method(MethodDecl::static_fn(
            "next",
            vec![],
            Int,
            Body::new(vec![
                Stmt::PutStatic {
                    class: "Counted".into(),
                    field: "count".into(),
                    value: Expr::add(Expr::get_static("Counted", "count"), Expr::int(1)),
                },
                Stmt::ret(Expr::get_static("Counted", "count")),
            ]),
        ))
}

#[test]
fn test_static_init_runs_exactly_once() {
    let (mut rt, captured) = runtime();
    let unit = rt.load_classes("once", vec![counted_class()]).unwrap();

    assert!(!rt.lookup(unit, "Counted").unwrap().is_initialized());
    assert_eq!(rt.invoke_static(unit, "Counted", "next", vec![]).unwrap(), Value::Int(11));
    assert_eq!(rt.invoke_static(unit, "Counted", "next", vec![]).unwrap(), Value::Int(12));
    assert_eq!(rt.get_static(unit, "Counted", "count").unwrap(), Value::Int(12));
    rt.construct(unit, "Counted", vec![]).unwrap();

    assert_eq!(captured.stdout_lines(), ["init Counted"]);
    assert!(rt.lookup(unit, "Counted").unwrap().is_initialized());
}

#[test]
fn test_static_init_is_lazy_and_parent_first() {
    let (mut rt, captured) = runtime();
    let parent = ClassSource::new("Parent")
        .static_field("tag", Int, Some(Expr::int(1)))
        .static_block(Body::new(vec![Stmt::println(Expr::text("Parent"))]));
    let child = ClassSource::new("Child")
        .extends("Parent")
        .static_field("tag2", Int, Some(Expr::int(2)))
        .static_block(Body::new(vec![Stmt::println(Expr::text("Child"))]));
    let unit = rt.load_classes("lazy", vec![child, parent]).unwrap();
    assert!(captured.lines().is_empty());

    rt.get_static(unit, "Child", "tag2").unwrap();
    assert_eq!(captured.stdout_lines(), ["Parent", "Child"]);

    // Inherited static resolves to the declaring class
    assert_eq!(rt.get_static(unit, "Child", "tag").unwrap(), Value::Int(1));
    assert_eq!(captured.stdout_lines().len(), 2);
}

#[test]
fn test_static_init_failure_is_sticky() {
    let (mut rt, captured) = runtime();
    let broken = ClassSource::new("Broken")
        .static_field("x", Int, Some(Expr::binary(BinaryOp::Div, Expr::int(1), Expr::int(0))))
        .static_block(Body::new(vec![Stmt::println(Expr::text("never"))]))
        .method(static_void("touch", vec![]));
    let unit = rt.load_classes("broken", vec![broken]).unwrap();

    for _ in 0..3 {
        match rt.invoke_static(unit, "Broken", "touch", vec![]) {
            Err(RuntimeError::StaticInitFailed { class, cause }) => {
                assert_eq!(class, "Broken");
                assert!(matches!(*cause, RuntimeError::DivisionByZero));
            }
            other => panic!("expected StaticInitFailed, got {:?}", other),
        }
    }
    assert!(matches!(
        rt.construct(unit, "Broken", vec![]),
        Err(RuntimeError::StaticInitFailed { .. })
    ));
    assert!(captured.lines().is_empty());
}

#[test]
fn test_reentrant_init_sees_partial_state() {
    let (mut rt, captured) = runtime();
    // `b` is read while the class is still initializing: it holds its default
    let class = ClassSource::new("Reentrant")
        .static_field("a", Int, Some(Expr::invoke_static("Reentrant", "peek", vec![])))
        .static_field("b", Int, Some(Expr::int(7)))
        .method(MethodDecl::static_fn(
            "peek",
            vec![],
            Int,
            Body::new(vec![Stmt::ret(Expr::get_static("Reentrant", "b"))]),
        ));
    let unit = rt.load_classes("reentrant", vec![class]).unwrap();

    assert_eq!(rt.get_static(unit, "Reentrant", "a").unwrap(), Value::Int(0));
    assert_eq!(rt.get_static(unit, "Reentrant", "b").unwrap(), Value::Int(7));
    assert!(captured.lines().is_empty());
}

#[test]
fn test_concurrent_first_access_initializes_once() {
    let (mut rt, captured) = runtime();
    let unit = rt.load_classes("threads", vec![counted_class()]).unwrap();
    let rt = Arc::new(rt);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let rt = rt.clone();
            thread::spawn(move || rt.get_static(unit, "Counted", "count").unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Value::Int(10));
    }
    assert_eq!(captured.stdout_lines(), ["init Counted"]);
}

#[test]
fn test_unassigned_fields_keep_defaults() {
    let (mut rt, _) = runtime();
    let class = ClassSource::new("Holder")
        .field("i", Int)
        .field("l", Long)
        .field("flag", SemanticType::Boolean)
        .field("name", Text)
        .field("next", Reference)
        .constructor(vec![Long], Body::new(vec![Stmt::put_this("Holder", "l", Expr::local(1))]));
    let unit = rt.load_classes("defaults", vec![class]).unwrap();

    let obj = rt.construct(unit, "Holder", vec![Value::Long(5)]).unwrap();
    assert_eq!(obj.field_by_name("i"), Some(Value::Int(0)));
    assert_eq!(obj.field_by_name("l"), Some(Value::Long(5)));
    assert_eq!(obj.field_by_name("flag"), Some(Value::Bool(false)));
    assert_eq!(obj.field_by_name("name"), Some(Value::Null));
    assert_eq!(obj.field_by_name("next"), Some(Value::Null));
}

fn printer(name: &str, parent: Option<&str>, op: BinaryOp) -> ClassSource {
    let mut class = ClassSource::new(name)
        .field("x", Int)
        .constructor(vec![Int], Body::new(vec![Stmt::put_this(name, "x", Expr::local(1))]))
        .method(MethodDecl::instance(
            "print",
            vec![Int],
            Void,
            Body::new(vec![Stmt::println(Expr::binary(op, Expr::this_field(name, "x"), Expr::local(1)))]),
        ));
    if let Some(parent) = parent {
        class = class.extends(parent);
    }
    class
}

#[test]
fn test_virtual_dispatch_uses_runtime_class() {
    let (mut rt, captured) = runtime();
    let unit = rt
        .load_classes(
            "dispatch",
            vec![printer("A", None, BinaryOp::Add), printer("B", Some("A"), BinaryOp::Sub)],
        )
        .unwrap();

    let a = Value::Object(rt.construct(unit, "A", vec![Value::Int(100)]).unwrap());
    let b = Value::Object(rt.construct(unit, "B", vec![Value::Int(100)]).unwrap());
    for receiver in [&b, &a, &b, &a] {
        rt.invoke_virtual(receiver, "print", vec![Value::Int(1)]).unwrap();
    }
    assert_eq!(captured.stdout_lines(), ["99", "101", "99", "101"]);
}

#[test]
fn test_super_call_reaches_parent_body() {
    let (mut rt, captured) = runtime();
    let child = printer("Child", Some("Base"), BinaryOp::Sub).method(MethodDecl::instance(
        "both",
        vec![Int],
        Void,
        Body::new(vec![
            Stmt::Expr(Expr::invoke_super("print", vec![Expr::local(1)])),
            Stmt::Expr(Expr::invoke_virtual(Expr::This, "print", vec![Expr::local(1)])),
        ]),
    ));
    let unit = rt
        .load_classes("super", vec![printer("Base", None, BinaryOp::Add), child])
        .unwrap();

    let obj = Value::Object(rt.construct(unit, "Child", vec![Value::Int(10)]).unwrap());
    rt.invoke_virtual(&obj, "both", vec![Value::Int(3)]).unwrap();
    // Base.print reads Base's `x` slot, which Child's constructor never set
    assert_eq!(captured.stdout_lines(), ["3", "7"]);
}

#[test]
fn test_null_receiver_and_field_access() {
    let (mut rt, _) = runtime();
    let class = ClassSource::new("Npe")
        .field("x", Int)
        .method(static_void("call", vec![Stmt::Expr(Expr::invoke_virtual(Expr::null(), "print", vec![Expr::int(1)]))]))
        .method(static_void("read", vec![Stmt::Expr(Expr::get_field(Expr::null(), "Npe", "x"))]));
    let unit = rt.load_classes("npe", vec![class]).unwrap();

    match rt.invoke_static(unit, "Npe", "call", vec![]) {
        Err(RuntimeError::NullReceiver { signature }) => assert_eq!(signature, "print(int)"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        rt.invoke_static(unit, "Npe", "read", vec![]),
        Err(RuntimeError::DispatchOnNull { .. })
    ));
    assert!(matches!(
        rt.invoke_virtual(&Value::Null, "anything", vec![]),
        Err(RuntimeError::NullReceiver { .. })
    ));
}

#[test]
fn test_overload_resolution_is_deterministic() {
    let (mut rt, captured) = runtime();
    let class = ClassSource::new("Over")
        .method(static_void("show", vec![]))
        .method(MethodDecl::static_fn(
            "show",
            vec![Int],
            Void,
            Body::new(vec![Stmt::println(Expr::text("int"))]),
        ))
        .method(MethodDecl::static_fn(
            "show",
            vec![Long],
            Void,
            Body::new(vec![Stmt::println(Expr::text("long"))]),
        ))
        .method(MethodDecl::static_fn(
            "show",
            vec![Text],
            Void,
            Body::new(vec![Stmt::println(Expr::text("text"))]),
        ))
        .method(MethodDecl::static_fn(
            "show",
            vec![Reference],
            Void,
            Body::new(vec![Stmt::println(Expr::text("reference"))]),
        ));
    let unit = rt.load_classes("over", vec![class]).unwrap();

    for _ in 0..3 {
        rt.invoke_static(unit, "Over", "show", vec![Value::Long(1)]).unwrap();
        rt.invoke_static(unit, "Over", "show", vec![Value::Int(1)]).unwrap();
        rt.invoke_static(unit, "Over", "show", vec![Value::text("s")]).unwrap();
    }
    assert_eq!(
        captured.stdout_lines(),
        ["long", "int", "text"].repeat(3)
    );

    assert!(matches!(
        rt.invoke_static(unit, "Over", "show", vec![Value::Null]),
        Err(RuntimeError::AmbiguousOverload { .. })
    ));
    assert!(matches!(
        rt.invoke_static(unit, "Over", "show", vec![Value::Bool(true)]),
        Err(RuntimeError::NoSuchMethod { .. })
    ));
}

#[test]
fn test_parse_long_cases() {
    let (rt, _) = runtime();
    let parse = |text: &str| rt.invoke_static(UnitId::SYSTEM, "Long", "parseLong", vec![Value::text(text)]);

    assert_eq!(parse("123").unwrap(), Value::Long(123));
    assert_eq!(parse("-5").unwrap(), Value::Long(-5));
    assert_eq!(parse("-9223372036854775808").unwrap(), Value::Long(i64::MIN));
    assert_eq!(
        parse("-9223372036854775808").unwrap(),
        rt.get_static(UnitId::SYSTEM, "Long", "MIN_VALUE").unwrap()
    );
    match parse("abc") {
        Err(RuntimeError::NumberFormat(err)) => assert!(!err.is_overflow()),
        other => panic!("unexpected {:?}", other),
    }
    match parse("9223372036854775808") {
        Err(RuntimeError::NumberFormat(err)) => assert!(err.is_overflow()),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_output_interleaves_in_program_order() {
    let (mut rt, captured) = runtime();
    let main = ClassSource::new("Mix").method(static_void(
        "main",
        vec![
            Stmt::println(Expr::int(1)),
            Stmt::eprintln(Expr::int(2)),
            Stmt::println(Expr::long(-3)),
            Stmt::eprintln(Expr::bool(true)),
        ],
    ));
    let unit = rt.load_classes("mix", vec![main]).unwrap();
    rt.run_main(unit, "Mix").unwrap();

    let lines: Vec<String> = captured.lines().into_iter().map(|(_, line)| line).collect();
    assert_eq!(lines, ["1", "2", "-3", "true"]);
}

#[test]
fn test_gc_and_clock_natives() {
    let (mut rt, captured) = runtime();
    let main = ClassSource::new("Natives").method(static_void(
        "main",
        vec![
            Stmt::Store {
                local: 0,
                value: Expr::invoke_static("System", "currentTimeMillis", vec![]),
            },
            Stmt::Expr(Expr::new_object("Long", vec![])),
            Stmt::Expr(Expr::invoke_static("System", "gc", vec![])),
            Stmt::println(Expr::binary(
                BinaryOp::Ge,
                Expr::invoke_static("System", "currentTimeMillis", vec![]),
                Expr::local(0),
            )),
        ],
    ));
    let unit = rt.load_classes("natives", vec![main]).unwrap();
    rt.run_main(unit, "Natives").unwrap();

    assert_eq!(captured.stdout_lines(), ["true"]);
    assert_eq!(rt.heap_stats().collections, 1);
}

#[test]
fn test_virtual_dispatch_without_matching_key() {
    let (mut rt, _) = runtime();
    let class = printer("Shape", None, BinaryOp::Add).method(MethodDecl::static_fn(
        "make",
        vec![],
        Reference,
        Body::new(vec![Stmt::ret(Expr::new_object("Shape", vec![Expr::int(1)]))]),
    ));
    let unit = rt.load_classes("missing", vec![class]).unwrap();
    let shape = Value::Object(rt.construct(unit, "Shape", vec![Value::Int(1)]).unwrap());

    match rt.invoke_virtual(&shape, "area", vec![]) {
        Err(RuntimeError::NoSuchMethod { class, signature }) => {
            assert_eq!(class, "Shape");
            assert_eq!(signature, "area()");
        }
        other => panic!("unexpected {:?}", other),
    }
    // Name exists, parameter types do not
    assert!(matches!(
        rt.invoke_virtual(&shape, "print", vec![Value::Long(1)]),
        Err(RuntimeError::NoSuchMethod { .. })
    ));
    // Static methods are not part of virtual dispatch
    assert!(matches!(
        rt.invoke_virtual(&shape, "make", vec![]),
        Err(RuntimeError::NoSuchMethod { .. })
    ));
}

#[test]
fn test_failed_unit_load_changes_nothing() {
    let (mut rt, _) = runtime();
    let before = rt.registry().len();

    let cyclic = vec![
        ClassSource::new("Root"),
        ClassSource::new("Leaf").extends("Root"),
        ClassSource::new("X").extends("Y"),
        ClassSource::new("Y").extends("X"),
    ];
    assert!(matches!(
        rt.load_classes("cyclic", cyclic),
        Err(RuntimeError::InheritanceCycle { .. })
    ));
    assert_eq!(rt.registry().len(), before);

    let duplicated = vec![
        ClassSource::new("Root"),
        ClassSource::new("Twice").field("a", Int),
        ClassSource::new("Twice").field("b", Long),
    ];
    assert!(matches!(
        rt.load_classes("duplicated", duplicated),
        Err(RuntimeError::ClassRedefinition { .. })
    ));
    assert_eq!(rt.registry().len(), before);

    let unit = rt
        .load_classes("fixed", vec![ClassSource::new("Root"), ClassSource::new("Leaf").extends("Root")])
        .unwrap();
    assert_eq!(rt.registry().len(), before + 2);
    assert!(rt.construct(unit, "Leaf", vec![]).is_ok());
}

#[test]
fn test_recursion_at_default_depth_limit() {
    let (mut rt, _) = runtime();
    let limit = RuntimeOptions::default().max_call_depth as i32;
    let down = MethodDecl::static_fn(
        "down",
        vec![Int],
        Void,
        Body::new(vec![Stmt::If {
            cond: Expr::binary(BinaryOp::Gt, Expr::local(0), Expr::int(0)),
            then: vec![Stmt::Expr(Expr::invoke_static(
                "Deep",
                "down",
                vec![Expr::sub(Expr::local(0), Expr::int(1))],
            ))],
            otherwise: vec![],
        }]),
    );
    let fits = ClassSource::new("Deep")
        .method(down)
        .method(static_void("main", vec![Stmt::Expr(Expr::invoke_static("Deep", "down", vec![Expr::int(limit - 2)]))]))
        .method(static_void("over", vec![Stmt::Expr(Expr::invoke_static("Deep", "down", vec![Expr::int(limit - 1)]))]));
    let unit = rt.load_classes("deep", vec![fits]).unwrap();

    // main plus down(limit - 2) is exactly `limit` nested calls
    rt.run_main(unit, "Deep").unwrap();
    assert!(matches!(
        rt.invoke_static(unit, "Deep", "over", vec![]),
        Err(RuntimeError::StackOverflow { .. })
    ));
}

#[test]
fn test_allocation_tracking_bounded_without_gc_hint() {
    let (streams, _) = OutputStreams::captured();
    let options = RuntimeOptions {
        collect_on_gc_hint: false,
        ..RuntimeOptions::default()
    };
    let mut rt = Runtime::with_streams(options, streams).unwrap();
    let main = ClassSource::new("Churn").method(MethodDecl::static_fn(
        "main",
        vec![],
        Void,
        Body::with_locals(
            1,
            vec![
                Stmt::Store {
                    local: 0,
                    value: Expr::int(0),
                },
                Stmt::While {
                    cond: Expr::binary(BinaryOp::Lt, Expr::local(0), Expr::int(100_000)),
                    body: vec![
                        Stmt::Expr(Expr::new_object("Long", vec![])),
                        Stmt::Store {
                            local: 0,
                            value: Expr::add(Expr::local(0), Expr::int(1)),
                        },
                    ],
                },
            ],
        ),
    ));
    let unit = rt.load_classes("churn", vec![main]).unwrap();
    rt.run_main(unit, "Churn").unwrap();

    let stats = rt.heap_stats();
    assert!(stats.allocated >= 100_000);
    assert_eq!(stats.collections, 0);
    assert!(stats.tracked <= 1024, "{:?}", stats);
}
