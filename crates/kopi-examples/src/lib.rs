//! Kopi sample programs
//!
//! Each sample is a resolved compilation unit plus the exact standard-output
//! lines running its entry class must produce. `invoke_virtual` and
//! `new_and_invoke_virtual` are the same program over differently named
//! classes; `constructor` and `new_and_invoke_virtual` both declare classes
//! named `A` and `B`, which only coexist because every unit has its own scope.

use kopi_core::SemanticType::{Int, Void};
use kopi_core::{BinaryOp, Body, ClassSource, CompilationUnit, Expr, MethodDecl, Stmt};

/// A bundled program and its expected output
#[derive(Debug, Clone)]
pub struct Sample {
    /// Short name used by the CLI
    pub name: &'static str,
    /// What the program exercises
    pub summary: &'static str,
    /// Resolved classes
    pub unit: CompilationUnit,
    /// Standard output, line by line
    pub expected_stdout: Vec<String>,
}

fn lines(values: &[i64]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn static_main(code: Vec<Stmt>) -> MethodDecl {
    MethodDecl::static_fn("main", vec![], Void, Body::with_locals(3, code))
}

/// `static int x(int x) { println(x); return ret; }`
fn echo_and_return(ret: i32) -> MethodDecl {
    MethodDecl::static_fn(
        "x",
        vec![Int],
        Int,
        Body::new(vec![Stmt::println(Expr::local(0)), Stmt::ret(Expr::int(ret))]),
    )
}

/// Constructor that ignores its `arity` int arguments and prints `tag`
fn printing_class(name: &str, arity: usize, tag: i32, ret: i32) -> ClassSource {
    ClassSource::new(name)
        .constructor(vec![Int; arity], Body::new(vec![Stmt::println(Expr::int(tag))]))
        .method(echo_and_return(ret))
}

/// Static calls returning values, constructors selected by arity
pub fn constructor() -> Sample {
    let print = MethodDecl::static_fn("print", vec![Int], Void, Body::new(vec![Stmt::println(Expr::local(0))]));
    let main = static_main(vec![
        Stmt::println(Expr::invoke_static("A", "x", vec![Expr::int(5)])),
        Stmt::println(Expr::invoke_static("B", "x", vec![Expr::int(88)])),
        Stmt::Store {
            local: 0,
            value: Expr::new_object("A", vec![Expr::int(12), Expr::int(1)]),
        },
        Stmt::println(Expr::invoke_static("C", "x", vec![Expr::int(1205)])),
        Stmt::Store {
            local: 1,
            value: Expr::new_object("C", vec![Expr::int(555), Expr::int(111), Expr::int(222)]),
        },
        Stmt::Store {
            local: 2,
            value: Expr::new_object("B", vec![Expr::int(8)]),
        },
        Stmt::Store {
            local: 2,
            value: Expr::new_object("B", vec![Expr::int(9)]),
        },
        Stmt::Expr(Expr::invoke_static("Constructor", "print", vec![Expr::int(9999)])),
    ]);

    let unit = CompilationUnit::new("Constructor")
        .with_entry("Constructor")
        .with_class(printing_class("A", 2, 1, 3))
        .with_class(printing_class("B", 1, 3, 5))
        .with_class(printing_class("C", 3, 5, 1000))
        .with_class(ClassSource::new("Constructor").method(print).method(main));

    Sample {
        name: "constructor",
        summary: "static calls with return values and constructor selection by arity",
        unit,
        expected_stdout: lines(&[5, 3, 88, 5, 1, 1205, 1000, 5, 3, 3, 9999]),
    }
}

/// `x = val + val2 * val3; print(v) -> println(x + v)`
fn adder(name: &str) -> ClassSource {
    ClassSource::new(name)
        .field("x", Int)
        .constructor(
            vec![Int; 3],
            Body::new(vec![Stmt::put_this(
                name,
                "x",
                Expr::add(Expr::local(1), Expr::mul(Expr::local(2), Expr::local(3))),
            )]),
        )
        .method(MethodDecl::instance(
            "print",
            vec![Int],
            Void,
            Body::new(vec![Stmt::println(Expr::add(Expr::this_field(name, "x"), Expr::local(1)))]),
        ))
}

/// `x = val; print(v) -> println(x - v)`
fn subtractor(name: &str) -> ClassSource {
    ClassSource::new(name)
        .field("x", Int)
        .constructor(vec![Int], Body::new(vec![Stmt::put_this(name, "x", Expr::local(1))]))
        .method(MethodDecl::instance(
            "print",
            vec![Int],
            Void,
            Body::new(vec![Stmt::println(Expr::sub(Expr::this_field(name, "x"), Expr::local(1)))]),
        ))
}

/// Driver with five int fields, assigned and printed in reverse
fn virtual_driver(name: &str, adder: &str, subtractor: &str) -> ClassSource {
    let fields = ["a", "b", "c", "d", "e"];
    let print_on = |local: u16, arg: i32| Stmt::Expr(Expr::invoke_virtual(Expr::local(local), "print", vec![Expr::int(arg)]));

    let mut code = vec![
        Stmt::Store {
            local: 0,
            value: Expr::new_object(name, vec![]),
        },
        Stmt::Store {
            local: 1,
            value: Expr::new_object(adder, vec![Expr::int(5555), Expr::int(88), Expr::int(12)]),
        },
        Stmt::Store {
            local: 2,
            value: Expr::new_object(subtractor, vec![Expr::int(3)]),
        },
    ];
    for (value, field) in (3..).zip(fields) {
        code.push(Stmt::PutField {
            object: Expr::local(0),
            owner: name.to_string(),
            field: field.to_string(),
            value: Expr::int(value),
        });
    }
    code.push(print_on(1, 11));
    code.push(print_on(2, 22));
    for field in fields.iter().rev() {
        code.push(Stmt::println(Expr::get_field(Expr::local(0), name, *field)));
    }
    code.push(print_on(1, 4555));
    code.push(print_on(2, 888));

    let mut class = ClassSource::new(name);
    for field in fields {
        class = class.field(field, Int);
    }
    class
        .method(MethodDecl::instance(
            "print",
            vec![Int],
            Void,
            Body::new(vec![Stmt::println(Expr::int(123123))]),
        ))
        .method(static_main(code))
}

fn virtual_expected() -> Vec<String> {
    lines(&[6622, -19, 7, 6, 5, 4, 3, 11166, -885])
}

/// Late binding across two unrelated classes with the same `print(int)` key
pub fn invoke_virtual() -> Sample {
    let unit = CompilationUnit::new("InvokeVirtual")
        .with_entry("InvokeVirtual")
        .with_class(virtual_driver("InvokeVirtual", "A2", "B2"))
        .with_class(adder("A2"))
        .with_class(subtractor("B2"));

    Sample {
        name: "invoke-virtual",
        summary: "virtual dispatch on the runtime class, field writes through references",
        unit,
        expected_stdout: virtual_expected(),
    }
}

/// Same program as `invoke_virtual`, reusing the class names `A` and `B`
pub fn new_and_invoke_virtual() -> Sample {
    let unit = CompilationUnit::new("NewAndInvokeVirtual")
        .with_entry("NewAndInvokeVirtual")
        .with_class(virtual_driver("NewAndInvokeVirtual", "A", "B"))
        .with_class(adder("A"))
        .with_class(subtractor("B"));

    Sample {
        name: "new-and-invoke-virtual",
        summary: "allocation plus virtual dispatch; class names shared with another unit",
        unit,
        expected_stdout: virtual_expected(),
    }
}

/// Parse longs, read `Long` statics and time a loop
pub fn long_parse() -> Sample {
    let parse = |text: &str| Expr::invoke_static("Long", "parseLong", vec![Expr::text(text)]);
    let long_value = |local: u16| Expr::invoke_virtual(Expr::local(local), "longValue", vec![]);
    let code = vec![
        Stmt::println(parse("123")),
        Stmt::println(parse("-5")),
        Stmt::println(parse("-9223372036854775808")),
        Stmt::println(Expr::get_static("Long", "MAX_VALUE")),
        Stmt::println(Expr::get_static("Long", "SIZE")),
        Stmt::Store {
            local: 0,
            value: Expr::invoke_static("Long", "valueOf", vec![Expr::text("77")]),
        },
        Stmt::println(Expr::add(long_value(0), Expr::long(1))),
        Stmt::Store {
            local: 1,
            value: Expr::invoke_static("System", "currentTimeMillis", vec![]),
        },
        Stmt::Store {
            local: 2,
            value: Expr::int(0),
        },
        Stmt::While {
            cond: Expr::binary(BinaryOp::Lt, Expr::local(2), Expr::int(1000)),
            body: vec![Stmt::Store {
                local: 2,
                value: Expr::add(Expr::local(2), Expr::int(1)),
            }],
        },
        Stmt::Expr(Expr::invoke_static("System", "gc", vec![])),
        Stmt::println(Expr::binary(
            BinaryOp::Ge,
            Expr::invoke_static("System", "currentTimeMillis", vec![]),
            Expr::local(1),
        )),
    ];

    let unit = CompilationUnit::new("LongParse")
        .with_entry("LongParse")
        .with_class(ClassSource::new("LongParse").method(static_main(code)));

    Sample {
        name: "long-parse",
        summary: "the parse, clock and gc natives of the system library",
        unit,
        expected_stdout: vec![
            "123".to_string(),
            "-5".to_string(),
            "-9223372036854775808".to_string(),
            "9223372036854775807".to_string(),
            "64".to_string(),
            "78".to_string(),
            "true".to_string(),
        ],
    }
}

/// Every bundled sample
pub fn all() -> Vec<Sample> {
    vec![constructor(), invoke_virtual(), new_and_invoke_virtual(), long_parse()]
}

/// Find a sample by name
pub fn find(name: &str) -> Option<Sample> {
    all().into_iter().find(|s| s.name == name)
}
