//! Construction engine
//!
//! `construct` initializes the class, allocates a zeroed instance, selects
//! exactly one constructor by parameter types and runs its body with the new
//! instance in local slot 0. Parent constructors run only where a body says
//! so (`SuperInit`); the upstream compiler emits that call.

use std::sync::Arc;

use tracing::trace;

use crate::class::ClassDescriptor;
use crate::dispatch;
use crate::interpreter::Interpreter;
use crate::object::ObjectRef;
use crate::value::Value;
use crate::RuntimeResult;

impl Interpreter<'_> {
    /// Create a fully constructed instance of `class`
    ///
    /// The instance is returned only after its constructor body completed;
    /// on failure the partially built instance is dropped.
    pub fn construct(&mut self, class: &Arc<ClassDescriptor>, args: Vec<Value>) -> RuntimeResult<ObjectRef> {
        self.ensure_initialized(class)?;
        let body = dispatch::resolve_constructor(class, &args)?.body.clone();

        let object = self.runtime().heap().allocate(class.clone());
        trace!(class = class.name(), id = object.id(), "allocated instance");
        self.nested(|interp| interp.run_instance_body(class, &body, object.clone(), args))?;
        Ok(object)
    }

    /// Run the constructor of `class` selected by `args` against `this`
    pub(crate) fn run_constructor(
        &mut self,
        class: &Arc<ClassDescriptor>,
        this: ObjectRef,
        args: Vec<Value>,
    ) -> RuntimeResult<()> {
        let body = dispatch::resolve_constructor(class, &args)?.body.clone();
        self.nested(|interp| interp.run_instance_body(class, &body, this, args))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::OutputStreams;
    use crate::options::RuntimeOptions;
    use crate::runtime::Runtime;
    use crate::source::{Body, ClassSource, Expr, Stmt};
    use crate::value::SemanticType::{Int, Long};
    use crate::RuntimeError;

    fn runtime() -> Runtime {
        let (streams, _) = OutputStreams::captured();
        Runtime::with_streams(RuntimeOptions::default(), streams).unwrap()
    }

    #[test]
    fn test_unassigned_fields_keep_defaults() {
        let mut rt = runtime();
        let class = ClassSource::new("Pair")
            .field("a", Int)
            .field("b", Long)
            .constructor(vec![Int], Body::new(vec![Stmt::put_this("Pair", "a", Expr::local(1))]));
        let unit = rt.load_classes("test", vec![class]).unwrap();

        let pair = rt.construct(unit, "Pair", vec![Value::Int(9)]).unwrap();
        assert_eq!(pair.field_by_name("a"), Some(Value::Int(9)));
        assert_eq!(pair.field_by_name("b"), Some(Value::Long(0)));
    }

    #[test]
    fn test_constructor_selected_by_exact_types() {
        let mut rt = runtime();
        let class = ClassSource::new("P")
            .field("kind", Int)
            .constructor(vec![Int], Body::new(vec![Stmt::put_this("P", "kind", Expr::int(1))]))
            .constructor(vec![Long], Body::new(vec![Stmt::put_this("P", "kind", Expr::int(2))]));
        let unit = rt.load_classes("test", vec![class]).unwrap();

        let by_long = rt.construct(unit, "P", vec![Value::Long(1)]).unwrap();
        assert_eq!(by_long.field_by_name("kind"), Some(Value::Int(2)));
        assert!(matches!(
            rt.construct(unit, "P", vec![]),
            Err(RuntimeError::NoMatchingConstructor { matches: 0, .. })
        ));
    }

    #[test]
    fn test_super_init_runs_parent_body() {
        let mut rt = runtime();
        let base = ClassSource::new("Base")
            .field("x", Int)
            .constructor(vec![Int], Body::new(vec![Stmt::put_this("Base", "x", Expr::local(1))]));
        let derived = ClassSource::new("Derived").extends("Base").field("y", Int).constructor(
            vec![],
            Body::new(vec![
                Stmt::SuperInit { args: vec![Expr::int(5)] },
                Stmt::put_this("Derived", "y", Expr::add(Expr::this_field("Base", "x"), Expr::int(1))),
            ]),
        );
        let unit = rt.load_classes("test", vec![derived, base]).unwrap();

        let obj = rt.construct(unit, "Derived", vec![]).unwrap();
        assert_eq!(obj.get_field(0), Some(Value::Int(5)));
        assert_eq!(obj.get_field(1), Some(Value::Int(6)));
    }

    #[test]
    fn test_failed_constructor_propagates() {
        let mut rt = runtime();
        let class = ClassSource::new("Bad").constructor(
            vec![],
            Body::new(vec![Stmt::Expr(Expr::binary(
                crate::source::BinaryOp::Div,
                Expr::int(1),
                Expr::int(0),
            ))]),
        );
        let unit = rt.load_classes("test", vec![class]).unwrap();
        assert!(matches!(rt.construct(unit, "Bad", vec![]), Err(RuntimeError::DivisionByZero)));
    }
}
