//! Class descriptor registry
//!
//! Classes are scoped per compilation unit. The bootstrap library lives in
//! the reserved system unit; a lookup from unit U searches U, then system.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::class::{CallSignature, ClassDescriptor, ConstructorEntry, FieldSlot, MethodEntry, MethodImpl, MethodTable, StaticSlot};
use crate::native::{NativeKey, NativeRegistry};
use crate::source::{Body, ClassSource, MethodBody};
use crate::static_init::StaticStorage;
use crate::{RuntimeError, RuntimeResult};

/// Compilation unit scope identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u32);

impl UnitId {
    /// Scope of the bootstrap system library
    pub const SYSTEM: UnitId = UnitId(0);
}

/// Class registry for the runtime
#[derive(Debug)]
pub struct ClassRegistry {
    /// Classes indexed by ID
    classes: Vec<Arc<ClassDescriptor>>,
    /// (unit, class name) to ID mapping
    by_name: FxHashMap<(UnitId, String), usize>,
    /// Unit names indexed by unit ID
    units: Vec<String>,
}

impl ClassRegistry {
    /// Create a registry holding only the empty system unit
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            by_name: FxHashMap::default(),
            units: vec!["system".to_string()],
        }
    }

    /// Open a new, empty unit scope
    pub fn open_unit(&mut self, name: impl Into<String>) -> UnitId {
        let id = UnitId(self.units.len() as u32);
        self.units.push(name.into());
        id
    }

    /// Name of a unit
    pub fn unit_name(&self, unit: UnitId) -> Option<&str> {
        self.units.get(unit.0 as usize).map(String::as_str)
    }

    fn unit_label(&self, unit: UnitId) -> String {
        self.unit_name(unit)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", unit.0))
    }

    /// Register one class; its parent must already be visible from `unit`
    ///
    /// Re-registering a structurally identical class is a no-op returning
    /// the existing descriptor.
    pub fn register(
        &mut self,
        unit: UnitId,
        source: ClassSource,
        natives: &NativeRegistry,
    ) -> RuntimeResult<Arc<ClassDescriptor>> {
        if let Some(&id) = self.by_name.get(&(unit, source.name.clone())) {
            let existing = &self.classes[id];
            if existing.source == source {
                return Ok(existing.clone());
            }
            return Err(RuntimeError::ClassRedefinition {
                name: source.name,
                unit: self.unit_label(unit),
            });
        }

        if source.parent.as_deref() == Some(source.name.as_str()) {
            return Err(RuntimeError::InheritanceCycle { name: source.name });
        }
        let parent = match &source.parent {
            Some(name) => Some(self.lookup(unit, name)?),
            None => None,
        };

        let id = self.classes.len();
        let name = source.name.clone();

        // Inherited slots first, then declared slots in declaration order
        let mut fields: Vec<FieldSlot> = parent.as_ref().map(|p| p.fields().to_vec()).unwrap_or_default();
        fields.extend(source.fields.iter().map(|f| FieldSlot {
            name: f.name.clone(),
            ty: f.ty,
            declared_in: name.clone(),
        }));

        let methods = self.build_methods(id, &source, parent.as_deref(), natives)?;
        let constructors = build_constructors(&source)?;

        let static_slots: Vec<StaticSlot> = source
            .statics
            .iter()
            .map(|s| StaticSlot {
                name: s.name.clone(),
                ty: s.ty,
                initializer: s.init.clone(),
            })
            .collect();
        let statics = StaticStorage::new(static_slots.iter().map(|s| s.ty.default_value()).collect());

        let descriptor = Arc::new(ClassDescriptor {
            id,
            unit,
            name: name.clone(),
            parent,
            fields,
            constructors,
            methods,
            static_slots,
            static_block: source.static_block.clone().map(Arc::new),
            statics,
            source,
        });

        debug!(
            class = %name,
            unit = %self.unit_label(unit),
            fields = descriptor.fields().len(),
            methods = descriptor.methods().len(),
            "registered class"
        );

        self.classes.push(descriptor.clone());
        self.by_name.insert((unit, name), id);
        Ok(descriptor)
    }

    fn build_methods(
        &self,
        id: usize,
        source: &ClassSource,
        parent: Option<&ClassDescriptor>,
        natives: &NativeRegistry,
    ) -> RuntimeResult<MethodTable> {
        let mut table = parent.map(|p| MethodTable::inherit(p.methods())).unwrap_or_default();
        let mut declared: FxHashSet<CallSignature> = FxHashSet::default();

        for decl in &source.methods {
            let signature = CallSignature::new(decl.name.clone(), decl.params.clone());
            if !declared.insert(signature.clone()) {
                return Err(RuntimeError::AmbiguousOverload {
                    class: source.name.clone(),
                    signature: signature.to_string(),
                    candidates: vec![format!("{}.{}", source.name, signature); 2],
                });
            }

            let implementation = match &decl.body {
                MethodBody::Managed(body) => MethodImpl::Managed(Arc::new(body.clone())),
                MethodBody::Native => {
                    let key = NativeKey::new(source.name.clone(), decl.name.clone(), decl.params.clone());
                    match natives.get(&key) {
                        Some(native) => MethodImpl::Native(native.clone()),
                        None => {
                            return Err(RuntimeError::UnboundNative {
                                class: source.name.clone(),
                                signature: signature.to_string(),
                            })
                        }
                    }
                }
            };

            table.insert(MethodEntry {
                signature,
                returns: decl.returns,
                is_static: decl.is_static,
                declaring_class: source.name.clone(),
                declaring_id: id,
                implementation,
            });
        }
        Ok(table)
    }

    /// Register every class of a unit, parents before children
    ///
    /// Sources may be listed in any order. A parent chain that loops inside
    /// the batch fails with `InheritanceCycle`. The batch is all or nothing:
    /// on any error, classes it already registered are removed again.
    pub fn register_unit(
        &mut self,
        unit: UnitId,
        sources: Vec<ClassSource>,
        natives: &NativeRegistry,
    ) -> RuntimeResult<Vec<Arc<ClassDescriptor>>> {
        let mark = self.classes.len();
        let result = self.register_batch(unit, sources, natives);
        if result.is_err() && self.classes.len() > mark {
            debug!(unit = %self.unit_label(unit), removed = self.classes.len() - mark, "rolled back unit");
            self.classes.truncate(mark);
            self.by_name.retain(|_, id| *id < mark);
        }
        result
    }

    fn register_batch(
        &mut self,
        unit: UnitId,
        sources: Vec<ClassSource>,
        natives: &NativeRegistry,
    ) -> RuntimeResult<Vec<Arc<ClassDescriptor>>> {
        let mut pending: FxHashMap<String, ClassSource> = FxHashMap::default();
        let mut order = Vec::with_capacity(sources.len());
        for source in sources {
            match pending.get(&source.name) {
                Some(seen) if *seen == source => {}
                Some(_) => {
                    return Err(RuntimeError::ClassRedefinition {
                        name: source.name,
                        unit: self.unit_label(unit),
                    })
                }
                None => {
                    order.push(source.name.clone());
                    pending.insert(source.name.clone(), source);
                }
            }
        }

        let mut registered = Vec::with_capacity(order.len());
        for name in order {
            let mut chain: Vec<String> = Vec::new();
            let mut cursor = Some(name);
            // Walk up to the first ancestor that is not waiting in the batch
            while let Some(current) = cursor.take() {
                if chain.contains(&current) {
                    return Err(RuntimeError::InheritanceCycle { name: current });
                }
                let Some(source) = pending.get(&current) else {
                    break;
                };
                cursor = source.parent.clone();
                chain.push(current);
            }
            for class_name in chain.into_iter().rev() {
                if let Some(source) = pending.remove(&class_name) {
                    registered.push(self.register(unit, source, natives)?);
                }
            }
        }
        Ok(registered)
    }

    /// Lookup a class visible from `unit`: the unit itself, then system
    pub fn lookup(&self, unit: UnitId, name: &str) -> RuntimeResult<Arc<ClassDescriptor>> {
        self.get(unit, name).ok_or_else(|| RuntimeError::ClassNotFound { name: name.to_string() })
    }

    /// Same as [`lookup`](Self::lookup) without an error
    pub fn get(&self, unit: UnitId, name: &str) -> Option<Arc<ClassDescriptor>> {
        let key = (unit, name.to_string());
        self.by_name
            .get(&key)
            .or_else(|| self.by_name.get(&(UnitId::SYSTEM, key.1)))
            .map(|&id| self.classes[id].clone())
    }

    /// Get class by ID
    pub fn by_id(&self, id: usize) -> Option<&Arc<ClassDescriptor>> {
        self.classes.get(id)
    }

    /// Number of registered classes across all units
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if no class is registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate over all classes in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClassDescriptor>> {
        self.classes.iter()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn build_constructors(source: &ClassSource) -> RuntimeResult<Vec<ConstructorEntry>> {
    if source.constructors.is_empty() {
        return Ok(vec![ConstructorEntry {
            params: Vec::new(),
            body: Arc::new(Body::default()),
        }]);
    }

    let mut constructors: Vec<ConstructorEntry> = Vec::with_capacity(source.constructors.len());
    for decl in &source.constructors {
        if constructors.iter().any(|c| c.params == decl.params) {
            let signature = CallSignature::new("<init>", decl.params.clone());
            return Err(RuntimeError::AmbiguousOverload {
                class: source.name.clone(),
                signature: signature.to_string(),
                candidates: vec![format!("{}.{}", source.name, signature); 2],
            });
        }
        constructors.push(ConstructorEntry {
            params: decl.params.clone(),
            body: Arc::new(decl.body.clone()),
        });
    }
    Ok(constructors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeCallResult;
    use crate::source::MethodDecl;
    use crate::value::{SemanticType, Value};

    fn print_method(tag: i32) -> MethodDecl {
        MethodDecl::instance(
            "print",
            vec![SemanticType::Int],
            SemanticType::Void,
            Body::new(vec![crate::source::Stmt::println(crate::source::Expr::int(tag))]),
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let natives = NativeRegistry::new();
        let class = registry
            .register(unit, ClassSource::new("Point").field("x", SemanticType::Int), &natives)
            .unwrap();

        assert_eq!(class.id(), 0);
        assert_eq!(class.unit(), unit);
        assert_eq!(registry.lookup(unit, "Point").unwrap().id(), 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.unit_name(unit), Some("main"));
    }

    #[test]
    fn test_lookup_missing_class() {
        let registry = ClassRegistry::new();
        match registry.lookup(UnitId::SYSTEM, "Nope") {
            Err(RuntimeError::ClassNotFound { name }) => assert_eq!(name, "Nope"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_field_layout_appends_declared_after_inherited() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let natives = NativeRegistry::new();
        registry
            .register(
                unit,
                ClassSource::new("A").field("x", SemanticType::Int).field("y", SemanticType::Long),
                &natives,
            )
            .unwrap();
        let b = registry
            .register(unit, ClassSource::new("B").extends("A").field("x", SemanticType::Int), &natives)
            .unwrap();

        let names: Vec<_> = b.fields().iter().map(|f| (f.name.as_str(), f.declared_in.as_str())).collect();
        assert_eq!(names, [("x", "A"), ("y", "A"), ("x", "B")]);
        assert_eq!(b.field_slot("x"), Some(2));
    }

    #[test]
    fn test_method_table_overrides_by_key() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let natives = NativeRegistry::new();
        registry
            .register(unit, ClassSource::new("A").method(print_method(1)), &natives)
            .unwrap();
        let b = registry
            .register(unit, ClassSource::new("B").extends("A").method(print_method(2)), &natives)
            .unwrap();

        assert_eq!(b.methods().len(), 1);
        let key = CallSignature::new("print", vec![SemanticType::Int]);
        assert_eq!(b.methods().get(&key).unwrap().declaring_class, "B");
        assert!(b.is_subclass_of(&registry.lookup(unit, "A").unwrap()));
    }

    #[test]
    fn test_identical_reregistration_is_noop() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let natives = NativeRegistry::new();
        let first = registry.register(unit, ClassSource::new("A").method(print_method(1)), &natives).unwrap();
        let second = registry.register(unit, ClassSource::new("A").method(print_method(1)), &natives).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_redefinition_in_same_unit() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let natives = NativeRegistry::new();
        registry.register(unit, ClassSource::new("A").method(print_method(1)), &natives).unwrap();

        match registry.register(unit, ClassSource::new("A").method(print_method(2)), &natives) {
            Err(RuntimeError::ClassRedefinition { name, unit }) => {
                assert_eq!(name, "A");
                assert_eq!(unit, "main");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_units_are_independent_scopes() {
        let mut registry = ClassRegistry::new();
        let natives = NativeRegistry::new();
        registry
            .register(UnitId::SYSTEM, ClassSource::new("Shared"), &natives)
            .unwrap();
        let first = registry.open_unit("first");
        let second = registry.open_unit("second");

        let a1 = registry.register(first, ClassSource::new("A").method(print_method(1)), &natives).unwrap();
        let a2 = registry.register(second, ClassSource::new("A").method(print_method(2)), &natives).unwrap();

        assert_ne!(a1.id(), a2.id());
        assert_eq!(registry.lookup(first, "A").unwrap().id(), a1.id());
        assert_eq!(registry.lookup(second, "A").unwrap().id(), a2.id());
        assert_eq!(registry.lookup(first, "Shared").unwrap().unit(), UnitId::SYSTEM);
        assert!(registry.lookup(UnitId::SYSTEM, "A").is_err());
    }

    #[test]
    fn test_register_unit_orders_parents_first() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let natives = NativeRegistry::new();
        let sources = vec![
            ClassSource::new("C").extends("B"),
            ClassSource::new("B").extends("A"),
            ClassSource::new("A"),
        ];
        let classes = registry.register_unit(unit, sources, &natives).unwrap();

        let names: Vec<_> = classes.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(registry.lookup(unit, "C").unwrap().parent().unwrap().name(), "B");
    }

    #[test]
    fn test_inheritance_cycle() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let natives = NativeRegistry::new();
        let sources = vec![ClassSource::new("A").extends("B"), ClassSource::new("B").extends("A")];
        assert!(matches!(
            registry.register_unit(unit, sources, &natives),
            Err(RuntimeError::InheritanceCycle { .. })
        ));
        assert!(matches!(
            registry.register(unit, ClassSource::new("S").extends("S"), &natives),
            Err(RuntimeError::InheritanceCycle { .. })
        ));
    }

    #[test]
    fn test_failed_batch_leaves_no_classes() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let natives = NativeRegistry::new();
        let before = registry.len();

        // Base and Ok register before the cycle is reached
        let sources = vec![
            ClassSource::new("Base"),
            ClassSource::new("Ok").extends("Base"),
            ClassSource::new("A").extends("B"),
            ClassSource::new("B").extends("A"),
        ];
        assert!(matches!(
            registry.register_unit(unit, sources, &natives),
            Err(RuntimeError::InheritanceCycle { .. })
        ));
        assert_eq!(registry.len(), before);
        assert!(registry.get(unit, "Base").is_none());
        assert!(registry.get(unit, "Ok").is_none());

        // Late failure inside one class body
        let sources = vec![
            ClassSource::new("Base"),
            ClassSource::new("Bad").method(print_method(1)).method(print_method(2)),
        ];
        assert!(matches!(
            registry.register_unit(unit, sources, &natives),
            Err(RuntimeError::AmbiguousOverload { .. })
        ));
        assert_eq!(registry.len(), before);
        assert!(registry.get(unit, "Base").is_none());

        // The unit is still usable afterwards
        let loaded = registry.register_unit(unit, vec![ClassSource::new("Base")], &natives).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(registry.lookup(unit, "Base").unwrap().id(), loaded[0].id());
    }

    #[test]
    fn test_batch_duplicate_registers_nothing() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let before = registry.len();
        let sources = vec![
            ClassSource::new("First"),
            ClassSource::new("Twice").field("a", SemanticType::Int),
            ClassSource::new("Twice").field("b", SemanticType::Int),
        ];
        assert!(matches!(
            registry.register_unit(unit, sources, &NativeRegistry::new()),
            Err(RuntimeError::ClassRedefinition { .. })
        ));
        assert_eq!(registry.len(), before);
        assert!(registry.get(unit, "First").is_none());
    }

    #[test]
    fn test_duplicate_method_declaration() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let source = ClassSource::new("A").method(print_method(1)).method(print_method(2));
        assert!(matches!(
            registry.register(unit, source, &NativeRegistry::new()),
            Err(RuntimeError::AmbiguousOverload { .. })
        ));
    }

    #[test]
    fn test_implicit_and_duplicate_constructors() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let natives = NativeRegistry::new();
        let plain = registry.register(unit, ClassSource::new("Plain"), &natives).unwrap();
        assert_eq!(plain.constructors().len(), 1);
        assert!(plain.constructors()[0].params.is_empty());

        let dup = ClassSource::new("Dup")
            .constructor(vec![SemanticType::Int], Body::default())
            .constructor(vec![SemanticType::Int], Body::default());
        assert!(matches!(
            registry.register(unit, dup, &natives),
            Err(RuntimeError::AmbiguousOverload { .. })
        ));
    }

    #[test]
    fn test_native_binding_at_registration() {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("main");
        let clock = || ClassSource::new("Clock").method(MethodDecl::native("now", vec![], SemanticType::Long, true));

        match registry.register(unit, clock(), &NativeRegistry::new()) {
            Err(RuntimeError::UnboundNative { class, signature }) => {
                assert_eq!(class, "Clock");
                assert_eq!(signature, "now()");
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut natives = NativeRegistry::new();
        natives.register("Clock", "now", vec![], |_, _| NativeCallResult::Value(Value::Long(7)));
        let class = registry.register(unit, clock(), &natives).unwrap();
        assert!(class.methods().iter().next().unwrap().is_native());
    }
}
