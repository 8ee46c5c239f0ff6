//! Class descriptors and method tables
//!
//! A `ClassDescriptor` is built once by the registry and is read-only
//! afterwards, except for its static storage. The method table is closed at
//! registration: it starts as a copy of the parent's table, declared methods
//! replace entries with the same key, and new keys are appended. Dispatch is
//! a table lookup on the runtime class, never a hierarchy walk.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::native::NativeFn;
use crate::registry::UnitId;
use crate::source::{Body, ClassSource, Expr};
use crate::static_init::StaticStorage;
use crate::value::{SemanticType, Value};

/// Resolution key: name plus ordered parameter types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSignature {
    /// Method or constructor name
    pub name: String,
    /// Parameter types
    pub params: Vec<SemanticType>,
}

impl CallSignature {
    /// Create a signature
    pub fn new(name: impl Into<String>, params: Vec<SemanticType>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Exact key for a call site, if no argument is null
    pub fn of_args(name: &str, args: &[Value]) -> Option<Self> {
        let params = args
            .iter()
            .map(Value::semantic_type)
            .collect::<Option<Vec<_>>>()?;
        Some(Self::new(name, params))
    }

    /// Check whether a call `name(args)` selects this signature
    pub fn accepts(&self, name: &str, args: &[Value]) -> bool {
        self.name == name
            && self.params.len() == args.len()
            && self.params.iter().zip(args).all(|(ty, arg)| arg.conforms_to(*ty))
    }
}

impl fmt::Display for CallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, ty) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", ty)?;
        }
        f.write_str(")")
    }
}

/// Describe a call site for diagnostics, e.g. `print(int, null)`
pub fn describe_call(name: &str, args: &[Value]) -> String {
    let types: Vec<&str> = args.iter().map(Value::type_name).collect();
    format!("{}({})", name, types.join(", "))
}

/// Instance field slot
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    /// Field name
    pub name: String,
    /// Semantic type
    pub ty: SemanticType,
    /// Class that declared the field
    pub declared_in: String,
}

/// Static field slot
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSlot {
    /// Field name
    pub name: String,
    /// Semantic type
    pub ty: SemanticType,
    /// Initializer run during static initialization
    pub initializer: Option<Expr>,
}

/// Method implementation
#[derive(Clone)]
pub enum MethodImpl {
    /// Interpreted body
    Managed(Arc<Body>),
    /// Host function bound at registration
    Native(NativeFn),
}

impl fmt::Debug for MethodImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodImpl::Managed(body) => write!(f, "Managed({} stmts)", body.code.len()),
            MethodImpl::Native(_) => write!(f, "Native"),
        }
    }
}

/// Method table entry
#[derive(Debug)]
pub struct MethodEntry {
    /// Resolution key
    pub signature: CallSignature,
    /// Declared return type
    pub returns: SemanticType,
    /// Static methods are excluded from virtual dispatch
    pub is_static: bool,
    /// Name of the declaring class
    pub declaring_class: String,
    /// Registry index of the declaring class
    pub declaring_id: usize,
    /// Body or host binding
    pub implementation: MethodImpl,
}

impl MethodEntry {
    /// `Class.name(params)` for logs and errors
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_class, self.signature)
    }

    /// Check whether the implementation is host-provided
    pub fn is_native(&self) -> bool {
        matches!(self.implementation, MethodImpl::Native(_))
    }
}

/// Constructor entry
#[derive(Debug, Clone)]
pub struct ConstructorEntry {
    /// Parameter types
    pub params: Vec<SemanticType>,
    /// Constructor body
    pub body: Arc<Body>,
}

impl ConstructorEntry {
    /// Check whether the arguments select this constructor
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self.params.iter().zip(args).all(|(ty, arg)| arg.conforms_to(*ty))
    }
}

/// Method table for dispatch
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    /// Entries in slot order (inherited first)
    entries: Vec<Arc<MethodEntry>>,
    /// Signature to slot index
    index: FxHashMap<CallSignature, usize>,
}

impl MethodTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a parent's table
    pub fn inherit(parent: &MethodTable) -> Self {
        parent.clone()
    }

    /// Insert an entry, replacing one with the same key; returns whether it overrode
    pub fn insert(&mut self, entry: MethodEntry) -> bool {
        let entry = Arc::new(entry);
        match self.index.get(&entry.signature) {
            Some(&slot) => {
                self.entries[slot] = entry;
                true
            }
            None => {
                self.index.insert(entry.signature.clone(), self.entries.len());
                self.entries.push(entry);
                false
            }
        }
    }

    /// Exact lookup
    pub fn get(&self, signature: &CallSignature) -> Option<&Arc<MethodEntry>> {
        self.index.get(signature).map(|&slot| &self.entries[slot])
    }

    /// Entries accepting a call `name(args)`
    pub fn candidates<'a>(&'a self, name: &'a str, args: &'a [Value]) -> impl Iterator<Item = &'a Arc<MethodEntry>> + 'a {
        self.entries.iter().filter(move |e| e.signature.accepts(name, args))
    }

    /// Iterate entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MethodEntry>> {
        self.entries.iter()
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Class definition metadata
pub struct ClassDescriptor {
    pub(crate) id: usize,
    pub(crate) unit: UnitId,
    pub(crate) name: String,
    pub(crate) parent: Option<Arc<ClassDescriptor>>,
    pub(crate) fields: Vec<FieldSlot>,
    pub(crate) constructors: Vec<ConstructorEntry>,
    pub(crate) methods: MethodTable,
    pub(crate) static_slots: Vec<StaticSlot>,
    pub(crate) static_block: Option<Arc<Body>>,
    pub(crate) statics: StaticStorage,
    pub(crate) source: ClassSource,
}

impl ClassDescriptor {
    /// Registry index
    pub fn id(&self) -> usize {
        self.id
    }

    /// Unit the class was registered in
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent descriptor
    pub fn parent(&self) -> Option<&Arc<ClassDescriptor>> {
        self.parent.as_ref()
    }

    /// Instance field layout (inherited slots first)
    pub fn fields(&self) -> &[FieldSlot] {
        &self.fields
    }

    /// Slot of a field by name; a subclass field shadows an inherited one
    pub fn field_slot(&self, name: &str) -> Option<usize> {
        self.fields.iter().rposition(|f| f.name == name)
    }

    /// Declared constructors (implicit no-arg constructor included)
    pub fn constructors(&self) -> &[ConstructorEntry] {
        &self.constructors
    }

    /// Closed method table
    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    /// Declared static slots
    pub fn static_slots(&self) -> &[StaticSlot] {
        &self.static_slots
    }

    /// Index of a static slot declared by this class
    pub fn static_slot(&self, name: &str) -> Option<usize> {
        self.static_slots.iter().position(|s| s.name == name)
    }

    /// Static block, if any
    pub fn static_block(&self) -> Option<&Arc<Body>> {
        self.static_block.as_ref()
    }

    /// Static storage and initialization state
    pub fn statics(&self) -> &StaticStorage {
        &self.statics
    }

    /// Whether static initialization has completed
    pub fn is_initialized(&self) -> bool {
        self.statics.is_initialized()
    }

    /// Source the descriptor was built from
    pub fn source(&self) -> &ClassSource {
        &self.source
    }

    /// Check whether this class is `other` or a descendant of it
    pub fn is_subclass_of(&self, other: &ClassDescriptor) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.id == other.id {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }

    /// Nearest class in the parent chain declaring static `name`
    pub fn static_owner(self: &Arc<Self>, name: &str) -> Option<(Arc<ClassDescriptor>, usize)> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(slot) = class.static_slot(name) {
                return Some((class.clone(), slot));
            }
            current = class.parent.as_ref();
        }
        None
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("id", &self.id)
            .field("unit", &self.unit)
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("fields", &self.fields)
            .field("methods", &self.methods.len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
