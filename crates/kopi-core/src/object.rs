//! Heap objects and allocation tracking
//!
//! Objects are reference counted: an instance lives as long as any handle to
//! it. The heap keeps a weak tracking table for statistics. Allocation sweeps
//! dead entries whenever the table has doubled since its last sweep, so the
//! table stays within twice the live count (plus a small floor); the gc hint
//! sweeps on demand. Reference cycles are not reclaimed.
//!
//! Each field slot is guarded by the instance lock only for memory safety.
//! There is no ordering guarantee across fields or across instances: two
//! threads mutating one instance without their own synchronization observe
//! writes in an unspecified order.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::class::ClassDescriptor;
use crate::value::Value;

/// Object instance (heap-allocated)
pub struct ObjectInstance {
    /// Allocation identity
    id: u64,
    /// Runtime class (shared, read-only)
    class: Arc<ClassDescriptor>,
    /// Field values in layout order
    fields: Mutex<Vec<Value>>,
}

/// Handle to a heap object
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectInstance>);

impl ObjectRef {
    fn new(id: u64, class: Arc<ClassDescriptor>) -> Self {
        let fields = class.fields().iter().map(|f| f.ty.default_value()).collect();
        Self(Arc::new(ObjectInstance {
            id,
            class,
            fields: Mutex::new(fields),
        }))
    }

    /// Allocation identity of the instance
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Runtime class of the instance
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.0.class
    }

    /// Runtime class name
    pub fn class_name(&self) -> &str {
        self.0.class.name()
    }

    /// Get a field value by slot index
    pub fn get_field(&self, slot: usize) -> Option<Value> {
        self.0.fields.lock().get(slot).cloned()
    }

    /// Set a field value by slot index
    pub fn set_field(&self, slot: usize, value: Value) -> Result<(), String> {
        let mut fields = self.0.fields.lock();
        let count = fields.len();
        match fields.get_mut(slot) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(format!(
                "Field index {} out of bounds (object has {} fields)",
                slot, count
            )),
        }
    }

    /// Read the last field with the given name in the runtime class layout
    pub fn field_by_name(&self, name: &str) -> Option<Value> {
        self.0.class.field_slot(name).and_then(|slot| self.get_field(slot))
    }

    /// Get number of fields
    pub fn field_count(&self) -> usize {
        self.0.fields.lock().len()
    }

    /// Check whether two handles refer to the same instance
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn downgrade(&self) -> Weak<ObjectInstance> {
        Arc::downgrade(&self.0)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object({}@{:x})", self.class_name(), self.id())
    }
}

/// Heap statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    /// Objects allocated since runtime start
    pub allocated: u64,
    /// Entries in the tracking table (live objects plus dead ones not yet swept)
    pub tracked: usize,
    /// Sweep passes run
    pub collections: u64,
}

/// Tracking table size below which allocation never sweeps
const MIN_SWEEP_THRESHOLD: usize = 1024;

struct Tracking {
    handles: Vec<Weak<ObjectInstance>>,
    /// Length at which the next allocation sweeps
    sweep_at: usize,
}

impl Tracking {
    fn sweep(&mut self) -> usize {
        let before = self.handles.len();
        self.handles.retain(|weak| weak.strong_count() > 0);
        self.sweep_at = (self.handles.len() * 2).max(MIN_SWEEP_THRESHOLD);
        before - self.handles.len()
    }
}

impl Default for Tracking {
    fn default() -> Self {
        Self {
            handles: Vec::new(),
            sweep_at: MIN_SWEEP_THRESHOLD,
        }
    }
}

/// Object allocator and tracking table
#[derive(Default)]
pub struct Heap {
    next_id: AtomicU64,
    collections: AtomicU64,
    tracked: Mutex<Tracking>,
    tracked_count: AtomicUsize,
}

impl Heap {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an instance of `class` with every field at its zero value
    pub fn allocate(&self, class: Arc<ClassDescriptor>) -> ObjectRef {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let obj = ObjectRef::new(id, class);
        let mut tracked = self.tracked.lock();
        if tracked.handles.len() >= tracked.sweep_at {
            tracked.sweep();
        }
        tracked.handles.push(obj.downgrade());
        self.tracked_count.store(tracked.handles.len(), Ordering::Relaxed);
        obj
    }

    /// Drop tracking entries whose instances are gone; returns how many were swept
    pub fn collect(&self) -> usize {
        let mut tracked = self.tracked.lock();
        let swept = tracked.sweep();
        self.tracked_count.store(tracked.handles.len(), Ordering::Relaxed);
        self.collections.fetch_add(1, Ordering::Relaxed);
        swept
    }

    /// Current statistics
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            allocated: self.next_id.load(Ordering::Relaxed),
            tracked: self.tracked_count.load(Ordering::Relaxed),
            collections: self.collections.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap").field("stats", &self.stats()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeRegistry;
    use crate::registry::ClassRegistry;
    use crate::source::ClassSource;
    use crate::value::SemanticType;

    fn point_class() -> Arc<ClassDescriptor> {
        let mut registry = ClassRegistry::new();
        let unit = registry.open_unit("test");
        let source = ClassSource::new("Point")
            .field("x", SemanticType::Int)
            .field("y", SemanticType::Long)
            .field("next", SemanticType::Reference);
        registry
            .register(unit, source, &NativeRegistry::new())
            .unwrap()
    }

    #[test]
    fn test_allocation_zeroes_fields() {
        let heap = Heap::new();
        let obj = heap.allocate(point_class());
        assert_eq!(obj.field_count(), 3);
        assert_eq!(obj.get_field(0), Some(Value::Int(0)));
        assert_eq!(obj.get_field(1), Some(Value::Long(0)));
        assert_eq!(obj.get_field(2), Some(Value::Null));
    }

    #[test]
    fn test_object_field_access() {
        let heap = Heap::new();
        let obj = heap.allocate(point_class());
        obj.set_field(0, Value::Int(42)).unwrap();
        assert_eq!(obj.field_by_name("x"), Some(Value::Int(42)));
        assert!(obj.set_field(3, Value::Null).is_err());
        assert_eq!(obj.get_field(10), None);
    }

    #[test]
    fn test_aliasing_is_observable() {
        let heap = Heap::new();
        let a = heap.allocate(point_class());
        let alias = Value::Object(a.clone());
        alias.as_object().unwrap().set_field(0, Value::Int(7)).unwrap();
        assert_eq!(a.get_field(0), Some(Value::Int(7)));
        assert_eq!(Value::Object(a), alias);
    }

    #[test]
    fn test_identity_differs_between_allocations() {
        let heap = Heap::new();
        let class = point_class();
        let a = heap.allocate(class.clone());
        let b = heap.allocate(class);
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }

    #[test]
    fn test_collect_sweeps_dead_handles() {
        let heap = Heap::new();
        let class = point_class();
        let kept = heap.allocate(class.clone());
        drop(heap.allocate(class));
        assert_eq!(heap.stats().tracked, 2);

        assert_eq!(heap.collect(), 1);
        let stats = heap.stats();
        assert_eq!(stats.allocated, 2);
        assert_eq!(stats.tracked, 1);
        assert_eq!(stats.collections, 1);
        drop(kept);
    }

    #[test]
    fn test_tracking_stays_bounded_without_collect() {
        let heap = Heap::new();
        let class = point_class();
        for _ in 0..100_000 {
            drop(heap.allocate(class.clone()));
        }
        let stats = heap.stats();
        assert_eq!(stats.allocated, 100_000);
        assert_eq!(stats.collections, 0);
        assert!(stats.tracked <= MIN_SWEEP_THRESHOLD, "tracked {}", stats.tracked);
    }

    #[test]
    fn test_tracking_keeps_live_objects() {
        let heap = Heap::new();
        let class = point_class();
        let live: Vec<_> = (0..3000).map(|_| heap.allocate(class.clone())).collect();
        for _ in 0..10_000 {
            drop(heap.allocate(class.clone()));
        }
        let tracked = heap.stats().tracked;
        assert!(tracked >= live.len());
        assert!(tracked <= 2 * live.len() + 1, "tracked {}", tracked);

        drop(live);
        heap.collect();
        assert_eq!(heap.stats().tracked, 0);
    }
}
