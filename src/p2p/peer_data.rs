use parking_lot::RwLock;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Per-peer state attached by reactors, keyed by type.
///
/// Each use site declares its own type (for example `struct PeerHeight(u64)`), so two
/// reactors cannot clobber each other's entries and lookups need no casts at the call site.
#[derive(Default)]
pub struct PeerData {
    entries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl PeerData {
    pub fn new() -> Self {
        PeerData { entries: RwLock::new(HashMap::new()) }
    }

    /// Stores `value`, replacing any previous value of the same type.
    pub fn set<T: Any + Send + Sync>(&self, value: T) {
        self.entries.write().insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        self.get_arc::<T>().map(|value| (*value).clone())
    }

    pub fn get_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let entry = self.entries.read().get(&TypeId::of::<T>()).cloned()?;
        entry.downcast::<T>().ok()
    }

    pub fn remove<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let entry = self.entries.write().remove(&TypeId::of::<T>())?;
        entry.downcast::<T>().ok()
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for PeerData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PeerData").field("entries", &self.len()).finish()
    }
}
