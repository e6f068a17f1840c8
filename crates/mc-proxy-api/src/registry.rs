//! Ordered, thread-safe interceptor lists.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::interceptor::{PacketInterceptor, SessionInterceptor};

pub type PacketInterceptorRegistry = InterceptorRegistry<dyn PacketInterceptor>;
pub type SessionInterceptorRegistry = InterceptorRegistry<dyn SessionInterceptor>;

/// An ordered list of interceptors behind one lock.
///
/// Callers iterate over [`snapshot`](Self::snapshot) so the lock is never held
/// while an interceptor runs.
pub struct InterceptorRegistry<T: ?Sized> {
    entries: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized> InterceptorRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn count(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        self.entries().get(index).cloned()
    }

    /// Point-in-time copy of the list.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries().clone()
    }

    pub fn remove_at(&self, index: usize) -> Option<Arc<T>> {
        let mut entries = self.entries();
        (index < entries.len()).then(|| entries.remove(index))
    }

    /// Remove `interceptor` by identity. Returns whether it was present.
    pub fn remove(&self, interceptor: &Arc<T>) -> bool {
        let mut entries = self.entries();
        match entries.iter().position(|entry| same(entry, interceptor)) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Insert at `index`, shifting the entry there and everything after it.
    /// An index past the end appends.
    pub fn insert_before(&self, index: usize, interceptor: Arc<T>) {
        let mut entries = self.entries();
        if index > entries.len() {
            debug!("Insert at {index} past the end of {} interceptors, appending", entries.len());
        }
        let index = index.min(entries.len());
        entries.insert(index, interceptor);
    }

    /// Same as `insert_before(index + 1, ..)`.
    pub fn insert_after(&self, index: usize, interceptor: Arc<T>) {
        self.insert_before(index.saturating_add(1), interceptor);
    }

    pub fn insert_first(&self, interceptor: Arc<T>) {
        self.insert_before(0, interceptor);
    }

    pub fn add_at_end(&self, interceptor: Arc<T>) {
        self.entries().push(interceptor);
    }
}

impl<T: ?Sized> Default for InterceptorRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for InterceptorRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("count", &self.count())
            .finish()
    }
}

/// Identity comparison that ignores trait-object metadata.
fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}
