use std::sync::{Arc, Mutex, MutexGuard};

use crate::state::MinecraftGameState;

/// Told about every snapshot the tracker installs.
pub trait GameStateListener: Send + Sync {
    fn game_state_changed(&self, previous: &Arc<MinecraftGameState>, current: &Arc<MinecraftGameState>);
}

/// Holds the current snapshot of one session.
///
/// Updates are applied under a short lock, so the two traffic directions of a
/// session never lose each other's changes; readers get a complete snapshot.
#[derive(Default)]
pub struct GameStateTracker {
    current: Mutex<Arc<MinecraftGameState>>,
    listener: Option<Arc<dyn GameStateListener>>,
}

impl GameStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(listener: Arc<dyn GameStateListener>) -> Self {
        Self {
            current: Mutex::default(),
            listener: Some(listener),
        }
    }

    pub fn current(&self) -> Arc<MinecraftGameState> {
        Arc::clone(&self.lock())
    }

    /// Apply `change` to the current snapshot and install the result.
    /// The listener runs outside the lock, and only when something changed.
    pub fn update(
        &self,
        change: impl FnOnce(&Arc<MinecraftGameState>) -> Arc<MinecraftGameState>,
    ) -> Arc<MinecraftGameState> {
        let (previous, current) = {
            let mut guard = self.lock();
            let next = change(&*guard);
            if Arc::ptr_eq(&*guard, &next) {
                return next;
            }
            let previous = std::mem::replace(&mut *guard, Arc::clone(&next));
            (previous, next)
        };
        if let Some(listener) = &self.listener {
            listener.game_state_changed(&previous, &current);
        }
        current
    }

    fn lock(&self) -> MutexGuard<'_, Arc<MinecraftGameState>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for GameStateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameStateTracker")
            .field("current", &*self.lock())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::position::Position;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl GameStateListener for Counter {
        fn game_state_changed(&self, previous: &Arc<MinecraftGameState>, current: &Arc<MinecraftGameState>) {
            assert!(!Arc::ptr_eq(previous, current));
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn listener_hears_only_real_changes() {
        let counter = Arc::new(Counter::default());
        let tracker = GameStateTracker::with_listener(counter.clone());
        let initial = tracker.current();

        let moved = tracker.update(|state| state.with_position(Position::new(1.0, 2.0, 3.0), None));
        assert!(Arc::ptr_eq(&moved, &tracker.current()));
        assert!(!Arc::ptr_eq(&initial, &moved));
        tracker.update(|state| state.with_position(Position::new(1.0, 2.0, 3.0), None));
        tracker.update(|state| state.with_entity_id(7));

        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.current().entity_id(), 7);
        assert_eq!(initial.entity_id(), -1);
    }
}
