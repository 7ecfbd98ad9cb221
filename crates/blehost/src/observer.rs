//! Single-slot event observers
//!
//! Every event category has exactly one slot. Registering an observer
//! replaces whatever was registered before; it never adds a second listener.

use std::sync::{Arc, Mutex, PoisonError};

type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

pub struct Observer<A> {
    slot: Mutex<Option<Callback<A>>>,
}

impl<A> Observer<A> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Registers `callback`, dropping any previous registration.
    pub fn set<F>(&self, callback: F)
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_set(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Invokes the registered observer, if any. The slot lock is released
    /// before the call so the observer may re-register itself.
    pub fn emit(&self, arg: A) -> bool {
        let callback = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match callback {
            Some(callback) => {
                callback(arg);
                true
            }
            None => false,
        }
    }
}

impl<A> Default for Observer<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> std::fmt::Debug for Observer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("set", &self.is_set())
            .finish()
    }
}
