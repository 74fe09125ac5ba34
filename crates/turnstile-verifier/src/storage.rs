//! Local registration storage.
//!
//! The local store is authoritative for check-in state. The in-memory
//! implementation here is the device-local store used by the demo and the
//! test suites; cloned handles share state, mirroring how a real embedded
//! database handle behaves.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use turnstile_core::{
    registration::{Registration, RegistrationId, TransitionError},
    store::{CommitError, RegistrationStore, StoreError},
};

/// In-memory registration store with an atomic check-in commit.
///
/// All handles cloned from one store share state. The commit holds the
/// map lock across the status check and the write, which is what makes
/// the `Registered -> CheckedIn` transition a compare-and-swap: under
/// concurrent scanners only the first writer wins.
#[derive(Clone, Default)]
pub struct MemoryRegistrationStore {
    inner: Arc<Mutex<HashMap<RegistrationId, Registration>>>,
}

impl MemoryRegistrationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a registration (registration itself happens outside this
    /// subsystem).
    pub fn insert(&self, registration: Registration) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(registration.id.clone(), registration);
        }
    }

    /// Number of stored registrations.
    pub fn len(&self) -> usize {
        self.inner.lock().map_or(0, |map| map.len())
    }

    /// Whether the store holds no registrations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RegistrationStore for MemoryRegistrationStore {
    fn read(&self, id: &RegistrationId) -> Result<Option<Registration>, StoreError> {
        let map =
            self.inner.lock().map_err(|_| StoreError::Backend("store lock poisoned".to_owned()))?;
        Ok(map.get(id).cloned())
    }

    fn commit_check_in(
        &self,
        id: &RegistrationId,
        at_millis: u64,
    ) -> Result<Registration, CommitError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CommitError::Backend("store lock poisoned".to_owned()))?;

        let Some(registration) = map.get_mut(id) else {
            return Err(CommitError::NotFound(id.clone()));
        };

        match registration.check_in(at_millis) {
            Ok(()) => Ok(registration.clone()),
            Err(TransitionError::AlreadyCheckedIn { .. }) => {
                Err(CommitError::AlreadyCheckedIn(Box::new(registration.clone())))
            },
        }
    }
}
