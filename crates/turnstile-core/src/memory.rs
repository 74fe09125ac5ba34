//! In-memory collaborator implementations.
//!
//! Default backing stores for the demo binary and the test suites. All
//! handles cloned from one instance share state. Secrets are held in
//! their storage encoding (lowercase hex), so a corrupt entry surfaces
//! through the same [`DirectoryError::CorruptSecret`] path a real remote
//! store would produce.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use turnstile_otp::Secret;

use crate::{
    registration::{RegistrationId, RegistrationStatus},
    store::{CheckInMirror, DirectoryError, IdentityDisplay, MirrorError, SecretDirectory},
};

/// In-memory secret directory.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    secrets: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a subject's secret.
    pub fn insert(&self, subject_id: &str, secret: &Secret) {
        if let Ok(mut map) = self.secrets.lock() {
            map.insert(subject_id.to_owned(), secret.to_hex());
        }
    }

    /// Seed a raw stored value, bypassing validation. Lets tests plant
    /// corrupt entries.
    pub fn insert_raw(&self, subject_id: &str, stored: &str) {
        if let Ok(mut map) = self.secrets.lock() {
            map.insert(subject_id.to_owned(), stored.to_owned());
        }
    }

    /// Whether a subject has a stored secret.
    pub fn contains(&self, subject_id: &str) -> bool {
        self.secrets.lock().is_ok_and(|map| map.contains_key(subject_id))
    }
}

#[async_trait]
impl SecretDirectory for MemoryDirectory {
    async fn read_secret(&self, subject_id: &str) -> Result<Option<Secret>, DirectoryError> {
        let stored = self
            .secrets
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_owned()))?
            .get(subject_id)
            .cloned();

        stored.map(|hex| Secret::from_hex(&hex).map_err(DirectoryError::from)).transpose()
    }

    async fn write_secret(&self, subject_id: &str, secret: &Secret) -> Result<(), DirectoryError> {
        self.secrets
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_owned()))?
            .insert(subject_id.to_owned(), secret.to_hex());
        Ok(())
    }
}

/// In-memory check-in mirror that records what it was asked to write.
#[derive(Clone, Default)]
pub struct MemoryMirror {
    mirrored: Arc<Mutex<HashMap<RegistrationId, (RegistrationStatus, u64)>>>,
}

impl MemoryMirror {
    /// Create an empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The mirrored state for a registration, if any write arrived.
    pub fn mirrored(&self, id: &RegistrationId) -> Option<(RegistrationStatus, u64)> {
        self.mirrored.lock().ok().and_then(|map| map.get(id).copied())
    }

    /// Number of mirrored registrations.
    pub fn len(&self) -> usize {
        self.mirrored.lock().map_or(0, |map| map.len())
    }

    /// Whether nothing has been mirrored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CheckInMirror for MemoryMirror {
    async fn mirror_check_in(
        &self,
        id: &RegistrationId,
        status: RegistrationStatus,
        at_millis: u64,
    ) -> Result<(), MirrorError> {
        self.mirrored
            .lock()
            .map_err(|_| MirrorError::Unavailable("mirror lock poisoned".to_owned()))?
            .insert(id.clone(), (status, at_millis));
        Ok(())
    }
}

/// In-memory display-name book.
#[derive(Clone, Default)]
pub struct MemoryNames {
    names: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryNames {
    /// Create an empty name book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a subject's display name.
    pub fn insert(&self, subject_id: &str, name: &str) {
        if let Ok(mut map) = self.names.lock() {
            map.insert(subject_id.to_owned(), name.to_owned());
        }
    }
}

#[async_trait]
impl IdentityDisplay for MemoryNames {
    async fn display_name(&self, subject_id: &str) -> Result<Option<String>, DirectoryError> {
        Ok(self
            .names
            .lock()
            .map_err(|_| DirectoryError::Unavailable("name book lock poisoned".to_owned()))?
            .get(subject_id)
            .cloned())
    }
}
