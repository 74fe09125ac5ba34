//! Turnstile core.
//!
//! Domain model and collaborator seams shared by the presenter and
//! verifier sides of the check-in protocol:
//!
//! - [`env`]: the `Environment` abstraction over wall-clock time,
//!   sleeping, and randomness, plus the production `SystemEnv`
//! - [`registration`]: the registration record and its one legal
//!   transition
//! - [`store`]: the narrow interfaces to external storage (secret
//!   directory, local registration store, remote mirror, identity display)
//! - [`provisioning`]: obtain-or-create of per-subject secrets with an
//!   offline fallback
//! - [`memory`]: in-memory collaborator implementations for demos and
//!   tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod memory;
pub mod provisioning;
pub mod registration;
pub mod store;

pub use env::{Environment, SystemEnv};
pub use memory::{MemoryDirectory, MemoryMirror, MemoryNames};
pub use provisioning::{CredentialProvisioner, Provenance, ProvisionedSecret};
pub use registration::{Registration, RegistrationId, RegistrationStatus, TransitionError};
pub use store::{
    CheckInMirror, CommitError, DirectoryError, IdentityDisplay, MirrorError, RegistrationStore,
    SecretDirectory, StoreError,
};
