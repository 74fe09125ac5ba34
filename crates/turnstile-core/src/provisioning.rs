//! Credential provisioning.
//!
//! Obtains-or-creates the per-subject secret, preferring the remote
//! authoritative copy and falling back to an ephemeral local one when the
//! remote store is unreachable. The fallback is surfaced to callers via
//! [`Provenance`], never hidden: a presenter running on a local-only
//! secret cannot produce codes the verifier can validate, and the UI is
//! expected to say so.

use std::sync::Arc;

use turnstile_otp::Secret;

use crate::{
    env::Environment,
    store::{DirectoryError, SecretDirectory},
};

/// Where a provisioned secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Read from the remote directory (the authoritative copy).
    Remote,
    /// Freshly generated and successfully persisted remotely.
    Created,
    /// Freshly generated but NOT persisted remotely.
    ///
    /// Codes derived from this secret cannot be validated by a verifier
    /// reading from the remote directory. A later call - on this or
    /// another device - may generate a different secret; this divergence
    /// is inherited behavior and is surfaced, not reconciled.
    LocalOnly,
}

/// A secret together with its provenance.
#[derive(Debug, Clone)]
pub struct ProvisionedSecret {
    /// The secret to derive codes from.
    pub secret: Secret,
    /// How the secret was obtained.
    pub provenance: Provenance,
}

impl ProvisionedSecret {
    /// Whether the verifier side can be expected to validate codes
    /// derived from this secret.
    pub fn is_verifiable(&self) -> bool {
        self.provenance != Provenance::LocalOnly
    }
}

/// Obtain-or-create of per-subject secrets.
///
/// Generic over the environment (entropy source) and the remote
/// directory. Idempotent in the success path: two calls for the same
/// subject after a successful first call return the same secret.
pub struct CredentialProvisioner<E, D> {
    env: E,
    directory: Arc<D>,
}

impl<E, D> CredentialProvisioner<E, D>
where
    E: Environment,
    D: SecretDirectory,
{
    /// Create a provisioner over the given directory.
    pub fn new(env: E, directory: Arc<D>) -> Self {
        Self { env, directory }
    }

    /// Obtain the subject's secret, creating one if none exists.
    ///
    /// Remote read first; on a hit the stored secret is returned. On a
    /// miss a fresh secret is generated and a remote write attempted -
    /// the secret is returned regardless of whether that write succeeded,
    /// with the degradation recorded in [`Provenance`]. On remote read
    /// failure (no connectivity) a fresh local-only secret is returned.
    ///
    /// # Errors
    ///
    /// Only a corrupt stored secret ([`DirectoryError::CorruptSecret`])
    /// is an error: that is a precondition violation, not a connectivity
    /// condition, and must fail loudly rather than desync the subject by
    /// silently regenerating.
    pub async fn get_or_create(
        &self,
        subject_id: &str,
    ) -> Result<ProvisionedSecret, DirectoryError> {
        match self.directory.read_secret(subject_id).await {
            Ok(Some(secret)) => {
                Ok(ProvisionedSecret { secret, provenance: Provenance::Remote })
            },
            Ok(None) => {
                let secret = self.generate();
                match self.directory.write_secret(subject_id, &secret).await {
                    Ok(()) => {
                        tracing::debug!(subject_id, "provisioned new secret");
                        Ok(ProvisionedSecret { secret, provenance: Provenance::Created })
                    },
                    Err(error) => {
                        tracing::warn!(
                            subject_id,
                            %error,
                            "secret write failed; continuing with local-only secret"
                        );
                        Ok(ProvisionedSecret { secret, provenance: Provenance::LocalOnly })
                    },
                }
            },
            Err(DirectoryError::CorruptSecret(error)) => {
                Err(DirectoryError::CorruptSecret(error))
            },
            Err(error) => {
                tracing::warn!(
                    subject_id,
                    %error,
                    "secret read failed; continuing with local-only secret"
                );
                Ok(ProvisionedSecret { secret: self.generate(), provenance: Provenance::LocalOnly })
            },
        }
    }

    /// Read-only secret lookup for the verifier path.
    ///
    /// Never generates: an absent subject stays absent.
    pub async fn lookup(&self, subject_id: &str) -> Result<Option<Secret>, DirectoryError> {
        self.directory.read_secret(subject_id).await
    }

    fn generate(&self) -> Secret {
        let mut entropy = [0u8; Secret::LEN];
        self.env.random_bytes(&mut entropy);
        Secret::from_entropy(entropy)
    }
}
