//! Runtime secret resolution.
//!
//! Config stores env var NAMES only. [`resolve_secrets`] is called once at
//! startup and the result passed into constructors. Errors name the variable,
//! never the value, and `Debug` redacts.

use anyhow::{bail, Result};

use crate::AutoretrieveConfig;

#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Base64 protobuf-encoded private key for the provider host. `None` =
    /// ephemeral identity.
    pub provider_identity_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "provider_identity_key",
                &self.provider_identity_key.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Unset or blank counts as absent.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Resolve every secret named by `cfg`.
///
/// A configured `identity_key_env` is an explicit opt-in, so a missing
/// variable is an error rather than a silent fallback to an ephemeral key.
pub fn resolve_secrets(cfg: &AutoretrieveConfig) -> Result<ResolvedSecrets> {
    let name = cfg.provider.identity_key_env.trim();
    if name.is_empty() {
        return Ok(ResolvedSecrets {
            provider_identity_key: None,
        });
    }

    match resolve_env(name) {
        Some(key) => Ok(ResolvedSecrets {
            provider_identity_key: Some(key),
        }),
        None => bail!(
            "SECRETS_MISSING: required env var '{}' (provider identity key) is not set or empty",
            name
        ),
    }
}
