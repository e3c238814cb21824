//! Persistence of the document in a secret, versioned on content change.

use super::AutomationConfig;
use crate::kubernetes::{ClientError, Secret, SecretClient};
use thiserror::Error;
use tracing::debug;

/// Secret key holding the serialized document.
pub const AUTOMATION_CONFIG_KEY: &str = "cluster-config.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("secret {namespace}/{name} holds an unreadable automation config: {source}")]
    Decode {
        namespace: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode automation config: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Result of [`ensure_automation_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct PersistOutcome {
    pub config: AutomationConfig,
    pub changed: bool,
}

/// Reads the persisted document. A missing secret or key yields `None`.
pub fn read_automation_config<C: SecretClient + ?Sized>(
    client: &C,
    namespace: &str,
    name: &str,
) -> Result<Option<AutomationConfig>, StoreError> {
    let secret = match client.get_secret(namespace, name) {
        Ok(secret) => secret,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let Some(raw) = secret.get(AUTOMATION_CONFIG_KEY) else {
        return Ok(None);
    };
    AutomationConfig::from_json(raw)
        .map(Some)
        .map_err(|source| StoreError::Decode {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })
}

/// Persists `desired` unless it matches what is stored. When written, the
/// version becomes one past the stored version.
pub fn ensure_automation_config<C: SecretClient + ?Sized>(
    client: &C,
    namespace: &str,
    name: &str,
    desired: AutomationConfig,
) -> Result<PersistOutcome, StoreError> {
    let current = read_automation_config(client, namespace, name)?;
    if let Some(current) = &current {
        if current.content_equals(&desired) {
            return Ok(PersistOutcome {
                config: current.clone(),
                changed: false,
            });
        }
    }
    let config = desired.versioned_after(current.as_ref());
    let raw = config.to_json().map_err(StoreError::Encode)?;
    client.create_or_update_secret(
        Secret::new(namespace, name).with_entry(AUTOMATION_CONFIG_KEY, raw),
    )?;
    debug!(
        secret = %name,
        version = config.version,
        "automation config version bumped"
    );
    Ok(PersistOutcome {
        config,
        changed: true,
    })
}
