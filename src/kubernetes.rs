//! Narrow view of the orchestrator API used by the control-plane core.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Error surfaced by an orchestrator client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("orchestrator request failed: {message}")]
    Api { message: String },
}

impl ClientError {
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        ClientError::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn api(message: impl Into<String>) -> Self {
        ClientError::Api {
            message: message.into(),
        }
    }

    /// Not-found is a classification, not a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// Key-value secret with string data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Secret {
    pub namespace: String,
    pub name: String,
    pub data: BTreeMap<String, String>,
}

impl Secret {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn has_all_keys(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| self.data.contains_key(*key))
    }
}

/// The parts of a pod the core inspects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pod {
    pub namespace: String,
    pub name: String,
    pub annotations: BTreeMap<String, String>,
}

impl Pod {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

pub trait SecretClient {
    fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError>;
    fn create_or_update_secret(&self, secret: Secret) -> Result<(), ClientError>;
}

pub trait PodClient {
    fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClientError>;
}

type ObjectKey = (String, String);

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

/// Client backed by in-process maps, with optional injected failures.
#[derive(Debug, Default)]
pub struct InMemoryClient {
    secrets: Mutex<BTreeMap<ObjectKey, Secret>>,
    pods: Mutex<BTreeMap<ObjectKey, Pod>>,
    pod_failures: Mutex<BTreeMap<ObjectKey, String>>,
    secret_writes: Mutex<usize>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pod(&self, pod: Pod) {
        if let Ok(mut pods) = self.pods.lock() {
            pods.insert(key(&pod.namespace, &pod.name), pod);
        }
    }

    pub fn insert_secret(&self, secret: Secret) {
        if let Ok(mut secrets) = self.secrets.lock() {
            secrets.insert(key(&secret.namespace, &secret.name), secret);
        }
    }

    /// Makes every lookup of the pod fail with an API error.
    pub fn fail_pod(&self, namespace: &str, name: &str, message: impl Into<String>) {
        if let Ok(mut failures) = self.pod_failures.lock() {
            failures.insert(key(namespace, name), message.into());
        }
    }

    /// Number of secret writes observed so far.
    pub fn secret_writes(&self) -> usize {
        self.secret_writes.lock().map(|count| *count).unwrap_or(0)
    }
}

fn locked<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ClientError> {
    mutex
        .lock()
        .map_err(|_| ClientError::api("in-memory store lock poisoned"))
}

impl SecretClient for InMemoryClient {
    fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError> {
        locked(&self.secrets)?
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClientError::not_found("secret", namespace, name))
    }

    fn create_or_update_secret(&self, secret: Secret) -> Result<(), ClientError> {
        locked(&self.secrets)?.insert(key(&secret.namespace, &secret.name), secret);
        *locked(&self.secret_writes)? += 1;
        Ok(())
    }
}

impl PodClient for InMemoryClient {
    fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClientError> {
        if let Some(message) = locked(&self.pod_failures)?.get(&key(namespace, name)) {
            return Err(ClientError::api(message.clone()));
        }
        locked(&self.pods)?
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClientError::not_found("pod", namespace, name))
    }
}
