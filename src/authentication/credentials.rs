//! Secret-backed credential material: SCRAM credentials, agent password and keyfile.

use super::scram::{compute_credentials, ScramVariant};
use super::{AuthError, EXTERNAL_DB};
use crate::automation_config::{ReplicaSetTopology, ScramCredentials};
use crate::kubernetes::{Secret, SecretClient};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use tracing::debug;

pub const SHA1_SALT_KEY: &str = "sha1-salt";
pub const SHA256_SALT_KEY: &str = "sha256-salt";
pub const SHA1_SERVER_KEY_KEY: &str = "sha-1-server-key";
pub const SHA256_SERVER_KEY_KEY: &str = "sha-256-server-key";
pub const SHA1_STORED_KEY_KEY: &str = "sha-1-stored-key";
pub const SHA256_STORED_KEY_KEY: &str = "sha-256-stored-key";

/// Secret key holding the agent password.
pub const AGENT_PASSWORD_KEY: &str = "password";
/// Secret key holding the keyfile contents.
pub const AGENT_KEYFILE_KEY: &str = "keyfile";

pub const CONNECTION_STRING_STANDARD_KEY: &str = "connectionString.standard";
pub const CONNECTION_STRING_SRV_KEY: &str = "connectionString.standardSrv";
pub const CONNECTION_STRING_USERNAME_KEY: &str = "username";
pub const CONNECTION_STRING_PASSWORD_KEY: &str = "password";

pub const MIN_KEYFILE_LENGTH: usize = 6;
pub const MAX_KEYFILE_LENGTH: usize = 1024;

const KEYFILE_RANDOM_BYTES: usize = 375;
const PASSWORD_RANDOM_BYTES: usize = 15;
const MAX_OBJECT_NAME_LENGTH: usize = 253;

/// Credentials for both SCRAM variants of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScramCredentialSet {
    pub sha1: ScramCredentials,
    pub sha256: ScramCredentials,
}

impl ScramCredentialSet {
    pub fn compute(
        username: &str,
        password: &str,
        sha1_salt: &[u8],
        sha256_salt: &[u8],
    ) -> Result<Self, AuthError> {
        Ok(Self {
            sha1: compute_credentials(username, password, sha1_salt, ScramVariant::Sha1)?,
            sha256: compute_credentials(username, password, sha256_salt, ScramVariant::Sha256)?,
        })
    }

    /// Derives a fresh set with random salts.
    pub fn generate(username: &str, password: &str) -> Result<Self, AuthError> {
        Self::compute(
            username,
            password,
            &random_bytes(ScramVariant::Sha1.salt_size()),
            &random_bytes(ScramVariant::Sha256.salt_size()),
        )
    }

    pub fn to_secret(&self, namespace: &str, name: &str) -> Secret {
        Secret::new(namespace, name)
            .with_entry(SHA1_SALT_KEY, self.sha1.salt.clone())
            .with_entry(SHA1_STORED_KEY_KEY, self.sha1.stored_key.clone())
            .with_entry(SHA1_SERVER_KEY_KEY, self.sha1.server_key.clone())
            .with_entry(SHA256_SALT_KEY, self.sha256.salt.clone())
            .with_entry(SHA256_STORED_KEY_KEY, self.sha256.stored_key.clone())
            .with_entry(SHA256_SERVER_KEY_KEY, self.sha256.server_key.clone())
    }

    pub fn from_secret(secret: &Secret) -> Result<Self, AuthError> {
        let field = |key: &str| {
            secret
                .get(key)
                .map(str::to_string)
                .ok_or_else(|| AuthError::MalformedCredentials {
                    secret: secret.name.clone(),
                    reason: format!("missing key {key}"),
                })
        };
        Ok(Self {
            sha1: ScramCredentials {
                iteration_count: ScramVariant::Sha1.iterations(),
                salt: field(SHA1_SALT_KEY)?,
                server_key: field(SHA1_SERVER_KEY_KEY)?,
                stored_key: field(SHA1_STORED_KEY_KEY)?,
            },
            sha256: ScramCredentials {
                iteration_count: ScramVariant::Sha256.iterations(),
                salt: field(SHA256_SALT_KEY)?,
                server_key: field(SHA256_SERVER_KEY_KEY)?,
                stored_key: field(SHA256_STORED_KEY_KEY)?,
            },
        })
    }

    pub fn for_variant(&self, variant: ScramVariant) -> &ScramCredentials {
        match variant {
            ScramVariant::Sha1 => &self.sha1,
            ScramVariant::Sha256 => &self.sha256,
        }
    }
}

/// Returns the credentials stored in `secret_name`, re-deriving and writing
/// them only when the password changed or nothing is stored yet.
pub fn ensure_scram_credentials<C: SecretClient + ?Sized>(
    client: &C,
    namespace: &str,
    secret_name: &str,
    username: &str,
    password: &str,
) -> Result<ScramCredentialSet, AuthError> {
    match client.get_secret(namespace, secret_name) {
        Ok(secret) => {
            let existing = ScramCredentialSet::from_secret(&secret)?;
            let recomputed = ScramCredentialSet::compute(
                username,
                password,
                &decode_salt(&secret.name, &existing.sha1.salt)?,
                &decode_salt(&secret.name, &existing.sha256.salt)?,
            )?;
            if recomputed == existing {
                debug!(secret = %secret_name, "credentials unchanged, reusing stored values");
                return Ok(existing);
            }
        }
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }
    debug!(secret = %secret_name, "generating new SCRAM credentials");
    let generated = ScramCredentialSet::generate(username, password)?;
    client.create_or_update_secret(generated.to_secret(namespace, secret_name))?;
    Ok(generated)
}

fn decode_salt(secret: &str, encoded: &str) -> Result<Vec<u8>, AuthError> {
    general_purpose::STANDARD
        .decode(encoded)
        .map_err(|err| AuthError::MalformedCredentials {
            secret: secret.to_string(),
            reason: format!("salt is not base64: {err}"),
        })
}

/// A user whose connection strings are published in a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStringUser {
    pub username: String,
    pub database: String,
    pub password_secret_name: String,
    pub password_secret_key: String,
    /// Overrides the derived secret name.
    pub secret_name: Option<String>,
    /// Defaults to the resource namespace.
    pub secret_namespace: Option<String>,
}

impl ConnectionStringUser {
    pub fn new(
        username: impl Into<String>,
        database: impl Into<String>,
        password_secret_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            database: database.into(),
            password_secret_name: password_secret_name.into(),
            password_secret_key: AGENT_PASSWORD_KEY.to_string(),
            secret_name: None,
            secret_namespace: None,
        }
    }

    pub fn with_password_key(mut self, key: impl Into<String>) -> Self {
        self.password_secret_key = key.into();
        self
    }

    pub fn with_secret_name(mut self, name: impl Into<String>) -> Self {
        self.secret_name = Some(name.into());
        self
    }

    pub fn with_secret_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.secret_namespace = Some(namespace.into());
        self
    }

    pub fn secret_name(&self, resource_name: &str) -> String {
        self.secret_name.clone().unwrap_or_else(|| {
            connection_string_secret_name(resource_name, &self.username, &self.database)
        })
    }
}

/// `<resource>-<database>-<username>`, normalized to a valid object name.
pub fn connection_string_secret_name(
    resource_name: &str,
    username: &str,
    database: &str,
) -> String {
    normalize_name(&format!("{resource_name}-{database}-{username}"))
}

/// Lowercases and replaces runs of disallowed characters with a single `-`.
/// Names that are already valid DNS subdomains are returned untouched.
pub fn normalize_name(name: &str) -> String {
    if is_dns_subdomain(name) {
        return name.to_string();
    }
    let mut normalized = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            normalized.push(ch);
        } else if !normalized.ends_with('-') {
            normalized.push('-');
        }
    }
    let mut normalized = normalized.trim_matches('-').to_string();
    normalized.truncate(MAX_OBJECT_NAME_LENGTH);
    normalized
}

fn is_dns_subdomain(name: &str) -> bool {
    let label_ok = |label: &str| {
        let bytes = label.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                first.is_ascii_alphanumeric()
                    && last.is_ascii_alphanumeric()
                    && bytes
                        .iter()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            }
            _ => false,
        }
    };
    name.len() <= MAX_OBJECT_NAME_LENGTH && name.split('.').all(label_ok)
}

/// Writes the secret holding a user's standard and SRV connection strings.
///
/// The password is read from the user's password secret in the resource
/// namespace; `$external` users get an empty one. Nothing is written when
/// the stored secret already matches.
pub fn ensure_connection_string_secret<C: SecretClient + ?Sized>(
    client: &C,
    topology: &ReplicaSetTopology,
    user: &ConnectionStringUser,
) -> Result<Secret, AuthError> {
    let namespace = user
        .secret_namespace
        .as_deref()
        .unwrap_or(&topology.namespace);
    let name = user.secret_name(&topology.name);
    let password = if user.database == EXTERNAL_DB {
        String::new()
    } else {
        read_secret_key(
            client,
            &topology.namespace,
            &user.password_secret_name,
            &user.password_secret_key,
        )?
    };

    let desired = Secret::new(namespace, name.as_str())
        .with_entry(
            CONNECTION_STRING_STANDARD_KEY,
            topology.user_uri(&user.username, &password, &user.database),
        )
        .with_entry(
            CONNECTION_STRING_SRV_KEY,
            topology.user_srv_uri(&user.username, &password, &user.database),
        )
        .with_entry(CONNECTION_STRING_USERNAME_KEY, user.username.clone())
        .with_entry(CONNECTION_STRING_PASSWORD_KEY, password);

    match client.get_secret(namespace, &name) {
        Ok(existing) if existing == desired => {
            debug!(secret = %name, "connection strings unchanged");
            return Ok(desired);
        }
        Ok(_) => {}
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }
    debug!(secret = %name, namespace = %namespace, "writing connection strings");
    client.create_or_update_secret(desired.clone())?;
    Ok(desired)
}

/// Reads `key` from a secret.
pub fn read_secret_key<C: SecretClient + ?Sized>(
    client: &C,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<String, AuthError> {
    let secret = client.get_secret(namespace, name)?;
    secret
        .get(key)
        .map(str::to_string)
        .ok_or_else(|| AuthError::MissingSecretKey {
            secret: name.to_string(),
            key: key.to_string(),
        })
}

/// Returns the value under `key`, storing `generated` first if the secret or key is absent.
pub fn ensure_secret_with_key<C: SecretClient + ?Sized>(
    client: &C,
    namespace: &str,
    name: &str,
    key: &str,
    generated: String,
) -> Result<String, AuthError> {
    let secret = match client.get_secret(namespace, name) {
        Ok(secret) => secret,
        Err(err) if err.is_not_found() => Secret::new(namespace, name),
        Err(err) => return Err(err.into()),
    };
    if let Some(existing) = secret.get(key) {
        return Ok(existing.to_string());
    }
    client.create_or_update_secret(secret.with_entry(key, generated.clone()))?;
    Ok(generated)
}

/// Random keyfile material, 500 base64 characters.
pub fn generate_keyfile_contents() -> String {
    general_purpose::STANDARD.encode(random_bytes(KEYFILE_RANDOM_BYTES))
}

/// Random URL-safe agent password.
pub fn generate_password() -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(random_bytes(PASSWORD_RANDOM_BYTES))
}

pub fn validate_keyfile_contents(contents: &str) -> Result<(), AuthError> {
    let length = contents.chars().count();
    if (MIN_KEYFILE_LENGTH..=MAX_KEYFILE_LENGTH).contains(&length) {
        Ok(())
    } else {
        Err(AuthError::InvalidKeyfile { length })
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
