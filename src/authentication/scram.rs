//! SCRAM credential derivation (RFC 5802).

use super::AuthError;
use crate::automation_config::ScramCredentials;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Bytes reserved at the end of the salt for the block index.
pub const RFC5802_MANDATED_SALT_SIZE: usize = 4;
pub const SCRAM_SHA1_ITERATIONS: u32 = 10_000;
pub const SCRAM_SHA256_ITERATIONS: u32 = 15_000;

const CLIENT_KEY: &[u8] = b"Client Key";
const SERVER_KEY: &[u8] = b"Server Key";

/// Hash family used by one SCRAM variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScramVariant {
    Sha1,
    Sha256,
}

impl ScramVariant {
    pub fn hash_size(self) -> usize {
        match self {
            ScramVariant::Sha1 => 20,
            ScramVariant::Sha256 => 32,
        }
    }

    pub fn salt_size(self) -> usize {
        self.hash_size() - RFC5802_MANDATED_SALT_SIZE
    }

    pub fn iterations(self) -> u32 {
        match self {
            ScramVariant::Sha1 => SCRAM_SHA1_ITERATIONS,
            ScramVariant::Sha256 => SCRAM_SHA256_ITERATIONS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScramVariant::Sha1 => "SCRAM-SHA-1",
            ScramVariant::Sha256 => "SCRAM-SHA-256",
        }
    }

    fn hmac(self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, AuthError> {
        let invalid_key = |err: hmac::digest::InvalidLength| AuthError::Hmac {
            reason: err.to_string(),
        };
        Ok(match self {
            ScramVariant::Sha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(invalid_key)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
            ScramVariant::Sha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(invalid_key)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
        })
    }

    fn hash(self, data: &[u8]) -> Vec<u8> {
        match self {
            ScramVariant::Sha1 => Sha1::digest(data).to_vec(),
            ScramVariant::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}

/// Per-resource salt: SHA-256 of `<resource>-mongodbresource`, cut to the variant's salt size.
pub fn deterministic_salt(resource_name: &str, variant: ScramVariant) -> Vec<u8> {
    let digest = Sha256::digest(format!("{resource_name}-mongodbresource").as_bytes());
    digest[..variant.salt_size()].to_vec()
}

/// Legacy clients authenticate with `hex(md5(user:mongo:password))`.
pub fn legacy_password_digest(username: &str, password: &str) -> String {
    hex::encode(Md5::digest(format!("{username}:mongo:{password}").as_bytes()))
}

/// Derives the credentials stored for `username` under `variant`.
pub fn compute_credentials(
    username: &str,
    password: &str,
    salt: &[u8],
    variant: ScramVariant,
) -> Result<ScramCredentials, AuthError> {
    if salt.len() != variant.salt_size() {
        return Err(AuthError::InvalidSaltLength {
            mechanism: variant.as_str(),
            expected: variant.salt_size(),
            actual: salt.len(),
        });
    }
    let password = match variant {
        ScramVariant::Sha1 => legacy_password_digest(username, password),
        ScramVariant::Sha256 => password.to_string(),
    };
    derive_keys(variant, &password, salt, variant.iterations())
}

/// Stored and server keys for an already prepared password.
///
/// The SHA-1 variant expects the legacy digest as `password`. The salt is
/// used as given, whatever its length.
pub fn derive_keys(
    variant: ScramVariant,
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<ScramCredentials, AuthError> {
    let prepared = stringprep::saslprep(password).map_err(|err| AuthError::SaslPrep {
        reason: err.to_string(),
    })?;
    let salted = salted_password(variant, prepared.as_bytes(), salt, iterations)?;
    let client_key = variant.hmac(&salted, CLIENT_KEY)?;
    let stored_key = variant.hash(&client_key);
    let server_key = variant.hmac(&salted, SERVER_KEY)?;
    Ok(ScramCredentials {
        iteration_count: iterations,
        salt: general_purpose::STANDARD.encode(salt),
        server_key: general_purpose::STANDARD.encode(server_key),
        stored_key: general_purpose::STANDARD.encode(stored_key),
    })
}

/// `Hi(password, salt, i)`: iterated HMAC over `salt || INT(1)`, XOR-folded.
pub fn salted_password(
    variant: ScramVariant,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Vec<u8>, AuthError> {
    let mut block = Vec::with_capacity(salt.len() + RFC5802_MANDATED_SALT_SIZE);
    block.extend_from_slice(salt);
    block.extend_from_slice(&1u32.to_be_bytes());

    let mut previous = variant.hmac(password, &block)?;
    let mut result = previous.clone();
    for _ in 1..iterations {
        previous = variant.hmac(password, &previous)?;
        for (acc, byte) in result.iter_mut().zip(&previous) {
            *acc ^= byte;
        }
    }
    Ok(result)
}
