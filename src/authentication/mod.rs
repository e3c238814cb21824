//! Installs authentication mechanisms, agent identity and users into a document.
//!
//! [`enable`] works on a copy of the document and hands back a new value, so
//! a failure at any step leaves the caller's document untouched.

use crate::automation_config::{Auth, AutomationConfig, AutomationUser, DeletedUser, Role};
use crate::kubernetes::ClientError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

pub mod credentials;
pub mod scram;
pub mod x509;

use credentials::{validate_keyfile_contents, ScramCredentialSet};
use scram::{compute_credentials, deterministic_salt, ScramVariant};

/// Database holding users authenticated outside the deployment.
pub const EXTERNAL_DB: &str = "$external";
/// Principal the automation agent authenticates as.
pub const AGENT_NAME: &str = "mms-automation";
pub const AGENT_KEYFILE_PATH: &str = "/var/lib/mongodb-mms-automation/authentication/keyfile";
pub const AGENT_KEYFILE_PATH_WINDOWS: &str = "%SystemDrive%\\MMSAutomation\\versions\\keyfile";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{mechanism} salt must be {expected} bytes, got {actual}")]
    InvalidSaltLength {
        mechanism: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("password normalization failed: {reason}")]
    SaslPrep { reason: String },
    #[error("HMAC initialisation failed: {reason}")]
    Hmac { reason: String },
    #[error("could not parse certificate: {reason}")]
    CertificateParse { reason: String },
    #[error("agent subject {subject} is not a valid subject")]
    InvalidSubject { subject: String },
    #[error("agent certificate is required for X.509 agent authentication")]
    MissingAgentCertificate,
    #[error("agent name must not be empty")]
    MissingAgentName,
    #[error("agent password must not be empty")]
    MissingAgentPassword,
    #[error("keyfile contents must be between 6 and 1024 characters, got {length}")]
    InvalidKeyfile { length: usize },
    #[error("at least one authentication mechanism must be specified")]
    NoMechanisms,
    #[error("agent mechanism {mechanism} is not among the enabled mechanisms")]
    AgentMechanismNotEnabled { mechanism: AuthMechanism },
    #[error("unsupported authentication mechanism {name}")]
    UnsupportedMechanism { name: String },
    #[error("credentials secret {secret} is malformed: {reason}")]
    MalformedCredentials { secret: String, reason: String },
    #[error("secret {secret} has no key {key}")]
    MissingSecretKey { secret: String, key: String },
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Mechanisms the enabler knows how to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuthMechanism {
    ScramSha256,
    ScramSha1,
    X509,
}

impl AuthMechanism {
    /// User-facing name.
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMechanism::ScramSha256 => "SCRAM-SHA-256",
            AuthMechanism::ScramSha1 => "SCRAM-SHA-1",
            AuthMechanism::X509 => "X509",
        }
    }

    /// Name recorded in the automation config.
    pub fn automation_name(self) -> &'static str {
        match self {
            AuthMechanism::ScramSha256 => "SCRAM-SHA-256",
            AuthMechanism::ScramSha1 => "MONGODB-CR",
            AuthMechanism::X509 => "MONGODB-X509",
        }
    }

    pub fn scram_variant(self) -> Option<ScramVariant> {
        match self {
            AuthMechanism::ScramSha256 => Some(ScramVariant::Sha256),
            AuthMechanism::ScramSha1 => Some(ScramVariant::Sha1),
            AuthMechanism::X509 => None,
        }
    }

    pub fn is_scram(self) -> bool {
        self.scram_variant().is_some()
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMechanism {
    type Err = AuthError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "SCRAM" | "SCRAM-SHA-256" => Ok(AuthMechanism::ScramSha256),
            "SCRAM-SHA-1" | "MONGODB-CR" => Ok(AuthMechanism::ScramSha1),
            "X509" | "MONGODB-X509" => Ok(AuthMechanism::X509),
            other => Err(AuthError::UnsupportedMechanism {
                name: other.to_string(),
            }),
        }
    }
}

/// Deployment-wide authentication settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOptions {
    /// Mechanisms clients may use, in the order they are recorded.
    pub mechanisms: Vec<AuthMechanism>,
    /// Mechanism the agent itself authenticates with.
    pub agent_mechanism: AuthMechanism,
    pub agent_name: String,
    /// Supplied by the caller; the enabler never generates it.
    pub agent_password: String,
    pub keyfile_contents: String,
    pub keyfile_path: String,
    pub authoritative_set: bool,
    /// Seeds the deterministic salts.
    pub resource_name: String,
    pub agent_certificate_pem: Option<String>,
}

impl AuthOptions {
    /// Options for `mechanisms`, the first one doubling as the agent mechanism.
    pub fn new(resource_name: impl Into<String>, mechanisms: Vec<AuthMechanism>) -> Self {
        Self {
            agent_mechanism: mechanisms
                .first()
                .copied()
                .unwrap_or(AuthMechanism::ScramSha256),
            mechanisms,
            agent_name: AGENT_NAME.to_string(),
            agent_password: String::new(),
            keyfile_contents: String::new(),
            keyfile_path: AGENT_KEYFILE_PATH.to_string(),
            authoritative_set: true,
            resource_name: resource_name.into(),
            agent_certificate_pem: None,
        }
    }

    fn validate(&self) -> Result<(), AuthError> {
        if self.mechanisms.is_empty() {
            return Err(AuthError::NoMechanisms);
        }
        if !self.mechanisms.contains(&self.agent_mechanism) {
            return Err(AuthError::AgentMechanismNotEnabled {
                mechanism: self.agent_mechanism,
            });
        }
        if self.agent_mechanism.is_scram() {
            if self.agent_name.is_empty() {
                return Err(AuthError::MissingAgentName);
            }
            if self.agent_password.is_empty() {
                return Err(AuthError::MissingAgentPassword);
            }
        }
        validate_keyfile_contents(&self.keyfile_contents)
    }

    /// Requested mechanisms without repeats, first occurrence wins.
    fn distinct_mechanisms(&self) -> Vec<AuthMechanism> {
        let mut distinct = Vec::with_capacity(self.mechanisms.len());
        for mechanism in &self.mechanisms {
            if !distinct.contains(mechanism) {
                distinct.push(*mechanism);
            }
        }
        distinct
    }

    fn scram_variants(&self) -> Vec<ScramVariant> {
        self.distinct_mechanisms()
            .into_iter()
            .filter_map(AuthMechanism::scram_variant)
            .collect()
    }
}

/// Where a user's password material comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCredentials {
    /// Certificate users carry no password material.
    None,
    /// Derived here with the per-resource salts.
    Password(String),
    /// Already derived, installed as is.
    Derived(ScramCredentialSet),
}

/// User requested by the managed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSpec {
    pub username: String,
    pub database: String,
    pub roles: Vec<Role>,
    pub credentials: UserCredentials,
}

impl UserSpec {
    pub fn new(username: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            database: database.into(),
            roles: Vec::new(),
            credentials: UserCredentials::None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>, db: impl Into<String>) -> Self {
        self.roles.push(Role::new(role, db));
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.credentials = UserCredentials::Password(password.into());
        self
    }

    pub fn with_credentials(mut self, credentials: ScramCredentialSet) -> Self {
        self.credentials = UserCredentials::Derived(credentials);
        self
    }

    pub fn is_external(&self) -> bool {
        self.database == EXTERNAL_DB
    }

    fn automation_user(&self) -> AutomationUser {
        AutomationUser {
            username: self.username.clone(),
            database: self.database.clone(),
            roles: self.roles.clone(),
            authentication_restrictions: Vec::new(),
            mechanisms: Vec::new(),
            scram_sha1_creds: None,
            scram_sha256_creds: None,
        }
    }
}

/// Returns `config` with authentication switched off.
pub fn disable(config: &AutomationConfig) -> AutomationConfig {
    AutomationConfig {
        auth: Auth::disabled(),
        ..config.clone()
    }
}

/// Returns `config` with every requested mechanism installed. Safe to call
/// repeatedly: mechanisms and users are never duplicated.
pub fn enable(
    config: &AutomationConfig,
    users: &[UserSpec],
    options: &AuthOptions,
) -> Result<AutomationConfig, AuthError> {
    options.validate()?;
    let mut auth = config.auth.clone();
    auth.disabled = false;
    auth.authoritative_set = options.authoritative_set;

    let mut desired = Vec::new();
    let mut scram_installed = false;
    for mechanism in options.distinct_mechanisms() {
        match mechanism {
            AuthMechanism::ScramSha256 | AuthMechanism::ScramSha1 => {
                if !scram_installed {
                    desired.extend(enable_scram(&mut auth, users, options)?);
                    scram_installed = true;
                }
            }
            AuthMechanism::X509 => desired.extend(enable_x509(&mut auth, users, options)?),
        }
    }
    reconcile_users(&mut auth, desired);
    debug!(
        mechanisms = ?auth.deployment_auth_mechanisms,
        users = auth.users.len(),
        "authentication enabled"
    );
    Ok(AutomationConfig {
        auth,
        ..config.clone()
    })
}

fn install_keyfile(auth: &mut Auth, options: &AuthOptions) {
    auth.key_file = options.keyfile_path.clone();
    auth.key_file_windows = AGENT_KEYFILE_PATH_WINDOWS.to_string();
    auth.key = options.keyfile_contents.clone();
}

fn push_mechanism(auth: &mut Auth, mechanism: AuthMechanism) {
    let name = mechanism.automation_name();
    if !auth.deployment_auth_mechanisms.iter().any(|m| m == name) {
        auth.deployment_auth_mechanisms.push(name.to_string());
    }
}

fn enable_scram(
    auth: &mut Auth,
    users: &[UserSpec],
    options: &AuthOptions,
) -> Result<Vec<AutomationUser>, AuthError> {
    let variants = options.scram_variants();
    if options.agent_mechanism.is_scram() {
        install_keyfile(auth, options);
        auth.auto_auth_mechanisms = options
            .distinct_mechanisms()
            .into_iter()
            .filter(|mechanism| mechanism.is_scram())
            .map(|mechanism| mechanism.automation_name().to_string())
            .collect();
        auth.auto_user = options.agent_name.clone();
        auth.auto_auth_mechanism = options.agent_mechanism.automation_name().to_string();
        auth.auto_pwd = options.agent_password.clone();
    }
    for mechanism in options.distinct_mechanisms() {
        if mechanism.is_scram() {
            push_mechanism(auth, mechanism);
        }
    }

    let mut converted = Vec::new();
    for user in users.iter().filter(|user| !user.is_external()) {
        let mut automation_user = user.automation_user();
        for variant in &variants {
            let credentials = match &user.credentials {
                UserCredentials::Derived(set) => set.for_variant(*variant).clone(),
                UserCredentials::Password(password) => compute_credentials(
                    &user.username,
                    password,
                    &deterministic_salt(&options.resource_name, *variant),
                    *variant,
                )?,
                UserCredentials::None => continue,
            };
            match variant {
                ScramVariant::Sha1 => automation_user.scram_sha1_creds = Some(credentials),
                ScramVariant::Sha256 => automation_user.scram_sha256_creds = Some(credentials),
            }
        }
        converted.push(automation_user);
    }
    Ok(converted)
}

fn enable_x509(
    auth: &mut Auth,
    users: &[UserSpec],
    options: &AuthOptions,
) -> Result<Vec<AutomationUser>, AuthError> {
    if options.agent_mechanism == AuthMechanism::X509 {
        let pem = options
            .agent_certificate_pem
            .as_deref()
            .ok_or(AuthError::MissingAgentCertificate)?;
        let subject = x509::subject_from_pem(pem)?;
        if !x509::is_valid_subject(&subject) {
            return Err(AuthError::InvalidSubject { subject });
        }
        install_keyfile(auth, options);
        auth.auto_auth_mechanisms = vec![AuthMechanism::X509.automation_name().to_string()];
        auth.auto_user = subject;
        auth.auto_auth_mechanism = AuthMechanism::X509.automation_name().to_string();
        auth.auto_pwd = String::new();
    }
    push_mechanism(auth, AuthMechanism::X509);
    Ok(users
        .iter()
        .filter(|user| user.is_external())
        .map(UserSpec::automation_user)
        .collect())
}

/// Replaces the user list with `desired`, keeping surviving users in place.
/// Dropped users are recorded for deletion when the set is authoritative.
fn reconcile_users(auth: &mut Auth, desired: Vec<AutomationUser>) {
    let same = |a: &AutomationUser, b: &AutomationUser| {
        a.username == b.username && a.database == b.database
    };
    let previous = std::mem::take(&mut auth.users);
    let mut users: Vec<AutomationUser> = Vec::with_capacity(desired.len());
    let mut removed = Vec::new();
    for user in previous {
        match desired.iter().find(|wanted| same(wanted, &user)) {
            Some(wanted) => {
                if !users.iter().any(|kept| same(kept, wanted)) {
                    users.push(wanted.clone());
                }
            }
            None => removed.push(user),
        }
    }
    for wanted in desired {
        if !users.iter().any(|kept| same(kept, &wanted)) {
            users.push(wanted);
        }
    }

    if auth.authoritative_set {
        for user in removed {
            match auth
                .users_deleted
                .iter_mut()
                .find(|deleted| deleted.user == user.username)
            {
                Some(deleted) => {
                    if !deleted.dbs.contains(&user.database) {
                        deleted.dbs.push(user.database);
                    }
                }
                None => auth.users_deleted.push(DeletedUser {
                    user: user.username,
                    dbs: vec![user.database],
                }),
            }
        }
    }
    for deleted in &mut auth.users_deleted {
        deleted.dbs.retain(|db| {
            !users
                .iter()
                .any(|user| user.username == deleted.user && &user.database == db)
        });
    }
    auth.users_deleted.retain(|deleted| !deleted.dbs.is_empty());
    auth.users = users;
}
