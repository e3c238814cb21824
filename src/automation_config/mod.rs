//! Declarative configuration document consumed by the automation agents.
//!
//! Field names mirror the agent's JSON keys exactly; the agent is
//! case-sensitive and ignores anything it does not recognise.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub mod builder;
pub mod cache;
pub mod store;

pub use builder::{BuildError, ProcessModification, ReplicaSetTopology};

/// Port a process listens on unless the topology says otherwise.
pub const DEFAULT_PORT: u16 = 27017;
/// Cluster DNS suffix used when none is configured.
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";
pub const DEFAULT_DB_PATH: &str = "/data";
pub const DEFAULT_LOG_PATH: &str = "/var/log/mongodb-mms-automation/mongodb.log";
pub const AUTH_SCHEMA_VERSION: u32 = 5;
pub const REPLICA_SET_PROTOCOL_VERSION: &str = "1";
/// Mechanism recorded for a deployment with authentication switched off.
pub const DISABLED_AUTH_MECHANISM: &str = "MONGODB-CR";

/// Versioned root document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationConfig {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub processes: Vec<Process>,
    #[serde(default)]
    pub replica_sets: Vec<ReplicaSet>,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monitoring_versions: Vec<MonitoringVersion>,
}

impl AutomationConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn process(&self, name: &str) -> Option<&Process> {
        self.processes.iter().find(|process| process.name == name)
    }

    pub fn process_mut(&mut self, name: &str) -> Option<&mut Process> {
        self.processes.iter_mut().find(|process| process.name == name)
    }

    /// Compares everything except `version`.
    pub fn content_equals(&self, other: &AutomationConfig) -> bool {
        self.processes == other.processes
            && self.replica_sets == other.replica_sets
            && self.auth == other.auth
            && self.monitoring_versions == other.monitoring_versions
    }

    /// Returns `self` stamped with the version that should follow `previous`.
    /// A first document starts at version 1.
    pub fn versioned_after(mut self, previous: Option<&AutomationConfig>) -> Self {
        self.version = match previous {
            None => 1,
            Some(previous) if self.content_equals(previous) => previous.version,
            Some(previous) => previous.version + 1,
        };
        self
    }

    /// Checks that process names are unique and every replica-set member
    /// points at a known process.
    pub fn check_references(&self) -> Result<(), BuildError> {
        let mut names = BTreeSet::new();
        for process in &self.processes {
            if !names.insert(process.name.as_str()) {
                return Err(BuildError::DuplicateProcess {
                    name: process.name.clone(),
                });
            }
        }
        for replica_set in &self.replica_sets {
            for member in &replica_set.members {
                if !names.contains(member.host.as_str()) {
                    return Err(BuildError::UnknownMember {
                        replica_set: replica_set.id.clone(),
                        host: member.host.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// One database member as seen by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub name: String,
    pub hostname: String,
    #[serde(rename = "args2_6")]
    pub args: ProcessArgs,
    #[serde(default)]
    pub feature_compatibility_version: String,
    #[serde(default)]
    pub process_type: ProcessType,
    pub version: String,
    #[serde(default = "default_auth_schema_version")]
    pub auth_schema_version: u32,
    #[serde(default)]
    pub system_log: SystemLog,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_rotate: Option<LogRotate>,
}

fn default_auth_schema_version() -> u32 {
    AUTH_SCHEMA_VERSION
}

impl Process {
    pub fn port(&self) -> u16 {
        self.args.net.port
    }

    pub fn set_port(&mut self, port: u16) {
        self.args.net.port = port;
    }

    pub fn cache_size_gb(&self) -> Option<f32> {
        self.args
            .storage
            .wired_tiger
            .as_ref()
            .map(|wired_tiger| wired_tiger.engine_config.cache_size_gb)
    }

    pub fn set_cache_size_gb(&mut self, cache_size_gb: f32) {
        self.args.storage.wired_tiger = Some(WiredTiger {
            engine_config: EngineConfig { cache_size_gb },
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    #[default]
    Mongod,
    Mongos,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessArgs {
    #[serde(default)]
    pub net: Net,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub replication: Replication,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Net {
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<Tls>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tls {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    pub db_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wired_tiger: Option<WiredTiger>,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            wired_tiger: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WiredTiger {
    pub engine_config: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(rename = "cacheSizeGB")]
    pub cache_size_gb: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replication {
    #[serde(default)]
    pub repl_set_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLog {
    pub destination: String,
    pub path: String,
}

impl Default for SystemLog {
    fn default() -> Self {
        Self {
            destination: "file".to_string(),
            path: DEFAULT_LOG_PATH.to_string(),
        }
    }
}

/// Log-rotation policy applied by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogRotate {
    #[serde(rename = "sizeThresholdMB")]
    pub size_threshold_mb: u32,
    #[serde(rename = "timeThresholdHrs")]
    pub time_threshold_hrs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSet {
    #[serde(rename = "_id")]
    pub id: String,
    pub members: Vec<ReplicaSetMember>,
    pub protocol_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSetMember {
    #[serde(rename = "_id")]
    pub id: u32,
    pub host: String,
    pub priority: f32,
    pub arbiter_only: bool,
    pub votes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringVersion {
    pub name: String,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Authentication block of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Auth {
    #[serde(rename = "usersWanted")]
    pub users: Vec<AutomationUser>,
    pub disabled: bool,
    pub authoritative_set: bool,
    pub auto_auth_mechanisms: Vec<String>,
    pub auto_auth_mechanism: String,
    pub deployment_auth_mechanisms: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auto_user: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(rename = "keyfile", skip_serializing_if = "String::is_empty")]
    pub key_file: String,
    #[serde(rename = "keyfileWindows", skip_serializing_if = "String::is_empty")]
    pub key_file_windows: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auto_pwd: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users_deleted: Vec<DeletedUser>,
}

impl Auth {
    /// Auth block of a deployment that does not require credentials.
    pub fn disabled() -> Self {
        Self {
            users: Vec::new(),
            disabled: true,
            authoritative_set: false,
            auto_auth_mechanisms: Vec::new(),
            auto_auth_mechanism: DISABLED_AUTH_MECHANISM.to_string(),
            deployment_auth_mechanisms: Vec::new(),
            auto_user: String::new(),
            key: String::new(),
            key_file: String::new(),
            key_file_windows: String::new(),
            auto_pwd: String::new(),
            users_deleted: Vec::new(),
        }
    }

    pub fn user(&self, username: &str, database: &str) -> Option<&AutomationUser> {
        self.users
            .iter()
            .find(|user| user.username == username && user.database == database)
    }
}

impl Default for Auth {
    fn default() -> Self {
        Self::disabled()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationUser {
    #[serde(rename = "user")]
    pub username: String,
    #[serde(rename = "db")]
    pub database: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub authentication_restrictions: Vec<String>,
    #[serde(default)]
    pub mechanisms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scram_sha1_creds: Option<ScramCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scram_sha256_creds: Option<ScramCredentials>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Role {
    pub role: String,
    pub db: String,
}

impl Role {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: db.into(),
        }
    }
}

/// Password-derived material for one SCRAM variant. Binary fields are base64.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScramCredentials {
    pub iteration_count: u32,
    pub salt: String,
    pub server_key: String,
    pub stored_key: String,
}

/// User that must be dropped from the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeletedUser {
    pub user: String,
    pub dbs: Vec<String>,
}
