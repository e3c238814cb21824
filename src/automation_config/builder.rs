use super::cache::wired_tiger_cache_gb;
use super::{
    Auth, AutomationConfig, Net, Process, ProcessArgs, ProcessType, ReplicaSet, ReplicaSetMember,
    Replication, Storage, SystemLog, Tls, AUTH_SCHEMA_VERSION, DEFAULT_CLUSTER_DOMAIN,
    DEFAULT_PORT, REPLICA_SET_PROTOCOL_VERSION,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Hook run against every generated process, in registration order.
pub type ProcessModification = Arc<dyn Fn(usize, &mut Process) + Send + Sync>;

/// Error raised when the requested topology cannot be turned into a document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("replica set name must not be empty")]
    EmptyName,
    #[error("member count must not be negative, got {members}")]
    NegativeMembers { members: i32 },
    #[error("arbiter count {arbiters} must be between 0 and the member count {members} (exclusive)")]
    InvalidArbiters { arbiters: i32, members: i32 },
    #[error("process {name} appears more than once")]
    DuplicateProcess { name: String },
    #[error("replica set {replica_set} references unknown process {host}")]
    UnknownMember { replica_set: String, host: String },
}

/// Desired replica-set shape handed to [`ReplicaSetTopology::build`].
#[derive(Clone)]
pub struct ReplicaSetTopology {
    pub name: String,
    pub namespace: String,
    pub service_name: String,
    pub cluster_domain: String,
    pub members: i32,
    pub arbiters: i32,
    pub version: String,
    /// Defaults to `<major>.<minor>` of `version`.
    pub feature_compatibility_version: Option<String>,
    pub port: u16,
    pub memory_limit_bytes: Option<u64>,
    pub tls: Option<Tls>,
    pub auth: Auth,
    /// Previously persisted document; its version seeds the new one.
    pub previous: Option<AutomationConfig>,
    pub process_modifications: Vec<ProcessModification>,
}

impl fmt::Debug for ReplicaSetTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaSetTopology")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("service_name", &self.service_name)
            .field("cluster_domain", &self.cluster_domain)
            .field("members", &self.members)
            .field("arbiters", &self.arbiters)
            .field("version", &self.version)
            .field("port", &self.port)
            .field("memory_limit_bytes", &self.memory_limit_bytes)
            .field("process_modifications", &self.process_modifications.len())
            .finish_non_exhaustive()
    }
}

impl ReplicaSetTopology {
    /// Topology with the default port, cluster domain and `<name>-svc` service.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        members: i32,
        version: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            service_name: format!("{name}-svc"),
            name,
            namespace: namespace.into(),
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
            members,
            arbiters: 0,
            version: version.into(),
            feature_compatibility_version: None,
            port: DEFAULT_PORT,
            memory_limit_bytes: None,
            tls: None,
            auth: Auth::disabled(),
            previous: None,
            process_modifications: Vec::new(),
        }
    }

    pub fn with_process_modification(
        mut self,
        modification: impl Fn(usize, &mut Process) + Send + Sync + 'static,
    ) -> Self {
        self.process_modifications.push(Arc::new(modification));
        self
    }

    /// Checks the inputs without building anything.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.name.is_empty() {
            return Err(BuildError::EmptyName);
        }
        if self.members < 0 {
            return Err(BuildError::NegativeMembers {
                members: self.members,
            });
        }
        if self.arbiters < 0 || (self.arbiters > 0 && self.arbiters >= self.members) {
            return Err(BuildError::InvalidArbiters {
                arbiters: self.arbiters,
                members: self.members,
            });
        }
        Ok(())
    }

    pub fn member_names(&self) -> Vec<String> {
        (0..self.members.max(0))
            .map(|ordinal| member_name(&self.name, ordinal as usize))
            .collect()
    }

    pub fn arbiter_names(&self) -> Vec<String> {
        (0..self.arbiters.max(0))
            .map(|ordinal| arbiter_name(&self.name, ordinal as usize))
            .collect()
    }

    /// Fully qualified hostname for a pod of this replica set.
    pub fn hostname(&self, pod_name: &str) -> String {
        format!(
            "{pod_name}.{}.{}.svc.{}",
            self.service_name, self.namespace, self.cluster_domain
        )
    }

    /// Member hostnames in ordinal order, arbiters excluded.
    pub fn member_hostnames(&self) -> Vec<String> {
        self.member_names()
            .iter()
            .map(|name| self.hostname(name))
            .collect()
    }

    /// `mongodb://` URI listing every data-bearing member.
    pub fn connection_uri(&self) -> String {
        let hosts: Vec<String> = self
            .member_hostnames()
            .into_iter()
            .map(|host| format!("{host}:{}", self.port))
            .collect();
        format!("mongodb://{}/?replicaSet={}", hosts.join(","), self.name)
    }

    /// `mongodb+srv://` URI resolving through the governing service.
    pub fn srv_uri(&self) -> String {
        format!("mongodb+srv://{}", self.service_host())
    }

    /// Standard URI carrying a user's credentials.
    pub fn user_uri(&self, username: &str, password: &str, database: &str) -> String {
        let hosts: Vec<String> = self
            .member_hostnames()
            .into_iter()
            .map(|host| format!("{host}:{}", self.port))
            .collect();
        format!(
            "mongodb://{}:{}@{}/{database}?ssl={}",
            query_escape(username),
            query_escape(password),
            hosts.join(","),
            self.tls.is_some()
        )
    }

    /// SRV URI carrying a user's credentials.
    pub fn user_srv_uri(&self, username: &str, password: &str, database: &str) -> String {
        format!(
            "mongodb+srv://{}:{}@{}/{database}?ssl={}",
            query_escape(username),
            query_escape(password),
            self.service_host(),
            self.tls.is_some()
        )
    }

    fn service_host(&self) -> String {
        format!(
            "{}.{}.svc.{}",
            self.service_name, self.namespace, self.cluster_domain
        )
    }

    /// Builds the document. Nothing is returned on error.
    pub fn build(&self) -> Result<AutomationConfig, BuildError> {
        self.validate()?;
        let cache_size_gb = wired_tiger_cache_gb(&self.version, self.memory_limit_bytes);
        let fcv = self
            .feature_compatibility_version
            .clone()
            .unwrap_or_else(|| major_minor(&self.version));

        let names: Vec<String> = self
            .member_names()
            .into_iter()
            .chain(self.arbiter_names())
            .collect();
        let mut processes = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let mut process = Process {
                name: name.clone(),
                hostname: self.hostname(name),
                args: ProcessArgs {
                    net: Net {
                        port: self.port,
                        tls: self.tls.clone(),
                    },
                    storage: Storage::default(),
                    replication: Replication {
                        repl_set_name: self.name.clone(),
                    },
                },
                feature_compatibility_version: fcv.clone(),
                process_type: ProcessType::Mongod,
                version: self.version.clone(),
                auth_schema_version: AUTH_SCHEMA_VERSION,
                system_log: SystemLog::default(),
                disabled: false,
                log_rotate: None,
            };
            if let Some(cache_size_gb) = cache_size_gb {
                process.set_cache_size_gb(cache_size_gb);
            }
            for modification in &self.process_modifications {
                modification(index, &mut process);
            }
            processes.push(process);
        }

        let members = self.members as usize;
        let replica_set = ReplicaSet {
            id: self.name.clone(),
            members: names
                .iter()
                .enumerate()
                .map(|(index, name)| {
                    let arbiter = index >= members;
                    ReplicaSetMember {
                        id: index as u32,
                        host: name.clone(),
                        priority: if arbiter { 0.0 } else { 1.0 },
                        arbiter_only: arbiter,
                        votes: if arbiter { 0 } else { 1 },
                    }
                })
                .collect(),
            protocol_version: REPLICA_SET_PROTOCOL_VERSION.to_string(),
        };

        let config = AutomationConfig {
            version: 0,
            processes,
            replica_sets: vec![replica_set],
            auth: self.auth.clone(),
            monitoring_versions: Vec::new(),
        };
        config.check_references()?;
        let config = config.versioned_after(self.previous.as_ref());
        debug!(
            replica_set = %self.name,
            version = config.version,
            "built automation config"
        );
        Ok(config)
    }
}

/// `<name>-<ordinal>`
pub fn member_name(name: &str, ordinal: usize) -> String {
    format!("{name}-{ordinal}")
}

/// `<name>-arb-<ordinal>`
pub fn arbiter_name(name: &str, ordinal: usize) -> String {
    format!("{name}-arb-{ordinal}")
}

/// Form-style escaping for URI user info: unreserved bytes pass, space becomes `+`.
pub fn query_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                escaped.push(byte as char)
            }
            b' ' => escaped.push('+'),
            other => escaped.push_str(&format!("%{other:02X}")),
        }
    }
    escaped
}

fn major_minor(version: &str) -> String {
    match semver::Version::parse(version) {
        Ok(parsed) => format!("{}.{}", parsed.major, parsed.minor),
        Err(_) => version.splitn(3, '.').take(2).collect::<Vec<_>>().join("."),
    }
}

/// Number of members to run this pass so that scaling moves one member at a time.
pub fn replicas_this_reconciliation(current: i32, desired: i32) -> i32 {
    if current == 0 || current == desired {
        desired
    } else if current > desired {
        current - 1
    } else {
        current + 1
    }
}

pub fn is_still_scaling(current: i32, desired: i32) -> bool {
    replicas_this_reconciliation(current, desired) != desired
}
