//! Desired-state synthesis and safe convergence for a replica-set database
//! operator: configuration document builder, authentication enabler, merge
//! engine, port migration and goal-state tracking.

pub mod agent;
pub mod authentication;
pub mod automation_config;
pub mod config;
pub mod goal_state;
pub mod kubernetes;
pub mod logging;
pub mod merge;
pub mod port_manager;
pub mod resources;

pub use agent::{
    agent_flags, agent_flags_env, Health, HealthError, MmsDirectorStatus, StartupParameter,
    AGENT_FLAGS_ENV,
};
pub use authentication::credentials::{
    connection_string_secret_name, ensure_connection_string_secret, ensure_scram_credentials,
    ensure_secret_with_key, generate_keyfile_contents, generate_password, read_secret_key,
    validate_keyfile_contents, ConnectionStringUser, ScramCredentialSet,
};
pub use authentication::scram::{
    compute_credentials, derive_keys, deterministic_salt, ScramVariant,
};
pub use authentication::{
    disable, enable, AuthError, AuthMechanism, AuthOptions, UserCredentials, UserSpec,
    AGENT_NAME, EXTERNAL_DB,
};
pub use automation_config::builder::{is_still_scaling, replicas_this_reconciliation};
pub use automation_config::cache::{parse_memory_quantity, wired_tiger_cache_gb};
pub use automation_config::store::{
    ensure_automation_config, read_automation_config, PersistOutcome, StoreError,
    AUTOMATION_CONFIG_KEY,
};
pub use automation_config::{
    Auth, AutomationConfig, AutomationUser, BuildError, LogRotate, Process, ReplicaSet,
    ReplicaSetTopology, Role, ScramCredentials,
};
pub use config::{ConfigError, OperatorConfig};
pub use goal_state::{GoalStateTracker, PodState, AGENT_VERSION_ANNOTATION};
pub use kubernetes::{ClientError, InMemoryClient, Pod, PodClient, Secret, SecretClient};
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use merge::{merge_automation_configs, AutomationConfigOverride, Merge, ProcessOverride};
pub use port_manager::{apply_port_map, PortAssignment, PortChange, PortMigrationManager};
