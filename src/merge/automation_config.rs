use crate::automation_config::{AutomationConfig, LogRotate};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Mutable subset of a process that users may override.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessOverride {
    pub name: String,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_rotate: Option<LogRotate>,
}

/// User-supplied override document. Unknown fields are ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomationConfigOverride {
    pub processes: Vec<ProcessOverride>,
}

impl From<&AutomationConfig> for AutomationConfigOverride {
    fn from(config: &AutomationConfig) -> Self {
        Self {
            processes: config
                .processes
                .iter()
                .map(|process| ProcessOverride {
                    name: process.name.clone(),
                    disabled: process.disabled,
                    log_rotate: process.log_rotate.clone(),
                })
                .collect(),
        }
    }
}

/// Applies process overrides by name. Overrides naming no existing process
/// are skipped.
pub fn merge_automation_configs(
    original: &AutomationConfig,
    overrides: &AutomationConfigOverride,
) -> AutomationConfig {
    let mut merged = original.clone();
    for process_override in &overrides.processes {
        match merged.process_mut(&process_override.name) {
            Some(process) => {
                process.disabled = process_override.disabled;
                if let Some(log_rotate) = &process_override.log_rotate {
                    process.log_rotate = Some(log_rotate.clone());
                }
            }
            None => warn!(
                process = %process_override.name,
                "override names an unknown process, ignoring"
            ),
        }
    }
    merged
}
