//! Automation agent surfaces: launcher flags and the health status file.

use crate::resources::EnvVar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Env var the agent launcher reads extra flags from.
pub const AGENT_FLAGS_ENV: &str = "AGENT_FLAGS";
/// Move recorded in a plan while the database version changes.
pub const CHANGE_VERSION_MOVE: &str = "ChangeVersion";
/// Step after which the database process is down and the pod may go.
pub const STOP_STEP: &str = "Stop";
pub const SUCCESS_RESULT: &str = "success";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupParameter {
    pub key: String,
    pub value: String,
}

impl StartupParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// `" -key value"` per parameter, concatenated; empty for no parameters.
pub fn agent_flags(parameters: &[StartupParameter]) -> String {
    parameters
        .iter()
        .map(|parameter| format!(" -{} {}", parameter.key, parameter.value))
        .collect()
}

pub fn agent_flags_env(parameters: &[StartupParameter]) -> EnvVar {
    EnvVar::new(AGENT_FLAGS_ENV, agent_flags(parameters))
}

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("health status is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("host {hostname} is not present in the process plans")]
    UnknownHost { hostname: String },
    #[error("there is no information about agent process plans")]
    NoProcessStatus,
    #[error("only one process status is expected but got {count}")]
    MultipleProcessStatuses { count: usize },
    #[error("the process {process} doesn't contain any plans")]
    NoPlans { process: String },
    #[error("the agent hasn't reported working on the new config yet, the last plan finished at {completed}")]
    PlanCompleted { process: String, completed: String },
    #[error("no step of the last plan of {process} has started")]
    NoStartedStep { process: String },
}

/// Agent health status file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Health {
    #[serde(rename = "statuses", default)]
    pub healthiness: BTreeMap<String, ProcessHealth>,
    #[serde(rename = "mmsStatus", default)]
    pub process_plans: BTreeMap<String, MmsDirectorStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessHealth {
    #[serde(rename = "IsInGoalState")]
    pub is_in_goal_state: bool,
    #[serde(rename = "ExpectedToBeUp")]
    pub expected_to_be_up: bool,
    #[serde(rename = "LastMongoUpTime", default)]
    pub last_mongo_up_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MmsDirectorStatus {
    pub name: String,
    #[serde(rename = "lastGoalVersionAchieved", default)]
    pub last_goal_version_achieved: i64,
    #[serde(default)]
    pub plans: Vec<PlanStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanStatus {
    #[serde(default)]
    pub moves: Vec<MoveStatus>,
    pub started: Option<String>,
    pub completed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveStatus {
    #[serde(rename = "move")]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepStatus {
    pub step: String,
    pub started: Option<String>,
    pub completed: Option<String>,
    #[serde(default)]
    pub result: String,
}

impl StepStatus {
    pub fn succeeded(&self) -> bool {
        self.completed.is_some() && self.result == SUCCESS_RESULT
    }
}

impl Health {
    pub fn from_json(raw: &str) -> Result<Self, HealthError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Whether the pod hosting `hostname` should be deleted to finish a version change.
    pub fn should_delete_pod(&self, hostname: &str) -> Result<bool, HealthError> {
        self.process_plans
            .get(hostname)
            .map(MmsDirectorStatus::is_changing_version)
            .ok_or_else(|| HealthError::UnknownHost {
                hostname: hostname.to_string(),
            })
    }

    /// Current step of the single process an agent manages.
    pub fn current_step(&self) -> Result<(&MoveStatus, &StepStatus), HealthError> {
        let mut statuses = self.process_plans.values();
        match (statuses.next(), self.process_plans.len()) {
            (None, _) => Err(HealthError::NoProcessStatus),
            (Some(status), 1) => status.current_step(),
            (Some(_), count) => Err(HealthError::MultipleProcessStatuses { count }),
        }
    }
}

impl MmsDirectorStatus {
    /// True when the latest plan changes version and its `Stop` step succeeded.
    pub fn is_changing_version(&self) -> bool {
        let Some(plan) = self.plans.last() else {
            return false;
        };
        plan.moves
            .iter()
            .filter(|m| m.name == CHANGE_VERSION_MOVE)
            .flat_map(|m| &m.steps)
            .any(|step| step.step == STOP_STEP && step.succeeded())
    }

    /// Step the agent is working on: the last started one of the latest plan,
    /// finished or not, with the move it belongs to.
    pub fn current_step(&self) -> Result<(&MoveStatus, &StepStatus), HealthError> {
        let plan = self.plans.last().ok_or_else(|| HealthError::NoPlans {
            process: self.name.clone(),
        })?;
        if let Some(completed) = &plan.completed {
            return Err(HealthError::PlanCompleted {
                process: self.name.clone(),
                completed: completed.clone(),
            });
        }
        plan.moves
            .iter()
            .flat_map(|m| m.steps.iter().map(move |step| (m, step)))
            .filter(|(_, step)| step.started.is_some())
            .last()
            .ok_or_else(|| HealthError::NoStartedStep {
                process: self.name.clone(),
            })
    }
}
