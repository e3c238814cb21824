//! Convergence checks against the config version each agent reports.

use crate::automation_config::builder::{arbiter_name, member_name};
use crate::kubernetes::{ClientError, Pod, PodClient};
use serde::Serialize;
use tracing::{debug, info};

/// Pod annotation carrying the config version the agent has applied.
pub const AGENT_VERSION_ANNOTATION: &str = "agent.mongodb.com/version";

/// Observed state of one replica-set pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodState {
    pub pod_name: String,
    pub found: bool,
    pub reached_goal_state: bool,
    pub is_arbiter: bool,
}

impl PodState {
    pub fn new(pod_name: impl Into<String>, found: bool, reached_goal_state: bool) -> Self {
        Self {
            pod_name: pod_name.into(),
            found,
            reached_goal_state,
            is_arbiter: false,
        }
    }
}

/// Reads pod annotations to decide whether agents have converged.
pub struct GoalStateTracker;

impl GoalStateTracker {
    /// States of `<name>-<i>` members followed by `<name>-arb-<i>` arbiters.
    pub fn pod_states<C: PodClient + ?Sized>(
        client: &C,
        namespace: &str,
        name: &str,
        members: usize,
        arbiters: usize,
        target_version: u64,
    ) -> Result<Vec<PodState>, ClientError> {
        let member_pods = (0..members).map(|ordinal| (member_name(name, ordinal), false));
        let arbiter_pods = (0..arbiters).map(|ordinal| (arbiter_name(name, ordinal), true));
        member_pods
            .chain(arbiter_pods)
            .map(|(pod_name, is_arbiter)| {
                let (found, reached_goal_state) = match client.get_pod(namespace, &pod_name) {
                    Ok(pod) => (true, Self::reached_goal_state(&pod, target_version)),
                    Err(err) if err.is_not_found() => (false, false),
                    Err(err) => return Err(err),
                };
                Ok(PodState {
                    pod_name,
                    found,
                    reached_goal_state,
                    is_arbiter,
                })
            })
            .collect()
    }

    /// True when every expected member runs `target_version`, or when none
    /// of them exist yet.
    pub fn all_reached_goal_state<C: PodClient + ?Sized>(
        client: &C,
        namespace: &str,
        name: &str,
        members: usize,
        target_version: u64,
    ) -> Result<bool, ClientError> {
        let states = Self::pod_states(client, namespace, name, members, 0, target_version)?;
        let mut missing = Vec::new();
        for state in &states {
            if !state.found {
                missing.push(state.pod_name.as_str());
            } else if !state.reached_goal_state {
                return Ok(false);
            }
        }
        if missing.len() == members {
            return Ok(true);
        }
        if !missing.is_empty() {
            info!(
                pods = ?missing,
                "pods do not exist yet, assuming they will be rescheduled"
            );
            return Ok(false);
        }
        info!(members, target_version, "all agents reached goal state");
        Ok(true)
    }

    /// Whether the pod's agent reports `target_version`.
    pub fn reached_goal_state(pod: &Pod, target_version: u64) -> bool {
        let Some(current) = pod.annotations.get(AGENT_VERSION_ANNOTATION) else {
            debug!(pod = %pod.name, "agent version annotation not present yet");
            return false;
        };
        if current.trim().parse::<u64>().ok() != Some(target_version) {
            debug!(
                pod = %pod.name,
                goal = target_version,
                agent = %current,
                "agent has not reached goal state"
            );
            return false;
        }
        true
    }
}
