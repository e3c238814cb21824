//! Moves the replica set to a new listening port one member at a time.

use crate::automation_config::AutomationConfig;
use crate::goal_state::PodState;
use crate::resources::ServicePort;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Service port name for the settled (or old) port.
pub const SERVICE_PORT_NAME: &str = "mongodb";
/// Service port name for the port being migrated to.
pub const NEW_SERVICE_PORT_NAME: &str = "mongodb-new";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortChange {
    /// Every member already uses the expected port.
    None,
    /// A change is needed but some member has not converged yet.
    Pending,
    /// One member was moved to the expected port this pass.
    InProgress,
}

/// Per-pod ports for this pass, in pod order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAssignment {
    pub ports: Vec<(String, u16)>,
    pub change: PortChange,
    /// Port members are migrating away from; equals the expected port when idle.
    pub old_port: u16,
}

impl PortAssignment {
    pub fn port_of(&self, pod_name: &str) -> Option<u16> {
        self.ports
            .iter()
            .find(|(name, _)| name == pod_name)
            .map(|(_, port)| *port)
    }

    pub fn as_map(&self) -> BTreeMap<String, u16> {
        self.ports.iter().cloned().collect()
    }

    /// Returns `config` with each known process's port taken from this assignment.
    pub fn apply_to(&self, config: &AutomationConfig) -> AutomationConfig {
        apply_port_map(config, &self.as_map())
    }
}

/// Computes port assignments from the last persisted document.
#[derive(Debug, Clone)]
pub struct PortMigrationManager<'a> {
    expected_port: u16,
    pod_states: &'a [PodState],
    current: &'a AutomationConfig,
}

impl<'a> PortMigrationManager<'a> {
    pub fn new(expected_port: u16, pod_states: &'a [PodState], current: &'a AutomationConfig) -> Self {
        Self {
            expected_port,
            pod_states,
            current,
        }
    }

    /// At most one member changes port per call.
    pub fn compute_target_ports(&self) -> PortAssignment {
        let mut ports: Vec<(String, u16)> = self
            .pod_states
            .iter()
            .map(|state| {
                let port = match self.current.process(&state.pod_name) {
                    Some(process) if process.port() != 0 => process.port(),
                    _ => self.expected_port,
                };
                (state.pod_name.clone(), port)
            })
            .collect();

        let Some(old_port) = ports
            .iter()
            .map(|(_, port)| *port)
            .find(|port| *port != self.expected_port)
        else {
            debug!(port = self.expected_port, "no port change required");
            return PortAssignment {
                ports,
                change: PortChange::None,
                old_port: self.expected_port,
            };
        };

        if let Some(lagging) = self
            .pod_states
            .iter()
            .find(|state| state.found && !state.reached_goal_state)
        {
            info!(
                pod = %lagging.pod_name,
                "port change required but not all pods reached goal state"
            );
            return PortAssignment {
                ports,
                change: PortChange::Pending,
                old_port,
            };
        }

        if let Some((name, port)) = ports
            .iter_mut()
            .find(|(_, port)| *port != self.expected_port)
        {
            info!(
                process = %name,
                from = *port,
                to = self.expected_port,
                "changing process port"
            );
            *port = self.expected_port;
        }
        PortAssignment {
            ports,
            change: PortChange::InProgress,
            old_port,
        }
    }

    /// Single `mongodb` port when idle; `mongodb-new` plus `mongodb` on the
    /// old port while `assignment` is migrating.
    pub fn compute_external_ports(&self, assignment: &PortAssignment) -> Vec<ServicePort> {
        if assignment.change == PortChange::None || assignment.old_port == self.expected_port {
            return vec![ServicePort::new(
                SERVICE_PORT_NAME,
                i32::from(self.expected_port),
            )];
        }
        vec![
            ServicePort::new(NEW_SERVICE_PORT_NAME, i32::from(self.expected_port)),
            ServicePort::new(SERVICE_PORT_NAME, i32::from(assignment.old_port)),
        ]
    }
}

/// Rewrites only `net.port` of processes named in `ports`.
pub fn apply_port_map(config: &AutomationConfig, ports: &BTreeMap<String, u16>) -> AutomationConfig {
    let mut updated = config.clone();
    for process in &mut updated.processes {
        if let Some(port) = ports.get(&process.name) {
            process.set_port(*port);
        }
    }
    updated
}
