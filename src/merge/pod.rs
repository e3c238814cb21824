use super::{flag, int, keyed, list, map, replace, string, string_set, Merge};
use crate::resources::{
    Capabilities, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar,
    ExecAction, Handler, HostAlias, HttpGetAction, KeyToPath, Lifecycle, LocalObjectReference,
    ObjectMeta, PodSpec, PodTemplateSpec, Probe, ResourceRequirements, SecretVolumeSource,
    SecurityContext, TcpSocketAction, Toleration, TopologySpreadConstraint, Volume, VolumeMount,
    VolumeSource,
};

impl Merge for ObjectMeta {
    fn merge(&self, other: &Self) -> Self {
        Self {
            name: string(&self.name, &other.name),
            namespace: string(&self.namespace, &other.namespace),
            labels: map(&self.labels, &other.labels),
            annotations: map(&self.annotations, &other.annotations),
        }
    }
}

impl Merge for ContainerPort {
    fn merge(&self, other: &Self) -> Self {
        Self {
            name: string(&self.name, &other.name),
            container_port: int(self.container_port, other.container_port),
            host_port: int(self.host_port, other.host_port),
            protocol: string(&self.protocol, &other.protocol),
            host_ip: string(&self.host_ip, &other.host_ip),
        }
    }
}

/// Unnamed ports are identified by their number.
pub(crate) fn port_key(port: &ContainerPort) -> (String, i32) {
    if port.name.is_empty() {
        (String::new(), port.container_port)
    } else {
        (port.name.clone(), 0)
    }
}

impl Merge for EnvVar {
    /// `value` and `valueFrom` are exclusive; whichever the override sets wins.
    fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        if !other.value.is_empty() {
            merged.value = other.value.clone();
            merged.value_from = None;
        } else if other.value_from.is_some() {
            merged.value = String::new();
            merged.value_from = other.value_from.clone();
        }
        merged
    }
}

impl Merge for ResourceRequirements {
    fn merge(&self, other: &Self) -> Self {
        Self {
            limits: map(&self.limits, &other.limits),
            requests: map(&self.requests, &other.requests),
        }
    }
}

pub(crate) fn volume_mount_key(mount: &VolumeMount) -> (String, String, String) {
    (
        mount.name.clone(),
        mount.mount_path.clone(),
        mount.sub_path.clone(),
    )
}

impl Merge for VolumeMount {
    fn merge(&self, other: &Self) -> Self {
        Self {
            name: string(&self.name, &other.name),
            mount_path: string(&self.mount_path, &other.mount_path),
            sub_path: string(&self.sub_path, &other.sub_path),
            read_only: flag(self.read_only, other.read_only),
            mount_propagation: replace(&self.mount_propagation, &other.mount_propagation),
        }
    }
}

impl Merge for ExecAction {
    fn merge(&self, other: &Self) -> Self {
        Self {
            command: list(&self.command, &other.command),
        }
    }
}

impl Merge for TcpSocketAction {
    fn merge(&self, other: &Self) -> Self {
        Self {
            port: int(self.port, other.port),
            host: string(&self.host, &other.host),
        }
    }
}

impl Merge for HttpGetAction {
    fn merge(&self, other: &Self) -> Self {
        Self {
            path: string(&self.path, &other.path),
            port: int(self.port, other.port),
            scheme: string(&self.scheme, &other.scheme),
        }
    }
}

impl Merge for Handler {
    fn merge(&self, other: &Self) -> Self {
        Self {
            exec: self.exec.merge(&other.exec),
            tcp_socket: self.tcp_socket.merge(&other.tcp_socket),
            http_get: self.http_get.merge(&other.http_get),
        }
    }
}

impl Merge for Probe {
    fn merge(&self, other: &Self) -> Self {
        Self {
            handler: self.handler.merge(&other.handler),
            initial_delay_seconds: int(self.initial_delay_seconds, other.initial_delay_seconds),
            timeout_seconds: int(self.timeout_seconds, other.timeout_seconds),
            period_seconds: int(self.period_seconds, other.period_seconds),
            success_threshold: int(self.success_threshold, other.success_threshold),
            failure_threshold: int(self.failure_threshold, other.failure_threshold),
        }
    }
}

impl Merge for Lifecycle {
    fn merge(&self, other: &Self) -> Self {
        Self {
            post_start: self.post_start.merge(&other.post_start),
            pre_stop: self.pre_stop.merge(&other.pre_stop),
        }
    }
}

impl Merge for Capabilities {
    fn merge(&self, other: &Self) -> Self {
        Self {
            add: string_set(&self.add, &other.add),
            drop: string_set(&self.drop, &other.drop),
        }
    }
}

impl Merge for SecurityContext {
    fn merge(&self, other: &Self) -> Self {
        Self {
            run_as_user: replace(&self.run_as_user, &other.run_as_user),
            run_as_group: replace(&self.run_as_group, &other.run_as_group),
            run_as_non_root: replace(&self.run_as_non_root, &other.run_as_non_root),
            read_only_root_filesystem: replace(
                &self.read_only_root_filesystem,
                &other.read_only_root_filesystem,
            ),
            allow_privilege_escalation: replace(
                &self.allow_privilege_escalation,
                &other.allow_privilege_escalation,
            ),
            privileged: replace(&self.privileged, &other.privileged),
            capabilities: self.capabilities.merge(&other.capabilities),
        }
    }
}

impl Merge for Container {
    fn merge(&self, other: &Self) -> Self {
        Self {
            name: string(&self.name, &other.name),
            image: string(&self.image, &other.image),
            image_pull_policy: string(&self.image_pull_policy, &other.image_pull_policy),
            command: list(&self.command, &other.command),
            args: list(&self.args, &other.args),
            working_dir: string(&self.working_dir, &other.working_dir),
            ports: keyed(&self.ports, &other.ports, port_key),
            env: keyed(&self.env, &other.env, |env| env.name.clone()),
            resources: self.resources.merge(&other.resources),
            volume_mounts: keyed(&self.volume_mounts, &other.volume_mounts, volume_mount_key),
            liveness_probe: self.liveness_probe.merge(&other.liveness_probe),
            readiness_probe: self.readiness_probe.merge(&other.readiness_probe),
            startup_probe: self.startup_probe.merge(&other.startup_probe),
            lifecycle: self.lifecycle.merge(&other.lifecycle),
            security_context: self.security_context.merge(&other.security_context),
            termination_message_path: string(
                &self.termination_message_path,
                &other.termination_message_path,
            ),
            termination_message_policy: string(
                &self.termination_message_policy,
                &other.termination_message_policy,
            ),
            stdin: flag(self.stdin, other.stdin),
            tty: flag(self.tty, other.tty),
        }
    }
}

impl Merge for KeyToPath {
    fn merge(&self, other: &Self) -> Self {
        Self {
            key: string(&self.key, &other.key),
            path: string(&self.path, &other.path),
            mode: replace(&self.mode, &other.mode),
        }
    }
}

impl Merge for EmptyDirVolumeSource {
    fn merge(&self, other: &Self) -> Self {
        Self {
            medium: string(&self.medium, &other.medium),
            size_limit: replace(&self.size_limit, &other.size_limit),
        }
    }
}

impl Merge for SecretVolumeSource {
    fn merge(&self, other: &Self) -> Self {
        Self {
            secret_name: string(&self.secret_name, &other.secret_name),
            items: keyed(&self.items, &other.items, |item| item.key.clone()),
            default_mode: replace(&self.default_mode, &other.default_mode),
            optional: replace(&self.optional, &other.optional),
        }
    }
}

impl Merge for ConfigMapVolumeSource {
    fn merge(&self, other: &Self) -> Self {
        Self {
            name: string(&self.name, &other.name),
            items: keyed(&self.items, &other.items, |item| item.key.clone()),
            default_mode: replace(&self.default_mode, &other.default_mode),
            optional: replace(&self.optional, &other.optional),
        }
    }
}

impl Merge for VolumeSource {
    /// Sources of the same kind merge; a different kind replaces the baseline source.
    fn merge(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        match (self, other) {
            (
                VolumeSource {
                    empty_dir: Some(base),
                    ..
                },
                VolumeSource {
                    empty_dir: Some(over),
                    ..
                },
            ) => VolumeSource {
                empty_dir: Some(base.merge(over)),
                ..VolumeSource::default()
            },
            (
                VolumeSource {
                    secret: Some(base),
                    ..
                },
                VolumeSource {
                    secret: Some(over),
                    ..
                },
            ) => VolumeSource {
                secret: Some(base.merge(over)),
                ..VolumeSource::default()
            },
            (
                VolumeSource {
                    config_map: Some(base),
                    ..
                },
                VolumeSource {
                    config_map: Some(over),
                    ..
                },
            ) => VolumeSource {
                config_map: Some(base.merge(over)),
                ..VolumeSource::default()
            },
            _ => other.clone(),
        }
    }
}

impl Merge for Volume {
    fn merge(&self, other: &Self) -> Self {
        Self {
            name: string(&self.name, &other.name),
            source: self.source.merge(&other.source),
        }
    }
}

impl Merge for HostAlias {
    fn merge(&self, other: &Self) -> Self {
        Self {
            ip: string(&self.ip, &other.ip),
            hostnames: string_set(&self.hostnames, &other.hostnames),
        }
    }
}

impl Merge for Toleration {
    fn merge(&self, other: &Self) -> Self {
        Self {
            key: string(&self.key, &other.key),
            operator: string(&self.operator, &other.operator),
            value: string(&self.value, &other.value),
            effect: string(&self.effect, &other.effect),
            toleration_seconds: replace(&self.toleration_seconds, &other.toleration_seconds),
        }
    }
}

impl Merge for TopologySpreadConstraint {
    fn merge(&self, other: &Self) -> Self {
        Self {
            max_skew: int(self.max_skew, other.max_skew),
            topology_key: string(&self.topology_key, &other.topology_key),
            when_unsatisfiable: string(&self.when_unsatisfiable, &other.when_unsatisfiable),
            label_selector: self.label_selector.merge(&other.label_selector),
        }
    }
}

impl Merge for LocalObjectReference {
    fn merge(&self, other: &Self) -> Self {
        Self {
            name: string(&self.name, &other.name),
        }
    }
}

impl Merge for PodSpec {
    fn merge(&self, other: &Self) -> Self {
        Self {
            volumes: keyed(&self.volumes, &other.volumes, |volume| volume.name.clone()),
            init_containers: keyed(&self.init_containers, &other.init_containers, |c| {
                c.name.clone()
            }),
            containers: keyed(&self.containers, &other.containers, |c| c.name.clone()),
            restart_policy: string(&self.restart_policy, &other.restart_policy),
            termination_grace_period_seconds: replace(
                &self.termination_grace_period_seconds,
                &other.termination_grace_period_seconds,
            ),
            active_deadline_seconds: replace(
                &self.active_deadline_seconds,
                &other.active_deadline_seconds,
            ),
            dns_policy: string(&self.dns_policy, &other.dns_policy),
            node_selector: map(&self.node_selector, &other.node_selector),
            service_account_name: string(&self.service_account_name, &other.service_account_name),
            automount_service_account_token: replace(
                &self.automount_service_account_token,
                &other.automount_service_account_token,
            ),
            node_name: string(&self.node_name, &other.node_name),
            host_network: flag(self.host_network, other.host_network),
            share_process_namespace: replace(
                &self.share_process_namespace,
                &other.share_process_namespace,
            ),
            security_context: replace(&self.security_context, &other.security_context),
            image_pull_secrets: keyed(&self.image_pull_secrets, &other.image_pull_secrets, |r| {
                r.name.clone()
            }),
            hostname: string(&self.hostname, &other.hostname),
            subdomain: string(&self.subdomain, &other.subdomain),
            affinity: replace(&self.affinity, &other.affinity),
            scheduler_name: string(&self.scheduler_name, &other.scheduler_name),
            tolerations: keyed(&self.tolerations, &other.tolerations, |t| {
                (t.key.clone(), t.effect.clone())
            }),
            host_aliases: keyed(&self.host_aliases, &other.host_aliases, |alias| {
                alias.ip.clone()
            }),
            priority_class_name: string(&self.priority_class_name, &other.priority_class_name),
            priority: replace(&self.priority, &other.priority),
            topology_spread_constraints: keyed(
                &self.topology_spread_constraints,
                &other.topology_spread_constraints,
                |constraint| constraint.topology_key.clone(),
            ),
        }
    }
}

impl Merge for PodTemplateSpec {
    fn merge(&self, other: &Self) -> Self {
        Self {
            metadata: self.metadata.merge(&other.metadata),
            spec: self.spec.merge(&other.spec),
        }
    }
}
