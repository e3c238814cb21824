use super::{int, keyed, map, replace, string, string_set, Merge};
use crate::resources::{
    LabelSelector, LabelSelectorRequirement, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    ServicePort, ServiceSpec, StatefulSet, StatefulSetSpec, StatefulSetUpdateStrategy,
};

impl Merge for LabelSelectorRequirement {
    fn merge(&self, other: &Self) -> Self {
        Self {
            key: string(&self.key, &other.key),
            operator: string(&self.operator, &other.operator),
            values: string_set(&self.values, &other.values),
        }
    }
}

impl Merge for LabelSelector {
    fn merge(&self, other: &Self) -> Self {
        Self {
            match_labels: map(&self.match_labels, &other.match_labels),
            match_expressions: keyed(
                &self.match_expressions,
                &other.match_expressions,
                |requirement| requirement.key.clone(),
            ),
        }
    }
}

impl Merge for PersistentVolumeClaimSpec {
    fn merge(&self, other: &Self) -> Self {
        Self {
            access_modes: string_set(&self.access_modes, &other.access_modes),
            selector: self.selector.merge(&other.selector),
            resources: self.resources.merge(&other.resources),
            storage_class_name: replace(&self.storage_class_name, &other.storage_class_name),
            volume_mode: replace(&self.volume_mode, &other.volume_mode),
        }
    }
}

impl Merge for PersistentVolumeClaim {
    fn merge(&self, other: &Self) -> Self {
        Self {
            metadata: self.metadata.merge(&other.metadata),
            spec: self.spec.merge(&other.spec),
        }
    }
}

impl Merge for StatefulSetUpdateStrategy {
    fn merge(&self, other: &Self) -> Self {
        Self {
            kind: string(&self.kind, &other.kind),
            rolling_update: replace(&self.rolling_update, &other.rolling_update),
        }
    }
}

impl Merge for StatefulSetSpec {
    fn merge(&self, other: &Self) -> Self {
        Self {
            replicas: replace(&self.replicas, &other.replicas),
            selector: self.selector.merge(&other.selector),
            template: self.template.merge(&other.template),
            volume_claim_templates: keyed(
                &self.volume_claim_templates,
                &other.volume_claim_templates,
                |claim| claim.metadata.name.clone(),
            ),
            service_name: string(&self.service_name, &other.service_name),
            pod_management_policy: string(
                &self.pod_management_policy,
                &other.pod_management_policy,
            ),
            update_strategy: self.update_strategy.merge(&other.update_strategy),
            revision_history_limit: replace(
                &self.revision_history_limit,
                &other.revision_history_limit,
            ),
        }
    }
}

impl Merge for StatefulSet {
    fn merge(&self, other: &Self) -> Self {
        Self {
            metadata: self.metadata.merge(&other.metadata),
            spec: self.spec.merge(&other.spec),
        }
    }
}

impl Merge for ServicePort {
    fn merge(&self, other: &Self) -> Self {
        Self {
            name: string(&self.name, &other.name),
            port: int(self.port, other.port),
            target_port: replace(&self.target_port, &other.target_port),
            protocol: string(&self.protocol, &other.protocol),
        }
    }
}

impl Merge for ServiceSpec {
    /// The baseline cluster IP is kept once allocated.
    fn merge(&self, other: &Self) -> Self {
        Self {
            ports: keyed(&self.ports, &other.ports, |port| port.name.clone()),
            selector: map(&self.selector, &other.selector),
            cluster_ip: if self.cluster_ip.is_empty() {
                other.cluster_ip.clone()
            } else {
                self.cluster_ip.clone()
            },
            kind: string(&self.kind, &other.kind),
            publish_not_ready_addresses: self.publish_not_ready_addresses
                || other.publish_not_ready_addresses,
        }
    }
}
