// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! The per-node lifecycle state machine.
//!
//! Once per pass, each node is given a target phase derived from the platform (see
//! `Reconciler::probe_phase`). `update_node` folds that phase and fresh diagnostics into the node's
//! entry in the status snapshot.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::{
    config::NodeSpec,
    exec::RemoteExecutor,
    platform::ObjectStore,
    state::{ClusterHealth, InstanceState, NodeState},
    status::NodeStatus,
};

/// Fold `phase` into the entry for `node` in `nodes`.
///
/// - `Available`/`PodAvailable`: the entry is rebuilt from fresh diagnostics. An open instance
///   makes the node `Available`. Otherwise a node that was still being brought up takes its
///   state from the on-node state file, and any other node drops back to `Pending`. A node
///   seen for the first time starts `Pending`.
/// - `StatefulSetNotFound`: the entry is removed.
/// - `PodNotFound`/`PodNotReady`/`PodFailure`: the entry is marked unavailable without running
///   any diagnostics.
/// - `Failed`: a node that reports a healthy cluster and an open instance has recovered and is
///   handled as `Available`. Otherwise nothing changes.
/// - Anything else leaves the entry untouched.
pub async fn update_node(
    nodes: &mut Vec<NodeStatus>,
    node: &NodeSpec,
    phase: NodeState,
    exec: &RemoteExecutor<'_>,
    store: &dyn ObjectStore,
) {
    let pod = node.pod_name();

    // Diagnostics already run to decide on FAILED recovery are reused for the entry.
    let mut recovered = None;
    let phase = if phase == NodeState::Failed {
        let health = exec.cluster_health(&pod).await;
        let instance = exec.instance_state(&pod).await;
        if health == ClusterHealth::Healthy && instance == InstanceState::Open {
            info!("Node {} has recovered from FAILED", node.name);
            recovered = Some((health, instance));
            NodeState::Available
        } else {
            debug!("Node {} remains FAILED ({health}, {instance})", node.name);
            return;
        }
    } else {
        phase
    };

    match phase {
        NodeState::Available | NodeState::PodAvailable => {
            let (cluster_state, instance_state) = match recovered {
                Some(diagnostics) => diagnostics,
                None => (
                    exec.cluster_health(&pod).await,
                    exec.instance_state(&pod).await,
                ),
            };
            let observed = NodeStatus {
                name: node.name.clone(),
                pod_state: phase,
                cluster_state,
                instance_state,
                state: NodeState::Pending,
                mounted_devices: exec.mounted_devices(&pod).await,
                vip_details: vip_details(store, exec.namespace(), &node.vip_service).await,
                pvc_details: node.pvc.clone(),
            };

            match nodes.iter().position(|n| n.name == node.name) {
                Some(idx) => {
                    let previous = nodes[idx].state;
                    let state = if observed.instance_state == InstanceState::Open {
                        NodeState::Available
                    } else if previous.is_in_progress() {
                        exec.state_file(&pod).await
                    } else {
                        NodeState::Pending
                    };

                    if state != previous {
                        info!("Node {} changed state: {previous} -> {state}", node.name);
                    }
                    nodes[idx] = NodeStatus { state, ..observed };
                }
                None => {
                    info!("Tracking new node {}", node.name);
                    nodes.push(observed);
                }
            }
        }
        NodeState::StatefulSetNotFound => {
            let before = nodes.len();
            nodes.retain(|n| n.name != node.name);
            if nodes.len() != before {
                info!("Node {} no longer has a workload; removed from status", node.name);
            }
        }
        NodeState::PodNotFound | NodeState::PodNotReady | NodeState::PodFailure => {
            let vip_details = vip_details(store, exec.namespace(), &node.vip_service).await;
            let idx = match nodes.iter().position(|n| n.name == node.name) {
                Some(idx) => idx,
                None => {
                    nodes.push(NodeStatus::new(&node.name));
                    nodes.len() - 1
                }
            };

            let entry = &mut nodes[idx];
            if entry.pod_state != phase {
                info!("Node {} pod is unavailable: {phase}", node.name);
            }
            entry.pod_state = phase;
            entry.cluster_state = ClusterHealth::NotAvailable;
            entry.instance_state = InstanceState::NotAvailable;
            entry.vip_details = vip_details;
            entry.pvc_details.clear();
        }
        _ => {}
    }
}

/// Details of the node's virtual IP service, or nothing if the service does not exist.
async fn vip_details(
    store: &dyn ObjectStore,
    namespace: &str,
    service: &str,
) -> BTreeMap<String, String> {
    let mut details = BTreeMap::new();
    match store.get_service(namespace, service).await {
        Ok(svc) => {
            details.insert("name".to_string(), svc.name);
            if let Some(ip) = svc.cluster_ip {
                details.insert("clusterIp".to_string(), ip);
            }
            if let Some(ip) = svc.external_ip {
                details.insert("externalIp".to_string(), ip);
            }
        }
        Err(e) => debug!("No VIP details: {e}"),
    }
    details
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HealthError {
    #[error("no healthy node exists")]
    NoHealthyNode,

    #[error("only {healthy} of {total} nodes are healthy")]
    NotAllHealthy { healthy: usize, total: usize },
}

/// The first node whose clusterware reports healthy.
pub fn healthy_node(nodes: &[NodeStatus]) -> Result<&NodeStatus, HealthError> {
    nodes
        .iter()
        .find(|n| n.cluster_state == ClusterHealth::Healthy)
        .ok_or(HealthError::NoHealthyNode)
}

/// The number of nodes, provided every one of them is healthy.
pub fn healthy_node_count(nodes: &[NodeStatus]) -> Result<usize, HealthError> {
    let healthy = nodes
        .iter()
        .filter(|n| n.cluster_state == ClusterHealth::Healthy)
        .count();
    if healthy == nodes.len() {
        Ok(healthy)
    } else {
        Err(HealthError::NotAllHealthy {
            healthy,
            total: nodes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(name: &str, health: ClusterHealth) -> NodeStatus {
        NodeStatus {
            cluster_state: health,
            ..NodeStatus::new(name)
        }
    }

    #[test]
    fn first_healthy_node() {
        let nodes = vec![
            status("racnode1", ClusterHealth::NotAvailable),
            status("racnode2", ClusterHealth::Healthy),
            status("racnode3", ClusterHealth::Healthy),
        ];
        assert_eq!(healthy_node(&nodes).unwrap().name, "racnode2");
        assert_eq!(
            healthy_node_count(&nodes),
            Err(HealthError::NotAllHealthy {
                healthy: 2,
                total: 3
            })
        );
        assert_eq!(healthy_node(&nodes[..1]), Err(HealthError::NoHealthyNode));
    }

    #[test]
    fn all_healthy() {
        let nodes = vec![
            status("racnode1", ClusterHealth::Healthy),
            status("racnode2", ClusterHealth::Healthy),
        ];
        assert_eq!(healthy_node_count(&nodes), Ok(2));
        assert_eq!(healthy_node_count(&[]), Ok(0));
    }
}
