// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::DiskGroupType,
    state::{ClusterHealth, InstanceState, NodeState},
};

/// What was observed about one node during the most recent pass.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub name: String,
    /// The platform-level phase the node was probed in.
    pub pod_state: NodeState,
    pub cluster_state: ClusterHealth,
    pub instance_state: InstanceState,
    /// The node's lifecycle state, debounced across passes.
    pub state: NodeState,
    pub mounted_devices: Vec<String>,
    pub vip_details: BTreeMap<String, String>,
    pub pvc_details: BTreeMap<String, String>,
}

impl NodeStatus {
    pub fn new(name: &str) -> Self {
        NodeStatus {
            name: name.to_string(),
            pod_state: NodeState::Pending,
            cluster_state: ClusterHealth::Pending,
            instance_state: InstanceState::Pending,
            state: NodeState::Pending,
            mounted_devices: Vec::new(),
            vip_details: BTreeMap::new(),
            pvc_details: BTreeMap::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AsmDiskStatus {
    pub name: String,
    /// Zero until the size has been discovered.
    pub size_gb: u64,
    pub valid: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AsmDiskGroupStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<DiskGroupType>,
    pub redundancy: String,
    pub auto_update: bool,
    pub storage_class: Option<String>,
    pub disks: Vec<AsmDiskStatus>,
}

/// Database-wide facts, collected from a single node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    pub db_state: String,
    pub role: String,
    pub release_update: String,
    pub connect_string: String,
    pub pdb_connect_string: String,
    pub service_name: Option<String>,
    pub service_state: Option<String>,
    pub grid_home: Option<String>,
}

/// The status snapshot of one cluster. Each reconciliation pass replaces it wholesale.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    pub state: NodeState,
    pub nodes: Vec<NodeStatus>,
    pub asm_disk_groups: Vec<AsmDiskGroupStatus>,
    pub database: DatabaseStatus,
    pub observed_at: Option<DateTime<Utc>>,
}

impl Default for ClusterStatus {
    fn default() -> Self {
        ClusterStatus {
            state: NodeState::Pending,
            nodes: Vec::new(),
            asm_disk_groups: Vec::new(),
            database: DatabaseStatus::default(),
            observed_at: None,
        }
    }
}

impl ClusterStatus {
    pub fn node(&self, name: &str) -> Option<&NodeStatus> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_states(&self) -> impl Iterator<Item = NodeState> + '_ {
        self.nodes.iter().map(|n| n.state)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
