// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// ClusterSpec, along with its children, is the declared model of a RAC cluster as read from the
/// TOML configuration file.
///
/// The declared model is intentionally decoupled from the status model in `status`, which records
/// what was observed on the live nodes. A ClusterSpec is never mutated during a reconciliation
/// pass.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClusterSpec {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub topology: Topology,
    #[serde(default)]
    pub disk_groups: Vec<DiskGroup>,
    #[serde(default)]
    pub memory: MemorySpec,
    /// Explicit kernel parameters. When both `kernel.shmmax` and `kernel.shmall` are present the
    /// calculator in `memory` is bypassed.
    #[serde(default)]
    pub sysctls: BTreeMap<String, String>,
    pub service_name: Option<String>,
    /// Database name, when it differs from the cluster name.
    pub db_name: Option<String>,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// The two supported ways of laying out the nodes of a cluster.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Topology {
    /// Every node is declared individually.
    Instances { instances: Vec<Instance> },
    /// Nodes are generated from a count and a name prefix.
    Cluster(ClusterLayout),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyMode {
    Instances,
    Cluster,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub worker_nodes: Vec<String>,
    pub vip_service: Option<String>,
    #[serde(default)]
    pub pvc: BTreeMap<String, String>,
    #[serde(default)]
    pub private_networks: Vec<PrivateNetwork>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClusterLayout {
    pub node_count: u32,
    pub node_name: String,
    #[serde(default)]
    pub worker_nodes: Vec<String>,
    #[serde(default)]
    pub private_networks: Vec<PrivateNetwork>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PrivateNetwork {
    /// Name of the network attachment resource holding the IPAM configuration.
    pub name: String,
    pub interface: String,
    pub namespace: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiskGroup {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: DiskGroupType,
    #[serde(default)]
    pub disks: Vec<String>,
    #[serde(default)]
    pub auto_update: bool,
    pub storage_class: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiskGroupType {
    Crs,
    DbData,
    DbRecovery,
    Redo,
    #[default]
    Others,
}

impl std::fmt::Display for DiskGroupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                DiskGroupType::Crs => "CRS",
                DiskGroupType::DbData => "DBDATA",
                DiskGroupType::DbRecovery => "DBRECOVERY",
                DiskGroupType::Redo => "REDO",
                DiskGroupType::Others => "OTHERS",
            }
        )
    }
}

/// Declared memory sizing, in the size notation accepted by `memory::parse_size_bytes`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MemorySpec {
    pub sga_size: Option<String>,
    pub pga_size: Option<String>,
    pub container_limit: Option<String>,
    pub hugepages_limit: Option<String>,
}

/// A single node of the cluster, resolved from whichever topology the cluster declares.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    /// Stable position of the node within the cluster. Used for address allocation.
    pub ordinal: u32,
    pub name: String,
    pub worker_nodes: Vec<String>,
    pub vip_service: String,
    pub pvc: BTreeMap<String, String>,
    pub private_networks: Vec<PrivateNetwork>,
}

impl NodeSpec {
    /// Name of the pod that runs this node's database software.
    pub fn pod_name(&self) -> String {
        format!("{}-0", self.name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("node name '{0}' is declared more than once")]
    DuplicateNode(String),
}

impl ClusterSpec {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let spec: ClusterSpec = toml::from_str(contents)?;
        spec.check_unique_names()?;
        Ok(spec)
    }

    fn check_unique_names(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for node in self.nodes() {
            if !seen.insert(node.name.clone()) {
                return Err(ConfigError::DuplicateNode(node.name));
            }
        }
        Ok(())
    }

    pub fn mode(&self) -> TopologyMode {
        match self.topology {
            Topology::Instances { .. } => TopologyMode::Instances,
            Topology::Cluster(_) => TopologyMode::Cluster,
        }
    }

    /// Resolve the declared topology into the list of nodes, in ordinal order.
    pub fn nodes(&self) -> Vec<NodeSpec> {
        match &self.topology {
            Topology::Instances { instances } => instances
                .iter()
                .enumerate()
                .map(|(i, inst)| NodeSpec {
                    ordinal: i as u32,
                    name: inst.name.clone(),
                    worker_nodes: inst.worker_nodes.clone(),
                    vip_service: inst
                        .vip_service
                        .clone()
                        .unwrap_or_else(|| format!("{}-vip", inst.name)),
                    pvc: inst.pvc.clone(),
                    private_networks: inst.private_networks.clone(),
                })
                .collect(),
            Topology::Cluster(layout) => (0..layout.node_count)
                .map(|i| {
                    let name = format!("{}{}", layout.node_name, i + 1);
                    NodeSpec {
                        ordinal: i,
                        vip_service: format!("{name}-vip"),
                        name,
                        worker_nodes: layout.worker_nodes.clone(),
                        pvc: BTreeMap::new(),
                        private_networks: layout.private_networks.clone(),
                    }
                })
                .collect(),
        }
    }

    pub fn db_name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.name)
    }

    pub fn disk_group(&self, name: &str) -> Option<&DiskGroup> {
        self.disk_groups.iter().find(|dg| dg.name == name)
    }

    /// Every declared device path, across all disk groups, in declaration order.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.disk_groups
            .iter()
            .flat_map(|dg| dg.disks.iter().map(String::as_str))
    }

    /// Comma-separated list of the declared devices belonging to disk groups of `kind`.
    pub fn devices_of_type(&self, kind: DiskGroupType) -> String {
        self.disk_groups
            .iter()
            .filter(|dg| dg.kind == kind)
            .flat_map(|dg| dg.disks.iter())
            .filter(|d| !d.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}
