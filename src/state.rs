// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Lifecycle states for nodes and for the cluster as a whole, plus the parsers for the raw text
//! that the on-node diagnostics report.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle state of a node. The cluster's aggregate state uses the same set of values.
///
/// The `*NotFound`, `PodNotReady` and `PodFailure` variants describe the absence or breakage of
/// the platform objects backing a node rather than a stage of database provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeState {
    Pending,
    Provisioning,
    AddNode,
    Update,
    Failed,
    Available,
    PodAvailable,
    StatefulSetNotFound,
    PodNotFound,
    PodNotReady,
    PodFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized node state '{0}'")]
pub struct UnknownStateError(pub String);

impl NodeState {
    /// Position in the aggregate precedence order; lower wins. States that never decide the
    /// aggregate have no rank.
    fn rank(&self) -> Option<u8> {
        match self {
            NodeState::Failed => Some(0),
            NodeState::Pending => Some(1),
            NodeState::Provisioning => Some(2),
            NodeState::Update => Some(3),
            NodeState::AddNode => Some(4),
            NodeState::PodAvailable => Some(5),
            _ => None,
        }
    }

    /// States in which the node is still being brought up, so the on-node state file is the best
    /// source of truth when the instance is not yet open.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            NodeState::Pending
                | NodeState::AddNode
                | NodeState::Provisioning
                | NodeState::Failed
                | NodeState::Update
        )
    }

    /// States that describe a missing, unready or failed pod.
    pub fn is_pod_absent(&self) -> bool {
        matches!(
            self,
            NodeState::PodNotFound | NodeState::PodNotReady | NodeState::PodFailure
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Self::Pending => "PENDING",
                Self::Provisioning => "PROVISIONING",
                Self::AddNode => "ADDNODE",
                Self::Update => "UPDATE",
                Self::Failed => "FAILED",
                Self::Available => "AVAILABLE",
                Self::PodAvailable => "PODAVAILABLE",
                Self::StatefulSetNotFound => "STATEFULSETNOTFOUND",
                Self::PodNotFound => "PODNOTFOUND",
                Self::PodNotReady => "PODNOTREADY",
                Self::PodFailure => "PODFAILURE",
            }
        )
    }
}

impl FromStr for NodeState {
    type Err = UnknownStateError;

    /// Case is ignored, as are surrounding whitespace and any `_` or `-` separators, so
    /// `pod_available`, `POD-AVAILABLE` and `PodAvailable` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        Ok(match norm.as_str() {
            "PENDING" => Self::Pending,
            "PROVISIONING" => Self::Provisioning,
            "ADDNODE" | "RACINSTADDITION" => Self::AddNode,
            "UPDATE" | "UPDATING" => Self::Update,
            "FAILED" => Self::Failed,
            "AVAILABLE" => Self::Available,
            "PODAVAILABLE" => Self::PodAvailable,
            "STATEFULSETNOTFOUND" => Self::StatefulSetNotFound,
            "PODNOTFOUND" => Self::PodNotFound,
            "PODNOTREADY" => Self::PodNotReady,
            "PODFAILURE" => Self::PodFailure,
            _ => return Err(UnknownStateError(s.to_string())),
        })
    }
}

impl Serialize for NodeState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Fold a set of node states into the cluster's aggregate state.
///
/// The most significant state present wins, in the order `Failed`, `Pending`, `Provisioning`,
/// `Update`, `AddNode`, `PodAvailable`. If none of those is present the cluster is `Available`.
/// A cluster with no nodes is `Pending`.
pub fn aggregate<I>(states: I) -> NodeState
where
    I: IntoIterator<Item = NodeState>,
{
    let distinct: BTreeSet<NodeState> = states.into_iter().collect();
    if distinct.is_empty() {
        return NodeState::Pending;
    }

    distinct
        .into_iter()
        .filter_map(|s| s.rank().map(|r| (r, s)))
        .min()
        .map(|(_, s)| s)
        .unwrap_or(NodeState::Available)
}

/// Like `aggregate`, over raw state strings. Strings that name no known state take part in the
/// fold but can never win it.
pub fn aggregate_raw<'a, I>(states: I) -> NodeState
where
    I: IntoIterator<Item = &'a str>,
{
    let raw: BTreeSet<String> = states
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .collect();
    if raw.is_empty() {
        return NodeState::Pending;
    }

    let known: Vec<NodeState> = raw.iter().filter_map(|s| s.parse().ok()).collect();
    if known.is_empty() {
        return NodeState::Available;
    }
    aggregate(known)
}

/// Interpret the contents of the provisioning state file written on the node.
pub fn parse_state_file(contents: &str) -> NodeState {
    match contents.trim().to_lowercase().as_str() {
        "provisioning" => NodeState::Provisioning,
        "addnode" => NodeState::AddNode,
        "failed" => NodeState::Failed,
        "completed" => NodeState::Available,
        _ => NodeState::Pending,
    }
}

/// Health of the clusterware stack on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterHealth {
    Healthy,
    /// No answer yet.
    #[default]
    Pending,
    /// Anything other than a healthy report.
    NotAvailable,
}

impl ClusterHealth {
    pub fn parse(output: &str) -> Self {
        match output.trim().to_ascii_uppercase().as_str() {
            "HEALTHY" => ClusterHealth::Healthy,
            "PENDING" => ClusterHealth::Pending,
            _ => ClusterHealth::NotAvailable,
        }
    }
}

impl fmt::Display for ClusterHealth {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Self::Healthy => "HEALTHY",
                Self::Pending => "PENDING",
                Self::NotAvailable => "NOTAVAILABLE",
            }
        )
    }
}

/// Open mode of the database instance on a node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InstanceState {
    Open,
    Mounted,
    /// No answer yet.
    #[default]
    Pending,
    /// An error report, or no output at all.
    NotAvailable,
    /// Any other open mode, as reported (e.g. `READ ONLY`).
    Other(String),
}

impl InstanceState {
    pub fn parse(output: &str) -> Self {
        if output.contains("ERROR") {
            return InstanceState::NotAvailable;
        }
        let mode = output.trim();
        match mode.to_ascii_uppercase().as_str() {
            "OPEN" => InstanceState::Open,
            "MOUNTED" => InstanceState::Mounted,
            "PENDING" => InstanceState::Pending,
            "" | "NOTAVAILABLE" => InstanceState::NotAvailable,
            _ => InstanceState::Other(mode.to_string()),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Self::Open => "OPEN",
                Self::Mounted => "MOUNTED",
                Self::Pending => "PENDING",
                Self::NotAvailable => "NOTAVAILABLE",
                Self::Other(mode) => mode.as_str(),
            }
        )
    }
}

macro_rules! display_serialize {
    ($($t:ty),*) => {
        $(
            impl Serialize for $t {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }

            impl<'de> Deserialize<'de> for $t {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    Ok(<$t>::parse(&String::deserialize(deserializer)?))
                }
            }
        )*
    };
}

display_serialize!(ClusterHealth, InstanceState);
