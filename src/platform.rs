// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! The seams between this crate and the workload platform it runs against.
//!
//! Everything the reconciler learns about the live cluster comes through an `ObjectStore` (reads
//! of declared platform objects) or an `ExecChannel` (commands run inside a node's pod). Both are
//! injected, so the same code runs against a real platform client or the scripted platform in
//! `test_env`.

use async_trait::async_trait;

use crate::exec::{ExecError, ExecOutput};

/// A lookup for a named platform object found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} '{name}' not found in namespace '{namespace}'")]
pub struct NotFoundError {
    pub kind: &'static str,
    pub namespace: String,
    pub name: String,
}

impl NotFoundError {
    pub fn new(kind: &'static str, namespace: &str, name: &str) -> Self {
        NotFoundError {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

/// Lifecycle phase reported by the platform for a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodPhase {
    fn from(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// The parts of a pod that the reconciler looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct PodInfo {
    pub name: String,
    pub phase: PodPhase,
    pub ready: bool,
    /// Device paths attached to the pod's containers, in spec order.
    pub devices: Vec<String>,
}

/// The parts of a workload (the controller object that owns a node's pod).
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadInfo {
    pub name: String,
    pub replicas: u32,
    pub ready_replicas: u32,
}

/// The parts of a service that the reconciler records for a node's virtual IP.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInfo {
    pub name: String,
    pub cluster_ip: Option<String>,
    pub external_ip: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_workload(&self, namespace: &str, name: &str)
        -> Result<WorkloadInfo, NotFoundError>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodInfo, NotFoundError>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<ServiceInfo, NotFoundError>;

    /// Return the raw CNI configuration JSON held by the named network attachment.
    async fn get_network_attachment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<String, NotFoundError>;

    /// Return the output of the disk-check container of each disk-check pod that belongs to
    /// `cluster`, one string per pod.
    async fn get_disk_check_logs(
        &self,
        namespace: &str,
        cluster: &str,
    ) -> Result<Vec<String>, NotFoundError>;
}

#[async_trait]
pub trait ExecChannel: Send + Sync {
    /// Run `argv` inside the named pod and wait for it to finish.
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        argv: &[String],
    ) -> Result<ExecOutput, ExecError>;
}
