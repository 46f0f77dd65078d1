// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use chrono::Utc;
use futures::future;
use log::{debug, info, warn};

use crate::{
    asm,
    config::{ClusterSpec, DiskGroupType, NodeSpec, TopologyMode},
    exec::{commands::ScriptCommands, RemoteExecutor},
    node,
    platform::{ExecChannel, ObjectStore, PodPhase},
    state::{self, NodeState},
    status::{ClusterStatus, DatabaseStatus},
};

/// Reconciler computes the status snapshot of one cluster from its declared `ClusterSpec` and
/// what the platform reports about the cluster's nodes.
///
/// A Reconciler holds no state between passes. Everything it needs from earlier passes is read
/// from the previous snapshot handed to `reconcile`, and node updates are applied one at a time in
/// ordinal order.
pub struct Reconciler<'a> {
    spec: &'a ClusterSpec,
    store: &'a dyn ObjectStore,
    exec: RemoteExecutor<'a>,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        spec: &'a ClusterSpec,
        store: &'a dyn ObjectStore,
        channel: &'a dyn ExecChannel,
    ) -> Self {
        Self::with_scripts(spec, store, channel, ScriptCommands::default())
    }

    pub fn with_scripts(
        spec: &'a ClusterSpec,
        store: &'a dyn ObjectStore,
        channel: &'a dyn ExecChannel,
        scripts: ScriptCommands,
    ) -> Self {
        Reconciler {
            spec,
            store,
            exec: RemoteExecutor::with_scripts(store, channel, &spec.namespace, scripts),
        }
    }

    pub fn mode(&self) -> TopologyMode {
        self.spec.mode()
    }

    /// Derive the phase of `node` from the platform objects that back it.
    pub async fn probe_phase(&self, node: &NodeSpec) -> NodeState {
        let namespace = &self.spec.namespace;

        if let Err(e) = self.store.get_workload(namespace, &node.name).await {
            debug!("{e}");
            return NodeState::StatefulSetNotFound;
        }

        match self.store.get_pod(namespace, &node.pod_name()).await {
            Err(e) => {
                debug!("{e}");
                NodeState::PodNotFound
            }
            Ok(pod) if pod.phase == PodPhase::Failed => NodeState::PodFailure,
            Ok(pod) if !pod.ready => NodeState::PodNotReady,
            Ok(_) => NodeState::PodAvailable,
        }
    }

    /// Run one pass: probe every declared node and fold the results into a new snapshot.
    ///
    /// Probes run concurrently; nodes are folded in ordinal order.
    pub async fn reconcile(&self, previous: &ClusterStatus) -> ClusterStatus {
        let nodes = self.spec.nodes();
        let probed = future::join_all(nodes.iter().map(|n| self.probe_phase(n))).await;
        let phases: Vec<_> = nodes.into_iter().zip(probed).collect();
        self.reconcile_with_phases(previous, &phases).await
    }

    /// Run one pass with phases decided by the caller.
    pub async fn reconcile_with_phases(
        &self,
        previous: &ClusterStatus,
        phases: &[(NodeSpec, NodeState)],
    ) -> ClusterStatus {
        debug!(
            "Reconciling {} ({:?} topology, {} nodes)",
            self.spec.name,
            self.mode(),
            phases.len()
        );

        let mut status = previous.clone();
        for (node, phase) in phases {
            node::update_node(&mut status.nodes, node, *phase, &self.exec, self.store).await;
        }

        match node::healthy_node_count(&status.nodes) {
            Ok(count) => debug!("All {count} nodes of {} are healthy", self.spec.name),
            Err(e) => debug!("Cluster {}: {e}", self.spec.name),
        }

        // Cluster-wide facts come from one node: the first healthy one if there is any.
        let source = node::healthy_node(&status.nodes)
            .ok()
            .or(status.nodes.first())
            .map(|n| format!("{}-0", n.name));

        if let Some(pod) = source {
            let groups =
                asm::aggregate(&self.exec, &pod, self.spec, &previous.asm_disk_groups).await;
            // An unanswered query keeps the last known groups and their recorded sizes.
            if !groups.is_empty() {
                status.asm_disk_groups = groups;
            }
            self.fill_declared_devices(&pod, &mut status).await;
            status.database = self.database_status(&pod).await;
        }
        self.record_disk_sizes(&mut status).await;

        status.state = state::aggregate(status.node_states());
        if status.state != previous.state {
            info!(
                "Cluster {} changed state: {} -> {}",
                self.spec.name, previous.state, status.state
            );
        }
        status.observed_at = Some(Utc::now());
        status
    }

    /// Until ASM reports a group of a given type, list the devices the node was configured with.
    async fn fill_declared_devices(&self, pod: &str, status: &mut ClusterStatus) {
        let has_kind = |status: &ClusterStatus, kind| {
            status
                .asm_disk_groups
                .iter()
                .any(|g| g.kind == Some(kind))
        };

        if !has_kind(status, DiskGroupType::Crs) {
            match self.exec.crs_device_list(pod).await {
                Ok(devices) => {
                    asm::set_group_devices(&mut status.asm_disk_groups, DiskGroupType::Crs, &devices)
                }
                Err(e) => debug!("No CRS device list: {e}"),
            }
        }
        if !has_kind(status, DiskGroupType::DbData) {
            match self.exec.db_device_list(pod).await {
                Ok(devices) => asm::set_group_devices(
                    &mut status.asm_disk_groups,
                    DiskGroupType::DbData,
                    &devices,
                ),
                Err(e) => debug!("No DB device list: {e}"),
            }
        }
    }

    /// Fold the sizes reported by the cluster's disk-check pods into the disk groups.
    async fn record_disk_sizes(&self, status: &mut ClusterStatus) {
        let logs = match self
            .store
            .get_disk_check_logs(&self.spec.namespace, &self.spec.name)
            .await
        {
            Ok(logs) => logs,
            Err(e) => {
                debug!("No disk sizes: {e}");
                return;
            }
        };

        let disks: Vec<_> = logs
            .iter()
            .flat_map(|log| asm::parse_disk_report(log))
            .collect();
        match asm::discovered_groups(self.spec, &disks) {
            Ok(groups) => asm::apply_discovered(&mut status.asm_disk_groups, groups),
            Err(e) => warn!("Not recording disk sizes: {e}"),
        }
    }

    async fn database_status(&self, pod: &str) -> DatabaseStatus {
        let service_state = match &self.spec.service_name {
            Some(svc) => Some(
                self.exec
                    .service_state(pod, svc, self.spec.db_name())
                    .await,
            ),
            None => None,
        };

        DatabaseStatus {
            db_state: self.exec.db_state(pod).await,
            role: self.exec.db_role(pod).await,
            release_update: self.exec.db_version(pod).await,
            connect_string: self.exec.connect_string(pod).await,
            pdb_connect_string: self.exec.pdb_connect_string(pod).await,
            service_name: self.spec.service_name.clone(),
            service_state,
            grid_home: self
                .exec
                .grid_home(pod)
                .await
                .ok()
                .filter(|home| !home.is_empty()),
        }
    }

    /// Replace the caller's snapshot with the result of a pass.
    pub fn apply_snapshot(status: &mut ClusterStatus, fresh: ClusterStatus) {
        if status.nodes.len() != fresh.nodes.len() {
            info!(
                "Node count changed: {} -> {}",
                status.nodes.len(),
                fresh.nodes.len()
            );
        }
        *status = fresh;
    }
}
