// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Run diagnostics inside a node's pod and interpret what they print.
//!
//! A diagnostic that cannot run is not a failure of the reconciliation pass. The typed accessors
//! on `RemoteExecutor` log the error and return a placeholder instead, so an unreachable node
//! simply reports nothing useful until a later pass.

pub mod commands;

use log::debug;

use crate::{
    platform::{ExecChannel, ObjectStore, PodPhase},
    state::{self, ClusterHealth, InstanceState, NodeState},
};

use commands::ScriptCommands;

/// Placeholder reported by a text accessor when its diagnostic could not run.
pub const PENDING: &str = "Pending";

/// Reported by `db_version` when the node answers with an error.
pub const NOT_AVAILABLE: &str = "NOTAVAILABLE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn new(stdout: &str) -> Self {
        ExecOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("exec stream into pod '{pod}' failed: {reason}")]
    Stream {
        pod: String,
        reason: String,
        stdout: String,
        stderr: String,
    },

    #[error("command in pod '{pod}' exited with status {status}: {}", .stderr.trim())]
    Exit {
        pod: String,
        status: i32,
        stdout: String,
        stderr: String,
    },

    #[error("unexpected output from pod '{pod}': '{output}'")]
    Unparsable { pod: String, output: String },
}

impl ExecError {
    /// Whatever the command printed to stdout before it failed.
    pub fn stdout(&self) -> &str {
        match self {
            ExecError::Stream { stdout, .. } | ExecError::Exit { stdout, .. } => stdout,
            ExecError::Unparsable { output, .. } => output,
        }
    }
}

/// Runs diagnostics in the pods of one cluster.
pub struct RemoteExecutor<'a> {
    store: &'a dyn ObjectStore,
    channel: &'a dyn ExecChannel,
    namespace: String,
    scripts: ScriptCommands,
}

impl<'a> RemoteExecutor<'a> {
    pub fn new(store: &'a dyn ObjectStore, channel: &'a dyn ExecChannel, namespace: &str) -> Self {
        Self::with_scripts(store, channel, namespace, ScriptCommands::default())
    }

    pub fn with_scripts(
        store: &'a dyn ObjectStore,
        channel: &'a dyn ExecChannel,
        namespace: &str,
        scripts: ScriptCommands,
    ) -> Self {
        RemoteExecutor {
            store,
            channel,
            namespace: namespace.to_string(),
            scripts,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Run `argv` in `pod`.
    ///
    /// A pod that does not exist or is not running yields empty output rather than an error, so
    /// callers see "no data yet" for a node that is still coming up.
    pub async fn run(&self, pod: &str, argv: &[String]) -> Result<ExecOutput, ExecError> {
        let info = match self.store.get_pod(&self.namespace, pod).await {
            Ok(info) => info,
            Err(e) => {
                debug!("Skipping exec in {pod}: {e}");
                return Ok(ExecOutput::default());
            }
        };

        if info.phase != PodPhase::Running {
            debug!("Skipping exec in {pod}: pod phase is {:?}", info.phase);
            return Ok(ExecOutput::default());
        }

        self.channel.exec(&self.namespace, pod, argv).await
    }

    /// Run a diagnostic and return its stdout, or `None` after logging the failure.
    async fn probe(&self, pod: &str, argv: &[String], what: &str) -> Option<String> {
        match self.run(pod, argv).await {
            Ok(out) => Some(out.stdout),
            Err(e) => {
                debug!("Could not get {what} from {pod}: {e}");
                None
            }
        }
    }

    async fn probe_trimmed(&self, pod: &str, argv: &[String], what: &str) -> String {
        match self.probe(pod, argv, what).await {
            Some(out) => out.trim().to_string(),
            None => PENDING.to_string(),
        }
    }

    pub async fn cluster_health(&self, pod: &str) -> ClusterHealth {
        match self
            .probe(pod, &self.scripts.cluster_health(), "cluster health")
            .await
        {
            Some(out) => ClusterHealth::parse(&out),
            None => ClusterHealth::Pending,
        }
    }

    pub async fn instance_state(&self, pod: &str) -> InstanceState {
        match self
            .probe(pod, &self.scripts.instance_state(), "instance state")
            .await
        {
            Some(out) => InstanceState::parse(&out),
            None => InstanceState::Pending,
        }
    }

    /// Names of the ASM disk groups mounted on the node. Empty when the list is not known yet.
    pub async fn asm_diskgroups(&self, pod: &str) -> Vec<String> {
        let Some(out) = self
            .probe(pod, &self.scripts.asm_diskgroups(), "ASM disk groups")
            .await
        else {
            return Vec::new();
        };

        let out = out.trim();
        if out.is_empty() || out == PENDING {
            return Vec::new();
        }
        out.split(',')
            .map(str::trim)
            .filter(|dg| !dg.is_empty())
            .map(String::from)
            .collect()
    }

    /// Member disks of `diskgroup`, one per line and/or comma-separated.
    pub async fn asm_disks(&self, pod: &str, diskgroup: &str) -> Vec<String> {
        let Some(out) = self
            .probe(pod, &self.scripts.asm_disks(diskgroup), "ASM disks")
            .await
        else {
            return Vec::new();
        };

        out.replace('\r', "")
            .lines()
            .flat_map(|line| line.split(','))
            .map(str::trim)
            .filter(|disk| !disk.is_empty())
            .map(String::from)
            .collect()
    }

    pub async fn dg_redundancy(&self, pod: &str, diskgroup: &str) -> String {
        self.probe_trimmed(
            pod,
            &self.scripts.dg_redundancy(diskgroup),
            "disk group redundancy",
        )
        .await
    }

    /// Provisioning progress recorded on the node. Unreadable counts as `Pending`.
    pub async fn state_file(&self, pod: &str) -> NodeState {
        match self.probe(pod, &commands::state_file(), "state file").await {
            Some(out) => state::parse_state_file(&out),
            None => NodeState::Pending,
        }
    }

    pub async fn db_state(&self, pod: &str) -> String {
        self.probe_trimmed(pod, &self.scripts.db_state(), "database state")
            .await
    }

    pub async fn db_role(&self, pod: &str) -> String {
        self.probe_trimmed(pod, &self.scripts.db_role(), "database role")
            .await
    }

    pub async fn connect_string(&self, pod: &str) -> String {
        self.probe_trimmed(pod, &self.scripts.connect_string(), "connect string")
            .await
    }

    pub async fn pdb_connect_string(&self, pod: &str) -> String {
        self.probe_trimmed(
            pod,
            &self.scripts.pdb_connect_string(),
            "PDB connect string",
        )
        .await
    }

    pub async fn db_version(&self, pod: &str) -> String {
        match self
            .probe(pod, &self.scripts.db_version(), "database version")
            .await
        {
            Some(out) if out.contains("ERROR") => NOT_AVAILABLE.to_string(),
            Some(out) => out.trim().to_string(),
            None => PENDING.to_string(),
        }
    }

    pub async fn service_state(&self, pod: &str, service: &str, db_name: &str) -> String {
        self.probe_trimmed(
            pod,
            &self.scripts.service_state(service, db_name),
            "service state",
        )
        .await
    }

    /// Grid infrastructure home of the node. Unlike the other accessors, failure is returned.
    pub async fn grid_home(&self, pod: &str) -> Result<String, ExecError> {
        let out = self.run(pod, &commands::grid_home()).await?;
        let out = out.stdout.trim();
        Ok(match out.split_once('=') {
            Some((_, value)) => value.trim().to_string(),
            None => out.to_string(),
        })
    }

    pub async fn crs_device_list(&self, pod: &str) -> Result<Vec<String>, ExecError> {
        self.device_list(pod, &commands::crs_device_list()).await
    }

    pub async fn db_device_list(&self, pod: &str) -> Result<Vec<String>, ExecError> {
        self.device_list(pod, &commands::db_device_list()).await
    }

    async fn device_list(&self, pod: &str, argv: &[String]) -> Result<Vec<String>, ExecError> {
        let out = self.run(pod, argv).await?;
        parse_device_list(pod, &out.stdout)
    }

    /// Device paths attached to the containers of `pod`, in spec order. Empty if the pod is
    /// missing.
    pub async fn mounted_devices(&self, pod: &str) -> Vec<String> {
        match self.store.get_pod(&self.namespace, pod).await {
            Ok(info) => info.devices,
            Err(e) => {
                debug!("Could not list mounted devices: {e}");
                Vec::new()
            }
        }
    }
}

/// Parse a `NAME=dev1,dev2,...` line from the node's environment file.
fn parse_device_list(pod: &str, output: &str) -> Result<Vec<String>, ExecError> {
    let Some((_, value)) = output.split_once('=') else {
        return Err(ExecError::Unparsable {
            pod: pod.to_string(),
            output: output.to_string(),
        });
    };

    Ok(value
        .trim()
        .replace('\r', "")
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_list_after_first_equals() {
        assert_eq!(
            parse_device_list("p", "CRS_ASM_DEVICE_LIST=/dev/asm-disk1,/dev/asm-disk2\r\n").unwrap(),
            vec!["/dev/asm-disk1", "/dev/asm-disk2"]
        );
        assert_eq!(
            parse_device_list("p", "DB_ASM_DEVICE_LIST=/dev/a=b").unwrap(),
            vec!["/dev/a=b"]
        );
        assert!(parse_device_list("p", "DB_ASM_DEVICE_LIST").is_err());
        assert!(parse_device_list("p", "X=").unwrap().is_empty());
    }

    #[test]
    fn error_keeps_output() {
        let e = ExecError::Exit {
            pod: "racnode1-0".to_string(),
            status: 1,
            stdout: "partial".to_string(),
            stderr: "boom\n".to_string(),
        };
        assert_eq!(e.stdout(), "partial");
        assert_eq!(
            e.to_string(),
            "command in pod 'racnode1-0' exited with status 1: boom"
        );
    }
}
