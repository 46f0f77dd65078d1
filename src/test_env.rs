// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! An in-memory platform for exercising the reconciler without a live cluster.
//!
//! `FakePlatform` implements both `ObjectStore` and `ExecChannel`. Its objects and the output of
//! each diagnostic are scripted up front, either in code or from a TOML fixture file, and every
//! exec it receives is recorded so a test can check what was run.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    exec::{ExecError, ExecOutput},
    platform::{
        ExecChannel, NotFoundError, ObjectStore, PodInfo, PodPhase, ServiceInfo, WorkloadInfo,
    },
};

/// Given a relative `path` in the test directory, prepend the full path to the test directory.
pub fn test_path(path: &str) -> String {
    std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()) + "/tests/" + path
}

/// Scripted result of one diagnostic.
#[derive(Debug, Clone)]
enum Response {
    Output(ExecOutput),
    Exit { status: i32, stderr: String },
    Stream(String),
}

#[derive(Debug, Default)]
struct Objects {
    workloads: HashMap<String, WorkloadInfo>,
    pods: HashMap<String, PodInfo>,
    services: HashMap<String, ServiceInfo>,
    attachments: HashMap<String, String>,
    /// Disk-check output by pod name.
    disk_checks: BTreeMap<String, String>,
    /// Keyed by pod name and the last element of the command's argv.
    responses: HashMap<(String, String), Response>,
    exec_log: Vec<(String, Vec<String>)>,
}

/// A scripted platform. Namespaces are ignored: every object lives in one flat namespace.
#[derive(Debug, Default, Clone)]
pub struct FakePlatform {
    objects: Arc<Mutex<Objects>>,
}

fn key_of(argv: &[String]) -> String {
    argv.last().cloned().unwrap_or_default()
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node whose workload exists and whose pod `<name>-0` is running and ready, with a
    /// virtual IP service `<name>-vip`.
    pub fn add_node(&self, name: &str) {
        let pod = format!("{name}-0");
        let mut objects = self.objects.lock().unwrap();
        objects.workloads.insert(
            name.to_string(),
            WorkloadInfo {
                name: name.to_string(),
                replicas: 1,
                ready_replicas: 1,
            },
        );
        objects.pods.insert(
            pod.clone(),
            PodInfo {
                name: pod,
                phase: PodPhase::Running,
                ready: true,
                devices: Vec::new(),
            },
        );
        let vip = format!("{name}-vip");
        objects.services.insert(
            vip.clone(),
            ServiceInfo {
                name: vip,
                cluster_ip: None,
                external_ip: None,
            },
        );
    }

    pub fn set_pod(&self, pod: PodInfo) {
        self.objects
            .lock()
            .unwrap()
            .pods
            .insert(pod.name.clone(), pod);
    }

    pub fn set_pod_phase(&self, pod: &str, phase: PodPhase, ready: bool) {
        if let Some(info) = self.objects.lock().unwrap().pods.get_mut(pod) {
            info.phase = phase;
            info.ready = ready;
        }
    }

    pub fn set_devices(&self, pod: &str, devices: &[&str]) {
        if let Some(info) = self.objects.lock().unwrap().pods.get_mut(pod) {
            info.devices = devices.iter().map(|d| d.to_string()).collect();
        }
    }

    pub fn remove_pod(&self, pod: &str) {
        self.objects.lock().unwrap().pods.remove(pod);
    }

    pub fn remove_workload(&self, name: &str) {
        let mut objects = self.objects.lock().unwrap();
        objects.workloads.remove(name);
        objects.pods.remove(&format!("{name}-0"));
    }

    pub fn set_service(&self, service: ServiceInfo) {
        self.objects
            .lock()
            .unwrap()
            .services
            .insert(service.name.clone(), service);
    }

    pub fn set_attachment(&self, name: &str, config: &str) {
        self.objects
            .lock()
            .unwrap()
            .attachments
            .insert(name.to_string(), config.to_string());
    }

    /// Set the disk-check output of `pod`, one JSON object per line.
    pub fn set_disk_check(&self, pod: &str, log: &str) {
        self.objects
            .lock()
            .unwrap()
            .disk_checks
            .insert(pod.to_string(), log.to_string());
    }

    pub fn clear_disk_checks(&self) {
        self.objects.lock().unwrap().disk_checks.clear();
    }

    /// Script the stdout of the diagnostic whose last argument is `command` in `pod`.
    pub fn respond(&self, pod: &str, command: &str, stdout: &str) {
        self.script(pod, command, Response::Output(ExecOutput::new(stdout)));
    }

    /// Script the diagnostic whose last argument is `command` in `pod` to exit with `status`.
    pub fn fail(&self, pod: &str, command: &str, status: i32) {
        self.script(
            pod,
            command,
            Response::Exit {
                status,
                stderr: format!("{command}: failed"),
            },
        );
    }

    /// Script the exec stream for the diagnostic to break.
    pub fn break_stream(&self, pod: &str, command: &str) {
        self.script(pod, command, Response::Stream("connection reset".to_string()));
    }

    fn script(&self, pod: &str, command: &str, response: Response) {
        self.objects
            .lock()
            .unwrap()
            .responses
            .insert((pod.to_string(), command.to_string()), response);
    }

    /// Every exec received so far, as `(pod, argv)`.
    pub fn exec_log(&self) -> Vec<(String, Vec<String>)> {
        self.objects.lock().unwrap().exec_log.clone()
    }

    /// Number of execs received in `pod` whose last argument is `command`.
    pub fn exec_count(&self, pod: &str, command: &str) -> usize {
        self.objects
            .lock()
            .unwrap()
            .exec_log
            .iter()
            .filter(|(p, argv)| p == pod && key_of(argv) == command)
            .count()
    }

    pub fn clear_exec_log(&self) {
        self.objects.lock().unwrap().exec_log.clear();
    }

    /// Build a platform from a TOML fixture.
    pub fn from_fixture(contents: &str) -> Result<Self, toml::de::Error> {
        let fixture: Fixture = toml::from_str(contents)?;
        let platform = FakePlatform::new();

        for name in &fixture.nodes {
            platform.add_node(name);
        }
        for pod in fixture.pods {
            platform.set_pod(PodInfo {
                phase: PodPhase::from(pod.phase.as_str()),
                name: pod.name,
                ready: pod.ready,
                devices: pod.devices,
            });
        }
        for attachment in fixture.attachments {
            platform.set_attachment(&attachment.name, &attachment.config);
        }
        for check in fixture.disk_checks {
            platform.set_disk_check(&check.pod, &check.log);
        }
        for exec in fixture.exec {
            match exec.status {
                0 => platform.respond(&exec.pod, &exec.command, &exec.stdout),
                status => platform.fail(&exec.pod, &exec.command, status),
            }
        }
        Ok(platform)
    }
}

#[derive(Deserialize)]
struct Fixture {
    #[serde(default)]
    nodes: Vec<String>,
    #[serde(default)]
    pods: Vec<FixturePod>,
    #[serde(default)]
    attachments: Vec<FixtureAttachment>,
    #[serde(default)]
    disk_checks: Vec<FixtureDiskCheck>,
    #[serde(default)]
    exec: Vec<FixtureExec>,
}

#[derive(Deserialize)]
struct FixtureDiskCheck {
    pod: String,
    log: String,
}

#[derive(Deserialize)]
struct FixturePod {
    name: String,
    phase: String,
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    devices: Vec<String>,
}

#[derive(Deserialize)]
struct FixtureAttachment {
    name: String,
    config: String,
}

#[derive(Deserialize)]
struct FixtureExec {
    pod: String,
    command: String,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    status: i32,
}

#[async_trait]
impl ObjectStore for FakePlatform {
    async fn get_workload(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<WorkloadInfo, NotFoundError> {
        self.objects
            .lock()
            .unwrap()
            .workloads
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError::new("workload", namespace, name))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodInfo, NotFoundError> {
        self.objects
            .lock()
            .unwrap()
            .pods
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError::new("pod", namespace, name))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<ServiceInfo, NotFoundError> {
        self.objects
            .lock()
            .unwrap()
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError::new("service", namespace, name))
    }

    async fn get_network_attachment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<String, NotFoundError> {
        self.objects
            .lock()
            .unwrap()
            .attachments
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError::new("network attachment", namespace, name))
    }

    async fn get_disk_check_logs(
        &self,
        namespace: &str,
        cluster: &str,
    ) -> Result<Vec<String>, NotFoundError> {
        let objects = self.objects.lock().unwrap();
        if objects.disk_checks.is_empty() {
            return Err(NotFoundError::new("disk-check daemon set", namespace, cluster));
        }
        Ok(objects.disk_checks.values().cloned().collect())
    }
}

#[async_trait]
impl ExecChannel for FakePlatform {
    async fn exec(
        &self,
        _namespace: &str,
        pod: &str,
        argv: &[String],
    ) -> Result<ExecOutput, ExecError> {
        let mut objects = self.objects.lock().unwrap();
        objects.exec_log.push((pod.to_string(), argv.to_vec()));

        let key = (pod.to_string(), key_of(argv));
        match objects.responses.get(&key).cloned() {
            Some(Response::Output(out)) => Ok(out),
            Some(Response::Exit { status, stderr }) => Err(ExecError::Exit {
                pod: pod.to_string(),
                status,
                stdout: String::new(),
                stderr,
            }),
            Some(Response::Stream(reason)) => Err(ExecError::Stream {
                pod: pod.to_string(),
                reason,
                stdout: String::new(),
                stderr: String::new(),
            }),
            None => Err(ExecError::Exit {
                pod: pod.to_string(),
                status: 127,
                stdout: String::new(),
                stderr: format!("{}: command not found", key.1),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_exec() {
        let platform = FakePlatform::new();
        platform.add_node("racnode1");
        platform.respond("racnode1-0", "--checkgilocal=true", "HEALTHY\n");

        let argv = vec!["main.py".to_string(), "--checkgilocal=true".to_string()];
        let out = platform.exec("rac", "racnode1-0", &argv).await.unwrap();
        assert_eq!(out.stdout, "HEALTHY\n");

        let argv = vec!["main.py".to_string(), "--checkracinst=true".to_string()];
        assert!(matches!(
            platform.exec("rac", "racnode1-0", &argv).await,
            Err(ExecError::Exit { status: 127, .. })
        ));
        assert_eq!(platform.exec_log().len(), 2);
    }

    #[test]
    fn fixture() {
        let platform = FakePlatform::from_fixture(
            r#"
nodes = ["racnode1"]

[[pods]]
name = "racnode2-0"
phase = "Pending"

[[disk_checks]]
pod = "disk-check-a"
log = '{"disk": "/dev/asm-disk1", "valid": true, "sizeGb": 50}'

[[exec]]
pod = "racnode1-0"
command = "--checkgilocal=true"
stdout = "HEALTHY"
"#,
        )
        .unwrap();

        let objects = platform.objects.lock().unwrap();
        assert!(objects.workloads.contains_key("racnode1"));
        assert_eq!(objects.pods["racnode2-0"].phase, PodPhase::Pending);
        assert_eq!(objects.responses.len(), 1);
        assert_eq!(objects.disk_checks.len(), 1);
    }

    #[tokio::test]
    async fn disk_check_logs() {
        let platform = FakePlatform::new();
        assert!(platform.get_disk_check_logs("rac", "db").await.is_err());

        platform.set_disk_check("disk-check-b", "b");
        platform.set_disk_check("disk-check-a", "a");
        assert_eq!(
            platform.get_disk_check_logs("rac", "db").await.unwrap(),
            vec!["a", "b"]
        );
    }
}
