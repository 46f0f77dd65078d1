// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use ractopo_lib::{
        config::{ClusterSpec, DiskGroupType},
        platform::PodPhase,
        state::NodeState,
        status::{AsmDiskGroupStatus, AsmDiskStatus, ClusterStatus},
        test_env::{test_path, FakePlatform},
        Reconciler,
    };

    fn spec() -> ClusterSpec {
        ClusterSpec::from_file(&test_path("cluster.toml")).unwrap()
    }

    fn platform() -> FakePlatform {
        let contents = std::fs::read_to_string(test_path("fixtures/three_nodes.toml")).unwrap();
        FakePlatform::from_fixture(&contents).unwrap()
    }

    async fn passes(reconciler: &Reconciler<'_>, status: &mut ClusterStatus, n: usize) {
        for _ in 0..n {
            let fresh = reconciler.reconcile(status).await;
            Reconciler::apply_snapshot(status, fresh);
        }
    }

    #[tokio::test]
    async fn three_node_cluster_becomes_available() {
        let spec = spec();
        let platform = platform();
        let reconciler = Reconciler::new(&spec, &platform, &platform);
        let mut status = ClusterStatus::default();

        passes(&reconciler, &mut status, 1).await;
        assert_eq!(status.nodes.len(), 3);
        assert!(status.nodes.iter().all(|n| n.state == NodeState::Pending));
        assert_eq!(status.state, NodeState::Pending);
        assert!(status.observed_at.is_some());

        passes(&reconciler, &mut status, 1).await;
        assert!(status.nodes.iter().all(|n| n.state == NodeState::Available));
        assert_eq!(status.state, NodeState::Available);

        let names: Vec<&str> = status.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["racnode1", "racnode2", "racnode3"]);
        assert_eq!(
            status.nodes[0].mounted_devices,
            vec!["/dev/asm-disk1", "/dev/asm-disk2", "/dev/asm-disk3"]
        );
    }

    #[tokio::test]
    async fn cluster_facts_come_from_healthy_node() {
        let spec = spec();
        let platform = platform();
        let reconciler = Reconciler::new(&spec, &platform, &platform);
        let mut status = ClusterStatus::default();
        passes(&reconciler, &mut status, 2).await;

        let groups = &status.asm_disk_groups;
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "CRS");
        assert_eq!(groups[0].kind, Some(DiskGroupType::Crs));
        assert_eq!(groups[0].redundancy, "EXTERN");
        assert_eq!(groups[0].disks.len(), 1);
        assert_eq!(groups[1].disks[1].name, "/dev/asm-disk3");
        assert!(groups[1].auto_update);
        assert_eq!(groups[1].storage_class.as_deref(), Some("local-block"));

        let db = &status.database;
        assert_eq!(db.db_state, "OPEN");
        assert_eq!(db.role, "PRIMARY");
        assert_eq!(db.release_update, "19.28.0.0.0");
        assert_eq!(db.connect_string, "racnode-scan.rac:1521/ORCLCDB");
        assert_eq!(db.pdb_connect_string, "Pending");
        assert_eq!(db.service_name.as_deref(), Some("soepdb"));
        assert_eq!(db.service_state.as_deref(), Some("Pending"));
        assert_eq!(db.grid_home, None);
    }

    #[tokio::test]
    async fn phases_from_platform_objects() {
        let spec = spec();
        let platform = platform();
        let reconciler = Reconciler::new(&spec, &platform, &platform);
        let nodes = spec.nodes();

        assert_eq!(reconciler.probe_phase(&nodes[0]).await, NodeState::PodAvailable);

        platform.set_pod_phase("racnode1-0", PodPhase::Running, false);
        assert_eq!(reconciler.probe_phase(&nodes[0]).await, NodeState::PodNotReady);

        platform.set_pod_phase("racnode1-0", PodPhase::Failed, false);
        assert_eq!(reconciler.probe_phase(&nodes[0]).await, NodeState::PodFailure);

        platform.remove_pod("racnode2-0");
        assert_eq!(reconciler.probe_phase(&nodes[1]).await, NodeState::PodNotFound);

        platform.remove_workload("racnode3");
        assert_eq!(
            reconciler.probe_phase(&nodes[2]).await,
            NodeState::StatefulSetNotFound
        );
    }

    #[tokio::test]
    async fn removed_workload_drops_node() {
        let spec = spec();
        let platform = platform();
        let reconciler = Reconciler::new(&spec, &platform, &platform);
        let mut status = ClusterStatus::default();
        passes(&reconciler, &mut status, 2).await;

        platform.remove_workload("racnode3");
        passes(&reconciler, &mut status, 1).await;

        assert_eq!(status.nodes.len(), 2);
        assert!(status.node("racnode3").is_none());
        assert_eq!(status.state, NodeState::Available);
    }

    #[tokio::test]
    async fn not_ready_pod_keeps_node_state() {
        let spec = spec();
        let platform = platform();
        let reconciler = Reconciler::new(&spec, &platform, &platform);
        let mut status = ClusterStatus::default();
        passes(&reconciler, &mut status, 2).await;

        platform.set_pod_phase("racnode2-0", PodPhase::Running, false);
        platform.clear_exec_log();
        passes(&reconciler, &mut status, 1).await;

        let node = status.node("racnode2").unwrap();
        assert_eq!(node.pod_state, NodeState::PodNotReady);
        assert_eq!(node.state, NodeState::Available);
        assert_eq!(platform.exec_count("racnode2-0", "--checkgilocal=true"), 0);
    }

    #[tokio::test]
    async fn unhealthy_cluster_is_pending() {
        let spec = spec();
        let platform = platform();
        platform.respond("racnode2-0", "--checkracinst=true", "MOUNTED");
        let reconciler = Reconciler::new(&spec, &platform, &platform);
        let mut status = ClusterStatus::default();
        passes(&reconciler, &mut status, 3).await;

        assert_eq!(status.node("racnode2").unwrap().state, NodeState::Pending);
        assert_eq!(status.state, NodeState::Pending);
    }

    #[tokio::test]
    async fn asm_failures_are_per_group() {
        let spec = spec();
        let platform = platform();
        platform.fail("racnode1-0", "--getasmdisks=CRS", 1);
        platform.fail("racnode1-0", "--getdgredundancy=CRS", 1);
        let reconciler = Reconciler::new(&spec, &platform, &platform);

        let mut previous = ClusterStatus::default();
        previous.asm_disk_groups.push(AsmDiskGroupStatus {
            name: "DATA".to_string(),
            kind: Some(DiskGroupType::DbData),
            redundancy: "EXTERN".to_string(),
            auto_update: true,
            storage_class: None,
            disks: vec![AsmDiskStatus {
                name: "/dev/asm-disk2".to_string(),
                size_gb: 100,
                valid: true,
            }],
        });

        let status = reconciler.reconcile(&previous).await;
        let crs = &status.asm_disk_groups[0];
        assert!(crs.disks.is_empty());
        assert_eq!(crs.redundancy, "Pending");

        let data = &status.asm_disk_groups[1];
        assert_eq!(data.disks[0].size_gb, 100);
        assert_eq!(data.disks[1].size_gb, 0);
    }

    const DISK_CHECK: &str = r#"{"disk": "/dev/asm-disk1", "valid": true, "sizeGb": 50}
{"disk": "/dev/asm-disk2", "valid": true, "sizeGb": 100}
{"disk": "/dev/asm-disk3", "valid": true, "sizeGb": 100}
"#;

    fn sizes(status: &ClusterStatus) -> Vec<(String, u64)> {
        status
            .asm_disk_groups
            .iter()
            .flat_map(|g| g.disks.iter())
            .map(|d| (d.name.clone(), d.size_gb))
            .collect()
    }

    fn expected_sizes() -> Vec<(String, u64)> {
        vec![
            ("/dev/asm-disk1".to_string(), 50),
            ("/dev/asm-disk2".to_string(), 100),
            ("/dev/asm-disk3".to_string(), 100),
        ]
    }

    #[tokio::test]
    async fn disk_sizes_are_discovered() {
        let spec = spec();
        let platform = platform();
        platform.set_disk_check("disk-check-racnode1", DISK_CHECK);
        let reconciler = Reconciler::new(&spec, &platform, &platform);
        let mut status = ClusterStatus::default();
        passes(&reconciler, &mut status, 2).await;

        assert_eq!(sizes(&status), expected_sizes());
        assert!(status.asm_disk_groups[1].disks.iter().all(|d| d.valid));

        // Recorded sizes do not change with later reports.
        platform.set_disk_check(
            "disk-check-racnode1",
            r#"{"disk": "/dev/asm-disk1", "valid": false, "sizeGb": 60}"#,
        );
        passes(&reconciler, &mut status, 1).await;
        assert_eq!(status.asm_disk_groups[0].disks[0].size_gb, 50);
        assert!(!status.asm_disk_groups[0].disks[0].valid);
    }

    #[tokio::test]
    async fn mismatched_disk_sizes_are_not_recorded() {
        let spec = spec();
        let platform = platform();
        platform.set_disk_check(
            "disk-check-racnode1",
            r#"{"disk": "/dev/asm-disk2", "valid": true, "sizeGb": 100}
{"disk": "/dev/asm-disk3", "valid": true, "sizeGb": 200}"#,
        );
        let reconciler = Reconciler::new(&spec, &platform, &platform);
        let mut status = ClusterStatus::default();
        passes(&reconciler, &mut status, 2).await;

        assert!(sizes(&status).iter().all(|(_, size)| *size == 0));
    }

    #[tokio::test]
    async fn sizes_survive_an_unreachable_pass() {
        let spec = spec();
        let platform = platform();
        platform.set_disk_check("disk-check-racnode1", DISK_CHECK);
        let reconciler = Reconciler::new(&spec, &platform, &platform);
        let mut status = ClusterStatus::default();
        passes(&reconciler, &mut status, 2).await;
        assert_eq!(sizes(&status), expected_sizes());

        // Sizes now come only from what was recorded.
        platform.clear_disk_checks();
        for pod in ["racnode1-0", "racnode2-0", "racnode3-0"] {
            platform.remove_pod(pod);
        }
        passes(&reconciler, &mut status, 1).await;
        assert_eq!(status.asm_disk_groups.len(), 2);
        assert_eq!(sizes(&status), expected_sizes());

        for node in ["racnode1", "racnode2", "racnode3"] {
            platform.add_node(node);
        }
        passes(&reconciler, &mut status, 1).await;
        assert_eq!(status.asm_disk_groups.len(), 2);
        assert_eq!(sizes(&status), expected_sizes());
    }

    #[tokio::test]
    async fn declared_devices_fill_in_before_asm_reports() {
        let spec = spec();
        let platform = platform();
        platform.respond("racnode1-0", "--getasmdiskgroup=true", "");
        platform.respond(
            "racnode1-0",
            "cat /etc/rac_env_vars/envfile | grep CRS_ASM_DEVICE_LIST",
            "CRS_ASM_DEVICE_LIST=/dev/asm-disk1\r\n",
        );
        let reconciler = Reconciler::new(&spec, &platform, &platform);

        let status = reconciler.reconcile(&ClusterStatus::default()).await;
        assert_eq!(status.asm_disk_groups.len(), 1);
        assert_eq!(status.asm_disk_groups[0].name, "CRS");
        assert_eq!(status.asm_disk_groups[0].disks[0].name, "/dev/asm-disk1");
    }

    #[tokio::test]
    async fn caller_supplied_phases() {
        let spec = spec();
        let platform = platform();
        let reconciler = Reconciler::new(&spec, &platform, &platform);
        let phases: Vec<_> = spec
            .nodes()
            .into_iter()
            .map(|n| (n, NodeState::PodNotFound))
            .collect();

        let status = reconciler
            .reconcile_with_phases(&ClusterStatus::default(), &phases)
            .await;
        assert_eq!(status.nodes.len(), 3);
        assert!(status
            .nodes
            .iter()
            .all(|n| n.pod_state == NodeState::PodNotFound));
        assert_eq!(status.state, NodeState::Pending);
    }

    #[tokio::test]
    async fn empty_cluster_is_pending() {
        let spec = spec();
        let platform = FakePlatform::new();
        let reconciler = Reconciler::new(&spec, &platform, &platform);

        let status = reconciler.reconcile(&ClusterStatus::default()).await;
        assert!(status.nodes.is_empty());
        assert_eq!(status.state, NodeState::Pending);
        assert!(platform.exec_log().is_empty());
    }
}
