// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! ASM disk-group status, discovered from a live node and merged with what was declared.

use log::debug;
use serde::Deserialize;

use crate::{
    config::{ClusterSpec, DiskGroupType},
    exec::RemoteExecutor,
    status::{AsmDiskGroupStatus, AsmDiskStatus},
};

/// Discover the disk groups mounted on `pod`.
///
/// Each group's member disks and redundancy are queried separately; a failure for one group
/// leaves that group with placeholder values and does not affect the others. Disk sizes are
/// carried over from `previous`, since a disk's size does not change once it has been recorded.
pub async fn aggregate(
    exec: &RemoteExecutor<'_>,
    pod: &str,
    spec: &ClusterSpec,
    previous: &[AsmDiskGroupStatus],
) -> Vec<AsmDiskGroupStatus> {
    let names = exec.asm_diskgroups(pod).await;
    if names.is_empty() {
        debug!("No ASM disk groups reported by {pod}");
    }

    let mut groups = Vec::with_capacity(names.len());
    for name in names {
        let disks = exec.asm_disks(pod, &name).await;
        let redundancy = exec.dg_redundancy(pod, &name).await;
        groups.push(build_group(&name, &disks, redundancy, spec, previous));
    }
    groups
}

fn build_group(
    name: &str,
    disks: &[String],
    redundancy: String,
    spec: &ClusterSpec,
    previous: &[AsmDiskGroupStatus],
) -> AsmDiskGroupStatus {
    let declared = spec.disk_group(name);

    AsmDiskGroupStatus {
        name: name.to_string(),
        kind: declared.map(|dg| dg.kind),
        redundancy,
        auto_update: declared.is_some_and(|dg| dg.auto_update),
        storage_class: declared.and_then(|dg| dg.storage_class.clone()),
        disks: disks
            .iter()
            .map(|disk| AsmDiskStatus {
                name: disk.clone(),
                size_gb: recorded_size(previous, name, disk),
                valid: true,
            })
            .collect(),
    }
}

/// Size recorded for `disk` of group `group` in an earlier pass, or 0 if there is none.
fn recorded_size(previous: &[AsmDiskGroupStatus], group: &str, disk: &str) -> u64 {
    previous
        .iter()
        .filter(|dg| dg.name == group)
        .flat_map(|dg| dg.disks.iter())
        .find(|d| d.name == disk)
        .map_or(0, |d| d.size_gb)
}

/// Members of one disk group reported different sizes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("disk group '{group}' has mismatched disk sizes: disk '{disk}' = {size_gb}GB, expected {expected_gb}GB")]
pub struct SizeMismatchError {
    pub group: String,
    pub disk: String,
    pub size_gb: u64,
    pub expected_gb: u64,
}

/// One line of disk-check output.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiskReport {
    disk: String,
    #[serde(default)]
    valid: bool,
    #[serde(default)]
    size_gb: u64,
}

/// Parse the output of a disk-check container: one JSON object per line, of the form
/// `{"disk": "/dev/sdb", "valid": true, "sizeGb": 100}`. Lines that do not decode are skipped.
pub fn parse_disk_report(output: &str) -> Vec<AsmDiskStatus> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<DiskReport>(line) {
            Ok(report) => Some(AsmDiskStatus {
                name: report.disk,
                size_gb: report.size_gb,
                valid: report.valid,
            }),
            Err(e) => {
                debug!("Skipping disk-check line '{line}': {e}");
                None
            }
        })
        .collect()
}

/// Sort discovered disks into the declared disk groups.
///
/// `OTHERS` groups and groups with no discovered member are left out. All members of a group
/// must have the same size.
pub fn discovered_groups(
    spec: &ClusterSpec,
    disks: &[AsmDiskStatus],
) -> Result<Vec<AsmDiskGroupStatus>, SizeMismatchError> {
    let mut groups = Vec::new();
    for declared in spec
        .disk_groups
        .iter()
        .filter(|dg| dg.kind != DiskGroupType::Others)
    {
        let members: Vec<AsmDiskStatus> = declared
            .disks
            .iter()
            .filter_map(|name| disks.iter().find(|d| &d.name == name))
            .cloned()
            .collect();
        let Some(first) = members.first() else {
            continue;
        };

        if let Some(odd) = members.iter().find(|d| d.size_gb != first.size_gb) {
            return Err(SizeMismatchError {
                group: declared.name.clone(),
                disk: odd.name.clone(),
                size_gb: odd.size_gb,
                expected_gb: first.size_gb,
            });
        }

        groups.push(AsmDiskGroupStatus {
            name: declared.name.clone(),
            kind: Some(declared.kind),
            redundancy: String::new(),
            auto_update: declared.auto_update,
            storage_class: declared.storage_class.clone(),
            disks: members,
        });
    }
    Ok(groups)
}

/// Record discovered sizes and validity in `groups`.
///
/// A disk that already has a size keeps it. A discovered group that ASM has not reported yet is
/// added, unless a group filled in for its type stands in for it.
pub fn apply_discovered(
    groups: &mut Vec<AsmDiskGroupStatus>,
    discovered: Vec<AsmDiskGroupStatus>,
) {
    for found in discovered {
        let idx = groups.iter().position(|g| g.name == found.name).or_else(|| {
            groups.iter().position(|g| {
                g.kind == found.kind && found.kind.is_some_and(|k| g.name == k.to_string())
            })
        });

        let Some(idx) = idx else {
            debug!("Adding discovered disk group {}", found.name);
            groups.push(found);
            continue;
        };

        for disk in groups[idx].disks.iter_mut() {
            if let Some(report) = found.disks.iter().find(|d| d.name == disk.name) {
                if disk.size_gb == 0 {
                    disk.size_gb = report.size_gb;
                }
                disk.valid = report.valid;
            }
        }
    }
}

/// Replace the disks of the group of type `kind` with `devices`. A group named after the type is
/// added if none exists. An empty device list changes nothing.
pub fn set_group_devices(
    groups: &mut Vec<AsmDiskGroupStatus>,
    kind: DiskGroupType,
    devices: &[String],
) {
    let disks: Vec<AsmDiskStatus> = devices
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(|d| AsmDiskStatus {
            name: d.to_string(),
            size_gb: 0,
            valid: true,
        })
        .collect();
    if disks.is_empty() {
        return;
    }

    match groups.iter_mut().find(|g| g.kind == Some(kind)) {
        Some(group) => group.disks = disks,
        None => groups.push(AsmDiskGroupStatus {
            name: kind.to_string(),
            kind: Some(kind),
            redundancy: String::new(),
            auto_update: false,
            storage_class: None,
            disks,
        }),
    }
}

/// Comma-separated list of the valid disks in groups of type `kind`.
pub fn devices_by_type(groups: &[AsmDiskGroupStatus], kind: DiskGroupType) -> String {
    groups
        .iter()
        .filter(|g| g.kind == Some(kind))
        .flat_map(|g| g.disks.iter())
        .filter(|d| d.valid)
        .map(|d| d.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ClusterSpec {
        ClusterSpec::parse(
            r#"
name = "db"

[topology]
mode = "cluster"
node_count = 1
node_name = "racnode"

[[disk_groups]]
name = "DATA"
type = "DBDATA"
disks = ["/dev/asm-disk1", "/dev/asm-disk2"]
auto_update = true
storage_class = "local"
"#,
        )
        .unwrap()
    }

    fn disk(name: &str, size_gb: u64) -> AsmDiskStatus {
        AsmDiskStatus {
            name: name.to_string(),
            size_gb,
            valid: true,
        }
    }

    #[test]
    fn sizes_carry_forward() {
        let previous = vec![AsmDiskGroupStatus {
            name: "DATA".to_string(),
            kind: Some(DiskGroupType::DbData),
            redundancy: "EXTERN".to_string(),
            auto_update: true,
            storage_class: None,
            disks: vec![disk("/dev/asm-disk1", 50)],
        }];
        let disks = vec!["/dev/asm-disk1".to_string(), "/dev/asm-disk2".to_string()];

        let group = build_group("DATA", &disks, "EXTERN".to_string(), &spec(), &previous);
        assert_eq!(group.disks, vec![disk("/dev/asm-disk1", 50), disk("/dev/asm-disk2", 0)]);
        assert_eq!(group.kind, Some(DiskGroupType::DbData));
        assert!(group.auto_update);
        assert_eq!(group.storage_class.as_deref(), Some("local"));
    }

    #[test]
    fn undeclared_group() {
        let group = build_group("RECO", &[], "Pending".to_string(), &spec(), &[]);
        assert_eq!(group.kind, None);
        assert!(!group.auto_update);
        assert!(group.disks.is_empty());
    }

    #[test]
    fn size_only_matches_same_group() {
        let previous = vec![AsmDiskGroupStatus {
            name: "RECO".to_string(),
            kind: None,
            redundancy: String::new(),
            auto_update: false,
            storage_class: None,
            disks: vec![disk("/dev/asm-disk1", 50)],
        }];
        assert_eq!(recorded_size(&previous, "DATA", "/dev/asm-disk1"), 0);
        assert_eq!(recorded_size(&previous, "RECO", "/dev/asm-disk1"), 50);
    }

    #[test]
    fn disk_report_lines() {
        let disks = parse_disk_report(
            r#"{"disk": "/dev/asm-disk1", "valid": true, "sizeGb": 50}
starting disk check
{"disk": "/dev/asm-disk2", "valid": false, "sizeGb": 100}

{"disk": "/dev/asm-disk3", "valid": true, "sizeGb": -1}
"#,
        );
        assert_eq!(
            disks,
            vec![
                disk("/dev/asm-disk1", 50),
                AsmDiskStatus {
                    valid: false,
                    ..disk("/dev/asm-disk2", 100)
                },
            ]
        );
    }

    #[test]
    fn discovered_disks_sorted_into_declared_groups() {
        let spec = ClusterSpec::parse(
            r#"
name = "db"

[topology]
mode = "cluster"
node_count = 1
node_name = "racnode"

[[disk_groups]]
name = "DATA"
type = "DBDATA"
disks = ["/dev/asm-disk1", "/dev/asm-disk2"]

[[disk_groups]]
name = "SCRATCH"
type = "OTHERS"
disks = ["/dev/asm-disk3"]

[[disk_groups]]
name = "RECO"
type = "DBRECOVERY"
disks = ["/dev/asm-disk4"]
"#,
        )
        .unwrap();
        let disks = vec![
            disk("/dev/asm-disk1", 100),
            disk("/dev/asm-disk2", 100),
            disk("/dev/asm-disk3", 10),
        ];

        let groups = discovered_groups(&spec, &disks).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "DATA");
        assert_eq!(groups[0].kind, Some(DiskGroupType::DbData));
        assert_eq!(groups[0].disks.len(), 2);

        let disks = vec![disk("/dev/asm-disk1", 100), disk("/dev/asm-disk2", 200)];
        assert_eq!(
            discovered_groups(&spec, &disks),
            Err(SizeMismatchError {
                group: "DATA".to_string(),
                disk: "/dev/asm-disk2".to_string(),
                size_gb: 200,
                expected_gb: 100,
            })
        );
    }

    #[test]
    fn discovered_sizes_are_recorded_once() {
        let mut groups = vec![AsmDiskGroupStatus {
            name: "DATA".to_string(),
            kind: Some(DiskGroupType::DbData),
            redundancy: "EXTERN".to_string(),
            auto_update: true,
            storage_class: None,
            disks: vec![disk("/dev/asm-disk1", 50), disk("/dev/asm-disk2", 0)],
        }];
        let found = AsmDiskGroupStatus {
            disks: vec![
                disk("/dev/asm-disk1", 80),
                AsmDiskStatus {
                    valid: false,
                    ..disk("/dev/asm-disk2", 80)
                },
            ],
            ..groups[0].clone()
        };

        apply_discovered(&mut groups, vec![found]);
        assert_eq!(groups[0].disks[0], disk("/dev/asm-disk1", 50));
        assert_eq!(groups[0].disks[1].size_gb, 80);
        assert!(!groups[0].disks[1].valid);
        assert_eq!(groups[0].redundancy, "EXTERN");
    }

    #[test]
    fn discovered_group_fills_type_placeholder() {
        let mut groups = Vec::new();
        set_group_devices(&mut groups, DiskGroupType::DbData, &["/dev/asm-disk2".to_string()]);
        let found = AsmDiskGroupStatus {
            name: "DATA".to_string(),
            kind: Some(DiskGroupType::DbData),
            redundancy: String::new(),
            auto_update: false,
            storage_class: None,
            disks: vec![disk("/dev/asm-disk2", 100)],
        };

        apply_discovered(&mut groups, vec![found.clone()]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].disks[0].size_gb, 100);

        let mut groups = Vec::new();
        apply_discovered(&mut groups, vec![found.clone()]);
        assert_eq!(groups, vec![found]);
    }

    #[test]
    fn set_devices_by_type() {
        let mut groups = Vec::new();
        set_group_devices(&mut groups, DiskGroupType::Crs, &[]);
        assert!(groups.is_empty());

        let devices = vec![" /dev/asm-disk3 ".to_string(), "".to_string()];
        set_group_devices(&mut groups, DiskGroupType::Crs, &devices);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "CRS");
        assert_eq!(devices_by_type(&groups, DiskGroupType::Crs), "/dev/asm-disk3");

        let devices = vec!["/dev/asm-disk4".to_string(), "/dev/asm-disk5".to_string()];
        set_group_devices(&mut groups, DiskGroupType::Crs, &devices);
        assert_eq!(groups.len(), 1);
        assert_eq!(
            devices_by_type(&groups, DiskGroupType::Crs),
            "/dev/asm-disk4,/dev/asm-disk5"
        );
        assert_eq!(devices_by_type(&groups, DiskGroupType::DbData), "");

        groups[0].disks[0].valid = false;
        assert_eq!(devices_by_type(&groups, DiskGroupType::Crs), "/dev/asm-disk5");
    }
}
