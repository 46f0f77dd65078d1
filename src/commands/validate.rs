// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::{
    commands::{Handle, HandledResult},
    config::{ClusterSpec, DiskGroupType},
    memory::SysctlConfig,
};

pub fn validate(spec: &ClusterSpec) -> HandledResult<()> {
    SysctlConfig::from_spec(spec)
        .handle_err(|e| eprintln!("Invalid memory configuration: {e}"))?;

    let nodes = spec.nodes();
    println!(
        "Cluster {} in namespace {}: {:?} topology with {} nodes",
        spec.name,
        spec.namespace,
        spec.mode(),
        nodes.len()
    );
    for node in &nodes {
        println!(
            "    {} (ordinal {}, {} private networks)",
            node.name,
            node.ordinal,
            node.private_networks.len()
        );
    }

    println!("{} disk groups:", spec.disk_groups.len());
    for dg in &spec.disk_groups {
        println!("    {} [{}]: {} disks", dg.name, dg.kind, dg.disks.len());
    }

    for kind in [DiskGroupType::Crs, DiskGroupType::DbData] {
        let devices = spec.devices_of_type(kind);
        if !devices.is_empty() {
            println!("{kind} devices: {devices}");
        }
    }
    Ok(())
}
