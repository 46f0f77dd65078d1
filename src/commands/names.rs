// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Args;

use crate::{commands::HandledResult, config::ClusterSpec, naming};

#[derive(Args, Debug, Clone)]
pub struct NamesArgs {
    /// Only print the storage object names.
    #[arg(short, long)]
    storage: bool,
}

pub fn names(spec: &ClusterSpec, args: &NamesArgs) -> HandledResult<()> {
    if !args.storage {
        for node in spec.nodes() {
            println!(
                "node {}: pod={} vip={}",
                node.name,
                node.pod_name(),
                node.vip_service
            );
        }
    }

    for dg in &spec.disk_groups {
        for disk in &dg.disks {
            println!(
                "{} {disk}: pvc={} pv={}",
                dg.name,
                naming::asm_pvc_name(disk, &spec.name),
                naming::asm_pv_name(disk, &spec.name)
            );
        }
    }
    Ok(())
}
