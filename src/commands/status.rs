// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Args;

use crate::{
    asm,
    cluster::Reconciler,
    commands::{Handle, HandledResult},
    config::{ClusterSpec, DiskGroupType},
    network,
    status::ClusterStatus,
    test_env::FakePlatform,
};

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// TOML file describing the platform objects and diagnostic output to reconcile against.
    #[arg(long)]
    fixture: String,

    /// Number of passes to run, each starting from the previous snapshot.
    #[arg(long, default_value_t = 1)]
    passes: u32,

    /// Also print each node's private network annotation.
    #[arg(long)]
    networks: bool,

    /// Also print the device list entries of the node environment file.
    #[arg(long)]
    device_env: bool,
}

pub async fn status(spec: &ClusterSpec, args: &StatusArgs) -> HandledResult<()> {
    let contents = std::fs::read_to_string(&args.fixture)
        .handle_err(|e| eprintln!("Could not open fixture file \"{}\": {e}", args.fixture))?;
    let platform = FakePlatform::from_fixture(&contents)
        .handle_err(|e| eprintln!("Invalid fixture file \"{}\": {e}", args.fixture))?;

    let reconciler = Reconciler::new(spec, &platform, &platform);
    let mut status = ClusterStatus::default();
    for _ in 0..args.passes {
        let fresh = reconciler.reconcile(&status).await;
        Reconciler::apply_snapshot(&mut status, fresh);
    }

    let json = status
        .to_json()
        .handle_err(|e| eprintln!("Could not render status: {e}"))?;
    println!("{json}");

    if args.device_env {
        for (var, kind) in [
            ("CRS_ASM_DEVICE_LIST", DiskGroupType::Crs),
            ("DB_ASM_DEVICE_LIST", DiskGroupType::DbData),
        ] {
            println!("{var}={}", asm::devices_by_type(&status.asm_disk_groups, kind));
        }
    }

    if args.networks {
        for node in spec.nodes() {
            let ids = network::allocate_all(
                node.ordinal,
                &node.private_networks,
                &platform,
                &spec.namespace,
            )
            .await;
            let annotation = network::networks_annotation(&ids)
                .handle_err(|e| eprintln!("Could not render networks for {}: {e}", node.name))?;
            println!("{}: {} = {annotation}", node.name, network::NETWORKS_ANNOTATION);
        }
    }
    Ok(())
}
