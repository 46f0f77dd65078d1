// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::{
    commands::{Handle, HandledResult},
    config::ClusterSpec,
    memory::SysctlConfig,
};

pub fn sysctls(spec: &ClusterSpec) -> HandledResult<()> {
    let conf = SysctlConfig::from_spec(spec)
        .handle_err(|e| eprintln!("Invalid memory configuration for {}: {e}", spec.name))?;

    if conf.is_empty() {
        println!("# no kernel parameters: memory sizing is not declared");
        return Ok(());
    }

    for (name, value) in conf.to_pairs() {
        println!("{name} = {value}");
    }
    Ok(())
}
