// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod asm;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod exec;
pub mod memory;
pub mod naming;
pub mod network;
pub mod node;
pub mod platform;
pub mod state;
pub mod status;
pub mod test_env;

pub use cluster::Reconciler;
pub use config::ClusterSpec;
pub use status::ClusterStatus;

pub fn default_config_path() -> String {
    match std::env::var("RACTOPO_CONFIG") {
        Ok(conf) => conf,
        Err(_) => "/etc/ractopo/cluster.toml".to_string(),
    }
}

/// Directory on the node that holds the startup and diagnostic scripts.
pub fn default_script_mount() -> String {
    match std::env::var("RACTOPO_SCRIPT_MOUNT") {
        Ok(dir) => dir,
        Err(_) => "/opt/scripts/startup/scripts".to_string(),
    }
}

pub fn default_python() -> String {
    match std::env::var("RACTOPO_PYTHON") {
        Ok(python) => python,
        Err(_) => "/bin/python3".to_string(),
    }
}
