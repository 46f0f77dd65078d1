// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Argument vectors for the diagnostics that run inside a node's pod.
//!
//! Most diagnostics go through the node's startup script, which takes a single `--flag=value`
//! selecting what to report. The rest read files that the startup script leaves behind.

/// File the startup script writes its provisioning progress to.
pub const STATE_FILE: &str = "/tmp/orod/.statefile";

/// Environment file holding the node's grid home and device lists.
pub const ENV_FILE: &str = "/etc/rac_env_vars/envfile";

/// Builds invocations of the startup script at a given mount point.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCommands {
    mount: String,
    python: String,
}

impl Default for ScriptCommands {
    fn default() -> Self {
        ScriptCommands::new(&crate::default_script_mount(), &crate::default_python())
    }
}

impl ScriptCommands {
    pub fn new(mount: &str, python: &str) -> Self {
        ScriptCommands {
            mount: mount.trim_end_matches('/').to_string(),
            python: python.to_string(),
        }
    }

    fn script(&self, flag: String) -> Vec<String> {
        vec![
            format!("{}/cmdExec", self.mount),
            self.python.clone(),
            format!("{}/main.py", self.mount),
            flag,
        ]
    }

    pub fn cluster_health(&self) -> Vec<String> {
        self.script("--checkgilocal=true".to_string())
    }

    pub fn instance_state(&self) -> Vec<String> {
        self.script("--checkracinst=true".to_string())
    }

    pub fn db_state(&self) -> Vec<String> {
        self.script("--checkracdb=true".to_string())
    }

    pub fn connect_string(&self) -> Vec<String> {
        self.script("--checkconnstr=true".to_string())
    }

    pub fn pdb_connect_string(&self) -> Vec<String> {
        self.script("--checkpdbconnstr=true".to_string())
    }

    pub fn db_role(&self) -> Vec<String> {
        self.script("--checkdbrole=true".to_string())
    }

    pub fn db_version(&self) -> Vec<String> {
        self.script("--checkdbversion=true".to_string())
    }

    pub fn asm_diskgroups(&self) -> Vec<String> {
        self.script("--getasmdiskgroup=true".to_string())
    }

    pub fn asm_disks(&self, diskgroup: &str) -> Vec<String> {
        self.script(format!("--getasmdisks={diskgroup}"))
    }

    pub fn dg_redundancy(&self, diskgroup: &str) -> Vec<String> {
        self.script(format!("--getdgredundancy={diskgroup}"))
    }

    pub fn service_state(&self, service: &str, db_name: &str) -> Vec<String> {
        self.script(format!("--checkdbsvc=\"service={service};dbname={db_name}\""))
    }
}

pub fn state_file() -> Vec<String> {
    vec![
        "/bin/bash".to_string(),
        "-c".to_string(),
        format!("cat {STATE_FILE}"),
    ]
}

pub fn grid_home() -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("grep '^GRID_HOME=' {ENV_FILE} | cut -d'=' -f2"),
    ]
}

fn env_var(name: &str) -> Vec<String> {
    vec![
        "bash".to_string(),
        "-c".to_string(),
        format!("cat {ENV_FILE} | grep {name}"),
    ]
}

pub fn crs_device_list() -> Vec<String> {
    env_var("CRS_ASM_DEVICE_LIST")
}

pub fn db_device_list() -> Vec<String> {
    env_var("DB_ASM_DEVICE_LIST")
}
