// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Deterministic names for the platform objects that back a cluster's shared storage.
//!
//! Names are derived only from their inputs, so a later reconciliation pass can recognize a
//! volume it created earlier without keeping a separate mapping of device paths to names.

use sha1::{Digest, Sha1};

/// Longest object name the platform accepts.
pub const MAX_NAME_LEN: usize = 63;

/// Number of hex characters of the device-path digest kept in a name.
const HASH_LEN: usize = 8;

/// Kinds of storage object that get a per-device name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    VolumeClaim,
    Volume,
}

impl ResourceKind {
    fn tag(&self) -> &'static str {
        match self {
            ResourceKind::VolumeClaim => "asm-pvc",
            ResourceKind::Volume => "asm-pv",
        }
    }
}

/// Normalize `name` so it can be used as part of a platform object name: lowercase, with every
/// run of characters outside `[a-z0-9]` replaced by a single hyphen and no hyphen at either end.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut gap = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if gap && !out.is_empty() {
                out.push('-');
            }
            gap = false;
            out.push(c);
        } else {
            gap = true;
        }
    }
    out
}

fn short_hash(text: &str) -> String {
    let digest = Sha1::digest(text.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_LEN);
    hash
}

/// Build the name of the object of `kind` backing the device at `disk_path` for the cluster
/// named `cluster_name`.
///
/// The result has the form `<tag>-<hash>-<cluster>`. When it would exceed `MAX_NAME_LEN`, the
/// cluster portion is shortened; the hash is always kept whole.
pub fn resource_name(kind: ResourceKind, disk_path: &str, cluster_name: &str) -> String {
    let prefix = format!("{}-{}", kind.tag(), short_hash(disk_path));
    let mut cluster = sanitize(cluster_name);

    let room = MAX_NAME_LEN.saturating_sub(prefix.len() + 1);
    if cluster.len() > room {
        // sanitize() only emits ASCII, so any byte index is a char boundary.
        cluster.truncate(room);
        while cluster.ends_with('-') {
            cluster.pop();
        }
    }

    if cluster.is_empty() {
        prefix
    } else {
        format!("{prefix}-{cluster}")
    }
}

pub fn asm_pvc_name(disk_path: &str, cluster_name: &str) -> String {
    resource_name(ResourceKind::VolumeClaim, disk_path, cluster_name)
}

pub fn asm_pv_name(disk_path: &str, cluster_name: &str) -> String {
    resource_name(ResourceKind::Volume, disk_path, cluster_name)
}
