// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Kernel shared-memory parameters for a database node, derived from its declared memory sizing.
//!
//! The values are applied when a node's workload is created. The platform does not allow them to
//! be changed on a running node, so an invalid combination must be rejected here rather than
//! corrected.

use std::collections::BTreeMap;

use crate::config::ClusterSpec;

pub const GIB: u64 = 1024 * 1024 * 1024;
pub const MIB: u64 = 1024 * 1024;

/// Smallest container memory limit a database node may be given.
pub const MIN_CONTAINER_MEMORY: u64 = 16 * GIB;

pub const PAGE_SIZE: u64 = 4096;

pub const DEFAULT_SEM: &str = "250 32000 100 128";
pub const DEFAULT_SHMMNI: &str = "4096";

pub const SHMMAX: &str = "kernel.shmmax";
pub const SHMALL: &str = "kernel.shmall";
pub const SEM: &str = "kernel.sem";
pub const SHMMNI: &str = "kernel.shmmni";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("container memory ({memory}) is less than the minimum required ({MIN_CONTAINER_MEMORY})")]
    ContainerMemoryBelowMinimum { memory: u64 },

    #[error("PGA_TARGET ({pga}) cannot be greater than container memory ({memory})")]
    PgaExceedsContainer { pga: u64, memory: u64 },

    #[error("SGA_TARGET ({sga}) cannot be greater than container memory ({memory})")]
    SgaExceedsContainer { sga: u64, memory: u64 },

    #[error("user-provided shmmax ({shmmax}) cannot be less than SGA_TARGET ({sga})")]
    ShmmaxBelowSga { shmmax: u64, sga: u64 },

    #[error("user-provided shmmax ({shmmax}) cannot be less than huge pages memory ({huge_pages})")]
    ShmmaxBelowHugePages { shmmax: u64, huge_pages: u64 },

    #[error("user-provided shmmax ({shmmax}) must not exceed container memory - 1GiB ({limit})")]
    ShmmaxAboveContainer { shmmax: u64, limit: u64 },

    #[error("huge pages ({huge_pages}) must be >= SGA_TARGET ({sga})")]
    HugePagesBelowSga { huge_pages: u64, sga: u64 },

    #[error("user-provided shmall ({shmall}) is too small; minimum required is {required} pages")]
    ShmallTooSmall { shmall: u64, required: u64 },

    #[error("SGA_TARGET ({sga}) is too large to leave 1GiB of shared memory headroom")]
    SgaTooLarge { sga: u64 },

    #[error("invalid {field} value '{value}'")]
    InvalidQuantity { field: &'static str, value: String },
}

/// Kernel parameters for one node. An empty config means "apply no tuning".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SysctlConfig {
    pub shmmax: Option<u64>,
    pub shmall: Option<u64>,
    pub sem: Option<String>,
    pub shmmni: Option<String>,
    /// Parameters passed through verbatim from the declared overrides.
    pub overrides: BTreeMap<String, String>,
}

impl SysctlConfig {
    pub fn is_empty(&self) -> bool {
        self.shmmax.is_none()
            && self.shmall.is_none()
            && self.sem.is_none()
            && self.shmmni.is_none()
            && self.overrides.is_empty()
    }

    fn computed(shmmax: u64, shmall: u64) -> Self {
        SysctlConfig {
            shmmax: Some(shmmax),
            shmall: Some(shmall),
            sem: Some(DEFAULT_SEM.to_string()),
            shmmni: Some(DEFAULT_SHMMNI.to_string()),
            overrides: BTreeMap::new(),
        }
    }

    /// The `(name, value)` pairs to place in the node's security context.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        if !self.overrides.is_empty() {
            return self
                .overrides
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
        }

        let mut pairs = Vec::new();
        if let Some(shmmax) = self.shmmax {
            pairs.push((SHMMAX.to_string(), shmmax.to_string()));
        }
        if let Some(shmall) = self.shmall {
            pairs.push((SHMALL.to_string(), shmall.to_string()));
        }
        if let Some(sem) = &self.sem {
            pairs.push((SEM.to_string(), sem.clone()));
        }
        if let Some(shmmni) = &self.shmmni {
            pairs.push((SHMMNI.to_string(), shmmni.clone()));
        }
        pairs
    }

    /// Resolve the kernel parameters for the nodes of `spec`.
    ///
    /// A complete set of declared overrides is used as-is. Otherwise the declared sizes are
    /// parsed and handed to `calculate_sysctls`.
    pub fn from_spec(spec: &ClusterSpec) -> Result<Self, ValidationError> {
        let has_shmmax = spec.sysctls.contains_key(SHMMAX);
        let has_shmall = spec.sysctls.contains_key(SHMALL);
        if has_shmmax && has_shmall {
            return Ok(SysctlConfig {
                overrides: spec.sysctls.clone(),
                ..Default::default()
            });
        }

        let mem = &spec.memory;
        let sga = parse_optional("sgaSize", mem.sga_size.as_deref())?;
        let pga = parse_optional("pgaSize", mem.pga_size.as_deref())?;
        let container = parse_optional("memory limit", mem.container_limit.as_deref())?;
        let huge_pages = parse_optional("hugepages limit", mem.hugepages_limit.as_deref())?;
        let user_shmmax = parse_optional(SHMMAX, spec.sysctls.get(SHMMAX).map(String::as_str))?;
        let user_shmall = match spec.sysctls.get(SHMALL) {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map_err(|_| ValidationError::InvalidQuantity {
                    field: SHMALL,
                    value: v.clone(),
                })?,
            None => 0,
        };

        calculate_sysctls(sga, pga, container, huge_pages, user_shmmax, user_shmall)
    }
}

fn parse_optional(field: &'static str, value: Option<&str>) -> Result<u64, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_size_bytes(field, v),
        _ => Ok(0),
    }
}

/// Parse a declared memory size such as `16Gi`, `16G`, `16GB`, `1024Mi` or `512M` into bytes.
/// Both the binary and decimal-looking suffixes are treated as powers of 1024. A plain number is
/// taken as bytes.
pub fn parse_size_bytes(field: &'static str, value: &str) -> Result<u64, ValidationError> {
    let invalid = || ValidationError::InvalidQuantity {
        field,
        value: value.to_string(),
    };

    let s = value.trim().to_ascii_uppercase();
    let (digits, multiplier) = if let Some(d) = s.strip_suffix("GI") {
        (d, GIB)
    } else if let Some(d) = s.strip_suffix("GB") {
        (d, GIB)
    } else if let Some(d) = s.strip_suffix('G') {
        (d, GIB)
    } else if let Some(d) = s.strip_suffix("MI") {
        (d, MIB)
    } else if let Some(d) = s.strip_suffix("MB") {
        (d, MIB)
    } else if let Some(d) = s.strip_suffix('M') {
        (d, MIB)
    } else if s.chars().all(|c| c.is_ascii_digit()) {
        (s.as_str(), 1)
    } else {
        return Err(invalid());
    };

    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}

fn sga_with_headroom(sga: u64) -> Result<u64, ValidationError> {
    sga.checked_add(GIB)
        .ok_or(ValidationError::SgaTooLarge { sga })
}

/// Compute `kernel.shmmax`, `kernel.shmall`, `kernel.sem` and `kernel.shmmni` for a node.
///
/// All sizes are in bytes except `user_shmall`, which is in pages. A zero value means the
/// quantity was not declared.
pub fn calculate_sysctls(
    sga: u64,
    pga: u64,
    container_mem: u64,
    huge_pages: u64,
    user_shmmax: u64,
    user_shmall: u64,
) -> Result<SysctlConfig, ValidationError> {
    if container_mem > 0 && container_mem < MIN_CONTAINER_MEMORY {
        return Err(ValidationError::ContainerMemoryBelowMinimum {
            memory: container_mem,
        });
    }

    if container_mem == 0 && sga == 0 && pga == 0 {
        return Ok(SysctlConfig::default());
    }

    let shmmax = if container_mem == 0 {
        if user_shmmax > 0 {
            if user_shmmax < sga {
                return Err(ValidationError::ShmmaxBelowSga {
                    shmmax: user_shmmax,
                    sga,
                });
            }
            user_shmmax
        } else {
            sga_with_headroom(sga)?
        }
    } else {
        if pga > container_mem {
            return Err(ValidationError::PgaExceedsContainer {
                pga,
                memory: container_mem,
            });
        }
        if sga > container_mem {
            return Err(ValidationError::SgaExceedsContainer {
                sga,
                memory: container_mem,
            });
        }

        let limit = container_mem - GIB;
        let shmmax = if user_shmmax > 0 {
            if user_shmmax < sga {
                return Err(ValidationError::ShmmaxBelowSga {
                    shmmax: user_shmmax,
                    sga,
                });
            }
            if huge_pages > 0 && user_shmmax < huge_pages {
                return Err(ValidationError::ShmmaxBelowHugePages {
                    shmmax: user_shmmax,
                    huge_pages,
                });
            }
            if user_shmmax > limit {
                return Err(ValidationError::ShmmaxAboveContainer {
                    shmmax: user_shmmax,
                    limit,
                });
            }
            user_shmmax
        } else if huge_pages > 0 {
            if huge_pages < sga {
                return Err(ValidationError::HugePagesBelowSga { huge_pages, sga });
            }
            huge_pages
        } else if sga < container_mem / 2 {
            container_mem / 2
        } else {
            sga_with_headroom(sga)?
        };

        if shmmax >= container_mem {
            limit
        } else {
            shmmax
        }
    };

    let mut shmall = shmmax.div_ceil(PAGE_SIZE);
    if user_shmall > 0 {
        if user_shmall < shmall {
            return Err(ValidationError::ShmallTooSmall {
                shmall: user_shmall,
                required: shmall,
            });
        }
        shmall = user_shmall;
    }

    Ok(SysctlConfig::computed(shmmax, shmall))
}
