// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Per-node addresses on the cluster's private interconnect networks.
//!
//! Each private network is described by a network attachment object whose CNI configuration
//! carries an IPAM block. A node's address is the start of that block's range offset by the node's
//! ordinal, so addresses are stable across passes without any allocation bookkeeping.

use std::net::Ipv4Addr;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    config::PrivateNetwork,
    platform::{NotFoundError, ObjectStore},
};

/// Annotation key under which a pod lists the extra networks it attaches to.
pub const NETWORKS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/networks";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("network attachment '{name}' has no usable IPAM config: {reason}")]
    BadConfig { name: String, reason: String },

    #[error("invalid IPv4 address '{0}'")]
    BadAddress(String),

    #[error("invalid subnet '{0}'")]
    BadSubnet(String),
}

#[derive(Debug, Clone, Deserialize)]
struct AttachmentConfig {
    ipam: Ipam,
}

/// The IPAM block of a network attachment's CNI configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ipam {
    pub subnet: String,
    pub range_start: String,
    #[serde(default)]
    pub range_end: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
}

impl Ipam {
    pub fn from_config(name: &str, config: &str) -> Result<Self, LookupError> {
        let conf: AttachmentConfig =
            serde_json::from_str(config).map_err(|e| LookupError::BadConfig {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(conf.ipam)
    }

    /// Prefix length of the subnet. Host bits in the subnet address are allowed.
    pub fn prefix_len(&self) -> Result<u8, LookupError> {
        if !self.subnet.contains('/') {
            return Err(LookupError::BadSubnet(self.subnet.clone()));
        }
        cidr::Ipv4Inet::from_str(&self.subnet)
            .map(|inet| inet.network_length())
            .map_err(|_| LookupError::BadSubnet(self.subnet.clone()))
    }
}

/// One node's address on one private network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkIdentity {
    pub name: String,
    #[serde(rename = "interface")]
    pub interface_name: String,
    pub ip_address: Ipv4Addr,
    pub prefix_len: u8,
    pub namespace: String,
}

impl NetworkIdentity {
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.ip_address, self.prefix_len)
    }
}

/// Add `offset` to `base`, carrying across octets. The result wraps at the top of the 32-bit
/// address space.
pub fn add_offset(base: &str, offset: u32) -> Result<Ipv4Addr, LookupError> {
    let addr =
        Ipv4Addr::from_str(base.trim()).map_err(|_| LookupError::BadAddress(base.to_string()))?;
    Ok(Ipv4Addr::from(u32::from(addr).wrapping_add(offset)))
}

/// Allocate the address of the node at `ordinal` on the private network `net`.
pub async fn allocate(
    ordinal: u32,
    net: &PrivateNetwork,
    store: &dyn ObjectStore,
    namespace: &str,
) -> Result<NetworkIdentity, LookupError> {
    let namespace = net.namespace.as_deref().unwrap_or(namespace);
    let config = store.get_network_attachment(namespace, &net.name).await?;
    let ipam = Ipam::from_config(&net.name, &config)?;

    let ip_address = add_offset(&ipam.range_start, ordinal)?;
    let prefix_len = ipam.prefix_len()?;

    Ok(NetworkIdentity {
        name: net.name.clone(),
        interface_name: net.interface.clone(),
        ip_address,
        prefix_len,
        namespace: namespace.to_string(),
    })
}

/// Allocate addresses on every network in `nets`. A network whose attachment cannot be resolved
/// is skipped, leaving the platform's own defaults in effect for it.
pub async fn allocate_all(
    ordinal: u32,
    nets: &[PrivateNetwork],
    store: &dyn ObjectStore,
    namespace: &str,
) -> Vec<NetworkIdentity> {
    let mut identities = Vec::with_capacity(nets.len());
    for net in nets {
        match allocate(ordinal, net, store, namespace).await {
            Ok(identity) => identities.push(identity),
            Err(e) => warn!("Skipping private network '{}' for node {ordinal}: {e}", net.name),
        }
    }
    identities
}

#[derive(Serialize)]
struct AnnotationEntry<'a> {
    name: &'a str,
    namespace: &'a str,
    interface: &'a str,
    ips: Vec<String>,
}

/// Render `identities` as the value of the `NETWORKS_ANNOTATION` annotation.
pub fn networks_annotation(identities: &[NetworkIdentity]) -> Result<String, serde_json::Error> {
    let entries: Vec<AnnotationEntry> = identities
        .iter()
        .map(|id| AnnotationEntry {
            name: &id.name,
            namespace: &id.namespace,
            interface: &id.interface_name,
            ips: vec![id.cidr()],
        })
        .collect();
    serde_json::to_string(&entries)
}
