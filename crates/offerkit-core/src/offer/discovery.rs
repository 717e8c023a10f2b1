//! Discovery metadata for ports and VIPs.
//!
//! # Encoding
//! - each advertised port carries one label whose key is `PORT_` or `VIP_`
//!   followed by a random unique suffix
//! - a port label's value is the port name; a VIP label's value is
//!   `"{vip name}:{vip port}"`
//! - an existing entry is found by key prefix + value and updated in place,
//!   so label keys stay stable across relaunches

use thiserror::Error;
use ulid::Ulid;

use crate::domain::{DiscoveryInfo, DiscoveryPort, TaskInfo, VipSpec, Visibility};

pub const PORT_LABEL_PREFIX: &str = "PORT_";
pub const VIP_LABEL_PREFIX: &str = "VIP_";
pub const DEFAULT_VIP_PROTOCOL: &str = "tcp";
const VIP_HOST_TLD: &str = "l4lb.thisdcos.directory";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error(
        "task {task}'s VIP value for {key} is invalid, expected 2 components but got {components}: {value}"
    )]
    MalformedVip {
        task: String,
        key: String,
        components: usize,
        value: String,
    },

    #[error("task {task}'s VIP port in {key} is not a number: {value}")]
    InvalidVipPort {
        task: String,
        key: String,
        value: String,
    },
}

/// Only an advertised VIP is externally visible.
pub fn to_visibility(advertise: Option<bool>) -> Visibility {
    match advertise {
        Some(true) => Visibility::External,
        Some(false) | None => Visibility::Cluster,
    }
}

pub fn to_protocol(protocol: Option<&str>) -> String {
    match protocol {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => DEFAULT_VIP_PROTOCOL.to_string(),
    }
}

/// Writes one resolved port into a task's or executor's discovery info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryInfoWriter {
    /// Named, non-load-balanced port.
    Port { port_name: String },
    /// Port routed through a virtual IP.
    Vip {
        protocol: String,
        visibility: Visibility,
        vip_name: String,
        vip_port: u32,
    },
}

impl DiscoveryInfoWriter {
    pub fn port(port_name: impl Into<String>) -> Self {
        DiscoveryInfoWriter::Port {
            port_name: port_name.into(),
        }
    }

    pub fn vip(spec: &VipSpec) -> Self {
        DiscoveryInfoWriter::Vip {
            protocol: to_protocol(spec.protocol.as_deref()),
            visibility: to_visibility(spec.advertise),
            vip_name: spec.name.clone(),
            vip_port: spec.port,
        }
    }

    /// Adds or updates the entry for `port` in `discovery`, owned by `owner`
    /// (task or executor name).
    pub fn write(&self, discovery: &mut Option<DiscoveryInfo>, owner: &str, port: u64) {
        let info = discovery.get_or_insert_with(|| DiscoveryInfo {
            name: owner.to_string(),
            visibility: Visibility::Cluster,
            ports: Vec::new(),
        });
        // Name and visibility are always reset, repairing older entries.
        info.name = owner.to_string();
        info.visibility = Visibility::Cluster;

        match self {
            DiscoveryInfoWriter::Port { port_name } => {
                match find_matching_port(&mut info.ports, PORT_LABEL_PREFIX, port_name) {
                    Some(existing) => existing.number = port,
                    None => info.ports.push(new_port(port, None, None, PORT_LABEL_PREFIX, port_name)),
                }
            }
            DiscoveryInfoWriter::Vip {
                protocol,
                visibility,
                vip_name,
                vip_port,
            } => {
                let value = format!("{vip_name}:{vip_port}");
                match find_matching_port(&mut info.ports, VIP_LABEL_PREFIX, &value) {
                    Some(existing) => {
                        existing.number = port;
                        existing.protocol = Some(protocol.clone());
                        existing.visibility = Some(*visibility);
                    }
                    None => info.ports.push(new_port(
                        port,
                        Some(protocol.clone()),
                        Some(*visibility),
                        VIP_LABEL_PREFIX,
                        &value,
                    )),
                }
            }
        }
    }
}

fn new_port(
    number: u64,
    protocol: Option<String>,
    visibility: Option<Visibility>,
    prefix: &str,
    value: &str,
) -> DiscoveryPort {
    let mut port = DiscoveryPort {
        number,
        protocol,
        visibility,
        labels: Default::default(),
    };
    port.labels
        .insert(format!("{prefix}{}", Ulid::new()), value.to_string());
    port
}

fn find_matching_port<'a>(
    ports: &'a mut [DiscoveryPort],
    prefix: &str,
    value: &str,
) -> Option<&'a mut DiscoveryPort> {
    ports.iter_mut().find(|p| {
        p.labels
            .iter()
            .any(|(k, v)| k.starts_with(prefix) && v == value)
    })
}

/// Parsed `VIP_*` label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VipLabel {
    pub name: String,
    pub port: u32,
}

impl VipLabel {
    /// Returns `Ok(None)` for labels that are not VIP labels.
    pub fn parse(task: &str, key: &str, value: &str) -> Result<Option<Self>, DiscoveryError> {
        if !key.starts_with(VIP_LABEL_PREFIX) {
            return Ok(None);
        }
        let parts: Vec<&str> = value.split(':').collect();
        let [name, port] = parts.as_slice() else {
            return Err(DiscoveryError::MalformedVip {
                task: task.to_string(),
                key: key.to_string(),
                components: parts.len(),
                value: value.to_string(),
            });
        };
        let port = port.parse().map_err(|_| DiscoveryError::InvalidVipPort {
            task: task.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        })?;
        Ok(Some(Self {
            name: (*name).to_string(),
            port,
        }))
    }

    /// `"{vip}.{service}.l4lb.thisdcos.directory:{port}"`
    pub fn host(&self, service_name: &str) -> String {
        format!("{}.{service_name}.{VIP_HOST_TLD}:{}", self.name, self.port)
    }
}

/// Every VIP advertised by `task`. A malformed label is an error, never
/// skipped: it means the stored task is corrupt.
pub fn vip_labels(task: &TaskInfo) -> Result<Vec<VipLabel>, DiscoveryError> {
    let mut vips = Vec::new();
    let Some(discovery) = &task.discovery else {
        return Ok(vips);
    };
    for port in &discovery.ports {
        for (key, value) in &port.labels {
            if let Some(vip) = VipLabel::parse(&task.name, key, value)? {
                vips.push(vip);
            }
        }
    }
    Ok(vips)
}
