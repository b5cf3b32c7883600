//! Canonical resource model shared by every RSpec dialect.
//!
//! These are plain values: decoding a dialect element produces one of them,
//! encoding consumes one. None of them holds a reference into an XML tree;
//! the position of an encoded node is reported separately as a
//! [`NodeHandle`].

use serde::{Deserialize, Serialize};

/// Open name/value extension bag entry (`pl_tags` in PlanetLab terms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareType {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: Option<String>,
    pub longitude: Option<String>,
    pub latitude: Option<String>,
}

/// Position inside a deployment (IoT and wireless testbeds).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position3D {
    pub x: String,
    pub y: String,
    pub z: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    pub address: String,
    pub netmask: Option<String>,
    pub ip_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub component_id: Option<String>,
    pub client_id: Option<String>,
    pub mac_address: Option<String>,
    pub ip: Option<IpAddress>,
}

/// A login service advertised for a node or sliver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    pub authentication: String,
    pub hostname: String,
    pub port: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskImage {
    pub name: String,
    pub os: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
}

/// A resource instance on one node, bound to one slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sliver {
    pub sliver_id: Option<String>,
    pub client_id: Option<String>,
    pub name: Option<String>,
    pub sliver_type: Option<String>,
    pub disk_image: Option<DiskImage>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub component_id: String,
    pub component_manager_id: Option<String>,
    pub component_name: Option<String>,
    pub authority_id: Option<String>,
    pub client_id: Option<String>,
    pub sliver_id: Option<String>,
    pub hostname: Option<String>,
    pub site_id: Option<String>,
    pub boot_state: Option<String>,
    pub exclusive: Option<bool>,
    pub available: Option<bool>,
    pub hardware_types: Vec<HardwareType>,
    pub location: Option<Location>,
    pub position: Option<Position3D>,
    /// Lease time-slot size in seconds.
    pub granularity: Option<u64>,
    pub interfaces: Vec<Interface>,
    pub slivers: Vec<Sliver>,
    pub logins: Vec<Login>,
    pub tags: Vec<Tag>,
}

impl Node {
    pub fn new(component_id: impl Into<String>) -> Self {
        Node {
            component_id: component_id.into(),
            ..Default::default()
        }
    }

    pub fn with_hardware_type(mut self, name: impl Into<String>) -> Self {
        self.hardware_types.push(HardwareType { name: name.into() });
        self
    }

    pub fn with_sliver(mut self, sliver: Sliver) -> Self {
        self.slivers.push(sliver);
        self
    }

    /// Name used when deriving sliver names: `component_name`, falling
    /// back to the hostname and then to the component URN leaf. Kept whole,
    /// since hosts at different sites often share a first label.
    pub fn component_label(&self) -> &str {
        self.component_name
            .as_deref()
            .or(self.hostname.as_deref())
            .unwrap_or_else(|| {
                self.component_id
                    .rsplit('+')
                    .next()
                    .unwrap_or(&self.component_id)
            })
    }
}

/// A scheduled reservation of one component for one slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub lease_id: Option<String>,
    pub component_id: String,
    pub slice_id: String,
    /// Unix seconds.
    pub start_time: u64,
    /// Number of granularity units.
    pub duration: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub component_id: Option<String>,
    pub component_name: Option<String>,
    pub client_id: Option<String>,
    pub link_type: Option<String>,
    pub component_managers: Vec<String>,
    pub interface_refs: Vec<String>,
    pub capacity: Option<String>,
    pub latency: Option<String>,
    pub packet_loss: Option<String>,
}

/// Position of an encoded node inside a document: the network it was placed
/// under (if the dialect groups nodes into networks) and its index among the
/// node elements of that parent. Invalidated by later structural edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
    pub network: Option<String>,
    pub index: usize,
}
