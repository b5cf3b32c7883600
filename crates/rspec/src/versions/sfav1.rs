//! PlanetLab SFA v1: nodes grouped under `<network>`, free-form element
//! tags, grouped leases and slice-wide `<sliver_defaults>`.

use super::{network_container, RSpecVersion, VersionSpec};
use crate::elements::common::{
    decode_element_tags, decode_granularity, decode_hardware_types, decode_interfaces,
    decode_location, encode_element_tag, encode_granularity, encode_hardware_type,
    encode_interface_flat, encode_location, parse_flag,
};
use crate::elements::{ElementCodec, LeaseLayout};
use crate::model::{Node, Sliver, Tag};
use crate::xml::XmlElement;

const NODE_CHILDREN: &[&str] = &[
    "hostname",
    "location",
    "position_3d",
    "hardware_type",
    "interface",
    "granularity",
    "available",
    "sliver",
];

pub(crate) fn decode_available(el: &XmlElement) -> Option<bool> {
    el.child("available")
        .map(|a| a.attr("now").map(parse_flag).unwrap_or(true))
}

pub(crate) fn encode_available(available: bool) -> XmlElement {
    XmlElement::new("available").with_attr("now", if available { "true" } else { "false" })
}

/// `<sliver type=".." sliver_id=".."><tag>value</tag></sliver>`, shared by
/// every dialect of the SFA family.
pub(crate) fn decode_slivers(el: &XmlElement) -> Vec<Sliver> {
    el.children_named("sliver")
        .map(|s| Sliver {
            sliver_id: s.attr_string("sliver_id"),
            client_id: s.attr_string("client_id"),
            name: s.attr_string("name"),
            sliver_type: s.attr_string("type"),
            disk_image: None,
            tags: decode_element_tags(s, &[]),
        })
        .collect()
}

pub(crate) fn encode_sliver(sliver: &Sliver) -> XmlElement {
    let mut el = XmlElement::new("sliver")
        .with_opt_attr("sliver_id", sliver.sliver_id.as_deref())
        .with_opt_attr("client_id", sliver.client_id.as_deref())
        .with_opt_attr("name", sliver.name.as_deref())
        .with_opt_attr("type", sliver.sliver_type.as_deref());
    for tag in &sliver.tags {
        el.push(encode_element_tag(tag));
    }
    el
}

/// ```xml
/// <node component_id=".." component_manager_id=".." boot_state="boot">
///   <hostname>pl1.example.org</hostname>
///   <sliver type="plab-vserver"><vsys>fuse</vsys></sliver>
///   <arch>x86_64</arch>
/// </node>
/// ```
#[derive(Debug, Default)]
pub struct SfaNodeCodec;

impl ElementCodec<Node> for SfaNodeCodec {
    fn decode(&self, el: &XmlElement) -> Node {
        Node {
            component_id: el.attr("component_id").unwrap_or_default().to_string(),
            component_manager_id: el.attr_string("component_manager_id"),
            component_name: el.attr_string("component_name"),
            authority_id: el.attr_string("authority_id"),
            client_id: el.attr_string("client_id"),
            sliver_id: el.attr_string("sliver_id"),
            hostname: el.child_text("hostname"),
            site_id: el.attr_string("site_id"),
            boot_state: el.attr_string("boot_state"),
            exclusive: el.attr("exclusive").map(parse_flag),
            available: decode_available(el),
            hardware_types: decode_hardware_types(el),
            location: decode_location(el),
            position: None,
            granularity: decode_granularity(el),
            interfaces: decode_interfaces(el),
            slivers: decode_slivers(el),
            logins: Vec::new(),
            tags: decode_element_tags(el, NODE_CHILDREN),
        }
    }

    fn encode(&self, node: &Node) -> XmlElement {
        let mut el = XmlElement::new("node")
            .with_attr("component_id", node.component_id.as_str())
            .with_opt_attr("component_manager_id", node.component_manager_id.as_deref())
            .with_opt_attr("component_name", node.component_name.as_deref())
            .with_opt_attr("authority_id", node.authority_id.as_deref())
            .with_opt_attr("client_id", node.client_id.as_deref())
            .with_opt_attr("sliver_id", node.sliver_id.as_deref())
            .with_opt_attr("site_id", node.site_id.as_deref())
            .with_opt_attr("boot_state", node.boot_state.as_deref());
        if let Some(exclusive) = node.exclusive {
            el.set_attr("exclusive", if exclusive { "TRUE" } else { "FALSE" });
        }
        if let Some(hostname) = &node.hostname {
            el.push(XmlElement::new("hostname").with_text(hostname.as_str()));
        }
        if let Some(location) = &node.location {
            el.push(encode_location(location));
        }
        for hardware in &node.hardware_types {
            el.push(encode_hardware_type(hardware));
        }
        for interface in &node.interfaces {
            el.push(encode_interface_flat(interface));
        }
        if let Some(grain) = node.granularity {
            el.push(encode_granularity(grain));
        }
        if let Some(available) = node.available {
            el.push(encode_available(available));
        }
        for sliver in &node.slivers {
            el.push(encode_sliver(sliver));
        }
        for tag in &node.tags {
            el.push(encode_element_tag(tag));
        }
        el
    }
}

#[derive(Debug)]
pub struct SfaV1 {
    spec: VersionSpec,
}

impl SfaV1 {
    pub fn new() -> Self {
        SfaV1 {
            spec: VersionSpec::new("SFA", "1", None),
        }
    }
}

impl Default for SfaV1 {
    fn default() -> Self {
        Self::new()
    }
}

impl RSpecVersion for SfaV1 {
    fn spec(&self) -> &VersionSpec {
        &self.spec
    }

    fn node_codec(&self) -> &dyn ElementCodec<Node> {
        &SfaNodeCodec
    }

    fn supports_links(&self) -> bool {
        true
    }

    fn lease_layout(&self) -> Option<LeaseLayout> {
        Some(LeaseLayout::Grouped)
    }

    fn add_default_sliver_attribute(&self, root: &mut XmlElement, tag: &Tag, network: Option<&str>) {
        let network = network_container(root, network);
        if network.child("sliver_defaults").is_none() {
            network.push(XmlElement::new("sliver_defaults"));
        }
        if let Some(defaults) = network.child_mut("sliver_defaults") {
            defaults.push(encode_element_tag(tag));
        }
    }

    fn get_default_sliver_attributes(&self, root: &XmlElement, network: Option<&str>) -> Vec<Tag> {
        root.children_named("network")
            .filter(|n| network.map_or(true, |name| n.attr("name") == Some(name)))
            .filter_map(|n| n.child("sliver_defaults"))
            .flat_map(|d| decode_element_tags(d, &[]))
            .collect()
    }
}
