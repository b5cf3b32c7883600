//! IoT-LAB v1: sensor nodes directly under the root, with a 3-D position,
//! lease granularity and grouped leases. Sensor properties (`archi`,
//! `radio`, `mobile`, ...) travel as free-form element tags.

use super::sfav1::{decode_available, decode_slivers, encode_available, encode_sliver};
use super::{RSpecVersion, VersionSpec};
use crate::elements::common::{
    decode_element_tags, decode_granularity, decode_hardware_types, decode_location,
    decode_position, encode_element_tag, encode_granularity, encode_hardware_type,
    encode_location, encode_position, parse_flag,
};
use crate::elements::{ElementCodec, LeaseLayout};
use crate::model::Node;
use crate::xml::XmlElement;

pub const IOTLAB_SCHEMA: &str = "http://senslab.info/resources/rspec/1/ad.xsd";

const NODE_CHILDREN: &[&str] = &[
    "hostname",
    "location",
    "position_3d",
    "granularity",
    "hardware_type",
    "available",
    "sliver",
];

#[derive(Debug, Default)]
pub struct IotlabNodeCodec;

impl ElementCodec<Node> for IotlabNodeCodec {
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
            position: decode_position(el),
            granularity: decode_granularity(el),
            interfaces: Vec::new(),
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
            el.set_attr("exclusive", exclusive.to_string());
        }
        if let Some(hostname) = &node.hostname {
            el.push(XmlElement::new("hostname").with_text(hostname.as_str()));
        }
        for hardware in &node.hardware_types {
            el.push(encode_hardware_type(hardware));
        }
        if let Some(location) = &node.location {
            el.push(encode_location(location));
        }
        if let Some(position) = &node.position {
            el.push(encode_position(position));
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
pub struct IotlabV1 {
    spec: VersionSpec,
}

impl IotlabV1 {
    pub fn new() -> Self {
        IotlabV1 {
            spec: VersionSpec::new("Iotlab", "1", None),
        }
    }
}

impl Default for IotlabV1 {
    fn default() -> Self {
        Self::new()
    }
}

impl RSpecVersion for IotlabV1 {
    fn spec(&self) -> &VersionSpec {
        &self.spec
    }

    fn schema(&self) -> Option<&str> {
        Some(IOTLAB_SCHEMA)
    }

    fn node_codec(&self) -> &dyn ElementCodec<Node> {
        &IotlabNodeCodec
    }

    fn uses_networks(&self) -> bool {
        false
    }

    fn lease_layout(&self) -> Option<LeaseLayout> {
        Some(LeaseLayout::Grouped)
    }

    fn default_sliver_type(&self) -> &'static str {
        "iotlab-node"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::model::{Position3D, Tag};
    use crate::versions::ContentType;

    fn sensor(name: &str, archi: &str) -> Node {
        Node {
            hostname: Some(format!("{name}.grenoble.iot-lab.info")),
            position: Some(Position3D {
                x: "1".into(),
                y: "2".into(),
                z: "3".into(),
            }),
            granularity: Some(60),
            tags: vec![Tag::new("archi", archi)],
            ..Node::new(format!("urn:publicid:IDN+iotlab+node+{name}.grenoble.iot-lab.info"))
        }
        .with_hardware_type("iotlab-m3")
    }

    #[test]
    fn sensors_keep_position_and_properties() {
        let version = IotlabV1::new();
        let mut root = version.envelope(ContentType::Ad, "g", "e");
        let nodes = vec![sensor("m3-1", "m3:at86rf231"), sensor("a8-1", "a8:at86rf231")];
        let handles = version.add_nodes(&mut root, &nodes, None);
        assert_eq!(handles[1].index, 1);
        assert_eq!(handles[1].network, None);
        assert_eq!(version.get_nodes(&root, None), nodes);

        let m3 = Filter::new().with("archi", "m3*");
        assert_eq!(version.get_nodes(&root, Some(&m3)).len(), 1);
    }

    #[test]
    fn envelope_declares_type_version_and_schema() {
        let root = IotlabV1::new().envelope(ContentType::Request, "g", "e");
        assert_eq!(root.attr("type"), Some("Iotlab"));
        assert_eq!(root.attr("version"), Some("1"));
        assert_eq!(root.attr("xsi:schemaLocation"), Some(IOTLAB_SCHEMA));
    }

    #[test]
    fn slivers_default_to_iotlab_node() {
        let version = IotlabV1::new();
        let mut root = version.envelope(ContentType::Ad, "g", "e");
        version.add_nodes(&mut root, &[sensor("m3-1", "m3"), sensor("m3-2", "m3")], None);
        version.add_slivers(&mut root, &["m3-2".to_string()], &[], None, false);
        let nodes = version.get_nodes_with_slivers(&root);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].slivers[0].sliver_type.as_deref(), Some("iotlab-node"));
    }
}
