//! ProtoGENI v2. Also provides the node codec GENI v3 reuses: the two
//! schemas differ only in namespace, schema locations and lease support.

use super::{ContentType, RSpecVersion, VersionSpec, PLANETLAB_EXTENSION};
use crate::elements::common::{
    decode_attribute_tags, decode_disk_image, decode_granularity, decode_hardware_types,
    decode_interfaces, decode_location, decode_logins, decode_position, encode_attribute_tag,
    encode_disk_image, encode_granularity, encode_hardware_type, encode_interface_nested,
    encode_location, encode_position, encode_services, parse_flag,
};
use crate::elements::ElementCodec;
use crate::model::{Node, Sliver};
use crate::xml::XmlElement;

use super::sfav1::{decode_available, encode_available};

pub const PG_NAMESPACE: &str = "http://www.protogeni.net/resources/rspec/2";

/// Sliver types a ProtoGENI/GENI node must advertise to be sliced.
pub const PG_SLIVER_TYPES: &[&str] = &["emulab-openvz", "raw-pc", "plab-vserver", "plab-vnode"];

const PG_EXTENSIONS: &[(&str, &str)] = &[
    ("flack", "http://www.protogeni.net/resources/rspec/ext/flack/1"),
    PLANETLAB_EXTENSION,
];

/// ProtoGENI-style `<node>`: sliver types are `<sliver_type>` children and
/// the node itself carries the `sliver_id`/`client_id` of its sliver.
#[derive(Debug, Default)]
pub struct PgNodeCodec;

impl ElementCodec<Node> for PgNodeCodec {
    fn decode(&self, el: &XmlElement) -> Node {
        let sliver_id = el.attr_string("sliver_id");
        let client_id = el.attr_string("client_id");
        let slivers = el
            .children_named("sliver_type")
            .map(|st| Sliver {
                sliver_id: sliver_id.clone(),
                client_id: client_id.clone(),
                name: None,
                sliver_type: st.attr_string("name"),
                disk_image: decode_disk_image(st),
                tags: decode_attribute_tags(st),
            })
            .collect();
        Node {
            component_id: el.attr("component_id").unwrap_or_default().to_string(),
            component_manager_id: el.attr_string("component_manager_id"),
            component_name: el.attr_string("component_name"),
            authority_id: None,
            client_id,
            sliver_id,
            hostname: el.child("host").and_then(|h| h.attr_string("name")),
            site_id: None,
            boot_state: None,
            exclusive: el.attr("exclusive").map(parse_flag),
            available: decode_available(el),
            hardware_types: decode_hardware_types(el),
            location: decode_location(el),
            position: decode_position(el),
            granularity: decode_granularity(el),
            interfaces: decode_interfaces(el),
            slivers,
            logins: decode_logins(el),
            tags: decode_attribute_tags(el),
        }
    }

    fn encode(&self, node: &Node) -> XmlElement {
        let sliver_id = node
            .sliver_id
            .as_deref()
            .or_else(|| node.slivers.iter().find_map(|s| s.sliver_id.as_deref()));
        let mut el = XmlElement::new("node")
            .with_attr("component_id", node.component_id.as_str())
            .with_opt_attr("component_manager_id", node.component_manager_id.as_deref())
            .with_opt_attr("component_name", node.component_name.as_deref())
            .with_opt_attr("client_id", node.client_id.as_deref())
            .with_opt_attr("sliver_id", sliver_id);
        if let Some(exclusive) = node.exclusive {
            el.set_attr("exclusive", exclusive.to_string());
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
        if let Some(hostname) = &node.hostname {
            el.push(XmlElement::new("host").with_attr("name", hostname.as_str()));
        }
        for interface in &node.interfaces {
            el.push(encode_interface_nested(interface));
        }
        if let Some(available) = node.available {
            el.push(encode_available(available));
        }
        for sliver in &node.slivers {
            let mut st = XmlElement::new("sliver_type")
                .with_opt_attr("name", sliver.sliver_type.as_deref());
            if let Some(image) = &sliver.disk_image {
                st.push(encode_disk_image(image));
            }
            for tag in &sliver.tags {
                st.push(encode_attribute_tag(tag));
            }
            el.push(st);
        }
        if !node.logins.is_empty() {
            el.push(encode_services(&node.logins));
        }
        for tag in &node.tags {
            el.push(encode_attribute_tag(tag));
        }
        el
    }
}

/// Applied by both ProtoGENI-family adapters before a sliver is attached:
/// requests carry neither interfaces nor availability.
pub(crate) fn strip_for_request(node: &mut Node) {
    node.interfaces.clear();
    node.available = None;
}

pub(crate) fn pg_schema(base: &str, content_type: ContentType) -> String {
    format!("{base}/{}.xsd", content_type.as_str())
}

#[derive(Debug)]
pub struct PgV2 {
    spec: VersionSpec,
    schema: String,
}

impl PgV2 {
    pub fn new(content_type: ContentType) -> Self {
        PgV2 {
            spec: VersionSpec::new("ProtoGENI", "2", Some(content_type)),
            schema: pg_schema(PG_NAMESPACE, content_type),
        }
    }
}

impl RSpecVersion for PgV2 {
    fn spec(&self) -> &VersionSpec {
        &self.spec
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.schema)
    }

    fn namespace(&self) -> Option<&str> {
        Some(PG_NAMESPACE)
    }

    fn extensions(&self) -> &[(&'static str, &'static str)] {
        PG_EXTENSIONS
    }

    fn node_codec(&self) -> &dyn ElementCodec<Node> {
        &PgNodeCodec
    }

    fn uses_networks(&self) -> bool {
        false
    }

    fn supports_links(&self) -> bool {
        true
    }

    fn valid_sliver_types(&self) -> Option<&'static [&'static str]> {
        Some(PG_SLIVER_TYPES)
    }

    fn prepare_sliver_node(&self, node: &mut Node) {
        strip_for_request(node);
    }
}
