//! OFELIA v1: OpenFlow datapaths (`<openflow:datapath>`) grouped under
//! networks. Ports map onto interfaces, the datapath id onto a `dpid` tag.

use super::sfav1::{decode_slivers, encode_sliver};
use super::{RSpecVersion, VersionSpec};
use crate::elements::common::{decode_hardware_types, encode_hardware_type};
use crate::elements::ElementCodec;
use crate::model::{Interface, Node, Tag};
use crate::xml::XmlElement;

pub const OPENFLOW_EXTENSION: (&str, &str) =
    ("openflow", "http://www.geni.net/resources/rspec/ext/openflow/3");
pub const OFELIA_SCHEMA: &str = "http://www.geni.net/resources/rspec/ext/openflow/3/of-ad.xsd";

const OFELIA_EXTENSIONS: &[(&str, &str)] = &[OPENFLOW_EXTENSION];

#[derive(Debug, Default)]
pub struct DatapathCodec;

impl ElementCodec<Node> for DatapathCodec {
    fn decode(&self, el: &XmlElement) -> Node {
        let interfaces = el
            .children_named("port")
            .map(|port| Interface {
                component_id: port.attr_string("num"),
                client_id: port.attr_string("name"),
                ..Default::default()
            })
            .collect();
        let tags = el
            .attr_string("dpid")
            .map(|dpid| vec![Tag::new("dpid", dpid)])
            .unwrap_or_default();
        Node {
            component_id: el.attr("component_id").unwrap_or_default().to_string(),
            component_manager_id: el.attr_string("component_manager_id"),
            component_name: el.attr_string("component_name"),
            client_id: el.attr_string("client_id"),
            sliver_id: el.attr_string("sliver_id"),
            hardware_types: decode_hardware_types(el),
            interfaces,
            slivers: decode_slivers(el),
            tags,
            ..Default::default()
        }
    }

    fn encode(&self, node: &Node) -> XmlElement {
        let dpid = node.tags.iter().find(|t| t.name == "dpid").map(|t| t.value.as_str());
        let mut el = XmlElement::new("openflow:datapath")
            .with_attr("component_id", node.component_id.as_str())
            .with_opt_attr("component_manager_id", node.component_manager_id.as_deref())
            .with_opt_attr("component_name", node.component_name.as_deref())
            .with_opt_attr("client_id", node.client_id.as_deref())
            .with_opt_attr("sliver_id", node.sliver_id.as_deref())
            .with_opt_attr("dpid", dpid);
        for hardware in &node.hardware_types {
            el.push(encode_hardware_type(hardware));
        }
        for interface in &node.interfaces {
            el.push(
                XmlElement::new("openflow:port")
                    .with_opt_attr("num", interface.component_id.as_deref())
                    .with_opt_attr("name", interface.client_id.as_deref()),
            );
        }
        for sliver in &node.slivers {
            let mut s = encode_sliver(sliver);
            s.name = "openflow:sliver".to_string();
            el.push(s);
        }
        el
    }
}

#[derive(Debug)]
pub struct OfeliaV1 {
    spec: VersionSpec,
}

impl OfeliaV1 {
    pub fn new() -> Self {
        OfeliaV1 {
            spec: VersionSpec::new("OFELIA", "1", None),
        }
    }
}

impl Default for OfeliaV1 {
    fn default() -> Self {
        Self::new()
    }
}

impl RSpecVersion for OfeliaV1 {
    fn spec(&self) -> &VersionSpec {
        &self.spec
    }

    fn schema(&self) -> Option<&str> {
        Some(OFELIA_SCHEMA)
    }

    fn extensions(&self) -> &[(&'static str, &'static str)] {
        OFELIA_EXTENSIONS
    }

    fn node_codec(&self) -> &dyn ElementCodec<Node> {
        &DatapathCodec
    }

    fn node_element(&self) -> &'static str {
        "datapath"
    }

    fn default_sliver_type(&self) -> &'static str {
        "openflow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versions::ContentType;

    fn datapath(dpid: &str) -> Node {
        Node {
            component_manager_id: Some("urn:publicid:IDN+openflow:ofelia+authority+cm".into()),
            interfaces: vec![Interface {
                component_id: Some("1".into()),
                client_id: Some("eth1".into()),
                ..Default::default()
            }],
            tags: vec![Tag::new("dpid", dpid)],
            ..Node::new(format!("urn:publicid:IDN+openflow:ofelia+datapath+{dpid}"))
        }
    }

    #[test]
    fn datapaths_live_under_a_named_network() {
        let version = OfeliaV1::new();
        let mut root = version.envelope(ContentType::Ad, "g", "e");
        let handles = version.add_nodes(
            &mut root,
            &[datapath("00:00:00:01"), datapath("00:00:00:02")],
            Some("ofelia"),
        );
        assert_eq!(handles[0].network.as_deref(), Some("ofelia"));
        let network = root.child("network").unwrap();
        assert_eq!(network.elements().next().unwrap().name, "openflow:datapath");
        assert_eq!(
            version.get_nodes(&root, None),
            vec![datapath("00:00:00:01"), datapath("00:00:00:02")]
        );
        assert_eq!(root.attr("xmlns:openflow"), Some(OPENFLOW_EXTENSION.1));
    }

    #[test]
    fn slivers_use_openflow_type() {
        let version = OfeliaV1::new();
        let mut root = version.envelope(ContentType::Ad, "g", "e");
        version.add_nodes(&mut root, &[datapath("00:00:00:01")], Some("ofelia"));
        assert_eq!(
            version.add_slivers(&mut root, &["00:00:00:01".to_string()], &[], None, false),
            1
        );
        let nodes = version.get_nodes_with_slivers(&root);
        assert_eq!(nodes[0].slivers[0].sliver_type.as_deref(), Some("openflow"));
    }
}
