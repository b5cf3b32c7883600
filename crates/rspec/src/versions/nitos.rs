//! NITOS v1: the SFA v1 layout extended with node positions for the
//! wireless grid. Spectrum `<channel>` elements inside a network are left
//! untouched.

use super::sfav1::SfaNodeCodec;
use super::{RSpecVersion, VersionSpec};
use crate::elements::common::{decode_position, encode_position};
use crate::elements::{ElementCodec, LeaseLayout};
use crate::model::Node;
use crate::xml::XmlElement;

pub const NITOS_SCHEMA: &str = "http://nitlab.inf.uth.gr/schema/sfa/rspec/1/ad-reservation.xsd";

#[derive(Debug, Default)]
pub struct NitosNodeCodec;

impl ElementCodec<Node> for NitosNodeCodec {
    fn decode(&self, el: &XmlElement) -> Node {
        Node {
            position: decode_position(el),
            ..SfaNodeCodec.decode(el)
        }
    }

    fn encode(&self, node: &Node) -> XmlElement {
        let mut el = SfaNodeCodec.encode(node);
        if let Some(position) = &node.position {
            el.push(encode_position(position));
        }
        el
    }
}

#[derive(Debug)]
pub struct NitosV1 {
    spec: VersionSpec,
}

impl NitosV1 {
    pub fn new() -> Self {
        NitosV1 {
            spec: VersionSpec::new("NITOS", "1", None),
        }
    }
}

impl Default for NitosV1 {
    fn default() -> Self {
        Self::new()
    }
}

impl RSpecVersion for NitosV1 {
    fn spec(&self) -> &VersionSpec {
        &self.spec
    }

    fn schema(&self) -> Option<&str> {
        Some(NITOS_SCHEMA)
    }

    fn node_codec(&self) -> &dyn ElementCodec<Node> {
        &NitosNodeCodec
    }

    fn lease_layout(&self) -> Option<LeaseLayout> {
        Some(LeaseLayout::Grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lease, Position3D};
    use crate::xml;

    const AD: &str = r#"<rspec type="NITOS" version="1">
  <network name="nitos">
    <node component_id="urn:publicid:IDN+omf:nitos+node+node001" exclusive="true">
      <hostname>node001</hostname>
      <position_3d x="1" y="5" z="0"/>
      <granularity grain="1800"/>
    </node>
    <channel channel_num="1" frequency="2.412GHZ" standard="b,g"/>
    <lease slice_id="urn:publicid:IDN+omf:nitos+slice+s" start_time="1400000000" duration="2">
      <node component_id="urn:publicid:IDN+omf:nitos+node+node001"/>
    </lease>
  </network>
</rspec>"#;

    #[test]
    fn decodes_position_granularity_and_leases() {
        let root = xml::parse(AD).unwrap();
        let version = NitosV1::new();
        let nodes = version.get_nodes(&root, None);
        assert_eq!(nodes.len(), 1);
        assert_eq!(
            nodes[0].position,
            Some(Position3D {
                x: "1".into(),
                y: "5".into(),
                z: "0".into()
            })
        );
        assert_eq!(nodes[0].granularity, Some(1800));
        assert!(nodes[0].tags.is_empty());
        assert_eq!(nodes[0].exclusive, Some(true));

        let leases: Vec<Lease> = version.get_leases(&root, None);
        assert_eq!(leases.len(), 1);
        assert_eq!(leases[0].duration, 2);
        assert_eq!(leases[0].component_id, "urn:publicid:IDN+omf:nitos+node+node001");
    }

    #[test]
    fn remove_slivers_keeps_other_network_content() {
        let mut root = xml::parse(AD).unwrap();
        let version = NitosV1::new();
        version.add_slivers(&mut root, &["node001".to_string()], &[], None, true);
        assert_eq!(version.get_nodes_with_slivers(&root).len(), 1);
        version.remove_slivers(&mut root, &["node001".to_string()]);
        assert!(version.get_nodes_with_slivers(&root).is_empty());
        let network = root.child("network").unwrap();
        assert!(network.child("channel").is_some());
    }
}
