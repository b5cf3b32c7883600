use super::ElementCodec;
use crate::model::Link;
use crate::xml::XmlElement;

/// `<link>` codec shared by the SFA and ProtoGENI families:
///
/// ```xml
/// <link component_id=".." component_name=".." client_id="..">
///   <component_manager name="urn:..."/>
///   <link_type name="ipv4"/>
///   <interface_ref component_id="urn:...:if0"/>
///   <property capacity="1000" latency="0" packet_loss="0"/>
/// </link>
/// ```
#[derive(Debug, Default)]
pub struct LinkCodec;

impl ElementCodec<Link> for LinkCodec {
    fn decode(&self, el: &XmlElement) -> Link {
        let property = el.child("property");
        Link {
            component_id: el.attr_string("component_id"),
            component_name: el.attr_string("component_name"),
            client_id: el.attr_string("client_id"),
            link_type: el.child("link_type").and_then(|t| t.attr_string("name")),
            component_managers: el
                .children_named("component_manager")
                .filter_map(|cm| cm.attr_string("name"))
                .collect(),
            interface_refs: el
                .children_named("interface_ref")
                .filter_map(|r| r.attr_string("component_id").or_else(|| r.attr_string("client_id")))
                .collect(),
            capacity: property.and_then(|p| p.attr_string("capacity")),
            latency: property.and_then(|p| p.attr_string("latency")),
            packet_loss: property.and_then(|p| p.attr_string("packet_loss")),
        }
    }

    fn encode(&self, link: &Link) -> XmlElement {
        let mut el = XmlElement::new("link")
            .with_opt_attr("component_id", link.component_id.as_deref())
            .with_opt_attr("component_name", link.component_name.as_deref())
            .with_opt_attr("client_id", link.client_id.as_deref());
        for manager in &link.component_managers {
            el.push(XmlElement::new("component_manager").with_attr("name", manager.as_str()));
        }
        if let Some(link_type) = &link.link_type {
            el.push(XmlElement::new("link_type").with_attr("name", link_type.as_str()));
        }
        for iface in &link.interface_refs {
            el.push(XmlElement::new("interface_ref").with_attr("component_id", iface.as_str()));
        }
        if link.capacity.is_some() || link.latency.is_some() || link.packet_loss.is_some() {
            el.push(
                XmlElement::new("property")
                    .with_opt_attr("capacity", link.capacity.as_deref())
                    .with_opt_attr("latency", link.latency.as_deref())
                    .with_opt_attr("packet_loss", link.packet_loss.as_deref()),
            );
        }
        el
    }
}
