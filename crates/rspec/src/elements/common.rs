//! Small projections reused by several dialect node codecs.

use crate::model::{DiskImage, HardwareType, Interface, IpAddress, Location, Login, Position3D, Tag};
use crate::xml::XmlElement;

/// Parse `true`/`TRUE`/`1`-style flags. Anything else reads as `false`.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

// ── Location ────────────────────────────────────────────────────────────────

pub fn decode_location(node: &XmlElement) -> Option<Location> {
    let el = node.child("location")?;
    Some(Location {
        country: el.attr_string("country"),
        longitude: el.attr_string("longitude"),
        latitude: el.attr_string("latitude"),
    })
}

pub fn encode_location(location: &Location) -> XmlElement {
    XmlElement::new("location")
        .with_opt_attr("country", location.country.as_deref())
        .with_opt_attr("longitude", location.longitude.as_deref())
        .with_opt_attr("latitude", location.latitude.as_deref())
}

// ── Hardware types ──────────────────────────────────────────────────────────

pub fn decode_hardware_types(node: &XmlElement) -> Vec<HardwareType> {
    node.children_named("hardware_type")
        .filter_map(|el| el.attr_string("name"))
        .map(|name| HardwareType { name })
        .collect()
}

pub fn encode_hardware_type(hardware: &HardwareType) -> XmlElement {
    XmlElement::new("hardware_type").with_attr("name", hardware.name.as_str())
}

// ── Position / granularity ──────────────────────────────────────────────────

pub fn decode_position(node: &XmlElement) -> Option<Position3D> {
    let el = node.child("position_3d")?;
    Some(Position3D {
        x: el.attr("x").unwrap_or_default().to_string(),
        y: el.attr("y").unwrap_or_default().to_string(),
        z: el.attr("z").unwrap_or_default().to_string(),
    })
}

pub fn encode_position(position: &Position3D) -> XmlElement {
    XmlElement::new("position_3d")
        .with_attr("x", position.x.as_str())
        .with_attr("y", position.y.as_str())
        .with_attr("z", position.z.as_str())
}

pub fn decode_granularity(node: &XmlElement) -> Option<u64> {
    node.child("granularity")?.attr("grain")?.trim().parse().ok()
}

pub fn encode_granularity(grain: u64) -> XmlElement {
    XmlElement::new("granularity").with_attr("grain", grain.to_string())
}

// ── Interfaces ──────────────────────────────────────────────────────────────

/// Accepts both the flat `ipv4="..."` attribute form and the nested
/// `<ip address=".." netmask=".." type=".."/>` form.
pub fn decode_interfaces(node: &XmlElement) -> Vec<Interface> {
    node.children_named("interface")
        .map(|el| {
            let ip = match el.child("ip") {
                Some(ip) => ip.attr_string("address").map(|address| IpAddress {
                    address,
                    netmask: ip.attr_string("netmask"),
                    ip_type: ip.attr_string("type"),
                }),
                None => el.attr_string("ipv4").map(|address| IpAddress {
                    address,
                    netmask: None,
                    ip_type: Some("ipv4".to_string()),
                }),
            };
            Interface {
                component_id: el.attr_string("component_id"),
                client_id: el.attr_string("client_id"),
                mac_address: el.attr_string("mac_address"),
                ip,
            }
        })
        .collect()
}

/// Flat form used by the SFA family of dialects.
pub fn encode_interface_flat(interface: &Interface) -> XmlElement {
    XmlElement::new("interface")
        .with_opt_attr("component_id", interface.component_id.as_deref())
        .with_opt_attr("client_id", interface.client_id.as_deref())
        .with_opt_attr("mac_address", interface.mac_address.as_deref())
        .with_opt_attr(
            "ipv4",
            interface.ip.as_ref().map(|ip| ip.address.as_str()),
        )
}

/// Nested form used by ProtoGENI and GENI.
pub fn encode_interface_nested(interface: &Interface) -> XmlElement {
    let mut el = XmlElement::new("interface")
        .with_opt_attr("component_id", interface.component_id.as_deref())
        .with_opt_attr("client_id", interface.client_id.as_deref())
        .with_opt_attr("mac_address", interface.mac_address.as_deref());
    if let Some(ip) = &interface.ip {
        el.push(
            XmlElement::new("ip")
                .with_attr("address", ip.address.as_str())
                .with_opt_attr("netmask", ip.netmask.as_deref())
                .with_opt_attr("type", ip.ip_type.as_deref()),
        );
    }
    el
}

// ── Services ────────────────────────────────────────────────────────────────

pub fn decode_logins(parent: &XmlElement) -> Vec<Login> {
    let Some(services) = parent.child("services") else {
        return Vec::new();
    };
    services
        .children_named("login")
        .map(|el| Login {
            authentication: el.attr("authentication").unwrap_or("ssh-keys").to_string(),
            hostname: el.attr("hostname").unwrap_or_default().to_string(),
            port: el.attr("port").unwrap_or("22").to_string(),
            username: el.attr_string("username"),
        })
        .collect()
}

pub fn encode_services(logins: &[Login]) -> XmlElement {
    let mut services = XmlElement::new("services");
    for login in logins {
        services.push(
            XmlElement::new("login")
                .with_attr("authentication", login.authentication.as_str())
                .with_attr("hostname", login.hostname.as_str())
                .with_attr("port", login.port.as_str())
                .with_opt_attr("username", login.username.as_deref()),
        );
    }
    services
}

// ── Disk images ─────────────────────────────────────────────────────────────

pub fn decode_disk_image(parent: &XmlElement) -> Option<DiskImage> {
    let el = parent.child("disk_image")?;
    Some(DiskImage {
        name: el.attr("name").unwrap_or_default().to_string(),
        os: el.attr_string("os"),
        version: el.attr_string("version"),
        description: el.attr_string("description"),
    })
}

pub fn encode_disk_image(image: &DiskImage) -> XmlElement {
    XmlElement::new("disk_image")
        .with_attr("name", image.name.as_str())
        .with_opt_attr("os", image.os.as_deref())
        .with_opt_attr("version", image.version.as_deref())
        .with_opt_attr("description", image.description.as_deref())
}

// ── Tags ────────────────────────────────────────────────────────────────────

/// `<planetlab:attribute name=".." value=".."/>` children.
pub fn decode_attribute_tags(parent: &XmlElement) -> Vec<Tag> {
    parent
        .children_named("attribute")
        .filter_map(|el| {
            Some(Tag::new(
                el.attr_string("name")?,
                el.attr("value").unwrap_or_default(),
            ))
        })
        .collect()
}

pub fn encode_attribute_tag(tag: &Tag) -> XmlElement {
    XmlElement::new("planetlab:attribute")
        .with_attr("name", tag.name.as_str())
        .with_attr("value", tag.value.as_str())
}

/// Children `<name>value</name>` of `parent` whose local name is not in
/// `known`. This is how the SFA family spells free-form tags.
pub fn decode_element_tags(parent: &XmlElement, known: &[&str]) -> Vec<Tag> {
    parent
        .elements()
        .filter(|el| !known.iter().any(|k| el.is(k)))
        .filter(|el| el.elements().next().is_none())
        .map(|el| Tag::new(el.local_name(), el.text()))
        .collect()
}

pub fn encode_element_tag(tag: &Tag) -> XmlElement {
    XmlElement::new(tag.name.as_str()).with_text(tag.value.as_str())
}
