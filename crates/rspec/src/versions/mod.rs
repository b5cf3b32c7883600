//! Version adapters: one implementation of [`RSpecVersion`] per dialect.
//!
//! The contract is expressed once, as default methods driven by a handful of
//! per-dialect hooks (node codec, whether nodes live under `<network>`,
//! lease layout, sliver-type whitelist). Dialects override a method only
//! where their schema genuinely differs.

pub mod geni3;
pub mod iotlab;
pub mod nitos;
pub mod ofelia;
pub mod pgv2;
pub mod sfav1;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::elements::{ElementCodec, LeaseLayout, LinkCodec};
use crate::filter::Filter;
use crate::model::{Lease, Link, Node, NodeHandle, Sliver, Tag};
use crate::xml::{XmlElement, XmlNode};

pub use geni3::GeniV3;
pub use iotlab::IotlabV1;
pub use nitos::NitosV1;
pub use ofelia::OfeliaV1;
pub use pgv2::PgV2;
pub use sfav1::SfaV1;

pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const PLANETLAB_EXTENSION: (&str, &str) = (
    "planetlab",
    "http://www.planet-lab.org/resources/sfa/ext/planetlab/1",
);

// ──────────────────────────────────────────────
// ContentType / VersionSpec
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Ad,
    Request,
    Manifest,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Ad => "ad",
            ContentType::Request => "request",
            ContentType::Manifest => "manifest",
        }
    }

    /// Spelling used in the root `type` attribute of namespaced dialects.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ContentType::Ad => "advertisement",
            ContentType::Request => "request",
            ContentType::Manifest => "manifest",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ad" | "advertisement" => Some(ContentType::Ad),
            "request" => Some(ContentType::Request),
            "manifest" => Some(ContentType::Manifest),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one adapter instance. `content_type == None` is the `'*'`
/// wildcard: one schema for every content type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    pub version: String,
    pub content_type: Option<ContentType>,
}

impl VersionSpec {
    pub fn new(type_name: &str, version: &str, content_type: Option<ContentType>) -> Self {
        VersionSpec {
            type_name: type_name.to_string(),
            version: version.to_string(),
            content_type,
        }
    }

    pub fn is(&self, type_name: &str, version: &str) -> bool {
        self.type_name.eq_ignore_ascii_case(type_name) && self.version == version
    }

    pub fn content_label(&self) -> &'static str {
        self.content_type.map(|c| c.as_str()).unwrap_or("*")
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.type_name, self.version)
    }
}

/// The `{type, version}` pair a caller sends as `geni_rspec_version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRequest {
    #[serde(rename = "type")]
    pub type_name: String,
    pub version: String,
}

impl VersionRequest {
    pub fn new(type_name: &str, version: &str) -> Self {
        VersionRequest {
            type_name: type_name.to_string(),
            version: version.to_string(),
        }
    }
}

// ──────────────────────────────────────────────
// Tree helpers
// ──────────────────────────────────────────────

fn parents<'a>(root: &'a XmlElement, networks: bool) -> Vec<&'a XmlElement> {
    if networks {
        root.children_named("network").collect()
    } else {
        vec![root]
    }
}

fn parents_mut(root: &mut XmlElement, networks: bool) -> Vec<&mut XmlElement> {
    if networks {
        root.elements_mut().filter(|e| e.is("network")).collect()
    } else {
        vec![root]
    }
}

fn children_of<'a>(parents: Vec<&'a XmlElement>, name: &'a str) -> Vec<&'a XmlElement> {
    parents
        .into_iter()
        .flat_map(|p| p.children_named(name))
        .collect()
}

/// Find the `<network name="..">` container, creating it when missing. With
/// no name, the first existing network is used.
pub(crate) fn network_container<'a>(root: &'a mut XmlElement, name: Option<&str>) -> &'a mut XmlElement {
    let position = root.children.iter().position(|c| match c {
        XmlNode::Element(e) => {
            e.is("network") && name.map_or(true, |n| e.attr("name") == Some(n))
        }
        XmlNode::Text(_) => false,
    });
    let idx = match position {
        Some(idx) => idx,
        None => {
            root.push(XmlElement::new("network").with_opt_attr("name", name));
            root.children.len() - 1
        }
    };
    match &mut root.children[idx] {
        XmlNode::Element(e) => e,
        XmlNode::Text(_) => unreachable!("index points at an element"),
    }
}

// ──────────────────────────────────────────────
// RSpecVersion
// ──────────────────────────────────────────────

/// The capability contract every dialect implements.
///
/// Adapters are stateless transformers over a document's root element and
/// are shared between documents behind an `Arc`.
pub trait RSpecVersion: Send + Sync + fmt::Debug {
    fn spec(&self) -> &VersionSpec;

    fn schema(&self) -> Option<&str> {
        None
    }

    fn namespace(&self) -> Option<&str> {
        None
    }

    /// Extension namespaces declared on the root element, as `(prefix, uri)`.
    fn extensions(&self) -> &[(&'static str, &'static str)] {
        &[]
    }

    fn node_codec(&self) -> &dyn ElementCodec<Node>;

    /// Local name of the element nodes are encoded as.
    fn node_element(&self) -> &'static str {
        "node"
    }

    /// Whether nodes are grouped under `<network name="..">` elements.
    fn uses_networks(&self) -> bool {
        true
    }

    fn supports_links(&self) -> bool {
        false
    }

    /// `None` for dialects that do not model scheduled reservations.
    fn lease_layout(&self) -> Option<LeaseLayout> {
        None
    }

    /// Sliver types a node must advertise before `add_slivers` will attach a
    /// sliver to it. `None` accepts any node.
    fn valid_sliver_types(&self) -> Option<&'static [&'static str]> {
        None
    }

    fn default_sliver_type(&self) -> &'static str {
        "plab-vserver"
    }

    /// Dialect-specific edits to a node that is about to receive a sliver.
    fn prepare_sliver_node(&self, _node: &mut Node) {}

    /// Empty root element for a new document.
    fn envelope(&self, content_type: ContentType, generated: &str, expires: &str) -> XmlElement {
        let spec = self.spec();
        let mut root = XmlElement::new("rspec");
        match self.namespace() {
            Some(ns) => {
                root.set_attr("type", content_type.wire_name());
                root.set_attr("xmlns", ns);
            }
            None => {
                root.set_attr("type", spec.type_name.as_str());
                root.set_attr("version", spec.version.as_str());
            }
        }
        if let Some(schema) = self.schema() {
            root.set_attr("xmlns:xsi", XSI_NAMESPACE);
            let location = match self.namespace() {
                Some(ns) => format!("{ns} {schema}"),
                None => schema.to_string(),
            };
            root.set_attr("xsi:schemaLocation", location);
        }
        for (prefix, uri) in self.extensions() {
            root.set_attr(format!("xmlns:{prefix}"), *uri);
        }
        root.set_attr("generated", generated);
        root.set_attr("expires", expires);
        root
    }

    // ── Nodes ───────────────────────────────────────────────────────────────

    fn get_nodes(&self, root: &XmlElement, filter: Option<&Filter>) -> Vec<Node> {
        let codec = self.node_codec();
        children_of(parents(root, self.uses_networks()), self.node_element())
            .into_iter()
            .map(|el| codec.decode(el))
            .filter(|node| filter.map_or(true, |f| f.matches(node)))
            .collect()
    }

    fn add_nodes(
        &self,
        root: &mut XmlElement,
        nodes: &[Node],
        network: Option<&str>,
    ) -> Vec<NodeHandle> {
        let codec = self.node_codec();
        let element = self.node_element();
        let (parent, network) = if self.uses_networks() {
            let parent = network_container(root, network);
            let name = parent.attr_string("name");
            (parent, name)
        } else {
            (root, None)
        };
        let mut index = parent.children_named(element).count();
        let mut handles = Vec::with_capacity(nodes.len());
        for node in nodes {
            parent.push(codec.encode(node));
            handles.push(NodeHandle {
                network: network.clone(),
                index,
            });
            index += 1;
        }
        handles
    }

    fn get_nodes_with_slivers(&self, root: &XmlElement) -> Vec<Node> {
        self.get_nodes(root, None)
            .into_iter()
            .filter(|node| !node.slivers.is_empty())
            .collect()
    }

    /// Attach one sliver per hostname and, unless `append`, prune every node
    /// that was not requested. Returns the number of slivers attached.
    fn add_slivers(
        &self,
        root: &mut XmlElement,
        hostnames: &[String],
        attributes: &[Tag],
        sliver_urn: Option<&str>,
        append: bool,
    ) -> usize {
        let codec = self.node_codec();
        let element = self.node_element();
        let networks = self.uses_networks();
        let mut added = 0;

        for hostname in hostnames {
            let pattern = Filter::new().with("component_id", format!("*{hostname}*"));
            let target = parents_mut(root, networks)
                .into_iter()
                .flat_map(|p| p.elements_mut().filter(|e| e.is(element)))
                .find(|el| pattern.matches(&codec.decode(el)));
            let Some(el) = target else {
                tracing::debug!(hostname = %hostname, "no node matches hostname");
                continue;
            };

            let mut node = codec.decode(el);
            let sliver_type = match self.valid_sliver_types() {
                Some(valid) => {
                    let advertised = node
                        .slivers
                        .iter()
                        .rev()
                        .filter_map(|s| s.sliver_type.as_deref())
                        .find(|t| valid.contains(t));
                    match advertised {
                        Some(t) => t.to_string(),
                        None => {
                            tracing::warn!(
                                hostname = %hostname,
                                "node advertises no valid sliver type, skipping"
                            );
                            continue;
                        }
                    }
                }
                None => node
                    .slivers
                    .iter()
                    .find_map(|s| s.sliver_type.clone())
                    .unwrap_or_else(|| self.default_sliver_type().to_string()),
            };

            self.prepare_sliver_node(&mut node);
            node.client_id = Some(hostname.clone());
            node.sliver_id = sliver_urn.map(str::to_string);
            node.slivers = vec![Sliver {
                sliver_id: sliver_urn.map(str::to_string),
                client_id: Some(hostname.clone()),
                name: sliver_urn.map(str::to_string),
                sliver_type: Some(sliver_type),
                disk_image: None,
                tags: attributes.to_vec(),
            }];
            *el = codec.encode(&node);
            added += 1;
        }

        if !append {
            for parent in parents_mut(root, networks) {
                parent.retain_elements(|e| !e.is(element) || codec.decode(e).client_id.is_some());
            }
        }
        added
    }

    fn remove_slivers(&self, root: &mut XmlElement, hostnames: &[String]) {
        let codec = self.node_codec();
        let element = self.node_element();
        for parent in parents_mut(root, self.uses_networks()) {
            for el in parent.elements_mut().filter(|e| e.is(element)) {
                let mut node = codec.decode(el);
                let requested = hostnames.iter().any(|h| {
                    node.component_id.contains(h.as_str()) || node.hostname.as_deref() == Some(h)
                });
                if requested && !node.slivers.is_empty() {
                    node.slivers.clear();
                    node.sliver_id = None;
                    *el = codec.encode(&node);
                }
            }
        }
    }

    // ── Links ───────────────────────────────────────────────────────────────

    fn get_links(&self, root: &XmlElement, filter: Option<&Filter>) -> Vec<Link> {
        if !self.supports_links() {
            return Vec::new();
        }
        children_of(parents(root, self.uses_networks()), "link")
            .into_iter()
            .map(|el| LinkCodec.decode(el))
            .filter(|link| filter.map_or(true, |f| f.matches(link)))
            .collect()
    }

    fn add_links(&self, root: &mut XmlElement, links: &[Link], network: Option<&str>) {
        if !self.supports_links() {
            tracing::debug!(dialect = %self.spec(), count = links.len(), "links dropped");
            return;
        }
        let parent = if self.uses_networks() {
            network_container(root, network)
        } else {
            root
        };
        for link in links {
            parent.push(LinkCodec.encode(link));
        }
    }

    // ── Leases ──────────────────────────────────────────────────────────────

    fn get_leases(&self, root: &XmlElement, filter: Option<&Filter>) -> Vec<Lease> {
        let Some(layout) = self.lease_layout() else {
            return Vec::new();
        };
        children_of(parents(root, self.uses_networks()), "lease")
            .into_iter()
            .flat_map(|el| layout.decode(el))
            .filter(|lease| filter.map_or(true, |f| f.matches(lease)))
            .collect()
    }

    fn add_leases(&self, root: &mut XmlElement, leases: &[Lease], network: Option<&str>) {
        let Some(layout) = self.lease_layout() else {
            tracing::debug!(dialect = %self.spec(), count = leases.len(), "leases dropped");
            return;
        };
        let parent = if self.uses_networks() {
            network_container(root, network)
        } else {
            root
        };
        for el in layout.encode(leases) {
            parent.push(el);
        }
    }

    // ── Networks / merge / cleanup ──────────────────────────────────────────

    /// Network names, in document order. Dialects without `<network>`
    /// elements group by `component_manager_id` instead.
    fn networks(&self, root: &XmlElement) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        if self.uses_networks() {
            for network in root.children_named("network") {
                if let Some(name) = network.attr_string("name") {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        } else {
            for el in root.children_named(self.node_element()) {
                if let Some(cm) = el.attr_string("component_manager_id") {
                    if !names.contains(&cm) {
                        names.push(cm);
                    }
                }
            }
        }
        names
    }

    /// Copy every network of `other` whose name is not already present.
    fn merge(&self, root: &mut XmlElement, other: &XmlElement) {
        let mut present = self.networks(root);
        if self.uses_networks() {
            for network in other.children_named("network") {
                let Some(name) = network.attr_string("name") else {
                    continue;
                };
                if !present.contains(&name) {
                    root.push(network.clone());
                    present.push(name);
                }
            }
            return;
        }

        let incoming = self.networks(other);
        for name in incoming {
            if present.contains(&name) {
                continue;
            }
            for el in other.elements() {
                let in_network = if el.is(self.node_element()) {
                    el.attr("component_manager_id") == Some(name.as_str())
                } else if el.is("link") {
                    el.children_named("component_manager")
                        .any(|cm| cm.attr("name") == Some(name.as_str()))
                } else {
                    false
                };
                if in_network {
                    root.push(el.clone());
                }
            }
            present.push(name);
        }
    }

    /// Strip advertisement-only markers from request and manifest documents.
    fn cleanup(&self, root: &mut XmlElement, content_type: ContentType) {
        if matches!(content_type, ContentType::Request | ContentType::Manifest) {
            root.remove_descendants("available");
        }
    }

    // ── Slice-wide sliver defaults ──────────────────────────────────────────

    fn add_default_sliver_attribute(&self, _root: &mut XmlElement, tag: &Tag, _network: Option<&str>) {
        tracing::debug!(dialect = %self.spec(), name = %tag.name, "default sliver attributes unsupported");
    }

    fn get_default_sliver_attributes(&self, _root: &XmlElement, _network: Option<&str>) -> Vec<Tag> {
        Vec::new()
    }
}
