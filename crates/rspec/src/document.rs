//! The RSpec document: one owned XML tree bound to the adapter of its
//! dialect.

use std::path::Path;
use std::sync::Arc;

use time::macros::format_description;
use time::{Duration, OffsetDateTime};

use crate::error::RSpecError;
use crate::filter::Filter;
use crate::model::{Lease, Link, Node, NodeHandle, Tag};
use crate::registry::VersionRegistry;
use crate::versions::{ContentType, RSpecVersion, VersionRequest, VersionSpec};
use crate::xml::{self, XmlElement};

/// Lifetime given to freshly created documents.
pub const DEFAULT_VALIDITY: Duration = Duration::hours(1);

/// `2024-05-01T12:00:00Z`.
pub fn format_timestamp(at: OffsetDateTime) -> Result<String, RSpecError> {
    at.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
    ))
    .map_err(|e| RSpecError::Timestamp(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct RSpec {
    root: XmlElement,
    adapter: Arc<dyn RSpecVersion>,
    content_type: ContentType,
}

impl RSpec {
    /// Parse a document from a file path or from literal XML (anything
    /// starting with `<`), binding the adapter of its dialect.
    pub fn parse(registry: &VersionRegistry, source: &str) -> Result<Self, RSpecError> {
        Self::parse_with(registry, source, None)
    }

    /// Like [`RSpec::parse`], with the content type to assume for dialects
    /// whose XML does not declare one.
    pub fn parse_as(
        registry: &VersionRegistry,
        source: &str,
        content_type: ContentType,
    ) -> Result<Self, RSpecError> {
        Self::parse_with(registry, source, Some(content_type))
    }

    fn parse_with(
        registry: &VersionRegistry,
        source: &str,
        hint: Option<ContentType>,
    ) -> Result<Self, RSpecError> {
        let text = if source.trim_start().starts_with('<') {
            source.to_string()
        } else {
            let path = Path::new(source);
            std::fs::read_to_string(path).map_err(|e| RSpecError::Io {
                path: path.to_path_buf(),
                source: e,
            })?
        };
        let root = xml::parse(&text)?;
        let (adapter, content_type) = registry.detect(&root, hint)?;
        tracing::debug!(
            dialect = %adapter.spec(),
            content_type = %content_type,
            "parsed rspec"
        );
        Ok(RSpec {
            root,
            adapter,
            content_type,
        })
    }

    /// An empty document of the requested dialect (the registry default when
    /// `request` is `None`), valid for one hour from now.
    pub fn create(
        registry: &VersionRegistry,
        request: Option<&VersionRequest>,
        content_type: ContentType,
    ) -> Result<Self, RSpecError> {
        let adapter = registry.resolve_request(request, content_type)?;
        let now = OffsetDateTime::now_utc();
        let generated = format_timestamp(now)?;
        let expires = format_timestamp(now + DEFAULT_VALIDITY)?;
        let root = adapter.envelope(content_type, &generated, &expires);
        Ok(RSpec {
            root,
            adapter,
            content_type,
        })
    }

    pub fn version(&self) -> &VersionSpec {
        self.adapter.spec()
    }

    pub fn adapter(&self) -> &Arc<dyn RSpecVersion> {
        &self.adapter
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn generated(&self) -> Option<&str> {
        self.root.attr("generated")
    }

    pub fn expires(&self) -> Option<&str> {
        self.root.attr("expires")
    }

    pub fn set_expires(&mut self, at: OffsetDateTime) -> Result<(), RSpecError> {
        self.root.set_attr("expires", format_timestamp(at)?);
        Ok(())
    }

    /// XML declaration followed by the indented body. Identical trees always
    /// serialize to identical bytes.
    pub fn serialize(&self) -> Result<String, RSpecError> {
        Ok(xml::to_string(&self.root)?)
    }

    /// Copy the networks of `other` that this document does not have yet.
    /// Both documents must be in the same dialect; use [`RSpec::convert`]
    /// first otherwise.
    pub fn merge(&mut self, other: &RSpec) -> Result<(), RSpecError> {
        let (mine, theirs) = (self.version(), other.version());
        if !mine.is(&theirs.type_name, &theirs.version) {
            return Err(RSpecError::invalid(format!(
                "cannot merge a {theirs} rspec into a {mine} rspec"
            )));
        }
        self.adapter.merge(&mut self.root, &other.root);
        Ok(())
    }

    /// Re-encode this document in another dialect through the canonical
    /// model. Fields the target dialect cannot express are dropped.
    pub fn convert(
        &self,
        registry: &VersionRegistry,
        request: Option<&VersionRequest>,
    ) -> Result<RSpec, RSpecError> {
        let target = registry.get_version(request)?;
        if self.version().is(&target.type_name, &target.version) {
            return Ok(self.clone());
        }
        let mut converted = RSpec::create(registry, request, self.content_type)?;
        for (attr, value) in [("generated", self.generated()), ("expires", self.expires())] {
            if let Some(value) = value {
                converted.root.set_attr(attr, value);
            }
        }
        let network = self.networks().into_iter().next();
        let network = network.as_deref();
        converted.add_nodes(&self.get_nodes(None), network);
        converted.add_links(&self.get_links(None), network);
        converted.add_leases(&self.get_leases(None), network);
        Ok(converted)
    }

    /// Resolve a handle returned by [`RSpec::add_nodes`]. Returns `None` once
    /// later edits have moved or removed the node.
    pub fn node_element(&self, handle: &NodeHandle) -> Option<&XmlElement> {
        let element = self.adapter.node_element();
        let parent = if self.adapter.uses_networks() {
            self.root
                .children_named("network")
                .find(|n| n.attr_string("name") == handle.network)?
        } else {
            &self.root
        };
        parent.children_named(element).nth(handle.index)
    }

    // ── Adapter contract ────────────────────────────────────────────────────

    pub fn get_nodes(&self, filter: Option<&Filter>) -> Vec<Node> {
        self.adapter.get_nodes(&self.root, filter)
    }

    pub fn add_nodes(&mut self, nodes: &[Node], network: Option<&str>) -> Vec<NodeHandle> {
        self.adapter.add_nodes(&mut self.root, nodes, network)
    }

    pub fn get_nodes_with_slivers(&self) -> Vec<Node> {
        self.adapter.get_nodes_with_slivers(&self.root)
    }

    pub fn add_slivers(
        &mut self,
        hostnames: &[String],
        attributes: &[Tag],
        sliver_urn: Option<&str>,
        append: bool,
    ) -> usize {
        self.adapter
            .add_slivers(&mut self.root, hostnames, attributes, sliver_urn, append)
    }

    pub fn remove_slivers(&mut self, hostnames: &[String]) {
        self.adapter.remove_slivers(&mut self.root, hostnames);
    }

    pub fn get_links(&self, filter: Option<&Filter>) -> Vec<Link> {
        self.adapter.get_links(&self.root, filter)
    }

    pub fn add_links(&mut self, links: &[Link], network: Option<&str>) {
        self.adapter.add_links(&mut self.root, links, network);
    }

    pub fn get_leases(&self, filter: Option<&Filter>) -> Vec<Lease> {
        self.adapter.get_leases(&self.root, filter)
    }

    pub fn add_leases(&mut self, leases: &[Lease], network: Option<&str>) {
        self.adapter.add_leases(&mut self.root, leases, network);
    }

    pub fn networks(&self) -> Vec<String> {
        self.adapter.networks(&self.root)
    }

    pub fn cleanup(&mut self) {
        self.adapter.cleanup(&mut self.root, self.content_type);
    }

    pub fn add_default_sliver_attribute(&mut self, tag: &Tag, network: Option<&str>) {
        self.adapter
            .add_default_sliver_attribute(&mut self.root, tag, network);
    }

    pub fn get_default_sliver_attributes(&self, network: Option<&str>) -> Vec<Tag> {
        self.adapter
            .get_default_sliver_attributes(&self.root, network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SFA_AD: &str = r#"<?xml version="1.0"?>
<rspec type="SFA" version="1" generated="2024-01-01T00:00:00Z" expires="2024-01-01T01:00:00Z">
  <network name="plc">
    <node component_id="urn:publicid:IDN+plc:site+node+n1.site.org">
      <hostname>n1.site.org</hostname>
    </node>
  </network>
</rspec>"#;

    #[test]
    fn create_sets_timestamps_one_hour_apart() {
        let registry = VersionRegistry::builtin();
        let rspec = RSpec::create(&registry, None, ContentType::Request).unwrap();
        assert!(rspec.version().is("GENI", "3"));
        let generated = rspec.generated().unwrap();
        let expires = rspec.expires().unwrap();
        assert!(generated.ends_with('Z'));
        assert_eq!(generated.len(), "2024-01-01T00:00:00Z".len());
        assert!(expires > generated);
    }

    #[test]
    fn parse_reads_files_and_literals() {
        let registry = VersionRegistry::builtin();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ad.xml");
        std::fs::write(&path, SFA_AD).unwrap();
        let from_file = RSpec::parse(&registry, path.to_str().unwrap()).unwrap();
        let from_text = RSpec::parse(&registry, SFA_AD).unwrap();
        assert_eq!(from_file.root(), from_text.root());
        assert_eq!(from_text.content_type(), ContentType::Ad);

        let missing = RSpec::parse(&registry, "/nonexistent/ad.xml");
        assert!(matches!(missing, Err(RSpecError::Io { .. })));
    }

    #[test]
    fn node_handles_resolve_to_encoded_elements() {
        let registry = VersionRegistry::builtin();
        let mut rspec = RSpec::parse(&registry, SFA_AD).unwrap();
        let handles = rspec.add_nodes(&[Node::new("urn:publicid:IDN+plc:site+node+n2")], Some("plc"));
        assert_eq!(handles, vec![NodeHandle { network: Some("plc".into()), index: 1 }]);
        let el = rspec.node_element(&handles[0]).unwrap();
        assert_eq!(el.attr("component_id"), Some("urn:publicid:IDN+plc:site+node+n2"));
    }

    #[test]
    fn merge_refuses_mixed_dialects() {
        let registry = VersionRegistry::builtin();
        let mut sfa = RSpec::parse(&registry, SFA_AD).unwrap();
        let geni = RSpec::create(&registry, None, ContentType::Ad).unwrap();
        assert!(matches!(sfa.merge(&geni), Err(RSpecError::InvalidRSpec(_))));
    }

    #[test]
    fn convert_carries_nodes_between_dialects() {
        let registry = VersionRegistry::builtin();
        let sfa = RSpec::parse(&registry, SFA_AD).unwrap();
        let geni = sfa
            .convert(&registry, Some(&VersionRequest::new("GENI", "3")))
            .unwrap();
        assert!(geni.version().is("GENI", "3"));
        assert_eq!(geni.content_type(), ContentType::Ad);
        let nodes = geni.get_nodes(None);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].hostname.as_deref(), Some("n1.site.org"));
        assert_eq!(geni.generated(), Some("2024-01-01T00:00:00Z"));
    }
}
