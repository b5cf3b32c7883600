use super::pgv2::{pg_schema, strip_for_request, PgNodeCodec, PG_SLIVER_TYPES};
use super::{ContentType, RSpecVersion, VersionSpec, PLANETLAB_EXTENSION};
use crate::elements::{ElementCodec, LeaseLayout};
use crate::model::Node;

pub const GENI_NAMESPACE: &str = "http://www.geni.net/resources/rspec/3";

const GENI_EXTENSIONS: &[(&str, &str)] = &[
    PLANETLAB_EXTENSION,
    ("plos", "http://www.planet-lab.org/resources/sfa/ext/plos/1"),
];

/// GENI v3, the default dialect. ProtoGENI node layout plus flat
/// `<lease>` elements.
#[derive(Debug)]
pub struct GeniV3 {
    spec: VersionSpec,
    schema: String,
}

impl GeniV3 {
    pub fn new(content_type: ContentType) -> Self {
        GeniV3 {
            spec: VersionSpec::new("GENI", "3", Some(content_type)),
            schema: pg_schema(GENI_NAMESPACE, content_type),
        }
    }
}

impl RSpecVersion for GeniV3 {
    fn spec(&self) -> &VersionSpec {
        &self.spec
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.schema)
    }

    fn namespace(&self) -> Option<&str> {
        Some(GENI_NAMESPACE)
    }

    fn extensions(&self) -> &[(&'static str, &'static str)] {
        GENI_EXTENSIONS
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

    fn lease_layout(&self) -> Option<LeaseLayout> {
        Some(LeaseLayout::Flat)
    }

    fn valid_sliver_types(&self) -> Option<&'static [&'static str]> {
        Some(PG_SLIVER_TYPES)
    }

    fn prepare_sliver_node(&self, node: &mut Node) {
        strip_for_request(node);
    }
}
