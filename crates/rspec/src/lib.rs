//! sfa-rspec: RSpec resource descriptions in every supported dialect.
//!
//! Documents are parsed into an owned XML tree ([`xml`]) and bound to a
//! [`versions::RSpecVersion`] adapter chosen by the [`VersionRegistry`].
//! Adapters decode the tree into the canonical [`model`] values through
//! per-dialect element codecs and encode values back into it. Selection
//! over decoded values uses the shared [`Filter`] algebra.

pub mod document;
pub mod elements;
pub mod error;
pub mod filter;
pub mod model;
pub mod registry;
pub mod versions;
pub mod xml;
pub mod xrn;

pub use document::{format_timestamp, RSpec};
pub use error::RSpecError;
pub use filter::{FieldValue, Filter, Filterable, Operator};
pub use model::{
    DiskImage, HardwareType, Interface, IpAddress, Lease, Link, Location, Login, Node, NodeHandle,
    Position3D, Sliver, Tag,
};
pub use registry::{AdvertisedVersion, VersionRegistry};
pub use versions::{ContentType, RSpecVersion, VersionRequest, VersionSpec};
pub use xml::{XmlElement, XmlError};
pub use xrn::{hrn_to_urn, urn_to_hrn, Xrn};
