//! Element codecs: typed projections between one XML subtree and one model
//! value.
//!
//! Each dialect supplies its own [`ElementCodec<Node>`]; the smaller
//! projections in [`common`], the [`link`] codec and the [`lease`] layouts
//! are shared between dialects whose schemas agree on them.

pub mod common;
pub mod lease;
pub mod link;

use std::fmt;

use crate::xml::XmlElement;

/// Decode an XML subtree into a value and encode a value back into a fresh
/// subtree. Decoding is lossy: unknown content is ignored. Encoding drops
/// fields the dialect cannot express.
pub trait ElementCodec<T>: Send + Sync + fmt::Debug {
    fn decode(&self, element: &XmlElement) -> T;

    fn encode(&self, value: &T) -> XmlElement;
}

pub use lease::LeaseLayout;
pub use link::LinkCodec;
