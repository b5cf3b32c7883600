//! Legacy testbed drivers.
//!
//! A driver speaks the two-verb legacy protocol (create / delete a slice's
//! slivers) plus renew, status and resource listing. The lifecycle adapter
//! maps the AM API onto it. Drivers are selected by flavour through a static
//! table; an unknown flavour is an error, never a fallback.

pub mod fake;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sfa_rspec::VersionRegistry;
use time::OffsetDateTime;

use crate::cache::ResourceCache;
use crate::config::AggregateConfig;
use crate::error::{geni_code, AmError};
use crate::options::{CallOptions, SliceUser};

pub use fake::FakeTestbed;

// ──────────────────────────────────────────────
// DriverError
// ──────────────────────────────────────────────

/// An opaque fault raised by a driver. The aggregate reports it unchanged,
/// code included.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    pub code: i32,
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_code(geni_code::ERROR, message)
    }

    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        DriverError {
            code,
            message: message.into(),
        }
    }
}

// ──────────────────────────────────────────────
// Status
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub component_id: String,
    pub status: String,
    #[serde(default)]
    pub error: String,
}

/// What `sliver_status` reports for a slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceStatus {
    pub geni_status: String,
    /// `generated`-style timestamp of the slice expiration.
    pub geni_expires: Option<String>,
    #[serde(default)]
    pub geni_resources: Vec<ResourceStatus>,
}

// ──────────────────────────────────────────────
// LegacyDriver
// ──────────────────────────────────────────────

#[async_trait]
pub trait LegacyDriver: Send + Sync {
    /// Instantiate the slivers requested by `rspec` and return the manifest.
    async fn create_sliver(
        &self,
        slice_urn: &str,
        slice_hrn: &str,
        creds: &[String],
        rspec: &str,
        users: &[SliceUser],
        options: &CallOptions,
    ) -> Result<String, DriverError>;

    /// Tear down every sliver of the slice.
    async fn delete_sliver(
        &self,
        slice_urn: &str,
        slice_hrn: &str,
        creds: &[String],
        options: &CallOptions,
    ) -> Result<(), DriverError>;

    async fn renew_sliver(
        &self,
        slice_urn: &str,
        slice_hrn: &str,
        creds: &[String],
        expiration: OffsetDateTime,
        options: &CallOptions,
    ) -> Result<(), DriverError>;

    async fn sliver_status(
        &self,
        slice_urn: &str,
        slice_hrn: &str,
    ) -> Result<SliceStatus, DriverError>;

    /// The advertisement when `slice_urn` is `None`, else the slice manifest.
    async fn list_resources(
        &self,
        slice_urn: Option<&str>,
        creds: &[String],
        options: &CallOptions,
    ) -> Result<String, DriverError>;

    fn cache(&self) -> Option<&dyn ResourceCache> {
        None
    }
}

// ──────────────────────────────────────────────
// Flavour registry
// ──────────────────────────────────────────────

pub type DriverConstructor = fn(&AggregateConfig, Arc<VersionRegistry>) -> Arc<dyn LegacyDriver>;

const FLAVOURS: &[(&str, DriverConstructor)] = &[("fake", fake::construct)];

/// Names of every shipped flavour.
pub fn flavours() -> impl Iterator<Item = &'static str> {
    FLAVOURS.iter().map(|(name, _)| *name)
}

/// Build the driver for `config.aggregate.flavour`.
pub fn driver_for(
    config: &AggregateConfig,
    registry: Arc<VersionRegistry>,
) -> Result<Arc<dyn LegacyDriver>, AmError> {
    let flavour = config.aggregate.flavour.as_str();
    let (_, construct) = FLAVOURS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(flavour))
        .ok_or_else(|| AmError::UnsupportedFlavour(flavour.to_string()))?;
    tracing::debug!(flavour, "constructing driver");
    Ok(construct(config, registry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_flavour_is_explicit() {
        let mut config = AggregateConfig::new("plc.site");
        config.aggregate.flavour = "openstack".into();
        let err = driver_for(&config, Arc::new(VersionRegistry::builtin())).err();
        assert!(matches!(err, Some(AmError::UnsupportedFlavour(f)) if f == "openstack"));
    }

    #[test]
    fn fake_flavour_is_shipped() {
        assert_eq!(flavours().collect::<Vec<_>>(), vec!["fake"]);
        let config = AggregateConfig::new("plc.site");
        assert!(driver_for(&config, Arc::new(VersionRegistry::builtin())).is_ok());
    }
}
