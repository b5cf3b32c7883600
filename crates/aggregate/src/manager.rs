//! The AM API facade.
//!
//! Every call runs the same pipeline: credential check, RSpec version
//! negotiation, the incoming policy chain (allocation only), the lifecycle
//! adapter, then the outgoing policy chain on any RSpec returned.

use std::sync::Arc;

use serde::Serialize;
use sfa_rspec::{
    urn_to_hrn, AdvertisedVersion, ContentType, VersionRegistry, VersionRequest, VersionSpec,
};
use sfa_storage::AllocationStore;
use time::OffsetDateTime;

use crate::auth::{Authorizer, ValidCredentials, Verb};
use crate::cache::{ResourceCache, TtlCache};
use crate::config::{AggregateConfig, InterfaceKind};
use crate::driver::{self, LegacyDriver};
use crate::error::AmError;
use crate::lifecycle::SliverLifecycle;
use crate::options::{CallOptions, DescribeResult, SliverStatus, StatusResult};
use crate::policy::{Chain, PolicyError, PolicyFilter};

/// AM API version implemented here.
pub const GENI_API_VERSION: u32 = 3;

/// `GetVersion` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub geni_api: u32,
    pub hrn: String,
    pub interface: InterfaceKind,
    pub geni_request_rspec_versions: Vec<AdvertisedVersion>,
    pub geni_ad_rspec_versions: Vec<AdvertisedVersion>,
    pub default_ad_rspec: VersionRequest,
}

pub struct AggregateManager {
    config: AggregateConfig,
    lifecycle: SliverLifecycle,
    authorizer: Arc<dyn Authorizer>,
    policy: Arc<dyn PolicyFilter>,
    cache: TtlCache,
}

impl AggregateManager {
    pub fn new(
        config: AggregateConfig,
        registry: Arc<VersionRegistry>,
        driver: Arc<dyn LegacyDriver>,
        store: Arc<dyn AllocationStore>,
        authorizer: Arc<dyn Authorizer>,
        policy: Arc<dyn PolicyFilter>,
    ) -> Self {
        let lifecycle = SliverLifecycle::new(&config.aggregate.hrn, registry, driver, store)
            .with_call_timeout(config.call_timeout());
        let cache = TtlCache::new(config.cache_ttl());
        AggregateManager {
            config,
            lifecycle,
            authorizer,
            policy,
            cache,
        }
    }

    /// Build the registry and the driver named by `config`.
    pub fn from_config(
        config: AggregateConfig,
        store: Arc<dyn AllocationStore>,
        authorizer: Arc<dyn Authorizer>,
        policy: Arc<dyn PolicyFilter>,
    ) -> Result<Self, AmError> {
        let registry = Arc::new(config.version_registry()?);
        let driver = driver::driver_for(&config, Arc::clone(&registry))?;
        tracing::info!(
            hrn = %config.aggregate.hrn,
            flavour = %config.aggregate.flavour,
            "aggregate manager ready"
        );
        Ok(Self::new(config, registry, driver, store, authorizer, policy))
    }

    pub fn config(&self) -> &AggregateConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &SliverLifecycle {
        &self.lifecycle
    }

    fn registry(&self) -> &VersionRegistry {
        self.lifecycle.registry()
    }

    async fn authorize(
        &self,
        verb: Verb,
        creds: &[String],
        target_hrn: Option<&str>,
    ) -> Result<ValidCredentials, AmError> {
        let Some(privilege) = verb.privilege() else {
            return Ok(ValidCredentials {
                credentials: creds.to_vec(),
                caller_hrn: String::new(),
            });
        };
        self.authorizer
            .check_credentials(creds, privilege, target_hrn)
            .await
            .map_err(|e| {
                tracing::warn!(verb = verb.name(), error = %e, "credential check failed");
                AmError::from(e)
            })
    }

    /// The dialect RSpecs are returned in. Unknown versions fail before any
    /// driver call.
    fn negotiate(&self, options: &CallOptions) -> Result<VersionSpec, AmError> {
        Ok(self
            .registry()
            .get_version(options.geni_rspec_version.as_ref())?)
    }

    async fn run_chain(
        &self,
        chain: Chain,
        target_hrn: &str,
        caller_hrn: &str,
        rspec: &str,
    ) -> Result<String, AmError> {
        self.policy
            .run_chain(chain, target_hrn, caller_hrn, rspec)
            .await
            .map_err(|e| {
                if matches!(e, PolicyError::Rejected { .. }) {
                    tracing::warn!(chain = %chain, target = target_hrn, caller = caller_hrn, "policy veto");
                }
                AmError::from(e)
            })
    }

    async fn outgoing(
        &self,
        target_hrn: &str,
        caller_hrn: &str,
        rspec: &str,
    ) -> Result<String, AmError> {
        let chain = Chain::outgoing(self.config.aggregate.interface);
        self.run_chain(chain, target_hrn, caller_hrn, rspec).await
    }

    async fn outgoing_describe(
        &self,
        target_hrn: &str,
        caller_hrn: &str,
        mut result: DescribeResult,
    ) -> Result<DescribeResult, AmError> {
        result.geni_rspec = self
            .outgoing(target_hrn, caller_hrn, &result.geni_rspec)
            .await?;
        Ok(result)
    }

    fn advert_cache(&self) -> Option<&dyn ResourceCache> {
        if !self.config.aggregate.caching {
            return None;
        }
        Some(
            self.lifecycle
                .driver()
                .cache()
                .unwrap_or(&self.cache as &dyn ResourceCache),
        )
    }

    // ── Verbs ───────────────────────────────────────────────────────────────

    pub fn get_version(&self) -> VersionInfo {
        let registry = self.registry();
        VersionInfo {
            geni_api: GENI_API_VERSION,
            hrn: self.config.aggregate.hrn.clone(),
            interface: self.config.aggregate.interface,
            geni_request_rspec_versions: registry.advertised(ContentType::Request),
            geni_ad_rspec_versions: registry.advertised(ContentType::Ad),
            default_ad_rspec: registry.default_request().clone(),
        }
    }

    pub async fn list_resources(
        &self,
        creds: &[String],
        options: &CallOptions,
    ) -> Result<String, AmError> {
        let hrn = self.config.aggregate.hrn.as_str();
        let valid = self.authorize(Verb::ListResources, creds, Some(hrn)).await?;
        let version = self.negotiate(options)?;
        let key = version.to_string();

        let cache = self.advert_cache();
        let cached = match cache {
            Some(cache) if options.cached => cache.get(&key),
            _ => None,
        };
        let rspec = match cached {
            Some(rspec) => {
                tracing::debug!(version = %key, "advertisement served from cache");
                rspec
            }
            None => {
                let rspec = self
                    .lifecycle
                    .list_resources(&valid.credentials, options)
                    .await?;
                if let Some(cache) = cache {
                    cache.add(&key, rspec.clone());
                }
                rspec
            }
        };
        self.outgoing(hrn, &valid.caller_hrn, &rspec).await
    }

    pub async fn allocate(
        &self,
        slice_urn: &str,
        creds: &[String],
        rspec: &str,
        expiration: Option<OffsetDateTime>,
        options: &CallOptions,
    ) -> Result<DescribeResult, AmError> {
        let slice_hrn = target_hrn(slice_urn);
        let valid = self
            .authorize(Verb::Allocate, creds, Some(&slice_hrn))
            .await?;
        self.negotiate(options)?;
        let chain = Chain::incoming(self.config.aggregate.interface);
        let request = self
            .run_chain(chain, &slice_hrn, &valid.caller_hrn, rspec)
            .await?;
        let result = self
            .lifecycle
            .allocate(slice_urn, &valid.credentials, &request, expiration, options)
            .await?;
        self.outgoing_describe(&slice_hrn, &valid.caller_hrn, result)
            .await
    }

    pub async fn describe(
        &self,
        urns: &[String],
        creds: &[String],
        options: &CallOptions,
    ) -> Result<DescribeResult, AmError> {
        let target = urns_target(urns);
        let valid = self.authorize(Verb::Describe, creds, Some(&target)).await?;
        self.negotiate(options)?;
        let result = self
            .lifecycle
            .describe(urns, &valid.credentials, options)
            .await?;
        self.outgoing_describe(&target, &valid.caller_hrn, result)
            .await
    }

    pub async fn provision(
        &self,
        urns: &[String],
        creds: &[String],
        options: &CallOptions,
    ) -> Result<DescribeResult, AmError> {
        let target = urns_target(urns);
        let valid = self.authorize(Verb::Provision, creds, Some(&target)).await?;
        self.negotiate(options)?;
        let result = self
            .lifecycle
            .provision(urns, &valid.credentials, options)
            .await?;
        self.outgoing_describe(&target, &valid.caller_hrn, result)
            .await
    }

    pub async fn status(
        &self,
        urns: &[String],
        creds: &[String],
        options: &CallOptions,
    ) -> Result<StatusResult, AmError> {
        let target = urns_target(urns);
        let valid = self.authorize(Verb::Status, creds, Some(&target)).await?;
        self.lifecycle
            .status(urns, &valid.credentials, options)
            .await
    }

    pub async fn renew(
        &self,
        urns: &[String],
        creds: &[String],
        expiration: OffsetDateTime,
        options: &CallOptions,
    ) -> Result<DescribeResult, AmError> {
        let target = urns_target(urns);
        let valid = self.authorize(Verb::Renew, creds, Some(&target)).await?;
        self.negotiate(options)?;
        let result = self
            .lifecycle
            .renew(urns, &valid.credentials, expiration, options)
            .await?;
        self.outgoing_describe(&target, &valid.caller_hrn, result)
            .await
    }

    pub async fn delete(
        &self,
        urns: &[String],
        creds: &[String],
        options: &CallOptions,
    ) -> Result<Vec<SliverStatus>, AmError> {
        let target = urns_target(urns);
        let valid = self.authorize(Verb::Delete, creds, Some(&target)).await?;
        self.lifecycle
            .delete(urns, &valid.credentials, options)
            .await
    }

    pub async fn perform_operational_action(
        &self,
        urns: &[String],
        creds: &[String],
        action: &str,
        options: &CallOptions,
    ) -> Result<StatusResult, AmError> {
        let target = urns_target(urns);
        let valid = self
            .authorize(Verb::PerformOperationalAction, creds, Some(&target))
            .await?;
        self.lifecycle
            .perform_operational_action(urns, &valid.credentials, action, options)
            .await
    }
}

/// HRN of a URN for credential and policy targets; the URN itself when it
/// does not parse.
fn target_hrn(urn: &str) -> String {
    urn_to_hrn(urn).unwrap_or_else(|_| urn.to_string())
}

fn urns_target(urns: &[String]) -> String {
    urns.first().map(|u| target_hrn(u)).unwrap_or_default()
}
