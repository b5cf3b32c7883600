//! Sliver lifecycle adapter.
//!
//! Maps the four-verb AM API (allocate, provision, renew, delete, plus
//! describe and status) onto a legacy driver that only knows how to create
//! and delete a slice's slivers. The driver provisions synchronously inside
//! `create_sliver`, so `provision` here is bookkeeping: it moves allocation
//! rows from `allocated` to `provisioned`.
//!
//! A row is written only after its driver call succeeded. Nothing spans the
//! two steps: if the driver succeeds and the store then fails, the failure
//! is logged and returned, and the driver-side effect stays in place.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sfa_rspec::{
    hrn_to_urn, urn_to_hrn, ContentType, Node, RSpec, VersionRegistry, Xrn,
};
use sfa_storage::{AllocationState, AllocationStore, SliverAllocation, StorageError};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::driver::{DriverError, LegacyDriver};
use crate::error::AmError;
use crate::options::{
    AllocationStatus, CallOptions, DescribeResult, OperationalStatus, SliverStatus, StatusResult,
};

/// Actions `perform_operational_action` accepts.
pub const OPERATIONAL_ACTIONS: &[&str] = &["geni_start", "geni_restart", "geni_stop"];

pub struct SliverLifecycle {
    hrn: String,
    registry: Arc<VersionRegistry>,
    driver: Arc<dyn LegacyDriver>,
    store: Arc<dyn AllocationStore>,
    call_timeout: Option<Duration>,
}

impl SliverLifecycle {
    /// `hrn` is the aggregate's own name and the authority of every sliver
    /// URN it mints.
    pub fn new(
        hrn: impl Into<String>,
        registry: Arc<VersionRegistry>,
        driver: Arc<dyn LegacyDriver>,
        store: Arc<dyn AllocationStore>,
    ) -> Self {
        SliverLifecycle {
            hrn: hrn.into(),
            registry,
            driver,
            store,
            call_timeout: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn hrn(&self) -> &str {
        &self.hrn
    }

    pub fn registry(&self) -> &Arc<VersionRegistry> {
        &self.registry
    }

    pub fn driver(&self) -> &Arc<dyn LegacyDriver> {
        &self.driver
    }

    pub fn store(&self) -> &Arc<dyn AllocationStore> {
        &self.store
    }

    /// `<aggregate-hrn>.<slice-leaf>-<component-name>` as a sliver URN.
    pub fn sliver_urn(&self, slice_urn: &str, node: &Node) -> Result<String, AmError> {
        let slice = parse_urn(slice_urn)?;
        let leaf = format!("{}-{}", slice.leaf(), node.component_label());
        let hrn = format!("{}.{}", self.hrn, leaf.replace('.', "\\."));
        Ok(hrn_to_urn(&hrn, "sliver"))
    }

    /// Await a driver call, bounded by the configured timeout. Calls are
    /// never retried.
    async fn call<T>(
        &self,
        verb: &'static str,
        fut: impl Future<Output = Result<T, DriverError>>,
    ) -> Result<T, AmError> {
        let result = match self.call_timeout {
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .map_err(|_| AmError::TimedOut { verb, after })?,
            None => fut.await,
        };
        result.map_err(|e| {
            tracing::debug!(verb, code = e.code, error = %e, "driver call failed");
            AmError::Driver(e)
        })
    }

    /// Split `urns` into the slice they address and the rows they select.
    ///
    /// Either every URN is a slice URN (one slice per call) or every URN is a
    /// sliver URN of one slice. Sliver URNs without a row are an error.
    async fn resolve(&self, urns: &[String]) -> Result<(String, Vec<SliverAllocation>), AmError> {
        let first = urns
            .first()
            .ok_or_else(|| AmError::BadArgs("no urns given".to_string()))?;
        let xrns = urns
            .iter()
            .map(|u| parse_urn(u))
            .collect::<Result<Vec<_>, _>>()?;

        if xrns.iter().all(|x| x.is_type("slice")) {
            if urns.iter().any(|u| u != first) {
                return Err(AmError::BadArgs("one slice per call".to_string()));
            }
            let rows = self.store.list_by_slice(&urns[..1]).await?;
            return Ok((first.clone(), rows));
        }

        if xrns.iter().all(|x| x.is_type("sliver")) {
            let rows = self.store.list_by_slivers(urns).await?;
            if let Some(missing) = urns.iter().find(|u| !rows.iter().any(|r| &r.sliver_id == *u)) {
                return Err(AmError::SliverDoesNotExist(missing.clone()));
            }
            let slice_urn = rows[0].slice_urn.clone();
            if rows.iter().any(|r| r.slice_urn != slice_urn) {
                return Err(AmError::BadArgs("slivers belong to different slices".to_string()));
            }
            return Ok((slice_urn, rows));
        }

        Err(AmError::BadArgs(
            "urns must all be slice urns or all be sliver urns".to_string(),
        ))
    }

    /// Like `resolve`, but an empty selection is `RecordNotFound`.
    async fn resolve_existing(
        &self,
        urns: &[String],
    ) -> Result<(String, Vec<SliverAllocation>), AmError> {
        let (slice_urn, rows) = self.resolve(urns).await?;
        if rows.is_empty() {
            return Err(AmError::RecordNotFound(slice_urn));
        }
        Ok((slice_urn, rows))
    }

    // ── Verbs ───────────────────────────────────────────────────────────────

    pub async fn allocate(
        &self,
        slice_urn: &str,
        creds: &[String],
        rspec: &str,
        expiration: Option<OffsetDateTime>,
        options: &CallOptions,
    ) -> Result<DescribeResult, AmError> {
        let slice = parse_urn(slice_urn)?;
        if !slice.is_type("slice") {
            return Err(AmError::BadArgs(format!("not a slice urn: {slice_urn}")));
        }
        if !rspec.trim_start().starts_with('<') {
            return Err(AmError::InvalidRSpec("request is not an xml document".to_string()));
        }
        let request = RSpec::parse_as(&self.registry, rspec, ContentType::Request)?;
        let requested = request.get_nodes_with_slivers();
        if requested.is_empty() {
            return Err(AmError::InvalidRSpec("request declares no slivers".to_string()));
        }

        let manifest_xml = self
            .call(
                "CreateSliver",
                self.driver.create_sliver(
                    slice_urn,
                    slice.hrn(),
                    creds,
                    rspec,
                    &options.sfa_users,
                    options,
                ),
            )
            .await?;

        let rows = self
            .allocation_rows(slice_urn, &manifest_xml)
            .map_err(|e| bookkeeping_failed("Allocate", slice_urn, e))?;
        let count = rows.len();
        let stale = self
            .store
            .replace_slice(slice_urn, rows)
            .await
            .map_err(|e| bookkeeping_failed("Allocate", slice_urn, e.into()))?;
        tracing::info!(slice = slice_urn, slivers = count, stale, "allocated");

        if let Some(expiration) = expiration {
            self.call(
                "RenewSliver",
                self.driver
                    .renew_sliver(slice_urn, slice.hrn(), creds, expiration, options),
            )
            .await?;
        }

        self.describe(&[slice_urn.to_string()], creds, options).await
    }

    fn allocation_rows(
        &self,
        slice_urn: &str,
        manifest_xml: &str,
    ) -> Result<Vec<SliverAllocation>, AmError> {
        let manifest = RSpec::parse_as(&self.registry, manifest_xml, ContentType::Manifest)?;
        let mut rows: Vec<SliverAllocation> = Vec::new();
        for node in manifest.get_nodes_with_slivers() {
            let sliver_id = self.sliver_urn(slice_urn, &node)?;
            if rows.iter().any(|r| r.sliver_id == sliver_id) {
                return Err(AmError::InvalidRSpec(format!(
                    "manifest names {sliver_id} more than once"
                )));
            }
            let client_id = node
                .client_id
                .clone()
                .or_else(|| node.slivers.iter().find_map(|s| s.client_id.clone()));
            rows.push(SliverAllocation::allocated(
                sliver_id,
                client_id,
                node.component_id,
                slice_urn,
            ));
        }
        Ok(rows)
    }

    pub async fn describe(
        &self,
        urns: &[String],
        creds: &[String],
        options: &CallOptions,
    ) -> Result<DescribeResult, AmError> {
        let (slice_urn, rows) = self.resolve(urns).await?;
        let version = options.geni_rspec_version.as_ref();
        let mut manifest = RSpec::create(&self.registry, version, ContentType::Manifest)?;

        if rows.is_empty() {
            return Ok(DescribeResult {
                geni_urn: slice_urn,
                geni_rspec: manifest.serialize()?,
                geni_slivers: Vec::new(),
            });
        }

        let slice_hrn = urn_to_hrn(&slice_urn)?;
        let status = self
            .call("SliverStatus", self.driver.sliver_status(&slice_urn, &slice_hrn))
            .await?;
        let driver_xml = self
            .call(
                "ListResources",
                self.driver.list_resources(Some(&slice_urn), creds, options),
            )
            .await?;
        let driver_manifest =
            RSpec::parse_as(&self.registry, &driver_xml, ContentType::Manifest)?;

        let nodes: Vec<Node> = driver_manifest
            .get_nodes_with_slivers()
            .into_iter()
            .filter_map(|mut node| {
                let row = rows.iter().find(|r| r.component_id == node.component_id)?;
                node.sliver_id = Some(row.sliver_id.clone());
                for sliver in &mut node.slivers {
                    sliver.sliver_id = Some(row.sliver_id.clone());
                    if row.client_id.is_some() {
                        sliver.client_id = row.client_id.clone();
                    }
                }
                Some(node)
            })
            .collect();
        let network = driver_manifest.networks().into_iter().next();
        manifest.add_nodes(&nodes, network.as_deref());
        if let Some(expires) = status.geni_expires.as_deref() {
            match OffsetDateTime::parse(expires, &Rfc3339) {
                Ok(at) => manifest.set_expires(at)?,
                Err(e) => tracing::warn!(expires, error = %e, "driver reported unreadable expiration"),
            }
        }

        let geni_slivers = rows
            .iter()
            .map(|row| SliverStatus {
                geni_sliver_urn: row.sliver_id.clone(),
                geni_expires: status.geni_expires.clone(),
                geni_allocation_status: row.allocation_state.into(),
                geni_operational_status: row.allocation_state.into(),
                geni_error: String::new(),
            })
            .collect();

        Ok(DescribeResult {
            geni_urn: urns[0].clone(),
            geni_rspec: manifest.serialize()?,
            geni_slivers,
        })
    }

    /// Move every selected `allocated` row to `provisioned`. The legacy
    /// backend already instantiated the slivers, so no driver call is made.
    pub async fn provision(
        &self,
        urns: &[String],
        creds: &[String],
        options: &CallOptions,
    ) -> Result<DescribeResult, AmError> {
        let (slice_urn, rows) = self.resolve_existing(urns).await?;
        let mut provisioned = 0usize;
        for row in rows
            .iter()
            .filter(|r| r.allocation_state == AllocationState::Allocated)
        {
            match self
                .store
                .compare_and_set_state(
                    &row.sliver_id,
                    AllocationState::Allocated,
                    AllocationState::Provisioned,
                )
                .await
            {
                Ok(_) => provisioned += 1,
                Err(StorageError::ConcurrentConflict {
                    actual: AllocationState::Provisioned,
                    ..
                }) => {
                    tracing::debug!(sliver = %row.sliver_id, "already provisioned by a concurrent call");
                }
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!(slice = %slice_urn, slivers = provisioned, "provisioned");
        self.describe(urns, creds, options).await
    }

    pub async fn status(
        &self,
        urns: &[String],
        creds: &[String],
        options: &CallOptions,
    ) -> Result<StatusResult, AmError> {
        Ok(self.describe(urns, creds, options).await?.into())
    }

    pub async fn renew(
        &self,
        urns: &[String],
        creds: &[String],
        expiration: OffsetDateTime,
        options: &CallOptions,
    ) -> Result<DescribeResult, AmError> {
        let (slice_urn, _) = self.resolve_existing(urns).await?;
        let slice_hrn = urn_to_hrn(&slice_urn)?;
        self.call(
            "RenewSliver",
            self.driver
                .renew_sliver(&slice_urn, &slice_hrn, creds, expiration, options),
        )
        .await?;
        tracing::info!(slice = %slice_urn, "renewed");
        self.describe(urns, creds, options).await
    }

    /// Delete the slice's slivers in the driver, then drop their rows.
    ///
    /// The legacy driver removes whole slices, so naming any sliver of a
    /// slice deletes every sliver of it.
    pub async fn delete(
        &self,
        urns: &[String],
        creds: &[String],
        options: &CallOptions,
    ) -> Result<Vec<SliverStatus>, AmError> {
        let (slice_urn, _) = self.resolve_existing(urns).await?;
        let rows = self.store.list_by_slice(&[slice_urn.clone()]).await?;
        let slice_hrn = urn_to_hrn(&slice_urn)?;
        self.call(
            "DeleteSliver",
            self.driver
                .delete_sliver(&slice_urn, &slice_hrn, creds, options),
        )
        .await?;

        let ids: Vec<String> = rows.iter().map(|r| r.sliver_id.clone()).collect();
        let removed = self
            .store
            .delete(&ids)
            .await
            .map_err(|e| bookkeeping_failed("Delete", &slice_urn, e.into()))?;
        tracing::info!(slice = %slice_urn, slivers = removed, "deleted");

        Ok(ids
            .into_iter()
            .map(|id| SliverStatus {
                geni_sliver_urn: id,
                geni_expires: None,
                geni_allocation_status: AllocationStatus::Unallocated,
                geni_operational_status: OperationalStatus::PendingAllocation,
                geni_error: String::new(),
            })
            .collect())
    }

    /// Validate the action and report status. Nothing is sent to the
    /// driver; legacy backends have no operational states.
    pub async fn perform_operational_action(
        &self,
        urns: &[String],
        creds: &[String],
        action: &str,
        options: &CallOptions,
    ) -> Result<StatusResult, AmError> {
        if !OPERATIONAL_ACTIONS.contains(&action) {
            return Err(AmError::BadArgs(format!("unsupported action: {action}")));
        }
        let (slice_urn, _) = self.resolve_existing(urns).await?;
        tracing::info!(slice = %slice_urn, action, "operational action");
        self.status(urns, creds, options).await
    }

    /// The aggregate advertisement, straight from the driver.
    pub async fn list_resources(
        &self,
        creds: &[String],
        options: &CallOptions,
    ) -> Result<String, AmError> {
        self.call(
            "ListResources",
            self.driver.list_resources(None, creds, options),
        )
        .await
    }
}

fn parse_urn(urn: &str) -> Result<Xrn, AmError> {
    Xrn::from_urn(urn).map_err(|e| AmError::BadArgs(e.to_string()))
}

fn bookkeeping_failed(verb: &str, slice_urn: &str, error: AmError) -> AmError {
    tracing::error!(
        verb,
        slice = slice_urn,
        error = %error,
        "driver call succeeded but allocation bookkeeping failed"
    );
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FakeTestbed;
    use sfa_rspec::Sliver;
    use sfa_storage::MemoryAllocationStore;

    const SLICE: &str = "urn:publicid:IDN+plc:site+slice+demo";

    fn lifecycle() -> SliverLifecycle {
        let registry = Arc::new(VersionRegistry::builtin());
        let driver = Arc::new(FakeTestbed::sample("plc.site", Arc::clone(&registry), 3));
        SliverLifecycle::new(
            "plc.site",
            registry,
            driver,
            Arc::new(MemoryAllocationStore::new()),
        )
    }

    fn request(hosts: &[&str]) -> String {
        let registry = VersionRegistry::builtin();
        let mut rspec = RSpec::create(&registry, None, ContentType::Request).unwrap();
        let nodes: Vec<Node> = hosts
            .iter()
            .map(|h| {
                Node::new(format!("urn:publicid:IDN+plc:site+node+{h}")).with_sliver(Sliver {
                    sliver_type: Some("raw-pc".into()),
                    ..Default::default()
                })
            })
            .collect();
        rspec.add_nodes(&nodes, None);
        rspec.serialize().unwrap()
    }

    #[test]
    fn sliver_urns_combine_authority_slice_and_component() {
        let lc = lifecycle();
        let node = Node::new("urn:publicid:IDN+plc:site+node+node1.plc.site");
        assert_eq!(
            lc.sliver_urn(SLICE, &node).unwrap(),
            "urn:publicid:IDN+plc:site+sliver+demo-node1.plc.site"
        );
    }

    #[test]
    fn sliver_urns_keep_the_whole_component_name() {
        let lc = lifecycle();
        let princeton = Node {
            component_name: Some("planetlab1.princeton.edu".into()),
            ..Node::new("urn:publicid:IDN+plc:site+node+planetlab1.princeton.edu")
        };
        let mit = Node {
            component_name: Some("planetlab1.mit.edu".into()),
            ..Node::new("urn:publicid:IDN+plc:site+node+planetlab1.mit.edu")
        };
        let a = lc.sliver_urn(SLICE, &princeton).unwrap();
        let b = lc.sliver_urn(SLICE, &mit).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, "urn:publicid:IDN+plc:site+sliver+demo-planetlab1.princeton.edu");
        assert_eq!(urn_to_hrn(&a).unwrap(), "plc.site.demo-planetlab1\\.princeton\\.edu");
    }

    #[tokio::test]
    async fn allocate_writes_rows_and_describes() {
        let lc = lifecycle();
        let result = lc
            .allocate(SLICE, &[], &request(&["node1.plc.site"]), None, &CallOptions::default())
            .await
            .unwrap();
        assert_eq!(result.geni_urn, SLICE);
        assert_eq!(result.geni_slivers.len(), 1);
        assert_eq!(
            result.geni_slivers[0].geni_allocation_status,
            AllocationStatus::Allocated
        );
        let row = lc
            .store()
            .get("urn:publicid:IDN+plc:site+sliver+demo-node1.plc.site")
            .await
            .unwrap();
        assert_eq!(row.client_id.as_deref(), Some("node1.plc.site"));
        assert!(result.geni_rspec.contains("demo-node1"));
    }

    #[tokio::test]
    async fn mixed_and_unknown_urns_are_rejected() {
        let lc = lifecycle();
        let mixed = vec![
            SLICE.to_string(),
            "urn:publicid:IDN+plc:site+sliver+demo-node1.plc.site".to_string(),
        ];
        assert!(matches!(
            lc.describe(&mixed, &[], &CallOptions::default()).await,
            Err(AmError::BadArgs(_))
        ));
        let missing =
            vec!["urn:publicid:IDN+plc:site+sliver+demo-node9.plc.site".to_string()];
        assert!(matches!(
            lc.describe(&missing, &[], &CallOptions::default()).await,
            Err(AmError::SliverDoesNotExist(u)) if u == missing[0]
        ));
        assert!(matches!(
            lc.describe(&[], &[], &CallOptions::default()).await,
            Err(AmError::BadArgs(_))
        ));
    }

    #[tokio::test]
    async fn describing_an_empty_slice_skips_the_driver() {
        let lc = lifecycle();
        let result = lc
            .describe(&[SLICE.to_string()], &[], &CallOptions::default())
            .await
            .unwrap();
        assert!(result.geni_slivers.is_empty());
        assert!(result.geni_rspec.starts_with("<?xml"));
    }

    #[tokio::test]
    async fn operational_actions_are_validated() {
        let lc = lifecycle();
        lc.allocate(SLICE, &[], &request(&["node2.plc.site"]), None, &CallOptions::default())
            .await
            .unwrap();
        let urns = vec![SLICE.to_string()];
        assert!(matches!(
            lc.perform_operational_action(&urns, &[], "geni_explode", &CallOptions::default())
                .await,
            Err(AmError::BadArgs(_))
        ));
        let status = lc
            .perform_operational_action(&urns, &[], "geni_start", &CallOptions::default())
            .await
            .unwrap();
        assert_eq!(status.geni_slivers.len(), 1);
    }

    #[tokio::test]
    async fn timeouts_bound_driver_calls() {
        let lc = lifecycle().with_call_timeout(Some(Duration::from_millis(50)));
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), DriverError>(())
        };
        assert!(matches!(
            lc.call("Slow", slow).await,
            Err(AmError::TimedOut { verb: "Slow", .. })
        ));
    }
}
