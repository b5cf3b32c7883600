//! In-memory reference testbed.
//!
//! Every `FakeTestbed` owns its nodes and slices; two instances never share
//! state. Slivers are "created" synchronously by recording the slice.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use sfa_rspec::{
    format_timestamp, ContentType, Node, RSpec, Sliver, VersionRegistry, VersionRequest,
};
use time::{Duration, OffsetDateTime};

use super::{DriverError, LegacyDriver, ResourceStatus, SliceStatus};
use crate::cache::{ResourceCache, TtlCache};
use crate::config::AggregateConfig;
use crate::error::geni_code;
use crate::options::{CallOptions, SliceUser};

/// Lifetime of a freshly created slice.
const SLICE_LIFETIME: Duration = Duration::days(1);

#[derive(Debug, Clone)]
struct FakeSlice {
    hostnames: Vec<String>,
    users: Vec<SliceUser>,
    expires: OffsetDateTime,
}

#[derive(Debug, Default)]
struct FakeState {
    nodes: Vec<Node>,
    slices: BTreeMap<String, FakeSlice>,
}

pub struct FakeTestbed {
    hrn: String,
    registry: Arc<VersionRegistry>,
    state: Mutex<FakeState>,
    cache: Option<TtlCache>,
}

pub(super) fn construct(
    config: &AggregateConfig,
    registry: Arc<VersionRegistry>,
) -> Arc<dyn LegacyDriver> {
    Arc::new(FakeTestbed::sample(&config.aggregate.hrn, registry, 4))
}

impl FakeTestbed {
    pub fn new(hrn: impl Into<String>, registry: Arc<VersionRegistry>, nodes: Vec<Node>) -> Self {
        FakeTestbed {
            hrn: hrn.into(),
            registry,
            state: Mutex::new(FakeState {
                nodes,
                slices: BTreeMap::new(),
            }),
            cache: None,
        }
    }

    /// `count` raw PCs named `node<i>.<hrn>`.
    pub fn sample(hrn: &str, registry: Arc<VersionRegistry>, count: usize) -> Self {
        let authority = hrn.replace('.', ":");
        let nodes = (1..=count)
            .map(|i| {
                let host = format!("node{i}.{hrn}");
                Node {
                    component_manager_id: Some(format!(
                        "urn:publicid:IDN+{authority}+authority+cm"
                    )),
                    component_name: Some(host.clone()),
                    hostname: Some(host.clone()),
                    exclusive: Some(false),
                    available: Some(true),
                    ..Node::new(format!("urn:publicid:IDN+{authority}+node+{host}"))
                }
                .with_hardware_type("pc")
                .with_sliver(Sliver {
                    sliver_type: Some("raw-pc".to_string()),
                    ..Default::default()
                })
            })
            .collect();
        Self::new(hrn, registry, nodes)
    }

    /// Expose a driver-side advertisement cache.
    pub fn with_cache(mut self, ttl: std::time::Duration) -> Self {
        self.cache = Some(TtlCache::new(ttl));
        self
    }

    pub fn nodes(&self) -> Result<Vec<Node>, DriverError> {
        Ok(self.lock()?.nodes.clone())
    }

    /// URNs of the slices currently instantiated.
    pub fn slices(&self) -> Result<Vec<String>, DriverError> {
        Ok(self.lock()?.slices.keys().cloned().collect())
    }

    pub fn slice_users(&self, slice_urn: &str) -> Result<Vec<SliceUser>, DriverError> {
        Ok(self
            .lock()?
            .slices
            .get(slice_urn)
            .map(|s| s.users.clone())
            .unwrap_or_default())
    }

    fn lock(&self) -> Result<MutexGuard<'_, FakeState>, DriverError> {
        self.state
            .lock()
            .map_err(|_| DriverError::new("fake testbed state poisoned"))
    }

    fn fault(e: impl std::fmt::Display) -> DriverError {
        DriverError::new(e.to_string())
    }

    /// Nodes of the testbed encoded as a `content_type` document in the
    /// requested dialect, pruned to the slice's slivers when given.
    fn render(
        &self,
        content_type: ContentType,
        version: Option<&VersionRequest>,
        nodes: &[Node],
        slice: Option<&FakeSlice>,
    ) -> Result<String, DriverError> {
        let mut rspec =
            RSpec::create(&self.registry, version, content_type).map_err(Self::fault)?;
        rspec.add_nodes(nodes, Some(&self.hrn));
        if let Some(slice) = slice {
            rspec.add_slivers(&slice.hostnames, &[], None, false);
            rspec.set_expires(slice.expires).map_err(Self::fault)?;
        }
        rspec.cleanup();
        rspec.serialize().map_err(Self::fault)
    }

    fn unknown_slice(slice_urn: &str) -> DriverError {
        DriverError::with_code(geni_code::SEARCHFAILED, format!("no such slice: {slice_urn}"))
    }
}

#[async_trait]
impl LegacyDriver for FakeTestbed {
    async fn create_sliver(
        &self,
        slice_urn: &str,
        slice_hrn: &str,
        _creds: &[String],
        rspec: &str,
        users: &[SliceUser],
        _options: &CallOptions,
    ) -> Result<String, DriverError> {
        let request = RSpec::parse_as(&self.registry, rspec, ContentType::Request)
            .map_err(|e| DriverError::with_code(geni_code::BADARGS, e.to_string()))?;
        let spec = request.version();
        let version = VersionRequest::new(&spec.type_name, &spec.version);

        let mut state = self.lock()?;
        let mut hostnames = Vec::new();
        for wanted in request.get_nodes_with_slivers() {
            let node = state
                .nodes
                .iter()
                .find(|n| {
                    n.component_id == wanted.component_id
                        || (wanted.hostname.is_some() && n.hostname == wanted.hostname)
                })
                .ok_or_else(|| {
                    DriverError::with_code(
                        geni_code::SEARCHFAILED,
                        format!("no such node: {}", wanted.component_id),
                    )
                })?;
            let hostname = node.hostname.clone().unwrap_or_else(|| node.component_id.clone());
            if !hostnames.contains(&hostname) {
                hostnames.push(hostname);
            }
        }

        let slice = FakeSlice {
            hostnames,
            users: users.to_vec(),
            expires: OffsetDateTime::now_utc() + SLICE_LIFETIME,
        };
        tracing::info!(
            slice = slice_hrn,
            nodes = slice.hostnames.len(),
            "fake testbed created slivers"
        );
        let manifest = self.render(ContentType::Manifest, Some(&version), &state.nodes, Some(&slice));
        state.slices.insert(slice_urn.to_string(), slice);
        manifest
    }

    async fn delete_sliver(
        &self,
        slice_urn: &str,
        slice_hrn: &str,
        _creds: &[String],
        _options: &CallOptions,
    ) -> Result<(), DriverError> {
        self.lock()?
            .slices
            .remove(slice_urn)
            .ok_or_else(|| Self::unknown_slice(slice_urn))?;
        tracing::info!(slice = slice_hrn, "fake testbed deleted slice");
        Ok(())
    }

    async fn renew_sliver(
        &self,
        slice_urn: &str,
        _slice_hrn: &str,
        _creds: &[String],
        expiration: OffsetDateTime,
        _options: &CallOptions,
    ) -> Result<(), DriverError> {
        if expiration <= OffsetDateTime::now_utc() {
            return Err(DriverError::with_code(
                geni_code::BADARGS,
                "requested expiration is in the past",
            ));
        }
        let mut state = self.lock()?;
        let slice = state
            .slices
            .get_mut(slice_urn)
            .ok_or_else(|| Self::unknown_slice(slice_urn))?;
        slice.expires = expiration;
        Ok(())
    }

    async fn sliver_status(
        &self,
        slice_urn: &str,
        _slice_hrn: &str,
    ) -> Result<SliceStatus, DriverError> {
        let state = self.lock()?;
        let slice = state
            .slices
            .get(slice_urn)
            .ok_or_else(|| Self::unknown_slice(slice_urn))?;
        let geni_resources = state
            .nodes
            .iter()
            .filter(|n| {
                n.hostname
                    .as_ref()
                    .is_some_and(|h| slice.hostnames.contains(h))
            })
            .map(|n| ResourceStatus {
                component_id: n.component_id.clone(),
                status: "ready".to_string(),
                error: String::new(),
            })
            .collect();
        Ok(SliceStatus {
            geni_status: "ready".to_string(),
            geni_expires: Some(format_timestamp(slice.expires).map_err(Self::fault)?),
            geni_resources,
        })
    }

    async fn list_resources(
        &self,
        slice_urn: Option<&str>,
        _creds: &[String],
        options: &CallOptions,
    ) -> Result<String, DriverError> {
        let version = options.geni_rspec_version.as_ref();
        let state = self.lock()?;
        match slice_urn {
            None => self.render(ContentType::Ad, version, &state.nodes, None),
            Some(urn) => {
                let empty = FakeSlice {
                    hostnames: Vec::new(),
                    users: Vec::new(),
                    expires: OffsetDateTime::now_utc(),
                };
                let slice = state.slices.get(urn).unwrap_or(&empty);
                self.render(ContentType::Manifest, version, &state.nodes, Some(slice))
            }
        }
    }

    fn cache(&self) -> Option<&dyn ResourceCache> {
        self.cache.as_ref().map(|c| c as &dyn ResourceCache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLICE: &str = "urn:publicid:IDN+plc:site+slice+demo";

    fn testbed() -> FakeTestbed {
        FakeTestbed::sample("plc.site", Arc::new(VersionRegistry::builtin()), 3)
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

    #[tokio::test]
    async fn advertisement_lists_every_node_as_available() {
        let tb = testbed();
        let ad = tb
            .list_resources(None, &[], &CallOptions::default())
            .await
            .unwrap();
        let rspec = RSpec::parse(&VersionRegistry::builtin(), &ad).unwrap();
        assert_eq!(rspec.content_type(), ContentType::Ad);
        let nodes = rspec.get_nodes(None);
        assert_eq!(nodes.len(), 3);
        assert!(nodes.iter().all(|n| n.available == Some(true)));
    }

    #[tokio::test]
    async fn create_then_manifest_holds_only_requested_nodes() {
        let tb = testbed();
        let manifest = tb
            .create_sliver(
                SLICE,
                "plc.site.demo",
                &[],
                &request(&["node2.plc.site"]),
                &[SliceUser {
                    urn: "urn:publicid:IDN+plc:site+user+alice".into(),
                    keys: vec!["ssh-rsa AAA".into()],
                }],
                &CallOptions::default(),
            )
            .await
            .unwrap();
        let rspec = RSpec::parse(&VersionRegistry::builtin(), &manifest).unwrap();
        let nodes = rspec.get_nodes_with_slivers();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].client_id.as_deref(), Some("node2.plc.site"));
        assert_eq!(tb.slices().unwrap(), vec![SLICE.to_string()]);
        assert_eq!(tb.slice_users(SLICE).unwrap().len(), 1);

        let status = tb.sliver_status(SLICE, "plc.site.demo").await.unwrap();
        assert_eq!(status.geni_resources.len(), 1);
        assert!(status.geni_expires.is_some());
    }

    #[tokio::test]
    async fn unknown_nodes_and_slices_fail() {
        let tb = testbed();
        let err = tb
            .create_sliver(SLICE, "x", &[], &request(&["ghost"]), &[], &CallOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, geni_code::SEARCHFAILED);
        assert!(tb.slices().unwrap().is_empty());

        assert!(tb.delete_sliver(SLICE, "x", &[], &CallOptions::default()).await.is_err());
        assert!(tb.sliver_status(SLICE, "x").await.is_err());
    }

    #[tokio::test]
    async fn renew_rejects_past_expiration() {
        let tb = testbed();
        tb.create_sliver(SLICE, "x", &[], &request(&["node1.plc.site"]), &[], &CallOptions::default())
            .await
            .unwrap();
        let past = OffsetDateTime::now_utc() - Duration::hours(1);
        let err = tb
            .renew_sliver(SLICE, "x", &[], past, &CallOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, geni_code::BADARGS);
        let later = OffsetDateTime::now_utc() + Duration::days(3);
        tb.renew_sliver(SLICE, "x", &[], later, &CallOptions::default())
            .await
            .unwrap();
    }

    #[test]
    fn instances_do_not_share_state() {
        let a = testbed();
        let b = FakeTestbed::sample("plc.other", Arc::new(VersionRegistry::builtin()), 1);
        assert_eq!(a.nodes().unwrap().len(), 3);
        assert_eq!(b.nodes().unwrap().len(), 1);
        assert!(a.cache().is_none());
        assert!(b.with_cache(std::time::Duration::from_secs(5)).cache().is_some());
    }
}
