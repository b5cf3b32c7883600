//! End-to-end AM API flows against the in-memory reference testbed.

use std::sync::Arc;

use async_trait::async_trait;
use sfa_aggregate::{
    AggregateConfig, AggregateManager, AllocationStatus, AmError, Blacklist, CallOptions, Chain,
    DriverError, FakeTestbed, LegacyDriver, OperationalStatus, PassThrough, PolicyFilter,
    SliceStatus, SliceUser, StaticAuthorizer, TrustAll,
};
use sfa_rspec::{ContentType, Node, RSpec, Sliver, VersionRegistry};
use sfa_storage::{
    AllocationState, AllocationStore, MemoryAllocationStore, SliverAllocation, StorageError,
};
use time::OffsetDateTime;

const HRN: &str = "plc.site";
const SLICE: &str = "urn:publicid:IDN+plc:site+slice+demo";

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn request(type_name: &str, version: &str, hosts: &[&str]) -> String {
    let registry = VersionRegistry::builtin();
    let version = sfa_rspec::VersionRequest::new(type_name, version);
    let mut rspec = RSpec::create(&registry, Some(&version), ContentType::Request).unwrap();
    let nodes: Vec<Node> = hosts
        .iter()
        .map(|h| {
            Node::new(format!("urn:publicid:IDN+plc:site+node+{h}")).with_sliver(Sliver {
                sliver_type: Some("raw-pc".into()),
                ..Default::default()
            })
        })
        .collect();
    rspec.add_nodes(&nodes, Some(HRN));
    rspec.serialize().unwrap()
}

fn geni_request(hosts: &[&str]) -> String {
    request("GENI", "3", hosts)
}

struct Harness {
    manager: AggregateManager,
    testbed: Arc<FakeTestbed>,
    store: Arc<dyn AllocationStore>,
}

fn harness_with(store: Arc<dyn AllocationStore>, policy: Arc<dyn PolicyFilter>) -> Harness {
    let registry = Arc::new(VersionRegistry::builtin());
    let testbed = FakeTestbed::sample(HRN, Arc::clone(&registry), 3);
    harness_over(registry, testbed, store, policy)
}

fn harness_over(
    registry: Arc<VersionRegistry>,
    testbed: FakeTestbed,
    store: Arc<dyn AllocationStore>,
    policy: Arc<dyn PolicyFilter>,
) -> Harness {
    init_tracing();
    let testbed = Arc::new(testbed);
    let driver: Arc<dyn LegacyDriver> = testbed.clone();
    let manager = AggregateManager::new(
        AggregateConfig::new(HRN),
        registry,
        driver,
        Arc::clone(&store),
        Arc::new(TrustAll {
            caller_hrn: "plc.site.alice".into(),
        }),
        policy,
    );
    Harness {
        manager,
        testbed,
        store,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(MemoryAllocationStore::new()), Arc::new(PassThrough))
}

fn slice() -> Vec<String> {
    vec![SLICE.to_string()]
}

// ──────────────────────────────────────────────
// Lifecycle
// ──────────────────────────────────────────────

#[tokio::test]
async fn allocate_provision_delete_round_trip() {
    let h = harness();
    let options = CallOptions {
        sfa_users: vec![SliceUser {
            urn: "urn:publicid:IDN+plc:site+user+alice".into(),
            keys: vec!["ssh-ed25519 AAAA".into()],
        }],
        ..Default::default()
    };

    let allocated = h
        .manager
        .allocate(SLICE, &[], &geni_request(&["node1.plc.site", "node2.plc.site"]), None, &options)
        .await
        .unwrap();
    assert_eq!(allocated.geni_slivers.len(), 2);
    assert_eq!(h.testbed.slice_users(SLICE).unwrap().len(), 1);

    let described = h.manager.describe(&slice(), &[], &options).await.unwrap();
    for sliver in &described.geni_slivers {
        assert_eq!(sliver.geni_allocation_status, AllocationStatus::Allocated);
        assert_eq!(
            sliver.geni_operational_status,
            OperationalStatus::PendingAllocation
        );
        assert!(sliver.geni_expires.is_some());
    }
    let manifest = RSpec::parse(&VersionRegistry::builtin(), &described.geni_rspec).unwrap();
    assert_eq!(manifest.content_type(), ContentType::Manifest);
    assert_eq!(manifest.get_nodes_with_slivers().len(), 2);

    let provisioned = h.manager.provision(&slice(), &[], &options).await.unwrap();
    for sliver in &provisioned.geni_slivers {
        assert_eq!(sliver.geni_allocation_status, AllocationStatus::Provisioned);
        assert_eq!(sliver.geni_operational_status, OperationalStatus::Ready);
    }

    let deleted = h.manager.delete(&slice(), &[], &options).await.unwrap();
    assert_eq!(deleted.len(), 2);
    assert!(deleted
        .iter()
        .all(|s| s.geni_allocation_status == AllocationStatus::Unallocated));

    let after = h.manager.describe(&slice(), &[], &options).await.unwrap();
    assert!(after.geni_slivers.is_empty());
    assert!(h.store.list_by_slice(&slice()).await.unwrap().is_empty());
    assert!(h.testbed.slices().unwrap().is_empty());
}

#[tokio::test]
async fn hosts_sharing_a_first_label_get_distinct_slivers() {
    let registry = Arc::new(VersionRegistry::builtin());
    let hosts = ["planetlab1.princeton.edu", "planetlab1.mit.edu"];
    let nodes = hosts
        .iter()
        .map(|h| {
            Node {
                component_name: Some(h.to_string()),
                hostname: Some(h.to_string()),
                available: Some(true),
                ..Node::new(format!("urn:publicid:IDN+plc:site+node+{h}"))
            }
            .with_sliver(Sliver {
                sliver_type: Some("raw-pc".into()),
                ..Default::default()
            })
        })
        .collect();
    let testbed = FakeTestbed::new(HRN, Arc::clone(&registry), nodes);
    let h = harness_over(
        registry,
        testbed,
        Arc::new(MemoryAllocationStore::new()),
        Arc::new(PassThrough),
    );

    let allocated = h
        .manager
        .allocate(SLICE, &[], &geni_request(&hosts), None, &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(allocated.geni_slivers.len(), 2);

    let rows = h.store.list_by_slice(&slice()).await.unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.sliver_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "urn:publicid:IDN+plc:site+sliver+demo-planetlab1.mit.edu",
            "urn:publicid:IDN+plc:site+sliver+demo-planetlab1.princeton.edu",
        ]
    );
}

#[tokio::test]
async fn reallocating_a_slice_drops_rows_the_driver_no_longer_has() {
    let h = harness();
    h.manager
        .allocate(SLICE, &[], &geni_request(&["node1.plc.site"]), None, &CallOptions::default())
        .await
        .unwrap();
    let again = h
        .manager
        .allocate(SLICE, &[], &geni_request(&["node2.plc.site"]), None, &CallOptions::default())
        .await
        .unwrap();

    let rows = h.store.list_by_slice(&slice()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].sliver_id,
        "urn:publicid:IDN+plc:site+sliver+demo-node2.plc.site"
    );
    assert_eq!(again.geni_slivers.len(), 1);
    let manifest = RSpec::parse(&VersionRegistry::builtin(), &again.geni_rspec).unwrap();
    assert_eq!(manifest.get_nodes_with_slivers().len(), 1);
}

#[tokio::test]
async fn describe_by_sliver_urn_narrows_the_manifest() {
    let h = harness();
    h.manager
        .allocate(
            SLICE,
            &[],
            &geni_request(&["node1.plc.site", "node3.plc.site"]),
            None,
            &CallOptions::default(),
        )
        .await
        .unwrap();
    let urn = "urn:publicid:IDN+plc:site+sliver+demo-node3.plc.site".to_string();
    let described = h
        .manager
        .describe(&[urn.clone()], &[], &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(described.geni_slivers.len(), 1);
    assert_eq!(described.geni_slivers[0].geni_sliver_urn, urn);
    let manifest = RSpec::parse(&VersionRegistry::builtin(), &described.geni_rspec).unwrap();
    let nodes = manifest.get_nodes(None);
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].sliver_id.as_deref(), Some(urn.as_str()));
}

#[tokio::test]
async fn manifests_follow_the_requested_dialect() {
    let h = harness();
    let options = CallOptions::default().with_version("SFA", "1");
    let result = h
        .manager
        .allocate(SLICE, &[], &request("SFA", "1", &["node2.plc.site"]), None, &options)
        .await
        .unwrap();
    let manifest = RSpec::parse_as(
        &VersionRegistry::builtin(),
        &result.geni_rspec,
        ContentType::Manifest,
    )
    .unwrap();
    assert!(manifest.version().is("SFA", "1"));
    assert_eq!(manifest.networks(), vec![HRN.to_string()]);
}

#[tokio::test]
async fn renew_extends_expiration() {
    let h = harness();
    h.manager
        .allocate(SLICE, &[], &geni_request(&["node1.plc.site"]), None, &CallOptions::default())
        .await
        .unwrap();
    let until = OffsetDateTime::now_utc() + time::Duration::days(7);
    let renewed = h
        .manager
        .renew(&slice(), &[], until, &CallOptions::default())
        .await
        .unwrap();
    let expected = sfa_rspec::format_timestamp(until).unwrap();
    assert_eq!(
        renewed.geni_slivers[0].geni_expires.as_deref(),
        Some(expected.as_str())
    );

    let status = h
        .manager
        .status(&slice(), &[], &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(status.geni_urn, SLICE);
    assert_eq!(status.geni_slivers.len(), 1);
}

// ──────────────────────────────────────────────
// Failures
// ──────────────────────────────────────────────

#[tokio::test]
async fn request_without_slivers_is_invalid_and_writes_nothing() {
    let h = harness();
    let registry = VersionRegistry::builtin();
    let mut empty = RSpec::create(&registry, None, ContentType::Request).unwrap();
    empty.add_nodes(&[Node::new("urn:publicid:IDN+plc:site+node+node1.plc.site")], None);
    let err = h
        .manager
        .allocate(SLICE, &[], &empty.serialize().unwrap(), None, &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AmError::InvalidRSpec(_)));
    assert!(h.store.list_by_slice(&slice()).await.unwrap().is_empty());
    assert!(h.testbed.slices().unwrap().is_empty());
}

#[tokio::test]
async fn file_paths_are_not_accepted_as_requests() {
    let h = harness();
    let err = h
        .manager
        .allocate(SLICE, &[], "/etc/passwd", None, &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AmError::InvalidRSpec(_)));
}

struct UnavailableTestbed;

#[async_trait]
impl LegacyDriver for UnavailableTestbed {
    async fn create_sliver(
        &self,
        _slice_urn: &str,
        _slice_hrn: &str,
        _creds: &[String],
        _rspec: &str,
        _users: &[SliceUser],
        _options: &CallOptions,
    ) -> Result<String, DriverError> {
        Err(DriverError::with_code(11, "testbed unavailable"))
    }

    async fn delete_sliver(
        &self,
        _slice_urn: &str,
        _slice_hrn: &str,
        _creds: &[String],
        _options: &CallOptions,
    ) -> Result<(), DriverError> {
        Err(DriverError::with_code(11, "testbed unavailable"))
    }

    async fn renew_sliver(
        &self,
        _slice_urn: &str,
        _slice_hrn: &str,
        _creds: &[String],
        _expiration: OffsetDateTime,
        _options: &CallOptions,
    ) -> Result<(), DriverError> {
        Err(DriverError::with_code(11, "testbed unavailable"))
    }

    async fn sliver_status(
        &self,
        _slice_urn: &str,
        _slice_hrn: &str,
    ) -> Result<SliceStatus, DriverError> {
        Err(DriverError::with_code(11, "testbed unavailable"))
    }

    async fn list_resources(
        &self,
        _slice_urn: Option<&str>,
        _creds: &[String],
        _options: &CallOptions,
    ) -> Result<String, DriverError> {
        Err(DriverError::with_code(11, "testbed unavailable"))
    }
}

#[tokio::test]
async fn driver_faults_pass_through_and_leave_no_rows() {
    init_tracing();
    let store: Arc<dyn AllocationStore> = Arc::new(MemoryAllocationStore::new());
    let manager = AggregateManager::new(
        AggregateConfig::new(HRN),
        Arc::new(VersionRegistry::builtin()),
        Arc::new(UnavailableTestbed),
        Arc::clone(&store),
        Arc::new(TrustAll {
            caller_hrn: "plc.site.alice".into(),
        }),
        Arc::new(PassThrough),
    );
    let err = manager
        .allocate(SLICE, &[], &geni_request(&["node1.plc.site"]), None, &CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "testbed unavailable");
    assert_eq!(err.geni_code(), 11);
    assert!(store.list_by_slice(&slice()).await.unwrap().is_empty());
}

/// Memory store whose bulk writes always fail.
struct FailingWrites(MemoryAllocationStore);

#[async_trait]
impl AllocationStore for FailingWrites {
    async fn insert(&self, record: SliverAllocation) -> Result<(), StorageError> {
        self.0.insert(record).await
    }

    async fn upsert_many(&self, _records: Vec<SliverAllocation>) -> Result<(), StorageError> {
        Err(StorageError::Backend("disk full".into()))
    }

    async fn replace_slice(
        &self,
        _slice_urn: &str,
        _records: Vec<SliverAllocation>,
    ) -> Result<usize, StorageError> {
        Err(StorageError::Backend("disk full".into()))
    }

    async fn compare_and_set_state(
        &self,
        sliver_id: &str,
        expected: AllocationState,
        new: AllocationState,
    ) -> Result<SliverAllocation, StorageError> {
        self.0.compare_and_set_state(sliver_id, expected, new).await
    }

    async fn delete(&self, sliver_ids: &[String]) -> Result<usize, StorageError> {
        self.0.delete(sliver_ids).await
    }

    async fn get(&self, sliver_id: &str) -> Result<SliverAllocation, StorageError> {
        self.0.get(sliver_id).await
    }

    async fn list_by_slice(
        &self,
        slice_urns: &[String],
    ) -> Result<Vec<SliverAllocation>, StorageError> {
        self.0.list_by_slice(slice_urns).await
    }

    async fn list_by_slivers(
        &self,
        sliver_ids: &[String],
    ) -> Result<Vec<SliverAllocation>, StorageError> {
        self.0.list_by_slivers(sliver_ids).await
    }
}

#[tokio::test]
async fn bookkeeping_failure_after_driver_success_is_reported_not_rolled_back() {
    let h = harness_with(
        Arc::new(FailingWrites(MemoryAllocationStore::new())),
        Arc::new(PassThrough),
    );
    let err = h
        .manager
        .allocate(SLICE, &[], &geni_request(&["node1.plc.site"]), None, &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AmError::Storage(StorageError::Backend(_))));
    assert_eq!(h.testbed.slices().unwrap(), vec![SLICE.to_string()]);
}

#[tokio::test]
async fn policy_veto_rejects_and_writes_nothing() {
    let policy = Blacklist::new(&[Chain::Incoming]).deny("node+node2.plc.site");
    let h = harness_with(Arc::new(MemoryAllocationStore::new()), Arc::new(policy));
    let err = h
        .manager
        .allocate(SLICE, &[], &geni_request(&["node2.plc.site"]), None, &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AmError::PolicyRejected(_)));
    assert_eq!(err.geni_code(), 7);
    assert!(h.store.list_by_slice(&slice()).await.unwrap().is_empty());
    assert!(h.testbed.slices().unwrap().is_empty());
}

#[tokio::test]
async fn credentials_are_checked_per_verb() {
    init_tracing();
    let registry = Arc::new(VersionRegistry::builtin());
    let testbed = Arc::new(FakeTestbed::sample(HRN, Arc::clone(&registry), 2));
    let manager = AggregateManager::new(
        AggregateConfig::new(HRN),
        registry,
        testbed,
        Arc::new(MemoryAllocationStore::new()),
        Arc::new(StaticAuthorizer::new().grant("reader", "plc.site.bob", &["listnodes"])),
        Arc::new(PassThrough),
    );
    let creds = vec!["reader".to_string()];
    assert!(manager
        .list_resources(&creds, &CallOptions::default())
        .await
        .is_ok());
    let err = manager
        .allocate(SLICE, &creds, &geni_request(&["node1.plc.site"]), None, &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AmError::Forbidden(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_provisions_all_observe_one_transition() {
    let h = harness();
    h.manager
        .allocate(SLICE, &[], &geni_request(&["node1.plc.site"]), None, &CallOptions::default())
        .await
        .unwrap();
    let manager = Arc::new(h.manager);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let m = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            m.provision(&slice(), &[], &CallOptions::default()).await
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(
            result.geni_slivers[0].geni_allocation_status,
            AllocationStatus::Provisioned
        );
    }
    let row = h
        .store
        .get("urn:publicid:IDN+plc:site+sliver+demo-node1.plc.site")
        .await
        .unwrap();
    assert_eq!(row.allocation_state, AllocationState::Provisioned);
}

// ──────────────────────────────────────────────
// Configuration
// ──────────────────────────────────────────────

#[test]
fn unsupported_flavour_is_refused() {
    let config = AggregateConfig::from_toml_str(
        "[aggregate]\nhrn = \"plc.site\"\nflavour = \"openstack\"\n",
    )
    .unwrap();
    let err = AggregateManager::from_config(
        config,
        Arc::new(MemoryAllocationStore::new()),
        Arc::new(TrustAll {
            caller_hrn: String::new(),
        }),
        Arc::new(PassThrough),
    )
    .err();
    assert!(matches!(err, Some(AmError::UnsupportedFlavour(f)) if f == "openstack"));
}

#[tokio::test]
async fn aggregate_boots_from_a_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aggregate.toml");
    std::fs::write(
        &path,
        r#"
[aggregate]
hrn = "plc.site"
flavour = "fake"
call_timeout_secs = 5

[rspec]
enabled = ["GENI 3", "SFA 1"]
"#,
    )
    .unwrap();
    let config = AggregateConfig::load(&path).unwrap();
    let store = sfa_storage::FileAllocationStore::open(dir.path().join("allocations.json")).unwrap();
    let manager = AggregateManager::from_config(
        config,
        Arc::new(store),
        Arc::new(TrustAll {
            caller_hrn: "plc.site.alice".into(),
        }),
        Arc::new(PassThrough),
    )
    .unwrap();

    let result = manager
        .allocate(SLICE, &[], &geni_request(&["node1.plc.site"]), None, &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(result.geni_slivers.len(), 1);
    assert!(dir.path().join("allocations.json").exists());

    let err = manager
        .list_resources(&[], &CallOptions::default().with_version("ProtoGENI", "2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AmError::UnknownRSpecVersion { .. }));
}
