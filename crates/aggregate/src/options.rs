//! Call options and response shapes of the AM API verbs.

use serde::{Deserialize, Serialize};
use sfa_rspec::VersionRequest;
use sfa_storage::AllocationState;

/// A user to be given access to a slice, as carried in `sfa_users`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceUser {
    pub urn: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Options every verb accepts. Unknown options are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOptions {
    /// Dialect the caller wants RSpecs returned in. Registry default when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geni_rspec_version: Option<VersionRequest>,
    #[serde(default)]
    pub sfa_users: Vec<SliceUser>,
    /// Whether an advertisement may be served from cache.
    #[serde(default = "default_cached")]
    pub cached: bool,
    #[serde(default)]
    pub geni_best_effort: bool,
}

fn default_cached() -> bool {
    true
}

impl Default for CallOptions {
    fn default() -> Self {
        CallOptions {
            geni_rspec_version: None,
            sfa_users: Vec::new(),
            cached: default_cached(),
            geni_best_effort: false,
        }
    }
}

impl CallOptions {
    pub fn with_version(mut self, type_name: &str, version: &str) -> Self {
        self.geni_rspec_version = Some(VersionRequest::new(type_name, version));
        self
    }

    pub fn uncached(mut self) -> Self {
        self.cached = false;
        self
    }
}

/// Allocation status as reported on the wire. `Unallocated` only appears in
/// responses; there is no row for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationStatus {
    #[serde(rename = "geni_unallocated")]
    Unallocated,
    #[serde(rename = "geni_allocated")]
    Allocated,
    #[serde(rename = "geni_provisioned")]
    Provisioned,
}

impl From<AllocationState> for AllocationStatus {
    fn from(state: AllocationState) -> Self {
        match state {
            AllocationState::Allocated => AllocationStatus::Allocated,
            AllocationState::Provisioned => AllocationStatus::Provisioned,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationalStatus {
    #[serde(rename = "geni_pending_allocation")]
    PendingAllocation,
    #[serde(rename = "geni_ready")]
    Ready,
}

impl From<AllocationState> for OperationalStatus {
    fn from(state: AllocationState) -> Self {
        match state {
            AllocationState::Allocated => OperationalStatus::PendingAllocation,
            AllocationState::Provisioned => OperationalStatus::Ready,
        }
    }
}

/// One entry of `geni_slivers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliverStatus {
    pub geni_sliver_urn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geni_expires: Option<String>,
    pub geni_allocation_status: AllocationStatus,
    pub geni_operational_status: OperationalStatus,
    #[serde(default)]
    pub geni_error: String,
}

/// Result of `Describe` and of every verb that ends in one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeResult {
    pub geni_urn: String,
    /// Manifest RSpec in the negotiated dialect.
    pub geni_rspec: String,
    pub geni_slivers: Vec<SliverStatus>,
}

/// Result of `Status` and `PerformOperationalAction`: a describe without the
/// RSpec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    pub geni_urn: String,
    pub geni_slivers: Vec<SliverStatus>,
}

impl From<DescribeResult> for StatusResult {
    fn from(describe: DescribeResult) -> Self {
        StatusResult {
            geni_urn: describe.geni_urn,
            geni_slivers: describe.geni_slivers,
        }
    }
}
