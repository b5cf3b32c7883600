use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{AllocationState, SliverAllocation};

/// The storage trait for sliver allocation bookkeeping.
///
/// An `AllocationStore` keeps one [`SliverAllocation`] row per sliver URN.
/// It owns only metadata: the resources themselves live in the testbed
/// behind the driver.
///
/// ## Atomicity
///
/// Every method is atomic on its own. `upsert_many` and `replace_slice`
/// write all rows or none.
/// `compare_and_set_state` is the only way to transition a row and must be
/// linearizable per sliver: of two racing transitions from the same expected
/// state, exactly one succeeds and the other gets
/// `StorageError::ConcurrentConflict`.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static`; the aggregate shares a
/// single store behind an `Arc<dyn AllocationStore>` across calls.
#[async_trait]
pub trait AllocationStore: Send + Sync + 'static {
    // ── Writes ────────────────────────────────────────────────────────────────

    /// Insert a new row.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if a row with the same
    /// `sliver_id` exists.
    async fn insert(&self, record: SliverAllocation) -> Result<(), StorageError>;

    /// Insert or overwrite every row in `records`, all or nothing.
    async fn upsert_many(&self, records: Vec<SliverAllocation>) -> Result<(), StorageError>;

    /// Replace every row of `slice_urn` with `records`, all or nothing. Rows
    /// of the slice that are not in `records` are removed. Returns the number
    /// of rows removed that `records` did not write back.
    async fn replace_slice(
        &self,
        slice_urn: &str,
        records: Vec<SliverAllocation>,
    ) -> Result<usize, StorageError>;

    /// Transition a row from `expected` to `new`.
    ///
    /// Returns the updated row, `Err(StorageError::RecordNotFound)` if there is
    /// no row, or `Err(StorageError::ConcurrentConflict)` if the row is not in
    /// `expected`.
    async fn compare_and_set_state(
        &self,
        sliver_id: &str,
        expected: AllocationState,
        new: AllocationState,
    ) -> Result<SliverAllocation, StorageError>;

    /// Delete the rows for `sliver_ids`. Missing rows are ignored; returns the
    /// number of rows removed.
    async fn delete(&self, sliver_ids: &[String]) -> Result<usize, StorageError>;

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Read one row.
    ///
    /// Returns `Err(StorageError::RecordNotFound)` if it does not exist.
    async fn get(&self, sliver_id: &str) -> Result<SliverAllocation, StorageError>;

    /// All rows belonging to any of `slice_urns`, ordered by `sliver_id`.
    async fn list_by_slice(
        &self,
        slice_urns: &[String],
    ) -> Result<Vec<SliverAllocation>, StorageError>;

    /// The rows for `sliver_ids` that exist, ordered by `sliver_id`.
    async fn list_by_slivers(
        &self,
        sliver_ids: &[String],
    ) -> Result<Vec<SliverAllocation>, StorageError>;
}
