use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{AllocationState, SliverAllocation};
use crate::table::AllocationTable;
use crate::traits::AllocationStore;

/// In-process allocation store. Every operation runs under one mutex, which
/// makes compare-and-set trivially linearizable.
#[derive(Debug, Default)]
pub struct MemoryAllocationStore {
    table: Mutex<AllocationTable>,
}

impl MemoryAllocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, AllocationTable>, StorageError> {
        self.table
            .lock()
            .map_err(|_| StorageError::Backend("allocation table lock poisoned".to_string()))
    }
}

#[async_trait]
impl AllocationStore for MemoryAllocationStore {
    async fn insert(&self, record: SliverAllocation) -> Result<(), StorageError> {
        self.lock()?.insert(record)
    }

    async fn upsert_many(&self, records: Vec<SliverAllocation>) -> Result<(), StorageError> {
        self.lock()?.upsert_many(records);
        Ok(())
    }

    async fn replace_slice(
        &self,
        slice_urn: &str,
        records: Vec<SliverAllocation>,
    ) -> Result<usize, StorageError> {
        self.lock()?.replace_slice(slice_urn, records)
    }

    async fn compare_and_set_state(
        &self,
        sliver_id: &str,
        expected: AllocationState,
        new: AllocationState,
    ) -> Result<SliverAllocation, StorageError> {
        self.lock()?.compare_and_set_state(sliver_id, expected, new)
    }

    async fn delete(&self, sliver_ids: &[String]) -> Result<usize, StorageError> {
        Ok(self.lock()?.delete(sliver_ids))
    }

    async fn get(&self, sliver_id: &str) -> Result<SliverAllocation, StorageError> {
        self.lock()?.get(sliver_id)
    }

    async fn list_by_slice(
        &self,
        slice_urns: &[String],
    ) -> Result<Vec<SliverAllocation>, StorageError> {
        Ok(self.lock()?.list_by_slice(slice_urns))
    }

    async fn list_by_slivers(
        &self,
        sliver_ids: &[String],
    ) -> Result<Vec<SliverAllocation>, StorageError> {
        Ok(self.lock()?.list_by_slivers(sliver_ids))
    }
}
