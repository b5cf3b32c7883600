//! The allocation table both shipped stores keep in memory. Every method is
//! a synchronous step applied under the owning store's lock.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::record::{AllocationState, SliverAllocation};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct AllocationTable {
    rows: BTreeMap<String, SliverAllocation>,
}

impl AllocationTable {
    pub(crate) fn insert(&mut self, record: SliverAllocation) -> Result<(), StorageError> {
        if self.rows.contains_key(&record.sliver_id) {
            return Err(StorageError::AlreadyExists {
                sliver_id: record.sliver_id,
            });
        }
        self.rows.insert(record.sliver_id.clone(), record);
        Ok(())
    }

    pub(crate) fn upsert_many(&mut self, records: Vec<SliverAllocation>) {
        for record in records {
            self.rows.insert(record.sliver_id.clone(), record);
        }
    }

    pub(crate) fn replace_slice(
        &mut self,
        slice_urn: &str,
        records: Vec<SliverAllocation>,
    ) -> Result<usize, StorageError> {
        if let Some(stray) = records.iter().find(|r| r.slice_urn != slice_urn) {
            return Err(StorageError::Backend(format!(
                "row {} belongs to {}, not {slice_urn}",
                stray.sliver_id, stray.slice_urn
            )));
        }
        let stale: Vec<String> = self
            .rows
            .values()
            .filter(|r| r.slice_urn == slice_urn)
            .filter(|r| !records.iter().any(|n| n.sliver_id == r.sliver_id))
            .map(|r| r.sliver_id.clone())
            .collect();
        let removed = self.delete(&stale);
        self.upsert_many(records);
        Ok(removed)
    }

    pub(crate) fn compare_and_set_state(
        &mut self,
        sliver_id: &str,
        expected: AllocationState,
        new: AllocationState,
    ) -> Result<SliverAllocation, StorageError> {
        let row = self
            .rows
            .get_mut(sliver_id)
            .ok_or_else(|| StorageError::RecordNotFound {
                sliver_id: sliver_id.to_string(),
            })?;
        if row.allocation_state != expected {
            return Err(StorageError::ConcurrentConflict {
                sliver_id: sliver_id.to_string(),
                expected,
                actual: row.allocation_state,
            });
        }
        row.allocation_state = new;
        Ok(row.clone())
    }

    pub(crate) fn delete(&mut self, sliver_ids: &[String]) -> usize {
        sliver_ids
            .iter()
            .filter(|id| self.rows.remove(id.as_str()).is_some())
            .count()
    }

    pub(crate) fn get(&self, sliver_id: &str) -> Result<SliverAllocation, StorageError> {
        self.rows
            .get(sliver_id)
            .cloned()
            .ok_or_else(|| StorageError::RecordNotFound {
                sliver_id: sliver_id.to_string(),
            })
    }

    pub(crate) fn list_by_slice(&self, slice_urns: &[String]) -> Vec<SliverAllocation> {
        self.rows
            .values()
            .filter(|r| slice_urns.contains(&r.slice_urn))
            .cloned()
            .collect()
    }

    pub(crate) fn list_by_slivers(&self, sliver_ids: &[String]) -> Vec<SliverAllocation> {
        self.rows
            .values()
            .filter(|r| sliver_ids.contains(&r.sliver_id))
            .cloned()
            .collect()
    }
}
