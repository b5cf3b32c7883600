use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::record::{AllocationState, SliverAllocation};
use crate::table::AllocationTable;
use crate::traits::AllocationStore;

/// Allocation store persisted as one JSON document.
///
/// Mutations are applied to a copy of the table, written to a temporary file
/// and renamed over the original; the in-memory table is replaced only after
/// the rename succeeds. A failed write therefore leaves both the file and
/// the store unchanged. The whole document is rewritten on every mutation,
/// so the store suits small tables.
#[derive(Debug)]
pub struct FileAllocationStore {
    path: PathBuf,
    table: Mutex<AllocationTable>,
}

fn backend(context: &str, path: &Path, e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(format!("{context} {}: {e}", path.display()))
}

/// Write `text` next to `path` and rename it into place.
fn write_atomically(path: &Path, text: String) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, text).map_err(|e| backend("writing", &tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| backend("renaming", path, e))?;
    Ok(())
}

impl FileAllocationStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let table = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| backend("reading", &path, e))?;
            serde_json::from_str(&text).map_err(|e| backend("decoding", &path, e))?
        } else {
            AllocationTable::default()
        };
        tracing::debug!(path = %path.display(), "opened allocation store");
        Ok(FileAllocationStore {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, table: &AllocationTable) -> Result<(), StorageError> {
        let text =
            serde_json::to_string_pretty(table).map_err(|e| backend("encoding", &self.path, e))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, text))
            .await
            .map_err(|e| backend("writing", &self.path, e))?
    }

    /// Apply `change` to a copy of the table, persist it, then publish it.
    /// The lock is held across the write so mutations reach the file in
    /// order.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut AllocationTable) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.table.lock().await;
        let mut next = guard.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }
}

#[async_trait]
impl AllocationStore for FileAllocationStore {
    async fn insert(&self, record: SliverAllocation) -> Result<(), StorageError> {
        self.mutate(|t| t.insert(record)).await
    }

    async fn upsert_many(&self, records: Vec<SliverAllocation>) -> Result<(), StorageError> {
        self.mutate(|t| {
            t.upsert_many(records);
            Ok(())
        })
        .await
    }

    async fn replace_slice(
        &self,
        slice_urn: &str,
        records: Vec<SliverAllocation>,
    ) -> Result<usize, StorageError> {
        self.mutate(|t| t.replace_slice(slice_urn, records)).await
    }

    async fn compare_and_set_state(
        &self,
        sliver_id: &str,
        expected: AllocationState,
        new: AllocationState,
    ) -> Result<SliverAllocation, StorageError> {
        self.mutate(|t| t.compare_and_set_state(sliver_id, expected, new))
            .await
    }

    async fn delete(&self, sliver_ids: &[String]) -> Result<usize, StorageError> {
        self.mutate(|t| Ok(t.delete(sliver_ids))).await
    }

    async fn get(&self, sliver_id: &str) -> Result<SliverAllocation, StorageError> {
        self.table.lock().await.get(sliver_id)
    }

    async fn list_by_slice(
        &self,
        slice_urns: &[String],
    ) -> Result<Vec<SliverAllocation>, StorageError> {
        Ok(self.table.lock().await.list_by_slice(slice_urns))
    }

    async fn list_by_slivers(
        &self,
        sliver_ids: &[String],
    ) -> Result<Vec<SliverAllocation>, StorageError> {
        Ok(self.table.lock().await.list_by_slivers(sliver_ids))
    }
}
