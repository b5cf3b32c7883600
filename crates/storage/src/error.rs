use crate::record::AllocationState;

/// All errors that can be returned by an `AllocationStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Compare-and-set lost: the row was not in the expected state, usually
    /// because a concurrent call transitioned it first.
    #[error("concurrent conflict on sliver {sliver_id}: expected {expected}, found {actual}")]
    ConcurrentConflict {
        sliver_id: String,
        expected: AllocationState,
        actual: AllocationState,
    },

    /// No allocation row for this sliver.
    #[error("sliver allocation not found: {sliver_id}")]
    RecordNotFound { sliver_id: String },

    /// An allocation row for this sliver already exists.
    #[error("sliver allocation already exists: {sliver_id}")]
    AlreadyExists { sliver_id: String },

    /// A backend-specific storage error (I/O, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
