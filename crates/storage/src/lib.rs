//! sfa-storage: persisted sliver allocation state.
//!
//! The aggregate records which slivers it has handed out, to which slice, and
//! whether they are merely allocated or already provisioned. Backends
//! implement [`AllocationStore`]; [`conformance`] checks any of them.

mod error;
mod file;
mod memory;
mod record;
mod table;
mod traits;

pub mod conformance;

pub use error::StorageError;
pub use file::FileAllocationStore;
pub use memory::MemoryAllocationStore;
pub use record::{AllocationState, SliverAllocation};
pub use traits::AllocationStore;
