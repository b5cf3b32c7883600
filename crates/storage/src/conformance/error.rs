use std::future::Future;

use super::{sliver_urn, TestResult};
use crate::{AllocationState, AllocationStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_nonexistent_is_record_not_found",
        get_nonexistent_is_record_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "transition_nonexistent_is_record_not_found",
        transition_nonexistent_is_record_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "delete_nonexistent_removes_nothing",
        delete_nonexistent_removes_nothing(factory).await,
    ));

    results
}

async fn get_nonexistent_is_record_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let id = sliver_urn("alpha", "ghost");
    match store.get(&id).await {
        Err(StorageError::RecordNotFound { sliver_id }) if sliver_id == id => Ok(()),
        Err(e) => Err(format!("expected RecordNotFound, got {e}")),
        Ok(r) => Err(format!("found a row that was never inserted: {r:?}")),
    }
}

async fn transition_nonexistent_is_record_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let result = store
        .compare_and_set_state(
            &sliver_urn("alpha", "ghost"),
            AllocationState::Allocated,
            AllocationState::Provisioned,
        )
        .await;
    match result {
        Err(StorageError::RecordNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected RecordNotFound, got {e}")),
        Ok(r) => Err(format!("transitioned a missing row: {r:?}")),
    }
}

async fn delete_nonexistent_removes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let removed = store
        .delete(&[sliver_urn("alpha", "ghost")])
        .await
        .map_err(|e| format!("delete: {e}"))?;
    if removed != 0 {
        return Err(format!("expected 0 removed, got {removed}"));
    }
    Ok(())
}
