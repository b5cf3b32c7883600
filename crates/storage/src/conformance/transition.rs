use std::future::Future;

use super::{make_allocation, TestResult, SLICE_A};
use crate::{AllocationState, AllocationStore, StorageError};

pub(super) async fn run_transition_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "transition",
        "allocated_to_provisioned_succeeds",
        allocated_to_provisioned_succeeds(factory).await,
    ));
    results.push(TestResult::from_result(
        "transition",
        "stale_expected_state_conflicts",
        stale_expected_state_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "transition",
        "conflict_leaves_row_unchanged",
        conflict_leaves_row_unchanged(factory).await,
    ));
    results.push(TestResult::from_result(
        "transition",
        "transition_preserves_other_columns",
        transition_preserves_other_columns(factory).await,
    ));
    results.push(TestResult::from_result(
        "transition",
        "delete_removes_rows_and_counts",
        delete_removes_rows_and_counts(factory).await,
    ));

    results
}

async fn allocated_to_provisioned_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let row = make_allocation(SLICE_A, "alpha", "n1");
    store
        .insert(row.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let updated = store
        .compare_and_set_state(
            &row.sliver_id,
            AllocationState::Allocated,
            AllocationState::Provisioned,
        )
        .await
        .map_err(|e| format!("cas: {e}"))?;
    if updated.allocation_state != AllocationState::Provisioned {
        return Err(format!("returned row in {}", updated.allocation_state));
    }
    let stored = store
        .get(&row.sliver_id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored.allocation_state != AllocationState::Provisioned {
        return Err(format!("stored row in {}", stored.allocation_state));
    }
    Ok(())
}

async fn stale_expected_state_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let row = make_allocation(SLICE_A, "alpha", "n1");
    store
        .insert(row.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let result = store
        .compare_and_set_state(
            &row.sliver_id,
            AllocationState::Provisioned,
            AllocationState::Allocated,
        )
        .await;
    match result {
        Err(StorageError::ConcurrentConflict {
            sliver_id,
            expected: AllocationState::Provisioned,
            actual: AllocationState::Allocated,
        }) if sliver_id == row.sliver_id => Ok(()),
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(r) => Err(format!("stale transition succeeded: {r:?}")),
    }
}

async fn conflict_leaves_row_unchanged<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let row = make_allocation(SLICE_A, "alpha", "n1");
    store
        .insert(row.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let _ = store
        .compare_and_set_state(
            &row.sliver_id,
            AllocationState::Provisioned,
            AllocationState::Provisioned,
        )
        .await;
    let stored = store
        .get(&row.sliver_id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored != row {
        return Err(format!("row changed after conflict: {stored:?}"));
    }
    Ok(())
}

async fn transition_preserves_other_columns<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let row = make_allocation(SLICE_A, "alpha", "n1");
    store
        .insert(row.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let updated = store
        .compare_and_set_state(
            &row.sliver_id,
            AllocationState::Allocated,
            AllocationState::Provisioned,
        )
        .await
        .map_err(|e| format!("cas: {e}"))?;
    if updated.client_id != row.client_id
        || updated.component_id != row.component_id
        || updated.slice_urn != row.slice_urn
    {
        return Err(format!("columns changed: {updated:?}"));
    }
    Ok(())
}

async fn delete_removes_rows_and_counts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let a = make_allocation(SLICE_A, "alpha", "n1");
    let b = make_allocation(SLICE_A, "alpha", "n2");
    store
        .upsert_many(vec![a.clone(), b.clone()])
        .await
        .map_err(|e| format!("upsert_many: {e}"))?;
    let removed = store
        .delete(&[a.sliver_id.clone(), "urn:publicid:IDN+plc+sliver+missing".to_string()])
        .await
        .map_err(|e| format!("delete: {e}"))?;
    if removed != 1 {
        return Err(format!("expected 1 removed, got {removed}"));
    }
    let left = store
        .list_by_slice(&[SLICE_A.to_string()])
        .await
        .map_err(|e| format!("list_by_slice: {e}"))?;
    if left != vec![b] {
        return Err(format!("unexpected remaining rows: {left:?}"));
    }
    Ok(())
}
