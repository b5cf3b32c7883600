use std::future::Future;

use super::{make_allocation, sliver_urn, TestResult, SLICE_A, SLICE_B};
use crate::{AllocationState, AllocationStore, StorageError};

pub(super) async fn run_insert_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "insert",
            "insert_then_get_returns_row",
            insert_then_get_returns_row(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "insert_starts_in_allocated_state",
            insert_starts_in_allocated_state(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "double_insert_returns_already_exists",
            double_insert_returns_already_exists(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "upsert_many_inserts_every_row",
            upsert_many_inserts_every_row(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "upsert_many_resets_existing_rows",
            upsert_many_resets_existing_rows(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "replace_slice_drops_rows_not_written_back",
            replace_slice_drops_rows_not_written_back(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "replace_slice_rejects_foreign_rows",
            replace_slice_rejects_foreign_rows(factory).await,
        ),
    ]
}

// ── Insert → get ────────────────────────────────────────────────────────────

async fn insert_then_get_returns_row<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let got = store
        .get(&row.sliver_id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if got != row {
        return Err(format!("expected {row:?}, got {got:?}"));
    }
    Ok(())
}

async fn insert_starts_in_allocated_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .insert(make_allocation(SLICE_A, "alpha", "n1"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let got = store
        .get(&sliver_urn("alpha", "n1"))
        .await
        .map_err(|e| format!("get: {e}"))?;
    if got.allocation_state != AllocationState::Allocated {
        return Err(format!("expected geni_allocated, got {}", got.allocation_state));
    }
    Ok(())
}

// ── Duplicates ──────────────────────────────────────────────────────────────

async fn double_insert_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("first insert: {e}"))?;
    match store.insert(row.clone()).await {
        Err(StorageError::AlreadyExists { sliver_id }) if sliver_id == row.sliver_id => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => Err("second insert succeeded".to_string()),
    }
}

// ── Bulk upsert ─────────────────────────────────────────────────────────────

async fn upsert_many_inserts_every_row<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let rows: Vec<_> = ["n1", "n2", "n3"]
        .iter()
        .map(|n| make_allocation(SLICE_A, "alpha", n))
        .collect();
    store
        .upsert_many(rows.clone())
        .await
        .map_err(|e| format!("upsert_many: {e}"))?;
    let listed = store
        .list_by_slice(&[SLICE_A.to_string()])
        .await
        .map_err(|e| format!("list_by_slice: {e}"))?;
    if listed != rows {
        return Err(format!("expected {} rows, got {listed:?}", rows.len()));
    }
    Ok(())
}

async fn upsert_many_resets_existing_rows<S, F, Fut>(factory: &F) -> Result<(), String>
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
    store
        .compare_and_set_state(
            &row.sliver_id,
            AllocationState::Allocated,
            AllocationState::Provisioned,
        )
        .await
        .map_err(|e| format!("cas: {e}"))?;
    store
        .upsert_many(vec![row.clone()])
        .await
        .map_err(|e| format!("upsert_many: {e}"))?;
    let got = store
        .get(&row.sliver_id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if got.allocation_state != AllocationState::Allocated {
        return Err(format!("expected geni_allocated, got {}", got.allocation_state));
    }
    Ok(())
}

// ── Replace a slice ─────────────────────────────────────────────────────────

async fn replace_slice_drops_rows_not_written_back<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let kept = make_allocation(SLICE_A, "alpha", "n1");
    let dropped = make_allocation(SLICE_A, "alpha", "n2");
    let other_slice = make_allocation(SLICE_B, "beta", "n2");
    store
        .upsert_many(vec![kept.clone(), dropped.clone(), other_slice.clone()])
        .await
        .map_err(|e| format!("upsert_many: {e}"))?;
    store
        .compare_and_set_state(
            &kept.sliver_id,
            AllocationState::Allocated,
            AllocationState::Provisioned,
        )
        .await
        .map_err(|e| format!("cas: {e}"))?;

    let added = make_allocation(SLICE_A, "alpha", "n3");
    let removed = store
        .replace_slice(SLICE_A, vec![kept.clone(), added.clone()])
        .await
        .map_err(|e| format!("replace_slice: {e}"))?;
    if removed != 1 {
        return Err(format!("expected 1 row removed, got {removed}"));
    }

    let ids: Vec<String> = store
        .list_by_slice(&[SLICE_A.to_string()])
        .await
        .map_err(|e| format!("list_by_slice: {e}"))?
        .into_iter()
        .map(|r| r.sliver_id)
        .collect();
    if ids != vec![kept.sliver_id.clone(), added.sliver_id.clone()] {
        return Err(format!("unexpected rows after replace: {ids:?}"));
    }
    let reset = store
        .get(&kept.sliver_id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if reset.allocation_state != AllocationState::Allocated {
        return Err(format!("expected geni_allocated, got {}", reset.allocation_state));
    }
    store
        .get(&other_slice.sliver_id)
        .await
        .map_err(|e| format!("other slice row lost: {e}"))?;
    Ok(())
}

async fn replace_slice_rejects_foreign_rows<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let foreign = make_allocation(SLICE_B, "beta", "n1");
    match store.replace_slice(SLICE_A, vec![foreign]).await {
        Err(StorageError::Backend(_)) => {}
        other => return Err(format!("expected Backend error, got {other:?}")),
    }
    store
        .get(&row.sliver_id)
        .await
        .map_err(|e| format!("row lost after rejected replace: {e}"))?;
    Ok(())
}
