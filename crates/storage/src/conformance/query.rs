use std::future::Future;

use super::{make_allocation, sliver_urn, TestResult, SLICE_A, SLICE_B};
use crate::AllocationStore;

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "query",
        "list_by_slice_selects_only_that_slice",
        list_by_slice_selects_only_that_slice(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "list_by_slice_accepts_several_slices",
        list_by_slice_accepts_several_slices(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "list_by_slivers_skips_missing_ids",
        list_by_slivers_skips_missing_ids(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "results_are_ordered_by_sliver_id",
        results_are_ordered_by_sliver_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "empty_inputs_return_empty",
        empty_inputs_return_empty(factory).await,
    ));

    results
}

async fn seed<S: AllocationStore>(store: &S) -> Result<(), String> {
    let rows = vec![
        make_allocation(SLICE_A, "alpha", "n1"),
        make_allocation(SLICE_A, "alpha", "n2"),
        make_allocation(SLICE_B, "beta", "n1"),
    ];
    store
        .upsert_many(rows)
        .await
        .map_err(|e| format!("seed: {e}"))
}

async fn list_by_slice_selects_only_that_slice<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    seed(&store).await?;
    let rows = store
        .list_by_slice(&[SLICE_B.to_string()])
        .await
        .map_err(|e| format!("list_by_slice: {e}"))?;
    if rows.len() != 1 || rows[0].sliver_id != sliver_urn("beta", "n1") {
        return Err(format!("expected only beta-n1, got {rows:?}"));
    }
    Ok(())
}

async fn list_by_slice_accepts_several_slices<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    seed(&store).await?;
    let rows = store
        .list_by_slice(&[SLICE_A.to_string(), SLICE_B.to_string()])
        .await
        .map_err(|e| format!("list_by_slice: {e}"))?;
    if rows.len() != 3 {
        return Err(format!("expected 3 rows, got {}", rows.len()));
    }
    Ok(())
}

async fn list_by_slivers_skips_missing_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    seed(&store).await?;
    let wanted = vec![sliver_urn("alpha", "n2"), sliver_urn("gamma", "n9")];
    let rows = store
        .list_by_slivers(&wanted)
        .await
        .map_err(|e| format!("list_by_slivers: {e}"))?;
    if rows.len() != 1 || rows[0].sliver_id != wanted[0] {
        return Err(format!("expected only alpha-n2, got {rows:?}"));
    }
    Ok(())
}

async fn results_are_ordered_by_sliver_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for node in ["n3", "n1", "n2"] {
        store
            .insert(make_allocation(SLICE_A, "alpha", node))
            .await
            .map_err(|e| format!("insert {node}: {e}"))?;
    }
    let ids: Vec<String> = store
        .list_by_slice(&[SLICE_A.to_string()])
        .await
        .map_err(|e| format!("list_by_slice: {e}"))?
        .into_iter()
        .map(|r| r.sliver_id)
        .collect();
    let mut sorted = ids.clone();
    sorted.sort();
    if ids != sorted {
        return Err(format!("rows not ordered by sliver_id: {ids:?}"));
    }
    Ok(())
}

async fn empty_inputs_return_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    seed(&store).await?;
    let by_slice = store
        .list_by_slice(&[])
        .await
        .map_err(|e| format!("list_by_slice: {e}"))?;
    let by_sliver = store
        .list_by_slivers(&[])
        .await
        .map_err(|e| format!("list_by_slivers: {e}"))?;
    if !by_slice.is_empty() || !by_sliver.is_empty() {
        return Err("empty selectors matched rows".to_string());
    }
    Ok(())
}
