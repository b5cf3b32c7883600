use std::future::Future;
use std::sync::Arc;

use super::{make_allocation, sliver_urn, TestResult, SLICE_A};
use crate::{AllocationState, AllocationStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_provision_exactly_one_wins",
        concurrent_provision_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_insert_exactly_one_wins",
        concurrent_insert_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_transitions_on_different_slivers_all_succeed",
        concurrent_transitions_on_different_slivers_all_succeed(factory).await,
    ));

    results
}

/// Count winners and losers over spawned tasks that report `Ok(true)` for a
/// win and `Ok(false)` for a lost race.
async fn tally(
    handles: Vec<tokio::task::JoinHandle<Result<bool, StorageError>>>,
) -> Result<(usize, usize), String> {
    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }
    Ok((winners, losers))
}

// ── Concurrent provision: exactly one wins ──────────────────────────────────

/// N tasks race to move the same sliver from allocated to provisioned.
/// Exactly one transition succeeds; the rest see ConcurrentConflict.
async fn concurrent_provision_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let row = make_allocation(SLICE_A, "alpha", "n1");
    store
        .insert(row.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = Arc::clone(&store);
        let id = row.sliver_id.clone();
        handles.push(tokio::spawn(async move {
            match s
                .compare_and_set_state(&id, AllocationState::Allocated, AllocationState::Provisioned)
                .await
            {
                Ok(_) => Ok(true),
                Err(StorageError::ConcurrentConflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let (winners, losers) = tally(handles).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    let stored = store
        .get(&row.sliver_id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored.allocation_state != AllocationState::Provisioned {
        return Err(format!("final state {}", stored.allocation_state));
    }
    Ok(())
}

// ── Concurrent insert: exactly one wins ─────────────────────────────────────

async fn concurrent_insert_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            match s.insert(make_allocation(SLICE_A, "alpha", "n1")).await {
                Ok(()) => Ok(true),
                Err(StorageError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let (winners, losers) = tally(handles).await?;
    if winners != 1 || losers != N - 1 {
        return Err(format!("expected 1 winner and {} losers, got {winners}/{losers}", N - 1));
    }
    Ok(())
}

// ── Different slivers: no contention ────────────────────────────────────────

async fn concurrent_transitions_on_different_slivers_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let rows: Vec<_> = (0..N)
        .map(|i| make_allocation(SLICE_A, "alpha", &format!("n{i}")))
        .collect();
    store
        .upsert_many(rows)
        .await
        .map_err(|e| format!("upsert_many: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = Arc::clone(&store);
        let id = sliver_urn("alpha", &format!("n{i}"));
        handles.push(tokio::spawn(async move {
            s.compare_and_set_state(&id, AllocationState::Allocated, AllocationState::Provisioned)
                .await
                .map(|_| true)
        }));
    }

    let (winners, _) = tally(handles).await?;
    if winners != N {
        return Err(format!("expected {N} successful transitions, got {winners}"));
    }

    let provisioned = store
        .list_by_slice(&[SLICE_A.to_string()])
        .await
        .map_err(|e| format!("list_by_slice: {e}"))?
        .iter()
        .filter(|r| r.allocation_state == AllocationState::Provisioned)
        .count();
    if provisioned != N {
        return Err(format!("expected {N} provisioned rows, got {provisioned}"));
    }
    Ok(())
}
