//! Conformance test suite for `AllocationStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `AllocationStore` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Insert**: row creation, duplicate detection, bulk upsert
//! - **Query**: selection by slice and by sliver, ordering
//! - **Transition**: compare-and-set of `allocation_state`
//! - **Error handling**: correct error variants for missing rows
//! - **Concurrency**: racing transitions have exactly one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use sfa_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryAllocationStore::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod error;
mod insert;
mod query;
mod transition;

use std::fmt;
use std::future::Future;

use crate::record::SliverAllocation;
use crate::AllocationStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "insert", "query", "transition").
    pub category: String,
    /// Test name (e.g. "insert_then_get_returns_row").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: AllocationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(insert::run_insert_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);
    results.extend(transition::run_transition_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

const SLICE_A: &str = "urn:publicid:IDN+plc:site+slice+alpha";
const SLICE_B: &str = "urn:publicid:IDN+plc:site+slice+beta";

fn sliver_urn(slice_leaf: &str, node: &str) -> String {
    format!("urn:publicid:IDN+plc:site+sliver+{slice_leaf}-{node}")
}

fn make_allocation(slice_urn: &str, slice_leaf: &str, node: &str) -> SliverAllocation {
    SliverAllocation::allocated(
        sliver_urn(slice_leaf, node),
        Some(format!("{node}.site.org")),
        format!("urn:publicid:IDN+plc:site+node+{node}.site.org"),
        slice_urn,
    )
}
