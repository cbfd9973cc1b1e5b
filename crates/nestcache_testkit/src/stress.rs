//! Stress tests for NestCache.
//!
//! These tests verify behavior under heavy load, deep nesting and
//! concurrent access.

use crate::fixtures::{widget_by_name, Widget};
use nestcache_core::{Faceted, OperationKind, Session, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    #[must_use]
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Number of distinct cached objects.
    pub entities: usize,
    /// Nesting depth (for deep-tree tests).
    pub depth: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            entities: 1_000,
            depth: 32,
        }
    }
}

/// Run a sequential update stress test inside one root unit.
pub fn stress_sequential_updates(
    session: &Session<Widget>,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    let uow = session.begin().expect("Failed to begin root unit");
    for i in 0..config.operations {
        let widget = Widget::new(format!("widget-{}", i % config.entities));
        match uow.update(widget.clone(), &widget.facets_for(OperationKind::Insert)) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }
    uow.commit().expect("Failed to commit root unit");

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a sequential lookup stress test against a populated unit.
pub fn stress_sequential_lookups(
    session: &Session<Widget>,
    config: &StressConfig,
) -> StressTestResult {
    let uow = session.begin().expect("Failed to begin root unit");
    for i in 0..config.entities {
        let widget = Widget::new(format!("widget-{i}"));
        uow.update(widget.clone(), &widget.facets_for(OperationKind::Insert))
            .expect("Failed to populate");
    }

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let name = format!("widget-{}", i % config.entities);
        match uow.lookup(&widget_by_name(&name)) {
            Ok(Some(_)) => successful += 1,
            Ok(None) => successful += 1, // a miss is still a successful probe
            Err(_) => failed += 1,
        }
    }

    let result = StressTestResult::new(successful, failed, start.elapsed());
    uow.commit().expect("Failed to commit root unit");
    result
}

/// Run a mixed update/lookup/evict stress test.
pub fn stress_mixed_operations(
    session: &Session<Widget>,
    config: &StressConfig,
) -> StressTestResult {
    let uow = session.begin().expect("Failed to begin root unit");
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let name = format!("widget-{}", i % config.entities);
        let outcome = if i % 3 == 0 {
            // Update (33%)
            let widget = Widget::new(name);
            uow.update(widget.clone(), &widget.facets_for(OperationKind::Insert))
                .map(|_| ())
        } else if i % 3 == 1 {
            // Lookup (33%)
            uow.lookup(&widget_by_name(&name)).map(|_| ())
        } else {
            // Evict (33%)
            uow.evict(&widget_by_name(&name)).map(|_| ())
        };

        match outcome {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    let result = StressTestResult::new(successful, failed, start.elapsed());
    uow.commit().expect("Failed to commit root unit");
    result
}

/// Run a concurrent children stress test: `threads` children under one
/// root, each committing its own updates.
pub fn stress_concurrent_children(
    session: &Session<Widget>,
    config: &StressConfig,
) -> StressTestResult {
    let root = session.begin().expect("Failed to begin root unit");
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let ops_per_thread = config.operations / config.threads.max(1);

    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let root = &root;
            let successful = &successful;
            let failed = &failed;
            scope.spawn(move || {
                let Ok(child) = root.begin_nested() else {
                    failed.fetch_add(ops_per_thread, Ordering::Relaxed);
                    return;
                };
                for i in 0..ops_per_thread {
                    let widget = Widget::new(format!("widget-{t}-{i}"));
                    match child.update(widget.clone(), &widget.facets_for(OperationKind::Insert)) {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
                if child.commit().is_err() {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    let result = StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    );
    root.commit().expect("Failed to commit root unit");
    result
}

/// Run a commit/abort cycle stress test at the root level.
///
/// Every other cycle aborts intentionally, so half the outcomes land in
/// the failed tally.
pub fn stress_commit_abort_cycles(
    session: &Session<Widget>,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let widget = Widget::new(format!("widget-{}", i % config.entities));
        let should_abort = i % 2 == 0;

        let outcome = session.scope(|uow| {
            uow.update(widget.clone(), &widget.facets_for(OperationKind::Insert))?;
            if should_abort {
                Err(StoreError::unavailable("intentional abort").into())
            } else {
                Ok(())
            }
        });

        match outcome {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a deep nesting stress test: a chain of children, updates at the
/// leaf, commits rolling up to the root.
pub fn stress_deep_nesting(session: &Session<Widget>, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    let root = session.begin().expect("Failed to begin root unit");
    let mut chain = Vec::with_capacity(config.depth);
    let mut leaf = root.begin_nested().expect("Failed to begin first child");
    for _ in 1..config.depth {
        let child = leaf.begin_nested().expect("Failed to begin child");
        chain.push(leaf);
        leaf = child;
    }

    for i in 0..config.operations {
        let widget = Widget::new(format!("widget-{}", i % config.entities));
        match leaf.update(widget.clone(), &widget.facets_for(OperationKind::Insert)) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    // Commit the leaf first, then back up the chain.
    if leaf.commit().is_err() {
        failed += 1;
    }
    while let Some(uow) = chain.pop() {
        if uow.commit().is_err() {
            failed += 1;
        }
    }
    root.commit().expect("Failed to commit root unit");

    StressTestResult::new(successful, failed, start.elapsed())
}
