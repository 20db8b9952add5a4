// tests/task.rs

mod common;
use crate::common::{init_tracing, settle, with_timeout};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use parking_lot::Mutex;

use arisa::errors::TaskError;
use arisa::task::{Memo, TaskGraph, TaskPhase, Version, Work, WorkCx};

type Info = &'static str;

/// Leaf task returning a fixed value and counting its runs.
struct Constant {
    value: i32,
    runs: Arc<AtomicUsize>,
}

impl Constant {
    fn new(value: i32) -> (Self, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (
            Self {
                value,
                runs: Arc::clone(&runs),
            },
            runs,
        )
    }
}

impl Work for Constant {
    type Value = i32;
    type Info = Info;

    async fn work(&self, _cx: &WorkCx<'_, Info>) -> anyhow::Result<i32> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(self.value)
    }
}

/// Doubles an upstream value.
struct Double {
    upstream: Arc<Memo<Constant>>,
    runs: Arc<AtomicUsize>,
}

impl Work for Double {
    type Value = i32;
    type Info = Info;

    async fn work(&self, cx: &WorkCx<'_, Info>) -> anyhow::Result<i32> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let value = cx.result_from(&self.upstream).await?;
        Ok(value * 2)
    }
}

/// `base` plus the sum of its inputs; inputs can be wired after creation.
struct Sum {
    base: i32,
    inputs: Mutex<Vec<Arc<Memo<Sum>>>>,
    runs: AtomicUsize,
}

impl Sum {
    fn new(base: i32, inputs: Vec<Arc<Memo<Sum>>>) -> Self {
        Self {
            base,
            inputs: Mutex::new(inputs),
            runs: AtomicUsize::new(0),
        }
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Work for Sum {
    type Value = i32;
    type Info = Info;

    async fn work(&self, cx: &WorkCx<'_, Info>) -> anyhow::Result<i32> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let inputs = self.inputs.lock().clone();
        let mut total = self.base;
        for input in &inputs {
            total += cx.result_from(input).await?;
        }
        Ok(total)
    }
}

/// Sleeps, then fails for the first `failures` runs.
struct Flaky {
    failures: usize,
    delay: Duration,
    runs: AtomicUsize,
}

impl Work for Flaky {
    type Value = String;
    type Info = Info;

    async fn work(&self, _cx: &WorkCx<'_, Info>) -> anyhow::Result<String> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if run < self.failures {
            return Err(anyhow!("attempt {run} failed"));
        }
        Ok(format!("ok after {run}"))
    }
}

fn runs(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

#[tokio::test]
async fn work_runs_once_until_invalidated() {
    init_tracing();
    let graph = TaskGraph::new();
    let (work, count) = Constant::new(7);
    let task = Memo::new(&graph, work);

    assert_eq!(task.phase(), TaskPhase::Uncomputed);
    assert_eq!(task.get().await.unwrap(), 7);
    assert_eq!(task.get().await.unwrap(), 7);
    assert_eq!(runs(&count), 1);
    assert_eq!(task.phase(), TaskPhase::Ready);

    assert!(task.update("edit").await);
    assert_eq!(task.phase(), TaskPhase::Uncomputed);
    assert_eq!(task.get().await.unwrap(), 7);
    assert_eq!(runs(&count), 2);
}

#[tokio::test]
async fn invalidation_callback_fires_once() {
    let graph = TaskGraph::new();
    let (work, _) = Constant::new(1);
    let task = Memo::new(&graph, work);
    let seen = Arc::new(Mutex::new(Vec::<(Version, Info)>::new()));

    let sink = Arc::clone(&seen);
    task.get_result(move |version, info| sink.lock().push((version, *info)))
        .await
        .unwrap();
    assert_eq!(task.subscriber_count(), 1);

    assert!(task.update("first").await);
    let first = task.version();
    assert!(task.update("second").await);
    assert!(task.version() > first);

    assert_eq!(*seen.lock(), [(first, "first")]);
    assert_eq!(task.subscriber_count(), 0);
}

#[tokio::test]
async fn upstream_update_invalidates_dependents() {
    let graph = TaskGraph::new();
    let (leaf, leaf_runs) = Constant::new(5);
    let leaf = Memo::new(&graph, leaf);
    let double_runs = Arc::new(AtomicUsize::new(0));
    let double = Memo::new(
        &graph,
        Double {
            upstream: Arc::clone(&leaf),
            runs: Arc::clone(&double_runs),
        },
    );

    assert_eq!(double.get().await.unwrap(), 10);
    assert_eq!(graph.dependencies_of(double.id()), [leaf.id()]);
    assert_eq!(graph.dependents_of(leaf.id()), [double.id()]);
    assert_eq!(leaf.subscriber_count(), 1);

    // Cached: neither task runs again.
    assert_eq!(double.get().await.unwrap(), 10);
    assert_eq!((runs(&leaf_runs), runs(&double_runs)), (1, 1));

    assert!(leaf.update("leaf changed").await);
    assert_eq!(double.phase(), TaskPhase::Uncomputed);
    assert_eq!(double.version(), leaf.version());
    assert!(graph.dependencies_of(double.id()).is_empty());
    assert_eq!(leaf.subscriber_count(), 0);

    assert_eq!(double.get().await.unwrap(), 10);
    assert_eq!((runs(&leaf_runs), runs(&double_runs)), (2, 2));
}

#[tokio::test]
async fn downstream_update_leaves_upstream_cached() {
    let graph = TaskGraph::new();
    let (leaf, leaf_runs) = Constant::new(5);
    let leaf = Memo::new(&graph, leaf);
    let double = Memo::new(
        &graph,
        Double {
            upstream: Arc::clone(&leaf),
            runs: Arc::new(AtomicUsize::new(0)),
        },
    );

    double.get().await.unwrap();
    assert!(double.update("only me").await);

    assert_eq!(leaf.phase(), TaskPhase::Ready);
    double.get().await.unwrap();
    assert_eq!(runs(&leaf_runs), 1);
    // Re-reading the cached upstream does not duplicate the subscription.
    assert_eq!(leaf.subscriber_count(), 1);
}

#[tokio::test]
async fn diamond_invalidates_the_sink_once() {
    init_tracing();
    let graph = TaskGraph::new();
    let top = Memo::new(&graph, Sum::new(1, vec![]));
    let left = Memo::new(&graph, Sum::new(10, vec![Arc::clone(&top)]));
    let right = Memo::new(&graph, Sum::new(100, vec![Arc::clone(&top)]));
    let sink = Memo::new(&graph, Sum::new(0, vec![Arc::clone(&left), Arc::clone(&right)]));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let value = sink
        .get_result(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    assert_eq!(value, 112);
    assert_eq!(top.work_ref().runs(), 1);
    assert_eq!(top.subscriber_count(), 2);

    assert!(top.update("top changed").await);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.version(), top.version());
    for task in [&top, &left, &right, &sink] {
        assert_eq!(task.phase(), TaskPhase::Uncomputed);
    }

    assert_eq!(sink.get().await.unwrap(), 112);
    assert_eq!(sink.work_ref().runs(), 2);
    assert_eq!(top.work_ref().runs(), 2);
}

#[tokio::test]
async fn stale_versions_are_ignored() {
    let graph = TaskGraph::new();
    let (work, _) = Constant::new(3);
    let task = Memo::new(&graph, work);

    let older = graph.next_version();
    let newer = graph.next_version();
    assert!(older < newer);

    task.get().await.unwrap();
    assert!(task.update_at(newer, "newer").await);
    assert_eq!(task.version(), newer);

    task.get().await.unwrap();
    assert!(!task.update_at(older, "older").await);
    assert!(!task.update_at(newer, "same").await);
    assert_eq!(task.version(), newer);
    assert_eq!(task.phase(), TaskPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn failure_reaches_every_waiter_and_is_not_cached() {
    init_tracing();
    let graph = TaskGraph::new();
    let task = Memo::new(
        &graph,
        Flaky {
            failures: 1,
            delay: Duration::from_millis(50),
            runs: AtomicUsize::new(0),
        },
    );

    let (a, b) = tokio::join!(task.get(), task.get());
    for result in [a, b] {
        match result {
            Err(TaskError::Failed { task: id, reason }) => {
                assert_eq!(id, task.id());
                assert!(reason.to_string().contains("attempt 0 failed"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
    assert_eq!(task.work_ref().runs.load(Ordering::SeqCst), 1);
    assert_eq!(task.phase(), TaskPhase::Uncomputed);

    assert_eq!(task.get().await.unwrap(), "ok after 1");
    assert_eq!(task.phase(), TaskPhase::Ready);
}

#[tokio::test]
async fn upstream_failure_propagates_downstream() {
    let graph = TaskGraph::new();
    let upstream = Memo::new(&graph, Sum::new(0, vec![]));
    let downstream = Memo::new(&graph, Sum::new(0, vec![Arc::clone(&upstream)]));
    // Self-dependency makes the upstream fail.
    upstream.work_ref().inputs.lock().push(Arc::clone(&upstream));

    let err = downstream.get().await.unwrap_err();
    assert!(matches!(err, TaskError::Cycle { .. }));
    assert_eq!(downstream.phase(), TaskPhase::Uncomputed);
    assert_eq!(upstream.phase(), TaskPhase::Uncomputed);

    upstream.work_ref().inputs.lock().clear();
    assert_eq!(downstream.get().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_reads_share_one_run() {
    let graph = TaskGraph::new();
    let task = Memo::new(
        &graph,
        Flaky {
            failures: 0,
            delay: Duration::from_millis(100),
            runs: AtomicUsize::new(0),
        },
    );

    let (a, b, c) = tokio::join!(task.get(), task.get(), task.get());
    assert_eq!(a.unwrap(), "ok after 0");
    assert_eq!(b.unwrap(), "ok after 0");
    assert_eq!(c.unwrap(), "ok after 0");
    assert_eq!(task.work_ref().runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn update_waits_for_in_flight_computation() {
    let graph = TaskGraph::new();
    let task = Memo::new(
        &graph,
        Flaky {
            failures: 0,
            delay: Duration::from_millis(100),
            runs: AtomicUsize::new(0),
        },
    );

    let reader = tokio::spawn({
        let task = Arc::clone(&task);
        async move { task.get().await }
    });
    settle().await;
    assert_eq!(task.phase(), TaskPhase::Pending);

    assert!(with_timeout(task.update("edit")).await);
    // The read finished first and kept its result.
    assert_eq!(reader.await.unwrap().unwrap(), "ok after 0");
    assert_eq!(task.phase(), TaskPhase::Uncomputed);
}

#[tokio::test]
async fn dependency_cycles_are_rejected() {
    let graph = TaskGraph::new();
    let a = Memo::new(&graph, Sum::new(1, vec![]));
    let b = Memo::new(&graph, Sum::new(2, vec![Arc::clone(&a)]));
    a.work_ref().inputs.lock().push(Arc::clone(&b));

    let err = with_timeout(a.get()).await.unwrap_err();
    match err {
        TaskError::Cycle {
            downstream,
            upstream,
        } => {
            assert_eq!(downstream, b.id());
            assert_eq!(upstream, a.id());
        }
        other => panic!("expected cycle, got {other:?}"),
    }
    assert_eq!(a.phase(), TaskPhase::Uncomputed);
    assert!(graph.dependencies_of(a.id()).is_empty());

    // Break the cycle; the graph is usable again.
    a.work_ref().inputs.lock().clear();
    assert_eq!(b.get().await.unwrap(), 3);
}

#[tokio::test]
async fn dropped_dependent_is_skipped() {
    let graph = TaskGraph::new();
    let (leaf, _) = Constant::new(4);
    let leaf = Memo::new(&graph, leaf);
    let double = Memo::new(
        &graph,
        Double {
            upstream: Arc::clone(&leaf),
            runs: Arc::new(AtomicUsize::new(0)),
        },
    );

    double.get().await.unwrap();
    let double_id = double.id();
    drop(double);

    assert!(graph.dependents_of(leaf.id()).is_empty());
    assert!(leaf.update("after drop").await);
    assert!(graph.dependencies_of(double_id).is_empty());
}

#[tokio::test]
async fn late_invalidation_reaches_dependent_with_newer_version() {
    init_tracing();
    let graph = TaskGraph::new();
    let a = Memo::new(&graph, Sum::new(1, vec![]));
    let c = Memo::new(&graph, Sum::new(10, vec![]));
    let d = Memo::new(&graph, Sum::new(0, vec![Arc::clone(&a), Arc::clone(&c)]));

    assert_eq!(d.get().await.unwrap(), 11);

    // Change to `a` observed now, applied after a later change to `c`.
    let observed = graph.next_version();
    assert!(c.update("c changed").await);
    assert_eq!(d.get().await.unwrap(), 11);
    assert!(d.version() > observed);

    assert!(a.update_at(observed, "a changed").await);
    assert_eq!(a.phase(), TaskPhase::Uncomputed);
    assert_eq!(d.phase(), TaskPhase::Uncomputed);

    // Recomputing restores the subscription, so later changes still arrive.
    assert_eq!(d.get().await.unwrap(), 11);
    assert_eq!(a.subscriber_count(), 1);
    assert!(a.update("a again").await);
    assert_eq!(d.phase(), TaskPhase::Uncomputed);
    assert_eq!(d.work_ref().runs(), 3);
}

#[tokio::test]
async fn dependent_created_after_version_was_issued_is_invalidated() {
    let graph = TaskGraph::new();
    let a = Memo::new(&graph, Sum::new(1, vec![]));
    let observed = graph.next_version();
    let d = Memo::new(&graph, Sum::new(0, vec![Arc::clone(&a)]));
    assert_eq!(d.version(), observed);

    assert_eq!(d.get().await.unwrap(), 1);
    assert_eq!(a.subscriber_count(), 1);

    assert!(a.update_at(observed, "edit").await);
    assert_eq!(d.phase(), TaskPhase::Uncomputed);
    assert_eq!(a.subscriber_count(), 0);
    assert!(graph.dependencies_of(d.id()).is_empty());

    assert_eq!(d.get().await.unwrap(), 1);
    assert_eq!(a.subscriber_count(), 1);
    assert_eq!(graph.dependencies_of(d.id()), [a.id()]);
}

#[tokio::test]
async fn direct_update_of_dependent_stays_version_checked() {
    let graph = TaskGraph::new();
    let a = Memo::new(&graph, Sum::new(1, vec![]));
    let d = Memo::new(&graph, Sum::new(0, vec![Arc::clone(&a)]));
    let older = graph.next_version();

    d.get().await.unwrap();
    assert!(a.update("newer").await);
    assert!(d.version() > older);

    d.get().await.unwrap();
    assert!(!d.update_at(older, "late").await);
    assert_eq!(d.phase(), TaskPhase::Ready);
}
