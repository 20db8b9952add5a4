#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// One labelled stretch of execution.
#[derive(Debug, Clone)]
pub struct Span {
    pub label: String,
    pub start: Duration,
    pub end: Duration,
}

impl Span {
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Records when labelled pieces of work ran, measured in tokio time from the
/// moment the timeline was created.
///
/// Meant for `#[tokio::test(start_paused = true)]`, where the recorded
/// offsets are exact.
#[derive(Debug, Clone)]
pub struct Timeline {
    origin: Instant,
    spans: Arc<Mutex<Vec<Span>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            spans: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Time elapsed since the timeline was created.
    pub fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    /// Run `f`, recording the interval it took under `label`.
    pub async fn record<F, T>(&self, label: &str, f: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let start = self.now();
        let out = f.await;
        let end = self.now();
        self.spans.lock().push(Span {
            label: label.to_string(),
            start,
            end,
        });
        out
    }

    pub fn spans(&self) -> Vec<Span> {
        self.spans.lock().clone()
    }

    pub fn span(&self, label: &str) -> Span {
        self.spans
            .lock()
            .iter()
            .find(|s| s.label == label)
            .cloned()
            .unwrap_or_else(|| panic!("no span recorded for {label:?}"))
    }

    pub fn overlaps(&self, a: &str, b: &str) -> bool {
        self.span(a).overlaps(&self.span(b))
    }

    /// Labels in the order their spans started.
    pub fn start_order(&self) -> Vec<String> {
        let mut spans = self.spans();
        spans.sort_by_key(|s| s.start);
        spans.into_iter().map(|s| s.label).collect()
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}
