use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::media::WorkerOutcome;

/// Everything the presentation layer hears from the core. Workers emit
/// `Progress`/`Status`, the orchestrator emits the rest.
#[derive(Debug, Clone)]
pub enum Event {
    /// Raw per-item percentage plus throughput or status text.
    Progress { percent: f64, detail: String },
    /// Human-readable state change (attempt started, fallback taken, ...).
    Status(String),
    /// Terminal result for one queue item. Exactly one per item.
    ItemOutcome(WorkerOutcome),
    /// Emitted after every item resolves, success or failure.
    BatchProgress { completed: usize, total: usize },
    /// Emitted exactly once, when the queue drains.
    BatchDone,
}

pub type EventSender = UnboundedSender<Event>;
pub type EventReceiver = UnboundedReceiver<Event>;

pub fn channel() -> (EventSender, EventReceiver) {
    unbounded_channel()
}
