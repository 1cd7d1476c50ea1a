//! In-memory progress runtime: queues emitted envelopes, sequences them per
//! session, keeps a bounded log and fans recorded events out to subscribers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

use crate::progress::event::{ProgressEnvelope, ProgressEvent};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

pub fn new_session_id() -> String {
    let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("run-{}-{}", Utc::now().timestamp_millis(), counter)
}

struct LogState {
    events: VecDeque<ProgressEvent>,
    next_seq: HashMap<String, u64>,
    subscribers: Vec<Sender<ProgressEvent>>,
}

struct Inner {
    outbox: Sender<ProgressEnvelope>,
    inbox: Mutex<Receiver<ProgressEnvelope>>,
    state: Mutex<LogState>,
    capacity: usize,
}

/// Shared progress runtime. Cloning is cheap.
#[derive(Clone)]
pub struct ProgressRuntime {
    inner: Arc<Inner>,
}

impl Default for ProgressRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressRuntime {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (outbox, inbox) = channel();
        Self {
            inner: Arc::new(Inner {
                outbox,
                inbox: Mutex::new(inbox),
                state: Mutex::new(LogState {
                    events: VecDeque::new(),
                    next_seq: HashMap::new(),
                    subscribers: Vec::new(),
                }),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Emit and record one event. Failures are logged, never returned.
    pub fn emit_event_best_effort(&self, session: &str, event_type: &str, data: Value) {
        let envelope = ProgressEnvelope::with_now(session, event_type, data);
        if let Err(err) = self.inner.outbox.send(envelope) {
            warn!(session, event_type, error = %err, "Failed to emit progress event");
            return;
        }
        self.drain();
    }

    /// Receive every event recorded from now on.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        let (sender, receiver) = channel();
        self.inner.state.lock().subscribers.push(sender);
        receiver
    }

    /// Recorded events of one session, in sequence order.
    pub fn session_events(&self, session: &str) -> Vec<ProgressEvent> {
        self.drain();
        self.inner
            .state
            .lock()
            .events
            .iter()
            .filter(|e| e.session == session)
            .cloned()
            .collect()
    }

    pub fn all_events(&self) -> Vec<ProgressEvent> {
        self.drain();
        self.inner.state.lock().events.iter().cloned().collect()
    }

    fn drain(&self) {
        let inbox = self.inner.inbox.lock();
        let mut state = self.inner.state.lock();
        while let Ok(envelope) = inbox.try_recv() {
            let seq = {
                let next = state.next_seq.entry(envelope.session.clone()).or_insert(1);
                let seq = *next;
                *next += 1;
                seq
            };
            let event = ProgressEvent::from_envelope(envelope, seq);
            state
                .subscribers
                .retain(|subscriber| subscriber.send(event.clone()).is_ok());
            if state.events.len() >= self.inner.capacity {
                state.events.pop_front();
            }
            state.events.push_back(event);
        }
    }
}
