//! Request/response correlation
//!
//! Every outbound request gets a fresh id and a deadline. The entry leaves
//! the table exactly once: through [`RequestCorrelator::resolve`] when the
//! response arrives, or through [`RequestCorrelator::next_expired`] when the
//! deadline fires first. Whichever comes second finds nothing.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::poll_fn;
use parley_protocol::RequestId;
use tokio::time::Instant;
use tokio_util::time::{delay_queue, DelayQueue};

/// An in-flight request
#[derive(Debug)]
pub struct PendingRequest<C> {
    pub id: i64,
    pub method: String,
    pub issued_at: Instant,
    pub timeout: Duration,
    /// Whoever is waiting for the outcome
    pub completion: C,
    deadline: delay_queue::Key,
}

/// Pending-request table keyed by request id
#[derive(Debug)]
pub struct RequestCorrelator<C> {
    next_id: i64,
    pending: HashMap<i64, PendingRequest<C>>,
    deadlines: DelayQueue<i64>,
}

impl<C> Default for RequestCorrelator<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RequestCorrelator<C> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pending: HashMap::new(),
            deadlines: DelayQueue::new(),
        }
    }

    /// Track a new request and return its id. Ids are never reused.
    pub fn register(&mut self, method: impl Into<String>, timeout: Duration, completion: C) -> i64 {
        let id = self.next_id;
        self.next_id += 1;

        let deadline = self.deadlines.insert(id, timeout);
        self.pending.insert(
            id,
            PendingRequest {
                id,
                method: method.into(),
                issued_at: Instant::now(),
                timeout,
                completion,
                deadline,
            },
        );
        id
    }

    /// Remove the request a response belongs to, cancelling its deadline.
    ///
    /// Returns `None` for unknown, already-settled or timed-out ids.
    pub fn resolve(&mut self, id: &RequestId) -> Option<PendingRequest<C>> {
        let RequestId::Number(id) = id else {
            return None;
        };
        let pending = self.pending.remove(id)?;
        self.deadlines.remove(&pending.deadline);
        Some(pending)
    }

    /// Wait for the next deadline to fire and remove that request.
    ///
    /// Resolves to `None` immediately when nothing is pending.
    pub async fn next_expired(&mut self) -> Option<PendingRequest<C>> {
        loop {
            let expired = poll_fn(|cx| self.deadlines.poll_expired(cx)).await?;
            if let Some(pending) = self.pending.remove(expired.get_ref()) {
                return Some(pending);
            }
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
