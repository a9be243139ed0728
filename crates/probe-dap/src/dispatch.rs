//! Request/response correlation for a DAP session.
//!
//! Tracks pending requests by sequence number and routes responses to
//! waiting callers via oneshot channels. Events bypass this table: the
//! session's reader task forwards them on the ordered event channel.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::protocol::Response;

/// Routes responses to the requests that are awaiting them.
#[derive(Debug, Default)]
pub struct Dispatcher {
    /// Map of request `seq` to pending response sender.
    pending: HashMap<i64, oneshot::Sender<Response>>,
}

impl Dispatcher {
    /// Create a new dispatcher with no pending requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request and return a receiver for its response.
    pub fn register(&mut self, seq: i64) -> oneshot::Receiver<Response> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, tx);
        rx
    }

    /// How many requests are awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Route a response to its waiting request, matched by `request_seq`.
    pub fn resolve(&mut self, response: Response) {
        match self.pending.remove(&response.request_seq) {
            Some(sender) => {
                // A dropped receiver means the caller gave up; ignore.
                let _ = sender.send(response);
            }
            None => {
                tracing::warn!(
                    request_seq = response.request_seq,
                    command = %response.command,
                    "response for unknown request"
                );
            }
        }
    }

    /// Forget one pending request (e.g. after a client-side timeout), so a
    /// late response is not routed to a dropped receiver.
    ///
    /// Returns `true` when the request was still pending.
    pub fn forget(&mut self, seq: i64) -> bool {
        self.pending.remove(&seq).is_some()
    }

    /// Drop every pending request. Their receivers observe a closed channel.
    pub fn fail_all(&mut self) {
        self.pending.clear();
    }
}
