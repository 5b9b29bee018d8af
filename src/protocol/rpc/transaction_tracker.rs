//! Transaction tracking for RPC calls as described in RFC 5531 (previously RFC 1057).
//!
//! Every outbound call registers its transaction ID (XID) together with a
//! oneshot channel. The connection's reader hands each reply to the waiter
//! registered under the reply's XID. This ensures that:
//!
//! - an XID is never shared by two calls in flight at the same time;
//! - a reply whose XID has no waiter (never issued, already answered, or
//!   abandoned after a timeout) is reported and dropped instead of reaching
//!   the wrong caller;
//! - closing the connection fails every waiter instead of leaving it hanging.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::{Error, Result};

/// Reply record, or the reason none will come.
pub type ReplySlot = Result<Vec<u8>>;

/// Table of calls awaiting a reply on one connection.
#[derive(Debug, Default)]
pub struct TransactionTracker {
    state: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    waiters: HashMap<u32, Waiter>,
    closed: bool,
    next_ticket: u64,
}

#[derive(Debug)]
struct Waiter {
    ticket: u64,
    sender: oneshot::Sender<ReplySlot>,
}

/// A registered call. Dropping it withdraws the registration, so a caller
/// that gives up (timeout or cancellation) never leaves its XID behind.
#[derive(Debug)]
pub struct PendingCall<'a> {
    tracker: &'a TransactionTracker,
    xid: u32,
    ticket: u64,
    receiver: Option<oneshot::Receiver<ReplySlot>>,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // The state stays consistent across a panic in another holder.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a waiter for `xid`.
    ///
    /// Returns `Ok(None)` if the XID is already in flight, and
    /// [`Error::ConnectionClosed`] once the tracker has been closed.
    pub fn register(&self, xid: u32) -> Result<Option<PendingCall<'_>>> {
        let mut state = self.lock();
        if state.closed {
            return Err(Error::ConnectionClosed);
        }
        if state.waiters.contains_key(&xid) {
            return Ok(None);
        }
        let ticket = state.next_ticket;
        state.next_ticket = state.next_ticket.wrapping_add(1);
        let (sender, receiver) = oneshot::channel();
        state.waiters.insert(xid, Waiter { ticket, sender });
        Ok(Some(PendingCall { tracker: self, xid, ticket, receiver: Some(receiver) }))
    }

    /// Delivers a reply record to the waiter registered under `xid`.
    ///
    /// Returns false when nobody is waiting for it.
    pub fn complete(&self, xid: u32, record: Vec<u8>) -> bool {
        let waiter = self.lock().waiters.remove(&xid);
        match waiter {
            // A waiter that is gone by now has abandoned the call.
            Some(waiter) => waiter.sender.send(Ok(record)).is_ok(),
            None => false,
        }
    }

    /// Fails every waiter with [`Error::ConnectionClosed`] and refuses new
    /// registrations.
    pub fn close_all(&self) {
        let waiters = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.waiters)
        };
        for (_, waiter) in waiters {
            let _ = waiter.sender.send(Err(Error::ConnectionClosed));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of calls currently awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.lock().waiters.len()
    }

    fn abandon(&self, xid: u32, ticket: u64) {
        let mut state = self.lock();
        if state.waiters.get(&xid).is_some_and(|w| w.ticket == ticket) {
            state.waiters.remove(&xid);
        }
    }
}

impl PendingCall<'_> {
    pub fn xid(&self) -> u32 {
        self.xid
    }

    /// Waits for the reply. Resolves with [`Error::ConnectionClosed`] if the
    /// connection goes away first.
    pub async fn wait(&mut self) -> ReplySlot {
        let Some(receiver) = self.receiver.as_mut() else {
            return Err(Error::ConnectionClosed);
        };
        let slot = match receiver.await {
            Ok(slot) => slot,
            Err(_) => Err(Error::ConnectionClosed),
        };
        self.receiver = None;
        slot
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        self.tracker.abandon(self.xid, self.ticket);
    }
}
