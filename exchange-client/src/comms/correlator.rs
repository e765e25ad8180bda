//! Matches asynchronous replies to the requests that caused them.
//!
//! Each outgoing request takes a fresh id and parks a one-shot slot under it.
//! Replies may arrive in any order; whichever arrives first wakes its own
//! caller only. Lives on the reactor thread, hence the `RefCell`.

use crate::error::{ClientError, ProtocolError};
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

/// Receiving end handed to the caller of [`RequestCorrelator::register`].
pub type ReplySlot<T> = oneshot::Receiver<Result<T, ClientError>>;

pub struct RequestCorrelator<T> {
    next_id: AtomicU64,
    pending: RefCell<HashMap<u64, oneshot::Sender<Result<T, ClientError>>>>,
}

impl<T> Default for RequestCorrelator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestCorrelator<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: RefCell::new(HashMap::new()),
        }
    }

    /// Returns an id not used before on this correlator.
    pub fn new_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register(&self, request_id: u64) -> Result<ReplySlot<T>, ProtocolError> {
        let mut pending = self.pending.borrow_mut();
        if pending.contains_key(&request_id) {
            return Err(ProtocolError::DuplicateRequestId(request_id));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(request_id, tx);
        Ok(rx)
    }

    /// Completes the request registered under `request_id`.
    ///
    /// A reply nobody asked for is a protocol violation.
    pub fn resolve(&self, request_id: u64, result: Result<T, ClientError>) -> Result<(), ProtocolError> {
        let slot = self
            .pending
            .borrow_mut()
            .remove(&request_id)
            .ok_or(ProtocolError::UnknownRequestId(request_id))?;

        if slot.send(result).is_err() {
            debug!("Caller of request {} went away before its reply", request_id);
        }
        Ok(())
    }

    /// Drops a registration whose request never made it onto the wire.
    pub fn forget(&self, request_id: u64) {
        self.pending.borrow_mut().remove(&request_id);
    }

    /// Completes every pending request with `error`. Returns how many there were.
    pub fn fail_all(&self, error: ClientError) -> usize {
        let drained: Vec<_> = self.pending.borrow_mut().drain().collect();
        let count = drained.len();
        for (_, slot) in drained {
            let _ = slot.send(Err(error.clone()));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_pending(&self, request_id: u64) -> bool {
        self.pending.borrow().contains_key(&request_id)
    }
}
