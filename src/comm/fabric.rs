//! Message fabric shared by every rank of a universe.
//!
//! Each world rank owns one mailbox. A message is matched by
//! `(context, source, tag)`; posted receives are served first, in posting
//! order, and anything else waits in the unexpected queue in arrival order.
//! Both rules together keep delivery non-overtaking between any two ranks.

use super::buffer::BufferLease;
use super::{ContextId, Rank, Tag};
use crate::error::{BenchError, Result};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on how long a blocked rank sleeps before re-checking for abort
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Matching triple for a message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct MatchKey {
    pub context: ContextId,
    /// World rank of the sender
    pub source: Rank,
    pub tag: Tag,
}

/// One message in flight
pub(crate) struct Envelope {
    pub key: MatchKey,
    pub payload: Box<dyn Any + Send>,
    /// Signalled when a receive matches the message (synchronous mode)
    pub on_match: Option<Arc<Completion>>,
    /// Capacity held in the sender's attached buffer (buffered mode)
    pub lease: Option<BufferLease>,
}

impl Envelope {
    fn matched(&mut self) {
        if let Some(done) = self.on_match.take() {
            done.complete();
        }
        // dropping the lease hands the bytes back to the sender's buffer
        self.lease = None;
    }
}

struct PostedRecv {
    id: u64,
    key: MatchKey,
    filled: Option<Envelope>,
}

#[derive(Default)]
struct MailboxState {
    unexpected: VecDeque<Envelope>,
    posted: Vec<PostedRecv>,
    next_id: u64,
}

#[derive(Default)]
struct Mailbox {
    state: Mutex<MailboxState>,
    arrived: Condvar,
}

/// One-shot completion flag used by synchronous sends
#[derive(Default)]
pub(crate) struct Completion {
    done: Mutex<bool>,
    signal: Condvar,
}

impl Completion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn complete(&self) {
        *self.done.lock() = true;
        self.signal.notify_all();
    }

    pub fn wait(&self, fabric: &Fabric) -> Result<()> {
        let mut done = self.done.lock();
        while !*done {
            fabric.check_aborted()?;
            self.signal.wait_for(&mut done, POLL_INTERVAL);
        }
        Ok(())
    }
}

/// Interconnect between the ranks of one universe
pub(crate) struct Fabric {
    mailboxes: Vec<Mailbox>,
    aborted: AtomicBool,
    next_context: AtomicU64,
}

impl Fabric {
    pub fn new(size: usize) -> Self {
        Self {
            mailboxes: (0..size).map(|_| Mailbox::default()).collect(),
            aborted: AtomicBool::new(false),
            // context 0 belongs to the world group
            next_context: AtomicU64::new(1),
        }
    }

    /// Tear the universe down: every blocked rank wakes with `Aborted`.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        for mailbox in &self.mailboxes {
            mailbox.arrived.notify_all();
        }
    }

    pub fn check_aborted(&self) -> Result<()> {
        if self.aborted.load(Ordering::SeqCst) {
            Err(BenchError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Reserve `count` consecutive communication contexts.
    pub fn allocate_contexts(&self, count: u64) -> ContextId {
        self.next_context.fetch_add(count, Ordering::SeqCst)
    }

    /// Hand a message to `dest`, filling the oldest matching posted receive if any.
    pub fn deliver(&self, dest: Rank, envelope: Envelope) {
        let mailbox = &self.mailboxes[dest];
        let mut state = mailbox.state.lock();
        Self::place(&mut state, envelope);
        drop(state);
        mailbox.arrived.notify_all();
    }

    /// Deliver only if `dest` already has a matching receive posted.
    pub fn deliver_ready(&self, dest: Rank, envelope: Envelope) -> Result<()> {
        let mailbox = &self.mailboxes[dest];
        let mut state = mailbox.state.lock();
        let key = envelope.key;
        if !state.posted.iter().any(|p| p.filled.is_none() && p.key == key) {
            return Err(BenchError::PreconditionViolation(format!(
                "ready send to world rank {dest} (tag {}) before the receive was posted",
                key.tag
            )));
        }
        Self::place(&mut state, envelope);
        drop(state);
        mailbox.arrived.notify_all();
        Ok(())
    }

    fn place(state: &mut MailboxState, envelope: Envelope) {
        if let Some(envelope) = Self::fill_posted(state, envelope) {
            state.unexpected.push_back(envelope);
        }
    }

    /// Fill the oldest matching empty posted receive, or hand the envelope back.
    fn fill_posted(state: &mut MailboxState, mut envelope: Envelope) -> Option<Envelope> {
        let key = envelope.key;
        match state
            .posted
            .iter_mut()
            .find(|p| p.filled.is_none() && p.key == key)
        {
            Some(slot) => {
                envelope.matched();
                slot.filled = Some(envelope);
                None
            }
            None => Some(envelope),
        }
    }

    /// Register a receive for `key` in `owner`'s mailbox and return its id.
    pub fn post(&self, owner: Rank, key: MatchKey) -> u64 {
        let mut state = self.mailboxes[owner].state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let position = state.unexpected.iter().position(|e| e.key == key);
        let filled = position
            .and_then(|index| state.unexpected.remove(index))
            .map(|mut envelope| {
                envelope.matched();
                envelope
            });
        state.posted.push(PostedRecv { id, key, filled });
        id
    }

    /// Block until the posted receive `id` has a message, then retire it.
    pub fn wait_posted(&self, owner: Rank, id: u64) -> Result<Envelope> {
        let mailbox = &self.mailboxes[owner];
        let mut state = mailbox.state.lock();
        loop {
            let index = state
                .posted
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| {
                    BenchError::PreconditionViolation(format!("unknown receive request {id}"))
                })?;
            if let Some(envelope) = state.posted[index].filled.take() {
                state.posted.remove(index);
                return Ok(envelope);
            }
            if let Err(err) = self.check_aborted() {
                state.posted.remove(index);
                return Err(err);
            }
            mailbox.arrived.wait_for(&mut state, POLL_INTERVAL);
        }
    }

    /// Withdraw a posted receive that will never be waited on.
    ///
    /// A message that already landed in it moves to the next matching posted
    /// receive, or else to the front of the unexpected queue, so it is still
    /// the first one a matching receive sees.
    pub fn cancel(&self, owner: Rank, id: u64) {
        let mailbox = &self.mailboxes[owner];
        let mut state = mailbox.state.lock();
        let Some(index) = state.posted.iter().position(|p| p.id == id) else {
            return;
        };
        let slot = state.posted.remove(index);
        if let Some(envelope) = slot.filled {
            if let Some(envelope) = Self::fill_posted(&mut state, envelope) {
                state.unexpected.push_front(envelope);
            }
            drop(state);
            mailbox.arrived.notify_all();
        }
    }
}
