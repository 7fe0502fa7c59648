//! User-attached buffer backing buffered-mode sends.

use crate::error::{BenchError, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Bookkeeping bytes charged per buffered message on top of its payload
pub const BSEND_OVERHEAD: usize = 96;

struct Attached {
    storage: Vec<u8>,
    in_use: usize,
    outstanding: usize,
}

/// Per-process attach point; shared by every group the process belongs to.
#[derive(Default)]
pub(crate) struct BufferSlot {
    attached: Mutex<Option<Attached>>,
}

/// Capacity reserved for one buffered message until it is received
pub(crate) struct BufferLease {
    slot: Arc<BufferSlot>,
    bytes: usize,
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        if let Some(attached) = self.slot.attached.lock().as_mut() {
            attached.in_use = attached.in_use.saturating_sub(self.bytes);
            attached.outstanding = attached.outstanding.saturating_sub(1);
        }
    }
}

impl BufferSlot {
    pub fn attach(&self, storage: Vec<u8>) -> Result<()> {
        let mut attached = self.attached.lock();
        if attached.is_some() {
            return Err(BenchError::PreconditionViolation(
                "a send buffer is already attached".to_string(),
            ));
        }
        *attached = Some(Attached {
            storage,
            in_use: 0,
            outstanding: 0,
        });
        Ok(())
    }

    /// Detach and return the storage; refused while messages are undelivered.
    pub fn detach(&self) -> Result<Vec<u8>> {
        let mut attached = self.attached.lock();
        let outstanding = match attached.as_ref() {
            Some(a) => a.outstanding,
            None => return Err(BenchError::BufferNotAttached),
        };
        if outstanding > 0 {
            return Err(BenchError::BufferInUse { outstanding });
        }
        Ok(attached.take().map(|a| a.storage).unwrap_or_default())
    }

    /// Charge `payload_bytes + BSEND_OVERHEAD` against the attached buffer.
    pub fn reserve(self: &Arc<Self>, payload_bytes: usize) -> Result<BufferLease> {
        let needed = payload_bytes + BSEND_OVERHEAD;
        let mut guard = self.attached.lock();
        let attached = guard.as_mut().ok_or(BenchError::BufferNotAttached)?;
        let available = attached.storage.len() - attached.in_use;
        if needed > available {
            return Err(BenchError::BufferExhausted { needed, available });
        }
        attached.in_use += needed;
        attached.outstanding += 1;
        Ok(BufferLease {
            slot: Arc::clone(self),
            bytes: needed,
        })
    }
}
