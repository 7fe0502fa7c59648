//! Per-rank communicator: identity, point-to-point traffic and buffer attach.

use super::buffer::BufferSlot;
use super::communicator::Element;
use super::fabric::{Completion, Envelope, Fabric, MatchKey};
use super::{ContextId, Rank, Role, SendMode, Tag};
use crate::error::{BenchError, Result};
use std::marker::PhantomData;
use std::sync::Arc;

/// An ordered set of cooperating ranks, seen from one member.
///
/// Every rank holds its own `ProcessGroup` value; groups derived with
/// [`ProcessGroup::split`] share the same fabric but get a fresh context, so
/// their traffic never matches messages of the parent.
pub struct ProcessGroup {
    pub(crate) rank: Rank,
    /// World rank of each member, indexed by group rank
    pub(crate) members: Arc<[Rank]>,
    pub(crate) context: ContextId,
    pub(crate) fabric: Arc<Fabric>,
    pub(crate) buffer: Arc<BufferSlot>,
}

impl ProcessGroup {
    pub(crate) fn world(rank: Rank, members: Arc<[Rank]>, fabric: Arc<Fabric>) -> Self {
        Self {
            rank,
            members,
            context: 0,
            fabric,
            buffer: Arc::new(BufferSlot::default()),
        }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Rank of this process in the world group
    pub fn world_rank(&self) -> Rank {
        self.members[self.rank]
    }

    /// Root if this rank is `root`, participant otherwise
    pub fn role(&self, root: Rank) -> Role {
        if self.rank == root {
            Role::Root
        } else {
            Role::Participant
        }
    }

    pub(crate) fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank < self.size() {
            Ok(())
        } else {
            Err(BenchError::InvalidRank {
                rank,
                size: self.size(),
            })
        }
    }

    fn key_from(&self, context: ContextId, source: Rank, tag: Tag) -> Result<MatchKey> {
        self.check_rank(source)?;
        Ok(MatchKey {
            context,
            source: self.members[source],
            tag,
        })
    }

    pub(crate) fn send_on<T: Element>(
        &self,
        context: ContextId,
        data: &[T],
        dest: Rank,
        tag: Tag,
        mode: SendMode,
    ) -> Result<()> {
        self.fabric.check_aborted()?;
        self.check_rank(dest)?;
        let dest_world = self.members[dest];
        let mut envelope = Envelope {
            key: MatchKey {
                context,
                source: self.world_rank(),
                tag,
            },
            payload: Box::new(data.to_vec()),
            on_match: None,
            lease: None,
        };
        match mode {
            SendMode::Standard => self.fabric.deliver(dest_world, envelope),
            SendMode::Synchronous => {
                let done = Completion::new();
                envelope.on_match = Some(Arc::clone(&done));
                self.fabric.deliver(dest_world, envelope);
                done.wait(&self.fabric)?;
            }
            SendMode::Ready => self.fabric.deliver_ready(dest_world, envelope)?,
            SendMode::Buffered => {
                envelope.lease = Some(self.buffer.reserve(std::mem::size_of_val(data))?);
                self.fabric.deliver(dest_world, envelope);
            }
        }
        Ok(())
    }

    pub(crate) fn irecv_on<T: Element>(
        &self,
        context: ContextId,
        source: Rank,
        tag: Tag,
    ) -> Result<RecvRequest<'_, T>> {
        self.fabric.check_aborted()?;
        let key = self.key_from(context, source, tag)?;
        let id = self.fabric.post(self.world_rank(), key);
        Ok(RecvRequest {
            group: self,
            id: Some(id),
            source,
            tag,
            _element: PhantomData,
        })
    }

    pub(crate) fn recv_on<T: Element>(
        &self,
        context: ContextId,
        source: Rank,
        tag: Tag,
    ) -> Result<Vec<T>> {
        self.irecv_on(context, source, tag)?.wait()
    }

    /// Send `data` to `dest` with the given delivery semantics.
    ///
    /// `Ready` fails with `PreconditionViolation` unless `dest` has already
    /// posted a matching receive; `Buffered` needs an attached buffer large
    /// enough for the payload plus [`BSEND_OVERHEAD`](super::BSEND_OVERHEAD).
    pub fn send<T: Element>(&self, data: &[T], dest: Rank, tag: Tag, mode: SendMode) -> Result<()> {
        self.send_on(self.context, data, dest, tag, mode)
    }

    /// Blocking receive of a whole message
    pub fn recv<T: Element>(&self, source: Rank, tag: Tag) -> Result<Vec<T>> {
        self.recv_on(self.context, source, tag)
    }

    /// Blocking receive into an existing buffer of exactly the message length
    pub fn recv_into<T: Element>(&self, buf: &mut [T], source: Rank, tag: Tag) -> Result<()> {
        self.irecv(source, tag)?.wait_into(buf)
    }

    /// Post a receive now and complete it later with [`RecvRequest::wait`].
    pub fn irecv<T: Element>(&self, source: Rank, tag: Tag) -> Result<RecvRequest<'_, T>> {
        self.irecv_on(self.context, source, tag)
    }

    /// Attach the storage used by buffered sends of this process.
    pub fn attach_buffer(&self, storage: Vec<u8>) -> Result<()> {
        self.buffer.attach(storage)
    }

    /// Give the buffer back; fails with `BufferInUse` while buffered sends are undelivered.
    pub fn detach_buffer(&self) -> Result<Vec<u8>> {
        self.buffer.detach()
    }
}

/// A posted receive; dropping it without waiting withdraws the receive.
pub struct RecvRequest<'g, T> {
    group: &'g ProcessGroup,
    id: Option<u64>,
    source: Rank,
    tag: Tag,
    _element: PhantomData<T>,
}

impl<T: Element> RecvRequest<'_, T> {
    pub fn wait(mut self) -> Result<Vec<T>> {
        let id = self.id.take().ok_or_else(|| {
            BenchError::PreconditionViolation("receive request already completed".to_string())
        })?;
        let envelope = self.group.fabric.wait_posted(self.group.world_rank(), id)?;
        let (source, tag) = (self.source, self.tag);
        envelope
            .payload
            .downcast::<Vec<T>>()
            .map(|data| *data)
            .map_err(|_| BenchError::TypeMismatch { peer: source, tag })
    }

    pub fn wait_into(self, buf: &mut [T]) -> Result<()> {
        let data = self.wait()?;
        if data.len() != buf.len() {
            return Err(BenchError::LengthMismatch {
                expected: buf.len(),
                actual: data.len(),
            });
        }
        buf.clone_from_slice(&data);
        Ok(())
    }
}

impl<T> Drop for RecvRequest<'_, T> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.group.fabric.cancel(self.group.world_rank(), id);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::comm::{SendMode, Universe, BSEND_OVERHEAD};
    use crate::error::BenchError;

    #[test]
    fn test_standard_send_recv() {
        let results = Universe::new(2)
            .unwrap()
            .run(|group| {
                if group.rank() == 0 {
                    group.send(&[1.0f64, 2.0, 3.0], 1, 0, SendMode::Standard)?;
                    Ok(Vec::new())
                } else {
                    group.recv::<f64>(0, 0)
                }
            })
            .unwrap();
        assert_eq!(results[1], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_messages_do_not_overtake() {
        let results = Universe::new(2)
            .unwrap()
            .run(|group| {
                if group.rank() == 0 {
                    for i in 0..50u32 {
                        group.send(&[i], 1, 4, SendMode::Standard)?;
                    }
                    Ok(Vec::new())
                } else {
                    let mut seen = Vec::new();
                    for _ in 0..50 {
                        seen.push(group.recv::<u32>(0, 4)?[0]);
                    }
                    Ok(seen)
                }
            })
            .unwrap();
        assert_eq!(results[1], (0..50).collect::<Vec<u32>>());
    }

    #[test]
    fn test_tags_are_matched_independently() {
        let results = Universe::new(2)
            .unwrap()
            .run(|group| {
                if group.rank() == 0 {
                    group.send(&[10u8], 1, 1, SendMode::Standard)?;
                    group.send(&[20u8], 1, 2, SendMode::Standard)?;
                    Ok((0, 0))
                } else {
                    let second = group.recv::<u8>(0, 2)?[0];
                    let first = group.recv::<u8>(0, 1)?[0];
                    Ok((first, second))
                }
            })
            .unwrap();
        assert_eq!(results[1], (10, 20));
    }

    #[test]
    fn test_synchronous_send_completes_after_match() {
        let results = Universe::new(2)
            .unwrap()
            .run(|group| {
                if group.rank() == 0 {
                    group.send(&[7i64], 1, 0, SendMode::Synchronous)?;
                    Ok(0)
                } else {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    Ok(group.recv::<i64>(0, 0)?[0])
                }
            })
            .unwrap();
        assert_eq!(results[1], 7);
    }

    #[test]
    fn test_ready_send_without_posted_receive_is_rejected() {
        let results = Universe::new(2)
            .unwrap()
            .run(|group| {
                if group.rank() == 0 {
                    Ok(group.send(&[1u8], 1, 0, SendMode::Ready).err())
                } else {
                    Ok(None)
                }
            })
            .unwrap();
        assert!(matches!(
            results[0],
            Some(BenchError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_ready_send_with_posted_receive() {
        let results = Universe::new(2)
            .unwrap()
            .run(|group| {
                let posted = if group.rank() == 1 {
                    Some(group.irecv::<u8>(0, 0)?)
                } else {
                    None
                };
                group.barrier()?;
                match posted {
                    Some(request) => request.wait(),
                    None => {
                        group.send(&[42u8], 1, 0, SendMode::Ready)?;
                        Ok(Vec::new())
                    }
                }
            })
            .unwrap();
        assert_eq!(results[1], vec![42]);
    }

    #[test]
    fn test_buffered_send_lifecycle() {
        let results = Universe::new(2)
            .unwrap()
            .run(|group| {
                if group.rank() == 0 {
                    let missing = group.send(&[1.0f64], 1, 0, SendMode::Buffered).err();
                    group.attach_buffer(vec![0; 8 + BSEND_OVERHEAD])?;
                    group.send(&[1.0f64], 1, 0, SendMode::Buffered)?;
                    group.barrier()?;
                    group.barrier()?;
                    let storage = group.detach_buffer()?;
                    Ok((missing.is_some(), storage.len()))
                } else {
                    group.barrier()?;
                    let value = group.recv::<f64>(0, 0)?;
                    assert_eq!(value, vec![1.0]);
                    group.barrier()?;
                    Ok((false, 0))
                }
            })
            .unwrap();
        assert_eq!(results[0], (true, 8 + BSEND_OVERHEAD));
    }

    #[test]
    fn test_premature_detach_is_refused() {
        let results = Universe::new(2)
            .unwrap()
            .run(|group| {
                if group.rank() == 0 {
                    group.attach_buffer(vec![0; 64 + BSEND_OVERHEAD])?;
                    group.send(&[0u8; 64], 1, 0, SendMode::Buffered)?;
                    let early = group.detach_buffer().err();
                    group.barrier()?;
                    group.barrier()?;
                    group.detach_buffer()?;
                    Ok(early)
                } else {
                    group.barrier()?;
                    group.recv::<u8>(0, 0)?;
                    group.barrier()?;
                    Ok(None)
                }
            })
            .unwrap();
        assert!(matches!(
            results[0],
            Some(BenchError::BufferInUse { outstanding: 1 })
        ));
    }

    #[test]
    fn test_type_and_length_mismatch() {
        let results = Universe::new(2)
            .unwrap()
            .run(|group| {
                if group.rank() == 0 {
                    group.send(&[1u32], 1, 0, SendMode::Standard)?;
                    group.send(&[1u32, 2], 1, 1, SendMode::Standard)?;
                    Ok((None, None))
                } else {
                    let wrong_type = group.recv::<f64>(0, 0).err();
                    let mut buf = [0u32; 3];
                    let wrong_len = group.recv_into(&mut buf, 0, 1).err();
                    Ok((wrong_type, wrong_len))
                }
            })
            .unwrap();
        assert!(matches!(results[1].0, Some(BenchError::TypeMismatch { .. })));
        assert!(matches!(
            results[1].1,
            Some(BenchError::LengthMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_invalid_destination() {
        let results = Universe::new(1)
            .unwrap()
            .run(|group| Ok(group.send(&[0u8], 3, 0, SendMode::Standard).err()))
            .unwrap();
        assert!(matches!(
            results[0],
            Some(BenchError::InvalidRank { rank: 3, size: 1 })
        ));
    }
}
