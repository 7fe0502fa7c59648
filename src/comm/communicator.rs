//! The communicator interface the kernels are written against.
//!
//! Two backends implement it: [`ProcessGroup`], the in-process runtime used
//! by the tests and the default binary, and `MpiGroup` (feature `mpi`), which
//! forwards every operation to an MPI library.

use super::group::ProcessGroup;
use super::{Rank, ReduceOp, Role, SendMode, Tag};
use crate::error::Result;

/// Anything that can travel in a message
#[cfg(not(feature = "mpi"))]
pub trait Element: Clone + Default + Send + 'static {}

#[cfg(not(feature = "mpi"))]
impl<T: Clone + Default + Send + 'static> Element for T {}

/// Anything that can travel in a message
#[cfg(feature = "mpi")]
pub trait Element: Clone + Default + Send + 'static + ::mpi::datatype::Equivalence {}

#[cfg(feature = "mpi")]
impl<T: Clone + Default + Send + 'static + ::mpi::datatype::Equivalence> Element for T {}

/// An ordered set of cooperating ranks, seen from one member.
///
/// Collective methods must be called by every member in the same order.
pub trait Comm: Sized {
    fn rank(&self) -> Rank;

    fn size(&self) -> usize;

    /// Root if this rank is `root`, participant otherwise
    fn role(&self, root: Rank) -> Role {
        if self.rank() == root {
            Role::Root
        } else {
            Role::Participant
        }
    }

    /// No member returns before every member has entered.
    fn barrier(&self) -> Result<()>;

    /// Send `data` to `dest` with the given delivery semantics.
    fn send<T: Element>(&self, data: &[T], dest: Rank, tag: Tag, mode: SendMode) -> Result<()>;

    /// Blocking receive of a whole message
    fn recv<T: Element>(&self, source: Rank, tag: Tag) -> Result<Vec<T>>;

    /// Blocking receive into a buffer of exactly the message length
    fn recv_into<T: Element>(&self, buf: &mut [T], source: Rank, tag: Tag) -> Result<()>;

    /// Post a receive into `buf`, run `between` while it is pending, then
    /// complete it. A ready send issued during `between` finds it posted.
    fn recv_posted_into<T, R, F>(&self, buf: &mut [T], source: Rank, tag: Tag, between: F) -> Result<R>
    where
        T: Element,
        F: FnOnce() -> Result<R>;

    /// Send `send` to `dest` while receiving `recv` from `source`.
    fn sendrecv_into<T: Element>(
        &self,
        send: &[T],
        dest: Rank,
        recv: &mut [T],
        source: Rank,
        tag: Tag,
    ) -> Result<()>;

    /// Send `buf` to `dest` and overwrite it with the message from `source`.
    fn sendrecv_replace<T: Element>(&self, buf: &mut [T], dest: Rank, source: Rank, tag: Tag) -> Result<()>;

    /// Non-root contents are replaced by the root's, length included.
    fn broadcast<T: Element>(&self, data: &mut Vec<T>, root: Rank) -> Result<()>;

    /// Split `send` (root only) into consecutive pieces of `counts[r]` elements.
    fn scatterv<T: Element>(&self, send: Option<&[T]>, counts: &[usize], root: Rank) -> Result<Vec<T>>;

    /// Collect every member's piece on `root`, in rank order.
    fn gatherv<T: Element>(&self, local: &[T], root: Rank) -> Result<Option<Vec<Vec<T>>>>;

    /// Combine one value per member; every member gets the result.
    fn all_reduce(&self, value: f64, op: ReduceOp) -> Result<f64>;

    /// Partition the group by `color`; members of a part are ordered by `(key, rank)`.
    fn split(&self, color: usize, key: usize) -> Result<Self>;

    /// Attach the storage used by buffered sends of this process.
    fn attach_buffer(&self, storage: Vec<u8>) -> Result<()>;

    /// Give the attached storage back.
    fn detach_buffer(&self) -> Result<Vec<u8>>;
}

impl Comm for ProcessGroup {
    fn rank(&self) -> Rank {
        ProcessGroup::rank(self)
    }

    fn size(&self) -> usize {
        ProcessGroup::size(self)
    }

    fn barrier(&self) -> Result<()> {
        ProcessGroup::barrier(self)
    }

    fn send<T: Element>(&self, data: &[T], dest: Rank, tag: Tag, mode: SendMode) -> Result<()> {
        ProcessGroup::send(self, data, dest, tag, mode)
    }

    fn recv<T: Element>(&self, source: Rank, tag: Tag) -> Result<Vec<T>> {
        ProcessGroup::recv(self, source, tag)
    }

    fn recv_into<T: Element>(&self, buf: &mut [T], source: Rank, tag: Tag) -> Result<()> {
        ProcessGroup::recv_into(self, buf, source, tag)
    }

    fn recv_posted_into<T, R, F>(&self, buf: &mut [T], source: Rank, tag: Tag, between: F) -> Result<R>
    where
        T: Element,
        F: FnOnce() -> Result<R>,
    {
        let request = self.irecv::<T>(source, tag)?;
        let outcome = between()?;
        request.wait_into(buf)?;
        Ok(outcome)
    }

    fn sendrecv_into<T: Element>(
        &self,
        send: &[T],
        dest: Rank,
        recv: &mut [T],
        source: Rank,
        tag: Tag,
    ) -> Result<()> {
        let incoming = self.irecv::<T>(source, tag)?;
        ProcessGroup::send(self, send, dest, tag, SendMode::Standard)?;
        incoming.wait_into(recv)
    }

    fn sendrecv_replace<T: Element>(&self, buf: &mut [T], dest: Rank, source: Rank, tag: Tag) -> Result<()> {
        let incoming = self.irecv::<T>(source, tag)?;
        ProcessGroup::send(self, buf, dest, tag, SendMode::Standard)?;
        incoming.wait_into(buf)
    }

    fn broadcast<T: Element>(&self, data: &mut Vec<T>, root: Rank) -> Result<()> {
        ProcessGroup::broadcast(self, data, root)
    }

    fn scatterv<T: Element>(&self, send: Option<&[T]>, counts: &[usize], root: Rank) -> Result<Vec<T>> {
        ProcessGroup::scatterv(self, send, counts, root)
    }

    fn gatherv<T: Element>(&self, local: &[T], root: Rank) -> Result<Option<Vec<Vec<T>>>> {
        ProcessGroup::gatherv(self, local, root)
    }

    fn all_reduce(&self, value: f64, op: ReduceOp) -> Result<f64> {
        ProcessGroup::all_reduce(self, value, op)
    }

    fn split(&self, color: usize, key: usize) -> Result<Self> {
        ProcessGroup::split(self, color, key)
    }

    fn attach_buffer(&self, storage: Vec<u8>) -> Result<()> {
        ProcessGroup::attach_buffer(self, storage)
    }

    fn detach_buffer(&self) -> Result<Vec<u8>> {
        ProcessGroup::detach_buffer(self)
    }
}
