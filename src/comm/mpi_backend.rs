//! [`Comm`] over an MPI library, through `rsmpi`.
//!
//! Each OS process launched by `mpirun` is one rank. Every operation maps to
//! the MPI call of the same meaning; variable-length collectives first
//! exchange their element counts.

use super::{Comm, Element, Rank, ReduceOp, SendMode, Tag, BSEND_OVERHEAD};
use crate::error::{BenchError, Result};
use ::mpi::collective::SystemOperation;
use ::mpi::datatype::{Partition, PartitionMut};
use ::mpi::environment::Universe as MpiUniverse;
use ::mpi::point_to_point::{send_receive_into_with_tags, send_receive_replace_into_with_tags};
use ::mpi::topology::{Color, SimpleCommunicator};
use ::mpi::traits::*;
use ::mpi::Count;
use std::cell::RefCell;
use std::rc::Rc;

/// Process-wide MPI state shared by the world and every group split from it
struct Environment {
    universe: RefCell<MpiUniverse>,
    /// Storage handed to `attach_buffer`, returned on detach
    attached: RefCell<Option<Vec<u8>>>,
}

/// A communicator of the MPI job, seen from this process.
pub struct MpiGroup {
    comm: SimpleCommunicator,
    env: Rc<Environment>,
}

impl MpiGroup {
    /// Initialise MPI and return the world communicator.
    ///
    /// MPI is finalised when the world and every group derived from it are dropped.
    pub fn init() -> Result<Self> {
        let universe = ::mpi::initialize().ok_or_else(|| {
            BenchError::InvalidConfig("MPI was already initialised in this process".to_string())
        })?;
        let comm = universe.world();
        tracing::debug!(rank = comm.rank(), size = comm.size(), "MPI initialised");
        Ok(Self {
            comm,
            env: Rc::new(Environment {
                universe: RefCell::new(universe),
                attached: RefCell::new(None),
            }),
        })
    }

    fn peer(&self, rank: Rank) -> Result<::mpi::Rank> {
        if rank < self.size() {
            Ok(rank as ::mpi::Rank)
        } else {
            Err(BenchError::InvalidRank {
                rank,
                size: self.size(),
            })
        }
    }
}

fn mpi_tag(tag: Tag) -> Result<::mpi::Tag> {
    ::mpi::Tag::try_from(tag)
        .map_err(|_| BenchError::InvalidConfig(format!("tag {tag} is outside the MPI tag range")))
}

fn mpi_count(count: usize) -> Result<Count> {
    Count::try_from(count)
        .map_err(|_| BenchError::InvalidConfig(format!("{count} elements exceed an MPI count")))
}

/// Exclusive prefix sums of `counts`
fn displacements(counts: &[Count]) -> Vec<Count> {
    counts
        .iter()
        .scan(0, |offset, &count| {
            let start = *offset;
            *offset += count;
            Some(start)
        })
        .collect()
}

fn check_received<T: Element>(status: ::mpi::point_to_point::Status, expected: usize) -> Result<()> {
    let actual = status.count(T::equivalent_datatype()) as usize;
    if actual != expected {
        return Err(BenchError::LengthMismatch { expected, actual });
    }
    Ok(())
}

impl Comm for MpiGroup {
    fn rank(&self) -> Rank {
        self.comm.rank() as Rank
    }

    fn size(&self) -> usize {
        self.comm.size() as usize
    }

    fn barrier(&self) -> Result<()> {
        self.comm.barrier();
        Ok(())
    }

    fn send<T: Element>(&self, data: &[T], dest: Rank, tag: Tag, mode: SendMode) -> Result<()> {
        let process = self.comm.process_at_rank(self.peer(dest)?);
        let tag = mpi_tag(tag)?;
        match mode {
            SendMode::Standard => process.send_with_tag(data, tag),
            SendMode::Synchronous => process.synchronous_send_with_tag(data, tag),
            SendMode::Ready => process.ready_send_with_tag(data, tag),
            SendMode::Buffered => {
                let needed = std::mem::size_of_val(data) + BSEND_OVERHEAD;
                let available = match self.env.attached.borrow().as_ref() {
                    Some(storage) => storage.len(),
                    None => return Err(BenchError::BufferNotAttached),
                };
                if needed > available {
                    return Err(BenchError::BufferExhausted { needed, available });
                }
                process.buffered_send_with_tag(data, tag)
            }
        }
        Ok(())
    }

    fn recv<T: Element>(&self, source: Rank, tag: Tag) -> Result<Vec<T>> {
        let process = self.comm.process_at_rank(self.peer(source)?);
        let (data, _status) = process.receive_vec_with_tag::<T>(mpi_tag(tag)?);
        Ok(data)
    }

    fn recv_into<T: Element>(&self, buf: &mut [T], source: Rank, tag: Tag) -> Result<()> {
        let process = self.comm.process_at_rank(self.peer(source)?);
        let status = process.receive_into_with_tag(buf, mpi_tag(tag)?);
        check_received::<T>(status, buf.len())
    }

    fn recv_posted_into<T, R, F>(&self, buf: &mut [T], source: Rank, tag: Tag, between: F) -> Result<R>
    where
        T: Element,
        F: FnOnce() -> Result<R>,
    {
        let process = self.comm.process_at_rank(self.peer(source)?);
        let tag = mpi_tag(tag)?;
        let expected = buf.len();
        let (outcome, status) = ::mpi::request::scope(|scope| {
            let request = process.immediate_receive_into_with_tag(scope, buf, tag);
            let outcome = between();
            if outcome.is_err() {
                request.cancel();
            }
            (outcome, request.wait())
        });
        let outcome = outcome?;
        check_received::<T>(status, expected)?;
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
        let dest = self.comm.process_at_rank(self.peer(dest)?);
        let source = self.comm.process_at_rank(self.peer(source)?);
        let tag = mpi_tag(tag)?;
        let status = send_receive_into_with_tags(send, &dest, tag, recv, &source, tag);
        check_received::<T>(status, recv.len())
    }

    fn sendrecv_replace<T: Element>(&self, buf: &mut [T], dest: Rank, source: Rank, tag: Tag) -> Result<()> {
        let dest = self.comm.process_at_rank(self.peer(dest)?);
        let source = self.comm.process_at_rank(self.peer(source)?);
        let tag = mpi_tag(tag)?;
        let status = send_receive_replace_into_with_tags(buf, &dest, tag, &source, tag);
        check_received::<T>(status, buf.len())
    }

    fn broadcast<T: Element>(&self, data: &mut Vec<T>, root: Rank) -> Result<()> {
        let root_process = self.comm.process_at_rank(self.peer(root)?);
        let mut len = data.len() as u64;
        root_process.broadcast_into(&mut len);
        data.resize(len as usize, T::default());
        root_process.broadcast_into(&mut data[..]);
        Ok(())
    }

    fn scatterv<T: Element>(&self, send: Option<&[T]>, counts: &[usize], root: Rank) -> Result<Vec<T>> {
        let root_process = self.comm.process_at_rank(self.peer(root)?);
        if counts.len() != self.size() {
            return Err(BenchError::LengthMismatch {
                expected: self.size(),
                actual: counts.len(),
            });
        }
        let mut local = vec![T::default(); counts[self.rank()]];
        if self.rank() == root {
            let send = send.ok_or(BenchError::MissingRootData)?;
            let total: usize = counts.iter().sum();
            if send.len() != total {
                return Err(BenchError::LengthMismatch {
                    expected: total,
                    actual: send.len(),
                });
            }
            let counts: Vec<Count> = counts.iter().map(|&c| mpi_count(c)).collect::<Result<_>>()?;
            let displs = displacements(&counts);
            let partition = Partition::new(send, &counts[..], &displs[..]);
            root_process.scatter_varcount_into_root(&partition, &mut local[..]);
        } else {
            root_process.scatter_varcount_into(&mut local[..]);
        }
        Ok(local)
    }

    fn gatherv<T: Element>(&self, local: &[T], root: Rank) -> Result<Option<Vec<Vec<T>>>> {
        let root_process = self.comm.process_at_rank(self.peer(root)?);
        let count = mpi_count(local.len())?;
        if self.rank() != root {
            root_process.gather_into(&count);
            root_process.gather_varcount_into(local);
            return Ok(None);
        }

        let mut counts = vec![0 as Count; self.size()];
        root_process.gather_into_root(&count, &mut counts[..]);
        let displs = displacements(&counts);
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        let mut flat = vec![T::default(); total];
        {
            let mut partition = PartitionMut::new(&mut flat[..], &counts[..], &displs[..]);
            root_process.gather_varcount_into_root(local, &mut partition);
        }
        let mut pieces = Vec::with_capacity(counts.len());
        let mut rest = flat.as_slice();
        for &count in &counts {
            let (piece, tail) = rest.split_at(count as usize);
            pieces.push(piece.to_vec());
            rest = tail;
        }
        Ok(Some(pieces))
    }

    fn all_reduce(&self, value: f64, op: ReduceOp) -> Result<f64> {
        let operation = match op {
            ReduceOp::Sum => SystemOperation::sum(),
            ReduceOp::Min => SystemOperation::min(),
            ReduceOp::Max => SystemOperation::max(),
        };
        let mut result = op.identity();
        self.comm.all_reduce_into(&value, &mut result, operation);
        Ok(result)
    }

    fn split(&self, color: usize, key: usize) -> Result<Self> {
        let color = ::mpi::Rank::try_from(color)
            .map_err(|_| BenchError::InvalidConfig(format!("split color {color} is out of range")))?;
        let key = ::mpi::Rank::try_from(key)
            .map_err(|_| BenchError::InvalidConfig(format!("split key {key} is out of range")))?;
        let comm = self
            .comm
            .split_by_color_with_key(Color::with_value(color), key)
            .ok_or_else(|| BenchError::InvalidConfig("communicator split produced no group".to_string()))?;
        Ok(Self {
            comm,
            env: Rc::clone(&self.env),
        })
    }

    /// Attach `storage.len()` bytes; MPI owns its own copy while attached.
    fn attach_buffer(&self, storage: Vec<u8>) -> Result<()> {
        let mut attached = self.env.attached.borrow_mut();
        if attached.is_some() {
            return Err(BenchError::PreconditionViolation(
                "a send buffer is already attached".to_string(),
            ));
        }
        self.env.universe.borrow_mut().set_buffer_size(storage.len());
        *attached = Some(storage);
        Ok(())
    }

    /// Blocks until every buffered message has left the buffer.
    fn detach_buffer(&self) -> Result<Vec<u8>> {
        let storage = self
            .env
            .attached
            .borrow_mut()
            .take()
            .ok_or(BenchError::BufferNotAttached)?;
        self.env.universe.borrow_mut().detach_buffer();
        Ok(storage)
    }
}
