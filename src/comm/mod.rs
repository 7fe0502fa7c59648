//! SPMD communication.
//!
//! Kernels are written against the [`Comm`] trait. The in-process runtime
//! implements it: a [`Universe`] launches `P` ranks on their own threads, and
//! each rank receives a [`ProcessGroup`] for the world and talks to the others
//! only through it. The runtime supports the four classic send semantics,
//! non-blocking receives, the usual collectives and sub-group derivation with
//! [`ProcessGroup::split`]. With the `mpi` feature, `MpiGroup` implements the
//! same trait over an MPI library, one OS process per rank.
//!
//! There is no process-wide default communicator: every operation takes the
//! group it runs on explicitly.

mod buffer;
mod collective;
mod communicator;
mod fabric;
mod group;
mod mode;
#[cfg(feature = "mpi")]
mod mpi_backend;
mod universe;

pub use buffer::BSEND_OVERHEAD;
pub use collective::ReduceOp;
pub use communicator::{Comm, Element};
pub use group::{ProcessGroup, RecvRequest};
pub use mode::SendMode;
#[cfg(feature = "mpi")]
pub use mpi_backend::MpiGroup;
pub use universe::Universe;

/// Position of a process inside a group
pub type Rank = usize;

/// User-chosen message label
pub type Tag = u32;

pub(crate) type ContextId = u64;

/// What a rank does in a given operation, resolved once up front
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Owns the full operands and the assembled result
    Root,
    /// Works on its own partition and reports back to the root
    Participant,
    /// The other side of a two-rank exchange
    Peer,
}
