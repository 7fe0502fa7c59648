//! Launching a fixed-size SPMD program on in-process ranks.

use super::fabric::Fabric;
use super::group::ProcessGroup;
use super::Rank;
use crate::error::{BenchError, Result};
use crate::utils::affinity::CpuPinGuard;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// A set of `size` ranks, each running the same program on its own thread.
#[derive(Clone, Debug)]
pub struct Universe {
    size: usize,
    pin_ranks: bool,
}

impl Universe {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(BenchError::InvalidConfig(
                "a universe needs at least one rank".to_string(),
            ));
        }
        Ok(Self {
            size,
            pin_ranks: false,
        })
    }

    /// Pin rank `r` to core `r mod cores` while it runs.
    pub fn with_pinning(mut self, pin_ranks: bool) -> Self {
        self.pin_ranks = pin_ranks;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `program` on every rank and return the per-rank results in rank order.
    ///
    /// If any rank returns an error or panics, the fabric is aborted so ranks
    /// blocked on it wake up with `Aborted`; the reported error is the first
    /// one that is not such a consequential abort.
    pub fn run<F, R>(&self, program: F) -> Result<Vec<R>>
    where
        F: Fn(ProcessGroup) -> Result<R> + Sync,
        R: Send,
    {
        let fabric = Arc::new(Fabric::new(self.size));
        let members: Arc<[Rank]> = (0..self.size).collect();
        let program = &program;
        let pin_ranks = self.pin_ranks;

        let outcomes: Vec<Result<R>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.size)
                .map(|rank| {
                    let world = ProcessGroup::world(rank, Arc::clone(&members), Arc::clone(&fabric));
                    let rank_fabric = Arc::clone(&fabric);
                    let spawned = thread::Builder::new()
                        .name(format!("rank-{rank}"))
                        .spawn_scoped(scope, move || {
                            let _pin = pin_ranks.then(|| CpuPinGuard::for_rank(rank));
                            let outcome = panic::catch_unwind(AssertUnwindSafe(|| program(world)))
                                .unwrap_or_else(|payload| {
                                    Err(BenchError::RankPanicked {
                                        rank,
                                        message: panic_message(payload.as_ref()),
                                    })
                                });
                            if outcome.is_err() {
                                rank_fabric.abort();
                            }
                            outcome
                        });
                    if spawned.is_err() {
                        fabric.abort();
                    }
                    (rank, spawned)
                })
                .collect();

            handles
                .into_iter()
                .map(|(rank, spawned)| match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|payload| {
                        Err(BenchError::RankPanicked {
                            rank,
                            message: panic_message(payload.as_ref()),
                        })
                    }),
                    Err(err) => Err(BenchError::Io(err)),
                })
                .collect()
        });

        let mut first_abort = None;
        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(BenchError::Aborted) => {
                    first_abort.get_or_insert(BenchError::Aborted);
                }
                Err(err) => return Err(err),
            }
        }
        match first_abort {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_universe_rejected() {
        assert!(matches!(Universe::new(0), Err(BenchError::InvalidConfig(_))));
    }

    #[test]
    fn test_results_in_rank_order() {
        let results = Universe::new(5)
            .unwrap()
            .run(|group| Ok(group.rank() * 10 + group.size()))
            .unwrap();
        assert_eq!(results, vec![5, 15, 25, 35, 45]);
    }

    #[test]
    fn test_failing_rank_aborts_blocked_peers() {
        let err = Universe::new(3)
            .unwrap()
            .run(|group| {
                if group.rank() == 2 {
                    return Err(BenchError::EmptyProblem);
                }
                // ranks 0 and 1 wait for a message rank 2 never sends
                group.recv::<u8>(2, 0)
            })
            .unwrap_err();
        assert!(matches!(err, BenchError::EmptyProblem));
    }

    #[test]
    fn test_panicking_rank_is_reported() {
        let err = Universe::new(2)
            .unwrap()
            .run(|group| {
                if group.rank() == 1 {
                    panic!("boom");
                }
                group.barrier()
            })
            .unwrap_err();
        match err {
            BenchError::RankPanicked { rank, message } => {
                assert_eq!(rank, 1);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pinned_universe_runs() {
        let results = Universe::new(2)
            .unwrap()
            .with_pinning(true)
            .run(|group| {
                group.barrier()?;
                Ok(group.rank())
            })
            .unwrap();
        assert_eq!(results, vec![0, 1]);
    }
}
