//! Tests for the send-mode comparison.

use crate::comm::{SendMode, Universe, BSEND_OVERHEAD};
use crate::error::BenchError;
use crate::kernels::send_modes::*;
use crate::matrix::Matrix;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_every_mode_delivers_the_matrix() {
    let mut rng = StdRng::seed_from_u64(21);
    let source = Matrix::random(8, 8, &mut rng);
    for mode in SendMode::ALL {
        for processes in [1, 2, 4] {
            let results = Universe::new(processes)
                .unwrap()
                .run(|group| {
                    let mut m = if group.rank() == 0 {
                        source.clone()
                    } else {
                        Matrix::square(8)
                    };
                    let elapsed = distribute_timed(&group, &mut m, mode)?;
                    Ok((m, elapsed))
                })
                .unwrap();
            for (m, _) in &results {
                assert_eq!(m, &source, "mode {} on {} ranks", mode, processes);
            }
        }
    }
}

#[test]
fn test_buffer_is_detached_afterwards() {
    let results = Universe::new(3)
        .unwrap()
        .run(|group| {
            let mut m = Matrix::square(4);
            distribute_timed(&group, &mut m, SendMode::Buffered)?;
            // a second attach only succeeds if the first buffer was released
            if group.rank() == 0 {
                group.attach_buffer(vec![0u8; 16])?;
                group.detach_buffer()?;
            }
            Ok(())
        });
    assert!(results.is_ok());
}

#[test]
fn test_buffer_requirement() {
    assert_eq!(buffer_requirement(800, 4), (800 + BSEND_OVERHEAD) * 3);
    assert_eq!(buffer_requirement(800, 1), 0);
}

#[test]
fn test_multiply_reports_transfer_time_on_root() {
    let mut rng = StdRng::seed_from_u64(8);
    let order = 8;
    let a = Matrix::random(order, order, &mut rng);
    let b = Matrix::random(order, order, &mut rng);
    for mode in SendMode::ALL {
        let results = Universe::new(4)
            .unwrap()
            .run(|group| {
                let operands = (group.rank() == 0).then_some((&a, &b));
                send_mode_multiply(&group, operands, order, mode)
            })
            .unwrap();
        let transfer = results[0].expect("root reports the transfer time");
        assert!(transfer >= 0.0);
        assert!(results[1..].iter().all(Option::is_none));
    }
}

#[test]
fn test_indivisible_order_rejected() {
    let results = Universe::new(3)
        .unwrap()
        .run(|group| Ok(send_mode_multiply(&group, None, 10, SendMode::Standard).err()))
        .unwrap();
    assert!(results
        .iter()
        .all(|e| matches!(e, Some(BenchError::IndivisibleSize { order: 10, factor: 3 }))));
}
