//! Tests for the compute/communication balance kernel.

use crate::comm::Universe;
use crate::kernels::balance::*;

#[test]
fn test_synthetic_compute_is_deterministic() {
    assert_eq!(synthetic_compute(0), 0.0);
    assert_eq!(synthetic_compute(1000), synthetic_compute(1000));
    assert!(synthetic_compute(1000) > 0.0);
}

#[test]
fn test_ring_exchange_completes_for_any_size() {
    for processes in 1..=5 {
        let result = Universe::new(processes)
            .unwrap()
            .run(|group| ring_exchange(&group, 256, DEFAULT_COMM_ROUNDS));
        assert!(result.is_ok(), "ring on {} ranks", processes);
    }
}

#[test]
fn test_balance_reported_on_root() {
    let results = Universe::new(3)
        .unwrap()
        .run(|group| compute_comm_balance(&group, 10_000, 64, 4))
        .unwrap();
    assert!(results[0].unwrap() > 0.0);
    assert!(results[1..].iter().all(Option::is_none));
}
