//! Tests for ping-pong.

use crate::comm::Universe;
use crate::error::BenchError;
use crate::kernels::ping_pong::*;

#[test]
fn test_two_ranks_report_positive_latency() {
    for message_bytes in [0, 1, 1024, 65536] {
        let results = Universe::new(2)
            .unwrap()
            .run(|group| ping_pong(&group, message_bytes, 10))
            .unwrap();
        let latency = results[0].expect("root reports latency");
        assert!(latency > 0.0);
        assert!(results[1].is_none());
    }
}

#[test]
fn test_wrong_process_count_rejected() {
    for processes in [1, 3, 4] {
        let results = Universe::new(processes)
            .unwrap()
            .run(|group| Ok(ping_pong(&group, 8, DEFAULT_ROUND_TRIPS).err()))
            .unwrap();
        assert!(results.iter().all(|e| matches!(
            e,
            Some(BenchError::WrongProcessCount { expected: 2, actual }) if *actual == processes
        )));
    }
}

#[test]
fn test_zero_round_trips_rejected() {
    let result = Universe::new(2).unwrap().run(|group| ping_pong(&group, 8, 0));
    assert!(matches!(result, Err(BenchError::InvalidConfig(_))));
}
