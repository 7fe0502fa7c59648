//! Tests for the reduction kernels.

use crate::comm::Universe;
use crate::error::BenchError;
use crate::kernels::reduce::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

const EPSILON: f64 = 1e-9;

fn assert_close(actual: f64, expected: f64, msg: &str) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= EPSILON * expected.abs().max(1.0),
        "{}: expected {}, got {}, diff = {}",
        msg,
        expected,
        actual,
        diff
    );
}

#[test]
fn test_constant_vector_closed_forms() {
    let v = 2.5;
    let order = 37;
    for processes in 1..=6 {
        let results = Universe::new(processes)
            .unwrap()
            .run(|group| {
                let data = vec![v; order];
                let root = (group.rank() == 0).then_some(data.as_slice());
                Ok((
                    global_extremum(&group, root, order, Aggregate::Min)?,
                    global_extremum(&group, root, order, Aggregate::Max)?,
                    distributed_dot(&group, root, root, order)?,
                ))
            })
            .unwrap();
        for (min, max, dot) in results {
            assert_eq!(min, v);
            assert_eq!(max, v);
            assert_close(dot, v * v * order as f64, "constant dot");
        }
    }
}

#[test]
fn test_random_vectors_match_sequential() {
    let order = 1001;
    let mut rng = StdRng::seed_from_u64(42);
    let a = random_vector(order, -100.0, 100.0, &mut rng);
    let b = random_vector(order, 0.0, 1.0, &mut rng);
    let expected_min = a.iter().copied().fold(f64::INFINITY, f64::min);
    let expected_max = a.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let expected_dot: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();

    let results = Universe::new(4)
        .unwrap()
        .run(|group| {
            let is_root = group.rank() == 0;
            Ok((
                global_extremum(&group, is_root.then_some(a.as_slice()), order, Aggregate::Min)?,
                global_extremum(&group, is_root.then_some(a.as_slice()), order, Aggregate::Max)?,
                distributed_dot(
                    &group,
                    is_root.then_some(a.as_slice()),
                    is_root.then_some(b.as_slice()),
                    order,
                )?,
            ))
        })
        .unwrap();
    let first = results[0];
    for (min, max, dot) in results {
        assert_eq!(min, expected_min);
        assert_eq!(max, expected_max);
        assert_close(dot, expected_dot, "random dot");
        // every rank holds the same all-reduced value
        assert_eq!(dot, first.2);
    }
}

#[test]
fn test_more_ranks_than_elements() {
    let results = Universe::new(5)
        .unwrap()
        .run(|group| {
            let data = [3.0, -1.0];
            let root = (group.rank() == 0).then_some(&data[..]);
            Ok((
                global_extremum(&group, root, 2, Aggregate::Min)?,
                global_extremum(&group, root, 2, Aggregate::Max)?,
            ))
        })
        .unwrap();
    assert!(results.iter().all(|&r| r == (-1.0, 3.0)));
}

#[test]
fn test_empty_vector_rejected_everywhere() {
    let results = Universe::new(3)
        .unwrap()
        .run(|group| Ok(distributed_dot(&group, None, None, 0).err()))
        .unwrap();
    assert!(results
        .iter()
        .all(|e| matches!(e, Some(BenchError::EmptyProblem))));
}
