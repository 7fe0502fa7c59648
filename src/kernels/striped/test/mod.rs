//! Tests for striped multiplication.

use crate::comm::Universe;
use crate::error::BenchError;
use crate::kernels::striped::*;
use crate::matrix::Matrix;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn run_striped(processes: usize, a: &Matrix, b: &Matrix) -> Vec<Option<Matrix>> {
    let order = a.rows();
    Universe::new(processes)
        .unwrap()
        .run(|group| {
            let operands = (group.rank() == 0).then_some((a, b));
            striped_multiply(&group, operands, order)
        })
        .unwrap()
}

#[test]
fn test_matches_sequential_product() {
    let mut rng = StdRng::seed_from_u64(7);
    for order in [1, 5, 16, 23] {
        let a = Matrix::random(order, order, &mut rng);
        let b = Matrix::random(order, order, &mut rng);
        let expected = a.matmul(&b);
        for processes in 1..=5 {
            let results = run_striped(processes, &a, &b);
            let c = results[0].as_ref().expect("root holds the product");
            assert!(
                c.approx_eq(&expected),
                "order {} on {} ranks: max diff {}",
                order,
                processes,
                c.max_abs_diff(&expected)
            );
            assert!(results[1..].iter().all(Option::is_none));
        }
    }
}

#[test]
fn test_more_ranks_than_rows() {
    let mut rng = StdRng::seed_from_u64(11);
    let a = Matrix::random(2, 2, &mut rng);
    let b = Matrix::random(2, 2, &mut rng);
    let results = run_striped(4, &a, &b);
    assert!(results[0].as_ref().unwrap().approx_eq(&a.matmul(&b)));
}

#[test]
fn test_identity_operand() {
    let order = 6;
    let mut identity = Matrix::square(order);
    for i in 0..order {
        identity[(i, i)] = 1.0;
    }
    let mut rng = StdRng::seed_from_u64(3);
    let a = Matrix::random(order, order, &mut rng);
    let results = run_striped(3, &a, &identity);
    assert_eq!(results[0].as_ref().unwrap(), &a);
}

#[test]
fn test_zero_order_rejected() {
    let results = Universe::new(2)
        .unwrap()
        .run(|group| Ok(striped_multiply(&group, None, 0).err()))
        .unwrap();
    assert!(results.iter().all(|e| matches!(e, Some(BenchError::EmptyProblem))));
}

#[test]
fn test_root_without_operands_fails() {
    let result = Universe::new(1)
        .unwrap()
        .run(|group| striped_multiply(&group, None, 4));
    assert!(matches!(result, Err(BenchError::MissingRootData)));
}
