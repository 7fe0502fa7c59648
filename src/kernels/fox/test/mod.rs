//! Tests for Fox multiplication.

use crate::comm::Universe;
use crate::error::BenchError;
use crate::kernels::fox::*;
use crate::matrix::Matrix;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn run_fox(processes: usize, a: &Matrix, b: &Matrix) -> Vec<Option<Matrix>> {
    let order = a.rows();
    Universe::new(processes)
        .unwrap()
        .run(|group| {
            let operands = (group.rank() == 0).then_some((a, b));
            fox_multiply(&group, operands, order)
        })
        .unwrap()
}

#[test]
fn test_matches_sequential_product() {
    let mut rng = StdRng::seed_from_u64(99);
    for (processes, order) in [(1, 5), (4, 6), (4, 8), (9, 9), (9, 12), (16, 8)] {
        let a = Matrix::random(order, order, &mut rng);
        let b = Matrix::random(order, order, &mut rng);
        let expected = a.matmul(&b);
        let results = run_fox(processes, &a, &b);
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

#[test]
fn test_non_symmetric_blocks() {
    // distinct values in every block catch a wrong pivot or shift direction
    let order = 6;
    let a = Matrix::from_vec(order, order, (0..36).map(|v| v as f64).collect()).unwrap();
    let b = Matrix::from_vec(order, order, (0..36).map(|v| (v * 7 % 11) as f64).collect()).unwrap();
    let results = run_fox(9, &a, &b);
    assert_eq!(results[0].as_ref().unwrap(), &a.matmul(&b));
}

#[test]
fn test_agrees_with_striped() {
    let mut rng = StdRng::seed_from_u64(5);
    let order = 12;
    let a = Matrix::random(order, order, &mut rng);
    let b = Matrix::random(order, order, &mut rng);
    let fox = run_fox(4, &a, &b).swap_remove(0).unwrap();
    let striped = Universe::new(4)
        .unwrap()
        .run(|group| {
            let operands = (group.rank() == 0).then_some((&a, &b));
            crate::kernels::striped::striped_multiply(&group, operands, order)
        })
        .unwrap()
        .swap_remove(0)
        .unwrap();
    assert!(fox.approx_eq(&striped));
}

#[test]
fn test_non_square_process_count_rejected() {
    let results = Universe::new(3)
        .unwrap()
        .run(|group| Ok(fox_multiply(&group, None, 6).err()))
        .unwrap();
    assert!(results
        .iter()
        .all(|e| matches!(e, Some(BenchError::InvalidTopology { processes: 3, dim: 1 }))));
}

#[test]
fn test_indivisible_order_rejected() {
    let results = Universe::new(4)
        .unwrap()
        .run(|group| Ok(fox_multiply(&group, None, 5).err()))
        .unwrap();
    assert!(results
        .iter()
        .all(|e| matches!(e, Some(BenchError::IndivisibleSize { order: 5, factor: 2 }))));
}

#[test]
fn test_check_layout() {
    assert_eq!(check_layout(9, 12).unwrap().block_size(), 4);
    assert!(check_layout(8, 8).is_err());
    assert!(check_layout(4, 7).is_err());
}
