use approx::assert_abs_diff_eq;
use faer::Side;
use lmi_pencil::linalg::faer_ndarray::FaerEigh;
use lmi_pencil::{ExtremalEigenOracle, Lmi, LmiError, MatrixPencil};
use ndarray::{Array1, Array2, ArrayView2, array};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

fn random_symmetric(rng: &mut StdRng, m: usize, scale: f64) -> Array2<f64> {
    let mut a = Array2::<f64>::zeros((m, m));
    for i in 0..m {
        for j in i..m {
            let v = rng.random_range(-scale..scale);
            a[[i, j]] = v;
            a[[j, i]] = v;
        }
    }
    a
}

/// Pencil with `A0 = -shift·I + noise`, so points near the origin are mostly feasible
/// and points far away mostly are not.
fn shifted_pencil(rng: &mut StdRng, m: usize, d: usize, shift: f64) -> Lmi {
    let mut matrices = Vec::with_capacity(d + 1);
    let mut a0 = random_symmetric(rng, m, 0.5);
    for i in 0..m {
        a0[[i, i]] -= shift;
    }
    matrices.push(a0);
    for _ in 0..d {
        matrices.push(random_symmetric(rng, m, 1.0));
    }
    Lmi::new(matrices).expect("valid pencil")
}

fn max_eigenvalue(matrix: &Array2<f64>) -> f64 {
    let (values, _) = matrix.eigh(Side::Lower).expect("eigh");
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn determinant(matrix: &Array2<f64>) -> f64 {
    let (values, _) = matrix.eigh(Side::Lower).expect("eigh");
    values.iter().product()
}

#[test]
fn worked_two_by_two_scenario() {
    let lmi = Lmi::new(vec![
        array![[0.0, 0.0], [0.0, 0.0]],
        array![[1.0, 0.0], [0.0, -1.0]],
        array![[0.0, 1.0], [1.0, 0.0]],
    ])
    .unwrap();

    let x = array![1.0, 0.0];
    assert_eq!(lmi.evaluate(x.view()).unwrap(), array![[1.0, 0.0], [0.0, -1.0]]);
    assert!(!lmi.is_negative_semidefinite(x.view()).unwrap());

    let x = array![-1.0, 0.0];
    assert_eq!(lmi.evaluate(x.view()).unwrap(), array![[-1.0, 0.0], [0.0, 1.0]]);
    assert!(!lmi.is_negative_semidefinite(x.view()).unwrap());

    // The origin sits on the boundary: the zero matrix is negative semidefinite.
    assert!(lmi.is_negative_semidefinite(array![0.0, 0.0].view()).unwrap());
}

#[test]
fn membership_agrees_with_reference_eigendecomposition() {
    let mut rng = StdRng::seed_from_u64(20261018);
    let mut feasible = 0usize;
    let mut infeasible = 0usize;
    for &(m, d) in &[(2usize, 1usize), (4, 3), (8, 5), (15, 10)] {
        let lmi = shifted_pencil(&mut rng, m, d, 2.0);
        for _ in 0..25 {
            let radius: f64 = rng.random_range(0.05..3.0);
            let x: Array1<f64> =
                Array1::from_shape_fn(d, |_| rng.random_range(-radius..radius));
            let reference = lmi.evaluate_without_a0_naive(x.view()).unwrap() + &lmi.matrices()[0];
            let expected = max_eigenvalue(&reference) <= 0.0;
            let got = lmi.is_negative_semidefinite(x.view()).unwrap();
            assert_eq!(got, expected, "m={m} d={d} x={x}");
            if got {
                feasible += 1;
            } else {
                infeasible += 1;
            }
        }
    }
    assert!(feasible > 0 && infeasible > 0, "{feasible} feasible, {infeasible} infeasible");
}

#[test]
fn matrix_membership_uses_the_maximum_eigenvalue() {
    let lmi = Lmi::new(vec![Array2::<f64>::zeros((3, 3))]).unwrap();
    let mostly_negative = array![[-5.0, 0.0, 0.0], [0.0, -4.0, 0.0], [0.0, 0.0, 0.1]];
    assert!(!lmi.is_negative_semidefinite_matrix(mostly_negative.view()).unwrap());
    let negative = array![[-5.0, 0.0, 0.0], [0.0, -4.0, 0.0], [0.0, 0.0, 0.0]];
    assert!(lmi.is_negative_semidefinite_matrix(negative.view()).unwrap());
}

#[test]
fn custom_oracle_decides_membership() {
    struct AlwaysFeasible;
    impl ExtremalEigenOracle for AlwaysFeasible {
        fn max_eigenvalue(&self, _: ArrayView2<'_, f64>) -> Result<f64, LmiError> {
            Ok(-1.0)
        }
    }
    let lmi = Lmi::new(vec![Array2::<f64>::eye(2)]).unwrap();
    let empty = Array1::<f64>::zeros(0);
    assert!(!lmi.is_negative_semidefinite(empty.view()).unwrap());
    assert!(lmi.is_negative_semidefinite_with(&AlwaysFeasible, empty.view()).unwrap());
}

#[test]
fn batch_feasibility_matches_pointwise_checks() {
    let mut rng = StdRng::seed_from_u64(5);
    let lmi = shifted_pencil(&mut rng, 6, 4, 1.5);
    let points: Vec<Array1<f64>> = (0..40)
        .map(|_| Array1::from_shape_fn(4, |_| rng.random_range(-2.0..2.0)))
        .collect();
    let batch = lmi.feasibility_batch(&points);
    assert_eq!(batch.len(), points.len());
    for (point, result) in points.iter().zip(batch) {
        assert_eq!(
            result.unwrap(),
            lmi.is_negative_semidefinite(point.view()).unwrap()
        );
    }

    let bad = vec![Array1::<f64>::zeros(3)];
    assert!(matches!(
        lmi.feasibility_batch(&bad)[0],
        Err(LmiError::DimensionMismatch { .. })
    ));
}

#[test]
fn boundary_gradient_follows_the_determinant() {
    let mut rng = StdRng::seed_from_u64(77);
    let (m, d) = (4usize, 3usize);
    let coefficients: Vec<Array2<f64>> = (0..d)
        .map(|_| random_symmetric(&mut rng, m, 1.0))
        .collect();
    let p: Array1<f64> = Array1::from_shape_fn(d, |_| rng.random_range(-1.0..1.0));

    // pencil(p) = -(I - e e'), singular with kernel e.
    let raw: Array1<f64> = Array1::from_shape_fn(m, |_| rng.random_range(-1.0..1.0));
    let e = &raw / raw.dot(&raw).sqrt();
    let mut boundary = Array2::<f64>::eye(m);
    for i in 0..m {
        for j in 0..m {
            boundary[[i, j]] -= e[i] * e[j];
        }
    }
    let mut a0 = -boundary;
    for (pi, a) in p.iter().zip(&coefficients) {
        a0.scaled_add(-pi, a);
    }
    // Remove roundoff asymmetry from the subtraction chain.
    let a0 = (&a0 + &a0.t()) * 0.5;

    let mut matrices = vec![a0];
    matrices.extend(coefficients);
    let lmi = Lmi::new(matrices).unwrap();

    let at_p = lmi.evaluate(p.view()).unwrap();
    assert!(at_p.dot(&e).iter().all(|v| v.abs() < 1e-10));
    assert!(lmi.is_negative_semidefinite(p.view()).unwrap() || max_eigenvalue(&at_p) < 1e-10);

    let gradient = lmi.normalized_determinant_gradient(p.view(), e.view()).unwrap();
    assert_abs_diff_eq!(gradient.dot(&gradient).sqrt(), 1.0, epsilon = 1e-12);

    let h = 1e-6;
    let mut fd = Array1::<f64>::zeros(d);
    for i in 0..d {
        let mut plus = p.clone();
        plus[i] += h;
        let mut minus = p.clone();
        minus[i] -= h;
        fd[i] = (determinant(&lmi.evaluate(plus.view()).unwrap())
            - determinant(&lmi.evaluate(minus.view()).unwrap()))
            / (2.0 * h);
    }
    let fd = &fd / fd.dot(&fd).sqrt();
    // det'(p) = adj(pencil(p)) : A_i, and adj is a signed multiple of e e'.
    let sign = fd.dot(&gradient).signum();
    for i in 0..d {
        assert_abs_diff_eq!(fd[i], sign * gradient[i], epsilon = 1e-5);
    }
}

#[test]
fn gradient_with_orthogonal_kernel_vector_is_degenerate() {
    let lmi = Lmi::new(vec![
        Array2::<f64>::zeros((2, 2)),
        array![[0.0, 0.0], [0.0, 1.0]],
        array![[0.0, 0.0], [0.0, -3.0]],
    ])
    .unwrap();
    assert!(matches!(
        lmi.normalized_determinant_gradient(array![0.0, 0.0].view(), array![1.0, 0.0].view()),
        Err(LmiError::DegenerateGradient)
    ));
}
