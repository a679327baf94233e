//! Property-based invariants of the estimation engine.

use mezcla::prelude::*;
use proptest::prelude::*;

fn binary_matrix(n_rows: usize, n_cols: usize) -> impl Strategy<Value = Matrix<f64>> {
    prop::collection::vec(prop::bool::ANY, n_rows * n_cols).prop_map(move |bits| {
        let data: Vec<f64> = bits.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
        Matrix::from_vec(n_rows, n_cols, data).expect("strategy length matches shape")
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Responsibility rows are simplex points for any binary input.
    #[test]
    fn responsibilities_sum_to_one(
        x in binary_matrix(12, 3),
        n_components in 1usize..4,
        seed in 0u64..1000,
    ) {
        let mut model = LatentMixture::new(n_components, "bernoulli")
            .with_max_iter(30)
            .with_random_state(seed);
        model.fit(&x, None).expect("bernoulli fit succeeds on binary data");

        let resp = model.predict_proba(&x, None);
        for i in 0..x.n_rows() {
            let sum: f64 = (0..n_components).map(|c| resp.get(i, c)).sum();
            prop_assert!((sum - 1.0).abs() < 1e-8, "row {} sums to {}", i, sum);
        }
    }

    /// Fitted probability tables stay strictly inside the clip bound, even
    /// when a feature is constant.
    #[test]
    fn probability_tables_stay_clipped(
        x in binary_matrix(10, 4),
        seed in 0u64..1000,
    ) {
        let mut model = LatentMixture::new(2, "bernoulli")
            .with_max_iter(30)
            .with_random_state(seed);
        model.fit(&x, None).expect("bernoulli fit succeeds on binary data");

        match model.get_parameters().measurement {
            EmissionParameters::Bernoulli { pis } => {
                for k in 0..pis.n_rows() {
                    for c in 0..pis.n_cols() {
                        let p = pis.get(k, c);
                        prop_assert!(p > 0.0 && p < 1.0);
                        prop_assert!(p.ln().is_finite());
                        prop_assert!((1.0 - p).ln().is_finite());
                    }
                }
            }
            other => prop_assert!(false, "unexpected bundle {}", other.family()),
        }
    }

    /// Class weights always sum to one.
    #[test]
    fn class_weights_sum_to_one(
        x in binary_matrix(15, 3),
        n_components in 1usize..5,
        seed in 0u64..1000,
    ) {
        let mut model = LatentMixture::new(n_components, "bernoulli")
            .with_max_iter(30)
            .with_random_state(seed);
        model.fit(&x, None).expect("bernoulli fit succeeds on binary data");
        prop_assert!((model.weights().sum() - 1.0).abs() < 1e-8);
    }

    /// Modal assignment of any simplex matrix is one-hot.
    #[test]
    fn modal_assignment_is_one_hot(
        raw in prop::collection::vec(0.01f64..1.0, 8 * 3),
    ) {
        let mut data = raw;
        for i in 0..8 {
            let total: f64 = data[i * 3..(i + 1) * 3].iter().sum();
            for v in &mut data[i * 3..(i + 1) * 3] {
                *v /= total;
            }
        }
        let resp = Matrix::from_vec(8, 3, data).expect("valid matrix");
        let hard = modal(&resp);
        for i in 0..8 {
            let row_sum: f64 = (0..3).map(|c| hard.get(i, c)).sum();
            prop_assert!((row_sum - 1.0).abs() < 1e-12);
            for c in 0..3 {
                let v = hard.get(i, c);
                prop_assert!(v == 0.0 || v == 1.0);
            }
        }
    }

    /// identify_coef always leaves a zero column in the first row, and the
    /// shift preserves pairwise differences.
    #[test]
    fn identify_coef_preserves_differences(
        raw in prop::collection::vec(-10.0f64..10.0, 2 * 3),
    ) {
        let coef = Matrix::from_vec(2, 3, raw).expect("valid matrix");
        let fixed = identify_coef(&coef);

        let zero_cols = (0..3).filter(|&c| fixed.get(0, c).abs() < 1e-9).count();
        prop_assert!(zero_cols >= 1);

        for i in 0..2 {
            for a in 0..3 {
                for b in 0..3 {
                    let before = coef.get(i, a) - coef.get(i, b);
                    let after = fixed.get(i, a) - fixed.get(i, b);
                    prop_assert!((before - after).abs() < 1e-9);
                }
            }
        }
    }
}
