use std::f64;

/// Transforms a raw exchange rate into its shortest-path weight.
///
/// Maximizing a product of rates is equivalent to minimizing the sum of
/// `-log2(rate)` weights, which lets an all-pairs shortest-path closure
/// operate on the graph. Non-positive rates have no valid logarithm and
/// map to `+infinity`, i.e. "no edge".
pub fn log2_weight(rate: f64) -> f64 {
    if rate > 0.0 { -rate.log2() } else { f64::INFINITY }
}

/// Inverts the log transform: recovers the rate product from an accumulated
/// log distance (`2^(-distance)`).
pub fn rate_from_distance(distance: f64) -> f64 {
    (-distance).exp2()
}

/// Multiplies the raw rates along `path` through the adjacency `matrix`.
///
/// Used by tests and cross-checks to confirm that a reconstructed path's
/// reported rate matches the actual edge products. Returns `None` if the
/// path steps over a missing edge (sentinel `< 0`) or an out-of-bounds
/// index.
pub fn path_product(matrix: &[Vec<f64>], path: &[usize]) -> Option<f64> {
    let mut product = 1.0;
    for pair in path.windows(2) {
        let rate = *matrix.get(pair[0])?.get(pair[1])?;
        if rate < 0.0 {
            return None;
        }
        product *= rate;
    }
    Some(product)
}

#[cfg(test)]
mod numeric_tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn assert_approx_eq(a: f64, b: f64) {
        assert!(
            (a - b).abs() < TOLERANCE,
            "{} is not approximately equal to {}",
            a,
            b
        );
    }

    #[test]
    fn log2_weight_round_trips_through_distance() {
        for rate in [0.25, 0.5, 1.0, 2.0, 6.0] {
            assert_approx_eq(rate_from_distance(log2_weight(rate)), rate);
        }
    }

    #[test]
    fn unit_rate_has_zero_weight() {
        assert_eq!(log2_weight(1.0), 0.0);
        assert_eq!(rate_from_distance(0.0), 1.0);
    }

    #[test]
    fn rate_above_one_has_negative_weight() {
        assert!(log2_weight(2.0) < 0.0);
        assert!(log2_weight(0.5) > 0.0);
    }

    #[test]
    fn non_positive_rate_maps_to_no_edge() {
        assert_eq!(log2_weight(0.0), f64::INFINITY);
        assert_eq!(log2_weight(-1.0), f64::INFINITY);
    }

    #[test]
    fn path_product_multiplies_edges_in_order() {
        let matrix = vec![
            vec![1.0, 2.0, -1.0],
            vec![-1.0, 1.0, 3.0],
            vec![0.1, -1.0, 1.0],
        ];

        let product = path_product(&matrix, &[0, 1, 2]).unwrap();
        assert_approx_eq(product, 6.0);
    }

    #[test]
    fn path_product_rejects_missing_edges() {
        let matrix = vec![vec![1.0, -1.0], vec![-1.0, 1.0]];
        assert!(path_product(&matrix, &[0, 1]).is_none());
    }

    #[test]
    fn trivial_paths_have_unit_product() {
        let matrix = vec![vec![1.0]];
        assert_eq!(path_product(&matrix, &[0]), Some(1.0));
        assert_eq!(path_product(&matrix, &[]), Some(1.0));
    }
}
