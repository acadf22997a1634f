use std::cmp::Ordering;

use nalgebra::DVector;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::em::ComponentParams;

/// Smallest admissible component scale. Initializer and M-step estimates are
/// clamped here so the density evaluator precondition (stddev > 0) holds even
/// for degenerate samples where a sub-population variance vanishes.
pub const SIGMA_FLOOR: f64 = 1e-6;

/// Derives a start state for the EM loop from the raw (unlabeled) sample.
///
/// With a seed, two centers are drawn from the data k-means++ style (first
/// uniformly, second with probability proportional to squared distance from
/// the first) and each point is assigned to the nearer center. Without a
/// seed the sorted sample is split at its median. Either way the returned
/// pair has weights summing to one and both scales strictly positive.
///
/// The sample must be non-empty; the fit entry points reject empty samples
/// before calling this.
pub fn init_components(x: &DVector<f64>, seed: Option<u64>) -> [ComponentParams; 2] {
    match seed {
        Some(s) => seeded_split(x, s),
        None => median_split(x),
    }
}

fn seeded_split(x: &DVector<f64>, seed: u64) -> [ComponentParams; 2] {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = x.len();
    let first = rng.gen_range(0, n);
    let sq_dist: Vec<f64> = x.iter().map(|v| (v - x[first]).powi(2)).collect();
    let second = match WeightedIndex::new(&sq_dist) {
        Ok(w) => w.sample(&mut rng),
        // Every point coincides with the first center; any other index works.
        Err(_) => (first + 1) % n,
    };
    let (c1, c2) = (x[first], x[second]);
    let mut low = Vec::with_capacity(n);
    let mut high = Vec::with_capacity(n);
    for &v in x.iter() {
        if (v - c1).abs() <= (v - c2).abs() {
            low.push(v);
        } else {
            high.push(v);
        }
    }
    components_from_halves(&low, &high)
}

fn median_split(x: &DVector<f64>) -> [ComponentParams; 2] {
    let mut sorted: Vec<f64> = x.iter().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = (sorted.len() / 2).max(1);
    let (low, high) = sorted.split_at(mid);
    components_from_halves(low, high)
}

/// Moment estimates (mean, clamped stddev) of one sub-sample.
fn moments(vals: &[f64]) -> (f64, f64) {
    let n = vals.len() as f64;
    let mean = vals.iter().sum::<f64>() / n;
    let var = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt().max(SIGMA_FLOOR))
}

fn components_from_halves(low: &[f64], high: &[f64]) -> [ComponentParams; 2] {
    // A half only comes back empty for constant or single-point samples;
    // both components then start at the global moments with equal weight.
    if low.is_empty() || high.is_empty() {
        let merged: Vec<f64> = low.iter().chain(high.iter()).copied().collect();
        let (mean, stddev) = moments(&merged);
        let c = ComponentParams { mean, stddev, weight: 0.5 };
        return [c.clone(), c];
    }
    let n = (low.len() + high.len()) as f64;
    let (mean1, stddev1) = moments(low);
    let (mean2, stddev2) = moments(high);
    let weight1 = low.len() as f64 / n;
    [
        ComponentParams { mean: mean1, stddev: stddev1, weight: weight1 },
        ComponentParams { mean: mean2, stddev: stddev2, weight: 1.0 - weight1 },
    ]
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn median_split_separates_clusters() {
        let x = DVector::from_column_slice(&[0.0, 0.1, -0.1, 10.0, 9.9, 10.1]);
        let [c1, c2] = init_components(&x, None);
        assert!((c1.mean - 0.0).abs() < 0.2);
        assert!((c2.mean - 10.0).abs() < 0.2);
        assert!((c1.weight + c2.weight - 1.0).abs() < 1e-12);
        assert!(c1.stddev > 0.0 && c2.stddev > 0.0);
    }

    #[test]
    fn seeded_split_is_reproducible_and_valid() {
        let x = DVector::from_column_slice(&[1.0, 2.0, 3.0, -4.0, -5.0, -6.0, 0.5]);
        let a = init_components(&x, Some(11));
        let b = init_components(&x, Some(11));
        assert_eq!(a, b);
        for c in &a {
            assert!(c.stddev >= SIGMA_FLOOR);
            assert!(c.weight > 0.0 && c.weight < 1.0);
        }
        assert!((a[0].weight + a[1].weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_sample_falls_back_to_global_moments() {
        let x = DVector::from_element(20, 5.0);
        for seed in [None, Some(3u64)].iter() {
            let [c1, c2] = init_components(&x, *seed);
            assert!((c1.mean - 5.0).abs() < 1e-12);
            assert!((c2.mean - 5.0).abs() < 1e-12);
            assert!(c1.stddev >= SIGMA_FLOOR && c2.stddev >= SIGMA_FLOOR);
            assert!((c1.weight + c2.weight - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn single_point_sample_is_valid() {
        let x = DVector::from_element(1, -2.5);
        let [c1, c2] = init_components(&x, None);
        assert!((c1.mean + 2.5).abs() < 1e-12);
        assert_eq!(c1, c2);
        assert!(c1.stddev >= SIGMA_FLOOR);
    }

}
