use std::f64::consts::PI;

use nalgebra::DVector;
use rand::Rng;
use rand_distr::StandardNormal;

/// Univariate normal distribution, held as a location and a strictly
/// positive scale. Density evaluation is a pure function of the current
/// parameter pair; no state is mutated on read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normal {
    mean: f64,
    stddev: f64,
}

impl Normal {

    /// Builds the distribution from location and scale. The scale must be
    /// strictly positive; this is a precondition of every density call, so
    /// it is asserted here rather than re-checked on each evaluation.
    pub fn new(mean: f64, stddev: f64) -> Self {
        assert!(stddev > 0.0, "normal scale must be positive (got {})", stddev);
        Self { mean, stddev }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn stddev(&self) -> f64 {
        self.stddev
    }

    /// Density at a single point:
    /// (1 / (σ √(2π))) · exp(-½ ((x - μ)/σ)²).
    pub fn pdf(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.stddev;
        (-0.5 * z * z).exp() / (self.stddev * (2. * PI).sqrt())
    }

    /// Elementwise density over a sample vector.
    pub fn pdf_vec(&self, xs: &DVector<f64>) -> DVector<f64> {
        xs.map(|x| self.pdf(x))
    }

    /// Log-density at a single point, evaluated directly (not as ln ∘ pdf)
    /// so far-tail points do not underflow through the exponential.
    pub fn log_pdf(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.stddev;
        -0.5 * z * z - self.stddev.ln() - 0.5 * (2. * PI).ln()
    }

    /// Draws n independent realizations using the informed generator.
    pub fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> DVector<f64> {
        DVector::from_iterator(n, (0..n).map(|_| {
            let z: f64 = rng.sample(StandardNormal);
            self.mean + self.stddev * z
        }))
    }

}
