use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::distr::Normal;
use super::init::{init_components, SIGMA_FLOOR};
use super::{Estimator, FitError};

/// Threshold under which a component's total responsibility is treated as
/// collapsed: its M-step moment updates divide by this sum.
const COLLAPSE_EPS: f64 = 1e-12;

/// Location, scale and mixing weight of one mixture component. The scale is
/// kept strictly positive and the two weights sum to one across every
/// M-step by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentParams {
    pub mean: f64,
    pub stddev: f64,
    pub weight: f64,
}

/// Terminal state of a fit: both component estimates plus the total sample
/// log-likelihood recorded after each completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub component1: ComponentParams,
    pub component2: ComponentParams,
    pub log_likelihoods: Vec<f64>,
}

impl FitResult {

    /// Final estimates for both components. Pure accessor; repeated calls
    /// return identical values.
    pub fn final_params(&self) -> (&ComponentParams, &ComponentParams) {
        (&self.component1, &self.component2)
    }

    /// Log-likelihood of the sample after each completed epoch, in epoch
    /// order. Under a correct EM update this is non-decreasing up to
    /// floating-point noise, but that is not enforced here.
    pub fn likelihood_trace(&self) -> &[f64] {
        &self.log_likelihoods
    }

}

/// What to do when a component's total responsibility vanishes during an
/// M-step (no point is assigned to it anymore).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollapsePolicy {
    /// Abort the fit with [FitError::ComponentCollapse]. Default; preferred
    /// for correctness-sensitive callers.
    Fail,
    /// Reset the collapsed component to the global sample moments with
    /// weight one half (the other weight renormalized) and keep iterating.
    Reinitialize,
}

/// Expectation-Maximization fit of a two-component univariate gaussian
/// mixture. Each epoch recomputes the posterior responsibilities of both
/// components for every point (E-step), re-estimates means, scales and
/// weights from them (M-step, the scale using the just-updated mean), and
/// appends the total log-likelihood under the updated parameters.
///
/// The loop always runs the full epoch budget: there is no convergence-based
/// early exit unless [with_tol](Self::with_tol) is set, which is the
/// documented default policy rather than a claim that it is optimal. EM
/// converges to a local maximum of the likelihood, so the start state chosen
/// by the initializer affects the outcome.
///
/// # References
/// Dempster, A. P., Laird, N. M., & Rubin, D. B.
/// ([1977](https://rss.onlinelibrary.wiley.com/doi/abs/10.1111/j.2517-6161.1977.tb01600.x)).
/// Maximum Likelihood from Incomplete Data Via the EM Algorithm.
/// Journal of the Royal Statistical Society: Series B, 39(1), 1–22.
pub struct ExpectMax {
    epochs: usize,
    seed: Option<u64>,
    policy: CollapsePolicy,
    tol: Option<f64>,
    cancel: Option<Arc<AtomicBool>>,
    result: Option<FitResult>,
}

impl ExpectMax {

    /// Builds an iterator with the informed epoch budget, no seed (median
    /// split initialization), the failing collapse policy, no early stop
    /// and no cancellation flag.
    pub fn new(epochs: usize) -> Self {
        Self {
            epochs,
            seed: None,
            policy: CollapsePolicy::Fail,
            tol: None,
            cancel: None,
            result: None,
        }
    }

    /// Seeds the initializer, switching it to the two-center split.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_policy(mut self, policy: CollapsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enables an optional early stop: iteration ends once the relative
    /// log-likelihood improvement between consecutive epochs falls below
    /// `tol`. Off by default, preserving the fixed-count behavior.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }

    /// Registers a cooperative cancellation flag, checked once per epoch
    /// before the E-step. A set flag aborts the fit with
    /// [FitError::Cancelled].
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn run(&self, x: &DVector<f64>) -> Result<FitResult, FitError> {
        if x.len() == 0 {
            return Err(FitError::InvalidInput("sample is empty".into()));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(FitError::InvalidInput("sample contains non-finite values".into()));
        }
        if self.epochs == 0 {
            return Err(FitError::InvalidInput("epoch budget must be positive".into()));
        }
        if let Some(tol) = self.tol {
            if !(tol > 0.0) {
                return Err(FitError::InvalidInput("tolerance must be positive".into()));
            }
        }
        let [mut c1, mut c2] = init_components(x, self.seed);
        if c1.stddev <= 0.0 || c2.stddev <= 0.0 {
            return Err(FitError::InvalidInput("initial stddev must be positive".into()));
        }
        let mut trace = Vec::with_capacity(self.epochs);
        for epoch in 0..self.epochs {
            if let Some(ref flag) = self.cancel {
                if flag.load(Ordering::Relaxed) {
                    return Err(FitError::Cancelled { epoch });
                }
            }
            let gamma1 = expectation_step(x, &c1, &c2);
            maximization_step(x, &gamma1, &mut c1, &mut c2, self.policy, epoch)?;
            let ll = log_likelihood(x, &c1, &c2);
            trace.push(ll);
            if let Some(tol) = self.tol {
                if trace.len() > 1 {
                    let prev = trace[trace.len() - 2];
                    if (ll - prev).abs() / prev.abs().max(1.0) < tol {
                        break;
                    }
                }
            }
        }
        Ok(FitResult { component1: c1, component2: c2, log_likelihoods: trace })
    }

}

impl Estimator<FitResult> for ExpectMax {

    fn fit<'a>(&'a mut self, sample: &DVector<f64>) -> Result<&'a FitResult, FitError> {
        let res = self.run(sample)?;
        self.result = None;
        Ok(self.result.get_or_insert(res))
    }

    fn posterior<'a>(&'a self) -> Option<&'a FitResult> {
        self.result.as_ref()
    }

}

/// Fits the mixture over the informed sample with the default collapse
/// policy and no early stop, running exactly `num_epochs` iterations. A
/// seed switches initialization from the median split to the seeded
/// two-center split.
pub fn fit_gmm2(sample: &[f64], num_epochs: usize, seed: Option<u64>) -> Result<FitResult, FitError> {
    let x = DVector::from_column_slice(sample);
    let mut em = ExpectMax::new(num_epochs);
    if let Some(s) = seed {
        em = em.with_seed(s);
    }
    em.run(&x)
}

/// Posterior responsibility of component 1 for every sample point;
/// component 2's responsibility is the complement. Per-point totals are
/// floored at the smallest positive double before normalizing, so a point
/// far in the tails of both components yields a defined (one-sided)
/// responsibility instead of 0/0.
fn expectation_step(x: &DVector<f64>, c1: &ComponentParams, c2: &ComponentParams) -> DVector<f64> {
    let n1 = Normal::new(c1.mean, c1.stddev);
    let n2 = Normal::new(c2.mean, c2.stddev);
    x.map(|xi| {
        let g1 = c1.weight * n1.pdf(xi);
        let g2 = c2.weight * n2.pdf(xi);
        g1 / (g1 + g2).max(f64::MIN_POSITIVE)
    })
}

/// Re-estimates both components from the responsibilities, then the weights
/// as average responsibilities (which sum to one by construction). If either
/// component was reset by [CollapsePolicy::Reinitialize], weights restart at
/// one half instead of the stale responsibility averages.
fn maximization_step(
    x: &DVector<f64>,
    gamma1: &DVector<f64>,
    c1: &mut ComponentParams,
    c2: &mut ComponentParams,
    policy: CollapsePolicy,
    epoch: usize,
) -> Result<(), FitError> {
    let gamma2 = gamma1.map(|g| 1.0 - g);
    let reset1 = update_component(x, gamma1, c1, 1, policy, epoch)?;
    let reset2 = update_component(x, &gamma2, c2, 2, policy, epoch)?;
    if reset1 || reset2 {
        c1.weight = 0.5;
        c2.weight = 0.5;
    } else {
        c1.weight = gamma1.sum() / x.len() as f64;
        c2.weight = 1.0 - c1.weight;
    }
    Ok(())
}

/// Weighted moment update of one component. The scale uses the mean updated
/// in this same step and is clamped at [SIGMA_FLOOR]. Returns whether the
/// component was reinitialized instead of updated.
fn update_component(
    x: &DVector<f64>,
    gamma: &DVector<f64>,
    c: &mut ComponentParams,
    index: usize,
    policy: CollapsePolicy,
    epoch: usize,
) -> Result<bool, FitError> {
    let total = gamma.sum();
    if total < COLLAPSE_EPS {
        return match policy {
            CollapsePolicy::Fail => Err(FitError::ComponentCollapse { component: index, epoch }),
            CollapsePolicy::Reinitialize => {
                let n = x.len() as f64;
                let mean = x.sum() / n;
                let var = x.map(|v| (v - mean).powi(2)).sum() / n;
                c.mean = mean;
                c.stddev = var.sqrt().max(SIGMA_FLOOR);
                Ok(true)
            }
        };
    }
    let mean = gamma.dot(x) / total;
    let var = x.zip_map(gamma, |xi, g| g * (xi - mean).powi(2)).sum() / total;
    c.mean = mean;
    c.stddev = var.sqrt().max(SIGMA_FLOOR);
    Ok(false)
}

/// Total log-likelihood of the sample under the informed mixture, with the
/// same underflow floor as the E-step inside the logarithm.
fn log_likelihood(x: &DVector<f64>, c1: &ComponentParams, c2: &ComponentParams) -> f64 {
    let n1 = Normal::new(c1.mean, c1.stddev);
    let n2 = Normal::new(c2.mean, c2.stddev);
    x.iter()
        .map(|&xi| {
            let p = c1.weight * n1.pdf(xi) + c2.weight * n2.pdf(xi);
            p.max(f64::MIN_POSITIVE).ln()
        })
        .sum()
}
