use nalgebra::DVector;
use thiserror::Error;

/// Start-state derivation for the EM loop (seeded two-center split or
/// deterministic median split).
pub mod init;

pub use init::*;

/// The EM iterator itself, its parameter/result records and the
/// `fit_gmm2` convenience entry point.
pub mod em;

pub use em::*;

/// Failure modes of a single fit invocation. None of these are retried:
/// a failed fit is reported once, before any partial result is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {

    /// Rejected before the loop starts: empty or non-finite sample, zero
    /// epoch budget, or a non-positive start scale/tolerance.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A component's total responsibility vanished during an M-step, leaving
    /// its moment updates undefined. Only raised under
    /// [CollapsePolicy::Fail](crate::fit::CollapsePolicy).
    #[error("component {component} collapsed at epoch {epoch}: total responsibility near zero")]
    ComponentCollapse { component: usize, epoch: usize },

    /// The cancellation flag was observed set between iterations; `epoch` is
    /// the iteration that was about to run.
    #[error("fit cancelled before epoch {epoch}")]
    Cancelled { epoch: usize },

}

/// Trait shared by inference algorithms, parametrized by the summary they
/// produce. If the algorithm will not be called anymore, clone the summary
/// out of the posterior reference to take ownership of it.
pub trait Estimator<D> {

    /// Runs the algorithm over the informed sample, returning a reference
    /// to the fit summary on success.
    fn fit<'a>(&'a mut self, sample: &DVector<f64>) -> Result<&'a D, FitError>;

    /// If fit(.) has completed successfully at least once, returns the
    /// current summary without changing the algorithm state.
    fn posterior<'a>(&'a self) -> Option<&'a D>;

}
