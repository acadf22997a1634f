/// Univariate normal distribution: density evaluation (scalar and vectorized)
/// and sampling.
pub mod distr;

/// Expectation-Maximization fit of a two-component univariate gaussian
/// mixture: initialization strategies, the EM iterator and its fit summary.
pub mod fit;
