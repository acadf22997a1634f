use anyhow::Result;
use mixem::distr::Normal;
use mixem::fit::fit_gmm2;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> Result<()> {
    // Two gaussian sub-populations, concatenated into one unlabeled sample.
    let mut rng = StdRng::seed_from_u64(42);
    let first = Normal::new(2.0, 1.0).sample(2000, &mut rng);
    let second = Normal::new(-1.0, 1.5).sample(6000, &mut rng);
    let sample: Vec<f64> = first.iter().chain(second.iter()).copied().collect();

    let fit = fit_gmm2(&sample, 1000, Some(7))?;
    let (c1, c2) = fit.final_params();
    println!("N1 ~ ({:.4}, {:.4}), weight {:.4}", c1.mean, c1.stddev, c1.weight);
    println!("N2 ~ ({:.4}, {:.4}), weight {:.4}", c2.mean, c2.stddev, c2.weight);
    if let Some(ll) = fit.likelihood_trace().last() {
        println!("log-likelihood after {} epochs: {:.4}", fit.likelihood_trace().len(), ll);
    }
    println!("{}", serde_json::to_string_pretty(&fit)?);
    Ok(())
}
