//! Single seeded PRNG stream shared by every stochastic decision in the kernel.
//!
//! Every call site that needs randomness (the channel model's shadowing term,
//! the p-CSMA coin, the initial phase jitter, the exponential generator's
//! inter-arrival draw) goes through one `SimRng` instance threaded via
//! `Simulation`. Re-running with the same seed, node set, and parameters
//! reproduces an identical run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub struct SimRng {
    inner: StdRng,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn uniform01(&mut self) -> f64 {
        self.inner.r#gen::<f64>()
    }

    /// Uniform integer draw in `[lo, hi]` (inclusive on both ends).
    pub fn uniform_int(&mut self, lo: u64, hi: u64) -> u64 {
        self.inner.gen_range(lo..=hi)
    }

    /// Sample `Normal(mean, sigma)`. Returns `mean` unchanged when `sigma <= 0`.
    pub fn gaussian(&mut self, mean: f64, sigma: f64) -> f64 {
        if sigma <= 0.0 {
            return mean;
        }
        let dist = Normal::new(mean, sigma).expect("invalid normal sigma");
        dist.sample(&mut self.inner)
    }

    /// Sample `Exp(1/mean)`, i.e. an exponential distribution with the given mean.
    pub fn exponential(&mut self, mean: f64) -> f64 {
        // Inverse-CDF sampling keeps this on the same uniform stream as every
        // other draw, instead of pulling in rand_distr's own RNG calls for a
        // distribution this simple.
        let u: f64 = self.inner.gen_range(f64::EPSILON..1.0);
        -mean * u.ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        for _ in 0..10 {
            assert_eq!(a.uniform01(), b.uniform01());
        }
    }

    #[test]
    fn different_seed_diverges() {
        let mut a = SimRng::new(1);
        let mut b = SimRng::new(2);
        let seq_a: Vec<f64> = (0..10).map(|_| a.uniform01()).collect();
        let seq_b: Vec<f64> = (0..10).map(|_| b.uniform01()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn exponential_draws_are_nonnegative() {
        let mut rng = SimRng::new(7);
        for _ in 0..100 {
            assert!(rng.exponential(10.0) >= 0.0);
        }
    }
}
