//! Seeded exponential variates

use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Exponentially distributed draws with a fixed rate, reproducible per seed
#[derive(Debug, Clone)]
pub struct Exponential {
    rate: f64,
    rng: StdRng,
}

impl Exponential {
    pub fn new(rate: f64, seed: u64) -> Result<Self> {
        ensure!(rate.is_finite() && rate > 0.0, "exponential rate must be positive, got {rate}");
        Ok(Self {
            rate,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Next draw by inversion; `1 - u` lies in (0, 1] so the log is finite
    pub fn sample(&mut self) -> f64 {
        let u: f64 = self.rng.gen();
        -(1.0 - u).ln() / self.rate
    }
}
