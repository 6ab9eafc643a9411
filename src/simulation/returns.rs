//! Seed-stable return generation for ensemble modes
//!
//! Reproducibility across platforms is part of the contract, so the
//! generator is specified here rather than delegated to a library: an
//! xorshift64* stream seeded per run via splitmix64, with standard normal
//! variates from the Box-Muller transform. The same master seed always
//! yields the same draws for the same run index, regardless of how runs
//! are scheduled across threads.

use crate::plan::{HistoricalSettings, MonteCarloSettings};
use crate::projection::YearReturns;

use super::history;

/// splitmix64 finalizer, used for seed derivation
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Sub-seed for one run of an ensemble
pub fn derive_run_seed(master_seed: u64, run_index: u32) -> u64 {
    splitmix64(master_seed ^ ((run_index as u64) << 32) ^ run_index as u64)
}

/// xorshift64* stream with Box-Muller normal variates
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
    cached_normal: Option<f64>,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0xA5A5_A5A5_A5A5_A5A5 } else { seed };
        Self { state, cached_normal: None }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform in (0, 1) with 53 bits of precision
    pub fn next_f64(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }

    /// Standard normal via Box-Muller; the paired variate is cached
    pub fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.cached_normal.take() {
            return z;
        }
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        self.cached_normal = Some(r * theta.sin());
        r * theta.cos()
    }
}

/// Correlated stock/bond draws for every simulated year of one run:
/// `stock = mu_s + sigma_s z1`, `bond = mu_b + sigma_b (rho z1 + sqrt(1 - rho^2) z2)`
pub fn monte_carlo_returns(settings: &MonteCarloSettings, seed: u64, years: usize) -> Vec<YearReturns> {
    let mut rng = Rng::new(seed);
    let rho = settings.correlation.clamp(-1.0, 1.0);
    let orthogonal = (1.0 - rho * rho).sqrt();

    (0..years)
        .map(|_| {
            let z1 = rng.standard_normal();
            let z2 = rng.standard_normal();
            let stock = settings.stock_mean_return + settings.stock_std_dev * z1;
            let bond = settings.bond_mean_return + settings.bond_std_dev * (rho * z1 + orthogonal * z2);
            // Floor at total loss; outlier draws cannot take a balance negative
            YearReturns { stock: stock.max(-0.95), bond: bond.max(-0.95) }
        })
        .collect()
}

/// Historical draws for one run: a rolling window from a uniformly chosen
/// start year (wrapping inside the configured range), or independent annual
/// draws with replacement
pub fn historical_returns(settings: &HistoricalSettings, seed: u64, years: usize) -> Vec<YearReturns> {
    let mut rng = Rng::new(seed);
    let start_year = settings.start_year.max(history::FIRST_YEAR);
    let end_year = settings.end_year.min(history::LAST_YEAR);
    let span = (end_year - start_year + 1).max(1) as u64;

    let year_at = |offset: u64| start_year + (offset % span) as i32;
    let sample = |year: i32| {
        let (stock, bond) = history::returns_for_year(year).unwrap_or((0.0, 0.0));
        YearReturns { stock, bond }
    };

    if settings.use_rolling_periods {
        let window_start = rng.next_u64() % span;
        (0..years).map(|i| sample(year_at(window_start + i as u64))).collect()
    } else {
        (0..years).map(|_| sample(year_at(rng.next_u64()))).collect()
    }
}
