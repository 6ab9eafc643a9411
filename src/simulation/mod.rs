//! Simulation orchestration
//!
//! `SimulationRunner` validates the plan once, then runs projections:
//! a single deterministic trajectory, or a Monte-Carlo / historical
//! ensemble fanned out across threads with per-run derived seeds and
//! aggregated into percentile bands. Aggregation is order-independent,
//! so parallel completion order never changes the output.

pub mod history;
pub mod returns;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::plan::{validate_plan, Plan, PlanError, SimMode};
use crate::projection::{AnnualResult, MonthlyEngine, YearReturns};
use crate::tax::TaxTables;

pub use returns::{derive_run_seed, historical_returns, monte_carlo_returns, Rng};

/// Simulation failure
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("simulation cancelled")]
    Cancelled,
}

/// Overrides from the driver
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: Option<SimMode>,
    pub runs: Option<u32>,
    pub seed: Option<u64>,
}

/// One percentile track across runs, indexed by plan year
#[derive(Debug, Clone, Default, Serialize)]
pub struct BandSeries {
    pub p10: Vec<f64>,
    pub p25: Vec<f64>,
    pub p50: Vec<f64>,
    pub p75: Vec<f64>,
    pub p90: Vec<f64>,
}

/// Percentile bands for the aggregated annual series
#[derive(Debug, Clone, Serialize)]
pub struct PercentileBands {
    pub years: Vec<i32>,
    pub net_worth: BandSeries,
    pub income: BandSeries,
    pub expenses: BandSeries,
    pub taxes: BandSeries,
}

/// The per-year series one ensemble run contributes to aggregation
#[derive(Debug, Clone, Serialize)]
pub struct RunSeries {
    pub net_worth: Vec<f64>,
    pub income: Vec<f64>,
    pub expenses: Vec<f64>,
    pub taxes: Vec<f64>,
    pub ending_net_worth: f64,
    pub insolvent: bool,
}

impl RunSeries {
    fn from_annual(annual: &[AnnualResult]) -> Self {
        Self {
            net_worth: annual.iter().map(|a| a.net_worth_end).collect(),
            income: annual.iter().map(|a| a.income).collect(),
            expenses: annual.iter().map(|a| a.total_expenses()).collect(),
            taxes: annual.iter().map(|a| a.total_taxes()).collect(),
            ending_net_worth: annual.last().map(|a| a.net_worth_end).unwrap_or(0.0),
            insolvent: annual.iter().any(|a| a.insolvent),
        }
    }
}

/// Complete output of a simulation
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub mode: SimMode,
    /// Master seed used for ensemble draws
    pub seed: Option<u64>,
    /// Full annual detail; populated for the deterministic trajectory
    pub annual: Vec<AnnualResult>,
    /// Per-run aggregation series; populated for ensembles
    pub runs: Vec<RunSeries>,
    pub bands: Option<PercentileBands>,
    /// Fraction of runs ending with positive net worth
    pub success_rate: Option<f64>,
    pub insolvency_years: Vec<i32>,
}

/// Pre-validated runner holding the plan and its tax tables
pub struct SimulationRunner {
    plan: Plan,
    tables: TaxTables,
}

impl SimulationRunner {
    /// Validate and wrap a plan. Warnings are logged; any validation error
    /// refuses construction.
    pub fn new(plan: Plan) -> Result<Self, PlanError> {
        let validation = validate_plan(&plan);
        for warning in &validation.warnings {
            log::warn!("{warning}");
        }
        if !validation.is_valid() {
            return Err(PlanError::Invalid(validation.errors));
        }
        let tables = TaxTables::new(plan.plan_settings.inflation_rate);
        Ok(Self { plan, tables })
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn run(&self, options: &RunOptions) -> Result<SimulationResult, SimError> {
        self.run_with_cancel(options, &AtomicBool::new(false))
    }

    /// Run with a cooperative cancel flag, checked between runs and between
    /// simulated years. Cancellation discards partial results.
    pub fn run_with_cancel(
        &self,
        options: &RunOptions,
        cancel: &AtomicBool,
    ) -> Result<SimulationResult, SimError> {
        let mode = options.mode.unwrap_or(self.plan.simulation_settings.mode);
        match mode {
            SimMode::Deterministic => self.run_deterministic(cancel),
            SimMode::MonteCarlo | SimMode::Historical => self.run_ensemble(mode, options, cancel),
        }
    }

    fn horizon_years(&self) -> usize {
        (self.plan.plan_end().year - self.plan.plan_start().year + 1).max(0) as usize
    }

    fn run_deterministic(&self, cancel: &AtomicBool) -> Result<SimulationResult, SimError> {
        let annual = self.run_single(None, cancel)?;
        let insolvency_years = annual.iter().filter(|a| a.insolvent).map(|a| a.year).collect();
        Ok(SimulationResult {
            mode: SimMode::Deterministic,
            seed: None,
            annual,
            runs: Vec::new(),
            bands: None,
            success_rate: None,
            insolvency_years,
        })
    }

    fn run_ensemble(
        &self,
        mode: SimMode,
        options: &RunOptions,
        cancel: &AtomicBool,
    ) -> Result<SimulationResult, SimError> {
        let master_seed = options.seed.unwrap_or_else(|| {
            let seed = entropy_seed();
            log::info!("no seed supplied; using generated seed {seed}");
            seed
        });
        let num_runs = options
            .runs
            .unwrap_or(self.plan.simulation_settings.monte_carlo.num_simulations)
            .max(1);
        let years = self.horizon_years();

        let runs: Result<Vec<RunSeries>, SimError> = (0..num_runs)
            .into_par_iter()
            .map(|run_index| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(SimError::Cancelled);
                }
                let run_seed = derive_run_seed(master_seed, run_index);
                let draws = match mode {
                    SimMode::MonteCarlo => monte_carlo_returns(
                        &self.plan.simulation_settings.monte_carlo,
                        run_seed,
                        years,
                    ),
                    SimMode::Historical => historical_returns(
                        &self.plan.simulation_settings.historical,
                        run_seed,
                        years,
                    ),
                    SimMode::Deterministic => Vec::new(),
                };
                let annual = self.run_single(Some(&draws), cancel)?;
                Ok(RunSeries::from_annual(&annual))
            })
            .collect();
        let runs = runs?;

        let success_rate =
            runs.iter().filter(|r| r.ending_net_worth > 0.0).count() as f64 / runs.len() as f64;
        let insolvency_years = Vec::new();
        let bands = Some(self.aggregate_bands(&runs));

        Ok(SimulationResult {
            mode,
            seed: Some(master_seed),
            annual: Vec::new(),
            runs,
            bands,
            success_rate: Some(success_rate),
            insolvency_years,
        })
    }

    /// One full forward pass over the plan horizon
    fn run_single(
        &self,
        draws: Option<&[YearReturns]>,
        cancel: &AtomicBool,
    ) -> Result<Vec<AnnualResult>, SimError> {
        let engine = MonthlyEngine::new(&self.plan, &self.tables)?;
        let mut state = engine.initial_state();
        let start = self.plan.plan_start();
        let end = self.plan.plan_end();

        let mut annual: Vec<AnnualResult> = Vec::with_capacity(self.horizon_years());
        let mut current_year = AnnualResult::new(start.year);

        while state.current.index() <= end.index() {
            if state.current.year != current_year.year {
                if cancel.load(Ordering::Relaxed) {
                    return Err(SimError::Cancelled);
                }
                current_year.end_balances = state.balances.clone();
                let next_year = state.current.year;
                annual.push(std::mem::replace(&mut current_year, AnnualResult::new(next_year)));
            }

            let year_returns =
                draws.and_then(|d| d.get((state.current.year - start.year) as usize).copied());
            let (month, settlement) = engine.advance_month(&mut state, year_returns);
            current_year.absorb(month);
            if let Some(settlement) = settlement {
                current_year.settlement = Some(settlement);
            }
        }
        current_year.end_balances = state.balances.clone();
        annual.push(current_year);

        Ok(annual)
    }

    fn aggregate_bands(&self, runs: &[RunSeries]) -> PercentileBands {
        let years: Vec<i32> =
            (self.plan.plan_start().year..=self.plan.plan_end().year).collect();
        let band_for = |extract: fn(&RunSeries) -> &Vec<f64>| {
            let mut band = BandSeries::default();
            for year_index in 0..years.len() {
                let mut values: Vec<f64> = runs
                    .iter()
                    .map(|r| extract(r).get(year_index).copied().unwrap_or(0.0))
                    .collect();
                band.p10.push(percentile(&mut values, 10.0));
                band.p25.push(percentile(&mut values, 25.0));
                band.p50.push(percentile(&mut values, 50.0));
                band.p75.push(percentile(&mut values, 75.0));
                band.p90.push(percentile(&mut values, 90.0));
            }
            band
        };

        PercentileBands {
            years: years.clone(),
            net_worth: band_for(|r| &r.net_worth),
            income: band_for(|r| &r.income),
            expenses: band_for(|r| &r.expenses),
            taxes: band_for(|r| &r.taxes),
        }
    }
}

/// Linear-interpolated percentile; sorts in place
fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n == 1 {
        return values[0];
    }
    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}

/// Wall-clock entropy for unseeded ensembles; the chosen seed is logged so
/// the run can be reproduced
fn entropy_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5EED_5EED_5EED_5EED);
    returns::derive_run_seed(nanos, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::loader::parse_plan;

    fn household_plan() -> Plan {
        parse_plan(
            r#"{
            "people": {"primary": {"name": "Pat", "birthday": "1980-01", "state": "WA"}},
            "filing_status": "single",
            "accounts": [
                {"name": "Cash", "type": "cash", "owner": "primary", "balance": 50000,
                 "growth_rate": 0.0, "dividend_yield": 0.0, "dividend_tax_treatment": "tax_free",
                 "reinvest_dividends": false, "bond_allocation_percent": 100, "yearly_fees": 0.0,
                 "allow_withdrawals": true},
                {"name": "Brokerage", "type": "taxable_brokerage", "owner": "primary",
                 "balance": 400000, "cost_basis": 250000, "growth_rate": 0.06,
                 "dividend_yield": 0.015, "dividend_tax_treatment": "plan_settings",
                 "reinvest_dividends": true, "bond_allocation_percent": 30, "yearly_fees": 0.001,
                 "allow_withdrawals": true}
            ],
            "income": [
                {"name": "Salary", "owner": "primary", "amount": 12500, "frequency": "monthly",
                 "start_date": "start", "end_date": "2030-12", "change_over_time": "match_inflation",
                 "tax_handling": "withhold", "withhold_percent": 0.22}
            ],
            "expenses": [
                {"name": "Living", "owner": "primary", "amount": 9000, "frequency": "monthly",
                 "start_date": "start", "end_date": "end", "change_over_time": "match_inflation",
                 "spending_type": "essential"}
            ],
            "withdrawal_strategy": {"order": ["taxable_brokerage"], "use_account_specific": false,
                "rmd_satisfied_first": true},
            "simulation_settings": {
                "mode": "monte_carlo",
                "monte_carlo": {"num_simulations": 40, "stock_mean_return": 0.08,
                    "stock_std_dev": 0.15, "bond_mean_return": 0.04, "bond_std_dev": 0.05,
                    "correlation": 0.2}
            },
            "plan_settings": {"plan_start": "2026-01", "plan_end": "2035-12",
                "inflation_rate": 0.03, "default_dividend_tax_treatment": "capital_gains"}
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_deterministic_run_shape() {
        let runner = SimulationRunner::new(household_plan()).unwrap();
        let result = runner
            .run(&RunOptions { mode: Some(SimMode::Deterministic), ..Default::default() })
            .unwrap();
        assert_eq!(result.annual.len(), 10);
        assert_eq!(result.annual[0].months.len(), 12);
        assert!(result.bands.is_none());
        assert!(result.annual[0].settlement.is_some());
        assert!(result.annual.iter().all(|a| !a.insolvent));
        // Net worth grows through the salary years and stays positive after
        assert!(result.annual[4].net_worth_end > result.annual[0].net_worth_end);
        assert!(result.annual[9].net_worth_end > 0.0);
    }

    #[test]
    fn test_determinism_same_seed_identical_results() {
        let runner = SimulationRunner::new(household_plan()).unwrap();
        let options = RunOptions { runs: Some(10), seed: Some(42), ..Default::default() };
        let a = runner.run(&options).unwrap();
        let b = runner.run(&options).unwrap();
        let a_json = serde_json::to_string(&a).unwrap();
        let b_json = serde_json::to_string(&b).unwrap();
        assert_eq!(a_json, b_json);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let runner = SimulationRunner::new(household_plan()).unwrap();
        let a = runner
            .run(&RunOptions { runs: Some(5), seed: Some(1), ..Default::default() })
            .unwrap();
        let b = runner
            .run(&RunOptions { runs: Some(5), seed: Some(2), ..Default::default() })
            .unwrap();
        assert_ne!(
            serde_json::to_string(&a.runs).unwrap(),
            serde_json::to_string(&b.runs).unwrap()
        );
    }

    #[test]
    fn test_percentile_bands_are_monotonic() {
        let runner = SimulationRunner::new(household_plan()).unwrap();
        let result = runner
            .run(&RunOptions { runs: Some(40), seed: Some(7), ..Default::default() })
            .unwrap();
        let bands = result.bands.unwrap();
        for series in [&bands.net_worth, &bands.income, &bands.expenses, &bands.taxes] {
            for i in 0..bands.years.len() {
                assert!(series.p10[i] <= series.p25[i] + 1e-9);
                assert!(series.p25[i] <= series.p50[i] + 1e-9);
                assert!(series.p50[i] <= series.p75[i] + 1e-9);
                assert!(series.p75[i] <= series.p90[i] + 1e-9);
            }
        }
        let success = result.success_rate.unwrap();
        assert!((0.0..=1.0).contains(&success));
    }

    #[test]
    fn test_historical_mode_runs() {
        let mut plan = household_plan();
        plan.simulation_settings.mode = SimMode::Historical;
        let runner = SimulationRunner::new(plan).unwrap();
        let result = runner
            .run(&RunOptions { runs: Some(8), seed: Some(3), ..Default::default() })
            .unwrap();
        assert_eq!(result.mode, SimMode::Historical);
        assert_eq!(result.runs.len(), 8);
        assert_eq!(result.seed, Some(3));
    }

    #[test]
    fn test_cancellation_discards_results() {
        let runner = SimulationRunner::new(household_plan()).unwrap();
        let cancel = AtomicBool::new(true);
        let result = runner.run_with_cancel(
            &RunOptions { runs: Some(4), seed: Some(9), ..Default::default() },
            &cancel,
        );
        assert!(matches!(result, Err(SimError::Cancelled)));
    }

    #[test]
    fn test_invalid_plan_refused() {
        let mut plan = household_plan();
        plan.accounts.clear();
        assert!(SimulationRunner::new(plan).is_err());
    }

    #[test]
    fn test_percentile_interpolates() {
        let mut values = vec![1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&mut values, 25.0) - 1.75).abs() < 1e-12);
        assert!((percentile(&mut values, 50.0) - 2.5).abs() < 1e-12);
        let mut single = vec![5.0];
        assert_eq!(percentile(&mut single, 90.0), 5.0);
        let mut empty: Vec<f64> = Vec::new();
        assert_eq!(percentile(&mut empty, 50.0), 0.0);
    }
}
