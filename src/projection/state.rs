//! Mutable simulation state for a single run
//!
//! `PlanState` is exclusively owned by its run: balances, cost bases, real
//! asset states, and the year-to-date accumulators the December settlement
//! consumes. Ensemble modes clone the initial state per run.

use std::collections::BTreeMap;

use crate::plan::{AccountKind, Owner, Plan, YearMonth};

use super::assets::AssetState;
use super::basis::BasisTracker;

/// Year-to-date accumulators, reset every January
#[derive(Debug, Clone, Default)]
pub struct YtdAccumulators {
    /// Taxable ordinary income: wages, RMDs, conversions, deferred draws
    pub ordinary_income: f64,
    /// Realized long-term capital gains
    pub capital_gains: f64,
    /// Dividends taxed at capital-gains rates
    pub qualified_dividends: f64,
    /// NIIT base: taxed dividends plus realized gains
    pub investment_income: f64,
    pub roth_conversion_income: f64,
    /// 10% early-withdrawal penalties accrued
    pub penalties: f64,
    pub withheld_tax: f64,
    pub fica_withheld: f64,
    /// Gross Social Security received; taxability resolves in December
    pub social_security_gross: f64,
    pub mortgage_interest_paid: f64,
    pub property_tax_paid: f64,
    /// FICA wage-base counters
    pub wages_primary: f64,
    pub wages_spouse: f64,
    pub household_wages: f64,
}

impl YtdAccumulators {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn wages_for(&self, owner: Owner) -> f64 {
        match owner {
            Owner::Spouse => self.wages_spouse,
            _ => self.wages_primary,
        }
    }

    pub fn add_wages(&mut self, owner: Owner, amount: f64) {
        match owner {
            Owner::Spouse => self.wages_spouse += amount,
            _ => self.wages_primary += amount,
        }
        self.household_wages += amount;
    }
}

/// The complete mutable state threaded through a run
#[derive(Debug, Clone)]
pub struct PlanState {
    pub current: YearMonth,
    pub balances: BTreeMap<String, f64>,
    /// Average-cost basis per taxable brokerage account
    pub taxable_basis: BTreeMap<String, BasisTracker>,
    /// Cumulative contributions per Roth account, for the earnings split
    pub roth_basis: BTreeMap<String, BasisTracker>,
    pub assets: Vec<AssetState>,
    pub primary_age_months: i32,
    pub spouse_age_months: Option<i32>,
    pub ytd: YtdAccumulators,
    /// Balances snapshot at the prior December, for RMD computation
    pub prior_year_end_balances: BTreeMap<String, f64>,
    /// MAGI by calendar year, for the IRMAA lookback
    pub magi_history: BTreeMap<i32, f64>,
    pub insolvent: bool,
}

impl PlanState {
    /// Initialize state at the plan start
    pub fn from_plan(plan: &Plan) -> Self {
        let balances: BTreeMap<String, f64> = plan
            .accounts
            .iter()
            .map(|a| (a.name.clone(), a.balance))
            .collect();

        let taxable_basis = plan
            .accounts
            .iter()
            .filter(|a| a.kind == AccountKind::TaxableBrokerage)
            .map(|a| (a.name.clone(), BasisTracker::new(a.cost_basis.unwrap_or(0.0))))
            .collect();

        // Initial Roth balances count as contributions for the earnings split
        let roth_basis = plan
            .accounts
            .iter()
            .filter(|a| a.kind == AccountKind::RothIra)
            .map(|a| (a.name.clone(), BasisTracker::new(a.balance)))
            .collect();

        let assets = plan.real_assets.iter().cloned().map(AssetState::new).collect();

        let mut state = Self {
            current: plan.plan_start(),
            prior_year_end_balances: balances.clone(),
            balances,
            taxable_basis,
            roth_basis,
            assets,
            primary_age_months: 0,
            spouse_age_months: None,
            ytd: YtdAccumulators::default(),
            magi_history: BTreeMap::new(),
            insolvent: false,
        };
        state.update_ages(plan);
        state
    }

    /// Recompute ages from birthdays and the month cursor
    pub fn update_ages(&mut self, plan: &Plan) {
        self.primary_age_months = self.current.months_since(plan.people.primary.birthday).max(0);
        self.spouse_age_months = plan
            .people
            .spouse
            .as_ref()
            .map(|s| self.current.months_since(s.birthday).max(0));
    }

    pub fn age_months(&self, owner: Owner) -> i32 {
        match owner {
            Owner::Spouse => self.spouse_age_months.unwrap_or(0),
            _ => self.primary_age_months,
        }
    }

    pub fn balance(&self, name: &str) -> f64 {
        self.balances.get(name).copied().unwrap_or(0.0)
    }

    pub fn credit(&mut self, name: &str, amount: f64) {
        if let Some(balance) = self.balances.get_mut(name) {
            *balance += amount;
        }
    }

    /// Account balances plus real asset equity (value net of mortgage debt)
    pub fn net_worth(&self) -> f64 {
        let account_total: f64 = self.balances.values().map(|b| b.max(0.0)).sum();
        let asset_equity: f64 = self
            .assets
            .iter()
            .map(|a| a.current_value - a.mortgage_balance)
            .sum();
        account_total + asset_equity
    }

    /// Snapshot balances for next year's RMD computation
    pub fn snapshot_year_end(&mut self) {
        self.prior_year_end_balances = self.balances.clone();
    }
}
