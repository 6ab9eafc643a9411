//! Annual tax computation from a year's income summary
//!
//! The engine accumulates income on plan state through the year and hands a
//! `YearIncomeSummary` to `TaxTables::compute_total_tax` each December. The
//! computation itself is a pure function of the summary and the plan's tax
//! settings; monthly withholding is settled by the caller against
//! `TaxResult::total_tax`.

use crate::plan::{FilingStatus, TaxSettings};

use super::tables::{Bracket, TaxTables};

/// Everything the annual computation needs about one tax year
#[derive(Debug, Clone)]
pub struct YearIncomeSummary {
    pub year: i32,
    pub filing_status: FilingStatus,
    /// Two-letter state code of the primary filer
    pub state: String,
    /// Ordinary income: wages, taxable SS, RMDs, conversions, deferred withdrawals
    pub ordinary_income: f64,
    /// Realized long-term capital gains
    pub capital_gains: f64,
    /// Dividends taxed at capital-gains rates
    pub qualified_dividends: f64,
    /// Base for the net investment income tax
    pub investment_income: f64,
    pub itemized_deductions: f64,
    pub withheld_tax: f64,
    /// 10% penalties already attributed during the year
    pub early_withdrawal_penalty: f64,
}

/// Itemized annual tax liability
#[derive(Debug, Clone, serde::Serialize)]
pub struct TaxResult {
    pub federal_income_tax: f64,
    pub capital_gains_tax: f64,
    pub niit_tax: f64,
    pub amt_tax: f64,
    pub state_income_tax: f64,
    pub early_withdrawal_penalty: f64,
    /// Sum of all components; compare against withholding to settle
    pub total_tax: f64,
    pub deduction_used: f64,
    pub taxable_ordinary_income: f64,
}

/// Piecewise tax over a marginal bracket schedule
pub fn progressive_tax(amount: f64, brackets: &[Bracket]) -> f64 {
    if amount <= 0.0 {
        return 0.0;
    }
    let mut remaining = amount;
    let mut lower = 0.0;
    let mut tax = 0.0;
    for bracket in brackets {
        if remaining <= 0.0 {
            break;
        }
        let taxable = match bracket.upper {
            Some(upper) => remaining.min((upper - lower).max(0.0)),
            None => remaining,
        };
        tax += taxable * bracket.rate;
        remaining -= taxable;
        match bracket.upper {
            Some(upper) => lower = upper,
            None => break,
        }
    }
    tax.max(0.0)
}

/// Long-term gains stack on top of ordinary taxable income: each bracket is
/// filled with the gain that overlaps `[ordinary, ordinary + gains]`
fn stacked_capital_gains_tax(gains: f64, ordinary_taxable: f64, brackets: &[Bracket]) -> f64 {
    if gains <= 0.0 {
        return 0.0;
    }
    let base = ordinary_taxable.max(0.0);
    let top = base + gains;
    let mut tax = 0.0;
    let mut lower: f64 = 0.0;
    for bracket in brackets {
        let upper = bracket.upper.unwrap_or(f64::INFINITY);
        let lo = lower.max(base);
        let hi = upper.min(top);
        if hi > lo {
            tax += (hi - lo) * bracket.rate;
        }
        lower = upper;
    }
    tax.max(0.0)
}

impl TaxTables {
    pub fn federal_income_tax(&self, taxable_income: f64, status: FilingStatus, year: i32) -> f64 {
        progressive_tax(taxable_income, &self.federal_brackets(status, year))
    }

    pub fn capital_gains_tax(
        &self,
        gains: f64,
        ordinary_taxable: f64,
        status: FilingStatus,
        year: i32,
    ) -> f64 {
        stacked_capital_gains_tax(gains, ordinary_taxable, &self.capital_gains_brackets(status, year))
    }

    /// 3.8% on investment income above the filing-status AGI threshold
    pub fn niit(&self, investment_income: f64, agi: f64, status: FilingStatus, year: i32) -> f64 {
        if investment_income <= 0.0 {
            return 0.0;
        }
        let excess_agi = (agi - self.niit_threshold(status, year)).max(0.0);
        0.038 * investment_income.max(0.0).min(excess_agi)
    }

    /// Simplified tentative minimum tax: AMTI less a phased-out exemption,
    /// taxed at 26%/28%
    pub fn tentative_amt(&self, income: f64, deductions: f64, status: FilingStatus, year: i32) -> f64 {
        let (mut exemption, phaseout_start) = self.amt_exemption(status, year);
        let amti = (income - deductions.max(0.0)).max(0.0);
        if amti > phaseout_start {
            exemption = (exemption - 0.25 * (amti - phaseout_start)).max(0.0);
        }
        progressive_tax((amti - exemption).max(0.0), &self.amt_brackets(year))
    }

    pub fn state_income_tax(&self, taxable_income: f64, state: &str, year: i32) -> f64 {
        progressive_tax(taxable_income.max(0.0), &self.state_brackets(state, year))
    }

    /// Full annual liability. The caller settles `total_tax` against
    /// `summary.withheld_tax`.
    pub fn compute_total_tax(&self, summary: &YearIncomeSummary, settings: &TaxSettings) -> TaxResult {
        let status = summary.filing_status;
        let year = summary.year;
        let ordinary_income = summary.ordinary_income.max(0.0);
        let gross_ltcg = summary.capital_gains.max(0.0) + summary.qualified_dividends.max(0.0);

        let standard = settings
            .standard_deduction_override
            .unwrap_or_else(|| self.standard_deduction(status, year));
        let deduction = standard.max(summary.itemized_deductions).max(0.0);
        let taxable_ordinary = (ordinary_income - deduction).max(0.0);

        let federal_tax = match settings.federal_effective_rate_override {
            Some(rate) => taxable_ordinary * rate.max(0.0),
            None => self.federal_income_tax(taxable_ordinary, status, year),
        };

        let cap_tax = match settings.capital_gains_rate_override {
            Some(rate) => gross_ltcg * rate.max(0.0),
            None => self.capital_gains_tax(gross_ltcg, taxable_ordinary, status, year),
        };

        let agi = ordinary_income + gross_ltcg;

        let niit_tax = if settings.niit_enabled {
            let niit_base = summary.investment_income.max(gross_ltcg);
            self.niit(niit_base, agi, status, year)
        } else {
            0.0
        };

        let amt_tax = if settings.amt_enabled {
            let tentative = self.tentative_amt(agi, deduction, status, year);
            (tentative - (federal_tax + cap_tax)).max(0.0)
        } else {
            0.0
        };

        let state_tax = match settings.state_effective_rate_override {
            Some(rate) => (taxable_ordinary * rate).max(0.0),
            None => self.state_income_tax(taxable_ordinary, &summary.state, year),
        };

        let penalty = summary.early_withdrawal_penalty.max(0.0);
        let total = federal_tax + cap_tax + niit_tax + amt_tax + state_tax + penalty;

        TaxResult {
            federal_income_tax: federal_tax.max(0.0),
            capital_gains_tax: cap_tax.max(0.0),
            niit_tax: niit_tax.max(0.0),
            amt_tax: amt_tax.max(0.0),
            state_income_tax: state_tax.max(0.0),
            early_withdrawal_penalty: penalty,
            total_tax: total.max(0.0),
            deduction_used: deduction,
            taxable_ordinary_income: taxable_ordinary,
        }
    }
}
