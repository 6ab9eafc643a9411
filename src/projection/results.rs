//! Projection output structures
//!
//! One `MonthResult` per simulated month, rolled up into `AnnualResult`s
//! with the December tax settlement attached. Everything serializes so the
//! driver can emit the full result tree as JSON.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::tax::TaxResult;

use super::withdrawals::WithdrawalEvent;

/// Every flow that occurred during one simulated month
#[derive(Debug, Clone, Serialize)]
pub struct MonthResult {
    pub year: i32,
    pub month: u32,

    /// All income credited to cash, Social Security included
    pub income: f64,
    pub social_security_income: f64,
    pub tax_withheld: f64,
    pub fica_withheld: f64,

    /// Contributions moved into accounts, employer match included
    pub contributions: f64,
    pub employer_match: f64,
    pub transfers: f64,
    pub roth_conversions: f64,
    pub rmd_distributions: f64,

    pub growth: f64,
    pub dividends: f64,
    pub fees: f64,

    pub healthcare_expenses: f64,
    pub irmaa_surcharges: f64,
    pub other_expenses: f64,
    pub real_asset_expenses: f64,

    pub withdrawals: f64,
    pub withdrawal_events: Vec<WithdrawalEvent>,
    pub realized_capital_gains: f64,
    pub early_withdrawal_penalties: f64,

    /// December only: positive = payment due, negative = refund
    pub tax_settlement: f64,
    /// Expenses or taxes that could not be paid after exhausting accounts
    pub unpaid_expenses: f64,
    pub unpaid_taxes: f64,

    pub net_worth_end: f64,
    pub insolvent: bool,
}

impl MonthResult {
    pub fn new(year: i32, month: u32) -> Self {
        Self {
            year,
            month,
            income: 0.0,
            social_security_income: 0.0,
            tax_withheld: 0.0,
            fica_withheld: 0.0,
            contributions: 0.0,
            employer_match: 0.0,
            transfers: 0.0,
            roth_conversions: 0.0,
            rmd_distributions: 0.0,
            growth: 0.0,
            dividends: 0.0,
            fees: 0.0,
            healthcare_expenses: 0.0,
            irmaa_surcharges: 0.0,
            other_expenses: 0.0,
            real_asset_expenses: 0.0,
            withdrawals: 0.0,
            withdrawal_events: Vec::new(),
            realized_capital_gains: 0.0,
            early_withdrawal_penalties: 0.0,
            tax_settlement: 0.0,
            unpaid_expenses: 0.0,
            unpaid_taxes: 0.0,
            net_worth_end: 0.0,
            insolvent: false,
        }
    }

    /// Total household outflow for the month before any tax settlement
    pub fn total_expenses(&self) -> f64 {
        self.healthcare_expenses + self.other_expenses + self.real_asset_expenses
    }
}

/// December settlement details attached to the year's results
#[derive(Debug, Clone, Serialize)]
pub struct YearSettlement {
    pub tax: TaxResult,
    /// Credited to cash when withholding exceeded the liability
    pub refund: f64,
    /// Deducted from cash when the liability exceeded withholding
    pub payment: f64,
    /// Modified AGI recorded for the IRMAA lookback window
    pub magi: f64,
}

/// One calendar year of results
#[derive(Debug, Clone, Serialize)]
pub struct AnnualResult {
    pub year: i32,

    pub income: f64,
    pub social_security_income: f64,
    pub tax_withheld: f64,
    pub fica_withheld: f64,
    pub contributions: f64,
    pub employer_match: f64,
    pub transfers: f64,
    pub roth_conversions: f64,
    pub rmd_distributions: f64,
    pub growth: f64,
    pub dividends: f64,
    pub fees: f64,
    pub healthcare_expenses: f64,
    pub irmaa_surcharges: f64,
    pub other_expenses: f64,
    pub real_asset_expenses: f64,
    pub withdrawals: f64,
    pub realized_capital_gains: f64,
    pub early_withdrawal_penalties: f64,
    pub unpaid_expenses: f64,
    pub unpaid_taxes: f64,

    /// Present after the December settlement has run
    pub settlement: Option<YearSettlement>,

    pub end_balances: BTreeMap<String, f64>,
    pub net_worth_end: f64,
    pub insolvent: bool,

    pub months: Vec<MonthResult>,
}

impl AnnualResult {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            income: 0.0,
            social_security_income: 0.0,
            tax_withheld: 0.0,
            fica_withheld: 0.0,
            contributions: 0.0,
            employer_match: 0.0,
            transfers: 0.0,
            roth_conversions: 0.0,
            rmd_distributions: 0.0,
            growth: 0.0,
            dividends: 0.0,
            fees: 0.0,
            healthcare_expenses: 0.0,
            irmaa_surcharges: 0.0,
            other_expenses: 0.0,
            real_asset_expenses: 0.0,
            withdrawals: 0.0,
            realized_capital_gains: 0.0,
            early_withdrawal_penalties: 0.0,
            unpaid_expenses: 0.0,
            unpaid_taxes: 0.0,
            settlement: None,
            end_balances: BTreeMap::new(),
            net_worth_end: 0.0,
            insolvent: false,
            months: Vec::new(),
        }
    }

    /// Fold one month into the year's running totals
    pub fn absorb(&mut self, month: MonthResult) {
        self.income += month.income;
        self.social_security_income += month.social_security_income;
        self.tax_withheld += month.tax_withheld;
        self.fica_withheld += month.fica_withheld;
        self.contributions += month.contributions;
        self.employer_match += month.employer_match;
        self.transfers += month.transfers;
        self.roth_conversions += month.roth_conversions;
        self.rmd_distributions += month.rmd_distributions;
        self.growth += month.growth;
        self.dividends += month.dividends;
        self.fees += month.fees;
        self.healthcare_expenses += month.healthcare_expenses;
        self.irmaa_surcharges += month.irmaa_surcharges;
        self.other_expenses += month.other_expenses;
        self.real_asset_expenses += month.real_asset_expenses;
        self.withdrawals += month.withdrawals;
        self.realized_capital_gains += month.realized_capital_gains;
        self.early_withdrawal_penalties += month.early_withdrawal_penalties;
        self.unpaid_expenses += month.unpaid_expenses;
        self.unpaid_taxes += month.unpaid_taxes;
        self.net_worth_end = month.net_worth_end;
        self.insolvent = self.insolvent || month.insolvent;
        self.months.push(month);
    }

    pub fn total_expenses(&self) -> f64 {
        self.healthcare_expenses + self.other_expenses + self.real_asset_expenses
    }

    /// Annual taxes for aggregation: settled income taxes plus payroll taxes
    pub fn total_taxes(&self) -> f64 {
        let settled = self.settlement.as_ref().map(|s| s.tax.total_tax).unwrap_or(0.0);
        settled + self.fica_withheld
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_accumulates_and_tracks_insolvency() {
        let mut annual = AnnualResult::new(2026);
        let mut first = MonthResult::new(2026, 1);
        first.income = 10_000.0;
        first.other_expenses = 4_000.0;
        first.net_worth_end = 100_000.0;
        annual.absorb(first);

        let mut second = MonthResult::new(2026, 2);
        second.income = 10_000.0;
        second.insolvent = true;
        second.net_worth_end = 90_000.0;
        annual.absorb(second);

        assert_eq!(annual.income, 20_000.0);
        assert_eq!(annual.other_expenses, 4_000.0);
        assert_eq!(annual.net_worth_end, 90_000.0);
        assert!(annual.insolvent);
        assert_eq!(annual.months.len(), 2);
    }
}
