//! Real asset state: appreciation, mortgage amortization, carrying costs

use serde::Serialize;

use crate::plan::{Frequency, RealAsset, YearMonth};

/// Convert an annual rate to its monthly geometric equivalent
pub fn annual_to_monthly_rate(annual_rate: f64) -> f64 {
    if annual_rate <= -1.0 {
        return -1.0;
    }
    (1.0 + annual_rate).powf(1.0 / 12.0) - 1.0
}

/// Mutable projection state for one real asset
#[derive(Debug, Clone)]
pub struct AssetState {
    pub asset: RealAsset,
    pub current_value: f64,
    /// Zero once the mortgage is paid off or detached
    pub mortgage_balance: f64,
}

/// One month of mortgage amortization
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MortgagePayment {
    pub total: f64,
    pub principal: f64,
    pub interest: f64,
}

impl AssetState {
    pub fn new(asset: RealAsset) -> Self {
        let mortgage_balance = asset
            .mortgage
            .as_ref()
            .map(|m| m.remaining_balance.max(0.0))
            .unwrap_or(0.0);
        let current_value = asset.current_value;
        Self { asset, current_value, mortgage_balance }
    }

    /// Appreciate one month at the asset's effective annual rate
    pub fn appreciate(&mut self, inflation_rate: f64) -> f64 {
        let annual = self
            .asset
            .change_over_time
            .annual_rate(self.asset.change_rate, inflation_rate);
        let growth = self.current_value * annual_to_monthly_rate(annual);
        self.current_value += growth;
        growth
    }

    /// Standard annuity split. The principal component is capped by the
    /// remaining balance so the final payment closes the loan exactly; the
    /// mortgage detaches once the balance or its end date is reached.
    pub fn amortize(&mut self, current: YearMonth, plan_start: YearMonth, plan_end: YearMonth) -> MortgagePayment {
        let Some(mortgage) = &self.asset.mortgage else {
            return MortgagePayment::default();
        };
        if self.mortgage_balance <= 0.0 {
            return MortgagePayment::default();
        }
        let end = mortgage.end_date.resolve(plan_start, plan_end);
        if current.index() > end.index() {
            self.mortgage_balance = 0.0;
            return MortgagePayment::default();
        }

        let interest = self.mortgage_balance * mortgage.interest_rate / 12.0;
        let principal = (mortgage.payment - interest).max(0.0).min(self.mortgage_balance);
        self.mortgage_balance -= principal;
        MortgagePayment { total: interest + principal, principal, interest }
    }

    /// Property tax accrued for one month
    pub fn property_tax(&self) -> f64 {
        (self.current_value * self.asset.property_tax_rate / 12.0).max(0.0)
    }

    /// Maintenance charges due this month; annual items charge in January
    pub fn maintenance_due(&self, month: u32) -> f64 {
        self.asset
            .maintenance_expenses
            .iter()
            .map(|m| match m.frequency {
                Frequency::Monthly => m.amount,
                Frequency::Annual if month == 1 => m.amount,
                _ => 0.0,
            })
            .sum()
    }
}
