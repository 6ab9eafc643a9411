//! Running cost basis per account
//!
//! Taxable brokerage accounts use the average-cost method: a withdrawal
//! carries basis out in proportion to the basis share of the balance, and
//! the remainder is realized gain. Roth accounts reuse the tracker to hold
//! cumulative contributions, split contributions-first when computing the
//! penalized earnings portion of an early withdrawal.

/// Average-cost basis state for one account
#[derive(Debug, Clone, Default)]
pub struct BasisTracker {
    total_basis: f64,
}

impl BasisTracker {
    pub fn new(initial_basis: f64) -> Self {
        Self { total_basis: initial_basis.max(0.0) }
    }

    pub fn total(&self) -> f64 {
        self.total_basis
    }

    /// Contributions and reinvested dividends increase basis dollar for dollar
    pub fn add(&mut self, amount: f64) {
        if amount > 0.0 {
            self.total_basis += amount;
        }
    }

    /// Apply a withdrawal under average cost; returns the realized gain.
    /// A zero balance realizes no gain (exhaustion, not income).
    pub fn withdraw_average(&mut self, amount: f64, balance_before: f64) -> f64 {
        if amount <= 0.0 || balance_before <= 0.0 {
            return 0.0;
        }
        let basis_ratio = (self.total_basis / balance_before).min(1.0);
        let basis_reduction = amount * basis_ratio;
        self.total_basis = (self.total_basis - basis_reduction).max(0.0);
        (amount - basis_reduction).max(0.0)
    }

    /// Keep basis inside `[0, balance]` after fees shrink the balance
    pub fn clamp_to(&mut self, balance: f64) {
        self.total_basis = self.total_basis.min(balance.max(0.0));
    }

    /// Apply a withdrawal treating tracked basis as contributions returned
    /// first; returns the earnings portion beyond contributions.
    pub fn withdraw_contributions_first(&mut self, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let from_basis = amount.min(self.total_basis);
        self.total_basis -= from_basis;
        amount - from_basis
    }
}
