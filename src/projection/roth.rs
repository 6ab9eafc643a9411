//! Roth conversion execution
//!
//! Fixed schedules convert one twelfth of the annual amount each month.
//! Fill-to-bracket schedules act only in December, converting exactly
//! enough to lift year-to-date ordinary income to the top of the named
//! federal bracket. Converted dollars are ordinary income settled at year
//! end; nothing is withheld at conversion time.

use std::collections::BTreeMap;

use crate::plan::{FilingStatus, RothConversion, YearMonth};
use crate::tax::TaxTables;

use super::basis::BasisTracker;

/// Parse a bracket name such as `"22%"` into its marginal rate
fn parse_bracket_rate(name: &str) -> Option<f64> {
    let trimmed = name.trim().trim_end_matches('%');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().map(|pct| pct / 100.0)
}

/// Execute the conversions active this month. Returns the total gross
/// amount converted, which the caller adds to ordinary income.
#[allow(clippy::too_many_arguments)]
pub fn execute_conversions(
    conversions: &[RothConversion],
    balances: &mut BTreeMap<String, f64>,
    roth_basis: &mut BTreeMap<String, BasisTracker>,
    current: YearMonth,
    plan_start: YearMonth,
    plan_end: YearMonth,
    filing_status: FilingStatus,
    tables: &TaxTables,
    ytd_ordinary_income: f64,
) -> f64 {
    let mut total_converted = 0.0;
    let mut projected_income = ytd_ordinary_income.max(0.0);

    for conversion in conversions {
        if !crate::plan::data::window_contains(
            conversion.start_date,
            conversion.end_date,
            current,
            plan_start,
            plan_end,
        ) {
            continue;
        }

        let source_balance = balances
            .get(&conversion.from_account)
            .copied()
            .unwrap_or(0.0)
            .max(0.0);
        if source_balance <= 0.0 {
            continue;
        }

        let amount = if let Some(bracket) = &conversion.fill_to_bracket {
            if current.month != 12 {
                continue;
            }
            let Some(rate) = parse_bracket_rate(bracket) else { continue };
            let Some(top) = tables.federal_bracket_top(filing_status, current.year, rate) else {
                continue;
            };
            source_balance.min((top - projected_income).max(0.0))
        } else if let Some(annual) = conversion.annual_amount {
            source_balance.min((annual / 12.0).max(0.0))
        } else {
            0.0
        };

        if amount <= 0.0 {
            continue;
        }

        if let Some(source) = balances.get_mut(&conversion.from_account) {
            *source -= amount;
        }
        if let Some(dest) = balances.get_mut(&conversion.to_account) {
            *dest += amount;
        }
        // Conversions count as Roth contributions for the earnings split
        roth_basis
            .entry(conversion.to_account.clone())
            .or_default()
            .add(amount);

        total_converted += amount;
        projected_income += amount;
    }

    total_converted
}
