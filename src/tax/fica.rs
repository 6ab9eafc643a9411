//! Payroll taxes, settled monthly against year-to-date wage counters
//!
//! Social Security tax stops at the annual wage base, tracked per person;
//! the Additional Medicare surtax threshold applies to combined household
//! wages for joint filers. Both use incremental arithmetic so calling once
//! per month accumulates to the same total as a single annual computation.

use crate::plan::FilingStatus;

use super::tables::{
    TaxTables, ADDITIONAL_MEDICARE_RATE, MEDICARE_RATE, SOCIAL_SECURITY_RATE,
};

/// Taxable share of self-employment earnings
const SE_EARNINGS_FACTOR: f64 = 0.9235;

/// FICA on one person's wages for one month.
/// `ytd_wages` is the person's wage-base counter before this paycheck;
/// `ytd_household_wages` is the combined counter for the surtax threshold.
pub fn employment_fica(
    tables: &TaxTables,
    wages: f64,
    ytd_wages: f64,
    ytd_household_wages: f64,
    status: FilingStatus,
    year: i32,
) -> f64 {
    if wages <= 0.0 {
        return 0.0;
    }

    let wage_base = tables.social_security_wage_base(year);
    let ss_taxable = wages.min((wage_base - ytd_wages.max(0.0)).max(0.0));
    let ss_tax = ss_taxable * SOCIAL_SECURITY_RATE;

    let medicare_tax = wages * MEDICARE_RATE;

    let threshold = tables.additional_medicare_threshold(status, year);
    let over_after = (ytd_household_wages + wages - threshold).max(0.0);
    let over_before = (ytd_household_wages - threshold).max(0.0);
    let additional_tax = (over_after - over_before) * ADDITIONAL_MEDICARE_RATE;

    ss_tax + medicare_tax + additional_tax
}

/// Self-employment tax on one month's net earnings: both halves of Social
/// Security up to the shared wage base, plus both halves of Medicare.
pub fn self_employment_tax(tables: &TaxTables, net_earnings: f64, ytd_wages: f64, year: i32) -> f64 {
    if net_earnings <= 0.0 {
        return 0.0;
    }

    let taxable = net_earnings * SE_EARNINGS_FACTOR;
    let wage_base = tables.social_security_wage_base(year);
    let ss_taxable = taxable.min((wage_base - ytd_wages.max(0.0)).max(0.0));
    let ss_part = ss_taxable * (SOCIAL_SECURITY_RATE * 2.0);
    let medicare_part = taxable * (MEDICARE_RATE * 2.0);
    ss_part + medicare_part
}

/// Wage-base credit for one month of self-employment earnings
pub fn se_wage_base_credit(net_earnings: f64) -> f64 {
    (net_earnings * SE_EARNINGS_FACTOR).max(0.0)
}
