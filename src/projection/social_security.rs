//! Social Security benefit modeling
//!
//! PIA at full retirement age is adjusted for the planned claiming age,
//! COLA'd annually after claiming, topped up to the spousal benefit where
//! that is larger, and partially included in ordinary income at settlement
//! via the combined-income rule.

use crate::plan::{ColaAssumption, Owner, SocialSecurity};

/// Delayed retirement credits stop accruing at age 70
const MAX_CREDIT_AGE_MONTHS: i32 = 70 * 12;

fn claim_months(item: &SocialSecurity) -> i32 {
    (item.claiming_age_years * 12 + item.claiming_age_months) as i32
}

fn fra_months(item: &SocialSecurity) -> i32 {
    (item.fra_age_years * 12 + item.fra_age_months) as i32
}

fn cola_rate(item: &SocialSecurity, inflation_rate: f64) -> f64 {
    let rate = item.cola_rate.unwrap_or(0.0);
    match item.cola_assumption {
        ColaAssumption::Fixed => rate,
        ColaAssumption::MatchInflation => inflation_rate,
        ColaAssumption::InflationPlus => inflation_rate + rate,
        ColaAssumption::InflationMinus => inflation_rate - rate,
    }
}

/// Claiming-age factor applied to the PIA: 5/9% per month for the first 36
/// months early and 5/12% beyond; 2/3% per month of delay up to age 70.
pub fn claiming_adjustment(item: &SocialSecurity) -> f64 {
    let fra = fra_months(item);
    let claim = claim_months(item);
    let diff = claim - fra;
    if diff == 0 {
        return 1.0;
    }
    if diff < 0 {
        let early = (-diff) as f64;
        let first_36 = early.min(36.0);
        let additional = (early - 36.0).max(0.0);
        (1.0 - first_36 * (5.0 / 900.0) - additional * (5.0 / 1200.0)).max(0.0)
    } else {
        let credited = (claim.min(MAX_CREDIT_AGE_MONTHS) - fra).max(0) as f64;
        1.0 + credited * (2.0 / 300.0)
    }
}

fn cola_factor(item: &SocialSecurity, age_months: i32, inflation_rate: f64) -> f64 {
    let years_after_claim = ((age_months - claim_months(item)) / 12).max(0);
    (1.0 + cola_rate(item, inflation_rate)).powi(years_after_claim)
}

fn own_monthly_benefit(item: &SocialSecurity, age_months: i32, inflation_rate: f64) -> f64 {
    if age_months < claim_months(item) {
        return 0.0;
    }
    (item.pia_at_fra * claiming_adjustment(item)).max(0.0) * cola_factor(item, age_months, inflation_rate)
}

/// Spousal benefit: half the spouse's PIA scaled by the claimant's own
/// claiming factor, COLA'd on the claimant's schedule
fn spousal_monthly_benefit(
    claimant: &SocialSecurity,
    spouse: &SocialSecurity,
    age_months: i32,
    inflation_rate: f64,
) -> f64 {
    if age_months < claim_months(claimant) {
        return 0.0;
    }
    let base = 0.5 * spouse.pia_at_fra.max(0.0) * claiming_adjustment(claimant);
    (base * cola_factor(claimant, age_months, inflation_rate)).max(0.0)
}

/// Total household Social Security income for one month. Each person
/// receives the larger of their own benefit and the spousal top-up when
/// their PIA is below half their spouse's.
pub fn household_monthly_benefit(
    entries: &[SocialSecurity],
    primary_age_months: i32,
    spouse_age_months: Option<i32>,
    inflation_rate: f64,
) -> f64 {
    let primary = entries.iter().find(|e| e.owner == Owner::Primary);
    let spouse = entries.iter().find(|e| e.owner == Owner::Spouse);

    let age_for = |owner: Owner| match owner {
        Owner::Spouse => spouse_age_months.unwrap_or(0),
        _ => primary_age_months,
    };

    let mut total = 0.0;
    for (own, other) in [(primary, spouse), (spouse, primary)] {
        let Some(item) = own else { continue };
        let age = age_for(item.owner);
        let mut benefit = own_monthly_benefit(item, age, inflation_rate);
        if let Some(other) = other {
            if item.pia_at_fra < 0.5 * other.pia_at_fra {
                benefit = benefit.max(spousal_monthly_benefit(item, other, age, inflation_rate));
            }
        }
        total += benefit.max(0.0);
    }
    total
}

/// Taxable share of annual benefits under the combined-income rule:
/// 0%, 50%, or 85% of the year's benefits depending on where
/// `AGI + half the benefits` lands against the filing-status thresholds.
pub fn taxable_portion(annual_benefits: f64, agi_excluding_benefits: f64, thresholds: (f64, f64)) -> f64 {
    if annual_benefits <= 0.0 {
        return 0.0;
    }
    let (lower, upper) = thresholds;
    let combined = agi_excluding_benefits.max(0.0) + 0.5 * annual_benefits;
    if combined <= lower {
        0.0
    } else if combined <= upper {
        0.5 * annual_benefits
    } else {
        0.85 * annual_benefits
    }
}
