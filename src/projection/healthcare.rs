//! Monthly healthcare costs with IRMAA surcharges
//!
//! Pre-Medicare policies run while their window is active and the covered
//! person is under 65. Medicare costs begin at 65 or at an explicit
//! medicare_start_date, whichever comes first, and pick up the IRMAA
//! surcharge tier from MAGI recorded `lookback_years` Decembers ago.

use std::collections::BTreeMap;

use crate::plan::{DateSpec, FilingStatus, Healthcare, Owner, YearMonth};
use crate::tax::TaxTables;

const MEDICARE_AGE_MONTHS: i32 = 65 * 12;

/// One month of healthcare spend, with the IRMAA share broken out
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthcareCost {
    pub total: f64,
    pub irmaa: f64,
}

#[allow(clippy::too_many_arguments)]
pub fn monthly_cost(
    healthcare: &Healthcare,
    primary_age_months: i32,
    spouse_age_months: Option<i32>,
    current: YearMonth,
    plan_start: YearMonth,
    plan_end: YearMonth,
    inflation_rate: f64,
    filing_status: FilingStatus,
    tables: &TaxTables,
    magi_history: &BTreeMap<i32, f64>,
) -> HealthcareCost {
    let years_elapsed = (current.year - plan_start.year).max(0);
    let age_of = |owner: Owner| match owner {
        Owner::Spouse => spouse_age_months.unwrap_or(0),
        _ => primary_age_months,
    };

    let mut cost = HealthcareCost::default();

    for item in &healthcare.pre_medicare {
        let start = item.start_date.unwrap_or(DateSpec::PlanStart);
        let end = item.end_date.unwrap_or(DateSpec::PlanEnd);
        if !crate::plan::data::window_contains(start, end, current, plan_start, plan_end) {
            continue;
        }
        if age_of(item.owner) >= MEDICARE_AGE_MONTHS {
            continue;
        }
        let factor = item
            .change_over_time
            .multiplier(item.change_rate, inflation_rate, years_elapsed);
        cost.total += (item.monthly_premium + item.annual_out_of_pocket / 12.0) * factor;
    }

    for item in &healthcare.post_medicare {
        let age_eligible = age_of(item.owner) >= MEDICARE_AGE_MONTHS;
        let date_eligible = item
            .medicare_start_date
            .map(|d| current.index() >= d.resolve(plan_start, plan_end).index())
            .unwrap_or(false);
        if !age_eligible && !date_eligible {
            continue;
        }

        let factor = item
            .change_over_time
            .multiplier(item.change_rate, inflation_rate, years_elapsed);
        cost.total += (item.part_b_monthly_premium
            + item.supplement_monthly_premium
            + item.part_d_monthly_premium
            + item.annual_out_of_pocket / 12.0)
            * factor;

        if healthcare.irmaa.enabled {
            let lookback_year = current.year - healthcare.irmaa.lookback_years as i32;
            let lookback_magi = magi_history.get(&lookback_year).copied().unwrap_or(0.0).max(0.0);
            let (part_b, part_d) = tables.irmaa_surcharge(filing_status, current.year, lookback_magi);
            let surcharge = part_b + part_d;
            cost.irmaa += surcharge;
            cost.total += surcharge;
        }
    }

    cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ChangePolicy, HealthcarePostMedicare, HealthcarePreMedicare, IrmaaSettings};

    fn fixture() -> Healthcare {
        Healthcare {
            pre_medicare: vec![HealthcarePreMedicare {
                owner: Owner::Primary,
                monthly_premium: 800.0,
                annual_out_of_pocket: 2_400.0,
                start_date: None,
                end_date: None,
                change_over_time: ChangePolicy::Fixed,
                change_rate: None,
            }],
            post_medicare: vec![HealthcarePostMedicare {
                owner: Owner::Primary,
                medicare_start_date: None,
                part_b_monthly_premium: 185.0,
                supplement_monthly_premium: 150.0,
                part_d_monthly_premium: 40.0,
                annual_out_of_pocket: 1_200.0,
                change_over_time: ChangePolicy::Fixed,
                change_rate: None,
            }],
            irmaa: IrmaaSettings { enabled: true, lookback_years: 2 },
        }
    }

    fn cost_at(age_years: i32, magi_two_years_ago: f64) -> HealthcareCost {
        let start = YearMonth::new(2026, 1);
        let end = YearMonth::new(2060, 12);
        let mut history = BTreeMap::new();
        history.insert(2028, magi_two_years_ago);
        monthly_cost(
            &fixture(),
            age_years * 12,
            None,
            YearMonth::new(2030, 6),
            start,
            end,
            0.0,
            FilingStatus::Single,
            &TaxTables::new(0.0),
            &history,
        )
    }

    #[test]
    fn test_pre_medicare_under_65() {
        let cost = cost_at(60, 0.0);
        // premium + oop/12, no Medicare lines
        assert!((cost.total - 1_000.0).abs() < 1e-9);
        assert_eq!(cost.irmaa, 0.0);
    }

    #[test]
    fn test_medicare_at_65_without_surcharge() {
        let cost = cost_at(66, 100_000.0);
        // 185 + 150 + 40 + 100, MAGI below the first IRMAA tier
        assert!((cost.total - 475.0).abs() < 1e-9);
        assert_eq!(cost.irmaa, 0.0);
    }

    #[test]
    fn test_irmaa_surcharge_from_lookback_magi() {
        let cost = cost_at(66, 150_000.0);
        // Third single tier: 185 + 33 monthly surcharge
        assert!((cost.irmaa - 218.0).abs() < 1e-9);
        assert!((cost.total - (475.0 + 218.0)).abs() < 1e-9);
    }

    #[test]
    fn test_medicare_start_date_before_65() {
        let mut healthcare = fixture();
        healthcare.pre_medicare.clear();
        healthcare.post_medicare[0].medicare_start_date = Some(DateSpec::At(YearMonth::new(2030, 1)));
        healthcare.irmaa.enabled = false;
        let start = YearMonth::new(2026, 1);
        let end = YearMonth::new(2060, 12);
        let cost = monthly_cost(
            &healthcare,
            60 * 12,
            None,
            YearMonth::new(2030, 6),
            start,
            end,
            0.0,
            FilingStatus::Single,
            &TaxTables::new(0.0),
            &BTreeMap::new(),
        );
        // Eligible by date even though under 65
        assert!((cost.total - 475.0).abs() < 1e-9);
    }
}
