//! Tax bracket and threshold reference data
//!
//! All dollar figures are for the 2026 base year. For later years every
//! threshold is extrapolated by `(1 + inflation)^(year - 2026)`; marginal
//! rates never change. Data layout follows the bundled-table approach used
//! for the actuarial assumption tables this module grew out of: immutable
//! compile-time data behind accessor methods on a container struct.

use crate::plan::FilingStatus;

/// Last year with bundled bracket data
pub const BASE_TAX_YEAR: i32 = 2026;

/// One marginal bracket: `upper` is the top of the bracket, `None` = infinity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub upper: Option<f64>,
    pub rate: f64,
}

type BaseBracket = (Option<f64>, f64);

const FEDERAL_SINGLE: &[BaseBracket] = &[
    (Some(11_925.0), 0.10),
    (Some(48_475.0), 0.12),
    (Some(103_350.0), 0.22),
    (Some(197_300.0), 0.24),
    (Some(250_525.0), 0.32),
    (Some(626_350.0), 0.35),
    (None, 0.37),
];

const FEDERAL_MFJ: &[BaseBracket] = &[
    (Some(23_850.0), 0.10),
    (Some(96_950.0), 0.12),
    (Some(206_700.0), 0.22),
    (Some(394_600.0), 0.24),
    (Some(501_050.0), 0.32),
    (Some(751_600.0), 0.35),
    (None, 0.37),
];

const FEDERAL_MFS: &[BaseBracket] = &[
    (Some(11_925.0), 0.10),
    (Some(48_475.0), 0.12),
    (Some(103_350.0), 0.22),
    (Some(197_300.0), 0.24),
    (Some(250_525.0), 0.32),
    (Some(375_800.0), 0.35),
    (None, 0.37),
];

const FEDERAL_HOH: &[BaseBracket] = &[
    (Some(17_000.0), 0.10),
    (Some(64_850.0), 0.12),
    (Some(103_350.0), 0.22),
    (Some(197_300.0), 0.24),
    (Some(250_500.0), 0.32),
    (Some(626_350.0), 0.35),
    (None, 0.37),
];

const LTCG_SINGLE: &[BaseBracket] = &[(Some(48_350.0), 0.00), (Some(533_400.0), 0.15), (None, 0.20)];
const LTCG_MFJ: &[BaseBracket] = &[(Some(96_700.0), 0.00), (Some(600_050.0), 0.15), (None, 0.20)];
const LTCG_MFS: &[BaseBracket] = &[(Some(48_350.0), 0.00), (Some(300_000.0), 0.15), (None, 0.20)];
const LTCG_HOH: &[BaseBracket] = &[(Some(64_750.0), 0.00), (Some(566_700.0), 0.15), (None, 0.20)];

/// AMT schedule: 26% up to the breakpoint, 28% above
const AMT_BRACKETS: &[BaseBracket] = &[(Some(220_700.0), 0.26), (None, 0.28)];

/// IRMAA tiers: (MAGI upper bound, monthly Part B surcharge, monthly Part D surcharge)
type IrmaaTier = (Option<f64>, f64, f64);

const IRMAA_SINGLE: &[IrmaaTier] = &[
    (Some(106_000.0), 0.0, 0.0),
    (Some(133_000.0), 74.0, 13.0),
    (Some(167_000.0), 185.0, 33.0),
    (Some(200_000.0), 296.0, 52.0),
    (Some(500_000.0), 407.0, 71.0),
    (None, 444.0, 82.0),
];

const IRMAA_MFJ: &[IrmaaTier] = &[
    (Some(212_000.0), 0.0, 0.0),
    (Some(266_000.0), 74.0, 13.0),
    (Some(334_000.0), 185.0, 33.0),
    (Some(400_000.0), 296.0, 52.0),
    (Some(750_000.0), 407.0, 71.0),
    (None, 444.0, 82.0),
];

const IRMAA_MFS: &[IrmaaTier] = &[
    (Some(106_000.0), 0.0, 0.0),
    (Some(133_000.0), 407.0, 71.0),
    (None, 444.0, 82.0),
];

/// FICA parameters for the base year
pub const SOCIAL_SECURITY_RATE: f64 = 0.062;
pub const SOCIAL_SECURITY_WAGE_BASE: f64 = 180_000.0;
pub const MEDICARE_RATE: f64 = 0.0145;
pub const ADDITIONAL_MEDICARE_RATE: f64 = 0.009;
const ADDITIONAL_MEDICARE_SINGLE_THRESHOLD: f64 = 200_000.0;
const ADDITIONAL_MEDICARE_JOINT_THRESHOLD: f64 = 250_000.0;

/// Social Security benefit taxation combined-income thresholds
const SS_TAX_THRESHOLDS_SINGLE: (f64, f64) = (25_000.0, 34_000.0);
const SS_TAX_THRESHOLDS_JOINT: (f64, f64) = (32_000.0, 44_000.0);
const SS_TAX_THRESHOLDS_MFS: (f64, f64) = (0.0, 0.0);

/// Effective state income tax rates, represented uniformly as single-bracket
/// schedules. No-income-tax states carry a zero rate.
fn state_flat_rate(state: &str) -> f64 {
    match state {
        "AL" => 0.0500,
        "AK" => 0.0000,
        "AZ" => 0.0250,
        "AR" => 0.0390,
        "CA" => 0.0930,
        "CO" => 0.0440,
        "CT" => 0.0500,
        "DE" => 0.0520,
        "FL" => 0.0000,
        "GA" => 0.0530,
        "HI" => 0.0800,
        "ID" => 0.0580,
        "IL" => 0.0495,
        "IN" => 0.0300,
        "IA" => 0.0570,
        "KS" => 0.0520,
        "KY" => 0.0450,
        "LA" => 0.0300,
        "ME" => 0.0710,
        "MD" => 0.0575,
        "MA" => 0.0500,
        "MI" => 0.0425,
        "MN" => 0.0680,
        "MS" => 0.0470,
        "MO" => 0.0470,
        "MT" => 0.0590,
        "NE" => 0.0560,
        "NV" => 0.0000,
        "NH" => 0.0000,
        "NJ" => 0.0630,
        "NM" => 0.0490,
        "NY" => 0.0650,
        "NC" => 0.0475,
        "ND" => 0.0250,
        "OH" => 0.0350,
        "OK" => 0.0475,
        "OR" => 0.0870,
        "PA" => 0.0307,
        "RI" => 0.0550,
        "SC" => 0.0640,
        "SD" => 0.0000,
        "TN" => 0.0000,
        "TX" => 0.0000,
        "UT" => 0.0480,
        "VT" => 0.0660,
        "VA" => 0.0575,
        "WA" => 0.0000,
        "WV" => 0.0510,
        "WI" => 0.0530,
        "WY" => 0.0000,
        "DC" => 0.0850,
        _ => 0.0,
    }
}

/// Container bundling all tax lookups with the plan's inflation assumption.
/// Built once per run and shared by the monthly engine and the annual
/// settlement.
#[derive(Debug, Clone)]
pub struct TaxTables {
    inflation_rate: f64,
}

impl TaxTables {
    pub fn new(inflation_rate: f64) -> Self {
        Self { inflation_rate }
    }

    /// Threshold extrapolation factor for a tax year
    pub fn year_factor(&self, year: i32) -> f64 {
        let delta = (year - BASE_TAX_YEAR).max(0);
        (1.0 + self.inflation_rate).powi(delta)
    }

    fn inflate(&self, base: &[BaseBracket], year: i32) -> Vec<Bracket> {
        let factor = self.year_factor(year);
        base.iter()
            .map(|&(upper, rate)| Bracket { upper: upper.map(|u| u * factor), rate })
            .collect()
    }

    pub fn standard_deduction(&self, status: FilingStatus, year: i32) -> f64 {
        let base = match status {
            FilingStatus::Single | FilingStatus::MarriedFilingSeparately => 15_000.0,
            FilingStatus::MarriedFilingJointly | FilingStatus::QualifyingSurvivingSpouse => 30_000.0,
            FilingStatus::HeadOfHousehold => 22_500.0,
        };
        base * self.year_factor(year)
    }

    pub fn federal_brackets(&self, status: FilingStatus, year: i32) -> Vec<Bracket> {
        let base = match status {
            FilingStatus::Single => FEDERAL_SINGLE,
            FilingStatus::MarriedFilingJointly | FilingStatus::QualifyingSurvivingSpouse => FEDERAL_MFJ,
            FilingStatus::MarriedFilingSeparately => FEDERAL_MFS,
            FilingStatus::HeadOfHousehold => FEDERAL_HOH,
        };
        self.inflate(base, year)
    }

    /// Upper bound of the federal bracket with the given marginal rate, used
    /// for fill-to-bracket Roth conversions. None for an unknown rate or the
    /// open top bracket.
    pub fn federal_bracket_top(&self, status: FilingStatus, year: i32, rate: f64) -> Option<f64> {
        self.federal_brackets(status, year)
            .into_iter()
            .find(|b| (b.rate - rate).abs() < 1e-9)
            .and_then(|b| b.upper)
    }

    pub fn capital_gains_brackets(&self, status: FilingStatus, year: i32) -> Vec<Bracket> {
        let base = match status {
            FilingStatus::Single => LTCG_SINGLE,
            FilingStatus::MarriedFilingJointly | FilingStatus::QualifyingSurvivingSpouse => LTCG_MFJ,
            FilingStatus::MarriedFilingSeparately => LTCG_MFS,
            FilingStatus::HeadOfHousehold => LTCG_HOH,
        };
        self.inflate(base, year)
    }

    pub fn niit_threshold(&self, status: FilingStatus, year: i32) -> f64 {
        let base = match status {
            FilingStatus::Single | FilingStatus::HeadOfHousehold => 200_000.0,
            FilingStatus::MarriedFilingJointly | FilingStatus::QualifyingSurvivingSpouse => 250_000.0,
            FilingStatus::MarriedFilingSeparately => 125_000.0,
        };
        base * self.year_factor(year)
    }

    /// AMT `(exemption, phase-out start)` for a status and year
    pub fn amt_exemption(&self, status: FilingStatus, year: i32) -> (f64, f64) {
        let (exemption, phaseout) = match status {
            FilingStatus::Single | FilingStatus::HeadOfHousehold => (88_100.0, 626_350.0),
            FilingStatus::MarriedFilingJointly | FilingStatus::QualifyingSurvivingSpouse => {
                (137_000.0, 1_252_700.0)
            }
            FilingStatus::MarriedFilingSeparately => (68_500.0, 626_350.0),
        };
        let factor = self.year_factor(year);
        (exemption * factor, phaseout * factor)
    }

    pub fn amt_brackets(&self, year: i32) -> Vec<Bracket> {
        self.inflate(AMT_BRACKETS, year)
    }

    pub fn state_brackets(&self, state: &str, year: i32) -> Vec<Bracket> {
        let _ = year; // flat schedules have no dollar thresholds to extrapolate
        vec![Bracket { upper: None, rate: state_flat_rate(&state.to_uppercase()) }]
    }

    /// Monthly IRMAA `(Part B, Part D)` surcharge for the tier the lookback
    /// MAGI lands in, with both thresholds and surcharges extrapolated
    pub fn irmaa_surcharge(&self, status: FilingStatus, year: i32, lookback_magi: f64) -> (f64, f64) {
        let tiers = match status {
            FilingStatus::MarriedFilingJointly | FilingStatus::QualifyingSurvivingSpouse => IRMAA_MFJ,
            FilingStatus::MarriedFilingSeparately => IRMAA_MFS,
            FilingStatus::Single | FilingStatus::HeadOfHousehold => IRMAA_SINGLE,
        };
        let factor = self.year_factor(year);
        for &(upper, part_b, part_d) in tiers {
            match upper {
                Some(bound) if lookback_magi > bound * factor => continue,
                _ => return (part_b * factor, part_d * factor),
            }
        }
        (0.0, 0.0)
    }

    pub fn social_security_wage_base(&self, year: i32) -> f64 {
        SOCIAL_SECURITY_WAGE_BASE * self.year_factor(year)
    }

    pub fn additional_medicare_threshold(&self, status: FilingStatus, year: i32) -> f64 {
        let base = if status.is_joint() {
            ADDITIONAL_MEDICARE_JOINT_THRESHOLD
        } else {
            ADDITIONAL_MEDICARE_SINGLE_THRESHOLD
        };
        base * self.year_factor(year)
    }

    /// Combined-income thresholds for Social Security benefit taxation.
    /// These are fixed in law and are not inflation indexed.
    pub fn ss_taxability_thresholds(&self, status: FilingStatus) -> (f64, f64) {
        match status {
            FilingStatus::MarriedFilingJointly | FilingStatus::QualifyingSurvivingSpouse => {
                SS_TAX_THRESHOLDS_JOINT
            }
            FilingStatus::MarriedFilingSeparately => SS_TAX_THRESHOLDS_MFS,
            FilingStatus::Single | FilingStatus::HeadOfHousehold => SS_TAX_THRESHOLDS_SINGLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_year_brackets_not_inflated() {
        let tables = TaxTables::new(0.025);
        let brackets = tables.federal_brackets(FilingStatus::Single, BASE_TAX_YEAR);
        assert_eq!(brackets[0].upper, Some(11_925.0));
        assert_eq!(brackets.last().unwrap().upper, None);
        assert_eq!(brackets.last().unwrap().rate, 0.37);
    }

    #[test]
    fn test_future_year_thresholds_extrapolate() {
        let tables = TaxTables::new(0.025);
        let brackets = tables.federal_brackets(FilingStatus::Single, BASE_TAX_YEAR + 4);
        let expected = 11_925.0 * 1.025_f64.powi(4);
        assert!((brackets[0].upper.unwrap() - expected).abs() < 1e-6);
        // Rates are never extrapolated
        assert_eq!(brackets[0].rate, 0.10);
    }

    #[test]
    fn test_bracket_top_lookup() {
        let tables = TaxTables::new(0.025);
        let top = tables
            .federal_bracket_top(FilingStatus::MarriedFilingJointly, BASE_TAX_YEAR, 0.22)
            .unwrap();
        assert_eq!(top, 206_700.0);
        assert!(tables
            .federal_bracket_top(FilingStatus::Single, BASE_TAX_YEAR, 0.37)
            .is_none());
    }

    #[test]
    fn test_irmaa_tier_selection() {
        let tables = TaxTables::new(0.0);
        let (b, d) = tables.irmaa_surcharge(FilingStatus::Single, BASE_TAX_YEAR, 100_000.0);
        assert_eq!((b, d), (0.0, 0.0));
        let (b, d) = tables.irmaa_surcharge(FilingStatus::Single, BASE_TAX_YEAR, 150_000.0);
        assert_eq!((b, d), (185.0, 33.0));
        let (b, d) = tables.irmaa_surcharge(FilingStatus::Single, BASE_TAX_YEAR, 1_000_000.0);
        assert_eq!((b, d), (444.0, 82.0));
    }

    #[test]
    fn test_no_tax_states_are_zero() {
        let tables = TaxTables::new(0.025);
        for state in ["WA", "TX", "FL", "NV", "WY", "SD", "TN", "AK", "NH"] {
            assert_eq!(tables.state_brackets(state, BASE_TAX_YEAR)[0].rate, 0.0);
        }
        assert_eq!(tables.state_brackets("ca", BASE_TAX_YEAR)[0].rate, 0.0930);
    }
}
