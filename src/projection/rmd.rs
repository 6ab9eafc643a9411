//! Required Minimum Distributions
//!
//! IRS Uniform Lifetime divisors tabulated from age 72; the first
//! distribution happens in December of the year the account owner reaches
//! the configured start age (no April-1 deferral), computed against prior
//! year-end balances.

/// (age, divisor) pairs from the Uniform Lifetime Table
const UNIFORM_LIFETIME: &[(u32, f64)] = &[
    (72, 27.4),
    (73, 26.5),
    (74, 25.5),
    (75, 24.6),
    (76, 23.7),
    (77, 22.9),
    (78, 22.0),
    (79, 21.1),
    (80, 20.2),
    (81, 19.4),
    (82, 18.5),
    (83, 17.7),
    (84, 16.8),
    (85, 16.0),
    (86, 15.2),
    (87, 14.4),
    (88, 13.7),
    (89, 12.9),
    (90, 12.2),
    (91, 11.5),
    (92, 10.8),
    (93, 10.1),
    (94, 9.5),
    (95, 8.9),
    (96, 8.4),
    (97, 7.8),
    (98, 7.3),
    (99, 6.8),
    (100, 6.4),
    (101, 6.0),
    (102, 5.6),
    (103, 5.2),
    (104, 4.9),
    (105, 4.6),
    (106, 4.3),
    (107, 4.1),
    (108, 3.9),
    (109, 3.7),
    (110, 3.5),
    (111, 3.4),
    (112, 3.3),
    (113, 3.1),
    (114, 3.0),
    (115, 2.9),
    (116, 2.8),
    (117, 2.7),
    (118, 2.5),
    (119, 2.3),
    (120, 2.0),
];

/// Uniform Lifetime divisor for an attained age in whole years.
/// Ages past the end of the table keep the final divisor.
pub fn divisor_for_age(age_years: u32) -> Option<f64> {
    let (first_age, _) = UNIFORM_LIFETIME[0];
    let (last_age, last_divisor) = UNIFORM_LIFETIME[UNIFORM_LIFETIME.len() - 1];
    if age_years < first_age {
        return None;
    }
    if age_years > last_age {
        return Some(last_divisor);
    }
    UNIFORM_LIFETIME
        .iter()
        .find(|&&(age, _)| age == age_years)
        .map(|&(_, divisor)| divisor)
}

/// Required distribution for one account given its prior year-end balance
pub fn required_distribution(prior_year_end_balance: f64, age_years: u32) -> f64 {
    match divisor_for_age(age_years) {
        Some(divisor) if prior_year_end_balance > 0.0 => {
            (prior_year_end_balance / divisor).max(0.0)
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisor_lookup() {
        assert_eq!(divisor_for_age(71), None);
        assert_eq!(divisor_for_age(72), Some(27.4));
        assert_eq!(divisor_for_age(73), Some(26.5));
        assert_eq!(divisor_for_age(120), Some(2.0));
        assert_eq!(divisor_for_age(125), Some(2.0));
    }

    #[test]
    fn test_required_distribution_at_73() {
        let rmd = required_distribution(1_000_000.0, 73);
        assert!((rmd - 1_000_000.0 / 26.5).abs() < 0.01);
    }

    #[test]
    fn test_no_distribution_below_table() {
        assert_eq!(required_distribution(1_000_000.0, 70), 0.0);
        assert_eq!(required_distribution(0.0, 80), 0.0);
        assert_eq!(required_distribution(-5.0, 80), 0.0);
    }
}
