//! Load a plan from its JSON file

use std::fs;
use std::path::Path;

use thiserror::Error;

use super::data::Plan;

/// Failure to produce a runnable plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse plan JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("plan failed validation with {} error(s)", .0.len())]
    Invalid(Vec<String>),
}

/// Load and deserialize a plan. Unknown keys are rejected by the schema;
/// cross-reference validation is a separate pass (`validate_plan`).
pub fn load_plan<P: AsRef<Path>>(path: P) -> Result<Plan, PlanError> {
    let raw = fs::read_to_string(path)?;
    let plan: Plan = serde_json::from_str(&raw)?;
    Ok(plan)
}

/// Parse a plan from an in-memory JSON string
pub fn parse_plan(raw: &str) -> Result<Plan, PlanError> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "people": {"primary": {"name": "Pat", "birthday": "1980-06", "state": "WA"}},
        "filing_status": "single",
        "accounts": [{
            "name": "Checking",
            "type": "cash",
            "owner": "primary",
            "balance": 25000,
            "growth_rate": 0.0,
            "dividend_yield": 0.0,
            "dividend_tax_treatment": "tax_free",
            "reinvest_dividends": false,
            "bond_allocation_percent": 100,
            "yearly_fees": 0.0,
            "allow_withdrawals": true
        }],
        "plan_settings": {
            "plan_start": "2026-01",
            "plan_end": "2030-12",
            "inflation_rate": 0.03,
            "default_dividend_tax_treatment": "capital_gains"
        }
    }"#;

    #[test]
    fn test_parse_minimal_plan() {
        let plan = parse_plan(MINIMAL).unwrap();
        assert_eq!(plan.accounts.len(), 1);
        assert_eq!(plan.cash_account(), Some("Checking"));
        assert_eq!(plan.primary_state(), "WA");
        assert!(plan.simulation_settings.monte_carlo.num_simulations == 1000);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let raw = MINIMAL.replacen("\"filing_status\"", "\"surprise\": 1, \"filing_status\"", 1);
        let err = parse_plan(&raw).unwrap_err();
        assert!(matches!(err, PlanError::Parse(_)));
    }

    #[test]
    fn test_bad_enum_rejected() {
        let raw = MINIMAL.replace("\"single\"", "\"unmarried\"");
        assert!(parse_plan(&raw).is_err());
    }
}
