//! Prioritized withdrawal strategy for covering cash shortfalls
//!
//! Accounts drain in the configured order until the shortfall is covered or
//! every withdrawable account is empty. Two passes: penalty-eligible
//! accounts are skipped first and only tapped as a last resort. Each drain
//! records its tax split so the caller can feed the year's accumulators.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::plan::{Account, AccountKind, Owner, Plan};

use super::basis::BasisTracker;

/// Age in months below which tax-advantaged withdrawals are penalized (59 1/2)
pub const PENALTY_AGE_MONTHS: i32 = 59 * 12 + 6;

/// Penalty rate on early withdrawals
const PENALTY_RATE: f64 = 0.10;

/// One account drain
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalEvent {
    pub account: String,
    pub amount: f64,
    /// Long-term gain realized (taxable accounts)
    pub realized_gain: f64,
    /// Ordinary income recognized (tax-deferred accounts)
    pub ordinary_income: f64,
    /// 10% early-withdrawal penalty attributed to this drain
    pub penalty: f64,
}

/// Result of a shortfall-coverage pass
#[derive(Debug, Clone, Default)]
pub struct WithdrawalOutcome {
    pub events: Vec<WithdrawalEvent>,
    /// Shortfall left uncovered after exhausting eligible accounts
    pub remaining: f64,
    pub total_withdrawn: f64,
    pub realized_gains: f64,
    pub ordinary_income: f64,
    pub penalties: f64,
}

fn owner_age_months(owner: Owner, primary: i32, spouse: Option<i32>) -> i32 {
    match owner {
        Owner::Spouse => spouse.unwrap_or(0),
        _ => primary,
    }
}

fn penalty_applies(account: &Account, primary: i32, spouse: Option<i32>) -> bool {
    matches!(
        account.kind,
        AccountKind::K401 | AccountKind::TraditionalIra | AccountKind::RothIra
    ) && owner_age_months(account.owner, primary, spouse) < PENALTY_AGE_MONTHS
}

/// Account names in drain priority order: the explicit name list, or the
/// kind sequence expanded in plan order, with unlisted accounts appended
fn ordered_account_names(plan: &Plan) -> Vec<&str> {
    let strategy = &plan.withdrawal_strategy;
    let mut names: Vec<&str> = Vec::new();

    if strategy.use_account_specific && !strategy.account_specific_order.is_empty() {
        for name in &strategy.account_specific_order {
            if plan.account(name).is_some() && !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
    } else {
        for kind in &strategy.order {
            for account in &plan.accounts {
                if account.kind == *kind && !names.contains(&account.name.as_str()) {
                    names.push(&account.name);
                }
            }
        }
    }

    for account in &plan.accounts {
        if !names.contains(&account.name.as_str()) {
            names.push(&account.name);
        }
    }
    names
}

#[allow(clippy::too_many_arguments)]
fn drain_pass(
    shortfall: &mut f64,
    ordered: &[&str],
    plan: &Plan,
    balances: &mut BTreeMap<String, f64>,
    taxable_basis: &mut BTreeMap<String, BasisTracker>,
    roth_basis: &mut BTreeMap<String, BasisTracker>,
    cash_account: &str,
    skip_penalized: bool,
    primary_age_months: i32,
    spouse_age_months: Option<i32>,
    outcome: &mut WithdrawalOutcome,
) {
    for name in ordered {
        if *shortfall <= 0.0 {
            break;
        }
        if *name == cash_account {
            continue;
        }
        let Some(account) = plan.account(name) else { continue };
        if !account.allow_withdrawals {
            continue;
        }
        let penalized = penalty_applies(account, primary_age_months, spouse_age_months);
        if skip_penalized && penalized {
            continue;
        }

        let balance_before = balances.get(*name).copied().unwrap_or(0.0).max(0.0);
        if balance_before <= 0.0 {
            continue;
        }

        let amount = balance_before.min(*shortfall);
        if let Some(balance) = balances.get_mut(*name) {
            *balance = (*balance - amount).max(0.0);
        }
        if let Some(cash) = balances.get_mut(cash_account) {
            *cash += amount;
        }

        let mut realized_gain = 0.0;
        let mut ordinary_income = 0.0;
        let mut penalty = 0.0;

        match account.kind {
            AccountKind::TaxableBrokerage => {
                if let Some(tracker) = taxable_basis.get_mut(*name) {
                    realized_gain = tracker.withdraw_average(amount, balance_before);
                }
            }
            AccountKind::K401 | AccountKind::TraditionalIra => {
                ordinary_income = amount;
                if penalized {
                    penalty = amount * PENALTY_RATE;
                }
            }
            AccountKind::RothIra => {
                // Early Roth draws are penalized only on earnings beyond
                // tracked contributions
                let earnings = roth_basis
                    .get_mut(*name)
                    .map(|tracker| tracker.withdraw_contributions_first(amount))
                    .unwrap_or(amount);
                if penalized {
                    penalty = earnings * PENALTY_RATE;
                }
            }
            _ => {}
        }

        outcome.total_withdrawn += amount;
        outcome.realized_gains += realized_gain;
        outcome.ordinary_income += ordinary_income;
        outcome.penalties += penalty;
        outcome.events.push(WithdrawalEvent {
            account: (*name).to_string(),
            amount,
            realized_gain,
            ordinary_income,
            penalty,
        });
        *shortfall -= amount;
    }
}

/// Drain accounts to move `shortfall` into the cash account. Balances never
/// go negative; an uncovered remainder is returned for the caller to treat
/// as insolvency.
#[allow(clippy::too_many_arguments)]
pub fn cover_shortfall(
    shortfall: f64,
    plan: &Plan,
    balances: &mut BTreeMap<String, f64>,
    taxable_basis: &mut BTreeMap<String, BasisTracker>,
    roth_basis: &mut BTreeMap<String, BasisTracker>,
    cash_account: &str,
    primary_age_months: i32,
    spouse_age_months: Option<i32>,
) -> WithdrawalOutcome {
    let mut outcome = WithdrawalOutcome::default();
    if shortfall <= 0.0 {
        return outcome;
    }

    let ordered = ordered_account_names(plan);
    let mut remaining = shortfall;

    drain_pass(
        &mut remaining,
        &ordered,
        plan,
        balances,
        taxable_basis,
        roth_basis,
        cash_account,
        true,
        primary_age_months,
        spouse_age_months,
        &mut outcome,
    );
    if remaining > 0.0 {
        drain_pass(
            &mut remaining,
            &ordered,
            plan,
            balances,
            taxable_basis,
            roth_basis,
            cash_account,
            false,
            primary_age_months,
            spouse_age_months,
            &mut outcome,
        );
    }

    outcome.remaining = remaining.max(0.0);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::loader::parse_plan;

    fn fixture_plan() -> Plan {
        parse_plan(
            r#"{
            "people": {"primary": {"name": "Pat", "birthday": "1980-06", "state": "WA"}},
            "filing_status": "single",
            "accounts": [
                {"name": "Cash", "type": "cash", "owner": "primary", "balance": 0,
                 "growth_rate": 0.0, "dividend_yield": 0.0, "dividend_tax_treatment": "tax_free",
                 "reinvest_dividends": false, "bond_allocation_percent": 100, "yearly_fees": 0.0,
                 "allow_withdrawals": true},
                {"name": "Brokerage", "type": "taxable_brokerage", "owner": "primary", "balance": 10000,
                 "cost_basis": 6000, "growth_rate": 0.0, "dividend_yield": 0.0,
                 "dividend_tax_treatment": "capital_gains", "reinvest_dividends": true,
                 "bond_allocation_percent": 0, "yearly_fees": 0.0, "allow_withdrawals": true},
                {"name": "IRA", "type": "traditional_ira", "owner": "primary", "balance": 50000,
                 "growth_rate": 0.0, "dividend_yield": 0.0, "dividend_tax_treatment": "tax_free",
                 "reinvest_dividends": true, "bond_allocation_percent": 0, "yearly_fees": 0.0,
                 "allow_withdrawals": true}
            ],
            "withdrawal_strategy": {
                "order": ["taxable_brokerage", "traditional_ira"],
                "use_account_specific": false,
                "rmd_satisfied_first": true
            },
            "plan_settings": {"plan_start": "2026-01", "plan_end": "2055-12",
                "inflation_rate": 0.03, "default_dividend_tax_treatment": "capital_gains"}
        }"#,
        )
        .unwrap()
    }

    struct Fixture {
        balances: BTreeMap<String, f64>,
        taxable_basis: BTreeMap<String, BasisTracker>,
        roth_basis: BTreeMap<String, BasisTracker>,
    }

    fn state_of(plan: &Plan) -> Fixture {
        let balances = plan
            .accounts
            .iter()
            .map(|a| (a.name.clone(), a.balance))
            .collect();
        let mut taxable_basis = BTreeMap::new();
        taxable_basis.insert("Brokerage".to_string(), BasisTracker::new(6_000.0));
        Fixture { balances, taxable_basis, roth_basis: BTreeMap::new() }
    }

    fn cover(fixture: &mut Fixture, plan: &Plan, shortfall: f64, age_months: i32) -> WithdrawalOutcome {
        cover_shortfall(
            shortfall,
            plan,
            &mut fixture.balances,
            &mut fixture.taxable_basis,
            &mut fixture.roth_basis,
            "Cash",
            age_months,
            None,
        )
    }

    #[test]
    fn test_drains_in_configured_order() {
        let plan = fixture_plan();
        let mut fixture = state_of(&plan);
        let outcome = cover(&mut fixture, &plan, 4_000.0, 65 * 12);

        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].account, "Brokerage");
        assert_eq!(outcome.remaining, 0.0);
        // 40% of the draw is gain under average cost
        assert!((outcome.realized_gains - 1_600.0).abs() < 1e-9);
        assert!((fixture.balances["Cash"] - 4_000.0).abs() < 1e-9);
        assert!((fixture.balances["Brokerage"] - 6_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_spills_to_next_account() {
        let plan = fixture_plan();
        let mut fixture = state_of(&plan);
        let outcome = cover(&mut fixture, &plan, 15_000.0, 65 * 12);

        assert_eq!(outcome.events.len(), 2);
        assert_eq!(outcome.events[1].account, "IRA");
        assert!((outcome.events[1].amount - 5_000.0).abs() < 1e-9);
        // IRA draw is ordinary income, no penalty at 65
        assert!((outcome.ordinary_income - 5_000.0).abs() < 1e-9);
        assert_eq!(outcome.penalties, 0.0);
    }

    #[test]
    fn test_penalized_accounts_are_last_resort() {
        let plan = fixture_plan();
        let mut fixture = state_of(&plan);
        let outcome = cover(&mut fixture, &plan, 12_000.0, 45 * 12);

        // Brokerage first (no penalty), then the IRA despite the penalty
        assert_eq!(outcome.events[0].account, "Brokerage");
        assert_eq!(outcome.events[1].account, "IRA");
        assert!((outcome.events[1].penalty - 200.0).abs() < 1e-9);
        assert!((outcome.penalties - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_uncovered_remainder_reported() {
        let plan = fixture_plan();
        let mut fixture = state_of(&plan);
        let outcome = cover(&mut fixture, &plan, 100_000.0, 65 * 12);

        assert!((outcome.remaining - 40_000.0).abs() < 1e-9);
        assert!((outcome.total_withdrawn - 60_000.0).abs() < 1e-9);
        assert_eq!(fixture.balances["Brokerage"], 0.0);
        assert_eq!(fixture.balances["IRA"], 0.0);
        // Full drain leaves no basis behind
        assert_eq!(fixture.taxable_basis["Brokerage"].total(), 0.0);
    }

    #[test]
    fn test_disallowed_accounts_are_skipped() {
        let mut plan = fixture_plan();
        plan.accounts[2].allow_withdrawals = false;
        let mut fixture = state_of(&plan);
        let outcome = cover(&mut fixture, &plan, 20_000.0, 65 * 12);

        assert_eq!(outcome.events.len(), 1);
        assert!((outcome.remaining - 10_000.0).abs() < 1e-9);
        assert!((fixture.balances["IRA"] - 50_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_account_specific_order_wins() {
        let mut plan = fixture_plan();
        plan.withdrawal_strategy.use_account_specific = true;
        plan.withdrawal_strategy.account_specific_order = vec!["IRA".into(), "Brokerage".into()];
        let mut fixture = state_of(&plan);
        let outcome = cover(&mut fixture, &plan, 1_000.0, 65 * 12);
        assert_eq!(outcome.events[0].account, "IRA");
    }

    #[test]
    fn test_early_roth_penalty_on_earnings_only() {
        let mut plan = fixture_plan();
        plan.accounts[2].name = "Roth".into();
        plan.accounts[2].kind = AccountKind::RothIra;
        plan.withdrawal_strategy.order = vec![AccountKind::RothIra];
        let mut fixture = state_of(&plan);
        // 30,000 of the 50,000 Roth balance is contributions
        fixture.roth_basis.insert("Roth".to_string(), BasisTracker::new(30_000.0));

        // The non-penalized brokerage covers 10,000 first; the Roth supplies
        // the other 35,000, of which 5,000 exceeds tracked contributions
        let outcome = cover(&mut fixture, &plan, 45_000.0, 45 * 12);
        let roth_event = outcome.events.iter().find(|e| e.account == "Roth").unwrap();
        assert!((roth_event.amount - 35_000.0).abs() < 1e-9);
        assert!((roth_event.penalty - 500.0).abs() < 1e-9);
        // Roth draws are never ordinary income
        assert_eq!(roth_event.ordinary_income, 0.0);
    }
}
