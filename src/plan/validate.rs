//! Semantic and cross-reference validation for plans
//!
//! Errors carry JSON-path context (`accounts[2].cost_basis: ...`) so the
//! caller can point at the offending field. Warnings flag unusual but
//! permitted configurations; the run proceeds past them.

use std::collections::HashSet;

use crate::simulation::history;

use super::data::{
    AccountKind, ChangePolicy, ColaAssumption, DateSpec, FilingStatus, Owner, Plan, SimMode,
    TaxHandling, TransactionKind,
};

/// Outcome of a validation pass
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: &str, message: &str) {
        self.errors.push(format!("{path}: {message}"));
    }

    fn warn(&mut self, path: &str, message: &str) {
        self.warnings.push(format!("{path}: {message}"));
    }
}

/// Two-letter state codes with a bundled tax schedule
const STATE_CODES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC",
];

fn check_owner(v: &mut Validation, path: &str, owner: Owner, spouse_exists: bool, allow_joint: bool) {
    if owner == Owner::Joint && !allow_joint {
        v.error(path, "'joint' is not a valid owner here");
    }
    if owner == Owner::Spouse && !spouse_exists {
        v.error(path, "references spouse, but people.spouse is missing");
    }
}

fn check_window(v: &mut Validation, base: &str, start: DateSpec, end: DateSpec, plan: &Plan) {
    let ps = plan.plan_start();
    let pe = plan.plan_end();
    if start.resolve(ps, pe).index() > end.resolve(ps, pe).index() {
        v.error(&format!("{base}.start_date/{base}.end_date"), "start_date must be <= end_date");
    }
}

fn check_change_rate(v: &mut Validation, base: &str, policy: ChangePolicy, rate: Option<f64>) {
    if policy.requires_rate() && rate.is_none() {
        v.error(
            &format!("{base}.change_rate"),
            "required for increase/decrease/inflation_plus/inflation_minus",
        );
    }
}

/// Validate a parsed plan. The simulation runner refuses to run a plan
/// whose validation reports any error.
pub fn validate_plan(plan: &Plan) -> Validation {
    let mut v = Validation::default();
    let spouse_exists = plan.people.spouse.is_some();

    if plan.filing_status.requires_spouse() && !spouse_exists {
        v.errors.push(format!(
            "filing_status: '{}' requires people.spouse",
            status_name(plan.filing_status)
        ));
    }
    if matches!(plan.filing_status, FilingStatus::Single | FilingStatus::HeadOfHousehold)
        && spouse_exists
    {
        v.warnings.push(format!(
            "filing_status: '{}' with people.spouse present is unusual but allowed",
            status_name(plan.filing_status)
        ));
    }

    if plan.people.primary.state.is_none() {
        v.error("people.primary.state", "required for the primary person");
    } else {
        let state = plan.primary_state().to_uppercase();
        if !STATE_CODES.contains(&state.as_str()) {
            v.error("people.primary.state", "unknown state code");
        }
    }

    if plan.plan_start().index() > plan.plan_end().index() {
        v.errors
            .push("plan_settings.plan_start/plan_settings.plan_end: plan_start must be <= plan_end".into());
    }
    if !(0.0..0.5).contains(&plan.plan_settings.inflation_rate.abs()) {
        v.warn("plan_settings.inflation_rate", "implausible inflation assumption");
    }

    let mut account_names: HashSet<&str> = HashSet::new();
    for (idx, account) in plan.accounts.iter().enumerate() {
        let base = format!("accounts[{idx}]");
        if !account_names.insert(account.name.as_str()) {
            v.error(&format!("{base}.name"), &format!("duplicate account name '{}'", account.name));
        }
        check_owner(&mut v, &format!("{base}.owner"), account.owner, spouse_exists, false);
        if account.kind == AccountKind::TaxableBrokerage && account.cost_basis.is_none() {
            v.error(&format!("{base}.cost_basis"), "required for taxable_brokerage accounts");
        }
        if account.kind != AccountKind::TaxableBrokerage && account.cost_basis.is_some() {
            v.warn(&format!("{base}.cost_basis"), "only meaningful for taxable_brokerage accounts");
        }
        if !(0.0..=100.0).contains(&account.bond_allocation_percent) {
            v.error(&format!("{base}.bond_allocation_percent"), "must be between 0 and 100");
        }
        if account.growth_rate.abs() > 0.5 {
            v.warn(&format!("{base}.growth_rate"), "implausible annual growth rate");
        }
    }

    if plan.cash_account().is_none() {
        v.errors.push("accounts: at least one cash account is required".into());
    }

    let income_names: HashSet<&str> = plan.income.iter().map(|i| i.name.as_str()).collect();

    for (idx, item) in plan.contributions.iter().enumerate() {
        let base = format!("contributions[{idx}]");
        if item.source_account != "income" && !account_names.contains(item.source_account.as_str()) {
            v.error(
                &format!("{base}.source_account"),
                &format!("'{}' does not match any account name", item.source_account),
            );
        }
        if !account_names.contains(item.destination_account.as_str()) {
            v.error(
                &format!("{base}.destination_account"),
                &format!("'{}' does not match any account name", item.destination_account),
            );
        }
        check_change_rate(&mut v, &base, item.change_over_time, item.change_rate);
        check_window(&mut v, &base, item.start_date, item.end_date, plan);
        if let Some(m) = &item.employer_match {
            if !income_names.contains(m.salary_reference.as_str()) {
                v.error(
                    &format!("{base}.employer_match.salary_reference"),
                    &format!("'{}' does not match any income name", m.salary_reference),
                );
            }
        }
    }

    for (idx, item) in plan.income.iter().enumerate() {
        let base = format!("income[{idx}]");
        check_owner(&mut v, &format!("{base}.owner"), item.owner, spouse_exists, false);
        if item.tax_handling == TaxHandling::Withhold && item.withhold_percent.is_none() {
            v.error(&format!("{base}.withhold_percent"), "required when tax_handling is 'withhold'");
        }
        check_change_rate(&mut v, &base, item.change_over_time, item.change_rate);
        check_window(&mut v, &base, item.start_date, item.end_date, plan);
    }

    for (idx, item) in plan.expenses.iter().enumerate() {
        let base = format!("expenses[{idx}]");
        check_owner(&mut v, &format!("{base}.owner"), item.owner, spouse_exists, true);
        check_change_rate(&mut v, &base, item.change_over_time, item.change_rate);
        check_window(&mut v, &base, item.start_date, item.end_date, plan);
    }

    for (idx, item) in plan.social_security.iter().enumerate() {
        let base = format!("social_security[{idx}]");
        check_owner(&mut v, &format!("{base}.owner"), item.owner, spouse_exists, false);
        if matches!(item.cola_assumption, ColaAssumption::InflationPlus | ColaAssumption::InflationMinus)
            && item.cola_rate.is_none()
        {
            v.error(
                &format!("{base}.cola_rate"),
                "required when cola_assumption is inflation_plus or inflation_minus",
            );
        }
        if item.claiming_age_years < 62 || item.claiming_age_years > 70 {
            v.warn(&format!("{base}.claiming_age_years"), "claiming age outside 62-70 is unusual");
        }
    }

    for (idx, item) in plan.healthcare.pre_medicare.iter().enumerate() {
        let base = format!("healthcare.pre_medicare[{idx}]");
        check_owner(&mut v, &format!("{base}.owner"), item.owner, spouse_exists, false);
        check_change_rate(&mut v, &base, item.change_over_time, item.change_rate);
    }
    for (idx, item) in plan.healthcare.post_medicare.iter().enumerate() {
        let base = format!("healthcare.post_medicare[{idx}]");
        check_owner(&mut v, &format!("{base}.owner"), item.owner, spouse_exists, false);
        check_change_rate(&mut v, &base, item.change_over_time, item.change_rate);
    }

    let mut asset_names: HashSet<&str> = HashSet::new();
    for (idx, asset) in plan.real_assets.iter().enumerate() {
        let base = format!("real_assets[{idx}]");
        if !asset_names.insert(asset.name.as_str()) {
            v.error(&format!("{base}.name"), &format!("duplicate real asset name '{}'", asset.name));
        }
        check_change_rate(&mut v, &base, asset.change_over_time, asset.change_rate);
        if let Some(m) = &asset.mortgage {
            if m.remaining_balance < 0.0 {
                v.error(&format!("{base}.mortgage.remaining_balance"), "must be non-negative");
            }
        }
    }

    for (idx, txn) in plan.transactions.iter().enumerate() {
        let base = format!("transactions[{idx}]");
        if let Some(linked) = &txn.linked_asset {
            if !asset_names.contains(linked.as_str()) {
                v.error(
                    &format!("{base}.linked_asset"),
                    &format!("'{linked}' does not match any real asset name"),
                );
            } else if txn.kind == TransactionKind::SellAsset {
                let referenced = plan.real_assets.iter().find(|a| &a.name == linked);
                if referenced.is_some_and(|a| a.purchase_price.is_none()) {
                    v.error(
                        &format!("{base}.linked_asset"),
                        "referenced asset needs purchase_price for sell_asset transactions",
                    );
                }
            }
        }
        if let Some(deposit) = &txn.deposit_to_account {
            if !account_names.contains(deposit.as_str()) {
                v.error(
                    &format!("{base}.deposit_to_account"),
                    &format!("'{deposit}' does not match any account name"),
                );
            }
        }
    }

    for (idx, transfer) in plan.transfers.iter().enumerate() {
        let base = format!("transfers[{idx}]");
        if !account_names.contains(transfer.from_account.as_str()) {
            v.error(
                &format!("{base}.from_account"),
                &format!("'{}' does not match any account name", transfer.from_account),
            );
        }
        if !account_names.contains(transfer.to_account.as_str()) {
            v.error(
                &format!("{base}.to_account"),
                &format!("'{}' does not match any account name", transfer.to_account),
            );
        }
        check_window(&mut v, &base, transfer.start_date, transfer.end_date, plan);
    }

    for (idx, conversion) in plan.roth_conversions.iter().enumerate() {
        let base = format!("roth_conversions[{idx}]");
        check_window(&mut v, &base, conversion.start_date, conversion.end_date, plan);
        match plan.account(&conversion.from_account) {
            None => v.error(
                &format!("{base}.from_account"),
                &format!("'{}' does not match any account name", conversion.from_account),
            ),
            Some(src) if !src.kind.is_tax_deferred() => {
                v.error(&format!("{base}.from_account"), "must be traditional_ira or 401k")
            }
            Some(_) => {}
        }
        match plan.account(&conversion.to_account) {
            None => v.error(
                &format!("{base}.to_account"),
                &format!("'{}' does not match any account name", conversion.to_account),
            ),
            Some(dst) if dst.kind != AccountKind::RothIra => {
                v.error(&format!("{base}.to_account"), "must be roth_ira")
            }
            Some(_) => {}
        }
        if conversion.annual_amount.is_none() && conversion.fill_to_bracket.is_none() {
            v.error(&base, "needs either annual_amount or fill_to_bracket");
        }
    }

    if plan.withdrawal_strategy.use_account_specific {
        for (idx, name) in plan.withdrawal_strategy.account_specific_order.iter().enumerate() {
            if !account_names.contains(name.as_str()) {
                v.error(
                    &format!("withdrawal_strategy.account_specific_order[{idx}]"),
                    &format!("'{name}' does not match any account name"),
                );
            }
        }
    }

    if plan.rmds.enabled {
        for (idx, name) in plan.rmds.accounts.iter().enumerate() {
            match plan.account(name) {
                None => v.error(
                    &format!("rmds.accounts[{idx}]"),
                    &format!("'{name}' does not match any account name"),
                ),
                Some(account) if !account.kind.is_tax_deferred() => {
                    v.error(&format!("rmds.accounts[{idx}]"), "account must be 401k or traditional_ira")
                }
                Some(_) => {}
            }
        }
        match &plan.rmds.destination_account {
            None => v.error("rmds.destination_account", "required when rmds are enabled"),
            Some(name) if !account_names.contains(name.as_str()) => v.error(
                "rmds.destination_account",
                &format!("'{name}' does not match any account name"),
            ),
            Some(_) => {}
        }
    }

    // Mode parameters are fatal pre-run errors
    match plan.simulation_settings.mode {
        SimMode::MonteCarlo => {
            let mc = &plan.simulation_settings.monte_carlo;
            if !(-1.0..=1.0).contains(&mc.correlation) {
                v.error("simulation_settings.monte_carlo.correlation", "must be within [-1, 1]");
            }
            if mc.num_simulations == 0 {
                v.error("simulation_settings.monte_carlo.num_simulations", "must be at least 1");
            }
            if mc.stock_std_dev < 0.0 || mc.bond_std_dev < 0.0 {
                v.error("simulation_settings.monte_carlo", "standard deviations must be non-negative");
            }
        }
        SimMode::Historical => {
            let hist = &plan.simulation_settings.historical;
            if hist.start_year > hist.end_year {
                v.error("simulation_settings.historical", "start_year must be <= end_year");
            }
            if hist.start_year < history::FIRST_YEAR || hist.end_year > history::LAST_YEAR {
                v.error(
                    "simulation_settings.historical",
                    &format!(
                        "year range must lie within the bundled data ({}-{})",
                        history::FIRST_YEAR,
                        history::LAST_YEAR
                    ),
                );
            }
        }
        SimMode::Deterministic => {}
    }

    v
}

fn status_name(status: FilingStatus) -> &'static str {
    match status {
        FilingStatus::Single => "single",
        FilingStatus::MarriedFilingJointly => "married_filing_jointly",
        FilingStatus::MarriedFilingSeparately => "married_filing_separately",
        FilingStatus::HeadOfHousehold => "head_of_household",
        FilingStatus::QualifyingSurvivingSpouse => "qualifying_surviving_spouse",
    }
}
