//! The monthly simulation engine
//!
//! `advance_month` moves `PlanState` forward one calendar month through a
//! fixed sequence of steps. The order is load-bearing: withholding needs
//! collected income, bracket-fill conversions need year-to-date ordinary
//! income, RMDs must land before shortfall withdrawals, and the withdrawal
//! pass needs the month's full outflow. December additionally settles the
//! year's taxes against withholding and rolls the accumulators.

use crate::plan::{
    AccountKind, FilingStatus, Income, IncomeKind, Plan, TaxHandling, TaxTreatment,
    TransactionKind, YearMonth,
};
use crate::plan::data::occurs_this_month;
use crate::plan::PlanError;
use crate::tax::{employment_fica, se_wage_base_credit, self_employment_tax, TaxTables, YearIncomeSummary};

use super::assets::{annual_to_monthly_rate, AssetState};
use super::healthcare;
use super::results::{MonthResult, YearSettlement};
use super::rmd;
use super::roth;
use super::social_security;
use super::state::PlanState;
use super::withdrawals::{cover_shortfall, WithdrawalOutcome};

/// Sampled annual returns applied to every account for one simulated year.
/// Absent in deterministic mode, where accounts use their own fixed rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearReturns {
    pub stock: f64,
    pub bond: f64,
}

struct IncomePayment<'p> {
    item: &'p Income,
    amount: f64,
}

/// Drives one run's `PlanState` month by month
pub struct MonthlyEngine<'a> {
    plan: &'a Plan,
    tables: &'a TaxTables,
    cash_account: String,
}

impl<'a> MonthlyEngine<'a> {
    pub fn new(plan: &'a Plan, tables: &'a TaxTables) -> Result<Self, PlanError> {
        let cash_account = plan
            .cash_account()
            .ok_or_else(|| {
                PlanError::Invalid(vec!["accounts: at least one cash account is required".into()])
            })?
            .to_string();
        Ok(Self { plan, tables, cash_account })
    }

    pub fn initial_state(&self) -> PlanState {
        PlanState::from_plan(self.plan)
    }

    fn inflation(&self) -> f64 {
        self.plan.plan_settings.inflation_rate
    }

    fn filing_status(&self) -> FilingStatus {
        self.plan.filing_status
    }

    /// Amount an item emits this year given its change policy
    fn scheduled_amount(
        &self,
        amount: f64,
        policy: crate::plan::ChangePolicy,
        rate: Option<f64>,
        year: i32,
    ) -> f64 {
        let years_elapsed = (year - self.plan.plan_start().year).max(0);
        amount * policy.multiplier(rate, self.inflation(), years_elapsed)
    }

    fn annual_growth_rate(&self, account: &crate::plan::Account, returns: Option<YearReturns>) -> f64 {
        match returns {
            Some(r) => {
                let bond_share = (account.bond_allocation_percent / 100.0).clamp(0.0, 1.0);
                bond_share * r.bond + (1.0 - bond_share) * r.stock
            }
            None => account.growth_rate,
        }
    }

    fn absorb_withdrawals(state: &mut PlanState, m: &mut MonthResult, outcome: &WithdrawalOutcome) {
        m.withdrawals += outcome.total_withdrawn;
        m.withdrawal_events.extend(outcome.events.iter().cloned());
        m.realized_capital_gains += outcome.realized_gains;
        m.early_withdrawal_penalties += outcome.penalties;
        state.ytd.capital_gains += outcome.realized_gains;
        state.ytd.investment_income += outcome.realized_gains;
        state.ytd.ordinary_income += outcome.ordinary_income;
        state.ytd.penalties += outcome.penalties;
    }

    /// Advance one month. December also returns the year's settlement.
    pub fn advance_month(
        &self,
        state: &mut PlanState,
        returns: Option<YearReturns>,
    ) -> (MonthResult, Option<YearSettlement>) {
        let current = state.current;
        let year = current.year;
        let month = current.month;
        let plan_start = self.plan.plan_start();
        let plan_end = self.plan.plan_end();
        let mut m = MonthResult::new(year, month);

        // Step 1: ages
        state.update_ages(self.plan);

        // Step 2: income collection, Social Security included
        let mut payments: Vec<IncomePayment<'_>> = Vec::new();
        for item in &self.plan.income {
            if !occurs_this_month(
                item.frequency,
                item.start_date,
                item.end_date,
                current,
                plan_start,
                plan_end,
            ) {
                continue;
            }
            let amount =
                self.scheduled_amount(item.amount, item.change_over_time, item.change_rate, year);
            state.credit(&self.cash_account, amount);
            m.income += amount;
            payments.push(IncomePayment { item, amount });
        }

        let ss_benefit = social_security::household_monthly_benefit(
            &self.plan.social_security,
            state.primary_age_months,
            state.spouse_age_months,
            self.inflation(),
        );
        if ss_benefit > 0.0 {
            state.credit(&self.cash_account, ss_benefit);
            m.income += ss_benefit;
            m.social_security_income = ss_benefit;
            state.ytd.social_security_gross += ss_benefit;
        }

        // Step 3: payroll taxes against year-to-date wage counters
        for payment in &payments {
            let owner = payment.item.owner;
            let tax = match payment.item.income_kind {
                IncomeKind::Employment => {
                    let tax = employment_fica(
                        self.tables,
                        payment.amount,
                        state.ytd.wages_for(owner),
                        state.ytd.household_wages,
                        self.filing_status(),
                        year,
                    );
                    state.ytd.add_wages(owner, payment.amount);
                    tax
                }
                IncomeKind::SelfEmployment => {
                    let tax = self_employment_tax(
                        self.tables,
                        payment.amount,
                        state.ytd.wages_for(owner),
                        year,
                    );
                    state.ytd.add_wages(owner, se_wage_base_credit(payment.amount));
                    tax
                }
                IncomeKind::Other => 0.0,
            };
            if tax > 0.0 {
                state.credit(&self.cash_account, -tax);
                m.fica_withheld += tax;
                state.ytd.fica_withheld += tax;
            }
        }

        // Step 4: income-tax withholding
        for payment in &payments {
            if payment.item.tax_handling != TaxHandling::Withhold {
                continue;
            }
            state.ytd.ordinary_income += payment.amount;
            if let Some(percent) = payment.item.withhold_percent {
                let withheld = payment.amount * percent;
                state.credit(&self.cash_account, -withheld);
                m.tax_withheld += withheld;
                state.ytd.withheld_tax += withheld;
            }
        }

        // Steps 5-7: contributions and employer match
        for contribution in &self.plan.contributions {
            if !occurs_this_month(
                contribution.frequency,
                contribution.start_date,
                contribution.end_date,
                current,
                plan_start,
                plan_end,
            ) {
                continue;
            }
            let requested = self.scheduled_amount(
                contribution.amount,
                contribution.change_over_time,
                contribution.change_rate,
                year,
            );

            let amount = if contribution.source_account == "income"
                || contribution.source_account == self.cash_account
            {
                // Payroll dollars bypass cash conceptually but the income
                // already landed there, so they leave through it
                state.credit(&self.cash_account, -requested);
                requested
            } else {
                let available = state.balance(&contribution.source_account).max(0.0);
                let amount = requested.min(available);
                let source_before = state.balance(&contribution.source_account);
                state.credit(&contribution.source_account, -amount);
                if let Some(tracker) = state.taxable_basis.get_mut(&contribution.source_account) {
                    let gain = tracker.withdraw_average(amount, source_before);
                    state.ytd.capital_gains += gain;
                    state.ytd.investment_income += gain;
                    m.realized_capital_gains += gain;
                }
                amount
            };
            if amount <= 0.0 {
                continue;
            }

            state.credit(&contribution.destination_account, amount);
            if let Some(tracker) = state.taxable_basis.get_mut(&contribution.destination_account) {
                tracker.add(amount);
            }
            if let Some(tracker) = state.roth_basis.get_mut(&contribution.destination_account) {
                tracker.add(amount);
            }
            m.contributions += amount;

            if let Some(employer_match) = &contribution.employer_match {
                let salary_paid = payments
                    .iter()
                    .filter(|p| p.item.name == employer_match.salary_reference)
                    .map(|p| p.amount)
                    .sum::<f64>();
                let match_amount = (employer_match.match_percent * amount)
                    .min(employer_match.up_to_percent_of_salary * salary_paid);
                if match_amount > 0.0 {
                    state.credit(&contribution.destination_account, match_amount);
                    if let Some(tracker) =
                        state.taxable_basis.get_mut(&contribution.destination_account)
                    {
                        tracker.add(match_amount);
                    }
                    if let Some(tracker) =
                        state.roth_basis.get_mut(&contribution.destination_account)
                    {
                        tracker.add(match_amount);
                    }
                    m.employer_match += match_amount;
                    m.contributions += match_amount;
                }
            }
        }

        // Step 8: recurring transfers
        for transfer in &self.plan.transfers {
            if !occurs_this_month(
                transfer.frequency,
                transfer.start_date,
                transfer.end_date,
                current,
                plan_start,
                plan_end,
            ) {
                continue;
            }
            let source_before = state.balance(&transfer.from_account);
            let amount = transfer.amount.min(source_before.max(0.0));
            if amount <= 0.0 {
                continue;
            }
            state.credit(&transfer.from_account, -amount);
            state.credit(&transfer.to_account, amount);
            m.transfers += amount;

            let from_kind = self.plan.account(&transfer.from_account).map(|a| a.kind);
            if from_kind == Some(AccountKind::TaxableBrokerage) {
                if let Some(tracker) = state.taxable_basis.get_mut(&transfer.from_account) {
                    let gain = tracker.withdraw_average(amount, source_before);
                    state.ytd.capital_gains += gain;
                    state.ytd.investment_income += gain;
                    m.realized_capital_gains += gain;
                }
            } else if transfer.tax_treatment == TaxTreatment::Income {
                state.ytd.ordinary_income += amount;
            }
            if let Some(tracker) = state.taxable_basis.get_mut(&transfer.to_account) {
                tracker.add(amount);
            }
            if let Some(tracker) = state.roth_basis.get_mut(&transfer.to_account) {
                tracker.add(amount);
            }
        }

        // Step 9: Roth conversions
        let converted = roth::execute_conversions(
            &self.plan.roth_conversions,
            &mut state.balances,
            &mut state.roth_basis,
            current,
            plan_start,
            plan_end,
            self.filing_status(),
            self.tables,
            state.ytd.ordinary_income,
        );
        if converted > 0.0 {
            state.ytd.ordinary_income += converted;
            state.ytd.roth_conversion_income += converted;
            m.roth_conversions = converted;
        }

        // Step 10: December RMDs against prior year-end balances
        if month == 12 && self.plan.rmds.enabled {
            let mut total = 0.0;
            for name in &self.plan.rmds.accounts {
                let Some(account) = self.plan.account(name) else { continue };
                let age_years = (state.age_months(account.owner) / 12) as u32;
                if age_years < self.plan.rmds.rmd_start_age {
                    continue;
                }
                let prior = state
                    .prior_year_end_balances
                    .get(name)
                    .copied()
                    .unwrap_or_else(|| state.balance(name))
                    .max(0.0);
                let required = rmd::required_distribution(prior, age_years);
                let amount = required.min(state.balance(name).max(0.0));
                if amount <= 0.0 {
                    continue;
                }
                state.credit(name, -amount);
                if let Some(destination) = &self.plan.rmds.destination_account {
                    state.credit(destination, amount);
                }
                total += amount;
            }
            if total > 0.0 {
                state.ytd.ordinary_income += total;
                m.rmd_distributions = total;
            }
        }

        // Step 11: growth at the monthly geometric rate
        for account in &self.plan.accounts {
            let annual = self.annual_growth_rate(account, returns);
            let rate = annual_to_monthly_rate(annual);
            let growth = state.balance(&account.name) * rate;
            state.credit(&account.name, growth);
            m.growth += growth;
        }

        // Step 12: dividends
        let default_dividend = self.plan.plan_settings.default_dividend_tax_treatment;
        for account in &self.plan.accounts {
            let rate = annual_to_monthly_rate(account.dividend_yield);
            let dividend = state.balance(&account.name) * rate;
            if dividend <= 0.0 {
                continue;
            }
            m.dividends += dividend;
            match account.dividend_tax_treatment.resolve(default_dividend) {
                TaxTreatment::Income => {
                    state.ytd.ordinary_income += dividend;
                    state.ytd.investment_income += dividend;
                }
                TaxTreatment::CapitalGains => {
                    state.ytd.qualified_dividends += dividend;
                    state.ytd.investment_income += dividend;
                }
                TaxTreatment::TaxFree => {}
            }
            if account.reinvest_dividends {
                state.credit(&account.name, dividend);
                if let Some(tracker) = state.taxable_basis.get_mut(&account.name) {
                    tracker.add(dividend);
                }
            } else {
                state.credit(&self.cash_account, dividend);
            }
        }

        // Step 13: fees
        for account in &self.plan.accounts {
            let rate = annual_to_monthly_rate(account.yearly_fees);
            let fee = state.balance(&account.name) * rate;
            if fee <= 0.0 {
                continue;
            }
            state.credit(&account.name, -fee);
            m.fees += fee;
        }

        // Step 14: real assets
        let inflation = self.inflation();
        for asset in &mut state.assets {
            asset.appreciate(inflation);
            let paid = asset.amortize(current, plan_start, plan_end);
            m.real_asset_expenses += paid.total;
            state.ytd.mortgage_interest_paid += paid.interest;
            let property_tax = asset.property_tax();
            m.real_asset_expenses += property_tax;
            state.ytd.property_tax_paid += property_tax;
            m.real_asset_expenses += asset.maintenance_due(month);
        }

        // Step 15: one-time transactions
        self.execute_transactions(state, &mut m, current, plan_start, plan_end);

        // Step 16: healthcare
        let healthcare_cost = healthcare::monthly_cost(
            &self.plan.healthcare,
            state.primary_age_months,
            state.spouse_age_months,
            current,
            plan_start,
            plan_end,
            inflation,
            self.filing_status(),
            self.tables,
            &state.magi_history,
        );
        m.healthcare_expenses = healthcare_cost.total;
        m.irmaa_surcharges = healthcare_cost.irmaa;

        // Step 17: other expenses
        for expense in &self.plan.expenses {
            if !occurs_this_month(
                expense.frequency,
                expense.start_date,
                expense.end_date,
                current,
                plan_start,
                plan_end,
            ) {
                continue;
            }
            m.other_expenses +=
                self.scheduled_amount(expense.amount, expense.change_over_time, expense.change_rate, year);
        }

        // Step 18: shortfall coverage
        let total_outflow = m.total_expenses();
        let cash = state.balance(&self.cash_account);
        if cash < total_outflow {
            let outcome = cover_shortfall(
                total_outflow - cash,
                self.plan,
                &mut state.balances,
                &mut state.taxable_basis,
                &mut state.roth_basis,
                &self.cash_account,
                state.primary_age_months,
                state.spouse_age_months,
            );
            Self::absorb_withdrawals(state, &mut m, &outcome);
            if outcome.remaining > 0.0 {
                m.insolvent = true;
            }
        }

        // Step 19: expenses are paid; cash floors at zero with the unpaid
        // remainder recorded
        let cash = state.balance(&self.cash_account);
        let after = cash - total_outflow;
        if after < 0.0 {
            m.unpaid_expenses = -after;
            m.insolvent = true;
            if let Some(balance) = state.balances.get_mut(&self.cash_account) {
                *balance = 0.0;
            }
        } else if let Some(balance) = state.balances.get_mut(&self.cash_account) {
            *balance = after;
        }

        // Year boundary: settle taxes, record MAGI, roll accumulators
        let settlement = if month == 12 {
            Some(self.settle_year(state, &mut m))
        } else {
            None
        };

        // Step 20: keep taxable bases inside their balances
        for (name, tracker) in state.taxable_basis.iter_mut() {
            let balance = state.balances.get(name).copied().unwrap_or(0.0);
            tracker.clamp_to(balance);
        }

        // Step 21: record
        m.net_worth_end = state.net_worth();
        state.insolvent = state.insolvent || m.insolvent;
        state.current = current.next();
        (m, settlement)
    }

    fn execute_transactions(
        &self,
        state: &mut PlanState,
        m: &mut MonthResult,
        current: YearMonth,
        plan_start: YearMonth,
        plan_end: YearMonth,
    ) {
        for txn in &self.plan.transactions {
            if txn.date.resolve(plan_start, plan_end).index() != current.index() {
                continue;
            }
            match txn.kind {
                TransactionKind::SellAsset => {
                    let Some(linked) = &txn.linked_asset else { continue };
                    let Some(position) = state.assets.iter().position(|a| &a.asset.name == linked)
                    else {
                        continue;
                    };
                    let asset_state = state.assets.remove(position);

                    let proceeds = (txn.amount - txn.fees).max(0.0);
                    let deposit = txn.deposit_to_account.as_deref().unwrap_or(&self.cash_account);
                    state.credit(deposit, proceeds);

                    let purchase_price = asset_state.asset.purchase_price.unwrap_or(0.0);
                    let mut gain = txn.amount - purchase_price;
                    if asset_state.asset.primary_residence {
                        gain -= self.primary_residence_exclusion();
                    }
                    let gain = gain.max(0.0);
                    match txn.tax_treatment {
                        TaxTreatment::CapitalGains => {
                            state.ytd.capital_gains += gain;
                            state.ytd.investment_income += gain;
                            m.realized_capital_gains += gain;
                        }
                        TaxTreatment::Income => state.ytd.ordinary_income += gain,
                        TaxTreatment::TaxFree => {}
                    }
                }
                TransactionKind::BuyAsset => {
                    let cost = txn.amount + txn.fees;
                    match txn.deposit_to_account.as_deref() {
                        Some(source) if source != self.cash_account => {
                            // Drain the named account first; any remainder
                            // falls on cash and surfaces at the shortfall step
                            let available = state.balance(source).max(0.0);
                            let taken = cost.min(available);
                            state.credit(source, -taken);
                            state.credit(&self.cash_account, -(cost - taken));
                        }
                        _ => state.credit(&self.cash_account, -cost),
                    }
                    let name = txn.linked_asset.clone().unwrap_or_else(|| txn.name.clone());
                    state.assets.push(AssetState::new(crate::plan::RealAsset {
                        name,
                        current_value: txn.amount,
                        purchase_price: Some(txn.amount),
                        primary_residence: false,
                        change_over_time: crate::plan::ChangePolicy::MatchInflation,
                        change_rate: None,
                        property_tax_rate: 0.0,
                        mortgage: None,
                        maintenance_expenses: Vec::new(),
                    }));
                }
                TransactionKind::Transfer | TransactionKind::Other => {
                    let net = txn.amount - txn.fees;
                    let deposit = txn.deposit_to_account.as_deref().unwrap_or(&self.cash_account);
                    state.credit(deposit, net);
                    match txn.tax_treatment {
                        TaxTreatment::Income => state.ytd.ordinary_income += net.max(0.0),
                        TaxTreatment::CapitalGains => {
                            let gain = net.max(0.0);
                            state.ytd.capital_gains += gain;
                            state.ytd.investment_income += gain;
                            m.realized_capital_gains += gain;
                        }
                        TaxTreatment::TaxFree => {}
                    }
                }
            }
        }
    }

    fn primary_residence_exclusion(&self) -> f64 {
        if self.filing_status().is_joint() {
            500_000.0
        } else {
            250_000.0
        }
    }

    /// December: include taxable Social Security, compute the year's taxes,
    /// settle against withholding, record MAGI, and reset the accumulators
    fn settle_year(&self, state: &mut PlanState, m: &mut MonthResult) -> YearSettlement {
        let year = state.current.year;

        let agi_excluding_ss =
            state.ytd.ordinary_income + state.ytd.capital_gains + state.ytd.qualified_dividends;
        let taxable_ss = social_security::taxable_portion(
            state.ytd.social_security_gross,
            agi_excluding_ss,
            self.tables.ss_taxability_thresholds(self.filing_status()),
        );
        state.ytd.ordinary_income += taxable_ss;

        let deductions = &self.plan.tax_settings.itemized_deductions;
        let mut itemized = deductions.salt_cap.min(state.ytd.property_tax_paid.max(0.0));
        itemized += deductions.charitable_contributions.max(0.0);
        if deductions.mortgage_interest_deductible {
            itemized += state.ytd.mortgage_interest_paid.max(0.0);
        }

        let summary = YearIncomeSummary {
            year,
            filing_status: self.filing_status(),
            state: self.plan.primary_state().to_uppercase(),
            ordinary_income: state.ytd.ordinary_income,
            capital_gains: state.ytd.capital_gains,
            qualified_dividends: state.ytd.qualified_dividends,
            investment_income: state.ytd.investment_income,
            itemized_deductions: itemized,
            withheld_tax: state.ytd.withheld_tax,
            early_withdrawal_penalty: state.ytd.penalties,
        };
        let tax = self.tables.compute_total_tax(&summary, &self.plan.tax_settings);

        let due = tax.total_tax - state.ytd.withheld_tax;
        let mut refund = 0.0;
        let mut payment = 0.0;
        if due > 0.0 {
            let cash = state.balance(&self.cash_account);
            if cash < due {
                let outcome = cover_shortfall(
                    due - cash,
                    self.plan,
                    &mut state.balances,
                    &mut state.taxable_basis,
                    &mut state.roth_basis,
                    &self.cash_account,
                    state.primary_age_months,
                    state.spouse_age_months,
                );
                // Settlement draws are recorded this month; their tax falls
                // outside the already-computed year
                m.withdrawals += outcome.total_withdrawn;
                m.withdrawal_events.extend(outcome.events.iter().cloned());
                m.realized_capital_gains += outcome.realized_gains;
                m.early_withdrawal_penalties += outcome.penalties;
                if outcome.remaining > 0.0 {
                    m.insolvent = true;
                }
            }
            let cash = state.balance(&self.cash_account);
            payment = due.min(cash.max(0.0));
            if cash < due {
                m.unpaid_taxes = due - payment;
                m.insolvent = true;
            }
            if let Some(balance) = state.balances.get_mut(&self.cash_account) {
                *balance = (cash - due).max(0.0);
            }
            m.tax_settlement = due;
        } else {
            refund = -due;
            state.credit(&self.cash_account, refund);
            m.tax_settlement = due;
        }

        let magi =
            state.ytd.ordinary_income + state.ytd.capital_gains + state.ytd.qualified_dividends;
        state.magi_history.insert(year, magi);

        state.ytd.reset();
        state.snapshot_year_end();

        YearSettlement { tax, refund, payment, magi }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::loader::parse_plan;
    use crate::tax::tables::{
        MEDICARE_RATE, SOCIAL_SECURITY_RATE, SOCIAL_SECURITY_WAGE_BASE,
    };

    fn plan_from(json: &str) -> Plan {
        parse_plan(json).unwrap()
    }

    fn run_months(plan: &Plan, months: usize) -> (Vec<MonthResult>, Vec<YearSettlement>, PlanState) {
        let tables = TaxTables::new(plan.plan_settings.inflation_rate);
        let engine = MonthlyEngine::new(plan, &tables).unwrap();
        let mut state = engine.initial_state();
        let mut results = Vec::new();
        let mut settlements = Vec::new();
        for _ in 0..months {
            let (m, s) = engine.advance_month(&mut state, None);
            results.push(m);
            if let Some(s) = s {
                settlements.push(s);
            }
        }
        (results, settlements, state)
    }

    fn salary_plan(withhold: f64, expenses: f64) -> Plan {
        plan_from(&format!(
            r#"{{
            "people": {{"primary": {{"name": "Pat", "birthday": "1990-01", "state": "WA"}}}},
            "filing_status": "single",
            "accounts": [
                {{"name": "Cash", "type": "cash", "owner": "primary", "balance": 10000,
                 "growth_rate": 0.0, "dividend_yield": 0.0, "dividend_tax_treatment": "tax_free",
                 "reinvest_dividends": false, "bond_allocation_percent": 100, "yearly_fees": 0.0,
                 "allow_withdrawals": true}}
            ],
            "income": [
                {{"name": "Salary", "owner": "primary", "amount": 12500, "frequency": "monthly",
                 "start_date": "start", "end_date": "end", "change_over_time": "fixed",
                 "tax_handling": "withhold", "withhold_percent": {withhold}}}
            ],
            "expenses": [
                {{"name": "Living", "owner": "primary", "amount": {expenses}, "frequency": "monthly",
                 "start_date": "start", "end_date": "end", "change_over_time": "fixed",
                 "spending_type": "essential"}}
            ],
            "plan_settings": {{"plan_start": "2026-01", "plan_end": "2028-12",
                "inflation_rate": 0.0, "default_dividend_tax_treatment": "capital_gains"}}
        }}"#
        ))
    }

    #[test]
    fn test_monthly_cash_conservation() {
        let plan = salary_plan(0.2, 3_000.0);
        let (results, _, state) = run_months(&plan, 1);
        let m = &results[0];

        let fica = 12_500.0 * (SOCIAL_SECURITY_RATE + MEDICARE_RATE);
        let expected_delta = m.income - m.tax_withheld - m.fica_withheld - m.total_expenses();
        assert!((m.fica_withheld - fica).abs() < 1e-9);
        assert!((m.tax_withheld - 2_500.0).abs() < 1e-9);
        assert!((state.balance("Cash") - (10_000.0 + expected_delta)).abs() < 1e-9);
        assert!(!m.insolvent);
    }

    #[test]
    fn test_fica_wage_base_resets_each_january() {
        // 20,833/month crosses the 180,000 wage base in September
        let mut plan = salary_plan(0.0, 0.0);
        plan.income[0].amount = 20_833.0;
        let (results, _, _) = run_months(&plan, 13);

        let annual_wages = 20_833.0 * 12.0;
        let year_one: f64 = results[..12].iter().map(|m| m.fica_withheld).sum();
        let expected = SOCIAL_SECURITY_WAGE_BASE * SOCIAL_SECURITY_RATE
            + annual_wages * MEDICARE_RATE
            + (annual_wages - 200_000.0) * 0.009;
        assert!((year_one - expected).abs() < 1e-6);

        // January of year two pays full Social Security again
        let january = &results[12];
        let full_month = 20_833.0 * (SOCIAL_SECURITY_RATE + MEDICARE_RATE);
        assert!((january.fica_withheld - full_month).abs() < 1e-9);
    }

    fn match_plan() -> Plan {
        plan_from(
            r#"{
            "people": {
                "primary": {"name": "Pat", "birthday": "1981-03", "state": "WA"},
                "spouse": {"name": "Sam", "birthday": "1983-01"}
            },
            "filing_status": "married_filing_jointly",
            "accounts": [
                {"name": "Cash", "type": "cash", "owner": "primary", "balance": 50000,
                 "growth_rate": 0.0, "dividend_yield": 0.0, "dividend_tax_treatment": "tax_free",
                 "reinvest_dividends": false, "bond_allocation_percent": 100, "yearly_fees": 0.0,
                 "allow_withdrawals": true},
                {"name": "401k", "type": "401k", "owner": "primary", "balance": 0,
                 "growth_rate": 0.0, "dividend_yield": 0.0, "dividend_tax_treatment": "tax_free",
                 "reinvest_dividends": true, "bond_allocation_percent": 20, "yearly_fees": 0.0,
                 "allow_withdrawals": false}
            ],
            "income": [
                {"name": "Salary", "owner": "primary", "amount": 10000, "frequency": "monthly",
                 "start_date": "start", "end_date": "end", "change_over_time": "fixed",
                 "tax_handling": "withhold", "withhold_percent": 0.2}
            ],
            "contributions": [
                {"name": "401k deferral", "source_account": "income",
                 "destination_account": "401k", "amount": 1000, "frequency": "monthly",
                 "start_date": "start", "end_date": "end", "change_over_time": "fixed",
                 "employer_match": {"match_percent": 0.5, "up_to_percent_of_salary": 0.06,
                     "salary_reference": "Salary"}}
            ],
            "plan_settings": {"plan_start": "2026-01", "plan_end": "2026-12",
                "inflation_rate": 0.0, "default_dividend_tax_treatment": "capital_gains"}
        }"#,
        )
    }

    #[test]
    fn test_employer_match_formula() {
        let (results, _, state) = run_months(&match_plan(), 1);
        let m = &results[0];
        // min(0.5 * 1,000, 0.06 * 10,000) = min(500, 600) = 500
        assert!((m.employer_match - 500.0).abs() < 1e-9);
        assert!((m.contributions - 1_500.0).abs() < 1e-9);
        assert!((state.balance("401k") - 1_500.0).abs() < 1e-9);
    }

    #[test]
    fn test_employer_match_capped_by_salary_share() {
        let mut plan = match_plan();
        plan.contributions[0].amount = 2_000.0;
        let (results, _, _) = run_months(&plan, 1);
        // min(0.5 * 2,000, 0.06 * 10,000) = min(1,000, 600) = 600
        assert!((results[0].employer_match - 600.0).abs() < 1e-9);
    }

    fn rmd_plan() -> Plan {
        plan_from(
            r#"{
            "people": {"primary": {"name": "Ruth", "birthday": "1953-06", "state": "WA"}},
            "filing_status": "single",
            "accounts": [
                {"name": "Cash", "type": "cash", "owner": "primary", "balance": 100000,
                 "growth_rate": 0.0, "dividend_yield": 0.0, "dividend_tax_treatment": "tax_free",
                 "reinvest_dividends": false, "bond_allocation_percent": 100, "yearly_fees": 0.0,
                 "allow_withdrawals": true},
                {"name": "Trad IRA", "type": "traditional_ira", "owner": "primary",
                 "balance": 1000000, "growth_rate": 0.0, "dividend_yield": 0.0,
                 "dividend_tax_treatment": "tax_free", "reinvest_dividends": true,
                 "bond_allocation_percent": 40, "yearly_fees": 0.0, "allow_withdrawals": true}
            ],
            "rmds": {"enabled": true, "rmd_start_age": 73, "accounts": ["Trad IRA"],
                "destination_account": "Cash"},
            "plan_settings": {"plan_start": "2026-01", "plan_end": "2026-12",
                "inflation_rate": 0.0, "default_dividend_tax_treatment": "capital_gains"}
        }"#,
        )
    }

    #[test]
    fn test_rmd_first_year_amount() {
        // Owner turns 73 in June 2026; December divisor at 73 is 26.5
        let (results, settlements, state) = run_months(&rmd_plan(), 12);
        let december = &results[11];
        let expected = 1_000_000.0 / 26.5;
        assert!((december.rmd_distributions - expected).abs() < 0.01);
        assert!((state.balance("Trad IRA") - (1_000_000.0 - expected)).abs() < 0.01);
        // RMD lands in ordinary income for the year
        let tax = &settlements[0].tax;
        assert!(tax.taxable_ordinary_income > 0.0);
        assert!(!results[..11].iter().any(|m| m.rmd_distributions > 0.0));
    }

    fn bracket_fill_plan() -> Plan {
        plan_from(
            r#"{
            "people": {
                "primary": {"name": "Ray", "birthday": "1960-01", "state": "WA"},
                "spouse": {"name": "Rae", "birthday": "1961-01"}
            },
            "filing_status": "married_filing_jointly",
            "accounts": [
                {"name": "Cash", "type": "cash", "owner": "primary", "balance": 200000,
                 "growth_rate": 0.0, "dividend_yield": 0.0, "dividend_tax_treatment": "tax_free",
                 "reinvest_dividends": false, "bond_allocation_percent": 100, "yearly_fees": 0.0,
                 "allow_withdrawals": true},
                {"name": "Trad IRA", "type": "traditional_ira", "owner": "primary",
                 "balance": 500000, "growth_rate": 0.0, "dividend_yield": 0.0,
                 "dividend_tax_treatment": "tax_free", "reinvest_dividends": true,
                 "bond_allocation_percent": 40, "yearly_fees": 0.0, "allow_withdrawals": true},
                {"name": "Roth", "type": "roth_ira", "owner": "primary", "balance": 0,
                 "growth_rate": 0.0, "dividend_yield": 0.0, "dividend_tax_treatment": "tax_free",
                 "reinvest_dividends": true, "bond_allocation_percent": 0, "yearly_fees": 0.0,
                 "allow_withdrawals": true}
            ],
            "roth_conversions": [
                {"name": "Fill 22", "from_account": "Trad IRA", "to_account": "Roth",
                 "start_date": "start", "end_date": "end", "fill_to_bracket": "22%"}
            ],
            "plan_settings": {"plan_start": "2026-01", "plan_end": "2026-12",
                "inflation_rate": 0.0, "default_dividend_tax_treatment": "capital_gains"}
        }"#,
        )
    }

    #[test]
    fn test_roth_bracket_fill_hits_bracket_top() {
        let (results, settlements, state) = run_months(&bracket_fill_plan(), 12);
        let december = &results[11];
        // No other ordinary income: the conversion is the full MFJ 22% top
        assert!((december.roth_conversions - 206_700.0).abs() < 0.01);
        assert!((state.balance("Roth") - 206_700.0).abs() < 0.01);
        // Year-to-date ordinary income landed exactly on the bracket top
        let tax = &settlements[0].tax;
        let expected_taxable = 206_700.0 - 30_000.0;
        assert!((tax.taxable_ordinary_income - expected_taxable).abs() < 0.01);
        assert!(!results[..11].iter().any(|m| m.roth_conversions > 0.0));
    }

    fn home_sale_plan() -> Plan {
        plan_from(
            r#"{
            "people": {
                "primary": {"name": "Pat", "birthday": "1975-01", "state": "WA"},
                "spouse": {"name": "Sam", "birthday": "1976-01"}
            },
            "filing_status": "married_filing_jointly",
            "accounts": [
                {"name": "Cash", "type": "cash", "owner": "primary", "balance": 10000,
                 "growth_rate": 0.0, "dividend_yield": 0.0, "dividend_tax_treatment": "tax_free",
                 "reinvest_dividends": false, "bond_allocation_percent": 100, "yearly_fees": 0.0,
                 "allow_withdrawals": true}
            ],
            "real_assets": [
                {"name": "Home", "current_value": 1000000, "purchase_price": 320000,
                 "primary_residence": true, "change_over_time": "fixed",
                 "property_tax_rate": 0.0}
            ],
            "transactions": [
                {"name": "Sell home", "date": "2026-03", "type": "sell_asset",
                 "amount": 1000000, "fees": 60000, "tax_treatment": "capital_gains",
                 "linked_asset": "Home", "deposit_to_account": "Cash"}
            ],
            "plan_settings": {"plan_start": "2026-01", "plan_end": "2026-12",
                "inflation_rate": 0.0, "default_dividend_tax_treatment": "capital_gains"}
        }"#,
        )
    }

    #[test]
    fn test_primary_home_sale_exclusion() {
        let (results, _, state) = run_months(&home_sale_plan(), 3);
        let march = &results[2];
        // Gain: 1,000,000 - 320,000 - 500,000 exclusion = 180,000
        assert!((march.realized_capital_gains - 180_000.0).abs() < 1e-6);
        // Net proceeds of 940,000 land in cash
        assert!((state.balance("Cash") - 950_000.0).abs() < 1e-6);
        // The asset and its obligations are gone
        assert!(state.assets.is_empty());
    }

    #[test]
    fn test_insolvency_trajectory() {
        let mut plan = salary_plan(0.0, 10_000.0);
        plan.income.clear();
        let (results, _, state) = run_months(&plan, 3);

        // 10,000 cash exactly covers month one; month two has nothing left
        assert!(!results[0].insolvent);
        assert!(results[1].insolvent);
        assert!((results[1].unpaid_expenses - 10_000.0).abs() < 1e-9);
        // Expenses keep being recorded after exhaustion, unpaid
        assert!(results[2].insolvent);
        assert!((results[2].other_expenses - 10_000.0).abs() < 1e-9);
        assert!((results[2].unpaid_expenses - 10_000.0).abs() < 1e-9);
        assert_eq!(state.balance("Cash"), 0.0);
        assert!(state.insolvent);
    }

    #[test]
    fn test_cash_non_negative_after_withdrawals() {
        let plan = salary_plan(0.0, 4_000.0);
        let (results, _, state) = run_months(&plan, 24);
        for m in &results {
            assert!(!m.insolvent);
        }
        assert!(state.balance("Cash") >= 0.0);
    }

    #[test]
    fn test_december_refund_credits_cash() {
        // 40% withholding on a modest salary far exceeds the liability
        let plan = salary_plan(0.4, 0.0);
        let (results, settlements, _) = run_months(&plan, 12);
        let december = &results[11];
        let settlement = &settlements[0];
        assert!(settlement.refund > 0.0);
        assert_eq!(settlement.payment, 0.0);
        assert!(december.tax_settlement < 0.0);
        assert!((settlement.refund + december.tax_settlement).abs() < 1e-9);
    }

    #[test]
    fn test_magi_recorded_for_lookback() {
        let plan = salary_plan(0.2, 0.0);
        let (_, settlements, state) = run_months(&plan, 12);
        assert!((settlements[0].magi - 150_000.0).abs() < 1e-6);
        assert_eq!(state.magi_history.get(&2026).copied(), Some(settlements[0].magi));
    }

    #[test]
    fn test_dividend_reinvestment_grows_basis() {
        let plan = plan_from(
            r#"{
            "people": {"primary": {"name": "Pat", "birthday": "1980-01", "state": "WA"}},
            "filing_status": "single",
            "accounts": [
                {"name": "Cash", "type": "cash", "owner": "primary", "balance": 1000,
                 "growth_rate": 0.0, "dividend_yield": 0.0, "dividend_tax_treatment": "tax_free",
                 "reinvest_dividends": false, "bond_allocation_percent": 100, "yearly_fees": 0.0,
                 "allow_withdrawals": true},
                {"name": "Brokerage", "type": "taxable_brokerage", "owner": "primary",
                 "balance": 120000, "cost_basis": 80000, "growth_rate": 0.0,
                 "dividend_yield": 0.024, "dividend_tax_treatment": "plan_settings",
                 "reinvest_dividends": true, "bond_allocation_percent": 0, "yearly_fees": 0.0,
                 "allow_withdrawals": true}
            ],
            "plan_settings": {"plan_start": "2026-01", "plan_end": "2026-12",
                "inflation_rate": 0.0, "default_dividend_tax_treatment": "capital_gains"}
        }"#,
        );
        let (results, _, state) = run_months(&plan, 1);
        let m = &results[0];
        let monthly_yield = annual_to_monthly_rate(0.024);
        let dividend = 120_000.0 * monthly_yield;
        assert!((m.dividends - dividend).abs() < 1e-9);
        assert!((state.balance("Brokerage") - (120_000.0 + dividend)).abs() < 1e-9);
        assert!((state.taxable_basis["Brokerage"].total() - (80_000.0 + dividend)).abs() < 1e-9);
        // Qualified dividends accrue toward the year's settlement
        assert!((state.ytd.qualified_dividends - dividend).abs() < 1e-9);
    }
}
