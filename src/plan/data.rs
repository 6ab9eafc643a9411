//! Plan data structures matching the household plan JSON schema

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Calendar year-month, the date granularity used throughout a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    /// 1-12
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Linear month index used for date arithmetic and range checks
    pub fn index(self) -> i32 {
        self.year * 12 + self.month as i32
    }

    /// The following calendar month
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// Whole months elapsed since `earlier` (negative if `earlier` is later)
    pub fn months_since(self, earlier: YearMonth) -> i32 {
        self.index() - earlier.index()
    }

    pub fn parse(value: &str) -> Option<Self> {
        let (y, m) = value.split_once('-')?;
        if y.len() != 4 || m.len() != 2 {
            return None;
        }
        let year: i32 = y.parse().ok()?;
        let month: u32 = m.parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(Self { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        YearMonth::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("'{raw}' is not a valid YYYY-MM date")))
    }
}

/// A plan date field: an explicit year-month or the `start`/`end` tokens
/// that resolve against the plan window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSpec {
    PlanStart,
    PlanEnd,
    At(YearMonth),
}

impl DateSpec {
    pub fn resolve(self, plan_start: YearMonth, plan_end: YearMonth) -> YearMonth {
        match self {
            DateSpec::PlanStart => plan_start,
            DateSpec::PlanEnd => plan_end,
            DateSpec::At(ym) => ym,
        }
    }
}

impl fmt::Display for DateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateSpec::PlanStart => write!(f, "start"),
            DateSpec::PlanEnd => write!(f, "end"),
            DateSpec::At(ym) => write!(f, "{ym}"),
        }
    }
}

impl Serialize for DateSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "start" => Ok(DateSpec::PlanStart),
            "end" => Ok(DateSpec::PlanEnd),
            other => YearMonth::parse(other).map(DateSpec::At).ok_or_else(|| {
                de::Error::custom(format!("'{other}' is not a valid date; expected YYYY-MM or start/end"))
            }),
        }
    }
}

/// True when `current` falls inside the `[start, end]` item window
pub fn window_contains(
    start: DateSpec,
    end: DateSpec,
    current: YearMonth,
    plan_start: YearMonth,
    plan_end: YearMonth,
) -> bool {
    let start_idx = start.resolve(plan_start, plan_end).index();
    let end_idx = end.resolve(plan_start, plan_end).index();
    (start_idx..=end_idx).contains(&current.index())
}

/// True when a recurring item emits an amount in `current`.
/// Annual items fire on the anniversary month of their start date;
/// one-time items fire exactly on their start date.
pub fn occurs_this_month(
    frequency: Frequency,
    start: DateSpec,
    end: DateSpec,
    current: YearMonth,
    plan_start: YearMonth,
    plan_end: YearMonth,
) -> bool {
    if !window_contains(start, end, current, plan_start, plan_end) {
        return false;
    }
    let start_ym = start.resolve(plan_start, plan_end);
    match frequency {
        Frequency::Monthly => true,
        Frequency::Annual => current.month == start_ym.month,
        Frequency::OneTime => current.index() == start_ym.index(),
    }
}

/// Federal filing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    MarriedFilingJointly,
    MarriedFilingSeparately,
    HeadOfHousehold,
    QualifyingSurvivingSpouse,
}

impl FilingStatus {
    /// Statuses that file on a joint return
    pub fn is_joint(self) -> bool {
        matches!(
            self,
            FilingStatus::MarriedFilingJointly | FilingStatus::QualifyingSurvivingSpouse
        )
    }

    pub fn requires_spouse(self) -> bool {
        matches!(
            self,
            FilingStatus::MarriedFilingJointly
                | FilingStatus::MarriedFilingSeparately
                | FilingStatus::QualifyingSurvivingSpouse
        )
    }
}

/// Account kind driving tax treatment of growth and withdrawals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Cash,
    TaxableBrokerage,
    #[serde(rename = "401k")]
    K401,
    TraditionalIra,
    RothIra,
    Hsa,
    #[serde(rename = "529")]
    Plan529,
    Other,
}

impl AccountKind {
    /// Withdrawals are fully ordinary income
    pub fn is_tax_deferred(self) -> bool {
        matches!(self, AccountKind::K401 | AccountKind::TraditionalIra)
    }

    /// Qualified withdrawals are tax free
    pub fn is_tax_free(self) -> bool {
        matches!(self, AccountKind::RothIra | AccountKind::Hsa)
    }
}

/// Who an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    Primary,
    Spouse,
    Joint,
}

/// How often a cash-flow item emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Monthly,
    Annual,
    OneTime,
}

/// How an amount evolves year over year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangePolicy {
    Fixed,
    Increase,
    Decrease,
    MatchInflation,
    InflationPlus,
    InflationMinus,
}

impl ChangePolicy {
    pub fn requires_rate(self) -> bool {
        matches!(
            self,
            ChangePolicy::Increase
                | ChangePolicy::Decrease
                | ChangePolicy::InflationPlus
                | ChangePolicy::InflationMinus
        )
    }

    /// Effective annual change rate for this policy
    pub fn annual_rate(self, change_rate: Option<f64>, inflation_rate: f64) -> f64 {
        let rate = change_rate.unwrap_or(0.0);
        match self {
            ChangePolicy::Fixed => 0.0,
            ChangePolicy::Increase => rate,
            ChangePolicy::Decrease => -rate,
            ChangePolicy::MatchInflation => inflation_rate,
            ChangePolicy::InflationPlus => inflation_rate + rate,
            ChangePolicy::InflationMinus => inflation_rate - rate,
        }
    }

    /// Compound multiplier after `years_elapsed` whole years
    pub fn multiplier(self, change_rate: Option<f64>, inflation_rate: f64, years_elapsed: i32) -> f64 {
        if years_elapsed <= 0 {
            return 1.0;
        }
        (1.0 + self.annual_rate(change_rate, inflation_rate)).powi(years_elapsed)
    }
}

/// Tax treatment of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxTreatment {
    TaxFree,
    Income,
    CapitalGains,
}

/// Dividend tax treatment; `plan_settings` defers to the plan default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendTaxTreatment {
    TaxFree,
    Income,
    CapitalGains,
    PlanSettings,
}

impl DividendTaxTreatment {
    /// Resolve against the plan-level default
    pub fn resolve(self, default: TaxTreatment) -> TaxTreatment {
        match self {
            DividendTaxTreatment::TaxFree => TaxTreatment::TaxFree,
            DividendTaxTreatment::Income => TaxTreatment::Income,
            DividendTaxTreatment::CapitalGains => TaxTreatment::CapitalGains,
            DividendTaxTreatment::PlanSettings => default,
        }
    }
}

/// How income interacts with withholding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxHandling {
    Withhold,
    TaxExempt,
}

/// What kind of earnings an income item represents, for payroll taxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeKind {
    #[default]
    Employment,
    SelfEmployment,
    Other,
}

/// Expense classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendingType {
    Essential,
    Discretionary,
}

/// Social Security COLA assumption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColaAssumption {
    Fixed,
    MatchInflation,
    InflationPlus,
    InflationMinus,
}

/// One-time transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    SellAsset,
    BuyAsset,
    Transfer,
    Other,
}

/// Projection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum SimMode {
    Deterministic,
    MonteCarlo,
    Historical,
}

/// A household member
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Person {
    pub name: String,
    /// Birth year-month; ages are derived from this and the month cursor
    pub birthday: YearMonth,
    /// Primary state of residence (two-letter code); required for primary
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct People {
    pub primary: Person,
    #[serde(default)]
    pub spouse: Option<Person>,
}

/// A financial account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Account {
    /// Unique name; accounts are referenced by name throughout the plan
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AccountKind,
    pub owner: Owner,
    pub balance: f64,
    /// Required for taxable_brokerage, ignored otherwise
    #[serde(default)]
    pub cost_basis: Option<f64>,
    /// Annual growth rate as a decimal
    pub growth_rate: f64,
    /// Annual dividend yield as a decimal
    pub dividend_yield: f64,
    pub dividend_tax_treatment: DividendTaxTreatment,
    pub reinvest_dividends: bool,
    /// 0-100; drives the stock/bond blend in ensemble modes
    pub bond_allocation_percent: f64,
    /// Annual fee rate as a decimal
    pub yearly_fees: f64,
    pub allow_withdrawals: bool,
}

/// Employer match terms attached to a contribution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmployerMatch {
    /// Fraction of the employee contribution matched
    pub match_percent: f64,
    /// Cap expressed as a fraction of the referenced salary
    pub up_to_percent_of_salary: f64,
    /// Name of the income item whose amount is the salary base
    pub salary_reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Contribution {
    pub name: String,
    /// Account name, or the literal "income" for payroll-sourced dollars
    pub source_account: String,
    pub destination_account: String,
    pub amount: f64,
    pub frequency: Frequency,
    pub start_date: DateSpec,
    pub end_date: DateSpec,
    pub change_over_time: ChangePolicy,
    #[serde(default)]
    pub change_rate: Option<f64>,
    #[serde(default)]
    pub employer_match: Option<EmployerMatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Income {
    pub name: String,
    pub owner: Owner,
    pub amount: f64,
    pub frequency: Frequency,
    pub start_date: DateSpec,
    pub end_date: DateSpec,
    pub change_over_time: ChangePolicy,
    #[serde(default)]
    pub change_rate: Option<f64>,
    pub tax_handling: TaxHandling,
    #[serde(default)]
    pub withhold_percent: Option<f64>,
    /// Drives FICA vs self-employment tax
    #[serde(default)]
    pub income_kind: IncomeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expense {
    pub name: String,
    pub owner: Owner,
    pub amount: f64,
    pub frequency: Frequency,
    pub start_date: DateSpec,
    pub end_date: DateSpec,
    pub change_over_time: ChangePolicy,
    #[serde(default)]
    pub change_rate: Option<f64>,
    pub spending_type: SpendingType,
}

/// Social Security parameters for one person
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocialSecurity {
    pub owner: Owner,
    /// Monthly benefit at full retirement age
    pub pia_at_fra: f64,
    pub fra_age_years: u32,
    pub fra_age_months: u32,
    pub claiming_age_years: u32,
    pub claiming_age_months: u32,
    pub cola_assumption: ColaAssumption,
    #[serde(default)]
    pub cola_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthcarePreMedicare {
    pub owner: Owner,
    pub monthly_premium: f64,
    pub annual_out_of_pocket: f64,
    #[serde(default)]
    pub start_date: Option<DateSpec>,
    #[serde(default)]
    pub end_date: Option<DateSpec>,
    pub change_over_time: ChangePolicy,
    #[serde(default)]
    pub change_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthcarePostMedicare {
    pub owner: Owner,
    #[serde(default)]
    pub medicare_start_date: Option<DateSpec>,
    pub part_b_monthly_premium: f64,
    pub supplement_monthly_premium: f64,
    pub part_d_monthly_premium: f64,
    pub annual_out_of_pocket: f64,
    pub change_over_time: ChangePolicy,
    #[serde(default)]
    pub change_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IrmaaSettings {
    pub enabled: bool,
    pub lookback_years: u32,
}

impl Default for IrmaaSettings {
    fn default() -> Self {
        Self { enabled: true, lookback_years: 2 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Healthcare {
    #[serde(default)]
    pub pre_medicare: Vec<HealthcarePreMedicare>,
    #[serde(default)]
    pub post_medicare: Vec<HealthcarePostMedicare>,
    #[serde(default)]
    pub irmaa: IrmaaSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Mortgage {
    /// Fixed monthly payment
    pub payment: f64,
    pub remaining_balance: f64,
    /// Annual interest rate as a decimal
    pub interest_rate: f64,
    pub end_date: DateSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaintenanceExpense {
    pub name: String,
    pub amount: f64,
    /// monthly or annual; annual charges fire in January
    pub frequency: Frequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealAsset {
    /// Unique name; transactions link to assets by name
    pub name: String,
    pub current_value: f64,
    /// Required for assets referenced by sell_asset transactions
    #[serde(default)]
    pub purchase_price: Option<f64>,
    pub primary_residence: bool,
    pub change_over_time: ChangePolicy,
    #[serde(default)]
    pub change_rate: Option<f64>,
    /// Annual rate applied to current value
    pub property_tax_rate: f64,
    #[serde(default)]
    pub mortgage: Option<Mortgage>,
    #[serde(default)]
    pub maintenance_expenses: Vec<MaintenanceExpense>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    pub name: String,
    pub date: DateSpec,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub fees: f64,
    pub tax_treatment: TaxTreatment,
    #[serde(default)]
    pub linked_asset: Option<String>,
    #[serde(default)]
    pub deposit_to_account: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transfer {
    pub name: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: f64,
    pub frequency: Frequency,
    pub start_date: DateSpec,
    pub end_date: DateSpec,
    pub tax_treatment: TaxTreatment,
}

/// Ordered drain policy for covering shortfalls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WithdrawalPolicy {
    /// Account-kind sequence used when use_account_specific is false
    #[serde(default)]
    pub order: Vec<AccountKind>,
    /// Explicit account-name sequence
    #[serde(default)]
    pub account_specific_order: Vec<String>,
    #[serde(default)]
    pub use_account_specific: bool,
    #[serde(default = "default_true")]
    pub rmd_satisfied_first: bool,
}

fn default_true() -> bool {
    true
}

impl Default for WithdrawalPolicy {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            account_specific_order: Vec::new(),
            use_account_specific: false,
            rmd_satisfied_first: true,
        }
    }
}

/// A Roth conversion schedule: fixed annual amount or December bracket-fill
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RothConversion {
    pub name: String,
    pub from_account: String,
    pub to_account: String,
    #[serde(default)]
    pub annual_amount: Option<f64>,
    pub start_date: DateSpec,
    pub end_date: DateSpec,
    /// Marginal bracket name such as "22%"
    #[serde(default)]
    pub fill_to_bracket: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RmdSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rmd_start_age")]
    pub rmd_start_age: u32,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub destination_account: Option<String>,
}

fn default_rmd_start_age() -> u32 {
    73
}

impl Default for RmdSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            rmd_start_age: default_rmd_start_age(),
            accounts: Vec::new(),
            destination_account: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemizedDeductions {
    #[serde(default = "default_salt_cap")]
    pub salt_cap: f64,
    #[serde(default = "default_true")]
    pub mortgage_interest_deductible: bool,
    #[serde(default)]
    pub charitable_contributions: f64,
}

fn default_salt_cap() -> f64 {
    10_000.0
}

impl Default for ItemizedDeductions {
    fn default() -> Self {
        Self {
            salt_cap: default_salt_cap(),
            mortgage_interest_deductible: true,
            charitable_contributions: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaxSettings {
    #[serde(default = "default_true")]
    pub use_current_brackets: bool,
    #[serde(default = "default_bracket_year")]
    pub bracket_year: i32,
    #[serde(default)]
    pub federal_effective_rate_override: Option<f64>,
    #[serde(default)]
    pub state_effective_rate_override: Option<f64>,
    #[serde(default)]
    pub capital_gains_rate_override: Option<f64>,
    #[serde(default)]
    pub standard_deduction_override: Option<f64>,
    #[serde(default)]
    pub itemized_deductions: ItemizedDeductions,
    #[serde(default = "default_true")]
    pub niit_enabled: bool,
    #[serde(default = "default_true")]
    pub amt_enabled: bool,
}

fn default_bracket_year() -> i32 {
    2026
}

impl Default for TaxSettings {
    fn default() -> Self {
        Self {
            use_current_brackets: true,
            bracket_year: default_bracket_year(),
            federal_effective_rate_override: None,
            state_effective_rate_override: None,
            capital_gains_rate_override: None,
            standard_deduction_override: None,
            itemized_deductions: ItemizedDeductions::default(),
            niit_enabled: true,
            amt_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanSettings {
    pub plan_start: YearMonth,
    pub plan_end: YearMonth,
    /// Annual inflation assumption as a decimal
    pub inflation_rate: f64,
    pub default_dividend_tax_treatment: TaxTreatment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonteCarloSettings {
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    #[serde(default = "default_stock_mean")]
    pub stock_mean_return: f64,
    #[serde(default = "default_stock_std")]
    pub stock_std_dev: f64,
    #[serde(default = "default_bond_mean")]
    pub bond_mean_return: f64,
    #[serde(default = "default_bond_std")]
    pub bond_std_dev: f64,
    /// Stock/bond return correlation in [-1, 1]
    #[serde(default = "default_correlation")]
    pub correlation: f64,
}

fn default_num_simulations() -> u32 {
    1000
}
fn default_stock_mean() -> f64 {
    0.10
}
fn default_stock_std() -> f64 {
    0.18
}
fn default_bond_mean() -> f64 {
    0.04
}
fn default_bond_std() -> f64 {
    0.06
}
fn default_correlation() -> f64 {
    0.2
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            num_simulations: default_num_simulations(),
            stock_mean_return: default_stock_mean(),
            stock_std_dev: default_stock_std(),
            bond_mean_return: default_bond_mean(),
            bond_std_dev: default_bond_std(),
            correlation: default_correlation(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoricalSettings {
    #[serde(default = "default_hist_start")]
    pub start_year: i32,
    #[serde(default = "default_hist_end")]
    pub end_year: i32,
    /// Rolling windows vs independent annual draws
    #[serde(default = "default_true")]
    pub use_rolling_periods: bool,
}

fn default_hist_start() -> i32 {
    1926
}
fn default_hist_end() -> i32 {
    2024
}

impl Default for HistoricalSettings {
    fn default() -> Self {
        Self {
            start_year: default_hist_start(),
            end_year: default_hist_end(),
            use_rolling_periods: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationSettings {
    #[serde(default = "default_mode")]
    pub mode: SimMode,
    #[serde(default)]
    pub monte_carlo: MonteCarloSettings,
    #[serde(default)]
    pub historical: HistoricalSettings,
}

fn default_mode() -> SimMode {
    SimMode::Deterministic
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            monte_carlo: MonteCarloSettings::default(),
            historical: HistoricalSettings::default(),
        }
    }
}

/// A complete validated household plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    pub people: People,
    pub filing_status: FilingStatus,
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub contributions: Vec<Contribution>,
    #[serde(default)]
    pub income: Vec<Income>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub social_security: Vec<SocialSecurity>,
    #[serde(default)]
    pub healthcare: Healthcare,
    #[serde(default)]
    pub real_assets: Vec<RealAsset>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub transfers: Vec<Transfer>,
    #[serde(default)]
    pub withdrawal_strategy: WithdrawalPolicy,
    #[serde(default)]
    pub roth_conversions: Vec<RothConversion>,
    #[serde(default)]
    pub rmds: RmdSettings,
    #[serde(default)]
    pub tax_settings: TaxSettings,
    pub plan_settings: PlanSettings,
    #[serde(default)]
    pub simulation_settings: SimulationSettings,
}

impl Plan {
    /// Name of the first cash account; the validator guarantees one exists
    pub fn cash_account(&self) -> Option<&str> {
        self.accounts
            .iter()
            .find(|a| a.kind == AccountKind::Cash)
            .map(|a| a.name.as_str())
    }

    pub fn account(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Two-letter residence state of the primary person
    pub fn primary_state(&self) -> &str {
        self.people.primary.state.as_deref().unwrap_or("CA")
    }

    pub fn plan_start(&self) -> YearMonth {
        self.plan_settings.plan_start
    }

    pub fn plan_end(&self) -> YearMonth {
        self.plan_settings.plan_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_month_parse_and_order() {
        let a = YearMonth::parse("2026-01").unwrap();
        let b = YearMonth::parse("2026-12").unwrap();
        assert!(a < b);
        assert_eq!(b.next(), YearMonth::new(2027, 1));
        assert_eq!(b.months_since(a), 11);
        assert!(YearMonth::parse("2026-13").is_none());
        assert!(YearMonth::parse("garbage").is_none());
    }

    #[test]
    fn test_date_spec_parsing() {
        let spec: DateSpec = serde_json::from_str("\"start\"").unwrap();
        assert_eq!(spec, DateSpec::PlanStart);
        let spec: DateSpec = serde_json::from_str("\"2030-06\"").unwrap();
        assert_eq!(spec, DateSpec::At(YearMonth::new(2030, 6)));
        assert!(serde_json::from_str::<DateSpec>("\"2030-6\"").is_err());
    }

    #[test]
    fn test_occurs_this_month_frequencies() {
        let start = YearMonth::new(2026, 1);
        let end = YearMonth::new(2030, 12);
        let item_start = DateSpec::At(YearMonth::new(2026, 3));
        let item_end = DateSpec::PlanEnd;

        assert!(occurs_this_month(
            Frequency::Monthly,
            item_start,
            item_end,
            YearMonth::new(2027, 7),
            start,
            end
        ));
        // Annual fires only on the anniversary month
        assert!(occurs_this_month(
            Frequency::Annual,
            item_start,
            item_end,
            YearMonth::new(2027, 3),
            start,
            end
        ));
        assert!(!occurs_this_month(
            Frequency::Annual,
            item_start,
            item_end,
            YearMonth::new(2027, 4),
            start,
            end
        ));
        // One-time fires exactly once
        assert!(occurs_this_month(
            Frequency::OneTime,
            item_start,
            item_end,
            YearMonth::new(2026, 3),
            start,
            end
        ));
        assert!(!occurs_this_month(
            Frequency::OneTime,
            item_start,
            item_end,
            YearMonth::new(2027, 3),
            start,
            end
        ));
        // Inactive before the window opens
        assert!(!occurs_this_month(
            Frequency::Monthly,
            item_start,
            item_end,
            YearMonth::new(2026, 2),
            start,
            end
        ));
    }

    #[test]
    fn test_change_policy_multipliers() {
        let inflation = 0.03;
        assert_eq!(ChangePolicy::Fixed.multiplier(None, inflation, 5), 1.0);
        let up = ChangePolicy::Increase.multiplier(Some(0.02), inflation, 2);
        assert!((up - 1.02_f64.powi(2)).abs() < 1e-12);
        let matched = ChangePolicy::MatchInflation.multiplier(None, inflation, 3);
        assert!((matched - 1.03_f64.powi(3)).abs() < 1e-12);
        let minus = ChangePolicy::InflationMinus.annual_rate(Some(0.01), inflation);
        assert!((minus - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_account_kind_serde_names() {
        let kind: AccountKind = serde_json::from_str("\"401k\"").unwrap();
        assert_eq!(kind, AccountKind::K401);
        let kind: AccountKind = serde_json::from_str("\"529\"").unwrap();
        assert_eq!(kind, AccountKind::Plan529);
        let kind: AccountKind = serde_json::from_str("\"taxable_brokerage\"").unwrap();
        assert_eq!(kind, AccountKind::TaxableBrokerage);
    }
}
