//! Plan input model, JSON loading, and cross-reference validation

pub mod data;
pub mod loader;
pub mod validate;

pub use data::{
    Account, AccountKind, ChangePolicy, ColaAssumption, Contribution, DateSpec,
    DividendTaxTreatment, EmployerMatch, Expense, FilingStatus, Frequency, Healthcare,
    HealthcarePostMedicare, HealthcarePreMedicare, HistoricalSettings, Income, IncomeKind,
    IrmaaSettings, ItemizedDeductions, MaintenanceExpense, MonteCarloSettings, Mortgage, Owner,
    People, Person, Plan, PlanSettings, RealAsset, RmdSettings, RothConversion, SimMode,
    SimulationSettings, SocialSecurity, SpendingType, TaxHandling, TaxSettings, TaxTreatment,
    Transaction, TransactionKind, Transfer, WithdrawalPolicy, YearMonth,
};
pub use loader::{load_plan, parse_plan, PlanError};
pub use validate::{validate_plan, Validation};
