//! Tax tables and the annual/payroll tax engines

pub mod annual;
pub mod fica;
pub mod tables;

pub use annual::{progressive_tax, TaxResult, YearIncomeSummary};
pub use fica::{employment_fica, se_wage_base_credit, self_employment_tax};
pub use tables::{Bracket, TaxTables, BASE_TAX_YEAR};
