//! finplan - Household financial plan projection engine
//!
//! This library provides:
//! - A typed plan schema with JSON loading and cross-reference validation
//! - A month-by-month simulation engine coupling income, payroll and income
//!   taxes, contributions, growth, withdrawals, and annual settlement
//! - Retirement subsystems: Social Security, RMDs, Medicare/IRMAA,
//!   Roth conversions, and a prioritized withdrawal strategy
//! - Deterministic, Monte-Carlo, and historical-replay projection modes
//!   with seeded reproducibility and percentile aggregation

pub mod plan;
pub mod projection;
pub mod simulation;
pub mod tax;

// Re-export commonly used types
pub use plan::{load_plan, validate_plan, Plan, PlanError, SimMode};
pub use projection::{AnnualResult, MonthResult, MonthlyEngine, PlanState};
pub use simulation::{RunOptions, SimError, SimulationResult, SimulationRunner};
pub use tax::{TaxResult, TaxTables, YearIncomeSummary};
