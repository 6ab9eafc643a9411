//! The monthly projection engine and its retirement subsystems

pub mod assets;
pub mod basis;
pub mod engine;
pub mod healthcare;
pub mod results;
pub mod rmd;
pub mod roth;
pub mod social_security;
pub mod state;
pub mod withdrawals;

pub use assets::{annual_to_monthly_rate, AssetState, MortgagePayment};
pub use basis::BasisTracker;
pub use engine::{MonthlyEngine, YearReturns};
pub use results::{AnnualResult, MonthResult, YearSettlement};
pub use state::{PlanState, YtdAccumulators};
pub use withdrawals::{cover_shortfall, WithdrawalEvent, WithdrawalOutcome, PENALTY_AGE_MONTHS};
