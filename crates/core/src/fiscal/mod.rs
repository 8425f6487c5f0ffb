//! Fiscal periods and the month-end close lock.

pub mod error;
pub mod guard;
pub mod period;

pub use error::PeriodError;
pub use guard::{plan_close, CloseAction, PeriodGuard};
pub use period::{FiscalPeriod, Module, PostedPeriod};
