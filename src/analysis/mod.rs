//! Analysis modules.
//!
//! The aggregator rolls activity records up into per-agent rows; the
//! calendar supplies the working-day pacing convention it uses.

pub mod aggregator;
pub mod calendar;

pub use aggregator::*;
pub use calendar::FiscalCalendar;
