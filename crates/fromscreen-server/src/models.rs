//! Database models for fromscreen.

pub mod conversion;
pub mod usage;

pub use conversion::{Conversion, NewConversion};
pub use usage::{UsageRecord, UsageSnapshot};
