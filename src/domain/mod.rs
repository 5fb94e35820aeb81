//! Core domain entities and value types

pub mod charging_profile;
pub mod composite_schedule;
pub mod limits;

// Re-export commonly used types
pub use charging_profile::{
    ChargingProfile, ChargingSchedule, OperationMode, ProfileKind, ProfilePurpose, RateUnit,
    RecurrencyKind, SchedulePeriod,
};
pub use composite_schedule::{CompositePeriod, CompositeSchedule};
pub use limits::{DualQuantity, PeriodLimit};
