//! Charging profile aggregate
//!
//! Contains the ChargingProfile entity and its related input types.

pub mod model;

pub use model::{
    ChargingProfile, ChargingSchedule, OperationMode, ProfileKind, ProfilePurpose, RateUnit,
    RecurrencyKind, SchedulePeriod,
};
