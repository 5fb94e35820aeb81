//! # Smart Charging: composite schedule engine
//!
//! Resolution engine that folds a charging station's time-varying limit
//! instructions ("charging profiles") into one unambiguous, gap-free limit
//! timeline the power path can follow.
//!
//! ## Architecture
//!
//! - **domain**: input model (charging profiles), per-phase limit values,
//!   and the composite schedule output types
//! - **application**: the resolution pipeline (start-time resolution,
//!   period expansion, stack-level flattening, timeline combination and
//!   unit conversion)
//! - **shared**: the structured diagnostics returned with every result
//! - **config**: engine defaults (limits, phases, supply voltage)
//!
//! The engine is purely functional: it keeps no state between invocations
//! and may be called concurrently with independent input snapshots.
//!
//! ```
//! use smart_charging::{resolve_composite_schedule, RateUnit, ScheduleConfig};
//!
//! let now = "2024-01-01T08:00:00Z".parse().unwrap();
//! let end = "2024-01-01T10:00:00Z".parse().unwrap();
//! let resolution =
//!     resolve_composite_schedule(now, end, None, &[], RateUnit::Amps, &ScheduleConfig::default());
//! assert_eq!(resolution.schedule.periods.len(), 1);
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod shared;

pub use application::smart_charging::{
    resolve_composite_schedule, resolve_station_composite_schedule, EvseProfiles, Resolution,
};
pub use config::{ConfigError, ProtocolRevision, ScheduleConfig};
pub use domain::charging_profile::{
    ChargingProfile, ChargingSchedule, OperationMode, ProfileKind, ProfilePurpose, RateUnit,
    RecurrencyKind, SchedulePeriod,
};
pub use domain::composite_schedule::{CompositePeriod, CompositeSchedule};
pub use shared::diagnostics::ResolutionWarning;
