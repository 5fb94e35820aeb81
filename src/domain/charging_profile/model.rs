//! ChargingProfile domain entities
//!
//! Read-only inputs to the resolution engine. Profiles are assumed to be
//! pre-validated by the protocol layer that received them; the engine only
//! guards against the malformations it can repair locally (see the
//! diagnostics module).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin/role of a profile. Profiles of one purpose stack against each
/// other; different purposes are combined, never stacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfilePurpose {
    /// Limits imposed by an external system (e.g. a grid operator).
    ChargingStationExternalConstraints,
    /// Station-wide maximum, always applies.
    ChargingStationMaxProfile,
    /// Default limit for any transaction without its own profile.
    TxDefaultProfile,
    /// Limit for one specific transaction.
    TxProfile,
}

/// How a profile anchors its schedule in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileKind {
    /// Starts at the schedule's declared `startSchedule`.
    Absolute,
    /// Repeats daily or weekly from `startSchedule`.
    Recurring,
    /// Starts when the charging session starts.
    Relative,
    /// Limits are updated externally while the schedule runs; anchored at
    /// the moment of resolution.
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrencyKind {
    Daily,
    Weekly,
}

/// Rate unit of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateUnit {
    #[serde(rename = "A")]
    Amps,
    #[serde(rename = "W")]
    Watts,
}

/// Charging operation mode of a period (bidirectional charging).
///
/// Only `ChargingOnly` (or an absent mode) triggers default-limit
/// substitution; setpoint-driven modes deliberately leave the limit unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationMode {
    Idle,
    ChargingOnly,
    CentralSetpoint,
    ExternalSetpoint,
    ExternalLimits,
    CentralFrequency,
    LocalFrequency,
    LocalLoadBalancing,
}

/// One relative-time breakpoint inside a profile's schedule.
///
/// All rate values are optional; the wire encoding's "field absent" is the
/// only way a value can be unspecified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePeriod {
    /// Offset in seconds from the schedule start.
    pub start_period: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    #[serde(rename = "limit_L2", skip_serializing_if = "Option::is_none")]
    pub limit_l2: Option<f64>,
    #[serde(rename = "limit_L3", skip_serializing_if = "Option::is_none")]
    pub limit_l3: Option<f64>,
    /// Maximum discharge rate, zero or negative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discharge_limit: Option<f64>,
    #[serde(rename = "dischargeLimit_L2", skip_serializing_if = "Option::is_none")]
    pub discharge_limit_l2: Option<f64>,
    #[serde(rename = "dischargeLimit_L3", skip_serializing_if = "Option::is_none")]
    pub discharge_limit_l3: Option<f64>,
    /// Signed target rate: positive charges, negative discharges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<f64>,
    #[serde(rename = "setpoint_L2", skip_serializing_if = "Option::is_none")]
    pub setpoint_l2: Option<f64>,
    #[serde(rename = "setpoint_L3", skip_serializing_if = "Option::is_none")]
    pub setpoint_l3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_phases: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_to_use: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_mode: Option<OperationMode>,
}

/// A profile's schedule: an anchored, ordered list of periods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingSchedule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_schedule: Option<DateTime<Utc>>,
    /// Total schedule length in seconds; open-ended when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(rename = "chargingRateUnit")]
    pub rate_unit: RateUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_charging_rate: Option<f64>,
    /// Sorted ascending by `start_period`; the first period starts at 0.
    #[serde(rename = "chargingSchedulePeriod")]
    pub periods: Vec<SchedulePeriod>,
}

/// One externally supplied limit instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingProfile {
    pub id: i32,
    /// Priority among profiles of the same purpose; higher wins.
    pub stack_level: i32,
    #[serde(rename = "chargingProfilePurpose")]
    pub purpose: ProfilePurpose,
    #[serde(rename = "chargingProfileKind")]
    pub kind: ProfileKind,
    #[serde(rename = "recurrencyKind", skip_serializing_if = "Option::is_none")]
    pub recurrency: Option<RecurrencyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(rename = "chargingSchedule")]
    pub schedule: ChargingSchedule,
}
