//! Composite schedule: the resolved output timeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::charging_profile::RateUnit;
use crate::domain::limits::{approx_eq, opt_approx_eq};

/// One externally consumable breakpoint of the resolved schedule.
///
/// Each period applies from its `start_period` offset until the next
/// period's offset (or the end of the requested window); together the
/// periods tile the window without gaps or overlaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositePeriod {
    /// Offset in seconds from the schedule start.
    pub start_period: i64,
    /// Limit in the schedule's declared rate unit. Always present: periods
    /// no profile constrains carry the configured default.
    pub limit: f64,
    #[serde(rename = "limit_L2", skip_serializing_if = "Option::is_none")]
    pub limit_l2: Option<f64>,
    #[serde(rename = "limit_L3", skip_serializing_if = "Option::is_none")]
    pub limit_l3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discharge_limit: Option<f64>,
    #[serde(rename = "dischargeLimit_L2", skip_serializing_if = "Option::is_none")]
    pub discharge_limit_l2: Option<f64>,
    #[serde(rename = "dischargeLimit_L3", skip_serializing_if = "Option::is_none")]
    pub discharge_limit_l3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<f64>,
    #[serde(rename = "setpoint_L2", skip_serializing_if = "Option::is_none")]
    pub setpoint_l2: Option<f64>,
    #[serde(rename = "setpoint_L3", skip_serializing_if = "Option::is_none")]
    pub setpoint_l3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_phases: Option<u8>,
}

impl CompositePeriod {
    /// A period carrying only the default limit.
    pub fn default_limit(start_period: i64, limit: f64) -> Self {
        CompositePeriod {
            start_period,
            limit,
            limit_l2: None,
            limit_l3: None,
            discharge_limit: None,
            discharge_limit_l2: None,
            discharge_limit_l3: None,
            setpoint: None,
            setpoint_l2: None,
            setpoint_l3: None,
            number_phases: None,
        }
    }

    /// Value equality ignoring the start offset; adjacent periods with the
    /// same values are coalesced into one.
    pub fn same_values(&self, other: &Self) -> bool {
        approx_eq(self.limit, other.limit)
            && opt_approx_eq(self.limit_l2, other.limit_l2)
            && opt_approx_eq(self.limit_l3, other.limit_l3)
            && opt_approx_eq(self.discharge_limit, other.discharge_limit)
            && opt_approx_eq(self.discharge_limit_l2, other.discharge_limit_l2)
            && opt_approx_eq(self.discharge_limit_l3, other.discharge_limit_l3)
            && opt_approx_eq(self.setpoint, other.setpoint)
            && opt_approx_eq(self.setpoint_l2, other.setpoint_l2)
            && opt_approx_eq(self.setpoint_l3, other.setpoint_l3)
            && self.number_phases == other.number_phases
    }
}

/// The resolved limit timeline for one window, in one rate unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSchedule {
    pub schedule_start: DateTime<Utc>,
    /// Window length in seconds.
    pub duration: i64,
    #[serde(rename = "chargingRateUnit")]
    pub rate_unit: RateUnit,
    #[serde(rename = "chargingSchedulePeriod")]
    pub periods: Vec<CompositePeriod>,
}
