//! Composite-schedule resolution
//!
//! Resolves a set of charging profiles into one gap-free limit timeline
//! for a requested window:
//!
//! 1. start-time resolution and period expansion per profile,
//! 2. stack-level flattening per purpose,
//! 3. lock-step combination across purposes (transaction profiles override
//!    transaction defaults; limiting purposes merge to the lowest limit;
//!    EVSEs roll up into a station total by summing),
//! 4. conversion into the requested rate unit.
//!
//! The engine is a pure function of its inputs: no state is kept between
//! invocations and the same inputs always produce the same schedule.

pub mod clock;
pub mod combine;
pub mod convert;
pub mod expand;
pub mod flatten;
pub mod start_times;

use chrono::{DateTime, Utc};

use crate::config::ScheduleConfig;
use crate::domain::charging_profile::{ChargingProfile, ProfilePurpose, RateUnit};
use crate::domain::composite_schedule::CompositeSchedule;
use crate::shared::diagnostics::{Diagnostics, ResolutionWarning};

use clock::{elapsed_seconds, floor_seconds};
use combine::{merge_by_lowest_limit, merge_by_summing_limits, merge_tx_with_tx_default};
use convert::convert_timeline;
use expand::expand_profiles_for_purpose;
use flatten::{flatten_periods, IntermediateTimeline};

pub use expand::ResolvedPeriod;
pub use flatten::IntermediatePeriod;

/// A resolved schedule and the warnings produced while resolving it.
#[derive(Debug)]
pub struct Resolution {
    pub schedule: CompositeSchedule,
    pub warnings: Vec<ResolutionWarning>,
}

/// One EVSE's applicable profiles and session start, input to the
/// station-wide roll-up.
#[derive(Debug, Clone, Default)]
pub struct EvseProfiles {
    pub session_start: Option<DateTime<Utc>>,
    pub profiles: Vec<ChargingProfile>,
}

/// Resolve the composite schedule of one EVSE (or of the station treated
/// as a single consumer) over `[now, window_end)`.
///
/// The caller supplies the profiles it deems applicable; the engine groups
/// them by purpose, arbitrates stack levels within each purpose, merges
/// purposes to the lowest limit and converts into `rate_unit`.
pub fn resolve_composite_schedule(
    now: DateTime<Utc>,
    window_end: DateTime<Utc>,
    session_start: Option<DateTime<Utc>>,
    profiles: &[ChargingProfile],
    rate_unit: RateUnit,
    config: &ScheduleConfig,
) -> Resolution {
    let mut diagnostics = Diagnostics::default();

    let mut combined = purpose_timelines(
        now,
        window_end,
        session_start,
        &[profiles],
        &mut diagnostics,
    );
    combined.push(station_max_timeline(
        now,
        window_end,
        &[profiles],
        &mut diagnostics,
    ));

    let merged = merge_by_lowest_limit(&combined, config.revision);
    finish(merged, now, window_end, rate_unit, config, diagnostics)
}

/// Resolve the station-wide composite schedule: every EVSE's lowest-limit
/// timeline is computed first (station-wide profiles apply to each), the
/// EVSE totals are summed, and the station maximum caps the sum.
pub fn resolve_station_composite_schedule(
    now: DateTime<Utc>,
    window_end: DateTime<Utc>,
    evses: &[EvseProfiles],
    station_profiles: &[ChargingProfile],
    rate_unit: RateUnit,
    config: &ScheduleConfig,
) -> Resolution {
    let mut diagnostics = Diagnostics::default();

    let mut evse_timelines = Vec::with_capacity(evses.len());
    for evse in evses {
        let timelines = purpose_timelines(
            now,
            window_end,
            evse.session_start,
            &[&evse.profiles, station_profiles],
            &mut diagnostics,
        );
        evse_timelines.push(merge_by_lowest_limit(&timelines, config.revision));
    }

    let mut combined = vec![merge_by_summing_limits(
        &evse_timelines,
        config.default_limit_amps,
        config.default_limit_watts,
        config.revision,
    )];
    combined.push(station_max_timeline(
        now,
        window_end,
        &[station_profiles],
        &mut diagnostics,
    ));

    let merged = merge_by_lowest_limit(&combined, config.revision);
    finish(merged, now, window_end, rate_unit, config, diagnostics)
}

/// The per-purpose timelines every resolution starts from: external
/// constraints, and the transaction profile overriding the transaction
/// default.
fn purpose_timelines(
    now: DateTime<Utc>,
    window_end: DateTime<Utc>,
    session_start: Option<DateTime<Utc>>,
    profile_sets: &[&[ChargingProfile]],
    diagnostics: &mut Diagnostics,
) -> Vec<IntermediateTimeline> {
    let external = expand_profiles_for_purpose(
        now,
        window_end,
        session_start,
        profile_sets,
        ProfilePurpose::ChargingStationExternalConstraints,
        diagnostics,
    );
    let tx_default = expand_profiles_for_purpose(
        now,
        window_end,
        session_start,
        profile_sets,
        ProfilePurpose::TxDefaultProfile,
        diagnostics,
    );
    let tx = expand_profiles_for_purpose(
        now,
        window_end,
        session_start,
        profile_sets,
        ProfilePurpose::TxProfile,
        diagnostics,
    );

    vec![
        flatten_periods(&external, now, window_end),
        merge_tx_with_tx_default(
            &flatten_periods(&tx, now, window_end),
            &flatten_periods(&tx_default, now, window_end),
        ),
    ]
}

fn station_max_timeline(
    now: DateTime<Utc>,
    window_end: DateTime<Utc>,
    profile_sets: &[&[ChargingProfile]],
    diagnostics: &mut Diagnostics,
) -> IntermediateTimeline {
    let entries = expand_profiles_for_purpose(
        now,
        window_end,
        None,
        profile_sets,
        ProfilePurpose::ChargingStationMaxProfile,
        diagnostics,
    );
    flatten_periods(&entries, now, window_end)
}

fn finish(
    merged: IntermediateTimeline,
    now: DateTime<Utc>,
    window_end: DateTime<Utc>,
    rate_unit: RateUnit,
    config: &ScheduleConfig,
    diagnostics: Diagnostics,
) -> Resolution {
    let start = floor_seconds(now);
    let end = floor_seconds(window_end);
    let default_limit = match rate_unit {
        RateUnit::Amps => config.default_limit_amps,
        RateUnit::Watts => config.default_limit_watts,
    };

    let periods = convert_timeline(
        &merged,
        rate_unit,
        default_limit,
        config.default_number_phases,
        config.supply_voltage,
    );

    Resolution {
        schedule: CompositeSchedule {
            schedule_start: start,
            duration: elapsed_seconds(end, start),
            rate_unit,
            periods,
        },
        warnings: diagnostics.into_warnings(),
    }
}
