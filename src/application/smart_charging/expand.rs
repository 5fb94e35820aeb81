//! Period expansion
//!
//! Maps a profile's relative-time periods onto absolute wall-clock time,
//! once per start instant, clipped to the profile's validity window and the
//! schedule's declared duration.

use chrono::{DateTime, Utc};

use crate::domain::charging_profile::{
    ChargingProfile, OperationMode, ProfilePurpose, RateUnit, SchedulePeriod,
};
use crate::domain::limits::{DEFAULT_LIMIT_AMPS, DEFAULT_LIMIT_WATTS, PeriodLimit};
use crate::shared::diagnostics::{Diagnostics, ResolutionWarning};

use super::clock::{elapsed_seconds, floor_seconds, offset_from};
use super::start_times::calculate_start_times;

/// One profile period mapped onto absolute time for a specific recurrence
/// instance. `start < end` and `end > now` hold for every entry the
/// expander emits.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub stack_level: i32,
    pub rate_unit: RateUnit,
    pub limit: PeriodLimit,
    pub discharge_limit: PeriodLimit,
    pub setpoint: PeriodLimit,
    pub number_phases: Option<u8>,
    pub phase_to_use: Option<u8>,
}

impl ResolvedPeriod {
    /// Build an entry for the period starting at `schedule_start +
    /// period.start_period`, running `duration` seconds from the schedule
    /// start. `duration` may be negative; such inverted entries are
    /// discarded by [`clip_to_validity`].
    fn new(
        schedule_start: DateTime<Utc>,
        duration: i64,
        period: &SchedulePeriod,
        profile: &ChargingProfile,
    ) -> Self {
        let anchor = floor_seconds(schedule_start);

        let mut limit = PeriodLimit {
            l1: period.limit,
            l2: period.limit_l2,
            l3: period.limit_l3,
        };
        // A plain charging period without an explicit limit falls back to
        // the protocol default for its rate unit. Setpoint-driven modes
        // keep the limit unset on purpose.
        let plain_charging = period
            .operation_mode
            .map_or(true, |mode| mode == OperationMode::ChargingOnly);
        if period.limit.is_none() && plain_charging {
            limit.l1 = Some(match profile.schedule.rate_unit {
                RateUnit::Amps => DEFAULT_LIMIT_AMPS,
                RateUnit::Watts => DEFAULT_LIMIT_WATTS,
            });
        }

        ResolvedPeriod {
            start: offset_from(anchor, period.start_period),
            end: offset_from(anchor, duration),
            stack_level: profile.stack_level,
            rate_unit: profile.schedule.rate_unit,
            limit,
            discharge_limit: PeriodLimit {
                l1: period.discharge_limit,
                l2: period.discharge_limit_l2,
                l3: period.discharge_limit_l3,
            },
            setpoint: PeriodLimit {
                l1: period.setpoint,
                l2: period.setpoint_l2,
                l3: period.setpoint_l3,
            },
            number_phases: period.number_phases,
            phase_to_use: period.phase_to_use,
        }
    }
}

/// Clamp an entry forward to `validFrom` and discard it when it is fully
/// before `validFrom`, inverted, or already expired.
fn clip_to_validity(
    mut entry: ResolvedPeriod,
    valid_from: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<ResolvedPeriod> {
    if let Some(valid_from) = valid_from.map(floor_seconds) {
        if valid_from > entry.start {
            if valid_from >= entry.end {
                return None;
            }
            entry.start = valid_from;
        }
    }
    (entry.end > entry.start && entry.end > now).then_some(entry)
}

/// Expand one schedule period (by index) into absolute-time entries, one
/// per start instant. Malformed periods are dropped with a diagnostic; the
/// rest of the profile is unaffected.
pub fn expand_period(
    now: DateTime<Utc>,
    profile: &ChargingProfile,
    period_index: usize,
    start_times: &[DateTime<Utc>],
    diagnostics: &mut Diagnostics,
) -> Vec<ResolvedPeriod> {
    let periods = &profile.schedule.periods;
    let Some(this_period) = periods.get(period_index) else {
        diagnostics.push(ResolutionWarning::PeriodIndexOutOfRange {
            profile_id: profile.id,
            index: period_index,
        });
        return Vec::new();
    };

    if period_index == 0 && this_period.start_period != 0 {
        diagnostics.push(ResolutionWarning::FirstPeriodNotZero {
            profile_id: profile.id,
            start_offset: this_period.start_period,
        });
        return Vec::new();
    }
    if period_index > 0 && periods[period_index - 1].start_period >= this_period.start_period {
        diagnostics.push(ResolutionWarning::NonIncreasingPeriod {
            profile_id: profile.id,
            index: period_index,
            start_offset: this_period.start_period,
        });
        return Vec::new();
    }

    let now = floor_seconds(now);
    let mut entries = Vec::new();

    for (occurrence, &entry_start) in start_times.iter().enumerate() {
        // The entry runs (from the schedule start) until the soonest of:
        // forever, the next period's offset, the schedule's declared
        // duration, the next recurrence, and validTo. Any of these may
        // produce a negative duration; clip_to_validity drops those.
        let mut duration = i64::MAX;

        if let Some(next) = periods.get(period_index + 1) {
            duration = next.start_period;
        }
        if let Some(declared) = profile.schedule.duration {
            duration = duration.min(declared);
        }
        if let Some(&next_occurrence) = start_times.get(occurrence + 1) {
            duration = duration.min(elapsed_seconds(next_occurrence, entry_start));
        }
        if let Some(valid_to) = profile.valid_to {
            duration = duration.min(elapsed_seconds(floor_seconds(valid_to), entry_start));
        }

        let entry = ResolvedPeriod::new(entry_start, duration, this_period, profile);
        if let Some(entry) = clip_to_validity(entry, profile.valid_from, now) {
            entries.push(entry);
        }
    }

    entries
}

fn expand_profile_unsorted(
    now: DateTime<Utc>,
    window_end: DateTime<Utc>,
    session_start: Option<DateTime<Utc>>,
    profile: &ChargingProfile,
    diagnostics: &mut Diagnostics,
) -> Vec<ResolvedPeriod> {
    let start_times = calculate_start_times(now, window_end, session_start, profile, diagnostics);
    let window_end = floor_seconds(window_end);

    let mut entries = Vec::new();
    for index in 0..profile.schedule.periods.len() {
        for entry in expand_period(now, profile, index, &start_times, diagnostics) {
            // entries starting past the window can never win
            if entry.start <= window_end {
                entries.push(entry);
            }
        }
    }
    entries
}

/// All validity-clipped entries of one profile, in date order.
pub fn expand_profile(
    now: DateTime<Utc>,
    window_end: DateTime<Utc>,
    session_start: Option<DateTime<Utc>>,
    profile: &ChargingProfile,
    diagnostics: &mut Diagnostics,
) -> Vec<ResolvedPeriod> {
    let mut entries = expand_profile_unsorted(now, window_end, session_start, profile, diagnostics);
    entries.sort_by_key(|entry| entry.start);
    entries
}

/// Entries of every profile matching `purpose` across all given sets, in
/// date order. The stable sort preserves collection order among entries
/// with identical start times.
pub fn expand_profiles_for_purpose(
    now: DateTime<Utc>,
    window_end: DateTime<Utc>,
    session_start: Option<DateTime<Utc>>,
    profile_sets: &[&[ChargingProfile]],
    purpose: ProfilePurpose,
    diagnostics: &mut Diagnostics,
) -> Vec<ResolvedPeriod> {
    let mut entries = Vec::new();
    for profiles in profile_sets {
        for profile in profiles.iter().filter(|p| p.purpose == purpose) {
            entries.extend(expand_profile_unsorted(
                now,
                window_end,
                session_start,
                profile,
                diagnostics,
            ));
        }
    }
    entries.sort_by_key(|entry| entry.start);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::charging_profile::{ChargingSchedule, ProfileKind, RecurrencyKind};

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn amp_period(start_period: i64, limit: f64) -> SchedulePeriod {
        SchedulePeriod {
            start_period,
            limit: Some(limit),
            ..Default::default()
        }
    }

    fn absolute_profile(start: &str, periods: Vec<SchedulePeriod>) -> ChargingProfile {
        ChargingProfile {
            id: 1,
            stack_level: 0,
            purpose: ProfilePurpose::TxDefaultProfile,
            kind: ProfileKind::Absolute,
            recurrency: None,
            valid_from: None,
            valid_to: None,
            schedule: ChargingSchedule {
                start_schedule: Some(at(start)),
                duration: None,
                rate_unit: RateUnit::Amps,
                min_charging_rate: None,
                periods,
            },
        }
    }

    #[test]
    fn single_period_runs_forever() {
        let profile = absolute_profile("2024-01-01T08:00:00Z", vec![amp_period(0, 16.0)]);
        let mut diagnostics = Diagnostics::default();
        let entries = expand_profile(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &profile,
            &mut diagnostics,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start, at("2024-01-01T08:00:00Z"));
        assert_eq!(entries[0].end, DateTime::<Utc>::MAX_UTC);
        assert_eq!(entries[0].limit, PeriodLimit::single(16.0));
    }

    #[test]
    fn next_period_bounds_duration() {
        let profile = absolute_profile(
            "2024-01-01T08:00:00Z",
            vec![amp_period(0, 10.0), amp_period(300, 20.0)],
        );
        let mut diagnostics = Diagnostics::default();
        let entries = expand_profile(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &profile,
            &mut diagnostics,
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start, at("2024-01-01T08:00:00Z"));
        assert_eq!(entries[0].end, at("2024-01-01T08:05:00Z"));
        assert_eq!(entries[1].start, at("2024-01-01T08:05:00Z"));
        assert_eq!(entries[1].end, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn schedule_duration_bounds_every_period() {
        let mut profile = absolute_profile(
            "2024-01-01T08:00:00Z",
            vec![amp_period(0, 10.0), amp_period(300, 20.0)],
        );
        profile.schedule.duration = Some(600);
        let mut diagnostics = Diagnostics::default();
        let entries = expand_profile(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &profile,
            &mut diagnostics,
        );
        assert_eq!(entries[0].end, at("2024-01-01T08:05:00Z"));
        assert_eq!(entries[1].end, at("2024-01-01T08:10:00Z"));
    }

    #[test]
    fn first_period_must_start_at_zero() {
        let profile = absolute_profile("2024-01-01T08:00:00Z", vec![amp_period(60, 10.0)]);
        let mut diagnostics = Diagnostics::default();
        let entries = expand_profile(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &profile,
            &mut diagnostics,
        );
        assert!(entries.is_empty());
        assert_eq!(
            diagnostics.warnings(),
            [ResolutionWarning::FirstPeriodNotZero {
                profile_id: 1,
                start_offset: 60
            }]
        );
    }

    #[test]
    fn non_increasing_period_is_dropped_alone() {
        let profile = absolute_profile(
            "2024-01-01T08:00:00Z",
            vec![amp_period(0, 10.0), amp_period(300, 20.0), amp_period(300, 30.0)],
        );
        let mut diagnostics = Diagnostics::default();
        let entries = expand_profile(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &profile,
            &mut diagnostics,
        );
        // periods 0 and 1 survive, the duplicate offset is dropped
        assert_eq!(entries.len(), 2);
        assert_eq!(
            diagnostics.warnings(),
            [ResolutionWarning::NonIncreasingPeriod {
                profile_id: 1,
                index: 2,
                start_offset: 300
            }]
        );
    }

    #[test]
    fn expired_entries_are_discarded() {
        let mut profile = absolute_profile("2024-01-01T00:00:00Z", vec![amp_period(0, 10.0)]);
        profile.schedule.duration = Some(3600);
        let mut diagnostics = Diagnostics::default();
        // the schedule ended at 01:00, we resolve at 08:00
        let entries = expand_profile(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &profile,
            &mut diagnostics,
        );
        assert!(entries.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn valid_from_clamps_start() {
        let mut profile = absolute_profile("2024-01-01T08:00:00Z", vec![amp_period(0, 10.0)]);
        profile.valid_from = Some(at("2024-01-01T09:00:00Z"));
        let mut diagnostics = Diagnostics::default();
        let entries = expand_profile(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &profile,
            &mut diagnostics,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start, at("2024-01-01T09:00:00Z"));
    }

    #[test]
    fn valid_to_before_start_discards_entry() {
        let mut profile = absolute_profile(
            "2024-01-01T08:00:00Z",
            vec![amp_period(0, 10.0), amp_period(3600, 20.0)],
        );
        profile.valid_to = Some(at("2024-01-01T08:30:00Z"));
        let mut diagnostics = Diagnostics::default();
        let entries = expand_profile(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T12:00:00Z"),
            None,
            &profile,
            &mut diagnostics,
        );
        // second period starts at 09:00, after validTo: negative duration,
        // discarded; first period is clipped to validTo by the duration rule
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].end, at("2024-01-01T08:30:00Z"));
    }

    #[test]
    fn default_limit_substituted_for_plain_charging() {
        let profile = absolute_profile(
            "2024-01-01T08:00:00Z",
            vec![SchedulePeriod {
                start_period: 0,
                ..Default::default()
            }],
        );
        let mut diagnostics = Diagnostics::default();
        let entries = expand_profile(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &profile,
            &mut diagnostics,
        );
        assert_eq!(entries[0].limit, PeriodLimit::single(DEFAULT_LIMIT_AMPS));

        let mut watt_profile = absolute_profile(
            "2024-01-01T08:00:00Z",
            vec![SchedulePeriod {
                start_period: 0,
                ..Default::default()
            }],
        );
        watt_profile.schedule.rate_unit = RateUnit::Watts;
        let entries = expand_profile(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &watt_profile,
            &mut diagnostics,
        );
        assert_eq!(entries[0].limit, PeriodLimit::single(DEFAULT_LIMIT_WATTS));
    }

    #[test]
    fn setpoint_mode_keeps_limit_unset() {
        let profile = absolute_profile(
            "2024-01-01T08:00:00Z",
            vec![SchedulePeriod {
                start_period: 0,
                setpoint: Some(-5000.0),
                operation_mode: Some(OperationMode::CentralSetpoint),
                ..Default::default()
            }],
        );
        let mut diagnostics = Diagnostics::default();
        let entries = expand_profile(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &profile,
            &mut diagnostics,
        );
        assert!(entries[0].limit.is_unset());
        assert_eq!(entries[0].setpoint, PeriodLimit::single(-5000.0));
    }

    #[test]
    fn recurrence_bounds_each_occurrence() {
        let profile = ChargingProfile {
            id: 9,
            stack_level: 2,
            purpose: ProfilePurpose::TxDefaultProfile,
            kind: ProfileKind::Recurring,
            recurrency: Some(RecurrencyKind::Daily),
            valid_from: None,
            valid_to: None,
            schedule: ChargingSchedule {
                start_schedule: Some(at("2024-01-01T00:00:00Z")),
                duration: None,
                rate_unit: RateUnit::Amps,
                min_charging_rate: None,
                periods: vec![amp_period(0, 16.0)],
            },
        };
        let mut diagnostics = Diagnostics::default();
        let entries = expand_profile(
            at("2024-01-02T06:00:00Z"),
            at("2024-01-03T06:00:00Z"),
            None,
            &profile,
            &mut diagnostics,
        );
        // two occurrences inside the window; the first is capped by the
        // next, the last runs open-ended (the flattener caps it)
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start, at("2024-01-02T00:00:00Z"));
        assert_eq!(entries[0].end, at("2024-01-03T00:00:00Z"));
        assert_eq!(entries[1].start, at("2024-01-03T00:00:00Z"));
        assert_eq!(entries[1].end, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn purpose_filter_collects_matching_profiles_only() {
        let mut max_profile =
            absolute_profile("2024-01-01T08:00:00Z", vec![amp_period(0, 32.0)]);
        max_profile.purpose = ProfilePurpose::ChargingStationMaxProfile;
        max_profile.id = 2;
        let tx_profile = absolute_profile("2024-01-01T08:00:00Z", vec![amp_period(0, 16.0)]);

        let profiles = vec![tx_profile, max_profile];
        let mut diagnostics = Diagnostics::default();
        let entries = expand_profiles_for_purpose(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &[&profiles],
            ProfilePurpose::ChargingStationMaxProfile,
            &mut diagnostics,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].limit, PeriodLimit::single(32.0));
    }
}
