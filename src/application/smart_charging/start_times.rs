//! Start-time resolution
//!
//! Determines the absolute instants at which a profile's schedule begins
//! (possibly repeating) inside a composite window:
//!
//! - Absolute schedules start at their declared `startSchedule`.
//! - Relative schedules start when the session started.
//! - Dynamic schedules are anchored at the moment of resolution.
//! - Recurring schedules repeat daily or weekly from `startSchedule`; the
//!   occurrence covering `now` starts in the past and is included so
//!   currently active periods are found.

use chrono::{DateTime, Duration, Utc};

use crate::domain::charging_profile::{ChargingProfile, ProfileKind, RecurrencyKind};
use crate::domain::limits::{SECONDS_PER_DAY, SECONDS_PER_WEEK};
use crate::shared::diagnostics::{Diagnostics, ResolutionWarning};

use super::clock::{elapsed_seconds, floor_seconds};

/// Ordered start instants of `profile` within `[now, window_end]`.
///
/// Degenerate recurring profiles (no start, no recurrency kind) produce no
/// instants and a diagnostic; the profile then contributes nothing to the
/// composite schedule.
pub fn calculate_start_times(
    now: DateTime<Utc>,
    window_end: DateTime<Utc>,
    session_start: Option<DateTime<Utc>>,
    profile: &ChargingProfile,
    diagnostics: &mut Diagnostics,
) -> Vec<DateTime<Utc>> {
    let fallback = floor_seconds(now);

    match profile.kind {
        ProfileKind::Absolute => {
            let start = match profile.schedule.start_schedule {
                Some(start) => start,
                None => {
                    // An Absolute profile should declare its start; fall
                    // back to validFrom, then to the window start.
                    diagnostics.push(ResolutionWarning::MissingStartSchedule {
                        profile_id: profile.id,
                    });
                    profile.valid_from.unwrap_or(now)
                }
            };
            vec![floor_seconds(start)]
        }
        ProfileKind::Relative => {
            // Without a session the schedule is taken to start now.
            vec![session_start.map(floor_seconds).unwrap_or(fallback)]
        }
        ProfileKind::Dynamic => vec![fallback],
        ProfileKind::Recurring => {
            let Some(recurrency) = profile.recurrency else {
                diagnostics.push(ResolutionWarning::RecurringWithoutRecurrency {
                    profile_id: profile.id,
                });
                return Vec::new();
            };
            let Some(start_schedule) = profile.schedule.start_schedule else {
                diagnostics.push(ResolutionWarning::RecurringWithoutStartSchedule {
                    profile_id: profile.id,
                });
                return Vec::new();
            };

            let step = match recurrency {
                RecurrencyKind::Daily => SECONDS_PER_DAY,
                RecurrencyKind::Weekly => SECONDS_PER_WEEK,
            };

            // Wind back to the occurrence covering `now`. The modulo is
            // normalized so a startSchedule in the future still lands on
            // the occurrence grid.
            let mut go_back = elapsed_seconds(fallback, floor_seconds(start_schedule)) % step;
            if go_back < 0 {
                go_back += step;
            }

            let end = floor_seconds(window_end);
            let mut start = fallback - Duration::seconds(go_back);
            let mut starts = Vec::new();
            while start <= end {
                starts.push(start);
                start += Duration::seconds(step);
            }
            starts
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::charging_profile::{ChargingSchedule, ProfilePurpose, RateUnit, SchedulePeriod};

    fn profile(kind: ProfileKind) -> ChargingProfile {
        ChargingProfile {
            id: 1,
            stack_level: 0,
            purpose: ProfilePurpose::TxDefaultProfile,
            kind,
            recurrency: None,
            valid_from: None,
            valid_to: None,
            schedule: ChargingSchedule {
                start_schedule: None,
                duration: None,
                rate_unit: RateUnit::Amps,
                min_charging_rate: None,
                periods: vec![SchedulePeriod {
                    start_period: 0,
                    limit: Some(16.0),
                    ..Default::default()
                }],
            },
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn absolute_uses_start_schedule() {
        let mut p = profile(ProfileKind::Absolute);
        p.schedule.start_schedule = Some(at("2024-01-01T06:00:00Z"));
        let mut diagnostics = Diagnostics::default();
        let starts = calculate_start_times(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &p,
            &mut diagnostics,
        );
        assert_eq!(starts, vec![at("2024-01-01T06:00:00Z")]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn absolute_without_start_falls_back_to_valid_from() {
        let mut p = profile(ProfileKind::Absolute);
        p.valid_from = Some(at("2024-01-01T07:00:00Z"));
        let mut diagnostics = Diagnostics::default();
        let starts = calculate_start_times(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &p,
            &mut diagnostics,
        );
        assert_eq!(starts, vec![at("2024-01-01T07:00:00Z")]);
        assert_eq!(
            diagnostics.warnings(),
            [ResolutionWarning::MissingStartSchedule { profile_id: 1 }]
        );
    }

    #[test]
    fn absolute_without_start_or_valid_from_uses_now() {
        let p = profile(ProfileKind::Absolute);
        let mut diagnostics = Diagnostics::default();
        let starts = calculate_start_times(
            at("2024-01-01T08:00:00.500Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &p,
            &mut diagnostics,
        );
        assert_eq!(starts, vec![at("2024-01-01T08:00:00Z")]);
        assert_eq!(diagnostics.warnings().len(), 1);
    }

    #[test]
    fn relative_prefers_session_start() {
        let p = profile(ProfileKind::Relative);
        let mut diagnostics = Diagnostics::default();
        let starts = calculate_start_times(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            Some(at("2024-01-01T07:45:30Z")),
            &p,
            &mut diagnostics,
        );
        assert_eq!(starts, vec![at("2024-01-01T07:45:30Z")]);

        let starts = calculate_start_times(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &p,
            &mut diagnostics,
        );
        assert_eq!(starts, vec![at("2024-01-01T08:00:00Z")]);
    }

    #[test]
    fn dynamic_starts_now() {
        let p = profile(ProfileKind::Dynamic);
        let mut diagnostics = Diagnostics::default();
        let starts = calculate_start_times(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            Some(at("2024-01-01T07:00:00Z")),
            &p,
            &mut diagnostics,
        );
        assert_eq!(starts, vec![at("2024-01-01T08:00:00Z")]);
    }

    #[test]
    fn daily_recurrence_includes_covering_occurrence() {
        let mut p = profile(ProfileKind::Recurring);
        p.recurrency = Some(RecurrencyKind::Daily);
        p.schedule.start_schedule = Some(at("2023-12-27T16:00:00Z"));
        let mut diagnostics = Diagnostics::default();
        // 08:00, eight hours before the 16:00 boundary: the covering
        // occurrence started yesterday at 16:00.
        let starts = calculate_start_times(
            at("2024-01-02T08:00:00Z"),
            at("2024-01-03T08:00:00Z"),
            None,
            &p,
            &mut diagnostics,
        );
        assert_eq!(
            starts,
            vec![at("2024-01-01T16:00:00Z"), at("2024-01-02T16:00:00Z")]
        );
    }

    #[test]
    fn weekly_recurrence_steps_seven_days() {
        let mut p = profile(ProfileKind::Recurring);
        p.recurrency = Some(RecurrencyKind::Weekly);
        p.schedule.start_schedule = Some(at("2023-12-27T16:00:00Z"));
        let mut diagnostics = Diagnostics::default();
        let starts = calculate_start_times(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-08T08:00:00Z"),
            None,
            &p,
            &mut diagnostics,
        );
        assert_eq!(
            starts,
            vec![at("2023-12-27T16:00:00Z"), at("2024-01-03T16:00:00Z")]
        );
    }

    #[test]
    fn future_start_schedule_normalizes_onto_grid() {
        let mut p = profile(ProfileKind::Recurring);
        p.recurrency = Some(RecurrencyKind::Daily);
        // startSchedule is tomorrow; the occurrence grid still covers now
        p.schedule.start_schedule = Some(at("2024-01-03T16:00:00Z"));
        let mut diagnostics = Diagnostics::default();
        let starts = calculate_start_times(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &p,
            &mut diagnostics,
        );
        assert_eq!(starts, vec![at("2023-12-31T16:00:00Z")]);
    }

    #[test]
    fn recurring_without_recurrency_warns_and_yields_nothing() {
        let mut p = profile(ProfileKind::Recurring);
        p.schedule.start_schedule = Some(at("2024-01-01T00:00:00Z"));
        let mut diagnostics = Diagnostics::default();
        let starts = calculate_start_times(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &p,
            &mut diagnostics,
        );
        assert!(starts.is_empty());
        assert_eq!(
            diagnostics.warnings(),
            [ResolutionWarning::RecurringWithoutRecurrency { profile_id: 1 }]
        );
    }

    #[test]
    fn recurring_without_start_schedule_warns_and_yields_nothing() {
        let mut p = profile(ProfileKind::Recurring);
        p.recurrency = Some(RecurrencyKind::Daily);
        let mut diagnostics = Diagnostics::default();
        let starts = calculate_start_times(
            at("2024-01-01T08:00:00Z"),
            at("2024-01-01T10:00:00Z"),
            None,
            &p,
            &mut diagnostics,
        );
        assert!(starts.is_empty());
        assert_eq!(
            diagnostics.warnings(),
            [ResolutionWarning::RecurringWithoutStartSchedule { profile_id: 1 }]
        );
    }
}
