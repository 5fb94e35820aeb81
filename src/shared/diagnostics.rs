//! Structured resolution diagnostics
//!
//! The engine never fails: malformed periods are dropped and degraded
//! inputs repaired, and each such event is recorded here and returned to
//! the caller alongside the resolved schedule.

use thiserror::Error;
use tracing::warn;

/// Non-fatal problem found while resolving a composite schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionWarning {
    /// A profile's first period does not start at offset 0; the period is
    /// dropped.
    #[error("profile {profile_id}: first period must start at offset 0, found {start_offset}")]
    FirstPeriodNotZero { profile_id: i32, start_offset: i64 },

    /// Period offsets must be strictly increasing; the offending period is
    /// dropped.
    #[error(
        "profile {profile_id}: period {index} does not increase the start offset ({start_offset})"
    )]
    NonIncreasingPeriod {
        profile_id: i32,
        index: usize,
        start_offset: i64,
    },

    /// A period index past the end of the schedule was requested.
    #[error("profile {profile_id}: schedule period index {index} out of range")]
    PeriodIndexOutOfRange { profile_id: i32, index: usize },

    /// An Absolute profile without a start; resolution falls back to
    /// `validFrom`, then to the window start.
    #[error("absolute profile {profile_id} has no startSchedule, using fallback start")]
    MissingStartSchedule { profile_id: i32 },

    /// A Recurring profile without a start cannot produce any occurrence.
    #[error("recurring profile {profile_id} has no startSchedule")]
    RecurringWithoutStartSchedule { profile_id: i32 },

    /// A Recurring profile without a recurrency kind cannot repeat.
    #[error("recurring profile {profile_id} has no recurrency kind")]
    RecurringWithoutRecurrency { profile_id: i32 },
}

/// Warning collector for one engine invocation.
///
/// Everything pushed here is also emitted through `tracing` so operators
/// see degraded profiles without inspecting the result programmatically.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<ResolutionWarning>,
}

impl Diagnostics {
    pub fn push(&mut self, warning: ResolutionWarning) {
        warn!(%warning, "degraded charging profile input");
        self.warnings.push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn warnings(&self) -> &[ResolutionWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<ResolutionWarning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_in_order() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.push(ResolutionWarning::MissingStartSchedule { profile_id: 1 });
        diagnostics.push(ResolutionWarning::FirstPeriodNotZero {
            profile_id: 2,
            start_offset: 60,
        });
        assert_eq!(diagnostics.warnings().len(), 2);
        assert_eq!(
            diagnostics.warnings()[0],
            ResolutionWarning::MissingStartSchedule { profile_id: 1 }
        );
    }

    #[test]
    fn warning_messages_name_the_profile() {
        let warning = ResolutionWarning::NonIncreasingPeriod {
            profile_id: 7,
            index: 2,
            start_offset: 300,
        };
        assert!(warning.to_string().contains("profile 7"));
        assert!(warning.to_string().contains("period 2"));
    }
}
