//! Stack-level resolution
//!
//! Folds the expanded entries of one purpose into a single gap-free
//! timeline: at every instant the active entry with the highest stack level
//! wins, stretches no entry covers become explicit no-limit periods.

use chrono::{DateTime, Utc};

use crate::domain::charging_profile::RateUnit;
use crate::domain::limits::{DualQuantity, PeriodLimit};

use super::clock::{elapsed_seconds, floor_seconds};
use super::expand::ResolvedPeriod;

/// One breakpoint of the internal timeline. Offsets are seconds from the
/// window start; each quantity carries the rate domain of its source.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediatePeriod {
    pub start_offset: i64,
    pub limit: DualQuantity,
    pub discharge_limit: DualQuantity,
    pub setpoint: DualQuantity,
    pub number_phases: Option<u8>,
    pub phase_to_use: Option<u8>,
}

/// Ordered, coalesced sequence of [`IntermediatePeriod`]s starting at
/// offset 0.
pub type IntermediateTimeline = Vec<IntermediatePeriod>;

impl IntermediatePeriod {
    /// A period that constrains nothing.
    pub fn no_limit(start_offset: i64) -> Self {
        IntermediatePeriod {
            start_offset,
            limit: DualQuantity::UNSET,
            discharge_limit: DualQuantity::UNSET,
            setpoint: DualQuantity::UNSET,
            number_phases: None,
            phase_to_use: None,
        }
    }

    /// True when any quantity carries a value.
    pub fn has_any_value(&self) -> bool {
        !(self.limit.is_unset() && self.discharge_limit.is_unset() && self.setpoint.is_unset())
    }

    /// Field-wise equality ignoring the start offset; used for coalescing.
    pub fn same_values(&self, other: &Self) -> bool {
        self.limit == other.limit
            && self.discharge_limit == other.discharge_limit
            && self.setpoint == other.setpoint
            && self.number_phases == other.number_phases
            && self.phase_to_use == other.phase_to_use
    }
}

/// Append `period`, dropping it when it carries the same values as the
/// previous breakpoint.
pub fn push_coalesced(timeline: &mut IntermediateTimeline, period: IntermediatePeriod) {
    match timeline.last() {
        Some(last) if last.same_values(&period) => {}
        _ => timeline.push(period),
    }
}

fn from_entry(entry: &ResolvedPeriod, start_offset: i64) -> IntermediatePeriod {
    let by_unit = |limit: PeriodLimit| match entry.rate_unit {
        RateUnit::Amps => DualQuantity::current(limit),
        RateUnit::Watts => DualQuantity::power(limit),
    };
    IntermediatePeriod {
        start_offset,
        limit: by_unit(entry.limit),
        discharge_limit: by_unit(entry.discharge_limit),
        setpoint: by_unit(entry.setpoint),
        number_phases: entry.number_phases,
        phase_to_use: entry.phase_to_use,
    }
}

/// Resolve overlapping entries of one purpose into a timeline covering
/// exactly `[0, window_end - now)`.
///
/// Entries are scanned highest stack level first (stable, so the earliest
/// inserted wins a tie); at each step the winning entry is the active one
/// that starts earliest without ending before the cursor.
pub fn flatten_periods(
    entries: &[ResolvedPeriod],
    now: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> IntermediateTimeline {
    let now = floor_seconds(now);
    let end = floor_seconds(window_end);

    if entries.is_empty() {
        return vec![IntermediatePeriod::no_limit(0)];
    }

    let mut ordered: Vec<&ResolvedPeriod> = entries.iter().collect();
    ordered.sort_by_key(|entry| std::cmp::Reverse(entry.stack_level));

    let mut combined = IntermediateTimeline::new();
    let mut current = now;

    while current < end {
        // Find the entry to use at `current`: scanning in stack order, keep
        // the earliest-starting active candidate; a candidate already
        // covering `current` wins outright.
        let mut earliest = end;
        let mut next_earliest = end;
        let mut chosen: Option<&ResolvedPeriod> = None;

        for &entry in &ordered {
            if entry.start <= earliest && entry.end > current {
                next_earliest = earliest;
                earliest = entry.start;
                chosen = Some(entry);
                if earliest <= current {
                    break;
                }
            }
        }

        match chosen {
            Some(entry) if earliest <= current => {
                push_coalesced(&mut combined, from_entry(entry, elapsed_seconds(current, now)));
                current = entry.end.min(next_earliest);
            }
            _ => {
                // nothing active: emit a gap until the next entry starts
                push_coalesced(
                    &mut combined,
                    IntermediatePeriod::no_limit(elapsed_seconds(current, now)),
                );
                current = earliest;
            }
        }
    }

    if combined.is_empty() {
        combined.push(IntermediatePeriod::no_limit(0));
    }
    combined
}
