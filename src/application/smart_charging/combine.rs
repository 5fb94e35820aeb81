//! Lock-step combination of intermediate timelines
//!
//! Walks N timelines with one cursor each: at every distinct breakpoint a
//! combinator folds the current heads into one period, then only the
//! cursors whose next breakpoint equals the earliest next breakpoint
//! advance. Three combinators cover the merge semantics the composite
//! schedule needs: transaction preference, lowest limit, and summed limits.

use crate::config::ProtocolRevision;
use crate::domain::limits::{DualQuantity, PeriodLimit};

use super::flatten::{push_coalesced, IntermediatePeriod, IntermediateTimeline};

/// Walk the timelines in lock-step and fold their heads at every distinct
/// breakpoint. Empty timelines are treated as absent.
fn combine_timelines<F>(timelines: &[&IntermediateTimeline], combine: F) -> IntermediateTimeline
where
    F: Fn(&[&IntermediatePeriod]) -> IntermediatePeriod,
{
    let active: Vec<&IntermediateTimeline> = timelines
        .iter()
        .copied()
        .filter(|timeline| !timeline.is_empty())
        .collect();
    if active.is_empty() {
        return vec![IntermediatePeriod::no_limit(0)];
    }

    let mut cursors = vec![0usize; active.len()];
    let mut combined = IntermediateTimeline::new();
    let mut current: i64 = 0;

    loop {
        let heads: Vec<&IntermediatePeriod> = active
            .iter()
            .zip(&cursors)
            .map(|(timeline, &cursor)| &timeline[cursor])
            .collect();

        let mut period = combine(&heads);
        period.start_offset = current;
        push_coalesced(&mut combined, period);

        // earliest next breakpoint strictly after `current`
        let mut next = i64::MAX;
        for (timeline, &cursor) in active.iter().zip(&cursors) {
            if let Some(peek) = timeline.get(cursor + 1) {
                if peek.start_offset > current && peek.start_offset < next {
                    next = peek.start_offset;
                }
            }
        }
        if next == i64::MAX {
            break;
        }

        // advance only the cursors sitting exactly on that breakpoint
        for (timeline, cursor) in active.iter().zip(cursors.iter_mut()) {
            if timeline
                .get(*cursor + 1)
                .is_some_and(|peek| peek.start_offset == next)
            {
                *cursor += 1;
            }
        }
        current = next;
    }

    if combined.is_empty() {
        combined.push(IntermediatePeriod::no_limit(0));
    }
    combined
}

/// Prefer the transaction timeline wherever it specifies anything at all,
/// falling back to the transaction-default timeline otherwise.
pub fn merge_tx_with_tx_default(
    tx: &IntermediateTimeline,
    tx_default: &IntermediateTimeline,
) -> IntermediateTimeline {
    combine_timelines(&[tx, tx_default], |heads| {
        heads
            .iter()
            .find(|head| head.has_any_value())
            .map(|head| IntermediatePeriod {
                start_offset: 0,
                limit: head.limit,
                discharge_limit: head.discharge_limit,
                setpoint: head.setpoint,
                number_phases: head.number_phases,
                phase_to_use: None,
            })
            .unwrap_or_else(|| IntermediatePeriod::no_limit(0))
    })
}

/// Merge limiting purposes: per phase and per rate domain the lowest limit
/// wins, discharge limits keep the least permissive (highest) value, and
/// setpoints are folded sign-aware and capped by the resolved limits.
pub fn merge_by_lowest_limit(
    timelines: &[IntermediateTimeline],
    revision: ProtocolRevision,
) -> IntermediateTimeline {
    let refs: Vec<&IntermediateTimeline> = timelines.iter().collect();
    combine_timelines(&refs, |heads| lowest_limit_period(heads, revision))
}

fn lowest_limit_period(
    heads: &[&IntermediatePeriod],
    revision: ProtocolRevision,
) -> IntermediatePeriod {
    let mut number_phases: Option<u8> = None;
    let mut three_phase = false;
    for head in heads {
        number_phases = min_opt_phases(number_phases, head.number_phases);
        if revision == ProtocolRevision::V21 && uses_three_phase_values(head) {
            three_phase = true;
        }
    }

    let mut limit = DualQuantity::UNSET;
    let mut discharge_limit = DualQuantity::UNSET;
    let mut setpoint = DualQuantity::UNSET;

    for head in heads {
        let mut head_limit = head.limit;
        let mut head_discharge = head.discharge_limit;
        let mut head_setpoint = head.setpoint;
        if three_phase {
            align_phase_values(&mut head_limit, number_phases);
            align_phase_values(&mut head_discharge, number_phases);
            align_phase_values(&mut head_setpoint, number_phases);
        }

        limit.current = min_limit(limit.current, head_limit.current, None);
        limit.power = min_limit(limit.power, head_limit.power, None);
        discharge_limit.current =
            max_limit(discharge_limit.current, head_discharge.current, None);
        discharge_limit.power = max_limit(discharge_limit.power, head_discharge.power, None);

        merge_setpoint(
            &mut setpoint.current,
            head_setpoint.current,
            limit.current,
            discharge_limit.current,
        );
        merge_setpoint(
            &mut setpoint.power,
            head_setpoint.power,
            limit.power,
            discharge_limit.power,
        );
    }

    IntermediatePeriod {
        start_offset: 0,
        limit,
        discharge_limit,
        setpoint,
        number_phases,
        phase_to_use: None,
    }
}

/// Aggregate independent consumers sharing one capacity: limits are summed
/// per phase and per rate domain, with the caller's defaults substituted
/// for unset entries. Setpoints are meaningless for a sum and stay unset.
pub fn merge_by_summing_limits(
    timelines: &[IntermediateTimeline],
    current_default: f64,
    power_default: f64,
    revision: ProtocolRevision,
) -> IntermediateTimeline {
    let refs: Vec<&IntermediateTimeline> = timelines.iter().collect();
    combine_timelines(&refs, |heads| {
        summing_period(heads, current_default, power_default, revision)
    })
}

fn summing_period(
    heads: &[&IntermediatePeriod],
    current_default: f64,
    power_default: f64,
    revision: ProtocolRevision,
) -> IntermediatePeriod {
    let mut number_phases: Option<u8> = None;
    let mut three_phase = false;
    for head in heads {
        number_phases = max_opt_phases(number_phases, head.number_phases);
        if revision == ProtocolRevision::V21 && uses_three_phase_values(head) {
            three_phase = true;
        }
    }

    let mut current = PeriodLimit::single(0.0);
    let mut power = PeriodLimit::single(0.0);
    if three_phase {
        current.l2 = Some(0.0);
        current.l3 = Some(0.0);
        power.l2 = Some(0.0);
        power.l3 = Some(0.0);
    }

    for head in heads {
        let mut head_limit = head.limit;
        if three_phase {
            align_phase_values(&mut head_limit, number_phases);
        }
        let head_current = head_limit.current.unwrap_or(PeriodLimit::UNSET);
        let head_power = head_limit.power.unwrap_or(PeriodLimit::UNSET);

        add_phase(&mut current.l1, head_current.l1, current_default);
        add_phase(&mut power.l1, head_power.l1, power_default);
        if three_phase {
            add_phase(&mut current.l2, head_current.l2, current_default);
            add_phase(&mut current.l3, head_current.l3, current_default);
            add_phase(&mut power.l2, head_power.l2, power_default);
            add_phase(&mut power.l3, head_power.l3, power_default);
        }
    }

    IntermediatePeriod {
        start_offset: 0,
        limit: DualQuantity {
            current: Some(current),
            power: Some(power),
        },
        discharge_limit: DualQuantity::UNSET,
        setpoint: DualQuantity::UNSET,
        number_phases,
        phase_to_use: None,
    }
}

fn add_phase(acc: &mut Option<f64>, value: Option<f64>, default: f64) {
    if let Some(acc) = acc.as_mut() {
        *acc += value.unwrap_or(default);
    }
}

fn min_opt_phases(a: Option<u8>, b: Option<u8>) -> Option<u8> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_opt_phases(a: Option<u8>, b: Option<u8>) -> Option<u8> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// True when any quantity of the period carries a second- or third-phase
/// value.
fn uses_three_phase_values(period: &IntermediatePeriod) -> bool {
    [period.limit, period.discharge_limit, period.setpoint]
        .iter()
        .any(|quantity| {
            quantity.current.is_some_and(|l| l.uses_extra_phases())
                || quantity.power.is_some_and(|l| l.uses_extra_phases())
        })
}

/// Align a quantity's phase values so single-phase and per-phase inputs
/// compare like for like: current values replicate onto L2/L3, power values
/// are split evenly across phases. With a single phase, extra phase values
/// collapse into the lowest single figure.
fn align_phase_values(quantity: &mut DualQuantity, number_phases: Option<u8>) {
    match number_phases {
        Some(1) => {
            if let Some(limit) = quantity.current.as_mut() {
                collapse_to_single(limit);
            }
            if let Some(limit) = quantity.power.as_mut() {
                collapse_to_single(limit);
            }
        }
        Some(phases) if phases >= 2 => {
            if let Some(limit) = quantity.current.as_mut() {
                if limit.l1.is_some() && (limit.l2.is_none() || limit.l3.is_none()) {
                    limit.l2 = limit.l1;
                    limit.l3 = limit.l1;
                }
            }
            if let Some(limit) = quantity.power.as_mut() {
                if limit.l1.is_some() && (limit.l2.is_none() || limit.l3.is_none()) {
                    let per_phase = limit.l1.map(|v| v / f64::from(phases));
                    limit.l1 = per_phase;
                    limit.l2 = per_phase;
                    limit.l3 = per_phase;
                }
            }
        }
        _ => {}
    }
}

fn collapse_to_single(limit: &mut PeriodLimit) {
    if let Some(l1) = limit.l1 {
        let mut lowest = l1;
        if let Some(l2) = limit.l2 {
            lowest = lowest.min(l2);
        }
        if let Some(l3) = limit.l3 {
            lowest = lowest.min(l3);
        }
        limit.l1 = Some(lowest);
        limit.l2 = None;
        limit.l3 = None;
    }
}

fn min_phase(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_phase(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn capped(value: Option<f64>, cap: Option<f64>, lower_wins: bool) -> Option<f64> {
    match (value, cap) {
        (Some(value), Some(cap)) => Some(if lower_wins {
            value.min(cap)
        } else {
            value.max(cap)
        }),
        (value, _) => value,
    }
}

/// Per-phase minimum of two optional triples; an unset side never wins over
/// a real value. `cap` bounds the result from above where it is set.
fn min_limit(
    a: Option<PeriodLimit>,
    b: Option<PeriodLimit>,
    cap: Option<PeriodLimit>,
) -> Option<PeriodLimit> {
    if a.is_none() && b.is_none() {
        return None;
    }
    let a = a.unwrap_or(PeriodLimit::UNSET);
    let b = b.unwrap_or(PeriodLimit::UNSET);
    let cap = cap.unwrap_or(PeriodLimit::UNSET);
    let merged = PeriodLimit {
        l1: capped(min_phase(a.l1, b.l1), cap.l1, true),
        l2: capped(min_phase(a.l2, b.l2), cap.l2, true),
        l3: capped(min_phase(a.l3, b.l3), cap.l3, true),
    };
    (!merged.is_unset()).then_some(merged)
}

/// Per-phase maximum; used for discharge limits (negative or zero), where
/// the value closest to zero is the least permissive. `cap` bounds the
/// result from below where it is set.
fn max_limit(
    a: Option<PeriodLimit>,
    b: Option<PeriodLimit>,
    cap: Option<PeriodLimit>,
) -> Option<PeriodLimit> {
    if a.is_none() && b.is_none() {
        return None;
    }
    let a = a.unwrap_or(PeriodLimit::UNSET);
    let b = b.unwrap_or(PeriodLimit::UNSET);
    let cap = cap.unwrap_or(PeriodLimit::UNSET);
    let merged = PeriodLimit {
        l1: capped(max_phase(a.l1, b.l1), cap.l1, false),
        l2: capped(max_phase(a.l2, b.l2), cap.l2, false),
        l3: capped(max_phase(a.l3, b.l3), cap.l3, false),
    };
    (!merged.is_unset()).then_some(merged)
}

/// Sign-aware setpoint fold. The direction comes from the first phase: a
/// positive (charging) setpoint takes the minimum of the inputs capped by
/// the resolved limit, a negative (discharging) one takes the maximum
/// capped by the resolved discharge limit.
fn merge_setpoint(
    acc: &mut Option<PeriodLimit>,
    head: Option<PeriodLimit>,
    cap_limit: Option<PeriodLimit>,
    cap_discharge: Option<PeriodLimit>,
) {
    let acc_l1 = acc.and_then(|p| p.l1);
    let head_l1 = head.and_then(|p| p.l1);
    if acc_l1.is_none() && head_l1.is_none() {
        return;
    }

    let resolved_l1 = match (acc_l1, head_l1) {
        (Some(a), Some(h)) => Some(if a < 0.0 { a.max(h) } else { a.min(h) }),
        (None, Some(h)) => Some(h),
        (a, None) => a,
    };

    let mut base = acc.unwrap_or(PeriodLimit::UNSET);
    base.l1 = resolved_l1;

    *acc = if resolved_l1.is_some_and(|v| v < 0.0) {
        max_limit(Some(base), head, cap_discharge)
    } else {
        min_limit(Some(base), head, cap_limit)
    };
}
