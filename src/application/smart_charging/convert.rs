//! Final conversion into the requested rate unit
//!
//! Folds each intermediate period's current- and power-domain figures into
//! a single output value per quantity, converting across domains with
//! `power = current * voltage * phases`, and coalesces adjacent periods
//! that end up identical.

use crate::domain::charging_profile::RateUnit;
use crate::domain::composite_schedule::CompositePeriod;
use crate::domain::limits::{DualQuantity, PeriodLimit};

use super::flatten::{IntermediatePeriod, IntermediateTimeline};

/// Split a quantity into (directly-stated, to-be-converted) for the
/// requested output unit.
fn domains(quantity: &DualQuantity, rate_unit: RateUnit) -> (Option<PeriodLimit>, Option<PeriodLimit>) {
    match rate_unit {
        RateUnit::Amps => (quantity.current, quantity.power),
        RateUnit::Watts => (quantity.power, quantity.current),
    }
}

#[derive(Clone, Copy)]
enum FoldRule {
    /// Keep the lower figure (limits, positive setpoints).
    Min,
    /// Keep the higher figure (discharge limits: closest to zero wins).
    Max,
    /// Sign of the already-held value decides: positive folds like `Min`,
    /// negative like `Max`.
    Directional,
}

fn fold_value(value: &mut Option<f64>, input: Option<f64>, transform: f64, rule: FoldRule, divide: bool) {
    let Some(input) = input else {
        return;
    };
    let converted = if divide { input / transform } else { input * transform };
    *value = Some(match *value {
        None => converted,
        Some(existing) => match rule {
            FoldRule::Min => existing.min(converted),
            FoldRule::Max => existing.max(converted),
            FoldRule::Directional => {
                if existing < 0.0 {
                    existing.max(converted)
                } else {
                    existing.min(converted)
                }
            }
        },
    });
}

/// Copy the directly-stated triple, then fold in the other domain's triple
/// converted through the supply voltage. The phase factor applies only when
/// the converted triple is not already per-phase.
fn fold_quantity(
    direct: Option<PeriodLimit>,
    other: Option<PeriodLimit>,
    voltage: f64,
    phases: u8,
    rule: FoldRule,
    divide: bool,
) -> (Option<f64>, Option<f64>, Option<f64>) {
    let direct = direct.unwrap_or(PeriodLimit::UNSET);
    let mut l1 = direct.l1;
    let mut l2 = direct.l2;
    let mut l3 = direct.l3;

    if let Some(other) = other {
        let mut transform = voltage;
        if other.l2.is_none() || other.l3.is_none() {
            transform *= f64::from(phases);
        }
        fold_value(&mut l1, other.l1, transform, rule, divide);
        fold_value(&mut l2, other.l2, transform, rule, divide);
        fold_value(&mut l3, other.l3, transform, rule, divide);
    }

    (l1, l2, l3)
}

/// Convert a merged timeline into output periods denominated in
/// `rate_unit`, substituting `default_limit` for stretches no profile
/// constrains.
pub fn convert_timeline(
    timeline: &IntermediateTimeline,
    rate_unit: RateUnit,
    default_limit: f64,
    default_number_phases: u8,
    supply_voltage: f64,
) -> Vec<CompositePeriod> {
    let mut output: Vec<CompositePeriod> = Vec::new();

    for period in timeline {
        let out = convert_period(
            period,
            rate_unit,
            default_limit,
            default_number_phases,
            supply_voltage,
        );
        match output.last() {
            Some(last) if last.same_values(&out) => {}
            _ => output.push(out),
        }
    }

    output
}

fn convert_period(
    period: &IntermediatePeriod,
    rate_unit: RateUnit,
    default_limit: f64,
    default_number_phases: u8,
    supply_voltage: f64,
) -> CompositePeriod {
    let mut out = CompositePeriod::default_limit(period.start_offset, default_limit);
    out.number_phases = period.number_phases;

    let limit_stated = period.limit.current.and_then(|l| l.l1).is_some()
        || period.limit.power.and_then(|l| l.l1).is_some();
    if !limit_stated {
        // nothing constrains this stretch; the default limit stands alone
        return out;
    }

    let phases = period.number_phases.unwrap_or(default_number_phases);
    // Amps are per phase, Watts aggregate: converting W to A divides by
    // voltage (times phases when aggregate), A to W multiplies.
    let divide = rate_unit == RateUnit::Amps;

    let (direct, other) = domains(&period.limit, rate_unit);
    let (l1, l2, l3) = fold_quantity(direct, other, supply_voltage, phases, FoldRule::Min, divide);
    out.limit = l1.unwrap_or(default_limit);
    out.limit_l2 = l2;
    out.limit_l3 = l3;

    let (direct, other) = domains(&period.discharge_limit, rate_unit);
    let (l1, l2, l3) = fold_quantity(direct, other, supply_voltage, phases, FoldRule::Max, divide);
    out.discharge_limit = l1;
    out.discharge_limit_l2 = l2;
    out.discharge_limit_l3 = l3;

    let (direct, other) = domains(&period.setpoint, rate_unit);
    let (l1, l2, l3) =
        fold_quantity(direct, other, supply_voltage, phases, FoldRule::Directional, divide);
    out.setpoint = l1;
    out.setpoint_l2 = l2;
    out.setpoint_l3 = l3;

    out
}
