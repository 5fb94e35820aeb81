//! Rate limits and per-phase quantities
//!
//! The engine works on per-phase triples of floating-point rate values.
//! A value that was never specified is `None`; there is no "magic number
//! means unset" anywhere in this crate. The historical default figures the
//! protocol prescribes are kept as named constants below.

/// Fallback limit substituted for an Amp-denominated period that carries no
/// explicit limit in plain charging mode.
pub const DEFAULT_LIMIT_AMPS: f64 = 48.0;

/// Fallback limit substituted for a Watt-denominated period that carries no
/// explicit limit in plain charging mode.
pub const DEFAULT_LIMIT_WATTS: f64 = 33_120.0;

/// Phase count assumed when neither the period nor the caller states one.
pub const DEFAULT_AND_MAX_NUMBER_PHASES: u8 = 3;

/// Nominal line-to-neutral supply voltage used for current/power conversion
/// when the station does not report a measured value.
pub const LOW_VOLTAGE: f64 = 230.0;

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;

/// Tolerance for comparing rate values.
pub const RATE_EPSILON: f64 = 1e-4;

/// Approximate float equality. NaN compares unequal to everything,
/// including itself.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < RATE_EPSILON
}

/// Approximate equality over optional rate values; `None` only equals `None`.
pub fn opt_approx_eq(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => approx_eq(a, b),
        _ => false,
    }
}

/// A per-phase triple of one quantity: a limit, a discharge limit or a
/// setpoint, depending on where it is carried.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodLimit {
    pub l1: Option<f64>,
    pub l2: Option<f64>,
    pub l3: Option<f64>,
}

impl PeriodLimit {
    pub const UNSET: PeriodLimit = PeriodLimit {
        l1: None,
        l2: None,
        l3: None,
    };

    /// A single-phase value on L1.
    pub fn single(l1: f64) -> Self {
        PeriodLimit {
            l1: Some(l1),
            l2: None,
            l3: None,
        }
    }

    pub fn is_unset(&self) -> bool {
        self.l1.is_none() && self.l2.is_none() && self.l3.is_none()
    }

    /// True when a second- or third-phase value is present.
    pub fn uses_extra_phases(&self) -> bool {
        self.l2.is_some() || self.l3.is_some()
    }
}

impl PartialEq for PeriodLimit {
    fn eq(&self, other: &Self) -> bool {
        opt_approx_eq(self.l1, other.l1)
            && opt_approx_eq(self.l2, other.l2)
            && opt_approx_eq(self.l3, other.l3)
    }
}

/// One quantity carried in whichever rate domain(s) its sources used.
///
/// Flattening a single purpose fills at most one side (the profile's rate
/// unit). Merging timelines with mixed rate units can legitimately fill
/// both; the converter folds the two sides into the requested output unit
/// at the very end.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DualQuantity {
    pub current: Option<PeriodLimit>,
    pub power: Option<PeriodLimit>,
}

impl DualQuantity {
    pub const UNSET: DualQuantity = DualQuantity {
        current: None,
        power: None,
    };

    /// A current-domain value. Fully-unset triples normalize to `UNSET` so
    /// there is exactly one representation of "nothing specified".
    pub fn current(limit: PeriodLimit) -> Self {
        DualQuantity {
            current: (!limit.is_unset()).then_some(limit),
            power: None,
        }
    }

    /// A power-domain value, normalized like [`DualQuantity::current`].
    pub fn power(limit: PeriodLimit) -> Self {
        DualQuantity {
            current: None,
            power: (!limit.is_unset()).then_some(limit),
        }
    }

    pub fn is_unset(&self) -> bool {
        self.current.is_none() && self.power.is_none()
    }
}
