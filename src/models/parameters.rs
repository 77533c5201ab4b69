//! Design variables and the scaling of normalized continuous actions.
//!
//! Agents usually emit continuous parameters in `[0, 1]`. A
//! [`ParameterRange`] maps such a value linearly onto a physical interval,
//! clamping at both ends.

use serde::{Deserialize, Serialize};

use crate::actions::ActionSlot;

/// Physical meaning of the continuous parameter of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignVariable {
    /// Outlet temperature
    OutletTemperature,
    /// Outlet pressure
    OutletPressure,
    /// Minimum temperature approach between hot and cold side
    TemperatureApproach,
    /// Fraction of the inlet sent to the primary outlet
    SplitRatio,
    /// Column operating pressure
    ColumnPressure,
    /// Parameter is ignored
    None,
}

impl DesignVariable {
    /// Design variable set by a slot's continuous parameter.
    pub fn of(slot: ActionSlot) -> DesignVariable {
        match slot {
            ActionSlot::Heater | ActionSlot::Cooler => DesignVariable::OutletTemperature,
            ActionSlot::Compressor | ActionSlot::Pump => DesignVariable::OutletPressure,
            ActionSlot::HeatExchanger => DesignVariable::TemperatureApproach,
            ActionSlot::Splitter => DesignVariable::SplitRatio,
            ActionSlot::Column | ActionSlot::RecycleColumn => DesignVariable::ColumnPressure,
            ActionSlot::Mixer | ActionSlot::Finish => DesignVariable::None,
        }
    }
}

/// Closed physical interval for a normalized parameter.
///
/// # Examples
///
/// ```
/// use flowsynth::models::ParameterRange;
///
/// let cooler = ParameterRange::new(5.0, 50.0);
/// assert_eq!(cooler.scale(0.0), 5.0);
/// assert_eq!(cooler.scale(0.5), 27.5);
/// assert_eq!(cooler.scale(1.7), 50.0); // clamped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub low: f64,
    pub high: f64,
}

impl ParameterRange {
    pub fn new(low: f64, high: f64) -> Self {
        ParameterRange { low, high }
    }

    /// Whether the bounds are finite and ordered.
    pub fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low <= self.high
    }

    /// Maps a normalized value onto the range, clamping to `[0, 1]` first.
    pub fn scale(&self, normalized: f64) -> f64 {
        let t = normalized.clamp(0.0, 1.0);
        self.low + t * (self.high - self.low)
    }
}
