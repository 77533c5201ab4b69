//! Unit-operation requests handed to the simulator.
//!
//! # Example
//!
//! ```
//! use flowsynth::actions::{ActionAlphabet, ActionSlot};
//! use flowsynth::models::{UnitOperationFactory, ParameterRange};
//! use flowsynth::registry::EquipmentRegistry;
//! use std::collections::BTreeMap;
//!
//! let registry = EquipmentRegistry::standard();
//! let alphabet = ActionAlphabet::resolve(&registry).unwrap();
//! let ranges = BTreeMap::from([(ActionSlot::Cooler, ParameterRange::new(5.0, 50.0))]);
//! let schedule = [1.0, 30.0, 30.0];
//!
//! let factory = UnitOperationFactory::new(&alphabet, &ranges, &schedule);
//! let cooler = factory.build(ActionSlot::Cooler, 1, 1, 0.5);
//!
//! assert_eq!(cooler.label, "C1");
//! assert_eq!(cooler.parameter, 27.5);
//! assert_eq!(cooler.pressure, Some(30.0));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::parameters::{DesignVariable, ParameterRange};
use crate::actions::{ActionAlphabet, ActionSlot};
use crate::registry::EquipmentKind;

/// A fully specified unit operation, ready to be placed by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOperation {
    /// Equipment kind from the registry
    pub kind: EquipmentKind,
    /// Action slot that produced this unit
    pub slot: ActionSlot,
    /// Instance label, e.g. `HX2`
    pub label: String,
    /// 1-based instance count of this slot within the episode
    pub ordinal: usize,
    /// Design variable value in physical units
    pub parameter: f64,
    /// What `parameter` sets
    pub design_variable: DesignVariable,
    /// Outlet pressure from the pressure schedule (heaters and coolers)
    pub pressure: Option<f64>,
}

impl UnitOperation {
    /// Creates a unit request with no scheduled pressure.
    pub fn new(kind: EquipmentKind, slot: ActionSlot, ordinal: usize, parameter: f64) -> Self {
        UnitOperation {
            kind,
            slot,
            label: instance_label(slot, ordinal),
            ordinal,
            parameter,
            design_variable: DesignVariable::of(slot),
            pressure: None,
        }
    }

    /// Sets the outlet pressure.
    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = Some(pressure);
        self
    }

    /// Heat exchangers are placed in hot/cold pairs; the second of a pair
    /// closes the loop.
    pub fn closes_exchanger_pair(&self) -> bool {
        self.slot == ActionSlot::HeatExchanger && self.ordinal % 2 == 0
    }
}

/// Label `{PREFIX}{count}` of the `ordinal`-th instance of `slot`.
pub fn instance_label(slot: ActionSlot, ordinal: usize) -> String {
    format!("{}{}", slot.label_prefix(), ordinal)
}

/// Builds [`UnitOperation`]s from agent actions.
///
/// Holds the slot bindings, the optional parameter ranges and the pressure
/// schedule; borrows them from the environment for the duration of a step.
#[derive(Debug, Clone, Copy)]
pub struct UnitOperationFactory<'a> {
    alphabet: &'a ActionAlphabet,
    ranges: &'a BTreeMap<ActionSlot, ParameterRange>,
    pressure_schedule: &'a [f64],
}

impl<'a> UnitOperationFactory<'a> {
    pub fn new(
        alphabet: &'a ActionAlphabet,
        ranges: &'a BTreeMap<ActionSlot, ParameterRange>,
        pressure_schedule: &'a [f64],
    ) -> Self {
        UnitOperationFactory { alphabet, ranges, pressure_schedule }
    }

    /// Physical value of a raw continuous parameter for `slot`.
    pub fn physical_parameter(&self, slot: ActionSlot, raw: f64) -> f64 {
        match self.ranges.get(&slot) {
            Some(range) => range.scale(raw),
            None => raw,
        }
    }

    /// Builds the request for the `ordinal`-th instance of `slot`, placed at
    /// episode step `iteration`.
    pub fn build(
        &self,
        slot: ActionSlot,
        ordinal: usize,
        iteration: usize,
        raw: f64,
    ) -> UnitOperation {
        let unit = UnitOperation::new(
            self.alphabet.kind(slot),
            slot,
            ordinal,
            self.physical_parameter(slot, raw),
        );

        match (slot, self.pressure_schedule.get(iteration)) {
            (ActionSlot::Heater | ActionSlot::Cooler, Some(&pressure)) => {
                unit.with_pressure(pressure)
            }
            _ => unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EquipmentRegistry;

    fn alphabet() -> ActionAlphabet {
        ActionAlphabet::resolve(&EquipmentRegistry::standard()).unwrap()
    }

    #[test]
    fn test_labels() {
        assert_eq!(instance_label(ActionSlot::HeatExchanger, 2), "HX2");
        assert_eq!(instance_label(ActionSlot::Heater, 1), "H1");
        assert_eq!(instance_label(ActionSlot::RecycleColumn, 1), "DCR1");
    }

    #[test]
    fn test_raw_parameter_passes_through_without_range() {
        let alphabet = alphabet();
        let ranges = BTreeMap::new();
        let factory = UnitOperationFactory::new(&alphabet, &ranges, &[]);

        let unit = factory.build(ActionSlot::Compressor, 1, 0, 12.5);
        assert_eq!(unit.parameter, 12.5);
        assert_eq!(unit.pressure, None);
        assert_eq!(unit.design_variable, DesignVariable::OutletPressure);
    }

    #[test]
    fn test_schedule_applies_to_heaters_and_coolers_only() {
        let alphabet = alphabet();
        let ranges = BTreeMap::new();
        let schedule = [1.0, 2.0, 3.0];
        let factory = UnitOperationFactory::new(&alphabet, &ranges, &schedule);

        assert_eq!(factory.build(ActionSlot::Heater, 1, 2, 250.0).pressure, Some(3.0));
        assert_eq!(factory.build(ActionSlot::Pump, 1, 2, 5.0).pressure, None);
        // Past the end of the schedule the simulator keeps the inlet pressure
        assert_eq!(factory.build(ActionSlot::Cooler, 1, 3, 30.0).pressure, None);
    }

    #[test]
    fn test_exchanger_pairs() {
        let registry = EquipmentRegistry::standard();
        let hx = registry.kind_of_code("Hx").unwrap();
        let first = UnitOperation::new(hx, ActionSlot::HeatExchanger, 1, 10.0);
        let second = UnitOperation::new(hx, ActionSlot::HeatExchanger, 2, 10.0);
        assert!(!first.closes_exchanger_pair());
        assert!(second.closes_exchanger_pair());
    }
}
