//! Unit-operation requests placed by the environment.
//!
//! This module turns an agent action into a typed request for the simulator:
//!
//! - **UnitOperation**: equipment kind, instance label, design variable and
//!   scheduled outlet pressure of one placed unit
//! - **UnitOperationFactory**: builds requests from a slot, an ordinal and a
//!   raw continuous parameter
//! - **ParameterRange**: linear scaling of normalized parameters onto a
//!   physical interval
//! - **DesignVariable**: what the continuous parameter of each slot sets
//!
//! ## Example
//!
//! ```
//! use flowsynth::actions::ActionSlot;
//! use flowsynth::models::{instance_label, DesignVariable};
//!
//! assert_eq!(instance_label(ActionSlot::HeatExchanger, 3), "HX3");
//! assert_eq!(DesignVariable::of(ActionSlot::Splitter), DesignVariable::SplitRatio);
//! ```

mod parameters;
mod unit;

pub use parameters::{DesignVariable, ParameterRange};
pub use unit::{instance_label, UnitOperation, UnitOperationFactory};
