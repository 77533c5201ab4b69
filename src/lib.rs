//! # Flowsynth: Stepwise Chemical Flowsheet Synthesis
//!
//! The decision layer of a flowsheet synthesis environment. An agent builds
//! a chemical process one unit operation at a time; this crate decides which
//! equipment may be placed next, places it through an external simulator,
//! and keeps the record of what was built.
//!
//! - [`registry`]: the equipment kinds and their short codes
//! - [`codec`]: flowsheets to and from compact strings such as `HHxCDcEnd`
//! - [`stage`]: the process stage classifier
//! - [`masking`]: stage-aware action masks
//! - [`models`]: typed unit-operation requests
//! - [`simulation`]: the seam to the process simulator
//! - [`orchestrator`]: the episode loop tying the above together
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use flowsynth::{
//!     ActionSlot, DesignVariable, EngineError, EnvConfig, EquipmentRegistry, FlowsheetEnv,
//!     InletSpec, ProcessStage, SimulationEngine, StreamHandle, StreamProperty, UnitOperation,
//! };
//!
//! /// Backend that passes streams through, applying outlet conditions.
//! #[derive(Default)]
//! struct PassThrough {
//!     streams: Vec<InletSpec>,
//! }
//!
//! impl SimulationEngine for PassThrough {
//!     fn reinitialize(&mut self) -> Result<(), EngineError> {
//!         self.streams.clear();
//!         Ok(())
//!     }
//!
//!     fn create_input_stream(
//!         &mut self,
//!         _name: &str,
//!         spec: &InletSpec,
//!     ) -> Result<StreamHandle, EngineError> {
//!         self.streams.push(spec.clone());
//!         Ok(StreamHandle(self.streams.len() - 1))
//!     }
//!
//!     fn instantiate_unit(
//!         &mut self,
//!         unit: &UnitOperation,
//!         inlets: &[StreamHandle],
//!     ) -> Result<Vec<StreamHandle>, EngineError> {
//!         let mut outlet = self.streams[inlets[0].0].clone();
//!         if unit.design_variable == DesignVariable::OutletTemperature {
//!             outlet.temperature = unit.parameter;
//!         }
//!         if let Some(pressure) = unit.pressure {
//!             outlet.pressure = pressure;
//!         }
//!         self.streams.push(outlet);
//!         Ok(vec![StreamHandle(self.streams.len() - 1)])
//!     }
//!
//!     fn run(&mut self, _timeout: Duration) -> Result<(), EngineError> {
//!         Ok(())
//!     }
//!
//!     fn converged(&self) -> bool {
//!         true
//!     }
//!
//!     fn read_property(
//!         &self,
//!         stream: StreamHandle,
//!         property: &StreamProperty,
//!     ) -> Result<f64, EngineError> {
//!         let s = self
//!             .streams
//!             .get(stream.0)
//!             .ok_or(EngineError::UnknownStream(stream))?;
//!         Ok(match property {
//!             StreamProperty::Temperature => s.temperature,
//!             StreamProperty::Pressure => s.pressure,
//!             StreamProperty::MolarFlow(name) => s.component_flow(name),
//!             StreamProperty::TotalMolarFlow | StreamProperty::MassFlow => s.total_flow(),
//!             StreamProperty::VaporFraction => 0.0,
//!         })
//!     }
//! }
//!
//! let registry = Arc::new(EquipmentRegistry::standard());
//! let config = EnvConfig::new(10).with_pressure_schedule(vec![5.0]);
//! let mut env = FlowsheetEnv::new(PassThrough::default(), registry, config)?;
//!
//! let (_, feeds) = env.reset(&[InletSpec::new(25.0, 1.0).with_component("METHANOL", 100.0)])?;
//! assert!(env.action_mask()[ActionSlot::Pump]);
//!
//! // A hot, pressurized stream that has not reacted yet enters the reaction stage
//! let outcome = env.step(ActionSlot::Heater, 250.0, feeds[0])?;
//! assert_eq!(outcome.info.label, "H1");
//! assert_eq!(env.stage(), ProcessStage::Reaction);
//! assert!(!env.action_mask()[ActionSlot::Pump]);
//! assert_eq!(env.flowsheet_string()?, "H");
//! # Ok::<(), flowsynth::FlowsheetError>(())
//! ```
//!
//! Masked-off actions are refused before anything is placed:
//!
//! ```
//! use flowsynth::masking::{action_mask, HistoryFlags};
//! use flowsynth::{ActionSlot, ProcessStage};
//!
//! let mask = action_mask(ProcessStage::Cooling, 30.0, &HistoryFlags::new());
//! assert_eq!(mask.enabled().collect::<Vec<_>>(), vec![ActionSlot::Cooler]);
//! ```
//!
//! ## Logging
//!
//! Episode events are emitted through `tracing`: resets at `info`, every
//! placed unit and stage transition at `debug`, simulator failures at
//! `warn`. Install any subscriber to see them; the `flowsheet` binary reads
//! its filter from `RUST_LOG`.

pub mod actions;
pub mod codec;
pub mod config;
pub mod masking;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod simulation;
pub mod stage;

#[cfg(test)]
mod testing;

pub use actions::{ActionAlphabet, ActionMask, ActionSlot, ACTION_COUNT};
pub use codec::{simplify, CodecError, FlowsheetCodec};
pub use config::{ConfigError, EnvConfig};
pub use masking::{action_mask, HistoryFlags};
pub use models::{DesignVariable, ParameterRange, UnitOperation, UnitOperationFactory};
pub use orchestrator::{
    EpisodeSnapshot, EpisodeStatus, EquipmentCounters, FlowsheetEntry, FlowsheetEnv,
    FlowsheetError, StepInfo, StepOutcome,
};
pub use registry::{EquipmentKind, EquipmentRegistry, EquipmentSpec, RegistryError, Role};
pub use simulation::{
    BoundedEngine, EngineError, InletSpec, RunStatus, SimulationEngine, StreamHandle,
    StreamProperty,
};
pub use stage::{classify, Observables, ProcessStage};
