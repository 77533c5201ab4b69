//! Deterministic in-memory simulator for tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use crate::actions::ActionSlot;
use crate::models::UnitOperation;
use crate::simulation::{EngineError, InletSpec, SimulationEngine, StreamHandle, StreamProperty};

/// Budget reported by scripted placement and read timeouts.
pub const SCRIPTED_TIMEOUT: Duration = Duration::from_millis(5);

/// Outlet handle that refers to no stream.
pub const DANGLING: StreamHandle = StreamHandle(usize::MAX);

/// Solved state of one stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamState {
    pub temperature: f64,
    pub pressure: f64,
    pub mass_flow: f64,
    pub vapor_fraction: f64,
    pub flows: BTreeMap<String, f64>,
}

impl StreamState {
    pub fn new(temperature: f64, pressure: f64) -> Self {
        StreamState {
            temperature,
            pressure,
            ..Default::default()
        }
    }

    pub fn with_flow(mut self, component: &str, flow: f64) -> Self {
        self.flows.insert(component.to_string(), flow);
        self
    }

    pub fn with_mass_flow(mut self, mass_flow: f64) -> Self {
        self.mass_flow = mass_flow;
        self
    }

    fn from_inlet(spec: &InletSpec) -> Self {
        StreamState {
            temperature: spec.temperature,
            pressure: spec.pressure,
            mass_flow: spec.total_flow(),
            vapor_fraction: 0.0,
            flows: spec.components.clone(),
        }
    }
}

/// Simulator that replays scripted outlet states.
///
/// Each placed unit consumes the next scripted state for its primary outlet;
/// once the script runs out, outlets copy the first inlet. Splitters and
/// columns get a second outlet that copies the primary one.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    streams: Vec<StreamState>,
    script: VecDeque<StreamState>,
    placed: Vec<(UnitOperation, Vec<StreamHandle>)>,
    runs: usize,
    reinitializations: usize,
    converged: bool,
    diverge_on: BTreeSet<usize>,
    time_out_on: BTreeSet<usize>,
    rejected_labels: BTreeSet<String>,
    stalled_labels: BTreeSet<String>,
    dangling_labels: BTreeSet<String>,
    time_out_reads: bool,
    run_delay: Option<Duration>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        ScriptedEngine {
            converged: true,
            ..Default::default()
        }
    }

    /// Queues the primary outlet state of the next placed unit.
    pub fn then_outlet(mut self, state: StreamState) -> Self {
        self.script.push_back(state);
        self
    }

    /// Makes the `n`-th run (1-based) fail to converge.
    pub fn diverge_on_run(mut self, n: usize) -> Self {
        self.diverge_on.insert(n);
        self
    }

    /// Makes the `n`-th run (1-based) report a timeout.
    pub fn time_out_on_run(mut self, n: usize) -> Self {
        self.time_out_on.insert(n);
        self
    }

    /// Refuses to place units with this label.
    pub fn reject_label(mut self, label: &str) -> Self {
        self.rejected_labels.insert(label.to_string());
        self
    }

    /// Reports a timeout while placing units with this label.
    pub fn stall_placing(mut self, label: &str) -> Self {
        self.stalled_labels.insert(label.to_string());
        self
    }

    /// Hands out an outlet that refers to no stream for this label.
    pub fn dangle_outlet_of(mut self, label: &str) -> Self {
        self.dangling_labels.insert(label.to_string());
        self
    }

    /// Reports a timeout on every property read.
    pub fn time_out_reads(mut self) -> Self {
        self.time_out_reads = true;
        self
    }

    /// Sleeps inside every run, ignoring the time budget.
    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    /// Units placed since the last reinitialization, with their inlets.
    pub fn placed(&self) -> &[(UnitOperation, Vec<StreamHandle>)] {
        &self.placed
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn reinitializations(&self) -> usize {
        self.reinitializations
    }

    fn stream(&self, handle: StreamHandle) -> Result<&StreamState, EngineError> {
        self.streams
            .get(handle.0)
            .ok_or(EngineError::UnknownStream(handle))
    }

    fn add_stream(&mut self, state: StreamState) -> StreamHandle {
        self.streams.push(state);
        StreamHandle(self.streams.len() - 1)
    }
}

impl SimulationEngine for ScriptedEngine {
    fn reinitialize(&mut self) -> Result<(), EngineError> {
        self.streams.clear();
        self.placed.clear();
        self.converged = true;
        self.reinitializations += 1;
        Ok(())
    }

    fn create_input_stream(
        &mut self,
        _name: &str,
        spec: &InletSpec,
    ) -> Result<StreamHandle, EngineError> {
        Ok(self.add_stream(StreamState::from_inlet(spec)))
    }

    fn instantiate_unit(
        &mut self,
        unit: &UnitOperation,
        inlets: &[StreamHandle],
    ) -> Result<Vec<StreamHandle>, EngineError> {
        if self.rejected_labels.contains(&unit.label) {
            return Err(EngineError::UnitRejected {
                label: unit.label.clone(),
                reason: "scripted rejection".to_string(),
            });
        }
        if self.stalled_labels.contains(&unit.label) {
            return Err(EngineError::Timeout {
                timeout: SCRIPTED_TIMEOUT,
                elapsed: SCRIPTED_TIMEOUT,
            });
        }
        let first = *inlets
            .first()
            .ok_or_else(|| EngineError::Backend("no inlet".to_string()))?;
        for &inlet in inlets {
            self.stream(inlet)?;
        }

        let primary = match self.script.pop_front() {
            Some(state) => state,
            None => self.stream(first)?.clone(),
        };
        self.placed.push((unit.clone(), inlets.to_vec()));

        if self.dangling_labels.contains(&unit.label) {
            return Ok(vec![DANGLING]);
        }

        let two_outlets = matches!(
            unit.slot,
            ActionSlot::Splitter | ActionSlot::Column | ActionSlot::RecycleColumn
        );
        let mut outlets = vec![self.add_stream(primary.clone())];
        if two_outlets {
            outlets.push(self.add_stream(primary));
        }
        Ok(outlets)
    }

    fn run(&mut self, timeout: Duration) -> Result<(), EngineError> {
        self.runs += 1;
        if let Some(delay) = self.run_delay {
            std::thread::sleep(delay);
        }
        if self.time_out_on.contains(&self.runs) {
            return Err(EngineError::Timeout {
                timeout,
                elapsed: timeout,
            });
        }
        self.converged = !self.diverge_on.contains(&self.runs);
        Ok(())
    }

    fn converged(&self) -> bool {
        self.converged
    }

    fn read_property(
        &self,
        stream: StreamHandle,
        property: &StreamProperty,
    ) -> Result<f64, EngineError> {
        if self.time_out_reads {
            return Err(EngineError::Timeout {
                timeout: SCRIPTED_TIMEOUT,
                elapsed: SCRIPTED_TIMEOUT,
            });
        }
        let state = self.stream(stream)?;
        Ok(match property {
            StreamProperty::Temperature => state.temperature,
            StreamProperty::Pressure => state.pressure,
            StreamProperty::MassFlow => state.mass_flow,
            StreamProperty::VaporFraction => state.vapor_fraction,
            StreamProperty::TotalMolarFlow => state.flows.values().sum(),
            StreamProperty::MolarFlow(component) => {
                state.flows.get(component).copied().unwrap_or(0.0)
            }
        })
    }
}
