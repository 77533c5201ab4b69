//! Seam to the external process simulator.
//!
//! The simulator owns all streams and unit operations and solves the mass
//! and energy balances. This crate only sees opaque [`StreamHandle`]s and the
//! numbers the simulator reports for them. Implement [`SimulationEngine`] to
//! connect a concrete backend.
//!
//! A simulator run may block for an unbounded time while the numerics
//! converge. [`BoundedEngine::run`] is the single place where a run is
//! started: the solve happens on a worker thread and the caller stops
//! waiting once the time budget is spent, whether or not the backend
//! honors it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::UnitOperation;

/// Errors reported by a simulation backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Run exceeded its time budget
    #[error("Simulation run exceeded {timeout:?} (elapsed {elapsed:?})")]
    Timeout {
        timeout: Duration,
        elapsed: Duration,
    },
    /// An abandoned run still holds the engine
    #[error("Simulation engine is still busy with an abandoned run")]
    Busy,
    /// The worker thread died and took the engine with it
    #[error("Simulation engine was lost by its worker thread")]
    WorkerLost,
    /// Handle does not refer to a live stream
    #[error("Unknown stream {0}")]
    UnknownStream(StreamHandle),
    /// Backend cannot report the requested property
    #[error("Property {0} not available")]
    PropertyNotAvailable(StreamProperty),
    /// Backend refused to place the unit operation
    #[error("Unit operation {label} rejected: {reason}")]
    UnitRejected { label: String, reason: String },
    /// Any other backend failure
    #[error("Simulation backend error: {0}")]
    Backend(String),
}

/// Opaque reference to a stream owned by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamHandle(pub usize);

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Stream properties a backend must be able to report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamProperty {
    Temperature,
    Pressure,
    /// Molar flow of one component
    MolarFlow(String),
    TotalMolarFlow,
    VaporFraction,
    MassFlow,
}

impl fmt::Display for StreamProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamProperty::Temperature => f.write_str("temperature"),
            StreamProperty::Pressure => f.write_str("pressure"),
            StreamProperty::MolarFlow(component) => write!(f, "molar flow of {}", component),
            StreamProperty::TotalMolarFlow => f.write_str("total molar flow"),
            StreamProperty::VaporFraction => f.write_str("vapor fraction"),
            StreamProperty::MassFlow => f.write_str("mass flow"),
        }
    }
}

/// Feed specification for one inlet stream.
///
/// # Examples
///
/// ```
/// use flowsynth::simulation::InletSpec;
///
/// let feed = InletSpec::new(25.0, 1.0)
///     .with_component("METHANOL", 100.0)
///     .with_component("WATER", 5.0);
///
/// assert_eq!(feed.component_flow("METHANOL"), 100.0);
/// assert_eq!(feed.component_flow("DME"), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InletSpec {
    pub temperature: f64,
    pub pressure: f64,
    /// Component name to flow
    pub components: BTreeMap<String, f64>,
}

impl InletSpec {
    /// Creates a feed at the given conditions with no components.
    pub fn new(temperature: f64, pressure: f64) -> Self {
        InletSpec {
            temperature,
            pressure,
            components: BTreeMap::new(),
        }
    }

    /// Adds a component flow.
    pub fn with_component(mut self, name: &str, flow: f64) -> Self {
        self.components.insert(name.to_string(), flow);
        self
    }

    /// Flow of a component, zero if absent.
    pub fn component_flow(&self, name: &str) -> f64 {
        self.components.get(name).copied().unwrap_or(0.0)
    }

    /// Sum of all component flows.
    pub fn total_flow(&self) -> f64 {
        self.components.values().sum()
    }
}

/// Interface to the external process simulator.
///
/// Calls are issued one at a time. [`SimulationEngine::run`] may block while
/// the flowsheet is solved; [`BoundedEngine`] moves it to a worker thread,
/// which is why engines must be `Send`.
pub trait SimulationEngine {
    /// Removes every stream and unit operation.
    fn reinitialize(&mut self) -> Result<(), EngineError>;

    /// Places a feed stream.
    fn create_input_stream(
        &mut self,
        name: &str,
        spec: &InletSpec,
    ) -> Result<StreamHandle, EngineError>;

    /// Places a unit operation fed by `inlets` and returns its outlets,
    /// primary outlet first.
    fn instantiate_unit(
        &mut self,
        unit: &UnitOperation,
        inlets: &[StreamHandle],
    ) -> Result<Vec<StreamHandle>, EngineError>;

    /// Solves the flowsheet, giving up after `timeout`.
    fn run(&mut self, timeout: Duration) -> Result<(), EngineError>;

    /// Whether the last run converged.
    fn converged(&self) -> bool;

    /// Reads one property of a solved stream.
    fn read_property(
        &self,
        stream: StreamHandle,
        property: &StreamProperty,
    ) -> Result<f64, EngineError>;
}

/// Outcome of a bounded simulator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Converged,
    Diverged,
}

/// Engine handed back by the worker thread, with the result of its run.
type RunReturn<E> = (E, Result<(), EngineError>);

/// Owns a [`SimulationEngine`] and runs each solve on a worker thread.
///
/// A run that outlives its budget is abandoned: the caller gets
/// [`EngineError::Timeout`] at once and the engine stays with the worker
/// until the solve returns. Until then every access reports
/// [`EngineError::Busy`]; the engine is taken back on the next access after
/// the worker finishes.
pub struct BoundedEngine<E> {
    engine: Option<E>,
    in_flight: Option<Receiver<RunReturn<E>>>,
}

impl<E: SimulationEngine> BoundedEngine<E> {
    pub fn new(engine: E) -> Self {
        BoundedEngine {
            engine: Some(engine),
            in_flight: None,
        }
    }

    /// Shared access, without waiting for an abandoned run.
    pub fn get(&self) -> Result<&E, EngineError> {
        self.engine.as_ref().ok_or_else(|| self.unavailable())
    }

    /// Exclusive access, taking the engine back from a finished worker.
    pub fn get_mut(&mut self) -> Result<&mut E, EngineError> {
        self.reclaim();
        if self.engine.is_none() {
            return Err(self.unavailable());
        }
        self.engine.as_mut().ok_or(EngineError::Busy)
    }

    /// Whether an abandoned run still holds the engine.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn unavailable(&self) -> EngineError {
        if self.in_flight.is_some() {
            EngineError::Busy
        } else {
            EngineError::WorkerLost
        }
    }

    fn reclaim(&mut self) {
        let Some(receiver) = &self.in_flight else {
            return;
        };
        match receiver.try_recv() {
            Ok((engine, _)) => {
                self.engine = Some(engine);
                self.in_flight = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.in_flight = None,
        }
    }
}

impl<E: SimulationEngine + Send + 'static> BoundedEngine<E> {
    /// Solves the flowsheet, waiting at most `timeout` for the worker.
    ///
    /// Backend errors are passed through; a backend that reports its own
    /// [`EngineError::Timeout`] keeps the engine available.
    pub fn run(&mut self, timeout: Duration) -> Result<RunStatus, EngineError> {
        self.reclaim();
        let mut engine = self.engine.take().ok_or_else(|| self.unavailable())?;
        let (sender, receiver) = mpsc::channel();
        let started = Instant::now();

        thread::Builder::new()
            .name("flowsheet-engine".to_string())
            .spawn(move || {
                let result = engine.run(timeout);
                // Nobody listens once the run was abandoned and the owner dropped
                let _ = sender.send((engine, result));
            })
            .map_err(|e| EngineError::Backend(format!("cannot start engine worker: {e}")))?;

        match receiver.recv_timeout(timeout) {
            Ok((engine, result)) => {
                let converged = engine.converged();
                self.engine = Some(engine);
                result?;
                Ok(if converged {
                    RunStatus::Converged
                } else {
                    RunStatus::Diverged
                })
            }
            Err(RecvTimeoutError::Timeout) => {
                self.in_flight = Some(receiver);
                Err(EngineError::Timeout {
                    timeout,
                    elapsed: started.elapsed(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::WorkerLost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedEngine;

    #[test]
    fn test_inlet_spec_flows() {
        let feed = InletSpec::new(25.0, 1.0)
            .with_component("CO2", 10.0)
            .with_component("H2", 30.0);
        assert_eq!(feed.total_flow(), 40.0);
        assert_eq!(feed.component_flow("H2"), 30.0);
    }

    #[test]
    fn test_inlet_spec_from_json() {
        let feed: InletSpec = serde_json::from_str(
            r#"{"temperature": 25.0, "pressure": 1.0, "components": {"METHANOL": 100.0}}"#,
        )
        .unwrap();
        assert_eq!(feed.component_flow("METHANOL"), 100.0);
    }

    #[test]
    fn test_run_converged() {
        let mut engine = BoundedEngine::new(ScriptedEngine::new());
        assert_eq!(engine.run(Duration::from_secs(5)), Ok(RunStatus::Converged));
        assert_eq!(engine.get().unwrap().runs(), 1);
    }

    #[test]
    fn test_run_diverged() {
        let mut engine = BoundedEngine::new(ScriptedEngine::new().diverge_on_run(1));
        assert_eq!(engine.run(Duration::from_secs(5)), Ok(RunStatus::Diverged));
    }

    #[test]
    fn test_backend_timeout_keeps_engine() {
        let mut engine = BoundedEngine::new(ScriptedEngine::new().time_out_on_run(1));
        let err = engine.run(Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, EngineError::Timeout { .. }));
        assert!(!engine.is_busy());
        assert!(engine.get_mut().is_ok());
    }

    #[test]
    fn test_hung_backend_is_abandoned_within_budget() {
        let slow = ScriptedEngine::new().with_run_delay(Duration::from_secs(2));
        let mut engine = BoundedEngine::new(slow);

        let started = Instant::now();
        let err = engine.run(Duration::from_millis(20)).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(1));
        match err {
            EngineError::Timeout { timeout, elapsed } => {
                assert_eq!(timeout, Duration::from_millis(20));
                assert!(elapsed >= timeout);
            }
            other => panic!("expected timeout, got {:?}", other),
        }

        assert!(engine.is_busy());
        assert_eq!(engine.get().err(), Some(EngineError::Busy));
        assert_eq!(engine.get_mut().err(), Some(EngineError::Busy));
        assert_eq!(engine.run(Duration::from_millis(20)), Err(EngineError::Busy));
    }

    #[test]
    fn test_engine_returns_after_abandoned_run_finishes() {
        let slow = ScriptedEngine::new().with_run_delay(Duration::from_millis(100));
        let mut engine = BoundedEngine::new(slow);

        assert!(engine.run(Duration::from_millis(10)).is_err());
        thread::sleep(Duration::from_millis(500));

        let reclaimed = engine.get_mut().unwrap();
        assert_eq!(reclaimed.runs(), 1);
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_read_property_of_unknown_stream() {
        let engine = ScriptedEngine::new();
        assert_eq!(
            engine.read_property(StreamHandle(7), &StreamProperty::Temperature),
            Err(EngineError::UnknownStream(StreamHandle(7)))
        );
    }
}
