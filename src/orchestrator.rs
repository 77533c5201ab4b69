//! Episode orchestration: the stepwise flowsheet builder.
//!
//! [`FlowsheetEnv`] owns the episode state (counters, entries, stage, mask)
//! and drives the simulator through [`SimulationEngine`]. One episode:
//!
//! 1. [`FlowsheetEnv::reset`] places the feed streams and issues the first mask
//! 2. [`FlowsheetEnv::step`] appends one unit operation per call, reads the
//!    new outlet, reclassifies the stage and issues the next mask
//! 3. the episode ends when the finish action is taken, the iteration limit
//!    is reached, or the simulator fails; further steps are refused until
//!    the next reset
//!
//! See the crate-level docs for a complete episode against a toy backend.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::actions::{ActionAlphabet, ActionMask, ActionSlot};
use crate::codec::{CodecError, FlowsheetCodec};
use crate::config::{ConfigError, EnvConfig};
use crate::masking::{action_mask, HistoryFlags};
use crate::models::{instance_label, UnitOperationFactory};
use crate::registry::{EquipmentKind, EquipmentRegistry, RegistryError};
use crate::simulation::{
    BoundedEngine, EngineError, InletSpec, RunStatus, SimulationEngine, StreamHandle,
    StreamProperty,
};
use crate::stage::{classify, Observables, ProcessStage};

/// Errors raised by the flowsheet environment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowsheetError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Invalid environment config: {0}")]
    InvalidConfig(String),
    /// Action is masked off for the current step
    #[error("Action {slot} is not available in stage {stage}")]
    IllegalAction {
        slot: ActionSlot,
        stage: ProcessStage,
    },
    #[error("Continuous parameter {0} is not finite")]
    InvalidParameter(f64),
    /// Simulator could not solve the flowsheet
    #[error("Simulation did not converge after placing {label}")]
    ConvergenceFailure { label: String },
    /// Simulator call exceeded its time budget
    #[error("Simulation call for {label} exceeded {timeout:?}")]
    CollaboratorTimeout { label: String, timeout: Duration },
    /// No running episode
    #[error("Episode is over or not started; call reset before stepping")]
    StaleEpisode,
    #[error("At least one inlet stream is required")]
    NoInlets,
}

// ConfigError carries io and serde errors, which are not Clone
impl From<ConfigError> for FlowsheetError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Invalid(reason) => FlowsheetError::InvalidConfig(reason),
            other => FlowsheetError::InvalidConfig(other.to_string()),
        }
    }
}

/// One step's record in the flowsheet. Never modified once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowsheetEntry {
    pub slot: ActionSlot,
    pub kind: EquipmentKind,
    /// Physical value of the continuous parameter
    pub parameter: f64,
    pub label: String,
}

/// Instantiation count per equipment kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EquipmentCounters {
    counts: BTreeMap<EquipmentKind, usize>,
}

impl EquipmentCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the count of `kind` and returns the new value.
    pub fn increment(&mut self, kind: EquipmentKind) -> usize {
        let count = self.counts.entry(kind).or_insert(0);
        *count += 1;
        *count
    }

    /// Count of `kind`, zero if never placed.
    pub fn count(&self, kind: EquipmentKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Total number of placed units.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (EquipmentKind, usize)> + '_ {
        self.counts.iter().map(|(k, v)| (*k, *v))
    }
}

/// Lifecycle of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeStatus {
    /// No reset yet
    Idle,
    Running,
    /// Ended by the finish action or the iteration limit
    Finished,
    /// Ended by a simulator failure
    Failed,
}

/// Diagnostics for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    pub label: String,
    pub slot: ActionSlot,
    pub kind: EquipmentKind,
    pub parameter: f64,
    /// Observables after the step; stale when `failure` is set
    pub observables: Observables,
    /// Stage after the step
    pub stage: ProcessStage,
    /// Terminal simulator failure, if any
    pub failure: Option<FlowsheetError>,
}

/// Result of a successful [`FlowsheetEnv::step`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observables: Observables,
    pub done: bool,
    pub info: StepInfo,
    /// Primary outlet of the placed unit
    pub outlet: StreamHandle,
    /// All outlets of the placed unit, primary first
    pub outlets: Vec<StreamHandle>,
}

/// Comparable copy of the mutable episode state.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSnapshot {
    pub counters: EquipmentCounters,
    pub entries: Vec<FlowsheetEntry>,
    pub stage: ProcessStage,
    pub iteration: usize,
    pub mask: ActionMask,
    pub status: EpisodeStatus,
    pub observables: Observables,
}

/// Stepwise flowsheet synthesis environment.
pub struct FlowsheetEnv<E: SimulationEngine> {
    engine: BoundedEngine<E>,
    registry: Arc<EquipmentRegistry>,
    alphabet: ActionAlphabet,
    config: EnvConfig,

    counters: EquipmentCounters,
    entries: Vec<FlowsheetEntry>,
    history: HistoryFlags,
    stage: ProcessStage,
    iteration: usize,
    mask: ActionMask,
    status: EpisodeStatus,
    observables: Observables,
    reference_feed: f64,
    side_stream: Option<StreamHandle>,
    log: Vec<StepInfo>,
}

impl<E: SimulationEngine + Send + 'static> FlowsheetEnv<E> {
    /// Creates an environment; call [`FlowsheetEnv::reset`] before stepping.
    pub fn new(
        engine: E,
        registry: Arc<EquipmentRegistry>,
        config: EnvConfig,
    ) -> Result<Self, FlowsheetError> {
        config.validate()?;
        let alphabet = ActionAlphabet::resolve(&registry)?;

        Ok(FlowsheetEnv {
            engine: BoundedEngine::new(engine),
            registry,
            alphabet,
            config,
            counters: EquipmentCounters::new(),
            entries: Vec::new(),
            history: HistoryFlags::new(),
            stage: ProcessStage::Preparation,
            iteration: 0,
            mask: ActionMask::none(),
            status: EpisodeStatus::Idle,
            observables: Observables::default(),
            reference_feed: 0.0,
            side_stream: None,
            log: Vec::new(),
        })
    }

    /// Starts a new episode with the given feeds.
    ///
    /// Returns the observables of every feed and its stream handle. The
    /// first mask is computed from the first feed with zero conversion.
    /// Fails with [`EngineError::Busy`] while a run abandoned by the
    /// previous episode still holds the simulator.
    pub fn reset(
        &mut self,
        inlets: &[InletSpec],
    ) -> Result<(Vec<Observables>, Vec<StreamHandle>), FlowsheetError> {
        let first = inlets.first().ok_or(FlowsheetError::NoInlets)?;

        self.status = EpisodeStatus::Idle;
        self.counters.clear();
        self.entries.clear();
        self.history = HistoryFlags::new();
        self.iteration = 0;
        self.side_stream = None;
        self.log.clear();
        self.mask = ActionMask::none();

        let engine = self.engine.get_mut()?;
        engine.reinitialize()?;

        let mut observables = Vec::with_capacity(inlets.len());
        let mut handles = Vec::with_capacity(inlets.len());
        for (i, spec) in inlets.iter().enumerate() {
            let name = format!("IN{}", i + 1);
            handles.push(engine.create_input_stream(&name, spec)?);
            observables.push(Observables::feed(
                spec.temperature,
                spec.pressure,
                spec.total_flow(),
            ));
        }

        let reference = &self.config.reference_component;
        self.reference_feed = inlets.iter().map(|s| s.component_flow(reference)).sum();
        self.observables =
            Observables::feed(first.temperature, first.pressure, first.total_flow());
        self.stage = classify(ProcessStage::Preparation, &self.observables);
        self.mask = action_mask(self.stage, self.observables.pressure, &self.history);
        self.status = EpisodeStatus::Running;

        info!(
            inlets = inlets.len(),
            reference_feed = self.reference_feed,
            stage = %self.stage,
            mask = %self.mask,
            "episode reset"
        );
        Ok((observables, handles))
    }

    /// Places one unit operation.
    ///
    /// Refuses masked-off actions and non-finite parameters without touching
    /// the episode state. A simulator run that fails to converge or exceeds
    /// its time budget ends the episode: the outcome has `done` set and
    /// `info.failure` filled, and the returned observables are the previous
    /// ones. Any other simulator fault also ends the episode and is returned
    /// as an error; a timeout while placing the unit or reading its outlet
    /// comes back as [`FlowsheetError::CollaboratorTimeout`].
    pub fn step(
        &mut self,
        slot: ActionSlot,
        parameter: f64,
        inlet: StreamHandle,
    ) -> Result<StepOutcome, FlowsheetError> {
        if self.status != EpisodeStatus::Running {
            return Err(FlowsheetError::StaleEpisode);
        }
        if !self.mask.is_enabled(slot) {
            return Err(FlowsheetError::IllegalAction {
                slot,
                stage: self.stage,
            });
        }
        if !parameter.is_finite() {
            return Err(FlowsheetError::InvalidParameter(parameter));
        }

        if slot == ActionSlot::Finish {
            return Ok(self.finish(parameter, inlet));
        }

        let kind = self.alphabet.kind(slot);
        let ordinal = self.counters.count(kind) + 1;
        let factory = UnitOperationFactory::new(
            &self.alphabet,
            &self.config.parameter_ranges,
            &self.config.pressure_schedule,
        );
        let unit = factory.build(slot, ordinal, self.iteration, parameter);

        let mut inlets = vec![inlet];
        if slot == ActionSlot::Mixer {
            inlets.extend(self.side_stream.take());
        }

        debug!(
            label = %unit.label,
            slot = %slot,
            parameter = unit.parameter,
            pressure = ?unit.pressure,
            inlets = inlets.len(),
            closes_exchanger_pair = unit.closes_exchanger_pair(),
            "placing unit"
        );
        let placed = self
            .engine
            .get_mut()
            .and_then(|engine| engine.instantiate_unit(&unit, &inlets));
        let outlets = match placed {
            Ok(outlets) if !outlets.is_empty() => outlets,
            Ok(_) => {
                let error = EngineError::Backend(format!("{} produced no outlet", unit.label));
                return Err(self.abort(&unit.label, error));
            }
            Err(e) => return Err(self.abort(&unit.label, e)),
        };

        self.counters.increment(kind);
        self.history.record(slot);
        self.entries.push(FlowsheetEntry {
            slot,
            kind,
            parameter: unit.parameter,
            label: unit.label.clone(),
        });
        self.iteration += 1;
        if slot == ActionSlot::Splitter {
            self.side_stream = outlets.get(1).copied();
        }

        let outlet = outlets[0];
        let failure = match self.engine.run(self.config.run_timeout()) {
            Ok(RunStatus::Converged) => None,
            Ok(RunStatus::Diverged) => Some(FlowsheetError::ConvergenceFailure {
                label: unit.label.clone(),
            }),
            Err(EngineError::Timeout { timeout, .. }) => {
                Some(FlowsheetError::CollaboratorTimeout {
                    label: unit.label.clone(),
                    timeout,
                })
            }
            Err(e) => return Err(self.abort(&unit.label, e)),
        };

        let done = match failure {
            Some(ref error) => {
                warn!(label = %unit.label, error = %error, "episode failed");
                self.status = EpisodeStatus::Failed;
                self.mask = ActionMask::none();
                true
            }
            None => {
                if let Err(e) = self.observe(outlet) {
                    return Err(self.abort(&unit.label, e));
                }
                let previous = self.stage;
                self.stage = classify(previous, &self.observables);
                if self.stage != previous {
                    debug!(from = %previous, to = %self.stage, "stage transition");
                }
                self.mask = action_mask(self.stage, self.observables.pressure, &self.history);
                if self.iteration >= self.config.max_iterations {
                    self.status = EpisodeStatus::Finished;
                }
                self.status != EpisodeStatus::Running
            }
        };

        let info = StepInfo {
            label: unit.label,
            slot,
            kind,
            parameter: unit.parameter,
            observables: self.observables,
            stage: self.stage,
            failure,
        };
        debug!(
            label = %info.label,
            stage = %self.stage,
            mask = %self.mask,
            temperature = self.observables.temperature,
            pressure = self.observables.pressure,
            conversion = self.observables.conversion,
            done,
            "step complete"
        );
        self.log.push(info.clone());

        Ok(StepOutcome {
            observables: self.observables,
            done,
            info,
            outlet,
            outlets,
        })
    }

    /// Ends the episode after a simulator fault while handling `label`.
    fn abort(&mut self, label: &str, error: EngineError) -> FlowsheetError {
        warn!(label, error = %error, "simulator fault, episode aborted");
        self.status = EpisodeStatus::Failed;
        self.mask = ActionMask::none();
        match error {
            EngineError::Timeout { timeout, .. } => FlowsheetError::CollaboratorTimeout {
                label: label.to_string(),
                timeout,
            },
            other => FlowsheetError::Engine(other),
        }
    }

    /// Records the terminal entry and closes the episode.
    fn finish(&mut self, parameter: f64, inlet: StreamHandle) -> StepOutcome {
        let kind = self.alphabet.kind(ActionSlot::Finish);
        let ordinal = self.counters.increment(kind);
        let label = instance_label(ActionSlot::Finish, ordinal);

        self.history.record(ActionSlot::Finish);
        self.entries.push(FlowsheetEntry {
            slot: ActionSlot::Finish,
            kind,
            parameter,
            label: label.clone(),
        });
        self.iteration += 1;
        self.observables.progress = self.progress();
        self.status = EpisodeStatus::Finished;

        let info = StepInfo {
            label,
            slot: ActionSlot::Finish,
            kind,
            parameter,
            observables: self.observables,
            stage: self.stage,
            failure: None,
        };
        info!(
            iteration = self.iteration,
            flowsheet = ?self.flowsheet_string().ok(),
            "flowsheet finished"
        );
        self.log.push(info.clone());

        StepOutcome {
            observables: self.observables,
            done: true,
            info,
            outlet: inlet,
            outlets: vec![inlet],
        }
    }

    /// Reads the observables of a solved outlet stream.
    fn observe(&mut self, outlet: StreamHandle) -> Result<(), EngineError> {
        let engine = self.engine.get()?;
        let read = |property: StreamProperty| engine.read_property(outlet, &property);
        let reference = StreamProperty::MolarFlow(self.config.reference_component.clone());

        let temperature = read(StreamProperty::Temperature)?;
        let pressure = read(StreamProperty::Pressure)?;
        let mass_flow = read(StreamProperty::MassFlow)?;
        let reference_flow = read(reference)?;

        let conversion = if self.reference_feed > 0.0 {
            (self.reference_feed - reference_flow) / self.reference_feed
        } else {
            0.0
        };

        // Purity latches for the rest of the episode
        let mut water_is_pure = self.observables.water_is_pure;
        if !water_is_pure {
            let total = read(StreamProperty::TotalMolarFlow)?;
            if total > 0.0 {
                let product_component = self.config.product_component.clone();
                let product = read(StreamProperty::MolarFlow(product_component))?;
                water_is_pure = product / total >= self.config.purity;
            }
        }

        self.observables = Observables {
            temperature,
            pressure,
            mass_flow,
            conversion,
            water_is_pure,
            progress: self.progress(),
        };
        Ok(())
    }

    fn progress(&self) -> f64 {
        self.iteration as f64 / self.config.max_iterations as f64
    }

    /// Mask issued for the next step.
    pub fn action_mask(&self) -> ActionMask {
        self.mask
    }

    pub fn stage(&self) -> ProcessStage {
        self.stage
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    /// Whether the current episode has ended.
    pub fn is_done(&self) -> bool {
        matches!(self.status, EpisodeStatus::Finished | EpisodeStatus::Failed)
    }

    /// Latest observables.
    pub fn observables(&self) -> Observables {
        self.observables
    }

    pub fn counters(&self) -> &EquipmentCounters {
        &self.counters
    }

    pub fn entries(&self) -> &[FlowsheetEntry] {
        &self.entries
    }

    /// Labels of all entries, in construction order.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    pub fn history(&self) -> &HistoryFlags {
        &self.history
    }

    /// Diagnostics of every step of the episode.
    pub fn info_log(&self) -> &[StepInfo] {
        &self.log
    }

    /// Equipment kinds of the episode, in construction order.
    pub fn flowsheet_kinds(&self) -> Vec<EquipmentKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    /// Canonical flowsheet string of the episode.
    pub fn flowsheet_string(&self) -> Result<String, FlowsheetError> {
        let codec = FlowsheetCodec::new(&self.registry);
        Ok(codec.encode(&self.flowsheet_kinds())?)
    }

    /// Simplified flowsheet string, for compact logs.
    pub fn simplified_string(&self) -> Result<String, FlowsheetError> {
        let codec = FlowsheetCodec::new(&self.registry);
        Ok(codec.encode_simplified(&self.flowsheet_kinds())?)
    }

    /// Copy of the mutable episode state.
    pub fn snapshot(&self) -> EpisodeSnapshot {
        EpisodeSnapshot {
            counters: self.counters.clone(),
            entries: self.entries.clone(),
            stage: self.stage,
            iteration: self.iteration,
            mask: self.mask,
            status: self.status,
            observables: self.observables,
        }
    }

    /// Logs every recorded step.
    pub fn render(&self) {
        for step in &self.log {
            info!(
                label = %step.label,
                parameter = step.parameter,
                temperature = step.observables.temperature,
                pressure = step.observables.pressure,
                mass_flow = step.observables.mass_flow,
                stage = %step.stage,
                failure = ?step.failure,
                "{}", self.registry.name_of(step.kind)
            );
        }
    }

    pub fn registry(&self) -> &Arc<EquipmentRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// The simulator, unless an abandoned run still holds it.
    pub fn engine(&self) -> Option<&E> {
        self.engine.get().ok()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.get_mut().ok()
    }
}
