//! Process stages and the stage classifier.
//!
//! Flowsheet construction moves through five coarse stages. The stage is
//! never set directly: it is recomputed after every step from the previous
//! stage and the observables of the newest outlet stream.
//!
//! ```text
//! Preparation --(hot, pressurized, unconverted)--> Reaction
//! Reaction    --(conversion >= 0.75)-------------> Cooling
//! Cooling     --------------------------------------> Distillation
//! Distillation ------------------------------------> Distillation
//! any         --(product pure)-------------------> Pure
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Temperature at or above which an unconverted feed is ready to react.
pub const REACTION_TEMPERATURE: f64 = 200.0;
/// Pressure at or above which an unconverted feed is ready to react.
pub const REACTION_PRESSURE: f64 = 1.0;
/// Conversion below which the feed counts as unconverted.
pub const UNCONVERTED_LIMIT: f64 = 0.1;
/// Conversion at which the reaction section is considered complete.
pub const CONVERSION_TARGET: f64 = 0.75;

/// Coarse phase of flowsheet construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStage {
    #[default]
    Preparation,
    Reaction,
    Cooling,
    Distillation,
    Pure,
}

impl fmt::Display for ProcessStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessStage::Preparation => "pre",
            ProcessStage::Reaction => "reac",
            ProcessStage::Cooling => "cool",
            ProcessStage::Distillation => "distill",
            ProcessStage::Pure => "pure",
        };
        f.write_str(name)
    }
}

/// Process observables read from the newest outlet stream.
///
/// Values are opaque numbers reported by the simulator; no unit conversion
/// happens here.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observables {
    /// Stream temperature
    pub temperature: f64,
    /// Stream pressure
    pub pressure: f64,
    /// Stream mass flow
    pub mass_flow: f64,
    /// Fraction of the reference reactant consumed, relative to the feed
    pub conversion: f64,
    /// Whether the product purity target has been reached this episode
    pub water_is_pure: bool,
    /// Episode progress, `iteration / max_iterations`
    pub progress: f64,
}

impl Observables {
    /// Observables of a fresh feed stream at the given conditions.
    pub fn feed(temperature: f64, pressure: f64, mass_flow: f64) -> Self {
        Observables { temperature, pressure, mass_flow, ..Default::default() }
    }

    /// Flat state vector `[T, P, mass flow, progress]`.
    pub fn to_state_vector(&self) -> [f64; 4] {
        [self.temperature, self.pressure, self.mass_flow, self.progress]
    }
}

/// Computes the next stage. First matching rule wins:
///
/// 1. product pure -> `Pure`
/// 2. T >= 200, P >= 1 and conversion < 0.1 -> `Reaction`
/// 3. conversion >= 0.75 after `Reaction` -> `Cooling`
/// 4. after `Cooling` or `Distillation` -> `Distillation`
/// 5. otherwise the previous stage is kept
///
/// Rule 4 folds `Cooling` into `Distillation`, so once distillation starts
/// the classifier never returns `Cooling` again. The only exit from
/// `Distillation` other than `Pure` is rule 2, which requires an unconverted
/// stream and cannot fire downstream of the reactor.
///
/// # Examples
///
/// ```
/// use flowsynth::stage::{classify, Observables, ProcessStage};
///
/// let hot = Observables {
///     temperature: 220.0,
///     pressure: 2.0,
///     conversion: 0.05,
///     ..Default::default()
/// };
/// assert_eq!(classify(ProcessStage::Preparation, &hot), ProcessStage::Reaction);
/// ```
pub fn classify(previous: ProcessStage, observables: &Observables) -> ProcessStage {
    let Observables {
        temperature,
        pressure,
        conversion,
        water_is_pure,
        ..
    } = *observables;

    if water_is_pure {
        ProcessStage::Pure
    } else if temperature >= REACTION_TEMPERATURE
        && pressure >= REACTION_PRESSURE
        && conversion < UNCONVERTED_LIMIT
    {
        ProcessStage::Reaction
    } else if conversion >= CONVERSION_TARGET && previous == ProcessStage::Reaction {
        ProcessStage::Cooling
    } else if matches!(previous, ProcessStage::Cooling | ProcessStage::Distillation) {
        ProcessStage::Distillation
    } else {
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(temperature: f64, pressure: f64, conversion: f64) -> Observables {
        Observables { temperature, pressure, conversion, ..Default::default() }
    }

    #[test]
    fn test_ambient_feed_stays_in_preparation() {
        let stage = classify(ProcessStage::Preparation, &obs(25.0, 1.0, 0.0));
        assert_eq!(stage, ProcessStage::Preparation);
    }

    #[test]
    fn test_hot_feed_enters_reaction() {
        let stage = classify(ProcessStage::Preparation, &obs(220.0, 2.0, 0.05));
        assert_eq!(stage, ProcessStage::Reaction);
    }

    #[test]
    fn test_reaction_thresholds_are_inclusive() {
        let prep = ProcessStage::Preparation;
        assert_eq!(classify(prep, &obs(200.0, 1.0, 0.0)), ProcessStage::Reaction);
        assert_eq!(classify(prep, &obs(199.9, 1.0, 0.0)), prep);
        assert_eq!(classify(prep, &obs(250.0, 0.9, 0.0)), prep);
        assert_eq!(classify(prep, &obs(250.0, 5.0, 0.1)), prep);
    }

    #[test]
    fn test_converted_reaction_cools() {
        let stage = classify(ProcessStage::Reaction, &obs(300.0, 10.0, 0.80));
        assert_eq!(stage, ProcessStage::Cooling);
    }

    #[test]
    fn test_conversion_without_reaction_stage_is_ignored() {
        let stage = classify(ProcessStage::Preparation, &obs(50.0, 1.0, 0.9));
        assert_eq!(stage, ProcessStage::Preparation);
    }

    #[test]
    fn test_partial_conversion_stays_in_reaction() {
        let stage = classify(ProcessStage::Reaction, &obs(300.0, 10.0, 0.5));
        assert_eq!(stage, ProcessStage::Reaction);
    }

    #[test]
    fn test_cooling_merges_into_distillation() {
        assert_eq!(
            classify(ProcessStage::Cooling, &obs(30.0, 10.0, 0.8)),
            ProcessStage::Distillation
        );
        assert_eq!(
            classify(ProcessStage::Distillation, &obs(30.0, 10.0, 0.8)),
            ProcessStage::Distillation
        );
    }

    #[test]
    fn test_purity_wins_over_everything() {
        let pure = Observables {
            water_is_pure: true,
            ..obs(250.0, 5.0, 0.0)
        };
        for previous in [
            ProcessStage::Preparation,
            ProcessStage::Reaction,
            ProcessStage::Cooling,
            ProcessStage::Distillation,
            ProcessStage::Pure,
        ] {
            assert_eq!(classify(previous, &pure), ProcessStage::Pure);
        }
    }

    #[test]
    fn test_unconverted_hot_stream_reenters_reaction() {
        // Only an unconverted feed leaves distillation, and only towards reaction
        let stage = classify(ProcessStage::Distillation, &obs(250.0, 5.0, 0.0));
        assert_eq!(stage, ProcessStage::Reaction);
    }

    #[test]
    fn test_state_vector() {
        let o = Observables {
            progress: 0.5,
            ..Observables::feed(25.0, 1.0, 12.0)
        };
        assert_eq!(o.to_state_vector(), [25.0, 1.0, 12.0, 0.5]);
    }
}
