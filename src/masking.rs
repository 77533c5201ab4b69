//! Action mask generation.
//!
//! The mask is a pure function of the current stage, the pressure of the
//! newest stream and two facts about the history: whether a mixer and
//! whether a distillation column have been placed. Each stage builds its
//! vector from scratch.
//!
//! # Example
//!
//! ```
//! use flowsynth::actions::ActionSlot;
//! use flowsynth::masking::{action_mask, HistoryFlags};
//! use flowsynth::stage::ProcessStage;
//!
//! let history = HistoryFlags::from_slots([ActionSlot::Heater, ActionSlot::Mixer]);
//! let mask = action_mask(ProcessStage::Distillation, 1.0, &history);
//!
//! assert!(mask[ActionSlot::Mixer]);
//! assert!(mask[ActionSlot::Splitter]);
//! assert!(!mask[ActionSlot::Column]);
//! ```

use serde::{Deserialize, Serialize};

use crate::actions::{ActionMask, ActionSlot};
use crate::stage::ProcessStage;

/// Pressure above which the pump is disabled and the heater forced on.
pub const PUMP_CUTOFF_PRESSURE: f64 = 1.0;

/// Slots available at the start of the preparation stage.
const PREPARATION_DEFAULT: [ActionSlot; 5] = [
    ActionSlot::Compressor,
    ActionSlot::Heater,
    ActionSlot::Pump,
    ActionSlot::Cooler,
    ActionSlot::HeatExchanger,
];

/// History facts the mask depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistoryFlags {
    mixer: bool,
    distillation_column: bool,
}

impl HistoryFlags {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags for a sequence of taken actions.
    pub fn from_slots(slots: impl IntoIterator<Item = ActionSlot>) -> Self {
        let mut flags = HistoryFlags::new();
        for slot in slots {
            flags.record(slot);
        }
        flags
    }

    /// Flags from instance labels using substring matching: a label
    /// containing `M` marks a mixer, one containing `DC` a column.
    ///
    /// Intended for label logs produced outside this crate, where only the
    /// legacy naming scheme (`T1`, `C2`, `HX1`, `M1`, `S1`, `DC1`) is known.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        HistoryFlags {
            mixer: labels.iter().any(|l| l.as_ref().contains('M')),
            distillation_column: labels.iter().any(|l| l.as_ref().contains("DC")),
        }
    }

    /// Records one taken action.
    pub fn record(&mut self, slot: ActionSlot) {
        if slot == ActionSlot::Mixer {
            self.mixer = true;
        }
        if slot.is_distillation_column() {
            self.distillation_column = true;
        }
    }

    /// A mixer has been placed.
    pub fn history_has_mixer(&self) -> bool {
        self.mixer
    }

    /// A distillation column (with or without recycle) has been placed.
    pub fn history_has_distillation_column(&self) -> bool {
        self.distillation_column
    }
}

/// Builds the availability mask for the next step.
///
/// - `Preparation`: compressor, heater, pump, cooler and heat exchanger;
///   above [`PUMP_CUTOFF_PRESSURE`] the pump is off and the heater on
/// - `Reaction`: heater and heat exchanger
/// - `Cooling`: cooler
/// - `Distillation`: the mixer plus exactly one of splitter, column and
///   recycle column, chosen by the history
/// - `Pure`: finish
pub fn action_mask(stage: ProcessStage, pressure: f64, history: &HistoryFlags) -> ActionMask {
    match stage {
        ProcessStage::Preparation => {
            let mut mask = ActionMask::only(&PREPARATION_DEFAULT);
            if pressure > PUMP_CUTOFF_PRESSURE {
                mask.disable(ActionSlot::Pump);
                mask.enable(ActionSlot::Heater);
            }
            mask
        }
        ProcessStage::Reaction => {
            ActionMask::only(&[ActionSlot::Heater, ActionSlot::HeatExchanger])
        }
        ProcessStage::Cooling => ActionMask::only(&[ActionSlot::Cooler]),
        ProcessStage::Distillation => distillation_mask(history),
        ProcessStage::Pure => ActionMask::only(&[ActionSlot::Finish]),
    }
}

fn distillation_mask(history: &HistoryFlags) -> ActionMask {
    let mut mask = ActionMask::only(&[ActionSlot::Mixer]);

    if history.history_has_mixer() {
        if history.history_has_distillation_column() {
            mask.disable(ActionSlot::Mixer);
            mask.enable(ActionSlot::RecycleColumn);
        } else {
            mask.enable(ActionSlot::Splitter);
        }
    } else {
        mask.enable(ActionSlot::Column);
    }
    mask
}
