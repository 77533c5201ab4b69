//! The discrete action alphabet and its availability mask.
//!
//! The agent chooses among ten fixed slots. Every slot has a stable symbolic
//! name and is bound to an equipment code; masks are fixed-size boolean
//! arrays indexed by slot, so no stage can leak bits into another.

use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::registry::{EquipmentKind, EquipmentRegistry, RegistryError};

/// Number of discrete actions.
pub const ACTION_COUNT: usize = 10;

/// One discrete choice of the action alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSlot {
    Compressor,
    Heater,
    Pump,
    Cooler,
    HeatExchanger,
    /// Terminal action closing the flowsheet
    Finish,
    Mixer,
    /// Distillation column with recycle, available once a mixer and a column exist
    RecycleColumn,
    /// Plain distillation column, available before any mixer
    Column,
    Splitter,
}

impl ActionSlot {
    /// All slots in index order.
    pub const ALL: [ActionSlot; ACTION_COUNT] = [
        ActionSlot::Compressor,
        ActionSlot::Heater,
        ActionSlot::Pump,
        ActionSlot::Cooler,
        ActionSlot::HeatExchanger,
        ActionSlot::Finish,
        ActionSlot::Mixer,
        ActionSlot::RecycleColumn,
        ActionSlot::Column,
        ActionSlot::Splitter,
    ];

    /// Position of the slot in the action vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Slot at a position of the action vector.
    pub fn from_index(index: usize) -> Option<ActionSlot> {
        ActionSlot::ALL.get(index).copied()
    }

    /// Equipment code this slot instantiates.
    pub fn code(self) -> &'static str {
        match self {
            ActionSlot::Compressor => "Comp",
            ActionSlot::Heater => "H",
            ActionSlot::Pump => "Pump",
            ActionSlot::Cooler => "C",
            ActionSlot::HeatExchanger => "Hx",
            ActionSlot::Finish => "End",
            ActionSlot::Mixer => "M",
            ActionSlot::RecycleColumn => "Dcr",
            ActionSlot::Column => "Dc",
            ActionSlot::Splitter => "S",
        }
    }

    /// Prefix of instance labels, the uppercased equipment code.
    pub fn label_prefix(self) -> String {
        self.code().to_ascii_uppercase()
    }

    /// Whether this slot places a distillation column.
    pub fn is_distillation_column(self) -> bool {
        matches!(self, ActionSlot::Column | ActionSlot::RecycleColumn)
    }
}

impl fmt::Display for ActionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Resolved binding of every slot to a registry kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionAlphabet {
    kinds: [EquipmentKind; ACTION_COUNT],
}

impl ActionAlphabet {
    /// Resolves each slot's code against `registry`.
    pub fn resolve(registry: &EquipmentRegistry) -> Result<Self, RegistryError> {
        let mut kinds = [EquipmentKind(0); ACTION_COUNT];
        for slot in ActionSlot::ALL {
            kinds[slot.index()] = registry.require_code(slot.code())?;
        }
        Ok(ActionAlphabet { kinds })
    }

    /// Equipment kind bound to `slot`.
    pub fn kind(&self, slot: ActionSlot) -> EquipmentKind {
        self.kinds[slot.index()]
    }

    /// Slot bound to `kind`, if any.
    pub fn slot_of(&self, kind: EquipmentKind) -> Option<ActionSlot> {
        ActionSlot::ALL.into_iter().find(|slot| self.kinds[slot.index()] == kind)
    }
}

/// Availability of each slot for the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionMask([bool; ACTION_COUNT]);

impl ActionMask {
    /// Mask with every slot disabled.
    pub const fn none() -> Self {
        ActionMask([false; ACTION_COUNT])
    }

    /// Mask enabling exactly `slots`.
    pub fn only(slots: &[ActionSlot]) -> Self {
        let mut mask = ActionMask::none();
        for &slot in slots {
            mask.enable(slot);
        }
        mask
    }

    pub fn enable(&mut self, slot: ActionSlot) {
        self.0[slot.index()] = true;
    }

    pub fn disable(&mut self, slot: ActionSlot) {
        self.0[slot.index()] = false;
    }

    pub fn is_enabled(&self, slot: ActionSlot) -> bool {
        self.0[slot.index()]
    }

    /// Slots currently enabled, in index order.
    pub fn enabled(&self) -> impl Iterator<Item = ActionSlot> + '_ {
        ActionSlot::ALL.into_iter().filter(|slot| self.is_enabled(*slot))
    }

    pub fn count_enabled(&self) -> usize {
        self.0.iter().filter(|b| **b).count()
    }

    /// Raw boolean vector, index-aligned with [`ActionSlot::ALL`].
    pub fn as_array(&self) -> &[bool; ACTION_COUNT] {
        &self.0
    }
}

impl Index<ActionSlot> for ActionMask {
    type Output = bool;

    fn index(&self, slot: ActionSlot) -> &bool {
        &self.0[slot.index()]
    }
}

impl From<ActionMask> for [bool; ACTION_COUNT] {
    fn from(mask: ActionMask) -> Self {
        mask.0
    }
}

impl fmt::Display for ActionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.0 {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}
