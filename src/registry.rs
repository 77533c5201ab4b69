//! Equipment registry: the static table of equipment kinds.
//!
//! Every kind carries a display name, a short textual code and a topological
//! role tag. Codes are the vocabulary of the flowsheet string codec, so the
//! registry enforces two properties at construction time:
//!
//! - every code is unique (reverse lookup is a bijection)
//! - every code is a single token of the codec grammar
//!   (one uppercase letter or digit followed by lowercase letters)
//!
//! # Example
//!
//! ```
//! use flowsynth::registry::{EquipmentRegistry, Role};
//!
//! let registry = EquipmentRegistry::standard();
//! let heater = registry.kind_of_code("H").unwrap();
//!
//! assert_eq!(registry.code_of(heater), "H");
//! assert_eq!(registry.role_of(heater), Role::Block);
//! assert_eq!(registry.name_of(heater), "Heater");
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building an equipment registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two kinds share the same code
    #[error("Duplicate equipment code '{code}' ({first} and {second})")]
    DuplicateCode {
        code: String,
        first: String,
        second: String,
    },
    /// Code is not exactly one codec token
    #[error("Equipment code '{code}' of {name} is not a single flowsheet token")]
    InvalidCode { code: String, name: String },
    /// Code lookup failed
    #[error("No equipment registered with code '{0}'")]
    UnknownCode(String),
}

/// Topological role of an equipment kind.
///
/// Tags used in the standard equipment table:
/// - `S`: stream-level markers (feeds, products, mixers, branch points)
/// - `B`: single-inlet, single-outlet blocks (heaters, pumps, reactors)
/// - `M`: blocks with more than one outlet (splitters, flashes, columns)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Stream,
    Block,
    MultiOutlet,
}

impl Role {
    /// Single-letter tag used in the equipment table.
    pub fn tag(&self) -> char {
        match self {
            Role::Stream => 'S',
            Role::Block => 'B',
            Role::MultiOutlet => 'M',
        }
    }

    /// Parses a single-letter role tag.
    pub fn from_tag(tag: char) -> Option<Role> {
        match tag {
            'S' => Some(Role::Stream),
            'B' => Some(Role::Block),
            'M' => Some(Role::MultiOutlet),
            _ => None,
        }
    }
}

/// Identity of an equipment kind: its index in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EquipmentKind(pub usize);

impl EquipmentKind {
    /// Gets the index value.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for EquipmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Static description of one equipment kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentSpec {
    /// Human-readable name
    pub name: String,
    /// Short code used by the flowsheet codec
    pub code: String,
    /// Topological role
    pub role: Role,
}

impl EquipmentSpec {
    /// Creates a new equipment description.
    pub fn new(name: &str, code: &str, role: Role) -> Self {
        EquipmentSpec {
            name: name.to_string(),
            code: code.to_string(),
            role,
        }
    }
}

/// Standard equipment table, in index order.
const STANDARD_TABLE: &[(&str, &str, Role)] = &[
    ("Feed", "F", Role::Stream),
    ("Mixer", "M", Role::Stream),
    ("Splitter", "S", Role::MultiOutlet),
    ("Heater", "H", Role::Block),
    ("Cooler", "C", Role::Block),
    ("HeatExchanger", "Hx", Role::Stream),
    ("Pump", "Pump", Role::Block),
    ("CSTR", "Cstr", Role::Block),
    ("PFR", "Pfr", Role::Block),
    ("Flash", "Flash", Role::MultiOutlet),
    ("DistillationColumn", "Dc", Role::MultiOutlet),
    ("DistillationColumnWithRecycle", "Dcr", Role::MultiOutlet),
    ("Compressor", "Comp", Role::Block),
    ("Turbine", "T", Role::Block),
    ("Product", "P", Role::Stream),
    ("Subbranch 1 starter", "1s", Role::Stream),
    ("Subbranch 1 end point", "1e", Role::Stream),
    ("Subbranch 1 connection point", "1c", Role::Stream),
    ("Subbranch 2 starter", "2s", Role::Stream),
    ("Subbranch 2 end point", "2e", Role::Stream),
    ("Subbranch 2 connection point", "2c", Role::Stream),
    ("Subbranch 3 starter", "3s", Role::Stream),
    ("Subbranch 3 end point", "3e", Role::Stream),
    ("Subbranch 3 connection point", "3c", Role::Stream),
    ("HeatExchanger A", "Hxa", Role::Stream),
    ("HeatExchanger B", "Hxb", Role::Stream),
    ("Minorfeed", "Fm", Role::Stream),
    ("Minorproduct", "Pm", Role::Stream),
    ("End", "End", Role::Stream),
];

/// Returns true when `code` is exactly one token of the codec grammar.
pub(crate) fn is_single_token(code: &str) -> bool {
    let mut chars = code.chars();
    match chars.next() {
        Some(head) if head.is_ascii_uppercase() || head.is_ascii_digit() => {
            chars.all(|c| c.is_ascii_lowercase())
        }
        _ => false,
    }
}

/// Read-only table of equipment kinds with a validated code bijection.
///
/// Built once at startup and shared (typically behind an `Arc`) with every
/// component that needs code or role lookups.
#[derive(Debug, Clone)]
pub struct EquipmentRegistry {
    specs: Vec<EquipmentSpec>,
    by_code: HashMap<String, EquipmentKind>,
}

impl EquipmentRegistry {
    /// Builds a registry, failing fast on duplicate or malformed codes.
    ///
    /// # Examples
    ///
    /// ```
    /// use flowsynth::registry::{EquipmentRegistry, EquipmentSpec, RegistryError, Role};
    ///
    /// let result = EquipmentRegistry::new(vec![
    ///     EquipmentSpec::new("Heater", "H", Role::Block),
    ///     EquipmentSpec::new("HotWell", "H", Role::Stream),
    /// ]);
    /// assert!(matches!(result, Err(RegistryError::DuplicateCode { .. })));
    /// ```
    pub fn new(specs: Vec<EquipmentSpec>) -> Result<Self, RegistryError> {
        let mut by_code: HashMap<String, EquipmentKind> = HashMap::with_capacity(specs.len());

        for (index, spec) in specs.iter().enumerate() {
            if !is_single_token(&spec.code) {
                return Err(RegistryError::InvalidCode {
                    code: spec.code.clone(),
                    name: spec.name.clone(),
                });
            }
            if let Some(previous) = by_code.insert(spec.code.clone(), EquipmentKind(index)) {
                return Err(RegistryError::DuplicateCode {
                    code: spec.code.clone(),
                    first: specs[previous.0].name.clone(),
                    second: spec.name.clone(),
                });
            }
        }

        Ok(EquipmentRegistry { specs, by_code })
    }

    /// Builds the standard equipment table.
    ///
    /// # Panics
    ///
    /// Never in practice: the built-in table is covered by unit tests for
    /// uniqueness and token validity.
    pub fn standard() -> Self {
        let specs = STANDARD_TABLE
            .iter()
            .map(|(name, code, role)| EquipmentSpec::new(name, code, *role))
            .collect();
        EquipmentRegistry::new(specs).expect("standard equipment table is valid")
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Checks if the registry has no kinds.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Iterates over all kinds in index order.
    pub fn kinds(&self) -> impl Iterator<Item = EquipmentKind> + '_ {
        (0..self.specs.len()).map(EquipmentKind)
    }

    /// Full description of a kind, if it belongs to this registry.
    pub fn spec(&self, kind: EquipmentKind) -> Option<&EquipmentSpec> {
        self.specs.get(kind.0)
    }

    /// Checks whether a kind belongs to this registry.
    pub fn contains(&self, kind: EquipmentKind) -> bool {
        kind.0 < self.specs.len()
    }

    /// Code of a kind.
    ///
    /// # Panics
    ///
    /// Panics if `kind` was not issued by this registry.
    pub fn code_of(&self, kind: EquipmentKind) -> &str {
        &self.specs[kind.0].code
    }

    /// Role tag of a kind.
    ///
    /// # Panics
    ///
    /// Panics if `kind` was not issued by this registry.
    pub fn role_of(&self, kind: EquipmentKind) -> Role {
        self.specs[kind.0].role
    }

    /// Display name of a kind.
    ///
    /// # Panics
    ///
    /// Panics if `kind` was not issued by this registry.
    pub fn name_of(&self, kind: EquipmentKind) -> &str {
        &self.specs[kind.0].name
    }

    /// Reverse lookup by exact code match.
    pub fn kind_of_code(&self, code: &str) -> Option<EquipmentKind> {
        self.by_code.get(code).copied()
    }

    /// Reverse lookup by exact code match, as a `Result`.
    pub fn require_code(&self, code: &str) -> Result<EquipmentKind, RegistryError> {
        self.kind_of_code(code).ok_or_else(|| RegistryError::UnknownCode(code.to_string()))
    }

    /// Lookup by display name.
    pub fn kind_of_name(&self, name: &str) -> Option<EquipmentKind> {
        self.specs.iter().position(|s| s.name == name).map(EquipmentKind)
    }
}

impl Default for EquipmentRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
