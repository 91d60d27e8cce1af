//! Processor topology model
//!
//! A topology is a TOML document with one `[processor]` table, exactly one
//! `[[interconnect]]` table and any number of `[[unit]]` tables:
//!
//! ```toml
//! [processor]
//! name = "demo"
//! buffer_depth = 4
//!
//! [[interconnect]]
//! name = "ic"
//! template = "crossbar"
//! unit_count = 4
//!
//! [[unit]]
//! name = "a"
//! type = "lsu"
//! template = "lsu_basic"
//! number = 0
//!
//! [unit.parameters]
//! memory_words = 256
//! ```
//!
//! Buffer addresses are derived from the unit number and the static layout
//! table in [`scad_chip::units`]; they are not configurable.

use crate::error::{ResolveError, TopologyError};
use scad_chip::{BufferAddress, Direction, UnitType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::num::NonZeroU8;
use std::path::Path;
use std::str::FromStr;

/// Interconnect routing packets between units
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterconnectDescription {
    /// Interconnect name
    pub name: String,

    /// Implementation template id
    #[serde(default)]
    pub template: String,

    /// Number of unit channels served
    pub unit_count: u32,
}

/// Unit declaration before validation
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitSpec {
    /// Unit name, unique within the topology
    pub name: String,

    /// Type name (`cu`, `lsu`, `pu`, ...)
    #[serde(rename = "type")]
    pub unit_type: String,

    /// Implementation template id
    #[serde(default)]
    pub template: String,

    /// Unit number (the `unit` half of every address of this unit)
    pub number: u32,

    /// Free-form key/value parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
}

/// Parameter value as written in the description
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Quoted string
    Text(String),
    /// Integer literal
    Integer(i64),
    /// Float literal
    Float(f64),
    /// Boolean literal
    Bool(bool),
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Validated unit with its resolved buffer addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescription {
    /// Unit name
    pub name: String,

    /// Unit type
    pub unit_type: UnitType,

    /// Implementation template id
    pub template: String,

    /// Unit number
    pub number: u8,

    /// Parameters, values rendered as text
    pub parameters: BTreeMap<String, String>,

    /// Input buffer name -> address
    pub inputs: BTreeMap<String, BufferAddress>,

    /// Output buffer name -> address
    pub outputs: BTreeMap<String, BufferAddress>,
}

impl UnitDescription {
    fn new(spec: UnitSpec, unit_type: UnitType, number: u8) -> Self {
        let addresses = |layout: &[(&str, u8)]| {
            layout
                .iter()
                .map(|&(name, index)| (name.to_string(), BufferAddress::new(number, index)))
                .collect()
        };

        Self {
            inputs: addresses(unit_type.inputs()),
            outputs: addresses(unit_type.outputs()),
            name: spec.name,
            unit_type,
            template: spec.template,
            number,
            parameters: spec
                .parameters
                .into_iter()
                .map(|(k, v)| (k, v.to_string()))
                .collect(),
        }
    }

    /// Buffers on one side
    pub fn buffers(&self, direction: Direction) -> &BTreeMap<String, BufferAddress> {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    /// Parameter value as written in the description
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDescription {
    processor: RawProcessor,
    #[serde(default)]
    interconnect: Vec<InterconnectDescription>,
    #[serde(default)]
    unit: Vec<UnitSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProcessor {
    name: String,
    buffer_depth: u32,
}

/// Immutable description of one processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorDescription {
    name: String,
    buffer_depth: NonZeroU8,
    interconnect: InterconnectDescription,
    units: BTreeMap<String, UnitDescription>,
    by_number: BTreeMap<u8, String>,
}

impl ProcessorDescription {
    /// Build and validate a description
    ///
    /// # Errors
    ///
    /// Returns error on a missing or repeated interconnect, duplicate unit
    /// names or numbers, unknown unit types, out-of-range unit numbers or
    /// a buffer depth outside 1..=255.
    pub fn new(
        name: impl Into<String>,
        buffer_depth: u32,
        interconnects: Vec<InterconnectDescription>,
        units: Vec<UnitSpec>,
    ) -> Result<Self, TopologyError> {
        let name = name.into();

        let buffer_depth = u8::try_from(buffer_depth)
            .ok()
            .and_then(NonZeroU8::new)
            .ok_or(TopologyError::InvalidBufferDepth { depth: buffer_depth })?;

        let count = interconnects.len();
        let interconnect = match <[InterconnectDescription; 1]>::try_from(interconnects) {
            Ok([ic]) => ic,
            Err(_) if count == 0 => return Err(TopologyError::MissingInterconnect { processor: name }),
            Err(_) => return Err(TopologyError::MultipleInterconnects { processor: name, count }),
        };

        let mut by_name: BTreeMap<String, UnitDescription> = BTreeMap::new();
        let mut by_number: BTreeMap<u8, String> = BTreeMap::new();

        for spec in units {
            if by_name.contains_key(&spec.name) {
                return Err(TopologyError::DuplicateUnit { name: spec.name });
            }

            let unit_type = UnitType::from_config_name(&spec.unit_type).ok_or_else(|| {
                TopologyError::UnknownUnitType {
                    unit: spec.name.clone(),
                    unit_type: spec.unit_type.clone(),
                }
            })?;

            let number = u8::try_from(spec.number)
                .ok()
                .filter(|&n| n != u8::MAX && u32::from(n) < interconnect.unit_count)
                .ok_or_else(|| TopologyError::UnitNumberOutOfRange {
                    unit: spec.name.clone(),
                    number: spec.number,
                    unit_count: interconnect.unit_count,
                })?;

            if let Some(first) = by_number.get(&number) {
                return Err(TopologyError::DuplicateUnitNumber {
                    number,
                    first: first.clone(),
                    second: spec.name,
                });
            }

            tracing::debug!("Unit '{}': {} #{}", spec.name, unit_type, number);
            by_number.insert(number, spec.name.clone());
            by_name.insert(spec.name.clone(), UnitDescription::new(spec, unit_type, number));
        }

        tracing::info!(
            "Processor '{}': {} units, buffer depth {}, interconnect '{}'",
            name,
            by_name.len(),
            buffer_depth,
            interconnect.name
        );

        Ok(Self {
            name,
            buffer_depth,
            interconnect,
            units: by_name,
            by_number,
        })
    }

    /// Parse a TOML description
    ///
    /// # Errors
    ///
    /// Returns error if the document is malformed or fails validation.
    pub fn parse(text: &str) -> Result<Self, TopologyError> {
        let raw: RawDescription = toml::from_str(text)?;
        Self::new(
            raw.processor.name,
            raw.processor.buffer_depth,
            raw.interconnect,
            raw.unit,
        )
    }

    /// Load a TOML description from disk
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the description is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading topology from: {}", path.display());

        if !path.exists() {
            return Err(crate::ScadAsmError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text)?)
    }

    /// Processor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Depth of every input and output buffer
    pub const fn buffer_depth(&self) -> NonZeroU8 {
        self.buffer_depth
    }

    /// The interconnect
    pub const fn interconnect(&self) -> &InterconnectDescription {
        &self.interconnect
    }

    /// Units ordered by name
    pub fn units(&self) -> impl Iterator<Item = &UnitDescription> {
        self.units.values()
    }

    /// Number of units
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Unit by name
    pub fn unit(&self, name: &str) -> Option<&UnitDescription> {
        self.units.get(name)
    }

    /// Unit by number
    pub fn unit_by_number(&self, number: u8) -> Option<&UnitDescription> {
        self.by_number.get(&number).and_then(|name| self.units.get(name))
    }

    /// True if `address` is a real buffer on the given side of some unit
    pub fn has_endpoint(&self, address: BufferAddress, direction: Direction) -> bool {
        self.unit_by_number(address.unit).is_some_and(|u| {
            u.unit_type
                .buffers(direction)
                .iter()
                .any(|&(_, index)| index == address.buffer)
        })
    }

    /// Resolve `unit`/`buffer` on one side to its address
    ///
    /// # Errors
    ///
    /// Returns error if the unit does not exist or lacks the buffer.
    pub fn resolve(&self, unit: &str, buffer: &str, direction: Direction) -> Result<BufferAddress, ResolveError> {
        let desc = self.unit(unit).ok_or_else(|| ResolveError::unknown_unit(unit))?;
        desc.buffers(direction)
            .get(buffer)
            .copied()
            .ok_or_else(|| ResolveError::unknown_buffer(unit, buffer, direction))
    }
}

impl FromStr for ProcessorDescription {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
