//! Unit buffers
//!
//! Every unit owns one [`InputBuffer`] per input and one [`OutputBuffer`]
//! per output of its type, indexed by the static layout in
//! [`scad_chip::units`]. Full, empty and no-packet states are plain boolean
//! queries; pushing past them is a protocol error.

mod input;
mod output;

pub use input::InputBuffer;
pub use output::OutputBuffer;

use crate::error::{Result, RuntimeError};
use crate::manager::{BufferView, Effect};
use scad_chip::{BufferAddress, UnitType};
use std::num::NonZeroU8;

/// All buffers of one unit
#[derive(Debug, Clone)]
pub struct UnitBuffers {
    unit: u8,
    inputs: Vec<InputBuffer>,
    outputs: Vec<OutputBuffer>,
}

impl UnitBuffers {
    /// Buffers for unit `unit` of type `unit_type`
    pub fn for_unit(unit: u8, unit_type: UnitType, depth: NonZeroU8) -> Self {
        Self {
            unit,
            inputs: unit_type.inputs().iter().map(|_| InputBuffer::new(depth)).collect(),
            outputs: unit_type.outputs().iter().map(|_| OutputBuffer::new(depth)).collect(),
        }
    }

    /// Input buffer by index
    pub fn input(&self, buffer: u8) -> Option<&InputBuffer> {
        self.inputs.get(usize::from(buffer))
    }

    /// Mutable input buffer by index
    pub fn input_mut(&mut self, buffer: u8) -> Option<&mut InputBuffer> {
        self.inputs.get_mut(usize::from(buffer))
    }

    /// Output buffer by index
    pub fn output(&self, buffer: u8) -> Option<&OutputBuffer> {
        self.outputs.get(usize::from(buffer))
    }

    /// Mutable output buffer by index
    pub fn output_mut(&mut self, buffer: u8) -> Option<&mut OutputBuffer> {
        self.outputs.get_mut(usize::from(buffer))
    }

    /// Input buffers in index order
    pub fn inputs_mut(&mut self) -> impl Iterator<Item = &mut InputBuffer> {
        self.inputs.iter_mut()
    }

    /// Output buffers with their own addresses
    pub fn outputs_mut(&mut self) -> impl Iterator<Item = (BufferAddress, &mut OutputBuffer)> {
        let unit = self.unit;
        self.outputs.iter_mut().zip(0u8..).map(move |(b, i)| (BufferAddress::new(unit, i), b))
    }

    /// Consume markers at the head of every input; returns whether any was taken
    pub fn drain_markers(&mut self) -> bool {
        let mut taken = false;
        for input in &mut self.inputs {
            while input.pop_marker() {
                taken = true;
            }
        }
        taken
    }

    /// Apply a manager effect
    ///
    /// # Errors
    ///
    /// Returns error if the effect names a buffer this unit lacks or the
    /// target stream is full.
    pub fn apply(&mut self, effect: &Effect) -> Result<()> {
        let unit = self.unit;
        let missing = |buffer| RuntimeError::UnknownBuffer {
            address: BufferAddress::new(unit, buffer),
        };

        match *effect {
            Effect::RegisterSource { buffer, source } => self
                .input_mut(buffer)
                .ok_or_else(|| missing(buffer))?
                .push_source(source),
            Effect::WriteImmediate { buffer, value } => self
                .input_mut(buffer)
                .ok_or_else(|| missing(buffer))?
                .push_immediate(value),
            Effect::PushDestination {
                buffer,
                destination,
            } => self
                .output_mut(buffer)
                .ok_or_else(|| missing(buffer))?
                .push_destination(destination),
        }
    }

    /// Empty every buffer
    pub fn clear(&mut self) {
        self.inputs.iter_mut().for_each(InputBuffer::clear);
        self.outputs.iter_mut().for_each(OutputBuffer::clear);
    }
}

impl BufferView for UnitBuffers {
    fn can_apply(&self, effect: &Effect) -> bool {
        // Missing buffers report ready so `apply` surfaces the error
        match *effect {
            Effect::RegisterSource { buffer, .. } | Effect::WriteImmediate { buffer, .. } => {
                self.input(buffer).map_or(true, |b| !b.full())
            }
            Effect::PushDestination { buffer, .. } => self.output(buffer).map_or(true, |b| !b.to_full()),
        }
    }
}
