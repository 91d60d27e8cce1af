//! Output buffer: destination tags and values, paired on read

use crate::error::{Result, RuntimeError, Stream};
use scad_chip::{BufferAddress, DataPacket, ScadValue};
use std::collections::VecDeque;
use std::num::NonZeroU8;

/// Output side of a unit buffer
///
/// The unit's kernel writes values; the output manager writes destination
/// tags. The two streams fill at their own pace and are read together: the
/// n-th value goes to the n-th destination.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    depth: NonZeroU8,
    destinations: VecDeque<BufferAddress>,
    values: VecDeque<ScadValue>,
}

impl OutputBuffer {
    /// Empty buffer of the given depth
    pub fn new(depth: NonZeroU8) -> Self {
        let cap = usize::from(depth.get());
        Self {
            depth,
            destinations: VecDeque::with_capacity(cap),
            values: VecDeque::with_capacity(cap),
        }
    }

    /// True if the value stream is full
    pub fn data_full(&self) -> bool {
        self.values.len() >= usize::from(self.depth.get())
    }

    /// True if the destination stream is full
    pub fn to_full(&self) -> bool {
        self.destinations.len() >= usize::from(self.depth.get())
    }

    /// Append a value
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::BufferOverflow`] if the value stream is full.
    pub fn push_data(&mut self, value: ScadValue) -> Result<()> {
        if self.data_full() {
            return Err(RuntimeError::overflow(
                Stream::Values,
                usize::from(self.depth.get()),
            ));
        }
        self.values.push_back(value);
        Ok(())
    }

    /// Append a destination tag
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::BufferOverflow`] if the destination stream is full.
    pub fn push_destination(&mut self, destination: BufferAddress) -> Result<()> {
        if self.to_full() {
            return Err(RuntimeError::overflow(
                Stream::Destinations,
                usize::from(self.depth.get()),
            ));
        }
        self.destinations.push_back(destination);
        Ok(())
    }

    /// True if both streams have an entry at the read position
    pub fn has_packet(&self) -> bool {
        !self.destinations.is_empty() && !self.values.is_empty()
    }

    /// Pair the oldest value with the oldest destination, tagged as sent from `from`
    pub fn pop(&mut self, from: BufferAddress) -> Option<DataPacket> {
        if !self.has_packet() {
            return None;
        }
        let to = self.destinations.pop_front()?;
        let value = self.values.pop_front()?;
        Some(DataPacket { value, from, to })
    }

    /// Queued destination tags
    pub fn pending_destinations(&self) -> usize {
        self.destinations.len()
    }

    /// Queued values
    pub fn pending_values(&self) -> usize {
        self.values.len()
    }

    /// Drop both streams
    pub fn clear(&mut self) {
        self.destinations.clear();
        self.values.clear();
    }
}
