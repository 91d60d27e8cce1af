//! Input buffer: source registrations and the values that fill them

use crate::error::{Result, RuntimeError, Stream};
use scad_chip::{BufferAddress, Registration, ScadValue};
use std::collections::VecDeque;
use std::num::NonZeroU8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Expect(BufferAddress),
    Marker,
    Immediate,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    source: Source,
    value: Option<ScadValue>,
}

/// Input side of a unit buffer
///
/// Holds up to `depth` slots in arrival order. A slot is opened by a
/// source registration and later filled by the value from that source;
/// immediates open and fill a slot in one go. Values are consumed strictly
/// in registration order, so a slot whose value is still in flight blocks
/// the slots behind it.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    depth: NonZeroU8,
    slots: VecDeque<Slot>,
}

impl InputBuffer {
    /// Empty buffer of the given depth
    pub fn new(depth: NonZeroU8) -> Self {
        Self {
            depth,
            slots: VecDeque::with_capacity(usize::from(depth.get())),
        }
    }

    /// Configured depth
    pub const fn depth(&self) -> NonZeroU8 {
        self.depth
    }

    /// Occupied slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True if no further registration fits
    pub fn full(&self) -> bool {
        self.slots.len() >= usize::from(self.depth.get())
    }

    /// Register an expected value from `source`
    ///
    /// `NULL` registers a synchronisation marker instead.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::BufferOverflow`] if the buffer is full.
    pub fn push_source(&mut self, source: BufferAddress) -> Result<()> {
        let source = match source.registration() {
            Registration::Expect(addr) => Source::Expect(addr),
            Registration::Marker => Source::Marker,
        };
        self.open(Slot { source, value: None })
    }

    /// Register and fill a slot with a constant
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::BufferOverflow`] if the buffer is full.
    pub fn push_immediate(&mut self, value: ScadValue) -> Result<()> {
        self.open(Slot {
            source: Source::Immediate,
            value: Some(value),
        })
    }

    fn open(&mut self, slot: Slot) -> Result<()> {
        if self.full() {
            return Err(RuntimeError::overflow(
                Stream::Sources,
                usize::from(self.depth.get()),
            ));
        }
        self.slots.push_back(slot);
        Ok(())
    }

    /// True if a slot registered for `from` is still waiting for its value
    pub fn expects(&self, from: BufferAddress) -> bool {
        self.waiting_slot(from).is_some()
    }

    fn waiting_slot(&self, from: BufferAddress) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.source == Source::Expect(from) && s.value.is_none())
    }

    /// Fill the oldest open slot registered for `from`
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnmatchedData`] if no such slot exists.
    pub fn push_data(&mut self, from: BufferAddress, value: ScadValue) -> Result<()> {
        let index = self
            .waiting_slot(from)
            .ok_or(RuntimeError::UnmatchedData { from })?;
        self.slots[index].value = Some(value);
        Ok(())
    }

    /// True if the oldest slot holds a value
    pub fn has_data(&self) -> bool {
        self.slots.front().is_some_and(|s| s.value.is_some())
    }

    /// True if the oldest slot is a synchronisation marker
    pub fn has_marker(&self) -> bool {
        self.slots.front().is_some_and(|s| s.source == Source::Marker)
    }

    /// Oldest value, if present
    pub fn peek(&self) -> Option<ScadValue> {
        self.slots.front().and_then(|s| s.value)
    }

    /// Consume the oldest value, retiring its slot
    pub fn pop(&mut self) -> Option<ScadValue> {
        let value = self.peek()?;
        self.slots.pop_front();
        Some(value)
    }

    /// Consume a marker at the head; returns whether one was there
    pub fn pop_marker(&mut self) -> bool {
        if self.has_marker() {
            self.slots.pop_front();
            true
        } else {
            false
        }
    }

    /// Drop every slot
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: BufferAddress = BufferAddress::new(0, 0);
    const B: BufferAddress = BufferAddress::new(1, 0);

    fn buffer(depth: u8) -> InputBuffer {
        InputBuffer::new(NonZeroU8::new(depth).unwrap())
    }

    #[test]
    fn test_full_counts_registrations() {
        let mut buf = buffer(2);
        buf.push_source(A).unwrap();
        assert!(!buf.full());
        buf.push_immediate(ScadValue::from_u64(1)).unwrap();
        assert!(buf.full());
        assert_eq!(
            buf.push_source(B),
            Err(RuntimeError::overflow(Stream::Sources, 2))
        );
    }

    #[test]
    fn test_fill_then_drain_fifo() {
        let mut buf = buffer(4);
        for _ in 0..4 {
            buf.push_source(A).unwrap();
        }
        assert!(buf.full());
        assert!(!buf.has_data());

        for v in 10..14 {
            buf.push_data(A, ScadValue::from_u64(v)).unwrap();
        }
        let drained: Vec<u64> = std::iter::from_fn(|| buf.pop()).map(ScadValue::as_u64).collect();
        assert_eq!(drained, vec![10, 11, 12, 13]);
        assert!(!buf.full());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_out_of_order_arrival_keeps_registration_order() {
        let mut buf = buffer(4);
        buf.push_source(A).unwrap();
        buf.push_source(B).unwrap();

        buf.push_data(B, ScadValue::from_u64(20)).unwrap();
        assert!(!buf.has_data(), "head slot still waits for A");

        buf.push_data(A, ScadValue::from_u64(10)).unwrap();
        assert_eq!(buf.pop(), Some(ScadValue::from_u64(10)));
        assert_eq!(buf.pop(), Some(ScadValue::from_u64(20)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_same_source_fills_oldest_first() {
        let mut buf = buffer(4);
        buf.push_source(A).unwrap();
        buf.push_source(A).unwrap();
        buf.push_data(A, ScadValue::from_u64(1)).unwrap();
        buf.push_data(A, ScadValue::from_u64(2)).unwrap();
        assert_eq!(buf.pop(), Some(ScadValue::from_u64(1)));
        assert_eq!(buf.pop(), Some(ScadValue::from_u64(2)));
    }

    #[test]
    fn test_unmatched_data_rejected() {
        let mut buf = buffer(2);
        assert_eq!(
            buf.push_data(A, ScadValue::ZERO),
            Err(RuntimeError::UnmatchedData { from: A })
        );

        buf.push_source(A).unwrap();
        buf.push_data(A, ScadValue::ZERO).unwrap();
        assert!(!buf.expects(A));
        assert!(buf.push_data(A, ScadValue::ZERO).is_err());
    }

    #[test]
    fn test_null_registration_is_marker() {
        let mut buf = buffer(2);
        buf.push_source(BufferAddress::NULL).unwrap();
        buf.push_immediate(ScadValue::from_u64(3)).unwrap();

        assert!(buf.has_marker());
        assert!(!buf.has_data());
        assert_eq!(buf.pop(), None);
        assert!(!buf.expects(BufferAddress::NULL));

        assert!(buf.pop_marker());
        assert!(!buf.pop_marker());
        assert_eq!(buf.peek(), Some(ScadValue::from_u64(3)));
    }
}
