//! Packet routing between units
//!
//! Packets leave output buffers in order and wait in flight until their
//! destination input buffer has registered their sender. A held packet
//! also holds every later packet on the same route, so values between one
//! output and one input never overtake each other. Packets addressed to
//! `NULL` are dropped on send.

use crate::buffer::InputBuffer;
use crate::error::{Result, RuntimeError, Stream};
use scad_chip::{BufferAddress, DataPacket, Route};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Access to input buffers by address
pub trait Endpoints {
    /// Input buffer at `address`, if it exists
    fn input_mut(&mut self, address: BufferAddress) -> Option<&mut InputBuffer>;
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterconnectStats {
    /// Packets written into input buffers
    pub delivered: u64,
    /// Packets dropped on a `NULL` destination
    pub discarded: u64,
}

/// Bounded in-flight packet store
#[derive(Debug, Clone)]
pub struct Interconnect {
    in_flight: VecDeque<DataPacket>,
    capacity: usize,
    stats: InterconnectStats,
}

impl Interconnect {
    /// Interconnect holding at most `capacity` packets in flight
    pub fn new(capacity: usize) -> Self {
        Self {
            in_flight: VecDeque::new(),
            capacity: capacity.max(1),
            stats: InterconnectStats::default(),
        }
    }

    /// True if another packet can be sent
    pub fn can_send(&self) -> bool {
        self.in_flight.len() < self.capacity
    }

    /// Packets in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Counters so far
    pub const fn stats(&self) -> InterconnectStats {
        self.stats
    }

    /// Accept a packet from an output buffer
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::BufferOverflow`] if the interconnect is full.
    pub fn send(&mut self, packet: DataPacket) -> Result<()> {
        match packet.to.route() {
            Route::Discard => {
                debug!("Discarded {:?} from {}", packet.value, packet.from);
                self.stats.discarded += 1;
                Ok(())
            }
            Route::Deliver(_) if !self.can_send() => {
                Err(RuntimeError::overflow(Stream::InFlight, self.capacity))
            }
            Route::Deliver(_) => {
                self.in_flight.push_back(packet);
                Ok(())
            }
        }
    }

    /// Deliver every packet whose destination expects it; returns how many
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownBuffer`] for a packet addressed to a
    /// buffer that does not exist.
    pub fn deliver<E: Endpoints + ?Sized>(&mut self, endpoints: &mut E) -> Result<usize> {
        let mut held = VecDeque::with_capacity(self.in_flight.len());
        let mut blocked: HashSet<(BufferAddress, BufferAddress)> = HashSet::new();
        let mut count = 0;

        while let Some(packet) = self.in_flight.pop_front() {
            let route = (packet.from, packet.to);
            if blocked.contains(&route) {
                held.push_back(packet);
                continue;
            }

            let Some(input) = endpoints.input_mut(packet.to) else {
                // Keep the remaining packets for inspection
                held.push_back(packet);
                held.extend(self.in_flight.drain(..));
                self.in_flight = held;
                return Err(RuntimeError::UnknownBuffer { address: packet.to });
            };

            if input.expects(packet.from) {
                input.push_data(packet.from, packet.value)?;
                debug!("Delivered {:?} {} -> {}", packet.value, packet.from, packet.to);
                count += 1;
            } else {
                blocked.insert(route);
                held.push_back(packet);
            }
        }

        self.in_flight = held;
        self.stats.delivered += count as u64;
        Ok(count)
    }

    /// Drop everything in flight and zero the counters
    pub fn reset(&mut self) {
        self.in_flight.clear();
        self.stats = InterconnectStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scad_chip::ScadValue;
    use std::collections::BTreeMap;
    use std::num::NonZeroU8;

    struct Inputs(BTreeMap<BufferAddress, InputBuffer>);

    impl Endpoints for Inputs {
        fn input_mut(&mut self, address: BufferAddress) -> Option<&mut InputBuffer> {
            self.0.get_mut(&address)
        }
    }

    const SRC: BufferAddress = BufferAddress::new(0, 0);
    const DST: BufferAddress = BufferAddress::new(1, 0);

    fn inputs() -> Inputs {
        let depth = NonZeroU8::new(4).unwrap();
        Inputs(BTreeMap::from([(DST, InputBuffer::new(depth))]))
    }

    fn packet(n: u64, to: BufferAddress) -> DataPacket {
        DataPacket {
            value: ScadValue::from_u64(n),
            from: SRC,
            to,
        }
    }

    #[test]
    fn test_null_destination_discards() {
        let mut ic = Interconnect::new(1);
        ic.send(packet(1, BufferAddress::NULL)).unwrap();
        ic.send(packet(2, BufferAddress::NULL)).unwrap();
        assert_eq!(ic.in_flight(), 0);
        assert_eq!(ic.stats().discarded, 2);
    }

    #[test]
    fn test_held_until_registered() {
        let mut ic = Interconnect::new(4);
        let mut inputs = inputs();
        ic.send(packet(1, DST)).unwrap();
        ic.send(packet(2, DST)).unwrap();

        assert_eq!(ic.deliver(&mut inputs).unwrap(), 0);
        assert_eq!(ic.in_flight(), 2);

        inputs.0.get_mut(&DST).unwrap().push_source(SRC).unwrap();
        assert_eq!(ic.deliver(&mut inputs).unwrap(), 1);
        assert_eq!(inputs.0[&DST].peek(), Some(ScadValue::from_u64(1)));

        inputs.0.get_mut(&DST).unwrap().push_source(SRC).unwrap();
        assert_eq!(ic.deliver(&mut inputs).unwrap(), 1);
        assert_eq!(ic.stats().delivered, 2);
    }

    #[test]
    fn test_capacity() {
        let mut ic = Interconnect::new(1);
        ic.send(packet(1, DST)).unwrap();
        assert!(!ic.can_send());
        assert_eq!(
            ic.send(packet(2, DST)),
            Err(RuntimeError::overflow(Stream::InFlight, 1))
        );

        let mut wide = Interconnect::new(1000);
        for v in 0..1000 {
            wide.send(packet(v, DST)).unwrap();
        }
        assert_eq!(
            wide.send(packet(0, DST)),
            Err(RuntimeError::overflow(Stream::InFlight, 1000))
        );
    }

    #[test]
    fn test_unknown_destination() {
        let mut ic = Interconnect::new(2);
        ic.send(packet(1, BufferAddress::new(7, 7))).unwrap();
        assert_eq!(
            ic.deliver(&mut inputs()),
            Err(RuntimeError::UnknownBuffer {
                address: BufferAddress::new(7, 7)
            })
        );
        assert_eq!(ic.in_flight(), 1);
    }
}
