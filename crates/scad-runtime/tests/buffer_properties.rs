//! Property tests for input buffer matching and interconnect ordering

use proptest::prelude::*;
use scad_chip::{BufferAddress, DataPacket, ScadValue};
use scad_runtime::interconnect::Endpoints;
use scad_runtime::{InputBuffer, Interconnect};
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU8;

fn sender(id: u8) -> BufferAddress {
    BufferAddress::new(id + 1, 0)
}

/// Registration order for up to four senders, plus an arrival interleaving
fn registrations() -> impl Strategy<Value = (Vec<u8>, Vec<usize>)> {
    prop::collection::vec(0u8..4, 1..=16).prop_flat_map(|senders| {
        let order: Vec<usize> = (0..senders.len()).collect();
        (Just(senders), Just(order).prop_shuffle())
    })
}

/// Values each sender owes, equal to the slot index they fill
fn per_sender(senders: &[u8]) -> HashMap<u8, VecDeque<u64>> {
    let mut queues: HashMap<u8, VecDeque<u64>> = HashMap::new();
    for (index, &id) in senders.iter().enumerate() {
        queues.entry(id).or_default().push_back(index as u64);
    }
    queues
}

struct Single(InputBuffer);

impl Endpoints for Single {
    fn input_mut(&mut self, address: BufferAddress) -> Option<&mut InputBuffer> {
        (address == BufferAddress::new(0, 0)).then_some(&mut self.0)
    }
}

proptest! {
    /// Values leave in registration order however arrivals interleave
    #[test]
    fn prop_pop_follows_registration_order((senders, arrival) in registrations()) {
        let mut input = InputBuffer::new(NonZeroU8::new(16).unwrap());
        for &id in &senders {
            input.push_source(sender(id)).unwrap();
        }

        let mut queues = per_sender(&senders);
        for position in arrival {
            let id = senders[position];
            let value = queues.get_mut(&id).and_then(VecDeque::pop_front).unwrap();
            input.push_data(sender(id), ScadValue::from_u64(value)).unwrap();
        }

        let popped: Vec<u64> = std::iter::from_fn(|| input.pop()).map(ScadValue::as_u64).collect();
        let expected: Vec<u64> = (0..senders.len() as u64).collect();
        prop_assert_eq!(popped, expected);
        prop_assert!(input.is_empty());
    }

    /// Packets are delivered whenever registrations exist, in per-sender FIFO order
    #[test]
    fn prop_interconnect_keeps_route_order((senders, arrival) in registrations()) {
        let to = BufferAddress::new(0, 0);
        let mut endpoints = Single(InputBuffer::new(NonZeroU8::new(16).unwrap()));
        let mut interconnect = Interconnect::new(senders.len());

        // Packets enter in arrival order, before any registration exists
        let mut queues = per_sender(&senders);
        for position in arrival {
            let id = senders[position];
            let value = queues.get_mut(&id).and_then(VecDeque::pop_front).unwrap();
            interconnect
                .send(DataPacket { value: ScadValue::from_u64(value), from: sender(id), to })
                .unwrap();
        }
        prop_assert_eq!(interconnect.deliver(&mut endpoints).unwrap(), 0);

        for &id in &senders {
            endpoints.0.push_source(sender(id)).unwrap();
        }
        let delivered = interconnect.deliver(&mut endpoints).unwrap();
        prop_assert_eq!(delivered, senders.len());
        prop_assert_eq!(interconnect.in_flight(), 0);

        let popped: Vec<u64> = std::iter::from_fn(|| endpoints.0.pop()).map(ScadValue::as_u64).collect();
        let expected: Vec<u64> = (0..senders.len() as u64).collect();
        prop_assert_eq!(popped, expected);
    }
}
