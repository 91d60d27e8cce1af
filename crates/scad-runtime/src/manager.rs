//! Buffer/channel managers
//!
//! Each unit has two managers, one per side. A manager receives move
//! instructions from the control unit into a small inbox, holds at most one
//! of them pending, and applies it to the unit's buffers once the target
//! buffer has room:
//!
//! ```text
//! Idle ── fetch ──▶ Pending(instr) ── target full ──▶ Pending(instr)
//!                        │
//!                        └── target ready ──▶ Idle + Effect
//! ```
//!
//! A full target keeps the instruction pending, which keeps the inbox from
//! draining, which stalls dispatch in the control unit. That is the only
//! backpressure path.

use crate::error::{Result, RuntimeError, Stream};
use scad_chip::{BufferAddress, Instruction, ScadValue};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Side of the unit a manager serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Registers sources and immediates in input buffers
    Input,
    /// Queues destination tags in output buffers
    Output,
}

/// Change a manager makes to its unit's buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Expect a value from `source` at input `buffer`
    RegisterSource {
        /// Input buffer index
        buffer: u8,
        /// Expected sender; `NULL` registers a marker
        source: BufferAddress,
    },
    /// Write a constant into input `buffer`
    WriteImmediate {
        /// Input buffer index
        buffer: u8,
        /// Constant
        value: ScadValue,
    },
    /// Send the next value of output `buffer` to `destination`
    PushDestination {
        /// Output buffer index
        buffer: u8,
        /// Receiver; `NULL` discards
        destination: BufferAddress,
    },
}

impl Effect {
    /// Effect of `instruction` on unit `unit` seen from `role`, if any
    pub fn of(role: Role, unit: u8, instruction: &Instruction) -> Option<Self> {
        match (role, *instruction) {
            (Role::Input, Instruction::Move { from, to }) if to.unit == unit && !to.is_null() => {
                Some(Self::RegisterSource {
                    buffer: to.buffer,
                    source: from,
                })
            }
            (Role::Input, Instruction::MoveImmediate { value, to }) if to.unit == unit && !to.is_null() => {
                Some(Self::WriteImmediate {
                    buffer: to.buffer,
                    value,
                })
            }
            (Role::Output, Instruction::Move { from, to }) if from.unit == unit && !from.is_null() => {
                Some(Self::PushDestination {
                    buffer: from.buffer,
                    destination: to,
                })
            }
            _ => None,
        }
    }
}

/// Read-only readiness of a unit's buffers
pub trait BufferView {
    /// True if `effect` can be applied without overflowing
    fn can_apply(&self, effect: &Effect) -> bool;
}

/// Manager state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManagerState {
    /// Nothing held
    #[default]
    Idle,
    /// Holding one instruction until its target has room
    Pending(Instruction),
}

/// Outcome of one manager step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State after the step
    pub state: ManagerState,
    /// Effect to apply, if the pending instruction completed
    pub effect: Option<Effect>,
    /// True if anything changed
    pub progressed: bool,
}

impl ManagerState {
    /// Advance one step
    ///
    /// Idle fetches; pending applies if `view` has room. Instructions that
    /// do not concern this unit and side are dropped.
    pub fn step<V, F>(self, role: Role, unit: u8, view: &V, fetch: F) -> Transition
    where
        V: BufferView + ?Sized,
        F: FnOnce() -> Option<Instruction>,
    {
        match self {
            Self::Idle => match fetch() {
                Some(instruction) => Transition {
                    state: Self::Pending(instruction),
                    effect: None,
                    progressed: true,
                },
                None => Transition {
                    state: Self::Idle,
                    effect: None,
                    progressed: false,
                },
            },
            Self::Pending(instruction) => match Effect::of(role, unit, &instruction) {
                None => {
                    warn!("Unit {} {:?} manager dropped misrouted: {}", unit, role, instruction);
                    Transition {
                        state: Self::Idle,
                        effect: None,
                        progressed: true,
                    }
                }
                Some(effect) if view.can_apply(&effect) => Transition {
                    state: Self::Idle,
                    effect: Some(effect),
                    progressed: true,
                },
                Some(_) => Transition {
                    state: self,
                    effect: None,
                    progressed: false,
                },
            },
        }
    }
}

/// Manager for one side of one unit
#[derive(Debug, Clone)]
pub struct BufferManager {
    role: Role,
    unit: u8,
    state: ManagerState,
    inbox: VecDeque<Instruction>,
    capacity: usize,
}

impl BufferManager {
    /// Manager with an inbox of `capacity` instructions
    pub fn new(role: Role, unit: u8, capacity: usize) -> Self {
        Self {
            role,
            unit,
            state: ManagerState::Idle,
            inbox: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Side served
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Current state
    pub const fn state(&self) -> ManagerState {
        self.state
    }

    /// True if another instruction fits in the inbox
    pub fn can_accept(&self) -> bool {
        self.inbox.len() < self.capacity
    }

    /// True if nothing is queued or pending
    pub fn is_idle(&self) -> bool {
        self.state == ManagerState::Idle && self.inbox.is_empty()
    }

    /// Queue an instruction
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::BufferOverflow`] if the inbox is full.
    pub fn enqueue(&mut self, instruction: Instruction) -> Result<()> {
        if !self.can_accept() {
            return Err(RuntimeError::overflow(Stream::Instructions, self.capacity));
        }
        self.inbox.push_back(instruction);
        Ok(())
    }

    /// Run one step against the unit's buffers; returns whether anything changed
    ///
    /// # Errors
    ///
    /// Returns error if applying the effect fails.
    pub fn step(&mut self, buffers: &mut crate::buffer::UnitBuffers) -> Result<bool> {
        let inbox = &mut self.inbox;
        let transition = self.state.step(self.role, self.unit, &*buffers, || inbox.pop_front());
        self.state = transition.state;

        if let Some(effect) = transition.effect {
            debug!("Unit {} {:?} manager: {:?}", self.unit, self.role, effect);
            buffers.apply(&effect)?;
        }
        Ok(transition.progressed)
    }

    /// Drop queued and pending instructions
    pub fn reset(&mut self) {
        self.state = ManagerState::Idle;
        self.inbox.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Room(bool);

    impl BufferView for Room {
        fn can_apply(&self, _: &Effect) -> bool {
            self.0
        }
    }

    const MOVE: Instruction = Instruction::Move {
        from: BufferAddress::new(1, 0),
        to: BufferAddress::new(2, 1),
    };

    #[test]
    fn test_effect_routing() {
        assert_eq!(
            Effect::of(Role::Input, 2, &MOVE),
            Some(Effect::RegisterSource {
                buffer: 1,
                source: BufferAddress::new(1, 0)
            })
        );
        assert_eq!(
            Effect::of(Role::Output, 1, &MOVE),
            Some(Effect::PushDestination {
                buffer: 0,
                destination: BufferAddress::new(2, 1)
            })
        );
        assert_eq!(Effect::of(Role::Input, 1, &MOVE), None);
        assert_eq!(
            Effect::of(Role::Input, 0, &Instruction::MovePc { target: ScadValue::ZERO }),
            None
        );
    }

    #[test]
    fn test_idle_fetches_then_applies() {
        let t = ManagerState::Idle.step(Role::Input, 2, &Room(true), || Some(MOVE));
        assert_eq!(t.state, ManagerState::Pending(MOVE));
        assert_eq!(t.effect, None);

        let t = t.state.step(Role::Input, 2, &Room(true), || unreachable!());
        assert_eq!(t.state, ManagerState::Idle);
        assert!(t.effect.is_some());
    }

    #[test]
    fn test_full_target_keeps_pending() {
        let pending = ManagerState::Pending(MOVE);
        let t = pending.step(Role::Input, 2, &Room(false), || unreachable!());
        assert_eq!(t.state, pending);
        assert!(!t.progressed);
    }

    #[test]
    fn test_idle_with_empty_inbox_stays_idle() {
        let t = ManagerState::Idle.step(Role::Output, 0, &Room(true), || None);
        assert_eq!(t.state, ManagerState::Idle);
        assert!(!t.progressed);
    }

    #[test]
    fn test_inbox_capacity() {
        let mut mgr = BufferManager::new(Role::Input, 2, 1);
        mgr.enqueue(MOVE).unwrap();
        assert!(!mgr.can_accept());
        assert!(mgr.enqueue(MOVE).is_err());
        assert!(!mgr.is_idle());
    }

    #[test]
    fn test_inbox_overflow_reports_full_capacity() {
        let mut mgr = BufferManager::new(Role::Input, 2, 300);
        for _ in 0..300 {
            mgr.enqueue(MOVE).unwrap();
        }
        assert_eq!(
            mgr.enqueue(MOVE),
            Err(RuntimeError::overflow(Stream::Instructions, 300))
        );
    }
}
