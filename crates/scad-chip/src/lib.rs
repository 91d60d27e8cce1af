//! Machine model for the SCAD dataflow processor.
//!
//! This crate has **no dependencies** and **no I/O**. It is a pure model of
//! the machine: the 8-byte value cell, buffer addresses, the three-opcode
//! instruction set, the packed program record, the fixed per-type buffer
//! layouts and the micro-op tables understood by the arithmetic and
//! load-store units.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`isa`] | `ScadValue`, `BufferAddress`, `Instruction`, `DataPacket`, packed encoding |
//! | [`units`] | Unit types and their static buffer layout table |
//! | [`ops`] | LSU / PU micro-op opcodes and their assembly tokens |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod isa;
pub mod ops;
pub mod units;

pub use isa::{
    BufferAddress, DataPacket, Instruction, Opcode, Registration, Route, ScadValue,
    INSTRUCTION_BYTES,
};
pub use ops::{LsuOp, MicroOp, PuOp};
pub use units::{Direction, UnitType};
