//! Instruction set and address model.
//!
//! ## Program record layout
//!
//! The execution substrate consumes a packed (no padding) array of
//! little-endian records:
//!
//! ```text
//! offset  size  field
//! 0       4     opcode (u32)
//! 4       8     union { BufferAddress from (2 bytes, rest zero) | ScadValue immediate }
//! 12      2     BufferAddress to (unit, buffer)
//! ```
//!
//! `ScadValue` stays untagged on the wire: the consuming opcode decides
//! whether the 8 bytes are an integer, a float or an `(opcode, count)` pair.

use std::fmt;

/// Size of one packed program record in bytes.
pub const INSTRUCTION_BYTES: usize = 14;

/// 8-byte value cell shared by every instruction kind.
///
/// Reinterpretable as `u64`, `f64` or `(opcode: u32, count: u32)`. There is
/// no stored discriminant; the views below read the same bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ScadValue(u64);

impl ScadValue {
    /// All bits zero.
    pub const ZERO: Self = Self(0);

    /// Value from an unsigned integer.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Value from a signed integer (two's complement bits).
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_i64(value: i64) -> Self {
        Self(value as u64)
    }

    /// Value from a float (IEEE-754 bits).
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        Self(value.to_bits())
    }

    /// Value encoding a downstream micro-op: low word opcode, high word count.
    #[must_use]
    pub const fn from_op(opcode: u32, count: u32) -> Self {
        Self(((count as u64) << 32) | opcode as u64)
    }

    /// View as unsigned integer.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// View as signed integer.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }

    /// View as float.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    /// View as `(opcode, count)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn as_op(self) -> (u32, u32) {
        (self.0 as u32, (self.0 >> 32) as u32)
    }

    /// Little-endian byte image.
    #[must_use]
    pub const fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// From a little-endian byte image.
    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for ScadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScadValue({:#018x})", self.0)
    }
}

impl From<u64> for ScadValue {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Communication endpoint: `(unit, buffer index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferAddress {
    /// Unit number.
    pub unit: u8,
    /// Buffer index within the unit (input or output side).
    pub buffer: u8,
}

impl BufferAddress {
    /// Reserved `255@255`: "discard" as a destination, "synchronisation
    /// marker" as an input registration. Never a real endpoint.
    pub const NULL: Self = Self { unit: u8::MAX, buffer: u8::MAX };

    /// Construct an address.
    #[must_use]
    pub const fn new(unit: u8, buffer: u8) -> Self {
        Self { unit, buffer }
    }

    /// True for the reserved address.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.unit == u8::MAX && self.buffer == u8::MAX
    }

    /// Output-side reading of this address.
    #[must_use]
    pub const fn route(self) -> Route {
        if self.is_null() {
            Route::Discard
        } else {
            Route::Deliver(self)
        }
    }

    /// Input-side reading of this address.
    #[must_use]
    pub const fn registration(self) -> Registration {
        if self.is_null() {
            Registration::Marker
        } else {
            Registration::Expect(self)
        }
    }
}

impl fmt::Display for BufferAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.unit, self.buffer)
    }
}

/// What an output buffer does with a destination tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Send the packet to this input buffer.
    Deliver(BufferAddress),
    /// Drop the packet (destination `null`).
    Discard,
}

/// What an input buffer slot is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A value sent from this output buffer.
    Expect(BufferAddress),
    /// Out-of-band synchronisation token; no data follows.
    Marker,
}

/// Instruction opcodes as they appear in the packed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    /// Transfer a value between two buffers at run time.
    Move = 1,
    /// Write a constant into an input buffer.
    MoveImmediate = 2,
    /// Write the program counter.
    MovePc = 3,
}

impl Opcode {
    /// Decode a raw opcode. `0` (invalid) and unknown values yield `None`.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Move),
            2 => Some(Self::MoveImmediate),
            3 => Some(Self::MovePc),
            _ => None,
        }
    }
}

/// The move instruction in its three forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `from -> to`. `to == NULL` discards the value.
    Move {
        /// Output buffer the value leaves from.
        from: BufferAddress,
        /// Input buffer the value arrives at.
        to: BufferAddress,
    },
    /// `$value -> to`.
    MoveImmediate {
        /// Constant, possibly an `(opcode, count)` micro-op.
        value: ScadValue,
        /// Input buffer written.
        to: BufferAddress,
    },
    /// `target -> pc`.
    MovePc {
        /// New program counter (instruction index).
        target: ScadValue,
    },
}

impl Instruction {
    /// Opcode of this instruction.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Move { .. } => Opcode::Move,
            Self::MoveImmediate { .. } => Opcode::MoveImmediate,
            Self::MovePc { .. } => Opcode::MovePc,
        }
    }

    /// Destination field; `NULL` for `MovePc`, where it is unused.
    #[must_use]
    pub const fn destination(&self) -> BufferAddress {
        match self {
            Self::Move { to, .. } | Self::MoveImmediate { to, .. } => *to,
            Self::MovePc { .. } => BufferAddress::NULL,
        }
    }

    /// Packed little-endian record.
    #[must_use]
    pub fn encode(&self) -> [u8; INSTRUCTION_BYTES] {
        let mut record = [0u8; INSTRUCTION_BYTES];
        record[0..4].copy_from_slice(&(self.opcode() as u32).to_le_bytes());
        match self {
            Self::Move { from, .. } => {
                record[4] = from.unit;
                record[5] = from.buffer;
            }
            Self::MoveImmediate { value, .. } | Self::MovePc { target: value } => {
                record[4..12].copy_from_slice(&value.to_le_bytes());
            }
        }
        let to = self.destination();
        record[12] = to.unit;
        record[13] = to.buffer;
        record
    }

    /// Decode a packed record. Returns `None` for an invalid opcode.
    #[must_use]
    pub fn decode(record: &[u8; INSTRUCTION_BYTES]) -> Option<Self> {
        let raw = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let mut union = [0u8; 8];
        union.copy_from_slice(&record[4..12]);
        let to = BufferAddress::new(record[12], record[13]);

        let instr = match Opcode::from_raw(raw)? {
            Opcode::Move => Self::Move { from: BufferAddress::new(union[0], union[1]), to },
            Opcode::MoveImmediate => Self::MoveImmediate { value: ScadValue::from_le_bytes(union), to },
            Opcode::MovePc => Self::MovePc { target: ScadValue::from_le_bytes(union) },
        };
        Some(instr)
    }
}

/// Listing format, one instruction per line.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move { from, to } => write!(f, "move {from} -> {to}"),
            Self::MoveImmediate { value, to } => {
                let (opcode, count) = value.as_op();
                write!(
                    f,
                    "move_immediate ${} or float ${} or $({opcode}, {count}) -> {to}",
                    value.as_u64(),
                    value.as_f64()
                )
            }
            Self::MovePc { target } => write!(f, "move_pc ${} -> pc", target.as_u64()),
        }
    }
}

/// Unit of exchange over the interconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPacket {
    /// Payload.
    pub value: ScadValue,
    /// Emitting output buffer.
    pub from: BufferAddress,
    /// Receiving input buffer.
    pub to: BufferAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_views_share_bits() {
        let v = ScadValue::from_op(2, 7);
        assert_eq!(v.as_op(), (2, 7));
        assert_eq!(v.as_u64(), (7u64 << 32) | 2);

        let f = ScadValue::from_f64(1.5);
        assert_eq!(f.as_u64(), 1.5f64.to_bits());
        assert!((f.as_f64() - 1.5).abs() < f64::EPSILON);

        assert_eq!(ScadValue::from_i64(-1).as_u64(), u64::MAX);
    }

    #[test]
    fn test_null_address_has_two_readings() {
        assert!(BufferAddress::NULL.is_null());
        assert_eq!(BufferAddress::NULL.route(), Route::Discard);
        assert_eq!(BufferAddress::NULL.registration(), Registration::Marker);

        let a = BufferAddress::new(3, 1);
        assert_eq!(a.route(), Route::Deliver(a));
        assert_eq!(a.registration(), Registration::Expect(a));
    }

    #[test]
    fn test_move_record_layout() {
        let instr = Instruction::Move {
            from: BufferAddress::new(1, 0),
            to: BufferAddress::new(2, 1),
        };
        let record = instr.encode();
        assert_eq!(&record[0..4], &1u32.to_le_bytes());
        assert_eq!(&record[4..6], &[1, 0]);
        assert!(record[6..12].iter().all(|&b| b == 0));
        assert_eq!(&record[12..14], &[2, 1]);
        assert_eq!(Instruction::decode(&record), Some(instr));
    }

    #[test]
    fn test_move_pc_writes_null_destination() {
        let record = Instruction::MovePc { target: ScadValue::from_u64(9) }.encode();
        assert_eq!(&record[12..14], &[255, 255]);
        assert_eq!(&record[4..12], &9u64.to_le_bytes());
    }

    #[test]
    fn test_invalid_opcode_does_not_decode() {
        let mut record = [0u8; INSTRUCTION_BYTES];
        assert_eq!(Instruction::decode(&record), None);
        record[0] = 4;
        assert_eq!(Instruction::decode(&record), None);
    }

    #[test]
    fn test_listing_format() {
        let m = Instruction::Move { from: BufferAddress::new(0, 0), to: BufferAddress::new(1, 0) };
        assert_eq!(m.to_string(), "move 0@0 -> 1@0");
        let pc = Instruction::MovePc { target: ScadValue::from_u64(3) };
        assert_eq!(pc.to_string(), "move_pc $3 -> pc");
    }
}
