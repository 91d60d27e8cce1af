//! Unit kernels
//!
//! One kernel per unit type. A kernel step does at most one element of
//! work and reports whether anything changed; a kernel never blocks, it
//! simply does nothing while its inputs are empty or its output is full.

use crate::buffer::{InputBuffer, UnitBuffers};
use crate::config::unit_parameter;
use crate::error::{Result, RuntimeError};
use scad_asm::UnitDescription;
use scad_chip::{BufferAddress, LsuOp, PuOp, ScadValue, UnitType};
use tracing::debug;

const IN0: u8 = 0;
const IN1: u8 = 1;
const OPC: u8 = 2;
const OUT: u8 = 0;

/// Behaviour and private state of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kernel {
    /// Collects values sent to the control unit
    Control,
    /// Load-store unit with the micro-op being executed
    LoadStore {
        /// Operation and remaining repetitions
        current: Option<(LsuOp, u32)>,
    },
    /// Arithmetic unit with the micro-op being executed
    Arithmetic {
        /// Operation and remaining repetitions
        current: Option<(PuOp, u32)>,
    },
    /// Appends incoming values to memory
    StreamIn {
        /// First word written
        offset: usize,
        /// Words written so far
        written: usize,
    },
    /// Streams a memory range out
    StreamOut {
        /// First word read
        offset: usize,
        /// Words to read
        count: usize,
        /// Words read so far
        emitted: usize,
    },
    /// Forwards values in order
    Reorder,
}

/// Memory and result sinks shared by all kernels
#[derive(Debug)]
pub struct KernelContext<'a> {
    /// Global memory
    pub memory: &'a mut [ScadValue],
    /// Values collected by the control unit
    pub results: &'a mut Vec<ScadValue>,
}

impl Kernel {
    /// Fresh kernel for a unit, reading its parameters
    ///
    /// Absent stream parameters default to zero.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidParameter`] if `offset` or `count` is
    /// present but not a non-negative integer.
    pub fn for_unit(unit: &UnitDescription) -> Result<Self> {
        let param = |key: &str| unit_parameter(unit, key).map(|v| v.unwrap_or(0));
        Ok(match unit.unit_type {
            UnitType::Control => Self::Control,
            UnitType::LoadStore => Self::LoadStore { current: None },
            UnitType::Arithmetic => Self::Arithmetic { current: None },
            UnitType::MemoryStreamIn => Self::StreamIn {
                offset: param("offset")?,
                written: 0,
            },
            UnitType::MemoryStreamOut => Self::StreamOut {
                offset: param("offset")?,
                count: param("count")?,
                emitted: 0,
            },
            UnitType::Reorder => Self::Reorder,
        })
    }

    /// Forget progress, keep parameters
    pub fn reset(&mut self) {
        match self {
            Self::LoadStore { current } => *current = None,
            Self::Arithmetic { current } => *current = None,
            Self::StreamIn { written, .. } => *written = 0,
            Self::StreamOut { emitted, .. } => *emitted = 0,
            Self::Control | Self::Reorder => {}
        }
    }

    /// True while a micro-op still has repetitions to run
    pub const fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::LoadStore { current: Some(_) } | Self::Arithmetic { current: Some(_) }
        )
    }

    /// Do one element of work
    ///
    /// # Errors
    ///
    /// Returns error on an invalid micro-op, a division by zero or a memory
    /// access out of bounds.
    pub fn step(&mut self, unit: u8, buffers: &mut UnitBuffers, ctx: &mut KernelContext<'_>) -> Result<bool> {
        let mut progressed = buffers.drain_markers();

        match self {
            Self::Control => {
                for input in buffers.inputs_mut() {
                    while let Some(value) = input.pop() {
                        debug!("Control unit {} received {:?}", unit, value);
                        ctx.results.push(value);
                        progressed = true;
                    }
                }
            }

            Self::Reorder => {
                if ready(buffers, IN0) && room(buffers) {
                    if let Some(value) = take(buffers, IN0) {
                        emit(buffers, unit, value)?;
                        progressed = true;
                    }
                }
            }

            Self::StreamIn { offset, written } => {
                if let Some(value) = take(buffers, IN0) {
                    let address = *offset + *written;
                    *word_mut(ctx.memory, unit, address as u64)? = value;
                    *written += 1;
                    progressed = true;
                }
            }

            Self::StreamOut {
                offset,
                count,
                emitted,
            } => {
                if *emitted < *count && room(buffers) {
                    let value = *word_mut(ctx.memory, unit, (*offset + *emitted) as u64)?;
                    emit(buffers, unit, value)?;
                    *emitted += 1;
                    progressed = true;
                }
            }

            Self::LoadStore { current } => {
                if current.is_none() {
                    if let Some((opcode, count)) = take(buffers, OPC).map(ScadValue::as_op) {
                        let op = LsuOp::from_raw(opcode).ok_or(RuntimeError::InvalidMicroOp {
                            unit,
                            unit_type: UnitType::LoadStore.config_name(),
                            opcode,
                        })?;
                        debug!("Unit {}: {} x{}", unit, op.token(), count);
                        *current = (count > 0).then_some((op, count));
                        progressed = true;
                    }
                }

                if let Some((op, remaining)) = *current {
                    if load_store(op, unit, buffers, ctx)? {
                        *current = (remaining > 1).then_some((op, remaining - 1));
                        progressed = true;
                    }
                }
            }

            Self::Arithmetic { current } => {
                if current.is_none() {
                    if let Some((opcode, count)) = take(buffers, OPC).map(ScadValue::as_op) {
                        let op = PuOp::from_raw(opcode).ok_or(RuntimeError::InvalidMicroOp {
                            unit,
                            unit_type: UnitType::Arithmetic.config_name(),
                            opcode,
                        })?;
                        debug!("Unit {}: {} x{}", unit, op.token(), count);
                        *current = (count > 0).then_some((op, count));
                        progressed = true;
                    }
                }

                if let Some((op, remaining)) = *current {
                    if ready(buffers, IN0) && ready(buffers, IN1) && room(buffers) {
                        if let (Some(a), Some(b)) = (take(buffers, IN0), take(buffers, IN1)) {
                            emit(buffers, unit, compute(op, a, b, unit)?)?;
                            *current = (remaining > 1).then_some((op, remaining - 1));
                            progressed = true;
                        }
                    }
                }
            }
        }

        Ok(progressed)
    }
}

fn load_store(op: LsuOp, unit: u8, buffers: &mut UnitBuffers, ctx: &mut KernelContext<'_>) -> Result<bool> {
    match op {
        LsuOp::Load => {
            if !(ready(buffers, IN0) && room(buffers)) {
                return Ok(false);
            }
            let Some(address) = take(buffers, IN0) else {
                return Ok(false);
            };
            let value = *word_mut(ctx.memory, unit, address.as_u64())?;
            emit(buffers, unit, value)?;
        }
        LsuOp::Store => {
            if !(ready(buffers, IN0) && ready(buffers, IN1)) {
                return Ok(false);
            }
            let (Some(address), Some(value)) = (take(buffers, IN0), take(buffers, IN1)) else {
                return Ok(false);
            };
            *word_mut(ctx.memory, unit, address.as_u64())? = value;
        }
    }
    Ok(true)
}

/// Apply an arithmetic micro-op to one operand pair
///
/// # Errors
///
/// Returns [`RuntimeError::DivisionByZero`] for a zero divisor.
pub fn compute(op: PuOp, a: ScadValue, b: ScadValue, unit: u8) -> Result<ScadValue> {
    let (na, nb) = (a.as_u64(), b.as_u64());
    let (za, zb) = (a.as_i64(), b.as_i64());
    let (ba, bb) = (na != 0, nb != 0);
    let flag = |c: bool| ScadValue::from_u64(u64::from(c));
    let by_zero = RuntimeError::DivisionByZero { unit };

    let value = match op {
        PuOp::AddN => ScadValue::from_u64(na.wrapping_add(nb)),
        PuOp::SubN => ScadValue::from_u64(na.wrapping_sub(nb)),
        PuOp::MulN => ScadValue::from_u64(na.wrapping_mul(nb)),
        PuOp::DivN => ScadValue::from_u64(na.checked_div(nb).ok_or(by_zero)?),
        PuOp::ModN => ScadValue::from_u64(na.checked_rem(nb).ok_or(by_zero)?),
        PuOp::LesN => flag(na < nb),
        PuOp::LeqN => flag(na <= nb),
        PuOp::EqqN => flag(na == nb),
        PuOp::NeqN => flag(na != nb),
        PuOp::AddZ => ScadValue::from_i64(za.wrapping_add(zb)),
        PuOp::SubZ => ScadValue::from_i64(za.wrapping_sub(zb)),
        PuOp::MulZ => ScadValue::from_i64(za.wrapping_mul(zb)),
        PuOp::DivZ if zb == 0 => return Err(by_zero),
        PuOp::DivZ => ScadValue::from_i64(za.wrapping_div(zb)),
        PuOp::ModZ if zb == 0 => return Err(by_zero),
        PuOp::ModZ => ScadValue::from_i64(za.wrapping_rem(zb)),
        PuOp::LesZ => flag(za < zb),
        PuOp::LeqZ => flag(za <= zb),
        PuOp::EqqZ => flag(za == zb),
        PuOp::NeqZ => flag(za != zb),
        PuOp::AndB => flag(ba && bb),
        PuOp::OrB => flag(ba || bb),
        PuOp::EqqB => flag(ba == bb),
        PuOp::NeqB => flag(ba != bb),
    };
    Ok(value)
}

fn ready(buffers: &UnitBuffers, index: u8) -> bool {
    buffers.input(index).is_some_and(InputBuffer::has_data)
}

fn room(buffers: &UnitBuffers) -> bool {
    buffers.output(OUT).is_some_and(|b| !b.data_full())
}

fn take(buffers: &mut UnitBuffers, index: u8) -> Option<ScadValue> {
    buffers.input_mut(index).and_then(InputBuffer::pop)
}

fn emit(buffers: &mut UnitBuffers, unit: u8, value: ScadValue) -> Result<()> {
    buffers
        .output_mut(OUT)
        .ok_or(RuntimeError::UnknownBuffer {
            address: BufferAddress::new(unit, OUT),
        })?
        .push_data(value)
}

fn word_mut(memory: &mut [ScadValue], unit: u8, address: u64) -> Result<&mut ScadValue> {
    let len = memory.len();
    usize::try_from(address)
        .ok()
        .and_then(|a| memory.get_mut(a))
        .ok_or(RuntimeError::out_of_bounds(unit, address, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU8;

    fn n(v: u64) -> ScadValue {
        ScadValue::from_u64(v)
    }

    fn z(v: i64) -> ScadValue {
        ScadValue::from_i64(v)
    }

    #[test]
    fn test_natural_ops_wrap() {
        assert_eq!(compute(PuOp::AddN, n(u64::MAX), n(2), 0), Ok(n(1)));
        assert_eq!(compute(PuOp::SubN, n(0), n(1), 0), Ok(n(u64::MAX)));
        assert_eq!(compute(PuOp::DivN, n(7), n(2), 0), Ok(n(3)));
        assert_eq!(compute(PuOp::ModN, n(7), n(2), 0), Ok(n(1)));
    }

    #[test]
    fn test_integer_ops_are_signed() {
        assert_eq!(compute(PuOp::AddZ, z(-3), z(1), 0), Ok(z(-2)));
        assert_eq!(compute(PuOp::DivZ, z(-7), z(2), 0), Ok(z(-3)));
        assert_eq!(compute(PuOp::LesZ, z(-1), z(0), 0), Ok(n(1)));
        // Same bits compared unsigned
        assert_eq!(compute(PuOp::LesN, z(-1), z(0), 0), Ok(n(0)));
        assert_eq!(compute(PuOp::DivZ, z(i64::MIN), z(-1), 0), Ok(z(i64::MIN)));
    }

    #[test]
    fn test_boolean_ops() {
        assert_eq!(compute(PuOp::AndB, n(2), n(5), 0), Ok(n(1)));
        assert_eq!(compute(PuOp::OrB, n(0), n(0), 0), Ok(n(0)));
        assert_eq!(compute(PuOp::EqqB, n(3), n(9), 0), Ok(n(1)));
        assert_eq!(compute(PuOp::NeqB, n(0), n(9), 0), Ok(n(1)));
    }

    #[test]
    fn test_division_by_zero() {
        for op in [PuOp::DivN, PuOp::ModN, PuOp::DivZ, PuOp::ModZ] {
            assert_eq!(
                compute(op, n(1), n(0), 4),
                Err(RuntimeError::DivisionByZero { unit: 4 })
            );
        }
    }

    #[test]
    fn test_arithmetic_unit_repeats_op() {
        let depth = NonZeroU8::new(4).unwrap();
        let mut buffers = UnitBuffers::for_unit(1, UnitType::Arithmetic, depth);
        let mut memory: [ScadValue; 0] = [];
        let mut results = Vec::new();
        let mut ctx = KernelContext {
            memory: &mut memory,
            results: &mut results,
        };

        let write = |buffers: &mut UnitBuffers, index, value| {
            buffers.input_mut(index).unwrap().push_immediate(value).unwrap();
        };
        write(&mut buffers, OPC, ScadValue::from_op(PuOp::MulN as u32, 2));
        write(&mut buffers, IN0, n(3));
        write(&mut buffers, IN1, n(4));
        write(&mut buffers, IN0, n(5));
        write(&mut buffers, IN1, n(6));

        let mut kernel = Kernel::Arithmetic { current: None };
        assert!(kernel.step(1, &mut buffers, &mut ctx).unwrap());
        assert!(kernel.is_busy());
        assert!(kernel.step(1, &mut buffers, &mut ctx).unwrap());
        assert!(!kernel.is_busy());
        assert!(!kernel.step(1, &mut buffers, &mut ctx).unwrap());

        let out = buffers.output_mut(OUT).unwrap();
        out.push_destination(BufferAddress::NULL).unwrap();
        out.push_destination(BufferAddress::NULL).unwrap();
        let from = BufferAddress::new(1, 0);
        assert_eq!(out.pop(from).map(|p| p.value), Some(n(12)));
        assert_eq!(out.pop(from).map(|p| p.value), Some(n(30)));
    }

    #[test]
    fn test_invalid_lsu_opcode() {
        let depth = NonZeroU8::new(1).unwrap();
        let mut buffers = UnitBuffers::for_unit(2, UnitType::LoadStore, depth);
        buffers
            .input_mut(OPC)
            .unwrap()
            .push_immediate(ScadValue::from_op(9, 1))
            .unwrap();

        let mut memory = [ScadValue::ZERO; 4];
        let mut results = Vec::new();
        let mut ctx = KernelContext {
            memory: &mut memory,
            results: &mut results,
        };
        let err = Kernel::LoadStore { current: None }
            .step(2, &mut buffers, &mut ctx)
            .unwrap_err();
        assert_eq!(
            err,
            RuntimeError::InvalidMicroOp {
                unit: 2,
                unit_type: "lsu",
                opcode: 9
            }
        );
    }

    #[test]
    fn test_store_out_of_bounds() {
        let depth = NonZeroU8::new(1).unwrap();
        let mut buffers = UnitBuffers::for_unit(0, UnitType::LoadStore, depth);
        for (index, value) in [(OPC, ScadValue::from_op(LsuOp::Store as u32, 1)), (IN0, n(8)), (IN1, n(1))] {
            buffers.input_mut(index).unwrap().push_immediate(value).unwrap();
        }

        let mut memory = [ScadValue::ZERO; 8];
        let mut results = Vec::new();
        let mut ctx = KernelContext {
            memory: &mut memory,
            results: &mut results,
        };
        let err = Kernel::LoadStore { current: None }
            .step(0, &mut buffers, &mut ctx)
            .unwrap_err();
        assert_eq!(err, RuntimeError::out_of_bounds(0, 8, 8));
    }

    fn stream_units(count: &str) -> scad_asm::ProcessorDescription {
        scad_asm::ProcessorDescription::parse(&format!(
            r#"
            [processor]
            name = "k"
            buffer_depth = 1

            [[interconnect]]
            name = "ic"
            unit_count = 2

            [[unit]]
            name = "src"
            type = "memory_stream_out"
            number = 0
            [unit.parameters]
            offset = 4
            count = {count}

            [[unit]]
            name = "sink"
            type = "memory_stream_in"
            number = 1
            "#
        ))
        .unwrap()
    }

    #[test]
    fn test_stream_parameters() {
        let topo = stream_units("3");
        assert_eq!(
            Kernel::for_unit(topo.unit("src").unwrap()),
            Ok(Kernel::StreamOut {
                offset: 4,
                count: 3,
                emitted: 0
            })
        );
        assert_eq!(
            Kernel::for_unit(topo.unit("sink").unwrap()),
            Ok(Kernel::StreamIn { offset: 0, written: 0 })
        );
    }

    #[test]
    fn test_malformed_stream_count_rejected() {
        let topo = stream_units(r#""two""#);
        assert_eq!(
            Kernel::for_unit(topo.unit("src").unwrap()),
            Err(RuntimeError::invalid_parameter("src", "count", "two"))
        );
    }
}
