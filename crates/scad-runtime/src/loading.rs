//! Program images
//!
//! An image is the packed record stream the execution substrate consumes:
//! one [`INSTRUCTION_BYTES`]-byte little-endian record per instruction, no
//! header and no padding.

use crate::error::{Result, RuntimeError};
use bytes::{BufMut, Bytes, BytesMut};
use scad_asm::ProcessorDescription;
use scad_chip::{BufferAddress, Direction, Instruction, INSTRUCTION_BYTES};
use tracing::{debug, info};

/// Packed program ready for loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    data: Bytes,
    instruction_count: usize,
    checksum: u32,
}

impl ProgramImage {
    /// Pack an instruction stream
    pub fn new(instructions: &[Instruction]) -> Self {
        let mut buf = BytesMut::with_capacity(instructions.len() * INSTRUCTION_BYTES);
        for instruction in instructions {
            buf.put_slice(&instruction.encode());
        }
        Self::packed(buf.freeze(), instructions.len())
    }

    /// Wrap raw image bytes
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidImage`] if the length is not a whole
    /// number of records or a record has an invalid opcode.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.len() % INSTRUCTION_BYTES != 0 {
            return Err(RuntimeError::invalid_image(format!(
                "{} bytes is not a multiple of the {INSTRUCTION_BYTES}-byte record",
                data.len()
            )));
        }

        let count = data.len() / INSTRUCTION_BYTES;
        let image = Self::packed(data, count);
        image.instructions()?;
        Ok(image)
    }

    fn packed(data: Bytes, instruction_count: usize) -> Self {
        let checksum = data
            .iter()
            .fold(0u32, |acc, &byte| acc.wrapping_add(u32::from(byte)));

        debug!(
            "Image: {} instructions, {} bytes, checksum: 0x{:08x}",
            instruction_count,
            data.len(),
            checksum
        );

        Self {
            data,
            instruction_count,
            checksum,
        }
    }

    /// Decode every record
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidImage`] naming the first bad record.
    pub fn instructions(&self) -> Result<Vec<Instruction>> {
        self.data
            .chunks_exact(INSTRUCTION_BYTES)
            .enumerate()
            .map(|(index, chunk)| {
                let mut record = [0u8; INSTRUCTION_BYTES];
                record.copy_from_slice(chunk);
                Instruction::decode(&record).ok_or_else(|| {
                    let opcode = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
                    RuntimeError::invalid_image(format!("record {index}: invalid opcode {opcode}"))
                })
            })
            .collect()
    }

    /// Check every address against `topology`
    ///
    /// Move sources must be output buffers, destinations input buffers;
    /// `NULL` is accepted on both sides.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownBuffer`] for the first address that
    /// names no buffer, or an image error if a record does not decode.
    pub fn validate_for(&self, topology: &ProcessorDescription) -> Result<()> {
        let check = |address: BufferAddress, direction| {
            if address.is_null() || topology.has_endpoint(address, direction) {
                Ok(())
            } else {
                Err(RuntimeError::UnknownBuffer { address })
            }
        };

        for instruction in self.instructions()? {
            match instruction {
                Instruction::Move { from, to } => {
                    check(from, Direction::Output)?;
                    check(to, Direction::Input)?;
                }
                Instruction::MoveImmediate { to, .. } => check(to, Direction::Input)?,
                Instruction::MovePc { .. } => {}
            }
        }

        info!(
            "Image validated for '{}' ({} instructions)",
            topology.name(),
            self.instruction_count
        );
        Ok(())
    }

    /// Number of instructions
    pub const fn len(&self) -> usize {
        self.instruction_count
    }

    /// True for an empty program
    pub const fn is_empty(&self) -> bool {
        self.instruction_count == 0
    }

    /// Wrapping byte sum
    pub const fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scad_chip::ScadValue;

    fn topology() -> ProcessorDescription {
        ProcessorDescription::parse(
            r#"
            [processor]
            name = "t"
            buffer_depth = 2

            [[interconnect]]
            name = "ic"
            unit_count = 2

            [[unit]]
            name = "p"
            type = "pu"
            number = 1
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_pack_and_decode() {
        let program = vec![
            Instruction::MoveImmediate {
                value: ScadValue::from_u64(5),
                to: BufferAddress::new(1, 0),
            },
            Instruction::MovePc { target: ScadValue::ZERO },
        ];
        let image = ProgramImage::new(&program);
        assert_eq!(image.len(), 2);
        assert_eq!(image.as_bytes().len(), 2 * INSTRUCTION_BYTES);

        let reloaded = ProgramImage::from_bytes(image.as_bytes().to_vec()).unwrap();
        assert_eq!(reloaded, image);
        assert_eq!(reloaded.instructions().unwrap(), program);
    }

    #[test]
    fn test_checksum_is_byte_sum() {
        let image = ProgramImage::new(&[Instruction::MovePc { target: ScadValue::from_u64(3) }]);
        // opcode 3 + target 3 + destination 255, 255
        assert_eq!(image.checksum(), 3 + 3 + 255 + 255);
    }

    #[test]
    fn test_truncated_image_rejected() {
        let err = ProgramImage::from_bytes(vec![0u8; INSTRUCTION_BYTES + 1]).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidImage { .. }));
    }

    #[test]
    fn test_zero_opcode_rejected() {
        let err = ProgramImage::from_bytes(vec![0u8; INSTRUCTION_BYTES]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::invalid_image("record 0: invalid opcode 0")
        );
    }

    #[test]
    fn test_validate_directions() {
        let topo = topology();
        let ok = ProgramImage::new(&[Instruction::Move {
            from: BufferAddress::new(1, 0),
            to: BufferAddress::new(1, 2),
        }]);
        ok.validate_for(&topo).unwrap();

        // Output index 1 does not exist on an arithmetic unit
        let bad = ProgramImage::new(&[Instruction::Move {
            from: BufferAddress::new(1, 1),
            to: BufferAddress::NULL,
        }]);
        assert_eq!(
            bad.validate_for(&topo),
            Err(RuntimeError::UnknownBuffer {
                address: BufferAddress::new(1, 1)
            })
        );
    }
}
