//! One simulated unit: buffers, both managers and the kernel

use super::kernel::{Kernel, KernelContext};
use crate::buffer::UnitBuffers;
use crate::error::Result;
use crate::interconnect::Interconnect;
use crate::manager::{BufferManager, Role};
use scad_asm::UnitDescription;
use scad_chip::UnitType;
use std::num::NonZeroU8;

/// Simulated unit
#[derive(Debug, Clone)]
pub struct UnitSlot {
    /// Unit name
    pub name: String,
    /// Unit number
    pub number: u8,
    /// Unit type
    pub unit_type: UnitType,
    /// Input and output buffers
    pub buffers: UnitBuffers,
    /// Input-side manager
    pub input_manager: BufferManager,
    /// Output-side manager
    pub output_manager: BufferManager,
    /// Unit behaviour
    pub kernel: Kernel,
}

impl UnitSlot {
    /// Fresh unit from its description
    ///
    /// # Errors
    ///
    /// Returns error if a kernel parameter is malformed.
    pub fn new(desc: &UnitDescription, depth: NonZeroU8) -> Result<Self> {
        let inbox = usize::from(depth.get());
        Ok(Self {
            name: desc.name.clone(),
            number: desc.number,
            unit_type: desc.unit_type,
            buffers: UnitBuffers::for_unit(desc.number, desc.unit_type, depth),
            input_manager: BufferManager::new(Role::Input, desc.number, inbox),
            output_manager: BufferManager::new(Role::Output, desc.number, inbox),
            kernel: Kernel::for_unit(desc)?,
        })
    }

    /// Manager for one side
    pub fn manager_mut(&mut self, role: Role) -> &mut BufferManager {
        match role {
            Role::Input => &mut self.input_manager,
            Role::Output => &mut self.output_manager,
        }
    }

    /// One scheduling round: managers, kernel, then outgoing packets
    ///
    /// # Errors
    ///
    /// Returns error if a manager effect or the kernel fails.
    pub fn step(&mut self, ctx: &mut KernelContext<'_>, interconnect: &mut Interconnect) -> Result<bool> {
        let mut progressed = self.input_manager.step(&mut self.buffers)?;
        progressed |= self.output_manager.step(&mut self.buffers)?;
        progressed |= self.kernel.step(self.number, &mut self.buffers, ctx)?;

        for (from, output) in self.buffers.outputs_mut() {
            while output.has_packet() && interconnect.can_send() {
                if let Some(packet) = output.pop(from) {
                    interconnect.send(packet)?;
                    progressed = true;
                }
            }
        }
        Ok(progressed)
    }

    /// True if nothing is queued, pending or in progress
    pub fn is_quiet(&self) -> bool {
        self.input_manager.is_idle() && self.output_manager.is_idle() && !self.kernel.is_busy()
    }

    /// Clear all run state
    pub fn reset(&mut self) {
        self.buffers.clear();
        self.input_manager.reset();
        self.output_manager.reset();
        self.kernel.reset();
    }
}
