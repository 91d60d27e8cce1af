//! Software execution substrate
//!
//! Deterministic cooperative simulation of a unit network. Each round:
//!
//! 1. the control unit dispatches at most one instruction,
//! 2. every unit (by number) steps its input manager, output manager and
//!    kernel, then hands finished packets to the interconnect,
//! 3. the interconnect delivers every packet whose receiver expects it.
//!
//! A round in which nothing changes ends the run: `Completed` if the
//! control unit has run off the program and every manager has applied its
//! moves, `Stalled` otherwise.

mod kernel;
mod unit;

pub use kernel::{compute, Kernel, KernelContext};
pub use unit::UnitSlot;

use crate::backend::{ExecutionBackend, RunOutcome, RunReport};
use crate::buffer::InputBuffer;
use crate::config::SimConfig;
use crate::error::{Result, RuntimeError};
use crate::interconnect::{Endpoints, Interconnect};
use crate::loading::ProgramImage;
use crate::manager::Role;
use scad_asm::ProcessorDescription;
use scad_chip::{BufferAddress, Instruction, ScadValue, UnitType};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

struct Inputs<'a>(&'a mut BTreeMap<u8, UnitSlot>);

impl Endpoints for Inputs<'_> {
    fn input_mut(&mut self, address: BufferAddress) -> Option<&mut InputBuffer> {
        self.0
            .get_mut(&address.unit)
            .and_then(|u| u.buffers.input_mut(address.buffer))
    }
}

/// Software simulator of one processor
#[derive(Debug)]
pub struct Simulator {
    topology: ProcessorDescription,
    config: SimConfig,
    units: BTreeMap<u8, UnitSlot>,
    interconnect: Interconnect,
    memory: Vec<ScadValue>,
    program: Option<Vec<Instruction>>,
    pc: usize,
    halted: bool,
    issued: u64,
    results: Vec<ScadValue>,
}

impl Simulator {
    /// Build a simulator for `topology`
    ///
    /// # Errors
    ///
    /// Returns error unless the topology has exactly one control unit, or if
    /// a stream unit's `offset` or `count` parameter is malformed.
    pub fn new(topology: &ProcessorDescription, config: SimConfig) -> Result<Self> {
        let mut control: Option<&str> = None;
        for unit in topology.units().filter(|u| u.unit_type == UnitType::Control) {
            if let Some(first) = control {
                return Err(RuntimeError::MultipleControlUnits {
                    first: first.to_string(),
                    second: unit.name.clone(),
                });
            }
            control = Some(unit.name.as_str());
        }
        if control.is_none() {
            return Err(RuntimeError::NoControlUnit);
        }

        let depth = topology.buffer_depth();
        let units: BTreeMap<u8, UnitSlot> = topology
            .units()
            .map(|u| Ok((u.number, UnitSlot::new(u, depth)?)))
            .collect::<Result<_>>()?;

        let capacity = units.len().max(1) * usize::from(depth.get());

        info!(
            "Simulator for '{}': {} units, depth {}, {} memory words",
            topology.name(),
            units.len(),
            depth,
            config.memory_words
        );

        Ok(Self {
            topology: topology.clone(),
            config,
            units,
            interconnect: Interconnect::new(capacity),
            memory: vec![ScadValue::ZERO; config.memory_words],
            program: None,
            pc: 0,
            halted: false,
            issued: 0,
            results: Vec::new(),
        })
    }

    /// Simulator configured from the topology itself
    ///
    /// # Errors
    ///
    /// Returns error unless the topology has exactly one control unit, or if
    /// a unit parameter is malformed.
    pub fn from_description(topology: &ProcessorDescription) -> Result<Self> {
        Self::new(topology, SimConfig::from_description(topology)?)
    }

    /// Active configuration
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current program counter
    pub const fn pc(&self) -> usize {
        self.pc
    }

    /// Simulated unit by number
    pub fn unit(&self, number: u8) -> Option<&UnitSlot> {
        self.units.get(&number)
    }

    fn reset(&mut self) {
        self.units.values_mut().for_each(UnitSlot::reset);
        self.interconnect.reset();
        self.pc = 0;
        self.halted = false;
        self.issued = 0;
        self.results.clear();
    }

    fn memory_range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>> {
        offset
            .checked_add(len)
            .filter(|&end| end <= self.memory.len())
            .map(|end| offset..end)
            .ok_or(RuntimeError::MemoryRange {
                offset,
                len,
                size: self.memory.len(),
            })
    }

    /// Control unit: issue at most one instruction
    fn dispatch(&mut self) -> Result<bool> {
        if self.halted {
            return Ok(false);
        }
        let Some(program) = self.program.as_ref() else {
            return Ok(false);
        };
        let Some(&instruction) = program.get(self.pc) else {
            info!("Control unit halted at pc {}", self.pc);
            self.halted = true;
            return Ok(true);
        };

        let targets: Vec<(BufferAddress, Role)> = match instruction {
            Instruction::MovePc { target } => {
                let target = usize::try_from(target.as_u64()).unwrap_or(usize::MAX);
                debug!("pc {} -> {}", self.pc, target);
                self.pc = target;
                self.issued += 1;
                return Ok(true);
            }
            Instruction::Move { from, to } => [(from, Role::Output), (to, Role::Input)]
                .into_iter()
                .filter(|(address, _)| !address.is_null())
                .collect(),
            Instruction::MoveImmediate { to, .. } if to.is_null() => Vec::new(),
            Instruction::MoveImmediate { to, .. } => vec![(to, Role::Input)],
        };

        let mut ready = true;
        for &(address, role) in &targets {
            let slot = self
                .units
                .get(&address.unit)
                .ok_or(RuntimeError::UnknownBuffer { address })?;
            ready &= match role {
                Role::Input => slot.input_manager.can_accept(),
                Role::Output => slot.output_manager.can_accept(),
            };
        }
        if !ready {
            return Ok(false);
        }

        if targets.is_empty() {
            warn!("pc {}: {} has no receiver, skipped", self.pc, instruction);
        }
        for (address, role) in targets {
            if let Some(slot) = self.units.get_mut(&address.unit) {
                slot.manager_mut(role).enqueue(instruction)?;
            }
        }

        debug!("pc {}: {}", self.pc, instruction);
        self.pc += 1;
        self.issued += 1;
        Ok(true)
    }

    fn report(&self, outcome: RunOutcome, steps: u64) -> RunReport {
        let stats = self.interconnect.stats();
        RunReport {
            outcome,
            steps,
            instructions_issued: self.issued,
            packets_delivered: stats.delivered,
            packets_discarded: stats.discarded,
            results: self.results.clone(),
        }
    }
}

impl ExecutionBackend for Simulator {
    fn load_program(&mut self, image: &ProgramImage) -> Result<()> {
        image.validate_for(&self.topology)?;
        let program = image.instructions()?;
        self.reset();
        info!(
            "Loaded {} instructions (checksum 0x{:08x})",
            program.len(),
            image.checksum()
        );
        self.program = Some(program);
        Ok(())
    }

    fn write_memory(&mut self, offset: usize, values: &[ScadValue]) -> Result<()> {
        let range = self.memory_range(offset, values.len())?;
        self.memory[range].copy_from_slice(values);
        Ok(())
    }

    fn read_memory(&self, offset: usize, len: usize) -> Result<Vec<ScadValue>> {
        let range = self.memory_range(offset, len)?;
        Ok(self.memory[range].to_vec())
    }

    fn run(&mut self) -> Result<RunReport> {
        if self.program.is_none() {
            return Err(RuntimeError::not_ready("no program loaded"));
        }

        for step in 1..=self.config.max_steps {
            let mut progressed = self.dispatch()?;

            let mut ctx = KernelContext {
                memory: &mut self.memory,
                results: &mut self.results,
            };
            for unit in self.units.values_mut() {
                progressed |= unit.step(&mut ctx, &mut self.interconnect)?;
            }

            progressed |= self.interconnect.deliver(&mut Inputs(&mut self.units))? > 0;

            if !progressed {
                let quiet = self.units.values().all(UnitSlot::is_quiet) && self.interconnect.in_flight() == 0;
                let outcome = if self.halted && quiet {
                    RunOutcome::Completed
                } else {
                    warn!(
                        "No progress at pc {} ({} packets in flight)",
                        self.pc,
                        self.interconnect.in_flight()
                    );
                    RunOutcome::Stalled
                };
                info!("Run {} after {} steps", outcome, step);
                return Ok(self.report(outcome, step));
            }
        }

        warn!("Step limit {} reached at pc {}", self.config.max_steps, self.pc);
        Ok(self.report(RunOutcome::StepLimit, self.config.max_steps))
    }

    fn name(&self) -> &str {
        "simulator"
    }

    fn is_ready(&self) -> bool {
        self.program.is_some()
    }
}
