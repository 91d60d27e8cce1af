//! Execution substrate abstraction
//!
//! The host side needs four things from whatever runs a unit network: load
//! a program image, move words into and out of global memory, and run the
//! network until it stops. [`Simulator`](crate::Simulator) provides them in
//! software.

use crate::error::Result;
use crate::loading::ProgramImage;
use scad_chip::ScadValue;
use std::fmt::{self, Debug};

/// Execution substrate for SCAD programs
pub trait ExecutionBackend: Debug {
    /// Load a program, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns error if the image does not decode or does not fit the topology.
    fn load_program(&mut self, image: &ProgramImage) -> Result<()>;

    /// Copy words into global memory starting at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds memory.
    fn write_memory(&mut self, offset: usize, values: &[ScadValue]) -> Result<()>;

    /// Copy `len` words out of global memory starting at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds memory.
    fn read_memory(&self, offset: usize, len: usize) -> Result<Vec<ScadValue>>;

    /// Run the loaded program until it stops
    ///
    /// # Errors
    ///
    /// Returns error if no program is loaded or a unit faults.
    fn run(&mut self) -> Result<RunReport>;

    /// Backend name for logs
    fn name(&self) -> &str;

    /// True once a program is loaded
    fn is_ready(&self) -> bool;
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Control unit ran off the program and the network went quiet
    Completed,
    /// Nothing can move but the program has not ended
    Stalled,
    /// Step limit reached while still making progress
    StepLimit,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Stalled => write!(f, "stalled"),
            Self::StepLimit => write!(f, "step limit reached"),
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// How the run ended
    pub outcome: RunOutcome,
    /// Scheduling rounds executed
    pub steps: u64,
    /// Instructions dispatched by the control unit
    pub instructions_issued: u64,
    /// Packets written into input buffers
    pub packets_delivered: u64,
    /// Packets dropped on `NULL`
    pub packets_discarded: u64,
    /// Values received by the control unit, in arrival order
    pub results: Vec<ScadValue>,
}
