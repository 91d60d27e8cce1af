//! Runtime for the SCAD dataflow processor.
//!
//! Units exchange values through bounded buffers. Input buffers pair
//! source registrations with arriving values; output buffers pair values
//! with destination tags. Two managers per unit apply the control unit's
//! moves to those buffers, and an interconnect carries packets between
//! them. Nothing blocks: full, empty and no-packet are queried, and a
//! caller that cannot proceed retries on the next step.
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`buffer`] | `InputBuffer`, `OutputBuffer`, per-unit `UnitBuffers` |
//! | [`manager`] | Idle/pending manager state machine, `BufferManager` |
//! | [`interconnect`] | In-flight packets, ordered delivery, `NULL` discard |
//! | [`loading`] | `ProgramImage`: packed records, checksum, validation |
//! | [`simulator`] | Deterministic software substrate |
//!
//! # Example
//!
//! ```
//! use scad_asm::{assemble, ProcessorDescription};
//! use scad_runtime::{ExecutionBackend, ProgramImage, RunOutcome, Simulator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let topology = ProcessorDescription::parse(r#"
//!     [processor]
//!     name = "adder"
//!     buffer_depth = 2
//!
//!     [[interconnect]]
//!     name = "ic"
//!     unit_count = 2
//!
//!     [[unit]]
//!     name = "cu"
//!     type = "cu"
//!     number = 0
//!
//!     [[unit]]
//!     name = "p"
//!     type = "pu"
//!     number = 1
//! "#)?;
//!
//! let program = assemble(&topology, "
//!     addN -> p@opc
//!     $2 -> p@in0
//!     $3 -> p@in1
//!     p@out -> cu@in0
//! ")?;
//!
//! let mut sim = Simulator::from_description(&topology)?;
//! sim.load_program(&ProgramImage::new(&program))?;
//! let report = sim.run()?;
//! assert_eq!(report.outcome, RunOutcome::Completed);
//! assert_eq!(report.results[0].as_u64(), 5);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod backend;
pub mod buffer;
mod config;
mod error;
pub mod interconnect;
pub mod loading;
pub mod manager;
pub mod simulator;

pub use backend::{ExecutionBackend, RunOutcome, RunReport};
pub use buffer::{InputBuffer, OutputBuffer, UnitBuffers};
pub use config::SimConfig;
pub use error::{Result, RuntimeError, Stream};
pub use interconnect::{Interconnect, InterconnectStats};
pub use loading::ProgramImage;
pub use manager::{BufferManager, Effect, ManagerState, Role};
pub use simulator::Simulator;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{ExecutionBackend, ProgramImage, Result, RunOutcome, RunReport, SimConfig, Simulator};
}
