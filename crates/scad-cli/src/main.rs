//! `scad`: command-line assembler and simulator for SCAD processors.
//!
//! ```text
//! USAGE:
//!   scad info <topology>                      List units and buffer addresses
//!   scad assemble <topology> <program> [-o]   Print the listing, write an image
//!   scad run <topology> <program>             Assemble and simulate
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scad_asm::{assemble_file, ProcessorDescription};
use scad_chip::{Direction, Instruction, ScadValue};
use scad_runtime::{ExecutionBackend, ProgramImage, SimConfig, Simulator};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scad", about = "SCAD dataflow processor tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the units of a topology and their buffer addresses.
    Info {
        /// Topology description (TOML).
        topology: PathBuf,
    },
    /// Assemble a program and print the instruction listing.
    Assemble {
        /// Topology description (TOML).
        topology: PathBuf,
        /// Assembly source.
        program: PathBuf,
        /// Write the packed program image here.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Assemble a program and run it on the software simulator.
    Run {
        /// Topology description (TOML).
        topology: PathBuf,
        /// Assembly source, or a packed image with --image.
        program: PathBuf,
        /// Treat the program as a packed image written by `assemble -o`.
        #[arg(long)]
        image: bool,
        /// Stop after this many scheduling rounds.
        #[arg(long)]
        max_steps: Option<u64>,
        /// Global memory size in words.
        #[arg(long)]
        memory_words: Option<usize>,
        /// Fill memory with 0, 1, 2, ... before running.
        #[arg(long)]
        init_sequential: bool,
        /// Number of memory words to print before and after the run.
        #[arg(long, default_value_t = 16)]
        dump: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Info { topology } => cmd_info(&topology)?,
        Cmd::Assemble {
            topology,
            program,
            output,
        } => cmd_assemble(&topology, &program, output.as_deref())?,
        Cmd::Run {
            topology,
            program,
            image,
            max_steps,
            memory_words,
            init_sequential,
            dump,
        } => {
            let topology = ProcessorDescription::from_file(&topology)?;
            let mut config = SimConfig::from_description(&topology)?;
            if let Some(steps) = max_steps {
                config = config.with_max_steps(steps);
            }
            if let Some(words) = memory_words {
                config = config.with_memory_words(words);
            }
            let image = if image {
                let data = std::fs::read(&program)
                    .with_context(|| format!("reading {}", program.display()))?;
                ProgramImage::from_bytes(data)?
            } else {
                ProgramImage::new(&assemble_file(&topology, &program)?)
            };
            cmd_run(&topology, config, &image, init_sequential, dump)?;
        }
    }

    Ok(())
}

fn cmd_info(path: &Path) -> Result<()> {
    let topology = ProcessorDescription::from_file(path)?;
    let ic = topology.interconnect();

    println!("Processor    : {}", topology.name());
    println!("Buffer depth : {}", topology.buffer_depth());
    println!("Interconnect : {} ({} channels)", ic.name, ic.unit_count);
    println!("Units        : {}", topology.unit_count());
    println!();

    for number in 0..=u8::MAX {
        let Some(unit) = topology.unit_by_number(number) else {
            continue;
        };
        println!("[{}] {} ({})", unit.number, unit.name, unit.unit_type);
        for direction in [Direction::Input, Direction::Output] {
            for (buffer, address) in unit.buffers(direction) {
                println!("     {direction:<6} {buffer:<5} {address}");
            }
        }
        for (key, value) in &unit.parameters {
            println!("     param  {key} = {value}");
        }
    }

    Ok(())
}

fn cmd_assemble(topology: &Path, program: &Path, output: Option<&Path>) -> Result<()> {
    let topology = ProcessorDescription::from_file(topology)?;
    let instructions = assemble_file(&topology, program)?;
    print_listing(&instructions);

    let image = ProgramImage::new(&instructions);
    println!();
    println!("Instructions : {}", image.len());
    println!("Image size   : {} bytes", image.as_bytes().len());
    println!("Checksum     : 0x{:08x}", image.checksum());

    if let Some(path) = output {
        std::fs::write(path, image.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Written to   : {}", path.display());
    }
    Ok(())
}

fn cmd_run(
    topology: &ProcessorDescription,
    config: SimConfig,
    image: &ProgramImage,
    init_sequential: bool,
    dump: usize,
) -> Result<()> {
    let mut sim = Simulator::new(topology, config)?;
    let dump = dump.min(config.memory_words);

    if init_sequential {
        let words: Vec<ScadValue> = (0..config.memory_words as u64).map(ScadValue::from_u64).collect();
        sim.write_memory(0, &words)?;
    }
    sim.load_program(image)?;
    info!("Running {} instructions on {}", image.len(), sim.name());

    println!("Memory before: {}", format_words(&sim.read_memory(0, dump)?));

    let report = sim.run()?;

    println!("Outcome      : {}", report.outcome);
    println!("Steps        : {}", report.steps);
    println!("Issued       : {} (pc {})", report.instructions_issued, sim.pc());
    println!(
        "Packets      : {} delivered, {} discarded",
        report.packets_delivered, report.packets_discarded
    );
    println!("Results      : {}", format_words(&report.results));
    println!("Memory after : {}", format_words(&sim.read_memory(0, dump)?));
    Ok(())
}

fn print_listing(instructions: &[Instruction]) {
    for (index, instruction) in instructions.iter().enumerate() {
        println!("{index:>5}  {instruction}");
    }
}

fn format_words(words: &[ScadValue]) -> String {
    let parts: Vec<String> = words.iter().map(|w| w.as_i64().to_string()).collect();
    format!("[{}]", parts.join(", "))
}
