//! LC-3 Emulator - CLI Entry Point
//!
//! Commands:
//! - `lc3-emu run [image]` - Run an image (or `.asm` source) and print the registers
//! - `lc3-emu debug <program>` - Interactive debugger
//! - `lc3-emu asm <source>` - Assemble to an image
//! - `lc3-emu disasm <image>` - Disassemble an image

use std::io::Read;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lc3::{assemble, Cpu, Image};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lc3-emu")]
#[command(version)]
#[command(about = "An emulator and assembler for the LC-3 16-bit computer")]
struct Cli {
    /// Log every executed instruction to stderr
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts, then print the registers
    Run {
        /// Image or `.asm` file to execute; reads an image from stdin if absent or `-`
        program: Option<String>,
        /// Stop after this many instructions
        #[arg(short, long)]
        max_steps: Option<u64>,
        /// Print the final machine state as JSON instead of the register dump
        #[arg(long)]
        json: bool,
    },
    /// Interactive debugger
    #[cfg(feature = "tui")]
    Debug {
        /// Image or `.asm` file to debug
        program: String,
    },
    /// Assemble source to an image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.trace);

    let result = match cli.command {
        Commands::Run { program, max_steps, json } => run_program(program.as_deref(), max_steps, json),
        #[cfg(feature = "tui")]
        Commands::Debug { program } => debug_program(&program),
        Commands::Asm { source, output } => assemble_file(&source, output),
        Commands::Disasm { image } => disassemble_file(&image),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

/// Log filter for `--trace`: the library's per-instruction events and the
/// binary's own.
const TRACE_FILTER: &str = "lc3=trace,lc3_emu=trace";

/// Install the stderr log subscriber. `RUST_LOG` picks the filter unless
/// `--trace` asks for every instruction.
fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new(TRACE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Load a program: `.asm` files are assembled, anything else is read as an
/// image. `None` or `-` reads an image from stdin.
fn load_program(path: Option<&str>) -> Result<Image, String> {
    match path {
        None | Some("-") => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("failed to read stdin: {}", e))?;
            lc3::parse_image(&text).map_err(|e| format!("bad image: {}", e))
        }
        Some(path) if path.ends_with(".asm") => {
            let source = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {}", path, e))?;
            let image = assemble(&source).map_err(|e| format!("assembly error: {}", e))?;
            tracing::debug!(words = image.len(), "assembled {}", path);
            Ok(image)
        }
        Some(path) => lc3::load_image(path).map_err(|e| format!("failed to load {}: {}", path, e)),
    }
}

fn run_program(path: Option<&str>, max_steps: Option<u64>, json: bool) -> Result<(), String> {
    let image = load_program(path)?;
    let mut cpu = Cpu::from_image(&image);

    let executed = match max_steps {
        Some(limit) => cpu.run_limited(limit),
        None => cpu.run(),
    }
    .map_err(|e| format!("execution aborted: {}", e))?;

    if cpu.is_running() {
        return Err(format!("no HALT within {} steps", executed));
    }
    tracing::debug!(executed, "run complete");

    if json {
        let state = serde_json::to_string_pretty(&cpu)
            .map_err(|e| format!("failed to serialize state: {}", e))?;
        println!("{}", state);
    } else {
        print!("{}", cpu.regs.dump());
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) -> Result<(), String> {
    let image = load_program(Some(path))?;
    lc3::run_debugger(image).map_err(|e| format!("debugger error: {}", e))
}

fn assemble_file(source_path: &str, output: Option<String>) -> Result<(), String> {
    let out_path = output.unwrap_or_else(|| {
        match source_path.strip_suffix(".asm") {
            Some(stem) => format!("{}.bin", stem),
            None => format!("{}.bin", source_path),
        }
    });

    let source = std::fs::read_to_string(source_path)
        .map_err(|e| format!("failed to read {}: {}", source_path, e))?;
    let image = assemble(&source).map_err(|e| format!("assembly error: {}", e))?;
    lc3::save_image(&out_path, &image).map_err(|e| format!("failed to save {}: {}", out_path, e))?;

    eprintln!("assembled {} words at {} → {}", image.len(), lc3::word::hex(image.start), out_path);
    Ok(())
}

fn disassemble_file(path: &str) -> Result<(), String> {
    let image = lc3::load_image(path).map_err(|e| format!("failed to load {}: {}", path, e))?;
    print!("{}", lc3::disassemble(&image));
    Ok(())
}
