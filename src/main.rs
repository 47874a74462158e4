use clap::Parser;
use lc3_vm::emulator::Emulator;
use lc3_vm::errors::ExecutionError;
use lc3_vm::hardware::keyboard::{
    KeyboardInputProvider, StreamInputProvider, TerminalInputProvider,
};
use lc3_vm::terminal::{TerminalOutput, set_terminal_raw};
use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;

/// Byte value of the `-2` an interrupted run exits with.
const EXIT_INTERRUPTED: u8 = 254;
/// Same status as an `abort()`ed process.
const EXIT_RESERVED_OPCODE: u8 = 134;
const EXIT_FAILURE: u8 = 1;

/// Runs LC-3 object images, execution starts at 0x3000.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Object images to load in order, later images overwrite earlier ones
    #[arg(required = true, num_args = 1..)]
    images: Vec<PathBuf>,

    /// Log more details to stderr, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let stderr_format = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(stderr_format)
        .init();
}

/// SIGINT only sets the flag, the emulator stops at the next instruction and the terminal
/// mode gets restored on the regular exit path.
fn install_interrupt_handler() -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        tracing::warn!("Could not install CTRL-C handler: {e}");
    }
    interrupted
}

/// Keyboard events of the terminal, or the bytes of redirected standard input.
fn keyboard(interrupted: &Arc<AtomicBool>) -> Box<dyn KeyboardInputProvider> {
    if io::stdin().is_terminal() {
        Box::new(TerminalInputProvider::with_interrupt_flag(Arc::clone(
            interrupted,
        )))
    } else {
        tracing::debug!("reading input from redirected standard input");
        Box::new(StreamInputProvider::new(io::stdin(), Arc::clone(interrupted)))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let interrupted = install_interrupt_handler();
    let output = TerminalOutput::new(io::stdout(), false);
    let mut emu = Emulator::new(keyboard(&interrupted), output).with_interrupt_flag(interrupted);
    for path in &args.images {
        if let Err(e) = emu.load_image_file(path) {
            eprintln!("{e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    }

    let result = {
        let lock = set_terminal_raw();
        emu.output_mut().set_translate_newlines(lock.is_enabled());
        emu.execute()
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(ExecutionError::Interrupted) => {
            println!();
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e @ ExecutionError::ReservedOpcode { .. }) => {
            eprintln!("{e}");
            ExitCode::from(EXIT_RESERVED_OPCODE)
        }
        Err(e @ ExecutionError::IOInputOutputError(_)) => {
            eprintln!("{e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
