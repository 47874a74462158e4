//! Errors of loading and executing LC-3 programs.
use std::error::Error;
use std::path::PathBuf;

/// Errors while loading a program image into memory.
#[derive(Debug, displaydoc::Display, PartialEq, Eq)]
pub enum LoadProgramError {
    /// Program is missing valid .ORIG header
    ProgramMissingOrigHeader,
    /// Program has an odd number of {byte_count} bytes and cannot be read as u16 words
    ProgramNotWordAligned { byte_count: usize },
    /// Program too long, got {actual_instructions} u16 instructions at origin {origin:#06X} while limit is {maximum_instructions}
    ProgramTooLong {
        origin: u16,
        actual_instructions: usize,
        maximum_instructions: usize,
    },
    /// Failed to load image {path:?}: {message}
    ImageUnreadable { path: PathBuf, message: String },
}
impl Error for LoadProgramError {}

/// Errors ending the execution of a program other than `HALT`.
#[derive(Debug, displaydoc::Display, PartialEq, Eq)]
pub enum ExecutionError {
    /// Reserved opcode {opcode:#06b} at address {address:#06X}
    ReservedOpcode { opcode: u8, address: u16 },
    /// Error during reading Stdin or writing program output to Stdout: {0}
    IOInputOutputError(String),
    /// Execution interrupted by CTRL-C
    Interrupted,
}
impl Error for ExecutionError {}
