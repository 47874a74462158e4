//! # LC-3 Virtual Machine.
//!
//! `lc3-vm` executes binary images for the LC-3 (Little Computer 3) instruction set.
//! Images are loaded via [`emulator::Emulator::load_image_file`], execution starts at `0x3000`.
//!
//!  # Example
//! ```
//! use lc3_vm::emulator::Emulator;
//! use lc3_vm::hardware::keyboard::TerminalInputProvider;
//!
//! let mut emu = Emulator::new(Box::new(TerminalInputProvider::new()), Vec::new());
//! // .ORIG x3000, LEA R0 #2, PUTS, HALT, "Hi"
//! emu.load_program(&[0x3000, 0xE002, 0xF022, 0xF025, 0x48, 0x69, 0])
//!     .unwrap();
//! emu.execute().unwrap();
//! assert_eq!(emu.output().as_slice(), b"HiHALT\n");
//! ```
//! # Errors
//! - Image is missing the origin header
//! - Image does not fit into memory at its origin
//! - Reserved opcodes `RTI` and `RES` stop execution

pub mod emulator;
pub mod errors;
pub mod hardware;
pub(crate) mod numbers;
pub mod terminal;
