//! Machine state of the LC-3: memory with memory mapped devices, registers and the keyboard.
pub mod keyboard;
pub mod memory;
pub mod registers;
