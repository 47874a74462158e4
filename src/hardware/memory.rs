use crate::errors::LoadProgramError;
use crate::hardware::keyboard::KeyboardInputProvider;
use std::fmt::{Debug, Formatter};
use std::ops::Index;

/// Default entry point, the PC starts here regardless of the loaded origins.
pub const PROGRAM_SECTION_START: u16 = 0x3000;
pub const MEMORY_SIZE_U16: usize = 1 << 16;

/// Memory regions mapped to IO functionality.
#[repr(u16)]
#[derive(enumn::N, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryMappedIOLocations {
    /// Keyboard Status Register
    Kbsr = 0xFE00,
    /// Keyboard Data Register
    Kbdr = 0xFE02,
}

/// An abstraction for the LC-3 memory including memory mapped IO but excluding registers.
///
/// Every `u16` is a valid address, so no access can be out of bounds.
pub struct Memory {
    /// Index equals memory address
    data: Vec<u16>,
    keyboard: Box<dyn KeyboardInputProvider>,
}

impl Debug for Memory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let used = self.data.iter().filter(|&&w| w != 0).count();
        write!(
            f,
            "Memory {{ non-zero cells: {used}, KBSR: {:#06X}, KBDR: {:#06X} }}",
            self[MemoryMappedIOLocations::Kbsr as u16],
            self[MemoryMappedIOLocations::Kbdr as u16]
        )
    }
}

/// Plain access without device side effects.
impl Index<u16> for Memory {
    type Output = u16;
    fn index(&self, index: u16) -> &Self::Output {
        &self.data[usize::from(index)]
    }
}

impl Memory {
    const KEYBOARD_STATUS_REGISTER_SET: u16 = 1 << 15;
    const KEYBOARD_STATUS_REGISTER_UNSET: u16 = 0;

    pub fn new(keyboard: Box<dyn KeyboardInputProvider>) -> Self {
        Self {
            data: vec![0x0u16; MEMORY_SIZE_U16],
            keyboard,
        }
    }

    /// Reads the word at `address`.
    ///
    /// Reading the keyboard status register polls the keyboard without blocking first:
    /// with pending input the status register gets its top bit set and the data register
    /// receives the next character, otherwise the status register is cleared.
    pub fn read(&mut self, address: u16) -> u16 {
        if MemoryMappedIOLocations::n(address) == Some(MemoryMappedIOLocations::Kbsr) {
            self.poll_keyboard();
        }
        self.data[usize::from(address)]
    }

    /// Unconditional store, device registers included.
    pub fn write(&mut self, address: u16, value: u16) {
        self.data[usize::from(address)] = value;
    }

    fn poll_keyboard(&mut self) {
        let status = if self.keyboard.check_input_available() {
            match self.keyboard.get_input_character() {
                Ok(c) => {
                    self.write(MemoryMappedIOLocations::Kbdr as u16, u16::from(c));
                    Self::KEYBOARD_STATUS_REGISTER_SET
                }
                Err(e) => {
                    tracing::warn!("reading available keyboard input failed: {e}");
                    Self::KEYBOARD_STATUS_REGISTER_UNSET
                }
            }
        } else {
            Self::KEYBOARD_STATUS_REGISTER_UNSET
        };
        self.write(MemoryMappedIOLocations::Kbsr as u16, status);
    }

    pub fn keyboard(&mut self) -> &mut dyn KeyboardInputProvider {
        self.keyboard.as_mut()
    }

    /// Copies `words` into memory starting at `origin`.
    ///
    /// # Errors
    /// - Program too long, it would not fit between `origin` and the end of the address space
    pub fn load_program(&mut self, origin: u16, words: &[u16]) -> Result<(), LoadProgramError> {
        let start = usize::from(origin);
        let maximum_instructions = MEMORY_SIZE_U16 - start;
        if words.len() > maximum_instructions {
            return Err(LoadProgramError::ProgramTooLong {
                origin,
                actual_instructions: words.len(),
                maximum_instructions,
            });
        }
        self.data[start..start + words.len()].copy_from_slice(words);
        Ok(())
    }

    /// The memory contents starting at `origin` with `len` words.
    #[must_use]
    pub fn slice(&self, origin: u16, len: usize) -> &[u16] {
        let start = usize::from(origin);
        &self.data[start..(start + len).min(MEMORY_SIZE_U16)]
    }
}
