use crate::emulator::Emulator;
use crate::hardware::keyboard::KeyboardInputProvider;
use crate::hardware::memory::{Memory, PROGRAM_SECTION_START};
use std::collections::VecDeque;
use std::io;

/// Keyboard with scripted input.
///
/// Reports CTRL-C once the script is used up, or after a number of interrupt polls, if requested.
pub struct FakeKeyboardInputProvider {
    input: VecDeque<u8>,
    interrupt_when_empty: bool,
    polls_until_interrupt: Option<usize>,
}
impl FakeKeyboardInputProvider {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.bytes().collect(),
            interrupt_when_empty: false,
            polls_until_interrupt: None,
        }
    }
    pub fn interrupt_when_empty(mut self) -> Self {
        self.interrupt_when_empty = true;
        self
    }
    /// CTRL-C shows up on the `polls`th call of `poll_interrupt`, like a key press while a
    /// program is busy without reading the keyboard.
    pub fn interrupt_after_polls(mut self, polls: usize) -> Self {
        self.polls_until_interrupt = Some(polls);
        self
    }
}
impl KeyboardInputProvider for FakeKeyboardInputProvider {
    fn check_input_available(&mut self) -> bool {
        !self.input.is_empty()
    }
    fn get_input_character(&mut self) -> io::Result<u8> {
        self.input.pop_front().ok_or_else(|| {
            if self.interrupt_when_empty {
                io::Error::from(io::ErrorKind::Interrupted)
            } else {
                io::Error::new(io::ErrorKind::UnexpectedEof, "No input available")
            }
        })
    }
    fn is_interrupted(&self) -> bool {
        (self.interrupt_when_empty && self.input.is_empty()) || self.polls_until_interrupt == Some(0)
    }
    fn poll_interrupt(&mut self) -> bool {
        if let Some(polls) = self.polls_until_interrupt.as_mut() {
            *polls = polls.saturating_sub(1);
        }
        self.is_interrupted()
    }
}

/// Memory with `program_no_header` loaded at `0x3000` and no keyboard input.
pub fn create_memory(program_no_header: &[u16]) -> Memory {
    create_memory_with_input(program_no_header, "")
}

pub fn create_memory_with_input(program_no_header: &[u16], input: &str) -> Memory {
    let mut mem = Memory::new(Box::new(FakeKeyboardInputProvider::new(input)));
    mem.load_program(PROGRAM_SECTION_START, program_no_header)
        .expect("Error loading program");
    mem
}

/// Emulator capturing its output with `program_no_header` loaded at `0x3000`.
pub fn fake_emulator(program_no_header: &[u16], input: &str) -> Emulator<Vec<u8>> {
    fake_emulator_with_keyboard(program_no_header, FakeKeyboardInputProvider::new(input))
}

pub fn fake_emulator_with_keyboard(
    program_no_header: &[u16],
    keyboard: FakeKeyboardInputProvider,
) -> Emulator<Vec<u8>> {
    let mut program = Vec::with_capacity(program_no_header.len() + 1);
    program.push(PROGRAM_SECTION_START);
    program.extend_from_slice(program_no_header);
    let mut emu = Emulator::new(Box::new(keyboard), Vec::with_capacity(120));
    emu.load_program(&program).expect("Error loading program");
    emu
}

pub fn output_string(emu: &Emulator<Vec<u8>>) -> String {
    String::from_utf8_lossy(emu.output()).into_owned()
}
