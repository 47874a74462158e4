//! The LC-3 instruction interpreter.
//!
//! An [`Emulator`] owns memory, registers and the output stream. It repeatedly fetches the word
//! at the PC, decodes it into an [`Operation`] and executes it until `HALT` or an error.
pub mod image;
pub mod instruction;
pub mod opcodes;
#[cfg(test)]
pub(crate) mod test_helpers;
pub mod trap_routines;

use crate::errors::{ExecutionError, LoadProgramError};
use crate::hardware::keyboard::KeyboardInputProvider;
use crate::hardware::memory::Memory;
use crate::hardware::registers::Registers;
use image::Image;
use instruction::{Instruction, Operation};
use std::fmt::{Debug, Formatter};
use std::fs;
use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Instructions between two checks of the keyboard for a CTRL-C key press.
const KEYBOARD_INTERRUPT_POLL_INTERVAL: u32 = 1 << 12;

/// The public facing emulator used to run LC-3 programs.
pub struct Emulator<W: Write> {
    memory: Memory,
    registers: Registers,
    output: W,
    running: bool,
    interrupted: Arc<AtomicBool>,
}

impl<W: Write> Debug for Emulator<W> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("registers", &self.registers)
            .field("memory", &self.memory)
            .field("running", &self.running)
            .field("interrupted", &self.interrupted)
            .finish_non_exhaustive()
    }
}

impl<W: Write> Emulator<W> {
    /// Creates an emulator with zeroed memory and the PC at `0x3000`.
    pub fn new(keyboard: Box<dyn KeyboardInputProvider>, output: W) -> Self {
        Self {
            memory: Memory::new(keyboard),
            registers: Registers::new(),
            output,
            running: false,
            interrupted: Arc::default(),
        }
    }

    /// Uses `interrupted` as interrupt request, e.g. set by a signal handler.
    #[must_use]
    pub fn with_interrupt_flag(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }
    /// Setting the returned flag stops [`Emulator::execute`] with [`ExecutionError::Interrupted`].
    #[must_use]
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Loads an object image from `path`, see [`Emulator::load_image`].
    ///
    /// # Errors
    /// - File cannot be read
    /// - See [`Emulator::load_image`]
    pub fn load_image_file(&mut self, path: impl AsRef<Path>) -> Result<(), LoadProgramError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| LoadProgramError::ImageUnreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tracing::debug!("read {} bytes from {}", bytes.len(), path.display());
        self.load_image(&bytes)
    }

    /// Loads an object image: a big-endian origin followed by big-endian words which are
    /// copied into memory starting at the origin. The PC is not changed.
    ///
    /// Images are validated as a whole before anything is written. An image with a trailing
    /// odd byte or with more words than fit between origin and the end of memory is rejected,
    /// instead of ignoring the odd byte or truncating the image as many LC-3 loaders do.
    ///
    /// # Errors
    /// - Image is missing the origin header
    /// - Image has an odd number of bytes
    /// - Program too long for its origin
    pub fn load_image(&mut self, bytes: &[u8]) -> Result<(), LoadProgramError> {
        self.load(Image::try_from(bytes)?)
    }

    /// Loads a program given as host order words with the origin as first word.
    ///
    /// # Errors
    /// - Program is missing the origin header
    /// - Program too long for its origin
    pub fn load_program(&mut self, program: &[u16]) -> Result<(), LoadProgramError> {
        self.load(Image::try_from(program)?)
    }

    fn load(&mut self, image: Image) -> Result<(), LoadProgramError> {
        self.memory.load_program(image.origin, &image.words)?;
        tracing::debug!(
            "loaded {} words at origin {:#06X}",
            image.words.len(),
            image.origin
        );
        Ok(())
    }

    /// Runs the program until `HALT`.
    ///
    /// # Errors
    /// - A reserved opcode was fetched
    /// - Reading input or writing output failed
    /// - CTRL-C was pressed or the interrupt flag was set
    pub fn execute(&mut self) -> Result<(), ExecutionError> {
        self.running = true;
        let mut cycles: u32 = 0;
        while self.running {
            if let ControlFlow::Break(result) = self.step() {
                self.running = false;
                result?;
            }
            cycles = cycles.wrapping_add(1);
            if self.running && self.interrupt_requested(cycles) {
                self.running = false;
                tracing::info!("interrupted after {cycles} instructions");
                return Err(ExecutionError::Interrupted);
            }
        }
        Ok(())
    }

    fn interrupt_requested(&mut self, cycles: u32) -> bool {
        if self.interrupted.load(Ordering::Relaxed) {
            return true;
        }
        let keyboard = self.memory.keyboard();
        if cycles % KEYBOARD_INTERRUPT_POLL_INTERVAL == 0 {
            keyboard.poll_interrupt()
        } else {
            keyboard.is_interrupted()
        }
    }

    /// Executes exactly one instruction.
    /// Breaks with `Ok(())` after `HALT` and with the error if execution cannot continue.
    pub fn step(&mut self) -> ControlFlow<Result<(), ExecutionError>> {
        let address = self.registers.fetch_and_increment_pc();
        let instruction = Instruction::from(self.memory.read(address));
        let operation = Operation::from(instruction);
        tracing::trace!("{address:#06X}: {operation:?}");
        let r = &mut self.registers;
        let mem = &mut self.memory;
        match operation {
            Operation::Add { dr, sr1, operand } => opcodes::add(dr, sr1, operand, r),
            Operation::And { dr, sr1, operand } => opcodes::and(dr, sr1, operand, r),
            Operation::Not { dr, sr } => opcodes::not(dr, sr, r),
            Operation::Br { nzp, pc_offset } => opcodes::br(nzp, pc_offset, r),
            Operation::Jmp { base_r } => opcodes::jmp_or_ret(base_r, r),
            Operation::Jsr { pc_offset } => opcodes::jsr(pc_offset, r),
            Operation::Jsrr { base_r } => opcodes::jsrr(base_r, r),
            Operation::Ld { dr, pc_offset } => opcodes::ld(dr, pc_offset, r, mem),
            Operation::Ldi { dr, pc_offset } => opcodes::ldi(dr, pc_offset, r, mem),
            Operation::Ldr { dr, base_r, offset } => opcodes::ldr(dr, base_r, offset, r, mem),
            Operation::Lea { dr, pc_offset } => opcodes::lea(dr, pc_offset, r),
            Operation::St { sr, pc_offset } => opcodes::st(sr, pc_offset, r, mem),
            Operation::Sti { sr, pc_offset } => opcodes::sti(sr, pc_offset, r, mem),
            Operation::Str { sr, base_r, offset } => opcodes::str(sr, base_r, offset, r, mem),
            Operation::Trap { trap_vector } => {
                return trap_routines::dispatch(trap_vector, r, mem, &mut self.output);
            }
            Operation::Invalid { opcode } => {
                tracing::error!("reserved opcode {opcode:?} at {address:#06X}");
                return ControlFlow::Break(Err(ExecutionError::ReservedOpcode {
                    opcode: opcode as u8,
                    address,
                }));
            }
        }
        ControlFlow::Continue(())
    }

    /// Restores the power-on register state, memory is kept.
    pub fn reset_registers(&mut self) {
        self.registers = Registers::new();
    }
    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.registers
    }
    pub const fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }
    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }
    pub const fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }
    #[must_use]
    pub const fn output(&self) -> &W {
        &self.output
    }
    pub const fn output_mut(&mut self) -> &mut W {
        &mut self.output
    }
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }
}

#[expect(clippy::unusual_byte_groupings)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::test_helpers::{
        FakeKeyboardInputProvider, fake_emulator, fake_emulator_with_keyboard, output_string,
    };
    use crate::hardware::registers::{ConditionFlag, from_binary};
    use googletest::prelude::*;

    const HALT: u16 = 0xF025;
    const PUTS: u16 = 0xF022;
    const OUT: u16 = 0xF021;
    const GETC: u16 = 0xF020;

    #[gtest]
    pub fn test_halt_only() {
        let mut emu = fake_emulator(&[HALT], "");
        emu.execute().unwrap();
        expect_that!(output_string(&emu), eq("HALT\n"));
        expect_that!(emu.registers().get(0), eq(from_binary(0)));
        expect_that!(emu.registers().get_conditional_register(), eq(ConditionFlag::Zero));
        expect_that!(emu.registers().pc(), eq(from_binary(0x3001)));
        expect_that!(emu.is_running(), eq(false));
    }
    #[gtest]
    pub fn test_hello_world_puts() {
        let mut emu = fake_emulator(
            &[
                0b1110_000_000000010, // LEA R0, #2
                PUTS,
                HALT,
                u16::from(b'H'),
                u16::from(b'i'),
                0,
            ],
            "",
        );
        emu.execute().unwrap();
        expect_that!(output_string(&emu), eq("HiHALT\n"));
    }
    #[gtest]
    pub fn test_add_count_down() {
        let mut emu = fake_emulator(
            &[
                0b0001_001_000_1_00101, // ADD R1, R0, #5
                0b0001_001_001_1_11111, // ADD R1, R1, #-1
                HALT,
            ],
            "",
        );
        emu.execute().unwrap();
        expect_that!(emu.registers().get(1), eq(from_binary(4)));
        expect_that!(emu.registers().get_conditional_register(), eq(ConditionFlag::Pos));
    }
    #[gtest]
    pub fn test_loop_with_branch() {
        // R1 = 3; loop: R2 += 2, R1 -= 1, BRp loop
        let mut emu = fake_emulator(
            &[
                0b0001_001_001_1_00011, // ADD R1, R1, #3
                0b0001_010_010_1_00010, // ADD R2, R2, #2
                0b0001_001_001_1_11111, // ADD R1, R1, #-1
                0b0000_001_111111101,   // BRp #-3
                HALT,
            ],
            "",
        );
        emu.execute().unwrap();
        expect_that!(emu.registers().get(2), eq(from_binary(6)));
        expect_that!(emu.registers().get(1), eq(from_binary(0)));
    }
    #[gtest]
    pub fn test_subroutine_call_and_return() {
        let mut emu = fake_emulator(
            &[
                0b0100_1_00000000010, // JSR #2
                0b0001_011_011_1_00001, // ADD R3, R3, #1
                HALT,
                0b0001_100_100_1_00111, // ADD R4, R4, #7
                0b1100_000_111_000000,  // RET
            ],
            "",
        );
        emu.execute().unwrap();
        expect_that!(emu.registers().get(4), eq(from_binary(7)));
        expect_that!(emu.registers().get(3), eq(from_binary(1)));
        expect_that!(emu.registers().get(7), eq(from_binary(0x3001)));
    }
    #[gtest]
    pub fn test_getc_out_echo() {
        let mut emu = fake_emulator(&[GETC, OUT, GETC, OUT, HALT], "ok");
        emu.execute().unwrap();
        expect_that!(output_string(&emu), eq("okHALT\n"));
    }
    #[gtest]
    pub fn test_keyboard_polling_loop() {
        // poll: LDI R0, KBSR; BRzp poll; LDI R0, KBDR; OUT; HALT; KBSR; KBDR
        let mut emu = fake_emulator(
            &[
                0b1010_000_000000100, // LDI R0, #4
                0b0000_011_111111110, // BRzp #-2
                0b1010_000_000000011, // LDI R0, #3
                OUT,
                HALT,
                0xFE00,
                0xFE02,
            ],
            "z",
        );
        emu.execute().unwrap();
        expect_that!(output_string(&emu), eq("zHALT\n"));
    }
    #[gtest]
    pub fn test_store_and_load_back() {
        let mut emu = fake_emulator(
            &[
                0b0001_000_000_1_01001, // ADD R0, R0, #9
                0b0011_000_000000010,   // ST R0, #2
                0b0010_001_000000001,   // LD R1, #1
                HALT,
                0,
            ],
            "",
        );
        emu.execute().unwrap();
        expect_that!(emu.memory()[0x3004], eq(9));
        expect_that!(emu.registers().get(1), eq(from_binary(9)));
    }
    #[gtest]
    pub fn test_reserved_opcode() {
        let mut emu = fake_emulator(&[0x0000, 0xD000, HALT], "");
        let err = emu.execute().unwrap_err();
        expect_that!(
            err,
            eq(&ExecutionError::ReservedOpcode {
                opcode: 0b1101,
                address: 0x3001
            })
        );
        expect_that!(
            err.to_string(),
            eq("Reserved opcode 0b1101 at address 0x3001")
        );
        expect_that!(output_string(&emu), eq(""));
    }
    #[gtest]
    pub fn test_rti_is_reserved() {
        let mut emu = fake_emulator(&[0x8000], "");
        expect_that!(
            emu.execute(),
            eq(&Err(ExecutionError::ReservedOpcode {
                opcode: 0b1000,
                address: 0x3000
            }))
        );
    }
    #[gtest]
    pub fn test_unknown_trap_is_ignored() {
        let mut emu = fake_emulator(&[0xF0FF, HALT], "");
        emu.execute().unwrap();
        expect_that!(output_string(&emu), eq("HALT\n"));
    }
    #[gtest]
    pub fn test_interrupt_while_waiting_for_input() {
        let keyboard = FakeKeyboardInputProvider::new("").interrupt_when_empty();
        let mut emu = fake_emulator_with_keyboard(&[GETC, HALT], keyboard);
        expect_that!(emu.execute(), eq(&Err(ExecutionError::Interrupted)));
        expect_that!(output_string(&emu), eq(""));
    }
    #[gtest]
    pub fn test_ctrl_c_key_stops_loop_without_keyboard_reads() {
        let keyboard = FakeKeyboardInputProvider::new("").interrupt_after_polls(3);
        // endless loop: BRnzp #-1
        let mut emu = fake_emulator_with_keyboard(&[0b0000_111_111111111], keyboard);
        expect_that!(emu.execute(), eq(&Err(ExecutionError::Interrupted)));
        expect_that!(emu.registers().pc(), eq(from_binary(0x3000)));
        expect_that!(emu.is_running(), eq(false));
    }
    #[gtest]
    pub fn test_interrupt_flag_set_during_endless_loop() {
        // endless loop: BRnzp #-1
        let mut emu = fake_emulator(&[0b0000_111_111111111], "");
        let flag = emu.interrupt_flag();
        let signal = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            flag.store(true, Ordering::SeqCst);
        });
        expect_that!(emu.execute(), eq(&Err(ExecutionError::Interrupted)));
        signal.join().unwrap();
    }
    #[gtest]
    pub fn test_shared_interrupt_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut emu = fake_emulator(&[0b0000_111_111111111], "")
            .with_interrupt_flag(Arc::clone(&flag));
        expect_that!(emu.execute(), eq(&Err(ExecutionError::Interrupted)));
        expect_that!(Arc::ptr_eq(&emu.interrupt_flag(), &flag), eq(true));
    }
    #[gtest]
    pub fn test_halt_wins_over_pending_interrupt() {
        let keyboard = FakeKeyboardInputProvider::new("").interrupt_when_empty();
        let mut emu = fake_emulator_with_keyboard(&[HALT], keyboard);
        expect_that!(emu.execute(), eq(&Ok(())));
        expect_that!(output_string(&emu), eq("HALT\n"));
    }
    #[gtest]
    pub fn test_step() {
        let mut emu = fake_emulator(&[0b0001_001_000_1_00101, HALT], "");
        expect_that!(emu.step(), eq(&ControlFlow::Continue(())));
        expect_that!(emu.registers().get(1), eq(from_binary(5)));
        expect_that!(emu.step(), eq(&ControlFlow::Break(Ok(()))));
    }
    #[gtest]
    pub fn test_reset_registers_keeps_memory() {
        let mut emu = fake_emulator(&[0b0001_001_000_1_00101, HALT], "");
        emu.execute().unwrap();
        emu.reset_registers();
        expect_that!(emu.registers(), eq(&Registers::new()));
        expect_that!(emu.memory()[0x3001], eq(HALT));
        emu.execute().unwrap();
        expect_that!(output_string(&emu), eq("HALT\nHALT\n"));
    }
    #[gtest]
    pub fn test_multiple_images_overwrite() {
        let mut emu = fake_emulator(&[], "");
        emu.load_image(&[0x30, 0x00, 0x12, 0x34, 0x56, 0x78]).unwrap();
        emu.load_image(&[0x30, 0x01, 0xF0, 0x25]).unwrap();
        expect_that!(emu.memory()[0x3000], eq(0x1234));
        expect_that!(emu.memory()[0x3001], eq(HALT));
        expect_that!(emu.registers().pc(), eq(from_binary(0x3000)));
    }
    #[gtest]
    pub fn test_load_image_rejects_odd_and_overlong_images() {
        let mut emu = fake_emulator(&[], "");
        expect_that!(
            emu.load_image(&[0x30, 0x00, 0xF0, 0x25, 0x12]),
            eq(&Err(LoadProgramError::ProgramNotWordAligned { byte_count: 5 }))
        );
        expect_that!(
            emu.load_image(&[0xFF, 0xFF, 0x00, 0x01, 0x00, 0x02]),
            eq(&Err(LoadProgramError::ProgramTooLong {
                origin: 0xFFFF,
                actual_instructions: 2,
                maximum_instructions: 1
            }))
        );
        expect_that!(emu.memory()[0x3000], eq(0));
        expect_that!(emu.memory()[0xFFFF], eq(0));
    }
    #[gtest]
    pub fn test_load_image_file_missing() {
        let mut emu = fake_emulator(&[], "");
        let err = emu
            .load_image_file("does/not/exist.obj")
            .unwrap_err();
        expect_that!(
            err.to_string(),
            starts_with("Failed to load image \"does/not/exist.obj\": ")
        );
    }
}
