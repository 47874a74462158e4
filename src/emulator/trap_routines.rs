use crate::errors::ExecutionError;
use crate::hardware::memory::{MEMORY_SIZE_U16, Memory};
use crate::hardware::registers::{Registers, from_binary};
use std::io;
use std::io::Write;
use std::ops::ControlFlow;

pub const IN_PROMPT: &str = "Enter a character: ";
pub const HALT_MESSAGE: &str = "HALT\n";

/// Trap vectors of the implemented trap routines, selected by the low byte of `TRAP`.
#[repr(u8)]
#[derive(enumn::N, Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrapVector {
    GetC = 0x20,
    Out = 0x21,
    PutS = 0x22,
    In = 0x23,
    PutSp = 0x24,
    Halt = 0x25,
}

/// Runs the trap routine for `trap_vector`, unknown vectors are ignored.
pub fn dispatch(
    trap_vector: u8,
    regs: &mut Registers,
    mem: &mut Memory,
    stdout: &mut impl Write,
) -> ControlFlow<Result<(), ExecutionError>> {
    let Some(vector) = TrapVector::n(trap_vector) else {
        tracing::debug!("ignoring unknown trap vector {trap_vector:#04X}");
        return ControlFlow::Continue(());
    };
    match vector {
        TrapVector::GetC => get_c(regs, mem),
        TrapVector::Out => out(regs, stdout),
        TrapVector::PutS => put_s(regs, mem, stdout),
        TrapVector::In => in_trap(regs, mem, stdout),
        TrapVector::PutSp => put_sp(regs, mem, stdout),
        TrapVector::Halt => halt(stdout),
    }
}

fn read_character_from_keyboard(
    mem: &mut Memory,
) -> ControlFlow<Result<(), ExecutionError>, u8> {
    match mem.keyboard().get_input_character() {
        Ok(c) => ControlFlow::Continue(c),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => {
            ControlFlow::Break(Err(ExecutionError::Interrupted))
        }
        Err(e) => wrap_io_error_in_cf(&e),
    }
}

/// GETC: Read a single character from the keyboard. The character is not echoed onto the console.
///
/// Its ASCII code is copied into R0. The high eight bits of R0 are cleared.
pub fn get_c(regs: &mut Registers, mem: &mut Memory) -> ControlFlow<Result<(), ExecutionError>> {
    let c = read_character_from_keyboard(mem)?;
    regs.set(0, from_binary(u16::from(c)));
    ControlFlow::Continue(())
}

/// IN: Print a prompt on the screen and read a single character echoed back from the keyboard.
///
/// Otherwise, like 0x20 GETC.
pub fn in_trap(
    regs: &mut Registers,
    mem: &mut Memory,
    stdout: &mut impl Write,
) -> ControlFlow<Result<(), ExecutionError>> {
    write_out(IN_PROMPT.as_bytes(), stdout)?;
    let c = read_character_from_keyboard(mem)?;
    regs.set(0, from_binary(u16::from(c)));
    write_out(&[c], stdout)
}

/// OUT: Write a character in R0[7:0] to the console display.
pub fn out(regs: &Registers, stdout: &mut impl Write) -> ControlFlow<Result<(), ExecutionError>> {
    write_out(&regs.get(0).as_binary().to_le_bytes()[..1], stdout)
}

fn put_one_char_per_u16(input: u16, append_to: &mut Vec<u8>) {
    append_to.push(input.to_le_bytes()[0]);
}

fn put_two_chars_per_u16(input: u16, append_to: &mut Vec<u8>) {
    let [low, high] = input.to_le_bytes();
    append_to.push(low);
    if high != 0 {
        append_to.push(high);
    }
}

/// Collects the zero terminated string starting at the address in R0.
/// Stops after one pass over the address space if no terminator is found.
fn put(
    regs: &Registers,
    mem: &Memory,
    stdout: &mut impl Write,
    handle_char: fn(u16, &mut Vec<u8>),
) -> ControlFlow<Result<(), ExecutionError>> {
    let mut address = regs.get(0).as_binary();
    let mut s = Vec::with_capacity(120);
    for _ in 0..MEMORY_SIZE_U16 {
        let word = mem[address];
        if word == 0 {
            break;
        }
        handle_char(word, &mut s);
        address = address.wrapping_add(1);
    }
    write_out(&s, stdout)
}

/// PUTS: print null-delimited char* from register 0's address
pub fn put_s(
    regs: &Registers,
    mem: &Memory,
    stdout: &mut impl Write,
) -> ControlFlow<Result<(), ExecutionError>> {
    put(regs, mem, stdout, put_one_char_per_u16)
}

/// PUTSP: Packed version of PUTS
///
/// The ASCII code contained in bits [7:0] of a memory location is written to the console first.
/// The second character of the last memory location can be 0x00.
/// Writing terminates with a 0x000 char.
pub fn put_sp(
    regs: &Registers,
    mem: &Memory,
    stdout: &mut impl Write,
) -> ControlFlow<Result<(), ExecutionError>> {
    put(regs, mem, stdout, put_two_chars_per_u16)
}

/// HALT: End program and stdout a message
pub fn halt(stdout: &mut impl Write) -> ControlFlow<Result<(), ExecutionError>> {
    write_out(HALT_MESSAGE.as_bytes(), stdout)?;
    tracing::info!("program halted");
    ControlFlow::Break(Ok(()))
}

fn write_out(data: &[u8], stdout: &mut impl Write) -> ControlFlow<Result<(), ExecutionError>> {
    match stdout.write_all(data).and_then(|()| stdout.flush()) {
        Ok(()) => ControlFlow::Continue(()),
        Err(e) => wrap_io_error_in_cf(&e),
    }
}

fn wrap_io_error_in_cf<C>(error: &io::Error) -> ControlFlow<Result<(), ExecutionError>, C> {
    ControlFlow::Break(Err(ExecutionError::IOInputOutputError(error.to_string())))
}
