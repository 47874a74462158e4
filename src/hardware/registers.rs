use crate::hardware::memory::PROGRAM_SECTION_START;

/// Content of one LC-3 register, either read as binary or as 2's complement decimal.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub struct Register(u16);

impl Register {
    #[must_use]
    pub const fn from_binary(value: u16) -> Self {
        Self(value)
    }
    #[must_use]
    pub const fn from_decimal(value: i16) -> Self {
        Self(value.cast_unsigned())
    }
    #[must_use]
    pub const fn as_binary(self) -> u16 {
        self.0
    }
    #[must_use]
    pub const fn as_decimal(self) -> i16 {
        self.0.cast_signed()
    }
}

impl std::fmt::Debug for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X} ({})", self.0, self.as_decimal())
    }
}

#[must_use]
pub const fn from_binary(value: u16) -> Register {
    Register::from_binary(value)
}
#[must_use]
pub const fn from_decimal(value: i16) -> Register {
    Register::from_decimal(value)
}

/// The LC-3 register file: `R0` to `R7`, the program counter and the condition register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    general_purpose: [Register; 8],
    pc: Register,
    cond: ConditionFlag,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    /// All registers zeroed, condition register `Zero` and PC at [`PROGRAM_SECTION_START`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            general_purpose: [Register(0); 8],
            pc: Register(PROGRAM_SECTION_START),
            cond: ConditionFlag::Zero,
        }
    }

    /// # Panics
    /// - register number is greater than 7
    #[must_use]
    pub fn get(&self, r: u8) -> Register {
        assert!(r <= 7, "Invalid general purpose register get");
        self.general_purpose[usize::from(r)]
    }
    /// # Panics
    /// - register number is greater than 7
    pub fn set(&mut self, r: u8, value: Register) {
        assert!(r <= 7, "Invalid general purpose register set");
        self.general_purpose[usize::from(r)] = value;
    }
    #[must_use]
    pub const fn pc(&self) -> Register {
        self.pc
    }
    pub const fn set_pc(&mut self, value: u16) {
        self.pc = Register(value);
    }
    /// Returns the current PC and moves it to the next word.
    pub const fn fetch_and_increment_pc(&mut self) -> u16 {
        let current = self.pc.0;
        self.pc = Register(current.wrapping_add(1));
        current
    }

    #[must_use]
    pub const fn get_conditional_register(&self) -> ConditionFlag {
        self.cond
    }
    /// Sets the condition register from a freshly written result.
    pub fn update_condition_flags(&mut self, result: u16) {
        self.cond = ConditionFlag::from(result);
    }
    /// Writes `value` to register `r` and updates the condition register accordingly.
    pub fn set_with_flags(&mut self, r: u8, value: u16) {
        self.set(r, Register(value));
        self.update_condition_flags(value);
    }
}

/// Condition register content, exactly one flag is set at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionFlag {
    Pos = 1 << 0, // Positive
    Zero = 1 << 1,
    Neg = 1 << 2, // Negative
}

impl ConditionFlag {
    /// Bit of this flag as used in the `nzp` mask of `BR`.
    #[must_use]
    pub const fn bit(self) -> u16 {
        self as u16
    }
}

impl From<u16> for ConditionFlag {
    fn from(value: u16) -> Self {
        if value == 0 {
            Self::Zero
        } else if value >> 15 == 1 {
            // leftmost bit is 1 for negative numbers
            Self::Neg
        } else {
            Self::Pos
        }
    }
}
