/// Implements sign extension as described at [Sign extension](https://en.wikipedia.org/wiki/Sign_extension).
///
/// Interprets the lowest `bit_count` bits of `value` as a two's complement number and
/// replicates its sign bit into all higher bits. Bits above `bit_count` are ignored.
///
/// # Panics
/// - debug asserts that `bit_count` is within `1..=16`
#[must_use]
pub const fn sign_extend(value: u16, bit_count: u8) -> u16 {
    debug_assert!(
        bit_count >= 1 && bit_count as u32 <= u16::BITS,
        "bit_count must be within 1..=16"
    );
    if bit_count as u32 >= u16::BITS {
        return value;
    }
    let bits = value & ((1 << bit_count) - 1);
    if (bits >> (bit_count - 1)) & 1 == 1 {
        // negative: 1-extend
        bits | (0xFFFF << bit_count)
    } else {
        // positive, already 0-extended
        bits
    }
}
