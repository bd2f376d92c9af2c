//! Variable-length byte encoding for unsigned integers.
//!
//! Values are split into 7-bit groups written most-significant group first.
//! The final group, which carries the least significant 7 bits, has its high
//! bit set to mark the end of the number; every other byte has the high bit
//! clear. A stream of such numbers is therefore self-delimiting.

/// High bit marking the last byte of an encoded number.
pub const TERMINATOR: u8 = 0x80;

const PAYLOAD_MASK: u8 = 0x7F;

/// Append the encoding of `value` to `out`, returning the number of bytes written.
pub fn encode_u64_into(value: u64, out: &mut Vec<u8>) -> usize {
    // 64 bits need at most ten 7-bit groups.
    let mut groups = [0u8; 10];
    let mut len = 0;
    let mut val = value;

    loop {
        groups[len] = (val as u8) & PAYLOAD_MASK;
        len += 1;
        val >>= 7;
        if val == 0 {
            break;
        }
    }

    for i in (1..len).rev() {
        out.push(groups[i]);
    }
    out.push(groups[0] | TERMINATOR);

    len
}
