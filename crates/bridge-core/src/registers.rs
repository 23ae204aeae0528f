use crate::error::DecodeError;

/// Offset between a zero-based holding-register offset and its 4xxxx
/// logical address.
pub const HOLDING_REGISTER_BASE: u32 = 40001;

/// Register slots occupied by one 32-bit float.
pub const WORDS_PER_FLOAT: u16 = 2;

/// Logical address of the `index`-th float in a block read from
/// `start_address`.
pub fn logical_address(start_address: u16, index: usize) -> u32 {
    HOLDING_REGISTER_BASE + u32::from(start_address) + (index as u32) * u32::from(WORDS_PER_FLOAT)
}

/// One decoded float at a position within a cycle's read block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    pub index: usize,
    pub address: u32,
    pub value: f32,
}

/// Pair the decoded floats with their logical addresses, in block order.
pub fn readings(start_address: u16, values: &[f32]) -> impl Iterator<Item = RawReading> + '_ {
    values
        .iter()
        .enumerate()
        .map(move |(index, &value)| RawReading {
            index,
            address: logical_address(start_address, index),
            value,
        })
}

/// Decode `count` floats from big-endian word order (high word first).
pub fn decode_float_block(words: &[u16], count: u16) -> Result<Vec<f32>, DecodeError> {
    let expected = usize::from(count) * usize::from(WORDS_PER_FLOAT);
    if words.len() != expected {
        return Err(DecodeError::LengthMismatch {
            expected,
            actual: words.len(),
        });
    }

    Ok(words
        .chunks_exact(usize::from(WORDS_PER_FLOAT))
        .map(|pair| {
            let bits = (u32::from(pair[0]) << 16) | u32::from(pair[1]);
            f32::from_bits(bits)
        })
        .collect())
}

/// Inverse of [`decode_float_block`]; used by simulators and tests.
pub fn encode_float_block(values: &[f32]) -> Vec<u16> {
    values
        .iter()
        .flat_map(|v| {
            let bits = v.to_bits();
            [(bits >> 16) as u16, bits as u16]
        })
        .collect()
}
