use bitvec::prelude::*;
use thiserror::Error;

/// Reads unsigned integers of arbitrary bit width in least significant bit first order.
pub struct BitReader {
    bits: BitVec<u8, Lsb0>,
    index: usize,
}

#[derive(Debug, Error)]
pub enum BitReadError {
    #[error("Failed to read enough bits from reader.")]
    NotEnoughBits,

    #[error("Cannot read {bit_count} bits into a 32 bit value.")]
    InvalidBitCount { bit_count: usize },
}

impl BitReader {
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            bits: BitVec::from_slice(bytes),
            index: 0,
        }
    }

    /// The number of bits read so far.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Reads the next `bit_count` bits as an unsigned integer.
    /// Reading 0 bits always succeeds and returns 0 without advancing.
    /// Reading more than 32 bits is an error.
    pub fn read_u32(&mut self, bit_count: usize) -> Result<u32, BitReadError> {
        if bit_count == 0 {
            return Ok(0);
        }
        if bit_count > u32::BITS as usize {
            return Err(BitReadError::InvalidBitCount { bit_count });
        }

        let end = self
            .index
            .checked_add(bit_count)
            .ok_or(BitReadError::NotEnoughBits)?;
        let value: u32 = self
            .bits
            .as_bitslice()
            .get(self.index..end)
            .ok_or(BitReadError::NotEnoughBits)?
            .load_le();
        self.index = end;

        Ok(value)
    }

    pub fn read_bit(&mut self) -> Result<bool, BitReadError> {
        let value = self
            .bits
            .get(self.index)
            .as_deref()
            .copied()
            .ok_or(BitReadError::NotEnoughBits)?;

        self.index += 1;

        Ok(value)
    }
}

/// Appends unsigned integers of arbitrary bit width in least significant bit first order.
/// Values are packed without any alignment between them.
#[derive(Default)]
pub struct BitWriter {
    bits: BitVec<u8, Lsb0>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self { bits: BitVec::new() }
    }

    /// The number of bits written so far.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Appends the lowest `bit_count` bits of `value`.
    /// Writing 0 bits does nothing.
    pub fn write(&mut self, value: u32, bit_count: usize) {
        if bit_count == 0 {
            return;
        }

        // Wider values don't fit in the u32 storage.
        let bit_count = bit_count.min(u32::BITS as usize);
        let start = self.bits.len();
        self.bits.resize(start + bit_count, false);
        self.bits[start..].store_le(value);
    }

    pub fn write_bit(&mut self, value: bool) {
        self.bits.push(value);
    }

    /// Returns the packed bytes with any unused bits in the final byte set to 0.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.bits.set_uninitialized(false);
        self.bits.into_vec()
    }
}
