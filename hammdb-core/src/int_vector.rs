// SPDX-License-Identifier: AGPL-3.0-or-later
// HammDB - Hamming Distance Multi-Index Engine
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Bit-packed vector of fixed-width integers.
//!
//! Stores `len` values of `width` bits each (1..=64), packed back to back
//! into `u64` words. Values may straddle a word boundary. This is the entry
//! store primitive for the bucketed indexes: a bucket's implied prefix bits
//! are stripped before storage, so entries only pay for the bits the bucket
//! does not already encode.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};

use crate::error::{HammDbError, Result};

#[derive(Clone, PartialEq, Eq)]
pub struct IntVector {
    words: Vec<u64>,
    len: usize,
    width: u8,
}

impl fmt::Debug for IntVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntVector")
            .field("len", &self.len)
            .field("width", &self.width)
            .finish()
    }
}

impl IntVector {
    /// Create a zero-initialized vector of `len` values, `width` bits each.
    ///
    /// # Panics
    /// Panics if `width` is 0 or greater than 64.
    pub fn new(len: usize, width: u8) -> Self {
        assert!(
            (1..=64).contains(&width),
            "IntVector width must be in 1..=64, got {width}"
        );
        let total_bits = len * width as usize;
        Self {
            words: vec![0u64; total_bits.div_ceil(64)],
            len,
            width,
        }
    }

    #[inline]
    fn value_mask(width: u8) -> u64 {
        if width == 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        }
    }

    /// Number of values stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Width in bits of each value.
    #[inline]
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Read the value at index `i`.
    #[inline]
    pub fn get(&self, i: usize) -> u64 {
        debug_assert!(i < self.len, "index {i} out of bounds (len {})", self.len);
        let bit = i * self.width as usize;
        let word = bit / 64;
        let offset = (bit % 64) as u32;
        let mut value = self.words[word] >> offset;
        if offset as usize + self.width as usize > 64 {
            // offset >= 1 whenever the value straddles into the next word
            value |= self.words[word + 1] << (64 - offset);
        }
        value & Self::value_mask(self.width)
    }

    /// Write `value` at index `i`. Bits above `width` are discarded.
    #[inline]
    pub fn set(&mut self, i: usize, value: u64) {
        debug_assert!(i < self.len, "index {i} out of bounds (len {})", self.len);
        let mask = Self::value_mask(self.width);
        let value = value & mask;
        let bit = i * self.width as usize;
        let word = bit / 64;
        let offset = (bit % 64) as u32;
        self.words[word] = (self.words[word] & !(mask << offset)) | (value << offset);
        let spill = offset as usize + self.width as usize;
        if spill > 64 {
            let high_mask = (1u64 << (spill - 64)) - 1;
            self.words[word + 1] = (self.words[word + 1] & !high_mask) | (value >> (64 - offset));
        }
    }

    /// Iterate over all values in index order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// Write the vector in little-endian framing: len, width, packed words.
    pub fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_u64::<LittleEndian>(self.len as u64)?;
        out.write_u8(self.width)?;
        for &w in &self.words {
            out.write_u64::<LittleEndian>(w)?;
        }
        Ok(())
    }

    /// Read a vector previously written by [`IntVector::serialize`].
    pub fn load<R: Read>(input: &mut R) -> Result<Self> {
        let len = input.read_u64::<LittleEndian>()? as usize;
        let width = input.read_u8()?;
        if !(1..=64).contains(&width) {
            return Err(HammDbError::Corruption(format!(
                "packed vector width {width} out of range"
            )));
        }
        let num_words = len
            .checked_mul(width as usize)
            .ok_or_else(|| {
                HammDbError::Corruption(format!("packed vector length {len} overflows"))
            })?
            .div_ceil(64);
        let mut words = vec![0u64; num_words];
        for w in &mut words {
            *w = input.read_u64::<LittleEndian>()?;
        }
        Ok(Self { words, len, width })
    }
}
