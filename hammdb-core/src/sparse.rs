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

//! Sparse Elias-Fano bit vector.
//!
//! Stores m one-bit positions out of a universe of u bits in roughly
//! m * (2 + log2(u/m)) bits. Each position is split into a low part of
//! l = floor(log2(u/m)) bits, stored verbatim in a packed array, and a high
//! part, stored in unary in a dense bit vector: the i-th one of the high
//! vector sits at position high(p_i) + i. Select-1 is then one dense select
//! plus one packed-array read.
//!
//! Useful when the bucket universe is large compared to the number of
//! stored entries, where a plain dense boundary vector would be mostly
//! zeros.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};

use crate::bitvec::{DenseBitVector, SelectBitVector};
use crate::error::{HammDbError, Result};
use crate::int_vector::IntVector;

#[derive(Clone)]
pub struct SparseBitVector {
    universe: u64,
    num_ones: u64,
    low_width: u8,
    low: IntVector,
    high: DenseBitVector,
}

impl fmt::Debug for SparseBitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseBitVector")
            .field("len", &self.universe)
            .field("ones", &self.num_ones)
            .field("low_width", &self.low_width)
            .finish()
    }
}

impl SparseBitVector {
    fn split_width(universe: u64, num_ones: u64) -> u8 {
        if num_ones == 0 || universe <= num_ones {
            return 0;
        }
        (universe / num_ones).ilog2() as u8
    }
}

impl SelectBitVector for SparseBitVector {
    fn build(len: u64, ones: &[u64]) -> Self {
        let num_ones = ones.len() as u64;
        let low_width = Self::split_width(len, num_ones);

        let mut low = IntVector::new(
            if low_width > 0 { ones.len() } else { 0 },
            low_width.max(1),
        );
        let high_len = num_ones + (len >> low_width) + 1;
        let mut high_ones = Vec::with_capacity(ones.len());
        let mut prev = None;
        for (i, &p) in ones.iter().enumerate() {
            debug_assert!(p < len, "one-bit position {p} beyond length {len}");
            debug_assert!(prev.map_or(true, |q| q < p), "positions must increase");
            prev = Some(p);
            if low_width > 0 {
                low.set(i, p & ((1u64 << low_width) - 1));
            }
            high_ones.push((p >> low_width) + i as u64);
        }
        let high = DenseBitVector::build(high_len, &high_ones);

        Self {
            universe: len,
            num_ones,
            low_width,
            low,
            high,
        }
    }

    fn select1(&self, k: u64) -> u64 {
        debug_assert!(k >= 1 && k <= self.num_ones);
        let i = k - 1;
        let high_part = self.high.select1(k) - i;
        if self.low_width > 0 {
            (high_part << self.low_width) | self.low.get(i as usize)
        } else {
            high_part
        }
    }

    fn len(&self) -> u64 {
        self.universe
    }

    fn count_ones(&self) -> u64 {
        self.num_ones
    }

    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_u64::<LittleEndian>(self.universe)?;
        out.write_u64::<LittleEndian>(self.num_ones)?;
        out.write_u8(self.low_width)?;
        self.low.serialize(out)?;
        self.high.serialize(out)?;
        Ok(())
    }

    fn load<R: Read>(input: &mut R) -> Result<Self> {
        let universe = input.read_u64::<LittleEndian>()?;
        let num_ones = input.read_u64::<LittleEndian>()?;
        let low_width = input.read_u8()?;
        if low_width > 63 {
            return Err(HammDbError::Corruption(format!(
                "sparse vector low width {low_width} out of range"
            )));
        }
        let low = IntVector::load(input)?;
        let high = DenseBitVector::load(input)?;
        let expected_low = if low_width > 0 { num_ones } else { 0 };
        if low.len() as u64 != expected_low {
            return Err(HammDbError::Corruption(format!(
                "sparse vector low part holds {} values, expected {expected_low}",
                low.len()
            )));
        }
        if high.count_ones() != num_ones {
            return Err(HammDbError::Corruption(format!(
                "sparse vector claims {num_ones} ones, high part has {}",
                high.count_ones()
            )));
        }
        Ok(Self {
            universe,
            num_ones,
            low_width,
            low,
            high,
        })
    }
}
