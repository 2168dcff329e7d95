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

//! Bucket boundary bit vectors with select-1 support.
//!
//! The bucketed indexes delimit bucket boundaries with a bit vector C of
//! length `buckets + entries`: the i-th one-bit (1-indexed) marks the end of
//! bucket i-1, and the zeros between consecutive ones stand for the entries
//! of that bucket. `select1(i)` then yields bucket slices in O(1) probes:
//!
//! ```text
//! l = if b == 0 { 0 } else { select1(b) - b + 1 }
//! r = select1(b + 1) - (b + 1) + 1
//! ```
//!
//! The select structure is owned by the vector itself, so a clone or a load
//! can never leave a support structure pointing at someone else's bits.
//!
//! # Layout
//!
//! [`DenseBitVector`] keeps the raw words plus two acceleration arrays:
//! cumulative one-counts per 512-bit superblock, and for every 512th one-bit
//! the superblock that holds it. A select probe jumps to the sampled
//! superblock, binary-searches the cumulative counts between two samples,
//! and finishes with at most eight word popcounts.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};

use crate::error::{HammDbError, Result};

/// Bits per superblock (8 words).
const SUPERBLOCK_BITS: usize = 512;
const WORDS_PER_SUPERBLOCK: usize = SUPERBLOCK_BITS / 64;
/// One position sample per this many one-bits.
const SELECT_SAMPLE: u64 = 512;

/// A bit vector supporting `select1`, interchangeable between a plain dense
/// representation and a sparse Elias-Fano one.
pub trait SelectBitVector: Clone {
    /// Build a vector of `len` bits with ones at the given strictly
    /// increasing positions.
    fn build(len: u64, ones: &[u64]) -> Self;

    /// Position of the `k`-th one-bit, 1-indexed. `k` must be in
    /// `1..=count_ones()`.
    fn select1(&self, k: u64) -> u64;

    /// Total number of bits.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of one-bits.
    fn count_ones(&self) -> u64;

    fn serialize<W: Write>(&self, out: &mut W) -> Result<()>;

    fn load<R: Read>(input: &mut R) -> Result<Self>;
}

#[derive(Clone, PartialEq, Eq)]
pub struct DenseBitVector {
    words: Vec<u64>,
    len: u64,
    ones: u64,
    /// Number of one-bits before each superblock; one sentinel entry at the
    /// end holding the total.
    superblock_ranks: Vec<u64>,
    /// For sample s, the superblock containing the (s * 512 + 1)-th one-bit.
    select_samples: Vec<u64>,
}

impl fmt::Debug for DenseBitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseBitVector")
            .field("len", &self.len)
            .field("ones", &self.ones)
            .finish()
    }
}

/// Position of the `r`-th (0-indexed) set bit inside `word`.
#[inline]
fn select_in_word(mut word: u64, r: u64) -> u64 {
    debug_assert!(r < word.count_ones() as u64);
    for _ in 0..r {
        word &= word - 1;
    }
    word.trailing_zeros() as u64
}

impl DenseBitVector {
    /// Read the bit at position `i`.
    #[inline]
    pub fn get(&self, i: u64) -> bool {
        debug_assert!(i < self.len);
        (self.words[(i / 64) as usize] >> (i % 64)) & 1 == 1
    }

    fn num_superblocks(&self) -> usize {
        self.words.len().div_ceil(WORDS_PER_SUPERBLOCK)
    }

    fn build_support(words: &[u64], ones: u64) -> (Vec<u64>, Vec<u64>) {
        let num_superblocks = words.len().div_ceil(WORDS_PER_SUPERBLOCK);
        let mut superblock_ranks = Vec::with_capacity(num_superblocks + 1);
        let mut select_samples =
            Vec::with_capacity((ones.div_ceil(SELECT_SAMPLE)) as usize);

        let mut total = 0u64;
        for sb in 0..num_superblocks {
            superblock_ranks.push(total);
            let begin = sb * WORDS_PER_SUPERBLOCK;
            let end = (begin + WORDS_PER_SUPERBLOCK).min(words.len());
            let in_block: u64 = words[begin..end]
                .iter()
                .map(|w| w.count_ones() as u64)
                .sum();
            while (select_samples.len() as u64) * SELECT_SAMPLE < total + in_block {
                select_samples.push(sb as u64);
            }
            total += in_block;
        }
        superblock_ranks.push(total);
        debug_assert_eq!(total, ones);
        (superblock_ranks, select_samples)
    }
}

impl SelectBitVector for DenseBitVector {
    fn build(len: u64, ones: &[u64]) -> Self {
        let mut words = vec![0u64; (len as usize).div_ceil(64)];
        let mut prev = None;
        for &p in ones {
            debug_assert!(p < len, "one-bit position {p} beyond length {len}");
            debug_assert!(prev.map_or(true, |q| q < p), "positions must increase");
            prev = Some(p);
            words[(p / 64) as usize] |= 1u64 << (p % 64);
        }
        let (superblock_ranks, select_samples) =
            Self::build_support(&words, ones.len() as u64);
        Self {
            words,
            len,
            ones: ones.len() as u64,
            superblock_ranks,
            select_samples,
        }
    }

    fn select1(&self, k: u64) -> u64 {
        debug_assert!(k >= 1 && k <= self.ones, "select1({k}) with {} ones", self.ones);
        let t = k - 1;

        let sample = (t / SELECT_SAMPLE) as usize;
        let mut lo = self.select_samples[sample] as usize;
        let mut hi = if sample + 1 < self.select_samples.len() {
            self.select_samples[sample + 1] as usize + 1
        } else {
            self.num_superblocks()
        };
        // last superblock whose starting rank is <= t
        while lo + 1 < hi {
            let mid = lo + (hi - lo) / 2;
            if self.superblock_ranks[mid] <= t {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let mut rank = t - self.superblock_ranks[lo];
        let mut word = lo * WORDS_PER_SUPERBLOCK;
        loop {
            let in_word = self.words[word].count_ones() as u64;
            if rank < in_word {
                return (word as u64) * 64 + select_in_word(self.words[word], rank);
            }
            rank -= in_word;
            word += 1;
        }
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn count_ones(&self) -> u64 {
        self.ones
    }

    /// Stream layout: len, ones, raw words, superblock ranks, select samples.
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_u64::<LittleEndian>(self.len)?;
        out.write_u64::<LittleEndian>(self.ones)?;
        for &w in &self.words {
            out.write_u64::<LittleEndian>(w)?;
        }
        out.write_u64::<LittleEndian>(self.superblock_ranks.len() as u64)?;
        for &r in &self.superblock_ranks {
            out.write_u64::<LittleEndian>(r)?;
        }
        out.write_u64::<LittleEndian>(self.select_samples.len() as u64)?;
        for &s in &self.select_samples {
            out.write_u64::<LittleEndian>(s)?;
        }
        Ok(())
    }

    fn load<R: Read>(input: &mut R) -> Result<Self> {
        let len = input.read_u64::<LittleEndian>()?;
        let ones = input.read_u64::<LittleEndian>()?;
        let mut words = vec![0u64; (len as usize).div_ceil(64)];
        for w in &mut words {
            *w = input.read_u64::<LittleEndian>()?;
        }
        let actual: u64 = words.iter().map(|w| w.count_ones() as u64).sum();
        if actual != ones {
            return Err(HammDbError::Corruption(format!(
                "bit vector header claims {ones} ones, payload has {actual}"
            )));
        }

        let num_ranks = input.read_u64::<LittleEndian>()? as usize;
        if num_ranks != words.len().div_ceil(WORDS_PER_SUPERBLOCK) + 1 {
            return Err(HammDbError::Corruption(
                "superblock rank table size mismatch".to_string(),
            ));
        }
        let mut superblock_ranks = vec![0u64; num_ranks];
        for r in &mut superblock_ranks {
            *r = input.read_u64::<LittleEndian>()?;
        }

        let num_samples = input.read_u64::<LittleEndian>()? as usize;
        if num_samples as u64 != ones.div_ceil(SELECT_SAMPLE) {
            return Err(HammDbError::Corruption(
                "select sample table size mismatch".to_string(),
            ));
        }
        let mut select_samples = vec![0u64; num_samples];
        for s in &mut select_samples {
            *s = input.read_u64::<LittleEndian>()?;
        }

        Ok(Self {
            words,
            len,
            ones,
            superblock_ranks,
            select_samples,
        })
    }
}
