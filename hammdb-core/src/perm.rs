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

//! Block permutations of 64-bit keys.
//!
//! A key is cut into `B` meta-symbol blocks (widths summing to 64, the
//! most significant block first). Each permutation of the family moves a
//! distinct subset of `B - K` blocks to the top of the word; the family
//! enumerates all C(B, B-K) such subsets. Two keys within Hamming distance
//! K disagree in at most K blocks, so they agree on every block of at least
//! one subset, and under that permutation they share the top
//! `splitter_bits` bits. An index per permutation therefore catches every
//! match in some instance's prefix bucket.
//!
//! The layout of each instance is computed at compile time from the three
//! const parameters; `forward` and `inverse` are branch-free block
//! shuffles over precomputed shifts.

/// Upper bound on the number of meta-symbol blocks.
pub const MAX_BLOCKS: usize = 8;

/// Capability contract every index variant is generic over: a bijection on
/// 64-bit words together with its meta-symbol geometry.
pub trait PermutationFamily {
    /// Number of meta-symbol blocks (t_b).
    const BLOCKS: usize;
    /// Maximum number of errors the family is designed for (t_k).
    const MAX_ERRORS: usize;
    /// Blocks forming the splitter prefix: `BLOCKS - MAX_ERRORS`.
    const MATCH_LEN: usize;
    /// Which permutation of the family this instance is.
    const ID: usize;
    /// Total width of the top `MATCH_LEN` permuted blocks.
    const SPLITTER_BITS: u32;

    /// Apply the permutation.
    fn forward(x: u64) -> u64;

    /// Undo the permutation: `inverse(forward(x)) == x`.
    fn inverse(x: u64) -> u64;

    /// Width in bits of the permuted block at position `pos`, most
    /// significant block first.
    fn block_width(pos: usize) -> u32;
}

const fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let mut result = 1usize;
    let mut i = 0;
    while i < k {
        result = result * (n - i) / (i + 1);
        i += 1;
    }
    result
}

const fn low_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Precomputed geometry of one family member.
#[derive(Clone, Copy)]
pub struct PermLayout {
    /// Block widths in the original layout, most significant block first.
    widths: [u8; MAX_BLOCKS],
    /// `order[p]` is the original index of the block at permuted position
    /// `p`, most significant position first.
    order: [u8; MAX_BLOCKS],
    blocks: usize,
    splitter_bits: u32,
}

impl PermLayout {
    pub const fn compute(blocks: usize, max_errors: usize, id: usize) -> Self {
        assert!(blocks >= 1 && blocks <= MAX_BLOCKS, "block count out of range");
        assert!(max_errors < blocks, "error bound must leave at least one splitter block");
        let match_len = blocks - max_errors;
        assert!(id < binomial(blocks, match_len), "permutation id out of range");

        // uniform widths, remainder spread over the leading blocks
        let mut widths = [0u8; MAX_BLOCKS];
        let base = (64 / blocks) as u8;
        let remainder = 64 % blocks;
        let mut i = 0;
        while i < blocks {
            widths[i] = base + if i < remainder { 1 } else { 0 };
            i += 1;
        }

        // unrank the id-th match_len-subset of blocks, lexicographic order
        let mut chosen = [false; MAX_BLOCKS];
        let mut rank = id;
        let mut need = match_len;
        let mut b = 0;
        while b < blocks && need > 0 {
            let subsets_with_b = binomial(blocks - b - 1, need - 1);
            if rank < subsets_with_b {
                chosen[b] = true;
                need -= 1;
            } else {
                rank -= subsets_with_b;
            }
            b += 1;
        }

        // chosen blocks become the prefix, the rest follow, both keeping
        // their original relative order
        let mut order = [0u8; MAX_BLOCKS];
        let mut p = 0;
        let mut i = 0;
        while i < blocks {
            if chosen[i] {
                order[p] = i as u8;
                p += 1;
            }
            i += 1;
        }
        let mut i = 0;
        while i < blocks {
            if !chosen[i] {
                order[p] = i as u8;
                p += 1;
            }
            i += 1;
        }

        let mut splitter_bits = 0u32;
        let mut p = 0;
        while p < match_len {
            splitter_bits += widths[order[p] as usize] as u32;
            p += 1;
        }

        Self {
            widths,
            order,
            blocks,
            splitter_bits,
        }
    }

    /// Right shift that brings original block `block` to the bottom of the
    /// word.
    const fn source_shift(&self, block: usize) -> u32 {
        let mut used = 0u32;
        let mut i = 0;
        while i <= block {
            used += self.widths[i] as u32;
            i += 1;
        }
        64 - used
    }

    pub const fn splitter_bits(&self) -> u32 {
        self.splitter_bits
    }

    pub const fn permute(&self, x: u64) -> u64 {
        let mut out = 0u64;
        let mut placed = 0u32;
        let mut p = 0;
        while p < self.blocks {
            let block = self.order[p] as usize;
            let width = self.widths[block] as u32;
            let value = (x >> self.source_shift(block)) & low_mask(width);
            placed += width;
            out |= value << (64 - placed);
            p += 1;
        }
        out
    }

    pub const fn unpermute(&self, x: u64) -> u64 {
        let mut out = 0u64;
        let mut consumed = 0u32;
        let mut p = 0;
        while p < self.blocks {
            let block = self.order[p] as usize;
            let width = self.widths[block] as u32;
            consumed += width;
            let value = (x >> (64 - consumed)) & low_mask(width);
            out |= value << self.source_shift(block);
            p += 1;
        }
        out
    }
}

/// The concrete family: `B` blocks, up to `K` errors, instance `ID` in
/// `0..C(B, B-K)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockPermutation<const B: usize, const K: usize, const ID: usize>;

impl<const B: usize, const K: usize, const ID: usize> BlockPermutation<B, K, ID> {
    const LAYOUT: PermLayout = PermLayout::compute(B, K, ID);

    /// Number of permutations in the family for these parameters.
    pub const fn family_size() -> usize {
        binomial(B, B - K)
    }
}

impl<const B: usize, const K: usize, const ID: usize> PermutationFamily
    for BlockPermutation<B, K, ID>
{
    const BLOCKS: usize = B;
    const MAX_ERRORS: usize = K;
    const MATCH_LEN: usize = B - K;
    const ID: usize = ID;
    const SPLITTER_BITS: u32 = Self::LAYOUT.splitter_bits;

    #[inline]
    fn forward(x: u64) -> u64 {
        Self::LAYOUT.permute(x)
    }

    #[inline]
    fn inverse(x: u64) -> u64 {
        Self::LAYOUT.unpermute(x)
    }

    #[inline]
    fn block_width(pos: usize) -> u32 {
        Self::LAYOUT.widths[Self::LAYOUT.order[pos] as usize] as u32
    }
}
