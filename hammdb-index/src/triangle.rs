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

//! Cardinality-bucketed index with a vectorized pre-filter.
//!
//! Buckets are keyed by a shortened permuted prefix plus the key's
//! popcount. For a query q and any key y, the triangle inequality gives
//! `H(q, y) >= |popcount(q) - popcount(y)|`, so within a prefix only the
//! cardinality sub-buckets in `[popcount(q) - k, popcount(q) + k]` can
//! contain matches, and they are stored contiguously. Six bits of the
//! splitter are spent on the cardinality, making the scanned prefix
//! coarser but the scanned slice far narrower.
//!
//! Within the slice, entries are not compared in full immediately. Let the
//! permuted key be `high | mid | low` with a 32-bit low part. The store
//! keeps `low ^ mid` (a 32-bit digest) and `mid` in two parallel vectors.
//! The digest of the query and the digest of an entry XOR to
//! `(q_low ^ low) ^ (q_mid ^ mid)`, whose popcount never exceeds the
//! entry's true Hamming distance to q, so comparing it against k is a safe
//! first cut that touches 4 bytes per entry. Only survivors reassemble the
//! full word from `mid` and the shared prefix for the exact check. The
//! sweep over digests is vectorized four lanes at a time (see
//! [`crate::simd`]).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};
use std::marker::PhantomData;
use tracing::debug;

use hammdb_core::bitvec::SelectBitVector;
use hammdb_core::error::{HammDbError, Result};
use hammdb_core::int_vector::IntVector;
use hammdb_core::perm::PermutationFamily;
use hammdb_core::DenseBitVector;

use crate::simd;

/// Bits of the splitter spent on the key's popcount.
const DISTANCE_BITS: u32 = 6;
/// Width of the digested low part. Keep word aligned.
const LOW_BITS: u32 = 32;
const LOW_MASK: u64 = (1u64 << LOW_BITS) - 1;
/// Largest possible cardinality of a 64-bit key.
const MAX_CARDINALITY: u64 = 64;

pub struct TriangleIndex<P: PermutationFamily, V: SelectBitVector = DenseBitVector> {
    n: u64,
    low_entries: Vec<u32>,
    mid_entries: IntVector,
    boundaries: V,
    _perm: PhantomData<P>,
}

impl<P: PermutationFamily, V: SelectBitVector> TriangleIndex<P, V> {
    /// Permuted prefix bits that survive after the cardinality takes its
    /// share of the splitter.
    const PREFIX_BITS: u32 = {
        assert!(
            P::SPLITTER_BITS > DISTANCE_BITS,
            "splitter too narrow to carry the cardinality field"
        );
        assert!(
            P::SPLITTER_BITS - DISTANCE_BITS < LOW_BITS,
            "prefix would swallow the mid part"
        );
        P::SPLITTER_BITS - DISTANCE_BITS
    };
    const MID_BITS: u8 = (LOW_BITS - Self::PREFIX_BITS) as u8;
    const MID_MASK: u64 = (1u64 << Self::MID_BITS) - 1;
    const HIGH_SHIFT: u32 = 64 - Self::PREFIX_BITS;

    /// One bucket per (prefix, cardinality) pair. Cardinality runs over
    /// 0..=64, so the last prefix owns one bucket beyond the two-power
    /// universe; every other (prefix, 64) slot aliases an always-empty
    /// (prefix + 1, 0) slot, because cardinality 64 forces an all-ones
    /// prefix and cardinality 0 an all-zeros one.
    const BUCKETS: u64 = (1u64 << P::SPLITTER_BITS) + 1;

    #[inline]
    fn bucket_of(x: u64) -> u64 {
        (P::forward(x) >> Self::HIGH_SHIFT) << DISTANCE_BITS | x.count_ones() as u64
    }

    #[inline]
    fn bucket_left(x: u64, errors: u8) -> u64 {
        let cardinality = (x.count_ones() as u64).saturating_sub(errors as u64);
        (P::forward(x) >> Self::HIGH_SHIFT) << DISTANCE_BITS | cardinality
    }

    #[inline]
    fn bucket_right(x: u64, errors: u8) -> u64 {
        let cardinality = (x.count_ones() as u64 + errors as u64).min(MAX_CARDINALITY);
        (P::forward(x) >> Self::HIGH_SHIFT) << DISTANCE_BITS | cardinality
    }

    /// Build the index over `keys`. Duplicates are kept, one entry per
    /// occurrence.
    pub fn new(keys: &[u64]) -> Self {
        let n = keys.len() as u64;
        let buckets = Self::BUCKETS as usize;

        let mut cursors = vec![0u64; buckets + 1];
        for &x in keys {
            cursors[Self::bucket_of(x) as usize] += 1;
        }

        let mut delimiters = Vec::with_capacity(buckets);
        let mut running = 0u64;
        let mut occupied = 0u64;
        let mut widest = 0u64;
        for (b, &count) in cursors[..buckets].iter().enumerate() {
            if count > 0 {
                occupied += 1;
                widest = widest.max(count);
            }
            running += count;
            delimiters.push(running + b as u64);
        }
        let boundaries = V::build(Self::BUCKETS + n, &delimiters);

        // exclusive prefix sums, offset by the bucket id so the cursor
        // sequence stays strictly monotone; the id is subtracted again on
        // every write
        let mut sum = cursors[0];
        cursors[0] = 0;
        for b in 1..cursors.len() {
            let current = cursors[b];
            cursors[b] = sum + b as u64;
            sum += current;
        }

        let mut low_entries = vec![0u32; keys.len()];
        let mut mid_entries = IntVector::new(keys.len(), Self::MID_BITS);
        for &x in keys {
            let b = Self::bucket_of(x) as usize;
            let slot = (cursors[b] - b as u64) as usize;
            let permuted = P::forward(x);
            let low = permuted & LOW_MASK;
            let mid = (permuted >> LOW_BITS) & Self::MID_MASK;
            low_entries[slot] = (low ^ mid) as u32;
            mid_entries.set(slot, mid);
            cursors[b] += 1;
        }

        debug!(
            n,
            splitter_bits = P::SPLITTER_BITS,
            prefix_bits = Self::PREFIX_BITS,
            occupied_buckets = occupied,
            widest_bucket = widest,
            "built triangle bucket index"
        );

        Self {
            n,
            low_entries,
            mid_entries,
            boundaries,
            _perm: PhantomData,
        }
    }

    /// Report every indexed key within Hamming distance `errors` of `q`,
    /// together with the number of entries examined across the cardinality
    /// range. With `candidates_only` the scan is skipped and only the
    /// count is returned.
    ///
    /// Results come back in no particular order; duplicate keys are
    /// reported once per stored occurrence.
    pub fn match_keys(
        &self,
        q: u64,
        errors: u8,
        candidates_only: bool,
    ) -> Result<(Vec<u64>, u64)> {
        if errors as usize > P::MAX_ERRORS {
            return Err(HammDbError::InvalidArgument(format!(
                "error bound {errors} exceeds index maximum {}",
                P::MAX_ERRORS
            )));
        }

        let left = Self::bucket_left(q, errors);
        let right = Self::bucket_right(q, errors);
        let l = if left == 0 {
            0
        } else {
            self.boundaries.select1(left) - left + 1
        };
        let r = self.boundaries.select1(right + 1) - (right + 1) + 1;
        let candidates = r - l;

        let mut results = Vec::new();
        if candidates_only {
            return Ok((results, candidates));
        }
        if errors >= 6 {
            results.reserve(128);
        }

        let q_permuted = P::forward(q);
        let q_high = (q_permuted >> Self::HIGH_SHIFT) << Self::HIGH_SHIFT;
        let q_low = q_permuted & LOW_MASK;
        let q_mid = (q_permuted >> LOW_BITS) & Self::MID_MASK;
        let q_digest = (q_low ^ q_mid) as u32;

        let slice = &self.low_entries[l as usize..r as usize];
        let mid_entries = &self.mid_entries;
        simd::filter_candidates(slice, q_digest, errors, |i| {
            let mid = mid_entries.get(l as usize + i);
            let low = slice[i] as u64 ^ mid;
            let entry = q_high | (mid << LOW_BITS) | low;
            if (q_permuted ^ entry).count_ones() <= errors as u32 {
                results.push(P::inverse(entry));
            }
        });
        Ok((results, candidates))
    }

    /// Number of indexed keys.
    pub fn size(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Stream layout: n, digest store, mid store, boundary vector with its
    /// select support. All integers little-endian.
    pub fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_u64::<LittleEndian>(self.n)?;
        out.write_u64::<LittleEndian>(self.low_entries.len() as u64)?;
        for &d in &self.low_entries {
            out.write_u32::<LittleEndian>(d)?;
        }
        self.mid_entries.serialize(out)?;
        self.boundaries.serialize(out)?;
        Ok(())
    }

    /// Read an index previously written by [`TriangleIndex::serialize`].
    pub fn load<R: Read>(input: &mut R) -> Result<Self> {
        let n = input.read_u64::<LittleEndian>()?;
        let num_digests = input.read_u64::<LittleEndian>()?;
        if num_digests != n {
            return Err(HammDbError::Corruption(format!(
                "digest store holds {num_digests} entries, header says {n}"
            )));
        }
        let mut low_entries = vec![0u32; num_digests as usize];
        for d in &mut low_entries {
            *d = input.read_u32::<LittleEndian>()?;
        }
        let mid_entries = IntVector::load(input)?;
        let boundaries = V::load(input)?;
        if mid_entries.len() as u64 != n || mid_entries.width() != Self::MID_BITS {
            return Err(HammDbError::Corruption(format!(
                "mid store shape {}x{} does not match header n={n}",
                mid_entries.len(),
                mid_entries.width()
            )));
        }
        if boundaries.count_ones() != Self::BUCKETS
            || boundaries.len() != Self::BUCKETS + n
        {
            return Err(HammDbError::Corruption(
                "boundary vector does not delimit the bucket universe".to_string(),
            ));
        }
        Ok(Self {
            n,
            low_entries,
            mid_entries,
            boundaries,
            _perm: PhantomData,
        })
    }
}

impl<P: PermutationFamily, V: SelectBitVector> Clone for TriangleIndex<P, V> {
    fn clone(&self) -> Self {
        Self {
            n: self.n,
            low_entries: self.low_entries.clone(),
            mid_entries: self.mid_entries.clone(),
            boundaries: self.boundaries.clone(),
            _perm: PhantomData,
        }
    }
}

impl<P: PermutationFamily, V: SelectBitVector> fmt::Debug for TriangleIndex<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriangleIndex")
            .field("n", &self.n)
            .field("splitter_bits", &P::SPLITTER_BITS)
            .field("permutation", &P::ID)
            .finish()
    }
}
