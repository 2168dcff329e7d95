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

//! Prefix-bucketed index with a linear popcount sweep.
//!
//! Keys are permuted and partitioned by their top `splitter_bits` bits.
//! A query visits exactly one bucket and popcount-checks every entry in
//! it. Entries store only the low `64 - splitter_bits` bits; the bucket id
//! supplies the rest. Bucket boundaries are read off a delimiter bit
//! vector with select-1 (see [`hammdb_core::bitvec`]), and construction is
//! a two-pass counting sort over bucket ids.

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

pub struct SimpleIndex<P: PermutationFamily, V: SelectBitVector = DenseBitVector> {
    n: u64,
    entries: IntVector,
    boundaries: V,
    _perm: PhantomData<P>,
}

impl<P: PermutationFamily, V: SelectBitVector> SimpleIndex<P, V> {
    /// Payload bits per entry; the bucket id implies the rest.
    const ENTRY_WIDTH: u8 = {
        assert!(
            P::SPLITTER_BITS >= 1 && P::SPLITTER_BITS <= 63,
            "splitter must leave between 1 and 63 payload bits"
        );
        (64 - P::SPLITTER_BITS) as u8
    };

    /// Number of prefix buckets.
    const BUCKETS: u64 = 1u64 << P::SPLITTER_BITS;

    #[inline]
    fn bucket_of(x: u64) -> u64 {
        P::forward(x) >> (64 - P::SPLITTER_BITS)
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

        // the delimiter for bucket b sits after all entries of buckets..=b
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

        let mut entries = IntVector::new(keys.len(), Self::ENTRY_WIDTH);
        for &x in keys {
            let b = Self::bucket_of(x) as usize;
            entries.set((cursors[b] - b as u64) as usize, P::forward(x));
            cursors[b] += 1;
        }

        debug!(
            n,
            splitter_bits = P::SPLITTER_BITS,
            occupied_buckets = occupied,
            widest_bucket = widest,
            "built simple bucket index"
        );

        Self {
            n,
            entries,
            boundaries,
            _perm: PhantomData,
        }
    }

    /// Entry range `[l, r)` covered by `bucket`.
    #[inline]
    fn bucket_slice(&self, bucket: u64) -> (u64, u64) {
        let l = if bucket == 0 {
            0
        } else {
            self.boundaries.select1(bucket) - bucket + 1
        };
        let r = self.boundaries.select1(bucket + 1) - (bucket + 1) + 1;
        (l, r)
    }

    /// Report every indexed key within Hamming distance `errors` of `q`,
    /// together with the number of entries examined. With
    /// `candidates_only` the scan is skipped and only the count is
    /// returned.
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

        let bucket = Self::bucket_of(q);
        let (l, r) = self.bucket_slice(bucket);
        let candidates = r - l;

        let mut results = Vec::new();
        if candidates_only {
            return Ok((results, candidates));
        }

        let q_payload = P::forward(q) & ((1u64 << Self::ENTRY_WIDTH) - 1);
        let prefix = bucket << Self::ENTRY_WIDTH;
        for i in l..r {
            let entry = self.entries.get(i as usize);
            if (q_payload ^ entry).count_ones() <= errors as u32 {
                results.push(P::inverse(entry | prefix));
            }
        }
        Ok((results, candidates))
    }

    /// Number of indexed keys.
    pub fn size(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Stream layout: n, entry store, boundary vector with its select
    /// support. All integers little-endian.
    pub fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_u64::<LittleEndian>(self.n)?;
        self.entries.serialize(out)?;
        self.boundaries.serialize(out)?;
        Ok(())
    }

    /// Read an index previously written by [`SimpleIndex::serialize`].
    pub fn load<R: Read>(input: &mut R) -> Result<Self> {
        let n = input.read_u64::<LittleEndian>()?;
        let entries = IntVector::load(input)?;
        let boundaries = V::load(input)?;
        if entries.len() as u64 != n || entries.width() != Self::ENTRY_WIDTH {
            return Err(HammDbError::Corruption(format!(
                "entry store shape {}x{} does not match header n={n}",
                entries.len(),
                entries.width()
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
            entries,
            boundaries,
            _perm: PhantomData,
        })
    }
}

impl<P: PermutationFamily, V: SelectBitVector> Clone for SimpleIndex<P, V> {
    fn clone(&self) -> Self {
        Self {
            n: self.n,
            entries: self.entries.clone(),
            boundaries: self.boundaries.clone(),
            _perm: PhantomData,
        }
    }
}

impl<P: PermutationFamily, V: SelectBitVector> fmt::Debug for SimpleIndex<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleIndex")
            .field("n", &self.n)
            .field("splitter_bits", &P::SPLITTER_BITS)
            .field("permutation", &P::ID)
            .finish()
    }
}
