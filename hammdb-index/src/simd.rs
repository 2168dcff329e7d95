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

//! Vectorized 32-bit popcount filter.
//!
//! The triangle index stores a 32-bit digest per entry and discards a
//! candidate as soon as `popcount32(query_digest ^ entry_digest)` exceeds
//! the error bound, deferring the full 64-bit distance check to the few
//! survivors. This module runs that filter over a candidate slice and
//! reports survivor indices through a callback, in ascending order.
//!
//! The SSE path processes four digests per iteration:
//!
//! 1. prologue: scalar filtering until the cursor reaches a 16-byte
//!    boundary, so the body can use aligned loads;
//! 2. body: 128-bit XOR against the splatted query digest, a per-lane
//!    popcount (SSSE3 nibble table, then byte sums widened to 32 bits),
//!    a lane compare against `errors + 1`, and a byte movemask masked to
//!    one bit per lane (`0x1111`); surviving lanes are walked with
//!    find-first-set. The next block is prefetched one iteration ahead;
//! 3. epilogue: scalar filtering of the remaining tail.
//!
//! The scalar fallback visits entries in exactly the same order, so both
//! paths produce identical survivor sequences.

/// Vector instruction tier selected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdLevel {
    /// Portable scalar loop.
    Scalar,
    /// 128-bit SSE with SSSE3 byte shuffles.
    Ssse3,
}

impl SimdLevel {
    /// Detect the best available tier.
    #[cfg(target_arch = "x86_64")]
    pub fn detect() -> Self {
        if is_x86_feature_detected!("ssse3") {
            SimdLevel::Ssse3
        } else {
            SimdLevel::Scalar
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    pub fn detect() -> Self {
        SimdLevel::Scalar
    }
}

/// Run the 32-bit pre-filter over `digests`, invoking `on_candidate(i)` for
/// every index whose digest is within `max_errors` bits of `query_digest`.
/// Indices are reported in ascending order.
#[inline]
pub fn filter_candidates<F: FnMut(usize)>(
    digests: &[u32],
    query_digest: u32,
    max_errors: u8,
    on_candidate: F,
) {
    #[cfg(target_arch = "x86_64")]
    {
        if SimdLevel::detect() == SimdLevel::Ssse3 {
            let mut on_candidate = on_candidate;
            // SAFETY: SSSE3 support was just verified
            unsafe { sse::filter(digests, query_digest, max_errors, &mut on_candidate) };
            return;
        }
    }
    scalar::filter(digests, query_digest, max_errors, on_candidate);
}

/// Portable reference implementation. Kept public so equivalence tests can
/// pin the vector path against it.
pub mod scalar {
    #[inline]
    pub fn filter<F: FnMut(usize)>(
        digests: &[u32],
        query_digest: u32,
        max_errors: u8,
        mut on_candidate: F,
    ) {
        for (i, &d) in digests.iter().enumerate() {
            if (query_digest ^ d).count_ones() <= max_errors as u32 {
                on_candidate(i);
            }
        }
    }
}

#[cfg(target_arch = "x86_64")]
pub mod sse {
    use std::arch::x86_64::*;

    /// Per-lane popcount of four 32-bit lanes.
    ///
    /// Nibble-table byte popcount, then horizontal byte sums: pairs of
    /// bytes via `maddubs` against 1, pairs of 16-bit sums via `madd`
    /// against 1.
    #[inline]
    #[target_feature(enable = "ssse3")]
    unsafe fn popcount_epi32(v: __m128i) -> __m128i {
        let table = _mm_setr_epi8(0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4);
        let nibble_mask = _mm_set1_epi8(0x0f);
        let lo = _mm_and_si128(v, nibble_mask);
        let hi = _mm_and_si128(_mm_srli_epi16(v, 4), nibble_mask);
        let byte_counts = _mm_add_epi8(
            _mm_shuffle_epi8(table, lo),
            _mm_shuffle_epi8(table, hi),
        );
        let pair_sums = _mm_maddubs_epi16(byte_counts, _mm_set1_epi8(1));
        _mm_madd_epi16(pair_sums, _mm_set1_epi16(1))
    }

    /// # Safety
    /// Requires SSSE3.
    #[target_feature(enable = "ssse3")]
    pub unsafe fn filter(
        digests: &[u32],
        query_digest: u32,
        max_errors: u8,
        on_candidate: &mut dyn FnMut(usize),
    ) {
        let len = digests.len();
        let ptr = digests.as_ptr();
        let mut i = 0usize;

        // prologue: reach a 16-byte boundary with the scalar test
        while i < len && (ptr.add(i) as usize) % 16 != 0 {
            if (query_digest ^ *ptr.add(i)).count_ones() <= max_errors as u32 {
                on_candidate(i);
            }
            i += 1;
        }

        let query = _mm_set1_epi32(query_digest as i32);
        let bound = _mm_set1_epi32(max_errors as i32 + 1);

        while i + 4 <= len {
            _mm_prefetch(ptr.add(i + 4) as *const i8, _MM_HINT_T0);
            let block = _mm_load_si128(ptr.add(i) as *const __m128i);
            let diff = _mm_xor_si128(block, query);
            let counts = popcount_epi32(diff);
            // one movemask bit per byte; keep the low bit of each lane
            let mut mask =
                (_mm_movemask_epi8(_mm_cmpgt_epi32(bound, counts)) as u32) & 0x1111;
            while mask != 0 {
                let bit = mask.trailing_zeros() as usize;
                mask &= mask - 1;
                on_candidate(i + bit / 4);
            }
            i += 4;
        }

        // epilogue: scalar tail
        while i < len {
            if (query_digest ^ *ptr.add(i)).count_ones() <= max_errors as u32 {
                on_candidate(i);
            }
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn collect_scalar(digests: &[u32], q: u32, k: u8) -> Vec<usize> {
        let mut out = Vec::new();
        scalar::filter(digests, q, k, |i| out.push(i));
        out
    }

    fn collect_dispatched(digests: &[u32], q: u32, k: u8) -> Vec<usize> {
        let mut out = Vec::new();
        filter_candidates(digests, q, k, |i| out.push(i));
        out
    }

    #[test]
    fn test_scalar_basic() {
        let digests = [0u32, 1, 3, 0xFFFF_FFFF, 0b111];
        assert_eq!(collect_scalar(&digests, 0, 0), vec![0]);
        assert_eq!(collect_scalar(&digests, 0, 1), vec![0, 1]);
        assert_eq!(collect_scalar(&digests, 0, 3), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_dispatch_matches_scalar() {
        let mut rng = SmallRng::seed_from_u64(0xF117E4);
        for len in [0usize, 1, 3, 4, 5, 7, 8, 15, 16, 64, 1000] {
            // low-weight digests so small error bounds still fire
            let digests: Vec<u32> = (0..len)
                .map(|_| rng.gen::<u32>() & rng.gen::<u32>() & rng.gen::<u32>())
                .collect();
            let q = rng.gen::<u32>() & rng.gen::<u32>() & rng.gen::<u32>();
            for k in [0u8, 1, 3, 7] {
                assert_eq!(
                    collect_dispatched(&digests, q, k),
                    collect_scalar(&digests, q, k),
                    "len={len} k={k}"
                );
            }
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_sse_matches_scalar_on_unaligned_slices() {
        if SimdLevel::detect() != SimdLevel::Ssse3 {
            return;
        }
        let mut rng = SmallRng::seed_from_u64(0xA11A);
        let backing: Vec<u32> = (0..512)
            .map(|_| rng.gen::<u32>() & rng.gen::<u32>() & rng.gen::<u32>())
            .collect();
        let q = rng.gen::<u32>() & rng.gen::<u32>();
        // every start offset exercises a different prologue length
        for start in 0..8 {
            for k in [0u8, 2, 5] {
                let slice = &backing[start..];
                let mut sse_out = Vec::new();
                unsafe { sse::filter(slice, q, k, &mut |i| sse_out.push(i)) };
                assert_eq!(sse_out, collect_scalar(slice, q, k), "start={start} k={k}");
            }
        }
    }

    #[test]
    fn test_all_survive_with_max_bound() {
        let digests: Vec<u32> = (0..100).collect();
        assert_eq!(collect_dispatched(&digests, 0, 32).len(), 100);
    }
}
