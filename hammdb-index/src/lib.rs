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

//! HammDB Index Layer
//!
//! Static bucketed indexes answering "which stored 64-bit keys lie within
//! Hamming distance k of this query". One index instance serves one
//! permutation of the key space; an outer driver builds one instance per
//! family member and unions their answers.
//!
//! ## Index Variants
//!
//! - **Simple** ([`SimpleIndex`]): buckets keys by the top permuted bits
//!   and popcount-sweeps one bucket per query. Smallest constant factors,
//!   scans whole buckets.
//!
//! - **Triangle** ([`TriangleIndex`]): additionally partitions each prefix
//!   bucket by key popcount, so the triangle inequality confines a query
//!   to a contiguous band of sub-buckets, and pre-filters entries through
//!   a vectorized 32-bit digest comparison before any full-width check.
//!
//! Both are built once by a counting sort, are immutable afterwards, and
//! answer queries without synchronization. Either can delimit its buckets
//! with a plain dense bit vector or a sparse Elias-Fano one.
//!
//! ## Example
//!
//! ```rust
//! use hammdb_index::{BlockPermutation, TriangleIndex};
//!
//! type Perm = BlockPermutation<4, 3, 0>;
//!
//! let index = TriangleIndex::<Perm>::new(&[0x0F, 0xF0, u64::MAX]);
//! let (matches, examined) = index.match_keys(0x0E, 1, false).unwrap();
//! assert_eq!(matches, vec![0x0F]);
//! assert!(examined >= 1);
//! ```

pub mod simd;
pub mod simple;
pub mod triangle;

pub use simple::SimpleIndex;
pub use triangle::TriangleIndex;

pub use hammdb_core::{
    BlockPermutation, DenseBitVector, HammDbError, PermutationFamily, Result,
    SelectBitVector, SparseBitVector,
};
