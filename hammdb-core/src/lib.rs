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

//! HammDB Core
//!
//! Fundamental data structures for approximate matching of 64-bit keys
//! under Hamming distance.
//!
//! # Components
//!
//! - **Packed integer vectors** (`int_vector`): fixed-width bit-packed
//!   storage for index entries whose bucket already implies their top bits.
//! - **Boundary bit vectors** (`bitvec`, `sparse`): bucket delimiter
//!   vectors with constant-time select-1, in a plain dense flavor and an
//!   Elias-Fano flavor for large, mostly-empty bucket universes. Both sit
//!   behind the [`SelectBitVector`] trait so index variants can pick a
//!   representation per deployment.
//! - **Permutation families** (`perm`): compile-time block permutations of
//!   the 64-bit key space. One index instance is built per family member;
//!   together the members guarantee that any two keys within the error
//!   bound share a bucket prefix somewhere.
//!
//! The index variants themselves live in the `hammdb-index` crate.

pub mod bitvec;
pub mod error;
pub mod int_vector;
pub mod perm;
pub mod sparse;

pub use bitvec::{DenseBitVector, SelectBitVector};
pub use error::{HammDbError, Result};
pub use int_vector::IntVector;
pub use perm::{BlockPermutation, PermutationFamily};
pub use sparse::SparseBitVector;
