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

//! End-to-end correctness of both index variants against brute force.
//!
//! A single instance only answers for keys that fall into its own bucket
//! range, so per-instance results are checked against a prefix-filtered
//! brute force, and the union across all four family members is checked
//! against the unfiltered one.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use hammdb_index::{
    BlockPermutation, PermutationFamily, SimpleIndex, SparseBitVector, TriangleIndex,
};

type P0 = BlockPermutation<4, 3, 0>;
type P1 = BlockPermutation<4, 3, 1>;
type P2 = BlockPermutation<4, 3, 2>;
type P3 = BlockPermutation<4, 3, 3>;

const SPLITTER_SHIFT: u32 = 64 - 16;
/// Six splitter bits go to the cardinality, ten stay on the prefix.
const TRIANGLE_PREFIX_SHIFT: u32 = 64 - 10;

fn distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn unique_random_keys(rng: &mut SmallRng, n: usize) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(n);
    while seen.len() < n {
        seen.insert(rng.gen::<u64>());
    }
    let mut keys: Vec<u64> = seen.into_iter().collect();
    keys.sort_unstable();
    keys
}

/// Random queries plus queries planted near indexed keys, so small error
/// bounds actually fire.
fn make_queries(rng: &mut SmallRng, keys: &[u64], n: usize) -> Vec<u64> {
    let mut queries = Vec::with_capacity(2 * n);
    for _ in 0..n {
        queries.push(rng.gen::<u64>());
        let mut q = keys[rng.gen_range(0..keys.len())];
        for _ in 0..rng.gen_range(0..=4) {
            q ^= 1u64 << rng.gen_range(0..64);
        }
        queries.push(q);
    }
    queries
}

fn brute_force_filtered<F: Fn(u64) -> bool>(
    keys: &[u64],
    q: u64,
    k: u8,
    in_reach: F,
) -> Vec<u64> {
    let mut expected: Vec<u64> = keys
        .iter()
        .copied()
        .filter(|&x| distance(q, x) <= k as u32 && in_reach(x))
        .collect();
    expected.sort_unstable();
    expected
}

#[test]
fn test_simple_matches_prefix_brute_force() {
    let mut rng = SmallRng::seed_from_u64(0x51AB1E);
    let keys = unique_random_keys(&mut rng, 20_000);
    let index = SimpleIndex::<P1>::new(&keys);
    assert_eq!(index.size(), keys.len() as u64);

    for q in make_queries(&mut rng, &keys, 25) {
        for k in 0..=3u8 {
            let (mut got, examined) = index.match_keys(q, k, false).unwrap();
            got.sort_unstable();
            let expected = brute_force_filtered(&keys, q, k, |x| {
                P1::forward(x) >> SPLITTER_SHIFT == P1::forward(q) >> SPLITTER_SHIFT
            });
            assert_eq!(got, expected, "q={q:#x} k={k}");
            assert!(examined as usize >= got.len());
        }
    }
}

#[test]
fn test_triangle_matches_prefix_brute_force() {
    let mut rng = SmallRng::seed_from_u64(0x7121A6);
    let keys = unique_random_keys(&mut rng, 20_000);
    let index = TriangleIndex::<P2>::new(&keys);

    for q in make_queries(&mut rng, &keys, 25) {
        for k in 0..=3u8 {
            let (mut got, examined) = index.match_keys(q, k, false).unwrap();
            got.sort_unstable();
            let expected = brute_force_filtered(&keys, q, k, |x| {
                P2::forward(x) >> TRIANGLE_PREFIX_SHIFT
                    == P2::forward(q) >> TRIANGLE_PREFIX_SHIFT
            });
            assert_eq!(got, expected, "q={q:#x} k={k}");
            assert!(examined as usize >= got.len());
        }
    }
}

#[test]
fn test_family_union_is_complete() {
    let mut rng = SmallRng::seed_from_u64(0xFA417);
    let keys = unique_random_keys(&mut rng, 10_000);
    let i0 = TriangleIndex::<P0>::new(&keys);
    let i1 = TriangleIndex::<P1>::new(&keys);
    let i2 = TriangleIndex::<P2>::new(&keys);
    let i3 = TriangleIndex::<P3>::new(&keys);

    for q in make_queries(&mut rng, &keys, 20) {
        for k in 0..=3u8 {
            let mut union: HashSet<u64> = HashSet::new();
            union.extend(i0.match_keys(q, k, false).unwrap().0);
            union.extend(i1.match_keys(q, k, false).unwrap().0);
            union.extend(i2.match_keys(q, k, false).unwrap().0);
            union.extend(i3.match_keys(q, k, false).unwrap().0);

            let expected: HashSet<u64> = keys
                .iter()
                .copied()
                .filter(|&x| distance(q, x) <= k as u32)
                .collect();
            assert_eq!(union, expected, "q={q:#x} k={k}");
        }
    }
}

#[test]
fn test_union_of_simple_and_triangle_agree() {
    let mut rng = SmallRng::seed_from_u64(0xA62EE);
    let keys = unique_random_keys(&mut rng, 8_000);
    let s0 = SimpleIndex::<P0>::new(&keys);
    let s1 = SimpleIndex::<P1>::new(&keys);
    let s2 = SimpleIndex::<P2>::new(&keys);
    let s3 = SimpleIndex::<P3>::new(&keys);
    let t0 = TriangleIndex::<P0>::new(&keys);
    let t1 = TriangleIndex::<P1>::new(&keys);
    let t2 = TriangleIndex::<P2>::new(&keys);
    let t3 = TriangleIndex::<P3>::new(&keys);

    for q in make_queries(&mut rng, &keys, 15) {
        let mut from_simple: HashSet<u64> = HashSet::new();
        from_simple.extend(s0.match_keys(q, 3, false).unwrap().0);
        from_simple.extend(s1.match_keys(q, 3, false).unwrap().0);
        from_simple.extend(s2.match_keys(q, 3, false).unwrap().0);
        from_simple.extend(s3.match_keys(q, 3, false).unwrap().0);

        let mut from_triangle: HashSet<u64> = HashSet::new();
        from_triangle.extend(t0.match_keys(q, 3, false).unwrap().0);
        from_triangle.extend(t1.match_keys(q, 3, false).unwrap().0);
        from_triangle.extend(t2.match_keys(q, 3, false).unwrap().0);
        from_triangle.extend(t3.match_keys(q, 3, false).unwrap().0);

        assert_eq!(from_simple, from_triangle, "q={q:#x}");
    }
}

#[test]
fn test_candidate_counts_match_between_modes() {
    let mut rng = SmallRng::seed_from_u64(0xC0DE);
    let keys = unique_random_keys(&mut rng, 5_000);
    let simple = SimpleIndex::<P0>::new(&keys);
    let triangle = TriangleIndex::<P0>::new(&keys);

    for q in make_queries(&mut rng, &keys, 20) {
        for k in 0..=3u8 {
            let (_, full) = simple.match_keys(q, k, false).unwrap();
            let (empty, only) = simple.match_keys(q, k, true).unwrap();
            assert!(empty.is_empty());
            assert_eq!(full, only);

            let (_, full) = triangle.match_keys(q, k, false).unwrap();
            let (empty, only) = triangle.match_keys(q, k, true).unwrap();
            assert!(empty.is_empty());
            assert_eq!(full, only);
        }
    }
}

#[test]
fn test_dense_and_sparse_representations_agree() {
    let mut rng = SmallRng::seed_from_u64(0xD5);
    let keys = unique_random_keys(&mut rng, 5_000);
    let dense = TriangleIndex::<P3>::new(&keys);
    let sparse = TriangleIndex::<P3, SparseBitVector>::new(&keys);

    for q in make_queries(&mut rng, &keys, 20) {
        for k in [0u8, 2, 3] {
            let (mut a, ca) = dense.match_keys(q, k, false).unwrap();
            let (mut b, cb) = sparse.match_keys(q, k, false).unwrap();
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b, "q={q:#x} k={k}");
            assert_eq!(ca, cb);
        }
    }
}

#[test]
fn test_roundtrip_through_file() {
    let mut rng = SmallRng::seed_from_u64(0xF11E);
    let keys = unique_random_keys(&mut rng, 5_000);
    let dir = tempfile::tempdir().unwrap();

    let simple = SimpleIndex::<P0>::new(&keys);
    let triangle = TriangleIndex::<P0>::new(&keys);

    let simple_path = dir.path().join("keys.simple.idx");
    let triangle_path = dir.path().join("keys.triangle.idx");
    simple
        .serialize(&mut BufWriter::new(File::create(&simple_path).unwrap()))
        .unwrap();
    triangle
        .serialize(&mut BufWriter::new(File::create(&triangle_path).unwrap()))
        .unwrap();

    let simple_loaded =
        SimpleIndex::<P0>::load(&mut BufReader::new(File::open(&simple_path).unwrap()))
            .unwrap();
    let triangle_loaded = TriangleIndex::<P0>::load(&mut BufReader::new(
        File::open(&triangle_path).unwrap(),
    ))
    .unwrap();

    assert_eq!(simple_loaded.size(), simple.size());
    assert_eq!(triangle_loaded.size(), triangle.size());

    for q in make_queries(&mut rng, &keys, 500) {
        assert_eq!(
            simple_loaded.match_keys(q, 3, false).unwrap(),
            simple.match_keys(q, 3, false).unwrap()
        );
        assert_eq!(
            triangle_loaded.match_keys(q, 3, false).unwrap(),
            triangle.match_keys(q, 3, false).unwrap()
        );
    }
}

#[test]
fn test_serialized_form_is_deterministic() {
    let mut rng = SmallRng::seed_from_u64(0xDE7);
    let keys = unique_random_keys(&mut rng, 2_000);
    let a = TriangleIndex::<P1>::new(&keys);
    let b = TriangleIndex::<P1>::new(&keys);

    let mut buf_a = Vec::new();
    let mut buf_b = Vec::new();
    a.serialize(&mut buf_a).unwrap();
    b.serialize(&mut buf_b).unwrap();
    assert_eq!(buf_a, buf_b);

    // load and re-serialize reproduces the byte stream
    let loaded = TriangleIndex::<P1>::load(&mut buf_a.as_slice()).unwrap();
    let mut buf_c = Vec::new();
    loaded.serialize(&mut buf_c).unwrap();
    assert_eq!(buf_a, buf_c);
}
