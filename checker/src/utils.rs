// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use std::hash::{Hash, Hasher};

/// A 32-bit FNV-1a hasher. Unlike the standard library's default hasher it is not seeded
/// per process, so hashes of graph nodes, and every tie that is broken by them, are the same
/// from one run to the next.
#[derive(Clone, Copy, Debug)]
pub struct StableHasher(u32);

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

impl Default for StableHasher {
    fn default() -> Self {
        StableHasher(FNV_OFFSET_BASIS)
    }
}

impl Hasher for StableHasher {
    fn finish(&self) -> u64 {
        u64::from(self.0)
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u32::from(*byte);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }
}

/// Hashes the value with a fresh StableHasher.
pub fn stable_hash<T: Hash + ?Sized>(value: &T) -> u32 {
    let mut hasher = StableHasher::default();
    value.hash(&mut hasher);
    hasher.0
}
