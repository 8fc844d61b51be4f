// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

// Somewhat arbitrary constants used to limit things in the backward search that may
// take too long or use too much memory.

/// If a multi-map produces more alternatives than this, it reverts to the original node.
pub const MAX_MULTIMAP_RESULTS: usize = 20;

/// Formulas with more non-constant terms than this are solved locally rather than being
/// handed to every caller.
pub const MAX_CALLER_BIT_TERMS: usize = 50;

/// Nested lists in a transaction value deeper than this are rejected by the reader.
pub const MAX_OPERAND_DEPTH: usize = 64;

/// The limits that can be overridden from the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KLimitConfig {
    pub max_multimap_results: usize,
    pub max_caller_bit_terms: usize,
}

impl KLimitConfig {
    pub fn new(max_multimap_results: usize, max_caller_bit_terms: usize) -> KLimitConfig {
        KLimitConfig {
            max_multimap_results,
            max_caller_bit_terms,
        }
    }
}

impl Default for KLimitConfig {
    fn default() -> Self {
        KLimitConfig::new(MAX_MULTIMAP_RESULTS, MAX_CALLER_BIT_TERMS)
    }
}
