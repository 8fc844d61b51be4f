// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//
// The core of a backward assertion checker. Obligations are boolean formulas over a
// hash-consed expression graph. Each obligation lives at a frontier object that says where in
// the program it must currently hold, and the search repeatedly expands the most promising
// frontier object by translating its formula into a neighboring frame.

#[macro_use]
extern crate log;

pub mod bit;
pub mod buffer;
pub mod expression;
pub mod frontier;
pub mod hash_cons;
pub mod k_limits;
pub mod memory;
pub mod operand;
pub mod options;
pub mod smt_solver;
pub mod translate;
pub mod utils;
pub mod variable;
pub mod visitors;
#[cfg(feature = "z3")]
pub mod z3_solver;
