// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::expression::Exp;
use crate::utils;

use std::cmp::Ordering;
use std::fmt::{Debug, Formatter, Result};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// The shape of a boolean formula over expressions.
#[derive(Clone, Eq, PartialEq, Hash)]
pub enum BitKind {
    Constant(bool),
    /// True when the value is non-zero.
    Var(Rc<Exp>),
    Not(Rc<Bit>),
    /// Operands are sorted canonically and contain no duplicates, constants or nested Ands.
    And(Vec<Rc<Bit>>),
    /// Operands are sorted canonically and contain no duplicates, constants or nested Ors.
    Or(Vec<Rc<Bit>>),
}

impl BitKind {
    fn rank(&self) -> u8 {
        match self {
            BitKind::Constant(..) => 0,
            BitKind::Var(..) => 1,
            BitKind::Not(..) => 2,
            BitKind::And(..) => 3,
            BitKind::Or(..) => 4,
        }
    }
}

/// A hash-consed boolean formula. Created only through an ExpTable.
pub struct Bit {
    pub kind: BitKind,
    hash: u32,
}

impl Bit {
    pub(crate) fn new(kind: BitKind) -> Bit {
        let hash = utils::stable_hash(&kind);
        Bit { kind, hash }
    }

    pub fn hash32(&self) -> u32 {
        self.hash
    }

    pub fn is_true(&self) -> bool {
        matches!(self.kind, BitKind::Constant(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self.kind, BitKind::Constant(false))
    }

    /// The direct sub-formulas of this formula.
    pub fn operands(&self) -> &[Rc<Bit>] {
        match &self.kind {
            BitKind::Not(op) => std::slice::from_ref(op),
            BitKind::And(ops) | BitKind::Or(ops) => ops,
            BitKind::Constant(..) | BitKind::Var(..) => &[],
        }
    }

    /// Same contract as Exp::compare.
    pub fn compare(bit0: &Bit, bit1: &Bit) -> Ordering {
        if std::ptr::eq(bit0, bit1) {
            return Ordering::Equal;
        }
        bit0.hash.cmp(&bit1.hash).then_with(|| match (&bit0.kind, &bit1.kind) {
            (BitKind::Constant(c0), BitKind::Constant(c1)) => c0.cmp(c1),
            (BitKind::Var(e0), BitKind::Var(e1)) => Exp::compare(e0, e1),
            (BitKind::Not(b0), BitKind::Not(b1)) => Bit::compare(b0, b1),
            (BitKind::And(ops0), BitKind::And(ops1)) | (BitKind::Or(ops0), BitKind::Or(ops1)) => {
                ops0.len().cmp(&ops1.len()).then_with(|| {
                    ops0.iter()
                        .zip(ops1.iter())
                        .map(|(b0, b1)| Bit::compare(b0, b1))
                        .find(|order| *order != Ordering::Equal)
                        .unwrap_or(Ordering::Equal)
                })
            }
            (kind0, kind1) => kind0.rank().cmp(&kind1.rank()),
        })
    }

    /// Renders the formula for a user. If parens is set, compound formulas are parenthesized.
    pub fn print_ui(&self, parens: bool) -> String {
        match &self.kind {
            BitKind::Constant(true) => "true".to_owned(),
            BitKind::Constant(false) => "false".to_owned(),
            BitKind::Var(exp) => exp.print_ui(false),
            BitKind::Not(op) => format!("!{}", op.print_ui(true)),
            BitKind::And(ops) | BitKind::Or(ops) => {
                let separator = if matches!(self.kind, BitKind::And(..)) {
                    " && "
                } else {
                    " || "
                };
                let joined = ops
                    .iter()
                    .map(|op| op.print_ui(true))
                    .collect::<Vec<_>>()
                    .join(separator);
                if parens {
                    format!("({})", joined)
                } else {
                    joined
                }
            }
        }
    }
}

impl PartialEq for Bit {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || (self.hash == other.hash && self.kind == other.kind)
    }
}

impl Eq for Bit {}

impl Hash for Bit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash);
    }
}

impl Debug for Bit {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match &self.kind {
            BitKind::Constant(v) => write!(f, "{}", v),
            BitKind::Var(exp) => exp.fmt(f),
            BitKind::Not(op) => write!(f, "!{:?}", op),
            BitKind::And(ops) => f.debug_tuple("And").field(ops).finish(),
            BitKind::Or(ops) => f.debug_tuple("Or").field(ops).finish(),
        }
    }
}
