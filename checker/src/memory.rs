// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The interfaces through which the frontier engine reaches the rest of the checker: the
//! memory model of a block and the analysis frame a search step runs in.

use crate::bit::Bit;
use crate::expression::{Exp, FrameId, PPoint};
use crate::hash_cons::{ExpTable, ValueList};
use crate::variable::{BlockId, Location, VarKind, Variable};

use log_derive::logfn_inputs;
use std::fmt::Debug;
use std::rc::Rc;

/// How the memory model should translate a formula at a point.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TranslateKind {
    /// The formula as it holds at the point.
    Point,
    /// The formula as it held just before the call or loop at the point, ignoring its effects.
    SkipClobber,
    /// The formula at the exit point of a block, in terms of its entry state.
    Exit,
    /// Expand the uninterpreted values in the formula into their possible concrete values.
    RemoveVal,
    /// The formula at a call site, in terms of the callee's entry state.
    Callee,
    /// The formula at a call site, in terms of the callee's exit state.
    CalleeExit,
}

/// A formula that is provable when its guard holds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GuardBit {
    pub bit: Rc<Bit>,
    pub guard: Rc<Bit>,
}

impl GuardBit {
    pub fn new(bit: Rc<Bit>, guard: Rc<Bit>) -> GuardBit {
        GuardBit { bit, guard }
    }
}

/// A set of alternative formulas, each under the control flow condition that gives rise to it.
#[derive(Clone, Debug, Default)]
pub struct GuardBitVector {
    entries: Vec<GuardBit>,
}

impl GuardBitVector {
    pub fn new() -> GuardBitVector {
        GuardBitVector::default()
    }

    /// Adds an alternative. Alternatives that can never arise are not kept.
    pub fn push(&mut self, bit: Rc<Bit>, guard: Rc<Bit>) {
        if !guard.is_false() {
            self.entries.push(GuardBit::new(bit, guard));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&GuardBit> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GuardBit> {
        self.entries.iter()
    }

    /// Sorts the entries canonically, by formula and then by guard, and merges the entries
    /// that share a formula into one whose guard is the disjunction of theirs.
    #[logfn_inputs(TRACE)]
    pub fn sort_combine(&mut self, table: &ExpTable) {
        self.entries.sort_by(|a, b| {
            Bit::compare(&a.bit, &b.bit).then_with(|| Bit::compare(&a.guard, &b.guard))
        });
        let mut combined: Vec<GuardBit> = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            match combined.last_mut() {
                Some(last) if Rc::ptr_eq(&last.bit, &entry.bit) => {
                    last.guard = table.make_or(last.guard.clone(), entry.guard);
                }
                _ => combined.push(entry),
            }
        }
        self.entries = combined;
    }
}

impl IntoIterator for GuardBitVector {
    type Item = GuardBit;
    type IntoIter = std::vec::IntoIter<GuardBit>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a GuardBitVector {
    type Item = &'a GuardBit;
    type IntoIter = std::slice::Iter<'a, GuardBit>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// The control transfer at a point of a block that leaves the block's own code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PEdge {
    Call {
        /// The callee. A Var of function kind for a direct call.
        function: Rc<Exp>,
        arguments: ValueList,
        /// The lvalue that receives the result, if any.
        return_value: Option<Rc<Exp>>,
        /// The receiver object of a method call.
        instance: Option<Rc<Exp>>,
    },
    Loop {
        loop_id: BlockId,
    },
}

impl PEdge {
    /// The function a direct call invokes.
    pub fn direct_callee(&self) -> Option<&Variable> {
        match self {
            PEdge::Call { function, .. } => function.as_var().filter(|v| v.kind == VarKind::Func),
            PEdge::Loop { .. } => None,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, PEdge::Loop { .. })
    }
}

/// The memory model of a single function or loop body.
pub trait BlockMemory: Debug {
    fn id(&self) -> &BlockId;

    fn exit_point(&self) -> PPoint;

    /// The source location of the point, where known.
    fn point_location(&self, point: PPoint) -> Option<Location>;

    /// The call or loop edge leaving the point, if there is one.
    fn outgoing_edge(&self, point: PPoint) -> Option<&PEdge>;

    /// The functions an indirect call at the point may reach.
    fn indirect_callees(&self, point: PPoint) -> Vec<Variable>;

    /// Translates bit at point into the guarded alternatives it may stand for. An empty result
    /// means nothing provable was found.
    fn translate_bit(
        &self,
        table: &ExpTable,
        kind: TranslateKind,
        point: PPoint,
        bit: &Rc<Bit>,
    ) -> GuardBitVector;

    /// True if no iteration of the block can change the value of bit.
    fn is_bit_preserved(&self, bit: &Rc<Bit>) -> bool;
}

/// An active analysis frame of the search.
pub trait CheckerFrame: Debug {
    fn id(&self) -> FrameId;

    fn memory(&self) -> Rc<dyn BlockMemory>;

    /// Which of TranslateKind::Callee and TranslateKind::CalleeExit applies to formulas
    /// pulled into this frame from a callee at point.
    fn callee_translate_kind(&self, point: PPoint) -> TranslateKind;

    /// Records a further formula that the frame has to prove.
    fn add_assert(&self, table: &ExpTable, bit: Rc<Bit>);
}
