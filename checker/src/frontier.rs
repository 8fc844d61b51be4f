// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The frontier of the backward search: the obligations that are still waiting to be
//! propagated to a caller, a callee, a loop or a type invariant, and the order in which they
//! are expanded.

use crate::bit::Bit;
use crate::expression::{Exp, ExpKind, PPoint};
use crate::hash_cons::ExpTable;
use crate::memory::{BlockMemory, CheckerFrame, GuardBitVector, PEdge, TranslateKind};
use crate::smt_solver::SolverOracle;
use crate::translate::{self, ConvertCallsiteMapper, RemoveFrameMapper};
use crate::visitors::{self, TraversalConfig, VisitKind};

use itertools::Itertools;
use log_derive::{logfn, logfn_inputs};
use mirai_annotations::assume_unreachable;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::rc::Rc;

/// Why the search stopped at a terminal frontier object.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReportKind {
    /// No reason: the object carries no information and is discarded first.
    None,
    Finished,
    Timeout,
    Recursion,
    Unexpected,
    UnknownCsu,
    NoCallee,
}

impl ReportKind {
    pub fn ui_string(self) -> &'static str {
        match self {
            ReportKind::None => "None",
            ReportKind::Finished => "Finished exploration, no further dependents",
            ReportKind::Timeout => "Timed out during exploration",
            ReportKind::Recursion => "Recursion blocked, too many dependents at the same point",
            ReportKind::Unexpected => "Unknown lvalue in goal, could not figure out dependent",
            ReportKind::UnknownCsu => "Could not find base object for type invariant",
            ReportKind::NoCallee => "Depends on a callee with no known implementation",
        }
    }
}

/// The result of moving a frontier object into an adjacent frame: the formula as it reads in
/// that frame, for display, and the guarded formulas that remain to be proved there.
#[derive(Clone, Debug, Default)]
pub struct TranslatedBits {
    pub base_bit: Option<Rc<Bit>>,
    pub bits: GuardBitVector,
}

/// A formula that must hold on entry to a function or to an iteration of a loop.
#[derive(Clone, Debug)]
pub struct WherePrecondition {
    memory: Rc<dyn BlockMemory>,
    bit: Rc<Bit>,
    /// Every term of the formula is unaffected by an iteration of the loop.
    ignore_unroll: bool,
}

impl WherePrecondition {
    /// None if the formula should not be attributed to the callers of the block.
    #[logfn_inputs(TRACE)]
    pub fn make(
        table: &ExpTable,
        memory: Rc<dyn BlockMemory>,
        bit: Rc<Bit>,
    ) -> Option<WherePrecondition> {
        let is_function = !memory.id().is_loop();
        if !translate::use_caller_bit(table, &bit, is_function) {
            return None;
        }
        let ignore_unroll = !is_function && memory.is_bit_preserved(&bit);
        Some(WherePrecondition {
            memory,
            bit,
            ignore_unroll,
        })
    }

    pub fn memory(&self) -> &Rc<dyn BlockMemory> {
        &self.memory
    }

    pub fn bit(&self) -> &Rc<Bit> {
        &self.bit
    }

    pub fn is_ignore_unroll(&self) -> bool {
        self.ignore_unroll
    }

    pub fn print_ui(&self) -> String {
        let id = self.memory.id();
        let label = if id.is_loop() {
            format!("LoopInvariant [{}]", id.loop_name())
        } else {
            "Precondition".to_owned()
        };
        format!("{} :: {}", label, self.bit.print_ui(true))
    }

    pub fn print_hook(&self) -> String {
        let id = self.memory.id();
        if id.is_loop() {
            format!("{} {}", id.loop_name(), id.function_name())
        } else {
            format!("pre {}", id.function_name())
        }
    }

    /// Moves the precondition to the call (or loop entry) at point of caller. If the caller
    /// is this loop itself, this unrolls one iteration.
    #[logfn_inputs(TRACE)]
    pub fn caller_bits(
        &self,
        table: &ExpTable,
        caller: &dyn CheckerFrame,
        point: PPoint,
    ) -> TranslatedBits {
        let caller_memory = caller.memory();
        let kind = caller.callee_translate_kind(point);
        let unrolling = self.memory.id().is_loop() && caller_memory.id() == self.memory.id();

        let mut callsite = ConvertCallsiteMapper::new(caller_memory.outgoing_edge(point), unrolling);
        let config = TraversalConfig::new(VisitKind::All);
        let base_bit = visitors::map_bit(table, &self.bit, config, &mut callsite).and_then(|bit| {
            let mut frame_mapper = RemoveFrameMapper::new(caller.id());
            visitors::map_bit(table, &bit, config, &mut frame_mapper)
        });
        if base_bit.is_none() {
            debug!("{:?} does not convert at {:?}:{}", self.bit, caller_memory.id(), point);
        }

        let base_res = caller_memory.translate_bit(table, kind, point, &self.bit);
        TranslatedBits {
            base_bit,
            bits: translate::remove_val_bits(table, caller, &base_res),
        }
    }
}

/// A formula that must hold right after the call or loop at a point of a frame, and so has
/// to be pulled back through the callee or the loop body.
#[derive(Clone, Debug)]
pub struct WherePostcondition {
    frame: Rc<dyn CheckerFrame>,
    point: PPoint,
    bit: Rc<Bit>,
}

impl WherePostcondition {
    /// None if there is no known callee or the formula does not depend on it.
    #[logfn_inputs(TRACE)]
    pub fn make(
        table: &ExpTable,
        frame: Rc<dyn CheckerFrame>,
        point: PPoint,
        bit: &Rc<Bit>,
    ) -> Option<WherePostcondition> {
        let memory = frame.memory();
        let bit = translate::translate_callee_bit(table, memory.as_ref(), point, bit, frame.id())?;
        Some(WherePostcondition { frame, point, bit })
    }

    pub fn frame(&self) -> &Rc<dyn CheckerFrame> {
        &self.frame
    }

    pub fn point(&self) -> PPoint {
        self.point
    }

    pub fn bit(&self) -> &Rc<Bit> {
        &self.bit
    }

    pub fn print_ui(&self, table: &ExpTable) -> String {
        let memory = self.frame.memory();
        let label = match memory.outgoing_edge(self.point) {
            Some(PEdge::Loop { loop_id }) => format!("LoopInvariant [{}]", loop_id.loop_name()),
            Some(edge) => {
                let callee = match (edge.direct_callee(), edge) {
                    (Some(callee), _) => callee.name.clone(),
                    (None, PEdge::Call { function, .. }) => function.print_ui(true),
                    (None, PEdge::Loop { .. }) => assume_unreachable!(),
                };
                let line = memory
                    .point_location(self.point)
                    .map_or(0, |location| location.line);
                format!("Postcondition [{}:{}]", callee, line)
            }
            None => "Postcondition".to_owned(),
        };
        let bit = translate::convert_exit_clobber(table, &self.bit);
        format!("{} :: {}", label, bit.print_ui(true))
    }

    /// The hook names of the callee or loop, several for an indirect call.
    pub fn print_hook(&self) -> Option<String> {
        let memory = self.frame.memory();
        let function_name = memory.id().function_name().to_owned();
        let edge = memory.outgoing_edge(self.point)?;
        match edge {
            PEdge::Loop { loop_id } => Some(format!("{} {}", loop_id.loop_name(), function_name)),
            PEdge::Call { .. } => match edge.direct_callee() {
                Some(callee) => Some(format!("post {}", callee.name)),
                None => {
                    let callees = memory.indirect_callees(self.point);
                    if callees.is_empty() {
                        return None;
                    }
                    Some(
                        callees
                            .iter()
                            .map(|callee| format!("post {}", callee.name))
                            .join("$"),
                    )
                }
            },
        }
    }

    /// The formula as it held before the loop at the point, ignoring what the loop does.
    #[logfn_inputs(TRACE)]
    pub fn skip_loop_bits(&self, table: &ExpTable) -> TranslatedBits {
        let base_bit = translate::convert_exit_clobber(table, &self.bit);
        let base_res = self.frame.memory().translate_bit(
            table,
            TranslateKind::SkipClobber,
            self.point,
            &self.bit,
        );
        TranslatedBits {
            base_bit: Some(base_bit),
            bits: translate::remove_val_bits(table, self.frame.as_ref(), &base_res),
        }
    }

    /// The formula at the exit point of the callee (or loop body) analyzed by callee_frame.
    #[logfn_inputs(TRACE)]
    pub fn callee_bits(&self, table: &ExpTable, callee_frame: &dyn CheckerFrame) -> TranslatedBits {
        let callee_memory = callee_frame.memory();
        let base_bit = translate::convert_exit_clobber(table, &self.bit);
        let base_res = callee_memory.translate_bit(
            table,
            TranslateKind::Exit,
            callee_memory.exit_point(),
            &self.bit,
        );
        TranslatedBits {
            base_bit: Some(base_bit),
            bits: translate::remove_val_bits(table, callee_frame, &base_res),
        }
    }
}

/// A formula that must hold for every object of a type, or for the global heap.
#[derive(Clone, Debug)]
pub struct WhereInvariant {
    /// The aggregate type, None for a global invariant.
    csu: Option<String>,
    bit: Rc<Bit>,
}

impl WhereInvariant {
    /// Makes the invariant that bit, a formula over the object lval of type csu (or over
    /// globals), holds for all objects. None if the formula cannot be stated in terms of
    /// the object, or if it reads storage more than one dereference away from it: the writes
    /// to such storage cannot all be found.
    #[logfn_inputs(TRACE)]
    pub fn make(
        table: &ExpTable,
        csu: Option<&str>,
        lval: Option<&Rc<Exp>>,
        bit: &Rc<Bit>,
    ) -> Option<WhereInvariant> {
        let new_bit = match csu {
            Some(..) => {
                let this_object = translate::this_object(table);
                translate::translate_heap_bit(table, lval, Some(&this_object), false, bit)?
            }
            None => translate::translate_heap_bit(table, None, None, false, bit)?,
        };

        let mut exclude = false;
        visitors::visit_bit(&new_bit, VisitKind::Lval, &mut |read: &Rc<Exp>| {
            if read.deref_count() > 1 {
                exclude = true;
            }
        });
        if exclude {
            debug!("invariant reads too deep: {:?}", new_bit);
            return None;
        }
        Some(WhereInvariant {
            csu: csu.map(str::to_owned),
            bit: new_bit,
        })
    }

    pub fn csu(&self) -> Option<&str> {
        self.csu.as_deref()
    }

    pub fn bit(&self) -> &Rc<Bit> {
        &self.bit
    }

    pub fn print_ui(&self) -> String {
        let label = match &self.csu {
            Some(csu) => format!("TypeInvariant [{}]", csu),
            None => "GlobalInvariant".to_owned(),
        };
        format!("{} :: {}", label, self.bit.print_ui(true))
    }

    /// The invariant at the exit of write_frame, for the object write_csu that the frame
    /// writes. The base formula shows it for base_csu, the object as written in the source.
    #[logfn_inputs(TRACE)]
    pub fn heap_bits(
        &self,
        table: &ExpTable,
        write_frame: &dyn CheckerFrame,
        write_csu: &Rc<Exp>,
        base_csu: Option<&Rc<Exp>>,
    ) -> TranslatedBits {
        let old_lval = self.csu.as_ref().map(|_| translate::this_object(table));
        let exit_bit = match translate::translate_heap_bit(
            table,
            old_lval.as_ref(),
            Some(write_csu),
            true,
            &self.bit,
        ) {
            Some(exit_bit) => exit_bit,
            None => assume_unreachable!("exit translation never drops a term"),
        };

        let new_bit = translate::convert_exit_clobber(table, &self.bit);
        let base_bit = match (old_lval.as_ref(), base_csu) {
            (Some(old_lval), Some(base_csu)) => {
                visitors::replace_bit(table, &new_bit, old_lval, base_csu)
            }
            _ => new_bit,
        };

        let memory = write_frame.memory();
        let base_res =
            memory.translate_bit(table, TranslateKind::Exit, memory.exit_point(), &exit_bit);
        TranslatedBits {
            base_bit: Some(base_bit),
            bits: translate::remove_val_bits(table, write_frame, &base_res),
        }
    }

    /// If exp, an lvalue written by frame, is a field of an object of this type that is
    /// itself reached through another object of this type, asserts the invariant for that
    /// enclosing object as well. Only one level of nesting is followed.
    #[logfn_inputs(TRACE)]
    pub fn assert_recursive(&self, table: &ExpTable, frame: &dyn CheckerFrame, exp: &Rc<Exp>) {
        if self.csu.is_none() {
            return;
        }
        let read_csu = match self.write_csu(exp) {
            Some(read_csu) => read_csu,
            None => return,
        };
        let this_object = translate::this_object(table);
        match translate::translate_heap_bit(
            table,
            Some(&this_object),
            Some(&read_csu),
            false,
            &self.bit,
        ) {
            Some(entry_bit) => frame.add_assert(table, entry_bit),
            None => debug!("{:?} is not heap relative", read_csu),
        }
    }

    /// The object of this invariant's type that lval is a field of.
    #[logfn(TRACE)]
    pub fn write_csu(&self, lval: &Rc<Exp>) -> Option<Rc<Exp>> {
        let csu = self.csu.as_ref()?;
        let mut lval = lval;
        while let ExpKind::Fld { target, field } = &lval.kind {
            if field.csu == *csu {
                return Some(target.clone());
            }
            lval = target;
        }
        None
    }
}

/// A pending obligation of the backward search.
#[derive(Clone, Debug)]
pub enum Where {
    /// The search stops here, for the given reason.
    None(ReportKind),
    Precondition(WherePrecondition),
    Postcondition(WherePostcondition),
    Invariant(WhereInvariant),
}

impl Where {
    pub fn bit(&self) -> Option<&Rc<Bit>> {
        match self {
            Where::None(..) => None,
            Where::Precondition(pre) => Some(pre.bit()),
            Where::Postcondition(post) => Some(post.bit()),
            Where::Invariant(inv) => Some(inv.bit()),
        }
    }

    /// A terminal object without a reason, which contributes nothing.
    pub fn is_drop(&self) -> bool {
        matches!(self, Where::None(ReportKind::None))
    }

    pub fn print_ui(&self, table: &ExpTable) -> String {
        match self {
            Where::None(report_kind) => format!("Report: {}", report_kind.ui_string()),
            Where::Precondition(pre) => pre.print_ui(),
            Where::Postcondition(post) => post.print_ui(table),
            Where::Invariant(inv) => inv.print_ui(),
        }
    }

    /// The name under which annotations for this obligation are looked up. Terminal objects
    /// and invariants have none.
    pub fn print_hook(&self) -> Option<String> {
        match self {
            Where::None(..) | Where::Invariant(..) => None,
            Where::Precondition(pre) => Some(pre.print_hook()),
            Where::Postcondition(post) => post.print_hook(),
        }
    }

    /// Orders two frontier objects for expansion. Less means where0 should be expanded
    /// before where1. Equal means there is no preference, which is not transitive: the
    /// formula comparison at the end may find two objects incomparable.
    #[logfn_inputs(TRACE)]
    #[logfn(TRACE)]
    pub fn priority_compare(where0: &Where, where1: &Where, oracle: &dyn SolverOracle) -> Ordering {
        let drop0 = where0.is_drop();
        let drop1 = where1.is_drop();
        if drop0 != drop1 {
            return if drop0 { Ordering::Less } else { Ordering::Greater };
        }

        let (bit0, bit1) = match (where0.bit(), where1.bit()) {
            (Some(bit0), Some(bit1)) => (bit0, bit1),
            (Some(..), None) => return Ordering::Less,
            (None, Some(..)) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        };

        let post0 = match where0 {
            Where::Postcondition(post) => Some(post),
            _ => None,
        };
        let post1 = match where1 {
            Where::Postcondition(post) => Some(post),
            _ => None,
        };
        match (post0, post1) {
            (None, Some(..)) => return Ordering::Less,
            (Some(..), None) => return Ordering::Greater,
            (Some(post0), Some(post1)) if post0.point() != post1.point() => {
                return post1.point().cmp(&post0.point());
            }
            _ => {}
        }

        let unroll0 = matches!(where0, Where::Precondition(pre) if pre.is_ignore_unroll());
        let unroll1 = matches!(where1, Where::Precondition(pre) if pre.is_ignore_unroll());
        if unroll0 != unroll1 {
            return if unroll0 { Ordering::Less } else { Ordering::Greater };
        }

        let invariant0 = matches!(where0, Where::Invariant(..));
        let invariant1 = matches!(where1, Where::Invariant(..));
        if invariant0 != invariant1 {
            return if invariant0 { Ordering::Less } else { Ordering::Greater };
        }

        Self::compare_bits(bit0, bit1, oracle)
    }

    /// Prefers the weaker of two formulas, which is useful in more contexts. Equivalent
    /// formulas are ordered by their stable hash.
    fn compare_bits(bit0: &Rc<Bit>, bit1: &Rc<Bit>, oracle: &dyn SolverOracle) -> Ordering {
        if Rc::ptr_eq(bit0, bit1) {
            return Ordering::Equal;
        }
        if oracle.bit_equivalent(bit0, bit1) {
            return Bit::compare(bit0, bit1);
        }
        if oracle.bit_implies(bit1, bit0) {
            return Ordering::Less;
        }
        if oracle.bit_implies(bit0, bit1) {
            return Ordering::Greater;
        }
        Ordering::Equal
    }
}

/// Removes and returns the object of the worklist that should be expanded next. Among
/// objects with no preference between them, the earliest wins.
#[logfn_inputs(TRACE)]
pub fn select_best(worklist: &mut Vec<Where>, oracle: &dyn SolverOracle) -> Option<Where> {
    if worklist.is_empty() {
        return None;
    }
    let mut best = 0;
    for index in 1..worklist.len() {
        if Where::priority_compare(&worklist[index], &worklist[best], oracle) == Ordering::Less {
            best = index;
        }
    }
    Some(worklist.remove(best))
}
