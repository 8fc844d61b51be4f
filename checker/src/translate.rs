// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Rewriting formulas so that they make sense in an adjacent frame: a caller, a callee, the
//! next iteration of a loop, or the object written at a heap update.

use crate::bit::{Bit, BitKind};
use crate::expression::{Exp, ExpGroup, ExpKind, FrameId, PPoint};
use crate::hash_cons::{ExpTable, ValueList};
use crate::memory::{BlockMemory, CheckerFrame, GuardBitVector, PEdge, TranslateKind};
use crate::variable::{VarKind, Variable};
use crate::visitors::{self, ExpMapper, TraversalConfig, VisitKind};

use log_derive::{logfn, logfn_inputs};
use mirai_annotations::assume_unreachable;
use std::rc::Rc;

/// The object a type invariant talks about, `*this`.
pub fn this_object(table: &ExpTable) -> Rc<Exp> {
    let this = table.make_var(Variable::this());
    table.make_drf(this)
}

/// Replaces the cross-frame references to one frame by the values they wrap.
#[derive(Debug)]
pub struct RemoveFrameMapper {
    frame_id: FrameId,
}

impl RemoveFrameMapper {
    pub fn new(frame_id: FrameId) -> RemoveFrameMapper {
        RemoveFrameMapper { frame_id }
    }
}

impl ExpMapper for RemoveFrameMapper {
    fn map(&mut self, _table: &ExpTable, value: Rc<Exp>, _old: &Rc<Exp>) -> Option<Rc<Exp>> {
        match &value.kind {
            ExpKind::Frame {
                value: inner,
                frame_id,
            } if *frame_id == self.frame_id => Some(inner.clone()),
            _ => Some(value),
        }
    }
}

/// Strips the qualification for frame_id from every cross-frame reference in bit.
pub fn remove_frame(table: &ExpTable, bit: &Rc<Bit>, frame_id: FrameId) -> Rc<Bit> {
    let mut mapper = RemoveFrameMapper::new(frame_id);
    match visitors::map_bit(table, bit, TraversalConfig::new(VisitKind::All), &mut mapper) {
        Some(new_bit) => new_bit,
        None => assume_unreachable!("frame removal never drops a term"),
    }
}

/// Rewrites a formula over the entry state of a callee into the terms of a caller, using the
/// actual arguments, return lvalue and receiver object of the call at one point. Formulas
/// that refer to callee locals, or to the address of a formal whose actual is not an lvalue,
/// are dropped.
pub struct ConvertCallsiteMapper<'a> {
    edge: Option<&'a PEdge>,
    unrolling: bool,
}

impl<'a> ConvertCallsiteMapper<'a> {
    pub fn new(edge: Option<&'a PEdge>, unrolling: bool) -> ConvertCallsiteMapper<'a> {
        ConvertCallsiteMapper { edge, unrolling }
    }

    fn convert(
        value: Rc<Exp>,
        old: &Rc<Exp>,
        arguments: &ValueList,
        return_value: Option<&Rc<Exp>>,
        instance: Option<&Rc<Exp>>,
    ) -> Option<Rc<Exp>> {
        match &old.kind {
            ExpKind::Var(var) => match var.kind {
                VarKind::Arg => {
                    let actual = arguments.get(var.index as usize)?;
                    // The address of a formal is the address of the actual when the actual is
                    // read from an lvalue. Otherwise the enclosing dereference resolves it.
                    Some(actual.dereference().cloned().unwrap_or(value))
                }
                VarKind::This => {
                    let instance = instance?;
                    Some(instance.dereference().cloned().unwrap_or(value))
                }
                VarKind::Return => return_value.cloned(),
                VarKind::Local | VarKind::Temp => None,
                VarKind::Glob | VarKind::Func => Some(value),
            },
            ExpKind::Drf { target } => match target.as_var().map(|var| (var.kind, var.index)) {
                Some((VarKind::Arg, index)) => arguments.get(index as usize).cloned(),
                Some((VarKind::This, _)) => instance.cloned(),
                _ => Some(value),
            },
            _ => {
                let unresolved = old.children().iter().any(|child| {
                    Self::is_unresolved_address(child, arguments, instance)
                });
                if unresolved {
                    None
                } else {
                    Some(value)
                }
            }
        }
    }

    /// The address of a formal (or of the receiver pointer) that has no caller counterpart.
    fn is_unresolved_address(
        exp: &Exp,
        arguments: &ValueList,
        instance: Option<&Rc<Exp>>,
    ) -> bool {
        match exp.as_var() {
            Some(var) if var.kind == VarKind::Arg => arguments
                .get(var.index as usize)
                .map_or(true, |actual| actual.dereference().is_none()),
            Some(var) if var.kind == VarKind::This => {
                instance.map_or(true, |instance| instance.dereference().is_none())
            }
            _ => false,
        }
    }
}

impl<'a> ExpMapper for ConvertCallsiteMapper<'a> {
    fn map(&mut self, _table: &ExpTable, value: Rc<Exp>, old: &Rc<Exp>) -> Option<Rc<Exp>> {
        if self.unrolling {
            return Some(value);
        }
        match self.edge {
            Some(PEdge::Call {
                arguments,
                return_value,
                instance,
                ..
            }) => Self::convert(
                value,
                old,
                arguments,
                return_value.as_ref(),
                instance.as_ref(),
            ),
            Some(PEdge::Loop { .. }) => Some(value),
            None => Self::convert(value, old, &ValueList::default(), None, None),
        }
    }
}

/// Replaces exit and clobber expressions by the plain reads they stand for, so that a
/// formula over a callee's exit state can be shown, or translated, as an ordinary formula.
#[derive(Debug, Default)]
pub struct ConvertExitClobberMapper {}

impl ExpMapper for ConvertExitClobberMapper {
    fn map(&mut self, table: &ExpTable, value: Rc<Exp>, _old: &Rc<Exp>) -> Option<Rc<Exp>> {
        let (target, value_kind) = match &value.kind {
            ExpKind::Exit { target, value_kind } => (target, value_kind),
            ExpKind::Clobber {
                overwrite,
                value_kind,
                ..
            } => (overwrite, value_kind),
            _ => return Some(value),
        };
        // The modifier was a leaf of the traversal, so its target has not been seen yet.
        let config = TraversalConfig::new(VisitKind::All);
        let new_target = visitors::map_exp(table, target, config, self)?;
        match value_kind {
            Some(kind) => Some(table.replace_lval_target(kind, new_target)),
            None => Some(table.make_drf(new_target)),
        }
    }
}

pub fn convert_exit_clobber(table: &ExpTable, bit: &Rc<Bit>) -> Rc<Bit> {
    let mut mapper = ConvertExitClobberMapper::default();
    match visitors::map_bit(table, bit, TraversalConfig::new(VisitKind::All), &mut mapper) {
        Some(new_bit) => new_bit,
        None => assume_unreachable!("exit conversion never drops a term"),
    }
}

/// The expressions that bit tests for being non-zero.
fn formula_terms(bit: &Rc<Bit>, terms: &mut Vec<Rc<Exp>>) {
    match &bit.kind {
        BitKind::Var(exp) => terms.push(exp.clone()),
        _ => {
            for operand in bit.operands() {
                formula_terms(operand, terms);
            }
        }
    }
}

/// Decides whether a formula that has to hold at the entry of a block should be pushed to
/// the callers of a function (or to the code before a loop) rather than proved locally.
/// Formulas about locals of a function, about placeholders, or that are too large are not.
#[logfn_inputs(TRACE)]
#[logfn(TRACE)]
pub fn use_caller_bit(table: &ExpTable, bit: &Rc<Bit>, is_function: bool) -> bool {
    let mut terms = Vec::new();
    formula_terms(bit, &mut terms);
    let mut remaining = table.limits().max_caller_bit_terms;
    for term in &terms {
        if term.term_count_exceeds(remaining) {
            debug!("too many terms for the caller: {:?}", bit);
            return false;
        }
        remaining -= term.term_count();
    }

    let mut usable = true;
    visitors::visit_bit(bit, VisitKind::All, &mut |exp: &Rc<Exp>| {
        match &exp.kind {
            ExpKind::Val { .. } | ExpKind::Guard { .. } | ExpKind::Frame { .. } => usable = false,
            ExpKind::Clobber { .. } => usable = false,
            ExpKind::Exit { .. } | ExpKind::Initial { .. } if is_function => usable = false,
            ExpKind::Var(var)
                if is_function
                    && matches!(var.kind, VarKind::Local | VarKind::Temp | VarKind::Return) =>
            {
                usable = false
            }
            _ => {}
        }
    });
    usable
}

/// Rewrites a formula that holds right after the call or loop at point into one over the
/// exit state of the callee or loop body: clobbers introduced at point become exit values of
/// the callee lvalues they came from. None if the edge has no known target, or if the
/// formula does not depend on it.
#[logfn_inputs(TRACE)]
pub fn translate_callee_bit(
    table: &ExpTable,
    memory: &dyn BlockMemory,
    point: PPoint,
    bit: &Rc<Bit>,
    frame_id: FrameId,
) -> Option<Rc<Bit>> {
    let edge = memory.outgoing_edge(point)?;
    if let PEdge::Call { .. } = edge {
        if edge.direct_callee().is_none() && memory.indirect_callees(point).is_empty() {
            debug!("no known callee at {:?}:{}", memory.id(), point);
            return None;
        }
    }
    let bit = remove_frame(table, bit, frame_id);
    let mut found_exit = false;
    let mut mapper = |table: &ExpTable, value: Rc<Exp>, _old: &Rc<Exp>| -> Option<Rc<Exp>> {
        if let ExpKind::Clobber {
            callee,
            value_kind,
            point: clobber_point,
            ..
        } = &value.kind
        {
            if *clobber_point == point {
                found_exit = true;
                return Some(table.make_exit(callee.clone(), value_kind.clone()));
            }
        }
        Some(value)
    };
    let new_bit = visitors::map_bit(table, &bit, TraversalConfig::new(VisitKind::All), &mut mapper)?;
    if found_exit {
        Some(new_bit)
    } else {
        None
    }
}

fn is_heap_root(var: &Variable) -> bool {
    matches!(var.kind, VarKind::This | VarKind::Glob | VarKind::Func)
}

/// Rewrites bit in terms of the heap: old_lval, if given, is replaced by new_lval. When exit
/// is false the result must only read storage reachable from `this` or globals, otherwise
/// there is no result. When exit is true every read becomes a read of the exit state.
#[logfn_inputs(TRACE)]
pub fn translate_heap_bit(
    table: &ExpTable,
    old_lval: Option<&Rc<Exp>>,
    new_lval: Option<&Rc<Exp>>,
    exit: bool,
    bit: &Rc<Bit>,
) -> Option<Rc<Bit>> {
    let bit = match (old_lval, new_lval) {
        (Some(old_lval), Some(new_lval)) => visitors::replace_bit(table, bit, old_lval, new_lval),
        _ => bit.clone(),
    };

    if exit {
        let mut mapper = |table: &ExpTable, value: Rc<Exp>, _old: &Rc<Exp>| -> Option<Rc<Exp>> {
            match &value.kind {
                ExpKind::Drf { target } if !matches!(target.kind, ExpKind::Int(..)) => {
                    Some(table.make_exit(target.clone(), None))
                }
                _ => Some(value),
            }
        };
        return visitors::map_bit(table, &bit, TraversalConfig::new(VisitKind::All), &mut mapper);
    }

    let mut heap_relative = true;
    visitors::visit_bit(&bit, VisitKind::All, &mut |exp: &Rc<Exp>| match &exp.kind {
        ExpKind::Var(var) if !is_heap_root(var) => heap_relative = false,
        _ if exp.group() == ExpGroup::Placeholder => heap_relative = false,
        _ => {}
    });
    if heap_relative {
        Some(bit)
    } else {
        None
    }
}

/// True if bit still holds uninterpreted values or cross-frame references.
pub fn has_placeholders(bit: &Rc<Bit>) -> bool {
    let mut found = false;
    visitors::visit_bit(bit, VisitKind::All, &mut |exp: &Rc<Exp>| {
        if matches!(exp.kind, ExpKind::Val { .. } | ExpKind::Frame { .. }) {
            found = true;
        }
    });
    found
}

/// Eliminates the uninterpreted values and the references to frame from each input
/// formula. Each is expanded by the memory model into concrete alternatives, whose guards are
/// conjoined with the guard of the input. The result is sorted and combined.
#[logfn_inputs(TRACE)]
pub fn remove_val_bits(
    table: &ExpTable,
    frame: &dyn CheckerFrame,
    input: &GuardBitVector,
) -> GuardBitVector {
    let memory = frame.memory();
    let mut output = GuardBitVector::new();
    for igb in input {
        let bit = remove_frame(table, &igb.bit, frame.id());
        if !has_placeholders(&bit) {
            output.push(bit, igb.guard.clone());
            continue;
        }
        let removed = memory.translate_bit(table, TranslateKind::RemoveVal, 0, &bit);
        for rgb in removed {
            let guard = table.make_and(igb.guard.clone(), rgb.guard);
            output.push(rgb.bit, guard);
        }
    }
    output.sort_combine(table);
    output
}

/// Eliminates placeholders from a single formula that holds unconditionally.
pub fn eliminate_placeholders(
    table: &ExpTable,
    frame: &dyn CheckerFrame,
    bit: &Rc<Bit>,
) -> GuardBitVector {
    let mut input = GuardBitVector::new();
    input.push(bit.clone(), table.make_constant_bit(true));
    remove_val_bits(table, frame, &input)
}

/// The formulas that have to be proved for an assertion of cond at point of frame.
#[logfn_inputs(TRACE)]
pub fn assert_bits(
    table: &ExpTable,
    frame: &dyn CheckerFrame,
    point: PPoint,
    cond: &Rc<Bit>,
) -> GuardBitVector {
    let base_res = frame
        .memory()
        .translate_bit(table, TranslateKind::Point, point, cond);
    remove_val_bits(table, frame, &base_res)
}
