// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::bit::{Bit, BitKind};
use crate::expression::{BinopKind, BoundKind, Exp, ExpGroup, ExpKind, FrameId, PPoint, UnopKind};
use crate::k_limits::KLimitConfig;
use crate::variable::{Field, Type, Variable};

use log_derive::{logfn, logfn_inputs};
use mirai_annotations::{assume_unreachable, checked_precondition};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result};
use std::rc::{Rc, Weak};

/// The canonicalization table for expressions and formulas. Every node reachable from a
/// handle returned by this table was created by it, so structural equality of nodes from one
/// table is pointer equality. The table holds weak references only: a node lives exactly as
/// long as some handle (or some parent node) refers to it.
///
/// A table is owned by one checker session and is not shared between threads.
pub struct ExpTable {
    exps: RefCell<HashMap<u32, Vec<Weak<Exp>>>>,
    bits: RefCell<HashMap<u32, Vec<Weak<Bit>>>>,
    limits: KLimitConfig,
}

impl Debug for ExpTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        "ExpTable".fmt(f)
    }
}

impl Default for ExpTable {
    fn default() -> Self {
        ExpTable::with_limits(KLimitConfig::default())
    }
}

/// Construction and bookkeeping
impl ExpTable {
    pub fn new() -> ExpTable {
        ExpTable::default()
    }

    pub fn with_limits(limits: KLimitConfig) -> ExpTable {
        ExpTable {
            exps: RefCell::new(HashMap::new()),
            bits: RefCell::new(HashMap::new()),
            limits,
        }
    }

    pub fn limits(&self) -> &KLimitConfig {
        &self.limits
    }

    /// The number of expression and formula nodes that are still referenced.
    pub fn live_count(&self) -> usize {
        let exps = self
            .exps
            .borrow()
            .values()
            .flat_map(|bucket| bucket.iter())
            .filter(|weak| weak.strong_count() > 0)
            .count();
        let bits = self
            .bits
            .borrow()
            .values()
            .flat_map(|bucket| bucket.iter())
            .filter(|weak| weak.strong_count() > 0)
            .count();
        exps + bits
    }

    /// Forgets the table entries of nodes that have been released.
    pub fn purge(&self) {
        self.exps.borrow_mut().retain(|_, bucket| {
            bucket.retain(|weak| weak.strong_count() > 0);
            !bucket.is_empty()
        });
        self.bits.borrow_mut().retain(|_, bucket| {
            bucket.retain(|weak| weak.strong_count() > 0);
            !bucket.is_empty()
        });
    }

    fn intern_exp(&self, exp: Exp) -> Rc<Exp> {
        let mut exps = self.exps.borrow_mut();
        let bucket = exps.entry(exp.hash32()).or_default();
        bucket.retain(|weak| weak.strong_count() > 0);
        for weak in bucket.iter() {
            if let Some(existing) = weak.upgrade() {
                if *existing == exp {
                    return existing;
                }
            }
        }
        let node = Rc::new(exp);
        bucket.push(Rc::downgrade(&node));
        node
    }

    fn intern_bit(&self, bit: Bit) -> Rc<Bit> {
        let mut bits = self.bits.borrow_mut();
        let bucket = bits.entry(bit.hash32()).or_default();
        bucket.retain(|weak| weak.strong_count() > 0);
        for weak in bucket.iter() {
            if let Some(existing) = weak.upgrade() {
                if *existing == bit {
                    return existing;
                }
            }
        }
        let node = Rc::new(bit);
        bucket.push(Rc::downgrade(&node));
        node
    }

    fn make(&self, kind: ExpKind) -> Rc<Exp> {
        self.intern_exp(Exp::new(kind, 0, true))
    }
}

fn check_value_kind(value_kind: &Option<Rc<Exp>>) {
    if let Some(kind) = value_kind {
        checked_precondition!(
            matches!(
                kind.kind,
                ExpKind::Bound { target: None, .. } | ExpKind::Terminate { target: None, .. }
            ),
            "a value kind must be a bound or terminator without a target: {:?}",
            kind
        );
    }
}

/// Lvalues can be based on other lvalues, and on pointer values computed from them.
fn is_lval_target(target: &Exp) -> bool {
    let is_pointer_value = match &target.kind {
        ExpKind::Binop { op, .. } => op.is_pointer_arithmetic(),
        ExpKind::Unop { op, .. } => *op == UnopKind::Coerce,
        _ => false,
    };
    is_pointer_value
        || (matches!(
            target.group(),
            ExpGroup::Lvalue | ExpGroup::LvalueModifier | ExpGroup::Placeholder
        ) && !matches!(target.kind, ExpKind::Guard { .. }))
}

fn check_lval_target(target: &Exp) {
    checked_precondition!(is_lval_target(target), "not an lvalue: {:?}", target);
}

/// Any value can be dereferenced except guards, floats and analysis terms.
fn is_drf_target(target: &Exp) -> bool {
    !matches!(target.kind, ExpKind::Guard { .. } | ExpKind::Float(..))
        && target.group() != ExpGroup::AnalysisOnly
}

/// Returns true if value can be represented with the given width and sign.
fn fits(value: i128, bits: u32, sign: bool) -> bool {
    if bits == 0 {
        return true;
    }
    if bits >= 128 {
        return sign || value >= 0;
    }
    if sign {
        let limit = 1i128 << (bits - 1);
        value >= -limit && value < limit
    } else {
        value >= 0 && value < (1i128 << bits)
    }
}

/// Expression factories
impl ExpTable {
    pub fn make_empty(&self) -> Rc<Exp> {
        self.make(ExpKind::Empty)
    }

    #[logfn_inputs(TRACE)]
    pub fn make_var(&self, var: Variable) -> Rc<Exp> {
        self.make(ExpKind::Var(var))
    }

    #[logfn_inputs(TRACE)]
    pub fn make_drf(&self, target: Rc<Exp>) -> Rc<Exp> {
        checked_precondition!(is_drf_target(&target), "cannot dereference {:?}", target);
        self.make(ExpKind::Drf { target })
    }

    #[logfn_inputs(TRACE)]
    pub fn make_fld(&self, target: Rc<Exp>, field: Field) -> Rc<Exp> {
        check_lval_target(&target);
        if let ExpKind::Rfld {
            target: inner,
            field: reversed,
        } = &target.kind
        {
            if *reversed == field {
                return inner.clone();
            }
        }
        self.make(ExpKind::Fld { target, field })
    }

    #[logfn_inputs(TRACE)]
    pub fn make_rfld(&self, target: Rc<Exp>, field: Field) -> Rc<Exp> {
        check_lval_target(&target);
        if let ExpKind::Fld {
            target: inner,
            field: accessed,
        } = &target.kind
        {
            if *accessed == field {
                return inner.clone();
            }
        }
        self.make(ExpKind::Rfld { target, field })
    }

    #[logfn_inputs(TRACE)]
    pub fn make_index(&self, target: Rc<Exp>, element_type: Type, index: Rc<Exp>) -> Rc<Exp> {
        check_lval_target(&target);
        self.make(ExpKind::Index {
            target,
            element_type,
            index,
        })
    }

    pub fn make_string(&self, data: &[u8]) -> Rc<Exp> {
        self.make(ExpKind::String(data.to_vec()))
    }

    pub fn make_vptr(&self, target: Rc<Exp>, vtable_index: u32) -> Rc<Exp> {
        check_lval_target(&target);
        self.make(ExpKind::VPtr {
            target,
            vtable_index,
        })
    }

    pub fn make_int(&self, value: i128) -> Rc<Exp> {
        self.make(ExpKind::Int(value))
    }

    pub fn make_float(&self, value: &str) -> Rc<Exp> {
        self.make(ExpKind::Float(value.to_owned()))
    }

    /// Makes a unary operation, folding it if the operand is a constant.
    #[logfn_inputs(TRACE)]
    pub fn make_unop(&self, op: UnopKind, operand: Rc<Exp>, bits: u32, sign: bool) -> Rc<Exp> {
        if let Some(v) = operand.as_int() {
            let folded = match op {
                UnopKind::Coerce => Some(v),
                UnopKind::Neg => v.checked_neg(),
                UnopKind::BitwiseNot => Some(!v),
                UnopKind::LogicalNot => Some((v == 0) as i128),
            };
            if let Some(result) = folded {
                if fits(result, bits, sign) {
                    return self.make_int(result);
                }
            }
        }
        if op == UnopKind::Coerce && bits == 0 {
            return operand;
        }
        if let (
            UnopKind::Neg,
            ExpKind::Unop {
                op: UnopKind::Neg,
                operand: inner,
            },
        ) = (op, &operand.kind)
        {
            return inner.clone();
        }
        let bits = if op == UnopKind::LogicalNot { 0 } else { bits };
        self.intern_exp(Exp::new(ExpKind::Unop { op, operand }, bits, sign))
    }

    /// Makes a binary operation, folding constants and applying the additive and
    /// multiplicative identities.
    #[logfn_inputs(TRACE)]
    pub fn make_binop(
        &self,
        op: BinopKind,
        left: Rc<Exp>,
        right: Rc<Exp>,
        stride_type: Option<Type>,
        bits: u32,
        sign: bool,
    ) -> Rc<Exp> {
        checked_precondition!(
            stride_type.is_some() || !op.is_pointer_arithmetic(),
            "pointer arithmetic needs a stride type"
        );
        if let (Some(l), Some(r)) = (left.as_int(), right.as_int()) {
            if let Some(result) = Self::fold_binop(op, l, r) {
                if op.is_compare() || fits(result, bits, sign) {
                    return self.make_int(result);
                }
            }
        }
        match (op, left.as_int(), right.as_int()) {
            (BinopKind::Plus, Some(0), _) | (BinopKind::Mult, Some(1), _) => return right,
            (BinopKind::Plus, _, Some(0))
            | (BinopKind::Minus, _, Some(0))
            | (BinopKind::PlusPI, _, Some(0))
            | (BinopKind::MinusPI, _, Some(0))
            | (BinopKind::Mult, _, Some(1))
            | (BinopKind::Div, _, Some(1)) => return left,
            (BinopKind::Mult, Some(0), _) | (BinopKind::Mult, _, Some(0)) => {
                return self.make_int(0)
            }
            _ => {}
        }
        let (bits, sign) = if op.is_compare()
            || matches!(op, BinopKind::LogicalAnd | BinopKind::LogicalOr)
        {
            (0, true)
        } else {
            (bits, sign)
        };
        self.intern_exp(Exp::new(
            ExpKind::Binop {
                op,
                left,
                right,
                stride_type,
            },
            bits,
            sign,
        ))
    }

    fn fold_binop(op: BinopKind, l: i128, r: i128) -> Option<i128> {
        match op {
            BinopKind::Plus => l.checked_add(r),
            BinopKind::Minus => l.checked_sub(r),
            BinopKind::Mult => l.checked_mul(r),
            BinopKind::Div => l.checked_div(r),
            BinopKind::Mod => l.checked_rem(r),
            BinopKind::ShiftLeft => u32::try_from(r).ok().and_then(|r| l.checked_shl(r)),
            BinopKind::ShiftRight => u32::try_from(r).ok().and_then(|r| l.checked_shr(r)),
            BinopKind::BitwiseAnd => Some(l & r),
            BinopKind::BitwiseOr => Some(l | r),
            BinopKind::BitwiseXor => Some(l ^ r),
            BinopKind::LessThan => Some((l < r) as i128),
            BinopKind::GreaterThan => Some((l > r) as i128),
            BinopKind::LessEqual => Some((l <= r) as i128),
            BinopKind::GreaterEqual => Some((l >= r) as i128),
            BinopKind::Equal => Some((l == r) as i128),
            BinopKind::NotEqual => Some((l != r) as i128),
            BinopKind::LogicalAnd => Some((l != 0 && r != 0) as i128),
            BinopKind::LogicalOr => Some((l != 0 || r != 0) as i128),
            BinopKind::Min => Some(l.min(r)),
            BinopKind::Max => Some(l.max(r)),
            BinopKind::PlusPI | BinopKind::MinusPI | BinopKind::MinusPP => None,
        }
    }

    #[logfn_inputs(TRACE)]
    pub fn make_clobber(
        &self,
        callee: Rc<Exp>,
        value_kind: Option<Rc<Exp>>,
        overwrite: Rc<Exp>,
        point: PPoint,
    ) -> Rc<Exp> {
        checked_precondition!(point != 0);
        check_value_kind(&value_kind);
        check_lval_target(&overwrite);
        self.make(ExpKind::Clobber {
            callee,
            value_kind,
            overwrite,
            point,
        })
    }

    #[logfn_inputs(TRACE)]
    pub fn make_exit(&self, target: Rc<Exp>, value_kind: Option<Rc<Exp>>) -> Rc<Exp> {
        check_value_kind(&value_kind);
        check_lval_target(&target);
        self.make(ExpKind::Exit { target, value_kind })
    }

    pub fn make_initial(&self, target: Rc<Exp>, value_kind: Option<Rc<Exp>>) -> Rc<Exp> {
        check_value_kind(&value_kind);
        check_lval_target(&target);
        self.make(ExpKind::Initial { target, value_kind })
    }

    #[logfn_inputs(TRACE)]
    pub fn make_val(
        &self,
        lval: Rc<Exp>,
        value_kind: Option<Rc<Exp>>,
        point: PPoint,
        relative: bool,
    ) -> Rc<Exp> {
        check_value_kind(&value_kind);
        self.make(ExpKind::Val {
            lval,
            value_kind,
            point,
            relative,
        })
    }

    pub fn make_guard(&self, point: PPoint) -> Rc<Exp> {
        checked_precondition!(point != 0);
        self.make(ExpKind::Guard { point })
    }

    pub fn make_frame(&self, value: Rc<Exp>, frame_id: FrameId) -> Rc<Exp> {
        checked_precondition!(
            !matches!(value.kind, ExpKind::Frame { .. }),
            "nested frame qualification"
        );
        self.make(ExpKind::Frame { value, frame_id })
    }

    pub fn make_bound(
        &self,
        bound_kind: BoundKind,
        target: Option<Rc<Exp>>,
        stride_type: Type,
    ) -> Rc<Exp> {
        self.make(ExpKind::Bound {
            bound_kind,
            target,
            stride_type,
        })
    }

    pub fn make_terminate(
        &self,
        target: Option<Rc<Exp>>,
        stride_type: Type,
        terminate_test: Rc<Exp>,
        terminate_int: Rc<Exp>,
    ) -> Rc<Exp> {
        checked_precondition!(terminate_int.as_int().is_some());
        checked_precondition!(terminate_test.is_relative());
        self.make(ExpKind::Terminate {
            target,
            stride_type,
            terminate_test,
            terminate_int,
        })
    }
}

/// Structural operations over lvalues
impl ExpTable {
    /// Returns exp with its lvalue target replaced by new_target. The overwritten lvalue of a
    /// clobber is not a replaceable target.
    #[logfn_inputs(TRACE)]
    pub fn replace_lval_target(&self, exp: &Rc<Exp>, new_target: Rc<Exp>) -> Rc<Exp> {
        match &exp.kind {
            ExpKind::Drf { .. } => self.make_drf(new_target),
            ExpKind::Fld { field, .. } => self.make_fld(new_target, field.clone()),
            ExpKind::Rfld { field, .. } => self.make_rfld(new_target, field.clone()),
            ExpKind::Index {
                element_type,
                index,
                ..
            } => self.make_index(new_target, element_type.clone(), index.clone()),
            ExpKind::VPtr { vtable_index, .. } => self.make_vptr(new_target, *vtable_index),
            ExpKind::Exit { value_kind, .. } => self.make_exit(new_target, value_kind.clone()),
            ExpKind::Initial { value_kind, .. } => {
                self.make_initial(new_target, value_kind.clone())
            }
            ExpKind::Bound {
                bound_kind,
                stride_type,
                ..
            } => self.make_bound(*bound_kind, Some(new_target), stride_type.clone()),
            ExpKind::Terminate {
                stride_type,
                terminate_test,
                terminate_int,
                ..
            } => self.make_terminate(
                Some(new_target),
                stride_type.clone(),
                terminate_test.clone(),
                terminate_int.clone(),
            ),
            _ => assume_unreachable!("no replaceable lvalue target in {:?}", exp),
        }
    }

    /// Rebuilds exp from new versions of the children reported by Exp::children, in the same
    /// order. The kind specific simplifications are applied again.
    pub fn with_children(&self, exp: &Rc<Exp>, mut children: Vec<Rc<Exp>>) -> Rc<Exp> {
        checked_precondition!(children.len() == exp.children().len());
        match &exp.kind {
            ExpKind::Drf { .. }
            | ExpKind::Fld { .. }
            | ExpKind::Rfld { .. }
            | ExpKind::VPtr { .. }
            | ExpKind::Bound {
                target: Some(..), ..
            }
            | ExpKind::Terminate {
                target: Some(..), ..
            } => {
                let target = children.remove(0);
                self.replace_lval_target(exp, target)
            }
            ExpKind::Index { element_type, .. } => {
                let index = children.remove(1);
                let target = children.remove(0);
                self.make_index(target, element_type.clone(), index)
            }
            ExpKind::Unop { op, .. } => {
                let operand = children.remove(0);
                self.make_unop(*op, operand, exp.bits, exp.sign)
            }
            ExpKind::Binop {
                op, stride_type, ..
            } => {
                let right = children.remove(1);
                let left = children.remove(0);
                self.make_binop(*op, left, right, stride_type.clone(), exp.bits, exp.sign)
            }
            _ => exp.clone(),
        }
    }

    /// Like with_children, but returns None when the new target of exp is not something
    /// exp can be based on, such as a constant below a field access.
    pub fn try_with_children(&self, exp: &Rc<Exp>, children: Vec<Rc<Exp>>) -> Option<Rc<Exp>> {
        let valid = match (&exp.kind, children.first()) {
            (ExpKind::Drf { .. }, Some(target)) => is_drf_target(target),
            (
                ExpKind::Fld { .. }
                | ExpKind::Rfld { .. }
                | ExpKind::Index { .. }
                | ExpKind::VPtr { .. },
                Some(target),
            ) => is_lval_target(target),
            _ => true,
        };
        if !valid {
            debug!("cannot rebuild {:?} over {:?}", exp, children[0]);
            return None;
        }
        Some(self.with_children(exp, children))
    }

    /// The target of exp that can be replaced with replace_lval_target.
    fn replaceable_target(exp: &Rc<Exp>) -> Option<&Rc<Exp>> {
        match exp.kind {
            ExpKind::Clobber { .. } => None,
            _ => exp.lval_target(),
        }
    }

    /// Composes a relative offset with a base lvalue: the empty expression at the bottom of
    /// offset is replaced by value.
    #[logfn_inputs(TRACE)]
    #[logfn(TRACE)]
    pub fn compose(&self, value: &Rc<Exp>, offset: &Rc<Exp>) -> Rc<Exp> {
        checked_precondition!(offset.is_relative(), "{:?} is not relative", offset);
        if offset.is_empty() {
            return value.clone();
        }
        match Self::replaceable_target(offset) {
            Some(target) => {
                let new_target = self.compose(value, target);
                self.replace_lval_target(offset, new_target)
            }
            None => assume_unreachable!(),
        }
    }

    /// For every lvalue along the chain of value, base first, the pair (subexpression,
    /// remainder) such that composing the subexpression with the remainder gives back value.
    /// The last pair is (value, empty).
    #[logfn_inputs(TRACE)]
    pub fn sub_exprs(&self, value: &Rc<Exp>) -> Vec<(Rc<Exp>, Rc<Exp>)> {
        let mut chain = vec![value.clone()];
        let mut current = value;
        while let Some(target) = Self::replaceable_target(current) {
            chain.push(target.clone());
            current = target;
        }
        chain.reverse();
        chain
            .into_iter()
            .filter_map(|sub| {
                self.sub_expr_remainder(value, &sub)
                    .map(|remainder| (sub, remainder))
            })
            .collect()
    }

    /// Where subexpr occurs along the lvalue chain of value, the relative remainder.
    #[logfn_inputs(TRACE)]
    pub fn sub_expr_remainder(&self, value: &Rc<Exp>, subexpr: &Rc<Exp>) -> Option<Rc<Exp>> {
        if Rc::ptr_eq(value, subexpr) {
            return Some(self.make_empty());
        }
        let target = Self::replaceable_target(value)?;
        let remainder = self.sub_expr_remainder(target, subexpr)?;
        Some(self.replace_lval_target(value, remainder))
    }
}

/// Formula factories
impl ExpTable {
    pub fn make_constant_bit(&self, value: bool) -> Rc<Bit> {
        self.intern_bit(Bit::new(BitKind::Constant(value)))
    }

    /// The formula that holds when value is non-zero.
    #[logfn_inputs(TRACE)]
    pub fn make_nonzero_bit(&self, value: Rc<Exp>) -> Rc<Bit> {
        if let Some(v) = value.as_int() {
            return self.make_constant_bit(v != 0);
        }
        if let ExpKind::Unop {
            op: UnopKind::LogicalNot,
            operand,
        } = &value.kind
        {
            let inner = self.make_nonzero_bit(operand.clone());
            return self.make_not(inner);
        }
        self.intern_bit(Bit::new(BitKind::Var(value)))
    }

    /// The formula comparing left and right.
    #[logfn_inputs(TRACE)]
    pub fn make_compare_bit(&self, op: BinopKind, left: Rc<Exp>, right: Rc<Exp>) -> Rc<Bit> {
        checked_precondition!(op.is_compare());
        let exp = self.make_binop(op, left, right, None, 0, true);
        self.make_nonzero_bit(exp)
    }

    pub fn make_not(&self, bit: Rc<Bit>) -> Rc<Bit> {
        match &bit.kind {
            BitKind::Constant(v) => self.make_constant_bit(!v),
            BitKind::Not(inner) => inner.clone(),
            _ => self.intern_bit(Bit::new(BitKind::Not(bit))),
        }
    }

    pub fn make_and(&self, left: Rc<Bit>, right: Rc<Bit>) -> Rc<Bit> {
        self.make_and_all(vec![left, right])
    }

    pub fn make_or(&self, left: Rc<Bit>, right: Rc<Bit>) -> Rc<Bit> {
        self.make_or_all(vec![left, right])
    }

    pub fn make_imply(&self, left: Rc<Bit>, right: Rc<Bit>) -> Rc<Bit> {
        let not_left = self.make_not(left);
        self.make_or(not_left, right)
    }

    pub fn make_and_all(&self, operands: Vec<Rc<Bit>>) -> Rc<Bit> {
        self.make_junction(operands, true)
    }

    pub fn make_or_all(&self, operands: Vec<Rc<Bit>>) -> Rc<Bit> {
        self.make_junction(operands, false)
    }

    fn make_junction(&self, operands: Vec<Rc<Bit>>, is_and: bool) -> Rc<Bit> {
        // For a conjunction, true is the identity and false absorbs. Dually for disjunction.
        let mut flat: Vec<Rc<Bit>> = Vec::with_capacity(operands.len());
        for operand in operands {
            let nested = match &operand.kind {
                BitKind::Constant(v) if *v == is_and => continue,
                BitKind::Constant(..) => return self.make_constant_bit(!is_and),
                BitKind::And(ops) if is_and => Some(ops.clone()),
                BitKind::Or(ops) if !is_and => Some(ops.clone()),
                _ => None,
            };
            match nested {
                Some(ops) => flat.extend(ops),
                None => flat.push(operand),
            }
        }
        flat.sort_by(|a, b| Bit::compare(a, b));
        flat.dedup_by(|a, b| Rc::ptr_eq(a, b));
        match flat.len() {
            0 => self.make_constant_bit(is_and),
            1 => flat.remove(0),
            _ => {
                let kind = if is_and {
                    BitKind::And(flat)
                } else {
                    BitKind::Or(flat)
                };
                self.intern_bit(Bit::new(kind))
            }
        }
    }

    /// Rebuilds bit from new versions of its operands, in the order of Bit::operands.
    pub fn with_operands(&self, bit: &Rc<Bit>, mut operands: Vec<Rc<Bit>>) -> Rc<Bit> {
        checked_precondition!(operands.len() == bit.operands().len());
        match &bit.kind {
            BitKind::Not(..) => self.make_not(operands.remove(0)),
            BitKind::And(..) => self.make_and_all(operands),
            BitKind::Or(..) => self.make_or_all(operands),
            BitKind::Constant(..) | BitKind::Var(..) => bit.clone(),
        }
    }
}

/// An ordered list of values, such as the actual arguments of a call. Only lvalues and
/// rvalues may be members: lvalue modifiers, bounds, terminators and solver placeholders only
/// have meaning inside a formula.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValueList {
    values: Vec<Rc<Exp>>,
}

impl ValueList {
    pub fn new(values: Vec<Rc<Exp>>) -> ValueList {
        let mut list = ValueList::default();
        for value in values {
            list.push(value);
        }
        list
    }

    pub fn push(&mut self, value: Rc<Exp>) {
        checked_precondition!(
            matches!(value.group(), ExpGroup::Lvalue | ExpGroup::Rvalue),
            "{:?} cannot be a member of a value list",
            value
        );
        self.values.push(value);
    }

    pub fn get(&self, index: usize) -> Option<&Rc<Exp>> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Exp>> {
        self.values.iter()
    }
}
