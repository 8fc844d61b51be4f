// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils;
use crate::variable::{Field, Type, Variable};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter, Result, Write};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A 1-based index into the points of a block. Zero is the invalid/abort point.
pub type PPoint = u32;

/// Identifies an active analysis frame during one run of the checker.
pub type FrameId = u32;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum UnopKind {
    /// Conversion to the bit width and sign of the unop.
    Coerce,
    Neg,
    BitwiseNot,
    LogicalNot,
}

impl UnopKind {
    pub fn ui_string(self) -> &'static str {
        match self {
            UnopKind::Coerce => "",
            UnopKind::Neg => "-",
            UnopKind::BitwiseNot => "~",
            UnopKind::LogicalNot => "!",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum BinopKind {
    Plus,
    Minus,
    Mult,
    Div,
    Mod,
    ShiftLeft,
    ShiftRight,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    LogicalAnd,
    LogicalOr,
    /// Pointer plus integer, scaled by the stride type.
    PlusPI,
    /// Pointer minus integer, scaled by the stride type.
    MinusPI,
    /// Pointer minus pointer, divided by the stride type.
    MinusPP,
    Min,
    Max,
}

impl BinopKind {
    pub fn ui_string(self) -> &'static str {
        match self {
            BinopKind::Plus | BinopKind::PlusPI => "+",
            BinopKind::Minus | BinopKind::MinusPI | BinopKind::MinusPP => "-",
            BinopKind::Mult => "*",
            BinopKind::Div => "/",
            BinopKind::Mod => "%",
            BinopKind::ShiftLeft => "<<",
            BinopKind::ShiftRight => ">>",
            BinopKind::BitwiseAnd => "&",
            BinopKind::BitwiseOr => "|",
            BinopKind::BitwiseXor => "^",
            BinopKind::LessThan => "<",
            BinopKind::GreaterThan => ">",
            BinopKind::LessEqual => "<=",
            BinopKind::GreaterEqual => ">=",
            BinopKind::Equal => "==",
            BinopKind::NotEqual => "!=",
            BinopKind::LogicalAnd => "&&",
            BinopKind::LogicalOr => "||",
            BinopKind::Min => "min",
            BinopKind::Max => "max",
        }
    }

    /// Comparisons produce 0 or 1 and never overflow.
    pub fn is_compare(self) -> bool {
        matches!(
            self,
            BinopKind::LessThan
                | BinopKind::GreaterThan
                | BinopKind::LessEqual
                | BinopKind::GreaterEqual
                | BinopKind::Equal
                | BinopKind::NotEqual
        )
    }

    pub fn is_pointer_arithmetic(self) -> bool {
        matches!(
            self,
            BinopKind::PlusPI | BinopKind::MinusPI | BinopKind::MinusPP
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum BoundKind {
    Lower,
    Upper,
    Offset,
}

/// The groups that expression kinds fall into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExpGroup {
    /// Addressable program locations.
    Lvalue,
    /// Pure values computed from lvalues and constants.
    Rvalue,
    /// The value an lvalue had, or will have, at some control point.
    LvalueModifier,
    /// Solver facing placeholders for a concept that has not been expanded yet.
    Placeholder,
    /// Facts about buffer bounds and string terminators synthesized by the analysis.
    AnalysisOnly,
}

/// The kind specific payload of an expression node. Children are canonical nodes
/// obtained from the same ExpTable.
#[derive(Clone, Eq, PartialEq, Hash)]
pub enum ExpKind {
    Empty,
    Var(Variable),
    Drf {
        target: Rc<Exp>,
    },
    Fld {
        target: Rc<Exp>,
        field: Field,
    },
    /// Given the address of a field, the address of the aggregate that contains it.
    Rfld {
        target: Rc<Exp>,
        field: Field,
    },
    Index {
        target: Rc<Exp>,
        element_type: Type,
        index: Rc<Exp>,
    },
    String(Vec<u8>),
    VPtr {
        target: Rc<Exp>,
        vtable_index: u32,
    },
    Int(i128),
    Float(String),
    Unop {
        op: UnopKind,
        operand: Rc<Exp>,
    },
    Binop {
        op: BinopKind,
        left: Rc<Exp>,
        right: Rc<Exp>,
        stride_type: Option<Type>,
    },
    /// The value of callee lvalue at callee exit, as seen by the caller right after the call
    /// at point, where it overwrote the caller lvalue overwrite.
    Clobber {
        callee: Rc<Exp>,
        value_kind: Option<Rc<Exp>>,
        overwrite: Rc<Exp>,
        point: PPoint,
    },
    Exit {
        target: Rc<Exp>,
        value_kind: Option<Rc<Exp>>,
    },
    /// The value of an lvalue at the initial entry to a loop.
    Initial {
        target: Rc<Exp>,
        value_kind: Option<Rc<Exp>>,
    },
    /// Uninterpreted value of lval at a point.
    Val {
        lval: Rc<Exp>,
        value_kind: Option<Rc<Exp>>,
        point: PPoint,
        relative: bool,
    },
    /// Uninterpreted condition under which a point executes.
    Guard {
        point: PPoint,
    },
    /// A value that belongs to another frame. Never persisted.
    Frame {
        value: Rc<Exp>,
        frame_id: FrameId,
    },
    Bound {
        bound_kind: BoundKind,
        target: Option<Rc<Exp>>,
        stride_type: Type,
    },
    Terminate {
        target: Option<Rc<Exp>>,
        stride_type: Type,
        terminate_test: Rc<Exp>,
        terminate_int: Rc<Exp>,
    },
}

fn compare_optional(exp0: &Option<Rc<Exp>>, exp1: &Option<Rc<Exp>>) -> Ordering {
    match (exp0, exp1) {
        (None, None) => Ordering::Equal,
        (None, Some(..)) => Ordering::Less,
        (Some(..), None) => Ordering::Greater,
        (Some(e0), Some(e1)) => Exp::compare(e0, e1),
    }
}

impl ExpKind {
    /// The position of the variant in the declaration.
    fn rank(&self) -> u8 {
        match self {
            ExpKind::Empty => 0,
            ExpKind::Var(..) => 1,
            ExpKind::Drf { .. } => 2,
            ExpKind::Fld { .. } => 3,
            ExpKind::Rfld { .. } => 4,
            ExpKind::Index { .. } => 5,
            ExpKind::String(..) => 6,
            ExpKind::VPtr { .. } => 7,
            ExpKind::Int(..) => 8,
            ExpKind::Float(..) => 9,
            ExpKind::Unop { .. } => 10,
            ExpKind::Binop { .. } => 11,
            ExpKind::Clobber { .. } => 12,
            ExpKind::Exit { .. } => 13,
            ExpKind::Initial { .. } => 14,
            ExpKind::Val { .. } => 15,
            ExpKind::Guard { .. } => 16,
            ExpKind::Frame { .. } => 17,
            ExpKind::Bound { .. } => 18,
            ExpKind::Terminate { .. } => 19,
        }
    }

    /// Compares the fields of two kinds of the same rank. Children are compared with
    /// Exp::compare.
    fn compare_payloads(kind0: &ExpKind, kind1: &ExpKind) -> Ordering {
        match (kind0, kind1) {
            (ExpKind::Var(v0), ExpKind::Var(v1)) => v0.cmp(v1),
            (ExpKind::Drf { target: t0 }, ExpKind::Drf { target: t1 }) => Exp::compare(t0, t1),
            (
                ExpKind::Fld {
                    target: t0,
                    field: f0,
                },
                ExpKind::Fld {
                    target: t1,
                    field: f1,
                },
            )
            | (
                ExpKind::Rfld {
                    target: t0,
                    field: f0,
                },
                ExpKind::Rfld {
                    target: t1,
                    field: f1,
                },
            ) => f0.cmp(f1).then_with(|| Exp::compare(t0, t1)),
            (
                ExpKind::Index {
                    target: t0,
                    element_type: e0,
                    index: i0,
                },
                ExpKind::Index {
                    target: t1,
                    element_type: e1,
                    index: i1,
                },
            ) => e0
                .cmp(e1)
                .then_with(|| Exp::compare(t0, t1))
                .then_with(|| Exp::compare(i0, i1)),
            (ExpKind::String(d0), ExpKind::String(d1)) => d0.cmp(d1),
            (
                ExpKind::VPtr {
                    target: t0,
                    vtable_index: v0,
                },
                ExpKind::VPtr {
                    target: t1,
                    vtable_index: v1,
                },
            ) => v0.cmp(v1).then_with(|| Exp::compare(t0, t1)),
            (ExpKind::Int(v0), ExpKind::Int(v1)) => v0.cmp(v1),
            (ExpKind::Float(v0), ExpKind::Float(v1)) => v0.cmp(v1),
            (
                ExpKind::Unop {
                    op: o0,
                    operand: e0,
                },
                ExpKind::Unop {
                    op: o1,
                    operand: e1,
                },
            ) => o0.cmp(o1).then_with(|| Exp::compare(e0, e1)),
            (
                ExpKind::Binop {
                    op: o0,
                    left: l0,
                    right: r0,
                    stride_type: s0,
                },
                ExpKind::Binop {
                    op: o1,
                    left: l1,
                    right: r1,
                    stride_type: s1,
                },
            ) => o0
                .cmp(o1)
                .then_with(|| s0.cmp(s1))
                .then_with(|| Exp::compare(l0, l1))
                .then_with(|| Exp::compare(r0, r1)),
            (
                ExpKind::Clobber {
                    callee: c0,
                    value_kind: k0,
                    overwrite: w0,
                    point: p0,
                },
                ExpKind::Clobber {
                    callee: c1,
                    value_kind: k1,
                    overwrite: w1,
                    point: p1,
                },
            ) => p0
                .cmp(p1)
                .then_with(|| Exp::compare(c0, c1))
                .then_with(|| compare_optional(k0, k1))
                .then_with(|| Exp::compare(w0, w1)),
            (
                ExpKind::Exit {
                    target: t0,
                    value_kind: k0,
                },
                ExpKind::Exit {
                    target: t1,
                    value_kind: k1,
                },
            )
            | (
                ExpKind::Initial {
                    target: t0,
                    value_kind: k0,
                },
                ExpKind::Initial {
                    target: t1,
                    value_kind: k1,
                },
            ) => Exp::compare(t0, t1).then_with(|| compare_optional(k0, k1)),
            (
                ExpKind::Val {
                    lval: l0,
                    value_kind: k0,
                    point: p0,
                    relative: r0,
                },
                ExpKind::Val {
                    lval: l1,
                    value_kind: k1,
                    point: p1,
                    relative: r1,
                },
            ) => p0
                .cmp(p1)
                .then_with(|| r0.cmp(r1))
                .then_with(|| Exp::compare(l0, l1))
                .then_with(|| compare_optional(k0, k1)),
            (ExpKind::Guard { point: p0 }, ExpKind::Guard { point: p1 }) => p0.cmp(p1),
            (
                ExpKind::Frame {
                    value: v0,
                    frame_id: f0,
                },
                ExpKind::Frame {
                    value: v1,
                    frame_id: f1,
                },
            ) => f0.cmp(f1).then_with(|| Exp::compare(v0, v1)),
            (
                ExpKind::Bound {
                    bound_kind: b0,
                    target: t0,
                    stride_type: s0,
                },
                ExpKind::Bound {
                    bound_kind: b1,
                    target: t1,
                    stride_type: s1,
                },
            ) => b0
                .cmp(b1)
                .then_with(|| s0.cmp(s1))
                .then_with(|| compare_optional(t0, t1)),
            (
                ExpKind::Terminate {
                    target: t0,
                    stride_type: s0,
                    terminate_test: e0,
                    terminate_int: i0,
                },
                ExpKind::Terminate {
                    target: t1,
                    stride_type: s1,
                    terminate_test: e1,
                    terminate_int: i1,
                },
            ) => s0
                .cmp(s1)
                .then_with(|| compare_optional(t0, t1))
                .then_with(|| Exp::compare(e0, e1))
                .then_with(|| Exp::compare(i0, i1)),
            _ => kind0.rank().cmp(&kind1.rank()),
        }
    }

    pub fn group(&self) -> ExpGroup {
        match self {
            ExpKind::Empty
            | ExpKind::Var(..)
            | ExpKind::Drf { .. }
            | ExpKind::Fld { .. }
            | ExpKind::Rfld { .. }
            | ExpKind::Index { .. }
            | ExpKind::String(..)
            | ExpKind::VPtr { .. } => ExpGroup::Lvalue,
            ExpKind::Int(..) | ExpKind::Float(..) | ExpKind::Unop { .. } | ExpKind::Binop { .. } => {
                ExpGroup::Rvalue
            }
            ExpKind::Clobber { .. } | ExpKind::Exit { .. } | ExpKind::Initial { .. } => {
                ExpGroup::LvalueModifier
            }
            ExpKind::Val { .. } | ExpKind::Guard { .. } | ExpKind::Frame { .. } => {
                ExpGroup::Placeholder
            }
            ExpKind::Bound { .. } | ExpKind::Terminate { .. } => ExpGroup::AnalysisOnly,
        }
    }
}

/// An immutable, hash-consed expression node. Nodes are only created by an ExpTable, so two
/// structurally equal nodes from the same table are the same object.
pub struct Exp {
    pub kind: ExpKind,
    /// Bit width of the operation, or zero if it cannot overflow.
    pub bits: u32,
    pub sign: bool,
    hash: u32,
}

impl Exp {
    pub(crate) fn new(kind: ExpKind, bits: u32, sign: bool) -> Exp {
        let hash = utils::stable_hash(&(&kind, bits, sign));
        Exp {
            kind,
            bits,
            sign,
            hash,
        }
    }

    /// The stable structural hash computed at construction.
    pub fn hash32(&self) -> u32 {
        self.hash
    }

    pub fn group(&self) -> ExpGroup {
        self.kind.group()
    }

    pub fn is_lvalue(&self) -> bool {
        matches!(
            self.group(),
            ExpGroup::Lvalue | ExpGroup::LvalueModifier | ExpGroup::AnalysisOnly
        )
    }

    pub fn is_rvalue(&self) -> bool {
        self.group() == ExpGroup::Rvalue
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, ExpKind::Empty)
    }

    pub fn as_int(&self) -> Option<i128> {
        match self.kind {
            ExpKind::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&Variable> {
        match &self.kind {
            ExpKind::Var(var) => Some(var),
            _ => None,
        }
    }

    /// If this is a dereference, its target.
    pub fn dereference(&self) -> Option<&Rc<Exp>> {
        match &self.kind {
            ExpKind::Drf { target } => Some(target),
            _ => None,
        }
    }

    /// The subterms that traversals descend into. Lvalue modifiers and placeholders are
    /// treated as leaves.
    pub fn children(&self) -> Vec<&Rc<Exp>> {
        match &self.kind {
            ExpKind::Drf { target }
            | ExpKind::Fld { target, .. }
            | ExpKind::Rfld { target, .. }
            | ExpKind::VPtr { target, .. } => vec![target],
            ExpKind::Index { target, index, .. } => vec![target, index],
            ExpKind::Unop { operand, .. } => vec![operand],
            ExpKind::Binop { left, right, .. } => vec![left, right],
            ExpKind::Bound { target, .. } | ExpKind::Terminate { target, .. } => {
                target.iter().collect()
            }
            _ => Vec::new(),
        }
    }

    /// For an lvalue based on another target expression, that target.
    pub fn lval_target(&self) -> Option<&Rc<Exp>> {
        match &self.kind {
            ExpKind::Drf { target }
            | ExpKind::Fld { target, .. }
            | ExpKind::Rfld { target, .. }
            | ExpKind::Index { target, .. }
            | ExpKind::VPtr { target, .. }
            | ExpKind::Exit { target, .. }
            | ExpKind::Initial { target, .. } => Some(target),
            ExpKind::Clobber { overwrite, .. } => Some(overwrite),
            ExpKind::Bound { target, .. } | ExpKind::Terminate { target, .. } => target.as_ref(),
            _ => None,
        }
    }

    /// Walks the chain of lvalue targets, starting with this node.
    pub fn lval_chain(&self) -> LvalChain<'_> {
        LvalChain { next: Some(self) }
    }

    /// For an lvalue, the variable it is derived from.
    pub fn root(&self) -> Option<&Variable> {
        self.lval_chain().last().and_then(Exp::as_var)
    }

    /// For an lvalue, the nearest clobbered value it is derived from.
    pub fn clobber_root(&self) -> Option<&Exp> {
        self.lval_chain()
            .find(|exp| matches!(exp.kind, ExpKind::Clobber { .. }))
    }

    /// For an lvalue, whether it is derived from the empty expression.
    pub fn is_relative(&self) -> bool {
        self.lval_chain().last().map_or(false, Exp::is_empty)
    }

    /// For an lvalue, the field nearest to its base.
    pub fn base_field(&self) -> Option<&Field> {
        self.lval_chain()
            .filter_map(|exp| match &exp.kind {
                ExpKind::Fld { field, .. } => Some(field),
                _ => None,
            })
            .last()
    }

    /// The number of dereferences along the lvalue chain.
    pub fn deref_count(&self) -> usize {
        self.lval_chain()
            .filter(|exp| matches!(exp.kind, ExpKind::Drf { .. }))
            .count()
    }

    /// The number of field accesses along the lvalue chain.
    pub fn field_count(&self) -> usize {
        self.lval_chain()
            .filter(|exp| matches!(exp.kind, ExpKind::Fld { .. }))
            .count()
    }

    /// The number of non-constant terms in an rvalue. Repeated terms count repeatedly,
    /// so (x + y) * (x + y) has four.
    pub fn term_count(&self) -> usize {
        match &self.kind {
            ExpKind::Int(..) | ExpKind::Float(..) => 0,
            ExpKind::Unop { operand, .. } => operand.term_count(),
            ExpKind::Binop { left, right, .. } => {
                left.term_count().saturating_add(right.term_count())
            }
            _ => 1,
        }
    }

    /// Whether the term count exceeds count. Stops as soon as the answer is known, so this
    /// terminates quickly on heavily shared expressions where term_count does not.
    pub fn term_count_exceeds(&self, count: usize) -> bool {
        let mut remaining = count;
        !self.consume_terms(&mut remaining)
    }

    fn consume_terms(&self, remaining: &mut usize) -> bool {
        match &self.kind {
            ExpKind::Int(..) | ExpKind::Float(..) => true,
            ExpKind::Unop { operand, .. } => operand.consume_terms(remaining),
            ExpKind::Binop { left, right, .. } => {
                left.consume_terms(remaining) && right.consume_terms(remaining)
            }
            _ => {
                if *remaining == 0 {
                    return false;
                }
                *remaining -= 1;
                true
            }
        }
    }

    /// A total order on nodes that is stable across runs: by hash, then by structure.
    /// Distinct nodes of one table never compare equal.
    pub fn compare(exp0: &Exp, exp1: &Exp) -> Ordering {
        if std::ptr::eq(exp0, exp1) {
            return Ordering::Equal;
        }
        exp0.hash
            .cmp(&exp1.hash)
            .then_with(|| exp0.kind.rank().cmp(&exp1.kind.rank()))
            .then_with(|| exp0.bits.cmp(&exp1.bits))
            .then_with(|| exp0.sign.cmp(&exp1.sign))
            .then_with(|| ExpKind::compare_payloads(&exp0.kind, &exp1.kind))
    }

    /// Renders this node the way a user would write it in C, reading lvalues as values.
    pub fn print_ui(&self, parens: bool) -> String {
        let mut out = String::new();
        self.write_ui_rvalue(&mut out, parens);
        out
    }

    fn write_ui_rvalue(&self, out: &mut String, parens: bool) {
        match &self.kind {
            ExpKind::Drf { target } => target.write_ui_lvalue(out),
            ExpKind::Int(v) => {
                let _ = write!(out, "{}", v);
            }
            ExpKind::Float(v) => out.push_str(v),
            ExpKind::Unop { op, operand } => {
                out.push_str(op.ui_string());
                operand.write_ui_rvalue(out, true);
            }
            ExpKind::Binop {
                op, left, right, ..
            } => {
                if matches!(op, BinopKind::Min | BinopKind::Max) {
                    out.push_str(op.ui_string());
                    out.push('(');
                    left.write_ui_rvalue(out, false);
                    out.push_str(", ");
                    right.write_ui_rvalue(out, false);
                    out.push(')');
                    return;
                }
                if parens {
                    out.push('(');
                }
                left.write_ui_rvalue(out, true);
                let _ = write!(out, " {} ", op.ui_string());
                right.write_ui_rvalue(out, true);
                if parens {
                    out.push(')');
                }
            }
            ExpKind::Exit { .. } | ExpKind::Initial { .. } | ExpKind::Clobber { .. } => {
                self.write_ui_lvalue(out)
            }
            ExpKind::Bound { .. } | ExpKind::Terminate { .. } => self.write_ui_lvalue(out),
            ExpKind::Val { .. } | ExpKind::Guard { .. } | ExpKind::Frame { .. } => {
                let _ = write!(out, "{:?}", self);
            }
            _ => {
                out.push('&');
                self.write_ui_lvalue(out);
            }
        }
    }

    fn write_ui_lvalue(&self, out: &mut String) {
        match &self.kind {
            ExpKind::Empty => out.push_str("<empty>"),
            ExpKind::Var(var) => {
                let _ = write!(out, "{:?}", var);
            }
            ExpKind::Drf { target } => {
                out.push('*');
                target.write_ui_lvalue(out);
            }
            ExpKind::Fld { target, field } => match target.dereference() {
                Some(base) => {
                    base.write_ui_lvalue(out);
                    let _ = write!(out, "->{}", field.name);
                }
                None => {
                    target.write_ui_lvalue(out);
                    let _ = write!(out, ".{}", field.name);
                }
            },
            ExpKind::Rfld { target, field } => {
                let _ = write!(out, "container_of(");
                target.write_ui_rvalue(out, false);
                let _ = write!(out, ", {}.{})", field.csu, field.name);
            }
            ExpKind::Index { target, index, .. } => {
                target.write_ui_lvalue(out);
                out.push('[');
                index.write_ui_rvalue(out, false);
                out.push(']');
            }
            ExpKind::String(data) => {
                let _ = write!(out, "\"{}\"", String::from_utf8_lossy(data));
            }
            ExpKind::VPtr {
                target,
                vtable_index,
            } => {
                target.write_ui_lvalue(out);
                let _ = write!(out, ".vtable[{}]", vtable_index);
            }
            ExpKind::Clobber {
                value_kind,
                overwrite,
                ..
            }
            | ExpKind::Exit {
                target: overwrite,
                value_kind,
            } => {
                let prefix = if matches!(self.kind, ExpKind::Clobber { .. }) {
                    "after"
                } else {
                    "exit"
                };
                Self::write_ui_modified(out, prefix, overwrite, value_kind.as_ref());
            }
            ExpKind::Initial { target, value_kind } => {
                Self::write_ui_modified(out, "initial", target, value_kind.as_ref());
            }
            ExpKind::Bound {
                bound_kind, target, ..
            } => {
                let name = match bound_kind {
                    BoundKind::Lower => "lbound",
                    BoundKind::Upper => "ubound",
                    BoundKind::Offset => "offset",
                };
                out.push_str(name);
                out.push('(');
                if let Some(target) = target {
                    target.write_ui_rvalue(out, false);
                }
                out.push(')');
            }
            ExpKind::Terminate { target, .. } => {
                out.push_str("terminator(");
                if let Some(target) = target {
                    target.write_ui_rvalue(out, false);
                }
                out.push(')');
            }
            _ => self.write_ui_rvalue(out, true),
        }
    }

    fn write_ui_modified(out: &mut String, prefix: &str, target: &Rc<Exp>, kind: Option<&Rc<Exp>>) {
        out.push_str(prefix);
        out.push('(');
        match kind {
            Some(kind) => {
                kind.write_ui_lvalue(out);
                out.push_str(" of ");
                target.write_ui_lvalue(out);
            }
            None => target.write_ui_lvalue(out),
        }
        out.push(')');
    }
}

/// Iterator over an lvalue and its successive lvalue targets.
pub struct LvalChain<'a> {
    next: Option<&'a Exp>,
}

impl<'a> Iterator for LvalChain<'a> {
    type Item = &'a Exp;

    fn next(&mut self) -> Option<&'a Exp> {
        let current = self.next?;
        self.next = current.lval_target().map(|target| target.as_ref());
        Some(current)
    }
}

impl PartialEq for Exp {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
            || (self.hash == other.hash
                && self.bits == other.bits
                && self.sign == other.sign
                && self.kind == other.kind)
    }
}

impl Eq for Exp {}

impl Hash for Exp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash);
    }
}

impl Debug for Exp {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match &self.kind {
            ExpKind::Empty => f.write_str("empty"),
            ExpKind::Var(var) => var.fmt(f),
            ExpKind::Drf { target } => write!(f, "*{:?}", target),
            ExpKind::Fld { target, field } => write!(f, "{:?}.{:?}", target, field),
            ExpKind::Rfld { target, field } => write!(f, "{:?}.{:?}~", target, field),
            ExpKind::Index { target, index, .. } => write!(f, "{:?}[{:?}]", target, index),
            ExpKind::String(data) => write!(f, "{:?}", String::from_utf8_lossy(data)),
            ExpKind::VPtr {
                target,
                vtable_index,
            } => write!(f, "{:?}.vptr[{}]", target, vtable_index),
            ExpKind::Int(v) => write!(f, "{}", v),
            ExpKind::Float(v) => f.write_str(v),
            ExpKind::Unop { op, operand } => write!(f, "{:?}({:?})", op, operand),
            ExpKind::Binop {
                op, left, right, ..
            } => write!(f, "({:?} {} {:?})", left, op.ui_string(), right),
            ExpKind::Clobber {
                callee,
                value_kind,
                overwrite,
                point,
            } => write!(
                f,
                "clobber({:?}, {:?}, {:?}, {})",
                callee, value_kind, overwrite, point
            ),
            ExpKind::Exit { target, value_kind } => write!(f, "exit({:?}, {:?})", target, value_kind),
            ExpKind::Initial { target, value_kind } => {
                write!(f, "initial({:?}, {:?})", target, value_kind)
            }
            ExpKind::Val {
                lval,
                value_kind,
                point,
                relative,
            } => write!(
                f,
                "val({:?}, {:?}, {}{})",
                lval,
                value_kind,
                point,
                if *relative { ", relative" } else { "" }
            ),
            ExpKind::Guard { point } => write!(f, "guard({})", point),
            ExpKind::Frame { value, frame_id } => write!(f, "frame{}({:?})", frame_id, value),
            ExpKind::Bound {
                bound_kind, target, ..
            } => write!(f, "{:?}({:?})", bound_kind, target),
            ExpKind::Terminate {
                target,
                terminate_test,
                terminate_int,
                ..
            } => write!(
                f,
                "terminate({:?}, {:?} == {:?})",
                target, terminate_test, terminate_int
            ),
        }
    }
}
