// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Generic walks over expressions and formulas. Lvalue modifiers and solver placeholders are
//! leaves: a mapper that wants to look inside one has to do so explicitly.

use crate::bit::{Bit, BitKind};
use crate::expression::{Exp, ExpKind};
use crate::hash_cons::ExpTable;

use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Which nodes a traversal reports to its visitor or mapper.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VisitKind {
    /// Every node, children before parents.
    All,
    /// Visitors see the lvalues whose contents are read: dereference targets and the targets
    /// of modifiers and placeholders. Mappers see every lvalue node.
    Lval,
}

/// What happens to a node that a mapper declines to map.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WidenPolicy {
    /// The enclosing expression, and any formula containing it, is dropped.
    Drop,
    /// The node is passed through unchanged.
    Keep,
}

/// The configuration of one traversal call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TraversalConfig {
    pub scope: VisitKind,
    pub policy: WidenPolicy,
    /// If a multi-map yields more alternatives than this for some node, the node reverts to
    /// itself. Zero means no limit.
    pub result_limit: usize,
}

impl TraversalConfig {
    pub fn new(scope: VisitKind) -> TraversalConfig {
        TraversalConfig {
            scope,
            policy: WidenPolicy::Drop,
            result_limit: 0,
        }
    }

    /// A configuration whose multi-map result limit is the one table was created with.
    pub fn for_table(table: &ExpTable, scope: VisitKind) -> TraversalConfig {
        TraversalConfig::new(scope).with_result_limit(table.limits().max_multimap_results)
    }

    pub fn with_policy(mut self, policy: WidenPolicy) -> TraversalConfig {
        self.policy = policy;
        self
    }

    pub fn with_result_limit(mut self, result_limit: usize) -> TraversalConfig {
        self.result_limit = result_limit;
        self
    }

    fn in_scope(&self, exp: &Exp) -> bool {
        match self.scope {
            VisitKind::All => true,
            VisitKind::Lval => exp.is_lvalue(),
        }
    }
}

pub trait ExpVisitor {
    fn visit(&mut self, exp: &Rc<Exp>);

    /// Once this returns true the walk stops early.
    fn is_finished(&self) -> bool {
        false
    }
}

impl<F> ExpVisitor for F
where
    F: FnMut(&Rc<Exp>),
{
    fn visit(&mut self, exp: &Rc<Exp>) {
        self(exp)
    }
}

pub trait ExpMapper {
    /// Maps value, which is old with its children already mapped, to its replacement.
    /// Returning None declines; what that means is decided by the traversal's WidenPolicy.
    fn map(&mut self, table: &ExpTable, value: Rc<Exp>, old: &Rc<Exp>) -> Option<Rc<Exp>>;
}

impl<F> ExpMapper for F
where
    F: FnMut(&ExpTable, Rc<Exp>, &Rc<Exp>) -> Option<Rc<Exp>>,
{
    fn map(&mut self, table: &ExpTable, value: Rc<Exp>, old: &Rc<Exp>) -> Option<Rc<Exp>> {
        self(table, value, old)
    }
}

pub trait ExpMultiMapper {
    /// Adds the alternatives for value (whose children are already mapped) to results.
    /// Use add_result to keep results free of duplicates.
    fn multi_map(&mut self, table: &ExpTable, value: Rc<Exp>, results: &mut Vec<Rc<Exp>>);
}

/// Adds exp to a multi-map result vector unless it is already there.
pub fn add_result(exp: Rc<Exp>, results: &mut Vec<Rc<Exp>>) {
    if !results.iter().any(|r| Rc::ptr_eq(r, &exp)) {
        results.push(exp);
    }
}

/// If results grew beyond the limit, replaces them with just the original node.
fn limit_revert<T>(results: &mut Vec<Rc<T>>, original: &Rc<T>, limit: usize) -> bool {
    if limit != 0 && results.len() > limit {
        debug!("multi-map exceeded {} results, reverting", limit);
        results.clear();
        results.push(original.clone());
        return true;
    }
    false
}

/// Walks exp and reports the nodes in scope to visitor. Shared subterms are visited once.
pub fn visit_exp(exp: &Rc<Exp>, scope: VisitKind, visitor: &mut dyn ExpVisitor) {
    let mut seen = HashSet::new();
    walk_exp(exp, scope, visitor, &mut seen);
}

/// Walks every expression in bit.
pub fn visit_bit(bit: &Rc<Bit>, scope: VisitKind, visitor: &mut dyn ExpVisitor) {
    let mut seen = HashSet::new();
    walk_bit(bit, scope, visitor, &mut seen);
}

fn walk_bit(
    bit: &Rc<Bit>,
    scope: VisitKind,
    visitor: &mut dyn ExpVisitor,
    seen: &mut HashSet<*const Exp>,
) {
    match &bit.kind {
        BitKind::Var(exp) => walk_exp(exp, scope, visitor, seen),
        _ => {
            for operand in bit.operands() {
                walk_bit(operand, scope, visitor, seen);
            }
        }
    }
}

fn walk_exp(
    exp: &Rc<Exp>,
    scope: VisitKind,
    visitor: &mut dyn ExpVisitor,
    seen: &mut HashSet<*const Exp>,
) {
    if visitor.is_finished() || !seen.insert(Rc::as_ptr(exp)) {
        return;
    }
    for child in exp.children() {
        walk_exp(child, scope, visitor, seen);
    }
    if visitor.is_finished() {
        return;
    }
    match scope {
        VisitKind::All => visitor.visit(exp),
        VisitKind::Lval => match &exp.kind {
            ExpKind::Drf { target } => visitor.visit(target),
            ExpKind::Exit { target, .. }
            | ExpKind::Initial { target, .. }
            | ExpKind::Clobber {
                overwrite: target, ..
            }
            | ExpKind::Val { lval: target, .. } => {
                walk_exp(target, scope, visitor, seen);
                if !visitor.is_finished() {
                    visitor.visit(target);
                }
            }
            ExpKind::Frame { value, .. } => walk_exp(value, scope, visitor, seen),
            _ => {}
        },
    }
}

/// Maps exp bottom up. Returns None if the result was dropped.
pub fn map_exp(
    table: &ExpTable,
    exp: &Rc<Exp>,
    config: TraversalConfig,
    mapper: &mut dyn ExpMapper,
) -> Option<Rc<Exp>> {
    let mut memo = HashMap::new();
    map_exp_memo(table, exp, &config, mapper, &mut memo)
}

fn map_exp_memo(
    table: &ExpTable,
    exp: &Rc<Exp>,
    config: &TraversalConfig,
    mapper: &mut dyn ExpMapper,
    memo: &mut HashMap<*const Exp, Option<Rc<Exp>>>,
) -> Option<Rc<Exp>> {
    if let Some(result) = memo.get(&Rc::as_ptr(exp)) {
        return result.clone();
    }
    let result = map_exp_node(table, exp, config, mapper, memo);
    memo.insert(Rc::as_ptr(exp), result.clone());
    result
}

fn map_exp_node(
    table: &ExpTable,
    exp: &Rc<Exp>,
    config: &TraversalConfig,
    mapper: &mut dyn ExpMapper,
    memo: &mut HashMap<*const Exp, Option<Rc<Exp>>>,
) -> Option<Rc<Exp>> {
    let children = exp.children();
    let mut new_children = Vec::with_capacity(children.len());
    for child in &children {
        match map_exp_memo(table, child, config, mapper, memo) {
            Some(new_child) => new_children.push(new_child),
            None if config.policy == WidenPolicy::Keep => new_children.push((*child).clone()),
            None => return None,
        }
    }
    let unchanged = children
        .iter()
        .zip(new_children.iter())
        .all(|(c, n)| Rc::ptr_eq(c, n));
    let value = if unchanged {
        exp.clone()
    } else {
        match table.try_with_children(exp, new_children) {
            Some(value) => value,
            None if config.policy == WidenPolicy::Keep => exp.clone(),
            None => return None,
        }
    };
    if !config.in_scope(exp) {
        return Some(value);
    }
    match mapper.map(table, value.clone(), exp) {
        Some(result) => Some(result),
        None if config.policy == WidenPolicy::Keep => Some(value),
        None => None,
    }
}

/// Maps every expression in bit. Returns None if any of them was dropped.
pub fn map_bit(
    table: &ExpTable,
    bit: &Rc<Bit>,
    config: TraversalConfig,
    mapper: &mut dyn ExpMapper,
) -> Option<Rc<Bit>> {
    let mut memo = HashMap::new();
    map_bit_memo(table, bit, &config, mapper, &mut memo)
}

fn map_bit_memo(
    table: &ExpTable,
    bit: &Rc<Bit>,
    config: &TraversalConfig,
    mapper: &mut dyn ExpMapper,
    memo: &mut HashMap<*const Exp, Option<Rc<Exp>>>,
) -> Option<Rc<Bit>> {
    match &bit.kind {
        BitKind::Constant(..) => Some(bit.clone()),
        BitKind::Var(exp) => {
            let new_exp = map_exp_memo(table, exp, config, mapper, memo)?;
            if Rc::ptr_eq(&new_exp, exp) {
                Some(bit.clone())
            } else {
                Some(table.make_nonzero_bit(new_exp))
            }
        }
        _ => {
            let mut operands = Vec::with_capacity(bit.operands().len());
            for operand in bit.operands() {
                operands.push(map_bit_memo(table, operand, config, mapper, memo)?);
            }
            Some(table.with_operands(bit, operands))
        }
    }
}

/// Expands exp into the set of alternatives the mapper produces for it. Never empty unless
/// the mapper produced nothing for some node.
pub fn multi_map_exp(
    table: &ExpTable,
    exp: &Rc<Exp>,
    config: TraversalConfig,
    mapper: &mut dyn ExpMultiMapper,
) -> Vec<Rc<Exp>> {
    let children = exp.children();
    let mut results = Vec::new();
    if children.is_empty() {
        if config.in_scope(exp) {
            mapper.multi_map(table, exp.clone(), &mut results);
        } else {
            add_result(exp.clone(), &mut results);
        }
        limit_revert(&mut results, exp, config.result_limit);
        return results;
    }
    let mut alternatives: Vec<Vec<Rc<Exp>>> = Vec::with_capacity(children.len());
    for child in children.iter() {
        alternatives.push(multi_map_exp(table, child, config, mapper));
    }
    if alternatives.iter().any(Vec::is_empty) {
        return results;
    }
    let combinations = alternatives
        .iter()
        .fold(1usize, |n, alts| n.saturating_mul(alts.len()));
    if config.result_limit != 0 && combinations > config.result_limit {
        debug!("multi-map of {:?} has {} combinations", exp, combinations);
        return vec![exp.clone()];
    }
    for combination in alternatives.into_iter().multi_cartesian_product() {
        let value = match table.try_with_children(exp, combination) {
            Some(value) => value,
            None => continue,
        };
        if config.in_scope(exp) {
            mapper.multi_map(table, value, &mut results);
        } else {
            add_result(value, &mut results);
        }
        if limit_revert(&mut results, exp, config.result_limit) {
            break;
        }
    }
    results
}

/// Expands bit into alternative formulas, one for each combination of alternatives of the
/// expressions it contains.
pub fn multi_map_bit(
    table: &ExpTable,
    bit: &Rc<Bit>,
    config: TraversalConfig,
    mapper: &mut dyn ExpMultiMapper,
) -> Vec<Rc<Bit>> {
    fn add(new_bit: Rc<Bit>, results: &mut Vec<Rc<Bit>>) {
        if !results.iter().any(|r| Rc::ptr_eq(r, &new_bit)) {
            results.push(new_bit);
        }
    }
    let mut results: Vec<Rc<Bit>> = Vec::new();
    match &bit.kind {
        BitKind::Constant(..) => results.push(bit.clone()),
        BitKind::Var(exp) => {
            for alternative in multi_map_exp(table, exp, config, mapper) {
                add(table.make_nonzero_bit(alternative), &mut results);
            }
        }
        _ => {
            let mut alternatives: Vec<Vec<Rc<Bit>>> = Vec::new();
            for operand in bit.operands() {
                alternatives.push(multi_map_bit(table, operand, config, mapper));
            }
            if alternatives.iter().any(Vec::is_empty) {
                return results;
            }
            for combination in alternatives.into_iter().multi_cartesian_product() {
                add(table.with_operands(bit, combination), &mut results);
                if limit_revert(&mut results, bit, config.result_limit) {
                    break;
                }
            }
        }
    }
    limit_revert(&mut results, bit, config.result_limit);
    results
}

/// Replaces every occurrence of old_exp within exp by new_exp, including occurrences
/// inside the targets of exit, initial and cross-frame nodes.
pub fn replace_exp(
    table: &ExpTable,
    exp: &Rc<Exp>,
    old_exp: &Rc<Exp>,
    new_exp: &Rc<Exp>,
) -> Rc<Exp> {
    let config = TraversalConfig::new(VisitKind::All).with_policy(WidenPolicy::Keep);
    let mut mapper = ReplaceMapper { old_exp, new_exp };
    map_exp(table, exp, config, &mut mapper).unwrap_or_else(|| exp.clone())
}

/// Replaces every occurrence of old_exp within bit by new_exp.
pub fn replace_bit(
    table: &ExpTable,
    bit: &Rc<Bit>,
    old_exp: &Rc<Exp>,
    new_exp: &Rc<Exp>,
) -> Rc<Bit> {
    let config = TraversalConfig::new(VisitKind::All).with_policy(WidenPolicy::Keep);
    let mut mapper = ReplaceMapper { old_exp, new_exp };
    map_bit(table, bit, config, &mut mapper).unwrap_or_else(|| bit.clone())
}

struct ReplaceMapper<'a> {
    old_exp: &'a Rc<Exp>,
    new_exp: &'a Rc<Exp>,
}

impl<'a> ExpMapper for ReplaceMapper<'a> {
    fn map(&mut self, table: &ExpTable, value: Rc<Exp>, old: &Rc<Exp>) -> Option<Rc<Exp>> {
        if Rc::ptr_eq(old, self.old_exp) {
            return Some(self.new_exp.clone());
        }
        match &value.kind {
            ExpKind::Exit { target, .. } | ExpKind::Initial { target, .. } => {
                let new_target = replace_exp(table, target, self.old_exp, self.new_exp);
                Some(table.replace_lval_target(&value, new_target))
            }
            ExpKind::Frame { value: inner, frame_id } => {
                let new_inner = replace_exp(table, inner, self.old_exp, self.new_exp);
                Some(table.make_frame(new_inner, *frame_id))
            }
            _ => Some(value),
        }
    }
}

/// Collects every distinct lvalue read by the expressions it visits.
#[derive(Debug, Default)]
pub struct LvalListVisitor {
    pub lvals: Vec<Rc<Exp>>,
}

impl ExpVisitor for LvalListVisitor {
    fn visit(&mut self, exp: &Rc<Exp>) {
        add_result(exp.clone(), &mut self.lvals);
    }
}

/// The distinct lvalues read by bit, in the order they are first reached.
pub fn lvalues_of(bit: &Rc<Bit>) -> Vec<Rc<Exp>> {
    let mut visitor = LvalListVisitor::default();
    visit_bit(bit, VisitKind::Lval, &mut visitor);
    visitor.lvals
}
