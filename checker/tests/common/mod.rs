// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

// Test doubles for the collaborators of the frontier engine.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use xcheck::bit::Bit;
use xcheck::expression::{FrameId, PPoint};
use xcheck::hash_cons::ExpTable;
use xcheck::memory::{BlockMemory, CheckerFrame, GuardBitVector, PEdge, TranslateKind};
use xcheck::smt_solver::SolverOracle;
use xcheck::variable::{BlockId, Location, Variable};

/// A memory model that answers translations from a script. A formula with no scripted
/// answer translates to itself, unconditionally.
#[derive(Debug)]
pub struct FakeMemory {
    id: BlockId,
    exit_point: PPoint,
    edges: HashMap<PPoint, PEdge>,
    lines: HashMap<PPoint, u32>,
    indirect: HashMap<PPoint, Vec<Variable>>,
    preserved: bool,
    script: Vec<(TranslateKind, Rc<Bit>, Vec<(Rc<Bit>, Rc<Bit>)>)>,
    pub requests: RefCell<Vec<(TranslateKind, PPoint)>>,
}

impl FakeMemory {
    pub fn new(id: BlockId) -> FakeMemory {
        FakeMemory {
            id,
            exit_point: 10,
            edges: HashMap::new(),
            lines: HashMap::new(),
            indirect: HashMap::new(),
            preserved: false,
            script: Vec::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn function(name: &str) -> FakeMemory {
        FakeMemory::new(BlockId::function(name))
    }

    pub fn for_loop(function: &str, loop_name: &str) -> FakeMemory {
        FakeMemory::new(BlockId::for_loop(function, loop_name))
    }

    pub fn with_edge(mut self, point: PPoint, edge: PEdge) -> FakeMemory {
        self.edges.insert(point, edge);
        self
    }

    pub fn with_line(mut self, point: PPoint, line: u32) -> FakeMemory {
        self.lines.insert(point, line);
        self
    }

    pub fn with_indirect_callees(mut self, point: PPoint, callees: Vec<Variable>) -> FakeMemory {
        self.indirect.insert(point, callees);
        self
    }

    pub fn preserving(mut self) -> FakeMemory {
        self.preserved = true;
        self
    }

    /// Translating bit with kind yields the given (formula, guard) alternatives.
    pub fn with_translation(
        mut self,
        kind: TranslateKind,
        bit: &Rc<Bit>,
        alternatives: Vec<(Rc<Bit>, Rc<Bit>)>,
    ) -> FakeMemory {
        self.script.push((kind, bit.clone(), alternatives));
        self
    }
}

impl BlockMemory for FakeMemory {
    fn id(&self) -> &BlockId {
        &self.id
    }

    fn exit_point(&self) -> PPoint {
        self.exit_point
    }

    fn point_location(&self, point: PPoint) -> Option<Location> {
        self.lines
            .get(&point)
            .map(|line| Location::new("test.c", *line))
    }

    fn outgoing_edge(&self, point: PPoint) -> Option<&PEdge> {
        self.edges.get(&point)
    }

    fn indirect_callees(&self, point: PPoint) -> Vec<Variable> {
        self.indirect.get(&point).cloned().unwrap_or_default()
    }

    fn translate_bit(
        &self,
        table: &ExpTable,
        kind: TranslateKind,
        point: PPoint,
        bit: &Rc<Bit>,
    ) -> GuardBitVector {
        self.requests.borrow_mut().push((kind, point));
        let mut result = GuardBitVector::new();
        match self
            .script
            .iter()
            .find(|(k, b, _)| *k == kind && Rc::ptr_eq(b, bit))
        {
            Some((_, _, alternatives)) => {
                for (bit, guard) in alternatives {
                    result.push(bit.clone(), guard.clone());
                }
            }
            None => result.push(bit.clone(), table.make_constant_bit(true)),
        }
        result
    }

    fn is_bit_preserved(&self, _bit: &Rc<Bit>) -> bool {
        self.preserved
    }
}

/// A frame that records the formulas asserted into it.
#[derive(Debug)]
pub struct RecordingFrame {
    id: FrameId,
    memory: Rc<FakeMemory>,
    callee_kind: TranslateKind,
    pub asserts: RefCell<Vec<Rc<Bit>>>,
}

impl RecordingFrame {
    pub fn new(id: FrameId, memory: FakeMemory) -> RecordingFrame {
        RecordingFrame {
            id,
            memory: Rc::new(memory),
            callee_kind: TranslateKind::Callee,
            asserts: RefCell::new(Vec::new()),
        }
    }

    pub fn fake_memory(&self) -> &FakeMemory {
        &self.memory
    }
}

impl CheckerFrame for RecordingFrame {
    fn id(&self) -> FrameId {
        self.id
    }

    fn memory(&self) -> Rc<dyn BlockMemory> {
        self.memory.clone()
    }

    fn callee_translate_kind(&self, _point: PPoint) -> TranslateKind {
        self.callee_kind
    }

    fn add_assert(&self, _table: &ExpTable, bit: Rc<Bit>) {
        self.asserts.borrow_mut().push(bit);
    }
}

/// Answers implication questions from an explicit table. Every formula implies itself.
#[derive(Debug, Default)]
pub struct TableOracle {
    implications: Vec<(Rc<Bit>, Rc<Bit>)>,
}

impl TableOracle {
    pub fn new() -> TableOracle {
        TableOracle::default()
    }

    /// Records that stronger implies weaker.
    pub fn with_implication(mut self, stronger: &Rc<Bit>, weaker: &Rc<Bit>) -> TableOracle {
        self.implications.push((stronger.clone(), weaker.clone()));
        self
    }
}

impl SolverOracle for TableOracle {
    fn bit_equivalent(&self, bit0: &Rc<Bit>, bit1: &Rc<Bit>) -> bool {
        self.bit_implies(bit0, bit1) && self.bit_implies(bit1, bit0)
    }

    fn bit_implies(&self, bit0: &Rc<Bit>, bit1: &Rc<Bit>) -> bool {
        Rc::ptr_eq(bit0, bit1)
            || self
                .implications
                .iter()
                .any(|(a, b)| Rc::ptr_eq(a, bit0) && Rc::ptr_eq(b, bit1))
    }
}
