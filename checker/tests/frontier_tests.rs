// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use common::{FakeMemory, RecordingFrame, TableOracle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::rc::Rc;
use xcheck::bit::Bit;
use xcheck::expression::{BinopKind, Exp, PPoint};
use xcheck::frontier::{
    self, ReportKind, Where, WhereInvariant, WherePostcondition, WherePrecondition,
};
use xcheck::hash_cons::{ExpTable, ValueList};
use xcheck::memory::{BlockMemory, CheckerFrame, PEdge, TranslateKind};
use xcheck::translate;
use xcheck::variable::{BlockId, Field, Type, Variable};

fn read(table: &ExpTable, var: Variable) -> Rc<Exp> {
    let var = table.make_var(var);
    table.make_drf(var)
}

fn greater(table: &ExpTable, value: Rc<Exp>, bound: i128) -> Rc<Bit> {
    table.make_compare_bit(BinopKind::GreaterThan, value, table.make_int(bound))
}

fn field(name: &str) -> Field {
    Field::new(
        name,
        "node",
        Type::Int {
            bytes: 4,
            sign: true,
        },
    )
}

fn call_to(table: &ExpTable, callee: &str) -> PEdge {
    PEdge::Call {
        function: table.make_var(Variable::func(callee)),
        arguments: ValueList::default(),
        return_value: None,
        instance: None,
    }
}

/// `count > bound` as it reads right after the call at point.
fn after_call(table: &ExpTable, point: PPoint, bound: i128) -> Rc<Bit> {
    let count = table.make_var(Variable::global("count"));
    let clobber = table.make_clobber(count.clone(), None, count, point);
    greater(table, clobber, bound)
}

/// A frame of g that calls h at points 1 through 9.
fn calling_frame(table: &ExpTable) -> Rc<dyn CheckerFrame> {
    let mut memory = FakeMemory::function("g");
    for point in 1..10 {
        memory = memory.with_edge(point, call_to(table, "h"));
    }
    Rc::new(RecordingFrame::new(1, memory))
}

fn precondition(table: &ExpTable, memory: &Rc<dyn BlockMemory>, bit: Rc<Bit>) -> Where {
    match WherePrecondition::make(table, memory.clone(), bit) {
        Some(pre) => Where::Precondition(pre),
        None => panic!("precondition was rejected"),
    }
}

fn postcondition(table: &ExpTable, frame: &Rc<dyn CheckerFrame>, point: PPoint, bound: i128) -> Where {
    let bit = after_call(table, point, bound);
    match WherePostcondition::make(table, frame.clone(), point, &bit) {
        Some(post) => Where::Postcondition(post),
        None => panic!("postcondition was rejected"),
    }
}

fn global_invariant(table: &ExpTable, bound: i128) -> Where {
    let bit = greater(table, read(table, Variable::global("g")), bound);
    match WhereInvariant::make(table, None, None, &bit) {
        Some(inv) => Where::Invariant(inv),
        None => panic!("invariant was rejected"),
    }
}

/// The expansion rank that the comparator is expected to agree with when no formula implies
/// another: drops, then unrolled loop preconditions, invariants, other preconditions,
/// postconditions from the latest point back, and finally terminal reports.
type Rank = (u8, u8, u32);

fn random_where(
    table: &ExpTable,
    rng: &mut StdRng,
    bound: i128,
    function_memory: &Rc<dyn BlockMemory>,
    loop_memory: &Rc<dyn BlockMemory>,
    frame: &Rc<dyn CheckerFrame>,
) -> (Where, Rank) {
    match rng.gen_range(0..6) {
        0 => (Where::None(ReportKind::None), (0, 0, 0)),
        1 => {
            let kinds = [
                ReportKind::Finished,
                ReportKind::Timeout,
                ReportKind::Recursion,
                ReportKind::Unexpected,
                ReportKind::UnknownCsu,
                ReportKind::NoCallee,
            ];
            (Where::None(kinds[rng.gen_range(0..kinds.len())]), (3, 0, 0))
        }
        2 => {
            let bit = greater(table, read(table, Variable::local("i")), bound);
            (precondition(table, loop_memory, bit), (1, 0, 0))
        }
        3 => (global_invariant(table, bound), (1, 1, 0)),
        4 => {
            let bit = greater(table, read(table, Variable::arg(0, "x")), bound);
            (precondition(table, function_memory, bit), (1, 2, 0))
        }
        _ => {
            let point = rng.gen_range(1..10);
            (postcondition(table, frame, point, bound), (2, 0, 100 - point))
        }
    }
}

#[test]
fn comparison_follows_the_expansion_rules() {
    let table = ExpTable::new();
    let oracle = TableOracle::new();
    let function_memory: Rc<dyn BlockMemory> = Rc::new(FakeMemory::function("f"));
    let loop_memory: Rc<dyn BlockMemory> = Rc::new(FakeMemory::for_loop("f", "l").preserving());
    let frame = calling_frame(&table);

    let mut rng = StdRng::seed_from_u64(20);
    for _ in 0..10 {
        let entries: Vec<(Where, Rank)> = (0..30)
            .map(|bound| {
                random_where(&table, &mut rng, bound, &function_memory, &loop_memory, &frame)
            })
            .collect();
        for (where0, rank0) in &entries {
            for (where1, rank1) in &entries {
                assert_eq!(
                    Where::priority_compare(where0, where1, &oracle),
                    rank0.cmp(rank1),
                    "{} vs {}",
                    where0.print_ui(&table),
                    where1.print_ui(&table)
                );
            }
        }

        // Selection drains the worklist in rank order, earliest first among equals.
        let (mut worklist, mut ranks): (Vec<Where>, Vec<Rank>) = entries.into_iter().unzip();
        while !ranks.is_empty() {
            let best_rank = ranks.iter().min().copied();
            let index = ranks.iter().position(|rank| Some(*rank) == best_rank).unwrap();
            let expected = worklist[index].print_ui(&table);
            let selected = frontier::select_best(&mut worklist, &oracle).unwrap();
            assert_eq!(selected.print_ui(&table), expected);
            ranks.remove(index);
        }
        assert!(frontier::select_best(&mut worklist, &oracle).is_none());
    }
}

#[test]
fn weaker_formulas_are_expanded_first() {
    let table = ExpTable::new();
    let memory: Rc<dyn BlockMemory> = Rc::new(FakeMemory::function("f"));
    let x = read(&table, Variable::arg(0, "x"));
    let stronger = greater(&table, x.clone(), 1);
    let weaker = greater(&table, x, 0);
    let oracle = TableOracle::new().with_implication(&stronger, &weaker);

    let strong = precondition(&table, &memory, stronger);
    let weak = precondition(&table, &memory, weaker.clone());
    assert_eq!(Where::priority_compare(&weak, &strong, &oracle), Ordering::Less);
    assert_eq!(Where::priority_compare(&strong, &weak, &oracle), Ordering::Greater);

    let mut worklist = vec![strong, weak];
    let best = frontier::select_best(&mut worklist, &oracle).unwrap();
    assert!(best.bit().map_or(false, |bit| Rc::ptr_eq(bit, &weaker)));

    // Without the implication there is no preference.
    let unrelated = TableOracle::new();
    assert_eq!(
        Where::priority_compare(&worklist[0], &best, &unrelated),
        Ordering::Equal
    );
}

#[test]
fn equivalent_formulas_are_ordered_by_hash() {
    let table = ExpTable::new();
    let memory: Rc<dyn BlockMemory> = Rc::new(FakeMemory::function("f"));
    let x = read(&table, Variable::arg(0, "x"));
    let bit0 = greater(&table, x.clone(), 0);
    let bit1 = table.make_compare_bit(BinopKind::GreaterEqual, x, table.make_int(1));
    let oracle = TableOracle::new()
        .with_implication(&bit0, &bit1)
        .with_implication(&bit1, &bit0);

    let where0 = precondition(&table, &memory, bit0.clone());
    let where1 = precondition(&table, &memory, bit1.clone());
    let expected = Bit::compare(&bit0, &bit1);
    assert_ne!(expected, Ordering::Equal);
    assert_eq!(Where::priority_compare(&where0, &where1, &oracle), expected);
    assert_eq!(
        Where::priority_compare(&where1, &where0, &oracle),
        expected.reverse()
    );
}

#[test]
fn selection_prefers_drops_then_the_earliest() {
    let table = ExpTable::new();
    let oracle = TableOracle::new();
    let memory: Rc<dyn BlockMemory> = Rc::new(FakeMemory::function("f"));
    let frame = calling_frame(&table);
    let x = read(&table, Variable::arg(0, "x"));
    let first = greater(&table, x.clone(), 0);
    let second = greater(&table, x, 5);

    let mut worklist = vec![
        precondition(&table, &memory, first.clone()),
        Where::None(ReportKind::Finished),
        precondition(&table, &memory, second.clone()),
        Where::None(ReportKind::None),
        postcondition(&table, &frame, 3, 0),
    ];
    let picked = |worklist: &mut Vec<Where>| frontier::select_best(worklist, &oracle).unwrap();

    assert!(picked(&mut worklist).is_drop());
    let next = picked(&mut worklist);
    assert!(next.bit().map_or(false, |bit| Rc::ptr_eq(bit, &first)));
    let next = picked(&mut worklist);
    assert!(next.bit().map_or(false, |bit| Rc::ptr_eq(bit, &second)));
    assert!(matches!(picked(&mut worklist), Where::Postcondition(..)));
    assert!(matches!(
        picked(&mut worklist),
        Where::None(ReportKind::Finished)
    ));
    assert!(worklist.is_empty());
}

#[test]
fn later_postconditions_come_first() {
    let table = ExpTable::new();
    let oracle = TableOracle::new();
    let frame = calling_frame(&table);
    let early = postcondition(&table, &frame, 3, 0);
    let late = postcondition(&table, &frame, 8, 0);
    assert_eq!(Where::priority_compare(&late, &early, &oracle), Ordering::Less);
    assert_eq!(Where::priority_compare(&early, &late, &oracle), Ordering::Greater);
}

#[test]
fn loop_preconditions_preserved_by_an_iteration_ignore_unrolling() {
    let table = ExpTable::new();
    let i = greater(&table, read(&table, Variable::local("i")), 0);

    let preserving: Rc<dyn BlockMemory> = Rc::new(FakeMemory::for_loop("f", "l").preserving());
    let pre = WherePrecondition::make(&table, preserving, i.clone()).unwrap();
    assert!(pre.is_ignore_unroll());

    let changing: Rc<dyn BlockMemory> = Rc::new(FakeMemory::for_loop("f", "l"));
    let pre = WherePrecondition::make(&table, changing, i.clone()).unwrap();
    assert!(!pre.is_ignore_unroll());

    // Function locals are not visible to callers at all.
    let function: Rc<dyn BlockMemory> = Rc::new(FakeMemory::function("f").preserving());
    assert!(WherePrecondition::make(&table, function.clone(), i).is_none());
    let x = greater(&table, read(&table, Variable::arg(0, "x")), 0);
    let pre = WherePrecondition::make(&table, function, x).unwrap();
    assert!(!pre.is_ignore_unroll());
}

#[test]
fn terminal_objects_print_their_reason() {
    let table = ExpTable::new();
    let finished = Where::None(ReportKind::Finished);
    assert_eq!(
        finished.print_ui(&table),
        "Report: Finished exploration, no further dependents"
    );
    assert_eq!(finished.print_hook(), None);
    assert!(finished.bit().is_none());
    assert!(!finished.is_drop());
    assert!(Where::None(ReportKind::None).is_drop());
}

#[test]
fn preconditions_print_by_block() {
    let table = ExpTable::new();
    let function: Rc<dyn BlockMemory> = Rc::new(FakeMemory::function("f"));
    let x = greater(&table, read(&table, Variable::arg(0, "x")), 0);
    let pre = precondition(&table, &function, x);
    assert_eq!(pre.print_ui(&table), "Precondition :: x > 0");
    assert_eq!(pre.print_hook().as_deref(), Some("pre f"));

    let body: Rc<dyn BlockMemory> = Rc::new(FakeMemory::for_loop("f", "l"));
    let i = greater(&table, read(&table, Variable::local("i")), 0);
    let inv = precondition(&table, &body, i);
    assert_eq!(inv.print_ui(&table), "LoopInvariant [l] :: i > 0");
    assert_eq!(inv.print_hook().as_deref(), Some("l f"));
}

#[test]
fn postconditions_print_the_callee() {
    let table = ExpTable::new();
    let memory = FakeMemory::function("g")
        .with_edge(5, call_to(&table, "h"))
        .with_line(5, 12);
    let frame: Rc<dyn CheckerFrame> = Rc::new(RecordingFrame::new(1, memory));
    let post = postcondition(&table, &frame, 5, 0);
    assert_eq!(post.print_ui(&table), "Postcondition [h:12] :: count > 0");
    assert_eq!(post.print_hook().as_deref(), Some("post h"));
}

#[test]
fn indirect_calls_hook_every_callee() {
    let table = ExpTable::new();
    let indirect = PEdge::Call {
        function: read(&table, Variable::local("fp")),
        arguments: ValueList::default(),
        return_value: None,
        instance: None,
    };
    let memory = FakeMemory::function("g")
        .with_edge(4, indirect)
        .with_indirect_callees(4, vec![Variable::func("a"), Variable::func("b")]);
    let frame: Rc<dyn CheckerFrame> = Rc::new(RecordingFrame::new(1, memory));
    let post = postcondition(&table, &frame, 4, 0);
    assert_eq!(post.print_hook().as_deref(), Some("post a$post b"));
    assert!(post.print_ui(&table).starts_with("Postcondition [fp:0] :: "));
}

#[test]
fn loop_postconditions_print_as_loop_invariants() {
    let table = ExpTable::new();
    let edge = PEdge::Loop {
        loop_id: BlockId::for_loop("g", "l1"),
    };
    let memory = FakeMemory::function("g").with_edge(6, edge);
    let frame: Rc<dyn CheckerFrame> = Rc::new(RecordingFrame::new(1, memory));
    let post = postcondition(&table, &frame, 6, 2);
    assert_eq!(post.print_ui(&table), "LoopInvariant [l1] :: count > 2");
    assert_eq!(post.print_hook().as_deref(), Some("l1 g"));
}

#[test]
fn postconditions_need_a_dependence_on_the_call() {
    let table = ExpTable::new();
    let frame = calling_frame(&table);
    let unrelated = greater(&table, read(&table, Variable::global("count")), 0);
    assert!(WherePostcondition::make(&table, frame.clone(), 3, &unrelated).is_none());

    // A clobber from another call.
    let other_call = after_call(&table, 4, 0);
    assert!(WherePostcondition::make(&table, frame, 3, &other_call).is_none());
}

#[test]
fn invariants_print_by_type() {
    let table = ExpTable::new();
    let p = read(&table, Variable::local("p"));
    let p_f = table.make_drf(table.make_fld(p.clone(), field("f")));
    let bit = greater(&table, p_f, 0);
    let inv = WhereInvariant::make(&table, Some("node"), Some(&p), &bit).unwrap();
    assert_eq!(inv.csu(), Some("node"));
    let inv = Where::Invariant(inv);
    assert_eq!(inv.print_ui(&table), "TypeInvariant [node] :: this->f > 0");
    assert_eq!(inv.print_hook(), None);

    assert_eq!(
        global_invariant(&table, 3).print_ui(&table),
        "GlobalInvariant :: g > 3"
    );
}

#[test]
fn invariants_reject_deep_reads_and_locals() {
    let table = ExpTable::new();
    let g = read(&table, Variable::global("g"));
    let g_f = table.make_fld(g, field("f"));
    let shallow = greater(&table, table.make_drf(g_f.clone()), 0);
    assert!(WhereInvariant::make(&table, None, None, &shallow).is_some());

    let g_f_f = table.make_fld(table.make_drf(g_f), field("f"));
    let deep = greater(&table, table.make_drf(g_f_f), 0);
    assert!(WhereInvariant::make(&table, None, None, &deep).is_none());

    let local = greater(&table, read(&table, Variable::local("x")), 0);
    assert!(WhereInvariant::make(&table, None, None, &local).is_none());
}

#[test]
fn invariants_assert_for_enclosing_objects() {
    let table = ExpTable::new();
    let this_object = translate::this_object(&table);
    let this_f = table.make_drf(table.make_fld(this_object.clone(), field("f")));
    let bit = greater(&table, this_f, 0);
    let inv = WhereInvariant::make(&table, Some("node"), None, &bit).unwrap();

    // A write to this->next->f, where next is itself a node.
    let next = table.make_drf(table.make_fld(this_object.clone(), field("next")));
    let written = table.make_fld(next.clone(), field("f"));
    let enclosing = inv.write_csu(&written);
    assert!(enclosing.map_or(false, |enclosing| Rc::ptr_eq(&enclosing, &next)));

    let frame = RecordingFrame::new(1, FakeMemory::function("f"));
    inv.assert_recursive(&table, &frame, &written);
    let asserts = frame.asserts.borrow();
    assert_eq!(asserts.len(), 1);
    assert_eq!(asserts[0].print_ui(false), "this->next->f > 0");

    // Global invariants have no enclosing object.
    let global = global_invariant(&table, 0);
    if let Where::Invariant(global) = global {
        assert!(global.write_csu(&written).is_none());
        global.assert_recursive(&table, &frame, &written);
    }
    assert_eq!(frame.asserts.borrow().len(), 1);
}

#[test]
fn invariants_translate_to_the_exit_of_writers() {
    let table = ExpTable::new();
    let this_object = translate::this_object(&table);
    let this_f = table.make_drf(table.make_fld(this_object, field("f")));
    let inv = WhereInvariant::make(&table, Some("node"), None, &greater(&table, this_f, 0)).unwrap();

    let writer = RecordingFrame::new(2, FakeMemory::function("w"));
    let p = read(&table, Variable::local("p"));
    let q = read(&table, Variable::local("q"));
    let translated = inv.heap_bits(&table, &writer, &p, Some(&q));
    let base_bit = translated.base_bit.unwrap();
    assert_eq!(base_bit.print_ui(false), "q->f > 0");
    assert_eq!(translated.bits.len(), 1);
    assert_eq!(
        writer.fake_memory().requests.borrow().as_slice(),
        &[(TranslateKind::Exit, 10)]
    );
}

#[test]
fn preconditions_move_to_the_call_site() {
    let table = ExpTable::new();
    let x = read(&table, Variable::arg(0, "x"));
    let callee_bit = greater(&table, x, 0);
    let y = read(&table, Variable::local("y"));
    let y_plus_1 = table.make_binop(BinopKind::Plus, y, table.make_int(1), None, 32, true);
    let caller_bit = greater(&table, y_plus_1.clone(), 0);

    let call = PEdge::Call {
        function: table.make_var(Variable::func("f")),
        arguments: ValueList::new(vec![y_plus_1]),
        return_value: None,
        instance: None,
    };
    let caller_memory = FakeMemory::function("g")
        .with_edge(5, call)
        .with_translation(
            TranslateKind::Callee,
            &callee_bit,
            vec![(caller_bit.clone(), table.make_constant_bit(true))],
        );
    let caller = RecordingFrame::new(3, caller_memory);

    let callee: Rc<dyn BlockMemory> = Rc::new(FakeMemory::function("f"));
    let pre = WherePrecondition::make(&table, callee, callee_bit).unwrap();
    assert_eq!(pre.print_ui(), "Precondition :: x > 0");

    let translated = pre.caller_bits(&table, &caller, 5);
    let base_bit = translated.base_bit.unwrap();
    assert!(Rc::ptr_eq(&base_bit, &caller_bit));
    assert_eq!(base_bit.print_ui(false), "(y + 1) > 0");
    assert_eq!(translated.bits.len(), 1);
    let entry = translated.bits.get(0).unwrap();
    assert!(Rc::ptr_eq(&entry.bit, &caller_bit));
    assert!(entry.guard.is_true());
    assert_eq!(
        caller.fake_memory().requests.borrow().as_slice(),
        &[(TranslateKind::Callee, 5)]
    );
}

#[test]
fn preconditions_on_addresses_of_formals_need_lvalue_actuals() {
    let table = ExpTable::new();
    let p = table.make_var(Variable::arg(0, "p"));
    let address_is_set = table.make_compare_bit(BinopKind::NotEqual, p, table.make_int(0));

    let call = PEdge::Call {
        function: table.make_var(Variable::func("f")),
        arguments: ValueList::new(vec![table.make_int(4)]),
        return_value: None,
        instance: None,
    };
    let caller = RecordingFrame::new(3, FakeMemory::function("g").with_edge(5, call));
    let callee: Rc<dyn BlockMemory> = Rc::new(FakeMemory::function("f"));
    let pre = WherePrecondition::make(&table, callee, address_is_set).unwrap();
    assert!(pre.caller_bits(&table, &caller, 5).base_bit.is_none());
}

#[test]
fn preconditions_reading_through_formals_need_address_actuals() {
    let table = ExpTable::new();
    let x = read(&table, Variable::arg(0, "x"));
    let val = table.make_drf(table.make_fld(x, field("val")));
    let positive = greater(&table, val, 0);
    let this = read(&table, Variable::this());
    let this_val = table.make_drf(table.make_fld(this, field("val")));
    let positive_member = greater(&table, this_val, 0);

    let callee: Rc<dyn BlockMemory> = Rc::new(FakeMemory::function("f"));
    let pre = WherePrecondition::make(&table, callee.clone(), positive).unwrap();
    let member_pre = WherePrecondition::make(&table, callee, positive_member).unwrap();

    // f(0) and 7.f(): there is no object to read the field from.
    let constant_call = PEdge::Call {
        function: table.make_var(Variable::func("f")),
        arguments: ValueList::new(vec![table.make_int(0)]),
        return_value: None,
        instance: Some(table.make_int(7)),
    };
    let caller = RecordingFrame::new(3, FakeMemory::function("g").with_edge(5, constant_call));
    assert!(pre.caller_bits(&table, &caller, 5).base_bit.is_none());
    assert!(member_pre.caller_bits(&table, &caller, 5).base_bit.is_none());

    // q->f(q)
    let q = read(&table, Variable::local("q"));
    let pointer_call = PEdge::Call {
        function: table.make_var(Variable::func("f")),
        arguments: ValueList::new(vec![q.clone()]),
        return_value: None,
        instance: Some(q),
    };
    let caller = RecordingFrame::new(4, FakeMemory::function("g").with_edge(5, pointer_call));
    let translated = pre.caller_bits(&table, &caller, 5).base_bit.unwrap();
    assert_eq!(translated.print_ui(false), "q->val > 0");
    let translated = member_pre.caller_bits(&table, &caller, 5).base_bit.unwrap();
    assert_eq!(translated.print_ui(false), "q->val > 0");
}

#[test]
fn postconditions_move_into_the_callee_or_past_the_loop() {
    let table = ExpTable::new();
    let caller = Rc::new(RecordingFrame::new(
        1,
        FakeMemory::function("g").with_edge(5, call_to(&table, "h")),
    ));
    let frame: Rc<dyn CheckerFrame> = caller.clone();
    let post = match postcondition(&table, &frame, 5, 0) {
        Where::Postcondition(post) => post,
        _ => unreachable!(),
    };
    assert_eq!(post.point(), 5);

    let callee = RecordingFrame::new(2, FakeMemory::function("h"));
    let translated = post.callee_bits(&table, &callee);
    assert_eq!(translated.base_bit.unwrap().print_ui(false), "count > 0");
    assert_eq!(
        callee.fake_memory().requests.borrow().as_slice(),
        &[(TranslateKind::Exit, 10)]
    );

    let skipped = post.skip_loop_bits(&table);
    assert!(skipped.base_bit.is_some());
    assert_eq!(skipped.bits.len(), 1);
    assert_eq!(
        caller.fake_memory().requests.borrow().as_slice(),
        &[(TranslateKind::SkipClobber, 5)]
    );
}
