// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::bit::{Bit, BitKind};
use crate::hash_cons::ExpTable;

use log_derive::{logfn, logfn_inputs};
use mirai_annotations::{get_model_field, precondition, set_model_field};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result};
use std::rc::Rc;

/// The result of using the solver to solve an expression.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SmtResult {
    /// There is an assignment of values to the free variables for which the expression is true.
    Satisfiable,
    /// There is a proof that no assignment of values to the free variables can make the expression true.
    Unsatisfiable,
    /// The solver timed out while trying to solve this expression.
    Undefined,
}

/// The functionality that a solver must expose in order for the checker to use it.
pub trait SmtSolver<SmtExpressionType> {
    /// Returns a string representation of the given expression for use in debugging.
    fn as_debug_string(&self, expression: &SmtExpressionType) -> String;

    /// Adds the given expression to the current context.
    fn assert(&self, expression: &SmtExpressionType);

    /// Destroy the current context and restore the containing context as current.
    fn backtrack(&self) {
        precondition!(get_model_field!(&self, number_of_backtracks, 0) > 0);
    }

    /// Translate the formula into a corresponding expression for the Solver.
    fn get_as_smt_predicate(&self, bit: &Bit) -> SmtExpressionType;

    /// Returns an expression that is the logical inverse of the given expression.
    fn invert_predicate(&self, expression: &SmtExpressionType) -> SmtExpressionType;

    /// Create a nested context. When a matching backtrack is called, the current context (state)
    /// of the solver will be restored to what it was when this was called.
    fn set_backtrack_position(&self) {
        precondition!(get_model_field!(&self, number_of_backtracks, 0) < 1000);
        set_model_field!(
            &self,
            number_of_backtracks,
            get_model_field!(&self, number_of_backtracks, 0) + 1
        );
    }

    /// Try to find an assignment of values to the free variables so that the assertions in the
    /// current context are all true.
    fn solve(&self) -> SmtResult;

    /// Establish if the given expression can be satisfied (or not) without changing the current context.
    fn solve_expression(&self, expression: &SmtExpressionType) -> SmtResult {
        self.set_backtrack_position();
        self.assert(expression);
        let result = self.solve();
        self.backtrack();
        result
    }
}

/// A dummy implementation of SmtSolver to use in configurations where a real SMT solver is not available or required.
#[derive(Debug, Default)]
pub struct SolverStub {}

impl SmtSolver<()> for SolverStub {
    fn as_debug_string(&self, _: &()) -> String {
        String::from("not implemented")
    }

    fn assert(&self, _: &()) {}

    fn backtrack(&self) {}

    fn get_as_smt_predicate(&self, _bit: &Bit) {}

    fn invert_predicate(&self, _: &()) {}

    fn set_backtrack_position(&self) {}

    fn solve(&self) -> SmtResult {
        SmtResult::Undefined
    }
}

/// The two logical questions the frontier engine asks about formulas. Answers must be
/// deterministic for a fixed pair of formulas. A false answer may mean "unknown".
pub trait SolverOracle: Debug {
    fn bit_equivalent(&self, bit0: &Rc<Bit>, bit1: &Rc<Bit>) -> bool;

    fn bit_implies(&self, bit0: &Rc<Bit>, bit1: &Rc<Bit>) -> bool;
}

/// Answers oracle questions with an SMT solver, after trying the cases that can be decided
/// from the shape of the formulas.
pub struct BitOracle<'a, SmtExpressionType> {
    table: &'a ExpTable,
    solver: &'a dyn SmtSolver<SmtExpressionType>,
}

impl<'a, SmtExpressionType> Debug for BitOracle<'a, SmtExpressionType> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        "BitOracle".fmt(f)
    }
}

impl<'a, SmtExpressionType> BitOracle<'a, SmtExpressionType> {
    pub fn new(
        table: &'a ExpTable,
        solver: &'a dyn SmtSolver<SmtExpressionType>,
    ) -> BitOracle<'a, SmtExpressionType> {
        BitOracle { table, solver }
    }

    /// True if bit0 => bit1 follows from the shape of the formulas alone.
    fn implies_syntactically(bit0: &Rc<Bit>, bit1: &Rc<Bit>) -> bool {
        if Rc::ptr_eq(bit0, bit1) || bit0.is_false() || bit1.is_true() {
            return true;
        }
        if let BitKind::And(operands) = &bit0.kind {
            if operands.iter().any(|op| Rc::ptr_eq(op, bit1)) {
                return true;
            }
        }
        if let BitKind::Or(operands) = &bit1.kind {
            if operands.iter().any(|op| Rc::ptr_eq(op, bit0)) {
                return true;
            }
        }
        false
    }
}

impl<'a, SmtExpressionType> SolverOracle for BitOracle<'a, SmtExpressionType> {
    #[logfn_inputs(TRACE)]
    fn bit_equivalent(&self, bit0: &Rc<Bit>, bit1: &Rc<Bit>) -> bool {
        Rc::ptr_eq(bit0, bit1) || (self.bit_implies(bit0, bit1) && self.bit_implies(bit1, bit0))
    }

    #[logfn_inputs(TRACE)]
    #[logfn(TRACE)]
    fn bit_implies(&self, bit0: &Rc<Bit>, bit1: &Rc<Bit>) -> bool {
        if Self::implies_syntactically(bit0, bit1) {
            return true;
        }
        // bit0 => bit1 is valid iff bit0 && !bit1 has no model.
        let not_bit1 = self.table.make_not(bit1.clone());
        let counter_example = self.table.make_and(bit0.clone(), not_bit1);
        if counter_example.is_false() {
            return true;
        }
        let smt_expression = self.solver.get_as_smt_predicate(&counter_example);
        self.solver.solve_expression(&smt_expression) == SmtResult::Unsatisfiable
    }
}
