// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//

use crate::bit::{Bit, BitKind};
use crate::expression::{BinopKind, Exp, ExpKind, UnopKind};
use crate::smt_solver::SmtResult;
use crate::smt_solver::SmtSolver;

use lazy_static::lazy_static;
use log_derive::*;
use std::ffi::{CStr, CString};
use std::fmt::{Debug, Formatter, Result};
use std::os::raw::c_uint;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub type Z3ExpressionType = z3_sys::Z3_ast;

lazy_static! {
    static ref Z3_MUTEX: Mutex<()> = Mutex::new(());
}

fn lock_z3() -> MutexGuard<'static, ()> {
    Z3_MUTEX.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Encodes formulas over integers. Lvalues, and the expressions that have no integer
/// encoding, become uninterpreted integer constants named after their debug form, so two
/// occurrences of the same node denote the same unknown.
pub struct Z3Solver {
    z3_context: z3_sys::Z3_context,
    z3_solver: z3_sys::Z3_solver,
    int_sort: z3_sys::Z3_sort,
    zero: z3_sys::Z3_ast,
    one: z3_sys::Z3_ast,
}

impl Debug for Z3Solver {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        "Z3Solver".fmt(f)
    }
}

impl Z3Solver {
    #[logfn_inputs(TRACE)]
    pub fn new() -> Z3Solver {
        let _guard = lock_z3();
        unsafe {
            let z3_sys_cfg = z3_sys::Z3_mk_config();
            z3_sys::Z3_set_param_value(z3_sys_cfg, c"timeout".as_ptr(), c"100".as_ptr());

            let z3_context = z3_sys::Z3_mk_context(z3_sys_cfg);
            let z3_solver = z3_sys::Z3_mk_solver(z3_context);
            let int_sort = z3_sys::Z3_mk_int_sort(z3_context);
            let zero = z3_sys::Z3_mk_int(z3_context, 0, int_sort);
            let one = z3_sys::Z3_mk_int(z3_context, 1, int_sort);

            Z3Solver {
                z3_context,
                z3_solver,
                int_sort,
                zero,
                one,
            }
        }
    }
}

impl Default for Z3Solver {
    #[logfn_inputs(TRACE)]
    fn default() -> Self {
        Z3Solver::new()
    }
}

impl SmtSolver<Z3ExpressionType> for Z3Solver {
    #[logfn_inputs(TRACE)]
    fn as_debug_string(&self, expression: &Z3ExpressionType) -> String {
        let _guard = lock_z3();
        unsafe {
            let debug_str_bytes = z3_sys::Z3_ast_to_string(self.z3_context, *expression);
            CStr::from_ptr(debug_str_bytes)
                .to_string_lossy()
                .into_owned()
        }
    }

    #[logfn_inputs(TRACE)]
    fn assert(&self, expression: &Z3ExpressionType) {
        let _guard = lock_z3();
        unsafe {
            z3_sys::Z3_solver_assert(self.z3_context, self.z3_solver, *expression);
        }
    }

    #[logfn_inputs(TRACE)]
    fn backtrack(&self) {
        let _guard = lock_z3();
        unsafe {
            z3_sys::Z3_solver_pop(self.z3_context, self.z3_solver, 1);
        }
    }

    #[logfn_inputs(TRACE)]
    fn get_as_smt_predicate(&self, bit: &Bit) -> Z3ExpressionType {
        let _guard = lock_z3();
        self.get_as_bool_z3_ast(bit)
    }

    #[logfn_inputs(TRACE)]
    fn invert_predicate(&self, expression: &Z3ExpressionType) -> Z3ExpressionType {
        unsafe { z3_sys::Z3_mk_not(self.z3_context, *expression) }
    }

    #[logfn_inputs(TRACE)]
    fn set_backtrack_position(&self) {
        let _guard = lock_z3();
        unsafe {
            z3_sys::Z3_solver_push(self.z3_context, self.z3_solver);
        }
    }

    #[logfn_inputs(TRACE)]
    fn solve(&self) -> SmtResult {
        let _guard = lock_z3();
        let result = unsafe { z3_sys::Z3_solver_check(self.z3_context, self.z3_solver) };
        match result as i32 {
            1 => SmtResult::Satisfiable,
            -1 => SmtResult::Unsatisfiable,
            _ => SmtResult::Undefined,
        }
    }
}

type Z3BinaryOp =
    unsafe extern "C" fn(c: z3_sys::Z3_context, t1: z3_sys::Z3_ast, t2: z3_sys::Z3_ast) -> z3_sys::Z3_ast;

type Z3VarArgOp = unsafe extern "C" fn(
    c: z3_sys::Z3_context,
    num_args: c_uint,
    args: *const z3_sys::Z3_ast,
) -> z3_sys::Z3_ast;

impl Z3Solver {
    fn get_as_bool_z3_ast(&self, bit: &Bit) -> z3_sys::Z3_ast {
        unsafe {
            match &bit.kind {
                BitKind::Constant(true) => z3_sys::Z3_mk_true(self.z3_context),
                BitKind::Constant(false) => z3_sys::Z3_mk_false(self.z3_context),
                BitKind::Var(exp) => self.get_exp_as_bool_z3_ast(exp),
                BitKind::Not(operand) => {
                    z3_sys::Z3_mk_not(self.z3_context, self.get_as_bool_z3_ast(operand))
                }
                BitKind::And(operands) => {
                    let asts: Vec<_> = operands.iter().map(|op| self.get_as_bool_z3_ast(op)).collect();
                    z3_sys::Z3_mk_and(self.z3_context, asts.len() as c_uint, asts.as_ptr())
                }
                BitKind::Or(operands) => {
                    let asts: Vec<_> = operands.iter().map(|op| self.get_as_bool_z3_ast(op)).collect();
                    z3_sys::Z3_mk_or(self.z3_context, asts.len() as c_uint, asts.as_ptr())
                }
            }
        }
    }

    fn get_exp_as_bool_z3_ast(&self, exp: &Exp) -> z3_sys::Z3_ast {
        if let ExpKind::Binop {
            op, left, right, ..
        } = &exp.kind
        {
            let relational: Option<Z3BinaryOp> = match op {
                BinopKind::LessThan => Some(z3_sys::Z3_mk_lt),
                BinopKind::LessEqual => Some(z3_sys::Z3_mk_le),
                BinopKind::GreaterThan => Some(z3_sys::Z3_mk_gt),
                BinopKind::GreaterEqual => Some(z3_sys::Z3_mk_ge),
                BinopKind::Equal => Some(z3_sys::Z3_mk_eq),
                _ => None,
            };
            if let Some(operation) = relational {
                return self.numeric_binary(left, right, operation);
            }
            match op {
                BinopKind::NotEqual => unsafe {
                    let eq = self.numeric_binary(left, right, z3_sys::Z3_mk_eq);
                    return z3_sys::Z3_mk_not(self.z3_context, eq);
                },
                BinopKind::LogicalAnd => return self.boolean_op(left, right, z3_sys::Z3_mk_and),
                BinopKind::LogicalOr => return self.boolean_op(left, right, z3_sys::Z3_mk_or),
                _ => {}
            }
        }
        if let ExpKind::Unop {
            op: UnopKind::LogicalNot,
            operand,
        } = &exp.kind
        {
            unsafe {
                return z3_sys::Z3_mk_not(self.z3_context, self.get_exp_as_bool_z3_ast(operand));
            }
        }
        let numeric = self.get_as_numeric_z3_ast(exp);
        unsafe {
            let is_zero = z3_sys::Z3_mk_eq(self.z3_context, numeric, self.zero);
            z3_sys::Z3_mk_not(self.z3_context, is_zero)
        }
    }

    fn get_as_numeric_z3_ast(&self, exp: &Exp) -> z3_sys::Z3_ast {
        match &exp.kind {
            ExpKind::Int(value) => {
                let numeral = CString::new(value.to_string()).unwrap_or_default();
                unsafe { z3_sys::Z3_mk_numeral(self.z3_context, numeral.as_ptr(), self.int_sort) }
            }
            ExpKind::Unop {
                op: UnopKind::Neg,
                operand,
            } => unsafe {
                z3_sys::Z3_mk_unary_minus(self.z3_context, self.get_as_numeric_z3_ast(operand))
            },
            ExpKind::Unop {
                op: UnopKind::Coerce,
                operand,
            } => self.get_as_numeric_z3_ast(operand),
            ExpKind::Binop {
                op, left, right, ..
            } => match op {
                BinopKind::Plus => self.numeric_var_arg(left, right, z3_sys::Z3_mk_add),
                BinopKind::Minus => self.numeric_var_arg(left, right, z3_sys::Z3_mk_sub),
                BinopKind::Mult => self.numeric_var_arg(left, right, z3_sys::Z3_mk_mul),
                BinopKind::Div => self.numeric_binary(left, right, z3_sys::Z3_mk_div),
                BinopKind::Mod => self.numeric_binary(left, right, z3_sys::Z3_mk_mod),
                _ if op.is_compare()
                    || matches!(op, BinopKind::LogicalAnd | BinopKind::LogicalOr) =>
                unsafe {
                    let condition = self.get_exp_as_bool_z3_ast(exp);
                    z3_sys::Z3_mk_ite(self.z3_context, condition, self.one, self.zero)
                },
                _ => self.uninterpreted(exp),
            },
            _ => self.uninterpreted(exp),
        }
    }

    fn numeric_binary(&self, left: &Exp, right: &Exp, operation: Z3BinaryOp) -> z3_sys::Z3_ast {
        let left_ast = self.get_as_numeric_z3_ast(left);
        let right_ast = self.get_as_numeric_z3_ast(right);
        unsafe { operation(self.z3_context, left_ast, right_ast) }
    }

    fn numeric_var_arg(&self, left: &Exp, right: &Exp, operation: Z3VarArgOp) -> z3_sys::Z3_ast {
        let tmp = [
            self.get_as_numeric_z3_ast(left),
            self.get_as_numeric_z3_ast(right),
        ];
        unsafe { operation(self.z3_context, 2, tmp.as_ptr()) }
    }

    fn boolean_op(&self, left: &Exp, right: &Exp, operation: Z3VarArgOp) -> z3_sys::Z3_ast {
        let tmp = [
            self.get_exp_as_bool_z3_ast(left),
            self.get_exp_as_bool_z3_ast(right),
        ];
        unsafe { operation(self.z3_context, 2, tmp.as_ptr()) }
    }

    fn uninterpreted(&self, exp: &Exp) -> z3_sys::Z3_ast {
        unsafe {
            let sym = self.get_symbol_for(exp);
            z3_sys::Z3_mk_const(self.z3_context, sym, self.int_sort)
        }
    }

    fn get_symbol_for<T>(&self, value: T) -> z3_sys::Z3_symbol
    where
        T: Debug,
    {
        let sym_str = CString::new(format!("{:?}", value).replace('\0', "")).unwrap_or_default();
        unsafe { z3_sys::Z3_mk_string_symbol(self.z3_context, sym_str.as_ptr()) }
    }
}
