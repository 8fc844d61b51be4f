// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result};

/// The storage class of a variable.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum VarKind {
    /// A function, used as the target of a direct call.
    Func,
    /// A global variable.
    Glob,
    /// A formal parameter of the enclosing function, identified by its position.
    Arg,
    /// A local variable of the enclosing function.
    Local,
    /// A compiler introduced temporary.
    Temp,
    /// The return value of the enclosing function.
    Return,
    /// The implicit receiver of a method or a type invariant.
    This,
}

/// A named storage location. Arguments are identified by their index, every other kind
/// by its name.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Variable {
    pub kind: VarKind,
    pub index: u32,
    pub name: String,
}

impl Debug for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.kind {
            VarKind::Return => f.write_str("return"),
            VarKind::This => f.write_str("this"),
            VarKind::Temp => write!(f, "__temp_{}", self.index),
            _ => f.write_str(&self.name),
        }
    }
}

impl Variable {
    pub fn new(kind: VarKind, index: u32, name: &str) -> Variable {
        Variable {
            kind,
            index,
            name: name.to_owned(),
        }
    }

    pub fn func(name: &str) -> Variable {
        Variable::new(VarKind::Func, 0, name)
    }

    pub fn global(name: &str) -> Variable {
        Variable::new(VarKind::Glob, 0, name)
    }

    pub fn arg(index: u32, name: &str) -> Variable {
        Variable::new(VarKind::Arg, index, name)
    }

    pub fn local(name: &str) -> Variable {
        Variable::new(VarKind::Local, 0, name)
    }

    pub fn temp(index: u32) -> Variable {
        Variable::new(VarKind::Temp, index, "")
    }

    pub fn return_value() -> Variable {
        Variable::new(VarKind::Return, 0, "return")
    }

    pub fn this() -> Variable {
        Variable::new(VarKind::This, 0, "this")
    }

    /// True for variables whose storage outlives the frame of the enclosing function.
    pub fn is_global(&self) -> bool {
        matches!(self.kind, VarKind::Func | VarKind::Glob)
    }
}

/// A field of an aggregate (struct, class or union) type.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Field {
    pub name: String,
    /// The name of the aggregate type that declares this field.
    pub csu: String,
    pub field_type: Type,
}

impl Debug for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(&self.name)
    }
}

impl Field {
    pub fn new(name: &str, csu: &str, field_type: Type) -> Field {
        Field {
            name: name.to_owned(),
            csu: csu.to_owned(),
            field_type,
        }
    }
}

/// Just enough of the C type system to describe strides, element types and field types.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Type {
    Void,
    Int { bytes: u32, sign: bool },
    Float { bytes: u32 },
    Pointer(Box<Type>),
    Array { element: Box<Type>, count: u32 },
    Csu(String),
    Function,
}

impl Type {
    /// The size in bytes, if it is known without consulting the aggregate's layout.
    pub fn width(&self) -> Option<u32> {
        match self {
            Type::Void => Some(1),
            Type::Int { bytes, .. } | Type::Float { bytes } => Some(*bytes),
            Type::Pointer(..) => Some(8),
            Type::Array { element, count } => element.width().map(|w| w.saturating_mul(*count)),
            Type::Csu(..) | Type::Function => None,
        }
    }
}

/// A source position.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl Debug for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl Location {
    pub fn new(file: &str, line: u32) -> Location {
        Location {
            file: file.to_owned(),
            line,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum BlockKind {
    /// The body of a function, with every loop split off into its own block.
    Function,
    /// The body of one loop, entered once per iteration.
    Loop,
}

/// Identifies a control flow graph: a function body or one of its loops.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BlockId {
    pub kind: BlockKind,
    /// The function this block belongs to.
    pub function: Variable,
    /// For loops, a name that is unique within the function, e.g. `loop:12`.
    pub loop_name: Option<String>,
}

impl Debug for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match &self.loop_name {
            Some(loop_name) => write!(f, "{:?}:{}", self.function, loop_name),
            None => self.function.fmt(f),
        }
    }
}

impl BlockId {
    pub fn function(name: &str) -> BlockId {
        BlockId {
            kind: BlockKind::Function,
            function: Variable::func(name),
            loop_name: None,
        }
    }

    pub fn for_loop(function: &str, loop_name: &str) -> BlockId {
        BlockId {
            kind: BlockKind::Loop,
            function: Variable::func(function),
            loop_name: Some(loop_name.to_owned()),
        }
    }

    pub fn is_loop(&self) -> bool {
        self.kind == BlockKind::Loop
    }

    pub fn function_name(&self) -> &str {
        &self.function.name
    }

    pub fn loop_name(&self) -> &str {
        self.loop_name.as_deref().unwrap_or("")
    }
}
