// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Operands exchanged with the transaction server. An operand is a value or a transaction
//! variable that stands for one.

use crate::buffer::{ParseError, ReadBuffer, Tag, WriteBuffer};
use crate::k_limits::MAX_OPERAND_DEPTH;

use log_derive::logfn_inputs;
use mirai_annotations::checked_precondition;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter, Result};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

#[derive(Serialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TOperandKind {
    Variable,
    List,
    String,
    TimeStamp,
    Boolean,
}

impl TOperandKind {
    pub fn code(self) -> u64 {
        match self {
            TOperandKind::Variable => 1,
            TOperandKind::List => 2,
            TOperandKind::String => 3,
            TOperandKind::TimeStamp => 4,
            TOperandKind::Boolean => 5,
        }
    }

    pub fn from_code(code: u64) -> Option<TOperandKind> {
        match code {
            1 => Some(TOperandKind::Variable),
            2 => Some(TOperandKind::List),
            3 => Some(TOperandKind::String),
            4 => Some(TOperandKind::TimeStamp),
            5 => Some(TOperandKind::Boolean),
            _ => None,
        }
    }
}

#[derive(Serialize, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TOperand {
    /// A transaction variable, named by a positive index.
    Variable(NonZeroU32),
    List(OperandList),
    /// Raw bytes. A zero length string is the null string.
    String(Rc<[u8]>),
    TimeStamp(u64),
    Boolean(bool),
}

/// The elements of a list operand. Variables never appear in a list.
#[derive(Serialize, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct OperandList {
    operands: Vec<TOperand>,
}

impl OperandList {
    pub fn new() -> OperandList {
        OperandList::default()
    }

    pub fn push(&mut self, operand: TOperand) {
        checked_precondition!(
            !operand.is_variable(),
            "a list operand cannot hold a variable"
        );
        self.operands.push(operand);
    }

    pub fn get(&self, index: usize) -> Option<&TOperand> {
        self.operands.get(index)
    }

    pub fn len(&self) -> usize {
        self.operands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TOperand> {
        self.operands.iter()
    }
}

impl FromIterator<TOperand> for OperandList {
    fn from_iter<I: IntoIterator<Item = TOperand>>(iter: I) -> OperandList {
        let mut list = OperandList::new();
        for operand in iter {
            list.push(operand);
        }
        list
    }
}

impl TOperand {
    pub fn variable(name: u32) -> TOperand {
        checked_precondition!(name != 0, "variable names start at 1");
        match NonZeroU32::new(name) {
            Some(name) => TOperand::Variable(name),
            None => TOperand::Variable(NonZeroU32::MIN),
        }
    }

    pub fn string(bytes: &[u8]) -> TOperand {
        TOperand::String(Rc::from(bytes))
    }

    pub fn kind(&self) -> TOperandKind {
        match self {
            TOperand::Variable(..) => TOperandKind::Variable,
            TOperand::List(..) => TOperandKind::List,
            TOperand::String(..) => TOperandKind::String,
            TOperand::TimeStamp(..) => TOperandKind::TimeStamp,
            TOperand::Boolean(..) => TOperandKind::Boolean,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, TOperand::Variable(..))
    }

    /// Replaces a variable with the value the transaction assigned it. Other operands are
    /// returned unchanged. None if the variable is unassigned.
    #[logfn_inputs(TRACE)]
    pub fn instantiate(&self, transaction: &Transaction) -> Option<TOperand> {
        match self {
            TOperand::Variable(name) => transaction.lookup(*name).cloned(),
            _ => Some(self.clone()),
        }
    }

    pub fn write(&self, buffer: &mut WriteBuffer) {
        buffer.write_open(Tag::TOperand);
        buffer.write_uint(Tag::Kind, self.kind().code());
        match self {
            TOperand::Variable(name) => buffer.write_uint(Tag::Index, u64::from(name.get())),
            TOperand::List(list) => {
                for operand in list.iter() {
                    operand.write(buffer);
                }
            }
            TOperand::String(data) => buffer.write_bytes(Tag::String, data),
            TOperand::TimeStamp(stamp) => buffer.write_uint(Tag::TimeStamp, *stamp),
            TOperand::Boolean(true) => buffer.write_empty(Tag::True),
            TOperand::Boolean(false) => buffer.write_empty(Tag::False),
        }
        buffer.write_close(Tag::TOperand);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = WriteBuffer::new();
        self.write(&mut buffer);
        buffer.into_bytes()
    }

    /// Reads one operand from the buffer.
    pub fn read(buffer: &mut ReadBuffer<'_>) -> std::result::Result<TOperand, ParseError> {
        Self::read_nested(buffer, 0)
    }

    /// Decodes a single operand that must span all of the bytes.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<TOperand, ParseError> {
        let mut buffer = ReadBuffer::new(bytes);
        let operand = Self::read(&mut buffer)?;
        if !buffer.is_empty() {
            return Err(ParseError::TrailingBytes {
                count: buffer.remaining(),
                position: buffer.position(),
            });
        }
        Ok(operand)
    }

    fn read_nested(
        buffer: &mut ReadBuffer<'_>,
        depth: usize,
    ) -> std::result::Result<TOperand, ParseError> {
        if depth >= MAX_OPERAND_DEPTH {
            return Err(ParseError::TooDeep {
                limit: MAX_OPERAND_DEPTH,
                position: buffer.position(),
            });
        }
        buffer.read_open(Tag::TOperand)?;
        let mut kind: Option<TOperandKind> = None;
        let mut index: Option<NonZeroU32> = None;
        let mut flag: Option<bool> = None;
        let mut data: Option<&[u8]> = None;
        let mut stamp: Option<u64> = None;
        let mut operands = Vec::new();

        let misplaced = |tag: Tag, kind: Option<TOperandKind>, position: usize| {
            ParseError::MisplacedTag {
                tag,
                kind: format!("{:?}", kind),
                position,
            }
        };
        let duplicate = |tag: Tag, position: usize| ParseError::DuplicateTag { tag, position };

        while !buffer.try_read_close(Tag::TOperand)? {
            let position = buffer.position();
            let (tag, _) = buffer.peek_header()?;
            match tag {
                Tag::Kind => {
                    if kind.is_some() {
                        return Err(duplicate(tag, position));
                    }
                    let code = buffer.read_uint(tag)?;
                    kind = Some(
                        TOperandKind::from_code(code)
                            .ok_or(ParseError::UnknownKind { code, position })?,
                    );
                }
                Tag::Index => {
                    if kind != Some(TOperandKind::Variable) {
                        return Err(misplaced(tag, kind, position));
                    }
                    if index.is_some() {
                        return Err(duplicate(tag, position));
                    }
                    let value = buffer.read_uint(tag)?;
                    index = u32::try_from(value).ok().and_then(NonZeroU32::new);
                    if index.is_none() {
                        return Err(ParseError::ValueOutOfRange { value, position });
                    }
                }
                Tag::True | Tag::False => {
                    if kind != Some(TOperandKind::Boolean) {
                        return Err(misplaced(tag, kind, position));
                    }
                    if flag.is_some() {
                        return Err(duplicate(tag, position));
                    }
                    buffer.read_empty(tag)?;
                    flag = Some(tag == Tag::True);
                }
                Tag::String => {
                    if kind != Some(TOperandKind::String) {
                        return Err(misplaced(tag, kind, position));
                    }
                    if data.is_some() {
                        return Err(duplicate(tag, position));
                    }
                    data = Some(buffer.read_bytes(tag)?);
                }
                Tag::TimeStamp => {
                    if kind != Some(TOperandKind::TimeStamp) {
                        return Err(misplaced(tag, kind, position));
                    }
                    if stamp.is_some() {
                        return Err(duplicate(tag, position));
                    }
                    stamp = Some(buffer.read_uint(tag)?);
                }
                Tag::TOperand => {
                    if kind != Some(TOperandKind::List) {
                        return Err(misplaced(tag, kind, position));
                    }
                    let operand = Self::read_nested(buffer, depth + 1)?;
                    if operand.is_variable() {
                        return Err(ParseError::VariableInList { position });
                    }
                    operands.push(operand);
                }
            }
        }

        let position = buffer.position();
        let missing = |kind: TOperandKind, missing: Tag| ParseError::MissingPayload {
            kind: format!("{:?}", kind),
            missing,
            position,
        };
        match kind {
            None => Err(ParseError::MissingPayload {
                kind: String::from("None"),
                missing: Tag::Kind,
                position,
            }),
            Some(TOperandKind::Variable) => index
                .map(TOperand::Variable)
                .ok_or_else(|| missing(TOperandKind::Variable, Tag::Index)),
            Some(TOperandKind::List) => Ok(TOperand::List(OperandList { operands })),
            Some(TOperandKind::String) => data
                .map(TOperand::string)
                .ok_or_else(|| missing(TOperandKind::String, Tag::String)),
            Some(TOperandKind::TimeStamp) => stamp
                .map(TOperand::TimeStamp)
                .ok_or_else(|| missing(TOperandKind::TimeStamp, Tag::TimeStamp)),
            Some(TOperandKind::Boolean) => flag
                .map(TOperand::Boolean)
                .ok_or_else(|| missing(TOperandKind::Boolean, Tag::True)),
        }
    }
}

impl Display for TOperand {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            TOperand::Variable(name) => write!(f, "${}", name),
            TOperand::List(list) => {
                f.write_str("[")?;
                for (i, operand) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    Display::fmt(operand, f)?;
                }
                f.write_str("]")
            }
            TOperand::String(data) if data.is_empty() => f.write_str("null"),
            TOperand::String(data) => {
                write!(f, "\"{}\"", String::from_utf8_lossy(data).escape_debug())
            }
            TOperand::TimeStamp(stamp) => write!(f, "{}", stamp),
            TOperand::Boolean(value) => write!(f, "{}", value),
        }
    }
}

/// Transaction variables and their assigned values.
#[derive(Clone, Debug, Default)]
pub struct Transaction {
    variable_count: u32,
    values: HashMap<NonZeroU32, TOperand>,
}

impl Transaction {
    pub fn new() -> Transaction {
        Transaction::default()
    }

    /// A fresh, unassigned variable.
    pub fn make_variable(&mut self) -> TOperand {
        self.variable_count += 1;
        TOperand::variable(self.variable_count)
    }

    pub fn assign(&mut self, name: NonZeroU32, value: TOperand) {
        checked_precondition!(
            !value.is_variable(),
            "a variable is assigned a value, not another variable"
        );
        debug!("assign ${} := {}", name, value);
        self.values.insert(name, value);
    }

    pub fn lookup(&self, name: NonZeroU32) -> Option<&TOperand> {
        self.values.get(&name)
    }
}

#[derive(Debug, Error)]
pub enum OperandFileError {
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed operand in {}: {source}", .path.display())]
    Parse { path: PathBuf, source: ParseError },
}

/// Decodes a file holding a sequence of encoded operands.
pub fn read_operand_file(path: &Path) -> std::result::Result<Vec<TOperand>, OperandFileError> {
    let bytes = std::fs::read(path).map_err(|source| OperandFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut buffer = ReadBuffer::new(&bytes);
    let mut operands = Vec::new();
    while !buffer.is_empty() {
        let operand = TOperand::read(&mut buffer).map_err(|source| OperandFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        operands.push(operand);
    }
    debug!("read {} operands from {}", operands.len(), path.display());
    Ok(operands)
}
