// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! A self-delimiting tagged encoding. Every item starts with a varint header holding a tag
//! and a form, `tag << 3 | form`. The form says what follows the header: nothing (open,
//! close and empty items), a varint (unsigned integers), or a varint length and that many
//! bytes (byte strings).

use thiserror::Error;

/// The tags an item can carry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Tag {
    Kind,
    Index,
    True,
    False,
    String,
    TimeStamp,
    TOperand,
}

impl Tag {
    pub fn code(self) -> u64 {
        match self {
            Tag::Kind => 1,
            Tag::Index => 2,
            Tag::True => 3,
            Tag::False => 4,
            Tag::String => 5,
            Tag::TimeStamp => 6,
            Tag::TOperand => 40,
        }
    }

    pub fn from_code(code: u64) -> Option<Tag> {
        match code {
            1 => Some(Tag::Kind),
            2 => Some(Tag::Index),
            3 => Some(Tag::True),
            4 => Some(Tag::False),
            5 => Some(Tag::String),
            6 => Some(Tag::TimeStamp),
            40 => Some(Tag::TOperand),
            _ => None,
        }
    }
}

/// What follows an item header.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Form {
    Open,
    Close,
    Empty,
    UInt,
    Bytes,
}

impl Form {
    fn code(self) -> u64 {
        match self {
            Form::Open => 1,
            Form::Close => 2,
            Form::Empty => 3,
            Form::UInt => 4,
            Form::Bytes => 5,
        }
    }

    fn from_code(code: u64) -> Option<Form> {
        match code {
            1 => Some(Form::Open),
            2 => Some(Form::Close),
            3 => Some(Form::Empty),
            4 => Some(Form::UInt),
            5 => Some(Form::Bytes),
            _ => None,
        }
    }
}

const FORM_BITS: u32 = 3;
const MAX_VARINT_BYTES: usize = 10;

/// Why a read failed. Positions are byte offsets into the input.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("unexpected end of input at byte {position}")]
    UnexpectedEnd { position: usize },
    #[error("malformed varint at byte {position}")]
    MalformedVarint { position: usize },
    #[error("unknown tag {code} at byte {position}")]
    UnknownTag { code: u64, position: usize },
    #[error("unknown form {code} at byte {position}")]
    UnknownForm { code: u64, position: usize },
    #[error("expected {expected:?} {tag:?}, found {found_form:?} {found_tag:?} at byte {position}")]
    UnexpectedItem {
        tag: Tag,
        expected: Form,
        found_tag: Tag,
        found_form: Form,
        position: usize,
    },
    #[error("duplicate {tag:?} at byte {position}")]
    DuplicateTag { tag: Tag, position: usize },
    #[error("{tag:?} is out of place for operand kind {kind} at byte {position}")]
    MisplacedTag {
        tag: Tag,
        kind: String,
        position: usize,
    },
    #[error("unknown operand kind {code} at byte {position}")]
    UnknownKind { code: u64, position: usize },
    #[error("operand of kind {kind} ending at byte {position} has no {missing:?}")]
    MissingPayload {
        kind: String,
        missing: Tag,
        position: usize,
    },
    #[error("a list holds a variable at byte {position}")]
    VariableInList { position: usize },
    #[error("value {value} out of range at byte {position}")]
    ValueOutOfRange { value: u64, position: usize },
    #[error("operands nested deeper than {limit} at byte {position}")]
    TooDeep { limit: usize, position: usize },
    #[error("{count} trailing bytes at byte {position}")]
    TrailingBytes { count: usize, position: usize },
}

/// Accumulates encoded items.
#[derive(Clone, Debug, Default)]
pub struct WriteBuffer {
    data: Vec<u8>,
}

impl WriteBuffer {
    pub fn new() -> WriteBuffer {
        WriteBuffer::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.data.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.data.push(value as u8);
    }

    fn write_header(&mut self, tag: Tag, form: Form) {
        self.write_varint(tag.code() << FORM_BITS | form.code());
    }

    pub fn write_open(&mut self, tag: Tag) {
        self.write_header(tag, Form::Open);
    }

    pub fn write_close(&mut self, tag: Tag) {
        self.write_header(tag, Form::Close);
    }

    pub fn write_empty(&mut self, tag: Tag) {
        self.write_header(tag, Form::Empty);
    }

    pub fn write_uint(&mut self, tag: Tag, value: u64) {
        self.write_header(tag, Form::UInt);
        self.write_varint(value);
    }

    pub fn write_bytes(&mut self, tag: Tag, bytes: &[u8]) {
        self.write_header(tag, Form::Bytes);
        self.write_varint(bytes.len() as u64);
        self.data.extend_from_slice(bytes);
    }
}

/// Reads items from a byte slice. A failed read leaves the position unspecified.
#[derive(Clone, Debug)]
pub struct ReadBuffer<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ReadBuffer<'a> {
    pub fn new(data: &'a [u8]) -> ReadBuffer<'a> {
        ReadBuffer { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn read_varint(&mut self) -> Result<u64, ParseError> {
        let start = self.position;
        let mut value: u64 = 0;
        for count in 0..MAX_VARINT_BYTES {
            let byte = *self
                .data
                .get(self.position)
                .ok_or(ParseError::UnexpectedEnd {
                    position: self.position,
                })?;
            self.position += 1;
            let payload = u64::from(byte & 0x7f);
            if count == MAX_VARINT_BYTES - 1 && payload > 1 {
                return Err(ParseError::MalformedVarint { position: start });
            }
            value |= payload << (7 * count);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ParseError::MalformedVarint { position: start })
    }

    fn read_header(&mut self) -> Result<(Tag, Form), ParseError> {
        let position = self.position;
        let header = self.read_varint()?;
        let tag_code = header >> FORM_BITS;
        let form_code = header & ((1 << FORM_BITS) - 1);
        let tag = Tag::from_code(tag_code).ok_or(ParseError::UnknownTag {
            code: tag_code,
            position,
        })?;
        let form = Form::from_code(form_code).ok_or(ParseError::UnknownForm {
            code: form_code,
            position,
        })?;
        Ok((tag, form))
    }

    /// The header of the next item, without consuming it.
    pub fn peek_header(&self) -> Result<(Tag, Form), ParseError> {
        self.clone().read_header()
    }

    fn expect_header(&mut self, tag: Tag, form: Form) -> Result<(), ParseError> {
        let position = self.position;
        let (found_tag, found_form) = self.read_header()?;
        if found_tag != tag || found_form != form {
            return Err(ParseError::UnexpectedItem {
                tag,
                expected: form,
                found_tag,
                found_form,
                position,
            });
        }
        Ok(())
    }

    pub fn read_open(&mut self, tag: Tag) -> Result<(), ParseError> {
        self.expect_header(tag, Form::Open)
    }

    pub fn read_close(&mut self, tag: Tag) -> Result<(), ParseError> {
        self.expect_header(tag, Form::Close)
    }

    /// Consumes the close item for tag if it is next.
    pub fn try_read_close(&mut self, tag: Tag) -> Result<bool, ParseError> {
        if self.peek_header()? == (tag, Form::Close) {
            self.read_header()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn read_empty(&mut self, tag: Tag) -> Result<(), ParseError> {
        self.expect_header(tag, Form::Empty)
    }

    pub fn read_uint(&mut self, tag: Tag) -> Result<u64, ParseError> {
        self.expect_header(tag, Form::UInt)?;
        self.read_varint()
    }

    pub fn read_bytes(&mut self, tag: Tag) -> Result<&'a [u8], ParseError> {
        self.expect_header(tag, Form::Bytes)?;
        let position = self.position;
        let length = self.read_varint()?;
        if length > self.remaining() as u64 {
            return Err(ParseError::UnexpectedEnd { position });
        }
        let start = self.position;
        self.position += length as usize;
        Ok(&self.data[start..self.position])
    }
}
