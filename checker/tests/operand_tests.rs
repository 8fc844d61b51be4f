// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use std::io::Write;
use std::num::NonZeroU32;
use tempfile::NamedTempFile;
use xcheck::buffer::{ParseError, ReadBuffer, Tag, WriteBuffer};
use xcheck::k_limits::MAX_OPERAND_DEPTH;
use xcheck::operand::{read_operand_file, OperandFileError, OperandList, TOperand, Transaction};

fn sample_list() -> TOperand {
    let mut inner = OperandList::new();
    inner.push(TOperand::TimeStamp(u64::MAX));
    let mut list = OperandList::new();
    list.push(TOperand::string(b"abc"));
    list.push(TOperand::TimeStamp(1_600_000_000));
    list.push(TOperand::Boolean(true));
    list.push(TOperand::Boolean(false));
    list.push(TOperand::List(OperandList::new()));
    list.push(TOperand::List(inner));
    list.push(TOperand::string(b""));
    TOperand::List(list)
}

fn decode(bytes: &[u8]) -> Result<TOperand, ParseError> {
    TOperand::from_bytes(bytes)
}

/// Writes the opening of an operand of the given kind code.
fn open_operand(kind: u64) -> WriteBuffer {
    let mut buffer = WriteBuffer::new();
    buffer.write_open(Tag::TOperand);
    buffer.write_uint(Tag::Kind, kind);
    buffer
}

#[test]
fn every_kind_reads_back_as_written() {
    let values = vec![
        sample_list(),
        TOperand::string(b"with \"quotes\" and \0 bytes"),
        TOperand::TimeStamp(0),
        TOperand::Boolean(false),
        TOperand::variable(300),
    ];
    for value in values {
        let decoded = decode(&value.to_bytes());
        assert_eq!(decoded, Ok(value));
    }
}

#[test]
fn variables_read_back_as_lookup_keys() {
    let mut transaction = Transaction::new();
    let variable = transaction.make_variable();
    let name = match variable {
        TOperand::Variable(name) => name,
        _ => panic!("expected a variable"),
    };
    transaction.assign(name, TOperand::string(b"value"));

    let decoded = decode(&variable.to_bytes()).unwrap();
    assert!(decoded.is_variable());
    assert_eq!(decoded.instantiate(&transaction), Some(TOperand::string(b"value")));
}

#[test]
fn transactions_name_variables_in_order() {
    let mut transaction = Transaction::new();
    assert_eq!(transaction.make_variable(), TOperand::variable(1));
    assert_eq!(transaction.make_variable(), TOperand::variable(2));
    let unassigned = TOperand::variable(2);
    assert_eq!(unassigned.instantiate(&transaction), None);
    let literal = TOperand::TimeStamp(9);
    assert_eq!(literal.instantiate(&transaction), Some(literal.clone()));
}

#[test]
fn display_forms() {
    assert_eq!(TOperand::variable(4).to_string(), "$4");
    assert_eq!(TOperand::string(b"hi").to_string(), "\"hi\"");
    assert_eq!(TOperand::string(b"").to_string(), "null");
    assert_eq!(TOperand::TimeStamp(17).to_string(), "17");
    assert_eq!(TOperand::Boolean(true).to_string(), "true");
    assert_eq!(
        sample_list().to_string(),
        "[\"abc\", 1600000000, true, false, [], [18446744073709551615], null]"
    );
}

#[test]
fn json_form() {
    let json = serde_json::to_string(&TOperand::Boolean(true)).unwrap();
    assert_eq!(json, "{\"Boolean\":true}");
    let json = serde_json::to_string(&TOperand::variable(2)).unwrap();
    assert_eq!(json, "{\"Variable\":2}");
}

#[test]
fn unknown_tags_are_rejected() {
    let mut bytes = open_operand(5).into_bytes();
    // Tag 9 in the empty form.
    bytes.push(9 << 3 | 3);
    assert!(matches!(
        decode(&bytes),
        Err(ParseError::UnknownTag { code: 9, .. })
    ));
}

#[test]
fn unknown_kinds_are_rejected() {
    let mut buffer = open_operand(9);
    buffer.write_close(Tag::TOperand);
    assert!(matches!(
        decode(buffer.as_bytes()),
        Err(ParseError::UnknownKind { code: 9, .. })
    ));
}

#[test]
fn tags_out_of_place_are_rejected() {
    // An index in a boolean.
    let mut buffer = open_operand(5);
    buffer.write_uint(Tag::Index, 2);
    buffer.write_close(Tag::TOperand);
    assert!(matches!(
        decode(buffer.as_bytes()),
        Err(ParseError::MisplacedTag {
            tag: Tag::Index,
            ..
        })
    ));

    // A payload before the kind.
    let mut buffer = WriteBuffer::new();
    buffer.write_open(Tag::TOperand);
    buffer.write_empty(Tag::True);
    buffer.write_uint(Tag::Kind, 5);
    buffer.write_close(Tag::TOperand);
    assert!(matches!(
        decode(buffer.as_bytes()),
        Err(ParseError::MisplacedTag { tag: Tag::True, .. })
    ));

    // A nested operand in a string.
    let mut buffer = open_operand(3);
    TOperand::Boolean(true).write(&mut buffer);
    buffer.write_close(Tag::TOperand);
    assert!(matches!(
        decode(buffer.as_bytes()),
        Err(ParseError::MisplacedTag {
            tag: Tag::TOperand,
            ..
        })
    ));
}

#[test]
fn duplicate_tags_are_rejected() {
    let mut buffer = open_operand(5);
    buffer.write_uint(Tag::Kind, 5);
    assert!(matches!(
        decode(buffer.as_bytes()),
        Err(ParseError::DuplicateTag { tag: Tag::Kind, .. })
    ));

    let mut buffer = open_operand(5);
    buffer.write_empty(Tag::True);
    buffer.write_empty(Tag::False);
    buffer.write_close(Tag::TOperand);
    assert!(matches!(
        decode(buffer.as_bytes()),
        Err(ParseError::DuplicateTag {
            tag: Tag::False,
            ..
        })
    ));

    let mut buffer = open_operand(4);
    buffer.write_uint(Tag::TimeStamp, 1);
    buffer.write_uint(Tag::TimeStamp, 2);
    buffer.write_close(Tag::TOperand);
    assert!(matches!(
        decode(buffer.as_bytes()),
        Err(ParseError::DuplicateTag {
            tag: Tag::TimeStamp,
            ..
        })
    ));
}

#[test]
fn lists_holding_variables_are_rejected() {
    let mut buffer = open_operand(2);
    TOperand::string(b"fine").write(&mut buffer);
    TOperand::variable(1).write(&mut buffer);
    buffer.write_close(Tag::TOperand);
    assert!(matches!(
        decode(buffer.as_bytes()),
        Err(ParseError::VariableInList { .. })
    ));
}

#[test]
fn missing_payloads_are_rejected() {
    for (kind, missing) in [
        (1, Tag::Index),
        (3, Tag::String),
        (4, Tag::TimeStamp),
        (5, Tag::True),
    ] {
        let mut buffer = open_operand(kind);
        buffer.write_close(Tag::TOperand);
        match decode(buffer.as_bytes()) {
            Err(ParseError::MissingPayload { missing: tag, .. }) => assert_eq!(tag, missing),
            other => panic!("kind {} decoded to {:?}", kind, other),
        }
    }

    let mut buffer = WriteBuffer::new();
    buffer.write_open(Tag::TOperand);
    buffer.write_close(Tag::TOperand);
    assert!(matches!(
        decode(buffer.as_bytes()),
        Err(ParseError::MissingPayload { missing: Tag::Kind, .. })
    ));
}

#[test]
fn variable_names_must_be_positive_32_bit_values() {
    for index in [0, u64::from(u32::MAX) + 1] {
        let mut buffer = open_operand(1);
        buffer.write_uint(Tag::Index, index);
        buffer.write_close(Tag::TOperand);
        assert!(matches!(
            decode(buffer.as_bytes()),
            Err(ParseError::ValueOutOfRange { .. })
        ));
    }
}

#[test]
fn unexpected_forms_are_rejected() {
    let mut buffer = WriteBuffer::new();
    buffer.write_open(Tag::TOperand);
    buffer.write_empty(Tag::Kind);
    assert!(matches!(
        decode(buffer.as_bytes()),
        Err(ParseError::UnexpectedItem {
            tag: Tag::Kind,
            ..
        })
    ));
}

#[test]
fn truncated_and_trailing_input_is_rejected() {
    let bytes = sample_list().to_bytes();
    for length in 0..bytes.len() {
        assert!(decode(&bytes[..length]).is_err(), "prefix of {} bytes", length);
    }

    let mut extended = bytes.clone();
    extended.push(0);
    assert!(matches!(
        decode(&extended),
        Err(ParseError::TrailingBytes { count: 1, .. })
    ));
}

#[test]
fn overlong_varints_are_rejected() {
    let bytes = [0xffu8; 11];
    assert!(matches!(
        decode(&bytes),
        Err(ParseError::MalformedVarint { position: 0 })
    ));
}

#[test]
fn nesting_is_limited() {
    let mut value = TOperand::Boolean(true);
    for _ in 0..MAX_OPERAND_DEPTH - 1 {
        let mut list = OperandList::new();
        list.push(value);
        value = TOperand::List(list);
    }
    let bytes = value.to_bytes();
    assert_eq!(decode(&bytes), Ok(value.clone()));

    let mut list = OperandList::new();
    list.push(value);
    let too_deep = TOperand::List(list);
    assert!(matches!(
        decode(&too_deep.to_bytes()),
        Err(ParseError::TooDeep { .. })
    ));
}

#[test]
fn buffers_report_their_position() {
    let mut buffer = WriteBuffer::new();
    buffer.write_uint(Tag::TimeStamp, 300);
    buffer.write_bytes(Tag::String, b"xy");
    let bytes = buffer.into_bytes();

    let mut reader = ReadBuffer::new(&bytes);
    assert_eq!(reader.read_uint(Tag::TimeStamp), Ok(300));
    assert_eq!(reader.position(), 3);
    assert_eq!(reader.read_bytes(Tag::String), Ok(&b"xy"[..]));
    assert!(reader.is_empty());
}

#[test]
fn files_hold_sequences_of_operands() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&sample_list().to_bytes()).unwrap();
    file.write_all(&TOperand::variable(7).to_bytes()).unwrap();
    file.flush().unwrap();

    let operands = read_operand_file(file.path()).unwrap();
    assert_eq!(operands, vec![sample_list(), TOperand::variable(7)]);
}

#[test]
fn malformed_files_fail_as_a_whole() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&TOperand::Boolean(true).to_bytes()).unwrap();
    let bytes = TOperand::string(b"cut short").to_bytes();
    file.write_all(&bytes[..bytes.len() - 1]).unwrap();
    file.flush().unwrap();

    match read_operand_file(file.path()) {
        Err(OperandFileError::Parse { path, .. }) => assert_eq!(path, file.path()),
        other => panic!("expected a parse error, got {:?}", other),
    }

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.bin");
    assert!(matches!(
        read_operand_file(&missing),
        Err(OperandFileError::Io { .. })
    ));
}

#[test]
fn assigned_values_replace_variables() {
    let mut transaction = Transaction::new();
    let name = NonZeroU32::new(1).unwrap();
    transaction.assign(name, TOperand::TimeStamp(5));
    assert_eq!(transaction.lookup(name), Some(&TOperand::TimeStamp(5)));
    assert_eq!(
        TOperand::variable(1).instantiate(&transaction),
        Some(TOperand::TimeStamp(5))
    );
}
