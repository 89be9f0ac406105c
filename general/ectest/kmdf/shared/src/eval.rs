// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Encoding and validation of the ACPI method evaluation buffers defined by
//! `acpiioct.h`.
//!
//! Every multi-byte field is little endian. A method argument is a
//! `u16 type | u16 data_length | data` record that always occupies at least
//! eight bytes, so short data is zero padded up to four bytes.

use alloc::{string::String, vec::Vec};
use core::fmt;

use crate::ioctl::Ioctl;

pub const ACPI_EVAL_INPUT_BUFFER_SIGNATURE: u32 = u32::from_be_bytes(*b"BieA");
pub const ACPI_EVAL_INPUT_BUFFER_COMPLEX_SIGNATURE: u32 = u32::from_be_bytes(*b"CieA");
pub const ACPI_EVAL_INPUT_BUFFER_SIGNATURE_EX: u32 = u32::from_be_bytes(*b"AieA");
pub const ACPI_EVAL_INPUT_BUFFER_COMPLEX_SIGNATURE_EX: u32 = u32::from_be_bytes(*b"FieA");
pub const ACPI_EVAL_OUTPUT_BUFFER_SIGNATURE: u32 = u32::from_be_bytes(*b"BoeA");

/// Size of the `MethodName` field of the `_EX` input buffers.
pub const METHOD_NAME_LEN_EX: usize = 256;
/// Longest path that still leaves room for the terminating NUL.
pub const MAX_METHOD_PATH_LEN: usize = METHOD_NAME_LEN_EX - 1;
/// Length of a single name segment.
pub const NAME_SEG_LEN: usize = 4;

pub const ARGUMENT_HEADER_LEN: usize = 4;
pub const SIMPLE_INPUT_LEN: usize = 8;
pub const COMPLEX_INPUT_HEADER_LEN: usize = 16;
pub const SIMPLE_INPUT_LEN_EX: usize = 4 + METHOD_NAME_LEN_EX;
pub const COMPLEX_INPUT_HEADER_LEN_EX: usize = SIMPLE_INPUT_LEN_EX + 8;
pub const OUTPUT_HEADER_LEN: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("method path is empty")]
    EmptyPath,
    #[error("method path is {0} bytes, the limit is 255")]
    PathTooLong(usize),
    #[error("method path is not a valid ACPI name path")]
    InvalidPath,
    #[error("a single name segment of at most four characters is required")]
    SimpleNameRequired,
    #[error("method name is not NUL terminated")]
    NameNotTerminated,
    #[error("buffer holds {available} bytes, {needed} are required")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("unexpected buffer signature {0:#010X}")]
    BadSignature(u32),
    #[error("argument data length {0} does not fit in a u16")]
    ArgumentTooLong(usize),
    #[error("argument of type {0} is not supported")]
    UnknownArgumentType(u16),
    #[error("argument runs past the end of the buffer")]
    ArgumentOverrun,
    #[error("arguments occupy {actual} bytes but {declared} were declared")]
    ArgumentSizeMismatch { declared: usize, actual: usize },
    #[error("{actual} arguments found but {declared} were declared")]
    ArgumentCountMismatch { declared: u32, actual: u32 },
    #[error("output length {0} does not cover the output header")]
    BadOutputLength(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ArgumentType {
    Integer = 0,
    String = 1,
    Buffer = 2,
    Package = 3,
    PackageEx = 4,
}

impl TryFrom<u16> for ArgumentType {
    type Error = EvalError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Integer),
            1 => Ok(Self::String),
            2 => Ok(Self::Buffer),
            3 => Ok(Self::Package),
            4 => Ok(Self::PackageEx),
            other => Err(EvalError::UnknownArgumentType(other)),
        }
    }
}

/// An argument passed to a control method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodArgument<'a> {
    Integer(u64),
    String(&'a str),
    Buffer(&'a [u8]),
}

impl MethodArgument<'_> {
    const fn data_len(&self) -> usize {
        match self {
            Self::Integer(value) => {
                if *value > u32::MAX as u64 {
                    8
                } else {
                    4
                }
            }
            // Strings carry their terminating NUL.
            Self::String(value) => value.len() + 1,
            Self::Buffer(value) => value.len(),
        }
    }

    const fn kind(&self) -> ArgumentType {
        match self {
            Self::Integer(_) => ArgumentType::Integer,
            Self::String(_) => ArgumentType::String,
            Self::Buffer(_) => ArgumentType::Buffer,
        }
    }
}

/// Bytes occupied by an argument record carrying `data_len` bytes of data.
#[must_use]
pub const fn argument_len(data_len: usize) -> usize {
    let data_len = if data_len < 4 { 4 } else { data_len };
    ARGUMENT_HEADER_LEN + data_len
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn ensure_len(bytes: &[u8], needed: usize) -> Result<(), EvalError> {
    if bytes.len() < needed {
        return Err(EvalError::BufferTooSmall {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

const fn is_name_char(c: u8, first: bool) -> bool {
    matches!(c, b'A'..=b'Z' | b'_') || (!first && c.is_ascii_digit())
}

/// Checks that `path` is an ACPI name path: an optional root (`\`) or one or
/// more parent (`^`) prefixes followed by dot separated segments of one to four
/// characters.
///
/// # Errors
///
/// Returns the first rule the path breaks.
pub fn validate_method_path(path: &[u8]) -> Result<(), EvalError> {
    if path.is_empty() {
        return Err(EvalError::EmptyPath);
    }
    if path.len() > MAX_METHOD_PATH_LEN {
        return Err(EvalError::PathTooLong(path.len()));
    }

    let rest = match path {
        [b'\\', rest @ ..] => rest,
        _ => {
            let parents = path.iter().take_while(|c| **c == b'^').count();
            &path[parents..]
        }
    };

    if rest.is_empty() {
        return Err(EvalError::InvalidPath);
    }

    for segment in rest.split(|c| *c == b'.') {
        if segment.is_empty() || segment.len() > NAME_SEG_LEN {
            return Err(EvalError::InvalidPath);
        }
        for (i, c) in segment.iter().enumerate() {
            if !is_name_char(*c, i == 0) {
                return Err(EvalError::InvalidPath);
            }
        }
    }

    Ok(())
}

fn write_argument(out: &mut [u8], argument: &MethodArgument<'_>) -> Result<usize, EvalError> {
    let data_len = argument.data_len();
    let len = u16::try_from(data_len).map_err(|_| EvalError::ArgumentTooLong(data_len))?;
    let record = argument_len(data_len);

    out[..2].copy_from_slice(&(argument.kind() as u16).to_le_bytes());
    out[2..4].copy_from_slice(&len.to_le_bytes());
    let data = &mut out[ARGUMENT_HEADER_LEN..record];
    data.fill(0);
    match argument {
        MethodArgument::Integer(value) => {
            data[..data_len].copy_from_slice(&value.to_le_bytes()[..data_len]);
        }
        MethodArgument::String(value) => data[..value.len()].copy_from_slice(value.as_bytes()),
        MethodArgument::Buffer(value) => data[..value.len()].copy_from_slice(value),
    }

    Ok(record)
}

/// Serializes an `IOCTL_ACPI_EVAL_METHOD_EX` input buffer into `out`.
///
/// Without arguments the simple `_EX` layout is produced, otherwise the
/// complex `_EX` layout.
///
/// # Errors
///
/// Fails on an invalid path, an argument too long for its `u16` length field,
/// or when `out` is too small; nothing useful is left in `out` in that case.
pub fn encode_eval_input(
    path: &str,
    args: &[MethodArgument<'_>],
    out: &mut [u8],
) -> Result<usize, EvalError> {
    validate_method_path(path.as_bytes())?;

    let args_len: usize = args.iter().map(|a| argument_len(a.data_len())).sum();
    let (signature, needed) = if args.is_empty() {
        (ACPI_EVAL_INPUT_BUFFER_SIGNATURE_EX, SIMPLE_INPUT_LEN_EX)
    } else {
        (
            ACPI_EVAL_INPUT_BUFFER_COMPLEX_SIGNATURE_EX,
            COMPLEX_INPUT_HEADER_LEN_EX + args_len,
        )
    };
    ensure_len(out, needed)?;

    out[..4].copy_from_slice(&signature.to_le_bytes());
    let name = &mut out[4..SIMPLE_INPUT_LEN_EX];
    name.fill(0);
    name[..path.len()].copy_from_slice(path.as_bytes());

    if args.is_empty() {
        return Ok(needed);
    }

    let size = u32::try_from(args_len).map_err(|_| EvalError::ArgumentTooLong(args_len))?;
    let count = u32::try_from(args.len()).map_err(|_| EvalError::ArgumentTooLong(args.len()))?;
    out[SIMPLE_INPUT_LEN_EX..SIMPLE_INPUT_LEN_EX + 4].copy_from_slice(&size.to_le_bytes());
    out[SIMPLE_INPUT_LEN_EX + 4..COMPLEX_INPUT_HEADER_LEN_EX].copy_from_slice(&count.to_le_bytes());

    let mut offset = COMPLEX_INPUT_HEADER_LEN_EX;
    for argument in args {
        offset += write_argument(&mut out[offset..], argument)?;
    }

    Ok(offset)
}

/// Serializes an `IOCTL_ACPI_EVAL_METHOD` input buffer for a method that
/// takes no arguments. Names shorter than four characters are padded with `_`.
///
/// # Errors
///
/// Fails unless `name` is a single segment and `out` holds eight bytes.
pub fn encode_simple_input(name: &str, out: &mut [u8]) -> Result<usize, EvalError> {
    let bytes = name.as_bytes();
    if !is_name_seg(bytes) {
        return Err(EvalError::SimpleNameRequired);
    }
    validate_method_path(bytes)?;
    ensure_len(out, SIMPLE_INPUT_LEN)?;

    out[..4].copy_from_slice(&ACPI_EVAL_INPUT_BUFFER_SIGNATURE.to_le_bytes());
    out[4..SIMPLE_INPUT_LEN].fill(b'_');
    out[4..4 + bytes.len()].copy_from_slice(bytes);
    Ok(SIMPLE_INPUT_LEN)
}

/// Encodes an evaluation of `path` with the smallest layout that carries it.
/// A bare name segment without arguments goes out as the eight byte
/// `IOCTL_ACPI_EVAL_METHOD` buffer, everything else with the `_EX` layouts.
///
/// # Errors
///
/// Propagates the encoder's error for `path` and `args`.
pub fn encode_request(
    path: &str,
    args: &[MethodArgument<'_>],
    out: &mut [u8],
) -> Result<(Ioctl, usize), EvalError> {
    if args.is_empty() && is_name_seg(path.as_bytes()) {
        let len = encode_simple_input(path, out)?;
        return Ok((Ioctl::AcpiEvalMethod, len));
    }
    let len = encode_eval_input(path, args, out)?;
    Ok((Ioctl::AcpiEvalMethodEx, len))
}

/// No scope prefix, no separator, at most four characters.
fn is_name_seg(name: &[u8]) -> bool {
    name.len() <= NAME_SEG_LEN && !name.iter().any(|c| matches!(c, b'.' | b'\\' | b'^'))
}

/// What the driver learned from a validated input buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvalRequest<'a> {
    pub path: &'a [u8],
    pub argument_count: u32,
}

fn checked_arguments(body: &[u8], declared_count: u32) -> Result<(), EvalError> {
    let mut actual = 0u32;
    for argument in Arguments::uncounted(body) {
        argument?;
        actual += 1;
    }
    if actual != declared_count {
        return Err(EvalError::ArgumentCountMismatch {
            declared: declared_count,
            actual,
        });
    }
    Ok(())
}

fn complex_body(input: &[u8], header_len: usize) -> Result<(&[u8], u32), EvalError> {
    ensure_len(input, header_len)?;
    let size = read_u32(input, header_len - 8).ok_or(EvalError::ArgumentOverrun)? as usize;
    let count = read_u32(input, header_len - 4).ok_or(EvalError::ArgumentOverrun)?;
    let available = input.len() - header_len;
    if size > available {
        return Err(EvalError::ArgumentSizeMismatch {
            declared: size,
            actual: available,
        });
    }
    Ok((&input[header_len..header_len + size], count))
}

fn name_ex(input: &[u8]) -> Result<&[u8], EvalError> {
    let field = &input[4..SIMPLE_INPUT_LEN_EX];
    let len = field
        .iter()
        .position(|c| *c == 0)
        .ok_or(EvalError::NameNotTerminated)?;
    let path = &field[..len];
    validate_method_path(path)?;
    Ok(path)
}

fn name_seg(input: &[u8]) -> Result<&[u8], EvalError> {
    let name = &input[4..SIMPLE_INPUT_LEN];
    if !is_name_seg(name) {
        return Err(EvalError::SimpleNameRequired);
    }
    // Short names are padded with '_' which is itself a name character.
    validate_method_path(name)?;
    Ok(name)
}

/// Validates an evaluation input buffer before it is handed to the ACPI
/// driver. The signature must be one the `ioctl` accepts and every declared
/// argument must lie within the buffer.
///
/// # Errors
///
/// Returns the first inconsistency found.
pub fn validate_eval_input(ioctl: Ioctl, input: &[u8]) -> Result<EvalRequest<'_>, EvalError> {
    let signature = read_u32(input, 0).ok_or(EvalError::BufferTooSmall {
        needed: 4,
        available: input.len(),
    })?;

    match (ioctl, signature) {
        (Ioctl::AcpiEvalMethod, ACPI_EVAL_INPUT_BUFFER_SIGNATURE) => {
            ensure_len(input, SIMPLE_INPUT_LEN)?;
            Ok(EvalRequest {
                path: name_seg(input)?,
                argument_count: 0,
            })
        }
        (Ioctl::AcpiEvalMethod, ACPI_EVAL_INPUT_BUFFER_COMPLEX_SIGNATURE) => {
            let (body, count) = complex_body(input, COMPLEX_INPUT_HEADER_LEN)?;
            let path = name_seg(input)?;
            checked_arguments(body, count)?;
            Ok(EvalRequest {
                path,
                argument_count: count,
            })
        }
        (Ioctl::AcpiEvalMethodEx, ACPI_EVAL_INPUT_BUFFER_SIGNATURE_EX) => {
            ensure_len(input, SIMPLE_INPUT_LEN_EX)?;
            Ok(EvalRequest {
                path: name_ex(input)?,
                argument_count: 0,
            })
        }
        (Ioctl::AcpiEvalMethodEx, ACPI_EVAL_INPUT_BUFFER_COMPLEX_SIGNATURE_EX) => {
            let (body, count) = complex_body(input, COMPLEX_INPUT_HEADER_LEN_EX)?;
            let path = name_ex(input)?;
            checked_arguments(body, count)?;
            Ok(EvalRequest {
                path,
                argument_count: count,
            })
        }
        (_, other) => Err(EvalError::BadSignature(other)),
    }
}

/// One argument record of an output buffer, borrowed from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawArgument<'a> {
    pub kind: ArgumentType,
    pub data: &'a [u8],
}

impl<'a> RawArgument<'a> {
    /// Integers are returned with four or eight bytes of data.
    #[must_use]
    pub fn as_integer(&self) -> Option<u64> {
        if self.kind != ArgumentType::Integer || self.data.is_empty() || self.data.len() > 8 {
            return None;
        }
        let mut raw = [0u8; 8];
        raw[..self.data.len()].copy_from_slice(self.data);
        Some(u64::from_le_bytes(raw))
    }

    /// Elements of a package argument.
    #[must_use]
    pub fn elements(&self) -> Option<Arguments<'a>> {
        match self.kind {
            ArgumentType::Package | ArgumentType::PackageEx => {
                Some(Arguments::uncounted(self.data))
            }
            _ => None,
        }
    }
}

fn parse_record(rest: &[u8]) -> Result<(RawArgument<'_>, usize), EvalError> {
    let kind = read_u16(rest, 0).ok_or(EvalError::ArgumentOverrun)?;
    let data_len = read_u16(rest, 2).ok_or(EvalError::ArgumentOverrun)? as usize;
    let record = argument_len(data_len);
    if record > rest.len() {
        return Err(EvalError::ArgumentOverrun);
    }
    let argument = RawArgument {
        kind: ArgumentType::try_from(kind)?,
        data: &rest[ARGUMENT_HEADER_LEN..ARGUMENT_HEADER_LEN + data_len],
    };
    Ok((argument, record))
}

/// Iterator over consecutive argument records.
#[derive(Clone, Debug)]
pub struct Arguments<'a> {
    rest: &'a [u8],
    remaining: Option<u32>,
}

impl<'a> Arguments<'a> {
    const fn counted(rest: &'a [u8], count: u32) -> Self {
        Self {
            rest,
            remaining: Some(count),
        }
    }

    /// Walks records until the bytes run out, as package data is laid out.
    const fn uncounted(rest: &'a [u8]) -> Self {
        Self {
            rest,
            remaining: None,
        }
    }
}

impl<'a> Iterator for Arguments<'a> {
    type Item = Result<RawArgument<'a>, EvalError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.remaining {
            Some(0) => return None,
            None if self.rest.is_empty() => return None,
            _ => {}
        }

        let parsed = parse_record(self.rest);

        match parsed {
            Ok((argument, record)) => {
                self.rest = &self.rest[record..];
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                Some(Ok(argument))
            }
            Err(e) => {
                // Stop after the first malformed record.
                self.rest = &[];
                self.remaining = Some(0);
                Some(Err(e))
            }
        }
    }
}

/// A parsed `ACPI_EVAL_OUTPUT_BUFFER`.
#[derive(Clone, Copy, Debug)]
pub struct EvalOutput<'a> {
    count: u32,
    body: &'a [u8],
}

impl<'a> EvalOutput<'a> {
    /// # Errors
    ///
    /// Fails on a short buffer, a wrong signature, or a `Length` field larger
    /// than the bytes actually returned.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, EvalError> {
        ensure_len(bytes, OUTPUT_HEADER_LEN)?;
        let signature = read_u32(bytes, 0).ok_or(EvalError::ArgumentOverrun)?;
        if signature != ACPI_EVAL_OUTPUT_BUFFER_SIGNATURE {
            return Err(EvalError::BadSignature(signature));
        }
        let length = read_u32(bytes, 4).ok_or(EvalError::ArgumentOverrun)? as usize;
        let count = read_u32(bytes, 8).ok_or(EvalError::ArgumentOverrun)?;
        ensure_len(bytes, length)?;
        if length < OUTPUT_HEADER_LEN {
            return Err(EvalError::BadOutputLength(length));
        }

        Ok(Self {
            count,
            body: &bytes[OUTPUT_HEADER_LEN..length],
        })
    }

    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub const fn arguments(&self) -> Arguments<'a> {
        Arguments::counted(self.body, self.count)
    }

    /// Decodes every returned argument.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed argument.
    pub fn values(&self) -> Result<Vec<AcpiValue>, EvalError> {
        self.arguments()
            .map(|argument| AcpiValue::from_raw(&argument?))
            .collect()
    }
}

/// When the ACPI driver completes with `STATUS_BUFFER_OVERFLOW` it fills only
/// the output header; its `Length` field is the size to retry with.
///
/// # Errors
///
/// Fails when fewer than [`OUTPUT_HEADER_LEN`] bytes came back, on a wrong
/// signature, or when the reported length cannot hold the header itself.
pub fn required_output_length(header: &[u8]) -> Result<usize, EvalError> {
    ensure_len(header, OUTPUT_HEADER_LEN)?;
    let signature = read_u32(header, 0).ok_or(EvalError::ArgumentOverrun)?;
    if signature != ACPI_EVAL_OUTPUT_BUFFER_SIGNATURE {
        return Err(EvalError::BadSignature(signature));
    }
    let length = read_u32(header, 4).ok_or(EvalError::ArgumentOverrun)? as usize;
    if length < OUTPUT_HEADER_LEN {
        return Err(EvalError::BadOutputLength(length));
    }
    Ok(length)
}

/// An owned, decoded ACPI object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcpiValue {
    Integer(u64),
    String(String),
    Buffer(Vec<u8>),
    Package(Vec<AcpiValue>),
}

impl AcpiValue {
    /// # Errors
    ///
    /// Fails when an integer has more than eight bytes or a package element is
    /// malformed.
    pub fn from_raw(raw: &RawArgument<'_>) -> Result<Self, EvalError> {
        Ok(match raw.kind {
            ArgumentType::Integer => Self::Integer(raw.as_integer().ok_or(EvalError::ArgumentOverrun)?),
            ArgumentType::String => {
                let end = raw.data.iter().position(|c| *c == 0).unwrap_or(raw.data.len());
                Self::String(String::from_utf8_lossy(&raw.data[..end]).into_owned())
            }
            ArgumentType::Buffer => Self::Buffer(raw.data.to_vec()),
            ArgumentType::Package | ArgumentType::PackageEx => Self::Package(
                Arguments::uncounted(raw.data)
                    .map(|element| Self::from_raw(&element?))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    #[must_use]
    pub const fn as_integer(&self) -> Option<u64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_buffer(&self) -> Option<&[u8]> {
        match self {
            Self::Buffer(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_package(&self) -> Option<&[Self]> {
        match self {
            Self::Package(value) => Some(value),
            _ => None,
        }
    }

    fn encode_record(&self, out: &mut Vec<u8>) {
        let start = out.len();
        out.extend_from_slice(&[0; ARGUMENT_HEADER_LEN]);
        let kind = match self {
            Self::Integer(value) => {
                out.extend_from_slice(&value.to_le_bytes());
                ArgumentType::Integer
            }
            Self::String(value) => {
                out.extend_from_slice(value.as_bytes());
                out.push(0);
                ArgumentType::String
            }
            Self::Buffer(value) => {
                out.extend_from_slice(value);
                ArgumentType::Buffer
            }
            Self::Package(elements) => {
                for element in elements {
                    element.encode_record(out);
                }
                ArgumentType::Package
            }
        };
        let data_len = out.len() - start - ARGUMENT_HEADER_LEN;
        out.resize(start + argument_len(data_len), 0);
        // Data lengths above u16::MAX are not representable.
        #[allow(clippy::cast_possible_truncation)]
        let data_len = data_len as u16;
        out[start..start + 2].copy_from_slice(&(kind as u16).to_le_bytes());
        out[start + 2..start + 4].copy_from_slice(&data_len.to_le_bytes());
    }

    /// Builds the output buffer the ACPI driver would return for `values`.
    #[must_use]
    pub fn encode_output(values: &[Self]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&ACPI_EVAL_OUTPUT_BUFFER_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&[0; 8]);
        for value in values {
            value.encode_record(&mut out);
        }
        #[allow(clippy::cast_possible_truncation)]
        let (length, count) = (out.len() as u32, values.len() as u32);
        out[4..8].copy_from_slice(&length.to_le_bytes());
        out[8..12].copy_from_slice(&count.to_le_bytes());
        out
    }
}

impl fmt::Display for AcpiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value:#X}"),
            Self::String(value) => write!(f, "\"{value}\""),
            Self::Buffer(value) => {
                f.write_str("Buffer {")?;
                for (i, byte) in value.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{byte:#04X}")?;
                }
                f.write_str(" }")
            }
            Self::Package(elements) => {
                f.write_str("Package {")?;
                for (i, element) in elements.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{element}")?;
                }
                f.write_str(" }")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString, vec};

    use super::*;

    #[test]
    fn signatures_are_little_endian_multichar_constants() {
        assert_eq!(ACPI_EVAL_INPUT_BUFFER_SIGNATURE, 0x4269_6541);
        assert_eq!(&ACPI_EVAL_OUTPUT_BUFFER_SIGNATURE.to_le_bytes(), b"AeoB");
    }

    #[test]
    fn path_rules() {
        for good in ["_BST", "\\_SB.ECT0.TBST", "^^_GRT", "BAT0._BIX", "A"] {
            assert_eq!(validate_method_path(good.as_bytes()), Ok(()), "{good}");
        }
        assert_eq!(validate_method_path(b""), Err(EvalError::EmptyPath));
        for bad in ["\\", "^", "_bst", "0ABC", "ABCDE", "A..B", "A.", "\\^A", "A B"] {
            assert_eq!(
                validate_method_path(bad.as_bytes()),
                Err(EvalError::InvalidPath),
                "{bad}"
            );
        }
        let long = "ABCD.".repeat(51) + "A";
        assert_eq!(
            validate_method_path(long.as_bytes()),
            Err(EvalError::PathTooLong(256))
        );
    }

    #[test]
    fn encodes_simple_ex_without_arguments() {
        let mut out = [0xAAu8; 300];
        let len = encode_eval_input("_SB.BAT0._BST", &[], &mut out).unwrap();
        assert_eq!(len, SIMPLE_INPUT_LEN_EX);
        assert_eq!(&out[..4], b"AeiA");
        assert_eq!(&out[4..17], b"_SB.BAT0._BST");
        assert!(out[17..len].iter().all(|b| *b == 0));
    }

    #[test]
    fn encodes_complex_ex_arguments_with_padding() {
        let mut out = [0u8; 400];
        let args = [
            MethodArgument::Integer(1),
            MethodArgument::Integer(0x1_0000_0000),
            MethodArgument::String("ab"),
            MethodArgument::Buffer(&[9]),
        ];
        let len = encode_eval_input("_BTP", &args, &mut out).unwrap();
        // 8 + 12 + 8 + 8 bytes of argument records
        assert_eq!(len, COMPLEX_INPUT_HEADER_LEN_EX + 36);
        assert_eq!(&out[..4], b"AeiF");
        assert_eq!(read_u32(&out, 260), Some(36));
        assert_eq!(read_u32(&out, 264), Some(4));

        let body = &out[COMPLEX_INPUT_HEADER_LEN_EX..len];
        assert_eq!(&body[..8], &[0, 0, 4, 0, 1, 0, 0, 0]);
        assert_eq!(&body[8..12], &[0, 0, 8, 0]);
        assert_eq!(&body[20..28], &[1, 0, 3, 0, b'a', b'b', 0, 0]);
        assert_eq!(&body[28..36], &[2, 0, 1, 0, 9, 0, 0, 0]);

        let request = validate_eval_input(Ioctl::AcpiEvalMethodEx, &out[..len]).unwrap();
        assert_eq!(request.path, b"_BTP");
        assert_eq!(request.argument_count, 4);
    }

    #[test]
    fn encode_reports_short_output() {
        let mut out = [0u8; 100];
        assert_eq!(
            encode_eval_input("_BST", &[], &mut out),
            Err(EvalError::BufferTooSmall {
                needed: SIMPLE_INPUT_LEN_EX,
                available: 100
            })
        );
    }

    #[test]
    fn simple_input_pads_the_name_segment() {
        let mut out = [0u8; 8];
        assert_eq!(encode_simple_input("_TM", &mut out), Ok(8));
        assert_eq!(&out[4..], b"_TM_");
        assert_eq!(
            validate_eval_input(Ioctl::AcpiEvalMethod, &out).unwrap().path,
            b"_TM_"
        );
        assert_eq!(
            encode_simple_input("BAT0._BST", &mut out),
            Err(EvalError::SimpleNameRequired)
        );
    }

    #[test]
    fn simple_buffers_carry_one_unprefixed_segment() {
        for name in [b"A.BC", b"\\ABC", b"^ABC", b"^^_T"] {
            let mut input = [0u8; SIMPLE_INPUT_LEN];
            input[..4].copy_from_slice(&ACPI_EVAL_INPUT_BUFFER_SIGNATURE.to_le_bytes());
            input[4..].copy_from_slice(name);
            assert_eq!(
                validate_eval_input(Ioctl::AcpiEvalMethod, &input),
                Err(EvalError::SimpleNameRequired),
                "{name:?}"
            );
        }

        // Same rule for the complex layout, which shares the name field.
        let mut input = [0u8; COMPLEX_INPUT_HEADER_LEN];
        input[..4].copy_from_slice(&ACPI_EVAL_INPUT_BUFFER_COMPLEX_SIGNATURE.to_le_bytes());
        input[4..8].copy_from_slice(b"\\_TZ");
        assert_eq!(
            validate_eval_input(Ioctl::AcpiEvalMethod, &input),
            Err(EvalError::SimpleNameRequired)
        );
        input[4..8].copy_from_slice(b"_TZ_");
        assert_eq!(
            validate_eval_input(Ioctl::AcpiEvalMethod, &input).unwrap().path,
            b"_TZ_"
        );
    }

    #[test]
    fn requests_pick_the_smallest_layout() {
        let mut out = [0u8; 512];
        assert_eq!(
            encode_request("_TMP", &[], &mut out),
            Ok((Ioctl::AcpiEvalMethod, SIMPLE_INPUT_LEN))
        );
        assert_eq!(&out[4..8], b"_TMP");

        assert_eq!(
            encode_request("\\_TZ.TZ00._TMP", &[], &mut out),
            Ok((Ioctl::AcpiEvalMethodEx, SIMPLE_INPUT_LEN_EX))
        );
        let (ioctl, len) = encode_request("_TIV", &[MethodArgument::Integer(1)], &mut out).unwrap();
        assert_eq!(ioctl, Ioctl::AcpiEvalMethodEx);
        assert_eq!(validate_eval_input(ioctl, &out[..len]).unwrap().argument_count, 1);

        assert_eq!(encode_request("", &[], &mut out), Err(EvalError::EmptyPath));
    }

    #[test]
    fn validation_rejects_signature_for_the_other_ioctl() {
        let mut out = [0u8; SIMPLE_INPUT_LEN_EX];
        encode_eval_input("_BIX", &[], &mut out).unwrap();
        assert_eq!(
            validate_eval_input(Ioctl::AcpiEvalMethod, &out),
            Err(EvalError::BadSignature(ACPI_EVAL_INPUT_BUFFER_SIGNATURE_EX))
        );
    }

    #[test]
    fn validation_rejects_unterminated_names_and_truncated_arguments() {
        let mut out = [b'A'; SIMPLE_INPUT_LEN_EX];
        out[..4].copy_from_slice(&ACPI_EVAL_INPUT_BUFFER_SIGNATURE_EX.to_le_bytes());
        assert_eq!(
            validate_eval_input(Ioctl::AcpiEvalMethodEx, &out),
            Err(EvalError::NameNotTerminated)
        );

        let mut out = [0u8; 300];
        let len = encode_eval_input("_BTP", &[MethodArgument::Integer(5)], &mut out).unwrap();
        assert!(matches!(
            validate_eval_input(Ioctl::AcpiEvalMethodEx, &out[..len - 1]),
            Err(EvalError::ArgumentSizeMismatch { declared: 8, actual: 7 })
        ));

        // Declare two arguments but only carry one.
        out[264..268].copy_from_slice(&2u32.to_le_bytes());
        assert_eq!(
            validate_eval_input(Ioctl::AcpiEvalMethodEx, &out[..len]),
            Err(EvalError::ArgumentCountMismatch {
                declared: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn parses_nested_packages() {
        let bytes = AcpiValue::encode_output(&[AcpiValue::Package(vec![
            AcpiValue::Integer(1),
            AcpiValue::String("Li-on".into()),
            AcpiValue::Package(vec![AcpiValue::Buffer(vec![1, 2, 3, 4, 5])]),
        ])]);

        let output = EvalOutput::parse(&bytes).unwrap();
        assert_eq!(output.count(), 1);
        let values = output.values().unwrap();
        let package = values[0].as_package().unwrap();
        assert_eq!(package[0].as_integer(), Some(1));
        assert_eq!(package[1].as_str(), Some("Li-on"));
        assert_eq!(
            package[2].as_package().unwrap()[0].as_buffer(),
            Some(&[1, 2, 3, 4, 5][..])
        );
    }

    #[test]
    fn parses_four_byte_integers() {
        let mut bytes = vec![];
        bytes.extend_from_slice(b"AeoB");
        bytes.extend_from_slice(&20u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&[0, 0, 4, 0, 0x78, 0x56, 0x34, 0x12]);
        let values = EvalOutput::parse(&bytes).unwrap().values().unwrap();
        assert_eq!(values, vec![AcpiValue::Integer(0x1234_5678)]);
    }

    #[test]
    fn output_errors() {
        let mut bytes = AcpiValue::encode_output(&[AcpiValue::Integer(3)]);
        assert_eq!(required_output_length(&bytes), Ok(bytes.len()));

        let short = &bytes[..bytes.len() - 2];
        assert!(matches!(
            EvalOutput::parse(short),
            Err(EvalError::BufferTooSmall { .. })
        ));

        // Claim a second argument that is not there.
        bytes[8] = 2;
        let output = EvalOutput::parse(&bytes).unwrap();
        let mut arguments = output.arguments();
        assert!(arguments.next().unwrap().is_ok());
        assert_eq!(arguments.next(), Some(Err(EvalError::ArgumentOverrun)));
        assert_eq!(arguments.next(), None);

        bytes[0] = b'X';
        assert!(matches!(
            EvalOutput::parse(&bytes),
            Err(EvalError::BadSignature(_))
        ));
        assert_eq!(
            required_output_length(&bytes),
            Err(EvalError::BadSignature(u32::from_le_bytes(*b"XeoB")))
        );
    }

    #[test]
    fn retry_length_comes_from_a_complete_header() {
        let returned = AcpiValue::encode_output(&[AcpiValue::String("LION".into())]);
        assert_eq!(
            required_output_length(&returned[..OUTPUT_HEADER_LEN]),
            Ok(returned.len())
        );

        // The driver copied fewer bytes than a header.
        assert_eq!(
            required_output_length(&returned[..8]),
            Err(EvalError::BufferTooSmall {
                needed: OUTPUT_HEADER_LEN,
                available: 8
            })
        );

        let mut header = [0u8; OUTPUT_HEADER_LEN];
        header[..4].copy_from_slice(&ACPI_EVAL_INPUT_BUFFER_SIGNATURE.to_le_bytes());
        header[4..8].copy_from_slice(&64u32.to_le_bytes());
        assert_eq!(
            required_output_length(&header),
            Err(EvalError::BadSignature(ACPI_EVAL_INPUT_BUFFER_SIGNATURE))
        );

        header[..4].copy_from_slice(&ACPI_EVAL_OUTPUT_BUFFER_SIGNATURE.to_le_bytes());
        header[4..8].copy_from_slice(&4u32.to_le_bytes());
        assert_eq!(
            required_output_length(&header),
            Err(EvalError::BadOutputLength(4))
        );
        assert!(matches!(
            EvalOutput::parse(&header),
            Err(EvalError::BadOutputLength(4))
        ));
    }

    #[test]
    fn display_formats_nested_values() {
        let value = AcpiValue::Package(vec![
            AcpiValue::Integer(255),
            AcpiValue::String("x".into()),
            AcpiValue::Buffer(vec![1, 0xAB]),
        ]);
        assert_eq!(
            value.to_string(),
            "Package { 0xFF, \"x\", Buffer { 0x01, 0xAB } }"
        );
    }
}
