// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! # Abstract
//!
//!    Definitions shared between the ECTest KMDF driver and the user mode test
//!    application: the device interface GUID, the IOCTL codes the driver
//!    accepts, the `acpiioct.h` evaluation buffer layouts, and decoders for
//!    the battery, time-alarm, fan and thermal methods exposed by the
//!    embedded controller firmware.
//!
//!    The crate is `no_std` so that the driver can link it; it only needs
//!    `alloc` for decoded ACPI values.

#![no_std]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

extern crate alloc;

pub mod battery;
pub mod eval;
pub mod fan;
pub mod ioctl;
pub mod notify;
pub mod rtc;
pub mod thermal;

/// Field-wise GUID representation, convertible into both `wdk_sys::GUID` and
/// `windows_sys::core::GUID` without depending on either.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawGuid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

// {5362AD97-8A56-4B4F-B6B4-3D1C0E1B0F42}
pub const GUID_DEVINTERFACE_ECTEST: RawGuid = RawGuid {
    data1: 0x5362_AD97,
    data2: 0x8A56,
    data3: 0x4B4F,
    data4: [0xB6, 0xB4, 0x3D, 0x1C, 0x0E, 0x1B, 0x0F, 0x42],
};

/// Reasons a method result does not match the object the ACPI specification
/// defines for that method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("method returned {0} objects, expected one")]
    ObjectCount(usize),
    #[error("expected a package")]
    NotAPackage,
    #[error("expected a buffer")]
    NotABuffer,
    #[error("expected an integer")]
    NotAnInteger,
    #[error("package has {actual} elements, expected at least {expected}")]
    ElementCount { expected: usize, actual: usize },
    #[error("package element {0} has the wrong type")]
    ElementType(usize),
    #[error("{field} value {value:#X} is out of range")]
    OutOfRange { field: &'static str, value: u64 },
    #[error("buffer holds {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
}

/// Methods return exactly one object.
///
/// # Errors
///
/// Fails when `values` does not hold exactly one object.
pub fn single_value(values: &[eval::AcpiValue]) -> Result<&eval::AcpiValue, DecodeError> {
    match values {
        [value] => Ok(value),
        other => Err(DecodeError::ObjectCount(other.len())),
    }
}

fn package(value: &eval::AcpiValue, min_len: usize) -> Result<&[eval::AcpiValue], DecodeError> {
    let elements = value.as_package().ok_or(DecodeError::NotAPackage)?;
    if elements.len() < min_len {
        return Err(DecodeError::ElementCount {
            expected: min_len,
            actual: elements.len(),
        });
    }
    Ok(elements)
}

fn u32_field(value: u64, field: &'static str) -> Result<u32, DecodeError> {
    u32::try_from(value).map_err(|_| DecodeError::OutOfRange { field, value })
}

fn u32_element(elements: &[eval::AcpiValue], index: usize, field: &'static str) -> Result<u32, DecodeError> {
    let value = elements
        .get(index)
        .and_then(eval::AcpiValue::as_integer)
        .ok_or(DecodeError::ElementType(index))?;
    u32_field(value, field)
}

/// Integer result of a method such as `_GCP` or `_TMP`.
///
/// # Errors
///
/// Fails unless the single returned object is an integer that fits in `u32`.
pub fn u32_result(values: &[eval::AcpiValue], field: &'static str) -> Result<u32, DecodeError> {
    let value = single_value(values)?
        .as_integer()
        .ok_or(DecodeError::NotAnInteger)?;
    u32_field(value, field)
}
