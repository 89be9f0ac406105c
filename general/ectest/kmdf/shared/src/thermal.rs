// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Thermal zone temperatures, which ACPI reports in tenths of a kelvin.

use crate::{eval::AcpiValue, u32_result, DecodeError};

pub const TMP_METHOD: &str = "_TMP";
pub const CRT_METHOD: &str = "_CRT";
pub const PSV_METHOD: &str = "_PSV";

#[must_use]
pub fn dk_to_c(dk: u32) -> f64 {
    f64::from(dk) / 10.0 - 273.15
}

/// Decodes a `_TMP`, `_CRT` or `_PSV` result into degrees Celsius.
///
/// # Errors
///
/// Fails unless the method returned a single 32-bit integer.
pub fn decode_celsius(values: &[AcpiValue]) -> Result<f64, DecodeError> {
    u32_result(values, "temperature").map(dk_to_c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        let diff = a - b;
        diff < 1e-9 && diff > -1e-9
    }

    #[test]
    fn conversions() {
        assert!(close(dk_to_c(2732), 0.05));
        assert!(close(dk_to_c(3032), 30.05));
    }

    #[test]
    fn decodes_tmp() {
        let celsius = decode_celsius(&[AcpiValue::Integer(3182)]).unwrap();
        assert!(close(celsius, 45.05));
        assert_eq!(
            decode_celsius(&[AcpiValue::String("hot".into())]),
            Err(DecodeError::NotAnInteger)
        );
    }
}
