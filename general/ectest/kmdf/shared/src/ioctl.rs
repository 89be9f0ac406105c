// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! I/O control codes accepted by the ECTest driver.

pub const FILE_DEVICE_ACPI: u32 = 0x0000_0032;
pub const FILE_DEVICE_UNKNOWN: u32 = 0x0000_0022;

pub const METHOD_BUFFERED: u32 = 0;

pub const FILE_ANY_ACCESS: u32 = 0;
pub const FILE_READ_ACCESS: u32 = 0x0001;
pub const FILE_WRITE_ACCESS: u32 = 0x0002;

/// Equivalent of the `CTL_CODE` macro from `devioctl.h`.
#[must_use]
pub const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

/// Evaluates a control method named by a four character segment.
pub const IOCTL_ACPI_EVAL_METHOD: u32 = ctl_code(
    FILE_DEVICE_ACPI,
    0,
    METHOD_BUFFERED,
    FILE_READ_ACCESS | FILE_WRITE_ACCESS,
);

/// Evaluates a control method named by a relative path of up to 255 bytes.
pub const IOCTL_ACPI_EVAL_METHOD_EX: u32 = ctl_code(
    FILE_DEVICE_ACPI,
    6,
    METHOD_BUFFERED,
    FILE_READ_ACCESS | FILE_WRITE_ACCESS,
);

/// Completes with the next ACPI notify code (a little endian `u32`) raised
/// on the device.
pub const IOCTL_ECTEST_WAIT_NOTIFICATION: u32 =
    ctl_code(FILE_DEVICE_UNKNOWN, 0x800, METHOD_BUFFERED, FILE_READ_ACCESS);

/// Returns a [`crate::notify::NotificationStats`] snapshot.
pub const IOCTL_ECTEST_QUERY_STATS: u32 =
    ctl_code(FILE_DEVICE_UNKNOWN, 0x801, METHOD_BUFFERED, FILE_READ_ACCESS);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ioctl {
    AcpiEvalMethod,
    AcpiEvalMethodEx,
    WaitNotification,
    QueryStats,
}

impl Ioctl {
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            IOCTL_ACPI_EVAL_METHOD => Some(Self::AcpiEvalMethod),
            IOCTL_ACPI_EVAL_METHOD_EX => Some(Self::AcpiEvalMethodEx),
            IOCTL_ECTEST_WAIT_NOTIFICATION => Some(Self::WaitNotification),
            IOCTL_ECTEST_QUERY_STATS => Some(Self::QueryStats),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::AcpiEvalMethod => IOCTL_ACPI_EVAL_METHOD,
            Self::AcpiEvalMethodEx => IOCTL_ACPI_EVAL_METHOD_EX,
            Self::WaitNotification => IOCTL_ECTEST_WAIT_NOTIFICATION,
            Self::QueryStats => IOCTL_ECTEST_QUERY_STATS,
        }
    }

    /// Whether the request is handed down to the ACPI bus driver.
    #[must_use]
    pub const fn is_acpi_eval(self) -> bool {
        matches!(self, Self::AcpiEvalMethod | Self::AcpiEvalMethodEx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_wdk_headers() {
        assert_eq!(IOCTL_ACPI_EVAL_METHOD, 0x0032_C000);
        assert_eq!(IOCTL_ACPI_EVAL_METHOD_EX, 0x0032_C018);
        assert_eq!(IOCTL_ECTEST_WAIT_NOTIFICATION, 0x0022_6000);
        assert_eq!(IOCTL_ECTEST_QUERY_STATS, 0x0022_6004);
    }

    #[test]
    fn from_code_recognizes_only_known_codes() {
        for ioctl in [
            Ioctl::AcpiEvalMethod,
            Ioctl::AcpiEvalMethodEx,
            Ioctl::WaitNotification,
            Ioctl::QueryStats,
        ] {
            assert_eq!(Ioctl::from_code(ioctl.code()), Some(ioctl));
        }
        assert_eq!(
            Ioctl::from_code(ctl_code(FILE_DEVICE_UNKNOWN, 0x802, METHOD_BUFFERED, FILE_ANY_ACCESS)),
            None
        );
    }

    #[test]
    fn only_acpi_codes_are_forwarded() {
        assert!(Ioctl::AcpiEvalMethodEx.is_acpi_eval());
        assert!(!Ioctl::QueryStats.is_acpi_eval());
    }
}
