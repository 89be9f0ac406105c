// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Time and alarm device objects: `_GCP`, `_GRT`, `_GWS`, `_TIP` and `_TIV`.

use core::fmt;

use crate::{eval::AcpiValue, eval::MethodArgument, single_value, u32_result, DecodeError};

pub const GCP_METHOD: &str = "_GCP";
pub const GRT_METHOD: &str = "_GRT";
pub const GWS_METHOD: &str = "_GWS";
pub const TIP_METHOD: &str = "_TIP";
pub const TIV_METHOD: &str = "_TIV";

/// Length of the buffer returned by `_GRT`.
pub const ACPI_TIME_LEN: usize = 16;

/// `_TZ` value meaning the time zone is not specified.
pub const TIME_ZONE_UNSPECIFIED: i16 = 2047;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerId {
    AcPower = 0,
    DcPower = 1,
}

impl TimerId {
    pub const ALL: [Self; 2] = [Self::AcPower, Self::DcPower];

    /// The integer argument identifying this timer to `_GWS`, `_TIP` and `_TIV`.
    #[must_use]
    pub const fn argument(self) -> MethodArgument<'static> {
        MethodArgument::Integer(self as u64)
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AcPower => "AC timer",
            Self::DcPower => "DC timer",
        })
    }
}

/// `_GCP` capability bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeAlarmCapabilities(pub u32);

impl TimeAlarmCapabilities {
    pub const AC_WAKE: u32 = 1 << 0;
    pub const DC_WAKE: u32 = 1 << 1;
    pub const REAL_TIME: u32 = 1 << 2;
    pub const REAL_TIME_MILLISECONDS: u32 = 1 << 3;
    pub const WAKE_STATUS: u32 = 1 << 4;
    pub const AC_WAKE_S4: u32 = 1 << 5;
    pub const AC_WAKE_S5: u32 = 1 << 6;
    pub const DC_WAKE_S4: u32 = 1 << 7;
    pub const DC_WAKE_S5: u32 = 1 << 8;

    const NAMES: [(u32, &'static str); 9] = [
        (Self::AC_WAKE, "AC wake"),
        (Self::DC_WAKE, "DC wake"),
        (Self::REAL_TIME, "get/set real time"),
        (Self::REAL_TIME_MILLISECONDS, "millisecond accuracy"),
        (Self::WAKE_STATUS, "wake status"),
        (Self::AC_WAKE_S4, "AC wake from S4"),
        (Self::AC_WAKE_S5, "AC wake from S5"),
        (Self::DC_WAKE_S4, "DC wake from S4"),
        (Self::DC_WAKE_S5, "DC wake from S5"),
    ];

    #[must_use]
    pub const fn contains(self, bits: u32) -> bool {
        self.0 & bits == bits
    }

    /// Names of the capabilities that are set.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(bit, _)| self.contains(*bit))
            .map(|(_, name)| name)
    }

    /// # Errors
    ///
    /// Fails unless `_GCP` returned a single 32-bit integer.
    pub fn decode(values: &[AcpiValue]) -> Result<Self, DecodeError> {
        u32_result(values, "capabilities").map(Self)
    }
}

/// `_GWS` status bits for one timer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimerStatus(pub u32);

impl TimerStatus {
    pub const EXPIRED: u32 = 1 << 0;
    pub const TRIGGERED_WAKE: u32 = 1 << 1;

    #[must_use]
    pub const fn expired(self) -> bool {
        self.0 & Self::EXPIRED != 0
    }

    #[must_use]
    pub const fn triggered_wake(self) -> bool {
        self.0 & Self::TRIGGERED_WAKE != 0
    }

    /// # Errors
    ///
    /// Fails unless `_GWS` returned a single 32-bit integer.
    pub fn decode(values: &[AcpiValue]) -> Result<Self, DecodeError> {
        u32_result(values, "wake status").map(Self)
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}",
            if self.expired() { "expired" } else { "not expired" },
            if self.triggered_wake() {
                "triggered wake"
            } else {
                "did not trigger wake"
            }
        )
    }
}

/// `_TIV` seconds remaining on a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlarmTimerSeconds(pub u32);

impl AlarmTimerSeconds {
    pub const DISABLED: Self = Self(0xFFFF_FFFF);

    /// # Errors
    ///
    /// Fails unless `_TIV` returned a single 32-bit integer.
    pub fn decode(values: &[AcpiValue]) -> Result<Self, DecodeError> {
        u32_result(values, "timer value").map(Self)
    }
}

impl fmt::Display for AlarmTimerSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::DISABLED => f.write_str("timer not set"),
            Self(seconds) => write!(f, "{seconds} seconds"),
        }
    }
}

/// `_TIP` expired timer wake policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WakePolicy(pub u32);

impl WakePolicy {
    pub const INSTANTLY: Self = Self(0);
    pub const NEVER: Self = Self(0xFFFF_FFFF);

    /// # Errors
    ///
    /// Fails unless `_TIP` returned a single 32-bit integer.
    pub fn decode(values: &[AcpiValue]) -> Result<Self, DecodeError> {
        u32_result(values, "wake policy").map(Self)
    }
}

impl fmt::Display for WakePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::INSTANTLY => f.write_str("instantly"),
            Self::NEVER => f.write_str("never"),
            Self(seconds) => write!(f, "after {seconds} seconds"),
        }
    }
}

/// Daylight saving flags of an [`AcpiTime`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Daylight(pub u8);

impl Daylight {
    pub const OBSERVED: u8 = 1 << 0;
    pub const ADJUSTED: u8 = 1 << 1;

    #[must_use]
    pub const fn observed(self) -> bool {
        self.0 & Self::OBSERVED != 0
    }

    #[must_use]
    pub const fn adjusted(self) -> bool {
        self.0 & Self::ADJUSTED != 0
    }
}

/// The 16 byte time structure returned by `_GRT`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcpiTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub valid: bool,
    pub milliseconds: u16,
    /// Minutes from UTC; `None` when firmware leaves it unspecified.
    pub time_zone: Option<i16>,
    pub daylight: Daylight,
}

impl AcpiTime {
    /// # Errors
    ///
    /// Fails on a short buffer or out of range calendar fields.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() < ACPI_TIME_LEN {
            return Err(DecodeError::BufferLength {
                expected: ACPI_TIME_LEN,
                actual: raw.len(),
            });
        }

        let time_zone = i16::from_le_bytes([raw[10], raw[11]]);
        let time = Self {
            year: u16::from_le_bytes([raw[0], raw[1]]),
            month: raw[2],
            day: raw[3],
            hour: raw[4],
            minute: raw[5],
            second: raw[6],
            valid: raw[7] != 0,
            milliseconds: u16::from_le_bytes([raw[8], raw[9]]),
            time_zone: (time_zone != TIME_ZONE_UNSPECIFIED).then_some(time_zone),
            daylight: Daylight(raw[12]),
        };

        let checks: [(&'static str, u64, bool); 6] = [
            ("month", time.month.into(), (1..=12).contains(&time.month)),
            ("day", time.day.into(), (1..=31).contains(&time.day)),
            ("hour", time.hour.into(), time.hour <= 23),
            ("minute", time.minute.into(), time.minute <= 59),
            ("second", time.second.into(), time.second <= 59),
            ("milliseconds", time.milliseconds.into(), time.milliseconds <= 999),
        ];
        for (field, value, ok) in checks {
            if !ok {
                return Err(DecodeError::OutOfRange { field, value });
            }
        }
        if let Some(zone) = time.time_zone {
            if !(-1440..=1440).contains(&zone) {
                return Err(DecodeError::OutOfRange {
                    field: "time zone",
                    value: u64::from(zone.unsigned_abs()),
                });
            }
        }

        Ok(time)
    }

    /// # Errors
    ///
    /// Fails unless `_GRT` returned a single buffer holding a valid time.
    pub fn decode(values: &[AcpiValue]) -> Result<Self, DecodeError> {
        let raw = single_value(values)?
            .as_buffer()
            .ok_or(DecodeError::NotABuffer)?;
        Self::from_bytes(raw)
    }
}

impl fmt::Display for AcpiTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.milliseconds
        )?;
        match self.time_zone {
            Some(zone) => {
                let sign = if zone < 0 { '-' } else { '+' };
                let zone = zone.unsigned_abs();
                write!(f, " UTC{sign}{:02}:{:02}", zone / 60, zone % 60)?;
            }
            None => f.write_str(" (local)")?,
        }
        if self.daylight.adjusted() {
            f.write_str(" DST")?;
        }
        if !self.valid {
            f.write_str(" [invalid]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString, vec, vec::Vec};

    use super::*;

    fn grt_bytes(time_zone: i16) -> Vec<u8> {
        let mut raw = vec![0u8; ACPI_TIME_LEN];
        raw[..2].copy_from_slice(&2026u16.to_le_bytes());
        raw[2] = 1;
        raw[3] = 1;
        raw[4] = 13;
        raw[5] = 5;
        raw[6] = 9;
        raw[7] = 1;
        raw[8..10].copy_from_slice(&250u16.to_le_bytes());
        raw[10..12].copy_from_slice(&time_zone.to_le_bytes());
        raw[12] = Daylight::OBSERVED;
        raw
    }

    #[test]
    fn decodes_grt_buffer() {
        let time = AcpiTime::decode(&[AcpiValue::Buffer(grt_bytes(-480))]).unwrap();
        assert_eq!(time.year, 2026);
        assert_eq!(time.time_zone, Some(-480));
        assert!(time.daylight.observed());
        assert!(!time.daylight.adjusted());
        assert_eq!(time.to_string(), "2026-01-01 13:05:09.250 UTC-08:00");

        let time = AcpiTime::from_bytes(&grt_bytes(TIME_ZONE_UNSPECIFIED)).unwrap();
        assert_eq!(time.time_zone, None);
        assert_eq!(time.to_string(), "2026-01-01 13:05:09.250 (local)");
    }

    #[test]
    fn rejects_bad_grt_buffers() {
        assert_eq!(
            AcpiTime::from_bytes(&[0; 8]),
            Err(DecodeError::BufferLength {
                expected: 16,
                actual: 8
            })
        );
        let mut raw = grt_bytes(0);
        raw[2] = 13;
        assert_eq!(
            AcpiTime::from_bytes(&raw),
            Err(DecodeError::OutOfRange {
                field: "month",
                value: 13
            })
        );
        assert_eq!(
            AcpiTime::decode(&[AcpiValue::Integer(0)]),
            Err(DecodeError::NotABuffer)
        );
    }

    #[test]
    fn capability_names() {
        let caps = TimeAlarmCapabilities::decode(&[AcpiValue::Integer(0xF7)]).unwrap();
        assert!(caps.contains(TimeAlarmCapabilities::REAL_TIME));
        assert!(!caps.contains(TimeAlarmCapabilities::REAL_TIME_MILLISECONDS));
        let names: Vec<_> = caps.names().collect();
        assert_eq!(names.len(), 7);
        assert_eq!(names[0], "AC wake");
    }

    #[test]
    fn timer_values() {
        assert_eq!(AlarmTimerSeconds::DISABLED.to_string(), "timer not set");
        assert_eq!(
            AlarmTimerSeconds::decode(&[AcpiValue::Integer(30)])
                .unwrap()
                .to_string(),
            "30 seconds"
        );
        assert_eq!(WakePolicy::NEVER.to_string(), "never");
        assert_eq!(WakePolicy(5).to_string(), "after 5 seconds");
        assert_eq!(
            TimerStatus(TimerStatus::EXPIRED).to_string(),
            "expired, did not trigger wake"
        );
        assert_eq!(
            TimerId::DcPower.argument(),
            MethodArgument::Integer(1)
        );
    }
}
