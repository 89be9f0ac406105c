// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! ACPI 4.0 fan objects: `_FIF`, `_FPS`, `_FSL` and `_FST`, plus the active
//! cooling trip points (`_ACx`) of the thermal zone the fan serves.

use core::fmt;

use alloc::vec::Vec;

use crate::{eval::AcpiValue, eval::MethodArgument, package, single_value, u32_element, DecodeError};

pub const FIF_METHOD: &str = "_FIF";
pub const FPS_METHOD: &str = "_FPS";
pub const FSL_METHOD: &str = "_FSL";
pub const FST_METHOD: &str = "_FST";

/// `_AC0` to `_AC9`, hottest first.
pub const ACTIVE_COOLING_METHODS: [&str; 10] = [
    "_AC0", "_AC1", "_AC2", "_AC3", "_AC4", "_AC5", "_AC6", "_AC7", "_AC8", "_AC9",
];

/// Speed, noise, power and trip point fields use this when not reported.
pub const FAN_VALUE_UNKNOWN: u32 = 0xFFFF_FFFF;

/// `_FST`: where the fan is right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FanStatus {
    pub revision: u32,
    /// Last level set with `_FSL`.
    pub control: u32,
    pub speed_rpm: Option<u32>,
}

impl FanStatus {
    /// # Errors
    ///
    /// Fails unless `_FST` returned a package of three integers.
    pub fn decode(values: &[AcpiValue]) -> Result<Self, DecodeError> {
        let elements = package(single_value(values)?, 3)?;
        Ok(Self {
            revision: u32_element(elements, 0, "fan status revision")?,
            control: u32_element(elements, 1, "fan control")?,
            speed_rpm: known(u32_element(elements, 2, "fan speed")?),
        })
    }
}

/// `_FIF`: how the fan is controlled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FanInfo {
    pub revision: u32,
    /// `_FSL` takes a percentage instead of a `_FPS` control value.
    pub fine_grain_control: bool,
    /// Percent step the fan honours with fine grain control.
    pub step_size: u32,
    pub low_speed_notification: bool,
}

impl FanInfo {
    /// # Errors
    ///
    /// Fails unless `_FIF` returned a package of four integers.
    pub fn decode(values: &[AcpiValue]) -> Result<Self, DecodeError> {
        let elements = package(single_value(values)?, 4)?;
        Ok(Self {
            revision: u32_element(elements, 0, "fan info revision")?,
            fine_grain_control: u32_element(elements, 1, "fine grain control")? != 0,
            step_size: u32_element(elements, 2, "step size")?,
            low_speed_notification: u32_element(elements, 3, "low speed notification")? != 0,
        })
    }
}

/// One `_FPS` performance state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FanPerformanceState {
    /// Value to pass to `_FSL` for this state.
    pub control: u32,
    /// Index of the `_ACx` trip point that selects this state.
    pub trip_point: Option<u32>,
    pub speed_rpm: u32,
    /// Tenths of a dBA.
    pub noise_level: Option<u32>,
    /// Milliwatts.
    pub power: Option<u32>,
}

/// `_FPS`: the states a fan without fine grain control can be set to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FanPerformanceStates {
    pub revision: u32,
    pub states: Vec<FanPerformanceState>,
}

impl FanPerformanceStates {
    /// # Errors
    ///
    /// Fails unless `_FPS` returned a revision followed by packages of five
    /// integers.
    pub fn decode(values: &[AcpiValue]) -> Result<Self, DecodeError> {
        let elements = package(single_value(values)?, 1)?;
        let revision = u32_element(elements, 0, "fan performance revision")?;

        let states = elements[1..]
            .iter()
            .map(|state| {
                let fields = package(state, 5)?;
                Ok(FanPerformanceState {
                    control: u32_element(fields, 0, "fan control")?,
                    trip_point: known(u32_element(fields, 1, "trip point")?),
                    speed_rpm: u32_element(fields, 2, "fan speed")?,
                    noise_level: known(u32_element(fields, 3, "noise level")?),
                    power: known(u32_element(fields, 4, "fan power")?),
                })
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;

        Ok(Self { revision, states })
    }

    #[must_use]
    pub fn min_rpm(&self) -> Option<u32> {
        self.states.iter().map(|state| state.speed_rpm).min()
    }

    #[must_use]
    pub fn max_rpm(&self) -> Option<u32> {
        self.states.iter().map(|state| state.speed_rpm).max()
    }

    /// Slowest state that still reaches `rpm`, or the fastest one.
    #[must_use]
    pub fn state_for_rpm(&self, rpm: u32) -> Option<&FanPerformanceState> {
        self.states
            .iter()
            .filter(|state| state.speed_rpm >= rpm)
            .min_by_key(|state| state.speed_rpm)
            .or_else(|| self.states.iter().max_by_key(|state| state.speed_rpm))
    }
}

/// Role of an active cooling trip point for the fan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FanThreshold {
    /// Coolest trip point, where the fan starts.
    On,
    Ramping,
    /// `_AC0`, where the fan runs at full speed.
    Max,
}

impl FanThreshold {
    /// Role of `_AC<index>` in a zone defining `count` of them.
    #[must_use]
    pub const fn for_trip_point(index: usize, count: usize) -> Self {
        if index + 1 >= count {
            Self::On
        } else if index == 0 {
            Self::Max
        } else {
            Self::Ramping
        }
    }
}

impl fmt::Display for FanThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Ramping => "ramping",
            Self::Max => "max",
        })
    }
}

const fn known(value: u32) -> Option<u32> {
    if value == FAN_VALUE_UNKNOWN {
        None
    } else {
        Some(value)
    }
}

/// The `_FSL` argument that runs the fan at about `rpm`. Fine grain fans
/// take a percentage of the fastest state rounded to their step size, other
/// fans the control value of the matching `_FPS` state.
#[must_use]
pub fn fan_level_for_rpm(
    info: &FanInfo,
    states: &FanPerformanceStates,
    rpm: u32,
) -> Option<MethodArgument<'static>> {
    if !info.fine_grain_control {
        return states
            .state_for_rpm(rpm)
            .map(|state| MethodArgument::Integer(state.control.into()));
    }

    let max_rpm = states.max_rpm().filter(|max| *max > 0)?;
    let percent = (u64::from(rpm) * 100).div_ceil(u64::from(max_rpm)).min(100);
    let step = u64::from(info.step_size.clamp(1, 100));
    let percent = (percent.div_ceil(step) * step).min(100);
    Some(MethodArgument::Integer(percent))
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    fn int(value: u64) -> AcpiValue {
        AcpiValue::Integer(value)
    }

    fn fps() -> Vec<AcpiValue> {
        vec![AcpiValue::Package(vec![
            int(0),
            AcpiValue::Package(vec![int(100), int(0), int(4800), int(450), int(3000)]),
            AcpiValue::Package(vec![int(0), int(0xFFFF_FFFF), int(0), int(0xFFFF_FFFF), int(0)]),
            AcpiValue::Package(vec![int(50), int(1), int(2400), int(300), int(1200)]),
        ])]
    }

    #[test]
    fn decodes_status() {
        let status =
            FanStatus::decode(&[AcpiValue::Package(vec![int(0), int(50), int(2410)])]).unwrap();
        assert_eq!(status.control, 50);
        assert_eq!(status.speed_rpm, Some(2410));

        let stopped =
            FanStatus::decode(&[AcpiValue::Package(vec![int(0), int(0), int(0xFFFF_FFFF)])])
                .unwrap();
        assert_eq!(stopped.speed_rpm, None);

        assert_eq!(
            FanStatus::decode(&[AcpiValue::Package(vec![int(0), int(50)])]),
            Err(DecodeError::ElementCount {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn performance_states_give_speed_limits() {
        let states = FanPerformanceStates::decode(&fps()).unwrap();
        assert_eq!(states.states.len(), 3);
        assert_eq!(states.min_rpm(), Some(0));
        assert_eq!(states.max_rpm(), Some(4800));
        assert_eq!(states.states[1].trip_point, None);
        assert_eq!(states.states[2].noise_level, Some(300));

        assert_eq!(states.state_for_rpm(1000).map(|s| s.control), Some(50));
        assert_eq!(states.state_for_rpm(2400).map(|s| s.control), Some(50));
        assert_eq!(states.state_for_rpm(9000).map(|s| s.control), Some(100));
    }

    #[test]
    fn malformed_performance_state_is_reported() {
        let values = [AcpiValue::Package(vec![
            int(0),
            AcpiValue::Package(vec![int(100), int(0), int(4800)]),
        ])];
        assert_eq!(
            FanPerformanceStates::decode(&values),
            Err(DecodeError::ElementCount {
                expected: 5,
                actual: 3
            })
        );
        assert_eq!(
            FanPerformanceStates::decode(&[AcpiValue::Package(vec![int(0), int(7)])]),
            Err(DecodeError::NotAPackage)
        );
    }

    #[test]
    fn trip_point_roles() {
        assert_eq!(FanThreshold::for_trip_point(0, 3), FanThreshold::Max);
        assert_eq!(FanThreshold::for_trip_point(1, 3), FanThreshold::Ramping);
        assert_eq!(FanThreshold::for_trip_point(2, 3), FanThreshold::On);
        // A single trip point only switches the fan on.
        assert_eq!(FanThreshold::for_trip_point(0, 1), FanThreshold::On);
        assert_eq!(alloc::format!("{}", FanThreshold::Ramping), "ramping");
    }

    #[test]
    fn level_follows_the_control_mode() {
        let states = FanPerformanceStates::decode(&fps()).unwrap();
        let stepped = FanInfo {
            revision: 0,
            fine_grain_control: false,
            step_size: 0,
            low_speed_notification: false,
        };
        assert_eq!(
            fan_level_for_rpm(&stepped, &states, 3000),
            Some(MethodArgument::Integer(100))
        );

        let fine = FanInfo::decode(&[AcpiValue::Package(vec![int(0), int(1), int(5), int(0)])])
            .unwrap();
        assert!(fine.fine_grain_control);
        // 1000 of 4800 rpm is 20.8%, rounded up to the next 5% step.
        assert_eq!(
            fan_level_for_rpm(&fine, &states, 1000),
            Some(MethodArgument::Integer(25))
        );
        assert_eq!(
            fan_level_for_rpm(&fine, &states, 10_000),
            Some(MethodArgument::Integer(100))
        );

        let empty = FanPerformanceStates {
            revision: 0,
            states: Vec::new(),
        };
        assert_eq!(fan_level_for_rpm(&fine, &empty, 1000), None);
        assert_eq!(fan_level_for_rpm(&stepped, &empty, 1000), None);
    }
}
