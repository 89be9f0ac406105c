// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Control method battery objects: `_BST`, `_BIX` and `_BTP`.

use alloc::string::String;
use core::fmt;

use crate::{eval::AcpiValue, package, single_value, u32_element, DecodeError};

pub const BST_METHOD: &str = "_BST";
pub const BIX_METHOD: &str = "_BIX";
pub const BTP_METHOD: &str = "_BTP";

/// Reported by firmware for a rate or capacity it cannot measure.
pub const UNKNOWN_VALUE: u32 = 0xFFFF_FFFF;

/// `_BST` battery state bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatteryState(pub u32);

impl BatteryState {
    pub const DISCHARGING: u32 = 1 << 0;
    pub const CHARGING: u32 = 1 << 1;
    pub const CRITICAL: u32 = 1 << 2;
    pub const CHARGE_LIMITING: u32 = 1 << 3;

    #[must_use]
    pub const fn contains(self, bits: u32) -> bool {
        self.0 & bits == bits
    }
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::DISCHARGING, "discharging"),
            (Self::CHARGING, "charging"),
            (Self::CRITICAL, "critical"),
            (Self::CHARGE_LIMITING, "charge limiting"),
        ];
        let mut first = true;
        for (bit, name) in names {
            if self.contains(bit) {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("idle")?;
        }
        Ok(())
    }
}

/// `_BST` result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BstData {
    pub state: BatteryState,
    pub present_rate: u32,
    pub remaining_capacity: u32,
    pub present_voltage: u32,
}

impl BstData {
    /// # Errors
    ///
    /// Fails unless the method returned a package of four integers.
    pub fn decode(values: &[AcpiValue]) -> Result<Self, DecodeError> {
        let elements = package(single_value(values)?, 4)?;
        Ok(Self {
            state: BatteryState(u32_element(elements, 0, "battery state")?),
            present_rate: u32_element(elements, 1, "present rate")?,
            remaining_capacity: u32_element(elements, 2, "remaining capacity")?,
            present_voltage: u32_element(elements, 3, "present voltage")?,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PowerUnit {
    #[default]
    MilliWatts,
    MilliAmps,
}

impl PowerUnit {
    #[must_use]
    pub const fn capacity_unit(self) -> &'static str {
        match self {
            Self::MilliWatts => "mWh",
            Self::MilliAmps => "mAh",
        }
    }

    #[must_use]
    pub const fn rate_unit(self) -> &'static str {
        match self {
            Self::MilliWatts => "mW",
            Self::MilliAmps => "mA",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatteryTechnology {
    #[default]
    Primary,
    Secondary,
}

impl fmt::Display for BatteryTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Primary => "Primary",
            Self::Secondary => "Secondary",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SwapCapability {
    #[default]
    NonSwappable,
    ColdSwappable,
    HotSwappable,
}

impl fmt::Display for SwapCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NonSwappable => "Non swappable",
            Self::ColdSwappable => "Cold swappable",
            Self::HotSwappable => "Hot swappable",
        })
    }
}

/// `_BIX` result. Revision 0 packages carry 20 elements; revision 1 appends
/// the swapping capability.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BixData {
    pub revision: u32,
    pub power_unit: PowerUnit,
    pub design_capacity: u32,
    pub last_full_charge_capacity: u32,
    pub technology: BatteryTechnology,
    pub design_voltage: u32,
    pub design_capacity_of_warning: u32,
    pub design_capacity_of_low: u32,
    pub cycle_count: u32,
    pub measurement_accuracy: u32,
    pub max_sampling_time: u32,
    pub min_sampling_time: u32,
    pub max_averaging_interval: u32,
    pub min_averaging_interval: u32,
    pub capacity_granularity_1: u32,
    pub capacity_granularity_2: u32,
    pub model_number: String,
    pub serial_number: String,
    pub battery_type: String,
    pub oem_info: String,
    pub swapping_capability: Option<SwapCapability>,
}

const BIX_REV0_LEN: usize = 20;

fn string_element(elements: &[AcpiValue], index: usize) -> Result<String, DecodeError> {
    match &elements[index] {
        AcpiValue::String(value) => Ok(value.clone()),
        // Some firmware returns identification strings as buffers.
        AcpiValue::Buffer(value) => {
            let end = value.iter().position(|c| *c == 0).unwrap_or(value.len());
            Ok(String::from_utf8_lossy(&value[..end]).into_owned())
        }
        _ => Err(DecodeError::ElementType(index)),
    }
}

impl BixData {
    /// # Errors
    ///
    /// Fails unless the method returned a package laid out as `_BIX`.
    pub fn decode(values: &[AcpiValue]) -> Result<Self, DecodeError> {
        let elements = package(single_value(values)?, BIX_REV0_LEN)?;

        let power_unit = match u32_element(elements, 1, "power unit")? {
            0 => PowerUnit::MilliWatts,
            1 => PowerUnit::MilliAmps,
            other => {
                return Err(DecodeError::OutOfRange {
                    field: "power unit",
                    value: other.into(),
                })
            }
        };
        let technology = match u32_element(elements, 4, "battery technology")? {
            0 => BatteryTechnology::Primary,
            1 => BatteryTechnology::Secondary,
            other => {
                return Err(DecodeError::OutOfRange {
                    field: "battery technology",
                    value: other.into(),
                })
            }
        };
        let swapping_capability = if elements.len() > BIX_REV0_LEN {
            Some(match u32_element(elements, BIX_REV0_LEN, "swapping capability")? {
                0x00 => SwapCapability::NonSwappable,
                0x01 => SwapCapability::ColdSwappable,
                0x10 => SwapCapability::HotSwappable,
                other => {
                    return Err(DecodeError::OutOfRange {
                        field: "swapping capability",
                        value: other.into(),
                    })
                }
            })
        } else {
            None
        };

        Ok(Self {
            revision: u32_element(elements, 0, "revision")?,
            power_unit,
            design_capacity: u32_element(elements, 2, "design capacity")?,
            last_full_charge_capacity: u32_element(elements, 3, "last full charge capacity")?,
            technology,
            design_voltage: u32_element(elements, 5, "design voltage")?,
            design_capacity_of_warning: u32_element(elements, 6, "design capacity of warning")?,
            design_capacity_of_low: u32_element(elements, 7, "design capacity of low")?,
            cycle_count: u32_element(elements, 8, "cycle count")?,
            measurement_accuracy: u32_element(elements, 9, "measurement accuracy")?,
            max_sampling_time: u32_element(elements, 10, "max sampling time")?,
            min_sampling_time: u32_element(elements, 11, "min sampling time")?,
            max_averaging_interval: u32_element(elements, 12, "max averaging interval")?,
            min_averaging_interval: u32_element(elements, 13, "min averaging interval")?,
            capacity_granularity_1: u32_element(elements, 14, "capacity granularity 1")?,
            capacity_granularity_2: u32_element(elements, 15, "capacity granularity 2")?,
            model_number: string_element(elements, 16)?,
            serial_number: string_element(elements, 17)?,
            battery_type: string_element(elements, 18)?,
            oem_info: string_element(elements, 19)?,
            swapping_capability,
        })
    }

    /// Remaining charge as a percentage of the last full charge.
    #[must_use]
    pub fn charge_percent(&self, bst: &BstData) -> Option<u32> {
        if self.last_full_charge_capacity == 0
            || self.last_full_charge_capacity == UNKNOWN_VALUE
            || bst.remaining_capacity == UNKNOWN_VALUE
        {
            return None;
        }
        let percent = u64::from(bst.remaining_capacity) * 100
            / u64::from(self.last_full_charge_capacity);
        Some(u32::try_from(percent.min(100)).unwrap_or(100))
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString, vec, vec::Vec};

    use super::*;

    fn int(value: u64) -> AcpiValue {
        AcpiValue::Integer(value)
    }

    fn bix_package(revision: u64, extra: Option<u64>) -> AcpiValue {
        let mut elements: Vec<AcpiValue> = [
            revision, 0, 10000, 9890, 1, 13000, 5000, 3000, 1337, 80000, 42, 7, 5, 1, 10, 10,
        ]
        .into_iter()
        .map(int)
        .collect();
        elements.push(AcpiValue::String("42.0".into()));
        elements.push(AcpiValue::Buffer(b"123-45\0\0".to_vec()));
        elements.push(AcpiValue::String("Li-on".into()));
        elements.push(AcpiValue::String("BatBros".into()));
        if let Some(extra) = extra {
            elements.push(int(extra));
        }
        AcpiValue::Package(elements)
    }

    #[test]
    fn decodes_bst() {
        let values = vec![AcpiValue::Package(vec![int(2), int(3839), int(5000), int(12569)])];
        let bst = BstData::decode(&values).unwrap();
        assert!(bst.state.contains(BatteryState::CHARGING));
        assert!(!bst.state.contains(BatteryState::DISCHARGING));
        assert_eq!(bst.present_rate, 3839);
        assert_eq!(bst.remaining_capacity, 5000);
        assert_eq!(bst.present_voltage, 12569);
    }

    #[test]
    fn bst_shape_errors() {
        assert_eq!(BstData::decode(&[]), Err(DecodeError::ObjectCount(0)));
        assert_eq!(BstData::decode(&[int(1)]), Err(DecodeError::NotAPackage));
        assert_eq!(
            BstData::decode(&[AcpiValue::Package(vec![int(1)])]),
            Err(DecodeError::ElementCount {
                expected: 4,
                actual: 1
            })
        );
        assert_eq!(
            BstData::decode(&[AcpiValue::Package(vec![
                int(1),
                AcpiValue::String("x".into()),
                int(0),
                int(0)
            ])]),
            Err(DecodeError::ElementType(1))
        );
        assert_eq!(
            BstData::decode(&[AcpiValue::Package(vec![int(1), int(1 << 40), int(0), int(0)])]),
            Err(DecodeError::OutOfRange {
                field: "present rate",
                value: 1 << 40
            })
        );
    }

    #[test]
    fn decodes_bix_revisions() {
        let bix = BixData::decode(&[bix_package(0, None)]).unwrap();
        assert_eq!(bix.power_unit, PowerUnit::MilliWatts);
        assert_eq!(bix.technology, BatteryTechnology::Secondary);
        assert_eq!(bix.cycle_count, 1337);
        assert_eq!(bix.model_number, "42.0");
        assert_eq!(bix.serial_number, "123-45");
        assert_eq!(bix.swapping_capability, None);

        let bix = BixData::decode(&[bix_package(1, Some(0x10))]).unwrap();
        assert_eq!(bix.swapping_capability, Some(SwapCapability::HotSwappable));

        assert_eq!(
            BixData::decode(&[bix_package(1, Some(7))]),
            Err(DecodeError::OutOfRange {
                field: "swapping capability",
                value: 7
            })
        );
    }

    #[test]
    fn charge_percent_handles_unknown_values() {
        let bix = BixData {
            last_full_charge_capacity: 8000,
            ..BixData::default()
        };
        let mut bst = BstData {
            remaining_capacity: 2000,
            ..BstData::default()
        };
        assert_eq!(bix.charge_percent(&bst), Some(25));
        bst.remaining_capacity = UNKNOWN_VALUE;
        assert_eq!(bix.charge_percent(&bst), None);
        bst.remaining_capacity = 9000;
        assert_eq!(bix.charge_percent(&bst), Some(100));
    }

    #[test]
    fn state_display() {
        assert_eq!(BatteryState(0).to_string(), "idle");
        assert_eq!(
            BatteryState(BatteryState::DISCHARGING | BatteryState::CRITICAL).to_string(),
            "discharging, critical"
        );
    }
}
