// Copyright (c) Microsoft Corporation
// License: MIT OR Apache-2.0

//! Command line of the test app.

use clap::{ArgAction, Parser, Subcommand};
use ectest_shared::thermal::TMP_METHOD;
use uuid::Uuid;

/// Exercises the EC test driver: evaluates ACPI methods of the embedded
/// controller test device and listens for its notifications.
#[derive(Debug, Parser)]
#[command(name = "ectestapp", version, about)]
pub struct Cli {
    /// More output, repeat for more (`-v` debug, `-vv` trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Open this device path instead of looking the interface up.
    #[arg(long, global = true)]
    pub device: Option<String>,

    /// Device interface class to look up.
    #[arg(long, global = true)]
    pub interface: Option<Uuid>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluates a control method and prints what it returned.
    ///
    /// Integer arguments are passed first, string arguments after them.
    Eval {
        /// Method path relative to the device, e.g. `_STA` or `BAT0._BST`.
        path: String,

        /// Integer argument, decimal or 0x-prefixed hex.
        #[arg(long = "int", value_parser = parse_integer)]
        integers: Vec<u64>,

        /// String argument.
        #[arg(long = "str")]
        strings: Vec<String>,
    },

    /// Reads battery status (`_BST`) and information (`_BIX`).
    Battery {
        /// Scope of the battery methods, e.g. `BAT0`.
        #[arg(long)]
        scope: Option<String>,
    },

    /// Sets the battery trip point (`_BTP`).
    TripPoint {
        /// Trip point in the battery's capacity unit, 0 clears it.
        #[arg(value_parser = parse_u32)]
        capacity: u32,

        /// Scope of the battery methods, e.g. `BAT0`.
        #[arg(long)]
        scope: Option<String>,
    },

    /// Reads the time and alarm device: capabilities, real time and both
    /// timers.
    Rtc {
        /// Scope of the time and alarm methods.
        #[arg(long)]
        scope: Option<String>,
    },

    /// Reads a thermal zone temperature.
    Temperature {
        /// Method returning deci-kelvin.
        #[arg(long, default_value = TMP_METHOD)]
        path: String,
    },

    /// Reads the fan's speed and performance states and the active cooling
    /// trip points that switch it, or asks for a speed with `_FSL`.
    Fan {
        /// Scope of the fan methods, e.g. `FAN0`.
        #[arg(long)]
        scope: Option<String>,

        /// Scope of the thermal zone holding the `_ACx` trip points.
        #[arg(long)]
        zone: Option<String>,

        /// Run the fan at about this many revolutions per minute.
        #[arg(long, value_parser = parse_u32)]
        set_rpm: Option<u32>,
    },

    /// Waits for `Notify()` codes raised by firmware on the device.
    Notifications {
        /// Stop after this many codes instead of waiting forever.
        #[arg(short, long)]
        count: Option<u32>,
    },

    /// Prints the driver's notification counters.
    Stats,
}

fn parse_integer(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => value.replace('_', "").parse(),
    };
    parsed.map_err(|err| format!("`{value}` is not an integer: {err}"))
}

fn parse_u32(value: &str) -> Result<u32, String> {
    let parsed = parse_integer(value)?;
    u32::try_from(parsed).map_err(|_| format!("`{value}` does not fit in 32 bits"))
}

/// Joins a method name onto an optional scope.
pub fn method_path(scope: Option<&str>, method: &str) -> String {
    match scope {
        Some(scope) if !scope.is_empty() => format!("{}.{method}", scope.trim_end_matches('.')),
        _ => method.to_owned(),
    }
}
