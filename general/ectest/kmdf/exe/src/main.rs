// Copyright (c) Microsoft Corporation
// License: MIT OR Apache-2.0

//! Test app for the EC test driver. Evaluates ACPI methods of the embedded
//! controller test device through the driver and prints battery, time and
//! alarm, fan and thermal readings, or waits for firmware notifications.
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(clippy::multiple_unsafe_ops_per_block)]
#![deny(clippy::undocumented_unsafe_blocks)]

mod cli;
mod commands;
mod device;
mod logger;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use crate::{
    cli::{Cli, Command},
    device::EcTestDevice,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose);

    let path = match cli.device {
        Some(path) => path,
        None => {
            let interface = cli.interface.unwrap_or_else(device::default_interface);
            debug!("looking up device interface {interface}");
            device::find_device_path(&interface)?
        }
    };
    let device = EcTestDevice::open(&path)?;

    match cli.command {
        Command::Eval {
            path,
            integers,
            strings,
        } => commands::eval(&device, &path, &integers, &strings),
        Command::Battery { scope } => commands::battery(&device, scope.as_deref()),
        Command::TripPoint { capacity, scope } => {
            commands::trip_point(&device, scope.as_deref(), capacity)
        }
        Command::Rtc { scope } => commands::rtc(&device, scope.as_deref()),
        Command::Temperature { path } => commands::temperature(&device, &path),
        Command::Fan {
            scope,
            zone,
            set_rpm,
        } => commands::fan(&device, scope.as_deref(), zone.as_deref(), set_rpm),
        Command::Notifications { count } => commands::notifications(&device, count),
        Command::Stats => commands::stats(&device),
    }
}
