// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! # Abstract
//!
//!    This driver is the ACPI bridge of the embedded controller test
//!    application. It binds to the EC test device enumerated by ACPI and
//!    exposes a device interface through which user mode can:
//!
//!    * evaluate ACPI control methods below the device (`_BST`, `_BIX`,
//!      `_GRT`, ...). Evaluation requests are validated and then handed to
//!      the ACPI bus driver underneath, which completes them.
//!    * wait for `Notify()` codes raised by firmware on the device. Codes are
//!      received through `ACPI_INTERFACE_STANDARD2` and either complete a
//!      pended wait request or are buffered until one arrives.
//!    * read counters describing the notification traffic.
//!
//!    The notification buffer, the counters and the hand-off to the manual
//!    queue are guarded by a single spin lock in the device context, since
//!    notifications can arrive at `DISPATCH_LEVEL` concurrently with requests
//!    on the parallel default queue.

#![no_std]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::missing_safety_doc)]

mod acpi;
mod device;
mod driver;
mod queue;

#[cfg(not(test))]
extern crate wdk_panic;

use ectest_shared::notify::{NotificationState, NOTIFICATION_RING_CAPACITY};
use wdk::wdf;
#[cfg(not(test))]
use wdk_alloc::WdkAllocator;
use wdk_sys::{
    GUID,
    ULONG,
    WDFQUEUE,
    WDF_DRIVER_CONFIG,
    WDF_DRIVER_VERSION_AVAILABLE_PARAMS,
    WDF_IO_QUEUE_CONFIG,
    WDF_OBJECT_ATTRIBUTES,
    WDF_OBJECT_CONTEXT_TYPE_INFO,
    WDF_PNPPOWER_EVENT_CALLBACKS,
    WDF_REQUEST_SEND_OPTIONS,
};
mod wdf_object_context;

use wdf_object_context::wdf_declare_context_type;

#[cfg(not(test))]
#[global_allocator]
static GLOBAL_ALLOCATOR: WdkAllocator = WdkAllocator;

const GUID_DEVINTERFACE_ECTEST: GUID = {
    let guid = ectest_shared::GUID_DEVINTERFACE_ECTEST;
    GUID {
        Data1: guid.data1,
        Data2: guid.data2,
        Data3: guid.data3,
        Data4: guid.data4,
    }
};

// ====== CONTEXT SETUP ========//

/// Per device state. `notifications` is only touched with `spin_lock` held
/// once the device has been created.
pub struct DeviceContext {
    acpi: acpi::AcpiInterface,
    notification_queue: WDFQUEUE,
    spin_lock: wdf::SpinLock,
    notifications: NotificationState<NOTIFICATION_RING_CAPACITY>,
}
wdf_declare_context_type!(DeviceContext);

// None of the below SIZE constants should be needed after an equivalent `WDF_STRUCTURE_SIZE` macro is added to `wdk-sys`: https://github.com/microsoft/windows-drivers-rs/issues/242

macro_rules! wdf_structure_size {
    ($($name:ident => $ty:ty),+ $(,)?) => {
        $(
            #[allow(
                clippy::cast_possible_truncation,
                reason = "the structure size is known to fit in ULONG due to below const assert"
            )]
            const $name: ULONG = {
                const S: usize = core::mem::size_of::<$ty>();
                const {
                    assert!(
                        S <= ULONG::MAX as usize,
                        concat!("size_of::<", stringify!($ty), ">() should fit in ULONG")
                    );
                };
                S as ULONG
            };
        )+
    };
}

wdf_structure_size! {
    WDF_DRIVER_CONFIG_SIZE => WDF_DRIVER_CONFIG,
    WDF_DRIVER_VERSION_AVAILABLE_PARAMS_SIZE => WDF_DRIVER_VERSION_AVAILABLE_PARAMS,
    WDF_IO_QUEUE_CONFIG_SIZE => WDF_IO_QUEUE_CONFIG,
    WDF_OBJECT_ATTRIBUTES_SIZE => WDF_OBJECT_ATTRIBUTES,
    WDF_OBJECT_CONTEXT_TYPE_INFO_SIZE => WDF_OBJECT_CONTEXT_TYPE_INFO,
    WDF_PNPPOWER_EVENT_CALLBACKS_SIZE => WDF_PNPPOWER_EVENT_CALLBACKS,
    WDF_REQUEST_SEND_OPTIONS_SIZE => WDF_REQUEST_SEND_OPTIONS,
}
