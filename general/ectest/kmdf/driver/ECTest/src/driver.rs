// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

use wdk::{nt_success, paged_code, println};
use wdk_sys::{
    call_unsafe_wdf_function_binding,
    ntddk::KeGetCurrentIrql,
    APC_LEVEL,
    DRIVER_OBJECT,
    NTSTATUS,
    PCUNICODE_STRING,
    PDRIVER_OBJECT,
    PWDFDEVICE_INIT,
    UNICODE_STRING,
    WDFDRIVER,
    WDFOBJECT,
    WDFSTRING,
    WDF_DRIVER_CONFIG,
    WDF_DRIVER_VERSION_AVAILABLE_PARAMS,
    WDF_NO_HANDLE,
    WDF_NO_OBJECT_ATTRIBUTES,
};

use crate::{device, WDF_DRIVER_CONFIG_SIZE, WDF_DRIVER_VERSION_AVAILABLE_PARAMS_SIZE};

extern crate alloc;

use alloc::{slice, string::String};

/// Framework version the driver is built against.
const KMDF_VERSION_MAJOR: u32 = 1;
const KMDF_VERSION_MINOR: u32 = 33;

/// `DriverEntry` is the first routine called after the driver is loaded. It
/// creates the framework driver object and registers `EvtDeviceAdd` and
/// `EvtDriverUnload`.
///
/// # Arguments
///
/// * `driver` - the driver object allocated by the system for this driver.
/// * `registry_path` - the driver's service key in the registry.
///
/// # Return value:
///
/// * the status of `WdfDriverCreate`.
#[link_section = "INIT"]
#[export_name = "DriverEntry"] // WDF expects a symbol with the name DriverEntry
extern "system" fn driver_entry(
    driver: &mut DRIVER_OBJECT,
    registry_path: PCUNICODE_STRING,
) -> NTSTATUS {
    let mut driver_config = WDF_DRIVER_CONFIG {
        Size: WDF_DRIVER_CONFIG_SIZE,
        EvtDriverDeviceAdd: Some(ectest_evt_device_add),
        EvtDriverUnload: Some(ectest_evt_driver_unload),
        ..WDF_DRIVER_CONFIG::default()
    };
    let mut driver_handle = WDF_NO_HANDLE as WDFDRIVER;

    let nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfDriverCreate,
            driver as PDRIVER_OBJECT,
            registry_path,
            WDF_NO_OBJECT_ATTRIBUTES,
            &mut driver_config,
            &mut driver_handle,
        )
    };

    if !nt_success(nt_status) {
        println!("Error: WdfDriverCreate failed {nt_status:#010X}");
        return nt_status;
    }

    match ectest_driver_version_string(driver_handle) {
        Ok(version) => println!("EC test driver {version}"),
        Err(nt_status) => println!("Error: driver version unavailable {nt_status:#010X}"),
    }
    if !ectest_framework_version_available(driver_handle) {
        println!("Warning: KMDF {KMDF_VERSION_MAJOR}.{KMDF_VERSION_MINOR} is not available");
    }

    nt_status
}

/// `EvtDeviceAdd` is called by the framework in response to `AddDevice`
/// from the `PnP` manager, once for every EC test device ACPI enumerates.
///
/// # Arguments:
///
/// * `_driver` - Handle to the framework driver object created in
///   `DriverEntry`
/// * `device_init` - Pointer to a framework-allocated `WDFDEVICE_INIT`
///   structure.
///
/// # Return value:
///
///   * `NTSTATUS`
#[link_section = "PAGE"]
extern "C" fn ectest_evt_device_add(_driver: WDFDRIVER, device_init: PWDFDEVICE_INIT) -> NTSTATUS {
    paged_code!();

    println!("Enter ectest_evt_device_add");

    let device_init =
        // SAFETY: WDF should always be providing a pointer that is properly aligned, dereferencable per https://doc.rust-lang.org/std/ptr/index.html#safety, and initialized. For the lifetime of the resulting reference, the pointed-to memory is never accessed through any other pointer.
        unsafe {
        device_init
            .as_mut()
            .expect("WDF should never provide a null pointer for device_init")
    };
    device::ectest_device_create(device_init)
}

#[link_section = "PAGE"]
extern "C" fn ectest_evt_driver_unload(_driver: WDFDRIVER) {
    paged_code!();

    println!("Enter ectest_evt_driver_unload");
}

/// Asks the framework for the version string it reports for `driver`. The
/// string object only lives for the duration of the call.
#[link_section = "INIT"]
fn ectest_driver_version_string(driver: WDFDRIVER) -> Result<String, NTSTATUS> {
    let mut string: WDFSTRING = core::ptr::null_mut();
    let nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfStringCreate,
            core::ptr::null_mut(),
            WDF_NO_OBJECT_ATTRIBUTES,
            &mut string
        )
    };
    if !nt_success(nt_status) {
        return Err(nt_status);
    }

    let nt_status = unsafe {
        call_unsafe_wdf_function_binding!(WdfDriverRetrieveVersionString, driver, string)
    };
    let version = if nt_success(nt_status) {
        Ok(wdf_string_to_string(string))
    } else {
        Err(nt_status)
    };

    unsafe {
        call_unsafe_wdf_function_binding!(WdfObjectDelete, string as WDFOBJECT);
    };
    version
}

#[link_section = "INIT"]
fn wdf_string_to_string(string: WDFSTRING) -> String {
    let mut unicode = UNICODE_STRING::default();
    unsafe {
        call_unsafe_wdf_function_binding!(WdfStringGetUnicodeString, string, &mut unicode);
    };
    if unicode.Buffer.is_null() {
        return String::new();
    }

    let units = usize::from(unicode.Length) / core::mem::size_of::<u16>();
    // SAFETY: the framework string owns `Length` bytes at `Buffer` until it
    // is deleted, which happens after this copy.
    String::from_utf16_lossy(unsafe { slice::from_raw_parts(unicode.Buffer, units) })
}

/// Whether the framework the driver is bound to provides the version it was
/// built against.
#[link_section = "INIT"]
fn ectest_framework_version_available(driver: WDFDRIVER) -> bool {
    let mut params = WDF_DRIVER_VERSION_AVAILABLE_PARAMS {
        Size: WDF_DRIVER_VERSION_AVAILABLE_PARAMS_SIZE,
        MajorVersion: KMDF_VERSION_MAJOR,
        MinorVersion: KMDF_VERSION_MINOR,
    };
    unsafe { call_unsafe_wdf_function_binding!(WdfDriverIsVersionAvailable, driver, &mut params) }
        != 0
}
