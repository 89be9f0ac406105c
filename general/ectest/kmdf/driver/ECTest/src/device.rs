// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

use ectest_shared::notify::NotificationState;
use wdk::{nt_success, paged_code, println, wdf};
use wdk_sys::{
    call_unsafe_wdf_function_binding,
    ntddk::KeGetCurrentIrql,
    APC_LEVEL,
    NTSTATUS,
    STATUS_SUCCESS,
    WDFCMRESLIST,
    WDFDEVICE,
    WDFDEVICE_INIT,
    WDFOBJECT,
    WDF_NO_HANDLE,
    WDF_PNPPOWER_EVENT_CALLBACKS,
};

use crate::{
    acpi,
    queue,
    wdf_object_context::{object_attributes, wdf_get_context_type_info},
    wdf_object_get_device_context,
    DeviceContext,
    GUID_DEVINTERFACE_ECTEST,
    WDF_DEVICE_CONTEXT_TYPE_INFO,
    WDF_PNPPOWER_EVENT_CALLBACKS_SIZE,
};

/// Worker routine called to create a device and its software resources.
///
/// # Arguments:
///
/// * `device_init` - Pointer to an opaque init structure. Memory for this
///   structure will be freed by the framework when the `WdfDeviceCreate`
///   succeeds. So don't access the structure after that point.
///
/// # Return value:
///
/// * `NTSTATUS`
#[link_section = "PAGE"]
pub fn ectest_device_create(device_init: &mut WDFDEVICE_INIT) -> NTSTATUS {
    paged_code!();

    let mut device_init: *mut WDFDEVICE_INIT = device_init;

    let mut pnp_power_callbacks = WDF_PNPPOWER_EVENT_CALLBACKS {
        Size: WDF_PNPPOWER_EVENT_CALLBACKS_SIZE,
        EvtDevicePrepareHardware: Some(ectest_evt_device_prepare_hardware),
        EvtDeviceReleaseHardware: Some(ectest_evt_device_release_hardware),
        ..WDF_PNPPOWER_EVENT_CALLBACKS::default()
    };

    unsafe {
        call_unsafe_wdf_function_binding!(
            WdfDeviceInitSetPnpPowerEventCallbacks,
            device_init,
            &mut pnp_power_callbacks
        );
    }

    let mut attributes = object_attributes(
        wdf_get_context_type_info!(DeviceContext),
        core::ptr::null_mut(),
    );
    let mut device = WDF_NO_HANDLE as WDFDEVICE;

    let nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfDeviceCreate,
            &mut device_init,
            &mut attributes,
            &mut device,
        )
    };
    if !nt_success(nt_status) {
        println!("Error: WdfDeviceCreate failed {nt_status:#010X}");
        return nt_status;
    }

    // The lock is parented to the device so it lives exactly as long as the
    // context that holds it.
    let mut attributes = object_attributes(core::ptr::null(), device as WDFOBJECT);
    let spin_lock = match wdf::SpinLock::create(&mut attributes) {
        Ok(spin_lock) => spin_lock,
        Err(nt_status) => {
            println!("SpinLock create failed {nt_status:#010X}");
            return nt_status;
        }
    };

    let notification_queue = match unsafe { queue::ectest_queue_initialize(device) } {
        Ok(notification_queue) => notification_queue,
        Err(nt_status) => return nt_status,
    };

    let device_context = unsafe { wdf_object_get_device_context(device as WDFOBJECT) };
    // SAFETY: the framework allocated and zeroed the context with the device;
    // no callback can observe it before EvtDeviceAdd returns.
    unsafe {
        device_context.write(DeviceContext {
            acpi: acpi::AcpiInterface::new(),
            notification_queue,
            spin_lock,
            notifications: NotificationState::new(),
        });
    }

    let nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfDeviceCreateDeviceInterface,
            device,
            &GUID_DEVINTERFACE_ECTEST,
            core::ptr::null(),
        )
    };
    if !nt_success(nt_status) {
        println!("Error: WdfDeviceCreateDeviceInterface failed {nt_status:#010X}");
        return nt_status;
    }

    STATUS_SUCCESS
}

/// Acquires `ACPI_INTERFACE_STANDARD2` and subscribes to the device's notify
/// codes. Without the interface the device still evaluates methods, so every
/// failure here is logged and the device is started anyway.
#[link_section = "PAGE"]
extern "C" fn ectest_evt_device_prepare_hardware(
    device: WDFDEVICE,
    _resources_raw: WDFCMRESLIST,
    _resources_translated: WDFCMRESLIST,
) -> NTSTATUS {
    paged_code!();

    let device_context = unsafe { wdf_object_get_device_context(device as WDFOBJECT) };

    let nt_status = unsafe { (*device_context).acpi.query(device) };
    if !nt_success(nt_status) {
        println!("ACPI_INTERFACE_STANDARD2 unavailable {nt_status:#010X}, notifications disabled");
        return STATUS_SUCCESS;
    }

    let nt_status = unsafe {
        (*device_context)
            .acpi
            .register_notifications(acpi::ectest_evt_acpi_notify, device.cast())
    };
    if !nt_success(nt_status) {
        println!("RegisterForDeviceNotifications failed {nt_status:#010X}");
        unsafe { (*device_context).acpi.release() };
        return STATUS_SUCCESS;
    }

    unsafe { queue::ectest_set_notifications_registered(device_context, true) };

    println!("Registered for ACPI notifications");
    STATUS_SUCCESS
}

/// Undoes `ectest_evt_device_prepare_hardware`. Waiters parked in the
/// notification queue are cancelled since nothing can complete them anymore.
#[link_section = "PAGE"]
extern "C" fn ectest_evt_device_release_hardware(
    device: WDFDEVICE,
    _resources_translated: WDFCMRESLIST,
) -> NTSTATUS {
    paged_code!();

    let device_context = unsafe { wdf_object_get_device_context(device as WDFOBJECT) };

    let was_registered =
        unsafe { queue::ectest_set_notifications_registered(device_context, false) };

    unsafe {
        if was_registered {
            (*device_context).acpi.unregister_notifications();
        }
        if (*device_context).acpi.is_acquired() {
            (*device_context).acpi.release();
        }
    }

    queue::ectest_cancel_pending_waits(unsafe { (*device_context).notification_queue });

    STATUS_SUCCESS
}
