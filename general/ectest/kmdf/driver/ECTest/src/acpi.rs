// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Access to the ACPI bus driver's `ACPI_INTERFACE_STANDARD2`, used here only
//! to receive `Notify()` codes for the device.

use core::ptr;

use ectest_shared::notify::{describe_notify_code, NotifyDisposition, NOTIFY_CODE_LEN};
use wdk::{nt_success, println};
use wdk_sys::{
    call_unsafe_wdf_function_binding,
    GUID,
    NTSTATUS,
    PVOID,
    STATUS_NOT_SUPPORTED,
    ULONG,
    USHORT,
    WDFDEVICE,
    WDFOBJECT,
    WDFREQUEST,
};

use crate::{queue, wdf_object_get_device_context};

// {E8695F63-1831-4870-A8CF-9C2F03F9DCB5}
const GUID_ACPI_INTERFACE_STANDARD2: GUID = GUID {
    Data1: 0xE869_5F63u32,
    Data2: 0x1831u16,
    Data3: 0x4870u16,
    Data4: [
        0xA8u8, 0xCFu8, 0x9Cu8, 0x2Fu8, 0x03u8, 0xF9u8, 0xDCu8, 0xB5u8,
    ],
};

const ACPI_INTERFACE_STANDARD2_VERSION: USHORT = 1;

#[allow(
    clippy::cast_possible_truncation,
    reason = "size_of::<AcpiInterfaceStandard2>() is known to fit in USHORT due to below const \
              assert"
)]
const ACPI_INTERFACE_STANDARD2_SIZE: USHORT = {
    const S: usize = core::mem::size_of::<AcpiInterfaceStandard2>();
    const {
        assert!(
            S <= USHORT::MAX as usize,
            "size_of::<AcpiInterfaceStandard2>() should fit in USHORT"
        );
    };
    S as USHORT
};

type InterfaceReference = unsafe extern "C" fn(context: PVOID);
type DeviceNotifyCallback = unsafe extern "C" fn(notification_context: PVOID, notify_code: ULONG);
type RegisterForDeviceNotifications = unsafe extern "C" fn(
    context: PVOID,
    notification_handler: Option<DeviceNotifyCallback>,
    notification_context: PVOID,
) -> NTSTATUS;
type UnregisterForDeviceNotifications = unsafe extern "C" fn(context: PVOID);

/// Layout of `ACPI_INTERFACE_STANDARD2` from `wdm.h`. The GPE routines are
/// kept as opaque pointers.
#[repr(C)]
#[allow(dead_code, reason = "fields are filled in by the ACPI driver")]
struct AcpiInterfaceStandard2 {
    size: USHORT,
    version: USHORT,
    context: PVOID,
    interface_reference: Option<InterfaceReference>,
    interface_dereference: Option<InterfaceReference>,
    gpe_connect_vector: PVOID,
    gpe_disconnect_vector: PVOID,
    gpe_enable_event: PVOID,
    gpe_disable_event: PVOID,
    gpe_clear_status: PVOID,
    register_for_device_notifications: Option<RegisterForDeviceNotifications>,
    unregister_for_device_notifications: Option<UnregisterForDeviceNotifications>,
}

impl AcpiInterfaceStandard2 {
    const fn empty() -> Self {
        Self {
            size: ACPI_INTERFACE_STANDARD2_SIZE,
            version: ACPI_INTERFACE_STANDARD2_VERSION,
            context: ptr::null_mut(),
            interface_reference: None,
            interface_dereference: None,
            gpe_connect_vector: ptr::null_mut(),
            gpe_disconnect_vector: ptr::null_mut(),
            gpe_enable_event: ptr::null_mut(),
            gpe_disable_event: ptr::null_mut(),
            gpe_clear_status: ptr::null_mut(),
            register_for_device_notifications: None,
            unregister_for_device_notifications: None,
        }
    }
}

/// A referenced `ACPI_INTERFACE_STANDARD2`. The reference is taken by
/// [`AcpiInterface::query`] and dropped by [`AcpiInterface::release`].
pub struct AcpiInterface {
    raw: AcpiInterfaceStandard2,
    acquired: bool,
}

impl AcpiInterface {
    pub const fn new() -> Self {
        Self {
            raw: AcpiInterfaceStandard2::empty(),
            acquired: false,
        }
    }

    pub const fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Asks the bus driver below `device` for the interface.
    ///
    /// # Safety
    ///
    /// `device` must be a valid framework device object and this must be
    /// called at `PASSIVE_LEVEL`.
    pub unsafe fn query(&mut self, device: WDFDEVICE) -> NTSTATUS {
        self.raw = AcpiInterfaceStandard2::empty();

        let nt_status = unsafe {
            call_unsafe_wdf_function_binding!(
                WdfFdoQueryForInterface,
                device,
                &GUID_ACPI_INTERFACE_STANDARD2,
                ptr::addr_of_mut!(self.raw).cast(),
                ACPI_INTERFACE_STANDARD2_SIZE,
                ACPI_INTERFACE_STANDARD2_VERSION,
                ptr::null_mut(),
            )
        };

        if nt_success(nt_status) {
            self.acquired = true;
        }
        nt_status
    }

    /// Routes the device's notify codes to `handler`. Only one handler can
    /// be registered per device.
    ///
    /// # Safety
    ///
    /// `context` must stay valid until [`Self::unregister_notifications`]
    /// returns.
    pub unsafe fn register_notifications(
        &self,
        handler: DeviceNotifyCallback,
        context: PVOID,
    ) -> NTSTATUS {
        match self.raw.register_for_device_notifications {
            Some(register) if self.acquired => unsafe {
                register(self.raw.context, Some(handler), context)
            },
            _ => STATUS_NOT_SUPPORTED,
        }
    }

    /// # Safety
    ///
    /// Must pair with a successful [`Self::register_notifications`].
    pub unsafe fn unregister_notifications(&self) {
        if let Some(unregister) = self.raw.unregister_for_device_notifications {
            if self.acquired {
                unsafe { unregister(self.raw.context) };
            }
        }
    }

    /// Drops the reference taken by [`Self::query`]. Does nothing if the
    /// interface was never acquired.
    ///
    /// # Safety
    ///
    /// Notifications must already be unregistered.
    pub unsafe fn release(&mut self) {
        if !self.acquired {
            return;
        }
        if let Some(dereference) = self.raw.interface_dereference {
            unsafe { dereference(self.raw.context) };
        }
        self.raw = AcpiInterfaceStandard2::empty();
        self.acquired = false;
    }
}

/// Called by the ACPI driver, at IRQL <= `DISPATCH_LEVEL`, whenever firmware
/// executes `Notify()` on the device.
///
/// A pending `IOCTL_ECTEST_WAIT_NOTIFICATION` request gets the code directly;
/// otherwise the code is kept in the ring for the next waiter.
///
/// # Arguments:
///
/// * `context` - the `WDFDEVICE` passed at registration.
/// * `notify_code` - the value firmware passed to `Notify()`.
pub unsafe extern "C" fn ectest_evt_acpi_notify(context: PVOID, notify_code: ULONG) {
    let device: WDFDEVICE = context.cast();
    let device_context = unsafe { wdf_object_get_device_context(device as WDFOBJECT) };

    println!(
        "ACPI notify {notify_code:#04X} ({})",
        describe_notify_code(notify_code)
    );

    let mut waiter: WDFREQUEST = ptr::null_mut();

    let disposition = unsafe {
        (*device_context).spin_lock.acquire();

        let nt_status = call_unsafe_wdf_function_binding!(
            WdfIoQueueRetrieveNextRequest,
            (*device_context).notification_queue,
            &mut waiter
        );
        if !nt_success(nt_status) {
            waiter = ptr::null_mut();
        }
        let disposition = (*device_context)
            .notifications
            .on_notify(notify_code, !waiter.is_null());

        (*device_context).spin_lock.release();
        disposition
    };

    if let NotifyDisposition::QueuedDropping(dropped) = disposition {
        println!("Notification ring full, dropped {dropped:#04X}");
    }

    if !waiter.is_null() {
        queue::ectest_complete_notification(waiter, notify_code);
    }
}

const _: () = assert!(NOTIFY_CODE_LEN == core::mem::size_of::<ULONG>());
