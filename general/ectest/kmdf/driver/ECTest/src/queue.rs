// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

use core::{ptr, slice};

use ectest_shared::{
    eval::{validate_eval_input, OUTPUT_HEADER_LEN},
    ioctl::Ioctl,
    notify::{NotificationStats, WaitDisposition, NOTIFY_CODE_LEN},
};
use wdk::{nt_success, paged_code, println};
use wdk_sys::{
    call_unsafe_wdf_function_binding,
    ntddk::KeGetCurrentIrql,
    APC_LEVEL,
    NTSTATUS,
    PVOID,
    STATUS_BUFFER_TOO_SMALL,
    STATUS_CANCELLED,
    STATUS_INVALID_DEVICE_REQUEST,
    STATUS_INVALID_PARAMETER,
    STATUS_NOT_SUPPORTED,
    STATUS_SUCCESS,
    ULONG,
    WDFDEVICE,
    WDFOBJECT,
    WDFQUEUE,
    WDFREQUEST,
    WDF_IO_QUEUE_CONFIG,
    WDF_NO_HANDLE,
    WDF_NO_OBJECT_ATTRIBUTES,
    WDF_REQUEST_SEND_OPTIONS,
    _WDF_IO_QUEUE_DISPATCH_TYPE,
    _WDF_REQUEST_SEND_OPTIONS_FLAGS::WDF_REQUEST_SEND_OPTION_SEND_AND_FORGET,
    _WDF_TRI_STATE,
};

use crate::{
    wdf_object_get_device_context,
    DeviceContext,
    WDF_IO_QUEUE_CONFIG_SIZE,
    WDF_REQUEST_SEND_OPTIONS_SIZE,
};

/// Creates the two queues of the device.
///
/// The default queue is parallel: evaluation requests are handed down to the
/// ACPI driver immediately and never held here. Wait requests that cannot be
/// satisfied at once are parked in a manual queue that is not power managed,
/// so a parked wait survives the device leaving D0.
///
/// # Arguments:
///
/// * `device` - Handle to a framework device object.
///
/// # Return value:
///
/// * the manual notification queue, or the failing `NTSTATUS`.
#[link_section = "PAGE"]
pub unsafe fn ectest_queue_initialize(device: WDFDEVICE) -> Result<WDFQUEUE, NTSTATUS> {
    paged_code!();

    let mut queue = WDF_NO_HANDLE as WDFQUEUE;
    let mut queue_config = WDF_IO_QUEUE_CONFIG {
        Size: WDF_IO_QUEUE_CONFIG_SIZE,
        PowerManaged: _WDF_TRI_STATE::WdfUseDefault,
        DefaultQueue: u8::from(true),
        DispatchType: _WDF_IO_QUEUE_DISPATCH_TYPE::WdfIoQueueDispatchParallel,
        EvtIoDeviceControl: Some(ectest_evt_io_device_control),
        ..WDF_IO_QUEUE_CONFIG::default()
    };

    let nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfIoQueueCreate,
            device,
            &mut queue_config,
            WDF_NO_OBJECT_ATTRIBUTES,
            &mut queue
        )
    };
    if !nt_success(nt_status) {
        println!("WdfIoQueueCreate for default queue failed {nt_status:#010X}");
        return Err(nt_status);
    }

    let mut notification_queue = WDF_NO_HANDLE as WDFQUEUE;
    let mut queue_config = WDF_IO_QUEUE_CONFIG {
        Size: WDF_IO_QUEUE_CONFIG_SIZE,
        PowerManaged: _WDF_TRI_STATE::WdfFalse,
        DispatchType: _WDF_IO_QUEUE_DISPATCH_TYPE::WdfIoQueueDispatchManual,
        ..WDF_IO_QUEUE_CONFIG::default()
    };

    let nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfIoQueueCreate,
            device,
            &mut queue_config,
            WDF_NO_OBJECT_ATTRIBUTES,
            &mut notification_queue
        )
    };
    if !nt_success(nt_status) {
        println!("WdfIoQueueCreate for notification queue failed {nt_status:#010X}");
        return Err(nt_status);
    }

    Ok(notification_queue)
}

/// This event is invoked when the framework receives
/// `IRP_MJ_DEVICE_CONTROL` on the default queue.
///
/// # Arguments:
///
/// * `queue` - Handle to the framework queue object that is associated with the
///   I/O request.
/// * `request` - Handle to a framework request object.
/// * `output_buffer_length` - length of the request's output buffer.
/// * `input_buffer_length` - length of the request's input buffer.
/// * `io_control_code` - the driver-defined or system-defined I/O control code.
///
/// # Return value:
///
/// * `VOID`
extern "C" fn ectest_evt_io_device_control(
    queue: WDFQUEUE,
    request: WDFREQUEST,
    output_buffer_length: usize,
    input_buffer_length: usize,
    io_control_code: ULONG,
) {
    match Ioctl::from_code(io_control_code) {
        Some(ioctl) if ioctl.is_acpi_eval() => {
            ectest_forward_acpi_eval(queue, request, ioctl, output_buffer_length, input_buffer_length);
        }
        Some(Ioctl::WaitNotification) => ectest_wait_notification(queue, request, output_buffer_length),
        Some(Ioctl::QueryStats) => ectest_query_stats(queue, request, output_buffer_length),
        _ => {
            println!("Unsupported IOCTL {io_control_code:#010X}");
            complete(request, STATUS_INVALID_DEVICE_REQUEST, 0);
        }
    }
}

fn complete(request: WDFREQUEST, nt_status: NTSTATUS, information: usize) {
    unsafe {
        call_unsafe_wdf_function_binding!(
            WdfRequestCompleteWithInformation,
            request,
            nt_status,
            information as u64
        );
    }
}

/// Validates an ACPI evaluation request and sends it to the ACPI driver,
/// which owns it from then on.
fn ectest_forward_acpi_eval(
    queue: WDFQUEUE,
    request: WDFREQUEST,
    ioctl: Ioctl,
    output_buffer_length: usize,
    input_buffer_length: usize,
) {
    if output_buffer_length < OUTPUT_HEADER_LEN {
        println!("ACPI eval output buffer too small: {output_buffer_length}");
        complete(request, STATUS_BUFFER_TOO_SMALL, 0);
        return;
    }

    let mut input: PVOID = ptr::null_mut();
    let mut length: usize = 0;
    let nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfRequestRetrieveInputBuffer,
            request,
            input_buffer_length.min(core::mem::size_of::<u32>()),
            &mut input,
            &mut length
        )
    };
    if !nt_success(nt_status) || input.is_null() {
        println!("WdfRequestRetrieveInputBuffer failed {nt_status:#010X}");
        complete(request, STATUS_INVALID_PARAMETER, 0);
        return;
    }

    // SAFETY: the framework guarantees `length` readable bytes at `input` for
    // as long as the request is owned by this driver.
    let input = unsafe { slice::from_raw_parts(input.cast::<u8>(), length) };
    match validate_eval_input(ioctl, input) {
        Ok(eval) => println!(
            "Evaluating {} with {} argument(s)",
            core::str::from_utf8(eval.path).unwrap_or("<non-ascii>"),
            eval.argument_count
        ),
        Err(err) => {
            println!("Rejecting ACPI eval request: {err}");
            complete(request, STATUS_INVALID_PARAMETER, 0);
            return;
        }
    }

    let mut options = WDF_REQUEST_SEND_OPTIONS {
        Size: WDF_REQUEST_SEND_OPTIONS_SIZE,
        Flags: WDF_REQUEST_SEND_OPTION_SEND_AND_FORGET as ULONG,
        ..WDF_REQUEST_SEND_OPTIONS::default()
    };

    let sent = unsafe {
        let device = call_unsafe_wdf_function_binding!(WdfIoQueueGetDevice, queue);
        let io_target = call_unsafe_wdf_function_binding!(WdfDeviceGetIoTarget, device);
        call_unsafe_wdf_function_binding!(WdfRequestSend, request, io_target, &mut options)
    };

    if sent == 0 {
        let nt_status = unsafe { call_unsafe_wdf_function_binding!(WdfRequestGetStatus, request) };
        println!("WdfRequestSend failed {nt_status:#010X}");
        complete(request, nt_status, 0);
    }
}

enum WaitOutcome {
    Deliver(u32),
    Parked,
    Fail(NTSTATUS),
}

/// Returns the oldest buffered notify code, or parks the request in the
/// notification queue until `ectest_evt_acpi_notify` completes it.
fn ectest_wait_notification(queue: WDFQUEUE, request: WDFREQUEST, output_buffer_length: usize) {
    if output_buffer_length < NOTIFY_CODE_LEN {
        complete(request, STATUS_BUFFER_TOO_SMALL, 0);
        return;
    }

    let device = unsafe { call_unsafe_wdf_function_binding!(WdfIoQueueGetDevice, queue) };
    let device_context = unsafe { wdf_object_get_device_context(device as WDFOBJECT) };

    let outcome = unsafe {
        (*device_context).spin_lock.acquire();

        let outcome = match (*device_context).notifications.on_wait() {
            WaitDisposition::Deliver(code) => WaitOutcome::Deliver(code),
            WaitDisposition::Park => {
                // Forwarding under the lock keeps a notify arriving right now
                // from missing this request.
                let nt_status = call_unsafe_wdf_function_binding!(
                    WdfRequestForwardToIoQueue,
                    request,
                    (*device_context).notification_queue
                );
                if nt_success(nt_status) {
                    WaitOutcome::Parked
                } else {
                    WaitOutcome::Fail(nt_status)
                }
            }
            WaitDisposition::Unsupported => WaitOutcome::Fail(STATUS_NOT_SUPPORTED),
        };

        (*device_context).spin_lock.release();
        outcome
    };

    match outcome {
        WaitOutcome::Deliver(code) => ectest_complete_notification(request, code),
        WaitOutcome::Parked => {}
        WaitOutcome::Fail(nt_status) => {
            println!("Wait for notification failed {nt_status:#010X}");
            complete(request, nt_status, 0);
        }
    }
}

/// Completes a wait request with `code` in its output buffer.
pub fn ectest_complete_notification(request: WDFREQUEST, code: u32) {
    let mut buffer: PVOID = ptr::null_mut();
    let nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfRequestRetrieveOutputBuffer,
            request,
            NOTIFY_CODE_LEN,
            &mut buffer,
            ptr::null_mut()
        )
    };
    if !nt_success(nt_status) {
        println!("Notify code {code:#04X} lost, WdfRequestRetrieveOutputBuffer failed {nt_status:#010X}");
        complete(request, nt_status, 0);
        return;
    }

    let bytes = code.to_le_bytes();
    // SAFETY: the output buffer holds at least NOTIFY_CODE_LEN bytes.
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.cast::<u8>(), bytes.len()) };
    complete(request, STATUS_SUCCESS, bytes.len());
}

fn ectest_query_stats(queue: WDFQUEUE, request: WDFREQUEST, output_buffer_length: usize) {
    if output_buffer_length < NotificationStats::LEN {
        complete(request, STATUS_BUFFER_TOO_SMALL, 0);
        return;
    }

    let device = unsafe { call_unsafe_wdf_function_binding!(WdfIoQueueGetDevice, queue) };
    let device_context = unsafe { wdf_object_get_device_context(device as WDFOBJECT) };

    let stats = unsafe {
        (*device_context).spin_lock.acquire();
        let stats = (*device_context).notifications.stats();
        (*device_context).spin_lock.release();
        stats
    };

    let mut buffer: PVOID = ptr::null_mut();
    let nt_status = unsafe {
        call_unsafe_wdf_function_binding!(
            WdfRequestRetrieveOutputBuffer,
            request,
            NotificationStats::LEN,
            &mut buffer,
            ptr::null_mut()
        )
    };
    if !nt_success(nt_status) {
        println!("WdfRequestRetrieveOutputBuffer failed {nt_status:#010X}");
        complete(request, nt_status, 0);
        return;
    }

    let bytes = stats.to_bytes();
    // SAFETY: the output buffer holds at least NotificationStats::LEN bytes.
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.cast::<u8>(), bytes.len()) };
    complete(request, STATUS_SUCCESS, bytes.len());
}

/// Sets whether ACPI notifications reach this device and returns the previous
/// setting. Takes the spin lock, so it must stay out of the pageable
/// PnP callbacks that call it.
///
/// # Safety
///
/// `device_context` must be the initialized context of a live device.
pub unsafe fn ectest_set_notifications_registered(
    device_context: *mut DeviceContext,
    registered: bool,
) -> bool {
    unsafe {
        (*device_context).spin_lock.acquire();
        let was_registered = (*device_context)
            .notifications
            .set_registered(registered);
        (*device_context).spin_lock.release();
        was_registered
    }
}

/// Completes every wait request still parked in `notification_queue` with
/// `STATUS_CANCELLED`. Used once notifications can no longer arrive.
pub fn ectest_cancel_pending_waits(notification_queue: WDFQUEUE) {
    loop {
        let mut request: WDFREQUEST = ptr::null_mut();
        let nt_status = unsafe {
            call_unsafe_wdf_function_binding!(
                WdfIoQueueRetrieveNextRequest,
                notification_queue,
                &mut request
            )
        };
        if !nt_success(nt_status) {
            break;
        }
        complete(request, STATUS_CANCELLED, 0);
    }
}
