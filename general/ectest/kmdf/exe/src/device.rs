// Copyright (c) Microsoft Corporation
// License: MIT OR Apache-2.0

//! Handle to the EC test driver and the IOCTLs it serves.

use std::{ffi::c_void, fmt, ptr};

use anyhow::{bail, Context, Result};
use ectest_shared::{
    eval::{
        encode_request,
        required_output_length,
        AcpiValue,
        EvalError,
        EvalOutput,
        MethodArgument,
        MAX_METHOD_PATH_LEN,
    },
    ioctl::{IOCTL_ECTEST_QUERY_STATS, IOCTL_ECTEST_WAIT_NOTIFICATION},
    notify::{NotificationStats, NOTIFY_CODE_LEN},
    GUID_DEVINTERFACE_ECTEST,
};
use tracing::{debug, trace};
use uuid::Uuid;
use windows_sys::{
    core::GUID,
    Win32::{
        Devices::DeviceAndDriverInstallation::{
            CM_Get_Device_Interface_ListW,
            CM_Get_Device_Interface_List_SizeW,
            CM_GET_DEVICE_INTERFACE_LIST_PRESENT,
            CR_SUCCESS,
        },
        Foundation::{
            CloseHandle,
            GetLastError,
            ERROR_MORE_DATA,
            HANDLE,
            INVALID_HANDLE_VALUE,
            WIN32_ERROR,
        },
        Storage::FileSystem::{
            CreateFileW,
            FILE_GENERIC_READ,
            FILE_GENERIC_WRITE,
            FILE_SHARE_READ,
            FILE_SHARE_WRITE,
            OPEN_EXISTING,
        },
        System::IO::DeviceIoControl,
    },
};

/// First guess for an evaluation result; larger results are retried once
/// with the size the ACPI driver reports.
const INITIAL_OUTPUT_LEN: usize = 512;

/// Room for the longest path plus a few arguments.
const MAX_INPUT_LEN: usize = MAX_METHOD_PATH_LEN + 1024;

/// The interface class registered by the driver.
pub fn default_interface() -> Uuid {
    let guid = GUID_DEVINTERFACE_ECTEST;
    Uuid::from_fields(guid.data1, guid.data2, guid.data3, &guid.data4)
}

/// Returns the symbolic link of the first present device exposing
/// `interface`.
pub fn find_device_path(interface: &Uuid) -> Result<String> {
    let (data1, data2, data3, data4) = interface.as_fields();
    let guid = GUID {
        data1,
        data2,
        data3,
        data4: *data4,
    };

    let mut list_length: u32 = 0;
    // SAFETY: `list_length` and `guid` outlive the call; a null device id
    // asks for every device.
    let config_ret = unsafe {
        CM_Get_Device_Interface_List_SizeW(
            &mut list_length,
            &guid,
            ptr::null(),
            CM_GET_DEVICE_INTERFACE_LIST_PRESENT,
        )
    };
    if config_ret != CR_SUCCESS {
        bail!("Error 0x{config_ret:08X} retrieving device interface list size");
    }
    if list_length <= 1 {
        bail!("No active {interface} device interfaces found. Is the EC test driver loaded?");
    }

    let mut buffer: Vec<u16> = vec![0; usize::try_from(list_length)?];
    // SAFETY: `buffer` holds `list_length` UTF-16 units as the size query
    // requested.
    let config_ret = unsafe {
        CM_Get_Device_Interface_ListW(
            &guid,
            ptr::null(),
            buffer.as_mut_ptr(),
            list_length,
            CM_GET_DEVICE_INTERFACE_LIST_PRESENT,
        )
    };
    if config_ret != CR_SUCCESS {
        bail!("Error 0x{config_ret:08X} retrieving device interface list");
    }

    first_multi_sz_entry(&buffer).context("device interface list is empty")
}

/// First string of a `REG_MULTI_SZ` style list.
fn first_multi_sz_entry(list: &[u16]) -> Option<String> {
    let end = list.iter().position(|c| *c == 0).unwrap_or(list.len());
    if end == 0 {
        return None;
    }
    String::from_utf16(&list[..end]).ok()
}

/// A failed `DeviceIoControl`, with whatever the driver returned anyway.
#[derive(Debug)]
struct IoctlFailure {
    error: WIN32_ERROR,
    returned: usize,
}

impl fmt::Display for IoctlFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceIoControl failed with error {}", self.error)
    }
}

impl std::error::Error for IoctlFailure {}

/// Output size for the second attempt after `ERROR_MORE_DATA`, read from
/// the header the ACPI driver copied into the first `output` buffer.
fn retry_output_len(output: &[u8], returned: usize) -> Result<usize, EvalError> {
    required_output_length(&output[..returned.min(output.len())])
}

pub struct EcTestDevice {
    handle: HANDLE,
    path: String,
}

impl EcTestDevice {
    pub fn open(path: &str) -> Result<Self> {
        let wide: Vec<u16> = path.encode_utf16().chain(Some(0)).collect();

        // SAFETY: `wide` is NUL terminated and outlives the call.
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                FILE_GENERIC_READ | FILE_GENERIC_WRITE,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null(),
                OPEN_EXISTING,
                0,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            // SAFETY: reads the calling thread's last error value.
            let error = unsafe { GetLastError() };
            bail!("Failed to open {path}. Error {error}");
        }

        debug!("opened {path}");
        Ok(Self {
            handle,
            path: path.to_owned(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn ioctl(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize, IoctlFailure> {
        let input_len = u32::try_from(input.len()).unwrap_or(u32::MAX);
        let output_len = u32::try_from(output.len()).unwrap_or(u32::MAX);
        let mut returned: u32 = 0;

        trace!("DeviceIoControl {code:#010X}, {input_len} bytes in, {output_len} bytes out");
        // SAFETY: both buffers are valid for the lengths passed and the
        // handle was opened without FILE_FLAG_OVERLAPPED, so the call
        // completes before returning.
        let ok = unsafe {
            DeviceIoControl(
                self.handle,
                code,
                if input.is_empty() {
                    ptr::null()
                } else {
                    input.as_ptr().cast::<c_void>()
                },
                input_len,
                output.as_mut_ptr().cast::<c_void>(),
                output_len,
                &mut returned,
                ptr::null_mut(),
            )
        };
        let returned = returned as usize;

        if ok == 0 {
            // SAFETY: reads the calling thread's last error value.
            let error = unsafe { GetLastError() };
            return Err(IoctlFailure { error, returned });
        }
        Ok(returned)
    }

    /// Evaluates `path` below the device with `arguments`.
    pub fn eval(&self, path: &str, arguments: &[MethodArgument<'_>]) -> Result<Vec<AcpiValue>> {
        let mut input = vec![0u8; MAX_INPUT_LEN];
        let (ioctl, input_len) = encode_request(path, arguments, &mut input)
            .with_context(|| format!("encoding evaluation of {path}"))?;
        input.truncate(input_len);
        let code = ioctl.code();

        let mut output = vec![0u8; INITIAL_OUTPUT_LEN];
        let returned = match self.ioctl(code, &input, &mut output) {
            Ok(returned) => returned,
            Err(failure) if failure.error == ERROR_MORE_DATA => {
                let needed = retry_output_len(&output, failure.returned)
                    .with_context(|| format!("{path}: result too large and no size reported"))?;
                debug!(needed, "retrying {path} with a larger output buffer");
                output.resize(needed, 0);
                self.ioctl(code, &input, &mut output)
                    .with_context(|| format!("evaluating {path}"))?
            }
            Err(failure) => return Err(failure).with_context(|| format!("evaluating {path}")),
        };

        let result = EvalOutput::parse(&output[..returned])
            .with_context(|| format!("parsing result of {path}"))?;
        result
            .values()
            .with_context(|| format!("decoding result of {path}"))
    }

    /// Blocks until the driver hands out a notify code.
    pub fn wait_notification(&self) -> Result<u32> {
        let mut output = [0u8; NOTIFY_CODE_LEN];
        let returned = self
            .ioctl(IOCTL_ECTEST_WAIT_NOTIFICATION, &[], &mut output)
            .context("waiting for a notification")?;
        if returned != NOTIFY_CODE_LEN {
            bail!("driver returned {returned} bytes for a notify code");
        }
        Ok(u32::from_le_bytes(output))
    }

    pub fn query_stats(&self) -> Result<NotificationStats> {
        let mut output = [0u8; NotificationStats::LEN];
        let returned = self
            .ioctl(IOCTL_ECTEST_QUERY_STATS, &[], &mut output)
            .context("querying notification counters")?;
        NotificationStats::from_bytes(&output[..returned])
            .with_context(|| format!("driver returned {returned} bytes of counters"))
    }
}

impl Drop for EcTestDevice {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful CreateFileW and is closed
        // only here.
        unsafe { CloseHandle(self.handle) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_sz_first_entry() {
        let list: Vec<u16> = "\\\\?\\ACPI#ECT0001#0#{guid}\0second\0\0".encode_utf16().collect();
        assert_eq!(
            first_multi_sz_entry(&list).as_deref(),
            Some("\\\\?\\ACPI#ECT0001#0#{guid}")
        );
        assert_eq!(first_multi_sz_entry(&[0, 0]), None);
    }

    #[test]
    fn retry_size_needs_a_whole_output_header() {
        let returned = AcpiValue::encode_output(&[AcpiValue::Buffer(vec![0xA5; 600])]);
        let mut output = vec![0u8; INITIAL_OUTPUT_LEN];
        output.copy_from_slice(&returned[..INITIAL_OUTPUT_LEN]);

        assert_eq!(retry_output_len(&output, 12), Ok(returned.len()));
        // A byte count past the buffer is clamped rather than trusted.
        assert_eq!(retry_output_len(&output, usize::MAX), Ok(returned.len()));
        assert!(matches!(
            retry_output_len(&output, 6),
            Err(EvalError::BufferTooSmall { needed: 12, available: 6 })
        ));

        output[..4].copy_from_slice(b"Junk");
        assert!(matches!(
            retry_output_len(&output, 12),
            Err(EvalError::BadSignature(_))
        ));
    }

    #[test]
    fn default_interface_matches_shared_guid() {
        assert_eq!(
            default_interface().to_string(),
            "5362ad97-8a56-4b4f-b6b4-3d1c0e1b0f42"
        );
    }
}
