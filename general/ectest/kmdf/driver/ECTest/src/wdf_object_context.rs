// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Rust counterparts of the `WDF_DECLARE_CONTEXT_TYPE` family of macros and
//! of `WDF_OBJECT_ATTRIBUTES_INIT`.

use wdk_sys::{
    PCWDF_OBJECT_CONTEXT_TYPE_INFO,
    WDFOBJECT,
    WDF_OBJECT_ATTRIBUTES,
    WDF_OBJECT_CONTEXT_TYPE_INFO,
    _WDF_EXECUTION_LEVEL,
    _WDF_SYNCHRONIZATION_SCOPE,
};

use crate::WDF_OBJECT_ATTRIBUTES_SIZE;

#[repr(transparent)]
pub struct WDFObjectContextTypeInfo(WDF_OBJECT_CONTEXT_TYPE_INFO);
// SAFETY: The wrapped type info is immutable after construction and only
// handed to the framework by address.
unsafe impl Sync for WDFObjectContextTypeInfo {}

impl WDFObjectContextTypeInfo {
    pub const fn new(inner: WDF_OBJECT_CONTEXT_TYPE_INFO) -> Self {
        Self(inner)
    }

    pub const fn get_unique_type(&self) -> PCWDF_OBJECT_CONTEXT_TYPE_INFO {
        let inner = (self as *const Self).cast::<WDF_OBJECT_CONTEXT_TYPE_INFO>();
        // SAFETY: This dereference is sound since the underlying
        // WDF_OBJECT_CONTEXT_TYPE_INFO is guaranteed to have the same memory
        // layout as WDFObjectContextTypeInfo since WDFObjectContextTypeInfo is
        // declared as repr(transparent)
        unsafe { *inner }.UniqueType
    }
}

/// Attributes for an object with inherited execution level and
/// synchronization scope, optionally carrying a typed context and a parent.
pub fn object_attributes(
    context_type_info: PCWDF_OBJECT_CONTEXT_TYPE_INFO,
    parent: WDFOBJECT,
) -> WDF_OBJECT_ATTRIBUTES {
    WDF_OBJECT_ATTRIBUTES {
        Size: WDF_OBJECT_ATTRIBUTES_SIZE,
        ExecutionLevel: _WDF_EXECUTION_LEVEL::WdfExecutionLevelInheritFromParent,
        SynchronizationScope: _WDF_SYNCHRONIZATION_SCOPE::WdfSynchronizationScopeInheritFromParent,
        ContextTypeInfo: context_type_info,
        ParentObject: parent,
        ..WDF_OBJECT_ATTRIBUTES::default()
    }
}

macro_rules! wdf_get_context_type_info {
    ($context_type:ident) => {
        paste::paste! {
            [<WDF_ $context_type:snake:upper _TYPE_INFO>].get_unique_type()
        }
    };
}

pub(crate) use wdf_get_context_type_info;

macro_rules! wdf_declare_context_type_with_name {
    ($context_type:ident , $casting_function:ident) => {
        paste::paste! {
            #[link_section = ".data"]
            pub static [<WDF_ $context_type:snake:upper _TYPE_INFO>]: crate::wdf_object_context::WDFObjectContextTypeInfo =
                crate::wdf_object_context::WDFObjectContextTypeInfo::new(wdk_sys::WDF_OBJECT_CONTEXT_TYPE_INFO {
                    Size: crate::WDF_OBJECT_CONTEXT_TYPE_INFO_SIZE,
                    ContextName: concat!(stringify!($context_type), '\0').as_bytes().as_ptr().cast(),
                    ContextSize: core::mem::size_of::<$context_type>(),
                    UniqueType: core::ptr::addr_of!([<WDF_ $context_type:snake:upper _TYPE_INFO>])
                        .cast::<wdk_sys::WDF_OBJECT_CONTEXT_TYPE_INFO>(),
                    EvtDriverGetUniqueContextType: None,
                });

            /// Returns the typed context of `handle`. The pointer is valid
            /// for the lifetime of the framework object.
            pub unsafe fn $casting_function(handle: wdk_sys::WDFOBJECT) -> *mut $context_type {
                unsafe {
                    wdk_sys::call_unsafe_wdf_function_binding!(
                        WdfObjectGetTypedContextWorker,
                        handle,
                        crate::wdf_object_context::wdf_get_context_type_info!($context_type),
                    ).cast()
                }
            }
        }
    };
}

pub(crate) use wdf_declare_context_type_with_name;

macro_rules! wdf_declare_context_type {
    ($context_type:ident) => {
        paste::paste! {
            crate::wdf_object_context::wdf_declare_context_type_with_name!($context_type, [<wdf_object_get_ $context_type:snake>]);
        }
    };
}

pub(crate) use wdf_declare_context_type;
