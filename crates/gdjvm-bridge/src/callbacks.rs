//! Host-facing callback trampolines
//!
//! The host calls these through the function pointers submitted at
//! registration. Each one recovers the descriptor (from the class userdata
//! or from the dispatch token) and forwards to the safe API.

use std::ffi::c_void;
use std::ptr;

use gdjvm_sdk::{ClassCallbacks, HostApi, ManagedRuntime};

use crate::descriptor::ClassDescriptor;
use crate::dispatch::{DispatchToken, RawArgs};
use crate::instance::InstanceKey;

// ============================================================================
// Helpers
// ============================================================================

/// Recover a descriptor from class userdata
///
/// # Safety
///
/// `userdata` must be null or the address of a registered descriptor of
/// exactly this type.
unsafe fn descriptor<'a, H: HostApi, M: ManagedRuntime>(
    userdata: *mut c_void,
) -> Option<&'a ClassDescriptor<H, M>> {
    (userdata as *const ClassDescriptor<H, M>).as_ref()
}

/// Callback table for a descriptor
pub(crate) fn class_callbacks<H: HostApi, M: ManagedRuntime>(
    descriptor: &ClassDescriptor<H, M>,
) -> ClassCallbacks {
    ClassCallbacks {
        class_userdata: descriptor.as_userdata(),
        create_instance: create_instance::<H, M>,
        free_instance: free_instance::<H, M>,
        get_virtual_call_data: get_virtual_call_data::<H, M>,
        call_virtual_with_data: call_virtual_with_data::<H, M>,
    }
}

// ============================================================================
// Trampolines
// ============================================================================

/// Instance factory
///
/// # Safety
///
/// `class_userdata` must be the userdata submitted with the class.
pub unsafe extern "C" fn create_instance<H: HostApi, M: ManagedRuntime>(
    class_userdata: *mut c_void,
) -> *mut c_void {
    match descriptor::<H, M>(class_userdata) {
        Some(class) => class
            .create_instance()
            .map_or(ptr::null_mut(), |native| native.as_ptr()),
        None => ptr::null_mut(),
    }
}

/// Instance teardown
///
/// # Safety
///
/// `class_userdata` must be the userdata submitted with the class.
pub unsafe extern "C" fn free_instance<H: HostApi, M: ManagedRuntime>(
    class_userdata: *mut c_void,
    instance: *mut c_void,
) {
    let Some(class) = descriptor::<H, M>(class_userdata) else {
        return;
    };
    if let Some(key) = InstanceKey::from_instance_ptr(instance) {
        class.free_instance(key);
    }
}

/// Virtual slot resolution
///
/// # Safety
///
/// `class_userdata` must be the userdata submitted with the class, and
/// `name` must be null or point at a valid `H::Name`.
pub unsafe extern "C" fn get_virtual_call_data<H: HostApi, M: ManagedRuntime>(
    class_userdata: *mut c_void,
    name: *const c_void,
) -> *mut c_void {
    let Some(class) = descriptor::<H, M>(class_userdata) else {
        return ptr::null_mut();
    };
    let Some(name) = (name as *const H::Name).as_ref() else {
        return ptr::null_mut();
    };
    class
        .resolve(name)
        .map_or(ptr::null_mut(), DispatchToken::as_call_data)
}

/// Virtual slot invocation. `ret` is never written.
///
/// # Safety
///
/// `call_data` must be null or a value returned by
/// [`get_virtual_call_data`] for a class that is still registered, and
/// `args` must hold as many valid pointers as the resolved method takes.
pub unsafe extern "C" fn call_virtual_with_data<H: HostApi, M: ManagedRuntime>(
    instance: *mut c_void,
    _name: *const c_void,
    call_data: *mut c_void,
    args: *const *const c_void,
    _ret: *mut c_void,
) {
    let Some(token) = DispatchToken::from_call_data(call_data) else {
        return;
    };
    let Some(class) = descriptor::<H, M>(token.owner() as *mut c_void) else {
        return;
    };
    let args = RawArgs::from_raw(args, token.method().arity().arg_count());
    class.invoke(InstanceKey::from_instance_ptr(instance), Some(token), args);
}
