//! HostApi trait: the native class registry
//!
//! Defines what the bridge needs from the host object system: symbolic-name
//! interning, class registration, and object construction. The GDExtension
//! adapter in `gdjvm-ffi` is the production implementation; the `mock`
//! feature provides an in-memory one.

use std::ffi::c_void;

use crate::error::BridgeResult;
use crate::handle::NativeObject;

// ============================================================================
// Callback ABI
// ============================================================================

/// Host asks for a new instance of a registered class.
///
/// Returns the native object, or null if the instance could not be created.
pub type CreateInstanceFn = unsafe extern "C" fn(class_userdata: *mut c_void) -> *mut c_void;

/// Host releases an instance. `instance` is the value passed to
/// [`HostApi::set_instance`] and may be null.
pub type FreeInstanceFn = unsafe extern "C" fn(class_userdata: *mut c_void, instance: *mut c_void);

/// Host probes a virtual slot by name. Returns opaque call data, or null
/// when the class does not implement the slot.
pub type GetVirtualCallDataFn =
    unsafe extern "C" fn(class_userdata: *mut c_void, name: *const c_void) -> *mut c_void;

/// Host invokes a virtual slot previously resolved to `call_data`.
pub type CallVirtualWithDataFn = unsafe extern "C" fn(
    instance: *mut c_void,
    name: *const c_void,
    call_data: *mut c_void,
    args: *const *const c_void,
    ret: *mut c_void,
);

/// Callbacks submitted with a class registration.
///
/// `class_userdata` is passed back verbatim to the callbacks that take it.
#[derive(Debug, Clone, Copy)]
pub struct ClassCallbacks {
    /// Opaque class pointer owned by the bridge
    pub class_userdata: *mut c_void,
    /// Instance factory
    pub create_instance: CreateInstanceFn,
    /// Instance teardown
    pub free_instance: FreeInstanceFn,
    /// Virtual slot resolution
    pub get_virtual_call_data: GetVirtualCallDataFn,
    /// Virtual slot invocation
    pub call_virtual_with_data: CallVirtualWithDataFn,
}

// ============================================================================
// HostApi
// ============================================================================

/// Abstract host object system.
///
/// # Names
///
/// `Name` is the in-memory representation of an interned symbolic name.
/// Whenever the host passes a name to a callback as `*const c_void`, the
/// pointer must point at a valid `Name`. Names must be compared with
/// [`names_equal`](HostApi::names_equal); two distinct `Name` values may
/// denote the same logical name.
pub trait HostApi {
    /// Interned symbolic name
    type Name;

    // ========================================================================
    // Symbolic names
    // ========================================================================

    /// Intern a UTF-8 string. Returns `None` if the host refuses.
    fn intern(&self, name: &str) -> Option<Self::Name>;

    /// Release a name produced by [`intern`](HostApi::intern)
    fn release_name(&self, name: Self::Name);

    /// Value equality of two names
    fn names_equal(&self, a: &Self::Name, b: &Self::Name) -> bool;

    /// Stable key shared by every `Name` denoting the same logical name,
    /// if the host has one. Used only as a lookup hint; equality is always
    /// confirmed with [`names_equal`](HostApi::names_equal).
    fn name_key(&self, _name: &Self::Name) -> Option<u64> {
        None
    }

    // ========================================================================
    // Class registry
    // ========================================================================

    /// Register a class under `name`, inheriting from `parent`
    fn register_class(
        &self,
        name: &Self::Name,
        parent: &Self::Name,
        callbacks: &ClassCallbacks,
    ) -> BridgeResult<()>;

    /// Remove a class from the registry
    fn unregister_class(&self, name: &Self::Name);

    // ========================================================================
    // Objects
    // ========================================================================

    /// Construct a native object of the built-in class `parent`
    fn construct_object(&self, parent: &Self::Name) -> Option<NativeObject>;

    /// Tag `object` as an instance of the extension class `class_name`.
    /// `instance` is handed back to the free and call callbacks.
    fn set_instance(&self, object: NativeObject, class_name: &Self::Name, instance: *mut c_void);
}
