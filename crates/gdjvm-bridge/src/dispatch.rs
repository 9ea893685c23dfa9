//! Dispatch resolver and call forwarder
//!
//! The host resolves a virtual name once through [`ClassDescriptor::resolve`]
//! and hands the returned token back on every call. Tokens live inside the
//! descriptor, so their addresses stay valid until the class is unregistered.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use gdjvm_sdk::{HostApi, ManagedRuntime, ManagedValue};

use crate::descriptor::ClassDescriptor;
use crate::instance::InstanceKey;
use crate::method_table::{Arity, VirtualMethod};

// ============================================================================
// DispatchToken
// ============================================================================

/// Resolved virtual slot
#[derive(Debug)]
pub struct DispatchToken {
    method: VirtualMethod,
    /// Descriptor that owns this token, as class userdata
    owner: AtomicPtr<c_void>,
}

impl DispatchToken {
    pub(crate) fn new(method: VirtualMethod) -> Self {
        Self {
            method,
            owner: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub(crate) fn bind(&self, owner: *const c_void) {
        self.owner.store(owner as *mut c_void, Ordering::Release);
    }

    /// Method-table entry this token resolves to
    #[inline]
    pub fn method(&self) -> VirtualMethod {
        self.method
    }

    /// Owning descriptor's class userdata
    #[inline]
    pub fn owner(&self) -> *const c_void {
        self.owner.load(Ordering::Acquire)
    }

    /// Opaque call data handed to the host
    #[inline]
    pub fn as_call_data(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    /// Recover a token from host call data
    ///
    /// # Safety
    ///
    /// `data` must be null or a value returned by [`as_call_data`](Self::as_call_data)
    /// on a token whose descriptor is still registered.
    #[inline]
    pub unsafe fn from_call_data<'a>(data: *mut c_void) -> Option<&'a DispatchToken> {
        (data as *const DispatchToken).as_ref()
    }
}

// ============================================================================
// RawArgs
// ============================================================================

/// Host argument vector: an array of pointers to argument storage
#[derive(Debug, Clone, Copy)]
pub struct RawArgs<'a> {
    slots: &'a [*const c_void],
}

impl<'a> RawArgs<'a> {
    /// No arguments
    pub fn empty() -> Self {
        Self { slots: &[] }
    }

    /// Wrap a slice of argument pointers
    ///
    /// # Safety
    ///
    /// Every non-null pointer must point at readable storage of the type the
    /// callee expects for that position.
    pub unsafe fn new(slots: &'a [*const c_void]) -> Self {
        Self { slots }
    }

    /// Wrap a host argument array of `count` entries
    ///
    /// # Safety
    ///
    /// `args` must be null or point at `count` readable pointers, each
    /// satisfying the contract of [`new`](Self::new).
    pub unsafe fn from_raw(args: *const *const c_void, count: usize) -> Self {
        if args.is_null() || count == 0 {
            return Self::empty();
        }
        Self {
            slots: std::slice::from_raw_parts(args, count),
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Read slot `index` as a 64-bit float
    pub fn f64(&self, index: usize) -> Option<f64> {
        let slot = *self.slots.get(index)?;
        if slot.is_null() {
            return None;
        }
        // Host storage carries no alignment guarantee.
        Some(unsafe { ptr::read_unaligned(slot as *const f64) })
    }
}

// ============================================================================
// Resolve / invoke
// ============================================================================

impl<H: HostApi, M: ManagedRuntime> ClassDescriptor<H, M> {
    /// Map a host name to its dispatch token, or `None` if the name is not
    /// in the method table
    pub fn resolve(&self, name: &H::Name) -> Option<&DispatchToken> {
        let method = self.symbols.lookup(self.ctx.host(), name)?;
        Some(&self.dispatch[method.index()])
    }

    /// Token for a method-table entry
    pub fn token(&self, method: VirtualMethod) -> &DispatchToken {
        &self.dispatch[method.index()]
    }

    /// Forward a resolved virtual call to the managed object paired with
    /// `instance`. The host return slot is never written.
    pub fn invoke(
        &self,
        instance: Option<InstanceKey>,
        token: Option<&DispatchToken>,
        args: RawArgs<'_>,
    ) {
        let Some(token) = token else {
            return;
        };
        if token.owner() != self.as_userdata() as *const c_void {
            log::warn!(
                "{}: ignoring {} token owned by another class",
                self.class_name,
                token.method().name()
            );
            return;
        }
        let Some(pair) = instance.and_then(|key| self.instance(key)) else {
            log::warn!(
                "{}: {} called on an unknown instance",
                self.class_name,
                token.method().name()
            );
            return;
        };

        let method = token.method();
        let value = match method.arity() {
            Arity::None => None,
            Arity::Float64 => match args.f64(0) {
                Some(delta) => Some(ManagedValue::Double(delta)),
                None => {
                    log::warn!("{}: {} called without an argument", self.class_name, method.name());
                    return;
                }
            },
            Arity::Reference => Some(ManagedValue::Object(self.managed.placeholder)),
        };

        log::trace!("{}: {} -> {:?}", self.class_name, method.name(), pair.managed);
        let runtime = self.ctx.runtime();
        let args: &[ManagedValue] = match &value {
            Some(value) => std::slice::from_ref(value),
            None => &[],
        };
        runtime.call_void_method(pair.managed, self.managed.method(method), args);
        if runtime.exception_occurred() {
            let description = runtime.describe_exception();
            log::error!("{}.{}: {}", self.managed_class_name, method.name(), description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f64_reads_unaligned_storage() {
        let mut bytes = [0u8; 9];
        bytes[1..].copy_from_slice(&3.5f64.to_ne_bytes());
        let slots = [bytes[1..].as_ptr() as *const c_void];
        let args = unsafe { RawArgs::new(&slots) };
        assert_eq!(args.f64(0), Some(3.5));
        assert_eq!(args.f64(1), None);
    }

    #[test]
    fn test_null_argument_array_is_empty() {
        let args = unsafe { RawArgs::from_raw(ptr::null(), 4) };
        assert!(args.is_empty());
        assert_eq!(args.f64(0), None);
    }

    #[test]
    fn test_null_call_data_has_no_token() {
        assert!(unsafe { DispatchToken::from_call_data(ptr::null_mut()) }.is_none());
    }

    #[test]
    fn test_token_round_trips_through_call_data() {
        let token = DispatchToken::new(VirtualMethod::Input);
        let back = unsafe { DispatchToken::from_call_data(token.as_call_data()) }.unwrap();
        assert_eq!(back.method(), VirtualMethod::Input);
        assert!(back.owner().is_null());
    }
}
