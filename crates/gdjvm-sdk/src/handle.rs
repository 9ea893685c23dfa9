//! Opaque handles crossing the bridge
//!
//! Every handle is a non-null pointer owned by the side that produced it.
//! The bridge stores and passes them around; it never dereferences them.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name(NonNull<c_void>);

        impl $name {
            /// Wrap a raw pointer. Returns `None` for null.
            #[inline]
            pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
                NonNull::new(ptr).map(Self)
            }

            /// Wrap an address minted by a collaborator that hands out ids
            /// instead of pointers. Returns `None` for zero.
            #[inline]
            pub fn from_addr(addr: usize) -> Option<Self> {
                Self::from_ptr(addr as *mut c_void)
            }

            /// Raw pointer value
            #[inline]
            pub fn as_ptr(self) -> *mut c_void {
                self.0.as_ptr()
            }

            /// Raw address value
            #[inline]
            pub fn addr(self) -> usize {
                self.0.as_ptr() as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.addr())
            }
        }
    };
}

opaque_handle!(
    /// Object owned by the host object system
    NativeObject
);

opaque_handle!(
    /// Class reference in the managed runtime
    ManagedClass
);

opaque_handle!(
    /// Resolved method (or constructor) in the managed runtime
    ManagedMethod
);

opaque_handle!(
    /// Object reference in the managed runtime
    ManagedObject
);

/// Argument passed to a managed constructor or method.
///
/// Only primitive scalars and object references cross the boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ManagedValue {
    /// 32-bit integer (`I`)
    Int(i32),
    /// 64-bit integer (`J`)
    Long(i64),
    /// 64-bit float (`D`)
    Double(f64),
    /// Object reference (`L...;`)
    Object(ManagedObject),
}
