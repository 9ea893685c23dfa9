//! gdjvm SDK - interfaces between the class bridge and its collaborators
//!
//! The bridge sits between two worlds it does not own:
//!
//! - the **host object system** ([`HostApi`]): a native class registry that
//!   constructs objects and dispatches virtual callbacks by symbolic name;
//! - the **managed runtime** ([`ManagedRuntime`]): the embedded runtime that
//!   hosts the user's classes.
//!
//! This crate defines both traits, the opaque handles that cross between
//! them, the callback ABI the host invokes, and the shared error type.
//! Enable the `mock` feature for in-memory implementations of both sides.

#![warn(missing_docs)]

pub mod error;
pub mod handle;
pub mod host;
pub mod runtime;

#[cfg(feature = "mock")]
pub mod mock;

pub use error::{BridgeError, BridgeResult};
pub use handle::{ManagedClass, ManagedMethod, ManagedObject, ManagedValue, NativeObject};
pub use host::{
    CallVirtualWithDataFn, ClassCallbacks, CreateInstanceFn, FreeInstanceFn, GetVirtualCallDataFn,
    HostApi,
};
pub use runtime::ManagedRuntime;
