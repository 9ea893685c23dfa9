//! Shared collaborators
//!
//! Every descriptor holds the same `BridgeContext` through an `Arc`, so the
//! host and runtime bindings are threaded explicitly instead of living in a
//! process-wide table.

use gdjvm_sdk::{HostApi, ManagedRuntime};

/// The host and runtime a bridge talks to
pub struct BridgeContext<H, M> {
    host: H,
    runtime: M,
}

impl<H: HostApi, M: ManagedRuntime> BridgeContext<H, M> {
    /// Bundle a host and a runtime
    pub fn new(host: H, runtime: M) -> Self {
        Self { host, runtime }
    }

    /// The host object system
    #[inline]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The managed runtime
    #[inline]
    pub fn runtime(&self) -> &M {
        &self.runtime
    }
}
