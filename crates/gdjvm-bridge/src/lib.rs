//! gdjvm bridge core
//!
//! Registers managed classes as synthetic classes of a native host object
//! system and routes the host's virtual callbacks to managed methods.
//!
//! # Lifecycle
//!
//! - [`Bridge::register_class`] resolves the managed class and its methods,
//!   interns every host name once, and submits the callback table
//! - the host creates instances through the factory; each instance is a
//!   native object paired with a managed object
//! - the host resolves a virtual name once ([`ClassDescriptor::resolve`])
//!   and invokes the returned token on every call
//! - [`Bridge::unregister_class`] (or dropping the bridge) releases
//!   everything the class acquired

#![warn(missing_docs)]

mod bridge;
pub mod callbacks;
mod context;
mod descriptor;
mod dispatch;
mod instance;
mod managed;
pub mod method_table;
mod registration;
mod symbol_cache;

pub use bridge::Bridge;
pub use context::BridgeContext;
pub use descriptor::ClassDescriptor;
pub use dispatch::{DispatchToken, RawArgs};
pub use instance::{InstanceKey, InstancePair};
pub use managed::ManagedBindings;
pub use method_table::{Arity, VirtualMethod};
pub use registration::ClassSpec;
pub use symbol_cache::SymbolCache;

pub use gdjvm_sdk::{BridgeError, BridgeResult};
