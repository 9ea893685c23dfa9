//! GDExtension glue for the gdjvm class bridge
//!
//! This crate connects the bridge to a running Godot instance:
//!
//! - [`gdextension::GdExtensionHost`] implements the host interface over the
//!   function table Godot passes to the entry point
//! - [`entry`] binds the managed entry singleton, turns Godot's
//!   initialization levels into handler calls and registers classes when the
//!   scene level comes up
//! - [`config`] reads the environment the extension is launched with
//! - [`logging`] installs the log backend
//!
//! Starting the managed runtime is left to the embedder, which hands a
//! [`ManagedRuntime`] to [`initialize_extension`].

#![warn(missing_docs)]

pub mod config;
pub mod entry;
pub mod error;
pub mod gdextension;
pub mod logging;

use std::ffi::c_char;

use gdjvm_bridge::Bridge;
use gdjvm_sdk::ManagedRuntime;

pub use config::BridgeConfig;
pub use entry::{
    install_entry, ClassEntryHandler, EntryHandler, ExtensionEntryHandler,
    GDExtensionInitialization, InitLevel, ManagedEntry, ManagedEntryHandler,
};
pub use error::{ConfigError, EntryError, LoadError};
pub use gdextension::{GdExtensionHost, GodotVersion};

/// Bring the extension up: bind the GDExtension interface, run the managed
/// entry singleton's `getInstance`, `getMinInitlevel` and `entryFunction`,
/// and arrange for the configured class to be registered at the scene level.
///
/// The embedder's `extern "C"` entry point returns whether this succeeded.
///
/// # Safety
///
/// `get_proc_address` and `library` must be the values Godot passed to the
/// extension entry point, and `init` must be its initialization record.
pub unsafe fn initialize_extension<M: ManagedRuntime + 'static>(
    get_proc_address: gdextension::GDExtensionInterfaceGetProcAddress,
    library: gdextension::GDExtensionClassLibraryPtr,
    runtime: M,
    config: &BridgeConfig,
    init: &mut GDExtensionInitialization,
) -> Result<(), EntryError> {
    logging::init_from_env();
    let host = GdExtensionHost::load(get_proc_address, library)?;
    let entry = ManagedEntry::bind(&runtime, config, get_proc_address, library).map_err(|err| {
        log::error!("entry {} failed: {}", config.entry_class, err);
        err
    })?;
    let classes = ClassEntryHandler::new(Bridge::new(host, runtime), vec![config.class_spec()]);
    install_entry(ExtensionEntryHandler::new(entry, classes), init);
    Ok(())
}

// ============================================================================
// C surface
// ============================================================================

/// Library version
///
/// # Safety
/// The returned string is static and must not be freed
#[no_mangle]
pub unsafe extern "C" fn gdjvm_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_version() {
        unsafe {
            let version = gdjvm_version();
            assert!(!version.is_null());
            let version = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }
}
