//! Extension entry and initialization levels
//!
//! Godot initializes an extension level by level, from `Core` up to
//! `Editor`, and deinitializes in reverse. [`install_entry`] hands an
//! [`EntryHandler`] to Godot through the initialization record.

use std::ffi::{c_int, c_void};
use std::ptr;

use gdjvm_bridge::{Bridge, ClassSpec};
use gdjvm_sdk::{
    BridgeError, BridgeResult, HostApi, ManagedClass, ManagedMethod, ManagedObject, ManagedRuntime,
    ManagedValue,
};

use crate::config::BridgeConfig;
use crate::error::EntryError;
use crate::gdextension::{GDExtensionClassLibraryPtr, GDExtensionInterfaceGetProcAddress};

/// `GDExtensionInitializationLevel`
pub type GDExtensionInitializationLevel = c_int;

/// `GDExtensionInitialization`
#[repr(C)]
#[derive(Debug)]
pub struct GDExtensionInitialization {
    /// Lowest level the extension wants to be called at
    pub minimum_initialization_level: GDExtensionInitializationLevel,
    /// Passed back to both callbacks
    pub userdata: *mut c_void,
    /// Called once per level on the way up
    pub initialize: Option<unsafe extern "C" fn(*mut c_void, GDExtensionInitializationLevel)>,
    /// Called once per level on the way down
    pub deinitialize: Option<unsafe extern "C" fn(*mut c_void, GDExtensionInitializationLevel)>,
}

impl Default for GDExtensionInitialization {
    fn default() -> Self {
        Self {
            minimum_initialization_level: 0,
            userdata: ptr::null_mut(),
            initialize: None,
            deinitialize: None,
        }
    }
}

/// Engine initialization stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum InitLevel {
    /// Core types
    Core = 0,
    /// Servers
    Servers = 1,
    /// Scene classes; where extension classes are registered
    Scene = 2,
    /// Editor
    Editor = 3,
}

impl InitLevel {
    /// Decode a raw level
    pub fn from_raw(level: GDExtensionInitializationLevel) -> Option<Self> {
        match level {
            0 => Some(InitLevel::Core),
            1 => Some(InitLevel::Servers),
            2 => Some(InitLevel::Scene),
            3 => Some(InitLevel::Editor),
            _ => None,
        }
    }

    /// Raw level value
    #[inline]
    pub fn as_raw(self) -> GDExtensionInitializationLevel {
        self as GDExtensionInitializationLevel
    }
}

/// Receives Godot's initialization callbacks
pub trait EntryHandler {
    /// Lowest level to be called at
    fn minimum_level(&self) -> InitLevel;

    /// Level `level` is coming up
    fn initialize(&mut self, level: InitLevel);

    /// Level `level` is going down
    fn deinitialize(&mut self, level: InitLevel);
}

/// Userdata handed to Godot. The handler is dropped after its minimum
/// level goes down; the slot itself lives until `Core` goes down, since
/// Godot may still call in for the lower levels.
struct EntrySlot<E> {
    handler: Option<E>,
}

/// Fill `init` so Godot drives `handler`. Ownership of the handler passes
/// to Godot until the deinitialization of its minimum level.
pub fn install_entry<E: EntryHandler + 'static>(handler: E, init: &mut GDExtensionInitialization) {
    init.minimum_initialization_level = handler.minimum_level().as_raw();
    let slot = Box::new(EntrySlot {
        handler: Some(handler),
    });
    init.userdata = Box::into_raw(slot) as *mut c_void;
    init.initialize = Some(initialize_trampoline::<E>);
    init.deinitialize = Some(deinitialize_trampoline::<E>);
}

unsafe extern "C" fn initialize_trampoline<E: EntryHandler>(
    userdata: *mut c_void,
    level: GDExtensionInitializationLevel,
) {
    let Some(handler) = (userdata as *mut EntrySlot<E>)
        .as_mut()
        .and_then(|slot| slot.handler.as_mut())
    else {
        return;
    };
    match InitLevel::from_raw(level) {
        Some(level) if level >= handler.minimum_level() => {
            log::debug!("initialize {:?}", level);
            handler.initialize(level);
        }
        Some(_) => {}
        None => log::warn!("ignoring unknown initialization level {}", level),
    }
}

unsafe extern "C" fn deinitialize_trampoline<E: EntryHandler>(
    userdata: *mut c_void,
    level: GDExtensionInitializationLevel,
) {
    let Some(slot) = (userdata as *mut EntrySlot<E>).as_mut() else {
        return;
    };
    let Some(level) = InitLevel::from_raw(level) else {
        log::warn!("ignoring unknown initialization level {}", level);
        return;
    };

    if let Some(handler) = slot.handler.as_mut() {
        let minimum = handler.minimum_level();
        if level >= minimum {
            log::debug!("deinitialize {:?}", level);
            handler.deinitialize(level);
        }
        if level <= minimum {
            slot.handler = None;
        }
    }
    if level == InitLevel::Core {
        drop(Box::from_raw(userdata as *mut EntrySlot<E>));
    }
}

// ============================================================================
// Managed entry singleton
// ============================================================================

const LEVEL_SIGNATURE: &str = "(I)V";
const MIN_LEVEL: (&str, &str) = ("getMinInitlevel", "()I");
const ENTRY_FUNCTION: (&str, &str) = ("entryFunction", "(JJ)Z");

/// The managed entry singleton: `getInstance()` of the configured entry
/// class, whose `initialize(I)V` and `deinitialize(I)V` follow Godot's
/// initialization levels.
///
/// The entry holds a class and an object reference; its owner hands them
/// back with [`release`](Self::release).
#[derive(Debug)]
pub struct ManagedEntry {
    class_name: String,
    class: ManagedClass,
    singleton: ManagedObject,
    initialize: ManagedMethod,
    deinitialize: ManagedMethod,
    minimum_level: InitLevel,
}

impl ManagedEntry {
    /// Resolve the entry singleton named by `config`, ask it for its
    /// minimum level and pass it Godot's `get_proc_address` and library
    /// through `entryFunction(JJ)Z`. A `false` from `entryFunction` fails
    /// the load.
    pub fn bind<M: ManagedRuntime>(
        runtime: &M,
        config: &BridgeConfig,
        get_proc_address: GDExtensionInterfaceGetProcAddress,
        library: GDExtensionClassLibraryPtr,
    ) -> Result<Self, EntryError> {
        let class_name = config.entry_class.clone();
        let class = checked(runtime, runtime.find_class(&class_name), || {
            BridgeError::ClassNotFound(class_name.clone())
        })?;

        let mut entry = match Self::resolve(runtime, class_name, class, config) {
            Ok(entry) => entry,
            Err(err) => {
                runtime.release_class(class);
                return Err(err.into());
            }
        };
        match entry.start(runtime, get_proc_address, library) {
            Ok(()) => {
                log::debug!(
                    "entry {} bound, minimum level {:?}",
                    entry.class_name,
                    entry.minimum_level
                );
                Ok(entry)
            }
            Err(err) => {
                entry.release(runtime);
                Err(err)
            }
        }
    }

    fn resolve<M: ManagedRuntime>(
        runtime: &M,
        class_name: String,
        class: ManagedClass,
        config: &BridgeConfig,
    ) -> BridgeResult<Self> {
        let getter_signature = config.singleton_getter_signature();
        let get_instance = checked(
            runtime,
            runtime.get_static_method(class, "getInstance", &getter_signature),
            || missing_method(&class_name, "getInstance", &getter_signature),
        )?;
        let initialize = entry_method(runtime, class, &class_name, "initialize", LEVEL_SIGNATURE)?;
        let deinitialize =
            entry_method(runtime, class, &class_name, "deinitialize", LEVEL_SIGNATURE)?;
        let singleton = checked(
            runtime,
            runtime.call_static_object_method(class, get_instance, &[]),
            || BridgeError::ManagedException(format!("{}.getInstance returned null", class_name)),
        )?;
        Ok(Self {
            class_name,
            class,
            singleton,
            initialize,
            deinitialize,
            minimum_level: InitLevel::Core,
        })
    }

    fn start<M: ManagedRuntime>(
        &mut self,
        runtime: &M,
        get_proc_address: GDExtensionInterfaceGetProcAddress,
        library: GDExtensionClassLibraryPtr,
    ) -> Result<(), EntryError> {
        let (name, signature) = MIN_LEVEL;
        let method = entry_method(runtime, self.class, &self.class_name, name, signature)?;
        let level = runtime.call_int_method(self.singleton, method, &[]);
        pending(runtime)?;
        self.minimum_level = InitLevel::from_raw(level).ok_or_else(|| EntryError::InvalidLevel {
            class: self.class_name.clone(),
            level,
        })?;

        let (name, signature) = ENTRY_FUNCTION;
        let method = entry_method(runtime, self.class, &self.class_name, name, signature)?;
        let args = [
            ManagedValue::Long(get_proc_address as usize as i64),
            ManagedValue::Long(library as usize as i64),
        ];
        let accepted = runtime.call_boolean_method(self.singleton, method, &args);
        pending(runtime)?;
        if !accepted {
            return Err(EntryError::Rejected(self.class_name.clone()));
        }
        Ok(())
    }

    /// Entry class, in `a/b/C` form
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The singleton object
    pub fn singleton(&self) -> ManagedObject {
        self.singleton
    }

    /// Level reported by `getMinInitlevel()`
    pub fn minimum_level(&self) -> InitLevel {
        self.minimum_level
    }

    /// Forward `level` to `initialize(I)V`
    pub fn initialize<M: ManagedRuntime>(&self, runtime: &M, level: InitLevel) {
        self.call(runtime, self.initialize, "initialize", level);
    }

    /// Forward `level` to `deinitialize(I)V`
    pub fn deinitialize<M: ManagedRuntime>(&self, runtime: &M, level: InitLevel) {
        self.call(runtime, self.deinitialize, "deinitialize", level);
    }

    /// Hand the singleton and class references back to `runtime`
    pub fn release<M: ManagedRuntime>(&self, runtime: &M) {
        runtime.release_object(self.singleton);
        runtime.release_class(self.class);
    }

    fn call<M: ManagedRuntime>(&self, runtime: &M, method: ManagedMethod, name: &str, level: InitLevel) {
        runtime.call_void_method(self.singleton, method, &[ManagedValue::Int(level.as_raw())]);
        if runtime.exception_occurred() {
            let description = runtime.describe_exception();
            log::error!("{}.{}({:?}): {}", self.class_name, name, level, description);
        }
    }
}

/// Clear a pending exception into an error, or turn a missing value into
/// `missing()`
fn checked<T, M: ManagedRuntime>(
    runtime: &M,
    value: Option<T>,
    missing: impl FnOnce() -> BridgeError,
) -> BridgeResult<T> {
    if runtime.exception_occurred() {
        let description = runtime.describe_exception();
        log::error!("{}", description);
        return Err(match value {
            Some(_) => BridgeError::ManagedException(description),
            None => missing(),
        });
    }
    value.ok_or_else(missing)
}

fn missing_method(class: &str, name: &str, signature: &str) -> BridgeError {
    BridgeError::MethodNotFound {
        class: class.to_string(),
        name: name.to_string(),
        signature: signature.to_string(),
    }
}

/// Clear a pending exception into an error
fn pending<M: ManagedRuntime>(runtime: &M) -> BridgeResult<()> {
    checked(runtime, Some(()), || {
        BridgeError::ManagedException("no exception pending".to_string())
    })
}

fn entry_method<M: ManagedRuntime>(
    runtime: &M,
    class: ManagedClass,
    class_name: &str,
    name: &str,
    signature: &str,
) -> BridgeResult<ManagedMethod> {
    checked(runtime, runtime.get_method(class, name, signature), || {
        missing_method(class_name, name, signature)
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Forwards initialization to a [`ManagedEntry`] alone
pub struct ManagedEntryHandler<M: ManagedRuntime> {
    runtime: M,
    entry: ManagedEntry,
}

impl<M: ManagedRuntime> ManagedEntryHandler<M> {
    /// Drive an already bound entry
    pub fn new(runtime: M, entry: ManagedEntry) -> Self {
        Self { runtime, entry }
    }

    /// Bind the entry singleton named by `config`; see [`ManagedEntry::bind`]
    pub fn bind(
        runtime: M,
        config: &BridgeConfig,
        get_proc_address: GDExtensionInterfaceGetProcAddress,
        library: GDExtensionClassLibraryPtr,
    ) -> Result<Self, EntryError> {
        let entry = ManagedEntry::bind(&runtime, config, get_proc_address, library)?;
        Ok(Self::new(runtime, entry))
    }

    /// The runtime the singleton lives in
    pub fn runtime(&self) -> &M {
        &self.runtime
    }

    /// The bound entry
    pub fn entry(&self) -> &ManagedEntry {
        &self.entry
    }
}

impl<M: ManagedRuntime> Drop for ManagedEntryHandler<M> {
    fn drop(&mut self) {
        self.entry.release(&self.runtime);
    }
}

impl<M: ManagedRuntime> EntryHandler for ManagedEntryHandler<M> {
    fn minimum_level(&self) -> InitLevel {
        self.entry.minimum_level()
    }

    fn initialize(&mut self, level: InitLevel) {
        self.entry.initialize(&self.runtime, level);
    }

    fn deinitialize(&mut self, level: InitLevel) {
        self.entry.deinitialize(&self.runtime, level);
    }
}

/// Registers classes with a [`Bridge`] when the scene level comes up and
/// unregisters them when it goes down.
///
/// Registration stops at the first failure: classes registered before it
/// are unregistered again and the error is kept in
/// [`failure`](Self::failure).
pub struct ClassEntryHandler<H: HostApi, M: ManagedRuntime> {
    bridge: Bridge<H, M>,
    specs: Vec<ClassSpec>,
    registered: Vec<String>,
    failure: Option<BridgeError>,
}

impl<H: HostApi, M: ManagedRuntime> ClassEntryHandler<H, M> {
    /// Register `specs` through `bridge`
    pub fn new(bridge: Bridge<H, M>, specs: Vec<ClassSpec>) -> Self {
        Self {
            bridge,
            specs,
            registered: Vec::new(),
            failure: None,
        }
    }

    /// The bridge holding the registered classes
    pub fn bridge(&self) -> &Bridge<H, M> {
        &self.bridge
    }

    /// Error that aborted the last registration pass
    pub fn failure(&self) -> Option<&BridgeError> {
        self.failure.as_ref()
    }

    fn register_all(&mut self) {
        let mut failed = None;
        for spec in &self.specs {
            match self.bridge.register_class(spec) {
                Ok(_) => self.registered.push(spec.class_name.clone()),
                Err(err) => {
                    failed = Some((spec.class_name.clone(), err));
                    break;
                }
            }
        }
        if let Some((class, err)) = failed {
            log::error!("extension load aborted at {}: {}", class, err);
            self.withdraw();
            self.failure = Some(err);
        }
    }

    /// Unregister in reverse registration order
    fn withdraw(&mut self) {
        while let Some(class) = self.registered.pop() {
            self.bridge.unregister_class(&class);
        }
    }
}

impl<H: HostApi, M: ManagedRuntime> EntryHandler for ClassEntryHandler<H, M> {
    fn minimum_level(&self) -> InitLevel {
        InitLevel::Scene
    }

    fn initialize(&mut self, level: InitLevel) {
        if level == InitLevel::Scene {
            self.failure = None;
            self.register_all();
        }
    }

    fn deinitialize(&mut self, level: InitLevel) {
        if level == InitLevel::Scene {
            self.withdraw();
        }
    }
}

/// The full extension: the managed entry singleton plus class registration.
///
/// On the way up the singleton sees each level before classes are
/// registered; on the way down classes go first.
pub struct ExtensionEntryHandler<H: HostApi, M: ManagedRuntime> {
    entry: ManagedEntry,
    classes: ClassEntryHandler<H, M>,
}

impl<H: HostApi, M: ManagedRuntime> ExtensionEntryHandler<H, M> {
    /// Combine a bound entry with class registration. `entry` must have been
    /// bound against the runtime `classes` uses.
    pub fn new(entry: ManagedEntry, classes: ClassEntryHandler<H, M>) -> Self {
        Self { entry, classes }
    }

    /// The bound entry
    pub fn entry(&self) -> &ManagedEntry {
        &self.entry
    }

    /// The class registration half
    pub fn classes(&self) -> &ClassEntryHandler<H, M> {
        &self.classes
    }
}

impl<H: HostApi, M: ManagedRuntime> Drop for ExtensionEntryHandler<H, M> {
    fn drop(&mut self) {
        self.entry.release(self.classes.bridge().runtime());
    }
}

impl<H: HostApi, M: ManagedRuntime> EntryHandler for ExtensionEntryHandler<H, M> {
    fn minimum_level(&self) -> InitLevel {
        self.entry.minimum_level().min(self.classes.minimum_level())
    }

    fn initialize(&mut self, level: InitLevel) {
        if level >= self.entry.minimum_level() {
            self.entry.initialize(self.classes.bridge().runtime(), level);
        }
        if level >= self.classes.minimum_level() {
            self.classes.initialize(level);
        }
    }

    fn deinitialize(&mut self, level: InitLevel) {
        if level >= self.classes.minimum_level() {
            self.classes.deinitialize(level);
        }
        if level >= self.entry.minimum_level() {
            self.entry.deinitialize(self.classes.bridge().runtime(), level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdextension::GDExtensionInterfaceFunctionPtr;
    use gdjvm_sdk::mock::{MockHost, MockRuntime};
    use std::cell::RefCell;
    use std::ffi::c_char;
    use std::rc::Rc;

    struct Recorder {
        minimum: InitLevel,
        events: Rc<RefCell<Vec<(bool, InitLevel)>>>,
    }

    impl EntryHandler for Recorder {
        fn minimum_level(&self) -> InitLevel {
            self.minimum
        }
        fn initialize(&mut self, level: InitLevel) {
            self.events.borrow_mut().push((true, level));
        }
        fn deinitialize(&mut self, level: InitLevel) {
            self.events.borrow_mut().push((false, level));
        }
    }

    /// Run a full Godot init/deinit sequence
    unsafe fn cycle(init: &GDExtensionInitialization) {
        let (Some(initialize), Some(deinitialize)) = (init.initialize, init.deinitialize) else {
            panic!("callbacks not installed");
        };
        for level in 0..4 {
            initialize(init.userdata, level);
        }
        for level in (0..4).rev() {
            deinitialize(init.userdata, level);
        }
    }

    const ENTRY: &str = "godot_java/DefaultInitHandler";
    const NODE: &str = "godot_java/DefaultNodeOverride";
    const LIBRARY: GDExtensionClassLibraryPtr = 0x4400 as GDExtensionClassLibraryPtr;

    unsafe extern "C" fn get_proc_address(_name: *const c_char) -> GDExtensionInterfaceFunctionPtr {
        None
    }

    fn config() -> BridgeConfig {
        BridgeConfig::from_lookup(|var| match var {
            "CLASSPATH" => Some("classes".to_string()),
            "ENTRY_CLASS" => Some(ENTRY.to_string()),
            _ => None,
        })
        .unwrap()
    }

    /// A runtime with a well-behaved entry singleton at `Scene`
    fn entry_runtime() -> MockRuntime {
        let runtime = MockRuntime::new();
        runtime.define_class(
            ENTRY,
            &[
                ("getInstance", "()Lgodot_java/DefaultInitHandler;"),
                ("getMinInitlevel", "()I"),
                ("initialize", "(I)V"),
                ("deinitialize", "(I)V"),
                ("entryFunction", "(JJ)Z"),
            ],
        );
        runtime.set_int_return("getMinInitlevel", 2);
        runtime.set_bool_return("entryFunction", true);
        runtime
    }

    fn define_node(runtime: &MockRuntime, class: &str) {
        let mut methods = vec![("<init>", "(J)V")];
        methods.extend(
            gdjvm_bridge::VirtualMethod::ALL
                .iter()
                .map(|m| (m.name(), m.signature())),
        );
        runtime.define_class(class, &methods);
    }

    fn assert_balanced(runtime: &MockRuntime) {
        assert_eq!(runtime.class_refs(), 0, "class references leaked");
        assert_eq!(runtime.live_objects(), 0, "managed objects leaked");
        assert!(!runtime.has_pending_exception());
    }

    #[test]
    fn test_levels_round_trip() {
        for level in [InitLevel::Core, InitLevel::Servers, InitLevel::Scene, InitLevel::Editor] {
            assert_eq!(InitLevel::from_raw(level.as_raw()), Some(level));
        }
        assert_eq!(InitLevel::from_raw(4), None);
        assert_eq!(InitLevel::from_raw(-1), None);
    }

    #[test]
    fn test_handler_sees_levels_from_its_minimum() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut init = GDExtensionInitialization::default();
        install_entry(
            Recorder {
                minimum: InitLevel::Scene,
                events: Rc::clone(&events),
            },
            &mut init,
        );
        assert_eq!(init.minimum_initialization_level, 2);
        assert!(!init.userdata.is_null());

        unsafe { cycle(&init) };
        assert_eq!(
            *events.borrow(),
            vec![
                (true, InitLevel::Scene),
                (true, InitLevel::Editor),
                (false, InitLevel::Editor),
                (false, InitLevel::Scene),
            ]
        );
        // the handler was dropped after its minimum level
        assert_eq!(Rc::strong_count(&events), 1);
    }

    // ========================================================================
    // Managed entry
    // ========================================================================

    #[test]
    fn test_bind_runs_the_entry_protocol() {
        let handler =
            ManagedEntryHandler::bind(entry_runtime(), &config(), get_proc_address, LIBRARY)
                .unwrap();
        assert_eq!(handler.minimum_level(), InitLevel::Scene);
        assert_eq!(handler.entry().class_name(), ENTRY);

        let runtime = handler.runtime();
        let names: Vec<String> = runtime.calls().into_iter().map(|c| c.method).collect();
        assert_eq!(names, ["getInstance", "getMinInitlevel", "entryFunction"]);

        let entry_call = &runtime.calls_to("entryFunction")[0];
        assert_eq!(entry_call.object, handler.entry().singleton());
        assert_eq!(
            entry_call.args,
            vec![
                ManagedValue::Long(get_proc_address as usize as i64),
                ManagedValue::Long(LIBRARY as usize as i64),
            ]
        );
    }

    #[test]
    fn test_managed_handler_forwards_level() {
        let mut handler =
            ManagedEntryHandler::bind(entry_runtime(), &config(), get_proc_address, LIBRARY)
                .unwrap();
        handler.initialize(InitLevel::Scene);
        handler.deinitialize(InitLevel::Scene);

        let runtime = handler.runtime();
        let init = runtime.calls_to("initialize");
        assert_eq!(init.len(), 1);
        assert_eq!(init[0].args, vec![ManagedValue::Int(2)]);
        let deinit = runtime.calls_to("deinitialize");
        assert_eq!(deinit.len(), 1);
        assert_eq!(deinit[0].object, handler.entry().singleton());
    }

    #[test]
    fn test_rejecting_entry_function_fails_the_load() {
        let runtime = entry_runtime();
        runtime.set_bool_return("entryFunction", false);
        let err = ManagedEntry::bind(&runtime, &config(), get_proc_address, LIBRARY).unwrap_err();
        assert_eq!(err, EntryError::Rejected(ENTRY.to_string()));
        assert_balanced(&runtime);
    }

    #[test]
    fn test_unknown_minimum_level_fails_the_load() {
        let runtime = entry_runtime();
        runtime.set_int_return("getMinInitlevel", 7);
        let err = ManagedEntry::bind(&runtime, &config(), get_proc_address, LIBRARY).unwrap_err();
        assert_eq!(
            err,
            EntryError::InvalidLevel {
                class: ENTRY.to_string(),
                level: 7
            }
        );
        assert!(runtime.calls_to("entryFunction").is_empty());
        assert_balanced(&runtime);
    }

    #[test]
    fn test_raising_entry_function_fails_the_load() {
        let runtime = entry_runtime();
        runtime.raise_in("entryFunction");
        let err = ManagedEntry::bind(&runtime, &config(), get_proc_address, LIBRARY).unwrap_err();
        assert!(matches!(err, EntryError::Managed(BridgeError::ManagedException(_))));
        assert_balanced(&runtime);
    }

    #[test]
    fn test_entry_requires_lifecycle_methods() {
        let runtime = MockRuntime::new();
        runtime.define_class(
            ENTRY,
            &[
                ("getInstance", "()Lgodot_java/DefaultInitHandler;"),
                ("initialize", "(I)V"),
            ],
        );
        let err = ManagedEntry::bind(&runtime, &config(), get_proc_address, LIBRARY).unwrap_err();
        assert_eq!(
            err,
            EntryError::Managed(missing_method(ENTRY, "deinitialize", "(I)V"))
        );
        assert_balanced(&runtime);

        let err = ManagedEntry::bind(&MockRuntime::new(), &config(), get_proc_address, LIBRARY)
            .unwrap_err();
        assert_eq!(err, EntryError::Managed(BridgeError::ClassNotFound(ENTRY.to_string())));
    }

    // ========================================================================
    // Class registration
    // ========================================================================

    #[test]
    fn test_class_handler_registers_at_scene_level() {
        let bridge = Bridge::new(MockHost::new(), MockRuntime::new());
        define_node(bridge.runtime(), NODE);

        let mut handler =
            ClassEntryHandler::new(bridge, vec![ClassSpec::new("JavaNode", "Node", NODE)]);
        handler.initialize(InitLevel::Servers);
        assert!(handler.bridge().is_empty());

        handler.initialize(InitLevel::Scene);
        assert!(handler.bridge().host().is_registered("JavaNode"));
        assert!(handler.failure().is_none());

        handler.deinitialize(InitLevel::Scene);
        assert!(!handler.bridge().host().is_registered("JavaNode"));
        assert_eq!(handler.bridge().host().outstanding_names(), 0);
    }

    #[test]
    fn test_failed_registration_aborts_the_load() {
        let bridge = Bridge::new(MockHost::new(), MockRuntime::new());
        define_node(bridge.runtime(), NODE);

        let mut handler = ClassEntryHandler::new(
            bridge,
            vec![
                ClassSpec::new("JavaNode", "Node", NODE),
                ClassSpec::new("Broken", "Node", "game/Missing"),
                ClassSpec::new("Later", "Node", NODE),
            ],
        );
        handler.initialize(InitLevel::Scene);

        assert_eq!(
            handler.failure(),
            Some(&BridgeError::ClassNotFound("game/Missing".to_string()))
        );
        let host = handler.bridge().host();
        assert_eq!(host.registered_count(), 0, "no class may stay registered");
        assert!(!host.is_registered("Later"), "registration must stop at the failure");
        assert_eq!(host.outstanding_names(), 0);
        assert!(handler.bridge().is_empty());
        assert_balanced(handler.bridge().runtime());

        // going down after an aborted load is harmless
        handler.deinitialize(InitLevel::Scene);
        assert!(handler.bridge().is_empty());
    }

    // ========================================================================
    // Full extension
    // ========================================================================

    fn extension() -> ExtensionEntryHandler<MockHost, MockRuntime> {
        let bridge = Bridge::new(MockHost::new(), entry_runtime());
        define_node(bridge.runtime(), NODE);
        let entry =
            ManagedEntry::bind(bridge.runtime(), &config(), get_proc_address, LIBRARY).unwrap();
        let classes =
            ClassEntryHandler::new(bridge, vec![ClassSpec::new("JavaNode", "Node", NODE)]);
        ExtensionEntryHandler::new(entry, classes)
    }

    #[test]
    fn test_extension_drives_entry_and_classes() {
        let mut handler = extension();
        assert_eq!(handler.minimum_level(), InitLevel::Scene);

        handler.initialize(InitLevel::Scene);
        handler.initialize(InitLevel::Editor);
        let bridge = handler.classes().bridge();
        assert!(bridge.host().is_registered("JavaNode"));
        let levels: Vec<_> = bridge
            .runtime()
            .calls_to("initialize")
            .into_iter()
            .map(|c| c.args)
            .collect();
        assert_eq!(
            levels,
            vec![vec![ManagedValue::Int(2)], vec![ManagedValue::Int(3)]]
        );

        handler.deinitialize(InitLevel::Editor);
        handler.deinitialize(InitLevel::Scene);
        let bridge = handler.classes().bridge();
        assert!(!bridge.host().is_registered("JavaNode"));
        assert_eq!(bridge.runtime().calls_to("deinitialize").len(), 2);
        // only the singleton and its class remain
        assert_eq!(bridge.runtime().live_objects(), 1);
        assert_eq!(bridge.runtime().class_refs(), 1);
    }

    #[test]
    fn test_extension_minimum_follows_the_entry() {
        let bridge = Bridge::new(MockHost::new(), entry_runtime());
        bridge.runtime().set_int_return("getMinInitlevel", 0);
        let entry =
            ManagedEntry::bind(bridge.runtime(), &config(), get_proc_address, LIBRARY).unwrap();
        let mut handler = ExtensionEntryHandler::new(entry, ClassEntryHandler::new(bridge, vec![]));
        assert_eq!(handler.minimum_level(), InitLevel::Core);

        handler.initialize(InitLevel::Core);
        assert_eq!(
            handler.classes().bridge().runtime().calls_to("initialize")[0].args,
            vec![ManagedValue::Int(0)]
        );
    }

    #[test]
    fn test_installed_extension_survives_a_full_cycle() {
        let mut init = GDExtensionInitialization::default();
        install_entry(extension(), &mut init);
        assert_eq!(init.minimum_initialization_level, 2);
        unsafe { cycle(&init) };
    }
}
