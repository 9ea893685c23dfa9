//! In-memory host and managed runtime
//!
//! `MockHost` implements [`HostApi`] and can drive registered classes the
//! way the host does: create, probe, call and free instances through the
//! submitted [`ClassCallbacks`]. `MockRuntime` implements [`ManagedRuntime`]
//! with user-defined classes and records every call made into it.
//!
//! Both count outstanding resources so tests can check balance.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::hash::{Hash, Hasher};
use std::ptr;

use crate::error::{BridgeError, BridgeResult};
use crate::handle::{ManagedClass, ManagedMethod, ManagedObject, ManagedValue, NativeObject};
use crate::host::{ClassCallbacks, HostApi};
use crate::runtime::ManagedRuntime;

/// Written into the return slot before each virtual call
pub const RET_SENTINEL: u64 = 0xDEAD_BEEF_CAFE_F00D;

// ============================================================================
// MockHost
// ============================================================================

/// Interned name. Every `intern` call produces distinct storage, so
/// pointer identity never implies equality.
#[derive(Debug)]
pub struct MockName {
    text: String,
    storage: u64,
}

impl MockName {
    /// The name's text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Identity of this interning; distinct for every `intern` call
    pub fn storage(&self) -> u64 {
        self.storage
    }
}

/// Native object tracked by the host
#[derive(Debug, Clone)]
pub struct MockObject {
    /// Built-in class the object was constructed as
    pub parent: String,
    /// Extension class set by `set_instance`
    pub extension_class: Option<String>,
    /// Instance value set by `set_instance`
    pub instance: *mut c_void,
}

/// An instance created through the registered factory
#[derive(Debug, Clone, Copy)]
pub struct MockInstance {
    /// Native object returned by the factory
    pub object: NativeObject,
    /// Instance value the class attached to it
    pub instance: *mut c_void,
}

/// Outcome of a virtual call driven by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualCall {
    /// Whether the class resolved the slot
    pub resolved: bool,
    /// Whether the return slot still holds [`RET_SENTINEL`]
    pub ret_untouched: bool,
}

#[derive(Default)]
struct HostState {
    next_storage: u64,
    next_object: usize,
    outstanding_names: i64,
    refused: HashSet<String>,
    classes: HashMap<String, (String, ClassCallbacks)>,
    objects: HashMap<usize, MockObject>,
    fail_construct: bool,
    reject_register: bool,
}

/// In-memory host object system
#[derive(Default)]
pub struct MockHost {
    state: RefCell<HostState>,
    name_keys: bool,
}

impl MockHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose stable name keys through [`HostApi::name_key`]
    pub fn with_name_keys(mut self) -> Self {
        self.name_keys = true;
        self
    }

    /// Refuse to intern `name` from now on
    pub fn refuse_intern(&self, name: &str) {
        self.state.borrow_mut().refused.insert(name.to_string());
    }

    /// Make `construct_object` return `None`
    pub fn set_construct_failure(&self, fail: bool) {
        self.state.borrow_mut().fail_construct = fail;
    }

    /// Make `register_class` fail
    pub fn set_reject_registrations(&self, reject: bool) {
        self.state.borrow_mut().reject_register = reject;
    }

    /// Interned names not yet released
    pub fn outstanding_names(&self) -> i64 {
        self.state.borrow().outstanding_names
    }

    /// Whether a class is currently registered
    pub fn is_registered(&self, class: &str) -> bool {
        self.state.borrow().classes.contains_key(class)
    }

    /// Parent of a registered class
    pub fn parent_of(&self, class: &str) -> Option<String> {
        self.state.borrow().classes.get(class).map(|(p, _)| p.clone())
    }

    /// Number of registered classes
    pub fn registered_count(&self) -> usize {
        self.state.borrow().classes.len()
    }

    /// Native objects constructed so far
    pub fn object_count(&self) -> usize {
        self.state.borrow().objects.len()
    }

    /// Look up a constructed native object
    pub fn object(&self, object: NativeObject) -> Option<MockObject> {
        self.state.borrow().objects.get(&object.addr()).cloned()
    }

    fn callbacks(&self, class: &str) -> Option<ClassCallbacks> {
        self.state.borrow().classes.get(class).map(|(_, cb)| *cb)
    }

    fn new_name(&self, text: &str) -> MockName {
        let mut state = self.state.borrow_mut();
        state.next_storage += 1;
        state.outstanding_names += 1;
        MockName {
            text: text.to_string(),
            storage: state.next_storage,
        }
    }

    // ========================================================================
    // Host-side driving
    // ========================================================================

    /// Instantiate `class` through its registered factory
    pub fn instantiate(&self, class: &str) -> Option<MockInstance> {
        let callbacks = self.callbacks(class)?;
        let raw = unsafe { (callbacks.create_instance)(callbacks.class_userdata) };
        let object = NativeObject::from_ptr(raw)?;
        let instance = self
            .state
            .borrow()
            .objects
            .get(&object.addr())
            .map_or(ptr::null_mut(), |o| o.instance);
        Some(MockInstance { object, instance })
    }

    /// Free an instance through the registered teardown callback
    pub fn free(&self, class: &str, instance: *mut c_void) {
        if let Some(callbacks) = self.callbacks(class) {
            unsafe { (callbacks.free_instance)(callbacks.class_userdata, instance) };
        }
    }

    /// Probe a virtual slot the way the host does, with freshly interned
    /// name storage
    pub fn virtual_call_data(&self, class: &str, name: &str) -> *mut c_void {
        let Some(callbacks) = self.callbacks(class) else {
            return ptr::null_mut();
        };
        let probe = self.new_name(name);
        let data = unsafe {
            (callbacks.get_virtual_call_data)(
                callbacks.class_userdata,
                &probe as *const MockName as *const c_void,
            )
        };
        self.release_name(probe);
        data
    }

    /// Invoke a virtual slot with already-resolved call data
    pub fn call_with_data(
        &self,
        class: &str,
        instance: *mut c_void,
        call_data: *mut c_void,
        args: &[*const c_void],
    ) -> bool {
        let Some(callbacks) = self.callbacks(class) else {
            return false;
        };
        let mut ret = RET_SENTINEL;
        let args_ptr = if args.is_empty() {
            ptr::null()
        } else {
            args.as_ptr()
        };
        unsafe {
            (callbacks.call_virtual_with_data)(
                instance,
                ptr::null(),
                call_data,
                args_ptr,
                &mut ret as *mut u64 as *mut c_void,
            )
        };
        ret == RET_SENTINEL
    }

    /// Resolve then invoke a virtual slot by name
    pub fn call_virtual(
        &self,
        class: &str,
        instance: *mut c_void,
        name: &str,
        args: &[*const c_void],
    ) -> VirtualCall {
        let data = self.virtual_call_data(class, name);
        let ret_untouched = self.call_with_data(class, instance, data, args);
        VirtualCall {
            resolved: !data.is_null(),
            ret_untouched,
        }
    }
}

impl HostApi for MockHost {
    type Name = MockName;

    fn intern(&self, name: &str) -> Option<MockName> {
        if self.state.borrow().refused.contains(name) {
            return None;
        }
        Some(self.new_name(name))
    }

    fn release_name(&self, _name: MockName) {
        self.state.borrow_mut().outstanding_names -= 1;
    }

    fn names_equal(&self, a: &MockName, b: &MockName) -> bool {
        a.text == b.text
    }

    fn name_key(&self, name: &MockName) -> Option<u64> {
        if !self.name_keys {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        name.text.hash(&mut hasher);
        Some(hasher.finish())
    }

    fn register_class(
        &self,
        name: &MockName,
        parent: &MockName,
        callbacks: &ClassCallbacks,
    ) -> BridgeResult<()> {
        let mut state = self.state.borrow_mut();
        if state.reject_register {
            return Err(BridgeError::HostRejected {
                class: name.text.clone(),
                reason: "registrations disabled".to_string(),
            });
        }
        if state.classes.contains_key(&name.text) {
            return Err(BridgeError::HostRejected {
                class: name.text.clone(),
                reason: "class already exists".to_string(),
            });
        }
        state
            .classes
            .insert(name.text.clone(), (parent.text.clone(), *callbacks));
        Ok(())
    }

    fn unregister_class(&self, name: &MockName) {
        self.state.borrow_mut().classes.remove(&name.text);
    }

    fn construct_object(&self, parent: &MockName) -> Option<NativeObject> {
        let mut state = self.state.borrow_mut();
        if state.fail_construct {
            return None;
        }
        state.next_object += 1;
        let addr = 0x1000 + state.next_object * 0x10;
        state.objects.insert(
            addr,
            MockObject {
                parent: parent.text.clone(),
                extension_class: None,
                instance: ptr::null_mut(),
            },
        );
        NativeObject::from_addr(addr)
    }

    fn set_instance(&self, object: NativeObject, class_name: &MockName, instance: *mut c_void) {
        if let Some(obj) = self.state.borrow_mut().objects.get_mut(&object.addr()) {
            obj.extension_class = Some(class_name.text.clone());
            obj.instance = instance;
        }
    }
}

// ============================================================================
// MockRuntime
// ============================================================================

/// A recorded call into a managed object
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedCall {
    /// Receiver
    pub object: ManagedObject,
    /// Method name
    pub method: String,
    /// Arguments as passed
    pub args: Vec<ManagedValue>,
}

struct MockClass {
    handle: ManagedClass,
    methods: HashSet<(String, String)>,
    constructor_raises: bool,
}

struct MethodInfo {
    class: String,
    name: String,
}

struct ObjectInfo {
    class: String,
    constructor_args: Vec<ManagedValue>,
}

#[derive(Default)]
struct RuntimeState {
    next_handle: usize,
    classes: HashMap<String, MockClass>,
    methods: HashMap<(String, String, String), ManagedMethod>,
    method_info: HashMap<usize, MethodInfo>,
    objects: HashMap<usize, ObjectInfo>,
    raising_methods: HashSet<String>,
    int_returns: HashMap<String, i32>,
    bool_returns: HashMap<String, bool>,
    pending_exception: Option<String>,
    calls: Vec<ManagedCall>,
    class_refs: i64,
    live_objects: i64,
}

impl RuntimeState {
    fn mint(&mut self) -> usize {
        self.next_handle += 1;
        0x10_0000 + self.next_handle * 0x10
    }

    /// Record a call; returns the method name unless the call raised
    fn record_call(
        &mut self,
        object: ManagedObject,
        method: ManagedMethod,
        args: &[ManagedValue],
    ) -> Option<String> {
        let name = self
            .method_info
            .get(&method.addr())
            .map_or_else(|| "<unknown>".to_string(), |m| m.name.clone());
        self.calls.push(ManagedCall {
            object,
            method: name.clone(),
            args: args.to_vec(),
        });
        if self.raising_methods.contains(&name) {
            self.pending_exception = Some(format!("java.lang.IllegalStateException: {}", name));
            return None;
        }
        Some(name)
    }
}

/// In-memory managed runtime
pub struct MockRuntime {
    state: RefCell<RuntimeState>,
}

impl MockRuntime {
    /// Create a runtime that knows `java/lang/Object`
    pub fn new() -> Self {
        let runtime = Self {
            state: RefCell::new(RuntimeState::default()),
        };
        runtime.define_class("java/lang/Object", &[("<init>", "()V")]);
        runtime
    }

    /// Define a class with the given `(name, signature)` methods
    pub fn define_class(&self, name: &str, methods: &[(&str, &str)]) {
        let mut state = self.state.borrow_mut();
        let Some(handle) = ManagedClass::from_addr(state.mint()) else {
            return;
        };
        let methods = methods
            .iter()
            .map(|(n, s)| (n.to_string(), s.to_string()))
            .collect();
        state.classes.insert(
            name.to_string(),
            MockClass {
                handle,
                methods,
                constructor_raises: false,
            },
        );
    }

    /// Make every construction of `class` raise
    pub fn fail_constructor(&self, class: &str) {
        if let Some(c) = self.state.borrow_mut().classes.get_mut(class) {
            c.constructor_raises = true;
        }
    }

    /// Make every call to a method named `method` raise
    pub fn raise_in(&self, method: &str) {
        self.state
            .borrow_mut()
            .raising_methods
            .insert(method.to_string());
    }

    /// Value returned by `int` methods named `method` (default 0)
    pub fn set_int_return(&self, method: &str, value: i32) {
        self.state
            .borrow_mut()
            .int_returns
            .insert(method.to_string(), value);
    }

    /// Value returned by `boolean` methods named `method` (default false)
    pub fn set_bool_return(&self, method: &str, value: bool) {
        self.state
            .borrow_mut()
            .bool_returns
            .insert(method.to_string(), value);
    }

    /// Every call recorded so far
    pub fn calls(&self) -> Vec<ManagedCall> {
        self.state.borrow().calls.clone()
    }

    /// Calls to methods named `method`
    pub fn calls_to(&self, method: &str) -> Vec<ManagedCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Class references handed out and not yet released
    pub fn class_refs(&self) -> i64 {
        self.state.borrow().class_refs
    }

    /// Object references handed out and not yet released
    pub fn live_objects(&self) -> i64 {
        self.state.borrow().live_objects
    }

    /// Class name and constructor arguments of an object
    pub fn object_info(&self, object: ManagedObject) -> Option<(String, Vec<ManagedValue>)> {
        self.state
            .borrow()
            .objects
            .get(&object.addr())
            .map(|o| (o.class.clone(), o.constructor_args.clone()))
    }

    /// Whether an exception is still pending
    pub fn has_pending_exception(&self) -> bool {
        self.state.borrow().pending_exception.is_some()
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedRuntime for MockRuntime {
    fn find_class(&self, name: &str) -> Option<ManagedClass> {
        let mut state = self.state.borrow_mut();
        match state.classes.get(name).map(|c| c.handle) {
            Some(handle) => {
                state.class_refs += 1;
                Some(handle)
            }
            None => {
                state.pending_exception = Some(format!("java.lang.NoClassDefFoundError: {}", name));
                None
            }
        }
    }

    fn get_method(
        &self,
        class: ManagedClass,
        name: &str,
        signature: &str,
    ) -> Option<ManagedMethod> {
        let mut state = self.state.borrow_mut();
        let class_name = state
            .classes
            .iter()
            .find(|(_, c)| c.handle == class)
            .map(|(n, _)| n.clone())?;
        let known = state.classes[&class_name]
            .methods
            .contains(&(name.to_string(), signature.to_string()));
        if !known {
            state.pending_exception = Some(format!(
                "java.lang.NoSuchMethodError: {}.{}{}",
                class_name, name, signature
            ));
            return None;
        }
        let key = (class_name.clone(), name.to_string(), signature.to_string());
        if let Some(method) = state.methods.get(&key) {
            return Some(*method);
        }
        let method = ManagedMethod::from_addr(state.mint())?;
        state.methods.insert(key, method);
        state.method_info.insert(
            method.addr(),
            MethodInfo {
                class: class_name,
                name: name.to_string(),
            },
        );
        Some(method)
    }

    fn new_object(
        &self,
        class: ManagedClass,
        constructor: ManagedMethod,
        args: &[ManagedValue],
    ) -> Option<ManagedObject> {
        let mut state = self.state.borrow_mut();
        let info = state.method_info.get(&constructor.addr())?;
        let class_name = info.class.clone();
        let mock_class = state.classes.get(&class_name)?;
        if mock_class.handle != class {
            return None;
        }
        if mock_class.constructor_raises {
            state.pending_exception =
                Some(format!("java.lang.RuntimeException: {} constructor failed", class_name));
            return None;
        }
        let object = ManagedObject::from_addr(state.mint())?;
        state.objects.insert(
            object.addr(),
            ObjectInfo {
                class: class_name,
                constructor_args: args.to_vec(),
            },
        );
        state.live_objects += 1;
        Some(object)
    }

    fn get_static_method(
        &self,
        class: ManagedClass,
        name: &str,
        signature: &str,
    ) -> Option<ManagedMethod> {
        // statics share the instance method table
        self.get_method(class, name, signature)
    }

    fn call_static_object_method(
        &self,
        class: ManagedClass,
        method: ManagedMethod,
        args: &[ManagedValue],
    ) -> Option<ManagedObject> {
        let mut state = self.state.borrow_mut();
        let class_name = state
            .classes
            .iter()
            .find(|(_, c)| c.handle == class)
            .map(|(n, _)| n.clone())?;
        // the returned reference is recorded as the receiver
        let object = ManagedObject::from_addr(state.mint())?;
        state.record_call(object, method, args)?;
        state.objects.insert(
            object.addr(),
            ObjectInfo {
                class: class_name,
                constructor_args: Vec::new(),
            },
        );
        state.live_objects += 1;
        Some(object)
    }

    fn call_void_method(&self, object: ManagedObject, method: ManagedMethod, args: &[ManagedValue]) {
        let _ = self.state.borrow_mut().record_call(object, method, args);
    }

    fn call_int_method(&self, object: ManagedObject, method: ManagedMethod, args: &[ManagedValue]) -> i32 {
        let mut state = self.state.borrow_mut();
        match state.record_call(object, method, args) {
            Some(name) => state.int_returns.get(&name).copied().unwrap_or(0),
            None => 0,
        }
    }

    fn call_boolean_method(
        &self,
        object: ManagedObject,
        method: ManagedMethod,
        args: &[ManagedValue],
    ) -> bool {
        let mut state = self.state.borrow_mut();
        match state.record_call(object, method, args) {
            Some(name) => state.bool_returns.get(&name).copied().unwrap_or(false),
            None => false,
        }
    }

    fn exception_occurred(&self) -> bool {
        self.state.borrow().pending_exception.is_some()
    }

    fn describe_exception(&self) -> String {
        self.state
            .borrow_mut()
            .pending_exception
            .take()
            .unwrap_or_else(|| "no pending exception".to_string())
    }

    fn release_class(&self, _class: ManagedClass) {
        self.state.borrow_mut().class_refs -= 1;
    }

    fn release_object(&self, _object: ManagedObject) {
        self.state.borrow_mut().live_objects -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_compare_by_value() {
        let host = MockHost::new();
        let a = host.intern("_ready").unwrap();
        let b = host.intern("_ready").unwrap();
        assert_ne!(a.storage(), b.storage());
        assert!(host.names_equal(&a, &b));
        assert_eq!(host.outstanding_names(), 2);
        host.release_name(a);
        host.release_name(b);
        assert_eq!(host.outstanding_names(), 0);
    }

    #[test]
    fn test_name_keys_are_opt_in() {
        let host = MockHost::new();
        let name = host.intern("_process").unwrap();
        assert_eq!(host.name_key(&name), None);
        host.release_name(name);

        let host = MockHost::new().with_name_keys();
        let a = host.intern("_process").unwrap();
        let b = host.intern("_process").unwrap();
        assert!(host.name_key(&a).is_some());
        assert_eq!(host.name_key(&a), host.name_key(&b));
        host.release_name(a);
        host.release_name(b);
    }

    #[test]
    fn test_missing_class_sets_exception() {
        let runtime = MockRuntime::new();
        assert!(runtime.find_class("does/not/Exist").is_none());
        assert!(runtime.exception_occurred());
        assert!(runtime.describe_exception().contains("NoClassDefFoundError"));
        assert!(!runtime.exception_occurred());
    }

    #[test]
    fn test_configured_returns() {
        let runtime = MockRuntime::new();
        runtime.define_class(
            "a/Entry",
            &[("getInstance", "()La/Entry;"), ("level", "()I"), ("ok", "()Z")],
        );
        runtime.set_int_return("level", 2);
        runtime.set_bool_return("ok", true);
        let class = runtime.find_class("a/Entry").unwrap();
        let get = runtime.get_static_method(class, "getInstance", "()La/Entry;").unwrap();
        let object = runtime.call_static_object_method(class, get, &[]).unwrap();
        assert_eq!(runtime.live_objects(), 1);

        let level = runtime.get_method(class, "level", "()I").unwrap();
        let ok = runtime.get_method(class, "ok", "()Z").unwrap();
        assert_eq!(runtime.call_int_method(object, level, &[]), 2);
        assert!(runtime.call_boolean_method(object, ok, &[]));

        runtime.raise_in("ok");
        assert!(!runtime.call_boolean_method(object, ok, &[]));
        assert!(runtime.exception_occurred());
    }

    #[test]
    fn test_method_handles_are_stable() {
        let runtime = MockRuntime::new();
        runtime.define_class("a/B", &[("run", "()V")]);
        let class = runtime.find_class("a/B").unwrap();
        let m1 = runtime.get_method(class, "run", "()V").unwrap();
        let m2 = runtime.get_method(class, "run", "()V").unwrap();
        assert_eq!(m1, m2);
        assert!(runtime.get_method(class, "run", "(D)V").is_none());
        assert!(runtime.exception_occurred());
    }
}
