//! ManagedRuntime trait: the embedded runtime hosting user classes
//!
//! Mirrors the subset of the JNI invocation surface the bridge consumes.
//! Calls report failure the JNI way: a `None` result and/or a pending
//! exception visible through [`exception_occurred`](ManagedRuntime::exception_occurred).

use crate::handle::{ManagedClass, ManagedMethod, ManagedObject, ManagedValue};

/// Abstract managed runtime.
///
/// Implementations are not expected to be thread-safe; the bridge calls
/// them from the host's thread only.
pub trait ManagedRuntime {
    /// Look up a class by its binary name (e.g. `godot_java/DefaultNodeOverride`)
    fn find_class(&self, name: &str) -> Option<ManagedClass>;

    /// Look up an instance method (or `<init>`) by name and signature
    fn get_method(&self, class: ManagedClass, name: &str, signature: &str)
        -> Option<ManagedMethod>;

    /// Construct an object with the given constructor
    fn new_object(
        &self,
        class: ManagedClass,
        constructor: ManagedMethod,
        args: &[ManagedValue],
    ) -> Option<ManagedObject>;

    /// Look up a static method by name and signature
    fn get_static_method(
        &self,
        class: ManagedClass,
        name: &str,
        signature: &str,
    ) -> Option<ManagedMethod>;

    /// Call a static method returning an object
    fn call_static_object_method(
        &self,
        class: ManagedClass,
        method: ManagedMethod,
        args: &[ManagedValue],
    ) -> Option<ManagedObject>;

    /// Call a void instance method
    fn call_void_method(&self, object: ManagedObject, method: ManagedMethod, args: &[ManagedValue]);

    /// Call an instance method returning `int`
    fn call_int_method(&self, object: ManagedObject, method: ManagedMethod, args: &[ManagedValue])
        -> i32;

    /// Call an instance method returning `boolean`
    fn call_boolean_method(
        &self,
        object: ManagedObject,
        method: ManagedMethod,
        args: &[ManagedValue],
    ) -> bool;

    /// Whether an exception is pending
    fn exception_occurred(&self) -> bool;

    /// Describe and clear the pending exception
    fn describe_exception(&self) -> String;

    /// Drop the bridge's reference to a class
    fn release_class(&self, class: ManagedClass);

    /// Drop the bridge's reference to an object. Collection of the object
    /// itself follows the runtime's own policy.
    fn release_object(&self, object: ManagedObject);
}
