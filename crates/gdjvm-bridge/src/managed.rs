//! Managed-runtime call helpers
//!
//! Every call into the runtime is followed by an exception check. A pending
//! exception is described (which clears it) and either surfaced as
//! `BridgeError::ManagedException` or logged.

use gdjvm_sdk::{
    BridgeError, BridgeResult, ManagedClass, ManagedMethod, ManagedObject, ManagedRuntime,
    ManagedValue,
};

use crate::method_table::VirtualMethod;

/// Handles resolved once per registered class
#[derive(Debug, Clone, Copy)]
pub struct ManagedBindings {
    /// The user's class
    pub class: ManagedClass,
    /// Its `(J)V` constructor
    pub constructor: ManagedMethod,
    /// One handle per method-table entry, in index order
    pub methods: [ManagedMethod; VirtualMethod::COUNT],
    /// Object passed in place of reference arguments
    pub placeholder: ManagedObject,
}

impl ManagedBindings {
    /// Handle of a method-table entry
    #[inline]
    pub fn method(&self, method: VirtualMethod) -> ManagedMethod {
        self.methods[method.index()]
    }
}

/// Turn a pending exception into an error
pub(crate) fn check_exception<M: ManagedRuntime>(runtime: &M) -> BridgeResult<()> {
    if runtime.exception_occurred() {
        return Err(BridgeError::ManagedException(runtime.describe_exception()));
    }
    Ok(())
}

/// Clear a pending exception, if any, and log its description
fn log_pending<M: ManagedRuntime>(runtime: &M) {
    if runtime.exception_occurred() {
        // describing clears; it must run whether or not error logging is on
        let description = runtime.describe_exception();
        log::error!("{}", description);
    }
}

pub(crate) fn find_class<M: ManagedRuntime>(runtime: &M, name: &str) -> BridgeResult<ManagedClass> {
    match runtime.find_class(name) {
        Some(class) => {
            if let Err(err) = check_exception(runtime) {
                runtime.release_class(class);
                return Err(err);
            }
            Ok(class)
        }
        None => {
            log_pending(runtime);
            Err(BridgeError::ClassNotFound(name.to_string()))
        }
    }
}

pub(crate) fn resolve_constructor<M: ManagedRuntime>(
    runtime: &M,
    class: ManagedClass,
    class_name: &str,
    signature: &str,
) -> BridgeResult<ManagedMethod> {
    match runtime.get_method(class, crate::method_table::CONSTRUCTOR_NAME, signature) {
        Some(ctor) => check_exception(runtime).map(|()| ctor),
        None => {
            log_pending(runtime);
            Err(BridgeError::ConstructorNotFound {
                class: class_name.to_string(),
                signature: signature.to_string(),
            })
        }
    }
}

pub(crate) fn resolve_method<M: ManagedRuntime>(
    runtime: &M,
    class: ManagedClass,
    class_name: &str,
    method: VirtualMethod,
) -> BridgeResult<ManagedMethod> {
    match runtime.get_method(class, method.name(), method.signature()) {
        Some(handle) => check_exception(runtime).map(|()| handle),
        None => {
            log_pending(runtime);
            Err(BridgeError::MethodNotFound {
                class: class_name.to_string(),
                name: method.name().to_string(),
                signature: method.signature().to_string(),
            })
        }
    }
}

/// Construct an object; an object produced alongside a pending exception
/// is released
pub(crate) fn construct<M: ManagedRuntime>(
    runtime: &M,
    class: ManagedClass,
    constructor: ManagedMethod,
    args: &[ManagedValue],
) -> BridgeResult<ManagedObject> {
    let object = runtime.new_object(class, constructor, args);
    if let Err(err) = check_exception(runtime) {
        if let Some(object) = object {
            runtime.release_object(object);
        }
        return Err(err);
    }
    object.ok_or_else(|| BridgeError::ManagedException("constructor returned no object".to_string()))
}

/// Create the object passed for reference-typed callback arguments
pub(crate) fn create_placeholder<M: ManagedRuntime>(runtime: &M) -> BridgeResult<ManagedObject> {
    use crate::method_table::{PLACEHOLDER_CLASS, PLACEHOLDER_CONSTRUCTOR_SIGNATURE};

    let class = find_class(runtime, PLACEHOLDER_CLASS)?;
    let object = resolve_constructor(
        runtime,
        class,
        PLACEHOLDER_CLASS,
        PLACEHOLDER_CONSTRUCTOR_SIGNATURE,
    )
    .and_then(|ctor| construct(runtime, class, ctor, &[]));
    runtime.release_class(class);
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdjvm_sdk::mock::MockRuntime;

    #[test]
    fn test_missing_class_is_reported_and_cleared() {
        let runtime = MockRuntime::new();
        let err = find_class(&runtime, "no/Such").unwrap_err();
        assert_eq!(err, BridgeError::ClassNotFound("no/Such".to_string()));
        assert!(!runtime.has_pending_exception());
        assert_eq!(runtime.class_refs(), 0);
    }

    #[test]
    fn test_missing_method_names_signature() {
        let runtime = MockRuntime::new();
        runtime.define_class("a/Node", &[("_ready", "()V")]);
        let class = find_class(&runtime, "a/Node").unwrap();
        let err = resolve_method(&runtime, class, "a/Node", VirtualMethod::Process).unwrap_err();
        assert_eq!(
            err,
            BridgeError::MethodNotFound {
                class: "a/Node".to_string(),
                name: "_process".to_string(),
                signature: "(D)V".to_string(),
            }
        );
        assert!(resolve_method(&runtime, class, "a/Node", VirtualMethod::Ready).is_ok());
        runtime.release_class(class);
    }

    #[test]
    fn test_placeholder_releases_its_class() {
        let runtime = MockRuntime::new();
        let placeholder = create_placeholder(&runtime).unwrap();
        assert_eq!(runtime.class_refs(), 0);
        assert_eq!(runtime.live_objects(), 1);
        let (class, args) = runtime.object_info(placeholder).unwrap();
        assert_eq!(class, "java/lang/Object");
        assert!(args.is_empty());
    }

    #[test]
    fn test_raising_constructor_yields_error() {
        let runtime = MockRuntime::new();
        runtime.define_class("a/Node", &[("<init>", "(J)V")]);
        runtime.fail_constructor("a/Node");
        let class = find_class(&runtime, "a/Node").unwrap();
        let ctor = resolve_constructor(&runtime, class, "a/Node", "(J)V").unwrap();
        let err = construct(&runtime, class, ctor, &[ManagedValue::Long(1)]).unwrap_err();
        assert!(matches!(err, BridgeError::ManagedException(_)));
        assert_eq!(runtime.live_objects(), 0);
        assert!(!runtime.has_pending_exception());
    }
}
