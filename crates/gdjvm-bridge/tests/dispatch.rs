//! Integration tests for virtual-call resolution and forwarding

use std::ffi::c_void;
use std::ptr;

use gdjvm_bridge::{Bridge, ClassSpec, DispatchToken, InstanceKey, RawArgs, VirtualMethod};
use gdjvm_sdk::mock::{MockHost, MockInstance, MockRuntime};
use gdjvm_sdk::{HostApi, ManagedValue};
use proptest::prelude::*;

const MANAGED: &str = "godot_java/DefaultNodeOverride";

fn define_managed(runtime: &MockRuntime, class: &str) {
    let mut methods = vec![("<init>", "(J)V")];
    methods.extend(VirtualMethod::ALL.iter().map(|m| (m.name(), m.signature())));
    runtime.define_class(class, &methods);
}

fn registered(host: MockHost) -> Bridge<MockHost, MockRuntime> {
    let mut bridge = Bridge::new(host, MockRuntime::new());
    define_managed(bridge.runtime(), MANAGED);
    bridge
        .register_class(&ClassSpec::new("JavaNode", "Node", MANAGED))
        .unwrap();
    bridge
}

fn with_instance() -> (Bridge<MockHost, MockRuntime>, MockInstance) {
    let bridge = registered(MockHost::new());
    let instance = bridge.host().instantiate("JavaNode").unwrap();
    (bridge, instance)
}

fn managed_of(bridge: &Bridge<MockHost, MockRuntime>, instance: &MockInstance) -> gdjvm_sdk::ManagedObject {
    let key = InstanceKey::from_instance_ptr(instance.instance).unwrap();
    bridge.class("JavaNode").unwrap().instance(key).unwrap().managed
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_each_name_resolves_to_its_own_entry() {
    for host in [MockHost::new(), MockHost::new().with_name_keys()] {
        let bridge = registered(host);
        let class = bridge.class("JavaNode").unwrap();
        for method in VirtualMethod::ALL {
            let data = bridge.host().virtual_call_data("JavaNode", method.name());
            let token = unsafe { DispatchToken::from_call_data(data) }.unwrap();
            assert_eq!(token.method(), method);
            assert_eq!(data, class.token(method).as_call_data());
            assert_eq!(
                data,
                bridge.host().virtual_call_data("JavaNode", method.name()),
                "resolution must be stable"
            );
        }
    }
}

#[test]
fn test_resolve_compares_by_value() {
    let bridge = registered(MockHost::new());
    let class = bridge.class("JavaNode").unwrap();
    let probe = bridge.host().intern("_process").unwrap();
    assert!(!ptr::eq(&probe, class.symbol(VirtualMethod::Process).unwrap()));
    assert_eq!(
        class.resolve(&probe).map(DispatchToken::method),
        Some(VirtualMethod::Process)
    );
    bridge.host().release_name(probe);
}

#[test]
fn test_resolution_interns_nothing() {
    let bridge = registered(MockHost::new());
    let before = bridge.host().outstanding_names();
    for method in VirtualMethod::ALL {
        bridge.host().virtual_call_data("JavaNode", method.name());
    }
    assert_eq!(bridge.host().outstanding_names(), before);
}

proptest! {
    #[test]
    fn test_other_names_do_not_resolve(name in "_?[a-z_]{0,24}") {
        prop_assume!(VirtualMethod::ALL.iter().all(|m| m.name() != name));
        let bridge = registered(MockHost::new().with_name_keys());
        let data = bridge.host().virtual_call_data("JavaNode", &name);
        prop_assert!(data.is_null());
    }
}

// ============================================================================
// Forwarding
// ============================================================================

#[test]
fn test_no_argument_call() {
    let (bridge, instance) = with_instance();
    let managed = managed_of(&bridge, &instance);

    let call = bridge.host().call_virtual("JavaNode", instance.instance, "_ready", &[]);
    assert!(call.resolved);
    assert!(call.ret_untouched, "return slot must not be written");

    let calls = bridge.runtime().calls_to("_ready");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].object, managed);
    assert!(calls[0].args.is_empty());
}

#[test]
fn test_float_argument_is_delivered() {
    let (bridge, instance) = with_instance();
    let delta = 3.5f64;
    let args = [&delta as *const f64 as *const c_void];

    for name in ["_process", "_physics_process"] {
        let call = bridge.host().call_virtual("JavaNode", instance.instance, name, &args);
        assert!(call.resolved && call.ret_untouched);
        let calls = bridge.runtime().calls_to(name);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec![ManagedValue::Double(3.5)]);
    }
}

#[test]
fn test_reference_argument_is_the_placeholder() {
    let (bridge, instance) = with_instance();
    let placeholder = bridge.class("JavaNode").unwrap().managed().placeholder;
    let event = 0xABCDu64;
    let args = [&event as *const u64 as *const c_void];

    for name in ["_input", "_shortcut_input", "_unhandled_input", "_unhandled_key_input"] {
        bridge.host().call_virtual("JavaNode", instance.instance, name, &args);
        let calls = bridge.runtime().calls_to(name);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec![ManagedValue::Object(placeholder)]);
    }
    let (class, _) = bridge.runtime().object_info(placeholder).unwrap();
    assert_eq!(class, "java/lang/Object");
}

#[test]
fn test_missing_token_makes_no_call() {
    let (bridge, instance) = with_instance();
    let untouched = bridge
        .host()
        .call_with_data("JavaNode", instance.instance, ptr::null_mut(), &[]);
    assert!(untouched);

    let call = bridge.host().call_virtual("JavaNode", instance.instance, "_draw", &[]);
    assert!(!call.resolved);
    assert!(bridge.runtime().calls().is_empty());
}

#[test]
fn test_call_on_freed_instance_is_ignored() {
    let (bridge, instance) = with_instance();
    bridge.host().free("JavaNode", instance.instance);

    bridge.host().call_virtual("JavaNode", instance.instance, "_ready", &[]);
    bridge.host().call_virtual("JavaNode", ptr::null_mut(), "_ready", &[]);
    assert!(bridge.runtime().calls().is_empty());
}

#[test]
fn test_float_call_without_argument_is_ignored() {
    let (bridge, instance) = with_instance();
    bridge.host().call_virtual("JavaNode", instance.instance, "_process", &[]);
    assert!(bridge.runtime().calls().is_empty());
}

#[test]
fn test_managed_exception_is_not_fatal() {
    let (bridge, instance) = with_instance();
    bridge.runtime().raise_in("_enter_tree");

    let call = bridge.host().call_virtual("JavaNode", instance.instance, "_enter_tree", &[]);
    assert!(call.ret_untouched);
    assert!(!bridge.runtime().has_pending_exception(), "exception must be cleared");

    bridge.host().call_virtual("JavaNode", instance.instance, "_ready", &[]);
    assert_eq!(bridge.runtime().calls_to("_ready").len(), 1);
}

#[test]
fn test_exception_is_cleared_with_logging_off() {
    log::set_max_level(log::LevelFilter::Off);
    let (bridge, instance) = with_instance();
    bridge.runtime().raise_in("_process");

    let delta = 0.5f64;
    let args = [&delta as *const f64 as *const c_void];
    bridge.host().call_virtual("JavaNode", instance.instance, "_process", &args);
    assert!(!bridge.runtime().has_pending_exception(), "exception must be cleared");
}

#[test]
fn test_foreign_token_is_ignored() {
    let mut bridge = registered(MockHost::new());
    define_managed(bridge.runtime(), "game/Player");
    bridge
        .register_class(&ClassSpec::new("Player", "Node2D", "game/Player"))
        .unwrap();
    let instance = bridge.host().instantiate("JavaNode").unwrap();
    let key = InstanceKey::from_instance_ptr(instance.instance);

    let node = bridge.class("JavaNode").unwrap();
    let player = bridge.class("Player").unwrap();
    node.invoke(key, Some(player.token(VirtualMethod::Ready)), RawArgs::empty());
    assert!(bridge.runtime().calls().is_empty());

    node.invoke(key, Some(node.token(VirtualMethod::Ready)), RawArgs::empty());
    assert_eq!(bridge.runtime().calls_to("_ready").len(), 1);
}

#[test]
fn test_each_instance_gets_its_own_calls() {
    let bridge = registered(MockHost::new());
    let a = bridge.host().instantiate("JavaNode").unwrap();
    let b = bridge.host().instantiate("JavaNode").unwrap();
    let data = bridge.host().virtual_call_data("JavaNode", "_exit_tree");

    bridge.host().call_with_data("JavaNode", a.instance, data, &[]);
    bridge.host().call_with_data("JavaNode", b.instance, data, &[]);
    bridge.host().call_with_data("JavaNode", b.instance, data, &[]);

    let calls = bridge.runtime().calls_to("_exit_tree");
    let managed_a = managed_of(&bridge, &a);
    let managed_b = managed_of(&bridge, &b);
    assert_eq!(calls.iter().filter(|c| c.object == managed_a).count(), 1);
    assert_eq!(calls.iter().filter(|c| c.object == managed_b).count(), 2);
}
