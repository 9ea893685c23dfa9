//! Instance pairs
//!
//! Each live instance of a synthetic class is a native object paired with a
//! managed object. Pairs sit in the descriptor's slot map; the slot key,
//! encoded as a non-zero 64-bit integer, is the only value either side ever
//! holds, so a stale reference fails lookup instead of being dereferenced.

use std::ffi::c_void;

use gdjvm_sdk::{HostApi, ManagedObject, ManagedRuntime, ManagedValue, NativeObject};
use slotmap::{new_key_type, Key, KeyData};

use crate::descriptor::ClassDescriptor;
use crate::managed;

// The host instance pointer carries the whole key, generation included.
#[cfg(not(target_pointer_width = "64"))]
compile_error!("instance keys are carried in host pointers and need a 64-bit target");

new_key_type! {
    /// Generational key of an instance pair
    pub struct InstanceKey;
}

impl InstanceKey {
    /// Encode as a non-zero integer
    #[inline]
    pub fn to_bits(self) -> u64 {
        self.data().as_ffi()
    }

    /// Decode an integer produced by [`to_bits`](Self::to_bits). Zero is
    /// never a valid key.
    #[inline]
    pub fn from_bits(bits: u64) -> Option<Self> {
        (bits != 0).then(|| KeyData::from_ffi(bits).into())
    }

    /// Encode as the host's instance pointer
    #[inline]
    pub fn to_instance_ptr(self) -> *mut c_void {
        self.to_bits() as usize as *mut c_void
    }

    /// Decode the host's instance pointer
    #[inline]
    pub fn from_instance_ptr(ptr: *mut c_void) -> Option<Self> {
        Self::from_bits(ptr as usize as u64)
    }

    /// Decode the value a managed object received in its constructor
    #[inline]
    pub fn from_back_reference(value: i64) -> Option<Self> {
        Self::from_bits(value as u64)
    }
}

/// Native object and the managed object standing behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstancePair {
    /// Host-side object
    pub native: NativeObject,
    /// Managed-side object
    pub managed: ManagedObject,
}

/// Arena entry
#[derive(Debug, Clone, Copy)]
pub(crate) enum InstanceSlot {
    /// Key handed to the managed constructor; pair not complete yet
    Reserved,
    /// Both sides constructed
    Live(InstancePair),
}

impl<H: HostApi, M: ManagedRuntime> ClassDescriptor<H, M> {
    /// Build a new instance pair. Returns the native object, or `None` if
    /// either side could not be constructed; nothing is left behind in that
    /// case.
    pub fn create_instance(&self) -> Option<NativeObject> {
        let names = self.names.as_ref()?;
        let key = self.instances.lock().insert(InstanceSlot::Reserved);
        let runtime = self.ctx.runtime();

        let managed = match managed::construct(
            runtime,
            self.managed.class,
            self.managed.constructor,
            &[ManagedValue::Long(key.to_bits() as i64)],
        ) {
            Ok(object) => object,
            Err(err) => {
                log::error!(
                    "{}: cannot construct {}: {}",
                    self.class_name,
                    self.managed_class_name,
                    err
                );
                self.instances.lock().remove(key);
                return None;
            }
        };

        let host = self.ctx.host();
        let Some(native) = host.construct_object(&names.parent) else {
            log::error!(
                "{}: host could not construct a {}",
                self.class_name,
                self.parent_class_name
            );
            runtime.release_object(managed);
            self.instances.lock().remove(key);
            return None;
        };

        if let Some(slot) = self.instances.lock().get_mut(key) {
            *slot = InstanceSlot::Live(InstancePair { native, managed });
        }
        host.set_instance(native, &names.class, key.to_instance_ptr());

        log::debug!("{}: created {:?} / {:?}", self.class_name, native, managed);
        Some(native)
    }

    /// Tear down the pair behind `key`. Unknown or already freed keys are
    /// ignored.
    pub fn free_instance(&self, key: InstanceKey) {
        let removed = {
            let mut instances = self.instances.lock();
            match instances.get(key) {
                Some(InstanceSlot::Live(_)) => instances.remove(key),
                _ => None,
            }
        };
        match removed {
            Some(InstanceSlot::Live(pair)) => {
                log::debug!("{}: freed {:?}", self.class_name, pair.native);
                self.ctx.runtime().release_object(pair.managed);
            }
            _ => log::debug!("{}: free of unknown instance ignored", self.class_name),
        }
    }

    /// The live pair behind `key`
    pub fn instance(&self, key: InstanceKey) -> Option<InstancePair> {
        match self.instances.lock().get(key) {
            Some(InstanceSlot::Live(pair)) => Some(*pair),
            _ => None,
        }
    }

    /// Number of live pairs
    pub fn live_instances(&self) -> usize {
        self.instances
            .lock()
            .values()
            .filter(|slot| matches!(slot, InstanceSlot::Live(_)))
            .count()
    }
}
