//! Class descriptor: everything the bridge knows about one registered class
//!
//! A descriptor is created by registration, boxed so its address can serve
//! as the host's class userdata, and read-only afterwards except for its
//! instance arena. Dropping it releases every resource it acquired.

use std::ffi::c_void;
use std::sync::Arc;

use gdjvm_sdk::{BridgeError, BridgeResult, HostApi, ManagedRuntime};
use parking_lot::Mutex;
use slotmap::SlotMap;

use crate::callbacks;
use crate::context::BridgeContext;
use crate::dispatch::DispatchToken;
use crate::instance::{InstanceKey, InstanceSlot};
use crate::managed::ManagedBindings;
use crate::method_table::VirtualMethod;
use crate::symbol_cache::SymbolCache;

/// Interned native class and parent names
pub(crate) struct ClassNames<N> {
    pub(crate) class: N,
    pub(crate) parent: N,
}

impl<N> ClassNames<N> {
    pub(crate) fn intern<H: HostApi<Name = N>>(
        host: &H,
        class: &str,
        parent: &str,
    ) -> BridgeResult<Self> {
        let class_name = host
            .intern(class)
            .ok_or_else(|| BridgeError::InternFailed(class.to_string()))?;
        match host.intern(parent) {
            Some(parent_name) => Ok(Self {
                class: class_name,
                parent: parent_name,
            }),
            None => {
                host.release_name(class_name);
                Err(BridgeError::InternFailed(parent.to_string()))
            }
        }
    }

    pub(crate) fn release<H: HostApi<Name = N>>(self, host: &H) {
        host.release_name(self.class);
        host.release_name(self.parent);
    }
}

/// A registered synthetic class
pub struct ClassDescriptor<H: HostApi, M: ManagedRuntime> {
    pub(crate) ctx: Arc<BridgeContext<H, M>>,
    pub(crate) class_name: String,
    pub(crate) parent_class_name: String,
    pub(crate) managed_class_name: String,
    pub(crate) names: Option<ClassNames<H::Name>>,
    pub(crate) symbols: SymbolCache<H::Name>,
    pub(crate) managed: ManagedBindings,
    pub(crate) dispatch: [DispatchToken; VirtualMethod::COUNT],
    pub(crate) instances: Mutex<SlotMap<InstanceKey, InstanceSlot>>,
}

impl<H: HostApi, M: ManagedRuntime> ClassDescriptor<H, M> {
    /// Assemble a descriptor from fully acquired parts and pin it on the heap
    pub(crate) fn from_parts(
        ctx: Arc<BridgeContext<H, M>>,
        class_name: String,
        parent_class_name: String,
        managed_class_name: String,
        names: ClassNames<H::Name>,
        symbols: SymbolCache<H::Name>,
        managed: ManagedBindings,
    ) -> Box<Self> {
        let descriptor = Box::new(Self {
            ctx,
            class_name,
            parent_class_name,
            managed_class_name,
            names: Some(names),
            symbols,
            managed,
            dispatch: VirtualMethod::ALL.map(DispatchToken::new),
            instances: Mutex::new(SlotMap::with_key()),
        });
        let owner = descriptor.as_userdata() as *const c_void;
        for token in &descriptor.dispatch {
            token.bind(owner);
        }
        descriptor
    }

    /// Native class name
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Native parent class name
    pub fn parent_class_name(&self) -> &str {
        &self.parent_class_name
    }

    /// Managed class name
    pub fn managed_class_name(&self) -> &str {
        &self.managed_class_name
    }

    /// Resolved managed handles
    pub fn managed(&self) -> &ManagedBindings {
        &self.managed
    }

    /// Interned name of a method-table entry
    pub fn symbol(&self, method: VirtualMethod) -> Option<&H::Name> {
        self.symbols.get(method)
    }

    /// Shared host and runtime
    pub fn context(&self) -> &BridgeContext<H, M> {
        &self.ctx
    }

    /// Address handed to the host as class userdata
    #[inline]
    pub(crate) fn as_userdata(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    /// Submit this class to the host registry
    pub(crate) fn submit(&self) -> BridgeResult<()> {
        let Some(names) = &self.names else {
            return Err(BridgeError::HostRejected {
                class: self.class_name.clone(),
                reason: "class names already released".to_string(),
            });
        };
        let callbacks = callbacks::class_callbacks(self);
        self.ctx
            .host()
            .register_class(&names.class, &names.parent, &callbacks)
    }

    /// Remove this class from the host registry
    pub(crate) fn withdraw(&self) {
        if let Some(names) = &self.names {
            self.ctx.host().unregister_class(&names.class);
        }
    }
}

impl<H: HostApi, M: ManagedRuntime> Drop for ClassDescriptor<H, M> {
    fn drop(&mut self) {
        let ctx = Arc::clone(&self.ctx);
        let runtime = ctx.runtime();

        let leftover = self.instances.get_mut().drain().fold(0usize, |n, (_, slot)| {
            if let InstanceSlot::Live(pair) = slot {
                runtime.release_object(pair.managed);
                n + 1
            } else {
                n
            }
        });
        if leftover > 0 {
            log::warn!(
                "{}: released {} instance(s) the host never freed",
                self.class_name,
                leftover
            );
        }

        runtime.release_object(self.managed.placeholder);
        runtime.release_class(self.managed.class);
        self.symbols.release(ctx.host());
        if let Some(names) = self.names.take() {
            names.release(ctx.host());
        }
    }
}
