//! Registry of synthetic classes

use std::sync::Arc;

use gdjvm_sdk::{BridgeError, BridgeResult, HostApi, ManagedRuntime};
use rustc_hash::FxHashMap;

use crate::context::BridgeContext;
use crate::descriptor::ClassDescriptor;
use crate::registration::{self, ClassSpec};

/// Owns every class registered with the host.
///
/// Descriptors are boxed and never move while registered, so the host can
/// keep their addresses as class userdata. Dropping the bridge unregisters
/// every remaining class.
pub struct Bridge<H: HostApi, M: ManagedRuntime> {
    ctx: Arc<BridgeContext<H, M>>,
    classes: FxHashMap<String, Box<ClassDescriptor<H, M>>>,
}

impl<H: HostApi, M: ManagedRuntime> Bridge<H, M> {
    /// Create a bridge between `host` and `runtime`
    pub fn new(host: H, runtime: M) -> Self {
        Self {
            ctx: Arc::new(BridgeContext::new(host, runtime)),
            classes: FxHashMap::default(),
        }
    }

    /// The host object system
    pub fn host(&self) -> &H {
        self.ctx.host()
    }

    /// The managed runtime
    pub fn runtime(&self) -> &M {
        self.ctx.runtime()
    }

    /// Shared context
    pub fn context(&self) -> &Arc<BridgeContext<H, M>> {
        &self.ctx
    }

    /// Register a synthetic class backed by a managed class.
    ///
    /// A name that is already registered is rejected before anything is
    /// acquired. On any other failure every resource acquired so far is
    /// released and the host registry is unchanged.
    pub fn register_class(&mut self, spec: &ClassSpec) -> BridgeResult<&ClassDescriptor<H, M>> {
        if self.classes.contains_key(&spec.class_name) {
            log::error!("{}: already registered", spec.class_name);
            return Err(BridgeError::DuplicateClass(spec.class_name.clone()));
        }

        let descriptor = registration::acquire(&self.ctx, spec).map_err(|err| {
            log::error!("{}: registration failed: {}", spec.class_name, err);
            err
        })?;
        if let Err(err) = descriptor.submit() {
            log::error!("{}: host rejected registration: {}", spec.class_name, err);
            return Err(err);
        }

        log::info!(
            "registered {} extends {} as {}",
            spec.class_name,
            spec.parent_class_name,
            spec.managed_class
        );
        Ok(self
            .classes
            .entry(spec.class_name.clone())
            .or_insert(descriptor))
    }

    /// Unregister a class. Returns `false` if it is not registered.
    pub fn unregister_class(&mut self, class_name: &str) -> bool {
        let Some(descriptor) = self.classes.remove(class_name) else {
            return false;
        };
        descriptor.withdraw();
        log::info!("unregistered {}", class_name);
        true
    }

    /// A registered class
    pub fn class(&self, class_name: &str) -> Option<&ClassDescriptor<H, M>> {
        self.classes.get(class_name).map(Box::as_ref)
    }

    /// Names of every registered class
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class is registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl<H: HostApi, M: ManagedRuntime> Drop for Bridge<H, M> {
    fn drop(&mut self) {
        for (_, descriptor) in self.classes.drain() {
            descriptor.withdraw();
        }
    }
}
