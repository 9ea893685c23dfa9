//! Registration: acquiring everything a class descriptor holds
//!
//! Resources are acquired in a fixed order and parked in a staging guard
//! until the descriptor takes them over. If any step fails, dropping the
//! guard releases what was acquired so far.

use std::sync::Arc;

use gdjvm_sdk::{BridgeResult, HostApi, ManagedClass, ManagedObject, ManagedRuntime};

use crate::context::BridgeContext;
use crate::descriptor::{ClassDescriptor, ClassNames};
use crate::managed::{self, ManagedBindings};
use crate::method_table::{VirtualMethod, CONSTRUCTOR_SIGNATURE};
use crate::symbol_cache::SymbolCache;

/// What to register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSpec {
    /// Native name of the new class
    pub class_name: String,
    /// Built-in native class it extends
    pub parent_class_name: String,
    /// Managed class implementing it, in `a/b/C` form
    pub managed_class: String,
}

impl ClassSpec {
    /// Create a spec
    pub fn new(
        class_name: impl Into<String>,
        parent_class_name: impl Into<String>,
        managed_class: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            parent_class_name: parent_class_name.into(),
            managed_class: managed_class.into(),
        }
    }
}

/// Partially acquired resources
struct Staging<'a, H: HostApi, M: ManagedRuntime> {
    ctx: &'a BridgeContext<H, M>,
    class: Option<ManagedClass>,
    placeholder: Option<ManagedObject>,
}

impl<'a, H: HostApi, M: ManagedRuntime> Staging<'a, H, M> {
    fn new(ctx: &'a BridgeContext<H, M>) -> Self {
        Self {
            ctx,
            class: None,
            placeholder: None,
        }
    }

    /// Hand everything over to the caller
    fn disarm(mut self) {
        self.class = None;
        self.placeholder = None;
    }
}

impl<H: HostApi, M: ManagedRuntime> Drop for Staging<'_, H, M> {
    fn drop(&mut self) {
        if let Some(placeholder) = self.placeholder.take() {
            self.ctx.runtime().release_object(placeholder);
        }
        if let Some(class) = self.class.take() {
            self.ctx.runtime().release_class(class);
        }
    }
}

/// Acquire every resource of a descriptor. The result is not yet visible to
/// the host.
pub(crate) fn acquire<H: HostApi, M: ManagedRuntime>(
    ctx: &Arc<BridgeContext<H, M>>,
    spec: &ClassSpec,
) -> BridgeResult<Box<ClassDescriptor<H, M>>> {
    let runtime = ctx.runtime();
    let mut staging = Staging::new(&**ctx);

    let class = *staging
        .class
        .insert(managed::find_class(runtime, &spec.managed_class)?);
    let constructor =
        managed::resolve_constructor(runtime, class, &spec.managed_class, CONSTRUCTOR_SIGNATURE)?;

    let mut methods = [constructor; VirtualMethod::COUNT];
    for method in VirtualMethod::ALL {
        methods[method.index()] =
            managed::resolve_method(runtime, class, &spec.managed_class, method)?;
    }

    let placeholder = *staging
        .placeholder
        .insert(managed::create_placeholder(runtime)?);

    let host = ctx.host();
    let names = ClassNames::intern(host, &spec.class_name, &spec.parent_class_name)?;
    let symbols = match SymbolCache::build(host) {
        Ok(symbols) => symbols,
        Err(err) => {
            names.release(host);
            return Err(err);
        }
    };
    staging.disarm();

    let bindings = ManagedBindings {
        class,
        constructor,
        methods,
        placeholder,
    };

    Ok(ClassDescriptor::from_parts(
        Arc::clone(ctx),
        spec.class_name.clone(),
        spec.parent_class_name.clone(),
        spec.managed_class.clone(),
        names,
        symbols,
        bindings,
    ))
}
