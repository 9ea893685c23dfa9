//! GDExtension host adapter
//!
//! Implements [`HostApi`] over the function table Godot hands to an
//! extension's entry point. Only the handful of interface functions the
//! bridge needs are loaded; the layouts below follow
//! `gdextension_interface.h` for Godot 4.2.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::ptr;

use gdjvm_sdk::{BridgeResult, ClassCallbacks, HostApi, NativeObject};

use crate::error::LoadError;

// ============================================================================
// C types
// ============================================================================

/// `GDExtensionBool`
pub type GDExtensionBool = u8;

/// `GDExtensionClassLibraryPtr`
pub type GDExtensionClassLibraryPtr = *mut c_void;

/// Untyped interface function, as returned by `get_proc_address`
pub type GDExtensionInterfaceFunctionPtr = Option<unsafe extern "C" fn()>;

/// `GDExtensionInterfaceGetProcAddress`
pub type GDExtensionInterfaceGetProcAddress =
    unsafe extern "C" fn(function_name: *const c_char) -> GDExtensionInterfaceFunctionPtr;

/// `GDEXTENSION_VARIANT_OP_EQUAL`
pub const VARIANT_OP_EQUAL: c_int = 0;

/// `GDEXTENSION_VARIANT_TYPE_STRING_NAME`
pub const VARIANT_TYPE_STRING_NAME: c_int = 21;

type StringNameNewWithUtf8Chars = unsafe extern "C" fn(r_dest: *mut c_void, contents: *const c_char);
type PtrOperatorEvaluator =
    unsafe extern "C" fn(left: *const c_void, right: *const c_void, r_result: *mut c_void);
type VariantGetPtrOperatorEvaluator =
    unsafe extern "C" fn(op: c_int, type_a: c_int, type_b: c_int) -> Option<PtrOperatorEvaluator>;
type PtrDestructor = unsafe extern "C" fn(base: *mut c_void);
type VariantGetPtrDestructor = unsafe extern "C" fn(variant_type: c_int) -> Option<PtrDestructor>;
type ClassdbConstructObject = unsafe extern "C" fn(class_name: *const c_void) -> *mut c_void;
type ClassdbRegisterExtensionClass2 = unsafe extern "C" fn(
    library: GDExtensionClassLibraryPtr,
    class_name: *const c_void,
    parent_class_name: *const c_void,
    extension_funcs: *const GDExtensionClassCreationInfo2,
);
type ClassdbUnregisterExtensionClass =
    unsafe extern "C" fn(library: GDExtensionClassLibraryPtr, class_name: *const c_void);
type ObjectSetInstance =
    unsafe extern "C" fn(object: *mut c_void, class_name: *const c_void, instance: *mut c_void);
type GetGodotVersion = unsafe extern "C" fn(r_godot_version: *mut GDExtensionGodotVersion);

/// Class callback the bridge leaves unset
pub type UnusedCallback = Option<unsafe extern "C" fn()>;

/// `GDExtensionClassCreationInfo2`
#[allow(missing_docs)]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GDExtensionClassCreationInfo2 {
    pub is_virtual: GDExtensionBool,
    pub is_abstract: GDExtensionBool,
    pub is_exposed: GDExtensionBool,
    pub set_func: UnusedCallback,
    pub get_func: UnusedCallback,
    pub get_property_list_func: UnusedCallback,
    pub free_property_list_func: UnusedCallback,
    pub property_can_revert_func: UnusedCallback,
    pub property_get_revert_func: UnusedCallback,
    pub validate_property_func: UnusedCallback,
    pub notification_func: UnusedCallback,
    pub to_string_func: UnusedCallback,
    pub reference_func: UnusedCallback,
    pub unreference_func: UnusedCallback,
    pub create_instance_func: Option<gdjvm_sdk::CreateInstanceFn>,
    pub free_instance_func: Option<gdjvm_sdk::FreeInstanceFn>,
    pub recreate_instance_func: UnusedCallback,
    pub get_virtual_func: UnusedCallback,
    pub get_virtual_call_data_func: Option<gdjvm_sdk::GetVirtualCallDataFn>,
    pub call_virtual_with_data_func: Option<gdjvm_sdk::CallVirtualWithDataFn>,
    pub get_rid_func: UnusedCallback,
    pub class_userdata: *mut c_void,
}

impl GDExtensionClassCreationInfo2 {
    /// Exposed, concrete class driven entirely by `callbacks`
    pub fn from_callbacks(callbacks: &ClassCallbacks) -> Self {
        Self {
            is_virtual: 0,
            is_abstract: 0,
            is_exposed: 1,
            set_func: None,
            get_func: None,
            get_property_list_func: None,
            free_property_list_func: None,
            property_can_revert_func: None,
            property_get_revert_func: None,
            validate_property_func: None,
            notification_func: None,
            to_string_func: None,
            reference_func: None,
            unreference_func: None,
            create_instance_func: Some(callbacks.create_instance),
            free_instance_func: Some(callbacks.free_instance),
            recreate_instance_func: None,
            get_virtual_func: None,
            get_virtual_call_data_func: Some(callbacks.get_virtual_call_data),
            call_virtual_with_data_func: Some(callbacks.call_virtual_with_data),
            get_rid_func: None,
            class_userdata: callbacks.class_userdata,
        }
    }
}

/// `GDExtensionGodotVersion`
#[allow(missing_docs)]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GDExtensionGodotVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub string: *const c_char,
}

/// Engine version reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GodotVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
    /// Full version string
    pub string: String,
}

/// Godot `StringName`: a single pointer to reference-counted, globally
/// interned data. Only ever touched through the interface functions.
#[repr(transparent)]
#[derive(Debug)]
pub struct GdStringName(*mut c_void);

impl GdStringName {
    #[inline]
    fn as_ptr(&self) -> *const c_void {
        self as *const Self as *const c_void
    }

    #[inline]
    fn as_mut_ptr(&mut self) -> *mut c_void {
        self as *mut Self as *mut c_void
    }
}

// ============================================================================
// GdExtensionHost
// ============================================================================

macro_rules! load_interface {
    ($get_proc_address:expr, $name:literal) => {{
        let name = concat!($name, "\0");
        match ($get_proc_address)(name.as_ptr() as *const c_char) {
            Some(function) => std::mem::transmute(function),
            None => return Err(LoadError::MissingInterface($name)),
        }
    }};
}

/// The GDExtension interface functions the bridge uses
pub struct GdExtensionHost {
    library: GDExtensionClassLibraryPtr,
    string_name_new_with_utf8_chars: StringNameNewWithUtf8Chars,
    classdb_construct_object: ClassdbConstructObject,
    classdb_register_extension_class2: ClassdbRegisterExtensionClass2,
    classdb_unregister_extension_class: ClassdbUnregisterExtensionClass,
    object_set_instance: ObjectSetInstance,
    string_name_equal: PtrOperatorEvaluator,
    string_name_destructor: PtrDestructor,
    get_godot_version: Option<GetGodotVersion>,
}

impl GdExtensionHost {
    /// Resolve every interface function through `get_proc_address`
    ///
    /// # Safety
    ///
    /// `get_proc_address` and `library` must be the values Godot passed to
    /// the extension entry point.
    pub unsafe fn load(
        get_proc_address: GDExtensionInterfaceGetProcAddress,
        library: GDExtensionClassLibraryPtr,
    ) -> Result<Self, LoadError> {
        let string_name_new_with_utf8_chars: StringNameNewWithUtf8Chars =
            load_interface!(get_proc_address, "string_name_new_with_utf8_chars");
        let variant_get_ptr_operator_evaluator: VariantGetPtrOperatorEvaluator =
            load_interface!(get_proc_address, "variant_get_ptr_operator_evaluator");
        let variant_get_ptr_destructor: VariantGetPtrDestructor =
            load_interface!(get_proc_address, "variant_get_ptr_destructor");
        let classdb_construct_object: ClassdbConstructObject =
            load_interface!(get_proc_address, "classdb_construct_object");
        let classdb_register_extension_class2: ClassdbRegisterExtensionClass2 =
            load_interface!(get_proc_address, "classdb_register_extension_class2");
        let classdb_unregister_extension_class: ClassdbUnregisterExtensionClass =
            load_interface!(get_proc_address, "classdb_unregister_extension_class");
        let object_set_instance: ObjectSetInstance =
            load_interface!(get_proc_address, "object_set_instance");

        let string_name_equal = variant_get_ptr_operator_evaluator(
            VARIANT_OP_EQUAL,
            VARIANT_TYPE_STRING_NAME,
            VARIANT_TYPE_STRING_NAME,
        )
        .ok_or(LoadError::MissingOperator("StringName == StringName"))?;
        let string_name_destructor = variant_get_ptr_destructor(VARIANT_TYPE_STRING_NAME)
            .ok_or(LoadError::MissingDestructor("StringName"))?;

        let get_godot_version = get_proc_address(b"get_godot_version\0".as_ptr() as *const c_char)
            .map(|function| std::mem::transmute::<unsafe extern "C" fn(), GetGodotVersion>(function));

        let host = Self {
            library,
            string_name_new_with_utf8_chars,
            classdb_construct_object,
            classdb_register_extension_class2,
            classdb_unregister_extension_class,
            object_set_instance,
            string_name_equal,
            string_name_destructor,
            get_godot_version,
        };
        match host.godot_version() {
            Some(version) => log::info!("loaded GDExtension interface ({})", version.string),
            None => log::info!("loaded GDExtension interface"),
        }
        Ok(host)
    }

    /// Engine version, if the host exposes it
    pub fn godot_version(&self) -> Option<GodotVersion> {
        let get_godot_version = self.get_godot_version?;
        let mut raw = GDExtensionGodotVersion {
            major: 0,
            minor: 0,
            patch: 0,
            string: ptr::null(),
        };
        unsafe { get_godot_version(&mut raw) };
        let string = if raw.string.is_null() {
            format!("{}.{}.{}", raw.major, raw.minor, raw.patch)
        } else {
            unsafe { CStr::from_ptr(raw.string) }
                .to_string_lossy()
                .into_owned()
        };
        Some(GodotVersion {
            major: raw.major,
            minor: raw.minor,
            patch: raw.patch,
            string,
        })
    }

    /// Library pointer passed to class registration
    pub fn library(&self) -> GDExtensionClassLibraryPtr {
        self.library
    }
}

impl HostApi for GdExtensionHost {
    type Name = GdStringName;

    fn intern(&self, name: &str) -> Option<GdStringName> {
        let contents = CString::new(name).ok()?;
        let mut dest = GdStringName(ptr::null_mut());
        unsafe { (self.string_name_new_with_utf8_chars)(dest.as_mut_ptr(), contents.as_ptr()) };
        Some(dest)
    }

    fn release_name(&self, mut name: GdStringName) {
        unsafe { (self.string_name_destructor)(name.as_mut_ptr()) };
    }

    fn names_equal(&self, a: &GdStringName, b: &GdStringName) -> bool {
        let mut result: GDExtensionBool = 0;
        unsafe {
            (self.string_name_equal)(
                a.as_ptr(),
                b.as_ptr(),
                &mut result as *mut GDExtensionBool as *mut c_void,
            )
        };
        result != 0
    }

    fn name_key(&self, name: &GdStringName) -> Option<u64> {
        Some(name.0 as usize as u64)
    }

    fn register_class(
        &self,
        name: &GdStringName,
        parent: &GdStringName,
        callbacks: &ClassCallbacks,
    ) -> BridgeResult<()> {
        let info = GDExtensionClassCreationInfo2::from_callbacks(callbacks);
        unsafe {
            (self.classdb_register_extension_class2)(
                self.library,
                name.as_ptr(),
                parent.as_ptr(),
                &info,
            )
        };
        Ok(())
    }

    fn unregister_class(&self, name: &GdStringName) {
        unsafe { (self.classdb_unregister_extension_class)(self.library, name.as_ptr()) };
    }

    fn construct_object(&self, parent: &GdStringName) -> Option<NativeObject> {
        NativeObject::from_ptr(unsafe { (self.classdb_construct_object)(parent.as_ptr()) })
    }

    fn set_instance(&self, object: NativeObject, class_name: &GdStringName, instance: *mut c_void) {
        unsafe { (self.object_set_instance)(object.as_ptr(), class_name.as_ptr(), instance) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_creation_info_layout() {
        // three flags padded to a pointer, then 18 callbacks and the userdata
        assert_eq!(size_of::<GDExtensionClassCreationInfo2>(), 160);
        assert_eq!(align_of::<GDExtensionClassCreationInfo2>(), 8);
        assert_eq!(size_of::<GdStringName>(), 8);
        assert_eq!(size_of::<GDExtensionGodotVersion>(), 24);
    }

    unsafe extern "C" fn create(_: *mut c_void) -> *mut c_void {
        ptr::null_mut()
    }
    unsafe extern "C" fn free(_: *mut c_void, _: *mut c_void) {}
    unsafe extern "C" fn get_virtual(_: *mut c_void, _: *const c_void) -> *mut c_void {
        ptr::null_mut()
    }
    unsafe extern "C" fn call(
        _: *mut c_void,
        _: *const c_void,
        _: *mut c_void,
        _: *const *const c_void,
        _: *mut c_void,
    ) {
    }

    #[test]
    fn test_creation_info_sets_only_bridge_callbacks() {
        let mut userdata = 7u8;
        let callbacks = ClassCallbacks {
            class_userdata: &mut userdata as *mut u8 as *mut c_void,
            create_instance: create,
            free_instance: free,
            get_virtual_call_data: get_virtual,
            call_virtual_with_data: call,
        };
        let info = GDExtensionClassCreationInfo2::from_callbacks(&callbacks);
        assert_eq!((info.is_virtual, info.is_abstract, info.is_exposed), (0, 0, 1));
        assert!(info.create_instance_func.is_some());
        assert!(info.free_instance_func.is_some());
        assert!(info.get_virtual_call_data_func.is_some());
        assert!(info.call_virtual_with_data_func.is_some());
        assert!(info.get_virtual_func.is_none());
        assert!(info.notification_func.is_none());
        assert!(info.recreate_instance_func.is_none());
        assert_eq!(info.class_userdata, callbacks.class_userdata);
    }
}
