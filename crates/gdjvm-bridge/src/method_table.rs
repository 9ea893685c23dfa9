//! Fixed table of virtual callbacks the host may invoke
//!
//! The discriminant of each [`VirtualMethod`] is its stable index; the
//! symbol cache, the managed method handles and the dispatch table are all
//! laid out in this order.

/// Argument shape of a virtual callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// No arguments
    None,
    /// One 64-bit float
    Float64,
    /// One object reference
    Reference,
}

impl Arity {
    /// Managed-side signature of a void method with this arity
    pub const fn signature(self) -> &'static str {
        match self {
            Arity::None => "()V",
            Arity::Float64 => "(D)V",
            Arity::Reference => "(Ljava/lang/Object;)V",
        }
    }

    /// Number of raw argument slots the host passes
    pub const fn arg_count(self) -> usize {
        match self {
            Arity::None => 0,
            Arity::Float64 | Arity::Reference => 1,
        }
    }
}

/// A virtual callback of the synthetic class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VirtualMethod {
    /// `_enter_tree`
    EnterTree = 0,
    /// `_exit_tree`
    ExitTree = 1,
    /// `_get_configuration_warnings`
    GetConfigurationWarnings = 2,
    /// `_input`
    Input = 3,
    /// `_physics_process`
    PhysicsProcess = 4,
    /// `_process`
    Process = 5,
    /// `_shortcut_input`
    ShortcutInput = 6,
    /// `_unhandled_input`
    UnhandledInput = 7,
    /// `_unhandled_key_input`
    UnhandledKeyInput = 8,
    /// `_ready`
    Ready = 9,
}

impl VirtualMethod {
    /// Number of entries in the table
    pub const COUNT: usize = 10;

    /// Every entry, in index order
    pub const ALL: [VirtualMethod; Self::COUNT] = [
        VirtualMethod::EnterTree,
        VirtualMethod::ExitTree,
        VirtualMethod::GetConfigurationWarnings,
        VirtualMethod::Input,
        VirtualMethod::PhysicsProcess,
        VirtualMethod::Process,
        VirtualMethod::ShortcutInput,
        VirtualMethod::UnhandledInput,
        VirtualMethod::UnhandledKeyInput,
        VirtualMethod::Ready,
    ];

    /// Stable index
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Entry at `index`
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Symbolic name, shared by the host slot and the managed method
    pub const fn name(self) -> &'static str {
        match self {
            VirtualMethod::EnterTree => "_enter_tree",
            VirtualMethod::ExitTree => "_exit_tree",
            VirtualMethod::GetConfigurationWarnings => "_get_configuration_warnings",
            VirtualMethod::Input => "_input",
            VirtualMethod::PhysicsProcess => "_physics_process",
            VirtualMethod::Process => "_process",
            VirtualMethod::ShortcutInput => "_shortcut_input",
            VirtualMethod::UnhandledInput => "_unhandled_input",
            VirtualMethod::UnhandledKeyInput => "_unhandled_key_input",
            VirtualMethod::Ready => "_ready",
        }
    }

    /// Argument shape
    pub const fn arity(self) -> Arity {
        match self {
            VirtualMethod::PhysicsProcess | VirtualMethod::Process => Arity::Float64,
            VirtualMethod::Input
            | VirtualMethod::ShortcutInput
            | VirtualMethod::UnhandledInput
            | VirtualMethod::UnhandledKeyInput => Arity::Reference,
            VirtualMethod::EnterTree
            | VirtualMethod::ExitTree
            | VirtualMethod::GetConfigurationWarnings
            | VirtualMethod::Ready => Arity::None,
        }
    }

    /// Managed-side signature
    pub const fn signature(self) -> &'static str {
        self.arity().signature()
    }
}

/// Managed constructor signature. The single `long` is the instance
/// back-reference.
pub const CONSTRUCTOR_SIGNATURE: &str = "(J)V";

/// Managed constructor name
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Class of the placeholder passed for reference arguments
pub const PLACEHOLDER_CLASS: &str = "java/lang/Object";

/// Constructor signature of the placeholder class
pub const PLACEHOLDER_CONSTRUCTOR_SIGNATURE: &str = "()V";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_match_positions() {
        for (i, method) in VirtualMethod::ALL.iter().enumerate() {
            assert_eq!(method.index(), i);
            assert_eq!(VirtualMethod::from_index(i), Some(*method));
        }
        assert_eq!(VirtualMethod::from_index(VirtualMethod::COUNT), None);
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = VirtualMethod::ALL.iter().map(|m| m.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), VirtualMethod::COUNT);
    }

    #[test]
    fn test_signatures() {
        assert_eq!(VirtualMethod::Ready.signature(), "()V");
        assert_eq!(VirtualMethod::Process.signature(), "(D)V");
        assert_eq!(VirtualMethod::PhysicsProcess.signature(), "(D)V");
        assert_eq!(VirtualMethod::Input.signature(), "(Ljava/lang/Object;)V");
        assert_eq!(VirtualMethod::GetConfigurationWarnings.arity(), Arity::None);
        assert_eq!(Arity::Reference.arg_count(), 1);
        assert_eq!(Arity::None.arg_count(), 0);
    }
}
