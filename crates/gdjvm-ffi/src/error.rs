//! Error types for the GDExtension glue

use gdjvm_sdk::BridgeError;

/// Failure to bind the GDExtension interface
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// `get_proc_address` returned null for a required function
    #[error("GDExtension interface function not found: {0}")]
    MissingInterface(&'static str),

    /// The host has no pointer evaluator for a required operator
    #[error("Variant operator not available: {0}")]
    MissingOperator(&'static str),

    /// The host has no destructor for a required variant type
    #[error("Variant destructor not available: {0}")]
    MissingDestructor(&'static str),
}

/// Invalid or incomplete environment configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("{0} is not defined")]
    Missing(&'static str),

    /// A variable is set but unusable
    #[error("{var} is invalid: {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Failure to bring the extension up
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    /// The GDExtension interface could not be bound
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Resolving or calling the managed entry singleton failed
    #[error(transparent)]
    Managed(#[from] BridgeError),

    /// The entry singleton asked for a level Godot does not have
    #[error("{class}.getMinInitlevel returned unknown level {level}")]
    InvalidLevel {
        /// Entry class
        class: String,
        /// Returned level
        level: i32,
    },

    /// The entry singleton's `entryFunction` returned false
    #[error("{0}.entryFunction rejected the extension")]
    Rejected(String),
}
