//! Error types for the bridge ABI

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// The managed runtime has no class with this name
    #[error("Managed class not found: {0}")]
    ClassNotFound(String),

    /// A method-table entry has no managed counterpart
    #[error("Managed method not found: {class}.{name}{signature}")]
    MethodNotFound {
        /// Managed class name
        class: String,
        /// Method name
        name: String,
        /// Expected signature
        signature: String,
    },

    /// The managed class has no constructor with the bridge signature
    #[error("Managed constructor not found: {class}{signature}")]
    ConstructorNotFound {
        /// Managed class name
        class: String,
        /// Expected signature
        signature: String,
    },

    /// The host refused to intern a symbolic name
    #[error("Failed to intern host name: {0}")]
    InternFailed(String),

    /// The managed runtime raised an exception
    #[error("Managed exception: {0}")]
    ManagedException(String),

    /// A native class with this name is already registered
    #[error("Class already registered: {0}")]
    DuplicateClass(String),

    /// The host class registry rejected the class
    #[error("Host rejected class {class}: {reason}")]
    HostRejected {
        /// Native class name
        class: String,
        /// Host-provided reason
        reason: String,
    },
}
