//! Environment configuration
//!
//! The extension is configured entirely through environment variables read
//! when Godot loads the library:
//!
//! | variable              | required | default                          |
//! |-----------------------|----------|----------------------------------|
//! | `CLASSPATH`           | yes      |                                  |
//! | `ENTRY_CLASS`         | yes      |                                  |
//! | `GDJVM_CLASS_NAME`    | no       | `JavaNode`                       |
//! | `GDJVM_PARENT_CLASS`  | no       | `Node`                           |
//! | `GDJVM_MANAGED_CLASS` | no       | `godot_java/DefaultNodeOverride` |

use gdjvm_bridge::ClassSpec;

use crate::error::ConfigError;

/// Managed class path
pub const ENV_CLASSPATH: &str = "CLASSPATH";
/// Managed entry singleton class
pub const ENV_ENTRY_CLASS: &str = "ENTRY_CLASS";
/// Native name of the registered class
pub const ENV_CLASS_NAME: &str = "GDJVM_CLASS_NAME";
/// Native parent of the registered class
pub const ENV_PARENT_CLASS: &str = "GDJVM_PARENT_CLASS";
/// Managed class backing the registered class
pub const ENV_MANAGED_CLASS: &str = "GDJVM_MANAGED_CLASS";

/// Default native class name
pub const DEFAULT_CLASS_NAME: &str = "JavaNode";
/// Default native parent class
pub const DEFAULT_PARENT_CLASS: &str = "Node";
/// Default managed class
pub const DEFAULT_MANAGED_CLASS: &str = "godot_java/DefaultNodeOverride";

/// Everything needed to start the runtime and register the class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Managed class path
    pub classpath: String,
    /// Managed entry singleton class, in `a/b/C` form
    pub entry_class: String,
    /// Native name of the registered class
    pub class_name: String,
    /// Native parent class
    pub parent_class: String,
    /// Managed class backing the registered class
    pub managed_class: String,
}

impl BridgeConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| -> Result<String, ConfigError> {
            match lookup(var) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(ConfigError::Missing(var)),
            }
        };
        let optional = |var: &'static str, default: &str| -> Result<String, ConfigError> {
            match lookup(var) {
                None => Ok(default.to_string()),
                Some(value) if value.is_empty() => Err(ConfigError::Invalid {
                    var,
                    reason: "empty value".to_string(),
                }),
                Some(value) => Ok(value),
            }
        };

        let config = Self {
            classpath: required(ENV_CLASSPATH)?,
            entry_class: binary_name(ENV_ENTRY_CLASS, required(ENV_ENTRY_CLASS)?)?,
            class_name: optional(ENV_CLASS_NAME, DEFAULT_CLASS_NAME)?,
            parent_class: optional(ENV_PARENT_CLASS, DEFAULT_PARENT_CLASS)?,
            managed_class: binary_name(
                ENV_MANAGED_CLASS,
                optional(ENV_MANAGED_CLASS, DEFAULT_MANAGED_CLASS)?,
            )?,
        };
        log::debug!("configuration: {:?}", config);
        Ok(config)
    }

    /// Runtime option carrying the class path
    pub fn classpath_option(&self) -> String {
        format!("-Djava.class.path={}", self.classpath)
    }

    /// Signature of the entry singleton's `getInstance`
    pub fn singleton_getter_signature(&self) -> String {
        format!("()L{};", self.entry_class)
    }

    /// The class to register
    pub fn class_spec(&self) -> ClassSpec {
        ClassSpec::new(&self.class_name, &self.parent_class, &self.managed_class)
    }
}

/// Accept `a.b.C` or `a/b/C`; produce `a/b/C`
fn binary_name(var: &'static str, name: String) -> Result<String, ConfigError> {
    if name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("'{}' contains whitespace", name),
        });
    }
    Ok(name.replace('.', "/"))
}
