//! Boundary to the team configuration store.
//!
//! The censor never reads configuration files itself; callers inject an
//! implementation of [`ConfigSource`] describing which paths hold secrets
//! and what their current values are.

use serde_json::Value;

/// Read-only view of the active team configuration.
pub trait ConfigSource: Send + Sync {
    /// Whether any configuration exists at all.
    fn exists(&self) -> bool;

    /// Dot-delimited paths of all properties flagged secure.
    fn find_secure(&self) -> Vec<String>;

    /// Secure property names for one named profile.
    fn secure_props_for_profile(&self, profile_name: &str) -> Vec<String>;

    /// Whether a profile with the given name exists.
    fn profile_exists(&self, profile_name: &str) -> bool;

    /// Name of the default profile for a profile type, if one is set.
    fn default_profile(&self, profile_type: &str) -> Option<String>;

    /// Current value at a dot-delimited path.
    fn value_at(&self, path: &str) -> Option<Value>;
}
