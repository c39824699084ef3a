//! Cluster api model consumed by the generator.

pub mod addons;
pub mod types;
pub mod version;

pub use addons::{is_addon_enabled, is_component_enabled};
pub use types::*;
pub use version::is_kubernetes_version_ge;
