//! The generation core.
//!
//! Everything below turns a [`ClusterSpec`](crate::api::ClusterSpec) into an
//! ARM deployment template: resource builders, the parameters, variables and
//! outputs sections, the cloud-init payloads and the two document assemblers.

pub mod accessors;
pub mod armtype;
pub mod artifacts;
pub mod assets;
pub mod cse;
pub mod custom_data;
pub mod extensions;
pub mod fragments;
pub mod generator;
pub mod images;
pub mod kubeconfig;
pub mod legacy;
pub mod network;
pub mod outputs;
pub mod params;
pub mod resources;
pub mod substitution;
pub mod variables;

pub use cse::cse_error_code;
pub use extensions::{DEFAULT_EXTENSIONS_ROOT_URL, ExtensionSource, HttpExtensionSource};
pub use generator::{
    GeneratedTemplate, GeneratorContext, GeneratorMode, LegacyGenerator, StructuredGenerator,
    TemplateGenerator, generate_template, validate_distro, validate_orchestrator,
};
pub use kubeconfig::generate_kubeconfig;
pub use network::generate_consecutive_ips;
pub use substitution::SubstitutionMode;
