//! # armgen
//!
//! Generates Azure Resource Manager deployment templates for Kubernetes
//! clusters. An API model describing the cluster goes in; the template, its
//! parameters document and an admin kubeconfig come out.
//!
//! ## Example
//!
//! ```rust,no_run
//! use armgen::{GeneratorContext, GeneratorMode, HttpExtensionSource, SubstitutionMode};
//! use armgen::{generate_template, load_api_model};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = load_api_model(Path::new("kubernetes.json"))?;
//! let extensions = HttpExtensionSource::new(None)?;
//! let ctx = GeneratorContext {
//!     generator_code: "aksengine".to_string(),
//!     tool_version: armgen::VERSION.to_string(),
//!     substitution: SubstitutionMode::Strict,
//!     extensions_root_url: armgen::DEFAULT_EXTENSIONS_ROOT_URL.to_string(),
//!     extensions: &extensions,
//! };
//! let generated = generate_template(&spec, &ctx, GeneratorMode::Structured)?;
//! println!("{}", generated.template);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;

// Re-export commonly used types and functions
pub use api::ClusterSpec;
pub use engine::{
    DEFAULT_EXTENSIONS_ROOT_URL, ExtensionSource, GeneratedTemplate, GeneratorContext,
    GeneratorMode, HttpExtensionSource, SubstitutionMode, TemplateGenerator, generate_template,
};
pub use error::{ArmgenError, Result};
pub use handlers::{load_api_model, parse_api_model};
use cli::Commands;
use config::types::Config;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Generate {
            apimodel,
            output_dir,
            mode,
            dry_run,
        } => handlers::handle_generate(apimodel, output_dir, mode.map(Into::into), dry_run, config),
        Commands::Kubeconfig { apimodel } => handlers::handle_kubeconfig(apimodel),
        Commands::CseCode { name } => handlers::handle_cse_code(name),
    }
}
