// Handler modules
pub mod cse;
pub mod generate;
pub mod kubeconfig;
pub mod utils;

// Re-export all handler functions
pub use cse::handle_cse_code;
pub use generate::{GeneratedFile, generate_files, handle_generate};
pub use kubeconfig::handle_kubeconfig;
pub use utils::{load_api_model, parse_api_model};
