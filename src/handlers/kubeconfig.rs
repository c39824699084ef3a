use std::path::PathBuf;

use crate::engine::generate_kubeconfig;
use crate::handlers::utils::load_api_model;

pub fn handle_kubeconfig(apimodel: PathBuf) -> crate::Result<()> {
    let spec = load_api_model(&apimodel)?;
    let kubeconfig = generate_kubeconfig(&spec)?;
    println!("{}", kubeconfig);
    Ok(())
}
