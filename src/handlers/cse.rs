use colored::Colorize;

use crate::engine::cse_error_code;

pub fn handle_cse_code(name: String) -> crate::Result<()> {
    let code = cse_error_code(&name);
    if code < 0 {
        log::warn!("{} is not a known provisioning error", name);
        eprintln!("{} unknown error name {}", "warning:".yellow().bold(), name);
    }
    println!("{}", code);
    Ok(())
}
