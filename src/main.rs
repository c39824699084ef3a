use clap::Parser;
use colored::Colorize;
use armgen::{cli::Cli, config, run_command};
use std::process;

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run() -> armgen::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    // Load configuration
    let cwd = std::env::current_dir().ok();
    let config = config::load_config(cli.config.as_deref(), cwd.as_deref())?;

    run_command(cli.command, &config)
}
