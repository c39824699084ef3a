use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::engine::GeneratorMode;

#[derive(Parser)]
#[command(name = "armgen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate ARM templates for Kubernetes clusters on Azure")]
#[command(long_about = "Turns a cluster API model into an Azure Resource Manager deployment template, its parameters file and an admin kubeconfig.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the deployment template and parameters for an API model
    Generate {
        /// Path to the API model JSON file
        #[arg(value_name = "APIMODEL")]
        apimodel: PathBuf,

        /// Output directory for generated files
        #[arg(short, long, value_name = "OUTPUT_DIR")]
        output_dir: Option<PathBuf>,

        /// How the template document is assembled
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Print the generated documents without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the admin kubeconfig for an API model
    Kubeconfig {
        /// Path to the API model JSON file
        #[arg(value_name = "APIMODEL")]
        apimodel: PathBuf,
    },

    /// Print the exit code of a node provisioning error
    CseCode {
        /// Error name, e.g. ERR_APT_INSTALL_TIMEOUT
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Structured,
    Legacy,
}

impl From<ModeArg> for GeneratorMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Structured => GeneratorMode::Structured,
            ModeArg::Legacy => GeneratorMode::Legacy,
        }
    }
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
