use clap::{Parser, Subcommand};

use crate::config::{ShowConfigArgs, print_profiles, run_show_config};
use crate::engine::{CheckArgs, FixArgs, run_check, run_fix};
use crate::error::Result;

#[derive(Debug, Parser)]
#[command(
    name = "blockmend",
    about = "Repairs duplicate and missing keys in record-block data files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Repair a file in place.
    Fix(FixArgs),

    /// Report pending repairs without writing; exits nonzero if any.
    Check(CheckArgs),

    /// Print built-in profile names.
    #[command(name = "list-profiles")]
    ListProfiles,

    /// Print the resolved pass configuration as JSON.
    #[command(name = "show-config")]
    ShowConfig(ShowConfigArgs),
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Fix(args) => run_fix(args),
        Commands::Check(args) => run_check(args),
        Commands::ListProfiles => {
            print_profiles();
            Ok(())
        }
        Commands::ShowConfig(args) => run_show_config(args),
    }
}
