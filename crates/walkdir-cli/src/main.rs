//! walkdir - command-line front end
//!
//! ## Commands
//!
//! - `list`: recursively list directories, exercising every walker option
//! - `ci`: run the CI plan for the toolchain named by `TRAVIS_RUST_VERSION`

mod ci;
mod list;

use std::io::Write;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

use crate::ci::CiArgs;
use crate::list::ListArgs;

#[derive(Parser)]
#[command(name = "walkdir")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recursively walk directories and run the walkdir CI script", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List files using walkdir
    List(ListArgs),

    /// Run the CI build/doc/test sequence for the toolchain under test
    Ci(CiArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    walkdir_ci::telemetry::init_tracing(cli.log_json, level);

    match cli.command {
        Commands::List(args) => list::cmd_list(&args),
        Commands::Ci(args) => {
            let code = match ci::cmd_ci(&args).await {
                Ok(code) => code,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    ci::failure_exit_code(&err)
                }
            };
            if code != 0 {
                std::io::stdout().flush()?;
                std::process::exit(code);
            }
            Ok(())
        }
    }
}
