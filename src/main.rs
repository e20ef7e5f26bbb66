//! routescope - command-line tool generating OpenAPI documents from web projects.
//!
//! # Usage
//!
//! ```bash
//! routescope [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation, auto-detecting frameworks:
//! ```bash
//! routescope ./my-api-project -o openapi.yaml
//! ```
//!
//! Only look at the Gin and Flask parts of a project, as JSON:
//! ```bash
//! routescope ./monorepo -w gin -w flask -f json -o openapi.json
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! routescope ./my-api-project -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use routescope::cli;

fn main() -> Result<()> {
    // Parse first so the verbose flag can pick the log level
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("routescope starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}
