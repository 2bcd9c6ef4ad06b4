//! plinth CLI - static-site asset build pipeline.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use plinth_pipeline::{BuildMode, Task};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use config::Project;

#[derive(Parser)]
#[command(name = "plinth")]
#[command(about = "Static-site asset build pipeline with a live-reload dev server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Development build: source maps, no bundle minification
    #[arg(long, global = true)]
    dev: bool,

    /// Path to plinth.toml config file
    #[arg(short, long, default_value = "plinth.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the output directory, then run every content task
    Build,

    /// Build, then serve with live reload
    Dev {
        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Serve the output directory and rebuild on change
    Watch {
        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Empty the output directory
    Clean,

    /// Assemble and minify the HTML entry page
    Html,

    /// Compile stylesheets (runs html first)
    Styles,

    /// Bundle scripts
    Scripts,

    /// Compress images
    Images,

    /// Copy fonts
    Fonts,

    /// Regenerate the responsive grid partial
    Grid,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let project = Project::load(&cli.config, BuildMode::from_dev_flag(cli.dev))?;

    // Execute command
    match cli.command {
        Commands::Build => commands::build::run(&project).await?,
        Commands::Dev { port, no_open } => commands::dev::run(&project, port, no_open).await?,
        Commands::Watch { port, no_open } => commands::watch::run(&project, port, no_open).await?,
        Commands::Clean => commands::task::run(&project, Task::Clean).await?,
        Commands::Html => commands::task::run(&project, Task::Html).await?,
        Commands::Styles => commands::task::run(&project, Task::Styles).await?,
        Commands::Scripts => commands::task::run(&project, Task::Scripts).await?,
        Commands::Images => commands::task::run(&project, Task::Images).await?,
        Commands::Fonts => commands::task::run(&project, Task::Fonts).await?,
        Commands::Grid => commands::grid::run(&project).await?,
    }

    Ok(())
}
