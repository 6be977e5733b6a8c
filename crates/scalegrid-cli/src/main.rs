use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod config;

#[derive(Parser)]
#[command(
    name = "scalegrid",
    about = "scalegrid: scale groups of server instances up and down",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Directory holding the state database.
    #[arg(long, global = true, default_value = "./scalegrid-data")]
    data_dir: PathBuf,
    /// Config file (default: ./scalegrid.toml when present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Which backend creates and manages instances.
    #[arg(long, global = true, value_enum, default_value_t = Backend::Local)]
    backend: Backend,
    /// Output format: text or json
    #[arg(short, long, global = true, default_value = "text")]
    format: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Write instances straight into the state database.
    Local,
    /// Drive the admin CLI, and the aws CLI for cloud groups.
    Admin,
}

#[derive(Subcommand)]
enum Commands {
    /// Add instances to a scaling group.
    ScaleUp {
        /// Scaling group name
        group: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove instances from a scaling group, heaviest nodes first.
    ScaleDown {
        /// Scaling group name
        group: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// List configured scaling groups and their current size.
    List,
    /// Load nodes, deployment groups, instances and scaling groups from an
    /// inventory TOML file.
    Import {
        /// Path to the inventory file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
                .add_directive("scalegrid=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let settings = config::Settings::load(cli.config.as_deref())?;
    let store = commands::open_store(&cli.data_dir)?;

    match cli.command {
        Commands::ScaleUp { group, quantity } => {
            let scaler = commands::build_scaler(&store, &settings, cli.backend);
            commands::scale::up(&scaler, &group, quantity, &cli.format).await
        }
        Commands::ScaleDown { group, quantity } => {
            let scaler = commands::build_scaler(&store, &settings, cli.backend);
            commands::scale::down(&scaler, &group, quantity, &cli.format).await
        }
        Commands::List => commands::list::list(&store, &cli.format),
        Commands::Import { path } => commands::import::import(&store, &path, &cli.format),
    }
}
