use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Parser)]
#[command(
    name = "cellar",
    about = "Cellar: a store of versioned, semi-structured records",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Data directory of the file backend [default: ./data]
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

impl Cli {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Write a new version of a cell
    Put(PutArgs),
    /// Read one exact version of a cell
    Get(GetArgs),
    /// Read the latest version of a cell
    Latest(LatestArgs),
    /// Create or list namespaces
    Namespace(NamespaceArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the configured listen address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct PutArgs {
    pub namespace: String,
    pub column: String,
    /// Record body as a JSON object
    pub body: String,
    /// Row key; a fresh UUID v7 when omitted
    #[arg(long)]
    pub row: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub namespace: String,
    pub row: String,
    pub column: String,
    #[arg(allow_negative_numbers = true)]
    pub ref_key: i64,
}

#[derive(Args)]
pub struct LatestArgs {
    pub namespace: String,
    pub row: String,
    pub column: String,
}

#[derive(Args)]
pub struct NamespaceArgs {
    #[command(subcommand)]
    pub action: NamespaceAction,
}

#[derive(Subcommand)]
pub enum NamespaceAction {
    Create { name: String },
    List,
}
