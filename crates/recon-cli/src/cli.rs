use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "recon",
    about = "Reconcile two copies of a data store or file tree",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML file with tree and merge settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Merge two SQLite stores into a new one
    MergeStores(MergeStoresArgs),
    /// Merge two directory trees, merging embedded stores row by row
    MergeTrees(MergeTreesArgs),
    /// Merge two zip bundles into a third
    MergeArchives(MergeArchivesArgs),
    /// Start the HTTP merge server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct MergeStoresArgs {
    /// Primary store; canonical for table layout and ties
    pub primary: PathBuf,
    pub secondary: PathBuf,
    /// Output store; must not exist
    pub output: PathBuf,
}

#[derive(Args)]
pub struct MergeTreesArgs {
    /// Primary tree; canonical for ties
    pub primary: PathBuf,
    pub secondary: PathBuf,
    /// Where to write the merged tree [default: <primary>.merged]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Scratch directory, removed afterwards [default: <primary>.recon-work]
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,
    /// Leave the primary tree in place instead of replacing it
    #[arg(long)]
    pub keep_primary: bool,
    /// Delete the secondary tree after a successful merge
    #[arg(long)]
    pub remove_secondary: bool,
}

#[derive(Args)]
pub struct MergeArchivesArgs {
    pub primary: PathBuf,
    pub secondary: PathBuf,
    pub output: PathBuf,
    /// Directory for temporary extraction [default: system temp dir]
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Root for scratch space and the default output bundle
    #[arg(long)]
    pub root: Option<PathBuf>,
}
