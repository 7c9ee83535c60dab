use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "assocxml",
    about = "Read file-association files and resolve which command opens a file",
    version,
    arg_required_else_help = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read an associations file and list the associations it declares
    Check(CheckArgs),
    /// Print every builder event an associations file produces, in order
    Trace(TraceArgs),
    /// Print the command associated with each file
    Which(WhichArgs),
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Associations file (defaults to the configured one)
    pub file: Option<PathBuf>,

    /// Print the associations as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct TraceArgs {
    /// Associations file (defaults to the configured one)
    pub file: Option<PathBuf>,

    /// Print one JSON object per event
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct WhichArgs {
    /// Files (or directories, with --recursive) to resolve
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Associations file (defaults to the configured one)
    #[arg(long)]
    pub associations: Option<PathBuf>,

    /// Descend into directories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,
}
