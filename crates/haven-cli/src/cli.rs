use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use haven_model::MergeMode;

#[derive(Parser)]
#[command(
    name = "haven",
    about = "Haven — offline-first credential vault tools",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Merge a source vault into a target vault
    Merge(MergeArgs),
    /// Print the tree of a vault file
    Show(ShowArgs),
}

#[derive(Args)]
pub struct MergeArgs {
    /// The vault to read changes from (never written)
    pub source: PathBuf,
    /// The vault to merge into
    pub target: PathBuf,
    /// Write the merged vault here instead of back to TARGET
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Report the changes without writing anything
    #[arg(long)]
    pub dry_run: bool,
    /// Override the per-group merge modes
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ModeArg {
    Duplicate,
    KeepLocal,
    KeepRemote,
    KeepNewer,
    Synchronize,
}

impl From<ModeArg> for MergeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Duplicate => MergeMode::Duplicate,
            ModeArg::KeepLocal => MergeMode::KeepLocal,
            ModeArg::KeepRemote => MergeMode::KeepRemote,
            ModeArg::KeepNewer => MergeMode::KeepNewer,
            ModeArg::Synchronize => MergeMode::Synchronize,
        }
    }
}

#[derive(Args)]
pub struct ShowArgs {
    pub vault: PathBuf,
}
