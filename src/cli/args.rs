//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Mind-map note taking: topics as circles, each backed by a markdown note
#[derive(Parser, Debug)]
#[command(name = "treenote")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file, replaces ./.treenote.toml
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Workspace directory (default: from config, else cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create session, notes and cache in the workspace
    Init,

    /// Print the topic tree of the session
    Tree {
        /// Also list notes no topic refers to
        #[arg(long)]
        orphans: bool,
    },

    /// Regenerate thumbnails and wait for them
    Convert {
        /// Topic to convert (default: every topic)
        topic: Option<String>,
    },

    /// Drive the editor from a pointer script, then save the session
    Replay {
        /// Script file
        #[arg(value_hint = ValueHint::FilePath)]
        script: PathBuf,

        /// Wait for thumbnail conversions before saving
        #[arg(long)]
        wait: bool,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a commented config template
    Template,

    /// Show config file locations
    Path,
}
