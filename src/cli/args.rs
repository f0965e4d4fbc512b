//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Share allocation ledger: original owners, heirs, conveyances and the claimants they leave behind
#[derive(Parser, Debug)]
#[command(name = "headright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Ledger file (default: `ledger_file` from config)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,

    /// Extra config file layered over the global one
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage original owners (roots)
    Owner {
        #[command(subcommand)]
        command: OwnerCommands,
    },

    /// Manage heirs
    Heir {
        #[command(subcommand)]
        command: HeirCommands,
    },

    /// Rename a node and set its share relative to its parent
    Edit {
        /// Node address, e.g. 1.2
        node: String,
        /// New name
        name: String,
        /// Share relative to the parent (root: absolute share)
        relative_share: String,
    },

    /// Delete a node and its subtree
    Delete {
        /// Node address, e.g. 1.2
        node: String,
        /// Afterwards give every original owner an equal share
        #[arg(long)]
        rebalance: bool,
    },

    /// Convey parts of a node's unallocated remainder
    Convey {
        /// Source node address
        source: String,
        /// Destinations as ADDRESS=PORTION, portion a fraction of the remainder
        #[arg(required = true, num_args = 1.., value_parser = parse_destination)]
        destinations: Vec<Destination>,
    },

    /// Revert the last change
    Undo,

    /// Remove every node
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List claimants and their shares
    Report,

    /// Show the total claimed share
    Total,

    /// Show the ownership forest
    Tree,

    /// Show a node's unallocated remainder
    Remainder {
        /// Node address, e.g. 1.2
        node: String,
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

#[derive(Subcommand, Debug)]
pub enum OwnerCommands {
    /// Add an original owner
    Add {
        /// Display name
        name: String,
        /// Absolute share (default: 1/(owners + 1))
        share: Option<String>,
    },

    /// Give every original owner an equal share
    Rebalance,
}

#[derive(Subcommand, Debug)]
pub enum HeirCommands {
    /// Add an heir under a node
    Add {
        /// Parent node address, e.g. 1
        parent: String,
        /// Display name
        name: String,
        /// Fraction of the parent's share
        fraction: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Show config paths
    Path,

    /// Create global config template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// `ADDRESS=PORTION` argument of `convey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub address: String,
    pub portion: String,
}

pub fn parse_destination(arg: &str) -> Result<Destination, String> {
    let (address, portion) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ADDRESS=PORTION, got '{arg}'"))?;
    let (address, portion) = (address.trim(), portion.trim());
    if address.is_empty() || portion.is_empty() {
        return Err(format!("expected ADDRESS=PORTION, got '{arg}'"));
    }
    Ok(Destination {
        address: address.to_string(),
        portion: portion.to_string(),
    })
}
