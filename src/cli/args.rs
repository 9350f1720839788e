//! CLI argument definitions using clap
//!
//! Commands:
//! - chronoset init
//! - chronoset post create|edit|delete|restore|attach|show|list|history
//! - chronoset comment create|edit|delete|restore|show|list|history
//! - chronoset version post|comment <version-id>
//! - chronoset verify

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// chronoset - temporal snapshot versioning for posts and comments
#[derive(Parser, Debug)]
#[command(name = "chronoset")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default configuration and create the data directory
    Init {
        /// Data directory recorded in the new configuration
        #[arg(long, default_value = "./chronoset-data")]
        data_dir: PathBuf,
    },

    /// Operate on posts
    Post {
        #[command(subcommand)]
        action: PostAction,
    },

    /// Operate on comments
    Comment {
        #[command(subcommand)]
        action: CommentAction,
    },

    /// Show one revision with its audit fields
    Version {
        #[command(subcommand)]
        target: VersionTarget,
    },

    /// Check every timeline in both stores
    Verify,
}

#[derive(Subcommand, Debug)]
pub enum PostAction {
    Create {
        content: String,
    },
    Edit {
        id: u64,
        content: String,
    },
    Delete {
        id: u64,
    },
    Restore {
        id: u64,
    },
    /// Pin the current revision of a comment into a post
    Attach {
        id: u64,
        comment_id: u64,
    },
    Show {
        id: u64,
    },
    List {
        /// Keep tombstoned posts in the listing
        #[arg(long)]
        include_deleted: bool,
    },
    History {
        id: u64,
    },
}

#[derive(Subcommand, Debug)]
pub enum CommentAction {
    Create {
        content: String,
    },
    Edit {
        id: u64,
        content: String,
    },
    Delete {
        id: u64,
    },
    Restore {
        id: u64,
    },
    Show {
        id: u64,
    },
    List {
        /// Keep tombstoned comments in the listing
        #[arg(long)]
        include_deleted: bool,
    },
    History {
        id: u64,
    },
}

#[derive(Subcommand, Debug)]
pub enum VersionTarget {
    Post { version: u64 },
    Comment { version: u64 },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_nested_post_command() {
        let cli = Cli::try_parse_from(["chronoset", "--config", "c.json", "post", "attach", "1", "2"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("c.json"));
        assert!(matches!(
            cli.command,
            Command::Post {
                action: PostAction::Attach { id: 1, comment_id: 2 }
            }
        ));
    }

    #[test]
    fn test_config_defaults() {
        let cli = Cli::try_parse_from(["chronoset", "verify"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }
}
