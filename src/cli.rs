//! Command-line interface definition for Convoke
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, conversation listing, and
//! export.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Convoke - conversation orchestration engine
///
/// Chat with a fallback chain of AI providers; conversations persist
/// across sessions.
#[derive(Parser, Debug, Clone)]
#[command(name = "convoke")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the conversation database path
    #[arg(long)]
    pub storage_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute; defaults to `chat`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands for Convoke
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the interactive chat loop
    Chat {
        /// Resume a specific conversation instead of the active one
        #[arg(short, long)]
        resume: Option<String>,
    },

    /// List stored conversations
    List,

    /// Export a conversation to stdout or a file
    Export {
        /// Conversation id; defaults to the active conversation
        #[arg(short, long)]
        id: Option<String>,

        /// Output format: json, markdown, or text
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a conversation
    Delete {
        /// Conversation id
        id: String,
    },

    /// Rename a conversation (pins the title against auto-derivation)
    Rename {
        /// Conversation id
        id: String,

        /// New title
        title: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
