//! CLI module - Command-line interface for Gazet
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Gazet - cookie-session authentication and publishing API
#[derive(Parser)]
#[command(name = "gazet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    #[command(alias = "s")]
    Serve,

    /// Create default config file
    Init,
}

pub use commands::*;
