// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the dry-run subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "karavi")]
#[command(about = "Dry-run deployment planning for Cloud Foundry-style platforms")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve manifest files and print the derived application name,
    /// instance ceiling, and routes
    Resolve {
        /// Manifest and variable files, classified by content
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Application-name prefix used when the manifest declares none
        #[arg(long, default_value = "app")]
        fallback_name: String,

        /// Instance ceiling used when the manifest declares none
        #[arg(long, default_value_t = 2)]
        fallback_instances: u32,

        /// Route supplied by the target infrastructure; repeatable
        #[arg(long = "route")]
        routes: Vec<String>,

        /// Fail when more than one application manifest is present
        #[arg(long)]
        strict: bool,

        /// Keep special characters in the application name
        #[arg(long)]
        allow_special_characters: bool,
    },

    /// Compute blue/green instance targets for a resize step
    PlanResize {
        /// Instance ceiling recorded at setup
        #[arg(long)]
        max_instances: u32,

        /// Percentage of the ceiling to bring the new application up to
        #[arg(long, conflicts_with = "upsize_count")]
        upsize_percent: Option<u32>,

        /// Absolute count to bring the new application up to
        #[arg(long)]
        upsize_count: Option<u32>,

        /// Explicit downsize percentage for the old application
        #[arg(long, conflicts_with = "downsize_count")]
        downsize_percent: Option<u32>,

        /// Explicit downsize count for the old application
        #[arg(long)]
        downsize_count: Option<u32>,

        /// Use the v2 rounding regime instead of legacy
        #[arg(long)]
        v2_rounding: bool,
    },
}
