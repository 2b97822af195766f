//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level command-line arguments.
#[derive(Parser)]
#[command(name = "sage")]
#[command(about = "Retrieval-augmented question answering over local documents", long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(
        short,
        long,
        global = true,
        default_value = "sage.toml",
        help = "Configuration file"
    )]
    pub config: PathBuf,

    /// Selected subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Index a directory of documents.
    #[command(about = "Chunk, embed, and index documents from a directory")]
    Ingest {
        /// Directory containing `.txt` and `.md` documents.
        #[arg(help = "Directory of .txt/.md documents; file stems become source titles")]
        corpus_dir: PathBuf,

        /// Keep previously indexed chunks for re-ingested titles.
        #[arg(long, help = "Add alongside existing chunks instead of replacing per source")]
        keep_existing: bool,
    },

    /// Answer a question from the indexed corpus.
    #[command(about = "Ask a question against the indexed corpus")]
    Ask {
        /// Question text.
        #[arg(help = "The question to answer")]
        question: String,
    },

    /// Show what the store holds.
    #[command(about = "Show corpus statistics")]
    Stats,
}
