//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Embedding, vector store and legacy migration tooling for document QA
#[derive(Parser)]
#[command(
    name = "docqa",
    version = env!("CARGO_PKG_VERSION"),
    about = "Embed documents into a hosted vector index and migrate legacy stores",
    long_about = "Embed document chunks into a hosted vector index, query it, and migrate \
                  legacy local vector stores (FAISS, pickle, Chroma) into it.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ docqa init\n  $ docqa migrate --dry-run\n  $ docqa migrate --source vector_db --namespace migrated\n  $ docqa query \"What protects inventions?\" --namespace migrated"
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Raise the default log level to debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .docqa directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings (secrets omitted)")]
    Config,

    /// Migrate a legacy local vector store into the hosted index
    #[command(
        about = "Migrate a legacy local vector store into the hosted index",
        after_help = "Examples:\n  docqa migrate --dry-run\n  docqa migrate --source old_store --namespace archive\n  docqa migrate --no-verify --json\n\nRequired environment (unless --dry-run):\n  PINECONE_API_KEY, PINECONE_ENV, PINECONE_INDEX_NAME\nOptional:\n  OPENAI_API_KEY (falls back to the local model when absent)"
    )]
    Migrate {
        /// Legacy store directory (defaults to migration.source_dir)
        #[arg(short, long, value_name = "DIR")]
        source: Option<PathBuf>,

        /// Target namespace (defaults to migration.namespace)
        #[arg(short, long)]
        namespace: Option<String>,

        /// Analyze and load only; write nothing
        #[arg(long)]
        dry_run: bool,

        /// Skip the sample-query verification
        #[arg(long)]
        no_verify: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Embed and upsert chunks from a JSON Lines file
    #[command(
        about = "Embed and upsert chunks from a JSON Lines file",
        after_help = "Each line: {\"content\": \"...\", \"source\": \"faq.pdf\", \"chunk_index\": 0}"
    )]
    Ingest {
        /// JSON Lines file of chunks
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Namespace to write into
        #[arg(short, long)]
        namespace: String,

        /// Print the upsert report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Similarity search within a namespace
    #[command(about = "Search a namespace for chunks similar to the query text")]
    Query {
        /// Query text
        text: String,

        /// Namespace to search
        #[arg(short, long)]
        namespace: String,

        /// Number of matches to return
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,

        /// Print matches as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every record in a namespace
    #[command(name = "delete-namespace", about = "Delete every record in a namespace")]
    DeleteNamespace {
        /// Namespace to clear
        namespace: String,
    },
}
