//! CLI argument parsing using clap.

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

/// Office document search
#[derive(Parser)]
#[command(
    name = "docseek",
    version = env!("CARGO_PKG_VERSION"),
    about = "Index office documents and search them semantically",
    long_about = "Index text, PDF, Word, Excel and PowerPoint files into a vector index \
                  and search them from the command line or over HTTP.",
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ docseek init\n  $ docseek index --dir ./docs\n  $ docseek search --query \"quarterly budget\"\n  $ docseek serve"
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .docseek directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Index a file or a directory
    #[command(
        about = "Load documents and add them to the index",
        after_help = "Examples:\n  docseek index --file report.pdf\n  docseek index --dir ./docs\n  docseek index --dir ./docs --ext .docx .xlsx"
    )]
    Index {
        /// Single file to index
        #[arg(long, conflicts_with = "dir")]
        file: Option<PathBuf>,

        /// Directory to index recursively
        #[arg(long)]
        dir: Option<PathBuf>,

        /// File extensions to include when indexing a directory
        #[arg(long, num_args = 1.., value_name = "EXT")]
        ext: Option<Vec<String>>,

        /// Disable progress bars (overrides settings.toml show_progress)
        #[arg(long)]
        no_progress: bool,
    },

    /// Search the index
    #[command(about = "Find documents similar to a query")]
    Search {
        /// Query text
        #[arg(short, long)]
        query: String,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,

        /// Restrict to document types (pdf, docx, ...)
        #[arg(short = 't', long = "type", num_args = 1.., value_name = "TYPE")]
        types: Option<Vec<String>>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count indexed documents
    #[command(about = "Print the number of documents in the index")]
    Count,

    /// Show a stored document
    #[command(about = "Print a stored document as JSON")]
    Get {
        /// Document id
        id: String,
    },

    /// Delete a document
    #[command(about = "Remove a document from the index")]
    Delete {
        /// Document id
        id: String,
    },

    /// Remove every document
    #[command(about = "Remove every document and vector from the index")]
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Start HTTP server
    #[command(
        about = "Serve the HTTP API",
        after_help = "Examples:\n  docseek serve\n  docseek serve --bind 127.0.0.1:9000"
    )]
    Serve {
        /// Address to bind (overrides server.host and server.port)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,
}
