use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "docrecall", bin_name = "docrecall", version)]
#[command(
    about = "Inspect and manage editor crash-recovery state and local history",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the tables of every enabled feature
    #[command(display_order = 1)]
    Init,

    /// Capture a file's current content as unsaved hot-close state
    #[command(display_order = 2)]
    Capture {
        /// File to capture
        file: String,

        /// Cursor line
        #[arg(long, default_value_t = 0)]
        line: u32,

        /// Cursor column
        #[arg(long, default_value_t = 0)]
        ch: u32,

        /// Treat the document as clean (removes its hot-close state)
        #[arg(long)]
        clean: bool,
    },

    /// Record a save: snapshot the file into local history
    #[command(alias = "save", display_order = 3)]
    Snapshot {
        /// File to snapshot
        file: String,
    },

    /// Print the stored state of a document
    #[command(alias = "s", display_order = 10)]
    Show {
        /// Document path
        file: String,

        /// Show local-history snapshots instead of hot-close state
        #[arg(long)]
        history: bool,
    },

    /// List the local-history snapshots of a document
    #[command(alias = "ls", display_order = 11)]
    History {
        /// Document path
        file: String,
    },

    /// Print one local-history snapshot
    #[command(display_order = 12)]
    Restore {
        /// Document path
        file: String,

        /// Snapshot timestamp (ms since epoch, as listed by `history`)
        timestamp: i64,
    },

    /// Delete stored state of a document
    #[command(alias = "rm", display_order = 13)]
    Delete {
        /// Document path
        file: String,

        /// Delete local-history snapshots instead of hot-close state
        #[arg(long)]
        history: bool,

        /// Only the snapshot with this timestamp
        #[arg(long, requires = "history")]
        at: Option<i64>,
    },

    /// Drop all stored data of one feature
    #[command(display_order = 20)]
    Wipe {
        /// Wipe local history instead of hot-close state
        #[arg(long)]
        history: bool,

        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show per-table usage
    #[command(display_order = 21)]
    Stats,

    /// Check and fix data inconsistencies
    #[command(display_order = 30)]
    Doctor,

    /// Get or set configuration
    #[command(display_order = 31)]
    Config {
        /// Configuration key (e.g., debounce_ms)
        key: Option<String>,

        /// Value to set (if omitted, prints current value)
        value: Option<String>,
    },
}
