use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use pollcast_server::{Backend, UnknownIdentityPolicy};
use pollcast_store::JournalMode;

mod commands;

/// pollcast: realtime polls with one vote per identity.
///
/// Run the server, or inspect and export a poll database from the command line.
#[derive(Parser)]
#[command(name = "pollcast", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP and WebSocket server.
    Serve(ServeArgs),

    /// Show database status and statistics.
    Status {
        /// Path to the SQLite database file.
        db: String,
    },

    /// List polls, or show one poll's tallies.
    Inspect {
        /// Path to the SQLite database file.
        db: String,

        /// Poll to show. If omitted, lists all polls.
        poll: Option<String>,
    },

    /// Export poll snapshots as JSON.
    Export {
        /// Path to the SQLite database file.
        db: String,

        /// Poll to export. If omitted, exports every poll.
        poll: Option<String>,
    },
}

#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "POLLCAST_BIND", default_value = "127.0.0.1:4343")]
    pub bind: SocketAddr,

    /// Storage backend: memory, sqlite or redb.
    #[arg(long, env = "POLLCAST_BACKEND", default_value = "sqlite")]
    pub backend: Backend,

    /// Database file for sqlite and redb.
    #[arg(long, env = "POLLCAST_DB", default_value = "pollcast.db")]
    pub db: PathBuf,

    /// Public base URL used in share links.
    #[arg(long, env = "POLLCAST_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Allowed CORS origin. Any origin when omitted.
    #[arg(long, env = "POLLCAST_CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Deadline for a single store call, in milliseconds.
    #[arg(long, default_value = "5000")]
    pub store_timeout_ms: u64,

    /// Outbound event queue length per viewer.
    #[arg(long, default_value = "32")]
    pub viewer_queue: usize,

    /// Ignore X-Forwarded-For and X-Real-IP.
    #[arg(long)]
    pub no_trust_forwarded: bool,

    /// Votes with no identifiable sender: shared or reject.
    #[arg(long, default_value = "shared")]
    pub unknown_identity: UnknownIdentityPolicy,

    /// SQLite journal mode: wal, delete or memory.
    #[arg(long, env = "POLLCAST_SQLITE_JOURNAL", default_value = "wal")]
    pub sqlite_journal: JournalMode,

    /// How long a SQLite writer waits for a lock held elsewhere, in milliseconds.
    #[arg(long, default_value = "5000")]
    pub sqlite_busy_timeout_ms: u32,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Serve(args) => commands::serve(args).await,
        Commands::Status { db } => commands::status(&db),
        Commands::Inspect { db, poll } => commands::inspect(&db, poll.as_deref()),
        Commands::Export { db, poll } => commands::export(&db, poll.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
