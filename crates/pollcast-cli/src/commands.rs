use std::time::Duration;

use pollcast_core::{PollId, PollSnapshot};
use pollcast_server::ServerConfig;
use pollcast_store::{PollStore, SqliteConfig, SqliteStore, StateStore, POLL_NAMESPACE};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::ServeArgs;

type Result = std::result::Result<(), Box<dyn std::error::Error>>;

/// `pollcast serve`: Run the server until interrupted.
pub async fn serve(args: ServeArgs) -> Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    pollcast_server::run(server_config(args)).await?;
    Ok(())
}

fn server_config(args: ServeArgs) -> ServerConfig {
    ServerConfig {
        bind: args.bind,
        backend: args.backend,
        db_path: args.db,
        public_base_url: args.public_url.filter(|url| !url.trim().is_empty()),
        cors_origin: args.cors_origin.filter(|origin| !origin.trim().is_empty()),
        store_timeout: Duration::from_millis(args.store_timeout_ms),
        viewer_queue: args.viewer_queue,
        trust_forwarded_headers: !args.no_trust_forwarded,
        unknown_identity: args.unknown_identity,
        sqlite: SqliteConfig {
            journal_mode: args.sqlite_journal,
            busy_timeout_ms: args.sqlite_busy_timeout_ms,
        },
    }
}

/// `pollcast status <db>`: Show database status and statistics.
pub fn status(db_path: &str) -> Result {
    let store = SqliteStore::open(db_path)?;
    let info = store.db_info()?;
    let size = store.file_size()?;
    let journal = store.journal_mode()?;

    println!("Database: {db_path} (SQLite, {journal} mode)");
    println!("Size: {}", format_bytes(size));
    println!();

    if info.namespaces.is_empty() {
        println!("  (empty database)");
        return Ok(());
    }

    println!("  {:<20} {:>10}", "Namespace", "Records");
    println!("  {}", "-".repeat(32));
    for ns in &info.namespaces {
        println!("  {:<20} {:>10}", ns.name, format_num(ns.key_count));
    }
    println!("  {}", "-".repeat(32));
    println!("  {:<20} {:>10}", "Total", format_num(info.total_keys));
    println!();

    Ok(())
}

/// `pollcast inspect <db> [poll]`: List polls or show one.
pub fn inspect(db_path: &str, poll: Option<&str>) -> Result {
    let store = PollStore::new(SqliteStore::open(db_path)?);

    match poll {
        Some(id) => inspect_poll(&store, id.parse()?),
        None => inspect_list(&store),
    }
}

fn inspect_poll(store: &PollStore<SqliteStore>, id: PollId) -> Result {
    let poll = store.fetch(id)?;
    let snapshot = poll.snapshot();

    println!("Poll: {id}");
    println!("Question: {}", snapshot.question);
    println!("Created: {}", snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "Votes: {} from {} voters",
        format_num(snapshot.total_votes()),
        format_num(poll.voters().len() as u64)
    );
    println!();

    println!("  {:>3}  {:<32} {:>8} {:>6}", "#", "Option", "Votes", "Share");
    println!("  {}", "-".repeat(54));
    for (i, (option, pct)) in snapshot
        .options
        .iter()
        .zip(snapshot.percentages())
        .enumerate()
    {
        println!(
            "  {:>3}  {:<32} {:>8} {:>5}%",
            i,
            truncate(&option.text, 32),
            format_num(option.votes),
            pct
        );
    }
    println!();

    Ok(())
}

fn inspect_list(store: &PollStore<SqliteStore>) -> Result {
    let ids = store.list_ids()?;

    if ids.is_empty() {
        println!("  (no polls)");
        return Ok(());
    }

    println!("Namespace: {POLL_NAMESPACE} ({} polls)", ids.len());
    for id in ids {
        match store.fetch(id) {
            Ok(poll) => println!(
                "  {id}  {:<40} {:>8} votes",
                truncate(poll.question(), 40),
                format_num(poll.total_votes())
            ),
            Err(e) => println!("  {id}  (unreadable: {e})"),
        }
    }
    println!();

    Ok(())
}

/// `pollcast export <db> [poll]`: Export snapshots as JSON.
pub fn export(db_path: &str, poll: Option<&str>) -> Result {
    let store = PollStore::new(SqliteStore::open(db_path)?);

    let output = match poll {
        Some(id) => serde_json::to_value(store.fetch(id.parse()?)?.snapshot())?,
        None => {
            let polls = store
                .list_ids()?
                .into_iter()
                .map(|id| store.fetch(id).map(|poll| poll.snapshot()))
                .collect::<std::result::Result<Vec<PollSnapshot>, _>>()?;
            json!({
                "database": {
                    "path": db_path,
                    "polls": polls.len(),
                },
                "polls": polls,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_num(n: u64) -> String {
    if n < 1000 {
        return n.to_string();
    }
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Shorten to at most `max` characters, ending in `...` when cut.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pollcast_core::VoterId;
    use pollcast_server::{Backend, UnknownIdentityPolicy};
    use pollcast_store::JournalMode;

    use crate::{Cli, Commands};

    #[test]
    fn numbers_and_sizes() {
        assert_eq!(format_num(999), "999");
        assert_eq!(format_num(1_234_567), "1,234,567");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("café au lait", 7), "café...");
    }

    #[test]
    fn serve_flags_build_config() {
        let cli = Cli::try_parse_from([
            "pollcast",
            "serve",
            "--bind",
            "0.0.0.0:8080",
            "--backend",
            "memory",
            "--store-timeout-ms",
            "250",
            "--no-trust-forwarded",
            "--unknown-identity",
            "reject",
            "--public-url",
            "",
            "--sqlite-journal",
            "delete",
            "--sqlite-busy-timeout-ms",
            "750",
        ])
        .unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };

        let config = server_config(args);
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert!(!config.trust_forwarded_headers);
        assert_eq!(config.unknown_identity, UnknownIdentityPolicy::Reject);
        assert_eq!(config.public_base_url, None);
        assert_eq!(
            config.sqlite,
            SqliteConfig {
                journal_mode: JournalMode::Delete,
                busy_timeout_ms: 750,
            }
        );
    }

    #[test]
    fn sqlite_defaults_match_store_defaults() {
        let cli = Cli::try_parse_from(["pollcast", "serve"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(server_config(args).sqlite, SqliteConfig::default());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["pollcast", "serve", "--backend", "mongo"]).is_err());
    }

    #[test]
    fn commands_read_a_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polls.db");
        let path_str = path.to_str().unwrap();

        let id = {
            let store = PollStore::new(SqliteStore::open(&path).unwrap());
            let poll = store.create("Tea or coffee?", &["Tea", "Coffee"]).unwrap();
            store
                .apply_vote(poll.id(), 0, &VoterId::new("A").unwrap())
                .unwrap();
            poll.id()
        };

        status(path_str).unwrap();
        inspect(path_str, None).unwrap();
        inspect(path_str, Some(&id.to_string())).unwrap();
        export(path_str, None).unwrap();
        export(path_str, Some(&id.to_string())).unwrap();

        assert!(inspect(path_str, Some("not-an-id")).is_err());
        assert!(export(path_str, Some(&PollId::generate().to_string())).is_err());
    }
}
