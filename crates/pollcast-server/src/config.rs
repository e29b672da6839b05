use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use pollcast_store::SqliteConfig;

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Volatile in-process map; everything is lost on exit.
    Memory,
    /// SQLite file (the default).
    #[default]
    Sqlite,
    /// redb file.
    Redb,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "redb" => Ok(Self::Redb),
            other => Err(format!(
                "unknown backend '{other}' (expected memory, sqlite or redb)"
            )),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::Redb => "redb",
        })
    }
}

/// What to do with a vote whose sender cannot be identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownIdentityPolicy {
    /// All unidentifiable senders share the `unknown-ip` identity, so at
    /// most one of them can vote per poll.
    #[default]
    Shared,
    /// Refuse the vote with a 400.
    Reject,
}

impl FromStr for UnknownIdentityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shared" => Ok(Self::Shared),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown identity policy '{other}' (expected shared or reject)"
            )),
        }
    }
}

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind: SocketAddr,
    /// Storage backend.
    pub backend: Backend,
    /// Database file for file-backed backends.
    pub db_path: PathBuf,
    /// Base for share links, e.g. `https://polls.example.com`.
    pub public_base_url: Option<String>,
    /// Allowed CORS origin; `None` allows any.
    pub cors_origin: Option<String>,
    /// Upper bound on a single store call.
    pub store_timeout: Duration,
    /// Per-viewer outbound event queue length.
    pub viewer_queue: usize,
    /// Whether `X-Forwarded-For` / `X-Real-IP` are believed.
    pub trust_forwarded_headers: bool,
    /// Handling of votes from unidentifiable senders.
    pub unknown_identity: UnknownIdentityPolicy,
    /// Connection settings for the sqlite backend.
    pub sqlite: SqliteConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 4343)),
            backend: Backend::default(),
            db_path: PathBuf::from("pollcast.db"),
            public_base_url: None,
            cors_origin: None,
            store_timeout: Duration::from_millis(5000),
            viewer_queue: 32,
            trust_forwarded_headers: true,
            unknown_identity: UnknownIdentityPolicy::default(),
            sqlite: SqliteConfig::default(),
        }
    }
}
