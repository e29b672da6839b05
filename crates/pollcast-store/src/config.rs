use core::fmt;
use core::str::FromStr;

/// SQLite connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// SQLite journal mode. Defaults to WAL.
    pub journal_mode: JournalMode,
    /// How long a writer waits on a lock held by another connection, in
    /// milliseconds. Defaults to 5000.
    pub busy_timeout_ms: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::Wal,
            busy_timeout_ms: 5000,
        }
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    /// Write-ahead logging; readers proceed during writes.
    #[default]
    Wal,
    /// Traditional rollback journal.
    Delete,
    /// In-memory journal. No crash recovery.
    Memory,
}

impl JournalMode {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
            Self::Memory => "MEMORY",
        }
    }
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_lowercase())
    }
}

impl FromStr for JournalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wal" => Ok(Self::Wal),
            "delete" => Ok(Self::Delete),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                "unknown journal mode '{other}' (expected wal, delete or memory)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_mode_parses() {
        assert_eq!("WAL".parse::<JournalMode>().unwrap(), JournalMode::Wal);
        assert_eq!(" delete ".parse::<JournalMode>().unwrap(), JournalMode::Delete);
        assert!("truncate".parse::<JournalMode>().is_err());
        assert_eq!(JournalMode::Memory.to_string(), "memory");
    }

    #[test]
    fn defaults() {
        let config = SqliteConfig::default();
        assert_eq!(config.journal_mode, JournalMode::Wal);
        assert_eq!(config.busy_timeout_ms, 5000);
    }
}
