//! # pollcast-store
//!
//! Durable poll storage with an atomic, per-poll vote operation.
//!
//! [`PollStore`] wraps any [`StateStore`] backend. Poll creation validates
//! input before touching the backend; [`PollStore::apply_vote`] performs the
//! duplicate check and the tally increment as one indivisible step per poll
//! id, so concurrent votes on the same poll can never double-count an
//! identity or lose an increment. Votes on different polls never wait on
//! each other.
//!
//! ## Quick Start
//!
//! ```
//! use pollcast_core::VoterId;
//! use pollcast_store::{MemoryStore, PollStore};
//!
//! let store = PollStore::new(MemoryStore::new());
//! let poll = store.create("Tea or coffee?", &["Tea", "Coffee"]).unwrap();
//!
//! let voter = VoterId::new("10.0.0.7").unwrap();
//! let updated = store.apply_vote(poll.id(), 1, &voter).unwrap();
//! assert_eq!(updated.options()[1].votes, 1);
//!
//! assert!(store.apply_vote(poll.id(), 0, &voter).is_err());
//! ```
//!
//! ## Backends
//!
//! | Backend | Feature flag | Use case |
//! |---------|-------------|----------|
//! | [`MemoryStore`] | *(always available)* | Tests, throwaway servers |
//! | `SqliteStore` | `sqlite` (default) | Single-node deployments |
//! | `RedbStore` | `redb` | Pure-Rust deployments without C deps |

mod config;
mod db;
mod envelope;
mod error;
mod locks;
mod memory;
#[cfg(feature = "redb")]
mod redb;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

pub use config::{JournalMode, SqliteConfig};
pub use db::{PollStore, MAX_CAS_ATTEMPTS, POLL_NAMESPACE};
pub use envelope::{EnvelopeError, RecordEnvelope, ENVELOPE_HEADER_SIZE, MAGIC_BYTE};
pub use error::StoreError;
pub use memory::{MemoryError, MemoryStore};
#[cfg(feature = "redb")]
pub use redb::{RedbError, RedbStore};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteError, SqliteStore};
pub use traits::*;
