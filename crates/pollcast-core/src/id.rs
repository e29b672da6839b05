use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ValidationError;

/// Opaque, immutable poll identifier.
///
/// Rendered as the 32-character lowercase simple form of a random UUID.
/// Parsing accepts any textual UUID form.
///
/// ```
/// use pollcast_core::PollId;
///
/// let id = PollId::generate();
/// let parsed: PollId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
///
/// assert!("not-a-poll".parse::<PollId>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PollId(Uuid);

impl PollId {
    /// Allocate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for PollId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ValidationError::MalformedId(s.to_string()))
    }
}

impl TryFrom<String> for PollId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PollId> for String {
    fn from(id: PollId) -> Self {
        id.to_string()
    }
}

/// Coarse voter identity used to deduplicate votes.
///
/// This is not a verified user identity; it is typically a client network
/// address. Comparison is exact-match on the trimmed string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoterId(String);

impl VoterId {
    /// Create a voter identity. Surrounding whitespace is removed; an empty
    /// result is rejected.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyVoter);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
