use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PollId, PollOption};

/// The full client-visible state of a poll at one point in its history.
///
/// Wire shape:
///
/// ```json
/// {"id": "…", "question": "…", "options": [{"text": "…", "votes": 0}], "createdAt": "…"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot {
    /// Poll identifier.
    pub id: PollId,
    /// The question text.
    pub question: String,
    /// Options and their tallies, in poll order.
    pub options: Vec<PollOption>,
    /// Creation timestamp, ISO-8601 on the wire.
    pub created_at: DateTime<Utc>,
}

impl PollSnapshot {
    /// Sum of all option tallies.
    #[must_use]
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes).sum()
    }

    /// Share of the total per option, rounded to whole percent.
    ///
    /// All zeros when nobody has voted yet.
    #[must_use]
    pub fn percentages(&self) -> Vec<u8> {
        let total = self.total_votes();
        self.options
            .iter()
            .map(|o| {
                if total == 0 {
                    0
                } else {
                    ((o.votes as f64 / total as f64) * 100.0).round() as u8
                }
            })
            .collect()
    }
}
