use thiserror::Error;

/// Malformed input, detected before any stored state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The question is empty after trimming.
    #[error("Question is required.")]
    EmptyQuestion,

    /// Fewer than two options were supplied.
    #[error("At least 2 options are required (got {found}).")]
    TooFewOptions {
        /// Number of options supplied.
        found: usize,
    },

    /// An option is empty after trimming.
    #[error("All options must be non-empty (option {index} is empty).")]
    EmptyOption {
        /// Position of the offending option.
        index: usize,
    },

    /// The poll id is not a well-formed identifier.
    #[error("Invalid poll ID.")]
    MalformedId(String),

    /// The option index is missing or not an integer.
    #[error("optionIndex must be an integer.")]
    MalformedOptionIndex,

    /// The voter identity is empty.
    #[error("Voter identity is required.")]
    EmptyVoter,
}

/// A vote that was well-formed but cannot be applied to this poll.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    /// The option index is outside `[0, options.len())`.
    #[error("Option index {index} is out of range.")]
    OptionOutOfRange {
        /// The rejected index.
        index: i64,
    },

    /// This voter identity has already voted on this poll.
    #[error("This identity has already voted for this poll.")]
    DuplicateVote,
}
