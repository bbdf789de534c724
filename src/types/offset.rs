//! Character and token offsets of a span within one document.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error raised when an offset violates `begin <= end`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OffsetError {
    /// Begin lies after end on the character or token axis.
    #[error("Inconsistent offset: chars {begin_char}..{end_char}, tokens {begin_token}..{end_token}")]
    Inconsistent {
        /// Begin character.
        begin_char: u32,
        /// End character.
        end_char: u32,
        /// Begin token.
        begin_token: u32,
        /// End token.
        end_token: u32,
    },
}

/// Span position in a document, on both the character and token axis.
///
/// Equality is structural. Offsets arriving from collaborators are not
/// trusted: use [`Offset::validate`] before relying on the ordering invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Offset {
    /// First character (inclusive).
    pub begin_char: u32,
    /// Last character (exclusive).
    pub end_char: u32,
    /// First token (inclusive).
    pub begin_token: u32,
    /// Last token (exclusive).
    pub end_token: u32,
}

impl Offset {
    /// Create a checked offset.
    pub fn new(begin_char: u32, end_char: u32, begin_token: u32, end_token: u32) -> Result<Self, OffsetError> {
        Self::unchecked(begin_char, end_char, begin_token, end_token).validate()
    }

    /// Create an offset without checking the ordering invariant.
    ///
    /// Used when materializing collaborator data, which is validated later
    /// and excluded per item when malformed.
    pub fn unchecked(begin_char: u32, end_char: u32, begin_token: u32, end_token: u32) -> Self {
        Self { begin_char, end_char, begin_token, end_token }
    }

    /// Check `begin_char <= end_char` and `begin_token <= end_token`.
    pub fn validate(self) -> Result<Self, OffsetError> {
        if self.is_consistent() {
            Ok(self)
        } else {
            Err(OffsetError::Inconsistent {
                begin_char: self.begin_char,
                end_char: self.end_char,
                begin_token: self.begin_token,
                end_token: self.end_token,
            })
        }
    }

    /// Whether the ordering invariant holds.
    pub fn is_consistent(&self) -> bool {
        self.begin_char <= self.end_char && self.begin_token <= self.end_token
    }

    /// Token span, used as the ledger matching key.
    pub fn token_span(&self) -> (u32, u32) {
        (self.begin_token, self.end_token)
    }

    /// Whether the character ranges of two offsets overlap.
    ///
    /// Zero-width spans overlap a range that contains their position.
    pub fn overlaps_chars(&self, other: &Offset) -> bool {
        if self.begin_char == self.end_char || other.begin_char == other.end_char {
            return self.begin_char <= other.end_char && other.begin_char <= self.end_char;
        }
        self.begin_char < other.end_char && other.begin_char < self.end_char
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}-{}|t{}-{}]",
            self.begin_char, self.end_char, self.begin_token, self.end_token
        )
    }
}
