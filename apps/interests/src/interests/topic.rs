use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of topics a post can be assigned to.
///
/// The first ten have keyword rules; the last four are only reachable through
/// the zero-shot model. There is no catch-all topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topic {
    Cricket,
    Football,
    Technology,
    Business,
    Love,
    Friendship,
    Entertainment,
    Food,
    Travel,
    Photography,
    News,
    Fashion,
    Health,
    Education,
}

impl Topic {
    /// Candidate labels sent to the zero-shot model, keyword topics first.
    pub const ALL: [Topic; 14] = [
        Topic::Cricket,
        Topic::Football,
        Topic::Technology,
        Topic::Business,
        Topic::Love,
        Topic::Friendship,
        Topic::Entertainment,
        Topic::Food,
        Topic::Travel,
        Topic::Photography,
        Topic::News,
        Topic::Fashion,
        Topic::Health,
        Topic::Education,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Topic::Cricket => "Cricket",
            Topic::Football => "Football",
            Topic::Technology => "Technology",
            Topic::Business => "Business",
            Topic::Love => "Love",
            Topic::Friendship => "Friendship",
            Topic::Entertainment => "Entertainment",
            Topic::Food => "Food",
            Topic::Travel => "Travel",
            Topic::Photography => "Photography",
            Topic::News => "News",
            Topic::Fashion => "Fashion",
            Topic::Health => "Health",
            Topic::Education => "Education",
        }
    }

    pub fn candidate_labels() -> Vec<&'static str> {
        Topic::ALL.iter().map(|t| t.label()).collect()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTopic(pub String);

impl fmt::Display for UnknownTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown topic label '{}'", self.0)
    }
}

impl std::error::Error for UnknownTopic {}

impl FromStr for Topic {
    type Err = UnknownTopic;

    /// Matches labels case-insensitively, since models sometimes echo them lower-cased.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Topic::ALL
            .iter()
            .copied()
            .find(|t| t.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}
