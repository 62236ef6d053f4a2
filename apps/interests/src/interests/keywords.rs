//! Keyword classifier: the fast, deterministic first tier of topic detection.
//!
//! Plain substring matching on the lower-cased text. Table order matters:
//! the first topic with any hit wins.

use crate::interests::topic::Topic;

pub const KEYWORD_TABLE: &[(Topic, &[&str])] = &[
    (
        Topic::Cricket,
        &["cricket", "ipl", "t20", "batsman", "bowler", "wicket"],
    ),
    (Topic::Football, &["football", "soccer", "goal", "fifa"]),
    (
        Topic::Technology,
        &["tech", "technology", "computer", "ai", "python", "javascript"],
    ),
    (
        Topic::Business,
        &["business", "startup", "market", "stock", "store", "logo"],
    ),
    (Topic::Love, &["love", "make love", "miss you", "romance"]),
    (Topic::Friendship, &["friend", "friends", "buddy"]),
    (
        Topic::Entertainment,
        &["movie", "film", "song", "music", "concert"],
    ),
    (
        Topic::Food,
        &["food", "pizza", "burger", "panjabi", "restaurant"],
    ),
    (Topic::Travel, &["travel", "trip", "vacation", "flight"]),
    (
        Topic::Photography,
        &["sunset", "photo", "cozy", "workspace", "coffee", "rainy"],
    ),
];

/// Returns the first topic whose keywords occur in `text`, or `None`.
/// Never guesses: no match means no topic.
pub fn classify(text: &str) -> Option<Topic> {
    if text.is_empty() {
        return None;
    }
    let lowered = text.to_lowercase();
    KEYWORD_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|(topic, _)| *topic)
}
