//! Attribution: distributes weighted credit for a post's topic to everyone
//! who touched the post: author, likers, commenters, repliers (any depth), sharers.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::interests::topic::Topic;
use crate::models::post::{Comment, Engagement, Post};

/// Credit per engagement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weights {
    pub post: u64,
    pub like: u64,
    pub comment: u64,
    pub reply: u64,
    pub share: u64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            post: 1,
            like: 1,
            comment: 2,
            reply: 2,
            share: 1,
        }
    }
}

/// Topic → score map that remembers first-insertion order.
///
/// Order is what makes the `/interests` tie-break stable, so a plain `HashMap`
/// won't do. The topic set is tiny; a linear scan is fine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicScores(Vec<(Topic, u64)>);

impl TopicScores {
    pub fn add(&mut self, topic: Topic, amount: u64) {
        match self.0.iter_mut().find(|(t, _)| *t == topic) {
            Some((_, score)) => *score += amount,
            None => self.0.push((topic, amount)),
        }
    }

    #[cfg(test)]
    pub fn get(&self, topic: Topic) -> u64 {
        self.0
            .iter()
            .find(|(t, _)| *t == topic)
            .map(|(_, s)| *s)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|(_, s)| s).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Topic, u64)> + '_ {
        self.0.iter().copied()
    }

    /// Highest `n` scores, descending; equal scores keep insertion order.
    pub fn top(&self, n: usize) -> Vec<(Topic, u64)> {
        let mut sorted = self.0.clone();
        sorted.sort_by(|a, b| b.1.cmp(&a.1)); // stable
        sorted.truncate(n);
        sorted
    }

    fn merge(&mut self, other: &TopicScores) {
        for (topic, score) in other.iter() {
            self.add(topic, score);
        }
    }
}

impl Serialize for TopicScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (topic, score) in &self.0 {
            map.serialize_entry(topic.label(), score)?;
        }
        map.end()
    }
}

/// Mutable accumulator for one recompute cycle: per-user scores plus
/// per-topic totals across all users. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreBoard {
    pub users: BTreeMap<String, TopicScores>,
    pub topic_totals: TopicScores,
}

impl ScoreBoard {
    /// Credits `user` with `amount` for `topic`. Missing or blank ids are skipped.
    pub fn credit(&mut self, user: Option<&str>, topic: Topic, amount: u64) {
        let Some(user) = user.map(str::trim).filter(|u| !u.is_empty()) else {
            return;
        };
        self.users
            .entry(user.to_string())
            .or_default()
            .add(topic, amount);
        self.topic_totals.add(topic, amount);
    }

    /// Folds a partial board into this one. Callers merge in input order.
    pub fn merge(&mut self, other: ScoreBoard) {
        for (user, scores) in other.users {
            self.users.entry(user).or_default().merge(&scores);
        }
        self.topic_totals.merge(&other.topic_totals);
    }
}

/// What a single post walk could not cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Replies (with their subtrees) beyond the depth cap.
    pub truncated_replies: usize,
}

/// Walks one post under `topic`, crediting the author, likers, commenters,
/// repliers at every nesting level and sharers.
///
/// Comment trees are walked with an explicit stack. Top-level comments sit at
/// depth 1; replies deeper than `max_depth` are skipped and counted.
pub fn attribute_post(
    board: &mut ScoreBoard,
    post: &Post,
    topic: Topic,
    weights: &Weights,
    max_depth: usize,
) -> WalkStats {
    let mut stats = WalkStats::default();

    board.credit(post.user_id.as_deref(), topic, weights.post);
    credit_engagements(board, &post.likes, topic, weights.like);

    let mut stack: Vec<(&Comment, usize)> = Vec::new();
    for comment in post.comments.iter().rev() {
        stack.push((comment, 1));
    }
    // Commenters are credited in document order before their threads are visited.
    for comment in &post.comments {
        board.credit(comment.user_id.as_deref(), topic, weights.comment);
    }

    while let Some((comment, depth)) = stack.pop() {
        credit_engagements(board, &comment.likes, topic, weights.like);

        if depth >= max_depth {
            stats.truncated_replies += comment.replies.iter().map(subtree_size).sum::<usize>();
            continue;
        }
        for reply in &comment.replies {
            board.credit(reply.user_id.as_deref(), topic, weights.reply);
        }
        for reply in comment.replies.iter().rev() {
            stack.push((reply, depth + 1));
        }
    }

    credit_engagements(board, &post.shares, topic, weights.share);
    stats
}

fn credit_engagements(board: &mut ScoreBoard, events: &[Engagement], topic: Topic, weight: u64) {
    for event in events {
        board.credit(event.user_id.as_deref(), topic, weight);
    }
}

fn subtree_size(root: &Comment) -> usize {
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.replies.iter());
    }
    count
}
