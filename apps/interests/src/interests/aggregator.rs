//! Interest aggregator. One full recompute: fetch every post, classify,
//! attribute, publish a fresh snapshot. Nothing carries over between cycles.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, trace, warn};
use uuid::Uuid;

use crate::classifier::TextClassifier;
use crate::interests::attribution::{attribute_post, ScoreBoard, Weights};
use crate::interests::keywords;
use crate::interests::snapshot::{InterestSnapshot, SnapshotCell};
use crate::interests::text::extract_text;
use crate::interests::topic::Topic;
use crate::interests::zero_shot::{classify_in_batches, BatchSettings};
use crate::models::post::{MalformedPost, Post};
use crate::store::{PostStore, RawPost, StoreError};

/// Stack for the decode thread. Deep reply threads decode recursively.
const DECODE_STACK_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub batch: BatchSettings,
    pub weights: Weights,
    pub max_reply_depth: usize,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            batch: BatchSettings::default(),
            weights: Weights::default(),
            max_reply_depth: 512,
        }
    }
}

/// Per-cycle accounting. Every post ends up in exactly one of
/// `posts_attributed`, `posts_without_topic`, `posts_malformed` or
/// `posts_in_failed_batches`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeReport {
    pub cycle_id: Uuid,
    pub refined: bool,
    pub posts_seen: usize,
    pub posts_attributed: usize,
    pub posts_without_topic: usize,
    pub posts_malformed: usize,
    pub posts_in_failed_batches: usize,
    pub batches_total: usize,
    pub batches_failed: usize,
    pub truncated_replies: usize,
    pub users: usize,
    pub topics: usize,
    /// Sum of every credit handed out this cycle.
    pub credit_total: u64,
    pub version: u64,
    pub computed_at: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
}

pub struct InterestAggregator {
    store: Arc<dyn PostStore>,
    classifier: Arc<dyn TextClassifier>,
    settings: AggregatorSettings,
    snapshot: SnapshotCell,
    /// Serializes recomputes so manual and scheduled cycles never overlap.
    writer: Mutex<()>,
}

impl InterestAggregator {
    pub fn new(
        store: Arc<dyn PostStore>,
        classifier: Arc<dyn TextClassifier>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            store,
            classifier,
            settings,
            snapshot: SnapshotCell::default(),
            writer: Mutex::new(()),
        }
    }

    /// The latest published snapshot.
    pub async fn snapshot(&self) -> Arc<InterestSnapshot> {
        self.snapshot.load().await
    }

    /// Rebuilds all interests from the current corpus and publishes them.
    ///
    /// With `refine == false` only keyword matches count and unmatched posts are
    /// skipped. With `refine == true` every post goes through the zero-shot
    /// batches (keyword matches still win). Only a store failure aborts the cycle.
    pub async fn recompute(&self, refine: bool) -> Result<RecomputeReport, StoreError> {
        let _writer = self.writer.lock().await;
        let started = Instant::now();
        let cycle_id = Uuid::new_v4();
        info!(%cycle_id, refine, "Recompute started");

        let docs = self.store.fetch_all().await?;

        let mut report = RecomputeReport {
            cycle_id,
            refined: refine,
            posts_seen: docs.len(),
            ..Default::default()
        };

        let mut posts = Vec::with_capacity(docs.len());
        for decoded in decode_rows(&docs) {
            match decoded {
                Ok(post) => posts.push(post),
                Err(e) => {
                    warn!(%cycle_id, error = %e, "Skipping malformed post");
                    report.posts_malformed += 1;
                }
            }
        }
        drop(docs);

        let texts: Vec<String> = posts.iter().map(extract_text).collect();
        let keyword_topics: Vec<Option<Topic>> =
            texts.iter().map(|t| keywords::classify(t)).collect();

        let board = if refine {
            self.refine_pass(&posts, texts, &keyword_topics, &mut report)
                .await
        } else {
            self.fast_pass(&posts, &keyword_topics, &mut report)
        };

        if board.topic_totals.is_empty() && !posts.is_empty() {
            warn!(%cycle_id, posts = posts.len(), "No post matched a topic this cycle");
        }
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        let published = self.snapshot.publish(board, report).await;
        let report = published.last_report.clone().unwrap_or_default();

        info!(
            %cycle_id,
            users = report.users,
            topics = report.topics,
            credit_total = report.credit_total,
            version = report.version,
            posts = report.posts_seen,
            malformed = report.posts_malformed,
            batches_failed = report.batches_failed,
            elapsed_ms = report.elapsed_ms,
            "Recompute done"
        );
        Ok(report)
    }

    /// Keyword-only attribution. Posts without a keyword hit contribute nothing.
    fn fast_pass(
        &self,
        posts: &[Post],
        keyword_topics: &[Option<Topic>],
        report: &mut RecomputeReport,
    ) -> ScoreBoard {
        let mut board = ScoreBoard::default();
        for (post, topic) in posts.iter().zip(keyword_topics) {
            self.attribute(&mut board, post, *topic, report);
        }
        board
    }

    /// Zero-shot attribution. Each successful batch fills its own partial board;
    /// partials are merged in batch order so the result is deterministic.
    async fn refine_pass(
        &self,
        posts: &[Post],
        texts: Vec<String>,
        keyword_topics: &[Option<Topic>],
        report: &mut RecomputeReport,
    ) -> ScoreBoard {
        let outcomes = classify_in_batches(
            self.classifier.clone(),
            texts,
            keyword_topics,
            &self.settings.batch,
        )
        .await;
        report.batches_total = outcomes.len();

        let mut board = ScoreBoard::default();
        for outcome in outcomes {
            match outcome.topics {
                Ok(topics) => {
                    let mut partial = ScoreBoard::default();
                    for (post, topic) in posts[outcome.range].iter().zip(topics) {
                        self.attribute(&mut partial, post, topic, report);
                    }
                    board.merge(partial);
                }
                Err(e) => {
                    warn!(
                        cycle_id = %report.cycle_id,
                        batch = outcome.index,
                        posts = outcome.range.len(),
                        error = %e,
                        "Zero-shot batch failed; its posts are skipped this cycle"
                    );
                    report.batches_failed += 1;
                    report.posts_in_failed_batches += outcome.range.len();
                }
            }
        }
        board
    }

    fn attribute(
        &self,
        board: &mut ScoreBoard,
        post: &Post,
        topic: Option<Topic>,
        report: &mut RecomputeReport,
    ) {
        let Some(topic) = topic else {
            report.posts_without_topic += 1;
            return;
        };
        let stats = attribute_post(
            board,
            post,
            topic,
            &self.settings.weights,
            self.settings.max_reply_depth,
        );
        trace!(
            post_id = post.id.as_deref().unwrap_or("-"),
            %topic,
            truncated_replies = stats.truncated_replies,
            "Post attributed"
        );
        report.posts_attributed += 1;
        report.truncated_replies += stats.truncated_replies;
    }
}

/// Decodes every row on a dedicated thread with room for deep reply threads.
/// Falls back to the calling thread if that thread cannot be started.
fn decode_rows(rows: &[RawPost]) -> Vec<Result<Post, MalformedPost>> {
    let decode = || {
        rows.iter()
            .map(|row| Post::from_json(&row.id, &row.doc))
            .collect::<Vec<_>>()
    };

    let decoded = std::thread::scope(|scope| {
        let handle = std::thread::Builder::new()
            .name("post-decode".into())
            .stack_size(DECODE_STACK_BYTES)
            .spawn_scoped(scope, decode);
        match handle {
            Ok(handle) => handle.join().ok(),
            Err(e) => {
                warn!(error = %e, "Post decode thread unavailable");
                None
            }
        }
    });
    decoded.unwrap_or_else(decode)
}
