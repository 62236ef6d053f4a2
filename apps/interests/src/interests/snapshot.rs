use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::interests::aggregator::RecomputeReport;
use crate::interests::attribution::{ScoreBoard, TopicScores};

/// The complete result of one recompute cycle. Never mutated once published.
#[derive(Debug, Clone, Default)]
pub struct InterestSnapshot {
    /// 0 for the empty startup snapshot, then +1 per publication.
    pub version: u64,
    pub computed_at: Option<DateTime<Utc>>,
    pub users: BTreeMap<String, TopicScores>,
    pub topic_totals: TopicScores,
    pub last_report: Option<RecomputeReport>,
}

impl InterestSnapshot {
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn topic_count(&self) -> usize {
        self.topic_totals.len()
    }
}

/// Holder of the current snapshot.
///
/// Readers clone the `Arc` and keep a consistent view for as long as they like;
/// publishing replaces the pointer wholesale.
pub struct SnapshotCell {
    current: RwLock<Arc<InterestSnapshot>>,
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(InterestSnapshot::default())),
        }
    }
}

impl SnapshotCell {
    pub async fn load(&self) -> Arc<InterestSnapshot> {
        self.current.read().await.clone()
    }

    /// Publishes a finished board as the next version. The report is completed
    /// with the counts, version and timestamp of the published snapshot.
    pub async fn publish(&self, board: ScoreBoard, mut report: RecomputeReport) -> Arc<InterestSnapshot> {
        let mut current = self.current.write().await;
        let computed_at = Utc::now();
        let version = current.version + 1;

        report.users = board.users.len();
        report.topics = board.topic_totals.len();
        report.credit_total = board.topic_totals.total();
        report.version = version;
        report.computed_at = Some(computed_at);

        let next = Arc::new(InterestSnapshot {
            version,
            computed_at: Some(computed_at),
            users: board.users,
            topic_totals: board.topic_totals,
            last_report: Some(report),
        });
        *current = next.clone();
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interests::topic::Topic;

    #[tokio::test]
    async fn test_starts_empty() {
        let cell = SnapshotCell::default();
        let snap = cell.load().await;
        assert_eq!(snap.version, 0);
        assert_eq!(snap.user_count(), 0);
        assert!(snap.computed_at.is_none());
    }

    #[tokio::test]
    async fn test_publish_replaces_wholesale_and_bumps_version() {
        let cell = SnapshotCell::default();

        let mut first = ScoreBoard::default();
        first.credit(Some("u1"), Topic::Food, 3);
        cell.publish(first, RecomputeReport::default()).await;
        let held = cell.load().await;

        let mut second = ScoreBoard::default();
        second.credit(Some("u2"), Topic::Love, 1);
        let published = cell.publish(second, RecomputeReport::default()).await;

        assert_eq!(published.version, 2);
        assert!(!published.users.contains_key("u1"));
        assert_eq!(published.topic_totals.get(Topic::Food), 0);
        // A reader holding the old snapshot still sees it intact.
        assert_eq!(held.version, 1);
        assert_eq!(held.users["u1"].get(Topic::Food), 3);

        let report = published.last_report.as_ref().unwrap();
        assert_eq!((report.users, report.topics, report.version), (1, 1, 2));
    }
}
