//! Batched zero-shot classification, the slow second tier.
//!
//! Texts are cut into fixed-size batches, each sent as one classifier call.
//! Batches run on a bounded pool; a failed or timed-out batch only loses its
//! own posts. Keyword topics still override whatever the model says.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::classifier::{Classification, ClassifierError, TextClassifier};
use crate::interests::topic::Topic;

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 64,
            concurrency: 4,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Outcome of one batch: on success, one resolved topic per post in `range`.
/// `None` means the model answered with a label outside the candidate set.
#[derive(Debug)]
pub struct BatchOutcome {
    pub index: usize,
    pub range: Range<usize>,
    pub topics: Result<Vec<Option<Topic>>, ClassifierError>,
}

/// Classifies `texts` in input-ordered batches. `keyword_topics[i]` is the
/// keyword result for `texts[i]` and takes precedence over the model.
pub async fn classify_in_batches(
    classifier: Arc<dyn TextClassifier>,
    texts: Vec<String>,
    keyword_topics: &[Option<Topic>],
    settings: &BatchSettings,
) -> Vec<BatchOutcome> {
    let batch_size = settings.batch_size.max(1);
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let timeout = settings.timeout;

    let mut handles: Vec<(Range<usize>, JoinHandle<Result<Vec<Classification>, ClassifierError>>)> =
        Vec::new();
    let mut start = 0;
    let mut remaining = texts.into_iter();

    loop {
        let batch: Vec<String> = remaining.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }
        let range = start..start + batch.len();
        start = range.end;

        let classifier = classifier.clone();
        let semaphore = semaphore.clone();
        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return Err(ClassifierError::Worker(e.to_string())),
            };
            let labels = Topic::candidate_labels();
            match tokio::time::timeout(timeout, classifier.classify(&batch, &labels)).await {
                Ok(result) => result,
                Err(_) => Err(ClassifierError::Timeout(timeout.as_secs())),
            }
        });
        handles.push((range, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, (range, handle)) in handles.into_iter().enumerate() {
        let classified = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(ClassifierError::Worker(join_err.to_string())),
        };
        let topics = classified.and_then(|results| {
            if results.len() != range.len() {
                return Err(ClassifierError::LengthMismatch {
                    expected: range.len(),
                    actual: results.len(),
                });
            }
            Ok(resolve_topics(&keyword_topics[range.clone()], &results))
        });
        outcomes.push(BatchOutcome {
            index,
            range,
            topics,
        });
    }
    outcomes
}

/// Keyword topic if present, else the model's top-ranked label.
fn resolve_topics(keyword_topics: &[Option<Topic>], results: &[Classification]) -> Vec<Option<Topic>> {
    keyword_topics
        .iter()
        .zip(results)
        .map(|(kw, result)| kw.or_else(|| result.top_label().and_then(|l| l.parse().ok())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedClassifier;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("post {i}")).collect()
    }

    fn settings(batch_size: usize) -> BatchSettings {
        BatchSettings {
            batch_size,
            concurrency: 2,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_batches_are_fixed_size_and_ordered() {
        let classifier = Arc::new(ScriptedClassifier::always("News"));
        let outcomes =
            classify_in_batches(classifier.clone(), texts(5), &[None; 5], &settings(2)).await;

        let ranges: Vec<_> = outcomes.iter().map(|o| o.range.clone()).collect();
        assert_eq!(ranges, vec![0..2, 2..4, 4..5]);
        assert_eq!(classifier.calls(), 3);
        assert!(outcomes
            .iter()
            .all(|o| o.topics.as_ref().unwrap().iter().all(|t| *t == Some(Topic::News))));
    }

    #[tokio::test]
    async fn test_keyword_topic_overrides_model() {
        let classifier = Arc::new(ScriptedClassifier::always("Health"));
        let kw = [Some(Topic::Cricket), None];
        let outcomes = classify_in_batches(classifier, texts(2), &kw, &settings(64)).await;

        let topics = outcomes[0].topics.as_ref().unwrap();
        assert_eq!(topics, &vec![Some(Topic::Cricket), Some(Topic::Health)]);
    }

    #[tokio::test]
    async fn test_failed_batch_is_isolated() {
        let classifier = Arc::new(ScriptedClassifier::always("Fashion").failing_on("post 2"));
        let outcomes = classify_in_batches(classifier, texts(6), &[None; 6], &settings(2)).await;

        assert!(outcomes[0].topics.is_ok());
        assert!(outcomes[1].topics.is_err());
        assert!(outcomes[2].topics.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_label_leaves_post_unresolved() {
        let classifier = Arc::new(ScriptedClassifier::always("Other"));
        let outcomes = classify_in_batches(classifier, texts(1), &[None], &settings(4)).await;
        assert_eq!(outcomes[0].topics.as_ref().unwrap(), &vec![None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_batch_times_out() {
        let classifier =
            Arc::new(ScriptedClassifier::always("News").with_delay(Duration::from_secs(30)));
        let outcomes = classify_in_batches(classifier, texts(1), &[None], &settings(4)).await;
        assert!(matches!(outcomes[0].topics, Err(ClassifierError::Timeout(5))));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let classifier = Arc::new(ScriptedClassifier::always("News"));
        let outcomes = classify_in_batches(classifier.clone(), Vec::new(), &[], &settings(4)).await;
        assert!(outcomes.is_empty());
        assert_eq!(classifier.calls(), 0);
    }
}
