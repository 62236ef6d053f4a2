//! Fakes for the two external collaborators: the post store and the classifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::classifier::{Classification, ClassifierError, TextClassifier};
use crate::store::{PostStore, RawPost, StoreError};

/// In-memory post store whose corpus can be swapped between cycles.
#[derive(Default)]
pub struct MemoryPostStore {
    rows: Mutex<Vec<RawPost>>,
    unavailable: Mutex<bool>,
}

impl MemoryPostStore {
    pub fn with_docs(docs: Vec<Value>) -> Self {
        Self::with_rows(rows_from(docs))
    }

    /// Stores documents verbatim, exactly as the database would hand them out.
    pub fn with_rows(rows: Vec<RawPost>) -> Self {
        Self {
            rows: Mutex::new(rows),
            unavailable: Mutex::new(false),
        }
    }

    pub fn replace(&self, docs: Vec<Value>) {
        *self.rows.lock().unwrap() = rows_from(docs);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }
}

/// Row keys come from `_id` when it is a string, else from the position.
fn rows_from(docs: Vec<Value>) -> Vec<RawPost> {
    docs.into_iter()
        .enumerate()
        .map(|(i, doc)| RawPost {
            id: doc
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("post-{i:04}")),
            doc: doc.to_string(),
        })
        .collect()
}

/// JSON text of a cricket post whose single comment carries `depth` levels of
/// replies. Built as text so no step nests `Value`s recursively.
pub fn reply_thread(depth: usize) -> String {
    let mut thread = String::from(r#"{"userId":"leaf"}"#);
    for level in (1..depth).rev() {
        thread = format!(r#"{{"userId":"r{level}","replies":[{thread}]}}"#);
    }
    format!(r#"{{"_id":"deep","userId":"author","content":"cricket","comments":[{thread}]}}"#)
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn fetch_all(&self) -> Result<Vec<RawPost>, StoreError> {
        if *self.unavailable.lock().unwrap() {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn sample(&self, limit: i64) -> Result<Vec<RawPost>, StoreError> {
        let rows = self.fetch_all().await?;
        Ok(rows.into_iter().take(limit.max(0) as usize).collect())
    }
}

/// Classifier with canned answers: a default label, per-text overrides, an
/// optional poison text that fails its whole batch, and an optional delay.
pub struct ScriptedClassifier {
    default_label: String,
    overrides: HashMap<String, String>,
    poison: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn always(label: &str) -> Self {
        Self {
            default_label: label.to_string(),
            overrides: HashMap::new(),
            poison: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn answering(mut self, text: &str, label: &str) -> Self {
        self.overrides.insert(text.to_string(), label.to_string());
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.poison = Some(text.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        texts: &[String],
        labels: &[&str],
    ) -> Result<Vec<Classification>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(poison) = &self.poison {
            if texts.iter().any(|t| t == poison) {
                return Err(ClassifierError::Api {
                    status: 500,
                    message: "scripted failure".into(),
                });
            }
        }
        Ok(texts
            .iter()
            .map(|text| {
                let top = self
                    .overrides
                    .get(text)
                    .unwrap_or(&self.default_label)
                    .clone();
                let mut ranked = vec![top.clone()];
                ranked.extend(labels.iter().filter(|l| **l != top).map(|l| l.to_string()));
                Classification {
                    labels: ranked,
                    scores: Vec::new(),
                }
            })
            .collect())
    }
}
