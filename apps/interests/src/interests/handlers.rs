use std::collections::BTreeMap;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::interests::aggregator::RecomputeReport;
use crate::interests::attribution::TopicScores;
use crate::interests::topic::Topic;
use crate::state::AppState;

const MAX_DEBUG_POSTS: i64 = 100;

fn default_top() -> usize {
    3
}

fn default_refine() -> bool {
    true
}

fn default_limit() -> i64 {
    10
}

/// Query-string flag: accepts `true/false`, `1/0`, `yes/no` and `on/off`.
fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean flag, got `{other}`"
        ))),
    }
}

#[derive(Deserialize)]
pub struct InterestsQuery {
    #[serde(default = "default_top")]
    pub top: usize,
    #[serde(default, deserialize_with = "de_flag")]
    pub full_map: bool,
}

#[derive(Serialize)]
pub struct UserInterests {
    pub top: Vec<(Topic, u64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<TopicScores>,
}

#[derive(Serialize)]
pub struct InterestsResponse {
    pub status: &'static str,
    pub users: usize,
    pub computed_at: Option<DateTime<Utc>>,
    pub user_interests: BTreeMap<String, UserInterests>,
}

/// GET /interests
pub async fn handle_interests(
    State(state): State<AppState>,
    query: Result<Query<InterestsQuery>, QueryRejection>,
) -> Result<Json<InterestsResponse>, AppError> {
    let Query(params) = query?;
    let snapshot = state.aggregator.snapshot().await;
    let user_interests: BTreeMap<String, UserInterests> = snapshot
        .users
        .iter()
        .map(|(uid, scores)| {
            let entry = UserInterests {
                top: scores.top(params.top),
                map: params.full_map.then(|| scores.clone()),
            };
            (uid.clone(), entry)
        })
        .collect();

    Ok(Json(InterestsResponse {
        status: "ok",
        users: user_interests.len(),
        computed_at: snapshot.computed_at,
        user_interests,
    }))
}

#[derive(Deserialize)]
pub struct RecomputeQuery {
    #[serde(default = "default_refine", deserialize_with = "de_flag")]
    pub refine: bool,
}

#[derive(Serialize)]
pub struct RecomputeResponse {
    pub status: &'static str,
    pub users: usize,
    pub topics: usize,
    pub report: RecomputeReport,
}

/// GET /recompute-now
pub async fn handle_recompute_now(
    State(state): State<AppState>,
    query: Result<Query<RecomputeQuery>, QueryRejection>,
) -> Result<Json<RecomputeResponse>, AppError> {
    let Query(params) = query?;
    let report = state.aggregator.recompute(params.refine).await?;
    Ok(Json(RecomputeResponse {
        status: "ok",
        users: report.users,
        topics: report.topics,
        report,
    }))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub users: usize,
    pub topics: usize,
    pub version: u64,
    pub computed_at: Option<DateTime<Utc>>,
    pub topic_totals: TopicScores,
    pub last_report: Option<RecomputeReport>,
}

/// GET /status
pub async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.aggregator.snapshot().await;
    Json(StatusResponse {
        status: "ok",
        users: snapshot.user_count(),
        topics: snapshot.topic_count(),
        version: snapshot.version,
        computed_at: snapshot.computed_at,
        topic_totals: snapshot.topic_totals.clone(),
        last_report: snapshot.last_report.clone(),
    })
}

#[derive(Deserialize)]
pub struct DebugPostsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Serialize)]
pub struct DebugPostsResponse {
    pub status: &'static str,
    pub count: usize,
    pub posts: Vec<Value>,
}

/// GET /debug-posts
pub async fn handle_debug_posts(
    State(state): State<AppState>,
    query: Result<Query<DebugPostsQuery>, QueryRejection>,
) -> Result<Json<DebugPostsResponse>, AppError> {
    let Query(params) = query?;
    if !(1..=MAX_DEBUG_POSTS).contains(&params.limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_DEBUG_POSTS}"
        )));
    }
    // Shown as stored; documents serde_json cannot hold stay as an error entry.
    let posts: Vec<Value> = state
        .store
        .sample(params.limit)
        .await?
        .into_iter()
        .map(|row| {
            serde_json::from_str(&row.doc)
                .unwrap_or_else(|e| json!({"_id": row.id, "undecodable": e.to_string()}))
        })
        .collect();
    Ok(Json(DebugPostsResponse {
        status: "ok",
        count: posts.len(),
        posts,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::interests::aggregator::{AggregatorSettings, InterestAggregator};
    use crate::routes::build_router;
    use crate::state::AppState;
    use crate::store::RawPost;
    use crate::test_support::{reply_thread, MemoryPostStore, ScriptedClassifier};

    use super::*;

    fn state(docs: Vec<Value>) -> (Arc<MemoryPostStore>, AppState) {
        let store = Arc::new(MemoryPostStore::with_docs(docs));
        let aggregator = Arc::new(InterestAggregator::new(
            store.clone(),
            Arc::new(ScriptedClassifier::always("News")),
            AggregatorSettings::default(),
        ));
        (
            store.clone(),
            AppState {
                aggregator,
                store,
            },
        )
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
        let response = build_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn corpus() -> Vec<Value> {
        vec![
            json!({"userId": "u1", "content": "cricket final", "comments": [{"userId": "u2"}]}),
            json!({"userId": "u2", "content": "pizza"}),
            json!({"userId": "u2", "content": "burger"}),
            json!({"userId": "u2", "content": "weekend trip"}),
        ]
    }

    #[tokio::test]
    async fn test_interests_top_n_sorted_descending() {
        let (_, state) = state(corpus());
        state.aggregator.recompute(false).await.unwrap();

        let (status, body) = get(state, "/interests?top=2&full_map=true").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"], 2);

        let u2 = &body["user_interests"]["u2"];
        // Cricket 2 (comment) and Food 2 tie; Cricket was credited first.
        assert_eq!(u2["top"], json!([["Cricket", 2], ["Food", 2]]));
        assert_eq!(u2["map"]["Travel"], 1);
    }

    #[tokio::test]
    async fn test_interests_omits_map_by_default() {
        let (_, state) = state(corpus());
        state.aggregator.recompute(false).await.unwrap();

        let (_, body) = get(state, "/interests").await;
        let u1 = &body["user_interests"]["u1"];
        assert_eq!(u1["top"], json!([["Cricket", 1]]));
        assert!(u1.get("map").is_none());
    }

    #[tokio::test]
    async fn test_recompute_now_returns_counts() {
        let (_, state) = state(corpus());
        let (status, body) = get(state.clone(), "/recompute-now?refine=false").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"], 2);
        assert_eq!(body["topics"], 3);
        assert_eq!(body["report"]["refined"], false);
        assert_eq!(state.aggregator.snapshot().await.version, 1);
    }

    #[tokio::test]
    async fn test_recompute_now_store_down_is_503() {
        let (store, state) = state(corpus());
        store.set_unavailable(true);

        let (status, body) = get(state, "/recompute-now").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_status_does_not_trigger_work() {
        let (_, state) = state(corpus());
        let (status, body) = get(state.clone(), "/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"], 0);
        assert_eq!(body["version"], 0);
        assert!(body["last_report"].is_null());
        assert_eq!(state.aggregator.snapshot().await.version, 0);
    }

    #[tokio::test]
    async fn test_debug_posts_limits() {
        let (_, state) = state(corpus());
        let (status, body) = get(state.clone(), "/debug-posts?limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);

        let (status, body) = get(state, "/debug-posts?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_bad_query_parameter_is_json_validation_error() {
        let (_, state) = state(corpus());
        for uri in [
            "/interests?top=-1",
            "/recompute-now?refine=maybe",
            "/debug-posts?limit=ten",
        ] {
            let (status, body) = get(state.clone(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR", "{uri}");
        }
        assert_eq!(state.aggregator.snapshot().await.version, 0);
    }

    #[tokio::test]
    async fn test_flags_accept_common_spellings() {
        let (_, state) = state(corpus());

        let (status, body) = get(state.clone(), "/recompute-now?refine=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["refined"], true);

        let (_, body) = get(state.clone(), "/recompute-now?refine=OFF").await;
        assert_eq!(body["report"]["refined"], false);

        let (status, body) = get(state, "/interests?full_map=yes").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_interests"]["u2"]["map"]["Food"], 2);
    }

    #[tokio::test]
    async fn test_debug_posts_shows_deep_documents_as_errors() {
        let store = Arc::new(MemoryPostStore::with_rows(vec![RawPost {
            id: "deep".into(),
            doc: reply_thread(100),
        }]));
        let aggregator = Arc::new(InterestAggregator::new(
            store.clone(),
            Arc::new(ScriptedClassifier::always("News")),
            AggregatorSettings::default(),
        ));
        let (status, body) = get(AppState { aggregator, store }, "/debug-posts").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["posts"][0]["_id"], "deep");
        assert!(body["posts"][0]["undecodable"].is_string());
    }
}
