use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// A post document as stored by the social app. Read-only to this service.
///
/// Field names follow the document store (`userId`, `imageData`, `shares_data`).
/// Absent or `null` arrays decode to empty; blank or `null` user ids decode to `None`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id", default, deserialize_with = "de_identifier")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_identifier")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub text: Option<String>,
    #[serde(default)]
    pub image_data: Option<Value>,
    #[serde(default)]
    pub image: Option<Value>,
    #[serde(default, deserialize_with = "de_list")]
    pub likes: Vec<Engagement>,
    #[serde(default, deserialize_with = "de_list")]
    pub comments: Vec<Comment>,
    #[serde(rename = "shares_data", default, deserialize_with = "de_list")]
    pub shares: Vec<Engagement>,
}

/// A comment or reply. Replies nest without bound.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default, deserialize_with = "de_identifier")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "de_list")]
    pub likes: Vec<Engagement>,
    #[serde(default, deserialize_with = "de_list")]
    pub replies: Vec<Comment>,
}

/// A like or share: only the acting user matters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    #[serde(default, deserialize_with = "de_identifier")]
    pub user_id: Option<String>,
}

/// Deepest JSON nesting accepted in a post document. Each reply level adds two
/// (the reply object and its `replies` array).
pub const MAX_DOCUMENT_NESTING: usize = 4096;

#[derive(Debug, Error)]
#[error("malformed post document {id:?}: {source}")]
pub struct MalformedPost {
    pub id: Option<String>,
    #[source]
    pub source: serde_json::Error,
}

impl Post {
    /// Decodes one stored document from its JSON text. A structurally wrong
    /// sub-document fails the whole post; the caller isolates the failure.
    ///
    /// serde_json's recursion limit is lifted so long reply threads decode and
    /// the attribution depth cap decides what counts. Documents nested past
    /// [`MAX_DOCUMENT_NESTING`] are rejected before decoding.
    pub fn from_json(id: &str, doc: &str) -> Result<Self, MalformedPost> {
        let malformed = |source: serde_json::Error| MalformedPost {
            id: Some(id.to_string()),
            source,
        };

        let depth = nesting_depth(doc);
        if depth > MAX_DOCUMENT_NESTING {
            return Err(malformed(serde::de::Error::custom(format!(
                "nesting depth {depth} exceeds {MAX_DOCUMENT_NESTING}"
            ))));
        }

        let mut de = serde_json::Deserializer::from_str(doc);
        de.disable_recursion_limit();
        let post = Post::deserialize(&mut de).map_err(malformed)?;
        de.end().map_err(malformed)?;
        Ok(post)
    }
}

/// Maximum bracket nesting of a JSON text, ignoring brackets inside strings.
fn nesting_depth(doc: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for b in doc.bytes() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

/// Extracts an identifier from a string, number or `{"$oid": ...}` value.
fn identifier_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(identifier_from_value),
        _ => None,
    }
}

fn de_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(false)) => Ok(None),
        Some(v @ (Value::String(_) | Value::Number(_))) => Ok(identifier_from_value(&v)),
        Some(v @ Value::Object(_)) if v.get("$oid").is_some() => Ok(identifier_from_value(&v)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "unsupported identifier: {other}"
        ))),
    }
}

fn de_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn de_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
