use serde_json::Value;

use crate::models::post::Post;

const MEDIA_TEXT_KEYS: [&str; 4] = ["caption", "alt", "title", "description"];

/// Builds the classifiable text of a post: its body (`content`, else `text`)
/// followed by any caption/alt/title/description in the attached image metadata.
/// Empty parts are dropped; missing fields yield an empty string.
pub fn extract_text(post: &Post) -> String {
    let mut parts: Vec<String> = Vec::new();

    let body = [post.content.as_deref(), post.text.as_deref()]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty());
    if let Some(body) = body {
        parts.push(body.to_string());
    }

    // An empty `imageData` counts as missing and `image` is used instead.
    let media = [post.image_data.as_ref(), post.image.as_ref()]
        .into_iter()
        .flatten()
        .find_map(|v| v.as_object().filter(|meta| !meta.is_empty()));
    if let Some(meta) = media {
        for key in MEDIA_TEXT_KEYS {
            match meta.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => parts.push(s.clone()),
                Some(Value::Number(n)) => parts.push(n.to_string()),
                _ => {}
            }
        }
    }

    parts.join(" ")
}
