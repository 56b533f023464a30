#![forbid(unsafe_code)]

//! JSON-compatible value aliases and comparison helpers.
//!
//! Presence snapshots, custom events, and immutable storage snapshots
//! are all plain JSON. The aliases here pin the concrete representation
//! so every crate in the workspace agrees on it.

/// A JSON-compatible value.
pub type Json = serde_json::Value;

/// A JSON object with string keys, used for presence snapshots and
/// presence patches.
pub type JsonObject = serde_json::Map<String, Json>;

/// One-level-deep equality for JSON values.
///
/// Arrays compare element-wise and objects compare entry-wise, one level
/// down; anything else falls back to plain value equality. Intended as
/// the `equals` argument of a binding whose selector rebuilds an array
/// or object on every evaluation, where full value equality is the
/// intent but the projection is cheap enough to compare shallowly.
#[must_use]
pub fn shallow(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Array(xs), Json::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x == y)
        }
        (Json::Object(xs), Json::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| x == y))
        }
        _ => a == b,
    }
}
