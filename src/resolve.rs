//! Dot-path lookup into a JSON record.
use serde_json::Value;

/// Follow `path` (e.g. `reviewer.avatar.medium_url`) from `root`.
///
/// Each segment is a field name looked up on an object. Anything else
/// (a scalar or sequence in the way, an empty segment, a missing field)
/// yields `None`. There is no index or wildcard syntax.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(root, |current, segment| {
        if segment.is_empty() {
            return None;
        }
        current.as_object()?.get(segment)
    })
}

/// Text form of a resolved value. Only scalars have one.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_lookup() {
        let root = json!({ "reviewer": { "avatar": { "medium_url": "https://x/a.png" } } });
        assert_eq!(
            resolve(&root, "reviewer.avatar.medium_url"),
            Some(&json!("https://x/a.png"))
        );
        assert_eq!(resolve(&root, "reviewer.avatar").map(Value::is_object), Some(true));
    }

    #[test]
    fn missing_segments_are_absent() {
        let root = json!({ "a": { "b": 1 }, "list": [{ "x": 1 }], "n": null });
        for path in ["missing", "a.c", "a.b.c", "list.x", "list.0", "n.x", "", ".", "a..b", "a.", ".a"] {
            assert_eq!(resolve(&root, path), None, "{path}");
        }
    }

    #[test]
    fn non_object_root() {
        assert_eq!(resolve(&json!(5), "a"), None);
        assert_eq!(resolve(&json!("str"), "len"), None);
    }

    #[test]
    fn scalar_text_forms() {
        assert_eq!(scalar_text(&json!("x")).as_deref(), Some("x"));
        assert_eq!(scalar_text(&json!(5)).as_deref(), Some("5"));
        assert_eq!(scalar_text(&json!(4.5)).as_deref(), Some("4.5"));
        assert_eq!(scalar_text(&json!(true)).as_deref(), Some("true"));
        assert_eq!(scalar_text(&json!(null)), None);
        assert_eq!(scalar_text(&json!({ "a": 1 })), None);
    }
}
