//! Optional-field access over a decoded reply.
//!
//! Replies are deeply nested and almost every field is optional. Instead of
//! chains of `get()` calls, fields are addressed with JSON pointers
//! (`"/result/0/message/chat/id"`) and missing or mistyped fields read as
//! `None`.

use serde_json::Value;

/// A borrowed view into a JSON document, rooted at some sub-tree.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    root: &'a Value,
}

impl<'a> Document<'a> {
    pub fn new(root: &'a Value) -> Self {
        Document { root }
    }

    /// The value at `pointer`, if present and not `null`.
    pub fn get(&self, pointer: &str) -> Option<&'a Value> {
        match self.root.pointer(pointer) {
            Some(Value::Null) | None => None,
            v => v,
        }
    }

    /// A view rooted at `pointer`.
    pub fn at(&self, pointer: &str) -> Option<Document<'a>> {
        self.get(pointer).map(Document::new)
    }

    pub fn contains(&self, pointer: &str) -> bool {
        self.get(pointer).is_some()
    }

    /// Truthiness of the value at `pointer`.
    ///
    /// Absent, `null`, `false`, numeric zero and the empty string are false;
    /// everything else, including empty objects and arrays, is true.
    pub fn truthy(&self, pointer: &str) -> bool {
        match self.get(pointer) {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    pub fn str(&self, pointer: &str) -> Option<&'a str> {
        self.get(pointer).and_then(Value::as_str)
    }

    pub fn string(&self, pointer: &str) -> Option<String> {
        self.str(pointer).map(str::to_string)
    }

    pub fn i64(&self, pointer: &str) -> Option<i64> {
        self.get(pointer).and_then(Value::as_i64)
    }

    /// Unsigned 32 bit field; out-of-range or negative values read as `None`.
    pub fn u32(&self, pointer: &str) -> Option<u32> {
        self.get(pointer)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    pub fn i32(&self, pointer: &str) -> Option<i32> {
        self.i64(pointer).and_then(|v| i32::try_from(v).ok())
    }

    pub fn u64(&self, pointer: &str) -> Option<u64> {
        self.get(pointer).and_then(Value::as_u64)
    }

    pub fn f64(&self, pointer: &str) -> Option<f64> {
        self.get(pointer).and_then(Value::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_access() {
        let v = json!({
            "ok": true,
            "result": [{
                "update_id": 100,
                "message": {"chat": {"id": -1001234, "title": null}, "text": "hi"}
            }]
        });
        let doc = Document::new(&v);

        assert_eq!(doc.u32("/result/0/update_id"), Some(100));
        assert_eq!(doc.i64("/result/0/message/chat/id"), Some(-1001234));
        assert_eq!(doc.str("/result/0/message/text"), Some("hi"));
        assert_eq!(doc.str("/result/0/message/chat/title"), None);
        assert_eq!(doc.u32("/result/1/update_id"), None);
        assert_eq!(doc.u32("/result/0/message/chat/id"), None);

        let msg = doc.at("/result/0/message").unwrap();
        assert_eq!(msg.str("/text"), Some("hi"));
        assert!(doc.at("/result/0/callback_query").is_none());
    }

    #[test]
    fn test_truthy() {
        let v = json!({
            "zero": 0,
            "one": 1,
            "empty": "",
            "text": "a",
            "obj": {},
            "arr": [],
            "no": false,
            "null": null
        });
        let doc = Document::new(&v);

        assert!(!doc.truthy("/zero"));
        assert!(doc.truthy("/one"));
        assert!(!doc.truthy("/empty"));
        assert!(doc.truthy("/text"));
        assert!(doc.truthy("/obj"));
        assert!(doc.truthy("/arr"));
        assert!(!doc.truthy("/no"));
        assert!(!doc.truthy("/null"));
        assert!(!doc.truthy("/missing"));
        assert!(doc.contains("/zero"));
        assert!(!doc.contains("/null"));
    }
}
