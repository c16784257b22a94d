//! Language-agnostic values handed back to callers

use indexmap::IndexMap;
use serde::Serialize;

/// A converted variable value.
///
/// Absent values ("undefined") are represented as `None` wherever a value may
/// appear, including inside lists and maps.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PlainValue {
    Bool(bool),
    Number(f64),
    String(String),
    Null,
    List(Vec<Option<PlainValue>>),
    /// Keys keep insertion order
    Map(IndexMap<String, Option<PlainValue>>),
}

impl PlainValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlainValue::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PlainValue::Number(value) => Some(*value),
            _ => None,
        }
    }
}

/// Text of a value used as a map key.
///
/// Follows object key coercion: lists join their elements with `,`, maps become
/// `[object Object]`, and an absent key is `undefined`.
pub fn key_string(key: Option<&PlainValue>) -> String {
    let Some(key) = key else {
        return "undefined".to_string();
    };
    match key {
        PlainValue::Bool(value) => value.to_string(),
        PlainValue::Number(value) => value.to_string(),
        PlainValue::String(text) => text.clone(),
        PlainValue::Null => "null".to_string(),
        PlainValue::List(items) => items
            .iter()
            .map(|item| match item {
                // Nothing inside a joined list prints for null or undefined
                None | Some(PlainValue::Null) => String::new(),
                Some(item) => key_string(Some(item)),
            })
            .collect::<Vec<_>>()
            .join(","),
        PlainValue::Map(_) => "[object Object]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_string() {
        assert_eq!(key_string(None), "undefined");
        assert_eq!(key_string(Some(&PlainValue::Number(2.0))), "2");
        assert_eq!(key_string(Some(&PlainValue::Number(0.5))), "0.5");
        assert_eq!(key_string(Some(&PlainValue::Null)), "null");
        assert_eq!(key_string(Some(&PlainValue::Bool(true))), "true");

        let list = PlainValue::List(vec![
            Some(PlainValue::String("a".to_string())),
            None,
            Some(PlainValue::Number(1.0)),
        ]);
        assert_eq!(key_string(Some(&list)), "a,,1");
        assert_eq!(key_string(Some(&PlainValue::Map(IndexMap::new()))), "[object Object]");
    }

    #[test]
    fn test_serializes_as_plain_json() {
        let mut map = IndexMap::new();
        map.insert("b".to_string(), Some(PlainValue::Number(1.0)));
        map.insert("a".to_string(), None);
        let value = PlainValue::List(vec![
            Some(PlainValue::Map(map)),
            Some(PlainValue::Null),
            Some(PlainValue::Bool(false)),
        ]);

        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"[{"b":1.0,"a":null},null,false]"#);
    }
}
