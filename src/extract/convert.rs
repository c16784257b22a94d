//! Conversion of engine values into plain values

use indexmap::IndexMap;

use super::plain::{key_string, PlainValue};
use crate::engine::SassValue;

/// Convert an engine value. Never fails; values with no plain counterpart
/// (function references) convert to `None`.
///
/// Units are dropped from numbers and string quoting is not kept.
pub fn convert(value: &SassValue) -> Option<PlainValue> {
    match value {
        SassValue::Boolean(value) => Some(PlainValue::Bool(*value)),
        SassValue::Color(color) => Some(PlainValue::String(color.to_string())),
        SassValue::List { items, .. } => Some(PlainValue::List(items.iter().map(convert).collect())),
        SassValue::Map(pairs) => {
            let mut map = IndexMap::with_capacity(pairs.len());
            for (key, value) in pairs {
                let key = key_string(convert(key).as_ref());
                // Keys that stringify alike collapse, keeping the first position and the last value
                map.insert(key, convert(value));
            }
            Some(PlainValue::Map(map))
        }
        SassValue::Number { value, .. } => Some(PlainValue::Number(*value)),
        SassValue::Null => Some(PlainValue::Null),
        SassValue::String { text, .. } => Some(PlainValue::String(text.clone())),
        SassValue::Function(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Color;

    #[test]
    fn test_scalars() {
        assert_eq!(convert(&SassValue::Boolean(true)), Some(PlainValue::Bool(true)));
        assert_eq!(convert(&SassValue::Null), Some(PlainValue::Null));
        assert_eq!(
            convert(&SassValue::number_with_unit(12.5, Some("px".to_string()))),
            Some(PlainValue::Number(12.5))
        );
        assert_eq!(
            convert(&SassValue::quoted("hi")),
            Some(PlainValue::String("hi".to_string()))
        );
        assert_eq!(convert(&SassValue::Function("darken".to_string())), None);
    }

    #[test]
    fn test_colors() {
        assert_eq!(
            convert(&SassValue::Color(Color::new_rgb(255.0, 0.0, 0.0))),
            Some(PlainValue::String("rgb(255, 0, 0)".to_string()))
        );
        assert_eq!(
            convert(&SassValue::Color(Color::new_rgba(255.0, 0.0, 0.0, 0.5))),
            Some(PlainValue::String("rgba(255, 0, 0, 0.5)".to_string()))
        );
    }

    #[test]
    fn test_list_keeps_length_and_order() {
        let list = SassValue::comma_list(vec![
            SassValue::number(1.0),
            SassValue::Function("f".to_string()),
            SassValue::unquoted("x"),
        ]);
        assert_eq!(
            convert(&list),
            Some(PlainValue::List(vec![
                Some(PlainValue::Number(1.0)),
                None,
                Some(PlainValue::String("x".to_string())),
            ]))
        );
    }

    #[test]
    fn test_map_keys_are_stringified() {
        let map = SassValue::Map(vec![
            (SassValue::unquoted("a"), SassValue::number(1.0)),
            (SassValue::number(2.0), SassValue::Boolean(false)),
            (SassValue::quoted("a"), SassValue::number(3.0)),
        ]);
        let Some(PlainValue::Map(converted)) = convert(&map) else {
            panic!("expected a map");
        };
        let keys: Vec<&str> = converted.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "2"]);
        assert_eq!(converted["a"], Some(PlainValue::Number(3.0)));
        assert_eq!(converted["2"], Some(PlainValue::Bool(false)));
    }
}
