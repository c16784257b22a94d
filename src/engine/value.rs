//! Native values produced by the evaluator
//!
//! `SassValue` is the closed set of runtime types the engine works with. Hook
//! functions receive and return these values; the extractor converts them into
//! plain data afterwards.

use std::fmt;

use super::color::Color;
use super::error::{EngineError, EngineResult};

/// Separator between list elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSeparator {
    Space,
    Comma,
}

impl ListSeparator {
    fn as_str(self) -> &'static str {
        match self {
            ListSeparator::Space => " ",
            ListSeparator::Comma => ", ",
        }
    }
}

/// A concrete value computed by the evaluator
#[derive(Debug, Clone, PartialEq)]
pub enum SassValue {
    Boolean(bool),
    Color(Color),
    List {
        items: Vec<SassValue>,
        separator: ListSeparator,
    },
    /// Ordered key/value pairs
    Map(Vec<(SassValue, SassValue)>),
    Number {
        value: f64,
        unit: Option<String>,
    },
    Null,
    String {
        text: String,
        quoted: bool,
    },
    /// First-class function reference returned by `get-function()`
    Function(String),
}

impl SassValue {
    pub fn number(value: f64) -> Self {
        SassValue::Number { value, unit: None }
    }

    pub fn number_with_unit(value: f64, unit: Option<String>) -> Self {
        SassValue::Number { value, unit }
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        SassValue::String {
            text: text.into(),
            quoted: true,
        }
    }

    pub fn unquoted(text: impl Into<String>) -> Self {
        SassValue::String {
            text: text.into(),
            quoted: false,
        }
    }

    pub fn comma_list(items: Vec<SassValue>) -> Self {
        SassValue::List {
            items,
            separator: ListSeparator::Comma,
        }
    }

    pub fn space_list(items: Vec<SassValue>) -> Self {
        SassValue::List {
            items,
            separator: ListSeparator::Space,
        }
    }

    /// Everything except `false` and `null` is truthy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, SassValue::Boolean(false) | SassValue::Null)
    }

    /// Name reported by `type-of()`
    pub fn type_name(&self) -> &'static str {
        match self {
            SassValue::Boolean(_) => "bool",
            SassValue::Color(_) => "color",
            SassValue::List { .. } => "list",
            SassValue::Map(_) => "map",
            SassValue::Number { .. } => "number",
            SassValue::Null => "null",
            SassValue::String { .. } => "string",
            SassValue::Function(_) => "function",
        }
    }

    /// Elements when the value is treated as a list; maps become key/value pairs
    pub fn as_list(&self) -> Vec<SassValue> {
        match self {
            SassValue::List { items, .. } => items.clone(),
            SassValue::Map(pairs) => pairs
                .iter()
                .map(|(key, value)| SassValue::space_list(vec![key.clone(), value.clone()]))
                .collect(),
            other => vec![other.clone()],
        }
    }

    /// Text without quotes, as used by interpolation and string concatenation
    pub fn to_unquoted_text(&self) -> String {
        match self {
            SassValue::String { text, .. } => text.clone(),
            other => other.to_string(),
        }
    }

    /// Equality the way `==` sees it: quoting is ignored and numbers compare with their unit
    pub fn sass_eq(&self, other: &SassValue) -> bool {
        match (self, other) {
            (SassValue::String { text: a, .. }, SassValue::String { text: b, .. }) => a == b,
            (SassValue::Number { value: a, unit: ua }, SassValue::Number { value: b, unit: ub }) => {
                ua == ub && fuzzy_equals(*a, *b)
            }
            (
                SassValue::List { items: a, separator: sa },
                SassValue::List { items: b, separator: sb },
            ) => sa == sb && a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.sass_eq(y)),
            (SassValue::Map(a), SassValue::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter()
                            .any(|(other_key, other_value)| key.sass_eq(other_key) && value.sass_eq(other_value))
                    })
            }
            _ => self == other,
        }
    }

    pub fn add(&self, rhs: &SassValue) -> EngineResult<SassValue> {
        match (self, rhs) {
            (SassValue::Number { .. }, SassValue::Number { .. }) => {
                number_op(self, rhs, "+", |a, b| a + b)
            }
            (SassValue::Color(_), SassValue::Color(_) | SassValue::Number { .. })
            | (SassValue::Number { .. }, SassValue::Color(_)) => color_op(self, "+", rhs, |a, b| a + b),
            (SassValue::String { text, quoted }, _) => Ok(SassValue::String {
                text: format!("{}{}", text, rhs.to_unquoted_text()),
                quoted: *quoted,
            }),
            (_, SassValue::String { text, quoted }) => Ok(SassValue::String {
                text: format!("{}{}", self, text),
                quoted: *quoted,
            }),
            _ => Ok(SassValue::unquoted(format!("{}+{}", self, rhs))),
        }
    }

    pub fn sub(&self, rhs: &SassValue) -> EngineResult<SassValue> {
        match (self, rhs) {
            (SassValue::Number { .. }, SassValue::Number { .. }) => {
                number_op(self, rhs, "-", |a, b| a - b)
            }
            (SassValue::Color(_), SassValue::Color(_) | SassValue::Number { .. })
            | (SassValue::Number { .. }, SassValue::Color(_)) => color_op(self, "-", rhs, |a, b| a - b),
            _ => Ok(SassValue::unquoted(format!("{}-{}", self, rhs))),
        }
    }

    pub fn mul(&self, rhs: &SassValue) -> EngineResult<SassValue> {
        if matches!(self, SassValue::Color(_)) || matches!(rhs, SassValue::Color(_)) {
            return color_op(self, "*", rhs, |a, b| a * b);
        }
        let (SassValue::Number { value: a, unit: ua }, SassValue::Number { value: b, unit: ub }) = (self, rhs) else {
            return Err(undefined_operation(self, "*", rhs));
        };
        match (ua, ub) {
            (Some(_), Some(_)) => Err(EngineError::Evaluation {
                message: format!("{} * {} isn't a valid CSS value.", self, rhs),
            }),
            _ => Ok(SassValue::number_with_unit(a * b, ua.clone().or_else(|| ub.clone()))),
        }
    }

    pub fn div(&self, rhs: &SassValue) -> EngineResult<SassValue> {
        if let (SassValue::Color(_), SassValue::Color(_) | SassValue::Number { .. }) = (self, rhs) {
            return color_op(self, "/", rhs, |a, b| a / b);
        }
        let (SassValue::Number { value: a, unit: ua }, SassValue::Number { value: b, unit: ub }) = (self, rhs) else {
            return Ok(SassValue::unquoted(format!("{}/{}", self, rhs)));
        };
        let unit = match (ua, ub) {
            (Some(x), Some(y)) if x == y => None,
            (unit, None) => unit.clone(),
            _ => {
                return Err(EngineError::Evaluation {
                    message: format!("{} / {} isn't a valid CSS value.", self, rhs),
                });
            }
        };
        Ok(SassValue::number_with_unit(a / b, unit))
    }

    pub fn rem(&self, rhs: &SassValue) -> EngineResult<SassValue> {
        match (self, rhs) {
            (SassValue::Number { .. }, SassValue::Number { .. }) => {
                number_op(self, rhs, "%", |a, b| a % b)
            }
            _ => Err(undefined_operation(self, "%", rhs)),
        }
    }

    /// Numeric comparison for `<`, `<=`, `>` and `>=`
    pub fn compare(&self, rhs: &SassValue, op: &str) -> EngineResult<bool> {
        let (SassValue::Number { value: a, unit: ua }, SassValue::Number { value: b, unit: ub }) = (self, rhs) else {
            return Err(undefined_operation(self, op, rhs));
        };
        if ua.is_some() && ub.is_some() && ua != ub {
            return Err(incompatible_units(ua, ub));
        }
        Ok(match op {
            "<" => a < b,
            "<=" => a <= b,
            ">" => a > b,
            _ => a >= b,
        })
    }
}

/// Channel-wise arithmetic. A number applies to every channel; two colors
/// must have the same alpha, which the result keeps.
fn color_op(lhs: &SassValue, op: &str, rhs: &SassValue, apply: impl Fn(f64, f64) -> f64) -> EngineResult<SassValue> {
    let (color, operand, swapped) = match (lhs, rhs) {
        (SassValue::Color(color), operand) => (color, operand, false),
        // Only the commutative operators accept a number on the left
        (operand @ SassValue::Number { .. }, SassValue::Color(color)) if matches!(op, "+" | "*") => {
            (color, operand, true)
        }
        _ => return Err(undefined_operation(lhs, op, rhs)),
    };

    let (r, g, b) = match operand {
        SassValue::Color(other) if other.a != color.a => {
            return Err(EngineError::Evaluation {
                message: format!("Alpha channels must be equal: {} {} {}.", lhs, op, rhs),
            });
        }
        SassValue::Color(other) => (other.r, other.g, other.b),
        SassValue::Number { value, unit: None } => (*value, *value, *value),
        _ => return Err(undefined_operation(lhs, op, rhs)),
    };
    let channel = |own: f64, other: f64| if swapped { apply(other, own) } else { apply(own, other) };

    Ok(SassValue::Color(Color::new_rgba(
        channel(color.r, r),
        channel(color.g, g),
        channel(color.b, b),
        color.a,
    )))
}

fn number_op(lhs: &SassValue, rhs: &SassValue, op: &str, apply: impl Fn(f64, f64) -> f64) -> EngineResult<SassValue> {
    let (SassValue::Number { value: a, unit: ua }, SassValue::Number { value: b, unit: ub }) = (lhs, rhs) else {
        return Err(undefined_operation(lhs, op, rhs));
    };
    let unit = match (ua, ub) {
        (Some(x), Some(y)) if x != y => return Err(incompatible_units(ua, ub)),
        (Some(x), _) => Some(x.clone()),
        (None, other) => other.clone(),
    };
    Ok(SassValue::number_with_unit(apply(*a, *b), unit))
}

/// Numbers closer than this are equal
const EPSILON: f64 = 1e-10;

fn fuzzy_equals(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Number text with at most ten decimal places, so float noise never shows
pub(crate) fn format_number(value: f64) -> String {
    let rounded = if value.abs() < 1e15 {
        (value * 1e10).round() / 1e10
    } else {
        value
    };
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}

fn incompatible_units(a: &Option<String>, b: &Option<String>) -> EngineError {
    EngineError::Evaluation {
        message: format!(
            "Incompatible units {} and {}.",
            a.as_deref().unwrap_or_default(),
            b.as_deref().unwrap_or_default()
        ),
    }
}

fn undefined_operation(lhs: &SassValue, op: &str, rhs: &SassValue) -> EngineError {
    EngineError::Evaluation {
        message: format!("Undefined operation \"{} {} {}\".", lhs, op, rhs),
    }
}

/// CSS representation of the value
impl fmt::Display for SassValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SassValue::Boolean(value) => write!(f, "{}", value),
            SassValue::Color(color) => write!(f, "{}", color),
            SassValue::List { items, separator } => {
                let parts: Vec<String> = items
                    .iter()
                    .filter(|item| !matches!(item, SassValue::Null))
                    .map(|item| item.to_string())
                    .collect();
                write!(f, "{}", parts.join(separator.as_str()))
            }
            SassValue::Map(pairs) => {
                let parts: Vec<String> = pairs
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect();
                write!(f, "({})", parts.join(", "))
            }
            SassValue::Number { value, unit } => {
                write!(f, "{}{}", format_number(*value), unit.as_deref().unwrap_or_default())
            }
            SassValue::Null => Ok(()),
            SassValue::String { text, quoted: true } => write!(f, "\"{}\"", text),
            SassValue::String { text, quoted: false } => write!(f, "{}", text),
            SassValue::Function(name) => write!(f, "get-function(\"{}\")", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(value: f64) -> SassValue {
        SassValue::number_with_unit(value, Some("px".to_string()))
    }

    #[test]
    fn test_number_arithmetic_keeps_units() {
        assert_eq!(px(10.0).add(&SassValue::number(2.0)).unwrap(), px(12.0));
        assert_eq!(SassValue::number(3.0).mul(&px(2.0)).unwrap(), px(6.0));
        assert_eq!(px(10.0).div(&px(4.0)).unwrap(), SassValue::number(2.5));
        assert_eq!(px(10.0).div(&SassValue::number(4.0)).unwrap(), px(2.5));
        assert_eq!(SassValue::number(7.0).rem(&SassValue::number(4.0)).unwrap(), SassValue::number(3.0));
    }

    #[test]
    fn test_incompatible_units() {
        let em = SassValue::number_with_unit(1.0, Some("em".to_string()));
        assert!(matches!(px(1.0).add(&em), Err(EngineError::Evaluation { .. })));
        assert!(px(1.0).mul(&px(2.0)).is_err());
        assert!(px(1.0).compare(&em, "<").is_err());
    }

    #[test]
    fn test_string_concatenation() {
        let joined = SassValue::quoted("foo").add(&SassValue::unquoted("bar")).unwrap();
        assert_eq!(joined, SassValue::quoted("foobar"));

        let joined = SassValue::unquoted("a").add(&SassValue::number(1.0)).unwrap();
        assert_eq!(joined, SassValue::unquoted("a1"));

        let joined = SassValue::number(1.0).add(&SassValue::quoted("x")).unwrap();
        assert_eq!(joined, SassValue::quoted("1x"));

        let slash = SassValue::unquoted("a").div(&SassValue::unquoted("b")).unwrap();
        assert_eq!(slash, SassValue::unquoted("a/b"));
    }

    #[test]
    fn test_color_arithmetic() {
        let color = |hex: &str| SassValue::Color(Color::from_hex(hex).unwrap());

        assert_eq!(color("#111").add(&color("#222")).unwrap(), color("#333"));
        assert_eq!(color("#333").sub(&color("#111")).unwrap(), color("#222"));
        assert_eq!(color("#010203").add(&SassValue::number(1.0)).unwrap(), color("#020304"));
        assert_eq!(SassValue::number(1.0).add(&color("#010203")).unwrap(), color("#020304"));
        assert_eq!(color("#102030").mul(&SassValue::number(2.0)).unwrap(), color("#204060"));
        assert_eq!(color("#204060").div(&SassValue::number(2.0)).unwrap(), color("#102030"));
        // Channels are clamped
        assert_eq!(color("#f00").add(&color("#f00")).unwrap(), color("#f00"));
    }

    #[test]
    fn test_invalid_color_arithmetic() {
        let red = SassValue::Color(Color::new_rgb(255.0, 0.0, 0.0));
        let faded = SassValue::Color(Color::new_rgba(255.0, 0.0, 0.0, 0.5));
        assert!(matches!(red.add(&faded), Err(EngineError::Evaluation { .. })));
        assert!(SassValue::number(1.0).sub(&red).is_err());
        assert!(red.add(&px(1.0)).is_err());
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(SassValue::number(0.1 + 0.2).to_string(), "0.3");
        assert_eq!(SassValue::number(-0.0).to_string(), "0");
        assert_eq!(px(1e3).to_string(), "1000px");
        assert!(SassValue::number(0.1 + 0.2).sass_eq(&SassValue::number(0.3)));
    }

    #[test]
    fn test_equality_and_truthiness() {
        assert!(SassValue::quoted("a").sass_eq(&SassValue::unquoted("a")));
        assert!(!px(1.0).sass_eq(&SassValue::number(1.0)));
        assert!(SassValue::number(0.0).is_truthy());
        assert!(!SassValue::Null.is_truthy());
        assert!(!SassValue::Boolean(false).is_truthy());

        let a = SassValue::Map(vec![
            (SassValue::unquoted("x"), SassValue::number(1.0)),
            (SassValue::unquoted("y"), SassValue::number(2.0)),
        ]);
        let b = SassValue::Map(vec![
            (SassValue::unquoted("y"), SassValue::number(2.0)),
            (SassValue::quoted("x"), SassValue::number(1.0)),
        ]);
        assert!(a.sass_eq(&b));
    }

    #[test]
    fn test_css_representation() {
        let list = SassValue::comma_list(vec![px(1.0), SassValue::quoted("a"), SassValue::Null]);
        assert_eq!(list.to_string(), "1px, \"a\"");
        let map = SassValue::Map(vec![(SassValue::unquoted("k"), SassValue::Boolean(true))]);
        assert_eq!(map.to_string(), "(k: true)");
        assert_eq!(SassValue::number(0.5).to_string(), "0.5");
        assert_eq!(SassValue::quoted("hi").to_unquoted_text(), "hi");
    }
}
