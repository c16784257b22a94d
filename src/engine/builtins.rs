//! Built-in functions of the evaluator

use super::color::Color;
use super::error::{EngineError, EngineResult};
use super::value::{ListSeparator, SassValue};

/// Built-in modules reachable through `@use "sass:<name>"`
pub(crate) const MODULES: &[&str] = &["color", "list", "map", "math", "meta", "string"];

/// Sass functions this evaluator does not implement. Calling one is an error
/// instead of being passed through as plain CSS.
const UNSUPPORTED: &[&str] = &[
    "adjust-color",
    "call",
    "change-color",
    "comparable",
    "content-exists",
    "feature-exists",
    "function-exists",
    "ie-hex-str",
    "is-bracketed",
    "is-superselector",
    "keywords",
    "mixin-exists",
    "module-functions",
    "module-variables",
    "random",
    "scale-color",
    "selector-append",
    "selector-extend",
    "selector-nest",
    "selector-parse",
    "selector-replace",
    "selector-unify",
    "set-nth",
    "simple-selectors",
    "str-index",
    "str-insert",
    "str-slice",
    "unique-id",
    "zip",
];

/// Call a built-in function. `None` if `name` is not a built-in.
pub(crate) fn call(name: &str, args: &[SassValue]) -> Option<EngineResult<SassValue>> {
    // Single-number forms are CSS filter functions
    if matches!(name, "grayscale" | "invert" | "opacity" | "saturate")
        && matches!(args, [SassValue::Number { .. }])
    {
        return Some(Ok(css_call(name, args)));
    }

    let result = match name {
        "rgb" | "rgba" => rgb(name, args),
        "hsl" | "hsla" => hsl(name, args),
        "red" => channel(name, args, |color| color.r),
        "green" => channel(name, args, |color| color.g),
        "blue" => channel(name, args, |color| color.b),
        "alpha" | "opacity" => channel(name, args, |color| color.a),
        "hue" => hsl_channel(name, args, |(hue, _, _)| hue, "deg"),
        "saturation" => hsl_channel(name, args, |(_, saturation, _)| saturation, "%"),
        "lightness" => hsl_channel(name, args, |(_, _, lightness)| lightness, "%"),
        "lighten" => adjust_hsl(name, args, |(h, s, l), amount| (h, s, l + amount)),
        "darken" => adjust_hsl(name, args, |(h, s, l), amount| (h, s, l - amount)),
        "saturate" => adjust_hsl(name, args, |(h, s, l), amount| (h, s + amount, l)),
        "desaturate" => adjust_hsl(name, args, |(h, s, l), amount| (h, s - amount, l)),
        "adjust-hue" => adjust_hsl(name, args, |(h, s, l), degrees| (h + degrees, s, l)),
        "complement" => arity(name, args, 1)
            .and_then(|()| adjust_hsl(name, &[args[0].clone(), SassValue::number(180.0)], |(h, s, l), degrees| (h + degrees, s, l))),
        "grayscale" => arity(name, args, 1)
            .and_then(|()| adjust_hsl(name, &[args[0].clone(), SassValue::number(100.0)], |(h, s, l), amount| (h, s - amount, l))),
        "opacify" | "fade-in" => adjust_alpha(name, args, |alpha, amount| alpha + amount),
        "transparentize" | "fade-out" => adjust_alpha(name, args, |alpha, amount| alpha - amount),
        "mix" => mix(name, args),
        "invert" => invert(name, args),
        "if" => arity(name, args, 3).map(|()| {
            if args[0].is_truthy() {
                args[1].clone()
            } else {
                args[2].clone()
            }
        }),
        "map-get" => map_get(name, args),
        "map-keys" => map_pairs(name, args).map(|pairs| {
            SassValue::comma_list(pairs.into_iter().map(|(key, _)| key).collect())
        }),
        "map-values" => map_pairs(name, args).map(|pairs| {
            SassValue::comma_list(pairs.into_iter().map(|(_, value)| value).collect())
        }),
        "map-merge" => map_merge(name, args),
        "map-has-key" => arity(name, args, 2).and_then(|()| {
            let pairs = map_pairs(name, &args[..1])?;
            Ok(SassValue::Boolean(pairs.iter().any(|(key, _)| key.sass_eq(&args[1]))))
        }),
        "map-remove" => map_remove(name, args),
        "nth" => nth(name, args),
        "length" => arity(name, args, 1).map(|()| SassValue::number(args[0].as_list().len() as f64)),
        "join" => join(name, args),
        "append" => append(name, args),
        "index" => arity(name, args, 2).map(|()| {
            args[0]
                .as_list()
                .iter()
                .position(|item| item.sass_eq(&args[1]))
                .map(|position| SassValue::number(position as f64 + 1.0))
                .unwrap_or(SassValue::Null)
        }),
        "list-separator" => arity(name, args, 1).map(|()| {
            let separator = match &args[0] {
                SassValue::List { separator: ListSeparator::Comma, .. } | SassValue::Map(_) => "comma",
                _ => "space",
            };
            SassValue::unquoted(separator)
        }),
        "quote" => string_arg(name, args).map(SassValue::quoted),
        "unquote" => string_arg(name, args).map(SassValue::unquoted),
        "str-length" => string_arg(name, args).map(|text| SassValue::number(text.chars().count() as f64)),
        "to-upper-case" => map_string(name, args, |text| text.to_uppercase()),
        "to-lower-case" => map_string(name, args, |text| text.to_lowercase()),
        "type-of" => arity(name, args, 1).map(|()| SassValue::unquoted(args[0].type_name())),
        "inspect" => arity(name, args, 1).map(|()| match &args[0] {
            SassValue::Null => SassValue::unquoted("null"),
            other => SassValue::unquoted(other.to_string()),
        }),
        "get-function" => string_arg(name, args).map(SassValue::Function),
        "percentage" => percentage(name, args),
        "round" => rounding(name, args, f64::round),
        "floor" => rounding(name, args, f64::floor),
        "ceil" => rounding(name, args, f64::ceil),
        "abs" => rounding(name, args, f64::abs),
        "min" => return extremum(name, args, |a, b| a < b),
        "max" => return extremum(name, args, |a, b| a > b),
        "unit" => arity(name, args, 1)
            .and_then(|()| number_arg(name, &args[0]))
            .map(|(_, unit)| SassValue::quoted(unit.unwrap_or_default())),
        "unitless" => arity(name, args, 1)
            .and_then(|()| number_arg(name, &args[0]))
            .map(|(_, unit)| SassValue::Boolean(unit.is_none())),
        _ if UNSUPPORTED.contains(&name) => Err(error(name, "is not supported by this evaluator")),
        _ => return None,
    };
    Some(result)
}

/// Call `<module>.<name>` from a built-in module. `None` if the module has no
/// such member.
pub(crate) fn call_in_module(module: &str, name: &str, args: &[SassValue]) -> Option<EngineResult<SassValue>> {
    match (module, name) {
        ("math", "div") => Some(arity(name, args, 2).and_then(|()| args[0].div(&args[1]))),
        ("math", "is-unitless") => call("unitless", args),
        ("map", "get" | "keys" | "values" | "merge" | "has-key" | "remove") => {
            call(&format!("map-{}", name), args)
        }
        ("list", "separator") => call("list-separator", args),
        ("string", "length") => call("str-length", args),
        ("color" | "list" | "math" | "meta" | "string", _) => call(name, args),
        _ => None,
    }
}

/// `<module>.$<name>` from a built-in module
pub(crate) fn module_variable(module: &str, name: &str) -> Option<SassValue> {
    match (module, name) {
        ("math", "pi") => Some(SassValue::number(std::f64::consts::PI)),
        ("math", "e") => Some(SassValue::number(std::f64::consts::E)),
        _ => None,
    }
}

/// The call printed back as plain CSS
fn css_call(name: &str, args: &[SassValue]) -> SassValue {
    let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
    SassValue::unquoted(format!("{}({})", name, rendered.join(", ")))
}

fn error(name: &str, message: impl Into<String>) -> EngineError {
    EngineError::Function {
        name: name.to_string(),
        message: message.into(),
    }
}

fn arity(name: &str, args: &[SassValue], expected: usize) -> EngineResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(error(
            name,
            format!("expected {} arguments, got {}", expected, args.len()),
        ))
    }
}

fn number_arg(name: &str, value: &SassValue) -> EngineResult<(f64, Option<String>)> {
    match value {
        SassValue::Number { value, unit } => Ok((*value, unit.clone())),
        other => Err(error(name, format!("{} is not a number", other))),
    }
}

fn color_arg(name: &str, value: &SassValue) -> EngineResult<Color> {
    match value {
        SassValue::Color(color) => Ok(*color),
        other => Err(error(name, format!("{} is not a color", other))),
    }
}

fn string_arg(name: &str, args: &[SassValue]) -> EngineResult<String> {
    arity(name, args, 1)?;
    match &args[0] {
        SassValue::String { text, .. } => Ok(text.clone()),
        other => Err(error(name, format!("{} is not a string", other))),
    }
}

/// A color channel; percentages scale to 0-255
fn rgb_channel(name: &str, value: &SassValue) -> EngineResult<f64> {
    let (value, unit) = number_arg(name, value)?;
    Ok(match unit.as_deref() {
        Some("%") => value * 255.0 / 100.0,
        _ => value,
    })
}

/// Alpha channel; percentages scale to 0-1
fn alpha_channel(name: &str, value: &SassValue) -> EngineResult<f64> {
    let (value, unit) = number_arg(name, value)?;
    Ok(match unit.as_deref() {
        Some("%") => value / 100.0,
        _ => value,
    })
}

fn rgb(name: &str, args: &[SassValue]) -> EngineResult<SassValue> {
    let color = match args {
        [color, alpha] => {
            let color = color_arg(name, color)?;
            Color::new_rgba(color.r, color.g, color.b, alpha_channel(name, alpha)?)
        }
        [r, g, b] => Color::new_rgba(
            rgb_channel(name, r)?,
            rgb_channel(name, g)?,
            rgb_channel(name, b)?,
            1.0,
        ),
        [r, g, b, a] => Color::new_rgba(
            rgb_channel(name, r)?,
            rgb_channel(name, g)?,
            rgb_channel(name, b)?,
            alpha_channel(name, a)?,
        ),
        _ => return Err(error(name, format!("expected 2 to 4 arguments, got {}", args.len()))),
    };
    Ok(SassValue::Color(color))
}

fn channel(name: &str, args: &[SassValue], pick: impl Fn(&Color) -> f64) -> EngineResult<SassValue> {
    arity(name, args, 1)?;
    let color = color_arg(name, &args[0])?;
    Ok(SassValue::number(pick(&color)))
}

fn map_pairs(name: &str, args: &[SassValue]) -> EngineResult<Vec<(SassValue, SassValue)>> {
    arity(name, args, 1)?;
    match &args[0] {
        SassValue::Map(pairs) => Ok(pairs.clone()),
        // An empty list doubles as an empty map
        SassValue::List { items, .. } if items.is_empty() => Ok(Vec::new()),
        other => Err(error(name, format!("{} is not a map", other))),
    }
}

fn map_get(name: &str, args: &[SassValue]) -> EngineResult<SassValue> {
    arity(name, args, 2)?;
    let pairs = map_pairs(name, &args[..1])?;
    Ok(pairs
        .into_iter()
        .find(|(key, _)| key.sass_eq(&args[1]))
        .map(|(_, value)| value)
        .unwrap_or(SassValue::Null))
}

fn nth(name: &str, args: &[SassValue]) -> EngineResult<SassValue> {
    arity(name, args, 2)?;
    let items = args[0].as_list();
    let (index, _) = number_arg(name, &args[1])?;
    if index.fract() != 0.0 || index == 0.0 || index.abs() > items.len() as f64 {
        return Err(error(name, format!("invalid index {} for a list with {} elements", index, items.len())));
    }
    let position = if index > 0.0 {
        index as usize - 1
    } else {
        items.len() - index.abs() as usize
    };
    Ok(items[position].clone())
}

fn percentage(name: &str, args: &[SassValue]) -> EngineResult<SassValue> {
    arity(name, args, 1)?;
    match number_arg(name, &args[0])? {
        (value, None) => Ok(SassValue::number_with_unit(value * 100.0, Some("%".to_string()))),
        (_, Some(unit)) => Err(error(name, format!("expected a unitless number, got unit {}", unit))),
    }
}

fn rounding(name: &str, args: &[SassValue], apply: fn(f64) -> f64) -> EngineResult<SassValue> {
    arity(name, args, 1)?;
    let (value, unit) = number_arg(name, &args[0])?;
    Ok(SassValue::number_with_unit(apply(value), unit))
}

fn hsl(name: &str, args: &[SassValue]) -> EngineResult<SassValue> {
    let (hue, saturation, lightness, alpha) = match args {
        [h, s, l] => (h, s, l, None),
        [h, s, l, a] => (h, s, l, Some(a)),
        _ => return Err(error(name, format!("expected 3 or 4 arguments, got {}", args.len()))),
    };
    let alpha = match alpha {
        Some(alpha) => alpha_channel(name, alpha)?,
        None => 1.0,
    };
    Ok(SassValue::Color(Color::from_hsla(
        number_arg(name, hue)?.0,
        number_arg(name, saturation)?.0,
        number_arg(name, lightness)?.0,
        alpha,
    )))
}

fn hsl_channel(
    name: &str,
    args: &[SassValue],
    pick: impl Fn((f64, f64, f64)) -> f64,
    unit: &str,
) -> EngineResult<SassValue> {
    arity(name, args, 1)?;
    let color = color_arg(name, &args[0])?;
    Ok(SassValue::number_with_unit(pick(color.to_hsl()), Some(unit.to_string())))
}

/// `name($color, $amount)` applied in HSL space; the amount is in percent
/// points, or degrees for the hue
fn adjust_hsl(
    name: &str,
    args: &[SassValue],
    adjust: impl Fn((f64, f64, f64), f64) -> (f64, f64, f64),
) -> EngineResult<SassValue> {
    arity(name, args, 2)?;
    let color = color_arg(name, &args[0])?;
    let (amount, _) = number_arg(name, &args[1])?;
    let (hue, saturation, lightness) = adjust(color.to_hsl(), amount);
    Ok(SassValue::Color(Color::from_hsla(
        hue,
        saturation.clamp(0.0, 100.0),
        lightness.clamp(0.0, 100.0),
        color.a,
    )))
}

fn adjust_alpha(name: &str, args: &[SassValue], adjust: impl Fn(f64, f64) -> f64) -> EngineResult<SassValue> {
    arity(name, args, 2)?;
    let color = color_arg(name, &args[0])?;
    let amount = alpha_channel(name, &args[1])?;
    Ok(SassValue::Color(color.with_alpha(adjust(color.a, amount))))
}

/// Weight argument in percent, as a 0-1 share
fn weight_arg(name: &str, value: Option<&SassValue>) -> EngineResult<f64> {
    match value {
        Some(value) => Ok((number_arg(name, value)?.0 / 100.0).clamp(0.0, 1.0)),
        None => Ok(1.0),
    }
}

fn mix(name: &str, args: &[SassValue]) -> EngineResult<SassValue> {
    let (first, second, weight) = match args {
        [first, second] => (first, second, 0.5),
        [first, second, weight] => (first, second, weight_arg(name, Some(weight))?),
        _ => return Err(error(name, format!("expected 2 or 3 arguments, got {}", args.len()))),
    };
    let first = color_arg(name, first)?;
    let second = color_arg(name, second)?;
    Ok(SassValue::Color(first.mix(&second, weight)))
}

fn invert(name: &str, args: &[SassValue]) -> EngineResult<SassValue> {
    if args.is_empty() || args.len() > 2 {
        return Err(error(name, format!("expected 1 or 2 arguments, got {}", args.len())));
    }
    let color = color_arg(name, &args[0])?;
    let weight = weight_arg(name, args.get(1))?;
    let inverted = Color::new_rgba(255.0 - color.r, 255.0 - color.g, 255.0 - color.b, color.a);
    Ok(SassValue::Color(inverted.mix(&color, weight)))
}

fn map_merge(name: &str, args: &[SassValue]) -> EngineResult<SassValue> {
    arity(name, args, 2)?;
    let mut merged = map_pairs(name, &args[..1])?;
    for (key, value) in map_pairs(name, &args[1..])? {
        match merged.iter_mut().find(|(existing, _)| existing.sass_eq(&key)) {
            Some(entry) => entry.1 = value,
            None => merged.push((key, value)),
        }
    }
    Ok(SassValue::Map(merged))
}

fn map_remove(name: &str, args: &[SassValue]) -> EngineResult<SassValue> {
    let Some((map, keys)) = args.split_first() else {
        return Err(error(name, "expected a map"));
    };
    let pairs = map_pairs(name, std::slice::from_ref(map))?;
    Ok(SassValue::Map(
        pairs
            .into_iter()
            .filter(|(key, _)| !keys.iter().any(|removed| removed.sass_eq(key)))
            .collect(),
    ))
}

/// Separator of a list with more than one element
fn own_separator(value: &SassValue) -> Option<ListSeparator> {
    match value {
        SassValue::List { items, separator } if items.len() > 1 => Some(*separator),
        SassValue::Map(pairs) if pairs.len() > 1 => Some(ListSeparator::Comma),
        _ => None,
    }
}

fn separator_arg(name: &str, value: Option<&SassValue>) -> EngineResult<Option<ListSeparator>> {
    match value.map(SassValue::to_unquoted_text).as_deref() {
        None | Some("auto") => Ok(None),
        Some("comma") => Ok(Some(ListSeparator::Comma)),
        Some("space") => Ok(Some(ListSeparator::Space)),
        Some(other) => Err(error(name, format!("invalid separator {}", other))),
    }
}

fn join(name: &str, args: &[SassValue]) -> EngineResult<SassValue> {
    if args.len() < 2 || args.len() > 3 {
        return Err(error(name, format!("expected 2 or 3 arguments, got {}", args.len())));
    }
    let separator = separator_arg(name, args.get(2))?
        .or_else(|| own_separator(&args[0]))
        .or_else(|| own_separator(&args[1]))
        .unwrap_or(ListSeparator::Space);
    let mut items = args[0].as_list();
    items.extend(args[1].as_list());
    Ok(SassValue::List { items, separator })
}

fn append(name: &str, args: &[SassValue]) -> EngineResult<SassValue> {
    if args.len() < 2 || args.len() > 3 {
        return Err(error(name, format!("expected 2 or 3 arguments, got {}", args.len())));
    }
    let separator = separator_arg(name, args.get(2))?
        .or_else(|| own_separator(&args[0]))
        .unwrap_or(ListSeparator::Space);
    let mut items = args[0].as_list();
    items.push(args[1].clone());
    Ok(SassValue::List { items, separator })
}

fn map_string(name: &str, args: &[SassValue], apply: impl Fn(&str) -> String) -> EngineResult<SassValue> {
    arity(name, args, 1)?;
    match &args[0] {
        SassValue::String { text, quoted } => Ok(SassValue::String {
            text: apply(text),
            quoted: *quoted,
        }),
        other => Err(error(name, format!("{} is not a string", other))),
    }
}

/// `min()`/`max()` over numbers with compatible units; anything else is left
/// to CSS
fn extremum(name: &str, args: &[SassValue], better: fn(f64, f64) -> bool) -> Option<EngineResult<SassValue>> {
    let mut best: Option<(f64, &Option<String>)> = None;
    let mut unit: Option<&String> = None;

    for arg in args {
        let SassValue::Number { value, unit: arg_unit } = arg else {
            return Some(Ok(css_call(name, args)));
        };
        if let Some(arg_unit) = arg_unit {
            if unit.is_some_and(|unit| unit != arg_unit) {
                return Some(Ok(css_call(name, args)));
            }
            unit = Some(arg_unit);
        }
        if best.is_none_or(|(current, _)| better(*value, current)) {
            best = Some((*value, arg_unit));
        }
    }

    Some(match best {
        Some((value, unit)) => Ok(SassValue::number_with_unit(value, unit.clone())),
        None => Err(error(name, "expected at least one argument")),
    })
}
