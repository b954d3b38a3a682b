//! Property coercion: raw JSON field values → typed [`PropertyValue`]s.
//!
//! Coercion is total and per property. A value that cannot be converted
//! drops that property only (reported back as a failure) unless the property
//! is declared `required`, which rejects the whole record.

use std::collections::{BTreeMap, HashSet};

use biocanon_dsl::{PropertyType, ScalarKind};
use serde_json::Value;

use crate::config::{normalize_field_key, ResolverConfig};
use crate::error::RecordError;
use crate::model::{FieldMap, PropertyMap, PropertyValue, ScalarValue};
use crate::registry::TypeDef;

/// Read access to a record's fields under the configured key normalization.
#[derive(Debug)]
pub struct FieldView<'a> {
    normalize: bool,
    fields: BTreeMap<String, &'a Value>,
}

impl<'a> FieldView<'a> {
    /// On key collisions after normalization the first raw key (sorted) wins.
    pub fn new(raw: &'a FieldMap, config: &ResolverConfig) -> Self {
        let normalize = config.normalize_field_keys;
        let mut fields = BTreeMap::new();
        for (key, value) in raw {
            let key = if normalize {
                normalize_field_key(key)
            } else {
                key.clone()
            };
            fields.entry(key).or_insert(value);
        }
        Self { normalize, fields }
    }

    fn key(&self, name: &str) -> String {
        if self.normalize {
            normalize_field_key(name)
        } else {
            name.to_string()
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(&self.key(name)).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Result of coercing one value.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced<T> {
    /// Missing or a null placeholder. Not a loss.
    Absent,
    Value(T),
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercedProperties {
    pub properties: PropertyMap,
    /// Declared properties dropped because their value could not be coerced.
    pub failed: Vec<String>,
    /// Raw keys matching neither a declared property nor an authority.
    pub unknown_fields: usize,
}

pub fn coerce_properties(
    def: &TypeDef,
    fields: &FieldView<'_>,
    config: &ResolverConfig,
) -> Result<CoercedProperties, RecordError> {
    let mut out = CoercedProperties::default();

    for (name, decl) in &def.properties {
        let coerced = match fields.get(name) {
            None => Coerced::Absent,
            Some(value) => coerce_value(value, decl.ty, config),
        };
        match coerced {
            Coerced::Value(v) => {
                out.properties.insert(name.clone(), v);
            }
            Coerced::Absent if !decl.required => {}
            Coerced::Failed if !decl.required => out.failed.push(name.clone()),
            Coerced::Absent | Coerced::Failed => {
                return Err(RecordError::MissingRequiredProperty {
                    type_name: def.name.clone(),
                    property: name.clone(),
                })
            }
        }
    }

    let known: HashSet<String> = def
        .properties
        .keys()
        .chain(def.authorities.iter())
        .map(|k| fields.key(k))
        .collect();
    out.unknown_fields = fields.keys().filter(|k| !known.contains(*k)).count();

    Ok(out)
}

pub fn coerce_value(value: &Value, ty: PropertyType, config: &ResolverConfig) -> Coerced<PropertyValue> {
    match ty {
        PropertyType::Scalar(kind) => match coerce_scalar(value, kind, config) {
            Coerced::Value(v) => Coerced::Value(PropertyValue::Scalar(v)),
            Coerced::Absent => Coerced::Absent,
            Coerced::Failed => Coerced::Failed,
        },
        PropertyType::Array(kind) => match coerce_array(value, kind, config) {
            Some(items) => Coerced::Value(PropertyValue::Array(items)),
            None => Coerced::Failed,
        },
    }
}

/// Arrays: a literal list, a delimiter-joined string, or a lone scalar.
/// Placeholders (and null) give an empty array. Any failing element fails
/// the whole property.
fn coerce_array(value: &Value, kind: ScalarKind, config: &ResolverConfig) -> Option<Vec<ScalarValue>> {
    let mut out = Vec::new();
    let mut push = |item: &Value| -> Option<()> {
        match coerce_scalar(item, kind, config) {
            Coerced::Value(v) => out.push(v),
            Coerced::Absent => {}
            Coerced::Failed => return None,
        }
        Some(())
    };

    match value {
        Value::Null => {}
        Value::String(s) => {
            if !config.is_placeholder(s) {
                for piece in s.split(config.array_delimiter) {
                    push(&Value::String(piece.trim().to_string()))?;
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if item.is_array() || item.is_object() {
                    return None;
                }
                push(item)?;
            }
        }
        Value::Bool(_) | Value::Number(_) => push(value)?,
        Value::Object(_) => return None,
    }
    Some(out)
}

pub fn coerce_scalar(value: &Value, kind: ScalarKind, config: &ResolverConfig) -> Coerced<ScalarValue> {
    let converted = match value {
        Value::Null => return Coerced::Absent,
        Value::String(s) => {
            let s = s.trim();
            if config.is_placeholder(s) {
                return Coerced::Absent;
            }
            match kind {
                ScalarKind::String => Some(ScalarValue::Str(s.to_string())),
                ScalarKind::Integer => parse_integer(s).map(ScalarValue::Int),
                ScalarKind::Float => parse_float(s).map(ScalarValue::Float),
                ScalarKind::Boolean => parse_bool(s).map(ScalarValue::Bool),
            }
        }
        Value::Number(n) => match kind {
            ScalarKind::String => Some(ScalarValue::Str(n.to_string())),
            ScalarKind::Integer => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral_f64))
                .map(ScalarValue::Int),
            ScalarKind::Float => n.as_f64().map(ScalarValue::Float),
            ScalarKind::Boolean => match n.as_i64() {
                Some(0) => Some(ScalarValue::Bool(false)),
                Some(1) => Some(ScalarValue::Bool(true)),
                _ => None,
            },
        },
        Value::Bool(b) => match kind {
            ScalarKind::String => Some(ScalarValue::Str(b.to_string())),
            ScalarKind::Boolean => Some(ScalarValue::Bool(*b)),
            ScalarKind::Integer | ScalarKind::Float => None,
        },
        Value::Array(_) | Value::Object(_) => None,
    };
    match converted {
        Some(v) => Coerced::Value(v),
        None => Coerced::Failed,
    }
}

/// `7157.0` → `7157`; fractional, non-finite, or out-of-range → `None`.
pub fn integral_f64(x: f64) -> Option<i64> {
    if x.is_finite() && x.fract() == 0.0 && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Some(x as i64)
    } else {
        None
    }
}

/// Accepts plain integers, thousands-separated integers (`15,126`), and
/// integral floats (`141.0`).
pub fn parse_integer(s: &str) -> Option<i64> {
    let s = strip_thousands(s)?;
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
}

/// Finite floats only; `inf`, `NaN` and friends are coercion failures.
pub fn parse_float(s: &str) -> Option<f64> {
    strip_thousands(s)?
        .parse::<f64>()
        .ok()
        .filter(|x| x.is_finite())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Remove `,` group separators if the integer part is well-formed
/// (`1,234,567.5`); a misplaced comma (`1,23`) makes the value invalid.
fn strip_thousands(s: &str) -> Option<String> {
    if !s.contains(',') {
        return Some(s.to_string());
    }
    let unsigned = s.trim_start_matches(&['+', '-'][..]);
    let int_part = unsigned.split('.').next().unwrap_or_default();
    let mut groups = int_part.split(',');
    let first = groups.next().unwrap_or_default();
    let first_ok = (1..=3).contains(&first.len()) && first.bytes().all(|b| b.is_ascii_digit());
    let rest_ok = groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()));
    let frac_has_comma = unsigned
        .split_once('.')
        .is_some_and(|(_, frac)| frac.contains(','));
    if first_ok && rest_ok && !frac_has_comma {
        Some(s.replace(',', ""))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg() -> ResolverConfig {
        ResolverConfig::default()
    }

    #[test]
    fn integers_accept_separators_and_integral_floats() {
        assert_eq!(parse_integer("15,126"), Some(15126));
        assert_eq!(parse_integer("-1,000,000"), Some(-1_000_000));
        assert_eq!(parse_integer("141.0"), Some(141));
        assert_eq!(parse_integer("141.5"), None);
        assert_eq!(parse_integer("1,23"), None);
        assert_eq!(parse_integer("abc"), None);
    }

    #[test]
    fn scalar_coercions() {
        let c = cfg();
        assert_eq!(
            coerce_scalar(&json!("141"), ScalarKind::Integer, &c),
            Coerced::Value(ScalarValue::Int(141))
        );
        assert_eq!(
            coerce_scalar(&json!(7157.0), ScalarKind::Integer, &c),
            Coerced::Value(ScalarValue::Int(7157))
        );
        assert_eq!(
            coerce_scalar(&json!("Yes"), ScalarKind::Boolean, &c),
            Coerced::Value(ScalarValue::Bool(true))
        );
        assert_eq!(
            coerce_scalar(&json!(0), ScalarKind::Boolean, &c),
            Coerced::Value(ScalarValue::Bool(false))
        );
        assert_eq!(
            coerce_scalar(&json!(2), ScalarKind::Boolean, &c),
            Coerced::Failed
        );
        assert_eq!(
            coerce_scalar(&json!(12), ScalarKind::String, &c),
            Coerced::Value(ScalarValue::Str("12".into()))
        );
        assert_eq!(
            coerce_scalar(&json!("1.5e3"), ScalarKind::Float, &c),
            Coerced::Value(ScalarValue::Float(1500.0))
        );
        assert_eq!(coerce_scalar(&json!("NaN"), ScalarKind::Float, &c), Coerced::Absent);
        assert_eq!(coerce_scalar(&json!(null), ScalarKind::String, &c), Coerced::Absent);
        assert_eq!(
            coerce_scalar(&json!(["a"]), ScalarKind::String, &c),
            Coerced::Failed
        );
    }

    #[test]
    fn arrays_from_delimited_strings_lists_and_placeholders() {
        let c = cfg();
        let str_array = PropertyType::Array(ScalarKind::String);
        assert_eq!(
            coerce_value(&json!("P1 | P2|P3"), str_array, &c),
            Coerced::Value(PropertyValue::Array(vec!["P1".into(), "P2".into(), "P3".into()]))
        );
        assert_eq!(
            coerce_value(&json!("nan"), str_array, &c),
            Coerced::Value(PropertyValue::Array(vec![]))
        );
        assert_eq!(
            coerce_value(&json!("solo"), str_array, &c),
            Coerced::Value(PropertyValue::Array(vec!["solo".into()]))
        );

        let float_array = PropertyType::Array(ScalarKind::Float);
        assert_eq!(
            coerce_value(&json!([0.1, "0.2", 3]), float_array, &c),
            Coerced::Value(PropertyValue::Array(vec![0.1.into(), 0.2.into(), 3.0.into()]))
        );
        assert_eq!(
            coerce_value(&json!("0.1|x"), float_array, &c),
            Coerced::Failed
        );
        assert_eq!(
            coerce_value(&json!(2.5), float_array, &c),
            Coerced::Value(PropertyValue::Array(vec![2.5.into()]))
        );
    }

    #[test]
    fn non_finite_floats_fail() {
        let c = cfg();
        for raw in ["inf", "-inf", "infinity", "NAN", "-nan", "1e999"] {
            assert_eq!(
                coerce_scalar(&json!(raw), ScalarKind::Float, &c),
                Coerced::Failed,
                "{raw}"
            );
        }
        assert_eq!(
            coerce_value(&json!("0.5|inf"), PropertyType::Array(ScalarKind::Float), &c),
            Coerced::Failed
        );
        assert_eq!(
            coerce_scalar(&json!("1.5e3"), ScalarKind::Float, &c),
            Coerced::Value(ScalarValue::Float(1500.0))
        );
    }

    #[test]
    fn custom_delimiter() {
        let c = ResolverConfig {
            array_delimiter: ';',
            ..ResolverConfig::default()
        };
        assert_eq!(
            coerce_value(&json!("a;b"), PropertyType::Array(ScalarKind::String), &c),
            Coerced::Value(PropertyValue::Array(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn field_view_normalizes_keys_both_ways() {
        let mut raw = FieldMap::new();
        raw.insert("Secondary IDs".into(), json!("x"));
        let view = FieldView::new(&raw, &cfg());
        assert_eq!(view.get("secondary_ids"), Some(&json!("x")));
        assert_eq!(view.get("Secondary-IDs"), Some(&json!("x")));

        let strict = ResolverConfig {
            normalize_field_keys: false,
            ..ResolverConfig::default()
        };
        let view = FieldView::new(&raw, &strict);
        assert_eq!(view.get("secondary_ids"), None);
    }
}
