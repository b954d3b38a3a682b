//! Canonical identifiers.
//!
//! Entities are identified by the first declared authority (priority order)
//! for which the record carries a usable value, formatted as a CURIE
//! (`authority:local-id`). Associations without a natural identifier get a
//! deterministic composite key.

use serde_json::Value;

use biocanon_dsl::digest::composite_key_v1;

use crate::coerce::{integral_f64, FieldView};
use crate::config::ResolverConfig;
use crate::error::RecordError;
use crate::model::PropertyMap;
use crate::registry::TypeDef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdValue {
    Absent,
    Present(String),
    /// Present but unusable as an identifier.
    Invalid(&'static str),
}

/// Interpret one raw field value as an identifier.
pub fn identifier_value(value: Option<&Value>, config: &ResolverConfig) -> IdValue {
    match value {
        None | Some(Value::Null) => IdValue::Absent,
        Some(Value::String(s)) => {
            let s = s.trim();
            if config.is_placeholder(s) {
                IdValue::Absent
            } else {
                IdValue::Present(s.to_string())
            }
        }
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                IdValue::Present(i.to_string())
            } else if let Some(u) = n.as_u64() {
                IdValue::Present(u.to_string())
            } else {
                match n.as_f64().and_then(integral_f64) {
                    Some(i) => IdValue::Present(i.to_string()),
                    None => IdValue::Invalid("non-integral number"),
                }
            }
        }
        Some(Value::Bool(b)) => IdValue::Present(b.to_string()),
        Some(Value::Array(_)) | Some(Value::Object(_)) => IdValue::Invalid("not a scalar"),
    }
}

/// `authority:value`, unless `value` already carries the authority prefix
/// (compared case-insensitively), in which case it is kept as given.
pub fn format_curie(authority: &str, value: &str) -> String {
    let already_prefixed = value
        .split_once(':')
        .is_some_and(|(prefix, _)| prefix.eq_ignore_ascii_case(authority));
    if already_prefixed {
        value.to_string()
    } else {
        format!("{authority}:{value}")
    }
}

/// Scan `def.authorities` in priority order. The first authority with a
/// present value wins; if that value is unusable the record is rejected
/// rather than falling through to a lower-priority authority.
pub fn select_identifier(
    def: &TypeDef,
    fields: &FieldView<'_>,
    config: &ResolverConfig,
) -> Result<Option<String>, RecordError> {
    for authority in &def.authorities {
        match identifier_value(fields.get(authority), config) {
            IdValue::Absent => continue,
            IdValue::Present(value) => return Ok(Some(format_curie(authority, &value))),
            IdValue::Invalid(reason) => {
                return Err(RecordError::InvalidIdentifier {
                    type_name: def.name.clone(),
                    authority: authority.clone(),
                    reason: reason.to_string(),
                })
            }
        }
    }
    Ok(None)
}

/// Endpoint ids without a prefix take the endpoint type's first authority.
pub fn normalize_endpoint_id(id: &str, endpoint_type: &TypeDef) -> String {
    let id = id.trim();
    if id.contains(':') {
        return id.to_string();
    }
    match endpoint_type.authorities.first() {
        Some(authority) => format!("{authority}:{id}"),
        None => id.to_string(),
    }
}

/// Marker hashed for a key property whose value failed coercion. Never a
/// valid JSON text, so it cannot collide with a present value.
const INVALID_KEY_VALUE: &str = "!invalid";

/// Composite key from the association type, ordered endpoint ids, and the
/// declared `key_properties` in declared order.
///
/// Present values hash as their JSON text, so `["a|b"]` and `["a", "b"]`
/// differ, as do `1` and `"1"`. Absent values hash as empty; values named in
/// `failed` hash as a marker distinct from both.
pub fn composite_key(
    def: &TypeDef,
    source_id: &str,
    target_id: &str,
    properties: &PropertyMap,
    failed: &[String],
) -> String {
    let key_properties = def
        .association()
        .map(|a| a.key_properties.as_slice())
        .unwrap_or_default();
    let values: Vec<(&str, String)> = key_properties
        .iter()
        .map(|k| {
            let value = match properties.get(k) {
                Some(value) => serde_json::to_string(value).unwrap_or_default(),
                None if failed.iter().any(|f| f == k) => INVALID_KEY_VALUE.to_string(),
                None => String::new(),
            };
            (k.as_str(), value)
        })
        .collect();
    let fields: Vec<(&str, &str)> = values.iter().map(|(k, v)| (*k, v.as_str())).collect();
    composite_key_v1(&def.name, &[source_id, target_id], &fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn curie_prefix_is_not_doubled() {
        assert_eq!(format_curie("uniprot", "P69905"), "uniprot:P69905");
        assert_eq!(format_curie("uniprot", "uniprot:P69905"), "uniprot:P69905");
        assert_eq!(format_curie("CHEBI", "chebi:15377"), "chebi:15377");
        assert_eq!(format_curie("ncbigene", "HGNC:5"), "ncbigene:HGNC:5");
    }

    #[test]
    fn identifier_values() {
        let c = ResolverConfig::default();
        assert_eq!(identifier_value(Some(&json!(7157.0)), &c), IdValue::Present("7157".into()));
        assert_eq!(identifier_value(Some(&json!(7157)), &c), IdValue::Present("7157".into()));
        assert_eq!(identifier_value(Some(&json!(" P1 ")), &c), IdValue::Present("P1".into()));
        assert_eq!(identifier_value(Some(&json!("None")), &c), IdValue::Absent);
        assert_eq!(identifier_value(None, &c), IdValue::Absent);
        assert!(matches!(identifier_value(Some(&json!(1.5)), &c), IdValue::Invalid(_)));
        assert!(matches!(identifier_value(Some(&json!(["a"])), &c), IdValue::Invalid(_)));
    }

    const KEYED: &str = r#"
gene:
  represented_as: node
disease:
  represented_as: node
gene to disease association:
  represented_as: node
  source: gene
  target: disease
  properties:
    qualifiers: str[]
    score: int
  key_properties: [qualifiers, score]
"#;

    fn keyed(properties: PropertyMap, failed: &[&str]) -> String {
        let registry = crate::registry::Registry::from_yaml_str(KEYED, None).unwrap();
        let def = registry.get("gene to disease association").unwrap();
        let failed: Vec<String> = failed.iter().map(|f| f.to_string()).collect();
        composite_key(def, "ncbigene:1", "MONDO:2", &properties, &failed)
    }

    #[test]
    fn composite_key_separates_array_shapes() {
        use crate::model::{PropertyValue, ScalarValue};
        let joined = PropertyMap::from([(
            "qualifiers".to_string(),
            PropertyValue::Array(vec![ScalarValue::from("a|b")]),
        )]);
        let split = PropertyMap::from([(
            "qualifiers".to_string(),
            PropertyValue::Array(vec![ScalarValue::from("a"), ScalarValue::from("b")]),
        )]);
        assert_ne!(keyed(joined.clone(), &[]), keyed(split, &[]));
        assert_eq!(keyed(joined.clone(), &[]), keyed(joined, &[]));
    }

    #[test]
    fn composite_key_separates_scalar_kinds() {
        use crate::model::PropertyValue;
        let int = PropertyMap::from([("score".to_string(), PropertyValue::from(1_i64))]);
        let text = PropertyMap::from([("score".to_string(), PropertyValue::from("1"))]);
        assert_ne!(keyed(int, &[]), keyed(text, &[]));
    }

    #[test]
    fn failed_key_property_differs_from_absent() {
        let absent = keyed(PropertyMap::new(), &[]);
        let failed = keyed(PropertyMap::new(), &["score"]);
        assert_ne!(absent, failed);
        // only declared key properties take part
        assert_eq!(absent, keyed(PropertyMap::new(), &["unrelated"]));
    }
}
