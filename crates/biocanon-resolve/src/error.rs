//! Error types.
//!
//! Two severities:
//!
//! - [`SchemaError`]: configuration errors, fatal at registry load. Every
//!   variant names the offending type (or label).
//! - [`RecordError`]: local to one record. The pipeline maps it to a
//!   [`SkipReason`], counts it, and moves on.

use biocanon_dsl::SchemaConfigError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRole {
    Source,
    Target,
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointRole::Source => f.write_str("source"),
            EndpointRole::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Config(#[from] SchemaConfigError),

    #[error("type `{type_name}` does not declare `represented_as` (node or edge)")]
    MissingRepresentation { type_name: String },

    #[error("type `{type_name}` has no endpoints but is represented as an edge")]
    EntityAsEdge { type_name: String },

    #[error("association `{type_name}` declares a {declared} endpoint but no {missing} endpoint")]
    IncompleteAssociation {
        type_name: String,
        declared: EndpointRole,
        missing: EndpointRole,
    },

    #[error("type `{type_name}`: parent `{parent}` is not a schema type, alias, or ontology class")]
    UndefinedParent { type_name: String, parent: String },

    #[error("type `{type_name}`: synonym target `{target}` is not defined")]
    UndefinedSynonymTarget { type_name: String, target: String },

    #[error("alias `{type_name}` conflicts with its target `{target}` on `{field}`")]
    SynonymConflict {
        type_name: String,
        target: String,
        field: &'static str,
    },

    #[error("association `{type_name}`: {role} endpoint type `{endpoint}` is not defined")]
    UndefinedEndpointType {
        type_name: String,
        role: EndpointRole,
        endpoint: String,
    },

    #[error("label `{label}` is accepted by both `{first}` and `{second}` without disjoint scopes")]
    AmbiguousLabel {
        label: String,
        first: String,
        second: String,
    },

    #[error("hierarchy cycle: {}", .cycle.join(" -> "))]
    HierarchyCycle { cycle: Vec<String> },

    #[error("type `{type_name}` declares an empty identifier authority")]
    EmptyAuthority { type_name: String },

    #[error("type `{type_name}` declares authority `{authority}` more than once")]
    DuplicateAuthority { type_name: String, authority: String },

    #[error("type `{type_name}`: key property `{property}` is not declared in `properties`")]
    UnknownKeyProperty { type_name: String, property: String },
}

/// Why a record was not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Unmapped,
    Unidentifiable,
    EndpointMismatch,
    MissingEndpoints,
    MissingRequiredProperty,
}

impl SkipReason {
    pub const ALL: [SkipReason; 5] = [
        SkipReason::Unmapped,
        SkipReason::Unidentifiable,
        SkipReason::EndpointMismatch,
        SkipReason::MissingEndpoints,
        SkipReason::MissingRequiredProperty,
    ];

    /// Outcome name as reported to diagnostics.
    pub fn outcome_name(self) -> &'static str {
        match self {
            SkipReason::Unmapped => "dropped-unmapped",
            SkipReason::Unidentifiable => "rejected-unidentifiable",
            SkipReason::EndpointMismatch => "rejected-endpoint-mismatch",
            SkipReason::MissingEndpoints => "rejected-missing-endpoints",
            SkipReason::MissingRequiredProperty => "rejected-missing-required-property",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.outcome_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("label `{label}` (source {}) matches no type", .source_tag.as_deref().unwrap_or("-"))]
    Unmapped {
        label: String,
        source_tag: Option<String>,
    },

    #[error("`{type_name}`: none of the authorities [{}] has a value", .authorities.join(", "))]
    Unidentifiable {
        type_name: String,
        authorities: Vec<String>,
    },

    #[error("`{type_name}`: identifier field `{authority}` is unusable: {reason}")]
    InvalidIdentifier {
        type_name: String,
        authority: String,
        reason: String,
    },

    #[error("association `{type_name}` has no endpoint references")]
    MissingEndpoints { type_name: String },

    #[error("association `{type_name}`: cannot resolve {role} endpoint `{id}`: {reason}")]
    UnresolvedEndpoint {
        type_name: String,
        role: EndpointRole,
        id: String,
        reason: String,
    },

    #[error(
        "association `{type_name}`: {role} endpoint is `{endpoint_type}`, expected one of [{}]",
        .expected.join(", ")
    )]
    EndpointMismatch {
        type_name: String,
        role: EndpointRole,
        endpoint_type: String,
        expected: Vec<String>,
    },

    #[error("`{type_name}`: required property `{property}` is missing or invalid")]
    MissingRequiredProperty { type_name: String, property: String },
}

impl RecordError {
    pub fn skip_reason(&self) -> SkipReason {
        match self {
            RecordError::Unmapped { .. } => SkipReason::Unmapped,
            RecordError::Unidentifiable { .. } | RecordError::InvalidIdentifier { .. } => {
                SkipReason::Unidentifiable
            }
            RecordError::MissingEndpoints { .. } => SkipReason::MissingEndpoints,
            RecordError::UnresolvedEndpoint { .. } | RecordError::EndpointMismatch { .. } => {
                SkipReason::EndpointMismatch
            }
            RecordError::MissingRequiredProperty { .. } => SkipReason::MissingRequiredProperty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_path() {
        let err = SchemaError::HierarchyCycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "hierarchy cycle: a -> b -> a");
    }

    #[test]
    fn record_errors_map_to_skip_reasons() {
        let err = RecordError::UnresolvedEndpoint {
            type_name: "gene to protein relationship".into(),
            role: EndpointRole::Target,
            id: "X".into(),
            reason: "unmapped label".into(),
        };
        assert_eq!(err.skip_reason(), SkipReason::EndpointMismatch);
        assert_eq!(
            err.skip_reason().outcome_name(),
            "rejected-endpoint-mismatch"
        );

        let err = RecordError::Unmapped {
            label: "foo".into(),
            source_tag: None,
        };
        assert_eq!(err.to_string(), "label `foo` (source -) matches no type");
        assert_eq!(err.skip_reason(), SkipReason::Unmapped);
    }

    #[test]
    fn skip_reasons_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_string(&SkipReason::MissingRequiredProperty).unwrap(),
            "\"missing-required-property\""
        );
    }
}
