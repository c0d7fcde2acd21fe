//! Error types for the schema registry

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema registry errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Entity already defined: {entity}")]
    DuplicateDefinition { entity: String },

    #[error("Unknown entity: {entity}{}", .referenced_by.as_ref().map(|r| format!(" (referenced by {})", r)).unwrap_or_default())]
    UnknownEntity {
        entity: String,
        referenced_by: Option<String>,
    },

    #[error("Cyclic inheritance for {entity}: {}", .chain.join(" -> "))]
    CyclicInheritance { entity: String, chain: Vec<String> },

    #[error("Invalid definition for {entity}: {reason}")]
    InvalidDefinition { entity: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn unknown(entity: impl Into<String>) -> Self {
        SchemaError::UnknownEntity {
            entity: entity.into(),
            referenced_by: None,
        }
    }

    pub(crate) fn invalid(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidDefinition {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_entity_message() {
        let err = SchemaError::unknown("Referee");
        assert_eq!(err.to_string(), "Unknown entity: Referee");

        let err = SchemaError::UnknownEntity {
            entity: "Referee".to_string(),
            referenced_by: Some("Game".to_string()),
        };
        assert_eq!(err.to_string(), "Unknown entity: Referee (referenced by Game)");
    }

    #[test]
    fn test_cycle_message() {
        let err = SchemaError::CyclicInheritance {
            entity: "A".to_string(),
            chain: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };
        assert_eq!(err.to_string(), "Cyclic inheritance for A: A -> B -> A");
    }
}
