//! Error types for the `rolelink-models` crate.
//!
//! All fallible constructors and `FromStr` implementations in this crate
//! return variants of [`ModelError`].

/// Errors produced when constructing or validating model types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A snowflake identifier was empty, non-numeric or zero.
    #[error("invalid {kind} \"{value}\": {reason}")]
    InvalidSnowflake {
        /// Which identifier was being parsed (e.g. `guild id`).
        kind: &'static str,
        /// The value that failed validation.
        value: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// A required field was empty.
    #[error("missing required field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_snowflake() {
        let err = ModelError::InvalidSnowflake {
            kind: "guild id",
            value: "abc".into(),
            reason: "must be a positive integer".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid guild id \"abc\": must be a positive integer"
        );
    }

    #[test]
    fn error_display_missing_field() {
        let err = ModelError::MissingField {
            field: "username".into(),
        };
        assert_eq!(err.to_string(), "missing required field: username");
    }
}
