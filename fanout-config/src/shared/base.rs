use thiserror::Error;

/// Errors returned when a configuration value violates its constraints.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside of its accepted range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// A required field is empty.
    #[error("`{0}` cannot be empty")]
    EmptyField(String),
}
