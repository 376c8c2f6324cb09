/// Errors from pure domain checks: option ranges, mappings and rules.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
}
