//! Shared range-checking helpers used by option validation.

use crate::error::CoreError;

/// Validate that an integer option falls within `[min, max]`.
///
/// Returns a `CoreError::Validation` naming the field if out of range.
pub fn validate_int_range(value: u64, min: u64, max: u64, name: &str) -> Result<(), CoreError> {
    if !(min..=max).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_boundary_values() {
        assert!(validate_int_range(10, 10, 1000, "chunk_size").is_ok());
        assert!(validate_int_range(1000, 10, 1000, "chunk_size").is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_names_field() {
        let err = validate_int_range(9, 10, 1000, "chunk_size").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: chunk_size must be between 10 and 1000, got 9"
        );
        assert!(validate_int_range(1001, 10, 1000, "chunk_size").is_err());
    }
}
