//! Validation helpers for DTOs.

use uuid::Uuid;
use validator::ValidationError;

use crate::dao::models::Difficulty;

/// Validates that an identifier is a well-formed UUID.
pub fn validate_uuid(value: &str) -> Result<(), ValidationError> {
    if Uuid::parse_str(value).is_err() {
        let mut err = ValidationError::new("uuid");
        err.message = Some("must be a valid UUID".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a difficulty is one of `basic`, `intermediate`, `advanced`.
pub fn validate_difficulty(value: &str) -> Result<(), ValidationError> {
    if value.parse::<Difficulty>().is_err() {
        let mut err = ValidationError::new("difficulty");
        err.message = Some("must be one of basic, intermediate, advanced".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a topic has visible characters.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be empty".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("6f1c1c1e-36b1-4c8f-9d6e-4f9b1b7a0c11").is_ok());
        assert!(validate_uuid("not-a-uuid").is_err());
        assert!(validate_uuid("").is_err());
    }

    #[test]
    fn test_validate_difficulty() {
        assert!(validate_difficulty("basic").is_ok());
        assert!(validate_difficulty("advanced").is_ok());
        assert!(validate_difficulty("expert").is_err()); // unknown tier
        assert!(validate_difficulty("Basic").is_err()); // case sensitive
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("volcanoes").is_ok());
        assert!(validate_not_blank("   ").is_err());
    }
}
