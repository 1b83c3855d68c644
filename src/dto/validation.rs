//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest participant identifier accepted from clients.
const MAX_PARTICIPANT_ID_LEN: usize = 128;

/// Validates that a participant ID is non-blank, bounded and free of control characters.
///
/// # Examples
///
/// ```ignore
/// validate_participant_id("player-42") // Ok
/// validate_participant_id("   ")       // Err - blank
/// validate_participant_id("a\nb")      // Err - control character
/// ```
pub fn validate_participant_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        let mut err = ValidationError::new("participant_id_blank");
        err.message = Some("Participant ID must not be blank".into());
        return Err(err);
    }

    if id.len() > MAX_PARTICIPANT_ID_LEN {
        let mut err = ValidationError::new("participant_id_length");
        err.message = Some(
            format!(
                "Participant ID must be at most {MAX_PARTICIPANT_ID_LEN} bytes (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(char::is_control) {
        let mut err = ValidationError::new("participant_id_format");
        err.message = Some("Participant ID must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_participant_id_valid() {
        assert!(validate_participant_id("player-42").is_ok());
        assert!(validate_participant_id("Équipe Bleue").is_ok());
        assert!(validate_participant_id(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn test_validate_participant_id_blank() {
        assert!(validate_participant_id("").is_err());
        assert!(validate_participant_id("   ").is_err());
    }

    #[test]
    fn test_validate_participant_id_invalid() {
        assert!(validate_participant_id(&"x".repeat(129)).is_err()); // too long
        assert!(validate_participant_id("a\nb").is_err()); // newline
        assert!(validate_participant_id("tab\there").is_err()); // tab
    }
}
