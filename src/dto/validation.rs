//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::dao::quiz_store::{MAX_OPTIONS, MIN_OPTIONS};

/// Longest nickname accepted in a lobby.
pub const MAX_NICKNAME_CHARS: usize = 32;

/// Validates that a nickname is non-blank, short and free of control characters.
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("nickname_blank");
        err.message = Some("Nickname must not be blank".into());
        return Err(err);
    }

    let length = trimmed.chars().count();
    if length > MAX_NICKNAME_CHARS {
        let mut err = ValidationError::new("nickname_length");
        err.message = Some(
            format!("Nickname must be at most {MAX_NICKNAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("nickname_format");
        err.message = Some("Nickname must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates the option list of a question: 2 to 6 non-blank entries.
pub fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
        let mut err = ValidationError::new("options_count");
        err.message = Some(
            format!(
                "A question needs {MIN_OPTIONS} to {MAX_OPTIONS} options (got {})",
                options.len()
            )
            .into(),
        );
        return Err(err);
    }

    if options.iter().any(|option| option.trim().is_empty()) {
        let mut err = ValidationError::new("options_blank");
        err.message = Some("Options must not be blank".into());
        return Err(err);
    }

    Ok(())
}
