use super::{ValidationError, Validator};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Length bounds plus at least one letter and one digit.
pub struct PasswordValidator;

impl PasswordValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PasswordValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for PasswordValidator {
    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        let len = input.chars().count();

        // E201: Too short
        if len < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(
                "E201", "password",
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
                None,
            ));
        }

        // E202: Too long
        if len > MAX_PASSWORD_LEN {
            return Err(ValidationError::new(
                "E202", "password",
                format!("Password must be at most {} characters", MAX_PASSWORD_LEN),
                None,
            ));
        }

        // E203: Character mix
        let has_letter = input.chars().any(char::is_alphabetic);
        let has_digit = input.chars().any(|c| c.is_ascii_digit());
        if !has_letter || !has_digit {
            return Err(ValidationError::new(
                "E203", "password",
                "Password must contain both letters and digits",
                Some("Mix letters with at least one number"),
            ));
        }

        Ok(())
    }
}
