use super::{ValidationError, Validator};

pub struct EmailValidator;

impl EmailValidator {
    pub fn new() -> Self {
        Self
    }

    fn is_valid_local_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || "._%+-".contains(c)
    }

    fn is_valid_domain_label(label: &str) -> bool {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    }
}

impl Default for EmailValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for EmailValidator {
    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        let s = input.trim();

        // E101: Empty email
        if s.is_empty() {
            return Err(ValidationError::new("E101", "email", "Email cannot be empty", None));
        }

        // E102: Too long (RFC 5321)
        if s.len() > 254 {
            return Err(ValidationError::new(
                "E102", "email",
                format!("Email exceeds 254 characters (got {})", s.len()),
                None,
            ));
        }

        // E103: Exactly one '@' with both sides present
        let Some((local, domain)) = s.split_once('@') else {
            return Err(ValidationError::new(
                "E103", "email", "Email must contain '@'", Some("Use name@example.com format"),
            ));
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(ValidationError::new(
                "E103", "email", format!("Invalid email format: {}", s), Some("Use name@example.com format"),
            ));
        }

        // E104: Local part characters
        if local.len() > 64
            || local.starts_with('.')
            || local.ends_with('.')
            || local.contains("..")
            || !local.chars().all(Self::is_valid_local_char)
        {
            return Err(ValidationError::new(
                "E104", "email", format!("Invalid characters before '@': {}", local), None,
            ));
        }

        // E105: Domain needs at least two valid labels
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || !labels.iter().all(|l| Self::is_valid_domain_label(l)) {
            return Err(ValidationError::new(
                "E105", "email", format!("Invalid email domain: {}", domain), Some("Check the part after '@'"),
            ));
        }

        Ok(())
    }
}
