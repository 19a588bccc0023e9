use super::{ValidationError, Validator};

/// Absolute http(s) URL with a host and no whitespace.
pub struct UrlValidator;

impl UrlValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for UrlValidator {
    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        let s = input.trim();

        // E301: Empty
        if s.is_empty() {
            return Err(ValidationError::new("E301", "url", "URL cannot be empty", None));
        }

        // E302: Length
        if s.len() > 2048 {
            return Err(ValidationError::new("E302", "url", "URL exceeds 2048 characters", None));
        }

        // E303: Scheme
        let lower = s.to_ascii_lowercase();
        let rest = if let Some(rest) = lower.strip_prefix("https://") {
            rest
        } else if let Some(rest) = lower.strip_prefix("http://") {
            rest
        } else {
            return Err(ValidationError::new(
                "E303", "url",
                format!("Unsupported URL scheme: {}", s),
                Some("Use an http:// or https:// link"),
            ));
        };

        // E304: Host present, no whitespace anywhere
        let host = rest.split(['/', '?', '#']).next().unwrap_or("");
        let host = host.rsplit('@').next().unwrap_or("");
        if host.is_empty() || host.starts_with(':') || s.chars().any(char::is_whitespace) {
            return Err(ValidationError::new(
                "E304", "url",
                format!("Invalid URL: {}", s),
                Some("Example: https://example.com/page"),
            ));
        }

        Ok(())
    }
}
