use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub mod email;
pub mod password;
pub mod url;

pub use email::EmailValidator;
pub use password::PasswordValidator;
pub use url::UrlValidator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: String,
    pub message: String,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(code: &str, field: &str, message: impl Into<String>, suggestion: Option<&str>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: field.to_string(),
            suggestion: suggestion.map(String::from),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err.suggestion {
            Some(hint) => AppError::Validation(format!("[{}] {} ({})", err.code, err.message, hint)),
            None => AppError::Validation(format!("[{}] {}", err.code, err.message)),
        }
    }
}

pub trait Validator {
    fn validate(&self, input: &str) -> Result<(), ValidationError>;
}
