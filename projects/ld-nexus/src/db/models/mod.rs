pub mod forum;
pub mod job;
pub mod profile;
pub mod resource;
pub mod subscription;
pub mod user;

/// Decode a JSON-array text column. Corrupt values read as empty.
pub fn decode_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Encode a list for a JSON-array text column.
pub fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}
