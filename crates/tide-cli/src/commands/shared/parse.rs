use serde::de::DeserializeOwned;

/// Parse a `snake_case` enum value using serde-deserialization.
pub fn parse_enum<T>(raw: &str, field: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|error| anyhow::anyhow!("invalid {field} '{raw}': {error}"))
}

#[cfg(test)]
mod tests {
    use tide_core::enums::TaskStatus;

    use super::parse_enum;

    #[test]
    fn parses_snake_case_enum() {
        let status: TaskStatus = parse_enum("failed", "status").expect("status should parse");
        assert_eq!(status, TaskStatus::Failed);
    }

    #[test]
    fn accepts_upper_case() {
        let status: TaskStatus = parse_enum("QUEUED", "status").expect("status should parse");
        assert_eq!(status, TaskStatus::Queued);
    }

    #[test]
    fn errors_on_invalid_enum() {
        let err = parse_enum::<TaskStatus>("stuck", "status").expect_err("should fail");
        assert!(err.to_string().contains("invalid status 'stuck'"));
    }
}
