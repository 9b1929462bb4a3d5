use serde_json::Value;

/// Masks personal and secret fields in JSON payloads before they are logged.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "email"
            | "first_name"
            | "last_name"
            | "mobile"
            | "phone_number"
            | "password"
            | "secret"
            | "token"
            | "api_key"
            | "authorization"
            | "signature"
            | "x-hasura-admin-secret"
    )
}

/// Keeps the first and last four characters of long strings.
pub fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > 8 => {
            let chars: Vec<char> = s.chars().collect();
            let start: String = chars[..4].iter().collect();
            let end: String = chars[chars.len() - 4..].iter().collect();
            Value::String(format!("{}****{}", start, end))
        }
        _ => Value::String("****".to_string()),
    }
}

/// Same masking for plain strings, e.g. secrets printed by the CLI.
pub fn mask_str(raw: &str) -> String {
    match mask_value(&Value::String(raw.to_string())) {
        Value::String(s) => s,
        _ => "****".to_string(),
    }
}
