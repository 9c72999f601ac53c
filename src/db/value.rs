//! Shared helpers for turning native cell values into JSON.

use serde_json::Value;

/// Render binary column data as a lowercase hex string.
pub fn binary(bytes: &[u8]) -> Value {
    Value::String(hex::encode(bytes))
}

/// Render a float, mapping NaN and infinities to `null`.
pub fn float(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Decode bytes as UTF-8, replacing invalid sequences with U+FFFD.
pub fn lossy_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Render text that may not be valid UTF-8.
pub fn lossy_text(bytes: &[u8]) -> Value {
    Value::String(lossy_string(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_binary_is_hex_encoded() {
        assert_eq!(binary(&[0xde, 0xad, 0xbe, 0xef]), json!("deadbeef"));
        assert_eq!(binary(&[]), json!(""));
    }

    #[test]
    fn test_float_handles_non_finite_values() {
        assert_eq!(float(1.5), json!(1.5));
        assert_eq!(float(f64::NAN), Value::Null);
        assert_eq!(float(f64::INFINITY), Value::Null);
    }

    #[test]
    fn test_lossy_text_replaces_invalid_bytes() {
        assert_eq!(lossy_text(b"hello"), json!("hello"));
        assert_eq!(lossy_text(&[0x66, 0xff]), json!("f\u{fffd}"));
    }
}
