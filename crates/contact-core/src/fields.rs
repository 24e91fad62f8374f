//! Field-level codec shared by every [`crate::record::Entity`] impl.
//!
//! Spec §4.1 fixes the wire shape stored in the hash backing each record:
//! booleans as `"0"`/`"1"`, integers as decimal text, lists as a serialized
//! array, and a null-allowed field as the literal `"none"`. Centralizing the
//! encode/decode pair here means every record type branches on the same
//! rules instead of re-deriving them (spec §9's "central serializer that
//! branches on the tag").

use std::collections::HashMap;

/// The sentinel written for a `null`-allowed field whose value is absent.
pub const NULL_SENTINEL: &str = "none";

pub fn encode_bool(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

pub fn decode_bool(raw: &str) -> bool {
    raw == "1"
}

pub fn encode_int(value: i64) -> String {
    value.to_string()
}

pub fn decode_int(raw: &str) -> i64 {
    raw.parse().unwrap_or(0)
}

pub fn encode_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

pub fn decode_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub fn encode_opt_string(value: &Option<String>) -> String {
    match value {
        Some(s) => s.clone(),
        None => NULL_SENTINEL.to_string(),
    }
}

pub fn decode_opt_string(raw: &str) -> Option<String> {
    if raw == NULL_SENTINEL {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Fetch a raw hash field, defaulting to `""` the way a missing redis hash
/// field behaves.
pub fn get<'a>(raw: &'a HashMap<String, String>, key: &str) -> &'a str {
    raw.get(key).map(String::as_str).unwrap_or("")
}

/// A random 24-character lowercase hex id, matching the original
/// `secrets.token_hex(12)` id generation (spec §3: "id (24-hex)").
pub fn new_hex_id() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 12];
    rand::rng().fill(&mut bytes);
    let mut out = String::with_capacity(24);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_round_trip() {
        assert_eq!(decode_bool(&encode_bool(true)), true);
        assert_eq!(decode_bool(&encode_bool(false)), false);
    }

    #[test]
    fn list_round_trip() {
        let values = vec!["a".to_string(), "b".to_string()];
        assert_eq!(decode_list(&encode_list(&values)), values);
    }

    #[test]
    fn opt_string_round_trip_including_null_sentinel() {
        assert_eq!(decode_opt_string(&encode_opt_string(&None)), None);
        let some = Some("x".to_string());
        assert_eq!(decode_opt_string(&encode_opt_string(&some)), some);
    }

    #[test]
    fn new_hex_id_is_24_lowercase_hex_chars() {
        let id = new_hex_id();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
