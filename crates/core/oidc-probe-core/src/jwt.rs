//! Display-only JWT decoding.

use crate::types::DecodedJwt;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Decode a compact JWT into its header and payload for display.
///
/// Returns `None` unless the token has exactly three dot-separated parts
/// and both the header and payload segments are valid base64url-encoded
/// JSON (the payload additionally a JSON object). Failure is all-or-nothing:
/// a parseable header with a broken payload yields `None`, not a partial
/// result. The signature segment is never examined.
pub fn decode_jwt(token: &str) -> Option<DecodedJwt> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let header = decode_segment(parts[0])?;
    let payload = match decode_segment(parts[1])? {
        serde_json::Value::Object(map) => map,
        _ => return None,
    };

    Some(DecodedJwt { header, payload })
}

fn decode_segment(segment: &str) -> Option<serde_json::Value> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

    fn encode(value: serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(value.to_string())
    }

    fn sample_token() -> String {
        let header = encode(serde_json::json!({"alg": "RS256", "typ": "JWT"}));
        let payload = encode(serde_json::json!({
            "sub": "1234567890",
            "email": "test@example.com",
            "exp": 1893456000u64
        }));
        format!("{header}.{payload}.signature-not-checked")
    }

    #[test]
    fn decodes_well_formed_token() {
        let decoded = decode_jwt(&sample_token()).unwrap();
        assert_eq!(decoded.header["alg"], "RS256");
        assert_eq!(decoded.payload["sub"], "1234567890");
        assert_eq!(decoded.payload["email"], "test@example.com");
    }

    #[test]
    fn rejects_wrong_part_count() {
        assert!(decode_jwt("onlyonepart").is_none());
        assert!(decode_jwt("two.parts").is_none());
        assert!(decode_jwt("a.b.c.d").is_none());
        assert!(decode_jwt("").is_none());
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(decode_jwt("!!!.???.sig").is_none());
    }

    #[test]
    fn failure_is_all_or_nothing() {
        // Valid header, payload that is not JSON after decoding.
        let header = encode(serde_json::json!({"alg": "HS256"}));
        let garbage = URL_SAFE_NO_PAD.encode(b"not json at all");
        assert!(decode_jwt(&format!("{header}.{garbage}.sig")).is_none());
    }

    #[test]
    fn rejects_non_object_payload() {
        let header = encode(serde_json::json!({"alg": "HS256"}));
        let array = URL_SAFE_NO_PAD.encode("[1,2,3]");
        assert!(decode_jwt(&format!("{header}.{array}.sig")).is_none());
    }
}
