//! Deterministic object-name encoding
//!
//! The array caps object names at [`MAX_NAME_LENGTH`] characters, which is
//! shorter than a UUID or a fully qualified hostname. Every lookup-before-create
//! in the attach path searches by the encoded name, so the encoding must be
//! deterministic: encoding the same identifier twice must land on the same
//! array object.

use sha2::{Digest, Sha256};

/// Maximum object-name length accepted by the array
pub const MAX_NAME_LENGTH: usize = 31;

/// Encode an identifier into an array-safe object name.
///
/// Identifiers that already fit pass through unchanged so operators can still
/// recognize them in the array UI. Longer identifiers keep a short prefix and
/// are padded out with a truncated digest of the full identifier.
pub fn encode_name(id: &str) -> String {
    if id.len() <= MAX_NAME_LENGTH {
        return id.to_string();
    }

    let prefix: String = id.chars().take(8).collect();
    let digest = hex::encode(Sha256::digest(id.as_bytes()));
    let budget = MAX_NAME_LENGTH - prefix.len() - 1;
    format!("{}-{}", prefix, &digest[..budget])
}

/// Escape the colons in an IQN so it survives the `filter` query syntax,
/// which uses `::` as the field/value separator.
pub fn escape_filter_value(value: &str) -> String {
    value.replace(':', "\\:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names_pass_through() {
        assert_eq!(encode_name("web-01"), "web-01");
        assert_eq!(encode_name("vol-1"), "vol-1");
    }

    #[test]
    fn test_long_names_fit_and_stay_deterministic() {
        let id = "1f0e467c-8f7b-44f0-a556-0a2d010cb8e7";
        let first = encode_name(id);
        let second = encode_name(id);

        assert_eq!(first, second);
        assert_eq!(first.len(), MAX_NAME_LENGTH);
        assert!(first.starts_with("1f0e467c-"));
    }

    #[test]
    fn test_distinct_inputs_encode_distinctly() {
        // Shared prefix forces the digest portion to disambiguate.
        let a = encode_name("compute-node-01.rack4.dc1.example.com");
        let b = encode_name("compute-node-02.rack4.dc1.example.com");
        assert_ne!(a, b);
    }

    #[test]
    fn test_iqn_escaping() {
        assert_eq!(
            escape_filter_value("iqn.1994-05.com.redhat:462f63b9d3cc"),
            "iqn.1994-05.com.redhat\\:462f63b9d3cc"
        );
    }
}
