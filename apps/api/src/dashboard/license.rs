//! License key activation.

/// Shown to the owner when the entered key does not match.
pub const ACTIVATION_ERROR: &str = "كود التفعيل غير صحيح. تأكد من تطابق الأحرف والأرقام.";

/// Drops everything except ASCII letters and digits, then upper-cases.
/// `rwb-1234-abcd` and `RWB 1234 ABCD` both become `RWB1234ABCD`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// True when the entered key matches the stored one after normalization.
/// A bot without a stored key cannot be activated.
pub fn keys_match(entered: &str, stored: Option<&str>) -> bool {
    let stored = normalize_key(stored.unwrap_or_default());
    !stored.is_empty() && normalize_key(entered) == stored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_separators_and_uppercases() {
        assert_eq!(normalize_key("rwb-1234-abcd"), "RWB1234ABCD");
        assert_eq!(normalize_key("  RWB 1234_abcd\t"), "RWB1234ABCD");
        assert_eq!(normalize_key("---"), "");
    }

    #[test]
    fn test_dash_space_and_case_differences_still_match() {
        assert!(keys_match("rwb-1234-abcd", Some("RWB1234ABCD")));
        assert!(keys_match("RWB 1234 ABCD", Some("rwb-1234-abcd")));
        assert!(keys_match("Rwb.1234.Abcd", Some("RWB-1234-ABCD")));
    }

    #[test]
    fn test_different_keys_do_not_match() {
        assert!(!keys_match("RWB-1234-ABCE", Some("RWB-1234-ABCD")));
        assert!(!keys_match("RWB-1234", Some("RWB-1234-ABCD")));
        assert!(!keys_match("", Some("RWB-1234-ABCD")));
    }

    #[test]
    fn test_missing_stored_key_never_matches() {
        assert!(!keys_match("", None));
        assert!(!keys_match("RWB-1234", None));
        assert!(!keys_match("", Some("--")));
    }
}
