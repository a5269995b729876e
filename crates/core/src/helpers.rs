//! Small free-standing helpers shared by the validation rules.

/// Case-insensitive version of a list membership test.
///
/// Returns `true` if the lowercase form of `needle` equals the lowercase form
/// of any entry in `haystack`.
///
/// # Examples
///
/// ```
/// use reinforce_core::helpers::in_arrayi;
///
/// assert!(in_arrayi("ADMIN", &["admin", "user"]));
/// assert!(!in_arrayi("guest", &["admin", "user"]));
/// ```
pub fn in_arrayi<S: AsRef<str>>(needle: &str, haystack: &[S]) -> bool {
    let needle = needle.to_lowercase();
    haystack
        .iter()
        .any(|entry| entry.as_ref().to_lowercase() == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_regardless_of_case() {
        assert!(in_arrayi("ADMIN", &["admin", "user"]));
        assert!(in_arrayi("admin", &["ADMIN", "User"]));
        assert!(in_arrayi("uSeR", &["admin", "user"]));
    }

    #[test]
    fn rejects_missing_value() {
        assert!(!in_arrayi("guest", &["admin", "user"]));
    }

    #[test]
    fn empty_haystack_never_matches() {
        let empty: [&str; 0] = [];
        assert!(!in_arrayi("admin", &empty));
    }

    #[test]
    fn works_with_owned_strings() {
        let allowed = vec!["Draft".to_string(), "Published".to_string()];
        assert!(in_arrayi("published", &allowed));
    }

    #[test]
    fn empty_needle_matches_empty_entry() {
        assert!(in_arrayi("", &["", "x"]));
        assert!(!in_arrayi("", &["x"]));
    }
}
