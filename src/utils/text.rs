//! Text helpers.

/// Truncates a string to at most `max_chars` characters.
///
/// Counts Unicode scalar values, so multi-byte characters are never split.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => value[..byte_idx].to_string(),
        None => value.to_string(),
    }
}

/// Masks the local part of an email address embedded in a counter key.
///
/// `rl:reset:email:pat@example.com` becomes `rl:reset:email:p***@example.com`.
/// Values without `@` are returned unchanged.
pub fn mask_email(value: &str) -> String {
    let Some((before, domain)) = value.split_once('@') else {
        return value.to_string();
    };
    let local_start = before.rfind(':').map_or(0, |i| i + 1);
    let (prefix, local) = before.split_at(local_start);
    let first: String = local.chars().take(1).collect();
    format!("{prefix}{first}***@{domain}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_value_unchanged() {
        assert_eq!(truncate_chars("SELECT 1", 100), "SELECT 1");
    }

    #[test]
    fn test_truncates_to_limit() {
        let query = "x".repeat(250);
        assert_eq!(truncate_chars(&query, 100).chars().count(), 100);
    }

    #[test]
    fn test_multibyte_boundary() {
        assert_eq!(truncate_chars("ééééé", 3), "ééé");
    }

    #[test]
    fn test_mask_email_in_counter_key() {
        assert_eq!(
            mask_email("rl:password-reset:email:pat@example.com"),
            "rl:password-reset:email:p***@example.com"
        );
        assert_eq!(mask_email("jane.doe@clinic.org"), "j***@clinic.org");
    }

    #[test]
    fn test_mask_email_leaves_other_keys() {
        assert_eq!(mask_email("rl:general:10.0.0.1"), "rl:general:10.0.0.1");
    }
}
