//! Email address derivation from directory account names.

use once_cell::sync::Lazy;
use regex::Regex;

/// `first.last` at the start of the account name; anything after it
/// (e.g. `_admin` suffixes) is ignored.
static LOCAL_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z-]+\.[a-zA-Z-]+").expect("local-part pattern is valid"));

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecipientError {
    #[error("couldn't extract an email address from account {0:?}")]
    NoLocalPart(String),
}

/// Build `<first.last>@<domain>` from an account name.
pub fn derive_email(account_id: &str, domain: &str) -> Result<String, RecipientError> {
    let local = LOCAL_PART
        .find(account_id)
        .map(|m| m.as_str())
        .ok_or_else(|| RecipientError::NoLocalPart(account_id.to_string()))?;
    Ok(format!("{local}@{domain}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_dot_last() {
        assert_eq!(
            derive_email("test.test", "testdomain.com").unwrap(),
            "test.test@testdomain.com"
        );
    }

    #[test]
    fn suffix_after_match_is_dropped() {
        assert_eq!(
            derive_email("test-test.test_zrerez", "testdomain.com").unwrap(),
            "test-test.test@testdomain.com"
        );
    }

    #[test]
    fn account_without_separator_fails() {
        assert_eq!(
            derive_email("admin", "testdomain.com"),
            Err(RecipientError::NoLocalPart("admin".to_string()))
        );
        assert!(derive_email("1234.5678", "testdomain.com").is_err());
        assert!(derive_email("", "testdomain.com").is_err());
    }
}
