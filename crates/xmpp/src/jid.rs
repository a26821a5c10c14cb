//! Identity checks and resource normalization.
//!
//! These work on the raw string on purpose: a fresh login must accept any
//! non-empty identity, so nothing here parses or rejects JID structure.

use uuid::Uuid;

const RESOURCE_SEPARATOR: char = '/';
const RESOURCE_PREFIX: &str = "perch-";
const RESOURCE_TOKEN_LEN: usize = 8;

/// Length of every generated resource, prefix included.
pub const GENERATED_RESOURCE_LEN: usize = RESOURCE_PREFIX.len() + RESOURCE_TOKEN_LEN;

/// Whether the identity already names a resource.
pub fn has_resource(jid: &str) -> bool {
    jid.contains(RESOURCE_SEPARATOR)
}

/// Short opaque resource token, e.g. `perch-1f0c9a7b`.
pub fn generate_resource() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{RESOURCE_PREFIX}{}", &token[..RESOURCE_TOKEN_LEN])
}

/// Append a generated resource unless one is already present.
pub fn with_generated_resource(jid: &str) -> String {
    if has_resource(jid) {
        jid.to_string()
    } else {
        format!("{jid}{RESOURCE_SEPARATOR}{}", generate_resource())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_jid_gets_exactly_one_generated_resource() {
        let jid = with_generated_resource("alice@example.com");
        let (bare, resource) = jid.split_once('/').expect("resource appended");
        assert_eq!(bare, "alice@example.com");
        assert_eq!(resource.len(), GENERATED_RESOURCE_LEN);
        assert!(resource.starts_with(RESOURCE_PREFIX));
        assert!(!resource.contains('/'));
    }

    #[test]
    fn full_jid_passes_through_unchanged() {
        assert_eq!(
            with_generated_resource("alice@example.com/desk"),
            "alice@example.com/desk"
        );
    }

    #[test]
    fn resource_detection_is_a_plain_separator_check() {
        assert!(has_resource("alice@example.com/"));
        assert!(has_resource("alice@example.com/a/b"));
        assert!(!has_resource("alice@example.com"));
        assert!(!has_resource("example.com"));
    }

    #[test]
    fn generated_resources_differ() {
        assert_ne!(generate_resource(), generate_resource());
    }
}
