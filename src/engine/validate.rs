//! Repository name validation.
//!
//! Pure predicates applied to both the owner and repository segments of
//! every `owner/name` pair before any remote call is issued, rejecting
//! malformed or path-traversal-like input before spending API quota.

use std::sync::LazyLock;

use regex::Regex;

use crate::hosting::RepoRef;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid name pattern"));

const MAX_SEGMENT_LEN: usize = 100;

/// Whether `name` is a valid owner or repository segment: non-empty, at
/// most 100 characters, provider-safe charset, not dot-led.
pub fn is_valid_segment(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_SEGMENT_LEN {
        return false;
    }
    if name == "." || name == ".." || name.starts_with('.') {
        return false;
    }
    NAME_PATTERN.is_match(name)
}

/// Whether both segments of a repository reference are valid.
pub fn is_valid_repo(repo: &RepoRef) -> bool {
    is_valid_segment(&repo.owner) && is_valid_segment(&repo.name)
}

/// Parse and validate an `owner/name` pair.
pub fn parse_repo(full_name: &str) -> Option<RepoRef> {
    let (owner, name) = full_name.split_once('/')?;
    if !is_valid_segment(owner) || !is_valid_segment(name) {
        return None;
    }
    Some(RepoRef::new(owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_provider_safe_names() {
        assert!(is_valid_segment("my-repo.name_1"));
        assert!(is_valid_segment("a"));
        assert!(is_valid_segment(&"a".repeat(100)));
    }

    #[test]
    fn rejects_traversal_and_malformed_names() {
        assert!(!is_valid_segment("../secret"));
        assert!(!is_valid_segment(""));
        assert!(!is_valid_segment(&"a".repeat(101)));
        assert!(!is_valid_segment("."));
        assert!(!is_valid_segment(".."));
        assert!(!is_valid_segment(".hidden"));
        assert!(!is_valid_segment("has space"));
        assert!(!is_valid_segment("owner/name"));
    }

    #[test]
    fn parses_owner_name_pairs() {
        let repo = parse_repo("octocat/hello-world").expect("valid pair");
        assert_eq!(repo.owner, "octocat");
        assert_eq!(repo.name, "hello-world");

        assert!(parse_repo("no-slash").is_none());
        assert!(parse_repo("bad/../name").is_none());
        assert!(parse_repo("/name").is_none());
        assert!(parse_repo("owner/").is_none());
    }
}
