// src/reconcile/changelog.rs

//! Per-package changelog lines from commit messages

use regex::Regex;
use std::sync::LazyLock;

static COMMIT_MSG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\A\[?([a-z0-9][a-z0-9+. ,{}*/-]*)\]?:? (.+)$").expect("valid regex")
});

static COMMIT_REVERT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)\A(?:Revert ")+(.+?)"+$"#).expect("valid regex"));

/// Changelog text for `name` from a commit message.
///
/// Merge commits produce nothing. A `pkg: text` subject naming the package
/// yields `text`; any other message is used whole.
pub fn parse_commit_msg(name: &str, text: &str) -> Option<String> {
    if text.starts_with("Merge branch ") {
        return None;
    }

    let text = match COMMIT_REVERT.captures(text) {
        Some(caps) => caps.get(1).map_or(text, |m| m.as_str()),
        None => text,
    };

    if let Some(caps) = COMMIT_MSG.captures(text)
        && let (Some(prefix), Some(body)) = (caps.get(1), caps.get(2))
        && prefix.as_str().contains(name)
    {
        return Some(body.as_str().to_string());
    }
    Some(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_commits_are_skipped() {
        assert_eq!(parse_commit_msg("zlib", "Merge branch 'stable' into testing"), None);
    }

    #[test]
    fn test_prefixed_subject() {
        assert_eq!(
            parse_commit_msg("zlib", "zlib: update to 1.3.1").as_deref(),
            Some("update to 1.3.1")
        );
        assert_eq!(
            parse_commit_msg("zlib", "[zlib,libpng] rebuild").as_deref(),
            Some("rebuild")
        );
        assert_eq!(
            parse_commit_msg("gcc", "gcc-runtime, gcc: bump REL\n\nlong body").as_deref(),
            Some("bump REL")
        );
    }

    #[test]
    fn test_other_package_prefix_keeps_whole_message() {
        assert_eq!(
            parse_commit_msg("zlib", "libpng: update to 1.6").as_deref(),
            Some("libpng: update to 1.6")
        );
        assert_eq!(
            parse_commit_msg("zlib", "Update many things").as_deref(),
            Some("Update many things")
        );
    }

    #[test]
    fn test_revert_is_unwrapped() {
        assert_eq!(
            parse_commit_msg("zlib", "Revert \"zlib: update to 1.3\"").as_deref(),
            Some("update to 1.3")
        );
        assert_eq!(
            parse_commit_msg("zlib", "Revert \"Revert \"zlib: drop patch\"\"").as_deref(),
            Some("drop patch")
        );
    }
}
