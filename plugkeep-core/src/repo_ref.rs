//! Repository reference parsing.
//!
//! Accepts the shorthand `owner/repo` or a full web URL
//! (`https://host/owner/repo[/anything]`). Pure; no I/O.

use std::str::FromStr;

use url::Url;

use crate::error::RepoRefError;
use crate::types::RepoRef;

/// Parse a free-form repository reference into an `(owner, repo)` pair.
///
/// URLs keep only their first two non-empty path segments; the shorthand form
/// must have exactly two.
pub fn parse(input: &str) -> Result<RepoRef, RepoRefError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(RepoRefError::Empty);
    }

    if has_web_scheme(input) {
        let url = Url::parse(input).map_err(|_| RepoRefError::InvalidUrl(input.to_string()))?;
        let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
        return match segments.as_slice() {
            [owner, repo, ..] => Ok(RepoRef {
                owner: (*owner).to_string(),
                repo: (*repo).to_string(),
            }),
            _ => Err(RepoRefError::UrlTooShort(input.to_string())),
        };
    }

    let segments: Vec<&str> = input.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [owner, repo] => Ok(RepoRef {
            owner: (*owner).to_string(),
            repo: (*repo).to_string(),
        }),
        other => Err(RepoRefError::SegmentCount {
            input: input.to_string(),
            segments: other.len(),
        }),
    }
}

fn has_web_scheme(input: &str) -> bool {
    let lower = input.get(..8).unwrap_or(input).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl FromStr for RepoRef {
    type Err = RepoRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("owner/repo")]
    #[case("  owner/repo  ")]
    #[case("/owner/repo/")]
    #[case("https://host/owner/repo")]
    #[case("https://host/owner/repo/extra")]
    #[case("HTTPS://github.com/owner/repo/releases/latest")]
    #[case("http://github.com//owner//repo")]
    fn parses_to_owner_and_repo(#[case] input: &str) {
        let parsed = parse(input).expect("should parse");
        assert_eq!(parsed.owner, "owner");
        assert_eq!(parsed.repo, "repo");
    }

    #[rstest]
    #[case("owner")]
    #[case("")]
    #[case("   ")]
    #[case("a/b/c")]
    #[case("https://host/owner")]
    #[case("https://")]
    fn rejects_invalid(#[case] input: &str) {
        assert!(parse(input).is_err(), "{input:?} should not parse");
    }

    #[test]
    fn error_kinds_are_specific() {
        assert_eq!(parse(""), Err(RepoRefError::Empty));
        assert!(matches!(
            parse("a/b/c"),
            Err(RepoRefError::SegmentCount { segments: 3, .. })
        ));
        assert!(matches!(
            parse("https://github.com/solo"),
            Err(RepoRefError::UrlTooShort(_))
        ));
    }

    #[test]
    fn from_str_delegates_to_parse() {
        let r: RepoRef = "acme/foo".parse().expect("parse");
        assert_eq!(r.to_string(), "acme/foo");
    }
}
