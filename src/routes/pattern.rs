//! Versioned path patterns.
//!
//! # Design Decisions
//! - The version segment always comes first: `/<version><path>`
//! - Any-version routes make the segment optional and accept `v<digits>`
//! - Explicit routes make it mandatory and accept `v<digits>` plus each declared
//!   literal; membership in the declared list is enforced by the chain's version
//!   gate, so a wrong `v<digits>` token is a 400, not a 404
//! - Deterministic: the same `(version, path)` always yields the same pattern

use std::collections::HashMap;

use regex::Regex;

/// The token shape a version segment must have.
pub const VERSION_TOKEN: &str = r"v\d+";

/// VersionSpec
///
/// A descriptor's `version` field after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Any,
    Only(Vec<String>),
}

impl VersionSpec {
    /// Absent, empty, or containing `*` means any version.
    pub fn from_declared(versions: Option<&[String]>) -> Self {
        match versions {
            Some(list) if !list.is_empty() && !list.iter().any(|v| v == "*") => {
                VersionSpec::Only(list.to_vec())
            }
            _ => VersionSpec::Any,
        }
    }

    /// The version labels a route is published under on `/routes`.
    pub fn labels(&self) -> Vec<String> {
        match self {
            VersionSpec::Any => vec!["*".to_string()],
            VersionSpec::Only(list) => list.clone(),
        }
    }

    /// Whether a request carrying `version` is served by this route.
    pub fn admits(&self, version: Option<&str>) -> bool {
        match self {
            VersionSpec::Any => true,
            VersionSpec::Only(list) => version.is_some_and(|v| list.iter().any(|l| l == v)),
        }
    }

    /// The path a client calls for one published version label.
    pub fn qualified_path(version: &str, path: &str) -> String {
        if version == "*" {
            path.to_string()
        } else {
            format!("/{version}{path}")
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("path `{path}` cannot be compiled: {source}")]
pub struct PatternError {
    path: String,
    #[source]
    source: regex::Error,
}

/// PathPattern
///
/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    params: Vec<String>,
}

/// A successful match: the version token (if present) and named path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub version: Option<String>,
    pub params: HashMap<String, String>,
}

/// Parse a placeholder segment (`:id` or `{id}`), returning its name.
fn placeholder(segment: &str) -> Option<&str> {
    segment
        .strip_prefix(':')
        .or_else(|| segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .filter(|name| !name.is_empty())
}

impl PathPattern {
    pub fn build(versions: &VersionSpec, path: &str) -> Result<Self, PatternError> {
        let (version_source, version_regex) = match versions {
            VersionSpec::Any => (
                format!("/:version({VERSION_TOKEN})?"),
                format!("(?:/(?P<version>{VERSION_TOKEN}))?"),
            ),
            VersionSpec::Only(list) => {
                // Any `v<digits>` token reaches the version gate; other declared
                // literals match exactly.
                let alternatives: Vec<String> = std::iter::once(VERSION_TOKEN.to_string())
                    .chain(list.iter().map(|literal| regex::escape(literal)))
                    .collect();
                (
                    format!("/:version({})", list.join("|")),
                    format!("/(?P<version>{})", alternatives.join("|")),
                )
            }
        };

        let mut params = Vec::new();
        let mut path_regex = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            path_regex.push('/');
            match placeholder(segment) {
                Some(name) => {
                    path_regex.push_str(&format!("(?P<{name}>[^/]+)"));
                    params.push(name.to_string());
                }
                None => path_regex.push_str(&regex::escape(segment)),
            }
        }

        let regex = Regex::new(&format!("^{version_regex}{path_regex}/?$")).map_err(|source| {
            PatternError {
                path: path.to_string(),
                source,
            }
        })?;

        Ok(Self {
            source: format!("{version_source}{path}"),
            regex,
            params,
        })
    }

    /// The pattern in router notation, e.g. `/:version(v\d+)?/foo`.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> Option<PatternMatch> {
        let captures = self.regex.captures(path)?;
        let params = self
            .params
            .iter()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.clone(), m.as_str().to_string()))
            })
            .collect();
        Some(PatternMatch {
            version: captures.name("version").map(|m| m.as_str().to_string()),
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(versions: &[&str]) -> VersionSpec {
        VersionSpec::Only(versions.iter().map(|v| v.to_string()).collect())
    }

    fn declared(list: &[&str]) -> VersionSpec {
        let owned: Vec<String> = list.iter().map(|v| v.to_string()).collect();
        VersionSpec::from_declared(Some(owned.as_slice()))
    }

    #[test]
    fn test_version_spec_normalization() {
        assert_eq!(VersionSpec::from_declared(None), VersionSpec::Any);
        assert_eq!(declared(&[]), VersionSpec::Any);
        assert_eq!(declared(&["*"]), VersionSpec::Any);
        assert_eq!(declared(&["v1", "*"]), VersionSpec::Any);
        assert_eq!(declared(&["v1"]), only(&["v1"]));
    }

    #[test]
    fn test_pattern_strings_are_deterministic() {
        let any = PathPattern::build(&VersionSpec::Any, "/foo").unwrap();
        assert_eq!(any.as_str(), r"/:version(v\d+)?/foo");
        let explicit = PathPattern::build(&only(&["v1", "v2"]), "/bar").unwrap();
        assert_eq!(explicit.as_str(), "/:version(v1|v2)/bar");
        let again = PathPattern::build(&only(&["v1", "v2"]), "/bar").unwrap();
        assert_eq!(explicit.as_str(), again.as_str());
    }

    #[test]
    fn test_any_version_segment_is_optional() {
        let pattern = PathPattern::build(&VersionSpec::Any, "/foo").unwrap();
        assert_eq!(pattern.matches("/foo").unwrap().version, None);
        assert_eq!(pattern.matches("/v10/foo").unwrap().version.as_deref(), Some("v10"));
        assert!(pattern.matches("/foo/").is_some());
        assert!(pattern.matches("/beta/foo").is_none());
        assert!(pattern.matches("/foobar").is_none());
    }

    #[test]
    fn test_explicit_version_segment_is_mandatory() {
        let pattern = PathPattern::build(&only(&["v1", "v2"]), "/bar").unwrap();
        assert!(pattern.matches("/bar").is_none());
        assert!(pattern.matches("/no-version/bar").is_none());
        // Shape matches; membership is decided by the version gate.
        assert_eq!(pattern.matches("/v3/bar").unwrap().version.as_deref(), Some("v3"));
    }

    #[test]
    fn test_explicit_non_numeric_literals_match_exactly() {
        let pattern = PathPattern::build(&only(&["beta", "2023-01", "V1"]), "/foo").unwrap();
        assert_eq!(pattern.as_str(), "/:version(beta|2023-01|V1)/foo");
        assert_eq!(pattern.matches("/beta/foo").unwrap().version.as_deref(), Some("beta"));
        assert_eq!(pattern.matches("/2023-01/foo").unwrap().version.as_deref(), Some("2023-01"));
        assert_eq!(pattern.matches("/V1/foo").unwrap().version.as_deref(), Some("V1"));
        assert!(pattern.matches("/gamma/foo").is_none());
        assert!(pattern.matches("/2023x01/foo").is_none());
        assert!(pattern.matches("/v7/foo").is_some());
    }

    #[test]
    fn test_placeholders_capture_params() {
        let pattern = PathPattern::build(&VersionSpec::Any, "/users/:id/posts/{post}").unwrap();
        let found = pattern.matches("/v1/users/42/posts/7").unwrap();
        assert_eq!(found.params["id"], "42");
        assert_eq!(found.params["post"], "7");
        assert!(pattern.matches("/users//posts/7").is_none());
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let pattern = PathPattern::build(&VersionSpec::Any, "/a.b").unwrap();
        assert!(pattern.matches("/a.b").is_some());
        assert!(pattern.matches("/axb").is_none());
    }

    #[test]
    fn test_admits_and_qualified_path() {
        let versions = only(&["v1", "v2"]);
        assert!(versions.admits(Some("v2")));
        assert!(!versions.admits(Some("v3")));
        assert!(!versions.admits(None));
        assert!(VersionSpec::Any.admits(None));
        assert_eq!(VersionSpec::qualified_path("v1", "/bar"), "/v1/bar");
        assert_eq!(VersionSpec::qualified_path("*", "/bar"), "/bar");
    }
}
