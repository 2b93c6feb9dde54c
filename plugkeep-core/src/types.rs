//! Domain types for managed components.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::ComponentVersion;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a managed component.
///
/// Doubles as the install sub-directory name and the binary base name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentName(pub String);

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ComponentName {
    /// `true` when the name is a single path component, so joining it onto the
    /// plugins directory cannot land anywhere else.
    pub fn is_single_component(&self) -> bool {
        let name = self.0.as_str();
        !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', ':', '\0'])
    }
}

impl From<String> for ComponentName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ComponentName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// An `(owner, repo)` pair on the release-hosting service.
///
/// Both fields are non-empty and contain no `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Latest published release of a repository, as far as this tool cares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleaseDescriptor {
    /// `None` when the tag is not a plain numeric version.
    pub version: Option<ComponentVersion>,
    /// `None` when no asset has a recognized extension.
    pub asset_url: Option<String>,
}

/// A component as currently loaded by the host process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedComponent {
    pub install_dir_name: String,
    pub reported_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn newtype_display() {
        assert_eq!(ComponentName::from("Foo").to_string(), "Foo");
    }

    #[rstest]
    #[case("Foo", true)]
    #[case("Foo.Bar v2", true)]
    #[case("..Foo", true)]
    #[case("", false)]
    #[case(".", false)]
    #[case("..", false)]
    #[case("../other", false)]
    #[case("a/b", false)]
    #[case("a\\b", false)]
    #[case("/etc", false)]
    #[case("C:evil", false)]
    fn component_names_must_stay_inside_plugins_dir(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(ComponentName::from(name).is_single_component(), ok);
    }

    #[test]
    fn repo_ref_display() {
        let r = RepoRef {
            owner: "acme".into(),
            repo: "foo".into(),
        };
        assert_eq!(r.to_string(), "acme/foo");
    }

    #[test]
    fn loaded_component_json_shape() {
        let json = r#"{"install_dir_name":"Foo","reported_version":"1.0.0"}"#;
        let parsed: LoadedComponent = serde_yaml::from_str(json).expect("parse");
        assert_eq!(parsed.install_dir_name, "Foo");
        assert_eq!(parsed.reported_version, "1.0.0");
    }
}
