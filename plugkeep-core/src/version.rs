//! Four-field numeric component versions.
//!
//! `major.minor[.patch[.build]]`. Missing trailing fields compare as `0`, so
//! `2.0` and `2.0.0.0` are equal, but the textual form keeps the number of
//! fields it was parsed with (`1.1.0` round-trips as `1.1.0`).

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionParseError;

#[derive(Debug, Clone, Copy)]
pub struct ComponentVersion {
    fields: [u32; 4],
    /// Number of fields present in the textual form (2..=4).
    precision: u8,
}

impl ComponentVersion {
    pub fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self {
            fields: [major, minor, patch, build],
            precision: 4,
        }
    }

    pub fn major(&self) -> u32 {
        self.fields[0]
    }

    pub fn minor(&self) -> u32 {
        self.fields[1]
    }

    pub fn patch(&self) -> u32 {
        self.fields[2]
    }

    pub fn build(&self) -> u32 {
        self.fields[3]
    }

    /// Parse a release tag: leading `v`/`V` characters are stripped first.
    ///
    /// Returns `None` for anything that is not a plain numeric version
    /// (`v1.2.3-beta`, `latest`, empty tags).
    pub fn from_tag(tag: &str) -> Option<Self> {
        tag.trim()
            .trim_start_matches(['v', 'V'])
            .parse()
            .ok()
    }
}

impl FromStr for ComponentVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let parts: Vec<&str> = input.split('.').collect();
        if !(2..=4).contains(&parts.len()) {
            return Err(VersionParseError::FieldCount(input.to_string()));
        }

        let mut fields = [0u32; 4];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            let digits_only = !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
            *slot = digits_only
                .then(|| part.parse::<u32>().ok())
                .flatten()
                .ok_or_else(|| VersionParseError::NotNumeric {
                    input: input.to_string(),
                    field: (*part).to_string(),
                })?;
        }

        Ok(Self {
            fields,
            precision: parts.len() as u8,
        })
    }
}

impl fmt::Display for ComponentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.fields[..self.precision as usize];
        for (i, field) in shown.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

impl Serialize for ComponentVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ComponentVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl PartialEq for ComponentVersion {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for ComponentVersion {}

impl Hash for ComponentVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields.hash(state);
    }
}

impl PartialOrd for ComponentVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fields.cmp(&other.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn v(s: &str) -> ComponentVersion {
        s.parse().expect("valid version")
    }

    #[rstest]
    #[case("1.2.0.0", "1.1.9.9")]
    #[case("1.10", "1.9.9")]
    #[case("2.0.0.1", "2.0")]
    #[case("0.0.0.1", "0.0")]
    fn ordering_is_numeric_per_field(#[case] greater: &str, #[case] lesser: &str) {
        assert!(v(greater) > v(lesser), "{greater} should be > {lesser}");
        assert!(v(lesser) < v(greater));
    }

    #[test]
    fn missing_trailing_fields_compare_as_zero() {
        assert_eq!(v("2.0"), v("2.0.0.0"));
        assert_eq!(v("1.1.0"), v("1.1"));
        assert_eq!(v("2.0").cmp(&v("2.0.0.0")), Ordering::Equal);
    }

    #[test]
    fn display_keeps_parsed_precision() {
        assert_eq!(v("1.1.0").to_string(), "1.1.0");
        assert_eq!(v("2.0").to_string(), "2.0");
        assert_eq!(v("1.2.3.4").to_string(), "1.2.3.4");
        assert_eq!(ComponentVersion::new(3, 1, 0, 7).to_string(), "3.1.0.7");
    }

    #[rstest]
    #[case("1")]
    #[case("1.2.3.4.5")]
    #[case("")]
    #[case("1.x")]
    #[case("1.2.3-beta")]
    #[case("1..2")]
    #[case("-1.0")]
    fn rejects_malformed(#[case] input: &str) {
        assert!(input.parse::<ComponentVersion>().is_err(), "{input:?} parsed");
    }

    #[test]
    fn tag_prefix_is_stripped() {
        assert_eq!(ComponentVersion::from_tag("v1.1.0"), Some(v("1.1.0")));
        assert_eq!(ComponentVersion::from_tag("V2.0"), Some(v("2.0")));
        assert_eq!(ComponentVersion::from_tag("vv3.4.5"), Some(v("3.4.5")));
        assert_eq!(ComponentVersion::from_tag("release-1.0"), None);
        assert_eq!(ComponentVersion::from_tag(""), None);
    }

    #[test]
    fn serializes_as_display_string() {
        let yaml = serde_yaml::to_string(&v("1.2.3")).expect("serialize");
        assert!(yaml.contains("1.2.3"), "got {yaml:?}");
        let back: ComponentVersion = serde_yaml::from_str("'0.9.1.4'").expect("deserialize");
        assert_eq!(back, v("0.9.1.4"));
    }

    #[test]
    fn accessors_expose_all_fields() {
        let version = v("4.3.2");
        assert_eq!(
            (version.major(), version.minor(), version.patch(), version.build()),
            (4, 3, 2, 0)
        );
    }
}
