//! Hierarchical names.
//!
//! A [`Name`] is an ordered list of path segments. The empty name addresses
//! the root context. Segment rules:
//! - Must be non-empty
//! - Must not contain `/` or NUL
//! - Must not be `.` or `..`
//! - Must not start with `.` (hidden entries are reserved for attribute
//!   bundles on disk)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypeError};

/// Separator used by [`Name::parse`] and the `Display` impl.
pub const SEPARATOR: char = '/';

/// Characters that are forbidden anywhere in a segment.
const FORBIDDEN_CHARS: &[char] = &[SEPARATOR, '\0'];

/// Ordered sequence of path segments.
///
/// Serialized as its segment list; decoding validates every segment.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Name {
    segments: Vec<String>,
}

impl Name {
    /// The root name (no segments).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated name. Leading and trailing separators are
    /// ignored; the empty string is the root.
    ///
    /// ```
    /// use dirstore_types::Name;
    ///
    /// let name = Name::parse("/a/b/c").unwrap();
    /// assert_eq!(name.len(), 3);
    /// assert!(Name::parse("").unwrap().is_root());
    /// assert!(Name::parse("a//b").is_err());
    /// assert!(Name::parse("a/.hidden").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim_matches(SEPARATOR);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in trimmed.split(SEPARATOR) {
            validate_segment(segment).map_err(|reason| TypeError::InvalidName {
                name: s.to_string(),
                reason,
            })?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Build a name from already split segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut name = Self::root();
        for segment in segments {
            name = name.child(segment)?;
        }
        Ok(name)
    }

    /// Returns a new name with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self> {
        let segment = segment.into();
        validate_segment(&segment).map_err(|reason| TypeError::InvalidName {
            name: format!("{self}{SEPARATOR}{segment}"),
            reason,
        })?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// Concatenate `suffix` onto this name.
    pub fn join(&self, suffix: &Name) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(suffix.segments.iter().cloned());
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segment at position `index`, if any.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// Last segment, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent name, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(self.prefix(self.segments.len() - 1))
    }

    /// The first `k` segments (clamped to the name length).
    pub fn prefix(&self, k: usize) -> Self {
        let k = k.min(self.segments.len());
        Self {
            segments: self.segments[..k].to_vec(),
        }
    }

    /// Returns `true` if `prefix` is an ancestor of (or equal to) this name.
    pub fn starts_with(&self, prefix: &Name) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// This name relative to `prefix`, or `None` if `prefix` is not an
    /// ancestor.
    pub fn strip_prefix(&self, prefix: &Name) -> Option<Self> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(Self {
            segments: self.segments[prefix.segments.len()..].to_vec(),
        })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl TryFrom<Vec<String>> for Name {
    type Error = TypeError;

    fn try_from(segments: Vec<String>) -> Result<Self> {
        Self::from_segments(segments)
    }
}

impl From<Name> for Vec<String> {
    fn from(name: Name) -> Self {
        name.segments
    }
}

impl std::str::FromStr for Name {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn validate_segment(segment: &str) -> std::result::Result<(), String> {
    if segment.is_empty() {
        return Err("segments must not be empty".into());
    }
    for ch in FORBIDDEN_CHARS {
        if segment.contains(*ch) {
            return Err(format!("segment contains forbidden character: {ch:?}"));
        }
    }
    if segment.starts_with('.') {
        return Err(format!("hidden segments are not allowed: {segment:?}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_simple_and_nested() {
        let name = Name::parse("a/b/c").unwrap();
        assert_eq!(name.segments(), &["a", "b", "c"]);
        assert_eq!(name.to_string(), "a/b/c");
        assert_eq!(Name::parse("/a/b/c/").unwrap(), name);
        assert_ne!(Name::parse("/a/b/").unwrap(), name);
    }

    #[test]
    fn decoding_validates_segments() {
        let name: Name = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(name, Name::parse("a/b").unwrap());
        assert_eq!(serde_json::to_string(&name).unwrap(), r#"["a","b"]"#);

        assert!(serde_json::from_str::<Name>(r#"["a/b"]"#).is_err());
        assert!(serde_json::from_str::<Name>(r#"["a",".."]"#).is_err());
        assert!(serde_json::from_str::<Name>(r#"[".hidden"]"#).is_err());
        assert!(serde_json::from_str::<Name>(r#"[""]"#).is_err());
    }

    #[test]
    fn root_forms() {
        assert!(Name::parse("").unwrap().is_root());
        assert!(Name::parse("/").unwrap().is_root());
        assert_eq!(Name::root().to_string(), "");
        assert!(Name::root().parent().is_none());
        assert!(Name::root().last().is_none());
    }

    #[test]
    fn reject_empty_segment() {
        assert!(Name::parse("a//b").is_err());
    }

    #[test]
    fn reject_hidden_and_dot_segments() {
        assert!(Name::parse(".a").is_err());
        assert!(Name::parse("a/..").is_err());
        assert!(Name::parse("a/.").is_err());
        assert!(Name::root().child(".attrs").is_err());
    }

    #[test]
    fn reject_nul() {
        assert!(Name::parse("a\0b").is_err());
        assert!(Name::root().child("x/y").is_err());
    }

    #[test]
    fn parent_prefix_and_last() {
        let name = Name::parse("a/b/c").unwrap();
        assert_eq!(name.parent().unwrap(), Name::parse("a/b").unwrap());
        assert_eq!(name.prefix(1), Name::parse("a").unwrap());
        assert_eq!(name.prefix(10), name);
        assert_eq!(name.last(), Some("c"));
        assert_eq!(name.get(1), Some("b"));
    }

    #[test]
    fn strip_prefix_gives_relative_name() {
        let name = Name::parse("a/b/c").unwrap();
        let a = Name::parse("a").unwrap();
        assert_eq!(name.strip_prefix(&a).unwrap().to_string(), "b/c");
        assert!(name.strip_prefix(&Name::parse("x").unwrap()).is_none());
        assert_eq!(name.strip_prefix(&Name::root()).unwrap(), name);
        assert!(name.strip_prefix(&name).unwrap().is_root());
    }

    #[test]
    fn starts_with_is_segment_wise() {
        let name = Name::parse("ab/c").unwrap();
        assert!(!name.starts_with(&Name::parse("a").unwrap()));
        assert!(name.starts_with(&Name::parse("ab").unwrap()));
    }

    #[test]
    fn child_and_join() {
        let a = Name::parse("a").unwrap();
        let ab = a.child("b").unwrap();
        assert_eq!(ab.to_string(), "a/b");
        assert_eq!(a.join(&Name::parse("x/y").unwrap()).to_string(), "a/x/y");
        assert_eq!(Name::from_segments(["a", "b"]).unwrap(), ab);
    }

    proptest! {
        #[test]
        fn display_then_parse_is_identity(segs in proptest::collection::vec("[a-z0-9_-]{1,8}", 0..6)) {
            let name = Name::from_segments(segs.clone()).unwrap();
            let reparsed = Name::parse(&name.to_string()).unwrap();
            prop_assert_eq!(reparsed.segments(), segs.as_slice());
        }
    }
}
