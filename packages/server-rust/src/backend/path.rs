//! Slash-separated addresses of configuration nodes.

use std::fmt;
use std::str::FromStr;

/// Absolute path of a node in the configuration tree, e.g.
/// `/services/loopback/device/rtr1/description`.
///
/// Paths order lexicographically by segment, so a node sorts directly before
/// all of its descendants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConfigPath {
    segments: Vec<String>,
}

impl ConfigPath {
    /// The configuration root (`/`).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a path. Leading, trailing and repeated slashes are ignored.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Returns a new path with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Appends every segment of a relative path string.
    #[must_use]
    pub fn join(&self, relative: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(
            relative
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether `self` equals `ancestor` or lies beneath it.
    #[must_use]
    pub fn starts_with(&self, ancestor: &ConfigPath) -> bool {
        self.segments.starts_with(&ancestor.segments)
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for ConfigPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_slashes() {
        let path = ConfigPath::parse("//services/loopback/");
        assert_eq!(path.segments(), ["services", "loopback"]);
        assert_eq!(path.to_string(), "/services/loopback");
    }

    #[test]
    fn root_displays_as_slash() {
        assert!(ConfigPath::root().segments().is_empty());
        assert_eq!(ConfigPath::root().to_string(), "/");
    }

    #[test]
    fn child_and_join_extend_path() {
        let services = ConfigPath::root().child("services");
        assert_eq!(services.join("loopback/device").to_string(), "/services/loopback/device");
        assert_eq!(services.child("x").to_string(), "/services/x");
    }

    #[test]
    fn prefix_checks_whole_segments() {
        let parent = ConfigPath::parse("/devices/device/rtr1");
        let child = ConfigPath::parse("/devices/device/rtr1/config");
        let sibling = ConfigPath::parse("/devices/device/rtr10");

        assert!(child.starts_with(&parent));
        assert!(parent.starts_with(&parent));
        assert!(!sibling.starts_with(&parent));
    }

    #[test]
    fn ordering_puts_parent_before_descendants() {
        let parent = ConfigPath::parse("/a/b");
        let child = ConfigPath::parse("/a/b/c");
        let next = ConfigPath::parse("/a/c");
        assert!(parent < child);
        assert!(child < next);
    }
}
