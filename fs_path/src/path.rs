//! Path parsing
//!
//! This module splits path strings into validated components.

use std::fmt;

use thiserror::Error;

/// Maximum length of a single path component
pub const NAME_MAX: usize = 14;

/// Errors that can occur during path parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// Path is empty or malformed
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A component exceeds the maximum name length
    #[error("name too long: {0}")]
    InvalidName(String),
}

/// A single path component
///
/// Holds one name of at most `NAME_MAX` bytes; the bound is enforced at
/// construction, before any directory is consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathComponent(String);

impl PathComponent {
    /// Creates a component, validating the name length
    pub fn new(name: &str) -> Result<Self, PathError> {
        if name.is_empty() {
            return Err(PathError::InvalidPath("empty component".to_string()));
        }
        if name.len() > NAME_MAX {
            return Err(PathError::InvalidName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// The component name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the component, returning the owned name
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered sequence of path components, root-to-leaf
///
/// The sequence is empty only for paths that name the starting directory
/// itself (for example a bare run of separators).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    components: Vec<PathComponent>,
}

impl ParsedPath {
    /// Splits a path into components
    ///
    /// Empty segments (repeated separators, leading or trailing
    /// separators) are skipped. An empty input string is invalid. A
    /// segment longer than `NAME_MAX` fails the whole parse; components
    /// collected so far are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use fs_path::ParsedPath;
    ///
    /// let parsed = ParsedPath::parse("docs/notes/todo.txt").unwrap();
    /// assert_eq!(parsed.len(), 3);
    ///
    /// let parsed = ParsedPath::parse("todo.txt").unwrap();
    /// assert_eq!(parsed.len(), 1);
    /// ```
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::InvalidPath("empty path".to_string()));
        }

        let mut components = Vec::new();
        for segment in path.split('/') {
            if segment.is_empty() {
                continue;
            }
            components.push(PathComponent::new(segment)?);
        }

        Ok(Self { components })
    }

    /// Removes and returns the final component, transferring ownership
    /// to the caller
    pub fn pop_leaf(&mut self) -> Option<PathComponent> {
        self.components.pop()
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True if the sequence holds no components
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterates the components in root-to-leaf order
    pub fn iter(&self) -> impl Iterator<Item = &PathComponent> {
        self.components.iter()
    }
}

impl IntoIterator for ParsedPath {
    type Item = PathComponent;
    type IntoIter = std::vec::IntoIter<PathComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(parsed: &ParsedPath) -> Vec<&str> {
        parsed.iter().map(|c| c.as_str()).collect()
    }

    #[test]
    fn test_parse_simple_path() {
        let parsed = ParsedPath::parse("todo.txt").unwrap();
        assert_eq!(names(&parsed), vec!["todo.txt"]);
    }

    #[test]
    fn test_parse_nested_path() {
        let parsed = ParsedPath::parse("docs/notes/todo.txt").unwrap();
        assert_eq!(names(&parsed), vec!["docs", "notes", "todo.txt"]);
    }

    #[test]
    fn test_parse_leading_slash() {
        let parsed = ParsedPath::parse("/docs/notes.txt").unwrap();
        assert_eq!(names(&parsed), vec!["docs", "notes.txt"]);
    }

    #[test]
    fn test_parse_trailing_slash() {
        let parsed = ParsedPath::parse("docs/").unwrap();
        assert_eq!(names(&parsed), vec!["docs"]);
    }

    #[test]
    fn test_parse_repeated_separators() {
        let parsed = ParsedPath::parse("docs//notes.txt").unwrap();
        assert_eq!(names(&parsed), vec!["docs", "notes.txt"]);
    }

    #[test]
    fn test_empty_path() {
        let result = ParsedPath::parse("");
        assert!(matches!(result, Err(PathError::InvalidPath(_))));
    }

    #[test]
    fn test_only_slashes_is_empty_sequence() {
        let parsed = ParsedPath::parse("///").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_name_at_maximum_length() {
        let name = "a".repeat(NAME_MAX);
        let parsed = ParsedPath::parse(&name).unwrap();
        assert_eq!(names(&parsed), vec![name.as_str()]);
    }

    #[test]
    fn test_name_too_long() {
        let name = "a".repeat(NAME_MAX + 1);
        let result = ParsedPath::parse(&name);
        assert_eq!(result, Err(PathError::InvalidName(name)));
    }

    #[test]
    fn test_long_name_fails_whole_parse() {
        let path = format!("ok/{}/alsook", "b".repeat(NAME_MAX + 1));
        let result = ParsedPath::parse(&path);
        assert!(matches!(result, Err(PathError::InvalidName(_))));
    }

    #[test]
    fn test_dot_components_are_literal() {
        let parsed = ParsedPath::parse("a/./../b").unwrap();
        assert_eq!(names(&parsed), vec!["a", ".", "..", "b"]);
    }

    #[test]
    fn test_pop_leaf_transfers_ownership() {
        let mut parsed = ParsedPath::parse("a/b/c").unwrap();
        let leaf = parsed.pop_leaf().unwrap();
        assert_eq!(leaf.as_str(), "c");
        assert_eq!(names(&parsed), vec!["a", "b"]);
    }

    #[test]
    fn test_pop_leaf_on_empty() {
        let mut parsed = ParsedPath::parse("/").unwrap();
        assert!(parsed.pop_leaf().is_none());
    }

    #[test]
    fn test_component_rejects_empty_name() {
        assert!(matches!(
            PathComponent::new(""),
            Err(PathError::InvalidPath(_))
        ));
    }
}
