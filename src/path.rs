//! Module for tracking the traversal position in a JSON document
//!
//! The position is represented by a [`PathStack`] of [`PathSegment`] elements. Its rendered
//! form, the *path string*, is the key under which decoders are registered and under which
//! scalar values are recorded in the [state store](crate::state::StateVars).
//!
//! Segments are joined by `.`; JSON objects are rendered as `{`, JSON arrays as `[` and
//! member names as their text. For example in the JSON document
//! ```json
//! {"trees": [{"id": "T1"}]}
//! ```
//! the value `"T1"` is located at the path `{.trees.[.{.id`. The path of the top-level
//! value is the empty string.

use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Separator between the segments of a rendered path
pub const PATH_SEPARATOR: char = '.';

/// Kind of a JSON container value
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum ContainerKind {
    /// JSON object: `{ ... }`
    Object,
    /// JSON array: `[ ... ]`
    Array,
}

impl ContainerKind {
    /// Gets the marker which represents this container kind in a rendered path
    pub fn marker(self) -> &'static str {
        match self {
            ContainerKind::Object => "{",
            ContainerKind::Array => "[",
        }
    }
}

/// A segment of a [`PathStack`]
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum PathSegment {
    /// A JSON object or array which has been started but not ended yet
    Container(ContainerKind),
    /// Name of a JSON object member whose value has not been fully consumed yet
    FieldName(String),
}

impl PathSegment {
    /// Text of this segment within a rendered path
    pub fn as_str(&self) -> &str {
        match self {
            PathSegment::Container(kind) => kind.marker(),
            PathSegment::FieldName(name) => name,
        }
    }

    /// Whether this segment is a member name waiting for its value
    pub fn is_field_name(&self) -> bool {
        matches!(self, PathSegment::FieldName(_))
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when trying to access the top of an empty [`PathStack`]
///
/// For the iteration engine this indicates that its internal state became inconsistent
/// with the structure of the JSON document.
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[error("path stack is empty")]
pub struct EmptyStackError;

/// Stack of path segments describing the current traversal position
///
/// The rendered path is maintained incrementally on every [`push`](Self::push) and
/// [`pop`](Self::pop), so [`render`](Self::render) does not allocate.
///
/// # Examples
/// ```
/// # use json_records::path::*;
/// let mut stack = PathStack::new();
/// stack.push(PathSegment::Container(ContainerKind::Object));
/// stack.push(PathSegment::FieldName("trees".to_owned()));
/// stack.push(PathSegment::Container(ContainerKind::Array));
/// assert_eq!("{.trees.[", stack.render());
///
/// stack.pop()?;
/// assert_eq!("{.trees", stack.render());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct PathStack {
    segments: Vec<PathSegment>,
    /// Length of `rendered` before each segment was appended
    rendered_lengths: Vec<usize>,
    rendered: String,
    container_depth: usize,
}

impl PathStack {
    /// Creates an empty stack, representing the position in front of the top-level value
    pub fn new() -> Self {
        PathStack::default()
    }

    /// Pushes a segment on top of the stack
    pub fn push(&mut self, segment: PathSegment) {
        self.rendered_lengths.push(self.rendered.len());
        if !self.segments.is_empty() {
            self.rendered.push(PATH_SEPARATOR);
        }
        self.rendered.push_str(segment.as_str());

        if let PathSegment::Container(_) = segment {
            self.container_depth += 1;
        }
        self.segments.push(segment);
    }

    /// Removes and returns the top segment
    pub fn pop(&mut self) -> Result<PathSegment, EmptyStackError> {
        let segment = self.segments.pop().ok_or(EmptyStackError)?;
        // Lengths are pushed together with segments
        if let Some(len) = self.rendered_lengths.pop() {
            self.rendered.truncate(len);
        }
        if let PathSegment::Container(_) = segment {
            self.container_depth -= 1;
        }
        Ok(segment)
    }

    /// Returns the top segment without removing it
    pub fn peek(&self) -> Result<&PathSegment, EmptyStackError> {
        self.segments.last().ok_or(EmptyStackError)
    }

    /// Whether the stack has no segments, that is the position is at the top-level
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Number of [`PathSegment::Container`] segments, that is the current nesting depth
    pub fn container_depth(&self) -> usize {
        self.container_depth
    }

    /// Gets the rendered path of the current position
    pub fn render(&self) -> &str {
        &self.rendered
    }

}

impl FromIterator<PathSegment> for PathStack {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        let mut stack = PathStack::new();
        for segment in iter {
            stack.push(segment);
        }
        stack
    }
}

impl Display for PathStack {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Checks whether `path` is `prefix` itself or is located below `prefix`
///
/// Unlike [`str::starts_with`] this only matches at segment boundaries, so the path `ab.x`
/// is not considered to be below `a`. Every path is below the root path `""`.
pub fn is_same_or_below(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        None => false,
        Some(rest) => rest.is_empty() || rest.starts_with(PATH_SEPARATOR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(name: &str) -> PathSegment {
        PathSegment::FieldName(name.to_owned())
    }

    const OBJECT: PathSegment = PathSegment::Container(ContainerKind::Object);
    const ARRAY: PathSegment = PathSegment::Container(ContainerKind::Array);

    #[test]
    fn render() {
        let mut stack = PathStack::new();
        assert_eq!("", stack.render());
        assert!(stack.is_empty());

        stack.push(OBJECT);
        assert_eq!("{", stack.render());
        stack.push(name("trees"));
        stack.push(ARRAY);
        stack.push(OBJECT);
        stack.push(name("fruits"));
        assert_eq!("{.trees.[.{.fruits", stack.render());
        assert_eq!("{.trees.[.{.fruits", stack.to_string());
        assert_eq!(5, stack.len());
        assert_eq!(3, stack.container_depth());
    }

    #[test]
    fn pop_restores_render() -> Result<(), EmptyStackError> {
        let mut stack: PathStack = [OBJECT, name("a"), OBJECT, name("level")]
            .into_iter()
            .collect();
        assert_eq!("{.a.{.level", stack.render());

        assert_eq!(name("level"), stack.pop()?);
        assert_eq!("{.a.{", stack.render());
        assert_eq!(OBJECT, stack.pop()?);
        assert_eq!(1, stack.container_depth());
        assert_eq!(&name("a"), stack.peek()?);
        assert_eq!(name("a"), stack.pop()?);
        assert_eq!(OBJECT, stack.pop()?);
        assert_eq!("", stack.render());
        assert_eq!(0, stack.container_depth());
        Ok(())
    }

    #[test]
    fn empty_stack() {
        let mut stack = PathStack::new();
        assert_eq!(Err(EmptyStackError), stack.pop());
        assert_eq!(Err(EmptyStackError), stack.peek());

        stack.push(ARRAY);
        assert_eq!(Ok(ARRAY), stack.pop());
        assert!(stack.is_empty());
        assert_eq!(Err(EmptyStackError), stack.pop());
        assert_eq!("", stack.render());
    }

    #[test]
    fn empty_field_name() {
        let stack: PathStack = [OBJECT, name(""), ARRAY].into_iter().collect();
        assert_eq!("{..[", stack.render());
    }

    #[test]
    fn same_or_below() {
        assert!(is_same_or_below("a", "a"));
        assert!(is_same_or_below("a.x", "a"));
        assert!(is_same_or_below("{.a.{.b", "{.a.{"));
        assert!(is_same_or_below("anything", ""));
        assert!(is_same_or_below("", ""));

        assert!(!is_same_or_below("ab.x", "a"));
        assert!(!is_same_or_below("ab", "a"));
        assert!(!is_same_or_below("a", "a.x"));
        assert!(!is_same_or_below("", "a"));
    }
}
