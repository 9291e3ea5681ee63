//! Module for the scoped state store
//!
//! While traversing a JSON document the iteration engine records every scalar value it
//! reads under the [rendered path](crate::path::PathStack::render) of that value. Decoders
//! can look up these *state variables* to enrich the records they create with values of
//! sibling or ancestor members, for example with the ID of the parent object.
//!
//! State variables are scoped to their enclosing JSON object or array: once that container
//! is closed, all of its state variables are removed again.

use std::{collections::HashMap, str::FromStr};

use crate::path::is_same_or_below;
use crate::token::ScalarValue;

/// Read-only view of the scalar values recorded within the currently open containers
///
/// # Examples
/// Consider the following JSON document:
/// ```json
/// {"trees": [{"id": "T1", "fruits": [{"name": "apple"}]}]}
/// ```
/// When a decoder registered at `{.trees.[.{.fruits` is invoked, the state variables contain
/// `"T1"` at the path `{.trees.[.{.id`. Once the object containing `"id"` has been closed the
/// value is not available anymore.
#[derive(Clone, Debug, Default)]
pub struct StateVars {
    values: HashMap<String, ScalarValue>,
}

impl StateVars {
    pub(crate) fn new() -> Self {
        StateVars::default()
    }

    /// Records `value` at `path`, replacing any value previously recorded there
    pub(crate) fn set(&mut self, path: &str, value: ScalarValue) {
        match self.values.get_mut(path) {
            Some(existing) => *existing = value,
            None => {
                self.values.insert(path.to_owned(), value);
            }
        }
    }

    /// Removes `path` and all paths below it, returning the number of removed values
    ///
    /// Only whole path segments are matched, see [`is_same_or_below`].
    pub(crate) fn evict_by_prefix(&mut self, path: &str) -> usize {
        let len_before = self.values.len();
        self.values.retain(|key, _| !is_same_or_below(key, path));
        len_before - self.values.len()
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }

    /// Gets the value recorded at `path`
    pub fn get(&self, path: &str) -> Option<&ScalarValue> {
        self.values.get(path)
    }

    /// Gets the value at `path` if it is a JSON string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(ScalarValue::as_str)
    }

    /// Gets the value at `path` if it is a JSON boolean
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(ScalarValue::as_bool)
    }

    /// Gets and parses the value at `path` if it is a JSON number
    ///
    /// The result is `None` if there is no value or if the value is not a number;
    /// otherwise it is the result of parsing the number.
    ///
    /// # Examples
    /// ```
    /// # use json_records::iterator::RecordIterator;
    /// # use json_records::state::StateVars;
    /// # use struson::reader::*;
    /// let json = r#"{"level": 3, "value": "x"}"#;
    /// let mut iterator = RecordIterator::from_reader(json.as_bytes());
    /// iterator.register("{.value", |json_reader: &mut JsonStreamReader<&[u8]>, state: &StateVars| {
    ///     let level: u32 = state.get_number("{.level").ok_or("missing level")??;
    ///     Ok((json_reader.next_string()?, level))
    /// })?;
    ///
    /// assert_eq!(Some(("x".to_owned(), 3)), iterator.next_record());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn get_number<T: FromStr>(&self, path: &str) -> Option<Result<T, T::Err>> {
        self.get(path).and_then(ScalarValue::as_number)
    }

    /// Whether a value is recorded at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    /// Number of recorded values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no values are recorded
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over all recorded paths and values, in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.values.iter().map(|(path, value)| (path.as_str(), value))
    }
}
