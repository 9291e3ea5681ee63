//! Module for the registry of record decoders
//!
//! A decoder takes over reading a JSON value at the path it is registered for and turns it
//! into a record. See [`DecoderRegistry`] for the exact dispatch rules.

use std::{collections::HashMap, error::Error, fmt::Debug};

use struson::reader::JsonReader;

use crate::state::StateVars;

/// Error returned by a decoder
pub type DecoderError = Box<dyn Error + Send + Sync>;

/// A decoder which reads one record from a JSON reader
///
/// The decoder is called with the JSON reader positioned in front of a JSON value and must
/// consume exactly that one value, including all nested values if it is a JSON array or object.
/// It may look up values in the [`StateVars`] to enrich the record.
///
/// The decoder may borrow data for the lifetime `'a`.
pub type Decoder<'a, J, T> = Box<dyn FnMut(&mut J, &StateVars) -> Result<T, DecoderError> + 'a>;

/// Decoders keyed by the rendered path they are registered for
///
/// When the iteration engine is positioned in front of a value whose path is registered,
/// it hands control to the decoder:
///
/// - If the value is a JSON array the engine consumes the `[` itself and then calls the
///   decoder once for every item of the array, each call consuming exactly one item.
///   For an empty array the decoder is not called at all.
/// - Otherwise the decoder is called once and consumes the complete value.
///
/// Each successful call produces one record.
pub struct DecoderRegistry<'a, J: JsonReader, T> {
    decoders: HashMap<String, Decoder<'a, J, T>>,
}

impl<'a, J: JsonReader, T> DecoderRegistry<'a, J, T> {
    /// Creates an empty registry
    pub fn new() -> Self {
        DecoderRegistry {
            decoders: HashMap::new(),
        }
    }

    /// Registers a decoder for `path`
    ///
    /// A decoder previously registered for the same path is replaced; in that case `true`
    /// is returned.
    pub fn register<F>(&mut self, path: impl Into<String>, decoder: F) -> bool
    where
        F: FnMut(&mut J, &StateVars) -> Result<T, DecoderError> + 'a,
    {
        self.decoders
            .insert(path.into(), Box::new(decoder))
            .is_some()
    }

    /// Whether a decoder is registered for `path`
    pub fn contains(&self, path: &str) -> bool {
        self.decoders.contains_key(path)
    }

    /// Gets the decoder registered for `path`
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Decoder<'a, J, T>> {
        self.decoders.get_mut(path)
    }

    /// Number of registered decoders
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Whether no decoders are registered
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Iterates over the registered paths, in unspecified order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.decoders.keys().map(String::as_str)
    }
}

impl<J: JsonReader, T> Default for DecoderRegistry<'_, J, T> {
    fn default() -> Self {
        DecoderRegistry::new()
    }
}

impl<J: JsonReader, T> Debug for DecoderRegistry<'_, J, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Decoders are closures, only show the paths
        f.debug_set().entries(self.paths()).finish()
    }
}
