//! Module for iterating over the records of a JSON document
//!
//! [`RecordIterator`] is the main entrypoint of this crate. Decoders are registered for
//! the paths at which records are located, then the records are pulled one by one with
//! [`has_next`](RecordIterator::has_next) and [`next_record`](RecordIterator::next_record),
//! or by using the iterator as [`Iterator`].

use std::{
    fmt::{Debug, Formatter},
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use log::debug;
use struson::reader::{JsonReader, JsonStreamReader, ReaderError, ReaderSettings};
use thiserror::Error;

use crate::{
    path::{ContainerKind, PathSegment},
    registry::DecoderError,
    state::StateVars,
};

mod engine;
use engine::Engine;

type IoError = std::io::Error;

/// Settings to customize the record iterator behavior
///
/// These settings are used by [`RecordIterator::new_custom`] and the other `_custom`
/// constructors. To avoid repeating the default values for unchanged settings
/// `..Default::default()` can be used:
/// ```
/// # use json_records::iterator::IteratorSettings;
/// IteratorSettings {
///     max_nesting_depth: None,
///     // For all other settings use the default
///     ..Default::default()
/// }
/// # ;
/// ```
#[derive(Clone, Debug)]
pub struct IteratorSettings {
    /// Settings for the JSON reader
    ///
    /// These settings are used when the record iterator creates the JSON reader itself, for
    /// example with [`RecordIterator::open`]. When a JSON reader is provided by the user with
    /// [`RecordIterator::new_custom`], it should have been created with the same settings.
    ///
    /// If [`allow_multiple_top_level`](ReaderSettings::allow_multiple_top_level) is enabled,
    /// the iterator continues with the next top-level value after the previous one has been
    /// traversed, for example for [JSON Lines](https://jsonlines.org/) data. The state variables
    /// are cleared between top-level values.
    ///
    /// # Panics
    /// If `allow_multiple_top_level` is enabled here but not for a JSON reader provided by
    /// the user, iteration panics after the first top-level value, see
    /// [`RecordIterator::new_custom`].
    pub reader_settings: ReaderSettings,

    /// Maximum number of nested JSON arrays and objects the iterator traverses
    ///
    /// This only limits the nesting traversed by the iterator itself; values consumed by
    /// decoders are not affected. When the limit is exceeded a
    /// [`IteratorError::MaxNestingDepthExceeded`] is returned. `None` disables the limit.
    pub max_nesting_depth: Option<u32>,

    /// Whether to record scalar values as [state variables](StateVars)
    ///
    /// If decoders do not need any state variables, disabling this avoids storing them.
    pub track_state: bool,
}

impl Default for IteratorSettings {
    /// Creates the default record iterator settings
    ///
    /// - reader settings: [default](ReaderSettings::default)
    /// - max nesting depth: 128
    /// - track state: enabled
    fn default() -> Self {
        IteratorSettings {
            reader_settings: ReaderSettings::default(),
            max_nesting_depth: Some(128),
            track_state: true,
        }
    }
}

/// Describes why the JSON document structure is inconsistent with the iterator state
#[derive(PartialEq, Eq, Clone, strum::Display, Debug)]
pub enum StructureErrorKind {
    /// A segment had to be removed from the path stack but it was empty
    EmptyStack,
    /// A JSON array or object was ended but the path stack top is a different segment
    MismatchedContainerEnd {
        /// Kind of the container which was ended
        expected: ContainerKind,
        /// The segment at the top of the path stack
        actual: PathSegment,
    },
    /// The next token cannot occur at the current position of the path stack
    MisplacedToken {
        /// Describes the token and the position
        message: String,
    },
    /// A decoder was expected to be registered for a path, but there is none
    MissingDecoder {
        /// Path of the decoder
        path: String,
    },
}

/// Error which occurred while iterating over records
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum IteratorError {
    /// The JSON file could not be opened
    #[error("error opening file '{path}': {error}")]
    Open {
        /// Path of the file
        path: PathBuf,
        /// The IO error which occurred
        error: IoError,
    },
    /// The JSON reader reported an error, for example malformed JSON or an IO error
    #[error("error reading {source_name}: {error}")]
    Reader {
        /// Describes the JSON data source, for example the file path
        source_name: String,
        /// The error reported by the JSON reader
        error: ReaderError,
    },
    /// A decoder returned an error
    #[error("decoder at '{path}' failed: {error}")]
    Decoder {
        /// Path for which the decoder is registered
        path: String,
        /// The error returned by the decoder
        error: DecoderError,
    },
    /// The structure of the JSON document was inconsistent with the state of the iterator
    #[error("inconsistent JSON structure {kind} at '{path}'")]
    Structure {
        /// Describes the inconsistency
        kind: StructureErrorKind,
        /// Path at which the inconsistency was detected
        path: String,
    },
    /// The [maximum nesting depth](IteratorSettings::max_nesting_depth) was exceeded
    #[error("maximum nesting depth {max_depth} exceeded at '{path}'")]
    MaxNestingDepthExceeded {
        /// The maximum nesting depth
        max_depth: u32,
        /// Path of the container which exceeded the depth
        path: String,
    },
    /// A decoder was registered after iteration had already started
    #[error("cannot register decoder for '{path}' after iteration has started")]
    RegisteredAfterStart {
        /// Path of the rejected decoder
        path: String,
    },
}

type Opener<'a, J> = Box<dyn FnOnce() -> Result<J, IteratorError> + 'a>;

/// Lifecycle of the underlying JSON reader
enum Source<'a, J> {
    /// Iteration has not started yet
    Unopened(Opener<'a, J>),
    Open(J),
    /// The reader was exhausted, failed or was closed explicitly; it has been dropped
    Closed,
}

/// One-record lookahead
enum Buffer<T> {
    /// No record has been requested yet
    Unfilled,
    Filled(T),
    /// There are no more records
    Exhausted,
}

/// Iterator over records nested inside a JSON document
///
/// Records are produced by decoders which are [registered](Self::register) for the path at
/// which the records are located. Everything else in the JSON document is traversed, but
/// only the scalar values are retained (as [state variables](StateVars)) until their enclosing
/// JSON array or object ends. See the [`path`](crate::path) module for the path syntax and
/// [`DecoderRegistry`](crate::registry::DecoderRegistry) for when exactly decoders are called.
///
/// The iterator reads the JSON document lazily: the underlying data source is opened on the
/// first call to [`has_next`](Self::has_next) or [`next_record`](Self::next_record), and
/// the next record is always decoded one step in advance. The data source is released once
/// there are no more records, when an error occurs, when [`close`](Self::close) is called or
/// when the iterator is dropped.
///
/// # Examples
/// ```
/// # use json_records::iterator::*;
/// # use json_records::state::StateVars;
/// # use struson::reader::*;
/// let json = r#"{"trees": [{"id": "T1", "fruits": [{"name": "apple"}, {"name": "pear"}]}]}"#;
///
/// let mut iterator = RecordIterator::from_reader(json.as_bytes());
/// iterator.register("{.trees.[.{.fruits", |json_reader: &mut JsonStreamReader<&[u8]>, state: &StateVars| {
///     let tree_id = state.get_str("{.trees.[.{.id").unwrap_or_default().to_owned();
///     json_reader.begin_object()?;
///     assert_eq!("name", json_reader.next_name()?);
///     let name = json_reader.next_string()?;
///     json_reader.end_object()?;
///     Ok(format!("{tree_id}: {name}"))
/// })?;
///
/// let mut fruits = Vec::new();
/// while iterator.has_next() {
///     fruits.extend(iterator.next_record());
/// }
/// // Distinguishes a complete iteration from one which stopped due to an error
/// if let Some(e) = iterator.err() {
///     panic!("iteration failed: {e}");
/// }
/// assert_eq!(vec!["T1: apple", "T1: pear"], fruits);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Error handling
/// Errors do not cross the iteration methods: [`has_next`](Self::has_next) and
/// [`next_record`](Self::next_record) simply report that there are no more records, and the
/// error is kept until it is retrieved with [`take_err`](Self::take_err). After the iteration
/// ended, [`err`](Self::err) has to be checked to distinguish a complete iteration from a
/// failed one. When used as [`Iterator`] the error is yielded as last item instead.
///
/// All errors are terminal, iteration does not continue afterwards.
///
/// # Panics
/// Decoders must consume exactly one JSON value. If a decoder consumes less or more, the
/// JSON reader might panic due to incorrect usage when iteration continues, see the
/// documentation of [`JsonReader`].
pub struct RecordIterator<'a, J: JsonReader, T> {
    source: Source<'a, J>,
    engine: Engine<'a, J, T>,
    buffer: Buffer<T>,
    error: Option<IteratorError>,
    source_name: String,
    records_yielded: u64,
}

impl<'a, R: Read + 'a, T> RecordIterator<'a, JsonStreamReader<R>, T> {
    /// Creates a record iterator reading JSON data from `reader`, with
    /// [default settings](IteratorSettings::default)
    pub fn from_reader(reader: R) -> Self {
        RecordIterator::from_reader_custom(reader, IteratorSettings::default())
    }

    /// Creates a record iterator reading JSON data from `reader`, with custom settings
    ///
    /// The JSON reader is created with the [`reader_settings`](IteratorSettings::reader_settings)
    /// of `settings`.
    pub fn from_reader_custom(reader: R, settings: IteratorSettings) -> Self {
        let reader_settings = settings.reader_settings.clone();
        RecordIterator::with_opener(
            Box::new(move || Ok(JsonStreamReader::new_custom(reader, reader_settings))),
            settings,
            "JSON data".to_owned(),
        )
    }
}

impl<T> RecordIterator<'_, JsonStreamReader<BufReader<File>>, T> {
    /// Creates a record iterator for the JSON file at `path`, with
    /// [default settings](IteratorSettings::default)
    ///
    /// The file is only opened once iteration starts. If opening it fails, the
    /// error is reported as [`IteratorError::Open`].
    pub fn open(path: impl AsRef<Path>) -> Self {
        RecordIterator::open_custom(path, IteratorSettings::default())
    }

    /// Creates a record iterator for the JSON file at `path`, with custom settings
    pub fn open_custom(path: impl AsRef<Path>, settings: IteratorSettings) -> Self {
        let path = path.as_ref().to_path_buf();
        let source_name = format!("'{}'", path.display());
        let reader_settings = settings.reader_settings.clone();
        RecordIterator::with_opener(
            Box::new(move || match File::open(&path) {
                Ok(file) => Ok(JsonStreamReader::new_custom(
                    BufReader::new(file),
                    reader_settings,
                )),
                Err(error) => Err(IteratorError::Open { path, error }),
            }),
            settings,
            source_name,
        )
    }
}

impl<'a, J: JsonReader + 'a, T> RecordIterator<'a, J, T> {
    /// Creates a record iterator for an existing JSON reader, with
    /// [default settings](IteratorSettings::default)
    ///
    /// The JSON reader must be positioned at the start of the JSON document. Only its first
    /// top-level value is traversed; if the JSON reader was created with
    /// [`allow_multiple_top_level`](ReaderSettings::allow_multiple_top_level) enabled, any
    /// further top-level value is reported as trailing data. Use [`new_custom`](Self::new_custom)
    /// with matching settings to traverse all top-level values.
    pub fn new(json_reader: J) -> Self {
        RecordIterator::new_custom(json_reader, IteratorSettings::default())
    }

    /// Creates a record iterator for an existing JSON reader, with custom settings
    ///
    /// The [`reader_settings`](IteratorSettings::reader_settings) should match the settings
    /// the JSON reader was created with. In particular the iterator only continues after the
    /// first top-level value if [`allow_multiple_top_level`](ReaderSettings::allow_multiple_top_level)
    /// is enabled in `settings`.
    ///
    /// # Panics
    /// Iteration panics once the first top-level value has been traversed if
    /// `allow_multiple_top_level` is enabled in `settings` but not for the JSON reader,
    /// because the JSON reader panics on this incorrect usage.
    pub fn new_custom(json_reader: J, settings: IteratorSettings) -> Self {
        RecordIterator::with_opener(
            Box::new(move || Ok(json_reader)),
            settings,
            "JSON reader".to_owned(),
        )
    }
}

impl<'a, J: JsonReader, T> RecordIterator<'a, J, T> {
    fn with_opener(opener: Opener<'a, J>, settings: IteratorSettings, source_name: String) -> Self {
        RecordIterator {
            source: Source::Unopened(opener),
            engine: Engine::new(&settings, source_name.clone()),
            buffer: Buffer::Unfilled,
            error: None,
            source_name,
            records_yielded: 0,
        }
    }

    /// Sets the name which describes the JSON data source in errors and log messages
    ///
    /// # Examples
    /// ```
    /// # use json_records::iterator::*;
    /// # use json_records::state::StateVars;
    /// # use struson::reader::*;
    /// let mut iterator = RecordIterator::from_reader("[1, }".as_bytes())
    ///     .with_source_name("request body");
    /// iterator.register("", |json_reader: &mut JsonStreamReader<&[u8]>, _: &StateVars| {
    ///     Ok(json_reader.next_number_as_string()?)
    /// })?;
    ///
    /// let error = iterator.find_map(Result::err).unwrap();
    /// assert!(error.to_string().starts_with("error reading request body: "));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self.engine.set_source_name(self.source_name.clone());
        self
    }

    /// Registers a decoder for the records at `path`
    ///
    /// A decoder previously registered for the same path is replaced. Decoders can only be
    /// registered before iteration starts; afterwards [`IteratorError::RegisteredAfterStart`]
    /// is returned.
    pub fn register<F>(&mut self, path: impl Into<String>, decoder: F) -> Result<(), IteratorError>
    where
        F: FnMut(&mut J, &StateVars) -> Result<T, DecoderError> + 'a,
    {
        let path = path.into();
        if self.is_started() {
            return Err(IteratorError::RegisteredAfterStart { path });
        }

        debug!("registering decoder at '{path}'");
        if self.engine.registry_mut().register(path.clone(), decoder) {
            debug!("replaced previous decoder at '{path}'");
        }
        Ok(())
    }

    /// Whether iteration has started
    pub fn is_started(&self) -> bool {
        !matches!(self.buffer, Buffer::Unfilled)
    }

    /// Whether the underlying data source has been released
    ///
    /// This is the case once there are no more records, an error occurred or the
    /// iterator was [closed](Self::close).
    pub fn is_closed(&self) -> bool {
        matches!(self.source, Source::Closed)
    }

    /// Checks whether there is another record, without consuming it
    ///
    /// Starts iteration if it has not started yet. Calling this method multiple times
    /// without calling [`next_record`](Self::next_record) in between has no further effect.
    /// If `false` is returned, [`err`](Self::err) should be checked for an error.
    pub fn has_next(&mut self) -> bool {
        self.start();
        matches!(self.buffer, Buffer::Filled(_))
    }

    /// Takes the next record
    ///
    /// Starts iteration if it has not started yet, and afterwards already decodes the
    /// subsequent record. Returns `None` if there are no more records; in that case
    /// [`err`](Self::err) should be checked for an error.
    pub fn next_record(&mut self) -> Option<T> {
        self.start();
        match std::mem::replace(&mut self.buffer, Buffer::Exhausted) {
            Buffer::Filled(record) => {
                self.records_yielded += 1;
                self.fill();
                Some(record)
            }
            Buffer::Unfilled | Buffer::Exhausted => None,
        }
    }

    /// Gets the error which stopped iteration, if any
    ///
    /// The error remains available until it is taken with [`take_err`](Self::take_err).
    pub fn err(&self) -> Option<&IteratorError> {
        self.error.as_ref()
    }

    /// Takes the error which stopped iteration, if any
    pub fn take_err(&mut self) -> Option<IteratorError> {
        self.error.take()
    }

    /// Number of records returned so far
    pub fn records_yielded(&self) -> u64 {
        self.records_yielded
    }

    /// Stops iteration and releases the underlying data source
    ///
    /// A buffered record is discarded. Afterwards no more records are returned.
    /// Calling this method again has no effect.
    pub fn close(&mut self) {
        if !self.is_closed() {
            debug!("closing {}", self.source_name);
        }
        self.source = Source::Closed;
        self.buffer = Buffer::Exhausted;
    }

    fn start(&mut self) {
        if !matches!(self.buffer, Buffer::Unfilled) {
            return;
        }

        self.buffer = Buffer::Exhausted;
        match std::mem::replace(&mut self.source, Source::Closed) {
            Source::Unopened(opener) => match opener() {
                Ok(json_reader) => {
                    debug!("opened {}", self.source_name);
                    self.source = Source::Open(json_reader);
                    self.fill();
                }
                Err(e) => self.fail(e),
            },
            source => self.source = source,
        }
    }

    /// Decodes the next record into the buffer, or releases the source if there is none
    fn fill(&mut self) {
        let json_reader = match &mut self.source {
            Source::Open(json_reader) => json_reader,
            Source::Unopened(_) | Source::Closed => {
                self.buffer = Buffer::Exhausted;
                return;
            }
        };

        match self.engine.next_record(json_reader) {
            Ok(Some(record)) => self.buffer = Buffer::Filled(record),
            Ok(None) => {
                self.buffer = Buffer::Exhausted;
                if let Source::Open(json_reader) = std::mem::replace(&mut self.source, Source::Closed)
                {
                    match json_reader.consume_trailing_whitespace() {
                        Ok(()) => debug!("released {}", self.source_name),
                        Err(error) => self.fail(IteratorError::Reader {
                            source_name: self.source_name.clone(),
                            error,
                        }),
                    }
                }
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: IteratorError) {
        debug!("iteration over {} failed: {error}", self.source_name);
        self.error = Some(error);
        self.source = Source::Closed;
        self.buffer = Buffer::Exhausted;
    }
}

/// Yields the records, and in case iteration failed the error as last item
impl<J: JsonReader, T> Iterator for RecordIterator<'_, J, T> {
    type Item = Result<T, IteratorError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Some(record) => Some(Ok(record)),
            None => self.take_err().map(Err),
        }
    }
}

impl<J: JsonReader, T> Debug for RecordIterator<'_, J, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordIterator")
            .field("source_name", &self.source_name)
            .field("is_started", &self.is_started())
            .field("is_closed", &self.is_closed())
            .field("records_yielded", &self.records_yielded)
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};
    use struson::reader::{JsonSyntaxError, SyntaxErrorKind};

    type Reader = JsonStreamReader<&'static [u8]>;

    fn new_iterator(json: &'static str) -> RecordIterator<'static, Reader, String> {
        RecordIterator::from_reader(json.as_bytes())
    }

    fn read_string(json_reader: &mut Reader, _: &StateVars) -> Result<String, DecoderError> {
        Ok(json_reader.next_string()?)
    }

    #[test]
    fn lazy_start() -> Result<(), IteratorError> {
        let calls = Rc::new(Cell::new(0));
        let calls_in_decoder = Rc::clone(&calls);

        let mut iterator = new_iterator(r#"["a", "b"]"#);
        iterator.register("", move |json_reader: &mut Reader, _: &StateVars| {
            calls_in_decoder.set(calls_in_decoder.get() + 1);
            Ok(json_reader.next_string()?)
        })?;
        assert!(!iterator.is_started());
        assert_eq!(0, calls.get());

        assert!(iterator.has_next());
        assert!(iterator.is_started());
        assert_eq!(1, calls.get());
        // Repeated checks don't advance
        assert!(iterator.has_next());
        assert!(iterator.has_next());
        assert_eq!(1, calls.get());

        assert_eq!(Some("a".to_owned()), iterator.next_record());
        // Next record is decoded in advance
        assert_eq!(2, calls.get());
        assert_eq!(Some("b".to_owned()), iterator.next_record());
        assert!(iterator.is_closed());
        assert_eq!(None, iterator.next_record());
        assert_eq!(false, iterator.has_next());
        assert_eq!(2, calls.get());
        assert_eq!(2, iterator.records_yielded());
        assert!(iterator.err().is_none());
        Ok(())
    }

    #[test]
    fn next_record_without_has_next() {
        let mut iterator = new_iterator(r#"{"a": "x"}"#);
        iterator.register("{.a", read_string).unwrap();

        assert_eq!(Some("x".to_owned()), iterator.next_record());
        assert_eq!(None, iterator.next_record());
        assert!(iterator.err().is_none());
    }

    #[test]
    fn register_after_start() {
        let mut iterator = new_iterator("[]");
        assert_eq!(false, iterator.has_next());

        match iterator.register("", read_string) {
            Err(IteratorError::RegisteredAfterStart { path }) => assert_eq!("", path),
            r => panic!("unexpected result: {r:?}"),
        }
    }

    #[test]
    fn close_before_end() {
        let mut iterator = new_iterator(r#"["a", "b", "c"]"#);
        iterator.register("", read_string).unwrap();

        assert_eq!(Some("a".to_owned()), iterator.next_record());
        iterator.close();
        assert!(iterator.is_closed());
        assert_eq!(false, iterator.has_next());
        assert_eq!(None, iterator.next_record());
        assert!(iterator.err().is_none());
        // Closing again has no effect
        iterator.close();
    }

    #[test]
    fn close_before_start() {
        let mut iterator = new_iterator(r#"["a"]"#);
        iterator.register("", read_string).unwrap();
        iterator.close();

        assert_eq!(false, iterator.has_next());
        assert!(iterator.err().is_none());
    }

    #[test]
    fn trailing_data() {
        let mut iterator = new_iterator(r#"{"a": "x"} {"#);
        iterator.register("{.a", read_string).unwrap();

        // Trailing data is detected while looking ahead for the record after "x"
        assert_eq!(Some("x".to_owned()), iterator.next_record());
        assert_eq!(None, iterator.next_record());
        match iterator.take_err() {
            Some(IteratorError::Reader {
                error:
                    ReaderError::SyntaxError(JsonSyntaxError {
                        kind: SyntaxErrorKind::TrailingData,
                        ..
                    }),
                ..
            }) => {}
            r => panic!("unexpected error: {r:?}"),
        }
        assert!(iterator.err().is_none());
    }

    #[test]
    fn iterator_yields_error_once() {
        let mut iterator = new_iterator(r#"["a", 1, "c"]"#);
        iterator.register("", read_string).unwrap();

        assert_eq!("a", iterator.next().unwrap().unwrap());
        match iterator.next() {
            Some(Err(IteratorError::Decoder { path, .. })) => assert_eq!("", path),
            r => panic!("unexpected item: {r:?}"),
        }
        assert!(iterator.next().is_none());
        assert!(iterator.next().is_none());
    }

    #[test]
    fn debug_format() {
        let iterator = new_iterator("[]");
        assert_eq!(
            "RecordIterator { source_name: \"JSON data\", is_started: false, is_closed: false, records_yielded: 0, error: None }",
            format!("{iterator:?}")
        );
    }
}
