//! The traversal engine driving the [`RecordIterator`](super::RecordIterator)

use log::{debug, trace};
use struson::reader::{JsonReader, ReaderError};

use super::{IteratorError, IteratorSettings, StructureErrorKind};
use crate::{
    path::{ContainerKind, PathSegment, PathStack},
    registry::DecoderRegistry,
    state::StateVars,
    token::{classify, peek_lookahead, read_token, Token, TokenKind},
};

/// JSON array whose items are each handed to a decoder
#[derive(Debug)]
struct RecordArray {
    /// Path at which the array was encountered and the decoder is registered
    path: String,
    /// Stack length while positioned inside the array
    stack_len: usize,
}

/// Token-driven state machine which traverses a JSON document and dispatches
/// registered decoders
///
/// The engine does not own the JSON reader; it is passed to [`next_record`](Self::next_record)
/// so that the iterator can release the reader independently.
pub(crate) struct Engine<'a, J: JsonReader, T> {
    stack: PathStack,
    state: StateVars,
    registry: DecoderRegistry<'a, J, T>,
    record_array: Option<RecordArray>,
    /// Whether the current top-level value has been fully consumed
    top_level_consumed: bool,
    multiple_top_level: bool,
    max_nesting_depth: Option<u32>,
    track_state: bool,
    /// Describes the JSON data source in errors and log messages
    source_name: String,
}

impl<'a, J: JsonReader, T> Engine<'a, J, T> {
    pub(crate) fn new(settings: &IteratorSettings, source_name: String) -> Self {
        Engine {
            stack: PathStack::new(),
            state: StateVars::new(),
            registry: DecoderRegistry::new(),
            record_array: None,
            top_level_consumed: false,
            multiple_top_level: settings.reader_settings.allow_multiple_top_level,
            max_nesting_depth: settings.max_nesting_depth,
            track_state: settings.track_state,
            source_name,
        }
    }

    pub(crate) fn set_source_name(&mut self, source_name: String) {
        self.source_name = source_name;
    }

    pub(crate) fn registry_mut(&mut self) -> &mut DecoderRegistry<'a, J, T> {
        &mut self.registry
    }

    #[cfg(test)]
    pub(crate) fn stack(&self) -> &PathStack {
        &self.stack
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &StateVars {
        &self.state
    }

    /// Advances until the next record has been decoded
    ///
    /// Returns `None` once the document (or with multiple top-level values enabled, the last
    /// document) has been fully consumed. Trailing data is not checked here, the caller has to
    /// call [`JsonReader::consume_trailing_whitespace`] afterwards.
    pub(crate) fn next_record(&mut self, json_reader: &mut J) -> Result<Option<T>, IteratorError> {
        loop {
            if self.stack.is_empty() && self.top_level_consumed {
                let has_next = self.multiple_top_level
                    && json_reader.has_next().map_err(|e| self.reader_error(e))?;
                if !has_next {
                    debug!("finished traversing {}", self.source_name);
                    return Ok(None);
                }
                debug!("starting next top-level value of {}", self.source_name);
                self.top_level_consumed = false;
                self.state.clear();
            }

            if let Some(record) = self.step(json_reader)? {
                return Ok(Some(record));
            }
        }
    }

    /// Processes a single token, or dispatches a decoder
    fn step(&mut self, json_reader: &mut J) -> Result<Option<T>, IteratorError> {
        let top = self.stack.peek().ok();
        let lookahead = peek_lookahead(json_reader, top).map_err(|e| self.reader_error(e))?;
        let kind = classify(lookahead, top).map_err(|e| {
            self.structure_error(StructureErrorKind::MisplacedToken {
                message: e.to_string(),
            })
        })?;

        if kind.is_value_start() {
            let record_array_path = self
                .record_array
                .as_ref()
                .filter(|a| a.stack_len == self.stack.len())
                .map(|a| a.path.clone());
            if let Some(path) = record_array_path {
                return self.decode(json_reader, &path, true).map(Some);
            }

            if self.registry.contains(self.stack.render()) {
                let path = self.stack.render().to_owned();
                if kind != TokenKind::ArrayStart {
                    return self.decode(json_reader, &path, false).map(Some);
                }

                json_reader
                    .begin_array()
                    .map_err(|e| self.reader_error(e))?;
                self.push_container(ContainerKind::Array)?;
                debug!("decoding items of array at '{path}'");
                self.record_array = Some(RecordArray {
                    path,
                    stack_len: self.stack.len(),
                });
                return Ok(None);
            }
        }

        let token = read_token(json_reader, kind).map_err(|e| self.reader_error(e))?;
        trace!("{token:?} at '{}'", self.stack.render());
        match token {
            Token::ObjectStart => self.push_container(ContainerKind::Object)?,
            Token::ArrayStart => self.push_container(ContainerKind::Array)?,
            Token::ObjectEnd => self.close_container(ContainerKind::Object)?,
            Token::ArrayEnd => self.close_container(ContainerKind::Array)?,
            Token::Name(name) => self.stack.push(PathSegment::FieldName(name)),
            Token::Scalar(value) => {
                if self.track_state {
                    self.state.set(self.stack.render(), value);
                }
                self.value_consumed()?;
            }
        }
        Ok(None)
    }

    /// Lets the decoder registered at `path` consume the next value
    ///
    /// `is_array_item` indicates that the value is an item of a record array; the
    /// array stays open afterwards.
    fn decode(
        &mut self,
        json_reader: &mut J,
        path: &str,
        is_array_item: bool,
    ) -> Result<T, IteratorError> {
        let decoder = match self.registry.get_mut(path) {
            Some(decoder) => decoder,
            None => {
                return Err(self.structure_error(StructureErrorKind::MissingDecoder {
                    path: path.to_owned(),
                }))
            }
        };
        trace!("dispatching decoder at '{path}'");

        match decoder(json_reader, &self.state) {
            Ok(record) => {
                if !is_array_item {
                    self.value_consumed()?;
                }
                Ok(record)
            }
            Err(error) => Err(IteratorError::Decoder {
                path: path.to_owned(),
                error,
            }),
        }
    }

    fn push_container(&mut self, kind: ContainerKind) -> Result<(), IteratorError> {
        if let Some(max_depth) = self.max_nesting_depth {
            if self.stack.container_depth() >= max_depth as usize {
                return Err(IteratorError::MaxNestingDepthExceeded {
                    max_depth,
                    path: self.stack.render().to_owned(),
                });
            }
        }
        self.stack.push(PathSegment::Container(kind));
        Ok(())
    }

    fn close_container(&mut self, kind: ContainerKind) -> Result<(), IteratorError> {
        let closed_path = self.stack.render().to_owned();
        match self.stack.pop() {
            Ok(PathSegment::Container(actual)) if actual == kind => {}
            Ok(segment) => {
                return Err(self.structure_error(StructureErrorKind::MismatchedContainerEnd {
                    expected: kind,
                    actual: segment,
                }))
            }
            Err(_) => return Err(self.structure_error(StructureErrorKind::EmptyStack)),
        }

        if self
            .record_array
            .as_ref()
            .is_some_and(|a| a.stack_len == self.stack.len() + 1)
        {
            debug!("finished decoding items of array at '{closed_path}'");
            self.record_array = None;
        }

        let evicted = self.state.evict_by_prefix(&closed_path);
        if evicted > 0 {
            trace!("evicted {evicted} state variables under '{closed_path}'");
        }
        self.value_consumed()
    }

    /// Updates the stack after a complete value has been consumed
    ///
    /// For a member value the pending member name is popped; for the top-level value
    /// the end of the document is reached.
    fn value_consumed(&mut self) -> Result<(), IteratorError> {
        match self.stack.peek() {
            Ok(PathSegment::FieldName(_)) => {
                self.stack
                    .pop()
                    .map_err(|_| self.structure_error(StructureErrorKind::EmptyStack))?;
            }
            Ok(PathSegment::Container(_)) => {}
            Err(_) => self.top_level_consumed = true,
        }
        Ok(())
    }

    fn reader_error(&self, error: ReaderError) -> IteratorError {
        IteratorError::Reader {
            source_name: self.source_name.clone(),
            error,
        }
    }

    fn structure_error(&self, kind: StructureErrorKind) -> IteratorError {
        IteratorError::Structure {
            kind,
            path: self.stack.render().to_owned(),
        }
    }
}
