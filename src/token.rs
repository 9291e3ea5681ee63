//! Module for classifying and reading the tokens of a JSON document
//!
//! The iteration engine does not interpret raw JSON data itself; it drives a
//! [`JsonReader`]. Based on what the reader reports for the next position and on the top of
//! the [`PathStack`](crate::path::PathStack), the next token is first classified as a
//! [`TokenKind`] and afterwards consumed as [`Token`].
//!
//! Whether a JSON string is a member name or a value is never decided by the string itself,
//! only by its position: inside a JSON object where no member name is pending the next
//! string is a name, everywhere else it is a value.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use struson::reader::{JsonReader, ReaderError, ValueType};
use thiserror::Error;

use crate::path::{ContainerKind, PathSegment};

/// Type of a JSON scalar value
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum ScalarKind {
    /// JSON string value
    String,
    /// JSON number value
    Number,
    /// JSON boolean value
    Boolean,
    /// JSON `null`
    Null,
}

/// A JSON scalar value
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum ScalarValue {
    /// JSON string value
    String(String),
    /// JSON number value, in its exact string representation from the JSON document
    Number(String),
    /// JSON boolean value
    Boolean(bool),
    /// JSON `null`
    Null,
}

impl ScalarValue {
    /// Gets the kind of this value
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::String(_) => ScalarKind::String,
            ScalarValue::Number(_) => ScalarKind::Number,
            ScalarValue::Boolean(_) => ScalarKind::Boolean,
            ScalarValue::Null => ScalarKind::Null,
        }
    }

    /// Gets the string if this is a JSON string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Gets the boolean if this is a JSON boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Parses the number if this is a JSON number value
    ///
    /// The result is either the parsed number or the parse error. It might be necessary to
    /// explicitly specify the number type in case the Rust compiler cannot infer it.
    ///
    /// # Examples
    /// ```
    /// # use json_records::token::ScalarValue;
    /// let value = ScalarValue::Number("12".to_owned());
    /// assert_eq!(Some(Ok(12_u64)), value.as_number());
    /// ```
    pub fn as_number<T: FromStr>(&self) -> Option<Result<T, T::Err>> {
        match self {
            ScalarValue::Number(n) => Some(T::from_str(n)),
            _ => None,
        }
    }
}

/// Displays the value as JSON; strings are quoted but not escaped
impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::String(s) => write!(f, "\"{s}\""),
            ScalarValue::Number(n) => f.write_str(n),
            ScalarValue::Boolean(b) => write!(f, "{b}"),
            ScalarValue::Null => f.write_str("null"),
        }
    }
}

/// A consumed token of a JSON document
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Token {
    /// Start of a JSON object: `{`
    ObjectStart,
    /// End of a JSON object: `}`
    ObjectEnd,
    /// Start of a JSON array: `[`
    ArrayStart,
    /// End of a JSON array: `]`
    ArrayEnd,
    /// Name of a JSON object member
    Name(String),
    /// Scalar value
    Scalar(ScalarValue),
}

/// Classification of the next token, before it has been consumed
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum TokenKind {
    /// Start of a JSON object: `{`
    ObjectStart,
    /// End of a JSON object: `}`
    ObjectEnd,
    /// Start of a JSON array: `[`
    ArrayStart,
    /// End of a JSON array: `]`
    ArrayEnd,
    /// Name of a JSON object member
    Name,
    /// Scalar value
    Scalar(ScalarKind),
}

impl TokenKind {
    /// Whether this token starts a JSON value
    ///
    /// This is the case for the start of JSON objects and arrays, and for scalar values.
    pub fn is_value_start(self) -> bool {
        matches!(
            self,
            TokenKind::ObjectStart | TokenKind::ArrayStart | TokenKind::Scalar(_)
        )
    }
}

/// What the reader reported for its next position
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub(crate) enum Lookahead {
    /// A value of the given type follows
    Value(ValueType),
    /// The name of another member of the current JSON object follows
    Member,
    /// The current JSON object or array has no more elements
    ContainerEnd,
}

/// The stack top did not match the token reported by the reader
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("reader reported {lookahead:?} but path stack top is {top:?}")]
pub(crate) struct Misplaced {
    pub(crate) lookahead: Lookahead,
    pub(crate) top: Option<PathSegment>,
}

/// Classifies the next token
///
/// This does not interact with the reader; `lookahead` has to be obtained before,
/// see [`peek_lookahead`].
pub(crate) fn classify(
    lookahead: Lookahead,
    top: Option<&PathSegment>,
) -> Result<TokenKind, Misplaced> {
    let misplaced = || Misplaced {
        lookahead,
        top: top.cloned(),
    };

    match lookahead {
        Lookahead::Value(value_type) => Ok(match value_type {
            ValueType::Object => TokenKind::ObjectStart,
            ValueType::Array => TokenKind::ArrayStart,
            ValueType::String => TokenKind::Scalar(ScalarKind::String),
            ValueType::Number => TokenKind::Scalar(ScalarKind::Number),
            ValueType::Boolean => TokenKind::Scalar(ScalarKind::Boolean),
            ValueType::Null => TokenKind::Scalar(ScalarKind::Null),
        }),
        Lookahead::Member => match top {
            Some(PathSegment::Container(ContainerKind::Object)) => Ok(TokenKind::Name),
            _ => Err(misplaced()),
        },
        Lookahead::ContainerEnd => match top {
            Some(PathSegment::Container(ContainerKind::Object)) => Ok(TokenKind::ObjectEnd),
            Some(PathSegment::Container(ContainerKind::Array)) => Ok(TokenKind::ArrayEnd),
            _ => Err(misplaced()),
        },
    }
}

/// Asks the reader what follows at the current position, without consuming anything
///
/// Must not be called when the top-level value has already been consumed.
pub(crate) fn peek_lookahead<J: JsonReader>(
    json_reader: &mut J,
    top: Option<&PathSegment>,
) -> Result<Lookahead, ReaderError> {
    Ok(match top {
        Some(PathSegment::Container(kind)) => {
            if !json_reader.has_next()? {
                Lookahead::ContainerEnd
            } else if *kind == ContainerKind::Object {
                Lookahead::Member
            } else {
                Lookahead::Value(json_reader.peek()?)
            }
        }
        // Member value or top-level value
        Some(PathSegment::FieldName(_)) | None => Lookahead::Value(json_reader.peek()?),
    })
}

/// Consumes the next token, which must have been classified as `kind`
pub(crate) fn read_token<J: JsonReader>(
    json_reader: &mut J,
    kind: TokenKind,
) -> Result<Token, ReaderError> {
    Ok(match kind {
        TokenKind::ObjectStart => {
            json_reader.begin_object()?;
            Token::ObjectStart
        }
        TokenKind::ObjectEnd => {
            json_reader.end_object()?;
            Token::ObjectEnd
        }
        TokenKind::ArrayStart => {
            json_reader.begin_array()?;
            Token::ArrayStart
        }
        TokenKind::ArrayEnd => {
            json_reader.end_array()?;
            Token::ArrayEnd
        }
        TokenKind::Name => Token::Name(json_reader.next_name_owned()?),
        TokenKind::Scalar(scalar_kind) => Token::Scalar(match scalar_kind {
            ScalarKind::String => ScalarValue::String(json_reader.next_string()?),
            ScalarKind::Number => ScalarValue::Number(json_reader.next_number_as_string()?),
            ScalarKind::Boolean => ScalarValue::Boolean(json_reader.next_bool()?),
            ScalarKind::Null => {
                json_reader.next_null()?;
                ScalarValue::Null
            }
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use struson::reader::JsonStreamReader;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn new_reader(json: &str) -> JsonStreamReader<&[u8]> {
        JsonStreamReader::new(json.as_bytes())
    }

    const OBJECT: PathSegment = PathSegment::Container(ContainerKind::Object);
    const ARRAY: PathSegment = PathSegment::Container(ContainerKind::Array);

    #[test]
    fn classify_values() {
        let name = PathSegment::FieldName("a".to_owned());
        for top in [None, Some(&name), Some(&ARRAY), Some(&OBJECT)] {
            assert_eq!(
                Ok(TokenKind::ObjectStart),
                classify(Lookahead::Value(ValueType::Object), top)
            );
            assert_eq!(
                Ok(TokenKind::ArrayStart),
                classify(Lookahead::Value(ValueType::Array), top)
            );
            assert_eq!(
                Ok(TokenKind::Scalar(ScalarKind::Number)),
                classify(Lookahead::Value(ValueType::Number), top)
            );
        }
    }

    #[test]
    fn classify_name_and_end() {
        assert_eq!(Ok(TokenKind::Name), classify(Lookahead::Member, Some(&OBJECT)));
        assert_eq!(
            Ok(TokenKind::ObjectEnd),
            classify(Lookahead::ContainerEnd, Some(&OBJECT))
        );
        assert_eq!(
            Ok(TokenKind::ArrayEnd),
            classify(Lookahead::ContainerEnd, Some(&ARRAY))
        );
    }

    #[test]
    fn classify_misplaced() {
        let name = PathSegment::FieldName("a".to_owned());
        assert_eq!(
            Err(Misplaced {
                lookahead: Lookahead::ContainerEnd,
                top: Some(name.clone()),
            }),
            classify(Lookahead::ContainerEnd, Some(&name))
        );
        assert_eq!(
            Err(Misplaced {
                lookahead: Lookahead::ContainerEnd,
                top: None,
            }),
            classify(Lookahead::ContainerEnd, None)
        );
        assert_eq!(
            Err(Misplaced {
                lookahead: Lookahead::Member,
                top: Some(ARRAY),
            }),
            classify(Lookahead::Member, Some(&ARRAY))
        );
    }

    #[test]
    fn token_kind_properties() {
        assert!(TokenKind::ObjectStart.is_value_start());
        assert!(TokenKind::Scalar(ScalarKind::Null).is_value_start());
        assert!(!TokenKind::Name.is_value_start());
        assert!(!TokenKind::ArrayEnd.is_value_start());
    }

    duplicate::duplicate! {
        [
            test_name json expected;
            [read_string] ["\"text\""] [ScalarValue::String("text".to_owned())];
            [read_number] ["-4.50E-40"] [ScalarValue::Number("-4.50E-40".to_owned())];
            [read_bool] ["false"] [ScalarValue::Boolean(false)];
            [read_null] ["null"] [ScalarValue::Null];
        ]
        #[test]
        fn test_name() -> TestResult {
            let mut json_reader = new_reader(json);
            let lookahead = peek_lookahead(&mut json_reader, None)?;
            let kind = classify(lookahead, None)?;
            assert_eq!(TokenKind::Scalar(expected.kind()), kind);

            assert_eq!(Token::Scalar(expected), read_token(&mut json_reader, kind)?);
            json_reader.consume_trailing_whitespace()?;
            Ok(())
        }
    }

    #[test]
    fn read_structure() -> TestResult {
        let mut json_reader = new_reader(r#"{"a": [true]}"#);
        let mut tokens = Vec::new();
        let mut stack = Vec::<PathSegment>::new();

        loop {
            let lookahead = peek_lookahead(&mut json_reader, stack.last())?;
            let kind = classify(lookahead, stack.last())?;
            let token = read_token(&mut json_reader, kind)?;
            match &token {
                Token::ObjectStart => stack.push(OBJECT),
                Token::ArrayStart => stack.push(ARRAY),
                Token::Name(name) => stack.push(PathSegment::FieldName(name.clone())),
                Token::ObjectEnd | Token::ArrayEnd => {
                    stack.pop();
                    if stack.last().is_some_and(PathSegment::is_field_name) {
                        stack.pop();
                    }
                }
                Token::Scalar(_) => {
                    if stack.last().is_some_and(PathSegment::is_field_name) {
                        stack.pop();
                    }
                }
            }
            tokens.push(token);
            if stack.is_empty() {
                break;
            }
        }
        json_reader.consume_trailing_whitespace()?;

        assert_eq!(
            vec![
                Token::ObjectStart,
                Token::Name("a".to_owned()),
                Token::ArrayStart,
                Token::Scalar(ScalarValue::Boolean(true)),
                Token::ArrayEnd,
                Token::ObjectEnd,
            ],
            tokens
        );
        Ok(())
    }

    #[test]
    fn scalar_display() {
        assert_eq!("\"a\"", ScalarValue::String("a".to_owned()).to_string());
        assert_eq!("1.5e3", ScalarValue::Number("1.5e3".to_owned()).to_string());
        assert_eq!("true", ScalarValue::Boolean(true).to_string());
        assert_eq!("null", ScalarValue::Null.to_string());
    }
}
