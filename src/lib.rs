#![warn(missing_docs)]
#![forbid(unsafe_code)]
// Allow needless `return` because that makes it sometimes more obvious that
// an expression is the result of the function
#![allow(clippy::needless_return)]
// Allow `assert_eq!(true, ...)` because in some cases it is used to check a bool
// value and not a 'flag' / 'state', and `assert_eq!` makes that more explicit
#![allow(clippy::bool_assert_comparison)]
// Enable 'unused' warnings for doc tests (are disabled by default)
#![doc(test(no_crate_inject))]
#![doc(test(attr(warn(unused))))]
// Fail on warnings in doc tests
#![doc(test(attr(deny(warnings))))]
// When `docsrs` configuration flag is set enable banner for features in documentation
// See https://stackoverflow.com/q/61417452
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Pull-based iteration over records nested inside large JSON documents.
//!
//! Many JSON documents consist of a small envelope around a large array of records, for example
//! `{"trees": [{"id": "T1", "fruits": [...]}, ...]}`. This crate walks such a document as a stream
//! of tokens, using a [Struson](https://docs.rs/struson) [`JsonReader`](struson::reader::JsonReader),
//! and hands the values at chosen locations to caller-supplied *decoders*. Each decoder call
//! produces one record, so the complete document never has to be held in memory.
//!
//! # Terminology
//!
//! - *path*: the location of a value in the document, rendered as dot-joined segments where
//!   `{` stands for an object, `[` for an array and member names stand for themselves.
//!   For example the `"fruits"` array above is at `{.trees.[.{.fruits`, see the [`path`] module.
//! - *decoder*: a function which consumes exactly one JSON value from the reader and returns
//!   a record, see the [`registry`] module.
//! - *state variable*: a scalar value which was read while traversing the document. It stays
//!   visible to decoders until its enclosing array or object ends, see the [`state`] module.
//!
//! # Usage examples
//!
//! ```
//! # use json_records::iterator::*;
//! # use json_records::state::StateVars;
//! # use struson::reader::*;
//! // In this example JSON data comes from a string;
//! // normally it would come from a file, see `RecordIterator::open`
//! let json = r#"{
//!     "trees": [
//!         {"id": "T1", "fruits": ["apple", "pear"]},
//!         {"id": "T2", "fruits": ["plum"]}
//!     ]
//! }"#;
//!
//! let mut iterator = RecordIterator::from_reader(json.as_bytes());
//! // Called once for every item of each "fruits" array
//! iterator.register("{.trees.[.{.fruits", |json_reader: &mut JsonStreamReader<&[u8]>, state: &StateVars| {
//!     let fruit = json_reader.next_string()?;
//!     let tree_id = state.get_str("{.trees.[.{.id").ok_or("missing tree ID")?;
//!     Ok(format!("{tree_id}: {fruit}"))
//! })?;
//!
//! let fruits = iterator.collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(vec!["T1: apple", "T1: pear", "T2: plum"], fruits);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Serde integration
//! Optional integration with [Serde](https://docs.rs/serde/latest/serde/) provides decoders
//! which read records as `Deserialize` types. See the `serde` module of this crate for more
//! information.

pub mod iterator;
pub mod path;
pub mod registry;
pub mod state;
pub mod token;

#[cfg(feature = "serde")]
pub mod serde;
