//! Provides integration with [Serde](https://docs.rs/serde/latest/serde/)
//!
//! This module provides decoders which read records as [`Deserialize`](serde::de::Deserialize)
//! types, using [`JsonReader::deserialize_next`]. They can be passed directly to
//! [`RecordIterator::register`](crate::iterator::RecordIterator::register).
//!
//! To enable this optional integration, specify the `serde` feature in your `Cargo.toml` file
//! for the dependency on this crate:
//! ```toml
//! [dependencies]
//! json-records = { version = "...", features = ["serde"] }
//! ```
//!
//! # Usage examples
//! ```
//! # use json_records::iterator::*;
//! # use json_records::serde::*;
//! # use serde::*;
//! #[derive(Deserialize, PartialEq, Debug)]
//! struct Fruit {
//!     name: String,
//!     weight: u32,
//! }
//!
//! let json = r#"{"fruits": [{"name": "apple", "weight": 150}, {"name": "pear", "weight": 180}]}"#;
//! let mut iterator = RecordIterator::from_reader(json.as_bytes());
//! iterator.register("{.fruits", deserialize_record())?;
//!
//! let fruits = iterator.collect::<Result<Vec<Fruit>, _>>()?;
//! assert_eq!(
//!     vec![
//!         Fruit { name: "apple".to_owned(), weight: 150 },
//!         Fruit { name: "pear".to_owned(), weight: 180 },
//!     ],
//!     fruits
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::de::DeserializeOwned;
use struson::reader::JsonReader;

use crate::{registry::DecoderError, state::StateVars};

/// Creates a decoder which deserializes each record as `D`
///
/// The state variables are not used; see [`deserialize_enriched`] for combining the
/// deserialized value with them.
pub fn deserialize_record<J: JsonReader, D: DeserializeOwned>(
) -> impl FnMut(&mut J, &StateVars) -> Result<D, DecoderError> {
    |json_reader: &mut J, _: &StateVars| Ok(json_reader.deserialize_next::<D>()?)
}

/// Creates a decoder which deserializes each value as `D` and then converts it to a record
///
/// The `enrich` function receives the deserialized value together with the state variables,
/// for example to add the ID of the enclosing object to the record.
///
/// # Examples
/// ```
/// # use json_records::iterator::*;
/// # use json_records::serde::*;
/// # use json_records::state::StateVars;
/// # use serde::*;
/// #[derive(Deserialize)]
/// struct Fruit {
///     name: String,
/// }
///
/// let json = r#"{"trees": [{"id": "T1", "fruits": [{"name": "apple"}]}]}"#;
/// let mut iterator = RecordIterator::from_reader(json.as_bytes());
/// iterator.register(
///     "{.trees.[.{.fruits",
///     deserialize_enriched(|fruit: Fruit, state: &StateVars| {
///         let tree_id = state.get_str("{.trees.[.{.id").ok_or("missing tree ID")?;
///         Ok(format!("{tree_id}/{}", fruit.name))
///     }),
/// )?;
///
/// assert_eq!(Some("T1/apple".to_owned()), iterator.next_record());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn deserialize_enriched<J, D, T, F>(
    mut enrich: F,
) -> impl FnMut(&mut J, &StateVars) -> Result<T, DecoderError>
where
    J: JsonReader,
    D: DeserializeOwned,
    F: FnMut(D, &StateVars) -> Result<T, DecoderError>,
{
    move |json_reader: &mut J, state: &StateVars| {
        let value = json_reader.deserialize_next::<D>()?;
        enrich(value, state)
    }
}
