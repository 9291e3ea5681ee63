//! Common library module for integration tests
// See https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests

use std::path::PathBuf;

use json_records::{registry::DecoderError, state::StateVars};
use struson::reader::JsonReader;

/// Path of the fruit arrays in the JSON document at [`get_test_data_file_path`]
pub const FRUITS_PATH: &str = "{.trees.[.{.fruits";
/// Path of the ID of the tree a fruit belongs to
pub const TREE_ID_PATH: &str = "{.trees.[.{.id";

pub fn get_test_data_file_path() -> PathBuf {
    // Get path of test file, see https://stackoverflow.com/a/30004252
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/test_data.json");
    path
}

#[derive(PartialEq, Eq, Debug)]
pub struct FruitRecord {
    pub tree_id: Option<String>,
    pub name: String,
    pub weight: u32,
}

impl FruitRecord {
    pub fn new(tree_id: Option<&str>, name: &str, weight: u32) -> Self {
        FruitRecord {
            tree_id: tree_id.map(str::to_owned),
            name: name.to_owned(),
            weight,
        }
    }
}

/// Decoder for a fruit object, enriched with the ID of the enclosing tree
pub fn read_fruit<J: JsonReader>(
    json_reader: &mut J,
    state: &StateVars,
) -> Result<FruitRecord, DecoderError> {
    let mut name = None;
    let mut weight = None;

    json_reader.begin_object()?;
    while json_reader.has_next()? {
        match json_reader.next_name_owned()?.as_str() {
            "name" => name = Some(json_reader.next_string()?),
            "weight" => weight = Some(json_reader.next_number::<u32>()??),
            _ => json_reader.skip_value()?,
        }
    }
    json_reader.end_object()?;

    Ok(FruitRecord {
        tree_id: state.get_str(TREE_ID_PATH).map(str::to_owned),
        name: name.ok_or("missing fruit name")?,
        weight: weight.ok_or("missing fruit weight")?,
    })
}

/// Gets the records expected for the JSON document at [`get_test_data_file_path`]
pub fn get_expected_fruits() -> Vec<FruitRecord> {
    vec![
        FruitRecord::new(Some("T1"), "apple", 150),
        FruitRecord::new(Some("T1"), "pear", 180),
        // Third tree has no ID, the ID of the previous trees must not be visible
        FruitRecord::new(None, "plum", 40),
    ]
}
