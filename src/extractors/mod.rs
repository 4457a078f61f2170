//! Concrete recording extractors.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ConvError, Result};
use crate::recording::RecordingExtractor;
use crate::schema::{schema_from_params, ParamSpec};

pub mod edf;
pub mod memory;

pub use edf::EdfRecording;
pub use memory::MemoryRecording;

/// An extractor that can be built from a named argument bundle.
///
/// `input_params` is the declarative description of the accepted arguments;
/// `input_schema` turns it into a schema document.
pub trait ExtractorSource: RecordingExtractor + Sized {
    fn input_params() -> Vec<ParamSpec>;

    fn from_input_args(args: &Value) -> Result<Self>;

    fn input_schema() -> Value {
        schema_from_params(&Self::input_params())
    }
}

/// Deserializes an argument bundle into an extractor's argument struct.
pub(crate) fn parse_args<T: DeserializeOwned>(args: &Value) -> Result<T> {
    serde_json::from_value(args.clone()).map_err(ConvError::InvalidInputArgs)
}
