//! # nwbconv
//!
//! Converts extracellular electrophysiology recordings into
//! Neurodata Without Borders (NWB) documents.
//!
//! The library is organised around three pieces:
//!
//! - **Recording extractors** ([`RecordingExtractor`]): multichannel signal
//!   sources such as [`MemoryRecording`] and [`EdfRecording`], plus the
//!   [`SubRecording`] view that restricts any of them to a channel subset and
//!   a frame range without copying data.
//! - **The NWB object model** ([`NwbFile`] and friends in [`nwb`]), filled in
//!   by a [`RecordingWriter`] such as [`NwbWriter`].
//! - **Data interfaces** ([`RecordingInterface`]): build an extractor from a
//!   JSON argument bundle, describe the accepted arguments and metadata as
//!   schema documents, and run the conversion.
//!
//! ## Quick Start
//!
//! ### Converting an EDF+ file
//!
//! ```rust
//! use nwbconv::{EdfRecording, NwbFile, RecordingInterface};
//! use serde_json::json;
//! # use nwbconv::doctest_utils::TestEdf;
//!
//! # let dir = tempfile::tempdir()?;
//! # let path = dir.path().join("session.edf");
//! # TestEdf::default().write(&path)?;
//! // Build the interface from its input arguments
//! let interface = RecordingInterface::<EdfRecording>::new(&json!({
//!     "file_path": path,
//! }))?;
//!
//! // Start from the metadata the recording can provide, then complete it
//! let mut metadata = interface.metadata();
//! if let Some(nwbfile) = metadata.nwbfile.as_mut() {
//!     nwbfile.session_description = "Resting-state EEG".to_string();
//!     nwbfile.identifier = "session-001".to_string();
//! }
//!
//! let mut nwbfile = NwbFile::from_metadata(&metadata)?;
//! interface.convert_data(&mut nwbfile, Some(&metadata), false)?;
//!
//! let series = nwbfile.acquisition("ElectricalSeries").unwrap();
//! println!("{} frames x {} channels at {} Hz",
//!     series.num_frames(), series.num_channels(), series.rate);
//!
//! nwbfile.save(dir.path().join("session.nwb.json"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Stub conversions
//!
//! Passing `stub_test = true` keeps only the first 100 frames (see
//! [`RecordingInterface::with_stub_frames`]) which is handy to check
//! metadata before converting a long recording:
//!
//! ```rust
//! use chrono::DateTime;
//! use nwbconv::{MemoryRecording, NwbFile, RecordingInterface};
//!
//! let recording = MemoryRecording::new(vec![vec![0.0; 42]; 4], 30000.0)?;
//! let interface = RecordingInterface::from_recording(recording);
//!
//! let start = DateTime::parse_from_rfc3339("2020-01-01T00:00:00+00:00").unwrap();
//! let mut nwbfile = NwbFile::new("stub", "stub-1", start);
//! interface.convert_data(&mut nwbfile, None, true)?;
//!
//! // Shorter recordings are kept whole
//! assert_eq!(nwbfile.acquisition("ElectricalSeries").unwrap().num_frames(), 42);
//! # Ok::<(), nwbconv::ConvError>(())
//! ```
//!
//! ## Schemas
//!
//! Input schemas follow the extractor type; the metadata schema always
//! requires `Device`, `ElectrodeGroup` and `ElectricalSeries`:
//!
//! ```rust
//! use nwbconv::{EdfRecording, MemoryRecording, RecordingInterface};
//! use serde_json::json;
//!
//! let edf = RecordingInterface::<EdfRecording>::input_schema();
//! assert_eq!(edf["required"], json!(["file_path"]));
//!
//! let memory = RecordingInterface::<MemoryRecording>::input_schema();
//! assert_eq!(memory["required"], json!(["traces", "sampling_frequency"]));
//! ```

pub mod error;
pub mod types;
pub mod schema;
pub mod recording;
pub mod extractors;
pub mod nwb;
pub mod metadata;
pub mod writer;
pub mod interface;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest support

// Re-export main types for convenience
pub use error::{ConvError, Result};
pub use types::{ChannelId, ChannelInfo, SignalParam};
pub use recording::{RecordingExtractor, SubRecording};
pub use extractors::{EdfRecording, ExtractorSource, MemoryRecording};
pub use nwb::{NwbDescriptor, NwbFile};
pub use metadata::Metadata;
pub use writer::{NwbWriter, RecordingWriter};
pub use interface::{DataInterface, RecordingInterface, DEFAULT_STUB_FRAMES};

/// Library version
///
/// # Examples
///
/// ```rust
/// let version = nwbconv::version();
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
