//! Data interfaces: adapters from a data source to an NWB document.

use serde_json::Value;

use crate::error::Result;
use crate::extractors::ExtractorSource;
use crate::metadata::{EcephysMetadata, ElectricalSeriesMetadata, Metadata, NwbFileMetadata};
use crate::nwb::{Device, ElectricalSeries, ElectrodeGroup, NwbDescriptor, NwbFile};
use crate::recording::{RecordingExtractor, SubRecording};
use crate::schema::{base_schema, require_property};
use crate::writer::{
    channel_groups, default_device, default_electrode_group, NwbWriter, RecordingWriter,
    DEFAULT_SERIES_NAME,
};

/// Number of frames kept by a stub conversion unless configured otherwise.
pub const DEFAULT_STUB_FRAMES: usize = 100;

/// A source of data that can be converted into an NWB document.
pub trait DataInterface {
    /// Schema of the arguments accepted at construction.
    fn input_schema() -> Value
    where
        Self: Sized;

    /// Schema of the metadata this interface understands.
    fn metadata_schema(&self) -> Value;

    /// Metadata that can be derived from the source itself.
    fn metadata(&self) -> Metadata;

    /// Writes the source's data into `nwbfile`.
    fn convert_data(&self, nwbfile: &mut NwbFile, metadata: Option<&Metadata>, stub_test: bool) -> Result<()>;
}

/// Converts a recording extractor into an NWB document.
///
/// `R` is the extractor type the interface builds from its input arguments;
/// `W` is the routine that serialises the (possibly restricted) recording.
///
/// # Examples
///
/// ```rust
/// use chrono::DateTime;
/// use nwbconv::{MemoryRecording, Metadata, NwbFile, RecordingInterface};
/// use serde_json::json;
///
/// let interface = RecordingInterface::<MemoryRecording>::new(&json!({
///     "traces": [vec![0.0; 1000], vec![1.0; 1000], vec![2.0; 1000]],
///     "sampling_frequency": 30000.0,
/// }))?;
///
/// let start = DateTime::parse_from_rfc3339("2020-01-01T00:00:00+00:00").unwrap();
/// let mut nwbfile = NwbFile::new("stub conversion", "stub-1", start);
/// let metadata = Metadata::from_value(json!({ "Ecephys": { "subset_channels": [0, 2] } }))?;
///
/// // First 100 frames of channels 0 and 2
/// interface.convert_data(&mut nwbfile, Some(&metadata), true)?;
///
/// let series = nwbfile.acquisition("ElectricalSeries").unwrap();
/// assert_eq!(series.num_frames(), 100);
/// assert_eq!(series.num_channels(), 2);
/// # Ok::<(), nwbconv::ConvError>(())
/// ```
#[derive(Debug)]
pub struct RecordingInterface<R, W = NwbWriter> {
    recording: R,
    writer: W,
    stub_frames: usize,
}

impl<R: ExtractorSource> RecordingInterface<R, NwbWriter> {
    /// Builds the underlying extractor from a named argument bundle.
    ///
    /// Errors from the extractor (bad arguments, unreadable files) are
    /// returned unchanged.
    pub fn new(input_args: &Value) -> Result<Self> {
        Self::with_factory(input_args, R::from_input_args)
    }

    /// Schema of the arguments accepted by [`RecordingInterface::new`].
    ///
    /// Follows the configured extractor type: a different `R` yields a
    /// different schema.
    pub fn input_schema() -> Value {
        R::input_schema()
    }
}

impl<R: RecordingExtractor> RecordingInterface<R, NwbWriter> {
    /// Builds the underlying extractor with an explicit factory function.
    pub fn with_factory<F>(input_args: &Value, factory: F) -> Result<Self>
    where
        F: FnOnce(&Value) -> Result<R>,
    {
        Ok(Self::from_recording(factory(input_args)?))
    }

    /// Wraps an extractor that has already been built.
    pub fn from_recording(recording: R) -> Self {
        RecordingInterface {
            recording,
            writer: NwbWriter,
            stub_frames: DEFAULT_STUB_FRAMES,
        }
    }
}

impl<R: RecordingExtractor, W: RecordingWriter> RecordingInterface<R, W> {
    /// Replaces the write routine.
    pub fn with_writer<W2: RecordingWriter>(self, writer: W2) -> RecordingInterface<R, W2> {
        RecordingInterface {
            recording: self.recording,
            writer,
            stub_frames: self.stub_frames,
        }
    }

    /// Sets how many frames a stub conversion keeps.
    pub fn with_stub_frames(mut self, stub_frames: usize) -> Self {
        self.stub_frames = stub_frames;
        self
    }

    pub fn stub_frames(&self) -> usize {
        self.stub_frames
    }

    pub fn recording(&self) -> &R {
        &self.recording
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Schema with the required `Device`, `ElectrodeGroup` and
    /// `ElectricalSeries` entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nwbconv::{MemoryRecording, RecordingInterface};
    /// use serde_json::json;
    ///
    /// let recording = MemoryRecording::new(vec![vec![0.0; 10]], 1000.0)?;
    /// let schema = RecordingInterface::from_recording(recording).metadata_schema();
    /// assert_eq!(schema["required"], json!(["Device", "ElectrodeGroup", "ElectricalSeries"]));
    /// assert_eq!(schema["properties"]["Device"]["tag"], "core.Device");
    /// # Ok::<(), nwbconv::ConvError>(())
    /// ```
    pub fn metadata_schema(&self) -> Value {
        let mut schema = base_schema(None);
        require_property(&mut schema, "Device", Device::schema());
        require_property(&mut schema, "ElectrodeGroup", ElectrodeGroup::schema());
        require_property(&mut schema, "ElectricalSeries", ElectricalSeries::schema());
        schema
    }

    /// Default metadata: one device, one electrode group per channel group,
    /// one electrical series, and the session start time when the recording
    /// knows it.
    pub fn metadata(&self) -> Metadata {
        let device = default_device();
        let electrode_groups = channel_groups(&self.recording)
            .into_iter()
            .map(|name| default_electrode_group(name, &device.name))
            .collect();

        let nwbfile = self.recording.start_time().map(|start| NwbFileMetadata {
            session_start_time: Some(start.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ..NwbFileMetadata::default()
        });

        Metadata {
            nwbfile,
            ecephys: Some(EcephysMetadata {
                subset_channels: None,
                devices: vec![device],
                electrode_groups,
                electrical_series: Some(ElectricalSeriesMetadata {
                    name: DEFAULT_SERIES_NAME.to_string(),
                    description: Some("Raw acquisition traces.".to_string()),
                    comments: None,
                }),
            }),
        }
    }

    /// Writes the recording into `nwbfile`.
    ///
    /// With `stub_test`, only frames `[0, min(stub_frames, num_frames))` of
    /// every channel are kept. When `metadata` carries
    /// `Ecephys.subset_channels`, the (possibly truncated) recording is then
    /// restricted to those channels. Writer errors are returned unchanged.
    pub fn convert_data(&self, nwbfile: &mut NwbFile, metadata: Option<&Metadata>, stub_test: bool) -> Result<()> {
        let stub;
        let recording: &dyn RecordingExtractor = if stub_test {
            let channel_ids = self.recording.channel_ids();
            let end_frame = self.stub_frames.min(self.recording.num_frames());
            tracing::debug!(end_frame, channels = channel_ids.len(), "truncating recording for stub conversion");
            stub = SubRecording::new(&self.recording, Some(channel_ids), 0, end_frame)?;
            &stub
        } else {
            &self.recording
        };

        // 通道子集在截断之后应用
        let subset;
        let recording: &dyn RecordingExtractor = match metadata.and_then(Metadata::subset_channels) {
            Some(channel_ids) => {
                tracing::debug!(?channel_ids, "restricting recording to channel subset");
                subset = SubRecording::with_channels(recording, channel_ids.to_vec())?;
                &subset
            }
            None => recording,
        };

        self.writer.write_recording(recording, nwbfile, metadata)
    }
}

impl<R: ExtractorSource, W: RecordingWriter> DataInterface for RecordingInterface<R, W> {
    fn input_schema() -> Value {
        R::input_schema()
    }

    fn metadata_schema(&self) -> Value {
        RecordingInterface::metadata_schema(self)
    }

    fn metadata(&self) -> Metadata {
        RecordingInterface::metadata(self)
    }

    fn convert_data(&self, nwbfile: &mut NwbFile, metadata: Option<&Metadata>, stub_test: bool) -> Result<()> {
        RecordingInterface::convert_data(self, nwbfile, metadata, stub_test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::MemoryRecording;

    #[test]
    fn test_stub_frames_default_and_override() {
        let recording = MemoryRecording::new(vec![vec![0.0; 10]], 1000.0).unwrap();
        let interface = RecordingInterface::from_recording(recording);
        assert_eq!(interface.stub_frames(), DEFAULT_STUB_FRAMES);
        assert_eq!(interface.with_stub_frames(5).stub_frames(), 5);
    }

    #[test]
    fn test_default_metadata_groups() {
        let mut recording = MemoryRecording::new(vec![vec![0.0; 10]; 3], 1000.0).unwrap();
        recording.set_channel_group(0, "a").unwrap();
        recording.set_channel_group(1, "b").unwrap();
        recording.set_channel_group(2, "a").unwrap();
        let metadata = RecordingInterface::from_recording(recording).metadata();

        let ecephys = metadata.ecephys.unwrap();
        let names: Vec<_> = ecephys.electrode_groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(ecephys.electrode_groups.iter().all(|g| g.device == "Device"));
        assert!(metadata.nwbfile.is_none());
    }
}
