use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConvError, Result};
use crate::extractors::{parse_args, ExtractorSource};
use crate::recording::RecordingExtractor;
use crate::schema::{JsonType, ParamSpec};
use crate::types::{ChannelId, ChannelInfo};

/// Recording held entirely in memory.
///
/// Traces are stored channel-major in microvolts.
///
/// # Examples
///
/// ```rust
/// use nwbconv::{MemoryRecording, RecordingExtractor};
///
/// let mut recording = MemoryRecording::new(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]], 2000.0)?
///     .with_channel_ids(vec![10, 20])?;
/// recording.set_channel_group(20, "shank1")?;
///
/// assert_eq!(recording.channel_ids(), vec![10, 20]);
/// assert_eq!(recording.num_frames(), 3);
/// assert_eq!(recording.traces(&[20], 1, 3)?, vec![vec![5.0, 6.0]]);
/// assert_eq!(recording.channel_info(20).unwrap().group.as_deref(), Some("shank1"));
/// # Ok::<(), nwbconv::ConvError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRecording {
    traces: Vec<Vec<f64>>,
    sampling_frequency: f64,
    channel_ids: Vec<ChannelId>,
    /// 通道附加信息，按通道下标存储
    info: Vec<ChannelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MemoryArgs {
    traces: Vec<Vec<f64>>,
    sampling_frequency: f64,
    #[serde(default)]
    channel_ids: Option<Vec<ChannelId>>,
    #[serde(default)]
    channel_groups: Option<Vec<String>>,
    #[serde(default)]
    locations: Option<Vec<Vec<f64>>>,
}

impl MemoryRecording {
    /// Creates a recording from per-channel traces.
    ///
    /// Channel ids default to `0..num_channels`.
    ///
    /// # Errors
    ///
    /// * `ConvError::InvalidRecording` - no channels, rows of unequal length, or
    ///   a sampling frequency that is not a positive finite number
    pub fn new(traces: Vec<Vec<f64>>, sampling_frequency: f64) -> Result<Self> {
        if traces.is_empty() {
            return Err(ConvError::InvalidRecording("recording has no channels".to_string()));
        }
        let num_frames = traces[0].len();
        if let Some(row) = traces.iter().position(|t| t.len() != num_frames) {
            return Err(ConvError::InvalidRecording(format!(
                "channel {} has {} frames, expected {}",
                row, traces[row].len(), num_frames
            )));
        }
        if !sampling_frequency.is_finite() || sampling_frequency <= 0.0 {
            return Err(ConvError::InvalidRecording(format!(
                "invalid sampling frequency: {}", sampling_frequency
            )));
        }

        let num_channels = traces.len();
        Ok(MemoryRecording {
            traces,
            sampling_frequency,
            channel_ids: (0..num_channels as ChannelId).collect(),
            info: vec![ChannelInfo::default(); num_channels],
        })
    }

    /// Replaces the default channel ids.
    pub fn with_channel_ids(mut self, channel_ids: Vec<ChannelId>) -> Result<Self> {
        if channel_ids.len() != self.traces.len() {
            return Err(ConvError::InvalidRecording(format!(
                "{} channel ids given for {} channels",
                channel_ids.len(), self.traces.len()
            )));
        }
        let mut seen = HashMap::new();
        for (i, id) in channel_ids.iter().enumerate() {
            if seen.insert(*id, i).is_some() {
                return Err(ConvError::DuplicateChannel(*id));
            }
        }
        self.channel_ids = channel_ids;
        Ok(self)
    }

    pub fn set_channel_group(&mut self, channel_id: ChannelId, group: &str) -> Result<()> {
        self.info_mut(channel_id)?.group = Some(group.to_string());
        Ok(())
    }

    pub fn set_channel_location(&mut self, channel_id: ChannelId, location: Vec<f64>) -> Result<()> {
        self.info_mut(channel_id)?.location = Some(location);
        Ok(())
    }

    pub fn set_channel_gain(&mut self, channel_id: ChannelId, gain: f64) -> Result<()> {
        self.info_mut(channel_id)?.gain = Some(gain);
        Ok(())
    }

    fn index_of(&self, channel_id: ChannelId) -> Result<usize> {
        self.channel_ids
            .iter()
            .position(|id| *id == channel_id)
            .ok_or(ConvError::ChannelNotFound(channel_id))
    }

    fn info_mut(&mut self, channel_id: ChannelId) -> Result<&mut ChannelInfo> {
        let index = self.index_of(channel_id)?;
        Ok(&mut self.info[index])
    }
}

impl RecordingExtractor for MemoryRecording {
    fn channel_ids(&self) -> Vec<ChannelId> {
        self.channel_ids.clone()
    }

    fn num_frames(&self) -> usize {
        self.traces[0].len()
    }

    fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    fn traces(&self, channel_ids: &[ChannelId], start_frame: usize, end_frame: usize) -> Result<Vec<Vec<f64>>> {
        let num_frames = self.num_frames();
        if start_frame > end_frame || end_frame > num_frames {
            return Err(ConvError::FrameRangeOutOfBounds { start: start_frame, end: end_frame, num_frames });
        }
        channel_ids
            .iter()
            .map(|id| {
                let index = self.index_of(*id)?;
                Ok(self.traces[index][start_frame..end_frame].to_vec())
            })
            .collect()
    }

    fn channel_info(&self, channel_id: ChannelId) -> Option<ChannelInfo> {
        let index = self.index_of(channel_id).ok()?;
        Some(self.info[index].clone())
    }
}

impl ExtractorSource for MemoryRecording {
    fn input_params() -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("traces", JsonType::Array)
                .with_description("Per-channel sample arrays in microvolts"),
            ParamSpec::required("sampling_frequency", JsonType::Number)
                .with_description("Sampling frequency in Hz"),
            ParamSpec::optional("channel_ids", JsonType::Array, Value::Null),
            ParamSpec::optional("channel_groups", JsonType::Array, Value::Null),
            ParamSpec::optional("locations", JsonType::Array, Value::Null),
        ]
    }

    fn from_input_args(args: &Value) -> Result<Self> {
        let args: MemoryArgs = parse_args(args)?;
        let mut recording = MemoryRecording::new(args.traces, args.sampling_frequency)?;
        if let Some(ids) = args.channel_ids {
            recording = recording.with_channel_ids(ids)?;
        }

        let num_channels = recording.channel_ids.len();
        if let Some(groups) = args.channel_groups {
            if groups.len() != num_channels {
                return Err(ConvError::InvalidRecording(format!(
                    "{} channel groups given for {} channels", groups.len(), num_channels
                )));
            }
            for (info, group) in recording.info.iter_mut().zip(groups) {
                info.group = Some(group);
            }
        }
        if let Some(locations) = args.locations {
            if locations.len() != num_channels {
                return Err(ConvError::InvalidRecording(format!(
                    "{} locations given for {} channels", locations.len(), num_channels
                )));
            }
            for (info, location) in recording.info.iter_mut().zip(locations) {
                info.location = Some(location);
            }
        }

        Ok(recording)
    }
}
