//! Recording extractors and bounded views over them.

use chrono::NaiveDateTime;

use crate::error::{ConvError, Result};
use crate::types::{ChannelId, ChannelInfo};

/// A multichannel time-series signal source.
///
/// Traces are returned in microvolts, one row per requested channel, in the
/// order the channels were requested.
pub trait RecordingExtractor {
    fn channel_ids(&self) -> Vec<ChannelId>;

    fn num_channels(&self) -> usize {
        self.channel_ids().len()
    }

    fn num_frames(&self) -> usize;

    /// Sampling frequency in Hz
    fn sampling_frequency(&self) -> f64;

    /// Reads frames `[start_frame, end_frame)` of the given channels.
    fn traces(&self, channel_ids: &[ChannelId], start_frame: usize, end_frame: usize) -> Result<Vec<Vec<f64>>>;

    /// Returns what the extractor knows about a channel, or `None` if the
    /// channel does not exist.
    fn channel_info(&self, channel_id: ChannelId) -> Option<ChannelInfo> {
        self.channel_ids()
            .contains(&channel_id)
            .then(ChannelInfo::default)
    }

    /// Wall-clock time of the first frame, when the source records it.
    fn start_time(&self) -> Option<NaiveDateTime> {
        None
    }
}

impl<T: RecordingExtractor + ?Sized> RecordingExtractor for &T {
    fn channel_ids(&self) -> Vec<ChannelId> {
        (**self).channel_ids()
    }

    fn num_channels(&self) -> usize {
        (**self).num_channels()
    }

    fn num_frames(&self) -> usize {
        (**self).num_frames()
    }

    fn sampling_frequency(&self) -> f64 {
        (**self).sampling_frequency()
    }

    fn traces(&self, channel_ids: &[ChannelId], start_frame: usize, end_frame: usize) -> Result<Vec<Vec<f64>>> {
        (**self).traces(channel_ids, start_frame, end_frame)
    }

    fn channel_info(&self, channel_id: ChannelId) -> Option<ChannelInfo> {
        (**self).channel_info(channel_id)
    }

    fn start_time(&self) -> Option<NaiveDateTime> {
        (**self).start_time()
    }
}

/// Read-only restriction of a recording to a channel subset and a frame
/// range. No sample data is copied; reads are forwarded to the parent.
///
/// Views can be stacked: a `SubRecording` is itself a [`RecordingExtractor`].
///
/// # Examples
///
/// ```rust
/// use nwbconv::{MemoryRecording, RecordingExtractor, SubRecording};
///
/// let recording = MemoryRecording::new(vec![vec![0.0; 500], vec![1.0; 500]], 1000.0)?;
///
/// // First 100 frames of every channel
/// let stub = SubRecording::new(&recording, None, 0, 100)?;
/// assert_eq!(stub.num_frames(), 100);
/// assert_eq!(stub.channel_ids(), vec![0, 1]);
///
/// // Then only channel 1
/// let subset = SubRecording::with_channels(&stub, vec![1])?;
/// assert_eq!(subset.channel_ids(), vec![1]);
/// assert_eq!(subset.num_frames(), 100);
/// # Ok::<(), nwbconv::ConvError>(())
/// ```
#[derive(Debug)]
pub struct SubRecording<'a, R: RecordingExtractor + ?Sized> {
    parent: &'a R,
    channel_ids: Vec<ChannelId>,
    start_frame: usize,
    end_frame: usize,
}

impl<'a, R: RecordingExtractor + ?Sized> SubRecording<'a, R> {
    /// Creates a view over `channel_ids` (all parent channels when `None`)
    /// and frames `[start_frame, end_frame)` of the parent.
    ///
    /// # Errors
    ///
    /// * `ConvError::ChannelNotFound` - a requested channel is not in the parent
    /// * `ConvError::DuplicateChannel` - a channel is requested twice
    /// * `ConvError::FrameRangeOutOfBounds` - `start_frame > end_frame` or
    ///   `end_frame` exceeds the parent's frame count
    pub fn new(
        parent: &'a R,
        channel_ids: Option<Vec<ChannelId>>,
        start_frame: usize,
        end_frame: usize,
    ) -> Result<Self> {
        let parent_ids = parent.channel_ids();
        let channel_ids = match channel_ids {
            Some(ids) => {
                for (i, id) in ids.iter().enumerate() {
                    if !parent_ids.contains(id) {
                        return Err(ConvError::ChannelNotFound(*id));
                    }
                    if ids[..i].contains(id) {
                        return Err(ConvError::DuplicateChannel(*id));
                    }
                }
                ids
            }
            None => parent_ids,
        };

        let num_frames = parent.num_frames();
        if start_frame > end_frame || end_frame > num_frames {
            return Err(ConvError::FrameRangeOutOfBounds { start: start_frame, end: end_frame, num_frames });
        }

        Ok(SubRecording {
            parent,
            channel_ids,
            start_frame,
            end_frame,
        })
    }

    /// Restricts the parent to `channel_ids`, keeping every frame.
    pub fn with_channels(parent: &'a R, channel_ids: Vec<ChannelId>) -> Result<Self> {
        let end_frame = parent.num_frames();
        Self::new(parent, Some(channel_ids), 0, end_frame)
    }

    pub fn start_frame(&self) -> usize {
        self.start_frame
    }

    pub fn end_frame(&self) -> usize {
        self.end_frame
    }

    pub fn parent(&self) -> &'a R {
        self.parent
    }
}

impl<'a, R: RecordingExtractor + ?Sized> RecordingExtractor for SubRecording<'a, R> {
    fn channel_ids(&self) -> Vec<ChannelId> {
        self.channel_ids.clone()
    }

    fn num_channels(&self) -> usize {
        self.channel_ids.len()
    }

    fn num_frames(&self) -> usize {
        self.end_frame - self.start_frame
    }

    fn sampling_frequency(&self) -> f64 {
        self.parent.sampling_frequency()
    }

    fn traces(&self, channel_ids: &[ChannelId], start_frame: usize, end_frame: usize) -> Result<Vec<Vec<f64>>> {
        if let Some(id) = channel_ids.iter().find(|id| !self.channel_ids.contains(id)) {
            return Err(ConvError::ChannelNotFound(*id));
        }
        let num_frames = self.num_frames();
        if start_frame > end_frame || end_frame > num_frames {
            return Err(ConvError::FrameRangeOutOfBounds { start: start_frame, end: end_frame, num_frames });
        }
        // 将视图内的帧号平移到父记录
        self.parent.traces(channel_ids, self.start_frame + start_frame, self.start_frame + end_frame)
    }

    fn channel_info(&self, channel_id: ChannelId) -> Option<ChannelInfo> {
        if self.channel_ids.contains(&channel_id) {
            self.parent.channel_info(channel_id)
        } else {
            None
        }
    }

    fn start_time(&self) -> Option<NaiveDateTime> {
        self.parent.start_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::MemoryRecording;

    fn ramp(num_channels: usize, num_frames: usize) -> MemoryRecording {
        let traces = (0..num_channels)
            .map(|c| (0..num_frames).map(|f| (c * 1000 + f) as f64).collect())
            .collect();
        MemoryRecording::new(traces, 30000.0).unwrap()
    }

    #[test]
    fn test_frame_offset_is_applied() {
        let recording = ramp(2, 50);
        let view = SubRecording::new(&recording, None, 10, 20).unwrap();
        let traces = view.traces(&[1], 0, 3).unwrap();
        assert_eq!(traces, vec![vec![1010.0, 1011.0, 1012.0]]);
    }

    #[test]
    fn test_nested_views() {
        let recording = ramp(3, 50);
        let outer = SubRecording::new(&recording, None, 5, 45).unwrap();
        let inner = SubRecording::new(&outer, Some(vec![2, 0]), 5, 10).unwrap();
        assert_eq!(inner.channel_ids(), vec![2, 0]);
        assert_eq!(inner.num_frames(), 5);
        let traces = inner.traces(&[2, 0], 0, 2).unwrap();
        assert_eq!(traces, vec![vec![2010.0, 2011.0], vec![10.0, 11.0]]);
    }

    #[test]
    fn test_invalid_views() {
        let recording = ramp(2, 50);
        assert!(matches!(
            SubRecording::new(&recording, Some(vec![7]), 0, 10),
            Err(ConvError::ChannelNotFound(7))
        ));
        assert!(matches!(
            SubRecording::new(&recording, Some(vec![1, 1]), 0, 10),
            Err(ConvError::DuplicateChannel(1))
        ));
        assert!(matches!(
            SubRecording::new(&recording, None, 0, 51),
            Err(ConvError::FrameRangeOutOfBounds { .. })
        ));
        assert!(matches!(
            SubRecording::new(&recording, None, 20, 10),
            Err(ConvError::FrameRangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_reads_outside_view_fail() {
        let recording = ramp(2, 50);
        let view = SubRecording::new(&recording, Some(vec![0]), 0, 10).unwrap();
        assert!(view.traces(&[1], 0, 5).is_err());
        assert!(view.traces(&[0], 0, 11).is_err());
        assert!(view.channel_info(1).is_none());
        assert!(view.channel_info(0).is_some());
    }
}
