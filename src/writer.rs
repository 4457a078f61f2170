//! Writes recordings into an [`NwbFile`].

use std::collections::BTreeSet;

use crate::error::{ConvError, Result};
use crate::metadata::{EcephysMetadata, Metadata};
use crate::nwb::{Device, ElectricalSeries, Electrode, ElectrodeGroup, NwbFile};
use crate::recording::RecordingExtractor;

pub const DEFAULT_DEVICE_NAME: &str = "Device";
pub const DEFAULT_GROUP_NAME: &str = "0";
pub const DEFAULT_SERIES_NAME: &str = "ElectricalSeries";
/// 微伏到伏特
pub const MICROVOLTS_TO_VOLTS: f64 = 1e-6;

/// Serialises a recording into an output document.
pub trait RecordingWriter {
    fn write_recording(
        &self,
        recording: &dyn RecordingExtractor,
        nwbfile: &mut NwbFile,
        metadata: Option<&Metadata>,
    ) -> Result<()>;
}

/// Writes a recording as devices, electrode groups, electrodes and one
/// `ElectricalSeries` in the acquisition section.
///
/// Devices and electrode groups already present in the document are reused;
/// electrodes whose id is already in the table are not added again.
///
/// # Examples
///
/// ```rust
/// use chrono::DateTime;
/// use nwbconv::{MemoryRecording, NwbFile, NwbWriter, RecordingWriter};
///
/// let recording = MemoryRecording::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]], 1000.0)?;
/// let start = DateTime::parse_from_rfc3339("2020-01-01T00:00:00+00:00").unwrap();
/// let mut nwbfile = NwbFile::new("demo", "demo-1", start);
///
/// NwbWriter.write_recording(&recording, &mut nwbfile, None)?;
///
/// let series = nwbfile.acquisition("ElectricalSeries").unwrap();
/// assert_eq!(series.data, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
/// assert_eq!(nwbfile.electrodes().len(), 2);
/// # Ok::<(), nwbconv::ConvError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NwbWriter;

impl RecordingWriter for NwbWriter {
    fn write_recording(
        &self,
        recording: &dyn RecordingExtractor,
        nwbfile: &mut NwbFile,
        metadata: Option<&Metadata>,
    ) -> Result<()> {
        if recording.num_channels() == 0 {
            return Err(ConvError::InvalidRecording("recording has no channels".to_string()));
        }
        let default_ecephys = EcephysMetadata::default();
        let ecephys = metadata
            .and_then(|m| m.ecephys.as_ref())
            .unwrap_or(&default_ecephys);

        add_devices(nwbfile, ecephys)?;
        add_electrode_groups(recording, nwbfile, ecephys)?;
        add_electrodes(recording, nwbfile, ecephys)?;
        add_electrical_series(recording, nwbfile, ecephys)
    }
}

fn add_devices(nwbfile: &mut NwbFile, ecephys: &EcephysMetadata) -> Result<()> {
    let devices = if ecephys.devices.is_empty() {
        vec![default_device()]
    } else {
        ecephys.devices.clone()
    };

    for device in devices {
        if nwbfile.device(&device.name).is_none() {
            tracing::debug!(device = %device.name, "adding device");
            nwbfile.add_device(device)?;
        }
    }
    Ok(())
}

fn add_electrode_groups(
    recording: &dyn RecordingExtractor,
    nwbfile: &mut NwbFile,
    ecephys: &EcephysMetadata,
) -> Result<()> {
    let groups = if ecephys.electrode_groups.is_empty() {
        let device = first_device_name(nwbfile, ecephys)?;
        channel_groups(recording)
            .into_iter()
            .map(|name| default_electrode_group(name, &device))
            .collect()
    } else {
        ecephys.electrode_groups.clone()
    };

    for group in groups {
        if nwbfile.electrode_group(&group.name).is_none() {
            tracing::debug!(group = %group.name, device = %group.device, "adding electrode group");
            nwbfile.add_electrode_group(group)?;
        }
    }
    Ok(())
}

fn add_electrodes(
    recording: &dyn RecordingExtractor,
    nwbfile: &mut NwbFile,
    ecephys: &EcephysMetadata,
) -> Result<()> {
    // 优先使用元数据中列出的第一个电极组
    let fallback_group = ecephys
        .electrode_groups
        .first()
        .map(|g| g.name.clone())
        .or_else(|| nwbfile.electrode_groups().next().map(|g| g.name.clone()))
        .ok_or_else(|| ConvError::MissingElectrodeGroup(DEFAULT_GROUP_NAME.to_string()))?;

    for id in recording.channel_ids() {
        if nwbfile.electrode_index(id).is_some() {
            continue;
        }
        let info = recording.channel_info(id).unwrap_or_default();
        let coord = |axis: usize| {
            info.location
                .as_ref()
                .and_then(|loc| loc.get(axis).copied())
                .unwrap_or(f64::NAN)
        };
        let group = match info.group.clone() {
            Some(group) => group,
            None if nwbfile.electrode_group(DEFAULT_GROUP_NAME).is_some() => DEFAULT_GROUP_NAME.to_string(),
            None => fallback_group.clone(),
        };
        let electrode = Electrode {
            id,
            x: coord(0),
            y: coord(1),
            z: coord(2),
            imp: -1.0,
            location: "unknown".to_string(),
            filtering: "none".to_string(),
            group,
            label: info.label.clone(),
        };
        nwbfile.add_electrode(electrode)?;
    }
    Ok(())
}

fn add_electrical_series(
    recording: &dyn RecordingExtractor,
    nwbfile: &mut NwbFile,
    ecephys: &EcephysMetadata,
) -> Result<()> {
    let channel_ids = recording.channel_ids();
    let num_frames = recording.num_frames();

    let electrodes = channel_ids
        .iter()
        .map(|id| {
            nwbfile
                .electrode_index(*id)
                .ok_or(ConvError::ChannelNotFound(*id))
        })
        .collect::<Result<Vec<_>>>()?;

    // 转置为 [帧][通道]
    let traces = recording.traces(&channel_ids, 0, num_frames)?;
    if traces.len() != channel_ids.len() || traces.iter().any(|t| t.len() != num_frames) {
        return Err(ConvError::InvalidRecording(format!(
            "extractor returned traces that do not cover {} channels x {} frames",
            channel_ids.len(), num_frames
        )));
    }
    let data = (0..num_frames)
        .map(|frame| traces.iter().map(|channel| channel[frame]).collect())
        .collect();

    let series_metadata = ecephys.electrical_series.as_ref();
    let series = ElectricalSeries {
        name: series_metadata
            .map(|s| s.name.clone())
            .unwrap_or_else(|| DEFAULT_SERIES_NAME.to_string()),
        description: series_metadata
            .and_then(|s| s.description.clone())
            .unwrap_or_else(|| "Raw acquisition traces.".to_string()),
        comments: series_metadata
            .and_then(|s| s.comments.clone())
            .unwrap_or_else(|| "no comments".to_string()),
        data,
        electrodes,
        rate: recording.sampling_frequency(),
        starting_time: 0.0,
        conversion: MICROVOLTS_TO_VOLTS,
        resolution: -1.0,
        channel_conversion: None,
    };

    tracing::info!(
        series = %series.name,
        channels = series.num_channels(),
        frames = series.num_frames(),
        rate = series.rate,
        "writing electrical series"
    );
    nwbfile.add_acquisition(series)
}

pub(crate) fn default_device() -> Device {
    Device {
        name: DEFAULT_DEVICE_NAME.to_string(),
        description: Some("Ecephys probe.".to_string()),
        manufacturer: None,
    }
}

pub(crate) fn default_electrode_group(name: String, device: &str) -> ElectrodeGroup {
    ElectrodeGroup {
        name,
        description: "no description".to_string(),
        location: "unknown".to_string(),
        device: device.to_string(),
        position: None,
    }
}

fn first_device_name(nwbfile: &NwbFile, ecephys: &EcephysMetadata) -> Result<String> {
    ecephys
        .devices
        .first()
        .map(|d| d.name.clone())
        .or_else(|| nwbfile.devices().next().map(|d| d.name.clone()))
        .ok_or_else(|| ConvError::MissingDevice(DEFAULT_DEVICE_NAME.to_string()))
}

/// Distinct channel groups in channel order of first appearance.
pub(crate) fn channel_groups(recording: &dyn RecordingExtractor) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut groups = Vec::new();
    for id in recording.channel_ids() {
        let group = recording
            .channel_info(id)
            .and_then(|info| info.group)
            .unwrap_or_else(|| DEFAULT_GROUP_NAME.to_string());
        if seen.insert(group.clone()) {
            groups.push(group);
        }
    }
    groups
}
