use chrono::DateTime;
use nwbconv::doctest_utils::TestEdf;
use nwbconv::nwb::Device;
use nwbconv::{
    ChannelId, ConvError, EdfRecording, MemoryRecording, Metadata, NwbFile, NwbWriter,
    RecordingExtractor, RecordingInterface, RecordingWriter, Result,
};
use serde_json::json;

fn empty_nwbfile() -> NwbFile {
    let start = DateTime::parse_from_rfc3339("2019-11-05T14:00:00-05:00").unwrap();
    NwbFile::new("writer tests", "writer-tests", start)
}

fn two_shank_recording() -> MemoryRecording {
    let mut recording = MemoryRecording::new(
        vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]],
        20000.0,
    )
    .unwrap()
    .with_channel_ids(vec![10, 11, 12])
    .unwrap();
    recording.set_channel_group(10, "shank0").unwrap();
    recording.set_channel_group(11, "shank0").unwrap();
    recording.set_channel_group(12, "shank1").unwrap();
    recording.set_channel_location(12, vec![0.0, 150.0]).unwrap();
    recording
}

#[test]
fn test_defaults_without_metadata() {
    let recording = MemoryRecording::new(vec![vec![0.5; 4], vec![-0.5; 4]], 1000.0).unwrap();
    let mut nwbfile = empty_nwbfile();

    NwbWriter.write_recording(&recording, &mut nwbfile, None).unwrap();

    let device = nwbfile.device("Device").unwrap();
    assert_eq!(device.description.as_deref(), Some("Ecephys probe."));
    let group = nwbfile.electrode_group("0").unwrap();
    assert_eq!(group.device, "Device");
    assert!(nwbfile.electrodes().iter().all(|e| e.group == "0" && e.x.is_nan()));

    let series = nwbfile.acquisition("ElectricalSeries").unwrap();
    assert_eq!(series.rate, 1000.0);
    assert_eq!(series.starting_time, 0.0);
    assert_eq!(series.conversion, 1e-6);
    assert_eq!(series.electrodes, vec![0, 1]);
    assert_eq!(series.data, vec![vec![0.5, -0.5]; 4]);
}

#[test]
fn test_groups_follow_channel_groups() {
    let recording = two_shank_recording();
    let mut nwbfile = empty_nwbfile();

    NwbWriter.write_recording(&recording, &mut nwbfile, None).unwrap();

    let groups: Vec<_> = nwbfile.electrode_groups().map(|g| g.name.as_str()).collect();
    assert_eq!(groups, vec!["shank0", "shank1"]);
    let electrodes = nwbfile.electrodes();
    assert_eq!(electrodes[2].id, 12);
    assert_eq!(electrodes[2].group, "shank1");
    assert_eq!(electrodes[2].x, 0.0);
    assert_eq!(electrodes[2].y, 150.0);
    assert!(electrodes[2].z.is_nan());
}

#[test]
fn test_metadata_devices_groups_and_series() {
    let metadata = Metadata::from_value(json!({
        "Ecephys": {
            "Device": [{ "name": "Probe", "manufacturer": "Cambridge NeuroTech" }],
            "ElectrodeGroup": [
                { "name": "shank0", "description": "medial", "location": "CA1", "device": "Probe" },
                { "name": "shank1", "description": "lateral", "location": "CA3", "device": "Probe" },
            ],
            "ElectricalSeries": { "name": "raw", "description": "raw voltage", "comments": "hp filtered" },
        }
    }))
    .unwrap();
    let mut nwbfile = empty_nwbfile();

    NwbWriter
        .write_recording(&two_shank_recording(), &mut nwbfile, Some(&metadata))
        .unwrap();

    assert!(nwbfile.device("Device").is_none());
    assert_eq!(nwbfile.device("Probe").unwrap().manufacturer.as_deref(), Some("Cambridge NeuroTech"));
    assert_eq!(nwbfile.electrode_group("shank1").unwrap().location, "CA3");
    let series = nwbfile.acquisition("raw").unwrap();
    assert_eq!(series.description, "raw voltage");
    assert_eq!(series.comments, "hp filtered");
    assert!(nwbfile.acquisition("ElectricalSeries").is_none());
}

#[test]
fn test_group_with_unknown_device_is_an_error() {
    let metadata = Metadata::from_value(json!({
        "Ecephys": {
            "ElectrodeGroup": [{ "name": "0", "description": "d", "location": "l", "device": "Ghost" }],
        }
    }))
    .unwrap();
    let recording = MemoryRecording::new(vec![vec![0.0; 2]], 1000.0).unwrap();

    let result = NwbWriter.write_recording(&recording, &mut empty_nwbfile(), Some(&metadata));
    assert!(matches!(result, Err(ConvError::MissingDevice(ref name)) if name == "Ghost"));
}

#[test]
fn test_channel_group_missing_from_metadata_is_an_error() {
    let metadata = Metadata::from_value(json!({
        "Ecephys": {
            "ElectrodeGroup": [{ "name": "shank0", "description": "d", "location": "l", "device": "Device" }],
        }
    }))
    .unwrap();

    let result = NwbWriter.write_recording(&two_shank_recording(), &mut empty_nwbfile(), Some(&metadata));
    assert!(matches!(result, Err(ConvError::MissingElectrodeGroup(ref name)) if name == "shank1"));
}

#[test]
fn test_ungrouped_channels_use_first_listed_group() {
    let metadata = Metadata::from_value(json!({
        "Ecephys": {
            "ElectrodeGroup": [
                { "name": "zeta", "description": "d", "location": "l", "device": "Device" },
                { "name": "alpha", "description": "d", "location": "l", "device": "Device" },
            ],
        }
    }))
    .unwrap();
    let recording = MemoryRecording::new(vec![vec![0.0; 2]; 2], 1000.0).unwrap();
    let mut nwbfile = empty_nwbfile();

    NwbWriter.write_recording(&recording, &mut nwbfile, Some(&metadata)).unwrap();

    assert!(nwbfile.electrodes().iter().all(|e| e.group == "zeta"));
}

// 返回的每行样本数少于声明帧数的提取器
struct ShortRows;

impl RecordingExtractor for ShortRows {
    fn channel_ids(&self) -> Vec<ChannelId> {
        vec![0]
    }

    fn num_frames(&self) -> usize {
        10
    }

    fn sampling_frequency(&self) -> f64 {
        1000.0
    }

    fn traces(&self, channel_ids: &[ChannelId], _start: usize, _end: usize) -> Result<Vec<Vec<f64>>> {
        Ok(vec![vec![0.0; 3]; channel_ids.len()])
    }
}

#[test]
fn test_short_trace_rows_are_an_error() {
    let result = NwbWriter.write_recording(&ShortRows, &mut empty_nwbfile(), None);
    assert!(matches!(result, Err(ConvError::InvalidRecording(_))));
}

#[test]
fn test_existing_objects_are_reused() {
    let mut nwbfile = empty_nwbfile();
    nwbfile
        .add_device(Device { name: "Device".to_string(), description: None, manufacturer: None })
        .unwrap();

    let first = MemoryRecording::new(vec![vec![0.0; 3]; 2], 1000.0).unwrap();
    NwbWriter.write_recording(&first, &mut nwbfile, None).unwrap();

    // 第二次写入：通道1已存在，通道2是新的
    let second = MemoryRecording::new(vec![vec![1.0; 3]; 2], 1000.0)
        .unwrap()
        .with_channel_ids(vec![1, 2])
        .unwrap();
    let metadata = Metadata::from_value(json!({ "Ecephys": { "ElectricalSeries": { "name": "second" } } })).unwrap();
    NwbWriter.write_recording(&second, &mut nwbfile, Some(&metadata)).unwrap();

    assert_eq!(nwbfile.devices().count(), 1);
    assert!(nwbfile.device("Device").unwrap().description.is_none());
    let ids: Vec<_> = nwbfile.electrodes().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(nwbfile.acquisition("second").unwrap().electrodes, vec![1, 2]);
}

#[test]
fn test_duplicate_series_name_is_an_error() {
    let recording = MemoryRecording::new(vec![vec![0.0; 3]], 1000.0).unwrap();
    let mut nwbfile = empty_nwbfile();
    NwbWriter.write_recording(&recording, &mut nwbfile, None).unwrap();

    let result = NwbWriter.write_recording(&recording, &mut nwbfile, None);
    assert!(matches!(result, Err(ConvError::DuplicateObject { kind: "acquisition", .. })));
}

#[test]
fn test_edf_conversion_saved_and_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let edf_path = dir.path().join("session.edf");
    TestEdf::default().write(&edf_path).unwrap();

    let interface = RecordingInterface::<EdfRecording>::new(&json!({ "file_path": edf_path })).unwrap();
    let mut metadata = interface.metadata();
    let session = metadata.nwbfile.as_mut().unwrap();
    assert_eq!(session.session_start_time.as_deref(), Some("2001-04-17T09:30:05"));
    session.session_description = "EDF import".to_string();
    session.identifier = "edf-import".to_string();

    let mut nwbfile = NwbFile::from_metadata(&metadata).unwrap();
    interface.convert_data(&mut nwbfile, Some(&metadata), true).unwrap();

    let out_path = dir.path().join("session.nwb.json");
    nwbfile.save(&out_path).unwrap();
    let loaded = NwbFile::load(&out_path).unwrap();

    assert_eq!(loaded.identifier, "edf-import");
    assert_eq!(loaded.session_start_time.to_rfc3339(), "2001-04-17T09:30:05+00:00");
    let series = loaded.acquisition("ElectricalSeries").unwrap();
    assert_eq!(series.num_frames(), 100);
    assert_eq!(series.num_channels(), 2);
    assert_eq!(series.rate, 256.0);
    assert!((series.data[5][1] - TestEdf::physical_value(1, 5)).abs() < 1e-6);
    assert_eq!(loaded.electrodes()[0].label.as_deref(), Some("EEG Fp1"));
    assert!(loaded.electrodes()[0].x.is_nan());
}

#[test]
fn test_from_metadata_requires_start_time() {
    let metadata = Metadata::from_value(json!({ "NWBFile": { "session_description": "x", "identifier": "y" } })).unwrap();
    assert!(matches!(NwbFile::from_metadata(&metadata), Err(ConvError::InvalidMetadata(_))));
    assert!(matches!(NwbFile::from_metadata(&Metadata::default()), Err(ConvError::InvalidMetadata(_))));
}
