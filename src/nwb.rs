//! In-memory NWB document and the extracellular-ephys types it holds.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::error::{ConvError, Result};
use crate::metadata::Metadata;
use crate::schema::{schema_from_fields, FieldKind, FieldSpec, JsonType};
use crate::types::ChannelId;

/// An NWB type with a declarative field description.
///
/// The field list plays the role of the type's constructor documentation:
/// it drives the schema returned by [`NwbDescriptor::schema`].
pub trait NwbDescriptor {
    /// Namespace-qualified type name, e.g. `core.Device`
    const TAG: &'static str;

    fn fields() -> Vec<FieldSpec>;

    fn schema() -> Value {
        schema_from_fields(Self::TAG, &Self::fields())
    }
}

/// Acquisition hardware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
}

impl NwbDescriptor for Device {
    const TAG: &'static str = "core.Device";

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::required("name", "the name of this device", FieldKind::Plain(JsonType::String)),
            FieldSpec::optional("description", "Description of the device (e.g., model, firmware version, processing software version, etc.)", FieldKind::Plain(JsonType::String), Value::Null),
            FieldSpec::optional("manufacturer", "the name of the manufacturer of this device", FieldKind::Plain(JsonType::String), Value::Null),
        ]
    }
}

/// Physical grouping of electrodes, e.g. a shank or a tetrode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectrodeGroup {
    pub name: String,
    pub description: String,
    pub location: String,
    /// Name of the device this group belongs to
    pub device: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec<f64>>,
}

impl NwbDescriptor for ElectrodeGroup {
    const TAG: &'static str = "core.ElectrodeGroup";

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::required("name", "the name of this electrode group", FieldKind::Plain(JsonType::String)),
            FieldSpec::required("description", "description of this electrode group", FieldKind::Plain(JsonType::String)),
            FieldSpec::required("location", "description of location of this electrode group", FieldKind::Plain(JsonType::String)),
            FieldSpec::required("device", "the device that was used to record from this electrode group", FieldKind::Link(Device::TAG)),
            FieldSpec::optional("position", "stereotaxic position of this electrode group (x, y, z)", FieldKind::Plain(JsonType::Array), Value::Null),
        ]
    }
}

/// One row of the electrodes table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Electrode {
    pub id: ChannelId,
    /// NaN when unknown
    #[serde(deserialize_with = "nan_if_null")]
    pub x: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub y: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub z: f64,
    pub imp: f64,
    pub location: String,
    pub filtering: String,
    /// Name of the electrode group
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Voltage traces sampled from a set of electrodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricalSeries {
    pub name: String,
    pub description: String,
    pub comments: String,
    /// Frame-major samples: `data[frame][channel]`
    pub data: Vec<Vec<f64>>,
    /// Row indices into the electrodes table, one per data column
    pub electrodes: Vec<usize>,
    pub rate: f64,
    pub starting_time: f64,
    /// Multiplier from stored values to volts
    pub conversion: f64,
    pub resolution: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_conversion: Option<Vec<f64>>,
}

impl ElectricalSeries {
    pub fn num_frames(&self) -> usize {
        self.data.len()
    }

    pub fn num_channels(&self) -> usize {
        self.electrodes.len()
    }
}

impl NwbDescriptor for ElectricalSeries {
    const TAG: &'static str = "core.ElectricalSeries";

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::required("name", "The name of this TimeSeries dataset", FieldKind::Plain(JsonType::String)),
            FieldSpec::required("data", "The data values. Can be 1D or 2D. The first dimension must be time. The second dimension represents electrodes/channels.", FieldKind::Plain(JsonType::Array)),
            FieldSpec::required("electrodes", "the table region corresponding to the electrodes from which this series was recorded", FieldKind::Link("core.DynamicTableRegion")),
            FieldSpec::optional("channel_conversion", "Channel-specific conversion factor, applied in addition to conversion", FieldKind::Plain(JsonType::Array), Value::Null),
            FieldSpec::optional("resolution", "The smallest meaningful difference (in specified unit) between values in data", FieldKind::Plain(JsonType::Number), json!(-1.0)),
            FieldSpec::optional("conversion", "Scalar to multiply each element in data to convert it to the specified unit", FieldKind::Plain(JsonType::Number), json!(1.0)),
            FieldSpec::optional("starting_time", "The timestamp of the first sample", FieldKind::Plain(JsonType::Number), Value::Null),
            FieldSpec::optional("rate", "Sampling rate in Hz", FieldKind::Plain(JsonType::Number), Value::Null),
            FieldSpec::optional("comments", "Human-readable comments about this TimeSeries dataset", FieldKind::Plain(JsonType::String), json!("no comments")),
            FieldSpec::optional("description", "Description of this TimeSeries dataset", FieldKind::Plain(JsonType::String), json!("no description")),
        ]
    }
}

/// An NWB document being assembled.
///
/// Objects are keyed by name; electrodes keep insertion order because
/// electrical series reference them by row index.
///
/// # Examples
///
/// ```rust
/// use chrono::DateTime;
/// use nwbconv::nwb::{Device, NwbFile};
///
/// let start = DateTime::parse_from_rfc3339("2020-01-01T12:00:00+00:00").unwrap();
/// let mut nwbfile = NwbFile::new("mouse V1 recording", "session-001", start);
/// nwbfile.add_device(Device {
///     name: "Probe".to_string(),
///     description: None,
///     manufacturer: Some("IMEC".to_string()),
/// })?;
/// assert!(nwbfile.device("Probe").is_some());
/// assert!(nwbfile.to_json()?.contains("\"identifier\":\"session-001\""));
/// # Ok::<(), nwbconv::ConvError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NwbFile {
    pub session_description: String,
    pub identifier: String,
    pub session_start_time: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimenter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab: Option<String>,
    #[serde(default)]
    devices: BTreeMap<String, Device>,
    #[serde(default)]
    electrode_groups: BTreeMap<String, ElectrodeGroup>,
    #[serde(default)]
    electrodes: Vec<Electrode>,
    #[serde(default)]
    acquisition: BTreeMap<String, ElectricalSeries>,
}

impl NwbFile {
    pub fn new(
        session_description: &str,
        identifier: &str,
        session_start_time: DateTime<FixedOffset>,
    ) -> Self {
        NwbFile {
            session_description: session_description.to_string(),
            identifier: identifier.to_string(),
            session_start_time,
            experimenter: None,
            institution: None,
            lab: None,
            devices: BTreeMap::new(),
            electrode_groups: BTreeMap::new(),
            electrodes: Vec::new(),
            acquisition: BTreeMap::new(),
        }
    }

    /// Creates an empty document from the `NWBFile` section of `metadata`.
    ///
    /// # Errors
    ///
    /// * `ConvError::InvalidMetadata` - the section is missing, or its start
    ///   time is neither RFC 3339 nor a naive `YYYY-MM-DDTHH:MM:SS` (read as UTC)
    pub fn from_metadata(metadata: &Metadata) -> Result<Self> {
        let section = metadata
            .nwbfile
            .as_ref()
            .ok_or_else(|| ConvError::InvalidMetadata("missing NWBFile section".to_string()))?;
        let start_text = section
            .session_start_time
            .as_deref()
            .ok_or_else(|| ConvError::InvalidMetadata("missing NWBFile.session_start_time".to_string()))?;

        let mut nwbfile = NwbFile::new(
            &section.session_description,
            &section.identifier,
            parse_start_time(start_text)?,
        );
        nwbfile.experimenter = section.experimenter.clone();
        nwbfile.institution = section.institution.clone();
        nwbfile.lab = section.lab.clone();
        Ok(nwbfile)
    }

    pub fn add_device(&mut self, device: Device) -> Result<()> {
        if self.devices.contains_key(&device.name) {
            return Err(ConvError::DuplicateObject { kind: "device", name: device.name });
        }
        self.devices.insert(device.name.clone(), device);
        Ok(())
    }

    pub fn add_electrode_group(&mut self, group: ElectrodeGroup) -> Result<()> {
        if !self.devices.contains_key(&group.device) {
            return Err(ConvError::MissingDevice(group.device));
        }
        if self.electrode_groups.contains_key(&group.name) {
            return Err(ConvError::DuplicateObject { kind: "electrode group", name: group.name });
        }
        self.electrode_groups.insert(group.name.clone(), group);
        Ok(())
    }

    /// Appends a row to the electrodes table and returns its index.
    pub fn add_electrode(&mut self, electrode: Electrode) -> Result<usize> {
        if !self.electrode_groups.contains_key(&electrode.group) {
            return Err(ConvError::MissingElectrodeGroup(electrode.group));
        }
        if self.electrode_index(electrode.id).is_some() {
            return Err(ConvError::DuplicateObject { kind: "electrode", name: electrode.id.to_string() });
        }
        self.electrodes.push(electrode);
        Ok(self.electrodes.len() - 1)
    }

    pub fn add_acquisition(&mut self, series: ElectricalSeries) -> Result<()> {
        if self.acquisition.contains_key(&series.name) {
            return Err(ConvError::DuplicateObject { kind: "acquisition", name: series.name });
        }
        if let Some(row) = series.electrodes.iter().find(|row| **row >= self.electrodes.len()) {
            return Err(ConvError::InvalidRecording(format!(
                "series '{}' references electrode row {} of {}",
                series.name, row, self.electrodes.len()
            )));
        }
        self.acquisition.insert(series.name.clone(), series);
        Ok(())
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn electrode_group(&self, name: &str) -> Option<&ElectrodeGroup> {
        self.electrode_groups.get(name)
    }

    pub fn electrode_groups(&self) -> impl Iterator<Item = &ElectrodeGroup> {
        self.electrode_groups.values()
    }

    pub fn electrodes(&self) -> &[Electrode] {
        &self.electrodes
    }

    /// Row of the electrode with the given id.
    pub fn electrode_index(&self, id: ChannelId) -> Option<usize> {
        self.electrodes.iter().position(|e| e.id == id)
    }

    pub fn acquisition(&self, name: &str) -> Option<&ElectricalSeries> {
        self.acquisition.get(name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Writes the document as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

// serde_json 把 NaN 写成 null
fn nan_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn parse_start_time(text: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Ok(time);
    }
    // 无时区信息时按UTC处理
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|_| ConvError::InvalidMetadata(format!("invalid session_start_time '{}'", text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_file() -> NwbFile {
        let start = DateTime::parse_from_rfc3339("2020-01-01T00:00:00+00:00").unwrap();
        NwbFile::new("test", "id", start)
    }

    fn device(name: &str) -> Device {
        Device { name: name.to_string(), description: None, manufacturer: None }
    }

    fn group(name: &str, device: &str) -> ElectrodeGroup {
        ElectrodeGroup {
            name: name.to_string(),
            description: "desc".to_string(),
            location: "CA1".to_string(),
            device: device.to_string(),
            position: None,
        }
    }

    fn electrode(id: ChannelId, group: &str) -> Electrode {
        Electrode {
            id,
            x: f64::NAN,
            y: f64::NAN,
            z: f64::NAN,
            imp: -1.0,
            location: "unknown".to_string(),
            filtering: "none".to_string(),
            group: group.to_string(),
            label: None,
        }
    }

    #[test]
    fn test_group_requires_device() {
        let mut nwbfile = empty_file();
        assert!(matches!(
            nwbfile.add_electrode_group(group("g", "missing")),
            Err(ConvError::MissingDevice(_))
        ));
        nwbfile.add_device(device("missing")).unwrap();
        nwbfile.add_electrode_group(group("g", "missing")).unwrap();
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut nwbfile = empty_file();
        nwbfile.add_device(device("d")).unwrap();
        assert!(matches!(nwbfile.add_device(device("d")), Err(ConvError::DuplicateObject { .. })));

        nwbfile.add_electrode_group(group("g", "d")).unwrap();
        assert_eq!(nwbfile.add_electrode(electrode(3, "g")).unwrap(), 0);
        assert_eq!(nwbfile.add_electrode(electrode(4, "g")).unwrap(), 1);
        assert!(nwbfile.add_electrode(electrode(3, "g")).is_err());
        assert!(matches!(
            nwbfile.add_electrode(electrode(5, "other")),
            Err(ConvError::MissingElectrodeGroup(_))
        ));
        assert_eq!(nwbfile.electrode_index(4), Some(1));
    }

    #[test]
    fn test_parse_start_time() {
        let t = parse_start_time("2021-06-01T08:00:00+02:00").unwrap();
        assert_eq!(t.offset().local_minus_utc(), 7200);
        let t = parse_start_time("2021-06-01T08:00:00").unwrap();
        assert_eq!(t.offset().local_minus_utc(), 0);
        assert!(parse_start_time("yesterday").is_err());
    }

    #[test]
    fn test_descriptor_schemas() {
        let schema = ElectrodeGroup::schema();
        assert_eq!(schema["tag"], "core.ElectrodeGroup");
        assert_eq!(schema["properties"]["device"]["target"], "core.Device");
        assert_eq!(schema["required"], json!(["name", "description", "location", "device"]));

        let schema = ElectricalSeries::schema();
        assert_eq!(schema["properties"]["conversion"]["default"], 1.0);
        assert_eq!(schema["required"], json!(["name", "data", "electrodes"]));

        assert_eq!(Device::schema()["required"], json!(["name"]));
    }
}
