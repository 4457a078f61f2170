//! Metadata documents accepted by the conversion.
//!
//! The document mirrors the usual NWB conversion layout:
//!
//! ```json
//! {
//!   "NWBFile": { "session_description": "...", "identifier": "...", "session_start_time": "..." },
//!   "Ecephys": {
//!     "subset_channels": [0, 2],
//!     "Device": [{ "name": "Probe" }],
//!     "ElectrodeGroup": [{ "name": "shank0", "description": "...", "location": "CA1", "device": "Probe" }],
//!     "ElectricalSeries": { "name": "ElectricalSeries", "description": "raw traces" }
//!   }
//! }
//! ```
//!
//! Unknown keys are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConvError, Result};
use crate::nwb::{Device, ElectrodeGroup};
use crate::types::ChannelId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "NWBFile", default, skip_serializing_if = "Option::is_none")]
    pub nwbfile: Option<NwbFileMetadata>,
    #[serde(rename = "Ecephys", default, skip_serializing_if = "Option::is_none")]
    pub ecephys: Option<EcephysMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NwbFileMetadata {
    #[serde(default)]
    pub session_description: String,
    #[serde(default)]
    pub identifier: String,
    /// RFC 3339, or naive ISO 8601 read as UTC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimenter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EcephysMetadata {
    /// Restrict the conversion to these channels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset_channels: Option<Vec<ChannelId>>,
    #[serde(rename = "Device", default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<Device>,
    #[serde(rename = "ElectrodeGroup", default, skip_serializing_if = "Vec::is_empty")]
    pub electrode_groups: Vec<ElectrodeGroup>,
    #[serde(rename = "ElectricalSeries", default, skip_serializing_if = "Option::is_none")]
    pub electrical_series: Option<ElectricalSeriesMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricalSeriesMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl Metadata {
    /// Reads a metadata document from a JSON value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nwbconv::Metadata;
    /// use serde_json::json;
    ///
    /// let metadata = Metadata::from_value(json!({ "Ecephys": { "subset_channels": [1, 3] } }))?;
    /// assert_eq!(metadata.subset_channels(), Some(&[1, 3][..]));
    ///
    /// let metadata = Metadata::from_value(json!({ "Ecephys": {} }))?;
    /// assert_eq!(metadata.subset_channels(), None);
    /// # Ok::<(), nwbconv::ConvError>(())
    /// ```
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ConvError::InvalidMetadata(e.to_string()))
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Channels requested through `Ecephys.subset_channels`, if any.
    pub fn subset_channels(&self) -> Option<&[ChannelId]> {
        self.ecephys.as_ref()?.subset_channels.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_document() {
        let metadata = Metadata::from_value(json!({
            "NWBFile": {
                "session_description": "test session",
                "identifier": "abc",
                "session_start_time": "2020-01-01T00:00:00+00:00",
            },
            "Ecephys": {
                "Device": [{ "name": "Probe", "manufacturer": "IMEC" }],
                "ElectrodeGroup": [{
                    "name": "shank0",
                    "description": "first shank",
                    "location": "CA1",
                    "device": "Probe",
                }],
                "ElectricalSeries": { "name": "raw", "description": "raw traces" },
            },
            "Behavior": { "ignored": true },
        }))
        .unwrap();

        let ecephys = metadata.ecephys.as_ref().unwrap();
        assert_eq!(ecephys.devices[0].manufacturer.as_deref(), Some("IMEC"));
        assert_eq!(ecephys.electrode_groups[0].device, "Probe");
        assert_eq!(ecephys.electrical_series.as_ref().unwrap().name, "raw");
        assert_eq!(metadata.nwbfile.as_ref().unwrap().identifier, "abc");
        assert!(metadata.subset_channels().is_none());
    }

    #[test]
    fn test_invalid_document() {
        let result = Metadata::from_value(json!({ "Ecephys": { "subset_channels": "all" } }));
        assert!(matches!(result, Err(ConvError::InvalidMetadata(_))));
    }

    #[test]
    fn test_empty_sections_are_not_serialized() {
        let value = Metadata::default().to_value().unwrap();
        assert_eq!(value, json!({}));
    }
}
