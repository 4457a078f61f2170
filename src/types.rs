use serde::{Deserialize, Serialize};

/// Identifier of a recording channel.
pub type ChannelId = u32;

/// Per-channel information an extractor may know about.
///
/// Every field is optional; writers fall back to defaults for anything
/// the extractor leaves unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub label: Option<String>,
    /// 通道所属的电极组名称
    pub group: Option<String>,
    /// 电极位置（x, y[, z]）
    pub location: Option<Vec<f64>>,
    /// 数字值到微伏的换算系数
    pub gain: Option<f64>,
}

/// Parameters of a single EDF signal as stored in the file header.
#[derive(Debug, Clone)]
pub struct SignalParam {
    pub label: String,
    pub samples_in_file: i64,
    pub physical_max: f64,
    pub physical_min: f64,
    pub digital_max: i32,
    pub digital_min: i32,
    pub samples_per_record: i32,
    pub physical_dimension: String,
    pub prefilter: String,
    pub transducer: String,
}

impl SignalParam {
    /// 每个数字单位对应的物理值
    pub fn bit_value(&self) -> f64 {
        (self.physical_max - self.physical_min) /
        (self.digital_max - self.digital_min) as f64
    }

    pub fn offset(&self) -> f64 {
        self.physical_max / self.bit_value() - self.digital_max as f64
    }

    /// Converts a stored digital sample to its physical value, clamping it
    /// to the declared digital range first.
    pub fn to_physical(&self, digital_value: i32) -> f64 {
        let clamped = digital_value.max(self.digital_min).min(self.digital_max);
        self.bit_value() * (self.offset() + clamped as f64)
    }

    /// Factor that turns this signal's physical unit into microvolts.
    ///
    /// Returns `None` for units that are not a voltage.
    pub fn microvolt_scale(&self) -> Option<f64> {
        match self.physical_dimension.trim() {
            "uV" | "µV" | "μV" => Some(1.0),
            "nV" => Some(1e-3),
            "mV" => Some(1e3),
            "V" => Some(1e6),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(dimension: &str) -> SignalParam {
        SignalParam {
            label: "EEG Fp1".to_string(),
            samples_in_file: 0,
            physical_max: 100.0,
            physical_min: -100.0,
            digital_max: 32767,
            digital_min: -32768,
            samples_per_record: 256,
            physical_dimension: dimension.to_string(),
            prefilter: String::new(),
            transducer: String::new(),
        }
    }

    #[test]
    fn test_to_physical_clamps() {
        let s = signal("uV");
        assert!((s.to_physical(32767) - 100.0).abs() < 1e-9);
        assert!((s.to_physical(-32768) + 100.0).abs() < 1e-9);
        assert!((s.to_physical(16384) - 50.0).abs() < 0.1);
    }

    #[test]
    fn test_to_physical_with_inverted_digital_range() {
        let mut s = signal("uV");
        s.digital_min = 32767;
        s.digital_max = -32768;
        // 不应panic
        assert!(s.to_physical(0).is_finite());
    }

    #[test]
    fn test_microvolt_scale() {
        assert_eq!(signal("uV").microvolt_scale(), Some(1.0));
        assert_eq!(signal("mV").microvolt_scale(), Some(1e3));
        assert_eq!(signal("V").microvolt_scale(), Some(1e6));
        assert_eq!(signal("degC").microvolt_scale(), None);
    }
}
