// Internal utilities for documentation and integration tests.
// Generates small EDF+ files with predictable sample values.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Description of a synthetic EDF+C file.
///
/// Every data signal uses a digital range of ±32767 mapped onto ±3276.7
/// physical units, so a stored digital value `d` reads back as `d / 10`.
#[derive(Debug, Clone)]
pub struct TestEdf {
    pub labels: Vec<String>,
    pub samples_per_record: usize,
    pub num_records: usize,
    pub record_duration: f64,
    pub physical_dimension: String,
    /// "dd.mm.yy"
    pub start_date: String,
    /// "hh.mm.ss"
    pub start_time: String,
    pub with_annotations: bool,
}

impl Default for TestEdf {
    fn default() -> Self {
        TestEdf {
            labels: vec!["EEG Fp1".to_string(), "EEG Fp2".to_string()],
            samples_per_record: 256,
            num_records: 2,
            record_duration: 1.0,
            physical_dimension: "uV".to_string(),
            start_date: "17.04.01".to_string(),
            start_time: "09.30.05".to_string(),
            with_annotations: true,
        }
    }
}

impl TestEdf {
    /// Digital value stored for `channel` at `frame`.
    pub fn digital_value(channel: usize, frame: usize) -> i16 {
        ((channel * 1000 + frame) % 30000) as i16
    }

    /// Physical value (in the file's unit) stored for `channel` at `frame`.
    pub fn physical_value(channel: usize, frame: usize) -> f64 {
        Self::digital_value(channel, frame) as f64 / 10.0
    }

    pub fn num_frames(&self) -> usize {
        self.samples_per_record * self.num_records
    }

    /// Writes the file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let annotation_samples = 30;
        let ns = self.labels.len() + usize::from(self.with_annotations);
        let mut out = BufWriter::new(File::create(path)?);

        let mut main_header = Vec::with_capacity(256);
        put(&mut main_header, "0", 8);
        put(&mut main_header, "X X X X", 80);
        put(&mut main_header, "Startdate X X X X", 80);
        put(&mut main_header, &self.start_date, 8);
        put(&mut main_header, &self.start_time, 8);
        put(&mut main_header, &((ns + 1) * 256).to_string(), 8);
        put(&mut main_header, if self.with_annotations { "EDF+C" } else { "" }, 44);
        put(&mut main_header, &self.num_records.to_string(), 8);
        put(&mut main_header, &self.record_duration.to_string(), 8);
        put(&mut main_header, &ns.to_string(), 4);
        out.write_all(&main_header)?;

        // 信号头部字段按信号交错排列
        let mut labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        let mut dimensions = vec![self.physical_dimension.as_str(); self.labels.len()];
        let mut samples = vec![self.samples_per_record; self.labels.len()];
        if self.with_annotations {
            labels.push("EDF Annotations");
            dimensions.push("");
            samples.push(annotation_samples);
        }

        let mut signal_header = Vec::with_capacity(ns * 256);
        for label in &labels { put(&mut signal_header, label, 16); }
        for _ in 0..ns { put(&mut signal_header, "", 80); }
        for dimension in &dimensions { put(&mut signal_header, dimension, 8); }
        for _ in 0..ns { put(&mut signal_header, "-3276.7", 8); }
        for _ in 0..ns { put(&mut signal_header, "3276.7", 8); }
        for _ in 0..ns { put(&mut signal_header, "-32767", 8); }
        for _ in 0..ns { put(&mut signal_header, "32767", 8); }
        for _ in 0..ns { put(&mut signal_header, "", 80); }
        for n in &samples { put(&mut signal_header, &n.to_string(), 8); }
        for _ in 0..ns { put(&mut signal_header, "", 32); }
        out.write_all(&signal_header)?;

        for record in 0..self.num_records {
            for channel in 0..self.labels.len() {
                for i in 0..self.samples_per_record {
                    let frame = record * self.samples_per_record + i;
                    out.write_all(&Self::digital_value(channel, frame).to_le_bytes())?;
                }
            }
            if self.with_annotations {
                // 时间戳TAL: "+<onset>\x14\x14\0"，其余填0
                let mut tal = vec![0u8; annotation_samples * 2];
                let onset = format!("+{}\x14\x14", record as f64 * self.record_duration);
                tal[..onset.len()].copy_from_slice(onset.as_bytes());
                out.write_all(&tal)?;
            }
        }

        out.flush()
    }
}

fn put(buf: &mut Vec<u8>, value: &str, width: usize) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(width);
    buf.extend_from_slice(&bytes[..len]);
    buf.extend(std::iter::repeat(b' ').take(width - len));
}
