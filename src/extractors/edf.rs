use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConvError, Result};
use crate::extractors::{parse_args, ExtractorSource};
use crate::recording::RecordingExtractor;
use crate::schema::{JsonType, ParamSpec};
use crate::types::{ChannelId, ChannelInfo, SignalParam};

pub const EDF_MAX_SIGNALS: usize = 4096;
const ANNOTATION_LABEL: &str = "EDF Annotations";

/// Parsed EDF/EDF+ file header.
#[derive(Debug, Clone)]
pub struct EdfHeader {
    pub patient: String,
    pub recording: String,
    pub start: NaiveDateTime,
    pub is_edfplus: bool,
    pub datarecords_in_file: i64,
    /// 数据记录时长（秒）
    pub datarecord_duration: f64,
    /// Data signals only; annotation signals are left out
    pub signals: Vec<SignalParam>,
}

#[derive(Debug, Clone)]
struct SignalLayout {
    /// 信号在数据记录中的字节偏移
    buffer_offset: usize,
    /// 物理单位到微伏的换算系数
    scale: f64,
}

/// Recording extractor backed by an EDF or EDF+C file.
///
/// Each data signal becomes one channel; channel ids are the signal's
/// position among the data signals. Annotation signals are skipped. All data
/// signals must share one sampling rate.
///
/// # Examples
///
/// ```rust
/// use nwbconv::{EdfRecording, RecordingExtractor};
/// # use nwbconv::doctest_utils::TestEdf;
/// # let dir = tempfile::tempdir()?;
/// # let path = dir.path().join("recording.edf");
/// # TestEdf::default().write(&path)?;
///
/// let recording = EdfRecording::open(&path)?;
/// println!("{} channels at {} Hz", recording.num_channels(), recording.sampling_frequency());
///
/// let first_second = recording.traces(&[0], 0, 256)?;
/// assert_eq!(first_second[0].len(), 256);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct EdfRecording {
    file: RefCell<BufReader<File>>,
    path: PathBuf,
    header: EdfHeader,
    layout: Vec<SignalLayout>,
    header_size: usize,
    record_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EdfArgs {
    file_path: PathBuf,
}

impl EdfRecording {
    /// Opens an EDF file and parses its header.
    ///
    /// # Errors
    ///
    /// * `ConvError::FileNotFound` - the file can't be opened
    /// * `ConvError::UnsupportedFileType` - not an EDF file
    /// * `ConvError::DiscontinuousFile` - an EDF+D file
    /// * `ConvError::InvalidFormat` - malformed header fields
    /// * `ConvError::InvalidRecording` - no data signals, or signals with
    ///   different sampling rates
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ConvError::FileNotFound(format!("{}: {}", path.display(), e)))?;
        let mut reader = BufReader::new(file);

        let (header, layout, header_size, record_size) = parse_header(&mut reader)?;

        if header.signals.is_empty() {
            return Err(ConvError::InvalidRecording("EDF file has no data signals".to_string()));
        }
        let samples_per_record = header.signals[0].samples_per_record;
        if let Some(other) = header.signals.iter().find(|s| s.samples_per_record != samples_per_record) {
            return Err(ConvError::InvalidRecording(format!(
                "signal '{}' has {} samples per record, expected {}",
                other.label, other.samples_per_record, samples_per_record
            )));
        }

        tracing::debug!(
            path = %path.display(),
            signals = header.signals.len(),
            records = header.datarecords_in_file,
            edfplus = header.is_edfplus,
            "opened EDF recording"
        );

        Ok(EdfRecording {
            file: RefCell::new(reader),
            path: path.to_path_buf(),
            header,
            layout,
            header_size,
            record_size,
        })
    }

    pub fn header(&self) -> &EdfHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn samples_per_record(&self) -> usize {
        self.header.signals[0].samples_per_record as usize
    }

    fn signal_index(&self, channel_id: ChannelId) -> Result<usize> {
        let index = channel_id as usize;
        if index < self.header.signals.len() {
            Ok(index)
        } else {
            Err(ConvError::ChannelNotFound(channel_id))
        }
    }

    fn read_signal(&self, signal: usize, start_frame: usize, end_frame: usize) -> Result<Vec<f64>> {
        let param = &self.header.signals[signal];
        let layout = &self.layout[signal];
        let samples_per_record = self.samples_per_record();

        let mut file = self.file.borrow_mut();
        let mut samples = Vec::with_capacity(end_frame - start_frame);
        let mut frame = start_frame;

        while frame < end_frame {
            let record_index = frame / samples_per_record;
            let sample_in_record = frame % samples_per_record;
            let count = (samples_per_record - sample_in_record).min(end_frame - frame);

            let file_offset = self.header_size as u64
                + record_index as u64 * self.record_size as u64
                + layout.buffer_offset as u64
                + sample_in_record as u64 * 2; // 每个样本2字节
            file.seek(SeekFrom::Start(file_offset))?;

            let mut buf = vec![0u8; count * 2];
            file.read_exact(&mut buf)?;
            samples.extend(buf.chunks_exact(2).map(|b| {
                let digital = i16::from_le_bytes([b[0], b[1]]) as i32;
                param.to_physical(digital) * layout.scale
            }));

            frame += count;
        }

        Ok(samples)
    }
}

impl RecordingExtractor for EdfRecording {
    fn channel_ids(&self) -> Vec<ChannelId> {
        (0..self.header.signals.len() as ChannelId).collect()
    }

    fn num_channels(&self) -> usize {
        self.header.signals.len()
    }

    fn num_frames(&self) -> usize {
        self.samples_per_record() * self.header.datarecords_in_file as usize
    }

    fn sampling_frequency(&self) -> f64 {
        self.samples_per_record() as f64 / self.header.datarecord_duration
    }

    fn traces(&self, channel_ids: &[ChannelId], start_frame: usize, end_frame: usize) -> Result<Vec<Vec<f64>>> {
        let num_frames = self.num_frames();
        if start_frame > end_frame || end_frame > num_frames {
            return Err(ConvError::FrameRangeOutOfBounds { start: start_frame, end: end_frame, num_frames });
        }
        channel_ids
            .iter()
            .map(|id| {
                let signal = self.signal_index(*id)?;
                self.read_signal(signal, start_frame, end_frame)
            })
            .collect()
    }

    fn channel_info(&self, channel_id: ChannelId) -> Option<ChannelInfo> {
        let signal = self.signal_index(channel_id).ok()?;
        let param = &self.header.signals[signal];
        Some(ChannelInfo {
            label: Some(param.label.clone()),
            group: None,
            location: None,
            gain: Some(param.bit_value() * self.layout[signal].scale),
        })
    }

    fn start_time(&self) -> Option<NaiveDateTime> {
        Some(self.header.start)
    }
}

impl ExtractorSource for EdfRecording {
    fn input_params() -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("file_path", JsonType::String)
                .with_format("file")
                .with_description("Path to the EDF or EDF+ file"),
        ]
    }

    fn from_input_args(args: &Value) -> Result<Self> {
        let args: EdfArgs = parse_args(args)?;
        EdfRecording::open(args.file_path)
    }
}

fn parse_header(reader: &mut BufReader<File>) -> Result<(EdfHeader, Vec<SignalLayout>, usize, usize)> {
    // 主头部（256字节）
    reader.seek(SeekFrom::Start(0))?;
    let mut main_header = vec![0u8; 256];
    reader.read_exact(&mut main_header)
        .map_err(|_| ConvError::UnsupportedFileType("file is shorter than an EDF header".to_string()))?;

    let version = text(&main_header, 0..8);
    if version != "0" {
        return Err(ConvError::UnsupportedFileType(format!("Not an EDF file: '{}'", version)));
    }

    let signal_count = int_field(&main_header, 252..256, "number of signals")?;
    if signal_count < 1 || signal_count > EDF_MAX_SIGNALS as i64 {
        return Err(ConvError::InvalidSignalCount(signal_count as i32));
    }
    let signal_count = signal_count as usize;

    let header_size = int_field(&main_header, 184..192, "header size")?;
    if header_size != ((signal_count + 1) * 256) as i64 {
        return Err(ConvError::InvalidFormat(format!(
            "header size {} does not match {} signals", header_size, signal_count
        )));
    }

    let reserved = text(&main_header, 192..236);
    if reserved.starts_with("EDF+D") {
        return Err(ConvError::DiscontinuousFile);
    }
    let is_edfplus = reserved.starts_with("EDF+C");

    let start = parse_start(&text(&main_header, 168..176), &text(&main_header, 176..184))?;

    let datarecords_in_file = int_field(&main_header, 236..244, "number of data records")?;
    if datarecords_in_file < 0 {
        return Err(ConvError::InvalidFormat(format!(
            "number of data records is {} (file not finalized?)", datarecords_in_file
        )));
    }
    let datarecord_duration = float_field(&main_header, 244..252, "data record duration")?;
    if datarecord_duration <= 0.0 {
        return Err(ConvError::InvalidFormat(format!(
            "data record duration must be positive, got {}", datarecord_duration
        )));
    }

    let mut signal_header = vec![0u8; signal_count * 256];
    reader.read_exact(&mut signal_header)?;
    let (signals, layout, record_size) = parse_signals(&signal_header, signal_count, datarecords_in_file)?;

    let header = EdfHeader {
        patient: text(&main_header, 8..88),
        recording: text(&main_header, 88..168),
        start,
        is_edfplus,
        datarecords_in_file,
        datarecord_duration,
        signals,
    };

    Ok((header, layout, header_size as usize, record_size))
}

fn parse_signals(
    signal_header: &[u8],
    ns: usize,
    datarecords: i64,
) -> Result<(Vec<SignalParam>, Vec<SignalLayout>, usize)> {
    let mut signals = Vec::new();
    let mut layout = Vec::new();
    let mut buffer_offset = 0;

    for i in 0..ns {
        // 各字段按信号交错排列：先是所有标签，然后是所有传感器类型，依此类推
        let label = text(signal_header, i * 16..(i + 1) * 16);
        let samples_per_record = int_field(
            signal_header,
            ns * 216 + i * 8..ns * 216 + (i + 1) * 8,
            "samples per record",
        )?;
        if samples_per_record < 1 {
            return Err(ConvError::InvalidFormat(format!(
                "signal '{}' has {} samples per record", label, samples_per_record
            )));
        }

        if label != ANNOTATION_LABEL {
            let param = SignalParam {
                transducer: text(signal_header, ns * 16 + i * 80..ns * 16 + (i + 1) * 80),
                physical_dimension: text(signal_header, ns * 96 + i * 8..ns * 96 + (i + 1) * 8),
                physical_min: float_field(signal_header, ns * 104 + i * 8..ns * 104 + (i + 1) * 8, "physical minimum")?,
                physical_max: float_field(signal_header, ns * 112 + i * 8..ns * 112 + (i + 1) * 8, "physical maximum")?,
                digital_min: int_field(signal_header, ns * 120 + i * 8..ns * 120 + (i + 1) * 8, "digital minimum")? as i32,
                digital_max: int_field(signal_header, ns * 128 + i * 8..ns * 128 + (i + 1) * 8, "digital maximum")? as i32,
                prefilter: text(signal_header, ns * 136 + i * 80..ns * 136 + (i + 1) * 80),
                samples_in_file: samples_per_record * datarecords,
                samples_per_record: samples_per_record as i32,
                label,
            };
            if param.physical_min == param.physical_max {
                return Err(ConvError::PhysicalMinEqualsMax);
            }
            if param.digital_min == param.digital_max {
                return Err(ConvError::DigitalMinEqualsMax);
            }
            if param.digital_min > param.digital_max {
                return Err(ConvError::InvalidFormat(format!(
                    "signal '{}' has digital minimum {} above digital maximum {}",
                    param.label, param.digital_min, param.digital_max
                )));
            }

            let scale = param.microvolt_scale().unwrap_or_else(|| {
                tracing::warn!(
                    signal = %param.label,
                    unit = %param.physical_dimension,
                    "unknown physical unit, samples kept unscaled"
                );
                1.0
            });

            signals.push(param);
            layout.push(SignalLayout { buffer_offset, scale });
        }

        buffer_offset += samples_per_record as usize * 2;
    }

    Ok((signals, layout, buffer_offset))
}

/// "dd.mm.yy" + "hh.mm.ss"
fn parse_start(date: &str, time: &str) -> Result<NaiveDateTime> {
    let parts = |s: &str| -> Result<Vec<u32>> {
        let parts = s
            .split('.')
            .map(|p| p.trim().parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| ConvError::InvalidFormat(format!("invalid date/time field '{}'", s)))?;
        if parts.len() != 3 {
            return Err(ConvError::InvalidFormat(format!("invalid date/time field '{}'", s)));
        }
        Ok(parts)
    };

    let d = parts(date)?;
    // 85-99 表示 1985-1999
    let year = if d[2] > 84 { 1900 + d[2] } else { 2000 + d[2] };
    let start_date = NaiveDate::from_ymd_opt(year as i32, d[1], d[0])
        .ok_or_else(|| ConvError::InvalidFormat(format!("invalid start date '{}'", date)))?;

    let t = parts(time)?;
    let start_time = NaiveTime::from_hms_opt(t[0], t[1], t[2])
        .ok_or_else(|| ConvError::InvalidFormat(format!("invalid start time '{}'", time)))?;

    Ok(NaiveDateTime::new(start_date, start_time))
}

fn text(bytes: &[u8], range: Range<usize>) -> String {
    String::from_utf8_lossy(&bytes[range]).trim().to_string()
}

fn int_field(bytes: &[u8], range: Range<usize>, name: &str) -> Result<i64> {
    let s = text(bytes, range);
    s.parse()
        .map_err(|_| ConvError::InvalidFormat(format!("invalid {}: '{}'", name, s)))
}

fn float_field(bytes: &[u8], range: Range<usize>, name: &str) -> Result<f64> {
    let s = text(bytes, range);
    s.parse()
        .map_err(|_| ConvError::InvalidFormat(format!("invalid {}: '{}'", name, s)))
}
