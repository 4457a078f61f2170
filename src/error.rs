use std::io;
use thiserror::Error;

use crate::types::ChannelId;

#[derive(Debug, Error)]
pub enum ConvError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File is discontinuous")]
    DiscontinuousFile,

    #[error("Invalid number of signals: {0}")]
    InvalidSignalCount(i32),

    #[error("Physical min equals physical max")]
    PhysicalMinEqualsMax,

    #[error("Digital min equals digital max")]
    DigitalMinEqualsMax,

    #[error("Invalid input arguments: {0}")]
    InvalidInputArgs(#[source] serde_json::Error),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Invalid recording: {0}")]
    InvalidRecording(String),

    #[error("Channel {0} not found in recording")]
    ChannelNotFound(ChannelId),

    #[error("Channel {0} requested more than once")]
    DuplicateChannel(ChannelId),

    #[error("Frame range {start}..{end} out of bounds for {num_frames} frames")]
    FrameRangeOutOfBounds {
        start: usize,
        end: usize,
        num_frames: usize,
    },

    #[error("Device '{0}' is not present in the NWB file")]
    MissingDevice(String),

    #[error("Electrode group '{0}' is not present in the NWB file")]
    MissingElectrodeGroup(String),

    #[error("Duplicate {kind} '{name}' in the NWB file")]
    DuplicateObject {
        kind: &'static str,
        name: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConvError>;
