//! Sidecar metadata assembly for `_motion.json`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::channels::{ChannelDescriptor, ChannelType};
use crate::config::HeaderConfig;
use crate::core::loaders::HeaderBlock;

/// Errors that can occur while assembling a sidecar.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("header field '{0}' is missing")]
    MissingField(String),

    #[error("sampling rate '{0}' does not match '<integer>Hz'")]
    InvalidSamplingRate(String),
}

/// Result type for metadata operations.
pub type Result<T> = std::result::Result<T, MetadataError>;

static RATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(\d+)\s*hz\s*$").expect("sampling rate pattern is valid"));

/// Contents of `_motion.json`.
///
/// Field order and key spelling are those of the published sidecars,
/// including `SamplingFrequncy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MotionSidecar {
    #[serde(rename = "TaskName")]
    pub task_name: String,
    #[serde(rename = "SamplingFrequncy")]
    pub sampling_frequency: u32,
    #[serde(rename = "Manufacturer")]
    pub manufacturer: String,
    #[serde(rename = "SoftwareVersions")]
    pub software_versions: String,
    #[serde(rename = "MotionChannelCount")]
    pub motion_channel_count: usize,
    #[serde(rename = "ACCELChannelCount")]
    pub accel_channel_count: usize,
    #[serde(rename = "GYROChannelCount")]
    pub gyro_channel_count: usize,
    #[serde(rename = "ORNTChannelCount")]
    pub ornt_channel_count: usize,
    #[serde(rename = "LATENCYChannelCount")]
    pub latency_channel_count: usize,
    #[serde(rename = "MISCChannelCount")]
    pub misc_channel_count: usize,
    #[serde(rename = "TrackingSystemName")]
    pub tracking_system_name: String,
    #[serde(rename = "TrackedPointsCount")]
    pub tracked_points_count: u32,
}

impl MotionSidecar {
    /// Count recorded for a channel type.
    pub fn count_for(&self, kind: ChannelType) -> usize {
        match kind {
            ChannelType::Accel => self.accel_channel_count,
            ChannelType::Gyro => self.gyro_channel_count,
            ChannelType::Ornt => self.ornt_channel_count,
            ChannelType::Latency => self.latency_channel_count,
            ChannelType::Misc => self.misc_channel_count,
        }
    }
}

/// Parse an output rate such as `120Hz` into an integer frequency.
pub fn parse_sampling_rate(text: &str) -> Result<u32> {
    RATE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| MetadataError::InvalidSamplingRate(text.to_string()))
}

/// Tracking system label for a device, e.g. `IMU3`.
pub fn tracking_system_name(device_id: &str) -> String {
    format!("IMU{}", device_id)
}

fn require<'a>(header: &'a HeaderBlock, key: &str) -> Result<&'a str> {
    header
        .get(key)
        .ok_or_else(|| MetadataError::MissingField(key.to_string()))
}

/// Build the sidecar for one device recording.
///
/// Channel counts are taken from the same descriptors written to
/// `_channels.tsv`, so the two files always agree.
///
/// # Arguments
///
/// * `header` - Parsed vendor header
/// * `channels` - Descriptors of every table column
/// * `device_id` - Numeric device prefix from the file name
/// * `task` - Task label
/// * `keys` - Which header keys hold the rate and version
pub fn assemble_sidecar(
    header: &HeaderBlock,
    channels: &[ChannelDescriptor],
    device_id: &str,
    task: &str,
    keys: &HeaderConfig,
) -> Result<MotionSidecar> {
    let sampling_frequency = parse_sampling_rate(require(header, &keys.sampling_rate_key)?)?;
    let software_versions = require(header, &keys.software_version_key)?.to_string();

    let count = |kind: ChannelType| channels.iter().filter(|c| c.kind() == Some(kind)).count();

    let motion = channels
        .iter()
        .filter(|c| c.kind().is_some_and(|k| k.is_motion()))
        .count();

    Ok(MotionSidecar {
        task_name: task.to_string(),
        sampling_frequency,
        manufacturer: header.manufacturer.clone(),
        software_versions,
        motion_channel_count: motion,
        accel_channel_count: count(ChannelType::Accel),
        gyro_channel_count: count(ChannelType::Gyro),
        ornt_channel_count: count(ChannelType::Ornt),
        latency_channel_count: count(ChannelType::Latency),
        misc_channel_count: count(ChannelType::Misc),
        tracking_system_name: tracking_system_name(device_id),
        tracked_points_count: 1,
    })
}
