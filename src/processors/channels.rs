//! Channel classification for `_channels.tsv`.
//!
//! Vendor column names such as `FreeAcc_X` are renamed into the controlled
//! vocabulary (`ACCEL_X`), then split into a semantic type and a component
//! axis. Units are looked up from the semantic type.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::{ConverterConfig, TypeRename};

/// Errors that can occur during channel classification.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("column '{column}' maps to channel type '{channel_type}' which has no unit")]
    UnknownChannelType {
        column: String,
        channel_type: String,
    },
}

/// Result type for classification.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Component label used when a channel has no axis.
pub const NO_COMPONENT: &str = "n/a";

/// Semantic channel types counted in the sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Accel,
    Gyro,
    Ornt,
    Latency,
    Misc,
}

impl ChannelType {
    pub const ALL: [ChannelType; 5] = [
        ChannelType::Accel,
        ChannelType::Gyro,
        ChannelType::Ornt,
        ChannelType::Latency,
        ChannelType::Misc,
    ];

    /// Label written to the `type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Accel => "ACCEL",
            ChannelType::Gyro => "GYRO",
            ChannelType::Ornt => "ORNT",
            ChannelType::Latency => "LATENCY",
            ChannelType::Misc => "MISC",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == label)
    }

    /// Types that count towards `MotionChannelCount`.
    pub fn is_motion(&self) -> bool {
        matches!(self, ChannelType::Accel | ChannelType::Gyro | ChannelType::Ornt)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `_channels.tsv`.
///
/// Field order is the column order of the written table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDescriptor {
    /// Column name exactly as in the motion table
    pub name: String,
    pub component: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub tracked_point: String,
    pub units: String,
}

impl ChannelDescriptor {
    /// Semantic type, if it is one of the counted vocabulary types.
    pub fn kind(&self) -> Option<ChannelType> {
        ChannelType::from_label(&self.channel_type)
    }
}

/// Apply the ordered substring renames to a column name.
pub fn rename_channel(name: &str, renames: &[TypeRename]) -> String {
    renames
        .iter()
        .fold(name.to_string(), |acc, r| acc.replace(&r.from, &r.to))
}

/// Split a renamed column into (type, component).
///
/// The type is the text before the first underscore; the component is the
/// next underscore-delimited segment, lower-cased.
fn split_renamed(renamed: &str) -> (String, String) {
    let mut parts = renamed.split('_');
    let channel_type = parts.next().unwrap_or_default().to_string();
    let component = match parts.next() {
        Some(axis) if !axis.is_empty() => axis.to_lowercase(),
        _ => NO_COMPONENT.to_string(),
    };
    (channel_type, component)
}

/// Classify a single column.
///
/// # Arguments
///
/// * `name` - Raw column name (e.g. `Gyr_Z`)
/// * `tracked_point` - Body location of the device the column came from
/// * `config` - Rename and unit tables
///
/// # Errors
///
/// Returns `UnknownChannelType` when the derived type has no unit entry.
/// Unknown types are never passed through as their own unit.
pub fn classify_channel(
    name: &str,
    tracked_point: &str,
    config: &ConverterConfig,
) -> Result<ChannelDescriptor> {
    let renamed = rename_channel(name, &config.channel_types);
    let (channel_type, component) = split_renamed(&renamed);

    let units = config
        .unit_for(&channel_type)
        .map_err(|_| ChannelError::UnknownChannelType {
            column: name.to_string(),
            channel_type: channel_type.clone(),
        })?
        .to_string();

    Ok(ChannelDescriptor {
        name: name.to_string(),
        component,
        channel_type,
        tracked_point: tracked_point.to_string(),
        units,
    })
}

/// Classify every column, preserving column order.
pub fn describe_channels(
    columns: &[String],
    tracked_point: &str,
    config: &ConverterConfig,
) -> Result<Vec<ChannelDescriptor>> {
    columns
        .iter()
        .map(|name| classify_channel(name, tracked_point, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classify_axis_channel() {
        let config = ConverterConfig::default();
        let desc = classify_channel("FreeAcc_X", "torso", &config).unwrap();

        assert_eq!(desc.name, "FreeAcc_X");
        assert_eq!(desc.component, "x");
        assert_eq!(desc.channel_type, "ACCEL");
        assert_eq!(desc.tracked_point, "torso");
        assert_eq!(desc.units, "m/s^2");
        assert_eq!(desc.kind(), Some(ChannelType::Accel));
    }

    #[test]
    fn test_classify_scalar_channels() {
        let config = ConverterConfig::default();

        let counter = classify_channel("PacketCounter", "torso", &config).unwrap();
        assert_eq!(counter.channel_type, "MISC");
        assert_eq!(counter.component, NO_COMPONENT);
        assert_eq!(counter.units, "n/a");

        let time = classify_channel("SampleTimeFine", "torso", &config).unwrap();
        assert_eq!(time.channel_type, "LATENCY");
        assert_eq!(time.component, NO_COMPONENT);
        assert_eq!(time.units, "s");
    }

    #[test]
    fn test_classify_orientation_and_gyro() {
        let config = ConverterConfig::default();

        let euler = classify_channel("Euler_Y", "left_leg", &config).unwrap();
        assert_eq!((euler.channel_type.as_str(), euler.component.as_str()), ("ORNT", "y"));
        assert_eq!(euler.units, "deg");

        let gyro = classify_channel("Gyr_Z", "left_leg", &config).unwrap();
        assert_eq!((gyro.channel_type.as_str(), gyro.component.as_str()), ("GYRO", "z"));
        assert_eq!(gyro.units, "deg/s");
    }

    #[test]
    fn test_classify_unknown_type_is_error() {
        let config = ConverterConfig::default();

        match classify_channel("Quat_W", "torso", &config) {
            Err(ChannelError::UnknownChannelType {
                column,
                channel_type,
            }) => {
                assert_eq!(column, "Quat_W");
                assert_eq!(channel_type, "Quat");
            }
            other => panic!("Expected UnknownChannelType, got {:?}", other),
        }
    }

    #[test]
    fn test_rename_applies_in_order() {
        let renames = vec![
            TypeRename {
                from: "Acc".into(),
                to: "ACCEL".into(),
            },
            TypeRename {
                from: "ACCEL".into(),
                to: "X".into(),
            },
        ];
        assert_eq!(rename_channel("Acc_X", &renames), "X_X");
    }

    #[test]
    fn test_describe_channels_preserves_order() {
        let config = ConverterConfig::default();
        let cols = columns(&["PacketCounter", "SampleTimeFine", "Gyr_X", "Euler_Z", "FreeAcc_Y"]);

        let channels = describe_channels(&cols, "right_head", &config).unwrap();

        assert_eq!(channels.len(), cols.len());
        for (desc, col) in channels.iter().zip(&cols) {
            assert_eq!(&desc.name, col);
            assert_eq!(desc.tracked_point, "right_head");
        }
    }

    #[test]
    fn test_channel_type_labels() {
        for kind in ChannelType::ALL {
            assert_eq!(ChannelType::from_label(kind.as_str()), Some(kind));
        }
        assert!(ChannelType::Ornt.is_motion());
        assert!(!ChannelType::Latency.is_motion());
        assert_eq!(ChannelType::Misc.to_string(), "MISC");
    }
}
