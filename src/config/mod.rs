//! Configuration types for the Movella to BIDS converter.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("device ID '{0}' has no tracked point mapping")]
    UnknownDevice(String),

    #[error("channel type '{0}' has no unit mapping")]
    UnknownChannelType(String),

    #[error("configuration field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("timing divisor must be non-zero")]
    ZeroDivisor,

    #[error("tasks must either all name a session or none of them")]
    MixedTaskKeys,

    #[error("session '{0}' is assigned to more than one task")]
    DuplicateSession(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// One task performed by the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Session directory this task was recorded in. When every task names a
    /// session, matching is by directory name instead of sorted position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,

    /// BIDS task label (e.g. "RS")
    pub name: String,

    /// Run index, rendered as two digits in file names
    #[serde(default = "default_run")]
    pub run: u32,
}

fn default_run() -> u32 {
    1
}

impl TaskSpec {
    pub fn new(name: &str, run: u32) -> Self {
        Self {
            session: None,
            name: name.to_string(),
            run,
        }
    }

    pub fn for_session(session: &str, name: &str, run: u32) -> Self {
        Self {
            session: Some(session.to_string()),
            ..Self::new(name, run)
        }
    }

    /// True when every task names its session, so tasks are matched to
    /// session directories by name rather than by position.
    pub fn all_keyed(tasks: &[TaskSpec]) -> bool {
        !tasks.is_empty() && tasks.iter().all(|t| t.session.is_some())
    }
}

/// Vendor channel prefix renamed into the controlled vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRename {
    pub from: String,
    pub to: String,
}

impl TypeRename {
    fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// How the vendor header block is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderConfig {
    /// Field delimiter of the export
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Trailing character stripped from header keys (e.g. "OutputRate:")
    #[serde(default = "default_key_suffix")]
    pub key_suffix: char,

    /// Header key holding the output rate (e.g. "120Hz")
    #[serde(default = "default_sampling_rate_key")]
    pub sampling_rate_key: String,

    /// Header key copied into SoftwareVersions
    #[serde(default = "default_software_version_key")]
    pub software_version_key: String,
}

fn default_delimiter() -> char {
    ','
}

fn default_key_suffix() -> char {
    ':'
}

fn default_sampling_rate_key() -> String {
    "OutputRate".to_string()
}

fn default_software_version_key() -> String {
    "AppVersion".to_string()
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            key_suffix: default_key_suffix(),
            sampling_rate_key: default_sampling_rate_key(),
            software_version_key: default_software_version_key(),
        }
    }
}

/// Timing column rescale applied to every table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Column holding device timestamps in microseconds
    #[serde(default = "default_timing_column")]
    pub column: String,

    /// Divisor converting the column to seconds
    #[serde(default = "default_timing_divisor")]
    pub divisor: f64,
}

fn default_timing_column() -> String {
    "SampleTimeFine".to_string()
}

fn default_timing_divisor() -> f64 {
    1_000_000.0
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            column: default_timing_column(),
            divisor: default_timing_divisor(),
        }
    }
}

/// Main converter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Root holding one directory per acquisition date
    #[serde(default = "default_input_root")]
    pub input_root: PathBuf,

    /// BIDS dataset root
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Date token naming the session folder and embedded in file names
    #[serde(default = "default_date")]
    pub date: String,

    /// BIDS subject label (e.g. "sub-10")
    #[serde(default = "default_subject")]
    pub subject: String,

    #[serde(default = "default_tasks")]
    pub tasks: Vec<TaskSpec>,

    /// Device ID to body location
    #[serde(default = "default_tracked_points")]
    pub tracked_points: BTreeMap<String, String>,

    /// Semantic channel type to unit
    #[serde(default = "default_units")]
    pub units: BTreeMap<String, String>,

    /// Ordered substring renames applied to column names
    #[serde(default = "default_channel_types")]
    pub channel_types: Vec<TypeRename>,

    #[serde(default)]
    pub header: HeaderConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    /// Keep converting remaining files after a failure
    #[serde(default)]
    pub continue_on_error: bool,
}

fn default_input_root() -> PathBuf {
    PathBuf::from("movella_RAW")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("bids")
}

fn default_date() -> String {
    "20240729".to_string()
}

fn default_subject() -> String {
    "sub-10".to_string()
}

fn default_tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec::new("RS", 1),
        TaskSpec::new("audio", 1),
        TaskSpec::new("MA", 1),
        TaskSpec::new("MAaudio", 1),
    ]
}

fn default_tracked_points() -> BTreeMap<String, String> {
    [
        ("1", "torso"),
        ("2", "right_head"),
        ("3", "left_head"),
        ("4", "right_leg"),
        ("5", "left_leg"),
    ]
    .into_iter()
    .map(|(id, point)| (id.to_string(), point.to_string()))
    .collect()
}

fn default_units() -> BTreeMap<String, String> {
    [
        ("ACCEL", "m/s^2"),
        ("GYRO", "deg/s"),
        ("ORNT", "deg"),
        ("MISC", "n/a"),
        ("LATENCY", "s"),
    ]
    .into_iter()
    .map(|(kind, unit)| (kind.to_string(), unit.to_string()))
    .collect()
}

fn default_channel_types() -> Vec<TypeRename> {
    vec![
        TypeRename::new("Euler", "ORNT"),
        TypeRename::new("FreeAcc", "ACCEL"),
        TypeRename::new("Gyr", "GYRO"),
        TypeRename::new("PacketCounter", "MISC"),
        TypeRename::new("SampleTimeFine", "LATENCY"),
    ]
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            input_root: default_input_root(),
            output_root: default_output_root(),
            date: default_date(),
            subject: default_subject(),
            tasks: default_tasks(),
            tracked_points: default_tracked_points(),
            units: default_units(),
            channel_types: default_channel_types(),
            header: HeaderConfig::default(),
            timing: TimingConfig::default(),
            continue_on_error: false,
        }
    }
}

impl ConverterConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ConverterConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory whose subdirectories are the recording sessions.
    pub fn session_root(&self) -> PathBuf {
        self.input_root.join(&self.date)
    }

    /// Directory all converted files are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.output_root.join(&self.subject).join("motion")
    }

    /// Body location for a device ID.
    pub fn tracked_point(&self, device_id: &str) -> Result<&str> {
        self.tracked_points
            .get(device_id)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownDevice(device_id.to_string()))
    }

    /// Unit for a semantic channel type.
    pub fn unit_for(&self, channel_type: &str) -> Result<&str> {
        self.units
            .get(channel_type)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownChannelType(channel_type.to_string()))
    }


    /// Check the lookup tables and task list before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(ConfigError::EmptyField("subject"));
        }
        if self.date.trim().is_empty() {
            return Err(ConfigError::EmptyField("date"));
        }
        if self.timing.divisor == 0.0 {
            return Err(ConfigError::ZeroDivisor);
        }

        // Every rename target must resolve to a unit
        for rename in &self.channel_types {
            self.unit_for(&rename.to)?;
        }

        let keyed = self.tasks.iter().filter(|t| t.session.is_some()).count();
        if keyed != 0 && keyed != self.tasks.len() {
            return Err(ConfigError::MixedTaskKeys);
        }

        let mut seen = HashSet::with_capacity(keyed);
        for session in self.tasks.iter().filter_map(|t| t.session.as_deref()) {
            if !seen.insert(session) {
                return Err(ConfigError::DuplicateSession(session.to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.subject, "sub-10");
        assert_eq!(config.tasks.len(), 4);
        assert_eq!(config.tracked_point("1").unwrap(), "torso");
        assert_eq!(config.unit_for("GYRO").unwrap(), "deg/s");
        assert_eq!(config.timing.column, "SampleTimeFine");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_paths() {
        let config = ConverterConfig {
            input_root: PathBuf::from("/raw"),
            output_root: PathBuf::from("/bids"),
            ..Default::default()
        };
        assert_eq!(config.session_root(), PathBuf::from("/raw/20240729"));
        assert_eq!(config.output_dir(), PathBuf::from("/bids/sub-10/motion"));
    }

    #[test]
    fn test_unknown_device() {
        let config = ConverterConfig::default();
        match config.tracked_point("9") {
            Err(ConfigError::UnknownDevice(id)) => assert_eq!(id, "9"),
            other => panic!("Expected UnknownDevice, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_rename_without_unit() {
        let mut config = ConverterConfig::default();
        config.channel_types.push(TypeRename::new("Quat", "QUAT"));

        match config.validate() {
            Err(ConfigError::UnknownChannelType(kind)) => assert_eq!(kind, "QUAT"),
            other => panic!("Expected UnknownChannelType, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_mixed_task_keys() {
        let mut config = ConverterConfig::default();
        config.tasks[0].session = Some("session_a".to_string());

        assert!(matches!(config.validate(), Err(ConfigError::MixedTaskKeys)));
    }

    #[test]
    fn test_validate_rejects_duplicate_session() {
        let config = ConverterConfig {
            tasks: vec![
                TaskSpec::for_session("a", "RS", 1),
                TaskSpec::for_session("a", "MA", 1),
            ],
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateSession(ref s)) if s == "a"
        ));
        assert!(TaskSpec::all_keyed(&config.tasks));
        assert!(!TaskSpec::all_keyed(&[]));
        assert!(!TaskSpec::all_keyed(&[TaskSpec::new("RS", 1)]));
    }

    #[test]
    fn test_validate_rejects_zero_divisor() {
        let mut config = ConverterConfig::default();
        config.timing.divisor = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroDivisor)));
    }

    #[test]
    fn test_yaml_roundtrip_keeps_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let config = ConverterConfig {
            subject: "sub-02".to_string(),
            tasks: vec![TaskSpec::for_session("1200_walk", "walk", 2)],
            ..Default::default()
        };
        config.to_yaml(&path).unwrap();

        let loaded = ConverterConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.subject, "sub-02");
        assert_eq!(loaded.tasks, config.tasks);
        assert_eq!(loaded.channel_types, config.channel_types);
        assert_eq!(loaded.tracked_points, config.tracked_points);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "subject: sub-03\ntasks:\n  - name: RS\n").unwrap();

        let loaded = ConverterConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.subject, "sub-03");
        assert_eq!(loaded.tasks, vec![TaskSpec::new("RS", 1)]);
        assert_eq!(loaded.date, "20240729");
        assert_eq!(loaded.header.sampling_rate_key, "OutputRate");
    }
}
