//! Conversion stages.

pub mod channels;
pub mod converter;
pub mod metadata;
pub mod sessions;

// Re-export key types for convenience
pub use channels::{classify_channel, describe_channels, ChannelDescriptor, ChannelError, ChannelType};
pub use converter::{
    convert_all, convert_device_file, inspect_device_file, BatchSummary, ConversionReport,
    ConvertedRecording, FailedFile, Inspection,
};
pub use metadata::{assemble_sidecar, parse_sampling_rate, MetadataError, MotionSidecar};
pub use sessions::{
    assign_tasks, device_id_from_file_name, list_device_files, list_sessions, SessionError,
    SessionPlan,
};
