//! Movella export to BIDS motion conversion.
//!
//! Each device file passes once through load -> rescale -> classify ->
//! assemble -> write. Every file gets a fresh [`ConvertedRecording`]; no value
//! is carried from one file to the next.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info, warn};

use super::channels::{describe_channels, ChannelDescriptor};
use super::metadata::{assemble_sidecar, MotionSidecar};
use super::sessions::{
    assign_tasks, device_id_from_file_name, list_device_files, list_sessions, SessionPlan,
};
use crate::config::ConverterConfig;
use crate::core::loaders::{load_recording, HeaderBlock, MotionTable};
use crate::core::transforms::rescale_column;
use crate::core::writers::{base_name, write_output_group, OutputPaths, MOTION_SUFFIX};

/// Everything derived from one device export.
#[derive(Debug, Clone)]
pub struct ConvertedRecording {
    pub source: PathBuf,
    pub device_id: String,
    pub tracked_point: String,
    pub base_name: String,
    pub channels: Vec<ChannelDescriptor>,
    pub table: MotionTable,
    pub sidecar: MotionSidecar,
}

/// Outcome of one converted file.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub source: PathBuf,
    pub session: String,
    pub base_name: String,
    pub outputs: OutputPaths,
    pub channels: usize,
    pub samples: usize,
    /// False in dry-run mode
    pub written: bool,
}

/// A file skipped because it failed to convert.
#[derive(Debug, Clone)]
pub struct FailedFile {
    pub source: PathBuf,
    pub error: String,
}

/// Totals for a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub sessions: usize,
    pub converted: Vec<ConversionReport>,
    pub failed: Vec<FailedFile>,
}

/// Header and channel layout of a single export, without conversion.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub device_id: String,
    pub header: HeaderBlock,
    pub channels: Vec<ChannelDescriptor>,
    pub samples: usize,
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("Path has no file name: {}", path.display()))
}

/// Convert one device export in memory.
///
/// # Arguments
///
/// * `path` - Device CSV inside a session directory
/// * `plan` - Task and run of the session
/// * `config` - Converter configuration
///
/// # Errors
///
/// Fails when the device ID is unknown, the header boundary cannot be
/// found, the timing column is missing, a column type has no unit, or the
/// sampling rate is malformed.
pub fn convert_device_file(
    path: &Path,
    plan: &SessionPlan,
    config: &ConverterConfig,
) -> Result<ConvertedRecording> {
    let name = file_name(path)?;
    let device_id = device_id_from_file_name(&name, &config.date)?;
    let tracked_point = config.tracked_point(&device_id)?.to_string();

    let mut recording = load_recording(path, &config.header, &config.timing.column)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    rescale_column(
        &mut recording.table,
        &config.timing.column,
        config.timing.divisor,
    )
    .with_context(|| format!("Failed to rescale timing in {}", path.display()))?;

    let channels = describe_channels(&recording.table.columns, &tracked_point, config)
        .with_context(|| format!("Failed to classify channels of {}", path.display()))?;

    let sidecar = assemble_sidecar(
        &recording.header,
        &channels,
        &device_id,
        &plan.task,
        &config.header,
    )
    .with_context(|| format!("Failed to build metadata for {}", path.display()))?;

    Ok(ConvertedRecording {
        source: path.to_path_buf(),
        base_name: base_name(&config.subject, &plan.task, &device_id, plan.run),
        device_id,
        tracked_point,
        channels,
        table: recording.table,
        sidecar,
    })
}

fn convert_and_write(
    path: &Path,
    plan: &SessionPlan,
    config: &ConverterConfig,
    output_dir: &Path,
    dry_run: bool,
) -> Result<ConversionReport> {
    let converted = convert_device_file(path, plan, config)?;
    let outputs = OutputPaths::new(output_dir, &converted.base_name);

    if !dry_run {
        write_output_group(
            &outputs,
            &converted.channels,
            &converted.table,
            &converted.sidecar,
        )
        .with_context(|| format!("Failed to write outputs for {}", path.display()))?;
    }

    Ok(ConversionReport {
        source: converted.source,
        session: plan.session.clone(),
        base_name: converted.base_name,
        outputs,
        channels: converted.channels.len(),
        samples: converted.table.len(),
        written: !dry_run,
    })
}

/// Convert every device export of every session.
///
/// Sessions are paired with tasks first, so a task list that does not
/// match the session directories fails before any file is written.
/// By default the first failing file aborts the batch. With
/// `continue_on_error` the failure is logged, recorded in
/// [`BatchSummary::failed`], and the remaining files are still converted.
///
/// # Arguments
///
/// * `config` - Converter configuration
/// * `dry_run` - Convert in memory without writing files
/// * `on_file` - Called after each file is converted
pub fn convert_all<F>(config: &ConverterConfig, dry_run: bool, mut on_file: F) -> Result<BatchSummary>
where
    F: FnMut(&ConversionReport),
{
    config.validate().context("Invalid configuration")?;

    let session_root = config.session_root();
    let sessions = list_sessions(&session_root)
        .with_context(|| format!("Failed to list sessions in {}", session_root.display()))?;
    let plans = assign_tasks(&sessions, &config.tasks)?;

    let output_dir = config.output_dir();
    if !dry_run {
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    }

    info!(
        "Converting {} sessions from {} into {}",
        plans.len(),
        session_root.display(),
        output_dir.display()
    );

    let mut summary = BatchSummary {
        sessions: plans.len(),
        ..Default::default()
    };

    for plan in &plans {
        let files = list_device_files(&plan.path)?;
        if files.is_empty() {
            warn!("Session {} has no device files", plan.session);
        }

        for path in files {
            match convert_and_write(&path, plan, config, &output_dir, dry_run) {
                Ok(report) => {
                    info!(
                        "{} -> {}{}",
                        path.display(),
                        report.base_name,
                        MOTION_SUFFIX
                    );
                    on_file(&report);
                    summary.converted.push(report);
                }
                Err(e) if config.continue_on_error => {
                    error!("Skipping {}: {:#}", path.display(), e);
                    summary.failed.push(FailedFile {
                        source: path,
                        error: format!("{:#}", e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(summary)
}

/// Read one export and describe its channels without writing anything.
///
/// The device ID is taken from `device_id` when given, otherwise from the
/// file name.
pub fn inspect_device_file(
    path: &Path,
    device_id: Option<&str>,
    config: &ConverterConfig,
) -> Result<Inspection> {
    let device_id = match device_id {
        Some(id) => id.to_string(),
        None => device_id_from_file_name(&file_name(path)?, &config.date)?,
    };
    let tracked_point = config.tracked_point(&device_id)?;

    let recording = load_recording(path, &config.header, &config.timing.column)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let channels = describe_channels(&recording.table.columns, tracked_point, config)?;

    Ok(Inspection {
        device_id,
        samples: recording.table.len(),
        header: recording.header,
        channels,
    })
}
