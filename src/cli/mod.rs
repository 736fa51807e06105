//! Command-line interface for the converter.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::PathBuf;
use std::time::Instant;

use crate::core::writers::MOTION_SUFFIX;
use crate::processors::converter;
use crate::ConverterConfig;

#[derive(Parser)]
#[command(name = "movella-bids")]
#[command(about = "Convert Movella IMU exports into BIDS motion files", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every session of one acquisition date
    Convert {
        /// Root holding one directory per acquisition date
        #[arg(long)]
        input_root: Option<PathBuf>,
        /// BIDS dataset root
        #[arg(long)]
        output_root: Option<PathBuf>,
        /// BIDS subject label (e.g. sub-10)
        #[arg(long)]
        subject: Option<String>,
        /// Date token of the session folder and file names
        #[arg(long)]
        date: Option<String>,
        /// Convert in memory without writing files
        #[arg(long)]
        dry_run: bool,
        /// Skip files that fail instead of stopping the batch
        #[arg(long)]
        keep_going: bool,
    },

    /// Show the header and channel table of a single export
    Inspect {
        /// Movella CSV export
        file: PathBuf,
        /// Device ID (defaults to the file name prefix)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Output YAML path
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 38 {
            format!("{}...", value.chars().take(35).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<38} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // The lookup tables drive every output, so a broken config is fatal
    let config = match &cli.config {
        Some(path) => match ConverterConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                error!("Failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ConverterConfig::default(),
    };

    match cli.command {
        Commands::Convert {
            input_root,
            output_root,
            subject,
            date,
            dry_run,
            keep_going,
        } => {
            let mut config = config;
            if let Some(root) = input_root {
                config.input_root = root;
            }
            if let Some(root) = output_root {
                config.output_root = root;
            }
            if let Some(subject) = subject {
                config.subject = subject;
            }
            if let Some(date) = date {
                config.date = date;
            }
            config.continue_on_error |= keep_going;
            cmd_convert(&config, dry_run);
        }
        Commands::Inspect { file, device } => {
            cmd_inspect(&file, device.as_deref(), &config);
        }
        Commands::InitConfig { path, force } => {
            cmd_init_config(&path, force, &config);
        }
    }
}

fn cmd_convert(config: &ConverterConfig, dry_run: bool) {
    let start = Instant::now();

    if dry_run {
        println!("DRY RUN: No files will be written");
    }

    println!("Input directory: {}", config.session_root().display());
    println!("Output directory: {}", config.output_dir().display());

    let spinner = create_spinner("Converting device files...");

    let result = converter::convert_all(config, dry_run, |report| {
        let source = report
            .source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| report.source.display().to_string());
        spinner.println(format!("{} ->  {}{}", source, report.base_name, MOTION_SUFFIX));
        spinner.set_message(format!("Converted session {}", report.session));
    });

    spinner.finish_and_clear();

    match result {
        Ok(summary) => {
            let samples: usize = summary.converted.iter().map(|r| r.samples).sum();

            for failed in &summary.failed {
                println!("FAILED {}: {}", failed.source.display(), failed.error);
            }

            print_summary(
                "Conversion Complete",
                &[
                    ("Subject", config.subject.clone()),
                    ("Sessions", summary.sessions.to_string()),
                    ("Files converted", summary.converted.len().to_string()),
                    ("Files failed", summary.failed.len().to_string()),
                    ("Samples", samples.to_string()),
                    ("Output directory", config.output_dir().display().to_string()),
                    ("Dry run", dry_run.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );

            if !summary.failed.is_empty() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Conversion failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_inspect(file: &PathBuf, device: Option<&str>, config: &ConverterConfig) {
    let inspection = match converter::inspect_device_file(file, device, config) {
        Ok(i) => i,
        Err(e) => {
            error!("Inspection failed: {:#}", e);
            std::process::exit(1);
        }
    };

    println!("File: {}", file.display());
    println!("Device: {}", inspection.device_id);
    println!("Manufacturer: {}", inspection.header.manufacturer);

    let mut fields: Vec<_> = inspection.header.fields.iter().collect();
    fields.sort();
    println!("Header fields:");
    for (key, value) in fields {
        println!("  {:<24} {}", key, value);
    }

    println!();
    println!(
        "{:<20} {:<10} {:<8} {:<14} {}",
        "name", "component", "type", "tracked_point", "units"
    );
    for c in &inspection.channels {
        println!(
            "{:<20} {:<10} {:<8} {:<14} {}",
            c.name, c.component, c.channel_type, c.tracked_point, c.units
        );
    }

    print_summary(
        "Inspection Complete",
        &[
            ("Channels", inspection.channels.len().to_string()),
            ("Samples", inspection.samples.to_string()),
        ],
    );
}

fn cmd_init_config(path: &PathBuf, force: bool, config: &ConverterConfig) {
    if path.exists() && !force {
        error!("{} already exists (use --force to overwrite)", path.display());
        std::process::exit(1);
    }

    match config.to_yaml(path) {
        Ok(()) => println!("Wrote configuration to {}", path.display()),
        Err(e) => {
            error!("Failed to write config: {}", e);
            std::process::exit(1);
        }
    }
}
