//! Movella DOT export to BIDS motion converter.
//!
//! This crate provides tools for:
//! - Parsing the vendor header block and motion table of Movella CSV exports
//! - Classifying channels into BIDS types, components and units
//! - Assembling `_motion.json` sidecars consistent with `_channels.tsv`
//! - Writing the BIDS `motion` output group for every device and run
//!
//! # Example
//!
//! ```no_run
//! use movella_bids::{processors::convert_all, ConverterConfig};
//!
//! let config = ConverterConfig::from_yaml("convert.yaml").unwrap();
//! let summary = convert_all(&config, false, |report| println!("{}", report.base_name)).unwrap();
//! println!("converted {} files", summary.converted.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use crate::config::{ConverterConfig, HeaderConfig, TaskSpec, TimingConfig, TypeRename};
pub use crate::core::loaders::{HeaderBlock, MotionTable};
pub use crate::processors::{ChannelDescriptor, ChannelType, MotionSidecar};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
