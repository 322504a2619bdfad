//! # VectorMate Replay
//!
//! Headless harness for the VectorMate bridge. Runs a JSON script of host
//! events and setter calls through a full editor session backed by a
//! recording engine, then prints every engine call as one JSON line.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p vectormate-replay -- session.json
//! cargo run -p vectormate-replay -- session.json --engine missing --frames 10
//! RUST_LOG_FORMAT=json cargo run -p vectormate-replay -- session.json --options editor.json
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

mod error;
mod runner;
mod script;

pub use error::{ReplayError, ReplayResult};
pub use runner::{ReplayReport, ReplayRunner};
pub use script::{ReplayScript, ReplayStep};

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use vectormate_core::EditorOptions;

/// How the simulated engine module behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum EngineMode {
    /// Factory already registered when loading starts.
    #[default]
    Present,
    /// Factory registered by the injected script.
    Late,
    /// No factory; the session runs on the stub table.
    Missing,
}

/// Command-line arguments for vectormate-replay.
#[derive(Debug, Clone, Parser)]
#[command(name = "vectormate-replay")]
#[command(about = "Replay scripted editor input against a recording engine")]
#[command(version)]
pub struct CliArgs {
    /// Replay script (JSON)
    pub script: PathBuf,

    /// Editor options file (JSON)
    #[arg(long, env = "VECTORMATE_OPTIONS")]
    pub options: Option<PathBuf>,

    /// Simulated engine availability
    #[arg(long, value_enum, default_value = "present")]
    pub engine: EngineMode,

    /// Frames to run after the last step
    #[arg(long, default_value = "0")]
    pub frames: u32,

    /// Runtime-ready polls before the engine reports ready
    #[arg(long, default_value = "0")]
    pub ready_polls: u32,

    /// Print the final report as one JSON document instead of call lines
    #[arg(long)]
    pub report: bool,
}

/// Replay configuration.
#[derive(Debug, Clone, Default)]
pub struct ReplayConfig {
    /// Replay script path.
    pub script: PathBuf,
    /// Editor options file, if any.
    pub options: Option<PathBuf>,
    /// Simulated engine availability.
    pub engine: EngineMode,
    /// Frames to run after the last step.
    pub trailing_frames: u32,
    /// Runtime-ready polls before the engine reports ready.
    pub ready_polls: u32,
    /// Emit the full report instead of call lines.
    pub full_report: bool,
}

impl From<CliArgs> for ReplayConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            script: args.script,
            options: args.options,
            engine: args.engine,
            trailing_frames: args.frames,
            ready_polls: args.ready_polls,
            full_report: args.report,
        }
    }
}

/// Read editor options from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_options(path: &Path) -> ReplayResult<EditorOptions> {
    let json = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(EditorOptions::from_json(&json)?)
}

/// Pick the options for a run: script-embedded options win over the file.
///
/// # Errors
///
/// Returns an error if the options file cannot be loaded.
pub fn resolve_options(config: &ReplayConfig, script: &ReplayScript) -> ReplayResult<EditorOptions> {
    if let Some(options) = &script.options {
        return Ok(options.clone());
    }
    match &config.options {
        Some(path) => load_options(path),
        None => Ok(EditorOptions::default()),
    }
}
