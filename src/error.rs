//! Unified error type hierarchy for the firmware builder
//!
//! Provides structured error handling with CommandError, PatchError, ConfigError,
//! SourceError and the top-level BuildError taxonomy.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// External command execution errors.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to launch '{cmd}': {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: io::Error,
    },

    #[error("Command '{cmd}' exited with status {}", display_code(.code))]
    Failed { cmd: String, code: Option<i32> },
}

impl CommandError {
    /// The rendered command line that failed
    pub fn command(&self) -> &str {
        match self {
            CommandError::Spawn { cmd, .. } | CommandError::Failed { cmd, .. } => cmd,
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<terminated by signal>".to_string(),
    }
}

/// Source tree patching errors.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Patch target file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read patch target {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write patched file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Source checkout errors.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Invalid source locator: {0}")]
    InvalidLocator(String),

    #[error("Invalid release identifier: {0:?}")]
    InvalidRelease(String),

    #[error("Clone of {url} failed: {source}")]
    Clone {
        url: String,
        #[source]
        source: CommandError,
    },

    #[error("Checkout of release {release} failed: {source}")]
    Checkout {
        release: String,
        #[source]
        source: CommandError,
    },

    #[error("Submodule update failed: {0}")]
    Submodules(#[source] CommandError),
}

/// Top-level build error taxonomy.
///
/// Every variant is fatal: the orchestrator never continues past one.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Prerequisite installation or toolchain build failed
    #[error("Environment error: {0}")]
    Environment(String),

    /// Clone or checkout failed
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// A build-system or package-installer invocation failed
    #[error("Build error in {stage}: {source}")]
    Build {
        stage: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    /// Temporary workspace could not be created, entered or populated
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Request rejected before any command ran
    #[error("Invalid build request: {0}")]
    InvalidRequest(String),

    #[error("Stage transition error: {0}")]
    Transition(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BuildError {
    /// Short error class name used in log summaries
    pub fn category(&self) -> &'static str {
        match self {
            BuildError::Environment(_) => "environment",
            BuildError::Source(_) => "source",
            BuildError::Build { .. } => "build",
            BuildError::Patch(_) => "patch",
            BuildError::Workspace(_) => "workspace",
            BuildError::InvalidRequest(_) => "request",
            BuildError::Transition(_) => "internal",
            BuildError::Publish(_) => "publish",
            BuildError::Config(_) => "config",
        }
    }
}

/// Top-level result type for pipeline operations.
pub type Result<T> = std::result::Result<T, BuildError>;
