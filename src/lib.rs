//! Cloudmanager ESP8266 Firmware Builder
//!
//! Builds MicroPython-family firmware images for the ESP8266: installs host
//! prerequisites, builds the cross-compilation toolchain once, then for each
//! build request clones a distribution, patches it, builds the bytecode
//! compiler, native interpreter and firmware image, and publishes the image
//! under a deterministic name.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Build requests, reports and artifact naming
//! - **config**: Pipeline settings and the JSON settings loader
//! - **system**: Command execution, workspace scoping, file tree helpers
//! - **firmware**: Distribution sources, patches and the toolchain
//! - **orchestrator**: Stage sequencing and request state
//! - **log_collector**: On-disk logging behind the `log` facade

// Core foundational modules
pub mod error;
pub mod models;

// Command execution and workspace management
pub mod system;

// Settings
pub mod config;

// Sources, patches, toolchain
pub mod firmware;

// Robust, decoupled logging system
pub mod log_collector;

// Stage sequencing and request state
pub mod orchestrator;

// Re-export the log crate for macro usage
pub use log;

// Re-export log collector for use throughout the system
pub use log_collector::{LogCollector, LogLine};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{BuildError, CommandError, ConfigError, PatchError, Result, SourceError};

pub use models::{
    artifact_file_name, default_requests, BuildReport, BuildRequest, DEFAULT_PACKAGE,
    PINNED_RELEASE,
};

pub use config::PipelineConfig;

pub use system::{CommandRunner, Invocation, InvocationContext, SystemRunner, WorkspaceScope};

pub use firmware::{Distribution, DistributionVariant, ToolchainBuilder};

pub use orchestrator::{FirmwarePipeline, RequestState, StageState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
