//! Orchestrator phases: the build pipeline stages.
//!
//! - **Preparation** (`prep`) - host prerequisites and cross-compilation toolchain
//! - **Source** (`source`) - checkout and compatibility patches
//! - **Build** (`build`) - bytecode compiler, native interpreter, packages, image
//! - **Publish** (`publish`) - artifact copy to the destination
//!
//! Each phase is a set of free functions over a [`StageContext`], so they can be
//! driven individually with a fake runner.

pub mod build;
pub mod prep;
pub mod publish;
pub mod source;

pub use build::{
    build_bytecode_compiler, build_firmware_image, build_native_interpreter,
    harvest_frozen_modules, install_packages,
};
pub use prep::{install_prerequisites, prepare_build_environment, prepare_toolchain};
pub use publish::{artifact_destination, publish_artifact};
pub use source::{patch_source, stage_source};

use crate::config::PipelineConfig;
use crate::system::{CommandRunner, InvocationContext};

/// Everything a stage needs to launch commands
pub struct StageContext<'a, R: CommandRunner> {
    pub config: &'a PipelineConfig,
    pub runner: &'a R,
    /// Run-wide environment (toolchain PATH prefix)
    pub env: &'a InvocationContext,
}

impl<'a, R: CommandRunner> StageContext<'a, R> {
    pub fn new(config: &'a PipelineConfig, runner: &'a R, env: &'a InvocationContext) -> Self {
        StageContext {
            config,
            runner,
            env,
        }
    }
}

impl<R: CommandRunner> Clone for StageContext<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: CommandRunner> Copy for StageContext<'_, R> {}
