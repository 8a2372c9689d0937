//! Build Orchestration: the firmware pipeline.
//!
//! Preparation runs once per run. Each request then runs in its own workspace:
//! Staging -> Patching -> BytecodeCompiler -> [NativeInterpreter] -> Packages
//! -> FirmwareImage -> Publishing.

pub mod phases;
pub mod state;

use std::path::PathBuf;

pub use phases::StageContext;
pub use state::{RequestState, StageState};

use crate::config::PipelineConfig;
use crate::error::{BuildError, Result};
use crate::log_section;
use crate::models::{BuildReport, BuildRequest};
use crate::system::{CommandRunner, InvocationContext, WorkspaceScope, PATH_VAR};

/// Runs build requests sequentially through the fixed stage order.
pub struct FirmwarePipeline<R: CommandRunner> {
    config: PipelineConfig,
    runner: R,
    /// Run-wide environment: toolchain `bin` ahead of the inherited PATH
    env: InvocationContext,
}

impl<R: CommandRunner> FirmwarePipeline<R> {
    /// Create a pipeline whose invocations see the toolchain first on PATH.
    pub fn new(config: PipelineConfig, runner: R) -> Self {
        let inherited = std::env::var(PATH_VAR).ok();
        let env = InvocationContext::with_path_prefix(&config.toolchain_bin_dir(), inherited.as_deref());
        Self::with_context(config, runner, env)
    }

    /// Create a pipeline with an explicit run-wide environment
    pub fn with_context(config: PipelineConfig, runner: R, env: InvocationContext) -> Self {
        FirmwarePipeline {
            config,
            runner,
            env,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn context(&self) -> &InvocationContext {
        &self.env
    }

    fn stage_context(&self) -> StageContext<'_, R> {
        StageContext::new(&self.config, &self.runner, &self.env)
    }

    /// Install prerequisites and make sure the toolchain exists
    pub fn prepare(&self) -> Result<()> {
        phases::prepare_build_environment(self.stage_context())
    }

    /// Prepare, then run every request in order, stopping at the first failure
    pub fn run_all(&self, requests: &[BuildRequest]) -> Result<Vec<BuildReport>> {
        self.prepare()?;

        let mut reports = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            log::info!("[Pipeline] Request {}/{}: {}", index + 1, requests.len(), request);
            reports.push(self.run_request(request)?);
        }

        log::info!("[Pipeline] {} firmware images published", reports.len());
        Ok(reports)
    }

    /// Run one request in a fresh workspace.
    ///
    /// The artifact is published only after every earlier stage succeeded, and
    /// the working directory is restored whatever the outcome.
    pub fn run_request(&self, request: &BuildRequest) -> Result<BuildReport> {
        request.validate()?;
        let identity = request.distribution()?.identity;

        let mut state = RequestState::new();
        match self.execute_stages(request, &mut state) {
            Ok(artifact) => {
                advance(&mut state, StageState::Completed)?;
                log::info!(
                    "[Pipeline] {} completed in {:?}",
                    request,
                    state.elapsed_since_start().unwrap_or_default()
                );
                Ok(BuildReport {
                    request: request.clone(),
                    identity,
                    stages: state.completed_names(),
                    artifact,
                })
            }
            Err(e) => {
                log::error!(
                    "[Pipeline] {} failed during {} ({} error): {}",
                    request,
                    state.phase.as_str(),
                    e.category(),
                    e
                );
                state.record_error(e.to_string());
                Err(e)
            }
        }
    }

    fn execute_stages(&self, request: &BuildRequest, state: &mut RequestState) -> Result<PathBuf> {
        let ctx = self.stage_context();
        let workspace = WorkspaceScope::acquire()?;

        log_section!("Staging {}", request);
        let staged = phases::stage_source(ctx, request, workspace.path())?;
        let identity = staged.distribution.identity.clone();

        advance(state, StageState::Patching)?;
        log_section!("Patching {}", identity);
        phases::patch_source(ctx, &staged)?;

        advance(state, StageState::BytecodeCompiler)?;
        log_section!("Building bytecode compiler for {}", identity);
        phases::build_bytecode_compiler(ctx, &staged)?;

        if request.build_native_interpreter {
            advance(state, StageState::NativeInterpreter)?;
            log_section!("Building native interpreter for {}", identity);
            phases::build_native_interpreter(ctx, &staged)?;
        } else {
            log::info!("[Pipeline] Native interpreter build disabled for {}", request);
        }

        advance(state, StageState::Packages)?;
        log_section!("Installing {} packages into {}", request.packages.len(), identity);
        phases::install_packages(ctx, &staged, &request.packages)?;

        advance(state, StageState::FirmwareImage)?;
        log_section!("Building firmware image for {}", identity);
        let image = phases::build_firmware_image(ctx, &staged)?;

        advance(state, StageState::Publishing)?;
        log_section!("Publishing {}", identity);
        phases::publish_artifact(&self.config, &staged, &image)
    }
}

fn advance(state: &mut RequestState, next: StageState) -> Result<()> {
    state.transition_to(next).map_err(BuildError::Transition)
}
