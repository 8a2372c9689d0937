//! Cross-compilation toolchain builder.
//!
//! The toolchain is built once per destination: its presence is detected by a
//! sentinel executable inside the installed tree, and a run that finds the
//! sentinel skips the build entirely.

use std::path::PathBuf;

use crate::config::PipelineConfig;
use crate::error::{BuildError, Result};
use crate::system::paths::replace_dir_tree;
use crate::system::{
    CommandRunner, Invocation, InvocationContext, WorkspaceScope, LIBRARY_PATH_VAR,
};

/// Builds and installs the toolchain tree under the destination root
pub struct ToolchainBuilder<'a, R: CommandRunner> {
    config: &'a PipelineConfig,
    runner: &'a R,
    context: InvocationContext,
}

impl<'a, R: CommandRunner> ToolchainBuilder<'a, R> {
    /// `context` is the run context; the library search path is dropped from it
    pub fn new(config: &'a PipelineConfig, runner: &'a R, context: &InvocationContext) -> Self {
        ToolchainBuilder {
            config,
            runner,
            context: context.clone().without(LIBRARY_PATH_VAR),
        }
    }

    /// Whether the sentinel executable is installed
    pub fn is_built(&self) -> bool {
        self.config.toolchain_sentinel().is_file()
    }

    /// Installed toolchain tree
    pub fn install_dir(&self) -> PathBuf {
        self.config.toolchain_dir()
    }

    /// Build the toolchain unless it is already installed.
    ///
    /// Returns `true` when a build ran.
    pub fn ensure(&self) -> Result<bool> {
        if self.is_built() {
            log::info!(
                "[Toolchain] Found {}, skipping toolchain build",
                self.config.toolchain_sentinel().display()
            );
            return Ok(false);
        }
        self.build()?;
        Ok(true)
    }

    /// Clone, refresh and build the toolchain in a fresh workspace, then
    /// install the result, replacing any partial earlier install
    pub fn build(&self) -> Result<()> {
        let toolchain = &self.config.toolchain;
        let workspace = WorkspaceScope::acquire()?;
        let checkout = workspace.path().join(&toolchain.checkout_dir);
        let git = self.config.git_program.as_str();
        let make = self.config.make_program.as_str();

        log::info!("[Toolchain] Building {} in {}", toolchain.repo_url, checkout.display());

        self.step(
            self.context
                .invocation(git, workspace.path())
                .args(["clone", "--recursive"])
                .arg(toolchain.repo_url.as_str()),
        )?;

        let steps: [(&str, &[&str]); 5] = [
            (make, &["clean"]),
            (git, &["pull"]),
            (git, &["submodule", "sync"]),
            (git, &["submodule", "update", "--init"]),
            (make, &[]),
        ];
        for (program, args) in steps {
            self.step(self.context.invocation(program, &checkout).args(args.iter().copied()))?;
        }

        let built = checkout.join(&toolchain.output_dir);
        let install_dir = self.install_dir();
        if !built.is_dir() {
            return Err(BuildError::Environment(format!(
                "Toolchain build did not produce {}",
                built.display()
            )));
        }

        let copied = replace_dir_tree(&built, &install_dir).map_err(|e| {
            BuildError::Environment(format!(
                "Failed to install toolchain into {}: {}",
                install_dir.display(),
                e
            ))
        })?;
        log::info!(
            "[Toolchain] Installed {} files into {}",
            copied,
            install_dir.display()
        );

        Ok(())
    }

    fn step(&self, invocation: Invocation) -> Result<()> {
        self.runner
            .run(&invocation)
            .map_err(|e| BuildError::Environment(format!("Toolchain build failed: {}", e)))
    }
}
