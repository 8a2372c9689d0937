//! Phase 1: Preparation - host prerequisites and toolchain.
//!
//! Runs once per pipeline run, before the first request:
//! - installs the host packages the toolchain and firmware builds need
//! - builds the cross-compilation toolchain unless its sentinel is present

use crate::error::{BuildError, CommandError, Result};
use crate::firmware::ToolchainBuilder;
use crate::log_section;
use crate::system::CommandRunner;

use super::StageContext;

/// Install the configured prerequisite packages.
///
/// The package manager reports already-installed packages as success, so this
/// is safe to repeat. A non-zero exit is logged and tolerated; failing to
/// launch the package manager at all is an environment error.
pub fn install_prerequisites<R: CommandRunner>(ctx: StageContext<'_, R>) -> Result<()> {
    let config = ctx.config;
    if !config.install_prerequisites {
        log::info!("[Prep] Prerequisite installation disabled, skipping");
        return Ok(());
    }

    let (program, manager_args) = config.package_manager.split_first().ok_or_else(|| {
        BuildError::Environment("No package manager command configured".to_string())
    })?;
    let cwd = std::env::current_dir()
        .map_err(|e| BuildError::Environment(format!("Cannot determine current directory: {}", e)))?;

    let invocation = ctx
        .env
        .invocation(program, &cwd)
        .args(manager_args.iter().cloned())
        .args(config.prerequisites.iter().cloned());

    log::info!(
        "[Prep] Installing {} prerequisite packages",
        config.prerequisites.len()
    );

    match ctx.runner.run(&invocation) {
        Ok(()) => {
            log::info!("[Prep] Prerequisites installed");
            Ok(())
        }
        Err(CommandError::Failed { code, .. }) => {
            log::warn!(
                "[Prep] Package manager exited with {:?}, continuing",
                code
            );
            Ok(())
        }
        Err(e @ CommandError::Spawn { .. }) => Err(BuildError::Environment(format!(
            "Cannot run package manager: {}",
            e
        ))),
    }
}

/// Build the toolchain unless already installed. Returns `true` when it was built.
pub fn prepare_toolchain<R: CommandRunner>(ctx: StageContext<'_, R>) -> Result<bool> {
    ToolchainBuilder::new(ctx.config, ctx.runner, ctx.env).ensure()
}

/// Run the whole preparation phase
pub fn prepare_build_environment<R: CommandRunner>(ctx: StageContext<'_, R>) -> Result<()> {
    log_section!("Installing build prerequisites");
    install_prerequisites(ctx)?;

    log_section!("Preparing cross-compilation toolchain");
    let built = prepare_toolchain(ctx)?;
    if built {
        log::info!("[Prep] Toolchain built");
    }
    log::info!(
        "[Prep] Using toolchain binaries from {}",
        ctx.config.toolchain_bin_dir().display()
    );

    Ok(())
}
