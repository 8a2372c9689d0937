//! Phase 2: Source - checkout and compatibility patches.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::firmware::{DistributionPatcher, SourceStager, StagedSource};
use crate::models::BuildRequest;
use crate::system::CommandRunner;

use super::StageContext;

/// Clone the request's distribution into `workspace`
pub fn stage_source<R: CommandRunner>(
    ctx: StageContext<'_, R>,
    request: &BuildRequest,
    workspace: &Path,
) -> Result<StagedSource> {
    let staged = SourceStager::new(ctx.runner, ctx.env, &ctx.config.git_program)
        .stage(request, workspace)?;
    log::info!(
        "[Source] Staged {} ({}) at {}",
        staged.distribution.identity,
        staged.release.as_deref().unwrap_or("default branch"),
        staged.root.display()
    );
    Ok(staged)
}

/// Apply the compatibility edits for the staged distribution's variant
pub fn patch_source<R: CommandRunner>(
    ctx: StageContext<'_, R>,
    staged: &StagedSource,
) -> Result<Vec<PathBuf>> {
    let changed = DistributionPatcher::new(&ctx.config.layout)
        .apply(&staged.root, staged.distribution.variant)?;
    log::info!("[Source] {} files patched", changed.len());
    Ok(changed)
}
