//! Phase 4: Publish - copy the firmware image to its permanent name.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::error::{BuildError, Result};
use crate::firmware::StagedSource;
use crate::models::{artifact_file_name, PUBLISH_FIRMWARE_DIR, PUBLISH_PACKAGE_DIR};
use crate::system::paths::copy_file_preserving;

/// `{destination}/cloudmanager_micropython_esp8266/firmware/{artifact name}`
pub fn artifact_destination(config: &PipelineConfig, staged: &StagedSource) -> PathBuf {
    config
        .destination
        .join(PUBLISH_PACKAGE_DIR)
        .join(PUBLISH_FIRMWARE_DIR)
        .join(artifact_file_name(
            &staged.distribution.identity,
            staged.release.as_deref(),
        ))
}

/// Copy `image` to its destination, replacing an earlier artifact of the same
/// name. Permission bits and modification time are kept; the workspace copy
/// is left in place.
pub fn publish_artifact(
    config: &PipelineConfig,
    staged: &StagedSource,
    image: &Path,
) -> Result<PathBuf> {
    if !image.is_file() {
        return Err(BuildError::Publish(format!(
            "Firmware image {} was not produced",
            image.display()
        )));
    }

    let dest = artifact_destination(config, staged);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BuildError::Publish(format!("Cannot create {}: {}", parent.display(), e))
        })?;
    }

    let bytes = copy_file_preserving(image, &dest).map_err(|e| {
        BuildError::Publish(format!(
            "Cannot copy {} to {}: {}",
            image.display(),
            dest.display(),
            e
        ))
    })?;

    log::info!("[Publish] {} ({} bytes)", dest.display(), bytes);
    Ok(dest)
}
