//! Distribution checkout through the `git` command line.
//!
//! Cloning is recursive so bundled libraries arrive with the tree. A release
//! is checked out onto a local branch of the same name created from the tag.

use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::firmware::sources::Distribution;
use crate::models::BuildRequest;
use crate::system::{CommandRunner, InvocationContext};

/// A distribution tree ready for patching and building
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSource {
    pub distribution: Distribution,
    pub release: Option<String>,
    /// Root of the clone inside the workspace
    pub root: PathBuf,
}

/// Clones and checks out build request sources
pub struct SourceStager<'a, R: CommandRunner> {
    runner: &'a R,
    context: &'a InvocationContext,
    git: &'a str,
}

impl<'a, R: CommandRunner> SourceStager<'a, R> {
    pub fn new(runner: &'a R, context: &'a InvocationContext, git: &'a str) -> Self {
        SourceStager {
            runner,
            context,
            git,
        }
    }

    /// Clone `request` into `workspace` and check out its release
    pub fn stage(&self, request: &BuildRequest, workspace: &Path) -> Result<StagedSource, SourceError> {
        let distribution = request.distribution()?;
        let root = workspace.join(&distribution.identity);

        log::info!(
            "[Source] Cloning {} into {}",
            distribution.locator,
            root.display()
        );
        let clone = self
            .context
            .invocation(self.git, workspace)
            .args(["clone", "--recursive"])
            .arg(distribution.locator.as_str());
        self.runner.run(&clone).map_err(|source| SourceError::Clone {
            url: distribution.locator.clone(),
            source,
        })?;

        if let Some(release) = &request.release {
            self.checkout_release(&root, release)?;
        }

        let submodules = self
            .context
            .invocation(self.git, &root)
            .args(["submodule", "update", "--init"]);
        self.runner.run(&submodules).map_err(SourceError::Submodules)?;

        Ok(StagedSource {
            distribution,
            release: request.release.clone(),
            root,
        })
    }

    fn checkout_release(&self, root: &Path, release: &str) -> Result<(), SourceError> {
        log::info!("[Source] Checking out release {}", release);
        let checkout = self
            .context
            .invocation(self.git, root)
            .arg("checkout")
            .arg(format!("tags/{}", release))
            .args(["-b", release]);

        self.runner.run(&checkout).map_err(|source| SourceError::Checkout {
            release: release.to_string(),
            source,
        })
    }
}
