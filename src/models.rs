//! Core data types for the firmware builder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{BuildError, SourceError};
use crate::firmware::sources::{Distribution, DistributionSourceDB};

/// Package directory under the destination root that receives firmware images
pub const PUBLISH_PACKAGE_DIR: &str = "cloudmanager_micropython_esp8266";

/// Sub-directory of the package directory holding the images
pub const PUBLISH_FIRMWARE_DIR: &str = "firmware";

/// Fixed suffix of every published image
pub const FIRMWARE_SUFFIX: &str = "firmware-combined.bin";

/// Runtime package installed into every image by the default requests
pub const DEFAULT_PACKAGE: &str = "micropython-redis-cloudclient";

/// Pinned MicroPython release among the default requests
pub const PINNED_RELEASE: &str = "v1.8.6";

/// One parameterized run of the pipeline for one distribution/release combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Git URL of the distribution
    pub source_url: String,

    /// Tag to build; `None` builds the default branch
    #[serde(default)]
    pub release: Option<String>,

    /// Runtime packages installed into the image, in order
    #[serde(default)]
    pub packages: Vec<String>,

    /// Build the host-native interpreter used by the package installer
    #[serde(default = "default_true")]
    pub build_native_interpreter: bool,
}

fn default_true() -> bool {
    true
}

impl BuildRequest {
    /// Create a request for the default branch of `source_url`
    pub fn new(source_url: impl Into<String>) -> Self {
        BuildRequest {
            source_url: source_url.into(),
            release: None,
            packages: Vec::new(),
            build_native_interpreter: true,
        }
    }

    /// Pin the request to a release tag
    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    /// Append a runtime package to install
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.packages.push(package.into());
        self
    }

    pub fn with_native_interpreter(mut self, enabled: bool) -> Self {
        self.build_native_interpreter = enabled;
        self
    }

    /// Resolve the distribution this request builds
    pub fn distribution(&self) -> Result<Distribution, SourceError> {
        Distribution::from_locator(&self.source_url)
    }

    /// Check the request before any command runs.
    ///
    /// Release identifiers end up as git arguments and file name fragments, so
    /// whitespace, path separators and a leading `-` are refused. Packages are
    /// installed with the native interpreter built by the same request, so
    /// they cannot be combined with skipping that build.
    pub fn validate(&self) -> Result<(), BuildError> {
        self.distribution()?;
        if let Some(release) = &self.release {
            let invalid = release.is_empty()
                || release.starts_with('-')
                || release.contains('/')
                || release.chars().any(char::is_whitespace);
            if invalid {
                return Err(SourceError::InvalidRelease(release.clone()).into());
            }
        }
        if !self.build_native_interpreter && !self.packages.is_empty() {
            return Err(BuildError::InvalidRequest(format!(
                "{} packages requested but the native interpreter build is disabled",
                self.packages.len()
            )));
        }
        if let Some(empty) = self.packages.iter().position(|p| p.trim().is_empty()) {
            return Err(BuildError::InvalidRequest(format!(
                "package name at position {} is empty",
                empty
            )));
        }
        Ok(())
    }

    /// Published artifact file name for this request
    pub fn artifact_file_name(&self) -> Result<String, SourceError> {
        let identity = self.distribution()?.identity;
        Ok(artifact_file_name(&identity, self.release.as_deref()))
    }
}

impl fmt::Display for BuildRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.release {
            Some(release) => write!(f, "{}@{}", self.source_url, release),
            None => write!(f, "{}@<default branch>", self.source_url),
        }
    }
}

/// `{identity}[-{release}]-firmware-combined.bin`
pub fn artifact_file_name(identity: &str, release: Option<&str>) -> String {
    match release {
        Some(release) => format!("{}-{}-{}", identity, release, FIRMWARE_SUFFIX),
        None => format!("{}-{}", identity, FIRMWARE_SUFFIX),
    }
}

/// The images a run publishes, in build order: MicroPython trunk, MicroPython
/// at [`PINNED_RELEASE`], CircuitPython trunk, each with [`DEFAULT_PACKAGE`]
pub fn default_requests() -> Result<Vec<BuildRequest>, SourceError> {
    let sources = DistributionSourceDB::new();
    let url = |name: &str| {
        sources
            .get_source_url(name)
            .ok_or_else(|| SourceError::InvalidLocator(format!("no known source for '{}'", name)))
    };

    Ok(vec![
        BuildRequest::new(url("micropython")?).with_package(DEFAULT_PACKAGE),
        BuildRequest::new(url("micropython")?)
            .with_release(PINNED_RELEASE)
            .with_package(DEFAULT_PACKAGE),
        BuildRequest::new(url("circuitpython")?).with_package(DEFAULT_PACKAGE),
    ])
}

/// Outcome of a successfully completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub request: BuildRequest,
    pub identity: String,
    /// Stages that ran, in order
    pub stages: Vec<String>,
    /// Where the firmware image was published
    pub artifact: PathBuf,
}
