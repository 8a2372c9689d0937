//! Configuration module for firmware build management.
//!
//! Holds the settings that stay constant across build requests: where the
//! toolchain and artifacts live, which host packages are prerequisites, which
//! programs drive the build, and the layout of a distribution source tree.
//!
//! # Module Structure
//!
//! - `loader`: loads and saves `PipelineConfig` as JSON settings files
//!
//! Build requests are not part of the settings; the entry point defines them.

pub mod loader;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Host packages needed to build the toolchain and the firmware
pub const DEFAULT_PREREQUISITES: &[&str] = &[
    "make", "unrar-free", "autoconf", "automake", "libtool", "gcc", "g++", "gperf", "flex",
    "bison", "texinfo", "gawk", "ncurses-dev", "libexpat-dev", "python-dev", "python",
    "python-serial", "sed", "git", "unzip", "bash", "help2man", "wget", "bzip2", "libtool-bin",
];

/// Cross-compilation toolchain settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Toolchain source repository (cloned recursively)
    pub repo_url: String,
    /// Directory the clone lands in inside the workspace
    pub checkout_dir: String,
    /// Toolchain tree produced by the build, copied under the destination root
    pub output_dir: String,
    /// Sentinel executable, relative to `output_dir`
    pub sentinel: String,
    /// Binary directory, relative to `output_dir`, prefixed to PATH
    pub bin_dir: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        ToolchainConfig {
            repo_url: "https://github.com/pfalcon/esp-open-sdk.git".to_string(),
            checkout_dir: "esp-open-sdk".to_string(),
            output_dir: "xtensa-lx106-elf".to_string(),
            sentinel: "bin/esptool.py".to_string(),
            bin_dir: "bin".to_string(),
        }
    }
}

/// Paths and targets inside a cloned distribution tree.
///
/// Port-relative entries are resolved against `port_dir`; the rest against the
/// root of the clone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionLayout {
    pub bytecode_compiler_dir: String,
    pub native_dir: String,
    /// Interpreter binary inside `native_dir`
    pub native_binary: String,
    pub port_dir: String,
    /// Networking/crypto helper library target built before the main targets
    pub helper_target: String,
    /// Bootstrap package installer script carrying the package-index host
    pub package_installer_script: String,
    /// Port build configuration stripped of `-Werror` for relaxed variants
    pub port_makefile: String,
    /// Embedded module directory (port-relative)
    pub module_dir: String,
    /// Frozen-modules directory read by the image build (port-relative)
    pub frozen_dir: String,
    /// Frozen-modules output harvested after the helper build (port-relative)
    pub frozen_output_dir: String,
    /// Firmware image produced by the main build (port-relative)
    pub firmware_image: String,
    /// Environment variable overriding the package installer destination
    pub module_path_var: String,
}

impl Default for DistributionLayout {
    fn default() -> Self {
        DistributionLayout {
            bytecode_compiler_dir: "mpy-cross".to_string(),
            native_dir: "unix".to_string(),
            native_binary: "micropython".to_string(),
            port_dir: "esp8266".to_string(),
            helper_target: "axtls".to_string(),
            package_installer_script: "tools/upip.py".to_string(),
            port_makefile: "esp8266/Makefile".to_string(),
            module_dir: "modules".to_string(),
            frozen_dir: "scripts".to_string(),
            frozen_output_dir: "build/frozen_mpy".to_string(),
            firmware_image: "build/firmware-combined.bin".to_string(),
            module_path_var: "MICROPYPATH".to_string(),
        }
    }
}

/// Settings shared by every build request of a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root receiving the toolchain tree and the published firmware
    pub destination: PathBuf,
    pub logs_dir: PathBuf,
    pub install_prerequisites: bool,
    /// Package manager command line, the package names are appended
    pub package_manager: Vec<String>,
    pub prerequisites: Vec<String>,
    pub git_program: String,
    pub make_program: String,
    pub toolchain: ToolchainConfig,
    pub layout: DistributionLayout,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            destination: PathBuf::from("."),
            logs_dir: PathBuf::from("logs"),
            install_prerequisites: true,
            package_manager: ["sudo", "apt-get", "install", "-y"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            prerequisites: DEFAULT_PREREQUISITES.iter().map(|s| s.to_string()).collect(),
            git_program: "git".to_string(),
            make_program: "make".to_string(),
            toolchain: ToolchainConfig::default(),
            layout: DistributionLayout::default(),
        }
    }
}

impl PipelineConfig {
    /// Anchor relative `destination` and `logs_dir` at `base`
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        if self.destination.is_relative() {
            self.destination = base.join(&self.destination);
        }
        if self.logs_dir.is_relative() {
            self.logs_dir = base.join(&self.logs_dir);
        }
        self
    }

    /// Toolchain tree under the destination root
    pub fn toolchain_dir(&self) -> PathBuf {
        self.destination.join(&self.toolchain.output_dir)
    }

    pub fn toolchain_bin_dir(&self) -> PathBuf {
        self.toolchain_dir().join(&self.toolchain.bin_dir)
    }

    pub fn toolchain_sentinel(&self) -> PathBuf {
        self.toolchain_dir().join(&self.toolchain.sentinel)
    }

    /// Check the settings for values that would make every build fail
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("git_program", self.git_program.as_str()),
            ("make_program", self.make_program.as_str()),
            ("toolchain.repo_url", self.toolchain.repo_url.as_str()),
            ("toolchain.checkout_dir", self.toolchain.checkout_dir.as_str()),
            ("toolchain.output_dir", self.toolchain.output_dir.as_str()),
            ("toolchain.sentinel", self.toolchain.sentinel.as_str()),
            ("layout.port_dir", self.layout.port_dir.as_str()),
            ("layout.firmware_image", self.layout.firmware_image.as_str()),
            ("layout.module_path_var", self.layout.module_path_var.as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }

        if self.install_prerequisites && self.package_manager.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "package_manager must name a command when install_prerequisites is set".to_string(),
            ));
        }

        Ok(())
    }
}
