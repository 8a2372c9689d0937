//! Shared helpers for pipeline integration tests.
//!
//! `FakeRunner` records every invocation and imitates the filesystem effects of
//! the real tools closely enough for the pipeline to run end to end:
//! - `git clone` creates a distribution tree with the files the patcher edits
//! - `make axtls` in the port directory leaves a frozen-modules output
//! - bare `make` in the port directory writes the firmware image, whose content
//!   snapshots the port Makefile and the harvested module directories
//! - bare `make` in the toolchain checkout produces the toolchain tree

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use cloudmanager_esp8266::firmware::sources::distribution_identity;
use cloudmanager_esp8266::{CommandError, CommandRunner, Invocation, PipelineConfig};
use tempfile::TempDir;

pub const MICROPYTHON_URL: &str = "https://github.com/micropython/micropython.git";
pub const CIRCUITPYTHON_URL: &str = "https://github.com/adafruit/circuitpython.git";

pub const PORT_MAKEFILE: &str = "CFLAGS = $(INC) -Wall -Wpointer-arith -Werror -std=gnu99\n";
pub const UPIP_SOURCE: &str = "    f = url_open(\"https://pypi.python.org/pypi/%s/json\" % name)\n";

/// One recorded call: the invocation and the process cwd when it ran
#[derive(Debug, Clone)]
pub struct Call {
    pub invocation: Invocation,
    pub process_cwd: PathBuf,
}

type FailWhen = Box<dyn Fn(&Invocation) -> bool>;

#[derive(Default)]
pub struct FakeRunner {
    pub calls: RefCell<Vec<Call>>,
    fail_when: Option<FailWhen>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every invocation matching `predicate` with exit status 2
    pub fn failing_when(predicate: impl Fn(&Invocation) -> bool + 'static) -> Self {
        FakeRunner {
            calls: RefCell::new(Vec::new()),
            fail_when: Some(Box::new(predicate)),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.borrow().iter().map(|c| c.invocation.clone()).collect()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|c| c.invocation.command_line())
            .collect()
    }

    pub fn count(&self, program: &str, args: &[&str]) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.invocation.is(program, args))
            .count()
    }

    /// Invocations of `program` whose arguments start with `prefix`
    pub fn count_prefix(&self, program: &str, prefix: &[&str]) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| {
                c.invocation.program == program
                    && c.invocation.args.len() >= prefix.len()
                    && c.invocation.args.iter().zip(prefix).all(|(a, p)| a == p)
            })
            .count()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    fn simulate(&self, invocation: &Invocation) -> std::io::Result<()> {
        let cwd = &invocation.cwd;

        if invocation.program == "git" && invocation.args.first().map(String::as_str) == Some("clone") {
            let url = invocation.args.last().cloned().unwrap_or_default();
            let identity = distribution_identity(&url).map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
            })?;
            let root = cwd.join(identity);
            fs::create_dir_all(root.join("tools"))?;
            fs::create_dir_all(root.join("esp8266"))?;
            fs::write(root.join("tools/upip.py"), UPIP_SOURCE)?;
            fs::write(root.join("esp8266/Makefile"), PORT_MAKEFILE)?;
        } else if invocation.is("make", &["axtls"]) && cwd.ends_with("esp8266") {
            let frozen = cwd.join("build/frozen_mpy");
            fs::create_dir_all(&frozen)?;
            fs::write(frozen.join("frozen.mpy"), "frozen")?;
        } else if invocation.is("make", &[]) && cwd.ends_with("esp8266") {
            let makefile = fs::read_to_string(cwd.join("Makefile"))?;
            let snapshot = format!(
                "{}frozen_in_modules={}\nfrozen_in_scripts={}\n",
                makefile,
                cwd.join("modules/frozen.mpy").exists(),
                cwd.join("scripts/frozen.mpy").exists(),
            );
            fs::create_dir_all(cwd.join("build"))?;
            fs::write(cwd.join("build/firmware-combined.bin"), snapshot)?;
        } else if invocation.is("make", &[]) && cwd.ends_with("esp-open-sdk") {
            let bin = cwd.join("xtensa-lx106-elf/bin");
            fs::create_dir_all(&bin)?;
            fs::write(bin.join("esptool.py"), "#!/usr/bin/env python\n")?;
        }

        Ok(())
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), CommandError> {
        self.calls.borrow_mut().push(Call {
            invocation: invocation.clone(),
            process_cwd: std::env::current_dir().unwrap_or_default(),
        });

        if self.fail_when.as_ref().map_or(false, |f| f(invocation)) {
            return Err(CommandError::Failed {
                cmd: invocation.command_line(),
                code: Some(2),
            });
        }

        self.simulate(invocation).map_err(|source| CommandError::Spawn {
            cmd: invocation.command_line(),
            source,
        })
    }
}

/// Settings publishing into `<temp>/dest`
pub fn test_config(temp_dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        destination: temp_dir.path().join("dest"),
        logs_dir: temp_dir.path().join("logs"),
        ..PipelineConfig::default()
    }
}

/// Directory receiving published images
pub fn firmware_dir(config: &PipelineConfig) -> PathBuf {
    config
        .destination
        .join("cloudmanager_micropython_esp8266")
        .join("firmware")
}

/// Names of the published images, sorted
pub fn published(config: &PipelineConfig) -> Vec<String> {
    let dir = firmware_dir(config);
    let mut names: Vec<String> = match fs::read_dir(&dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

pub fn canonical_cwd() -> PathBuf {
    std::env::current_dir()
        .and_then(|p| p.canonicalize())
        .unwrap_or_default()
}

pub fn is_inside(path: &Path, dir: &Path) -> bool {
    match (path.canonicalize(), dir.canonicalize()) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => false,
    }
}
