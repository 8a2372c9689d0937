//! System module: structured command execution, workspace scoping, file tree helpers
//!
//! Every external tool (git, make, the package manager, the native interpreter)
//! is launched through a [`CommandRunner`] as an [`Invocation`]: program,
//! argument list, working directory and environment, never a shell string.
//! Environment overrides travel in an [`InvocationContext`] instead of being
//! written into the process environment.

pub mod paths;
pub mod workspace;

use crate::error::CommandError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Command;

pub use workspace::WorkspaceScope;

/// Executable search path variable
pub const PATH_VAR: &str = "PATH";

/// Dynamic-library search path variable dropped for toolchain builds
pub const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// Stage header routed to the section log (target "section")
#[macro_export]
macro_rules! log_section {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::log::info!(target: "section", "==== {} ====", msg);
    }}
}

/// One external command, fully described
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Variables set on top of the inherited environment
    pub env: BTreeMap<String, String>,
    /// Variables removed from the inherited environment (applied after `env`)
    pub env_remove: BTreeSet<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
            env_remove: BTreeSet::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.env_remove.remove(&key);
        self.env.insert(key, value.into());
        self
    }

    /// Human-readable command line, used in logs and errors
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(|a| a.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether this is `program` with exactly `args`
    pub fn is(&self, program: &str, args: &[&str]) -> bool {
        self.program == program && self.args.iter().map(|a| a.as_str()).eq(args.iter().copied())
    }
}

/// Environment shared by the invocations of one run or stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    env: BTreeMap<String, String>,
    removed: BTreeSet<String>,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose PATH is `dir` followed by `inherited` (the caller's PATH)
    pub fn with_path_prefix(dir: &Path, inherited: Option<&str>) -> Self {
        let path = match inherited {
            Some(rest) if !rest.is_empty() => format!("{}:{}", dir.display(), rest),
            _ => dir.display().to_string(),
        };
        Self::new().set(PATH_VAR, path)
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.removed.remove(&key);
        self.env.insert(key, value.into());
        self
    }

    /// Drop `key` from the child environment, inherited or set
    pub fn without(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.env.remove(&key);
        self.removed.insert(key);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(|v| v.as_str())
    }

    pub fn is_removed(&self, key: &str) -> bool {
        self.removed.contains(key)
    }

    /// Start an invocation carrying this context's environment
    pub fn invocation(&self, program: &str, cwd: &Path) -> Invocation {
        let mut invocation = Invocation::new(program, cwd);
        invocation.env = self.env.clone();
        invocation.env_remove = self.removed.clone();
        invocation
    }
}

/// Runs external commands to completion
pub trait CommandRunner {
    /// Run `invocation`, blocking until it exits. Exit status zero is success.
    fn run(&self, invocation: &Invocation) -> Result<(), CommandError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, invocation: &Invocation) -> Result<(), CommandError> {
        (**self).run(invocation)
    }
}

/// Production runner: spawns the process with inherited stdio so the tool's
/// own diagnostics reach the terminal unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), CommandError> {
        let cmd = invocation.command_line();
        log::info!("[Exec] {} (in {})", cmd, invocation.cwd.display());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(&invocation.env);
        for key in &invocation.env_remove {
            command.env_remove(key);
        }

        let status = command.status().map_err(|source| CommandError::Spawn {
            cmd: cmd.clone(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            log::error!("[Exec] '{}' exited with {:?}", cmd, status.code());
            Err(CommandError::Failed {
                cmd,
                code: status.code(),
            })
        }
    }
}
