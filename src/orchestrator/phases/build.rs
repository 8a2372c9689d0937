//! Phase 3: Build - compiler, interpreter, packages and firmware image.
//!
//! All builds run `make` in a directory of the staged tree with the run-wide
//! environment. Any non-zero exit fails the request.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DistributionLayout;
use crate::error::{BuildError, Result};
use crate::firmware::StagedSource;
use crate::system::paths::copy_entries;
use crate::system::{CommandRunner, Invocation};

use super::StageContext;

fn run_stage<R: CommandRunner>(
    ctx: StageContext<'_, R>,
    stage: &'static str,
    invocation: Invocation,
) -> Result<()> {
    ctx.runner
        .run(&invocation)
        .map_err(|source| BuildError::Build { stage, source })
}

fn make<R: CommandRunner>(
    ctx: StageContext<'_, R>,
    stage: &'static str,
    dir: &Path,
    target: Option<&str>,
) -> Result<()> {
    let invocation = ctx
        .env
        .invocation(&ctx.config.make_program, dir)
        .args(target);
    run_stage(ctx, stage, invocation)
}

/// Build the bytecode cross-compiler
pub fn build_bytecode_compiler<R: CommandRunner>(
    ctx: StageContext<'_, R>,
    staged: &StagedSource,
) -> Result<()> {
    let dir = staged.root.join(&ctx.config.layout.bytecode_compiler_dir);
    make(ctx, "bytecode-compiler", &dir, None)
}

/// Build the host-native interpreter: helper library first, then the binary
pub fn build_native_interpreter<R: CommandRunner>(
    ctx: StageContext<'_, R>,
    staged: &StagedSource,
) -> Result<()> {
    let layout = &ctx.config.layout;
    let dir = staged.root.join(&layout.native_dir);
    make(ctx, "native-interpreter", &dir, Some(layout.helper_target.as_str()))?;
    make(ctx, "native-interpreter", &dir, None)
}

/// Native interpreter binary inside the staged tree
pub fn native_interpreter_path(layout: &DistributionLayout, staged: &StagedSource) -> PathBuf {
    staged
        .root
        .join(&layout.native_dir)
        .join(&layout.native_binary)
}

/// Install `packages` in order into the port's embedded module directory.
///
/// Stops at the first failure; packages already installed stay in the
/// workspace, which is discarded with the failed request.
pub fn install_packages<R: CommandRunner>(
    ctx: StageContext<'_, R>,
    staged: &StagedSource,
    packages: &[String],
) -> Result<()> {
    let layout = &ctx.config.layout;
    let port_dir = staged.root.join(&layout.port_dir);
    let interpreter = native_interpreter_path(layout, staged);
    let interpreter = interpreter.to_string_lossy();

    for (index, package) in packages.iter().enumerate() {
        log::info!(
            "[Packages] ({}/{}) Installing {}",
            index + 1,
            packages.len(),
            package
        );
        let invocation = ctx
            .env
            .invocation(&interpreter, &port_dir)
            .args(["-m", "upip", "install"])
            .arg(package.as_str())
            .env(layout.module_path_var.as_str(), layout.module_dir.as_str());
        run_stage(ctx, "packages", invocation)?;
    }

    Ok(())
}

/// Copy every entry of the frozen-modules output into the embedded module
/// directory and the frozen-modules directory of the port.
///
/// Returns the number of files copied into each. A missing output directory
/// harvests nothing.
pub fn harvest_frozen_modules(layout: &DistributionLayout, port_dir: &Path) -> Result<usize> {
    let output = port_dir.join(&layout.frozen_output_dir);
    if !output.is_dir() {
        log::warn!(
            "[Image] Frozen-modules output {} not found, nothing to harvest",
            output.display()
        );
        return Ok(0);
    }

    let mut harvested = 0;
    for target in [&layout.module_dir, &layout.frozen_dir] {
        let dest = port_dir.join(target);
        harvested = fs::create_dir_all(&dest)
            .and_then(|_| copy_entries(&output, &dest))
            .map_err(|e| {
                BuildError::Workspace(format!(
                    "Failed to harvest {} into {}: {}",
                    output.display(),
                    dest.display(),
                    e
                ))
            })?;
        log::info!(
            "[Image] Harvested {} frozen modules into {}",
            harvested,
            dest.display()
        );
    }

    Ok(harvested)
}

/// Build the firmware image and return its path inside the staged tree
pub fn build_firmware_image<R: CommandRunner>(
    ctx: StageContext<'_, R>,
    staged: &StagedSource,
) -> Result<PathBuf> {
    let layout = &ctx.config.layout;
    let port_dir = staged.root.join(&layout.port_dir);

    make(ctx, "firmware-image", &port_dir, Some(layout.helper_target.as_str()))?;

    if staged.distribution.variant.harvests_frozen_modules() {
        harvest_frozen_modules(layout, &port_dir)?;
    }

    make(ctx, "firmware-image", &port_dir, None)?;

    Ok(port_dir.join(&layout.firmware_image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::error::CommandError;
    use crate::firmware::Distribution;
    use crate::system::InvocationContext;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<Invocation>>,
        fail_on_arg: Option<&'static str>,
    }

    impl CommandRunner for Recorder {
        fn run(&self, invocation: &Invocation) -> std::result::Result<(), CommandError> {
            self.calls.borrow_mut().push(invocation.clone());
            if let Some(arg) = self.fail_on_arg {
                if invocation.args.iter().any(|a| a == arg) {
                    return Err(CommandError::Failed {
                        cmd: invocation.command_line(),
                        code: Some(1),
                    });
                }
            }
            Ok(())
        }
    }

    fn staged(root: &Path, locator: &str) -> StagedSource {
        StagedSource {
            distribution: Distribution::from_locator(locator).unwrap(),
            release: None,
            root: root.to_path_buf(),
        }
    }

    #[test]
    fn test_native_interpreter_builds_helper_first() {
        let config = PipelineConfig::default();
        let runner = Recorder::default();
        let env = InvocationContext::new();
        let source = staged(Path::new("/ws/micropython"), "https://x/micropython.git");

        build_native_interpreter(StageContext::new(&config, &runner, &env), &source).unwrap();

        let calls = runner.calls.borrow();
        assert!(calls[0].is("make", &["axtls"]));
        assert!(calls[1].is("make", &[]));
        assert_eq!(calls[0].cwd, Path::new("/ws/micropython/unix"));
    }

    #[test]
    fn test_install_packages_in_order_with_module_path() {
        let config = PipelineConfig::default();
        let runner = Recorder::default();
        let env = InvocationContext::new();
        let source = staged(Path::new("/ws/micropython"), "https://x/micropython.git");
        let packages = vec!["first".to_string(), "second".to_string(), "first".to_string()];

        install_packages(StageContext::new(&config, &runner, &env), &source, &packages).unwrap();

        let calls = runner.calls.borrow();
        let installed: Vec<&str> = calls.iter().map(|c| c.args[3].as_str()).collect();
        assert_eq!(installed, vec!["first", "second", "first"]);
        for call in calls.iter() {
            assert_eq!(call.program, "/ws/micropython/unix/micropython");
            assert_eq!(call.cwd, Path::new("/ws/micropython/esp8266"));
            assert_eq!(call.env.get("MICROPYPATH").map(String::as_str), Some("modules"));
        }
    }

    #[test]
    fn test_install_packages_stops_at_first_failure() {
        let config = PipelineConfig::default();
        let runner = Recorder {
            fail_on_arg: Some("broken"),
            ..Default::default()
        };
        let env = InvocationContext::new();
        let source = staged(Path::new("/ws/micropython"), "https://x/micropython.git");
        let packages = vec!["ok".to_string(), "broken".to_string(), "never".to_string()];

        let result = install_packages(StageContext::new(&config, &runner, &env), &source, &packages);

        assert!(matches!(result, Err(BuildError::Build { stage: "packages", .. })));
        assert_eq!(runner.calls.borrow().len(), 2);
    }

    #[test]
    fn test_harvest_copies_into_both_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DistributionLayout::default();
        let port = temp_dir.path();
        let output = port.join(&layout.frozen_output_dir);
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("boot.mpy"), "b").unwrap();
        fs::write(output.join("main.mpy"), "m").unwrap();

        assert_eq!(harvest_frozen_modules(&layout, port).unwrap(), 2);
        assert!(port.join("modules/boot.mpy").exists());
        assert!(port.join("scripts/main.mpy").exists());
    }

    #[test]
    fn test_harvest_missing_output_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DistributionLayout::default();
        assert_eq!(harvest_frozen_modules(&layout, temp_dir.path()).unwrap(), 0);
        assert!(!temp_dir.path().join("modules").exists());
    }

    #[test]
    fn test_image_build_harvests_only_for_flagged_variant() {
        let temp_dir = TempDir::new().unwrap();
        let config = PipelineConfig::default();
        let env = InvocationContext::new();

        for (identity, expect_harvest) in [("micropython", false), ("circuitpython", true)] {
            let root = temp_dir.path().join(identity);
            let output = root.join("esp8266").join(&config.layout.frozen_output_dir);
            fs::create_dir_all(&output).unwrap();
            fs::write(output.join("frozen.mpy"), "f").unwrap();

            let runner = Recorder::default();
            let source = staged(&root, &format!("https://x/{}.git", identity));
            let image =
                build_firmware_image(StageContext::new(&config, &runner, &env), &source).unwrap();

            assert_eq!(image, root.join("esp8266/build/firmware-combined.bin"));
            assert_eq!(root.join("esp8266/modules/frozen.mpy").exists(), expect_harvest);
            let calls = runner.calls.borrow();
            assert!(calls[0].is("make", &["axtls"]));
            assert!(calls[1].is("make", &[]));
        }
    }
}
