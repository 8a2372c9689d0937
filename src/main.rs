use std::path::PathBuf;

use anyhow::{anyhow, Context};
use log::LevelFilter;

use cloudmanager_esp8266::config::loader::{SettingsSource, SETTINGS_ENV_VAR};
use cloudmanager_esp8266::{
    default_requests, BuildReport, FirmwarePipeline, LogCollector, SystemRunner, VERSION,
};

fn run(pipeline: &FirmwarePipeline<SystemRunner>) -> anyhow::Result<Vec<BuildReport>> {
    let requests = default_requests().context("Cannot assemble the default requests")?;
    pipeline
        .run_all(&requests)
        .map_err(|e| anyhow!("{} error: {}", e.category(), e))
}

fn main() -> anyhow::Result<()> {
    let base = std::env::current_dir().context("Cannot determine working directory")?;
    let explicit = std::env::var_os(SETTINGS_ENV_VAR).map(PathBuf::from);
    let source = SettingsSource::locate(explicit.as_deref());
    let config = source
        .load(&base)
        .with_context(|| format!("Failed to load build settings from {}", source))?;

    let collector = LogCollector::new(&config.logs_dir)
        .map_err(|e| anyhow!("LogCollector initialization failed: {}", e))?;
    if let Err(e) = collector.install(LevelFilter::Info) {
        eprintln!("[Main] WARNING: Failed to set LogCollector as global logger: {}", e);
    }

    log::info!("Cloudmanager ESP8266 firmware builder {}", VERSION);
    log::info!("[Main] Full log: {}", collector.full_log_path().display());
    log::info!("[Config] Using {}", source);

    let pipeline = FirmwarePipeline::new(config, SystemRunner);
    let result = run(&pipeline);

    match &result {
        Ok(reports) => {
            for report in reports {
                log::info!(
                    "[Main] {} -> {}",
                    report.request,
                    report.artifact.display()
                );
            }
        }
        Err(e) => log::error!("[Main] Build aborted: {:#}", e),
    }

    if let Err(e) = collector.flush_and_wait() {
        eprintln!("[Main] WARNING: Failed to flush logs: {}", e);
    }

    result.map(|_| ())
}
