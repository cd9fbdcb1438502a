//! One-shot compile commands.

use std::path::Path;

use crate::config::Settings;

use super::console_controller;

/// Compile every discovered file. Returns the process exit code.
pub async fn run_compile(settings: Settings) -> anyhow::Result<i32> {
    let controller = console_controller(settings)?;
    let report = controller.compile_all().await;

    eprintln!(
        "{} of {} outputs compiled",
        report.succeeded(),
        report.attempted()
    );
    Ok(if report.is_success() { 0 } else { 1 })
}

/// Compile one file in every format. Returns the process exit code.
pub async fn run_compile_file(settings: Settings, path: &Path) -> anyhow::Result<i32> {
    let path = std::path::absolute(path)?;
    let controller = console_controller(settings)?;

    match controller.compile_current(Some(&path)).await {
        Ok(report) => {
            eprintln!(
                "{} of {} outputs compiled",
                report.succeeded(),
                report.attempted()
            );
            Ok(if report.is_success() { 0 } else { 1 })
        }
        Err(rejection) => {
            eprintln!("{rejection}: {}", path.display());
            Ok(1)
        }
    }
}
