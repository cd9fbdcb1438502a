//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod compile;
pub mod init;
pub mod list;
pub mod watch;

use std::sync::Arc;

use crate::config::Settings;
use crate::controller::WatchController;
use crate::host::ConsoleHost;

/// Controller reporting to the terminal.
pub(crate) fn console_controller(settings: Settings) -> anyhow::Result<WatchController> {
    let host = Arc::new(ConsoleHost::new(
        settings.output_log_level,
        settings.show_output_window,
    ));
    Ok(WatchController::builder(settings).host(host).build()?)
}
