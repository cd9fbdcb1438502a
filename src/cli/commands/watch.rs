//! Watch command: file watcher plus an interactive command prompt.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{CONFIG_DIR, SETTINGS_FILE, Settings};
use crate::controller::WatchController;
use crate::watcher::UnifiedWatcher;
use crate::watcher::handlers::{ConfigFileHandler, StylesheetHandler};

use super::console_controller;

/// A line typed while the watch session runs.
#[derive(Debug, PartialEq, Eq)]
enum SessionCommand {
    Start,
    Stop,
    CompileAll,
    CompileFile(Option<PathBuf>),
    Quit,
    Help,
    Unknown(String),
}

impl SessionCommand {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        Some(match command {
            "w" | "watch" => SessionCommand::Start,
            "s" | "stop" => SessionCommand::Stop,
            "a" | "all" => SessionCommand::CompileAll,
            "f" | "file" if rest.is_empty() => SessionCommand::CompileFile(None),
            "f" | "file" => SessionCommand::CompileFile(Some(PathBuf::from(rest))),
            "q" | "quit" | "exit" => SessionCommand::Quit,
            "h" | "help" | "?" => SessionCommand::Help,
            other => SessionCommand::Unknown(other.to_string()),
        })
    }
}

const SESSION_HELP: &str =
    "Commands: w (watch), s (stop), a (compile all), f <path> (compile file), q (quit)";

/// Run the watch session until `q`, end of input or Ctrl+C.
pub async fn run_watch(
    settings: Settings,
    config_path: Option<&Path>,
    no_initial: bool,
) -> anyhow::Result<()> {
    let root = settings.discovery_root();
    let settings_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(CONFIG_DIR).join(SETTINGS_FILE));
    let debounce_ms = settings.watch.debounce_ms;

    // Already watching means the first compile-all is skipped
    let mut settings = settings;
    if no_initial {
        settings.watch_on_launch = true;
    }
    let controller = Arc::new(console_controller(settings)?);
    if !controller.is_watching() {
        controller.start_watching().await;
    }

    let mut builder = UnifiedWatcher::builder()
        .controller(Arc::clone(&controller))
        .debounce_ms(debounce_ms)
        .handler(StylesheetHandler::new(root.clone()));

    if settings_path.exists() {
        match ConfigFileHandler::new(settings_path.clone()) {
            Ok(handler) => builder = builder.handler(handler),
            Err(e) => eprintln!("Settings will not be reloaded: {e}"),
        }
    }

    let watcher = builder.build()?;
    let watcher_task = tokio::spawn(async move {
        if let Err(e) = watcher.watch().await {
            eprintln!("File watcher error: {e}");
        }
    });

    eprintln!("Watching {} (debounce {debounce_ms}ms)", root.display());
    eprintln!("{SESSION_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let Some(command) = SessionCommand::parse(&line) else {
                            continue;
                        };
                        if !dispatch(&controller, command).await {
                            break;
                        }
                    }
                    // Input closed: keep watching until interrupted
                    Ok(None) => {
                        let _ = tokio::signal::ctrl_c().await;
                        break;
                    }
                    Err(e) => {
                        eprintln!("Failed to read input: {e}");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    watcher_task.abort();
    crate::log_event!("watch", "session ended");
    Ok(())
}

/// Execute one session command. Returns false when the session should end.
async fn dispatch(controller: &WatchController, command: SessionCommand) -> bool {
    match command {
        SessionCommand::Start => {
            controller.start_watching().await;
        }
        SessionCommand::Stop => {
            controller.stop_watching();
        }
        SessionCommand::CompileAll => {
            controller.compile_all().await;
        }
        SessionCommand::CompileFile(path) => {
            // Relative paths are taken from the current directory
            let path = path.map(|p| std::path::absolute(&p).unwrap_or(p));
            if let Err(rejection) = controller.compile_current(path.as_deref()).await {
                eprintln!("{rejection}");
            }
        }
        SessionCommand::Help => eprintln!("{SESSION_HELP}"),
        SessionCommand::Unknown(command) => {
            eprintln!("Unknown command '{command}'. {SESSION_HELP}");
        }
        SessionCommand::Quit => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_commands() {
        assert_eq!(SessionCommand::parse("w"), Some(SessionCommand::Start));
        assert_eq!(SessionCommand::parse(" s "), Some(SessionCommand::Stop));
        assert_eq!(SessionCommand::parse("a"), Some(SessionCommand::CompileAll));
        assert_eq!(SessionCommand::parse("q"), Some(SessionCommand::Quit));
        assert_eq!(SessionCommand::parse(""), None);
    }

    #[test]
    fn test_parse_compile_file_path() {
        assert_eq!(
            SessionCommand::parse("f styles/site.scss"),
            Some(SessionCommand::CompileFile(Some(PathBuf::from(
                "styles/site.scss"
            ))))
        );
        assert_eq!(
            SessionCommand::parse("f"),
            Some(SessionCommand::CompileFile(None))
        );
        assert_eq!(
            SessionCommand::parse("x"),
            Some(SessionCommand::Unknown("x".to_string()))
        );
    }
}
