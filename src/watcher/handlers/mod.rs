//! Handler implementations for the unified watcher.

mod config;
mod stylesheet;

pub use config::ConfigFileHandler;
pub use stylesheet::StylesheetHandler;
