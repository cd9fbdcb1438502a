//! File watcher that feeds saves into the controller.
//!
//! This module provides a single file watcher that routes events to
//! pluggable handlers for stylesheets and the settings file.
//!
//! # Architecture
//!
//! ```text
//! UnifiedWatcher
//!   - Single notify::RecommendedWatcher
//!   - Shared Debouncer
//!   - Routes events to handlers
//!         |
//!    +----------+----------+
//!    |                     |
//! StylesheetHandler   ConfigFileHandler
//!    |                     |
//!    +----> WatchController <----+
//! ```

mod debouncer;
mod error;
mod handler;
pub mod handlers;
mod unified;

pub use debouncer::Debouncer;
pub use error::WatchError;
pub use handler::{WatchAction, WatchHandler};
pub use unified::{UnifiedWatcher, UnifiedWatcherBuilder};
