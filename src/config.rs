//! Configuration for the compiler.
//!
//! Settings are layered:
//! - Default values
//! - `.livesass/settings.toml`, searched upward from the current directory
//! - Environment variable overrides
//! - CLI argument overrides (applied by the commands)
//!
//! The directory containing `.livesass` is the workspace root: discovery
//! starts there and workspace-relative save paths resolve against it.
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `LIVESASS_` and use double
//! underscores to separate nested levels:
//! - `LIVESASS_WATCH_ON_LAUNCH=true` sets `watch_on_launch`
//! - `LIVESASS_WATCH__DEBOUNCE_MS=500` sets `watch.debounce_ms`
//! - `LIVESASS_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::host::OutputLevel;

/// Name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".livesass";

/// Name of the settings file inside [`CONFIG_DIR`].
pub const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .livesass is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// One CSS (and map) output per entry, per source file
    #[serde(default = "default_formats")]
    pub formats: Vec<FormatConfig>,

    /// Start in the watching state
    #[serde(default = "default_false")]
    pub watch_on_launch: bool,

    /// Surface informational reports as they happen
    #[serde(default = "default_true")]
    pub show_output_window: bool,

    /// Minimum level the console output shows
    #[serde(default)]
    pub output_log_level: OutputLevel,

    /// `false`, `true` (default browser query) or a list of browser queries
    #[serde(default)]
    pub autoprefix: Autoprefix,

    /// Globs excluded from discovery
    #[serde(default = "default_exclude_list")]
    pub exclude_list: Vec<String>,

    /// Globs that replace the default discovery pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_items: Option<Vec<String>>,

    /// Resolve `/`-prefixed imports from the workspace root
    #[serde(default = "default_false")]
    pub root_is_workspace: bool,

    /// Additional folders searched by the import resolver
    #[serde(default)]
    pub workspace_folders: Vec<WorkspaceFolderConfig>,

    /// Delay before the status reverts after an error, in milliseconds
    #[serde(default = "default_status_revert_ms")]
    pub status_revert_ms: u64,

    /// File watcher settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Output style handed to the compiler.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Expanded,
    Compressed,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Linefeed {
    #[default]
    Lf,
    Crlf,
    Cr,
    Lfcr,
}

impl Linefeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Linefeed::Lf => "\n",
            Linefeed::Crlf => "\r\n",
            Linefeed::Cr => "\r",
            Linefeed::Lfcr => "\n\r",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndentType {
    #[default]
    Space,
    Tab,
}

/// One output recipe: style, destination and map generation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FormatConfig {
    #[serde(default, alias = "format")]
    pub style: OutputStyle,

    /// Extension of the generated file, including the dot
    #[serde(default = "default_extension_name")]
    pub extension_name: String,

    /// `~/dir` is relative to the source file, anything else to the workspace root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,

    /// Directory names replaced by `save_path_replace_segments_with`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub save_path_segment_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_path_replace_segments_with: Option<String>,

    #[serde(default = "default_true")]
    pub generate_map: bool,

    #[serde(default)]
    pub linefeed: Linefeed,

    #[serde(default)]
    pub indent_type: IndentType,

    #[serde(default = "default_indent_width")]
    pub indent_width: usize,
}

/// Vendor-prefixing mode.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(from = "AutoprefixValue", into = "AutoprefixValue")]
pub enum Autoprefix {
    #[default]
    Disabled,
    /// Use the project's browserslist configuration.
    DefaultQuery,
    Browsers(Vec<String>),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
enum AutoprefixValue {
    Flag(bool),
    Browsers(Vec<String>),
}

impl From<AutoprefixValue> for Autoprefix {
    fn from(value: AutoprefixValue) -> Self {
        match value {
            AutoprefixValue::Flag(false) => Autoprefix::Disabled,
            AutoprefixValue::Flag(true) => Autoprefix::DefaultQuery,
            AutoprefixValue::Browsers(list) if list.is_empty() => Autoprefix::Disabled,
            AutoprefixValue::Browsers(list) => Autoprefix::Browsers(list),
        }
    }
}

impl From<Autoprefix> for AutoprefixValue {
    fn from(value: Autoprefix) -> Self {
        match value {
            Autoprefix::Disabled => AutoprefixValue::Flag(false),
            Autoprefix::DefaultQuery => AutoprefixValue::Flag(true),
            Autoprefix::Browsers(list) => AutoprefixValue::Browsers(list),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WorkspaceFolderConfig {
    pub path: PathBuf,

    #[serde(default = "default_false")]
    pub root_is_workspace: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchConfig {
    /// How long a saved file must be stable before it is compiled
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `live_sass::controller = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_extension_name() -> String {
    ".css".to_string()
}
fn default_indent_width() -> usize {
    2
}
fn default_status_revert_ms() -> u64 {
    3000
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_formats() -> Vec<FormatConfig> {
    vec![FormatConfig::default()]
}
fn default_exclude_list() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/.vscode/**".to_string(),
        format!("{CONFIG_DIR}/**"),
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            formats: default_formats(),
            watch_on_launch: false,
            show_output_window: true,
            output_log_level: OutputLevel::default(),
            autoprefix: Autoprefix::default(),
            exclude_list: default_exclude_list(),
            include_items: None,
            root_is_workspace: false,
            workspace_folders: Vec::new(),
            status_revert_ms: default_status_revert_ms(),
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            style: OutputStyle::default(),
            extension_name: default_extension_name(),
            save_path: None,
            save_path_segment_keys: Vec::new(),
            save_path_replace_segments_with: None,
            generate_map: true,
            linefeed: Linefeed::default(),
            indent_type: IndentType::default(),
            indent_width: default_indent_width(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings.absolute_root()
            })
    }

    /// Load configuration from a specific file.
    ///
    /// When the file sits in a `.livesass` directory and names no workspace
    /// root, the directory above it becomes the root.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        let path = path.as_ref();
        Self::figment(path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::root_for_settings_file(path);
                }
                settings.absolute_root()
            })
    }

    /// Relative roots are taken from the current directory.
    fn absolute_root(mut self) -> Self {
        self.workspace_root = self
            .workspace_root
            .map(|root| std::path::absolute(&root).unwrap_or(root));
        self
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nesting levels; single underscores
            // stay part of the field name.
            .merge(Env::prefixed("LIVESASS_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    fn root_for_settings_file(path: &Path) -> Option<PathBuf> {
        let path = std::path::absolute(path).ok()?;
        let dir = path.parent()?;
        if dir.file_name().is_some_and(|name| name == CONFIG_DIR) {
            dir.parent().map(Path::to_path_buf)
        } else {
            None
        }
    }

    /// Find the settings file by looking for a .livesass directory from the
    /// current directory up to the filesystem root
    pub fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(SETTINGS_FILE))
    }

    /// Get the workspace root directory (where .livesass is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Root used for discovery: the workspace root, else the current directory.
    pub fn discovery_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Directory holding settings and the error log.
    pub fn state_dir(&self) -> PathBuf {
        self.discovery_root().join(CONFIG_DIR)
    }

    /// Check if configuration is properly initialized
    pub fn check_init() -> Result<(), String> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE));

        if !config_path.exists() {
            return Err("No configuration file found".to_string());
        }

        match std::fs::read_to_string(&config_path) {
            Ok(content) => {
                if let Err(e) = toml::from_str::<Settings>(&content) {
                    return Err(format!(
                        "Configuration file is corrupted: {e}\nRun 'live-sass init --force' to regenerate."
                    ));
                }
            }
            Err(e) => {
                return Err(format!("Cannot read configuration file: {e}"));
            }
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        // The workspace root is detected from the .livesass location, so it
        // is not written out.
        let settings = Settings::default();
        settings.save(&config_path)?;

        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.formats.len(), 1);
        assert_eq!(settings.formats[0].style, OutputStyle::Expanded);
        assert_eq!(settings.formats[0].extension_name, ".css");
        assert!(settings.formats[0].generate_map);
        assert_eq!(settings.autoprefix, Autoprefix::Disabled);
        assert!(settings.include_items.is_none());
        assert_eq!(settings.status_revert_ms, 3000);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_dir = temp_dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        let config_path = config_dir.join(SETTINGS_FILE);

        let toml_content = r#"
watch_on_launch = true
autoprefix = ["> 1%", "last 2 versions"]
exclude_list = ["vendor/**"]
include_items = ["src/**/*.scss"]

[[formats]]
format = "compressed"
extension_name = ".min.css"
save_path = "~/../css"
generate_map = false

[[formats]]
style = "expanded"
save_path_segment_keys = ["scss", "sass"]
save_path_replace_segments_with = "css"
linefeed = "crlf"
indent_type = "tab"
indent_width = 1
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert!(settings.watch_on_launch);
        assert_eq!(
            settings.autoprefix,
            Autoprefix::Browsers(vec!["> 1%".to_string(), "last 2 versions".to_string()])
        );
        assert_eq!(settings.exclude_list, vec!["vendor/**"]);
        assert_eq!(
            settings.include_items,
            Some(vec!["src/**/*.scss".to_string()])
        );
        assert_eq!(settings.formats.len(), 2);
        assert_eq!(settings.formats[0].style, OutputStyle::Compressed);
        assert_eq!(settings.formats[0].save_path.as_deref(), Some("~/../css"));
        assert!(!settings.formats[0].generate_map);
        assert_eq!(settings.formats[1].save_path_segment_keys, vec!["scss", "sass"]);
        assert_eq!(settings.formats[1].linefeed, Linefeed::Crlf);
        assert_eq!(settings.formats[1].indent_type, IndentType::Tab);
        assert_eq!(settings.workspace_root.as_deref(), Some(temp_dir.path()));
    }

    #[test]
    fn test_load_from_relative_path_gives_absolute_root() {
        let temp_dir = TempDir::new_in(".").unwrap();
        let name = temp_dir.path().file_name().unwrap().to_owned();
        let relative = Path::new(&name).join(CONFIG_DIR).join(SETTINGS_FILE);
        fs::create_dir_all(relative.parent().unwrap()).unwrap();
        fs::write(&relative, "watch_on_launch = true\n").unwrap();
        assert!(relative.is_relative());

        let settings = Settings::load_from(&relative).unwrap();
        let root = settings.workspace_root.unwrap();
        assert!(root.is_absolute());
        assert_eq!(root, std::env::current_dir().unwrap().join(&name));
    }

    #[test]
    fn test_autoprefix_flag_values() {
        let settings: Settings = toml::from_str("autoprefix = true").unwrap();
        assert_eq!(settings.autoprefix, Autoprefix::DefaultQuery);

        let settings: Settings = toml::from_str("autoprefix = false").unwrap();
        assert_eq!(settings.autoprefix, Autoprefix::Disabled);

        let settings: Settings = toml::from_str("autoprefix = []").unwrap();
        assert_eq!(settings.autoprefix, Autoprefix::Disabled);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let mut settings = Settings::default();
        settings.autoprefix = Autoprefix::DefaultQuery;
        settings.formats[0].save_path = Some("dist".to_string());
        settings.status_revert_ms = 10;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.autoprefix, Autoprefix::DefaultQuery);
        assert_eq!(loaded.formats[0].save_path.as_deref(), Some("dist"));
        assert_eq!(loaded.status_revert_ms, 10);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        fs::write(&config_path, "[watch]\ndebounce_ms = 50\n").unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        assert_eq!(settings.watch.debounce_ms, 50);
        assert_eq!(settings.formats, default_formats());
        assert!(!settings.exclude_list.is_empty());
        assert!(settings.workspace_root.is_none());
    }

    #[test]
    fn test_linefeed_sequences() {
        assert_eq!(Linefeed::Lf.as_str(), "\n");
        assert_eq!(Linefeed::Crlf.as_str(), "\r\n");
        assert_eq!(Linefeed::Cr.as_str(), "\r");
        assert_eq!(Linefeed::Lfcr.as_str(), "\n\r");
    }
}
