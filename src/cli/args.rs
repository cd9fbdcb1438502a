//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Create custom help text with consistent styling
fn create_custom_help() -> String {
    use console::style;

    let colors = console::colors_enabled();
    let heading = |text: &str| {
        if colors {
            style(text).cyan().bold().to_string()
        } else {
            text.to_string()
        }
    };

    let mut help = String::new();

    help.push_str(&format!("{}\n", heading("Quick Start:")));
    help.push_str("  $ live-sass init                    # Create .livesass/settings.toml\n");
    help.push_str("  $ live-sass compile                 # Compile every stylesheet once\n");
    help.push_str("  $ live-sass compile-file site.scss  # Compile one file\n");
    help.push_str("  $ live-sass watch                   # Recompile on save\n\n");

    help.push_str("Compile Sass/SCSS to CSS in one or more output formats.\n\n");

    help.push_str(&heading("Usage:"));
    help.push_str(" live-sass [OPTIONS] <COMMAND>\n\n");

    help.push_str(&format!("{}\n", heading("Commands:")));
    help.push_str("  init          Set up .livesass directory\n");
    help.push_str("  config        Display active settings\n");
    help.push_str("  compile       Compile all stylesheets\n");
    help.push_str("  compile-file  Compile a single stylesheet\n");
    help.push_str("  list-files    Show which files would be compiled\n");
    help.push_str("  watch         Watch for saves and recompile\n");
    help.push_str("  help          Print this message or the help of the given subcommand(s)\n\n");

    help.push_str("See 'live-sass help <command>' for more information on a specific command.\n\n");

    help.push_str(&format!("{}\n", heading("Options:")));
    help.push_str("  -c, --config <CONFIG>  Path to custom settings.toml file\n");
    help.push_str("  -h, --help             Print help\n");
    help.push_str("  -V, --version          Print version\n");

    help
}

/// Sass/SCSS compiler with watch mode
#[derive(Parser)]
#[command(
    name = "live-sass",
    version = env!("CARGO_PKG_VERSION"),
    about = "Compile Sass/SCSS to CSS",
    long_about = "Compile Sass/SCSS to CSS in one or more output formats, once or on every save.",
    next_line_help = true,
    styles = clap_cargo_style(),
    override_help = create_custom_help()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true, env = "LIVESASS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .livesass directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .livesass/settings.toml")]
    Config,

    /// Compile every discovered stylesheet in every format
    #[command(
        about = "Compile all stylesheets once",
        after_help = "Exits with status 1 when any (file, format) pair failed."
    )]
    Compile,

    /// Compile one stylesheet in every format
    #[command(
        name = "compile-file",
        about = "Compile a single stylesheet",
        after_help = "Partials (files starting with '_') are rejected. \
            Compile the file that imports them instead."
    )]
    CompileFile {
        /// The .scss or .sass file
        path: PathBuf,
    },

    /// Show the discovered files and the patterns in effect
    #[command(name = "list-files", about = "Show which files would be compiled")]
    ListFiles {
        /// Include partials and ignore include_items, as save detection does
        #[arg(long)]
        all: bool,
    },

    /// Watch the workspace and compile on save
    #[command(
        about = "Watch for saves and recompile",
        after_help = "Commands while watching:\n  \
            w         start watching\n  \
            s         stop watching\n  \
            a         compile all\n  \
            f <path>  compile one file\n  \
            q         quit"
    )]
    Watch {
        /// Start watching without compiling everything first
        #[arg(long)]
        no_initial: bool,
    },
}
