//! Single units through the real compiler and prefixer.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use live_sass::config::{Autoprefix, IndentType, Linefeed, OutputStyle};
use live_sass::pipeline::{SourceMap, WorkspaceImportResolver};
use live_sass::{FormatConfig, MemoryHost, Pipeline, Settings, UnitStatus};
use tempfile::TempDir;

fn settings(root: &Path) -> Settings {
    Settings {
        workspace_root: Some(root.to_path_buf()),
        ..Settings::default()
    }
}

fn pipeline(settings: &Settings) -> Pipeline {
    Pipeline::with_defaults(Arc::new(WorkspaceImportResolver::from_settings(settings)))
}

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("assets/scss")).unwrap();
    fs::write(root.join("assets/scss/_vars.scss"), "$gap: 4px;\n").unwrap();
    fs::write(
        root.join("assets/scss/site.scss"),
        "@import 'vars';\n.grid { margin: $gap; }\n",
    )
    .unwrap();
    temp
}

#[tokio::test]
async fn test_relocated_output_links_its_map() {
    let temp = project();
    let root = temp.path();
    let settings = settings(root);
    let format = FormatConfig {
        save_path: Some("~/../css".to_string()),
        ..FormatConfig::default()
    };
    let host = MemoryHost::new();

    let outcome = pipeline(&settings)
        .run_unit(&root.join("assets/scss/site.scss"), 0, &format, &settings, &host)
        .await;

    assert_eq!(outcome.status, UnitStatus::Written);
    assert_eq!(outcome.css_path, Some(root.join("assets/css/site.css")));

    let css = fs::read_to_string(root.join("assets/css/site.css")).unwrap();
    assert!(css.contains("margin: 4px;"));
    assert!(css.ends_with("\n/*# sourceMappingURL=site.css.map */"));

    let map = fs::read_to_string(root.join("assets/css/site.css.map")).unwrap();
    let map = SourceMap::from_json(&map).unwrap();
    assert_eq!(map.file.as_deref(), Some("site.css"));
    assert!(map.sources.contains(&"../scss/site.scss".to_string()));
    assert!(map.sources.contains(&"../scss/_vars.scss".to_string()));

    let generated = host.reports_titled("Generated :");
    assert_eq!(generated[0].body.len(), 2);
}

#[tokio::test]
async fn test_segment_replacement_mirrors_the_tree() {
    let temp = project();
    let root = temp.path();
    let settings = settings(root);
    let format = FormatConfig {
        save_path_segment_keys: vec!["scss".to_string()],
        save_path_replace_segments_with: Some("css".to_string()),
        generate_map: false,
        ..FormatConfig::default()
    };

    let outcome = pipeline(&settings)
        .run_unit(
            &root.join("assets/scss/site.scss"),
            0,
            &format,
            &settings,
            &MemoryHost::new(),
        )
        .await;

    assert!(outcome.succeeded());
    assert!(root.join("assets/css/site.css").exists());
    assert!(!root.join("assets/css/site.css.map").exists());
}

#[tokio::test]
async fn test_whitespace_options_shape_expanded_output() {
    let temp = project();
    let root = temp.path();
    let settings = settings(root);
    let format = FormatConfig {
        extension_name: ".tabs.css".to_string(),
        indent_type: IndentType::Tab,
        indent_width: 1,
        linefeed: Linefeed::Crlf,
        generate_map: false,
        ..FormatConfig::default()
    };

    let outcome = pipeline(&settings)
        .run_unit(
            &root.join("assets/scss/site.scss"),
            0,
            &format,
            &settings,
            &MemoryHost::new(),
        )
        .await;

    assert!(outcome.succeeded());
    let css = fs::read_to_string(root.join("assets/scss/site.tabs.css")).unwrap();
    assert!(css.contains(".grid {\r\n\tmargin: 4px;\r\n}"));
}

#[tokio::test]
async fn test_autoprefix_with_explicit_browsers() {
    let temp = project();
    let root = temp.path();
    fs::write(
        root.join("assets/scss/site.scss"),
        ".card { user-select: none; }\n",
    )
    .unwrap();
    let settings = Settings {
        autoprefix: Autoprefix::Browsers(vec!["safari 8".to_string()]),
        ..settings(root)
    };
    let format = FormatConfig::default();
    let host = MemoryHost::new();

    let outcome = pipeline(&settings)
        .run_unit(&root.join("assets/scss/site.scss"), 0, &format, &settings, &host)
        .await;

    assert!(outcome.succeeded());
    let css = fs::read_to_string(root.join("assets/scss/site.css")).unwrap();
    assert!(css.contains("-webkit-user-select: none"));
    assert!(css.contains("sourceMappingURL=site.css.map"));
    assert!(root.join("assets/scss/site.css.map").exists());
}

#[tokio::test]
async fn test_compile_error_writes_nothing() {
    let temp = project();
    let root = temp.path();
    fs::write(root.join("assets/scss/site.scss"), ".a { color: $missing; }\n").unwrap();
    let settings = settings(root);
    let host = MemoryHost::new();

    let outcome = pipeline(&settings)
        .run_unit(
            &root.join("assets/scss/site.scss"),
            0,
            &FormatConfig {
                style: OutputStyle::Compressed,
                ..FormatConfig::default()
            },
            &settings,
            &host,
        )
        .await;

    assert_eq!(outcome.status, UnitStatus::CompileFailed);
    assert!(!root.join("assets/scss/site.css").exists());
    let errors = host.reports_titled("Compilation Error");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].body.iter().any(|line| line.contains("Undefined variable")));
}
