//! List-files command: what discovery sees.

use crate::config::Settings;
use crate::discovery::{FileQuery, FileSetResolver};
use crate::host::ConsoleHost;

pub async fn run_list_files(settings: &Settings, all: bool) {
    let query = if all {
        FileQuery::Membership
    } else {
        FileQuery::Compilable
    };
    let resolver = FileSetResolver::from_settings(settings);
    let host = ConsoleHost::new(settings.output_log_level, true);

    println!("Root:    {}", resolver.root().display());
    println!("Include: {}", resolver.include_pattern(query));
    if resolver.exclude_list().is_empty() {
        println!("Exclude: (none)");
    } else {
        println!("Exclude: {}", resolver.exclude_list().join(", "));
    }
    println!("{}", "=".repeat(50));

    let files = resolver.resolve(query, &host).await;
    for file in &files {
        let shown = file.strip_prefix(resolver.root()).unwrap_or(file);
        println!("{}", shown.display());
    }
    println!("{} files", files.len());
}
