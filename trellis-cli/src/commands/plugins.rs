//! List plugins

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use trellis_core::{Application, ApplicationConfig, PluginHandle};
use trellis_plugin_api::{ExtensionProvider, ExtensionRegistry};

use crate::app;

pub fn run(config: ApplicationConfig) -> Result<()> {
    let app = app::build(config)?;
    let plugins = app.plugins();

    if plugins.is_empty() {
        println!("No plugins enabled");
        println!();
        println!("Check the [plugins] include/exclude patterns in your configuration.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Declares").fg(Color::Cyan),
        Cell::new("Contributes").fg(Color::Cyan),
    ]);

    for plugin in &plugins {
        let declares: Vec<String> = plugin
            .extension_points()
            .iter()
            .map(|point| point.id().to_string())
            .collect();
        table.add_row(vec![
            Cell::new(plugin.id()),
            Cell::new(plugin.name()),
            Cell::new(or_dash(declares)),
            Cell::new(or_dash(contributions(&app, plugin)?)),
        ]);
    }

    println!("{table}");
    Ok(())
}

/// `<extension point> (<count>)` for every point the plugin contributes to.
fn contributions(app: &Application, plugin: &PluginHandle) -> Result<Vec<String>> {
    let mut contributed = Vec::new();
    for point in app.get_extension_points() {
        let count = plugin.extensions(point.id())?.len();
        if count > 0 {
            contributed.push(format!("{} ({count})", point.id()));
        }
    }
    Ok(contributed)
}

fn or_dash(items: Vec<String>) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(Vec::new()), "-");
        assert_eq!(or_dash(vec!["a".into(), "b".into()]), "a\nb");
    }

    #[test]
    fn test_quotes_plugin_contributes_messages() {
        let home = tempfile::tempdir().unwrap();
        let app = app::build(ApplicationConfig::new("acme").with_home(home.path())).unwrap();
        let quotes = app.get_plugin("acme.motd.software_quotes").unwrap();
        let contributed = contributions(&app, &quotes).unwrap();
        assert_eq!(contributed.len(), 1);
        assert!(contributed[0].starts_with("acme.motd.messages ("));
    }
}
