//! The MOTD plugins running inside an application.

use std::sync::Arc;

use tempfile::TempDir;
use trellis_core::{Application, ApplicationConfig};
use trellis_motd::{MESSAGES, Message, Motd, MotdPlugin, SoftwareQuotesPlugin, software_quotes};
use trellis_plugin_api::{ExtensionRegistry, Plugin, ServiceQuery, ServiceRegistry};

fn app(home: &TempDir, plugins: Vec<Arc<dyn Plugin>>) -> Application {
    Application::with_plugins(ApplicationConfig::new("acme.motd").with_home(home.path()), plugins)
        .unwrap()
}

#[test]
fn motd_picks_a_contributed_message() {
    let home = TempDir::new().unwrap();
    let app = app(
        &home,
        vec![Arc::new(MotdPlugin::new()), Arc::new(SoftwareQuotesPlugin::new())],
    );
    app.start().unwrap();

    let motd = Motd::lookup(&app).unwrap().expect("service registered");
    let quotes = software_quotes();
    assert_eq!(motd.messages().len(), quotes.len());
    assert!(quotes.contains(&*motd.motd()));

    app.stop().unwrap();
    assert!(Motd::lookup(&app).unwrap().is_none());
}

#[test]
fn motd_falls_back_without_messages() {
    let home = TempDir::new().unwrap();
    let app = app(&home, vec![Arc::new(MotdPlugin::new())]);
    app.start().unwrap();

    let motd = Motd::lookup(&app).unwrap().unwrap();
    assert_eq!(*motd.motd(), Message::fallback());
}

#[test]
fn motd_follows_new_contributions() {
    let home = TempDir::new().unwrap();
    let quotes = Arc::new(SoftwareQuotesPlugin::new());
    let app = app(&home, vec![Arc::new(MotdPlugin::new()), quotes.clone()]);
    app.start().unwrap();

    let motd = Motd::lookup(&app).unwrap().unwrap();
    let before = motd.messages().len();
    quotes
        .add_message(Message::new("Grace Hopper", "A ship in port is safe, but that is not what ships are for."))
        .unwrap();

    assert_eq!(motd.messages().len(), before + 1);
    assert_eq!(app.get_extensions(MESSAGES).unwrap().len(), before + 1);
}

#[test]
fn motd_is_queryable_by_message_count() {
    let home = TempDir::new().unwrap();
    let app = app(
        &home,
        vec![Arc::new(MotdPlugin::new()), Arc::new(SoftwareQuotesPlugin::new())],
    );
    app.start().unwrap();

    let found = app
        .get_services(&Motd::protocol(), &ServiceQuery::filter("count > 5"))
        .unwrap();
    assert_eq!(found.len(), 1);
    let none = app
        .get_services(&Motd::protocol(), &ServiceQuery::filter("count > 100"))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn excluding_the_quotes_plugin_leaves_the_fallback() {
    let home = TempDir::new().unwrap();
    let mut config = ApplicationConfig::new("acme.motd").with_home(home.path());
    config.plugins.exclude = vec!["acme.motd.software_*".to_string()];
    let app = Application::with_plugins(
        config,
        vec![Arc::new(MotdPlugin::new()), Arc::new(SoftwareQuotesPlugin::new())],
    )
    .unwrap();
    app.start().unwrap();

    let motd = Motd::lookup(&app).unwrap().unwrap();
    assert!(motd.messages().is_empty());
    assert_eq!(*motd.motd(), Message::fallback());
}
