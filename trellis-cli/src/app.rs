//! Assembling the application the commands run against.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use trellis_core::{Application, ApplicationConfig, ConfigLoader, CorePlugin};
use trellis_motd::{Message, MotdPlugin, SoftwareQuotesPlugin};
use trellis_plugin_api::{Extension, Plugin, ServiceOffer};

pub fn load_config(extra: Option<&Path>) -> Result<ApplicationConfig> {
    ConfigLoader::load_with(extra).context("Failed to load configuration")
}

/// Every plugin the binary ships with, in start order.
pub fn builtin_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(CorePlugin::new()),
        Arc::new(MotdPlugin::new()),
        Arc::new(SoftwareQuotesPlugin::new()),
    ]
}

pub fn build(config: ApplicationConfig) -> Result<Application> {
    let id = config.id.clone();
    Application::with_plugins(config, builtin_plugins())
        .with_context(|| format!("Failed to assemble application '{id}'"))
}

/// One-line rendering of a contribution.
pub fn describe(extension: &Extension) -> String {
    if let Some(message) = extension.downcast_ref::<Message>() {
        format!("{}: {}", message.author, message.text)
    } else if let Some(offer) = extension.downcast_ref::<ServiceOffer>() {
        format!("service offer for {}", offer.protocol)
    } else {
        format!("{extension:?}")
    }
}
