//! The `acme.motd` plugin.

use std::sync::Arc;

use trellis_plugin_api::{
    ExtensionChangeEvent, ExtensionPoint, ExtensionPointView, ExtensionProvider, Notifier, Plugin,
    PluginContext, PluginError, Properties, ServiceObject, ServiceOffer, ServiceValue, ViewEvent,
};

use crate::message::Message;
use crate::motd::Motd;

pub const MOTD_PLUGIN_ID: &str = "acme.motd";

/// Extension point collecting [`Message`]s.
pub const MESSAGES: &str = "acme.motd.messages";

/// Declares the messages extension point and offers the [`Motd`] service.
///
/// The service is built on first lookup and follows later contributions.
#[derive(Debug, Default)]
pub struct MotdPlugin {
    changes: Notifier<ExtensionChangeEvent>,
}

impl MotdPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExtensionProvider for MotdPlugin {
    fn extension_points(&self) -> Vec<ExtensionPoint> {
        vec![
            ExtensionPoint::of::<Message>(MESSAGES)
                .with_description("Messages to choose the message of the day from"),
        ]
    }

    fn extension_changes(&self) -> &Notifier<ExtensionChangeEvent> {
        &self.changes
    }
}

impl Plugin for MotdPlugin {
    fn id(&self) -> &str {
        MOTD_PLUGIN_ID
    }

    fn name(&self) -> &str {
        "MOTD"
    }

    fn service_offers(&self, ctx: &PluginContext) -> Vec<ServiceOffer> {
        let registry = ctx.extension_registry().clone();
        let factory = move |_properties: &Properties| -> Result<ServiceObject, PluginError> {
            let messages = ExtensionPointView::connect(registry.clone(), MESSAGES, MOTD_PLUGIN_ID)?;
            Ok(Arc::new(Motd::new(messages)))
        };
        vec![ServiceOffer::new(Motd::protocol(), ServiceValue::factory(factory))]
    }

    fn start(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        let count = ctx.extensions(MESSAGES)?.len();
        ctx.log_info(&format!("{count} messages contributed"));
        Ok(())
    }

    fn extensions_changed(
        &self,
        ctx: &PluginContext,
        _extension_point_id: &str,
        event: &ViewEvent,
    ) -> Result<(), PluginError> {
        match event {
            ViewEvent::Items { added, removed, .. } => ctx.log_debug(&format!(
                "messages changed: {} added, {} removed",
                added.len(),
                removed.len()
            )),
            ViewEvent::Replaced { new, .. } => {
                ctx.log_debug(&format!("messages replaced: {} now", new.len()))
            }
        }
        Ok(())
    }
}
