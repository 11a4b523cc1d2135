//! The core plugin: turns contributed service offers into registered services.

use trellis_plugin_api::{
    Extension, ExtensionChangeEvent, ExtensionPoint, ExtensionProvider, Notifier, Plugin,
    PluginContext, PluginError, ServiceOffer, ViewEvent,
};

pub const CORE_PLUGIN_ID: &str = "trellis.core";

/// Extension point other plugins contribute [`ServiceOffer`]s to.
pub const SERVICE_OFFERS: &str = "trellis.service_offers";

/// Registers every service offer contributed to [`SERVICE_OFFERS`].
///
/// Offers present at start are registered then; offers contributed while
/// the plugin runs are registered as they arrive. All of them are
/// unregistered when the plugin stops.
#[derive(Debug, Default)]
pub struct CorePlugin {
    changes: Notifier<ExtensionChangeEvent>,
}

impl CorePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn register_offers(ctx: &PluginContext, offers: &[Extension]) -> Result<(), PluginError> {
        for extension in offers {
            let Some(offer) = extension.downcast_ref::<ServiceOffer>() else {
                tracing::warn!(
                    plugin = %CORE_PLUGIN_ID,
                    found = extension.type_name(),
                    "Ignoring a service offer that is not a ServiceOffer"
                );
                continue;
            };
            let service_id = ctx.register_owned_service(
                offer.protocol.clone(),
                offer.value.clone(),
                offer.properties.clone(),
            )?;
            tracing::debug!(
                plugin = %CORE_PLUGIN_ID,
                service_id,
                protocol = %offer.protocol,
                "Registered contributed service offer"
            );
        }
        Ok(())
    }
}

impl ExtensionProvider for CorePlugin {
    fn extension_points(&self) -> Vec<ExtensionPoint> {
        vec![
            ExtensionPoint::of::<ServiceOffer>(SERVICE_OFFERS)
                .with_description("Services registered while the core plugin runs"),
        ]
    }

    fn extension_changes(&self) -> &Notifier<ExtensionChangeEvent> {
        &self.changes
    }
}

impl Plugin for CorePlugin {
    fn id(&self) -> &str {
        CORE_PLUGIN_ID
    }

    fn name(&self) -> &str {
        "Core"
    }

    fn start(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        let offers = ctx.extensions(SERVICE_OFFERS)?;
        Self::register_offers(ctx, &offers)
    }

    fn extensions_changed(
        &self,
        ctx: &PluginContext,
        extension_point_id: &str,
        event: &ViewEvent,
    ) -> Result<(), PluginError> {
        match event {
            ViewEvent::Items { added, .. } if extension_point_id == SERVICE_OFFERS => {
                Self::register_offers(ctx, added)
            }
            _ => Ok(()),
        }
    }
}
