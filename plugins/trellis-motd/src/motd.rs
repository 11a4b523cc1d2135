//! The `Motd` service.

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde_json::{Value, json};
use trellis_plugin_api::{
    ExtensionPointView, Protocol, Service, ServiceError, ServiceQuery, ServiceRegistry,
};

use crate::message::Message;

/// Protocol name the service is registered under.
pub const MOTD_PROTOCOL: &str = "acme.motd.Motd";

/// Picks a random message from a live view of the contributed messages.
pub struct Motd {
    messages: ExtensionPointView,
}

impl Motd {
    pub fn new(messages: ExtensionPointView) -> Self {
        Self { messages }
    }

    pub fn protocol() -> Protocol {
        Protocol::of_named::<Motd>(MOTD_PROTOCOL)
    }

    /// The first `Motd` service in `registry`, if any.
    pub fn lookup(registry: &dyn ServiceRegistry) -> Result<Option<Arc<Motd>>, ServiceError> {
        registry.get_service_as::<Motd>(&Self::protocol(), &ServiceQuery::all())
    }

    /// Every contributed message, in contribution order.
    pub fn messages(&self) -> Vec<Arc<Message>> {
        self.messages.values::<Message>()
    }

    /// The message of the day.
    pub fn motd(&self) -> Arc<Message> {
        self.messages()
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| Arc::new(Message::fallback()))
    }
}

impl Service for Motd {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "count" => Some(json!(self.messages.len())),
            _ => None,
        }
    }
}
