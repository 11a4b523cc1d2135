//! The `acme.motd.software_quotes` plugin.

use trellis_plugin_api::{
    Contributions, Extension, ExtensionChangeEvent, ExtensionProvider, Notifier, Plugin,
    PluginError,
};

use crate::message::Message;
use crate::plugin::MESSAGES;

pub const SOFTWARE_QUOTES_PLUGIN_ID: &str = "acme.motd.software_quotes";

/// Quotes about software, for the message of the day.
pub fn software_quotes() -> Vec<Message> {
    vec![
        Message::new(
            "Bertrand Meyer",
            "You can have quality software, or you can have pointer arithmetic; \
             but you cannot have both at the same time.",
        ),
        Message::new(
            "Edsger W. Dijkstra",
            "The effective programmer is keenly aware of the limited size of his own head.",
        ),
        Message::new(
            "Richard Buckminster-Fuller",
            "When I'm working on a problem, I never think about beauty. I think only \
             how to solve the problem. But when I have finished, if the solution is \
             not beautiful, I know it is wrong.",
        ),
        Message::new(
            "Tom Gilb",
            "If you don't know what you're doing, don't do it on a large scale.",
        ),
        Message::new(
            "Arthur Norman",
            "The best way to implement hard code is never to know you're implementing it.",
        ),
        Message::new(
            "Albert Einstein",
            "Any intelligent fool can make things bigger, more complex, and more violent. \
             It takes a touch of genius - and a lot of courage - to move in the opposite \
             direction.",
        ),
        Message::new(
            "Martin Fowler",
            "Any fool can write code that a computer can understand. Good programmers \
             write code that humans can understand.",
        ),
        Message::new(
            "Chet Hendrickson",
            "The rule is, 'Do the simplest thing that could possibly work', not the most stupid.",
        ),
        Message::new(
            "Ron Jeffries",
            "If you're working sixty hour weeks, you're too tired to be doing good software.",
        ),
        Message::new(
            "Edward Tufte",
            "Clutter and confusion are failures of design, not attributes of information. \
             There's no such thing as information overload.",
        ),
    ]
}

/// Contributes [`software_quotes`] to the messages extension point.
///
/// The quotes are only built when the extension point is first read.
#[derive(Debug)]
pub struct SoftwareQuotesPlugin {
    contributions: Contributions,
}

impl SoftwareQuotesPlugin {
    pub fn new() -> Self {
        Self {
            contributions: Contributions::new().lazy(MESSAGES, || {
                Ok(software_quotes().into_iter().map(Extension::new).collect())
            }),
        }
    }

    /// Contribute one more message.
    pub fn add_message(&self, message: Message) -> Result<(), PluginError> {
        self.contributions.push(MESSAGES, Extension::new(message))
    }
}

impl Default for SoftwareQuotesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionProvider for SoftwareQuotesPlugin {
    fn extensions(&self, extension_point_id: &str) -> Result<Vec<Extension>, PluginError> {
        self.contributions.extensions(extension_point_id)
    }

    fn extension_changes(&self) -> &Notifier<ExtensionChangeEvent> {
        self.contributions.changes()
    }
}

impl Plugin for SoftwareQuotesPlugin {
    fn id(&self) -> &str {
        SOFTWARE_QUOTES_PLUGIN_ID
    }

    fn name(&self) -> &str {
        "Software Quotes"
    }
}
