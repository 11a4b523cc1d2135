//! trellis-motd - the "Message of the Day" plugins
//!
//! Two plugins that only know each other through an extension point id:
//!
//! - [`MotdPlugin`] (`acme.motd`) declares the [`MESSAGES`] extension point
//!   and offers a [`Motd`] service that picks one of the contributed messages
//! - [`SoftwareQuotesPlugin`] (`acme.motd.software_quotes`) contributes a
//!   collection of quotes about software to it
//!
//! ```no_run
//! use std::sync::Arc;
//! use trellis_core::{Application, ApplicationConfig};
//! use trellis_motd::{Motd, MotdPlugin, SoftwareQuotesPlugin};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Application::with_plugins(
//!         ApplicationConfig::new("acme.motd"),
//!         vec![Arc::new(MotdPlugin::new()), Arc::new(SoftwareQuotesPlugin::new())],
//!     )?;
//!     app.start()?;
//!     if let Some(motd) = Motd::lookup(&app)? {
//!         println!("{}", motd.motd());
//!     }
//!     app.stop()?;
//!     Ok(())
//! }
//! ```

mod message;
mod motd;
mod plugin;
mod software_quotes;

pub use message::Message;
pub use motd::{MOTD_PROTOCOL, Motd};
pub use plugin::{MESSAGES, MOTD_PLUGIN_ID, MotdPlugin};
pub use software_quotes::{SOFTWARE_QUOTES_PLUGIN_ID, SoftwareQuotesPlugin, software_quotes};
