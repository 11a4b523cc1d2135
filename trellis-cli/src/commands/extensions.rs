//! Print the contributions to an extension point

use anyhow::Result;
use clap::Args;
use trellis_core::ApplicationConfig;
use trellis_plugin_api::ExtensionRegistry;

use crate::app;

#[derive(Args)]
pub struct ExtensionsArgs {
    /// Extension point id, e.g. acme.motd.messages
    pub id: String,
}

pub fn run(config: ApplicationConfig, args: ExtensionsArgs) -> Result<()> {
    let app = app::build(config)?;
    if !app.start()? {
        return Ok(());
    }

    let Some(point) = app.get_extension_point(&args.id) else {
        println!("No extension point named '{}'", args.id);
        println!();
        println!("Known extension points:");
        for point in app.get_extension_points() {
            println!("  {}", point.id());
        }
        app.stop()?;
        return Ok(());
    };

    if !point.description().is_empty() {
        println!("{}: {}", point.id(), point.description());
        println!();
    }

    let extensions = app.get_extensions(point.id())?;
    if extensions.is_empty() {
        println!("No contributions");
    }
    for (index, extension) in extensions.iter().enumerate() {
        println!("{index:>3}  {}", app::describe(extension));
    }

    app.stop()?;
    Ok(())
}
