//! Print the message of the day

use anyhow::{Result, anyhow};
use clap::Args;
use trellis_core::ApplicationConfig;
use trellis_motd::Motd;

use crate::app;

#[derive(Args)]
pub struct MotdArgs {
    /// Print the message as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(config: ApplicationConfig, args: MotdArgs) -> Result<()> {
    let app = app::build(config)?;
    if !app.start()? {
        return Ok(());
    }

    let motd = Motd::lookup(&app)?.ok_or_else(|| anyhow!("No MOTD service is registered"))?;
    let message = motd.motd();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&*message)?);
    } else {
        println!("\n{message}\n");
    }

    app.stop()?;
    Ok(())
}
