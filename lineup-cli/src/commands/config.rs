//! `lineup config show`

use anyhow::{Context, Result};
use clap::Subcommand;

use super::{load_settings, RemoteArgs};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print effective settings (file, flags and environment merged) with
    /// secrets masked.
    Show(RemoteArgs),
}

pub fn run(cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show(remote) => {
            let mut settings = load_settings()?;
            remote.apply(&mut settings);
            let yaml =
                serde_yaml::to_string(&settings.masked()).context("failed to render settings")?;
            print!("{yaml}");
            Ok(())
        }
    }
}
