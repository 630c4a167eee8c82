use clap::Subcommand;
use tasksync_core::Config;

use super::CliResult;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective configuration (file plus environment overrides)
    Show,
    /// Get a config value
    Get {
        /// Dot-path key (e.g. "google.calendar_id", "dispatch.batch_size")
        key: String,
    },
    /// Set a config value in the config file
    Set {
        /// Dot-path key
        key: String,
        /// New value
        value: String,
    },
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Path => {
            println!("{}", Config::path()?.display());
        }
        ConfigAction::Show => {
            let config = super::load_config()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Get { key } => {
            let config = super::load_config()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            // Overrides stay out of the file.
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("ok");
        }
    }
    Ok(())
}
