use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
///
/// Holds the handler tunables and the parameters of the loopback simulation.
/// Values come from an optional TOML file and are then overridden by whatever
/// was given on the command line.
///
/// # Examples
///
/// ```
/// use huddle::configuration::config::Config;
///
/// let config = Config::from_toml_str(
///     "[handler]\nmax_message_bytes = 2048\n\n[demo]\nactivity = \"puppies\"\n",
/// )
/// .unwrap();
/// assert_eq!(config.handler.max_message_bytes, 2048);
/// assert_eq!(config.demo.participants, 2);
/// ```
///
/// # Fields Overview
///
/// - `handler`: a `HandlerConfig` applied to every handler the binary creates
/// - `demo`: a `DemoConfig` describing the simulated call
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub handler: HandlerConfig,
    pub demo: DemoConfig,
}

/// Command line of the demo binary.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "huddle")]
#[command(about = "Simulates devices sharing a group activity")]
pub struct CommandLine {
    /// TOML configuration file
    pub config_file: Option<PathBuf>,

    /// Activity to run: `colors` or `puppies`
    ///
    /// # Command Line
    /// Use `--activity <NAME>` or the `HUDDLE_ACTIVITY` environment variable
    #[arg(long, env = "HUDDLE_ACTIVITY")]
    pub activity: Option<String>,

    /// Number of simulated devices
    #[arg(long)]
    pub participants: Option<usize>,

    /// Number of selection rounds every device plays
    #[arg(long)]
    pub rounds: Option<usize>,

    /// Start with every device ineligible for group sessions
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub ineligible: bool,

    /// With the toggle policy, reconnect the host after it disconnected
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub rejoin: bool,

    /// Stay in the ended phase when a session terminates
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_resubscribe: bool,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Builds the configuration for a parsed command line: file first (or
    /// defaults), then command-line overrides, then validation.
    pub fn load(args: &CommandLine) -> Result<Self, ConfigError> {
        let mut config = match &args.config_file {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_overrides(args)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, args: &CommandLine) -> Result<(), ConfigError> {
        if let Some(activity) = &args.activity {
            self.demo.activity = activity.parse()?;
        }
        if let Some(participants) = args.participants {
            self.demo.participants = participants;
        }
        if let Some(rounds) = args.rounds {
            self.demo.rounds = rounds;
        }
        if args.ineligible {
            self.demo.eligible = false;
        }
        if args.rejoin {
            self.demo.rejoin = true;
        }
        if args.no_resubscribe {
            self.handler.resubscribe_after_end = false;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.handler.validate()?;
        self.demo.validate()
    }
}
