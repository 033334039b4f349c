use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "mindful", version, about = "Guided meditation timer")]
pub struct Cli {
    /// Directory holding history and settings
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// JSON script catalog to use instead of the built-in scripts
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Treat the OS as preferring a dark color scheme
    #[arg(long, global = true)]
    pub prefers_dark: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List available meditation scripts
    Scripts,
    /// Run a session; control it with commands on stdin
    Start {
        script_id: String,
        /// Initial volume between 0 and 1
        #[arg(long)]
        volume: Option<f32>,
        /// Start muted
        #[arg(long)]
        muted: bool,
    },
    /// Show finished sessions, newest first
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Remove a session from history
    Delete { session_id: String },
    /// Show or change the color theme
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ThemeAction {
    /// Set the preference: light, dark or system
    Set { mode: String },
    /// Flip between light and dark
    Toggle,
}

impl Cli {
    /// Flags win over the environment.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(path) = &self.catalog {
            config.catalog_path = Some(path.clone());
        }
        if self.prefers_dark {
            config.prefers_dark = true;
        }
        if self.no_color {
            config.color = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_with_options() {
        let cli = Cli::try_parse_from([
            "mindful",
            "--data-dir",
            "/tmp/x",
            "start",
            "breathing-3",
            "--volume",
            "0.4",
            "--muted",
        ])
        .unwrap();

        match cli.command {
            Command::Start {
                ref script_id,
                volume,
                muted,
            } => {
                assert_eq!(script_id, "breathing-3");
                assert_eq!(volume, Some(0.4));
                assert!(muted);
            }
            ref other => panic!("unexpected command {other:?}"),
        }

        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/x"));
    }

    #[test]
    fn theme_action_is_optional() {
        let cli = Cli::try_parse_from(["mindful", "theme"]).unwrap();
        assert!(matches!(cli.command, Command::Theme { action: None }));

        let cli = Cli::try_parse_from(["mindful", "theme", "set", "dark"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Theme {
                action: Some(ThemeAction::Set { .. })
            }
        ));
    }
}
