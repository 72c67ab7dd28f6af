pub mod onboard;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "levelup",
    about = "Gamified productivity tracker with XP, levels and streaks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Status,
    Doctor,
    /// Run the REST API in the foreground
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the XP table of the configured level curve
    Curve {
        #[arg(long, default_value_t = 20)]
        levels: u32,
        #[arg(long)]
        variant: Option<String>,
    },
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum AiCommands {
    Test {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, ConfigCommands};
    use clap::{CommandFactory, Parser};

    #[test]
    fn command_definitions_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_curve_and_config_commands() {
        let cli = Cli::parse_from(["levelup", "curve", "--levels", "5", "--variant", "quadratic"]);
        assert!(matches!(
            cli.command,
            Commands::Curve { levels: 5, variant: Some(ref name) } if name == "quadratic"
        ));

        let cli = Cli::parse_from(["levelup", "config", "set", "engine.variant", "b"]);
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Set { ref key, .. }
            } if key == "engine.variant"
        ));
    }
}
