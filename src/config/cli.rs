use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "sin")]
#[command(about = "SIN CLI for deploying services via Docker")]
pub struct CliArgs {
    /// Enable debug logging to console
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to the services configuration file
    #[arg(short, long, env = "SIN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Install a specified service
    Install {
        service: String,

        /// Print the endpoint as JSON
        #[arg(long)]
        json: bool,

        /// Mask the password in the printed endpoint
        #[arg(long)]
        redact: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install() {
        let args = CliArgs::try_parse_from(["sin", "--debug", "install", "redis", "--json"]).unwrap();
        assert!(args.debug);
        match args.command {
            Command::Install {
                service,
                json,
                redact,
            } => {
                assert_eq!(service, "redis");
                assert!(json);
                assert!(!redact);
            }
        }
    }

    #[test]
    fn test_install_requires_service() {
        assert!(CliArgs::try_parse_from(["sin", "install"]).is_err());
    }
}
