//! Stride CLI - sign in and inspect the client session.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stride_config::Paths;
use tracing::debug;

/// Stride CLI - manage the signed-in session of the Stride client.
#[derive(Parser)]
#[command(name = "stride")]
#[command(about = "Stride CLI for authentication and session inspection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Data directory (defaults to ~/.stride)
    #[arg(long, env = "STRIDE_HOME", global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with username and password
    Login {
        /// Username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Create an account and sign in
    Register {
        /// Username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
        /// Email (prompted when omitted)
        #[arg(short, long)]
        email: Option<String>,
        /// Accept the privacy policy
        #[arg(long)]
        accept_privacy: bool,
        /// Accept health data processing
        #[arg(long)]
        accept_health_data: bool,
        /// Privacy policy version being accepted
        #[arg(long, default_value = "1")]
        privacy_policy_version: String,
        /// Health data policy version being accepted
        #[arg(long, default_value = "1")]
        health_data_policy_version: String,
    },

    /// Logout and clear the stored session
    Logout,

    /// Verify the stored session and show the auth state
    Status,

    /// Refresh the session now
    Refresh,

    /// Show the signed-in user
    Whoami,

    /// Check whether the signed-in user holds any of the given roles
    HasRole {
        /// Role names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Keep the session alive and print every state change
    Watch {
        /// Re-verify the session every N seconds
        #[arg(short, long, default_value = "300")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let paths = match Paths::resolve(cli.base_dir.clone()) {
        Ok(paths) => paths,
        Err(e) => {
            cli.format.error(&e.to_string());
            std::process::exit(1);
        }
    };

    stride_config::init_logging("stride-cli", &cli.log_level, Some(&paths));
    debug!(base_dir = %paths.base_dir().display(), "CLI starting");

    let format = cli.format;
    let result = match cli.command {
        Commands::Login { username } => commands::login(&paths, username, &format).await,
        Commands::Register {
            username,
            email,
            accept_privacy,
            accept_health_data,
            privacy_policy_version,
            health_data_policy_version,
        } => {
            let consent = commands::Consent {
                privacy: accept_privacy,
                privacy_policy_version,
                health_data: accept_health_data,
                health_data_policy_version,
            };
            commands::register(&paths, username, email, consent, &format).await
        }
        Commands::Logout => commands::logout(&paths, &format).await,
        Commands::Status => commands::status(&paths, &format).await,
        Commands::Refresh => commands::refresh(&paths, &format).await,
        Commands::Whoami => commands::whoami(&paths, &format).await,
        Commands::HasRole { names } => commands::has_role(&paths, &names, &format).await,
        Commands::Watch { interval } => commands::watch(&paths, interval, &format).await,
    };

    if let Err(e) = result {
        format.error(&e.to_string());
        std::process::exit(1);
    }
}
