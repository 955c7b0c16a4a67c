//! Command-line and environment configuration.

use crate::core::credentials::{Credentials, CredentialsError};
use crate::console::documents::DEFAULT_LIMIT;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "firestore-console", version, about = "Firestore and Firebase Auth administration console")]
pub struct ConsoleArgs {
    /// Address to listen on
    #[arg(long, env = "CONSOLE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Service account key file; when absent the key is read from FIREBASE_SERVICE_ACCOUNT
    #[arg(long, env = "CONSOLE_SERVICE_ACCOUNT_FILE")]
    pub service_account_file: Option<PathBuf>,

    /// Retries for transient backend failures (0 disables retrying)
    #[arg(long, env = "CONSOLE_MAX_RETRIES", default_value_t = 0)]
    pub max_retries: u32,

    /// Page size for listings that do not specify one
    #[arg(long, env = "CONSOLE_DEFAULT_LIMIT", default_value_t = DEFAULT_LIMIT)]
    pub default_limit: u32,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl ConsoleArgs {
    /// Loads the service account key from the configured file or the environment.
    pub fn credentials(&self) -> Result<Credentials, CredentialsError> {
        match &self.service_account_file {
            Some(path) => Credentials::from_file(path),
            None => Credentials::from_env(),
        }
    }
}
