//! CLI argument definitions for sshkeep.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// sshkeep -- encrypted SSH connection profiles.
#[derive(Parser)]
#[command(
    name = "sshkeep",
    version,
    about = "sshkeep -- encrypted SSH connection profiles",
    long_about = "Keeps SSH hosts, logins, passwords and private keys under short aliases. \
                  Secrets are encrypted at rest with AES-256-GCM and decrypted only to \
                  open a session."
)]
pub struct Cli {
    /// App directory (defaults to $SSHKEEP_HOME, then ~/.sshkeep).
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the master key and store it in the config file.
    Init,

    /// Add a new connection profile.
    Add(ProfileArgs),

    /// Replace the profile stored under OLD_ALIAS.
    Update {
        /// Alias of the profile to replace.
        old_alias: String,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Show one profile.
    Show {
        alias: String,

        /// Print secrets instead of masking them.
        #[arg(long)]
        reveal: bool,
    },

    /// List all profiles.
    List,

    /// Delete a profile.
    Remove { alias: String },

    /// Open an SSH session for a profile.
    Connect { alias: String },

    /// Read or write the plain config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Fields of a connection profile.
#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    /// Unique alias for the profile.
    #[arg(long, short)]
    pub alias: String,

    /// Remote user name.
    #[arg(long, short)]
    pub login: String,

    /// Host name or IP address.
    #[arg(long = "address", short = 'H')]
    pub address: String,

    /// SSH port.
    #[arg(long, short, default_value_t = 22)]
    pub port: u16,

    /// Password. Prefer --password-stdin to keep it out of shell history.
    #[arg(long, conflicts_with = "password_stdin")]
    pub password: Option<String>,

    /// Read the password from the first line of standard input.
    #[arg(long)]
    pub password_stdin: bool,

    /// Path to a private key whose contents are stored encrypted.
    #[arg(long, short = 'i', value_name = "FILE")]
    pub private_key_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set KEY to VALUE.
    Set { key: String, value: String },

    /// Print the value of KEY.
    Get { key: String },

    /// Print every entry (the master key is masked).
    List,
}
