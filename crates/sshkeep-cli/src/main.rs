//! CLI entry point for sshkeep.
//!
//! This binary provides the `sshkeep` command: profile management over the
//! encrypted connection store, config file access, and `connect`, which
//! hands a decrypted profile to the system `ssh` client.

mod cli;
mod helpers;
mod launcher;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use sshkeep_vault::config::ConfigStore;
use sshkeep_vault::keychain::{self, SECRET_KEY};
use sshkeep_vault::{ConnectionStore, Settings, Storage, VaultError};
use tracing::info;

use crate::cli::{Cli, Commands, ConfigAction};
use crate::launcher::{Launcher, SshLauncher};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    helpers::init_tracing("warn");

    let cli = Cli::parse();
    let mut settings = Settings::resolve(cli.home.clone())?;
    let storage = settings.storage();
    let config = settings.config_store(storage.clone());
    settings
        .apply_config(&config)
        .context("failed to read config file")?;

    info!(app_dir = %settings.app_dir.display(), "sshkeep starting");

    match cli.command {
        Commands::Init => cmd_init(&settings, storage),
        Commands::Add(args) => {
            let profile = helpers::profile_from_args(&args, &mut io::stdin().lock())?;
            let stored = open_store(&settings, storage)?.create(profile)?;
            println!("added {}", stored.alias);
            Ok(())
        }
        Commands::Update { old_alias, profile } => {
            let profile = helpers::profile_from_args(&profile, &mut io::stdin().lock())?;
            let stored = open_store(&settings, storage)?.update(profile, &old_alias)?;
            if stored.alias == old_alias {
                println!("updated {}", stored.alias);
            } else {
                println!("updated {} (renamed from {})", stored.alias, old_alias);
            }
            Ok(())
        }
        Commands::Show { alias, reveal } => {
            let conn = open_store(&settings, storage)?.get(&alias)?;
            println!("{}", helpers::describe(&conn, reveal));
            Ok(())
        }
        Commands::List => cmd_list(&settings, storage),
        Commands::Remove { alias } => {
            let removed = open_store(&settings, storage)?.delete(&alias)?;
            println!("removed {}", removed.alias);
            Ok(())
        }
        Commands::Connect { alias } => {
            let conn = open_store(&settings, storage)?.get(&alias)?;
            let status = SshLauncher::new().launch(&conn)?;
            if !status.success() {
                bail!("ssh exited with {status}");
            }
            Ok(())
        }
        Commands::Config { action } => cmd_config(&settings, storage, action),
    }
}

fn open_store(settings: &Settings, storage: Arc<dyn Storage>) -> Result<ConnectionStore> {
    let cipher = helpers::keychain(settings, storage.clone())
        .cipher()
        .context("failed to load master key")?;
    Ok(settings.connection_store(storage, cipher))
}

// ---------------------------------------------------------------------------
// Subcommand: init
// ---------------------------------------------------------------------------

fn cmd_init(settings: &Settings, storage: Arc<dyn Storage>) -> Result<()> {
    let keys = keychain::ConfigKeychain::new(settings.config_store(storage));
    match keychain::generate_master_key(&keys) {
        Ok(()) => {
            println!(
                "master key written to {}",
                settings.app_dir.join(&settings.config_file).display()
            );
            Ok(())
        }
        Err(VaultError::MasterKeyExists) => {
            println!("master key already present; nothing to do");
            Ok(())
        }
        Err(e) => Err(e).context("failed to generate master key"),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: list
// ---------------------------------------------------------------------------

fn cmd_list(settings: &Settings, storage: Arc<dyn Storage>) -> Result<()> {
    let connections = open_store(settings, storage)?.list()?;
    if connections.is_empty() {
        println!("no connections stored");
        return Ok(());
    }

    println!("{:<20} {:<30} {:>5}  UPDATED", "ALIAS", "DESTINATION", "PORT");
    for conn in &connections {
        println!("{}", helpers::list_row(conn));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: config
// ---------------------------------------------------------------------------

fn cmd_config(settings: &Settings, storage: Arc<dyn Storage>, action: ConfigAction) -> Result<()> {
    let config: ConfigStore = settings.config_store(storage);
    match action {
        ConfigAction::Set { key, value } => {
            if key.eq_ignore_ascii_case(SECRET_KEY) {
                bail!("refusing to overwrite the master key; use `sshkeep init`");
            }
            config.set(&key, &value)?;
            println!("{}={}", key.to_ascii_uppercase(), value);
        }
        ConfigAction::Get { key } => match config.try_get(&key)? {
            Some(value) => println!("{value}"),
            None => bail!("config key {} is not set", key.to_ascii_uppercase()),
        },
        ConfigAction::List => {
            for entry in config.entries()? {
                if entry.key == SECRET_KEY {
                    println!("{}={}", entry.key, helpers::mask(&entry.value));
                } else {
                    println!("{entry}");
                }
            }
        }
    }
    Ok(())
}
