//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, master key resolution and output
//! formatting.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use sshkeep_vault::keychain::{ConfigKeychain, EnvKeychain, KeychainProvider};
use sshkeep_vault::{Connection, Settings, Storage};
use tracing_subscriber::EnvFilter;

use crate::cli::ProfileArgs;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Master key
// ---------------------------------------------------------------------------

/// Pick the master key source: `SSHKEEP_SECRET` when set, otherwise the
/// config file.
pub fn keychain(settings: &Settings, storage: Arc<dyn Storage>) -> Box<dyn KeychainProvider> {
    let env = EnvKeychain::from_env();
    if env.has_master_key().unwrap_or(false) {
        tracing::debug!("using master key from environment");
        return Box::new(env);
    }
    Box::new(ConfigKeychain::new(settings.config_store(storage)))
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Turn CLI flags into a profile, reading the password and key file as
/// requested.
pub fn profile_from_args(args: &ProfileArgs, stdin: &mut dyn BufRead) -> Result<Connection> {
    let password = match (&args.password, args.password_stdin) {
        (Some(pw), _) => pw.clone(),
        (None, true) => {
            let mut line = String::new();
            stdin
                .read_line(&mut line)
                .context("failed to read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
        (None, false) => String::new(),
    };

    let private_key = match &args.private_key_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read private key {}", path.display()))?,
        None => String::new(),
    };

    if args.alias.trim().is_empty() {
        bail!("alias must not be empty");
    }

    Ok(Connection::ssh(&args.alias, &args.login, &args.address)
        .with_port(args.port)
        .with_password(password)
        .with_private_key(private_key))
}

/// Mask a secret for display.
pub fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "(none)" } else { "********" }
}

/// Multi-line description of one profile.
pub fn describe(conn: &Connection, reveal: bool) -> String {
    let (password, key) = if reveal {
        (conn.password.as_str(), conn.options.private_key.as_str())
    } else {
        (mask(&conn.password), mask(&conn.options.private_key))
    };

    format!(
        "alias:       {}\n\
         type:        {}\n\
         address:     {}\n\
         login:       {}\n\
         port:        {}\n\
         password:    {}\n\
         private key: {}\n\
         created:     {}\n\
         updated:     {}",
        conn.alias,
        conn.connection_type,
        conn.address,
        conn.login,
        conn.options.port,
        password,
        key.trim_end(),
        conn.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        conn.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// One table row for `list`.
pub fn list_row(conn: &Connection) -> String {
    format!(
        "{:<20} {:<30} {:>5}  {}",
        conn.alias,
        conn.destination(),
        conn.options.port,
        conn.updated_at.format("%Y-%m-%d %H:%M"),
    )
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn args() -> ProfileArgs {
        ProfileArgs {
            alias: "prod".into(),
            login: "root".into(),
            address: "10.0.0.1".into(),
            port: 2222,
            password: None,
            password_stdin: false,
            private_key_file: None,
        }
    }

    #[test]
    fn profile_reads_password_from_stdin() {
        let mut a = args();
        a.password_stdin = true;
        let mut input = Cursor::new(b"from-stdin\nignored\n".to_vec());

        let conn = profile_from_args(&a, &mut input).unwrap();
        assert_eq!(conn.password, "from-stdin");
        assert_eq!(conn.options.port, 2222);
    }

    #[test]
    fn profile_reads_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("id_test");
        std::fs::write(&key_path, "PRIVATE\n").unwrap();

        let mut a = args();
        a.private_key_file = Some(key_path);
        a.password = Some("pw".into());

        let conn = profile_from_args(&a, &mut Cursor::new(Vec::new())).unwrap();
        assert_eq!(conn.options.private_key, "PRIVATE\n");
        assert_eq!(conn.password, "pw");
    }

    #[test]
    fn missing_key_file_is_an_error() {
        let mut a = args();
        a.private_key_file = Some("/definitely/not/here".into());
        assert!(profile_from_args(&a, &mut Cursor::new(Vec::new())).is_err());
    }

    #[test]
    fn describe_masks_unless_revealed() {
        let conn = Connection::ssh("a", "u", "h").with_password("pw");
        let masked = describe(&conn, false);
        assert!(masked.contains("********"));
        assert!(!masked.contains("password:    pw"));
        assert!(describe(&conn, true).contains("password:    pw"));
        assert!(list_row(&conn).starts_with("a "));
    }
}
