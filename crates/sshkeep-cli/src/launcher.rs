//! Spawns the system `ssh` client for a decrypted profile.
//!
//! No SSH protocol logic lives here. The child inherits the terminal's
//! standard streams and the call blocks until the session ends.
//!
//! - The password, if any, is handed to `sshpass -e` through the `SSHPASS`
//!   environment variable so it never shows up in the process list.
//! - The private key, if any, is written to a `0600` temporary file that is
//!   removed when the session ends, and passed with `-i`.

use std::io::Write;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use sshkeep_vault::Connection;
use tracing::{debug, info};

/// Something that can open an interactive session for a profile.
pub trait Launcher {
    fn launch(&self, connection: &Connection) -> Result<ExitStatus>;
}

/// [`Launcher`] backed by the OpenSSH client.
#[derive(Debug, Clone)]
pub struct SshLauncher {
    ssh_program: String,
    sshpass_program: String,
    host_key_checking: String,
}

impl Default for SshLauncher {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".into(),
            sshpass_program: "sshpass".into(),
            host_key_checking: "accept-new".into(),
        }
    }
}

impl SshLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the `StrictHostKeyChecking` option passed to `ssh`.
    pub fn with_host_key_checking(mut self, value: impl Into<String>) -> Self {
        self.host_key_checking = value.into();
        self
    }

    /// Build the command line for `connection` without spawning it.
    pub fn build_command(&self, connection: &Connection, key_file: Option<&Path>) -> Command {
        let mut cmd = if connection.password.is_empty() {
            Command::new(&self.ssh_program)
        } else {
            let mut cmd = Command::new(&self.sshpass_program);
            cmd.arg("-e").arg(&self.ssh_program);
            cmd.env("SSHPASS", &connection.password);
            cmd
        };

        cmd.arg("-t")
            .arg("-p")
            .arg(connection.options.port.to_string())
            .arg("-o")
            .arg(format!("StrictHostKeyChecking={}", self.host_key_checking));

        if let Some(path) = key_file {
            cmd.arg("-i").arg(path).arg("-o").arg("IdentitiesOnly=yes");
        }

        cmd.arg(connection.destination());
        cmd
    }
}

/// Write the private key to a temporary file readable only by the owner.
fn write_key_file(private_key: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("sshkeep-key-")
        .tempfile()
        .context("failed to create temporary key file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .context("failed to restrict key file permissions")?;
    }

    file.write_all(private_key.as_bytes())?;
    if !private_key.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.flush()?;
    Ok(file)
}

impl Launcher for SshLauncher {
    fn launch(&self, connection: &Connection) -> Result<ExitStatus> {
        let key_file = if connection.options.private_key.is_empty() {
            None
        } else {
            Some(write_key_file(&connection.options.private_key)?)
        };

        let mut cmd = self.build_command(connection, key_file.as_ref().map(|f| f.path()));
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        debug!(
            program = ?cmd.get_program(),
            alias = %connection.alias,
            "spawning ssh"
        );
        info!(alias = %connection.alias, destination = %connection.destination(), "connecting");

        let status = cmd
            .status()
            .with_context(|| format!("failed to run {:?}", cmd.get_program()))?;

        // The temp key file is removed here, after the session ended.
        drop(key_file);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn plain_ssh_without_password() {
        let conn = Connection::ssh("a", "root", "example.com").with_port(2222);
        let cmd = SshLauncher::new().build_command(&conn, None);

        assert_eq!(cmd.get_program(), "ssh");
        assert_eq!(
            args(&cmd),
            [
                "-t",
                "-p",
                "2222",
                "-o",
                "StrictHostKeyChecking=accept-new",
                "root@example.com"
            ]
        );
    }

    #[test]
    fn password_goes_through_env_not_args() {
        let conn = Connection::ssh("a", "root", "h").with_password("s3cret");
        let cmd = SshLauncher::new().build_command(&conn, None);

        assert_eq!(cmd.get_program(), "sshpass");
        let argv = args(&cmd);
        assert_eq!(&argv[..2], ["-e", "ssh"]);
        assert!(!argv.iter().any(|a| a.contains("s3cret")));

        let env: Vec<_> = cmd.get_envs().collect();
        assert!(env.contains(&(OsStr::new("SSHPASS"), Some(OsStr::new("s3cret")))));
    }

    #[test]
    fn key_file_is_passed_with_identities_only() {
        let conn = Connection::ssh("a", "u", "h");
        let cmd = SshLauncher::new()
            .with_host_key_checking("yes")
            .build_command(&conn, Some(Path::new("/tmp/k")));

        let argv = args(&cmd);
        assert!(argv.contains(&"StrictHostKeyChecking=yes".to_string()));
        let i = argv.iter().position(|a| a == "-i").unwrap();
        assert_eq!(argv[i + 1], "/tmp/k");
        assert_eq!(argv.last().unwrap(), "u@h");
    }

    #[test]
    fn key_file_is_private_and_terminated() {
        let file = write_key_file("KEY DATA").unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, "KEY DATA\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(file.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
