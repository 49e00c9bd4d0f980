//! Command-line surface and its mapping onto the configuration layers.

use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::Serialized;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "printcert",
    version,
    about = "Install a TLS certificate on a printer through its web console"
)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long)]
    pub log_level: Option<String>,

    /// Printer hostname or IP (optionally host:port)
    #[arg(long)]
    pub hostname: Option<String>,

    /// Web console password
    #[arg(long)]
    pub password: Option<String>,

    /// Private key PEM file
    #[arg(long)]
    pub keyfile: Option<PathBuf>,

    /// Certificate (chain) PEM file
    #[arg(long)]
    pub certfile: Option<PathBuf>,

    /// Private key PEM content
    #[arg(long)]
    pub keypem: Option<String>,

    /// Certificate (chain) PEM content
    #[arg(long)]
    pub certpem: Option<String>,

    /// Use plain HTTP for the web console (insecure); `--http=false` turns
    /// a configured value off
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub http: Option<bool>,

    /// Accept the console's current certificate even if it does not verify
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub accept_invalid_certs: Option<bool>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Upload, activate and clean up (default)
    Install,
    /// List installed certificates and their serials
    List,
    /// Show the certificate the console is serving
    Active,
    /// Delete one installed certificate
    Delete {
        /// Certificate id as shown by `list`
        #[arg(long)]
        id: String,
    },
}

#[derive(Serialize, Default)]
struct Overrides {
    device: DeviceOverrides,
    material: MaterialOverrides,
    log: LogOverrides,
}

#[derive(Serialize, Default)]
struct DeviceOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    use_http: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accept_invalid_certs: Option<bool>,
}

#[derive(Serialize, Default)]
struct MaterialOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    key_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cert_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_pem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cert_pem: Option<String>,
}

#[derive(Serialize, Default)]
struct LogOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    level: Option<String>,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Install)
    }

    /// Merge the flags that were actually given on top of `figment`.
    pub fn apply(&self, figment: Figment) -> Figment {
        let overrides = Overrides {
            device: DeviceOverrides {
                host: self.hostname.clone(),
                password: self.password.clone(),
                use_http: self.http,
                accept_invalid_certs: self.accept_invalid_certs,
            },
            material: MaterialOverrides {
                key_file: self.keyfile.clone(),
                cert_file: self.certfile.clone(),
                key_pem: self.keypem.clone(),
                cert_pem: self.certpem.clone(),
            },
            log: LogOverrides {
                level: self.log_level.clone(),
            },
        };
        figment.merge(Serialized::defaults(overrides))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printcert_core::AppConfig;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("printcert").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn install_is_the_default_command() {
        assert_eq!(parse(&[]).command(), Command::Install);
        assert_eq!(parse(&["list"]).command(), Command::List);
    }

    #[test]
    fn delete_requires_an_id() {
        assert!(Cli::try_parse_from(["printcert", "delete"]).is_err());
        let cli = parse(&["delete", "--id", "12"]);
        assert_eq!(cli.command(), Command::Delete { id: "12".into() });
    }

    #[test]
    fn flags_override_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "device:\n  host: from-file\n  password: file-pass\n  settle_secs: 2\nlog:\n  level: warn\n"
        )
        .unwrap();
        let cli = parse(&["--hostname", "printer.lan", "--http", "--keypem", "KEY"]);
        let cfg = AppConfig::from_figment(cli.apply(AppConfig::figment(Some(file.path())))).unwrap();
        assert_eq!(cfg.device.host, "printer.lan");
        assert_eq!(cfg.device.password, "file-pass");
        assert_eq!(cfg.device.settle_secs, 2);
        assert!(cfg.device.use_http);
        assert_eq!(cfg.material.key_pem.as_deref(), Some("KEY"));
        assert_eq!(cfg.log.level, "warn");
    }

    #[test]
    fn absent_switches_leave_configured_values_alone() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "device:\n  use_http: true\n  accept_invalid_certs: true\n").unwrap();
        let cli = parse(&["--log-level", "debug"]);
        let cfg = AppConfig::from_figment(cli.apply(AppConfig::figment(Some(file.path())))).unwrap();
        assert!(cfg.device.use_http);
        assert!(cfg.device.accept_invalid_certs);
        assert_eq!(cfg.log.level, "debug");
    }

    #[test]
    fn switches_can_turn_configured_values_off() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "device:\n  use_http: true\n  accept_invalid_certs: true\n").unwrap();
        let cli = parse(&["--http=false", "--accept-invalid-certs=false", "list"]);
        assert_eq!(cli.command(), Command::List);
        let cfg = AppConfig::from_figment(cli.apply(AppConfig::figment(Some(file.path())))).unwrap();
        assert!(!cfg.device.use_http);
        assert!(!cfg.device.accept_invalid_certs);
    }

    #[test]
    fn bare_switch_does_not_swallow_the_subcommand() {
        let cli = parse(&["--http", "active"]);
        assert_eq!(cli.http, Some(true));
        assert_eq!(cli.command(), Command::Active);
    }
}
