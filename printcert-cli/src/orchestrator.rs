//! Workflows run by the binary.
//!
//! `install` is the full cut-over: upload the new certificate, make it the
//! served one and remove the one it replaced. Any failure stops the
//! workflow where it is; nothing is retried or rolled back.

use printcert_console::handshake::current_leaf_serial;
use printcert_console::{
    ConnectOptions, Session, activate, build_bundle, delete, list_records, resolve_active,
    upload_bundle,
};
use printcert_core::cert::serials_match;
use printcert_core::config::DeviceConfig;
use printcert_core::{AppConfig, CertificateId, Result};
use std::fmt;
use tracing::{debug, info, warn};

/// How an `install` run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The console already serves a certificate with the new serial.
    AlreadyInstalled,
    Installed {
        new_id: CertificateId,
        /// The superseded certificate, deleted after the reboot. `None`
        /// when the preset was active; the preset is never deleted.
        replaced: Option<CertificateId>,
    },
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallOutcome::AlreadyInstalled => f.write_str("certificate already installed, nothing to do"),
            InstallOutcome::Installed {
                new_id,
                replaced: Some(old),
            } => write!(f, "installed certificate {new_id}, removed {old}"),
            InstallOutcome::Installed { new_id, replaced: None } => {
                write!(f, "installed certificate {new_id}")
            }
        }
    }
}

fn connect(device: &DeviceConfig) -> Result<Session> {
    device.validate()?;
    let opts = ConnectOptions::from_device(device);
    if opts.use_http {
        warn!(host = %opts.host, "Using plain HTTP, the console password is sent unencrypted");
    }
    Session::connect(&opts, &device.password)
}

/// Whether the certificate the device serves carries `serial`. A failed
/// handshake ends the workflow.
fn already_served(served: Result<Vec<u8>>, serial: &[u8]) -> Result<bool> {
    let served = served?;
    let same = serials_match(&served, serial);
    if same {
        info!(serial = %hex::encode(&served), "Certificate already served by the device");
    } else {
        debug!(serial = %hex::encode(&served), "Device serves a different certificate");
    }
    Ok(same)
}

pub fn install(cfg: &AppConfig) -> Result<InstallOutcome> {
    cfg.device.validate()?;
    let (key_pem, cert_pem) = cfg.material.pem_bytes()?;
    // Bad material fails here, before the device is touched.
    let bundle = build_bundle(&key_pem, &cert_pem)?;
    debug!(bundle = ?bundle, "Bundle encoded");

    let session = connect(&cfg.device)?;

    if session.is_secure() && already_served(current_leaf_serial(&session), bundle.leaf_serial())? {
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    let old = resolve_active(&session)?;
    info!(id = %old.id, name = old.name_or_placeholder(), "Currently active certificate");

    let new_id = upload_bundle(&session, &bundle)?;
    activate(&session, &new_id)?;

    if old.id.is_preset() {
        return Ok(InstallOutcome::Installed {
            new_id,
            replaced: None,
        });
    }

    let wait = cfg.device.reboot_wait();
    info!(secs = wait.as_secs(), "Waiting for the device to reboot");
    std::thread::sleep(wait);

    // The new certificate is live after the reboot, so https is usable now
    // even if the first session had to fall back to http.
    let mut opts = ConnectOptions::from_device(&cfg.device);
    opts.use_http = false;
    let session = Session::connect(&opts, &cfg.device.password)?;
    delete(&session, &old.id)?;

    Ok(InstallOutcome::Installed {
        new_id,
        replaced: Some(old.id),
    })
}

/// One line per installed certificate; the active one is marked.
pub fn list(cfg: &AppConfig) -> Result<Vec<String>> {
    let session = connect(&cfg.device)?;
    let records = list_records(&session)?;
    let active = match resolve_active(&session) {
        Ok(active) => Some(active.id),
        Err(e) => {
            warn!(error = %e, "Active certificate unknown");
            None
        }
    };
    Ok(records
        .iter()
        .map(|r| {
            let serial = r.serial_hex().unwrap_or_else(|| "?".into());
            let marker = if active.as_ref() == Some(&r.id) { " (active)" } else { "" };
            format!("{:>4}  {serial}{marker}", r.id)
        })
        .collect())
}

pub fn active(cfg: &AppConfig) -> Result<String> {
    let session = connect(&cfg.device)?;
    let active = resolve_active(&session)?;
    Ok(format!("{active} [via {}]", active.resolved_by))
}

pub fn delete_one(cfg: &AppConfig, id: &str) -> Result<()> {
    let id: CertificateId = id.parse()?;
    let session = connect(&cfg.device)?;
    delete(&session, &id)
}
