//! Certificate import.
//!
//! The console's answer to an import says nothing about the id it assigned,
//! so the id is deduced by diffing the inventory before and after.

use crate::bundle::{Bundle, build_bundle};
use crate::inventory::list_identifiers;
use crate::session::Session;
use crate::submit::fresh_token;
use printcert_core::{CertificateId, ConsoleError, PROTOCOL, Result};
use reqwest::blocking::multipart::{Form, Part};
use tracing::{debug, info};

/// Encode `key_pem`/`cert_pem` and install them. Returns the new id.
pub fn upload(session: &Session, key_pem: &[u8], cert_pem: &[u8]) -> Result<CertificateId> {
    let bundle = build_bundle(key_pem, cert_pem)?;
    upload_bundle(session, &bundle)
}

/// Install an already encoded bundle. Returns the new id.
pub fn upload_bundle(session: &Session, bundle: &Bundle) -> Result<CertificateId> {
    let import = &PROTOCOL.import;
    let path = PROTOCOL.paths.cert_import;

    let before = list_identifiers(session)?;
    let token = fresh_token(session, path, &[])?;

    let file = Part::bytes(bundle.der().to_vec())
        .file_name(import.file_name)
        .mime_str(import.file_mime)
        .map_err(ConsoleError::transport)?;

    let (page_field, page_value) = import.page;
    let mut form = Form::new()
        .text(page_field, page_value)
        .text(PROTOCOL.token_field, token);
    for &(name, value) in import.leading {
        form = form.text(name, value);
    }
    form = form.part(import.file_field, file);
    for &(name, value) in import.trailing {
        form = form.text(name, value);
    }

    debug!(bytes = bundle.der().len(), chain = bundle.chain_included(), "Submitting certificate bundle");
    let page = session.post_multipart(path, form)?;
    if !page.is_ok() {
        return Err(ConsoleError::Status {
            path: path.to_string(),
            status: page.status,
        });
    }

    session.wait_settle();

    let after = list_identifiers(session)?;
    let id = diff_new_id(&before, &after)?;
    info!(id = %id, "Certificate uploaded");
    Ok(id)
}

/// The single id present in `after` but not in `before`.
pub fn diff_new_id(before: &[CertificateId], after: &[CertificateId]) -> Result<CertificateId> {
    let mut new_ids: Vec<&CertificateId> = after.iter().filter(|id| !before.contains(id)).collect();
    new_ids.dedup();
    match new_ids.as_slice() {
        [only] => Ok((*only).clone()),
        _ => Err(ConsoleError::AmbiguousResult {
            new_ids: new_ids.iter().map(|id| id.to_string()).collect(),
        }),
    }
}
