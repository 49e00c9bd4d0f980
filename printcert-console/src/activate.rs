//! Make an installed certificate the one the console serves.

use crate::session::Session;
use crate::submit::{GuardedForm, fetch_and_submit, submit_guarded};
use printcert_core::{CertificateId, PROTOCOL, Result};
use tracing::info;

/// Select `id` on the HTTP server settings page and confirm.
///
/// The confirmation reboots the device. This returns as soon as the
/// console acknowledges it; waiting for the device to come back is up to
/// the caller.
pub fn activate(session: &Session, id: &CertificateId) -> Result<()> {
    let path = PROTOCOL.paths.http_settings;
    let form = &PROTOCOL.activate;

    let select = GuardedForm::new(path, form.select_step).field(form.select_field, id.as_str());
    let confirm_page = fetch_and_submit(session, &[], &select)?;

    let confirm = GuardedForm::new(path, form.confirm_step);
    submit_guarded(session, &confirm_page, &confirm)?;

    info!(id = %id, "Certificate activated, device is rebooting");
    Ok(())
}
