//! Two-phase certificate deletion, verified against the inventory.

use crate::inventory::list_identifiers;
use crate::session::Session;
use crate::submit::{GuardedForm, fetch_and_submit, submit_guarded};
use printcert_core::{CertificateId, ConsoleError, PROTOCOL, Result};
use tracing::info;

/// Delete `id`. Fails without touching the device when `id` is the preset
/// or is not installed, and fails after the fact when it is still listed.
pub fn delete(session: &Session, id: &CertificateId) -> Result<()> {
    if id.is_preset() {
        return Err(ConsoleError::InvalidIdentifier(id.to_string()));
    }
    if !list_identifiers(session)?.contains(id) {
        return Err(ConsoleError::InvalidIdentifier(id.to_string()));
    }

    let path = PROTOCOL.paths.cert_delete;
    let form = &PROTOCOL.delete;

    let intent = GuardedForm::new(path, form.intent_step).field(form.id_field, id.as_str());
    let confirm_page = fetch_and_submit(session, &[(PROTOCOL.id_query, id.as_str())], &intent)?;

    let confirm = GuardedForm::new(path, form.confirm_step)
        .field(form.id_field, id.as_str())
        .accept_redirect();
    submit_guarded(session, &confirm_page, &confirm)?;

    session.wait_settle();

    if list_identifiers(session)?.contains(id) {
        return Err(ConsoleError::DeletionNotConfirmed(id.to_string()));
    }
    info!(id = %id, "Certificate deleted");
    Ok(())
}
