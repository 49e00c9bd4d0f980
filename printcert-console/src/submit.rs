//! Token-guarded form submission.
//!
//! Every mutating step follows the same shape: take the body of the page the
//! console last rendered, pull a fresh token out of it, post the form and hand
//! back the response body, which carries the token for the next step.

use crate::session::{Page, Session};
use crate::token::extract_token;
use printcert_core::protocol::FixedField;
use printcert_core::{ConsoleError, PROTOCOL, Result};
use tracing::debug;

/// A urlencoded console form: fixed protocol fields plus per-call values.
#[derive(Debug, Clone)]
pub struct GuardedForm<'a> {
    path: &'a str,
    fixed: &'static [FixedField],
    dynamic: Vec<(&'static str, String)>,
    accept_redirect: bool,
}

impl<'a> GuardedForm<'a> {
    pub fn new(path: &'a str, fixed: &'static [FixedField]) -> Self {
        Self {
            path,
            fixed,
            dynamic: Vec::new(),
            accept_redirect: false,
        }
    }

    pub fn field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.dynamic.push((name, value.into()));
        self
    }

    /// Also accept a 30x answer, for final steps whose effect is verified
    /// some other way.
    pub fn accept_redirect(mut self) -> Self {
        self.accept_redirect = true;
        self
    }

    pub fn path(&self) -> &str {
        self.path
    }

    /// Wire fields in submission order. The token follows the leading
    /// page id, the way the console's own forms send it.
    pub fn encode<'f>(&'f self, token: &'f str) -> Vec<(&'f str, &'f str)> {
        let (page, rest) = self.fixed.split_at(self.fixed.len().min(1));
        let mut fields: Vec<(&str, &str)> = page.to_vec();
        fields.push((PROTOCOL.token_field, token));
        fields.extend_from_slice(rest);
        fields.extend(self.dynamic.iter().map(|(k, v)| (*k, v.as_str())));
        fields
    }

    fn check(&self, page: &Page) -> Result<()> {
        if page.is_ok() || (self.accept_redirect && page.is_redirect()) {
            return Ok(());
        }
        Err(ConsoleError::Status {
            path: self.path.to_string(),
            status: page.status,
        })
    }
}

/// GET `path` and extract the token it renders.
pub fn fresh_token(session: &Session, path: &str, query: &[(&str, &str)]) -> Result<String> {
    let html = session.get_ok(path, query)?;
    extract_token(&html)
}

/// Submit `form` with a token taken from `source_html`; returns the
/// response body for the next step.
pub fn submit_guarded(session: &Session, source_html: &str, form: &GuardedForm<'_>) -> Result<String> {
    let token = extract_token(source_html)?;
    let page = session.post_form(form.path, &form.encode(&token))?;
    form.check(&page)?;
    debug!(path = form.path, status = page.status, "Guarded form accepted");
    Ok(page.body)
}

/// Load the form's own page first, then submit against its token.
pub fn fetch_and_submit(
    session: &Session,
    query: &[(&str, &str)],
    form: &GuardedForm<'_>,
) -> Result<String> {
    let html = session.get_ok(form.path, query)?;
    submit_guarded(session, &html, form)
}
