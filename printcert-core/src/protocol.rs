//! Vendor web-console protocol table.
//!
//! Page paths, form field names and the constant values the console's own
//! browser-side scripts submit. Everything here must be reproduced
//! byte-for-byte; field names such as `B903` are opaque firmware tokens.

/// A fixed `name=value` pair submitted with every instance of a form.
pub type FixedField = (&'static str, &'static str);

/// Page paths served by the console.
#[derive(Debug)]
pub struct Paths {
    pub login: &'static str,
    pub cert_list: &'static str,
    pub cert_view: &'static str,
    pub cert_import: &'static str,
    pub cert_delete: &'static str,
    pub http_settings: &'static str,
}

/// Login handshake.
#[derive(Debug)]
pub struct LoginForm {
    /// Cookie whose presence proves a successful login.
    pub auth_cookie: &'static str,
    /// Field echoing the login page path back to the console.
    pub return_url_field: &'static str,
}

/// Certificate import (multipart) form.
#[derive(Debug)]
pub struct ImportForm {
    /// Sent first, ahead of the token.
    pub page: FixedField,
    /// Sent after the token and before the file part, in order.
    pub leading: &'static [FixedField],
    pub file_field: &'static str,
    pub file_name: &'static str,
    pub file_mime: &'static str,
    /// Fields sent after the file part, in order.
    pub trailing: &'static [FixedField],
}

/// Active-certificate selection on the HTTP server settings page.
#[derive(Debug)]
pub struct ActivateForm {
    /// `<select>` holding the installed certificates; also the field that
    /// names the certificate to activate.
    pub select_field: &'static str,
    /// Step 1: enable HTTPS for the web console and IPP. Other options on the
    /// page are left unset so the device keeps their current values.
    pub select_step: &'static [FixedField],
    /// Step 2: confirm and also activate the other secure protocols.
    /// `http_page_mode=4` would confirm without them. Triggers a reboot.
    pub confirm_step: &'static [FixedField],
}

/// Two-phase certificate deletion.
#[derive(Debug)]
pub struct DeleteForm {
    pub id_field: &'static str,
    pub intent_step: &'static [FixedField],
    pub confirm_step: &'static [FixedField],
}

#[derive(Debug)]
pub struct ConsoleProtocol {
    pub paths: Paths,
    /// Query parameter selecting one certificate on view/delete pages.
    pub id_query: &'static str,
    /// Name of the anti-forgery token field on every mutating form.
    pub token_field: &'static str,
    pub login: LoginForm,
    pub import: ImportForm,
    pub activate: ActivateForm,
    pub delete: DeleteForm,
}

/// The protocol spoken by the supported console firmware.
pub static PROTOCOL: ConsoleProtocol = ConsoleProtocol {
    paths: Paths {
        login: "/general/status.html",
        cert_list: "/net/security/certificate/certificate.html",
        cert_view: "/net/security/certificate/view.html",
        cert_import: "/net/security/certificate/import.html",
        cert_delete: "/net/security/certificate/delete.html",
        http_settings: "/net/net/certificate/http.html",
    },
    id_query: "idx",
    token_field: "CSRFToken",
    login: LoginForm {
        auth_cookie: "AuthCookie",
        return_url_field: "loginurl",
    },
    import: ImportForm {
        page: ("pageid", "390"),
        leading: &[
            ("B8ea", ""),
            ("B8f8", ""),
            ("hidden_certificate_process_control", "1"),
        ],
        file_field: "B820",
        file_name: "certkey.p12",
        file_mime: "application/octet-stream",
        trailing: &[("B821", ""), ("hidden_cert_import_password", "")],
    },
    activate: ActivateForm {
        select_field: "B903",
        select_step: &[("pageid", "326"), ("B86c", "1"), ("B87e", "1")],
        confirm_step: &[("pageid", "326"), ("http_page_mode", "5")],
    },
    delete: DeleteForm {
        id_field: "hidden_certificate_idx",
        intent_step: &[
            ("pageid", "383"),
            ("B8ea", ""),
            ("B8fc", ""),
            ("hidden_certificate_process_control", "1"),
        ],
        confirm_step: &[
            ("pageid", "383"),
            ("B8ea", ""),
            ("B8eb", ""),
            ("hidden_certificate_process_control", "2"),
        ],
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(fields: &[FixedField], name: &str) -> Option<&'static str> {
        fields.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
    }

    #[test]
    fn all_paths_are_absolute() {
        let p = &PROTOCOL.paths;
        for path in [p.login, p.cert_list, p.cert_view, p.cert_import, p.cert_delete, p.http_settings] {
            assert!(path.starts_with('/'), "{path} must be absolute");
            assert!(path.ends_with(".html"));
        }
    }

    #[test]
    fn page_ids_match_their_forms() {
        assert_eq!(PROTOCOL.import.page, ("pageid", "390"));
        assert_eq!(value_of(PROTOCOL.activate.select_step, "pageid"), Some("326"));
        assert_eq!(value_of(PROTOCOL.activate.confirm_step, "pageid"), Some("326"));
        assert_eq!(value_of(PROTOCOL.delete.intent_step, "pageid"), Some("383"));
        assert_eq!(value_of(PROTOCOL.delete.confirm_step, "pageid"), Some("383"));
    }

    #[test]
    fn delete_steps_differ_only_in_phase_markers() {
        assert_eq!(value_of(PROTOCOL.delete.intent_step, "hidden_certificate_process_control"), Some("1"));
        assert_eq!(value_of(PROTOCOL.delete.confirm_step, "hidden_certificate_process_control"), Some("2"));
        assert!(value_of(PROTOCOL.delete.intent_step, "B8fc").is_some());
        assert!(value_of(PROTOCOL.delete.confirm_step, "B8eb").is_some());
    }

    #[test]
    fn confirm_step_activates_other_secure_protocols() {
        assert_eq!(value_of(PROTOCOL.activate.confirm_step, "http_page_mode"), Some("5"));
    }

    #[test]
    fn fixed_forms_never_carry_the_token() {
        let all = [
            PROTOCOL.import.leading,
            PROTOCOL.import.trailing,
            PROTOCOL.activate.select_step,
            PROTOCOL.activate.confirm_step,
            PROTOCOL.delete.intent_step,
            PROTOCOL.delete.confirm_step,
        ];
        for fields in all {
            assert!(value_of(fields, PROTOCOL.token_field).is_none());
        }
    }
}
