// ABOUTME: HTML rendering for the OAuth consent form and browser-facing authorization errors
// ABOUTME: Templates are embedded at compile time and every interpolated value is HTML-escaped
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use authz_core::constants::oauth::{AUTHORIZE_PATH, PKCE_METHOD_S256, RESPONSE_TYPE_CODE};
use authz_core::constants::service::SERVICE_NAME;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use html_escape::{encode_double_quoted_attribute, encode_text};

use super::endpoints::ValidatedAuthorization;
use super::models::OAuth2Error;

/// Consent template embedded at compile-time
const OAUTH_CONSENT_TEMPLATE: &str = include_str!("../../templates/oauth_consent.html");

/// OAuth error template embedded at compile-time
const OAUTH_ERROR_TEMPLATE: &str = include_str!("../../templates/oauth_error.html");

/// Shown for every resource owner credential failure
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password.";

/// Substitute `{{KEY}}` placeholders in one pass so that values containing
/// placeholder syntax are never expanded
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        match values.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

/// Render the consent form for a validated request
///
/// The password is never written back into the page.
#[must_use]
pub fn render_consent_page(
    validated: &ValidatedAuthorization,
    email: &str,
    error: Option<&str>,
) -> String {
    let attr = |v: &str| encode_double_quoted_attribute(v).into_owned();
    let client_name = encode_text(&validated.client.client_name).into_owned();
    let client_id = attr(&validated.client.client_id);
    let redirect_uri = attr(&validated.redirect_uri);
    let scope = attr(&validated.scope);
    let state = attr(&validated.state);
    let code_challenge = attr(&validated.code_challenge);
    let email = attr(email);
    let error_block = error
        .map(|message| format!(r#"<div class="error">{}</div>"#, encode_text(message)))
        .unwrap_or_default();

    fill_template(
        OAUTH_CONSENT_TEMPLATE,
        &[
            ("CLIENT_NAME", client_name.as_str()),
            ("ACTION", AUTHORIZE_PATH),
            ("RESPONSE_TYPE", RESPONSE_TYPE_CODE),
            ("CLIENT_ID", client_id.as_str()),
            ("REDIRECT_URI", redirect_uri.as_str()),
            ("SCOPE", scope.as_str()),
            ("STATE", state.as_str()),
            ("CODE_CHALLENGE", code_challenge.as_str()),
            ("CODE_CHALLENGE_METHOD", PKCE_METHOD_S256),
            ("EMAIL", email.as_str()),
            ("ERROR_BLOCK", error_block.as_str()),
        ],
    )
}

/// Render an HTML error page for errors shown directly in the browser
#[must_use]
pub fn render_error_page(error: &OAuth2Error) -> String {
    let error_title = match error.error.as_str() {
        "invalid_client" => "Invalid Client",
        "access_denied" => "Access Denied",
        "server_error" => "Server Error",
        "temporarily_unavailable" => "Temporarily Unavailable",
        _ => "Invalid Authorization Request",
    };
    let description = error
        .error_description
        .as_deref()
        .map(|d| format!(r#"<div class="description">{}</div>"#, encode_text(d)))
        .unwrap_or_default();

    let error_code = encode_text(&error.error).into_owned();

    fill_template(
        OAUTH_ERROR_TEMPLATE,
        &[
            ("ERROR_TITLE", error_title),
            ("PROVIDER", SERVICE_NAME),
            ("ERROR", error_code.as_str()),
            ("DESCRIPTION", description.as_str()),
        ],
    )
}

/// HTML response that may not be framed or cached
#[must_use]
pub fn html_response(status: StatusCode, body: String) -> Response {
    let mut response = (status, Html(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("frame-ancestors 'none'"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
