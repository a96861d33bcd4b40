// ABOUTME: Axum routes for OAuth 2.1 discovery, client registration, authorization, and token endpoints
// ABOUTME: Translates HTTP requests into authorization server calls and OAuth2 error responses
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use authz_core::constants::oauth::{
    AUTHORIZATION_SERVER_METADATA_PATH, AUTHORIZE_PATH, AUTH_METHOD_CLIENT_SECRET_BASIC,
    AUTH_METHOD_CLIENT_SECRET_POST, GRANT_TYPE_AUTHORIZATION_CODE, GRANT_TYPE_REFRESH_TOKEN,
    PKCE_METHOD_S256, PROTECTED_RESOURCE_METADATA_PATH, REGISTER_PATH, RESPONSE_TYPE_CODE,
    SUPPORTED_SCOPE, TOKEN_PATH,
};
use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Form, Json, Router};
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use tracing::{debug, warn};

use super::consent::{
    html_response, render_consent_page, render_error_page, INVALID_CREDENTIALS_MESSAGE,
};
use super::endpoints::{
    build_redirect, error_params, AuthorizeRejection, ConsentOutcome, OAuth2AuthorizationServer,
};
use super::models::{
    AuthorizationServerMetadata, AuthorizeRequest, ClientRegistrationRequest, ConsentForm,
    OAuth2Error, ProtectedResourceMetadata, TokenRequest,
};
use super::rate_limiting::oauth2_rate_limit;
use crate::config::OAuth2ServerConfig;
use crate::errors::AppError;
use crate::resources::ServerResources;

/// OAuth 2.0 server routes
pub struct OAuth2Routes;

impl OAuth2Routes {
    /// Create all OAuth 2.0 routes, rate limited per client IP
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        let limiter = resources.rate_limiter.clone();
        Router::new()
            .route(
                AUTHORIZATION_SERVER_METADATA_PATH,
                get(handle_authorization_server_metadata),
            )
            .route(
                PROTECTED_RESOURCE_METADATA_PATH,
                get(handle_protected_resource_metadata),
            )
            .route(REGISTER_PATH, post(handle_client_registration))
            .route(
                AUTHORIZE_PATH,
                get(handle_authorize).post(handle_authorize_consent),
            )
            .route(TOKEN_PATH, post(handle_token))
            .layer(middleware::from_fn_with_state(limiter, oauth2_rate_limit))
            .with_state(resources)
    }
}

/// Build the RFC 8414 document for `issuer`
#[must_use]
pub fn authorization_server_metadata(issuer: &str) -> AuthorizationServerMetadata {
    AuthorizationServerMetadata {
        issuer: issuer.to_owned(),
        authorization_endpoint: format!("{issuer}{AUTHORIZE_PATH}"),
        token_endpoint: format!("{issuer}{TOKEN_PATH}"),
        registration_endpoint: format!("{issuer}{REGISTER_PATH}"),
        response_types_supported: vec![RESPONSE_TYPE_CODE.to_owned()],
        grant_types_supported: vec![
            GRANT_TYPE_AUTHORIZATION_CODE.to_owned(),
            GRANT_TYPE_REFRESH_TOKEN.to_owned(),
        ],
        code_challenge_methods_supported: vec![PKCE_METHOD_S256.to_owned()],
        token_endpoint_auth_methods_supported: vec![
            AUTH_METHOD_CLIENT_SECRET_POST.to_owned(),
            AUTH_METHOD_CLIENT_SECRET_BASIC.to_owned(),
        ],
        scopes_supported: vec![SUPPORTED_SCOPE.to_owned()],
    }
}

/// Build the RFC 9728 document, if an issuer is configured
#[must_use]
pub fn protected_resource_metadata(
    config: &OAuth2ServerConfig,
) -> Option<ProtectedResourceMetadata> {
    let issuer = config.issuer_url.as_deref()?;
    let resource = config.resource()?;
    Some(ProtectedResourceMetadata {
        resource: resource.to_owned(),
        authorization_servers: vec![issuer.to_owned()],
        bearer_methods_supported: vec!["header".to_owned()],
        scopes_supported: vec![SUPPORTED_SCOPE.to_owned()],
    })
}

fn not_configured() -> Response {
    AppError::not_found("OAuth2 authorization server is not configured").into_response()
}

fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

/// 302 to `location`
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => no_store(
            (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        ),
        Err(_) => rejection_page(&OAuth2Error::server_error()),
    }
}

fn rejection_page(error: &OAuth2Error) -> Response {
    let status = match error.http_status() {
        StatusCode::INTERNAL_SERVER_ERROR => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    html_response(status, render_error_page(error))
}

fn authorize_rejection_response(rejection: AuthorizeRejection) -> Response {
    match rejection {
        AuthorizeRejection::Direct(error) => rejection_page(&error),
        AuthorizeRejection::Redirect {
            redirect_uri,
            error,
            state,
        } => match build_redirect(&redirect_uri, &error_params(&error, state.as_deref())) {
            Ok(location) => found(&location),
            Err(error) => rejection_page(&error),
        },
    }
}

fn oauth2_server(resources: &ServerResources) -> Option<&Arc<OAuth2AuthorizationServer>> {
    resources.oauth2_server.as_ref()
}

async fn handle_authorization_server_metadata(
    State(resources): State<Arc<ServerResources>>,
) -> Response {
    match oauth2_server(&resources) {
        Some(server) => Json(authorization_server_metadata(server.issuer())).into_response(),
        None => not_configured(),
    }
}

async fn handle_protected_resource_metadata(
    State(resources): State<Arc<ServerResources>>,
) -> Response {
    if oauth2_server(&resources).is_none() {
        return not_configured();
    }
    match protected_resource_metadata(&resources.config.oauth2_server) {
        Some(metadata) => Json(metadata).into_response(),
        None => not_configured(),
    }
}

async fn handle_client_registration(
    State(resources): State<Arc<ServerResources>>,
    body: Result<Json<ClientRegistrationRequest>, JsonRejection>,
) -> Response {
    let Some(server) = oauth2_server(&resources) else {
        return not_configured();
    };
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected malformed registration request");
            return OAuth2Error::invalid_client_metadata(
                "Request body must be a JSON client metadata document",
            )
            .into_response();
        }
    };

    match server.register_client(request).await {
        Ok(response) => no_store((StatusCode::CREATED, Json(response)).into_response()),
        Err(error) => error.into_response(),
    }
}

async fn handle_authorize(
    State(resources): State<Arc<ServerResources>>,
    query: Result<Query<AuthorizeRequest>, QueryRejection>,
) -> Response {
    let Some(server) = oauth2_server(&resources) else {
        return not_configured();
    };
    let Ok(Query(request)) = query else {
        return rejection_page(&OAuth2Error::invalid_request(
            "Malformed authorization request",
        ));
    };

    match server.validate_authorization_request(&request).await {
        Ok(validated) => html_response(
            StatusCode::OK,
            render_consent_page(&validated, "", None),
        ),
        Err(rejection) => authorize_rejection_response(rejection),
    }
}

async fn handle_authorize_consent(
    State(resources): State<Arc<ServerResources>>,
    form: Result<Form<ConsentForm>, FormRejection>,
) -> Response {
    let Some(server) = oauth2_server(&resources) else {
        return not_configured();
    };
    let Ok(Form(form)) = form else {
        return rejection_page(&OAuth2Error::invalid_request("Malformed consent submission"));
    };

    match server.handle_consent(&form).await {
        Ok(ConsentOutcome::Redirect(location)) => found(&location),
        Ok(ConsentOutcome::InvalidCredentials(validated)) => html_response(
            StatusCode::OK,
            render_consent_page(&validated, &form.email, Some(INVALID_CREDENTIALS_MESSAGE)),
        ),
        Err(rejection) => authorize_rejection_response(rejection),
    }
}

/// Fill missing client credentials from an HTTP Basic header (RFC 6749 2.3.1)
///
/// Form fields win when both are present.
fn apply_basic_credentials(request: &mut TokenRequest, basic: &Authorization<Basic>) {
    if !request.client_id.is_empty() {
        return;
    }
    let (Ok(client_id), Ok(client_secret)) = (
        urlencoding::decode(basic.username()),
        urlencoding::decode(basic.password()),
    ) else {
        warn!("Undecodable client credentials in Basic authorization header");
        return;
    };
    request.client_id = client_id.into_owned();
    request.client_secret = client_secret.into_owned();
}

async fn handle_token(
    State(resources): State<Arc<ServerResources>>,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let Some(server) = oauth2_server(&resources) else {
        return not_configured();
    };
    let mut request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected malformed token request");
            return OAuth2Error::invalid_request("Token request must be form-encoded")
                .into_response();
        }
    };
    if let Some(TypedHeader(basic)) = basic {
        apply_basic_credentials(&mut request, &basic);
    }

    match server.token(request).await {
        Ok(response) => no_store(Json(response).into_response()),
        Err(error) => error.into_response(),
    }
}
