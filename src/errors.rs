// ABOUTME: Unified error handling re-exported from the core crate
// ABOUTME: AppError carries an ErrorCode that maps to HTTP status and a client-safe JSON body
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Unified Error Handling
//!
//! Application errors live in `authz-core` so storage and HTTP layers share
//! one type. OAuth protocol errors use
//! [`OAuth2Error`](crate::oauth2_server::OAuth2Error) instead.

pub use authz_core::errors::{
    AppError, AppResult, DatabaseError, ErrorCode, ErrorResponse, ErrorResponseDetails,
};
