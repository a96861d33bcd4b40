// ABOUTME: Core types and constants for the portfolio authorization server
// ABOUTME: Foundation crate with error handling, grant persistence models, and OAuth constants
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![deny(unsafe_code)]

//! # Authz Core
//!
//! Foundation crate shared by the authorization server and its storage
//! engines. It changes rarely, which keeps incremental builds of the main
//! crate cheap.
//!
//! ## Modules
//!
//! - **errors**: `AppError`, `ErrorCode`, and `DatabaseError`
//! - **constants**: OAuth protocol constants (scope, PKCE method, TTL defaults)
//! - **models**: persisted OAuth grant artifacts and the consumed `User` record

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// OAuth protocol constants and defaults
pub mod constants;

/// Persistence models (clients, authorization codes, refresh tokens, users)
pub mod models;
