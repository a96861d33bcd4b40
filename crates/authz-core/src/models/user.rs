// ABOUTME: Resource owner account model consumed by the authorization server
// ABOUTME: Carries the bcrypt password hash, role, and activation flag
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role embedded in access tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular account
    #[default]
    User,
    /// Administrator
    Admin,
}

impl UserRole {
    /// Storage and claim representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Resource owner account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier, the `sub` of issued tokens
    pub id: Uuid,
    /// Login email, unique
    pub email: String,
    /// Name shown to clients
    pub display_name: String,
    /// Account role
    pub role: UserRole,
    /// bcrypt hash of the password
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Inactive accounts cannot log in or use existing tokens
    pub is_active: bool,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New active account with the `user` role
    #[must_use]
    pub fn new(email: String, password_hash: String, display_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            display_name,
            role: UserRole::User,
            password_hash,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
