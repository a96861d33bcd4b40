// ABOUTME: Structured error types for storage operations
// ABOUTME: Shared by the SQLite and in-memory engines behind the store traits
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use thiserror::Error;

/// Errors raised by store implementations
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Could not open or reach the backing store
    #[error("Database connection failed: {context}")]
    ConnectionError {
        /// What was being attempted
        context: String,
    },

    /// A query or mutation failed
    #[error("Query failed: {context}")]
    QueryError {
        /// What was being attempted
        context: String,
    },

    /// A row could not be decoded into a model
    #[error("Invalid {entity_type} record: {reason}")]
    InvalidRecord {
        /// Model being decoded
        entity_type: &'static str,
        /// Why decoding failed
        reason: String,
    },

    /// A uniqueness constraint was violated
    #[error("{entity_type} conflict: {reason}")]
    Conflict {
        /// Model being written
        entity_type: &'static str,
        /// Which constraint was violated
        reason: String,
    },

    /// A required record was absent
    #[error("{entity_type} not found: {entity_id}")]
    NotFound {
        /// Model being looked up
        entity_type: &'static str,
        /// Identifier that was looked up
        entity_id: String,
    },

    /// Schema migration failed
    #[error("Migration failed: {context}")]
    MigrationError {
        /// Migration step that failed
        context: String,
    },
}

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Self::Conflict {
                entity_type: "record",
                reason: db_err.message().to_owned(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::ConnectionError {
                    context: error.to_string(),
                }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
                Self::InvalidRecord {
                    entity_type: "row",
                    reason: error.to_string(),
                }
            }
            other => Self::QueryError {
                context: other.to_string(),
            },
        }
    }
}
